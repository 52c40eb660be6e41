//! Renders dispatch results for people and for machines.
use crate::dispatcher::DispatchResult;
use crate::probes::service_name;
use chrono::{DateTime, Local};
use colored::Colorize;
use serde_derive::Serialize;
use std::fmt::Write;
use std::time::Duration;

/// One finished run plus the context needed to print it.
#[derive(Debug, Serialize)]
pub struct Report {
    pub target: String,
    pub started: DateTime<Local>,
    pub elapsed_secs: f64,
    #[serde(flatten)]
    pub result: DispatchResult,
}

impl Report {
    pub fn new(
        target: &str,
        started: DateTime<Local>,
        elapsed: Duration,
        result: DispatchResult,
    ) -> Self {
        Self {
            target: target.to_owned(),
            started,
            elapsed_secs: elapsed.as_secs_f64(),
            result,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Several reports, one per scanned address, as a single JSON array.
    pub fn many_to_json(reports: &[Self]) -> serde_json::Result<String> {
        serde_json::to_string_pretty(reports)
    }

    /// Open ports in ascending order, whatever order they were probed in.
    pub fn open_ports(&self) -> Vec<u16> {
        let mut ports = self
            .result
            .success_keys()
            .filter_map(|key| key.parse::<u16>().ok())
            .collect::<Vec<_>>();
        ports.sort_unstable();
        ports
    }

    /// `target -> [22,80]`, the shape grep and shell scripts expect.
    pub fn greppable_ports(&self) -> String {
        let ports = self.open_ports().iter().map(u16::to_string).collect::<Vec<_>>();
        format!("{} -> [{}]", self.target, ports.join(","))
    }

    /// `username -> [GitHub,Dev.to]`.
    pub fn greppable_sites(&self) -> String {
        let sites = self.result.success_keys().collect::<Vec<_>>();
        format!("{} -> [{}]", self.target, sites.join(","))
    }

    fn summary(&self, noun: &str) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Target: {}", self.target);
        let _ = writeln!(out, "Started: {}", self.started.format("%Y-%m-%d %H:%M:%S"));
        let _ = writeln!(
            out,
            "Probed {} {noun} in {:.2} seconds, {} found, {} timed out, {} errored",
            self.result.total_attempted,
            self.elapsed_secs,
            self.result.total_succeeded,
            self.result.timed_out(),
            self.result.faulted()
        );
        out
    }

    pub fn render_ports(&self, accessible: bool) -> String {
        let mut out = self.summary("ports");
        let open = self.open_ports();
        if open.is_empty() {
            out.push_str("No open ports found.\n");
            return out;
        }

        out.push_str("Open ports:\n");
        for port in open {
            let line = match service_name(port) {
                Some(service) => format!("  {port}/tcp {service}"),
                None => format!("  {port}/tcp"),
            };
            if accessible {
                let _ = writeln!(out, "{line}");
            } else {
                let _ = writeln!(out, "{}", line.green());
            }
        }
        out
    }

    pub fn render_sites(&self, accessible: bool) -> String {
        let mut out = self.summary("sites");
        if self.result.successes.is_empty() {
            out.push_str("No profile found.\n");
            return out;
        }

        out.push_str("Found on:\n");
        for success in &self.result.successes {
            let url = success.payload.as_deref().unwrap_or_default();
            if accessible {
                let _ = writeln!(out, "  - {}: {url}", success.key);
            } else {
                let _ = writeln!(out, "  - {}: {}", success.key.bold(), url.purple());
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::{Failure, FailureReason, Success};

    fn report(successes: &[(&str, Option<&str>)]) -> Report {
        let result = DispatchResult {
            successes: successes
                .iter()
                .map(|(key, payload)| Success {
                    key: (*key).to_owned(),
                    payload: payload.map(str::to_owned),
                })
                .collect(),
            failures: vec![Failure {
                key: String::from("23"),
                reason: FailureReason::TimedOut,
            }],
            total_attempted: successes.len() + 1,
            total_succeeded: successes.len(),
        };
        Report::new("127.0.0.1", Local::now(), Duration::from_millis(1500), result)
    }

    #[test]
    fn ports_are_sorted_for_display() {
        let report = report(&[("443", None), ("22", None), ("8080", None)]);
        assert_eq!(report.open_ports(), [22, 443, 8080]);
        assert_eq!(report.greppable_ports(), "127.0.0.1 -> [22,443,8080]");
    }

    #[test]
    fn accessible_port_listing_names_services() {
        let rendered = report(&[("22", None), ("31337", None)]).render_ports(true);
        assert!(rendered.contains("  22/tcp ssh\n"));
        assert!(rendered.contains("  31337/tcp\n"));
        assert!(rendered.contains("1 timed out"));
    }

    #[test]
    fn empty_runs_say_so() {
        assert!(report(&[]).render_ports(true).contains("No open ports found."));
        assert!(report(&[]).render_sites(true).contains("No profile found."));
    }

    #[test]
    fn sites_list_their_urls() {
        let rendered = report(&[("GitHub", Some("https://github.com/alice"))]).render_sites(true);
        assert!(rendered.contains("  - GitHub: https://github.com/alice\n"));
        assert_eq!(
            report(&[("GitHub", None), ("Dev.to", None)]).greppable_sites(),
            "127.0.0.1 -> [GitHub,Dev.to]"
        );
    }

    #[test]
    fn json_flattens_the_tally() {
        let json: serde_json::Value =
            serde_json::from_str(&report(&[("22", None)]).to_json().unwrap()).unwrap();
        assert_eq!(json["target"], "127.0.0.1");
        assert_eq!(json["total_attempted"], 2);
        assert_eq!(json["successes"][0]["key"], "22");
        assert_eq!(json["elapsed_secs"], 1.5);
    }

    #[test]
    fn several_addresses_make_one_json_array() {
        let reports = [report(&[("22", None)]), report(&[])];
        let json: serde_json::Value =
            serde_json::from_str(&Report::many_to_json(&reports).unwrap()).unwrap();
        let runs = json.as_array().unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0]["successes"][0]["key"], "22");
        assert_eq!(runs[1]["total_succeeded"], 0);
    }
}
