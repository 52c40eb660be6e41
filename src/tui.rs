//! Terminal output helpers: status macros and a progress bar hooked into probes.
use crate::probe::{Check, Observation, Probe};
use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;

/// Prints a warning unless greppable; accessible drops the coloured marker.
#[macro_export]
macro_rules! warning {
    ($name:expr) => {
        println!(
            "{} {}",
            ::colored::Colorize::bold(::colored::Colorize::red("[!]")),
            $name
        );
    };
    ($name:expr, $greppable:expr, $accessible:expr) => {
        // if not greppable then print, otherwise no else statement so do not print.
        if !$greppable {
            if $accessible {
                // Don't print the ascii art
                println!("{}", $name);
            } else {
                println!(
                    "{} {}",
                    ::colored::Colorize::bold(::colored::Colorize::red("[!]")),
                    $name
                );
            }
        }
    };
}

/// Prints an informational line unless greppable.
#[macro_export]
macro_rules! detail {
    ($name:expr) => {
        println!(
            "{} {}",
            ::colored::Colorize::bold(::colored::Colorize::blue("[~]")),
            $name
        );
    };
    ($name:expr, $greppable:expr, $accessible:expr) => {
        if !$greppable {
            if $accessible {
                println!("{}", $name);
            } else {
                println!(
                    "{} {}",
                    ::colored::Colorize::bold(::colored::Colorize::blue("[~]")),
                    $name
                );
            }
        }
    };
}

/// Prints a result line unless greppable.
#[macro_export]
macro_rules! output {
    ($name:expr) => {
        println!(
            "{} {}",
            ::colored::Colorize::bold(::colored::Colorize::green("[>]")),
            $name
        );
    };
    ($name:expr, $greppable:expr, $accessible:expr) => {
        if !$greppable {
            if $accessible {
                println!("{}", $name);
            } else {
                println!(
                    "{} {}",
                    ::colored::Colorize::bold(::colored::Colorize::green("[>]")),
                    $name
                );
            }
        }
    };
}

/// Bar sized to a run of `len` probes.
pub fn progress_bar(len: usize, label: &str) -> ProgressBar {
    let bar = ProgressBar::new(len as u64);
    if let Ok(style) =
        ProgressStyle::with_template("{prefix} [{bar:40.cyan/blue}] {pos}/{len} {elapsed}")
    {
        bar.set_style(style.progress_chars("=> "));
    }
    bar.set_prefix(label.to_owned());
    bar
}

/// Wraps each probe so the bar advances when it reaches a terminal state.
pub fn track(probes: Vec<Probe>, bar: &ProgressBar) -> Vec<Probe> {
    probes
        .into_iter()
        .map(|probe| {
            let tracked = Tracked {
                inner: probe.check(),
                bar: bar.clone(),
            };
            Probe::new(probe.key().to_owned(), tracked)
        })
        .collect()
}

struct Tracked {
    inner: Arc<dyn Check>,
    bar: ProgressBar,
}

/// Ticks on drop, so probes cut off by their deadline still count.
struct Tick(ProgressBar);

impl Drop for Tick {
    fn drop(&mut self) {
        self.0.inc(1);
    }
}

#[async_trait]
impl Check for Tracked {
    async fn check(&self, target: &str, timeout: Duration) -> anyhow::Result<Observation> {
        let _tick = Tick(self.bar.clone());
        self.inner.check(target, timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::dispatch;
    use tokio::time;

    #[tokio::test]
    async fn bar_counts_every_probe_including_timeouts() {
        let probes = vec![
            Probe::from_fn("fast", |_, _| async { Ok(Observation::hit_bare()) }),
            Probe::from_fn("stuck", |_, _| async {
                time::sleep(Duration::from_secs(5)).await;
                Ok(Observation::hit_bare())
            }),
            Probe::from_fn("broken", |_, _| async { Err(anyhow::anyhow!("nope")) }),
        ];
        let bar = ProgressBar::hidden();

        let result = dispatch("host", track(probes, &bar), 3, Duration::from_millis(100))
            .await
            .unwrap();

        assert_eq!(bar.position(), 3);
        assert_eq!(result.success_keys().collect::<Vec<_>>(), ["fast"]);
        assert_eq!(result.timed_out(), 1);
    }
}
