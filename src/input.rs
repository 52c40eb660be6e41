//! Provides a means to read, parse and hold configuration options for runs.
use crate::probes::{Site, COMMON_PORTS};
use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_derive::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

const LOWEST_PORT_NUMBER: u16 = 1;
const TOP_PORT_NUMBER: u16 = 65535;

const DEFAULT_PORT_CONCURRENCY: usize = 50;
const DEFAULT_PORT_TIMEOUT_MS: u64 = 3_000;
const DEFAULT_USERNAME_CONCURRENCY: usize = 10;
const DEFAULT_USERNAME_TIMEOUT_MS: u64 = 5_000;

/// Represents the order in which ports are probed.
///   - Serial keeps the order the ports were given in (ascending after parsing).
///   - Random shuffles them, results are still reported per port.
#[derive(Deserialize, Debug, ValueEnum, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanOrder {
    #[default]
    Serial,
    Random,
}

pub type Ports = Vec<u16>;

/// Parses `80,443,1-1000` style lists into a sorted, deduplicated port list.
pub fn parse_ports_and_ranges(input: &str) -> Result<Ports, String> {
    let ports = input
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| match part.split_once('-') {
            Some((start, end)) => parse_port_range(part, start, end),
            None => parse_single_port(part).map(|port| vec![port]),
        })
        .collect::<Result<Vec<_>, _>>()?
        .concat();

    checked_ports(ports)
}

/// Rejects empty lists and port 0, then sorts and deduplicates.
fn checked_ports(mut ports: Ports) -> Result<Ports, String> {
    if ports.is_empty() {
        return Err(String::from("No valid ports or ranges provided"));
    }
    if ports.contains(&0) {
        return Err(format!(
            "Port 0 must be between {LOWEST_PORT_NUMBER} and {TOP_PORT_NUMBER}"
        ));
    }

    ports.sort_unstable();
    ports.dedup();
    Ok(ports)
}

fn parse_port_range(part: &str, start: &str, end: &str) -> Result<Ports, String> {
    if end.contains('-') {
        return Err(format!(
            "Invalid range format '{part}'. Expected 'start-end'. Example: 1-1000."
        ));
    }
    let start: u16 = start
        .trim()
        .parse()
        .map_err(|_| format!("Invalid start port '{start}' in range '{part}'"))?;
    let end: u16 = end
        .trim()
        .parse()
        .map_err(|_| format!("Invalid end port '{end}' in range '{part}'"))?;

    if start > end {
        return Err(format!(
            "Start port {start} is greater than end port {end} in range '{part}'"
        ));
    }
    if start < LOWEST_PORT_NUMBER {
        return Err(format!(
            "Ports in range '{part}' must be between {LOWEST_PORT_NUMBER} and {TOP_PORT_NUMBER}"
        ));
    }

    Ok((start..=end).collect())
}

fn parse_single_port(part: &str) -> Result<u16, String> {
    let port: u16 = part
        .parse()
        .map_err(|_| format!("Invalid port number '{part}'"))?;
    if port < LOWEST_PORT_NUMBER {
        return Err(format!(
            "Port {port} must be between {LOWEST_PORT_NUMBER} and {TOP_PORT_NUMBER}"
        ));
    }
    Ok(port)
}

/// Parses `NAME=URL_TEMPLATE`; the template must contain `{}`.
pub fn parse_site(input: &str) -> Result<Site, String> {
    let Some((name, template)) = input.split_once('=') else {
        return Err(format!(
            "Invalid site '{input}'. Expected NAME=URL_TEMPLATE, \
             e.g. GitHub=https://github.com/{{}}"
        ));
    };
    let (name, template) = (name.trim(), template.trim());
    if name.is_empty() {
        return Err(format!("Site '{input}' has no name"));
    }
    if !template.contains("{}") {
        return Err(format!(
            "URL template '{template}' must contain {{}} where the username goes"
        ));
    }
    Ok(Site::new(name, template))
}

fn parse_username(input: &str) -> Result<String, String> {
    let username = input.trim();
    if username.is_empty() {
        return Err(String::from("Please enter a valid username"));
    }
    Ok(username.to_owned())
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "fanprobe",
    version = env!("CARGO_PKG_VERSION"),
    max_term_width = 120,
)]
#[allow(clippy::struct_excessive_bools)]
/// Runs many small independent probes against one target with a bounded
/// number in flight.
/// WARNING Only point this at hosts and accounts you own or may test.
pub struct Opts {
    /// How many probes may run at the same time.
    /// Defaults to 50 for port scans and 10 for username lookups.
    #[arg(short = 'b', long, global = true)]
    pub concurrency: Option<usize>,

    /// Per-probe timeout in milliseconds.
    /// Defaults to 3000 for port scans and 5000 for username lookups.
    #[arg(short, long, global = true)]
    pub timeout: Option<u64>,

    /// Greppable mode. Only output the results, no progress or decoration.
    #[arg(short, long, global = true)]
    pub greppable: bool,

    /// Accessible mode. Turns off features which negatively affect screen readers.
    #[arg(long, global = true)]
    pub accessible: bool,

    /// Print the full result as JSON.
    #[arg(long, global = true)]
    pub json: bool,

    /// Whether to ignore the configuration file or not.
    #[arg(short, long, global = true)]
    pub no_config: bool,

    /// Custom path to config file
    #[arg(short, long, global = true, value_parser)]
    pub config_path: Option<PathBuf>,

    /// Automatically ups the ULIMIT with the value you provided.
    #[arg(short, long, global = true)]
    pub ulimit: Option<u64>,

    /// A comma-delimited list or file of DNS resolvers.
    #[arg(long, global = true)]
    pub resolver: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Check which TCP ports accept connections.
    Ports(PortArgs),
    /// Look a username up on a list of sites.
    Username(UsernameArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct PortArgs {
    /// A comma-delimited list of CIDRs, IPs, or hosts to be scanned.
    #[arg(short, long, value_delimiter = ',', required = true)]
    pub addresses: Vec<String>,

    /// A list of ports and/or port ranges to be scanned.
    /// Examples: 80,443,8080 or 1-1000 or 1-1000,8080
    /// Without it the common service ports are scanned.
    #[arg(short, long, value_parser = parse_ports_and_ranges)]
    pub ports: Option<Ports>,

    /// The order in which ports are probed.
    #[arg(long, value_enum, ignore_case = true)]
    pub scan_order: Option<ScanOrder>,

    /// A list of comma separated ports to be excluded from scanning. Example: 80,443,8080.
    #[arg(short, long, value_delimiter = ',')]
    pub exclude_ports: Option<Vec<u16>>,
}

#[derive(Args, Debug, Clone)]
pub struct UsernameArgs {
    /// The username to look for.
    #[arg(value_parser = parse_username)]
    pub username: String,

    /// Extra or replacement site as NAME=URL_TEMPLATE, may be repeated.
    /// When given, only these sites are checked.
    #[arg(short, long = "site", value_parser = parse_site)]
    pub sites: Vec<Site>,
}

#[cfg(not(tarpaulin_include))]
impl Opts {
    pub fn read() -> Self {
        Self::parse()
    }

    /// Fills in values the command line left unset from the user
    /// configuration file. Flags given on the command line win.
    pub fn merge(&mut self, config: &Config) {
        if !self.no_config {
            self.merge_global(config);
            self.merge_command(config);
        }
    }

    fn merge_global(&mut self, config: &Config) {
        macro_rules! merge_flag {
            ($($field: ident),+) => {
                $(
                    if let Some(e) = config.$field {
                        self.$field |= e;
                    }
                )+
            }
        }

        macro_rules! merge_optional {
            ($($field: ident),+) => {
                $(
                    if self.$field.is_none() {
                        self.$field = config.$field.clone();
                    }
                )+
            }
        }

        merge_flag!(greppable, accessible, json);
        merge_optional!(concurrency, timeout, ulimit, resolver);
    }

    fn merge_command(&mut self, config: &Config) {
        match &mut self.command {
            Command::Ports(args) => {
                if args.ports.is_none() {
                    args.ports.clone_from(&config.ports);
                }
                if args.scan_order.is_none() {
                    args.scan_order = config.scan_order;
                }
                if args.exclude_ports.is_none() {
                    args.exclude_ports.clone_from(&config.exclude_ports);
                }
            }
            Command::Username(args) => {
                if args.sites.is_empty() {
                    if let Some(sites) = &config.sites {
                        args.sites.clone_from(sites);
                    }
                }
            }
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency.unwrap_or(match self.command {
            Command::Ports(_) => DEFAULT_PORT_CONCURRENCY,
            Command::Username(_) => DEFAULT_USERNAME_CONCURRENCY,
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout.unwrap_or(match self.command {
            Command::Ports(_) => DEFAULT_PORT_TIMEOUT_MS,
            Command::Username(_) => DEFAULT_USERNAME_TIMEOUT_MS,
        }))
    }

    /// True when nothing but the final result should reach stdout.
    pub const fn quiet(&self) -> bool {
        self.greppable || self.json
    }
}

impl PortArgs {
    /// The ports to probe, before ordering: explicit list or the common
    /// service ports, minus exclusions.
    pub fn ports(&self) -> Ports {
        let ports = self
            .ports
            .clone()
            .unwrap_or_else(|| COMMON_PORTS.iter().map(|(port, _)| *port).collect());
        match &self.exclude_ports {
            Some(excluded) => ports.into_iter().filter(|p| !excluded.contains(p)).collect(),
            None => ports,
        }
    }

    pub fn scan_order(&self) -> ScanOrder {
        self.scan_order.unwrap_or_default()
    }
}

impl UsernameArgs {
    pub fn sites(&self) -> Vec<Site> {
        if self.sites.is_empty() {
            crate::probes::default_sites()
        } else {
            self.sites.clone()
        }
    }
}

/// Struct used to deserialize the options specified within our config file.
/// These will be further merged with our command line arguments in order to
/// generate the final Opts struct.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    concurrency: Option<usize>,
    timeout: Option<u64>,
    greppable: Option<bool>,
    accessible: Option<bool>,
    json: Option<bool>,
    ulimit: Option<u64>,
    resolver: Option<String>,
    scan_order: Option<ScanOrder>,
    ports: Option<Vec<u16>>,
    exclude_ports: Option<Vec<u16>>,
    sites: Option<Vec<Site>>,
}

#[cfg(not(tarpaulin_include))]
impl Config {
    /// Reads the configuration file with TOML format and parses it into a
    /// Config struct. A missing file is an empty configuration.
    ///
    /// # Format
    ///
    /// concurrency = 100
    /// timeout = 1500
    /// scan_order = "Random"
    /// ports = [22, 80, 443]
    /// exclude_ports = [8080]
    /// sites = [{ name = "GitHub", url_template = "https://github.com/{}" }]
    ///
    pub fn read(custom_config_path: Option<PathBuf>) -> anyhow::Result<Self> {
        let Some(config_path) = custom_config_path.or_else(default_config_path) else {
            return Ok(Self::default());
        };
        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("reading configuration file {}", config_path.display()))?;
        Self::parse(&content).with_context(|| {
            format!("found an error in configuration file {}", config_path.display())
        })
    }

    /// Parses TOML content. Port lists follow the same rules as `--ports`.
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let mut config: Self = toml::from_str(content)?;
        if let Some(ports) = config.ports.take() {
            let ports = checked_ports(ports)
                .map_err(anyhow::Error::msg)
                .context("ports")?;
            config.ports = Some(ports);
        }
        if let Some(excluded) = config.exclude_ports.take() {
            config.exclude_ports = Some(if excluded.is_empty() {
                excluded
            } else {
                checked_ports(excluded)
                    .map_err(anyhow::Error::msg)
                    .context("exclude_ports")?
            });
        }
        Ok(config)
    }
}

/// Constructs default path to config toml
pub fn default_config_path() -> Option<PathBuf> {
    let mut config_path = dirs::home_dir()?;
    config_path.push(".fanprobe.toml");
    Some(config_path)
}
