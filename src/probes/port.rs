//! TCP connect probes, one per port.
use crate::probe::{Check, Observation, Probe};
use async_trait::async_trait;
use colored::Colorize;
use indicatif::ProgressBar;
use log::debug;
use std::fmt;
use std::time::Duration;
use tokio::{
    io::{self, AsyncWriteExt},
    net::TcpStream,
};

/// Ports worth a look when the user does not name any, with their usual service.
pub const COMMON_PORTS: [(u16, &str); 17] = [
    (21, "ftp"),
    (22, "ssh"),
    (23, "telnet"),
    (25, "smtp"),
    (53, "dns"),
    (80, "http"),
    (110, "pop3"),
    (143, "imap"),
    (443, "https"),
    (993, "imaps"),
    (995, "pop3s"),
    (1433, "mssql"),
    (3306, "mysql"),
    (3389, "rdp"),
    (5432, "postgresql"),
    (8080, "http-alt"),
    (8443, "https-alt"),
];

pub fn service_name(port: u16) -> Option<&'static str> {
    COMMON_PORTS
        .iter()
        .find(|(p, _)| *p == port)
        .map(|(_, name)| *name)
}

/// Checks a single port of whatever host the dispatcher hands in.
///
/// greppable is whether or not the probe stays silent when it finds an open port.
/// accessible turns off colours in the announcement.
/// bar, when set, is the progress bar the announcement is printed above.
#[derive(Clone)]
pub struct PortProbe {
    port: u16,
    greppable: bool,
    accessible: bool,
    bar: Option<ProgressBar>,
}

impl fmt::Debug for PortProbe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortProbe")
            .field("port", &self.port)
            .field("greppable", &self.greppable)
            .field("accessible", &self.accessible)
            .field("above_bar", &self.bar.is_some())
            .finish()
    }
}

impl PortProbe {
    pub const fn new(port: u16) -> Self {
        Self {
            port,
            greppable: true,
            accessible: false,
            bar: None,
        }
    }

    /// Print `Open host:port` as soon as the port is found.
    #[must_use]
    pub const fn announce(mut self, greppable: bool, accessible: bool) -> Self {
        self.greppable = greppable;
        self.accessible = accessible;
        self
    }

    /// Print announcements through `bar` so they do not tear its redraws.
    #[must_use]
    pub fn above(mut self, bar: &ProgressBar) -> Self {
        self.bar = Some(bar.clone());
        self
    }

    pub const fn port(&self) -> u16 {
        self.port
    }

    async fn connect(&self, host: &str) -> io::Result<TcpStream> {
        TcpStream::connect((host, self.port)).await
    }

    fn announcement(&self, socket: &str) -> Option<String> {
        if self.greppable {
            None
        } else if self.accessible {
            Some(format!("Open {socket}"))
        } else {
            Some(format!("Open {}", socket.purple()))
        }
    }

    fn fmt_port(&self, socket: &str) {
        let Some(line) = self.announcement(socket) else {
            return;
        };
        match &self.bar {
            Some(bar) => bar.println(line),
            None => println!("{line}"),
        }
    }
}

#[async_trait]
impl Check for PortProbe {
    /// A completed handshake means open. Refusals and unreachable hosts are
    /// plain negatives; running out of file descriptors is a fault, since
    /// it says nothing about the port.
    async fn check(&self, target: &str, _timeout: Duration) -> anyhow::Result<Observation> {
        match self.connect(target).await {
            Ok(tcp_stream) => {
                let socket = tcp_stream
                    .peer_addr()
                    .map_or_else(|_| format!("{target}:{}", self.port), |a| a.to_string());
                debug!("Connection was successful, shutting down stream {socket}");
                if let Err(e) = { tcp_stream }.shutdown().await {
                    debug!("Shutdown stream error {e}");
                }
                self.fmt_port(&socket);
                Ok(Observation::hit(socket))
            }
            Err(e) if e.to_string().to_lowercase().contains("too many open files") => {
                anyhow::bail!(
                    "too many open files while connecting to {target}:{}; lower the concurrency",
                    self.port
                )
            }
            Err(e) => {
                debug!("{target}:{} closed: {e}", self.port);
                Ok(Observation::miss())
            }
        }
    }
}

/// One probe per port, keyed by the port number, in the given order.
/// Announcements go above `bar` when one is drawn.
pub fn port_probes(
    ports: &[u16],
    greppable: bool,
    accessible: bool,
    bar: Option<&ProgressBar>,
) -> Vec<Probe> {
    ports
        .iter()
        .map(|&port| {
            let probe = PortProbe::new(port).announce(greppable, accessible);
            let probe = match bar {
                Some(bar) => probe.above(bar),
                None => probe,
            };
            Probe::new(port.to_string(), probe)
        })
        .collect()
}
