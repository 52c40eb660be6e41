//! Concrete probe families fed to the dispatcher by the CLI.
//!
//! - [`port`]: is this TCP port accepting connections on the target host?
//! - [`username`]: does this site have a profile page for the target username?
pub mod port;
pub mod username;

pub use port::{port_probes, service_name, PortProbe, COMMON_PORTS};
pub use username::{build_client, default_sites, username_probes, Site, UsernameProbe};
