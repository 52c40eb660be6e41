//! Provides functions to turn address arguments into scan targets.

use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use cidr_utils::cidr::IpCidr;
use futures::{stream, StreamExt};
use hickory_resolver::{
    config::{NameServerConfig, Protocol, ResolverConfig, ResolverOpts},
    TokioAsyncResolver,
};
use itertools::Itertools;
use log::debug;
use tokio::{fs, io};

use crate::warning;

/// Parses the strings into IP addresses, in argument order, without duplicates.
///
/// Entries that resolve to nothing are reported and skipped.
///
/// ```rust
/// # use fanprobe::address::parse_addresses;
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let ips = parse_addresses(&["192.168.0.0/30".to_owned()], None, true, true).await;
/// assert_eq!(ips.len(), 4);
/// # }
/// ```
pub async fn parse_addresses(
    addresses: &[String],
    resolver: Option<&str>,
    greppable: bool,
    accessible: bool,
) -> Vec<IpAddr> {
    let backup_resolver = &get_resolver(resolver).await;

    stream::iter(addresses)
        .map(|address| async move { (address, parse_address(address, backup_resolver).await) })
        .buffered(10)
        .filter_map(|(address, ips)| async move {
            if ips.is_empty() {
                warning!(
                    format!("Host {address:?} could not be resolved."),
                    greppable,
                    accessible
                );
                None
            } else {
                Some(stream::iter(ips))
            }
        })
        .flatten()
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .unique()
        .collect()
}

/// Given a string, parse it as an IP address, a CIDR, or a host name.
pub async fn parse_address(address: &str, resolver: &TokioAsyncResolver) -> Vec<IpAddr> {
    match IpCidr::from_str(address) {
        Ok(cidr) => cidr.iter().map(|c| c.address()).collect(),
        Err(_) => resolve_ips_from_host(address, resolver).await,
    }
}

/// Uses the system resolver first and the backup resolver second.
async fn resolve_ips_from_host(source: &str, backup_resolver: &TokioAsyncResolver) -> Vec<IpAddr> {
    if let Ok(addrs) = tokio::net::lookup_host((source, 80)).await {
        addrs.map(|x| x.ip()).unique().collect()
    } else if let Ok(addrs) = backup_resolver.lookup_ip(source).await {
        addrs.iter().unique().collect()
    } else {
        debug!("No resolver knows {source}");
        Vec::new()
    }
}

/// Derive a DNS resolver.
///
/// 1. if the `resolver` parameter has been set:
///     1. assume the parameter is a path and attempt to read IPs.
///     2. parse the input as a comma-separated list of IPs.
/// 2. if `resolver` is not set:
///    1. attempt to derive a resolver from the system config. (e.g.
///       `/etc/resolv.conf` on *nix).
///    2. finally, build a CloudFlare-based resolver.
async fn get_resolver(resolver: Option<&str>) -> TokioAsyncResolver {
    match resolver {
        Some(r) => {
            let mut config = ResolverConfig::new();
            let resolver_ips = match read_resolver_from_file(r).await {
                Ok(ips) => ips,
                Err(_) => r
                    .split(',')
                    .filter_map(|r| IpAddr::from_str(r.trim()).ok())
                    .collect(),
            };
            for ip in resolver_ips {
                config.add_name_server(NameServerConfig::new(
                    SocketAddr::new(ip, 53),
                    Protocol::Udp,
                ));
            }
            TokioAsyncResolver::tokio(config, ResolverOpts::default())
        }
        None => TokioAsyncResolver::tokio_from_system_conf().unwrap_or_else(|_| {
            TokioAsyncResolver::tokio(ResolverConfig::cloudflare_tls(), ResolverOpts::default())
        }),
    }
}

/// Reads one resolver IP per line.
async fn read_resolver_from_file(path: &str) -> io::Result<Vec<IpAddr>> {
    let ips = fs::read_to_string(path)
        .await?
        .lines()
        .filter_map(|line| IpAddr::from_str(line.trim()).ok())
        .collect();

    Ok(ips)
}
