//! fanprobe command line entry point.

use anyhow::{bail, Context};
use chrono::Local;
use fanprobe::address::parse_addresses;
use fanprobe::dispatcher::Dispatcher;
use fanprobe::input::{Command, Config, Opts, PortArgs, UsernameArgs};
use fanprobe::limits::{adjust_ulimit_size, infer_concurrency};
use fanprobe::port_strategy::PortStrategy;
use fanprobe::probe::Probe;
use fanprobe::probes::{build_client, port_probes, username_probes};
use fanprobe::report::Report;
use fanprobe::tui::{progress_bar, track};
use fanprobe::{detail, output, warning};
use indicatif::ProgressBar;
use log::debug;
use std::time::Instant;

#[cfg(not(tarpaulin_include))]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let mut opts: Opts = Opts::read();
    let config = Config::read(opts.config_path.clone())?;
    opts.merge(&config);

    debug!("Main() `opts` arguments are {opts:?}");

    match opts.command.clone() {
        Command::Ports(args) => run_ports(&opts, &args).await,
        Command::Username(args) => run_username(&opts, &args).await,
    }
}

#[cfg(not(tarpaulin_include))]
async fn run_ports(opts: &Opts, args: &PortArgs) -> anyhow::Result<()> {
    let quiet = opts.quiet();
    let ips = parse_addresses(
        &args.addresses,
        opts.resolver.as_deref(),
        quiet,
        opts.accessible,
    )
    .await;

    if ips.is_empty() {
        bail!("Cannot resolve any of {:?}", args.addresses);
    }

    let ports = args.ports();
    if ports.is_empty() {
        bail!("Every port was excluded, nothing to scan");
    }
    let strategy = PortStrategy::pick(ports, args.scan_order());

    let soft_limit = adjust_ulimit_size(opts.ulimit, quiet, opts.accessible);
    let (concurrency, lowered) = infer_concurrency(opts.concurrency(), soft_limit);
    if lowered {
        warning!(
            format!(
                "File limit is lower than the requested concurrency, using {concurrency}. \
                 Consider upping with --ulimit."
            ),
            quiet,
            opts.accessible
        );
    }

    let mut reports = Vec::new();
    for ip in ips {
        let target = ip.to_string();
        let bar = bar_for(opts, strategy.order().len(), &target);
        let probes = port_probes(strategy.order(), quiet, opts.accessible, bar.as_ref());
        let report = run(opts, &target, probes, concurrency, "ports", bar).await?;

        if opts.json {
            reports.push(report);
        } else if opts.greppable {
            println!("{}", report.greppable_ports());
        } else {
            output!(report.render_ports(opts.accessible), false, opts.accessible);
        }
    }

    if opts.json {
        println!("{}", Report::many_to_json(&reports)?);
    }

    Ok(())
}

#[cfg(not(tarpaulin_include))]
async fn run_username(opts: &Opts, args: &UsernameArgs) -> anyhow::Result<()> {
    let client = build_client(opts.timeout()).context("building the HTTP client")?;
    let probes = username_probes(&args.sites(), &client);
    let bar = bar_for(opts, probes.len(), &args.username);
    let report = run(opts, &args.username, probes, opts.concurrency(), "sites", bar).await?;

    if opts.json {
        println!("{}", report.to_json()?);
    } else if opts.greppable {
        println!("{}", report.greppable_sites());
    } else {
        output!(report.render_sites(opts.accessible), false, opts.accessible);
    }

    Ok(())
}

/// A progress bar unless the output has to stay clean.
#[cfg(not(tarpaulin_include))]
fn bar_for(opts: &Opts, len: usize, target: &str) -> Option<ProgressBar> {
    (!opts.quiet() && !opts.accessible).then(|| progress_bar(len, target))
}

/// Shared part of both subcommands: progress tracking, dispatch, timing.
#[cfg(not(tarpaulin_include))]
async fn run(
    opts: &Opts,
    target: &str,
    probes: Vec<Probe>,
    concurrency: usize,
    noun: &str,
    bar: Option<ProgressBar>,
) -> anyhow::Result<Report> {
    let quiet = opts.quiet();
    let announce = || {
        detail!(
            format!(
                "Probing {} {noun} of {target}, {concurrency} at a time, {}ms timeout",
                probes.len(),
                opts.timeout().as_millis()
            ),
            quiet,
            opts.accessible
        );
    };
    match &bar {
        Some(bar) => bar.suspend(announce),
        None => announce(),
    }

    let probes = match &bar {
        Some(bar) => track(probes, bar),
        None => probes,
    };

    let dispatcher = Dispatcher::new(target, probes, concurrency, opts.timeout())?;
    let started = Local::now();
    let clock = Instant::now();
    let result = dispatcher.run().await;
    let elapsed = clock.elapsed();

    if let Some(bar) = bar {
        bar.finish_and_clear();
    }

    Ok(Report::new(target, started, elapsed, result))
}
