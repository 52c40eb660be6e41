//! This crate exposes the internal functionality of the `fanprobe` tool.
//!
//! fanprobe runs many small, independent probes against one target with a
//! bounded number in flight: which ports of a host accept connections, which
//! sites have a profile page for a username.
//!
//! ## Architecture Overview
//!
//! The core behaviour is managed by
//! [`Dispatcher`](crate::dispatcher::Dispatcher), which takes an ordered list
//! of [`Probe`](crate::probe::Probe)s. A run goes like this:
//!
//! 1. **Validation**: empty probe lists, a zero concurrency limit or a zero
//!    timeout are rejected before anything runs
//! 2. **Fan-out**: at most `concurrency` probes run at once, each on its own
//!    task and under its own deadline
//! 3. **Collection**: every probe ends succeeded or failed (rejected, timed
//!    out, faulted); a failing probe never stops its siblings
//! 4. **Assembly**: outcomes are put back in input order
//!
//! The [`probes`] module holds the concrete TCP port and username checks the
//! command line tool feeds to the dispatcher.
//!
//! ## Basic Usage Example
//!
//! ```rust
//! use fanprobe::dispatcher::Dispatcher;
//! use fanprobe::probes::port_probes;
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let probes = port_probes(&[22, 80, 443], true, true, None);
//! let dispatcher = Dispatcher::new("127.0.0.1", probes, 10, Duration::from_millis(200))?;
//!
//! let result = dispatcher.run().await;
//! assert_eq!(result.total_attempted, 3);
//! for success in &result.successes {
//!     println!("{} is open", success.key);
//! }
//! # Ok(())
//! # }
//! ```
#![allow(clippy::needless_doctest_main)]

pub mod probe;

pub mod dispatcher;

pub mod probes;

pub mod input;

pub mod port_strategy;

pub mod address;

pub mod limits;

pub mod report;

pub mod tui;
