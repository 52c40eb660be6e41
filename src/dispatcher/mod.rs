//! Core functionality for bounded concurrent dispatch.
use crate::probe::{Check, Probe};
use log::debug;

mod outcome;
pub use outcome::{DispatchResult, Failure, FailureReason, Success};
use outcome::Outcome;

use futures::{stream, StreamExt};
use std::{
    any::Any,
    future::Future,
    num::NonZeroUsize,
    pin::Pin,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    task::{Context, Poll},
    time::Duration,
};
use thiserror::Error;
use tokio::{
    task::{JoinError, JoinHandle},
    time,
};

/// Raised before any probe runs when the run cannot be set up.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(&'static str),
}

/// Runs a list of probes against one target.
///
/// target is handed unchanged to every probe.
/// concurrency is how many probes may be running at the same time.
/// timeout is the deadline of every single probe; a probe that misses it
/// counts as failed and its future is dropped.
#[derive(Debug)]
pub struct Dispatcher {
    target: Arc<str>,
    probes: Box<[Probe]>,
    concurrency: NonZeroUsize,
    timeout: Duration,
}

impl Dispatcher {
    pub fn new(
        target: &str,
        probes: Vec<Probe>,
        concurrency: usize,
        timeout: Duration,
    ) -> Result<Self, DispatchError> {
        if probes.is_empty() {
            return Err(DispatchError::InvalidConfiguration(
                "at least one probe is required",
            ));
        }
        let Some(concurrency) = NonZeroUsize::new(concurrency) else {
            return Err(DispatchError::InvalidConfiguration(
                "concurrency limit must be at least 1",
            ));
        };
        if timeout.is_zero() {
            return Err(DispatchError::InvalidConfiguration(
                "per-probe timeout must be greater than zero",
            ));
        }

        Ok(Self {
            target: Arc::from(target),
            probes: probes.into_boxed_slice(),
            concurrency,
            timeout,
        })
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn len(&self) -> usize {
        self.probes.len()
    }

    /// Always false, construction rejects empty probe lists.
    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }

    /// Runs every probe to a terminal state and returns the tally.
    ///
    /// At most `concurrency` probes are in flight; when one finishes the next
    /// unstarted probe takes its place. Outcomes land in a slot addressed by
    /// the probe's input position, so successes come back in input order no
    /// matter which probe finished first.
    ///
    /// Each probe runs in its own Tokio task, so this must be awaited inside a
    /// Tokio runtime. Dropping the returned future aborts the probes still
    /// running.
    pub async fn run(&self) -> DispatchResult {
        let limit = self.concurrency.get();
        let in_flight = Arc::new(AtomicUsize::new(0));
        let mut slots: Vec<Option<Outcome>> = (0..self.probes.len()).map(|_| None).collect();

        debug!(
            "Start dispatching probes. \nTarget {}\nConcurrency {}\nTimeout {:?}\n\
             Number of probes {}",
            self.target,
            limit,
            self.timeout,
            self.probes.len()
        );

        let mut completions = stream::iter(self.probes.iter().enumerate())
            .map(|(index, probe)| {
                let check = probe.check();
                let target = Arc::clone(&self.target);
                let in_flight = Arc::clone(&in_flight);
                let deadline = self.timeout;
                async move {
                    let running = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    debug_assert!(running <= limit, "{running} probes in flight, limit {limit}");
                    let outcome = execute(check, target, deadline).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    (index, outcome)
                }
            })
            .buffer_unordered(limit);

        while let Some((index, outcome)) = completions.next().await {
            debug!("Probe {} finished: {:?}", self.probes[index].key(), outcome);
            slots[index] = Some(outcome);
        }

        let result = DispatchResult::assemble(&self.probes, slots);
        debug!(
            "Dispatch against {} done, {}/{} succeeded",
            self.target, result.total_succeeded, result.total_attempted
        );
        result
    }
}

/// Convenience wrapper: validate, run, return the tally.
///
/// ```rust
/// use fanprobe::dispatcher::dispatch;
/// use fanprobe::probe::{Observation, Probe};
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let probes = vec![
///     Probe::from_fn("even", |_, _| async { Ok(Observation::hit("2")) }),
///     Probe::from_fn("odd", |_, _| async { Ok(Observation::miss()) }),
/// ];
/// let result = dispatch("numbers", probes, 2, Duration::from_secs(1)).await.unwrap();
/// assert_eq!(result.total_attempted, 2);
/// assert_eq!(result.success_keys().collect::<Vec<_>>(), ["even"]);
/// # }
/// ```
pub async fn dispatch(
    target: &str,
    probes: Vec<Probe>,
    concurrency: usize,
    timeout: Duration,
) -> Result<DispatchResult, DispatchError> {
    let dispatcher = Dispatcher::new(target, probes, concurrency, timeout)?;
    Ok(dispatcher.run().await)
}

/// Runs one check under its deadline on a task of its own.
/// Errors and panics inside the check both come back as `Faulted`.
async fn execute(check: Arc<dyn Check>, target: Arc<str>, deadline: Duration) -> Outcome {
    let task = AbortOnDrop(tokio::spawn(async move {
        time::timeout(deadline, async move { check.check(&target, deadline).await }).await
    }));

    match task.await {
        Ok(Ok(Ok(observation))) if observation.success => Outcome::Succeeded(observation.payload),
        Ok(Ok(Ok(_))) => Outcome::Failed(FailureReason::Rejected),
        Ok(Ok(Err(e))) => Outcome::Failed(FailureReason::Faulted(format!("{e:#}"))),
        Ok(Err(_elapsed)) => Outcome::Failed(FailureReason::TimedOut),
        Err(e) => Outcome::Failed(FailureReason::Faulted(join_failure(e))),
    }
}

/// Task handle that aborts its task when dropped before completion.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Future for AbortOnDrop<T> {
    type Output = Result<T, JoinError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.0).poll(cx)
    }
}

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

fn join_failure(err: JoinError) -> String {
    match err.try_into_panic() {
        Ok(payload) => format!("probe panicked: {}", panic_message(payload.as_ref())),
        Err(_) => String::from("probe task was cancelled"),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg
    } else {
        "unknown panic payload"
    }
}
