//! The unit of work the dispatcher runs: a keyed, immutable check.
use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// What a single check reported about the target.
///
/// A check that completes with `success == false` is an ordinary negative
/// answer (port closed, profile missing), not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub success: bool,
    pub payload: Option<String>,
}

impl Observation {
    /// Positive answer carrying a payload, e.g. a confirmed profile URL.
    pub fn hit(payload: impl Into<String>) -> Self {
        Self {
            success: true,
            payload: Some(payload.into()),
        }
    }

    /// Positive answer with nothing else to say.
    pub const fn hit_bare() -> Self {
        Self {
            success: true,
            payload: None,
        }
    }

    pub const fn miss() -> Self {
        Self {
            success: false,
            payload: None,
        }
    }
}

/// Something that can be checked against a target within a deadline.
///
/// The `timeout` is informational: the dispatcher enforces it regardless,
/// but checks may hand it to their own I/O (e.g. an HTTP client timeout).
/// Returning `Err` marks the probe as faulted; it never aborts the run.
#[async_trait]
pub trait Check: Send + Sync {
    async fn check(&self, target: &str, timeout: Duration) -> anyhow::Result<Observation>;
}

#[async_trait]
impl<F, Fut> Check for F
where
    F: Fn(String, Duration) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Observation>> + Send + 'static,
{
    async fn check(&self, target: &str, timeout: Duration) -> anyhow::Result<Observation> {
        (self)(target.to_owned(), timeout).await
    }
}

/// A keyed check. Cloning is cheap and shares the underlying check.
#[derive(Clone)]
pub struct Probe {
    key: String,
    check: Arc<dyn Check>,
}

impl Probe {
    pub fn new(key: impl Into<String>, check: impl Check + 'static) -> Self {
        Self {
            key: key.into(),
            check: Arc::new(check),
        }
    }

    /// Builds a probe from an async closure.
    ///
    /// ```rust
    /// use fanprobe::probe::{Observation, Probe};
    ///
    /// let probe = Probe::from_fn("echo", |target, _timeout| async move {
    ///     Ok(Observation::hit(target))
    /// });
    /// assert_eq!(probe.key(), "echo");
    /// ```
    pub fn from_fn<F, Fut>(key: impl Into<String>, f: F) -> Self
    where
        F: Fn(String, Duration) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Observation>> + Send + 'static,
    {
        Self::new(key, f)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub(crate) fn check(&self) -> Arc<dyn Check> {
        Arc::clone(&self.check)
    }
}

impl fmt::Debug for Probe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Probe").field("key", &self.key).finish_non_exhaustive()
    }
}
