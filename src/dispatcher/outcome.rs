use crate::probe::Probe;
use serde_derive::Serialize;

/// Terminal state of a single probe, stored in its input slot.
#[derive(Debug)]
pub(super) enum Outcome {
    Succeeded(Option<String>),
    Failed(FailureReason),
}

/// Why a probe did not count as a success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FailureReason {
    /// The check completed and answered no.
    Rejected,
    /// The check did not finish before the per-probe deadline.
    TimedOut,
    /// The check returned an error or panicked.
    Faulted(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Success {
    pub key: String,
    pub payload: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub key: String,
    pub reason: FailureReason,
}

/// Everything a dispatch run found out.
///
/// `successes` and `failures` are both in the order the probes were given,
/// and together they cover every probe exactly once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchResult {
    pub successes: Vec<Success>,
    pub failures: Vec<Failure>,
    pub total_attempted: usize,
    pub total_succeeded: usize,
}

impl DispatchResult {
    pub(super) fn assemble(probes: &[Probe], slots: Vec<Option<Outcome>>) -> Self {
        let mut result = Self {
            total_attempted: probes.len(),
            ..Self::default()
        };

        for (probe, slot) in probes.iter().zip(slots) {
            let key = probe.key().to_owned();
            // unreachable in practice: every slot is written before assembly
            let outcome = slot.unwrap_or_else(|| {
                Outcome::Failed(FailureReason::Faulted(String::from("probe never completed")))
            });
            match outcome {
                Outcome::Succeeded(payload) => result.successes.push(Success { key, payload }),
                Outcome::Failed(reason) => result.failures.push(Failure { key, reason }),
            }
        }

        result.total_succeeded = result.successes.len();
        result
    }

    pub fn success_keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.successes.iter().map(|s| s.key.as_str())
    }

    pub fn timed_out(&self) -> usize {
        self.failures
            .iter()
            .filter(|f| f.reason == FailureReason::TimedOut)
            .count()
    }

    pub fn faulted(&self) -> usize {
        self.failures
            .iter()
            .filter(|f| matches!(f.reason, FailureReason::Faulted(_)))
            .count()
    }
}
