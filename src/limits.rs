//! Keeps the number of simultaneous sockets under the open file limit.
use crate::{detail, warning};

/// File descriptors kept free for stdio, the resolver and the runtime.
const RESERVED_DESCRIPTORS: u64 = 100;

/// Raises the soft `RLIMIT_NOFILE` when asked to and returns the soft limit
/// in force afterwards, or `None` when it cannot be read.
#[cfg(unix)]
pub fn adjust_ulimit_size(ulimit: Option<u64>, greppable: bool, accessible: bool) -> Option<u64> {
    use rlimit::Resource;

    if let Some(limit) = ulimit {
        if Resource::NOFILE.set(limit, limit).is_ok() {
            detail!(
                format!("Automatically increasing ulimit value to {limit}."),
                greppable,
                accessible
            );
        } else {
            warning!("ERROR. Failed to set ulimit value.", greppable, accessible);
        }
    }

    Resource::NOFILE.get().ok().map(|(soft, _)| soft)
}

#[cfg(not(unix))]
pub fn adjust_ulimit_size(
    _ulimit: Option<u64>,
    _greppable: bool,
    _accessible: bool,
) -> Option<u64> {
    None
}

/// Lowers `requested` so that it fits in `soft_limit` descriptors.
/// Returns the concurrency to use and whether it was lowered.
pub fn infer_concurrency(requested: usize, soft_limit: Option<u64>) -> (usize, bool) {
    let Some(soft_limit) = soft_limit else {
        return (requested, false);
    };

    let available = if soft_limit > RESERVED_DESCRIPTORS * 2 {
        soft_limit - RESERVED_DESCRIPTORS
    } else {
        soft_limit / 2
    };
    let available = usize::try_from(available).unwrap_or(usize::MAX).max(1);

    if requested > available {
        (available, true)
    } else {
        (requested, false)
    }
}
