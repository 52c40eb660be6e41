use fanprobe::dispatcher::{dispatch, DispatchError, FailureReason};
use fanprobe::probe::{Observation, Probe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;

fn succeed(key: &str) -> Probe {
    let payload = format!("{key}-ok");
    Probe::from_fn(key, move |_, _| {
        let payload = payload.clone();
        async move { Ok(Observation::hit(payload)) }
    })
}

fn hang(key: &str) -> Probe {
    Probe::from_fn(key, |_, _| async {
        sleep(Duration::from_secs(30)).await;
        Ok(Observation::hit_bare())
    })
}

fn slow(key: &str, millis: u64) -> Probe {
    Probe::from_fn(key, move |_, _| async move {
        sleep(Duration::from_millis(millis)).await;
        Ok(Observation::hit_bare())
    })
}

fn boom() -> anyhow::Result<Observation> {
    panic!("unhandled fault in probe")
}

/// Probes that record how many of them run at once.
fn instrumented(n: usize, current: &Arc<AtomicUsize>, peak: &Arc<AtomicUsize>) -> Vec<Probe> {
    (0..n)
        .map(|i| {
            let current = Arc::clone(current);
            let peak = Arc::clone(peak);
            Probe::from_fn(i.to_string(), move |_, _| {
                let current = Arc::clone(&current);
                let peak = Arc::clone(&peak);
                async move {
                    let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    sleep(Duration::from_millis(10)).await;
                    current.fetch_sub(1, Ordering::SeqCst);
                    Ok(if i % 3 == 0 {
                        Observation::hit_bare()
                    } else {
                        Observation::miss()
                    })
                }
            })
        })
        .collect()
}

#[tokio::test]
async fn timed_out_probe_is_skipped_between_successes() {
    let probes = vec![succeed("A"), hang("B"), succeed("C")];

    let result = dispatch("host", probes, 2, Duration::from_secs(1)).await.unwrap();

    assert_eq!(result.success_keys().collect::<Vec<_>>(), ["A", "C"]);
    assert_eq!(result.successes[0].payload.as_deref(), Some("A-ok"));
    assert_eq!(result.total_attempted, 3);
    assert_eq!(result.total_succeeded, 2);
    assert_eq!(result.failures[0].key, "B");
    assert_eq!(result.failures[0].reason, FailureReason::TimedOut);
}

#[tokio::test]
async fn empty_probe_list_is_rejected() {
    let err = dispatch("host", vec![], 4, Duration::from_secs(1)).await.unwrap_err();
    assert!(matches!(err, DispatchError::InvalidConfiguration(_)));
}

#[tokio::test]
async fn single_slot_serializes_probes() {
    let probes = (0..5).map(|i| slow(&i.to_string(), 100)).collect();

    let clock = Instant::now();
    let result = dispatch("host", probes, 1, Duration::from_secs(1)).await.unwrap();
    let elapsed = clock.elapsed();

    assert_eq!(result.total_succeeded, 5);
    assert!(elapsed >= Duration::from_millis(500), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(1500), "{elapsed:?}");
}

#[tokio::test]
async fn faulting_probe_does_not_spoil_the_batch() {
    let probes = vec![
        succeed("first"),
        Probe::from_fn("errors", |_, _| async { Err(anyhow::anyhow!("resolver exploded")) }),
        Probe::from_fn("panics", |_, _| async { boom() }),
        succeed("last"),
    ];

    let result = dispatch("host", probes, 2, Duration::from_secs(1)).await.unwrap();

    assert_eq!(result.total_attempted, 4);
    assert_eq!(result.success_keys().collect::<Vec<_>>(), ["first", "last"]);
    assert_eq!(result.faulted(), 2);
}

#[tokio::test]
async fn run_time_is_bounded_by_rounds_of_timeouts() {
    // 6 probes, 3 slots: two rounds of 200ms deadlines
    let probes = (0..6).map(|i| hang(&i.to_string())).collect();

    let clock = Instant::now();
    let result = dispatch("host", probes, 3, Duration::from_millis(200)).await.unwrap();
    let elapsed = clock.elapsed();

    assert_eq!(result.total_attempted, 6);
    assert_eq!(result.timed_out(), 6);
    assert!(elapsed >= Duration::from_millis(400), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(1400), "{elapsed:?}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn peak_concurrency_never_exceeds_the_limit() {
    for (n, limit) in [(1, 1), (10, 1), (25, 4), (40, 7), (5, 16)] {
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let result = dispatch(
            "host",
            instrumented(n, &current, &peak),
            limit,
            Duration::from_secs(2),
        )
        .await
        .unwrap();

        assert_eq!(result.total_attempted, n);
        let peak = peak.load(Ordering::SeqCst);
        assert!(peak <= limit, "peak {peak} over limit {limit}");
        assert!(peak >= 1);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn successes_are_an_ordered_subsequence_and_runs_repeat() {
    let current = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let probes = instrumented(30, &current, &peak);

    let first = dispatch("host", probes.clone(), 8, Duration::from_secs(2)).await.unwrap();
    let second = dispatch("host", probes, 8, Duration::from_secs(2)).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.total_attempted, 30);
    assert_eq!(first.successes.len() + first.failures.len(), 30);

    let indices = first
        .success_keys()
        .map(|key| key.parse::<usize>().unwrap())
        .collect::<Vec<_>>();
    assert!(indices.windows(2).all(|pair| pair[0] < pair[1]));
    assert_eq!(indices, (0..30).filter(|i| i % 3 == 0).collect::<Vec<_>>());
}
