// tests/chain_ordering.rs

use std::sync::Arc;
use std::time::Duration;

use taskchain::{CancelSignal, ChainError, TaskChain, UnitState};
use taskchain_test_utils::recorder::{Gate, Recorder};
use taskchain_test_utils::{init_tracing, with_timeout};

const HOLD: Duration = Duration::from_millis(20);

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn sequential_actions_run_in_submission_order() {
    init_tracing();
    let chain = TaskChain::new().unwrap();
    let rec = Recorder::new();

    let names = ["s0", "s1", "s2", "s3", "s4"];
    let handles: Vec<_> = names
        .iter()
        .map(|n| chain.submit_sequential(rec.blocking(n, HOLD), CancelSignal::none()))
        .collect();

    for h in &handles {
        assert_eq!(with_timeout(h.wait()).await, UnitState::Completed);
    }

    assert_eq!(rec.started(), names);
    for pair in names.windows(2) {
        assert!(
            rec.finished_before_started(pair[0], pair[1]),
            "{} must finish before {} starts: {:?}",
            pair[0],
            pair[1],
            rec.events()
        );
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn sequential_then_cohort_then_sequential() {
    init_tracing();
    let chain = TaskChain::new().unwrap();
    let rec = Recorder::new();
    let gate = Gate::new();

    let a = chain.submit_sequential(rec.blocking("A", HOLD), CancelSignal::none());
    let b = chain.submit_concurrent_async(rec.gated("B", &gate), CancelSignal::none());
    let c = chain.submit_concurrent_async(rec.gated("C", &gate), CancelSignal::none());
    let d = chain.submit_sequential(rec.blocking("D", HOLD), CancelSignal::none());

    // B and C are both in flight at the same time, and only after A.
    with_timeout(rec.wait_for_start("B")).await;
    with_timeout(rec.wait_for_start("C")).await;
    assert_eq!(a.state(), UnitState::Completed);
    assert!(rec.finished_before_started("A", "B"));
    assert!(rec.finished_before_started("A", "C"));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!rec.has_started("D"), "D must wait for the cohort");
    assert_eq!(d.state(), UnitState::Pending);

    gate.open();
    for h in [&b, &c, &d] {
        assert_eq!(with_timeout(h.wait()).await, UnitState::Completed);
    }
    assert!(rec.finished_before_started("B", "D"));
    assert!(rec.finished_before_started("C", "D"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn cohort_members_are_released_together() {
    init_tracing();
    let chain = TaskChain::new().unwrap();
    let gate = Gate::new();
    let rec = Recorder::new();

    // Hold the cohort back behind a sequential action.
    chain.submit_sequential_async(rec.gated("head", &gate), CancelSignal::none());

    // Each member only finishes once all K are running at once.
    const K: usize = 4;
    let barrier = Arc::new(tokio::sync::Barrier::new(K));
    let members: Vec<_> = (0..K)
        .map(|_| {
            let barrier = Arc::clone(&barrier);
            chain.submit_concurrent_async(
                async move {
                    barrier.wait().await;
                },
                CancelSignal::none(),
            )
        })
        .collect();

    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(members.iter().all(|m| m.state() == UnitState::Pending));

    gate.open();
    for m in &members {
        assert_eq!(with_timeout(m.wait()).await, UnitState::Completed);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn cohort_after_sequential_waits_for_it() {
    init_tracing();
    let chain = TaskChain::new().unwrap();
    let rec = Recorder::new();
    let gate = Gate::new();

    let s = chain.submit_sequential_async(rec.gated("S", &gate), CancelSignal::none());
    let x = chain.submit_concurrent(rec.blocking("X", HOLD), CancelSignal::none());

    with_timeout(rec.wait_for_start("S")).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!rec.has_started("X"));

    gate.open();
    assert_eq!(with_timeout(s.wait()).await, UnitState::Completed);
    assert_eq!(with_timeout(x.wait()).await, UnitState::Completed);
    assert!(rec.finished_before_started("S", "X"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn fresh_chain_runs_concurrent_submissions() {
    init_tracing();
    let chain = TaskChain::new().unwrap();
    let rec = Recorder::new();

    let first = chain.submit_concurrent(rec.blocking("p", HOLD), CancelSignal::none());
    let second = chain.submit_concurrent(rec.blocking("q", HOLD), CancelSignal::none());

    assert_eq!(with_timeout(first.wait()).await, UnitState::Completed);
    assert_eq!(with_timeout(second.wait()).await, UnitState::Completed);

    let mut started = rec.started();
    started.sort();
    assert_eq!(started, ["p", "q"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn drained_groups_are_removed() {
    init_tracing();
    let chain = TaskChain::new().unwrap();
    let rec = Recorder::new();

    chain.submit_sequential(rec.blocking("a", HOLD), CancelSignal::none());
    chain.submit_concurrent(rec.blocking("b", HOLD), CancelSignal::none());
    chain.submit_concurrent(rec.blocking("c", HOLD), CancelSignal::none());
    let last = chain.submit_sequential(rec.blocking("d", HOLD), CancelSignal::none());

    // seed + a + {b, c} + d
    assert!(chain.group_count() <= 4);
    assert_eq!(with_timeout(last.wait()).await, UnitState::Completed);

    // Only the last group stays behind as the anchor for future submissions.
    assert_eq!(chain.group_count(), 1);
}

#[test]
fn submissions_from_plain_threads_use_the_bound_runtime() {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap();
    let chain = Arc::new(TaskChain::with_handle(rt.handle().clone()));
    let rec = Recorder::new();

    let submitter = {
        let chain = Arc::clone(&chain);
        let rec = rec.clone();
        std::thread::spawn(move || {
            vec![
                chain.submit_sequential(rec.blocking("t1", HOLD), CancelSignal::none()),
                chain.submit_sequential(rec.blocking("t2", HOLD), CancelSignal::none()),
            ]
        })
    };
    let handles = submitter.join().unwrap();

    rt.block_on(async {
        for h in &handles {
            assert_eq!(with_timeout(h.wait()).await, UnitState::Completed);
        }
    });
    assert!(rec.finished_before_started("t1", "t2"));
}

#[test]
fn new_outside_runtime_is_an_error() {
    let err = TaskChain::new().unwrap_err();
    assert!(matches!(err, ChainError::NoRuntime));
}
