mod fixtures;

use fhub_kernel::prelude::*;
use fixtures::{Hook, Journal, Recorder, ServeMode, boxed, fast_runner_config, recorders};
use std::time::Duration;

fn runner(features: Vec<Box<dyn Feature>>) -> Runner {
    Registry::build(features, &ConfigDocument::new())
        .expect("registry builds")
        .into_runner(fast_runner_config())
}

/// Runs until every feature started, then requests a stop.
async fn run_to_completion(runner: Runner) -> Result<RunReport, LifecycleError> {
    let mut lifecycle = runner.lifecycle();
    runner
        .run_until(async move {
            lifecycle.ready().await;
        })
        .await
}

#[tokio::test]
async fn normal_run_starts_in_order_and_stops_in_reverse() {
    let journal = Journal::new();
    let runner = runner(boxed(recorders(&["a", "b", "c"], &journal)));
    let lifecycle = runner.lifecycle();
    assert_eq!(runner.state(), LifecycleState::NotStarted);

    let report = run_to_completion(runner).await.expect("clean run");

    assert_eq!(
        journal.calls(),
        [
            "a.init",
            "b.init",
            "c.init",
            "a.on_startup",
            "b.on_startup",
            "c.on_startup",
            "c.on_shutdown",
            "b.on_shutdown",
            "a.on_shutdown",
        ]
    );
    assert_eq!(report, RunReport { reason: StopReason::Requested, interrupted: false, started: 3, server_abandoned: false });
    assert_eq!(lifecycle.current(), LifecycleState::Stopped);
}

#[tokio::test]
async fn startup_failure_rolls_back_started_features_only() {
    let journal = Journal::new();
    let features = vec![
        Recorder::new("A", &journal).boxed(),
        Recorder::new("B", &journal).boxed(),
        Recorder::new("C", &journal).failing(Hook::Startup).boxed(),
    ];
    let runner = runner(features);
    let mut lifecycle = runner.lifecycle();

    let err = runner.run_until(std::future::pending()).await.expect_err("C fails to start");

    assert_eq!(
        journal.calls(),
        [
            "A.init",
            "B.init",
            "C.init",
            "A.on_startup",
            "B.on_startup",
            "C.on_startup",
            "B.on_shutdown",
            "A.on_shutdown",
        ]
    );
    assert!(matches!(err, LifecycleError::Startup { ref feature, .. } if feature == "C"));
    assert!(!lifecycle.ready().await, "runner never reached Running");
    assert_eq!(lifecycle.current(), LifecycleState::Stopped);
}

#[tokio::test]
async fn rollback_swallows_shutdown_errors() {
    let journal = Journal::new();
    let features = vec![
        Recorder::new("a", &journal).boxed(),
        Recorder::new("b", &journal).failing(Hook::Shutdown).boxed(),
        Recorder::new("c", &journal).failing(Hook::Startup).boxed(),
    ];

    let err = runner(features).run_until(std::future::pending()).await.expect_err("c fails");

    assert!(matches!(err, LifecycleError::Startup { ref feature, .. } if feature == "c"));
    assert_eq!(journal.calls()[5..], ["c.on_startup", "b.on_shutdown", "a.on_shutdown"]);
}

#[tokio::test]
async fn failing_shutdown_does_not_stop_the_sweep() {
    let journal = Journal::new();
    let features = vec![
        Recorder::new("a", &journal).boxed(),
        Recorder::new("b", &journal).failing(Hook::Shutdown).boxed(),
        Recorder::new("c", &journal).boxed(),
    ];
    let runner = runner(features);
    let lifecycle = runner.lifecycle();

    let err = run_to_completion(runner).await.expect_err("b fails to stop");

    assert_eq!(journal.calls()[6..], ["c.on_shutdown", "b.on_shutdown", "a.on_shutdown"]);
    match err {
        LifecycleError::Shutdown { failures, .. } => {
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].feature, "b");
            assert!(matches!(failures[0].cause, ShutdownCause::Failed(_)));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(lifecycle.current(), LifecycleState::Stopped);
}

#[tokio::test]
async fn slow_shutdown_times_out_and_sweep_continues() {
    let journal = Journal::new();
    let features = vec![
        Recorder::new("a", &journal).boxed(),
        Recorder::new("b", &journal).slow_shutdown(Duration::from_secs(30)).boxed(),
        Recorder::new("c", &journal).failing(Hook::Shutdown).boxed(),
    ];

    let err = run_to_completion(runner(features)).await.expect_err("shutdown is not clean");

    assert_eq!(journal.calls()[6..], ["c.on_shutdown", "b.on_shutdown", "a.on_shutdown"]);
    let LifecycleError::Shutdown { failures, .. } = err else {
        panic!("expected a shutdown error");
    };
    let features: Vec<_> = failures.iter().map(|f| f.feature.as_str()).collect();
    assert_eq!(features, ["c", "b"]);
    assert!(matches!(failures[1].cause, ShutdownCause::TimedOut(t) if t == Duration::from_millis(200)));
}

#[tokio::test]
async fn per_feature_timeout_override_is_honoured() {
    let journal = Journal::new();
    let features = vec![
        Recorder::new("slow", &journal)
            .slow_shutdown(Duration::from_millis(300))
            .shutdown_timeout_override(Duration::from_secs(5))
            .boxed(),
    ];

    let report = run_to_completion(runner(features)).await.expect("override leaves room");
    assert_eq!(report.started, 1);
}

#[tokio::test]
async fn stop_during_startup_finishes_current_feature_then_unwinds() {
    let journal = Journal::new();
    let features = vec![
        Recorder::new("a", &journal).boxed(),
        Recorder::new("b", &journal).stopping_during_startup().boxed(),
        Recorder::new("c", &journal).boxed(),
    ];
    let runner = runner(features);
    let mut lifecycle = runner.lifecycle();

    let report = runner.run_until(std::future::pending()).await.expect("interrupted run is clean");

    assert_eq!(
        journal.calls(),
        ["a.init", "b.init", "c.init", "a.on_startup", "b.on_startup", "b.on_shutdown", "a.on_shutdown"]
    );
    assert_eq!(report, RunReport { reason: StopReason::Requested, interrupted: true, started: 2, server_abandoned: false });
    assert!(!lifecycle.ready().await);
}

#[tokio::test]
async fn stop_before_run_starts_nothing() {
    let journal = Journal::new();
    let runner = runner(boxed(recorders(&["a"], &journal)));
    runner.stop_handle().stop(StopReason::Requested);

    let report = runner.run_until(std::future::pending()).await.expect("clean");

    assert_eq!(journal.calls(), ["a.init"]);
    assert!(report.interrupted);
    assert_eq!(report.started, 0);
}

#[tokio::test]
async fn server_return_triggers_shutdown() {
    let journal = Journal::new();
    let features = vec![
        Recorder::new("db", &journal).boxed(),
        Recorder::new("http", &journal).serving(ServeMode::ReturnAtOnce).boxed(),
    ];

    let report = runner(features).run_until(std::future::pending()).await.expect("clean run");

    assert_eq!(report.reason, StopReason::ServerExited);
    assert_eq!(journal.calls()[4..], ["http.serve", "http.on_shutdown", "db.on_shutdown"]);
}

#[tokio::test]
async fn server_is_stopped_by_external_trigger() {
    let journal = Journal::new();
    let features = vec![Recorder::new("http", &journal).serving(ServeMode::UntilStop).boxed()];

    let report = run_to_completion(runner(features)).await.expect("clean run");

    assert_eq!(report.reason, StopReason::Requested);
    assert_eq!(journal.calls(), ["http.init", "http.on_startup", "http.serve", "http.on_shutdown"]);
}

#[tokio::test]
async fn server_failure_is_reported_after_clean_shutdown() {
    let journal = Journal::new();
    let features = vec![
        Recorder::new("db", &journal).boxed(),
        Recorder::new("http", &journal).serving(ServeMode::Fail).boxed(),
    ];

    let err = runner(features).run_until(std::future::pending()).await.expect_err("server failed");

    assert!(matches!(err, LifecycleError::Serve { ref feature, .. } if feature == "http"));
    assert_eq!(journal.calls().last().map(String::as_str), Some("db.on_shutdown"));
}

#[tokio::test]
async fn stubborn_server_is_dropped_after_grace() {
    let journal = Journal::new();
    let features = vec![Recorder::new("http", &journal).serving(ServeMode::IgnoreStop).boxed()];

    let report = run_to_completion(runner(features)).await.expect("grace expiry is not an error");

    assert_eq!(report.reason, StopReason::Requested);
    assert!(report.server_abandoned);
    assert_eq!(journal.calls().last().map(String::as_str), Some("http.on_shutdown"));
}

#[tokio::test]
async fn draining_server_is_not_abandoned() {
    let journal = Journal::new();
    let features = vec![Recorder::new("http", &journal).serving(ServeMode::UntilStop).boxed()];

    let report = run_to_completion(runner(features)).await.expect("clean run");

    assert!(!report.server_abandoned);
}

#[tokio::test]
async fn shutdown_signal_stops_a_running_server() {
    let journal = Journal::new();
    let features = vec![
        Recorder::new("db", &journal).boxed(),
        Recorder::new("http", &journal).serving(ServeMode::UntilStop).boxed(),
    ];
    let runner = runner(features);
    let mut lifecycle = runner.lifecycle();

    let report = runner
        .run_on_signal(async move {
            lifecycle.ready().await;
            Ok(())
        })
        .await
        .expect("clean run");

    assert_eq!(report.reason, StopReason::Signal);
    assert_eq!(report.started, 2);
    assert_eq!(journal.calls()[4..], ["http.serve", "http.on_shutdown", "db.on_shutdown"]);
}

#[tokio::test]
async fn broken_signal_listener_keeps_the_runner_alive() {
    let journal = Journal::new();
    let registry = Registry::builder().feature(Recorder::new("a", &journal)).build().expect("registry builds");
    let handle = registry.stop_handle();
    let runner = registry.into_runner(fast_runner_config());
    let mut lifecycle = runner.lifecycle();
    let run = tokio::spawn(runner.run_on_signal(async { Err(std::io::Error::other("no signal support")) }));

    assert!(lifecycle.ready().await);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(lifecycle.current(), LifecycleState::Running);
    assert!(handle.stop(StopReason::Requested));

    let report = run.await.expect("join").expect("clean run");
    assert_eq!(report.reason, StopReason::Requested);
}

#[tokio::test]
async fn background_tasks_are_aborted_after_their_feature_stops() {
    let journal = Journal::new();
    let features = vec![
        Recorder::new("a", &journal).with_idle_task().boxed(),
        Recorder::new("b", &journal).boxed(),
    ];

    run_to_completion(runner(features)).await.expect("clean run");

    assert_eq!(journal.calls()[4..], ["b.on_shutdown", "a.on_shutdown", "a.task_dropped"]);
}

#[tokio::test]
async fn failing_critical_task_stops_the_runner() {
    let journal = Journal::new();
    let features = vec![Recorder::new("worker", &journal).with_failing_critical_task().boxed()];

    let report = runner(features).run_until(std::future::pending()).await.expect("clean shutdown");

    assert_eq!(
        report.reason,
        StopReason::TaskFailed { feature: "worker".to_owned(), task: "ticker".to_owned() }
    );
    assert_eq!(journal.calls().last().map(String::as_str), Some("worker.on_shutdown"));
}

#[tokio::test]
async fn bindings_published_on_startup_reach_later_features() {
    let journal = Journal::new();
    let features = vec![
        Recorder::new("a", &journal).publishing(Phase::Startup).boxed(),
        Recorder::new("b", &journal).consuming(Phase::Startup).boxed(),
    ];

    run_to_completion(runner(features)).await.expect("clean run");
}

#[tokio::test]
async fn missing_binding_on_startup_is_a_startup_error() {
    let journal = Journal::new();
    let features = vec![
        Recorder::new("b", &journal).consuming(Phase::Startup).boxed(),
        Recorder::new("a", &journal).publishing(Phase::Startup).boxed(),
    ];

    let err = runner(features).run_until(std::future::pending()).await.expect_err("lookup fails");

    assert!(matches!(
        err,
        LifecycleError::Startup { ref feature, source: FeatureError::BindingNotFound { .. }, .. } if feature == "b"
    ));
    assert_eq!(journal.calls(), ["b.init", "a.init", "b.on_startup"]);
}

#[tokio::test]
async fn registry_stop_handle_stops_spawned_runner() {
    let journal = Journal::new();
    let registry = Registry::builder().feature(Recorder::new("a", &journal)).build().expect("registry builds");
    assert_eq!(registry.lifecycle().current(), LifecycleState::NotStarted);

    let handle = registry.stop_handle();
    let runner = registry.into_runner(fast_runner_config());
    let mut lifecycle = runner.lifecycle();
    let run = tokio::spawn(runner.run_until(std::future::pending()));

    assert!(lifecycle.ready().await);
    assert!(handle.stop(StopReason::Signal));

    let report = run.await.expect("join").expect("clean run");
    assert_eq!(report.reason, StopReason::Signal);
    assert_eq!(lifecycle.current(), LifecycleState::Stopped);
}
