//! End-to-end tests for the coordinator's phase sequence.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use graceful_shutdown::lifecycle::{
    stoppable_fn, CancelCause, CloseError, Coordinator, ParticipantKind, ShutdownConfig,
    ShutdownContext,
};

mod common;
use common::{EventLog, MockParticipant};

fn config(grace: Duration, drain: Duration, force: Duration) -> ShutdownConfig {
    ShutdownConfig::default()
        .with_grace_period(grace)
        .with_drain_timeout(drain)
        .with_force_timeout(force)
}

#[tokio::test]
async fn test_concrete_scenario_completes_cleanly() {
    let log = EventLog::new();
    let starts = Arc::new(AtomicUsize::new(0));
    let completes = Arc::new(AtomicUsize::new(0));

    let (start_log, start_count) = (log.clone(), starts.clone());
    let (complete_log, complete_count) = (log.clone(), completes.clone());
    let shutdown_config = config(Duration::from_secs(1), Duration::from_secs(1), Duration::from_secs(1))
        .on_start(move || {
            start_count.fetch_add(1, Ordering::SeqCst);
            start_log.push("hook:start");
        })
        .on_complete(move |outcome| {
            assert!(outcome.is_none());
            complete_count.fetch_add(1, Ordering::SeqCst);
            complete_log.push("hook:complete");
        });

    let coordinator = Coordinator::new(shutdown_config);
    let server = MockParticipant::new("server")
        .with_delay(Duration::from_millis(10))
        .logged(&log)
        .build();
    let listener = MockParticipant::new("listener").logged(&log).build();
    let provider = MockParticipant::new("provider")
        .with_delay(Duration::from_millis(200))
        .logged(&log)
        .build();
    assert!(coordinator.register_server(server.clone()));
    assert!(coordinator.register_listener(listener.clone()));
    assert!(coordinator.register_identity_provider(provider.clone()));

    let started = Instant::now();
    coordinator.shutdown(ShutdownContext::background()).await.unwrap();
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_millis(200), "took {elapsed:?}");
    assert!(elapsed < Duration::from_millis(700), "took {elapsed:?}");
    assert_eq!(starts.load(Ordering::SeqCst), 1);
    assert_eq!(completes.load(Ordering::SeqCst), 1);
    assert_eq!(log.position("hook:start"), Some(0));
    assert_eq!(log.labels().last().map(String::as_str), Some("hook:complete"));
    assert_eq!((server.calls(), listener.calls(), provider.calls()), (1, 1, 1));
}

#[tokio::test]
async fn test_concurrent_callers_share_one_execution() {
    let coordinator = Coordinator::new(ShutdownConfig::default());
    let server = MockParticipant::new("server")
        .with_delay(Duration::from_millis(50))
        .build();
    let client = MockParticipant::new("db").failing("pool poisoned").build();
    coordinator.register_server(server.clone());
    coordinator.register_client(client.clone());

    let callers: Vec<_> = (0..5)
        .map(|_| {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.shutdown(ShutdownContext::background()).await })
        })
        .collect();

    let mut messages = Vec::new();
    for caller in callers {
        let err = caller.await.unwrap().unwrap_err();
        messages.push(err.to_string());
    }

    assert_eq!(server.calls(), 1);
    assert_eq!(client.calls(), 1);
    assert!(messages.iter().all(|message| message == &messages[0]));
    assert!(messages[0].contains("client `db` close error: pool poisoned"));
}

#[tokio::test]
async fn test_registration_after_shutdown_is_ignored() {
    let coordinator = Coordinator::new(ShutdownConfig::default());
    coordinator.register_server(
        MockParticipant::new("server")
            .with_delay(Duration::from_millis(100))
            .build(),
    );

    let running = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.shutdown(ShutdownContext::background()).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(coordinator.is_shutting_down());

    let late = MockParticipant::new("late").build();
    assert!(!coordinator.register_client(late.clone()));
    let cleanup_ran = Arc::new(AtomicBool::new(false));
    let flag = cleanup_ran.clone();
    assert!(!coordinator.register_cleanup(move || {
        flag.store(true, Ordering::SeqCst);
        Ok(())
    }));

    running.await.unwrap().unwrap();
    assert_eq!(late.calls(), 0);
    assert!(!cleanup_ran.load(Ordering::SeqCst));

    // Still rejected once complete.
    assert!(!coordinator.register_server(late.clone()));
    assert_eq!(coordinator.pending().total(), 0);
}

#[tokio::test]
async fn test_phases_run_in_order() {
    let log = EventLog::new();
    let coordinator = Coordinator::new(ShutdownConfig::default());

    coordinator.register_server(
        MockParticipant::new("server")
            .with_delay(Duration::from_millis(80))
            .logged(&log)
            .build(),
    );
    coordinator.register_listener(
        MockParticipant::new("listener")
            .with_delay(Duration::from_millis(40))
            .logged(&log)
            .build(),
    );
    coordinator.register_client(
        MockParticipant::new("client")
            .with_delay(Duration::from_millis(20))
            .logged(&log)
            .build(),
    );
    coordinator.register_identity_provider(MockParticipant::new("provider").logged(&log).build());
    let cleanup_log = log.clone();
    coordinator.register_cleanup(move || {
        cleanup_log.push("cleanup");
        Ok(())
    });

    coordinator.shutdown(ShutdownContext::background()).await.unwrap();

    let client_start = log.at("client:start").unwrap();
    assert!(client_start >= log.at("server:end").unwrap());
    assert!(client_start >= log.at("listener:end").unwrap());
    assert!(log.at("provider:start").unwrap() >= log.at("client:end").unwrap());
    assert!(log.at("cleanup").unwrap() >= log.at("provider:end").unwrap());

    // Servers and listeners are closed concurrently.
    assert!(log.at("listener:start").unwrap() < log.at("server:end").unwrap());
}

#[tokio::test]
async fn test_hung_server_is_bounded_by_grace_period() {
    let coordinator = Coordinator::new(config(
        Duration::from_millis(50),
        Duration::from_secs(5),
        Duration::from_secs(5),
    ));
    let hung = MockParticipant::new("api")
        .with_delay(Duration::from_millis(400))
        .build();
    let client = MockParticipant::new("db").build();
    coordinator.register_server(hung.clone());
    coordinator.register_client(client.clone());

    let started = Instant::now();
    let err = coordinator
        .shutdown(ShutdownContext::background())
        .await
        .unwrap_err();

    assert!(started.elapsed() < Duration::from_millis(300), "took {:?}", started.elapsed());
    assert_eq!(err.len(), 1);
    assert!(matches!(
        &err.failures()[0],
        CloseError::TimedOut {
            kind: ParticipantKind::Server,
            cause: CancelCause::DeadlineExceeded,
            ..
        }
    ));
    // Later phases still ran.
    assert_eq!(client.calls(), 1);
}

#[tokio::test]
async fn test_drain_timeout_records_phase_error() {
    let coordinator = Coordinator::new(config(
        Duration::from_secs(5),
        Duration::from_millis(50),
        Duration::from_secs(5),
    ));
    coordinator.register_listener(
        MockParticipant::new("tcp")
            .with_delay(Duration::from_millis(300))
            .build(),
    );

    let started = Instant::now();
    let err = coordinator
        .shutdown(ShutdownContext::background())
        .await
        .unwrap_err();

    assert!(started.elapsed() < Duration::from_millis(250));
    assert_eq!(err.len(), 1);
    assert!(matches!(
        &err.failures()[0],
        CloseError::PhaseTimeout { abandoned: 1, .. }
    ));
    assert!(err.to_string().contains("grace period exceeded"));
}

#[tokio::test]
async fn test_hung_identity_provider_is_bounded_by_force_timeout() {
    let coordinator = Coordinator::new(config(
        Duration::from_secs(5),
        Duration::from_secs(5),
        Duration::from_millis(50),
    ));
    for name in ["svid", "bundle"] {
        coordinator.register_identity_provider(
            MockParticipant::new(name)
                .with_delay(Duration::from_millis(400))
                .build(),
        );
    }
    let cleanup_ran = Arc::new(AtomicBool::new(false));
    let flag = cleanup_ran.clone();
    coordinator.register_cleanup(move || {
        flag.store(true, Ordering::SeqCst);
        Ok(())
    });

    let started = Instant::now();
    let err = coordinator
        .shutdown(ShutdownContext::background())
        .await
        .unwrap_err();

    assert!(started.elapsed() < Duration::from_millis(300));
    // One failure per hung provider, nothing extra for the phase itself.
    assert_eq!(err.len(), 2, "{err}");
    assert!(err.failures().iter().all(|failure| matches!(
        failure,
        CloseError::TimedOut {
            kind: ParticipantKind::IdentityProvider,
            cause: CancelCause::DeadlineExceeded,
            ..
        }
    )));
    assert!(cleanup_ran.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_every_cleanup_runs_and_failures_are_indexed() {
    let coordinator = Coordinator::new(ShutdownConfig::default());
    let ran: Arc<Vec<AtomicBool>> = Arc::new((0..3).map(|_| AtomicBool::new(false)).collect());

    for index in 0..3 {
        let ran = ran.clone();
        coordinator.register_cleanup(move || {
            ran[index].store(true, Ordering::SeqCst);
            if index == 1 {
                Err("flush failed".into())
            } else {
                Ok(())
            }
        });
    }

    let err = coordinator
        .shutdown(ShutdownContext::background())
        .await
        .unwrap_err();

    assert!(ran.iter().all(|flag| flag.load(Ordering::SeqCst)));
    assert_eq!(err.len(), 1);
    assert!(matches!(&err.failures()[0], CloseError::CleanupFailed { index: 2, .. }));
    assert!(err.to_string().contains("cleanup callback #2 failed: flush failed"));
}

#[tokio::test]
async fn test_every_failure_is_reported() {
    let coordinator = Coordinator::new(ShutdownConfig::default());
    coordinator.register_server(MockParticipant::new("api").failing("reset").build());
    coordinator.register_listener(MockParticipant::new("tcp").failing("ebadf").build());
    coordinator.register_client(MockParticipant::new("db").failing("gone").build());
    coordinator.register_identity_provider(MockParticipant::new("svid").failing("expired").build());
    coordinator.register_cleanup(|| Err("disk full".into()));

    let err = coordinator
        .shutdown(ShutdownContext::background())
        .await
        .unwrap_err();

    assert_eq!(err.len(), 5);
    let message = err.to_string();
    assert!(message.starts_with("shutdown completed with 5 errors"));
    for fragment in ["reset", "ebadf", "gone", "expired", "disk full"] {
        assert!(message.contains(fragment), "missing {fragment} in {message}");
    }
}

#[tokio::test]
async fn test_empty_coordinator_returns_promptly() {
    let coordinator = Coordinator::new(ShutdownConfig::default());
    let started = Instant::now();
    coordinator.shutdown(ShutdownContext::background()).await.unwrap();
    assert!(started.elapsed() < Duration::from_millis(100));
    assert!(coordinator.is_complete());
}

#[tokio::test]
async fn test_caller_deadline_shrinks_phase_budgets() {
    let coordinator = Coordinator::new(ShutdownConfig::default());
    coordinator.register_server(
        MockParticipant::new("api")
            .with_delay(Duration::from_millis(400))
            .build(),
    );

    let started = Instant::now();
    let err = coordinator
        .shutdown(ShutdownContext::with_timeout(Duration::from_millis(50)))
        .await
        .unwrap_err();

    assert!(started.elapsed() < Duration::from_millis(300));
    // Grace and drain collapse onto the caller deadline; only the server reports.
    assert_eq!(err.len(), 1, "{err}");
    assert!(matches!(
        &err.failures()[0],
        CloseError::TimedOut {
            kind: ParticipantKind::Server,
            cause: CancelCause::DeadlineExceeded,
            ..
        }
    ));
}

#[tokio::test]
async fn test_caller_cancellation_is_reported() {
    let coordinator = Coordinator::new(ShutdownConfig::default());
    coordinator.register_server(
        MockParticipant::new("api")
            .with_delay(Duration::from_millis(300))
            .build(),
    );

    let ctx = ShutdownContext::background();
    let canceller = ctx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        canceller.cancel();
    });

    let err = coordinator.shutdown(ctx).await.unwrap_err();
    assert_eq!(err.len(), 1, "{err}");
    assert!(matches!(
        &err.failures()[0],
        CloseError::TimedOut { cause: CancelCause::Cancelled, .. }
    ));
}

#[tokio::test]
async fn test_panicking_participant_does_not_stop_sequence() {
    let coordinator = Coordinator::new(ShutdownConfig::default());
    coordinator.register_client(stoppable_fn("bomb", || {
        panic!("close exploded")
    }));
    let provider = MockParticipant::new("svid").build();
    coordinator.register_identity_provider(provider.clone());

    let err = coordinator
        .shutdown(ShutdownContext::background())
        .await
        .unwrap_err();

    assert!(matches!(
        &err.failures()[0],
        CloseError::Panicked { kind: ParticipantKind::Client, .. }
    ));
    assert_eq!(provider.calls(), 1);
}

#[test]
fn test_server_that_never_closes_does_not_hold_the_process() {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap();

    let started = Instant::now();
    let err = runtime.block_on(async {
        let coordinator = Coordinator::new(config(
            Duration::from_millis(50),
            Duration::from_secs(5),
            Duration::from_secs(5),
        ));
        coordinator.register_server(stoppable_fn("wedged", || loop {
            std::thread::park();
        }));
        coordinator
            .shutdown(ShutdownContext::background())
            .await
            .unwrap_err()
    });
    assert!(matches!(
        &err.failures()[0],
        CloseError::TimedOut { kind: ParticipantKind::Server, .. }
    ));

    // Dropping the runtime is what `#[tokio::main]` does on return.
    drop(runtime);
    assert!(started.elapsed() < Duration::from_secs(1), "took {:?}", started.elapsed());
}
