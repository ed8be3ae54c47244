#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{mpsc, Arc};
    use std::thread;
    use std::time::Duration;

    use keylane_core::{DispatchStrategy, SchedulerConfig, SchedulerError, TaskError};

    use crate::runner::Scheduler;

    const STRATEGIES: [DispatchStrategy; 3] =
        [DispatchStrategy::Notify, DispatchStrategy::Poll, DispatchStrategy::Lanes];

    fn scheduler(workers: usize, strategy: DispatchStrategy) -> Scheduler {
        let config = SchedulerConfig {
            strategy,
            poll_interval_ms: 5,
            ..SchedulerConfig::with_workers(workers)
        };
        Scheduler::with_config(config).unwrap()
    }

    #[test]
    fn scheduler_creation() {
        let scheduler = Scheduler::new(3).unwrap();
        assert_eq!(scheduler.pool_size(), 3);
        assert_eq!(scheduler.strategy(), DispatchStrategy::Notify);
        assert!(!scheduler.is_closed());
        assert_eq!(scheduler.in_flight(), 0);
        assert_eq!(scheduler.metrics().submitted, 0);
    }

    #[test]
    fn zero_pool_size_rejected() {
        assert!(matches!(Scheduler::new(0), Err(SchedulerError::InvalidConfig(_))));
    }

    #[test]
    fn empty_key_never_reaches_queue() {
        for strategy in STRATEGIES {
            let scheduler = scheduler(2, strategy);
            let err = scheduler
                .submit("", 1, |n: &i32| Ok::<_, anyhow::Error>(*n))
                .unwrap_err();
            assert!(matches!(err, SchedulerError::InvalidKey));
            assert_eq!(scheduler.in_flight(), 0);
            assert_eq!(scheduler.metrics().submitted, 0);
        }
    }

    #[test]
    fn batch_with_empty_key_enqueues_nothing() {
        let scheduler = scheduler(2, DispatchStrategy::Notify);
        let ran = Arc::new(AtomicUsize::new(0));
        let counter = ran.clone();
        let err = scheduler
            .submit_batch(
                vec!["111".to_string(), String::new(), "222".to_string()],
                |key| key.clone(),
                move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, anyhow::Error>(())
                },
            )
            .unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidKey));
        scheduler.drain();
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn submit_and_wait() {
        for strategy in STRATEGIES {
            let scheduler = scheduler(2, strategy);
            let handle = scheduler
                .submit("111", 21, |n: &i32| Ok::<_, anyhow::Error>(n * 2))
                .unwrap();
            assert_eq!(handle.key(), "111");
            assert_eq!(handle.wait().unwrap(), 42);
        }
    }

    #[test]
    fn submit_after_drain_is_rejected() {
        let scheduler = scheduler(2, DispatchStrategy::Notify);
        let handle = scheduler.submit("a", (), |_: &()| Ok::<_, anyhow::Error>(())).unwrap();
        let outcomes = scheduler.await_all(vec![handle]);
        assert_eq!(outcomes.len(), 1);
        assert!(scheduler.is_closed());

        let err = scheduler
            .submit("a", (), |_: &()| Ok::<_, anyhow::Error>(()))
            .unwrap_err();
        assert!(matches!(err, SchedulerError::Closed));
    }

    #[test]
    fn reusable_scheduler_survives_drain() {
        for strategy in STRATEGIES {
            let config = SchedulerConfig {
                strategy,
                shutdown_on_drain: false,
                ..SchedulerConfig::with_workers(2)
            };
            let scheduler = Scheduler::with_config(config).unwrap();

            let first = scheduler.submit("k", 1, |n: &i32| Ok::<_, anyhow::Error>(*n)).unwrap();
            scheduler.drain();
            assert!(!scheduler.is_closed());

            let second = scheduler.submit("k", 2, |n: &i32| Ok::<_, anyhow::Error>(*n)).unwrap();
            let outcomes = scheduler.await_all(vec![first, second]);
            let values: Vec<i32> = outcomes.into_iter().map(Result::unwrap).collect();
            assert_eq!(values, vec![1, 2]);
        }
    }

    #[test]
    fn shutdown_finishes_submitted_work() {
        let scheduler = scheduler(1, DispatchStrategy::Notify);
        let handles: Vec<_> = (0..4)
            .map(|i| {
                scheduler
                    .submit("same", i, |n: &i32| {
                        thread::sleep(Duration::from_millis(5));
                        Ok::<_, anyhow::Error>(*n)
                    })
                    .unwrap()
            })
            .collect();
        scheduler.shutdown();

        assert_eq!(scheduler.in_flight(), 0);
        let values: Vec<i32> = handles.into_iter().map(|h| h.wait().unwrap()).collect();
        assert_eq!(values, vec![0, 1, 2, 3]);
    }

    #[test]
    fn dropping_scheduler_abandons_undispatched_tasks() {
        for strategy in STRATEGIES {
            let scheduler = scheduler(1, strategy);
            let (started_tx, started_rx) = mpsc::channel();
            let (gate_tx, gate_rx) = mpsc::channel::<()>();

            let running = scheduler
                .submit("k", (), move |_: &()| {
                    started_tx.send(()).ok();
                    gate_rx.recv().ok();
                    Ok::<_, anyhow::Error>("first")
                })
                .unwrap();
            started_rx.recv().unwrap();
            let queued = scheduler
                .submit("k", (), |_: &()| Ok::<_, anyhow::Error>("second"))
                .unwrap();

            drop(scheduler);
            gate_tx.send(()).unwrap();

            assert_eq!(running.wait().unwrap(), "first");
            assert!(
                matches!(queued.wait(), Err(TaskError::Abandoned { .. })),
                "{strategy}: queued task should be abandoned"
            );
        }
    }

    #[test]
    fn reusable_await_all_waits_only_for_its_handles() {
        for strategy in STRATEGIES {
            let config = SchedulerConfig {
                strategy,
                poll_interval_ms: 5,
                shutdown_on_drain: false,
                ..SchedulerConfig::with_workers(2)
            };
            let scheduler = Scheduler::with_config(config).unwrap();
            let (started_tx, started_rx) = mpsc::channel();
            let (gate_tx, gate_rx) = mpsc::channel::<()>();

            let other = scheduler
                .submit("other", (), move |_: &()| {
                    started_tx.send(()).ok();
                    gate_rx.recv().ok();
                    Ok::<_, anyhow::Error>("other")
                })
                .unwrap();
            started_rx.recv().unwrap();

            let mine = scheduler.submit("mine", 3, |n: &i32| Ok::<_, anyhow::Error>(n * 3)).unwrap();
            let outcomes = scheduler.await_all(vec![mine]);
            assert_eq!(outcomes.into_iter().map(Result::unwrap).collect::<Vec<_>>(), vec![9]);
            assert!(scheduler.in_flight() >= 1, "{strategy}: other key still running");
            assert!(!scheduler.is_closed());

            gate_tx.send(()).unwrap();
            assert_eq!(other.wait().unwrap(), "other");
            scheduler.drain();
            assert_eq!(scheduler.in_flight(), 0);
        }
    }

    #[test]
    fn metrics_track_outcomes() {
        for strategy in STRATEGIES {
            let scheduler = scheduler(2, strategy);
            let ok = scheduler.submit("a", (), |_: &()| Ok::<_, anyhow::Error>(())).unwrap();
            let bad = scheduler
                .submit("b", (), |_: &()| -> anyhow::Result<()> { anyhow::bail!("nope") })
                .unwrap();
            scheduler.await_all(vec![ok, bad]);

            let m = scheduler.metrics();
            assert_eq!(m.submitted, 2);
            assert_eq!(m.dispatched, 2);
            assert_eq!(m.succeeded, 1);
            assert_eq!(m.failed, 1);
            assert_eq!(m.active_workers, 0);
            assert!(m.peak_active_workers >= 1);
            assert!(m.last_completed_at.is_some());
        }
    }

    #[test]
    fn schedulers_do_not_share_keys() {
        let a = scheduler(1, DispatchStrategy::Notify);
        let b = scheduler(1, DispatchStrategy::Notify);
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();

        let blocked = a
            .submit("shared-key", (), move |_: &()| {
                release_rx.recv().ok();
                Ok::<_, anyhow::Error>(())
            })
            .unwrap();
        while a.busy_keys() == 0 {
            thread::yield_now();
        }

        // Same key string on another scheduler runs while `a` holds it.
        let other = b.submit("shared-key", 7, |n: &i32| Ok::<_, anyhow::Error>(*n)).unwrap();
        assert_eq!(other.wait().unwrap(), 7);

        release_tx.send(()).unwrap();
        blocked.wait().unwrap();
    }
}
