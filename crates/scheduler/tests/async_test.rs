//! Result handles awaited from async code.

use std::time::Duration;

use keylane_scheduler::{Scheduler, SchedulerConfig, TaskError};

#[tokio::test]
async fn handles_can_be_awaited() {
    let scheduler = Scheduler::new(2).unwrap();
    let handles = scheduler
        .submit_batch(
            vec![1u64, 2, 3, 4],
            |n| format!("key-{}", n % 2),
            |n| Ok::<_, anyhow::Error>(n * n),
        )
        .unwrap();

    let mut values = Vec::new();
    for handle in handles {
        values.push(handle.await.unwrap());
    }
    assert_eq!(values, vec![1, 4, 9, 16]);
}

#[tokio::test]
async fn awaited_handle_respects_timeout() {
    let scheduler = Scheduler::new(1).unwrap();
    let handle = scheduler
        .submit("slow", (), |_: &()| {
            std::thread::sleep(Duration::from_millis(50));
            Ok::<_, anyhow::Error>(())
        })
        .unwrap();

    let outcome = tokio::time::timeout(Duration::from_secs(5), handle).await;
    assert!(matches!(outcome, Ok(Ok(()))));
}

#[tokio::test]
async fn abandoned_handle_resolves_on_teardown() {
    let config = SchedulerConfig::with_workers(1);
    let scheduler = Scheduler::with_config(config).unwrap();
    let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();

    let blocker = scheduler
        .submit("k", (), move |_: &()| {
            release_rx.recv().ok();
            Ok::<_, anyhow::Error>(())
        })
        .unwrap();
    while scheduler.busy_keys() == 0 {
        tokio::task::yield_now().await;
    }
    let waiting = scheduler.submit("k", (), |_: &()| Ok::<_, anyhow::Error>(())).unwrap();

    drop(scheduler);
    release_tx.send(()).unwrap();

    assert!(blocker.await.is_ok());
    assert!(matches!(waiting.await, Err(TaskError::Abandoned { .. })));
}
