//! Property tests: concurrency cap, FIFO admission and liveness over random
//! workloads

use std::sync::{Arc, Mutex};
use std::time::Duration;

use proptest::prelude::*;
use serde_json::{Value, json};
use taskqueue::{Scheduler, Task, TaskStatus};

async fn sleeper(_task: Task, args: Vec<Value>) -> eyre::Result<u64> {
    let delay_ms = args[0].as_u64().unwrap_or(0);
    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    if args[1].as_bool().unwrap_or(false) {
        eyre::bail!("planned failure");
    }
    Ok(delay_ms)
}

fn workload() -> impl Strategy<Value = Vec<(u64, bool)>> {
    proptest::collection::vec((0..50u64, any::<bool>()), 0..12)
}

fn run_workload(max_concurrency: usize, work: Vec<(u64, bool)>) -> Result<(), TestCaseError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .expect("Failed to build runtime");

    runtime.block_on(async move {
        let scheduler = Scheduler::new(max_concurrency).expect("valid concurrency");

        let snapshots: Arc<Mutex<Vec<Vec<TaskStatus>>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&snapshots);
        scheduler.subscribe(move |tasks| {
            sink.lock().unwrap().push(tasks.iter().map(|t| t.status).collect());
        });

        let handles: Vec<_> = work
            .iter()
            .enumerate()
            .map(|(i, (delay, fail))| {
                scheduler
                    .submit_named(format!("t{i}"), sleeper, vec![json!(delay * 10), json!(fail)])
                    .expect("scheduler is open")
            })
            .collect();

        let results = futures::future::join_all(handles).await;

        // Every task settles, with the outcome its work function chose
        for ((_, fail), result) in work.iter().zip(&results) {
            prop_assert_eq!(result.is_err(), *fail);
            if let Err(e) = result {
                prop_assert!(!e.is_stopped());
            }
        }

        for statuses in snapshots.lock().unwrap().iter() {
            let active = statuses.iter().filter(|s| **s == TaskStatus::Active).count();
            prop_assert!(active <= max_concurrency, "{} active with cap {}", active, max_concurrency);

            // Admitted tasks always form a prefix of the sequence
            if let Some(first_new) = statuses.iter().position(|s| *s == TaskStatus::New) {
                prop_assert!(statuses[first_new..].iter().all(|s| *s == TaskStatus::New));
            }
        }

        // Only successful tasks remain, all done, in submission order
        let expected: Vec<String> = work
            .iter()
            .enumerate()
            .filter(|(_, (_, fail))| !fail)
            .map(|(i, _)| format!("t{i}"))
            .collect();
        let snapshot = scheduler.snapshot();
        let names: Vec<String> = snapshot.iter().map(|t| t.name.clone()).collect();
        prop_assert_eq!(names, expected);
        prop_assert!(snapshot.iter().all(|t| t.status == TaskStatus::Done));

        let stats = scheduler.stats().await.expect("scheduler is open");
        prop_assert!(stats.peak_concurrent <= max_concurrency);
        prop_assert_eq!(stats.total_started as usize, work.len());
        Ok(())
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_cap_fifo_and_liveness(max_concurrency in 1..=4usize, work in workload()) {
        run_workload(max_concurrency, work)?;
    }
}
