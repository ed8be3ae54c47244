//! Synthetic keyed workload: members keyed by mobile number, each task
//! sleeping a pseudo-random duration, with start/end instants recorded so
//! the run can be checked for same-key overlap afterwards.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use serde::Serialize;
use tracing::info;

use keylane_core::SchedulerConfig;
use keylane_scheduler::{Scheduler, SchedulerMetrics};

use crate::cli::SimulateArgs;

#[derive(Debug, Clone)]
struct Member {
    id: usize,
    mobile: String,
    sleep: Duration,
    fails: bool,
}

#[derive(Debug, Clone)]
struct Span {
    key: String,
    start: Duration,
    end: Duration,
}

#[derive(Debug, Serialize)]
pub struct SimulationReport {
    pub strategy: String,
    pub workers: usize,
    pub tasks: usize,
    pub keys: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub peak_concurrency: usize,
    pub peak_keys: usize,
    pub overlaps: usize,
    pub elapsed_ms: u128,
    pub metrics: SchedulerMetrics,
}

/// Tiny deterministic generator for simulated work durations.
struct XorShift64(u64);

impl XorShift64 {
    fn new(seed: u64) -> Self {
        Self(seed.max(1))
    }

    fn next_below(&mut self, bound: u64) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        if bound == 0 { 0 } else { x % bound }
    }
}

fn members(args: &SimulateArgs) -> Vec<Member> {
    let mut rng = XorShift64::new(args.seed);
    (0..args.tasks)
        .map(|id| Member {
            id,
            mobile: format!("1390000{:04}", id % args.keys),
            sleep: Duration::from_millis(rng.next_below(args.max_sleep_ms + 1)),
            fails: args.fail_every.is_some_and(|n| n > 0 && (id + 1) % n == 0),
        })
        .collect()
}

pub fn run(args: &SimulateArgs) -> Result<SimulationReport> {
    if args.keys == 0 {
        bail!("--keys must be at least 1");
    }

    let config = SchedulerConfig {
        worker_threads: args.workers,
        strategy: args.strategy,
        poll_interval_ms: args.poll_interval_ms,
        ..SchedulerConfig::default()
    };
    config.log_summary();
    let scheduler = Scheduler::with_config(config).context("failed to start scheduler")?;

    let origin = Instant::now();
    let spans = Arc::new(Mutex::new(Vec::with_capacity(args.tasks)));
    let recorder = Arc::clone(&spans);

    let handles = scheduler.submit_batch(
        members(args),
        |member| member.mobile.clone(),
        move |member| {
            let start = origin.elapsed();
            info!(
                "Start: {} : working for {} / {}",
                thread::current().name().unwrap_or("worker"),
                member.id,
                member.mobile
            );
            thread::sleep(member.sleep);
            let end = origin.elapsed();
            info!(
                "End: {} : working for {} / {}",
                thread::current().name().unwrap_or("worker"),
                member.id,
                member.mobile
            );
            if let Ok(mut spans) = recorder.lock() {
                spans.push(Span { key: member.mobile.clone(), start, end });
            }
            if member.fails {
                bail!("simulated failure for member {}", member.id);
            }
            Ok(member.id)
        },
    )?;

    let outcomes = scheduler.await_all(handles);
    let elapsed = origin.elapsed();
    let succeeded = outcomes.iter().filter(|o| o.is_ok()).count();

    let spans = spans
        .lock()
        .map(|spans| spans.clone())
        .map_err(|_| anyhow::anyhow!("span recorder poisoned"))?;
    let (peak_concurrency, peak_keys) = peaks(&spans);

    Ok(SimulationReport {
        strategy: args.strategy.to_string(),
        workers: scheduler.pool_size(),
        tasks: outcomes.len(),
        keys: args.keys.min(args.tasks),
        succeeded,
        failed: outcomes.len() - succeeded,
        peak_concurrency,
        peak_keys,
        overlaps: overlaps(&spans),
        elapsed_ms: elapsed.as_millis(),
        metrics: scheduler.metrics(),
    })
}

/// Peak number of simultaneously running tasks, and of distinct keys among
/// them, from a sweep over start/end events.
fn peaks(spans: &[Span]) -> (usize, usize) {
    let mut events: Vec<(Duration, bool, &str)> = spans
        .iter()
        .flat_map(|s| [(s.start, true, s.key.as_str()), (s.end, false, s.key.as_str())])
        .collect();
    // Ends sort before starts at the same instant.
    events.sort_by_key(|(at, is_start, _)| (*at, *is_start));

    let mut running = 0usize;
    let mut per_key: HashMap<&str, usize> = HashMap::new();
    let (mut peak, mut peak_keys) = (0, 0);
    for (_, is_start, key) in events {
        if is_start {
            running += 1;
            *per_key.entry(key).or_default() += 1;
        } else {
            running = running.saturating_sub(1);
            if let Some(count) = per_key.get_mut(key) {
                *count -= 1;
                if *count == 0 {
                    per_key.remove(key);
                }
            }
        }
        peak = peak.max(running);
        peak_keys = peak_keys.max(per_key.len());
    }
    (peak, peak_keys)
}

/// Number of adjacent same-key executions that overlapped in time.
fn overlaps(spans: &[Span]) -> usize {
    let mut by_key: HashMap<&str, Vec<&Span>> = HashMap::new();
    for span in spans {
        by_key.entry(span.key.as_str()).or_default().push(span);
    }
    by_key
        .into_values()
        .map(|mut spans| {
            spans.sort_by_key(|s| s.start);
            spans.windows(2).filter(|w| w[0].end > w[1].start).count()
        })
        .sum()
}

pub fn print_report(report: &SimulationReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    println!("strategy:          {}", report.strategy);
    println!("workers:           {}", report.workers);
    println!("tasks:             {} over {} keys", report.tasks, report.keys);
    println!("succeeded/failed:  {}/{}", report.succeeded, report.failed);
    println!("peak concurrency:  {}", report.peak_concurrency);
    println!("peak busy keys:    {}", report.peak_keys);
    println!("same-key overlaps: {}", report.overlaps);
    println!("elapsed:           {}ms", report.elapsed_ms);
    Ok(())
}
