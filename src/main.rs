//! Lockstep workload runner
//!
//! Drives one of the concurrency primitives with a configurable number of
//! threads and reports what it observed.
//!
//! ```text
//! lockstep <ledger|counter|cache|logger|queue> [--threads N] [--ops N] [--json]
//! ```

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{ensure, Context};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use lockstep::cache::CacheStats;
use lockstep::logger::LoggerStats;
use lockstep::{
    BlockingQueue, BufferedLogger, Counter, Ledger, LoggerConfig, MemorySink, SingleFlightCache,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Lockstep - exercise shared-state concurrency primitives
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    workload: Workload,

    /// Number of worker threads
    #[arg(long, global = true, env = "LOCKSTEP_THREADS", default_value = "8")]
    threads: usize,

    /// Operations per worker thread
    #[arg(long, global = true, env = "LOCKSTEP_OPS", default_value = "1000")]
    ops: usize,

    /// Print a JSON summary on stdout
    #[arg(long, global = true, env = "LOCKSTEP_JSON")]
    json: bool,

    /// Seed for randomized workloads
    #[arg(long, global = true, env = "LOCKSTEP_SEED", default_value = "42")]
    seed: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "LOCKSTEP_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, global = true, env = "LOCKSTEP_LOG_JSON")]
    log_json: bool,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Workload {
    /// Random transfers between two accounts
    Ledger,
    /// Concurrent increments
    Counter,
    /// Concurrent first access to a shared key set
    Cache,
    /// Concurrent logging with background flush
    Logger {
        /// Auto-flush period in milliseconds
        #[arg(long, env = "LOCKSTEP_FLUSH_INTERVAL_MS", default_value = "10")]
        flush_interval_ms: u64,
    },
    /// Producers and consumers over one queue
    Queue,
}

#[derive(Debug, Serialize)]
struct Summary {
    workload: &'static str,
    threads: usize,
    ops: usize,
    elapsed_ms: u64,
    observed: Value,
}

// =============================================================================
// Main
// =============================================================================

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_logging(&args);

    ensure!(args.threads > 0, "--threads must be at least 1");

    info!(
        workload = ?args.workload,
        threads = args.threads,
        ops = args.ops,
        "Starting workload"
    );

    let started = Instant::now();
    let (name, observed) = match args.workload {
        Workload::Ledger => ("ledger", run_ledger(&args)?),
        Workload::Counter => ("counter", run_counter(&args)?),
        Workload::Cache => ("cache", run_cache(&args)?),
        Workload::Logger { flush_interval_ms } => (
            "logger",
            run_logger(&args, Duration::from_millis(flush_interval_ms))?,
        ),
        Workload::Queue => ("queue", run_queue(&args)?),
    };

    let summary = Summary {
        workload: name,
        threads: args.threads,
        ops: args.ops,
        elapsed_ms: started.elapsed().as_millis() as u64,
        observed,
    };
    info!(elapsed_ms = summary.elapsed_ms, "Workload finished");

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }

    Ok(())
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    // Logs go to stderr so the JSON summary owns stdout
    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}

// =============================================================================
// Workloads
// =============================================================================

fn join_all<T>(
    handles: Vec<thread::ScopedJoinHandle<'_, anyhow::Result<T>>>,
) -> anyhow::Result<Vec<T>> {
    handles
        .into_iter()
        .map(|handle| {
            handle
                .join()
                .map_err(|_| anyhow::anyhow!("worker thread panicked"))?
        })
        .collect()
}

fn run_ledger(args: &Args) -> anyhow::Result<Value> {
    let ledger = Ledger::new();
    ledger.open("alice", Decimal::from(10_000))?;
    ledger.open("bob", Decimal::from(10_000))?;
    let before = ledger.total_balance();

    let moved = thread::scope(|s| {
        let handles = (0..args.threads)
            .map(|t| {
                let ledger = &ledger;
                s.spawn(move || -> anyhow::Result<(u64, u64)> {
                    let mut rng = StdRng::seed_from_u64(args.seed.wrapping_add(t as u64));
                    let (mut granted, mut declined) = (0, 0);
                    for _ in 0..args.ops {
                        let (from, to) = if rng.random_bool(0.5) {
                            ("alice", "bob")
                        } else {
                            ("bob", "alice")
                        };
                        let amount = Decimal::from(rng.random_range(1..100i64));
                        if ledger.transfer(from, to, amount)? {
                            granted += 1;
                        } else {
                            declined += 1;
                        }
                    }
                    Ok((granted, declined))
                })
            })
            .collect();
        join_all(handles)
    })?;

    let granted: u64 = moved.iter().map(|(g, _)| g).sum();
    let declined: u64 = moved.iter().map(|(_, d)| d).sum();
    let after = ledger.total_balance();
    info!(%before, %after, granted, declined, "Ledger workload complete");

    Ok(json!({
        "total_before": before,
        "total_after": after,
        "transfers_granted": granted,
        "transfers_declined": declined,
        "accounts": ledger.snapshot(),
    }))
}

fn run_counter(args: &Args) -> anyhow::Result<Value> {
    let counter = Counter::new();

    thread::scope(|s| {
        let handles = (0..args.threads)
            .map(|_| {
                let counter = &counter;
                s.spawn(move || -> anyhow::Result<()> {
                    for _ in 0..args.ops {
                        counter.increment()?;
                    }
                    Ok(())
                })
            })
            .collect();
        join_all(handles)
    })?;

    let expected = (args.threads * args.ops) as u64;
    info!(count = counter.count(), expected, "Counter workload complete");

    Ok(json!({ "count": counter.count(), "expected": expected }))
}

fn run_cache(args: &Args) -> anyhow::Result<Value> {
    let keys = args.ops.clamp(1, 64) as u64;
    let cache = SingleFlightCache::new(|key: &u64| {
        thread::sleep(Duration::from_millis(1));
        Ok::<_, std::convert::Infallible>(key * key)
    });

    thread::scope(|s| {
        let handles = (0..args.threads)
            .map(|_| {
                let cache = &cache;
                s.spawn(move || -> anyhow::Result<()> {
                    for key in 0..keys {
                        let value = cache.get_or_compute(&key).map_err(|e| {
                            anyhow::anyhow!("compute failed for key {}: {:?}", key, e)
                        })?;
                        ensure!(value == key * key, "wrong value for key {}", key);
                    }
                    Ok(())
                })
            })
            .collect();
        join_all(handles)
    })?;

    let stats: CacheStats = cache.stats();
    info!(
        keys,
        compute_count = stats.compute_count,
        coalesced = stats.coalesced,
        "Cache workload complete"
    );

    Ok(json!({ "keys": keys, "stats": stats }))
}

fn run_logger(args: &Args, interval: Duration) -> anyhow::Result<Value> {
    let sink = Arc::new(MemorySink::new());
    let logger = Arc::new(BufferedLogger::with_config(
        Arc::clone(&sink),
        LoggerConfig {
            auto_flush_interval: interval,
            ..Default::default()
        },
    ));
    let flusher = logger.start_default_auto_flush()?;

    thread::scope(|s| {
        for t in 0..args.threads {
            let logger = &logger;
            s.spawn(move || {
                for i in 0..args.ops {
                    logger.log(format!("worker-{} message-{}", t, i));
                }
            });
        }
    });

    logger.stop();
    let flushes = flusher.join().context("auto-flush worker failed")?;

    let stats: LoggerStats = logger.stats();
    let recovered = logger.flushed_records().len();
    info!(
        logged = stats.messages_logged,
        recovered,
        flushes,
        "Logger workload complete"
    );

    Ok(json!({
        "recovered": recovered,
        "sink_lines": sink.lines().len(),
        "batches": logger.flushed_batches().len(),
        "stats": stats,
    }))
}

fn run_queue(args: &Args) -> anyhow::Result<Value> {
    let queue = BlockingQueue::new();

    let consumed = thread::scope(|s| -> anyhow::Result<Vec<usize>> {
        let consumers: Vec<_> = (0..args.threads)
            .map(|_| {
                let queue = &queue;
                s.spawn(move || -> anyhow::Result<usize> { Ok(queue.drain().count()) })
            })
            .collect();
        let producers = (0..args.threads)
            .map(|p| {
                let queue = &queue;
                s.spawn(move || -> anyhow::Result<()> {
                    for i in 0..args.ops {
                        queue.enqueue((p, i))?;
                    }
                    Ok(())
                })
            })
            .collect();

        let produced = join_all(producers);
        queue.complete();
        produced?;
        join_all(consumers)
    })?;

    let total: usize = consumed.iter().sum();
    info!(produced = args.threads * args.ops, consumed = total, "Queue workload complete");

    Ok(json!({
        "produced": args.threads * args.ops,
        "consumed": total,
        "per_consumer": consumed,
    }))
}
