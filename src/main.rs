//! FlashVars - Soak Driver
//!
//! Spins up worker threads that behave like rule-engine transactions:
//! per-IP counters, session markers with expiry, wildcard and regex
//! resolution. Useful for eyeballing lock behaviour and expiry under load.

use anyhow::{bail, Context};
use bytes::Bytes;
use flashvars::{
    compartment_key, Collection, Collections, InMemoryCollection, KeyExclusions, KeyPattern,
    NoExclusions, StoreConfig,
};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Driver configuration
struct Config {
    /// Number of worker threads
    threads: usize,
    /// Transactions per worker
    iterations: usize,
    /// Lifetime of per-IP counters
    ttl: Duration,
    /// Distinct client addresses per worker
    clients: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            threads: 8,
            iterations: 10_000,
            ttl: Duration::from_millis(250),
            clients: 16,
        }
    }
}

impl Config {
    /// Parse configuration from command-line arguments
    fn from_args() -> anyhow::Result<Self> {
        let mut config = Config::default();
        let mut args = std::env::args().skip(1);

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--threads" | "-t" => {
                    config.threads = next_number(&mut args, "--threads")?;
                }
                "--iterations" | "-n" => {
                    config.iterations = next_number(&mut args, "--iterations")?;
                }
                "--ttl-ms" => {
                    config.ttl = Duration::from_millis(next_number(&mut args, "--ttl-ms")?);
                }
                "--clients" | "-c" => {
                    config.clients = next_number(&mut args, "--clients")?;
                }
                "--help" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("FlashVars version {}", flashvars::VERSION);
                    std::process::exit(0);
                }
                other => {
                    print_help();
                    bail!("unknown argument: {}", other);
                }
            }
        }

        if config.threads == 0 || config.clients == 0 {
            bail!("--threads and --clients must be at least 1");
        }

        Ok(config)
    }
}

fn next_number<T>(args: &mut impl Iterator<Item = String>, flag: &str) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value = args
        .next()
        .with_context(|| format!("{} requires a value", flag))?;
    value
        .parse()
        .with_context(|| format!("invalid value for {}: {}", flag, value))
}

fn print_help() {
    println!(
        r#"
FlashVars - Soak Driver for In-Process Variable Collections

USAGE:
    flashvars [OPTIONS]

OPTIONS:
    -t, --threads <N>       Worker threads (default: 8)
    -n, --iterations <N>    Transactions per worker (default: 10000)
        --ttl-ms <MS>       Expiry armed on per-IP counters (default: 250)
    -c, --clients <N>       Distinct client addresses per worker (default: 16)
    -v, --version           Print version information
        --help              Print this help message

LOGGING:
    RUST_LOG=flashvars=debug flashvars
"#
    );
}

fn main() -> anyhow::Result<()> {
    let config = Config::from_args()?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .init();

    let collections = Arc::new(Collections::with_config(StoreConfig::default()));
    for name in ["IP", "SESSION", "TX"] {
        collections.get_or_create(name)?;
    }

    // Built once, shared by every worker
    let exclusions = Arc::new(KeyExclusions::new().with_pattern("::blocked$")?);

    info!(
        threads = config.threads,
        iterations = config.iterations,
        ttl_ms = config.ttl.as_millis() as u64,
        "Starting soak run"
    );
    let started = Instant::now();

    let workers: Vec<_> = (0..config.threads)
        .map(|worker| {
            let collections = Arc::clone(&collections);
            let exclusions = Arc::clone(&exclusions);
            let ttl = config.ttl;
            let iterations = config.iterations;
            let clients = config.clients;

            thread::Builder::new()
                .name(format!("worker-{}", worker))
                .spawn(move || {
                    run_worker(&collections, &exclusions, worker, iterations, clients, ttl)
                })
                .context("failed to spawn worker thread")
        })
        .collect::<anyhow::Result<_>>()?;

    let mut resolved = 0usize;
    for worker in workers {
        resolved += match worker.join() {
            Ok(result) => result?,
            Err(_) => bail!("worker thread panicked"),
        };
    }

    let purged = collections.cleanup_expired();
    info!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        resolved,
        purged,
        "Soak run complete"
    );

    for name in collections.names() {
        if let Some(collection) = collections.get(&name) {
            let stats = collection.stats();
            info!(
                collection = %name,
                entries = stats.entries,
                reads = stats.reads,
                writes = stats.writes,
                deletes = stats.deletes,
                purged = stats.purged,
                "Collection stats"
            );
        }
    }

    Ok(())
}

/// Runs `iterations` simulated transactions. Returns the number of
/// variables the wildcard and regex resolutions produced.
fn run_worker(
    collections: &Collections,
    exclusions: &KeyExclusions,
    worker: usize,
    iterations: usize,
    clients: usize,
    ttl: Duration,
) -> anyhow::Result<usize> {
    let ip = collections.get_or_create("IP")?;
    let session = collections.get_or_create("SESSION")?;
    let tx = collections.get_or_create("TX")?;

    let mut resolved = 0;
    let mut out = Vec::new();

    for iteration in 0..iterations {
        let addr = format!("10.{}.0.{}", worker, iteration % clients);
        let session_id = format!("sess-{}-{}", worker, iteration % clients);

        bump_counter(&ip, &addr, ttl);

        session.store_or_update_first_in(
            &[session_id.as_str()],
            "last_seen",
            Bytes::from(iteration.to_string()),
        );
        session.set_expiry_in(&[session_id.as_str()], "last_seen", 60);

        tx.store("anomaly_score", Bytes::from("0"));
        tx.store_or_update_first("anomaly_score", Bytes::from("5"));

        if iteration % 100 == 0 {
            ip.store_in(&[addr.as_str()], "blocked", Bytes::from("1"));
            ip.set_expiry_in(&[addr.as_str()], "blocked", 1);

            out.clear();
            ip.resolve_multi_matches("", &mut out, exclusions);
            resolved += out.len();

            let pattern = KeyPattern::new(&format!("^{}::", regex::escape(&addr)))?;
            out.clear();
            ip.resolve_regular_expression(&pattern, &mut out, &NoExclusions);
            resolved += out.len();
        }

        // End of transaction: TX does not outlive it
        tx.del("anomaly_score");
    }

    debug!(worker, resolved, "Worker finished");
    Ok(resolved)
}

/// Read-modify-write of a per-IP counter, re-arming its expiry.
fn bump_counter(ip: &InMemoryCollection, addr: &str, ttl: Duration) {
    let key = compartment_key(&[addr], "counter");
    let current = ip
        .resolve_first(&key)
        .and_then(|value| std::str::from_utf8(&value).ok()?.parse::<u64>().ok())
        .unwrap_or(0);

    ip.store_or_update_first(&key, Bytes::from((current + 1).to_string()));
    ip.set_expiry_after(&key, ttl);
}
