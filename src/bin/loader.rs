//! Load generator for the click counter
//!
//! Hits `GET /counter/{id}` at a target rate and prints throughput every second.

use anyhow::{bail, Context};
use banner_counter::shutdown::Shutdown;
use clap::{Parser, ValueEnum};
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Always the same banner
    Single,
    /// Random banner in [min, max]
    Range,
}

#[derive(Debug, Parser)]
#[command(name = "loader", about = "Generate click load against the banner counter")]
struct Args {
    /// Service base URL
    #[arg(long, default_value = "http://localhost:8080")]
    base_url: String,

    #[arg(long, value_enum, default_value_t = Mode::Single)]
    mode: Mode,

    /// Banner id for single mode
    #[arg(long, default_value_t = 1)]
    banner: i64,

    /// Lowest banner id for range mode
    #[arg(long, default_value_t = 1)]
    min: i64,

    /// Highest banner id for range mode
    #[arg(long, default_value_t = 100)]
    max: i64,

    /// Requests per second
    #[arg(long, default_value_t = 500)]
    rps: u32,

    /// HTTP client timeout in milliseconds
    #[arg(long, default_value_t = 3000)]
    timeout_ms: u64,

    /// Test duration in seconds, 0 runs until Ctrl-C
    #[arg(long, default_value_t = 0)]
    duration_secs: u64,
}

#[derive(Default)]
struct Counters {
    ok: AtomicU64,
    err: AtomicU64,
}

#[derive(Clone, Copy)]
struct Picker {
    mode: Mode,
    banner: i64,
    min: i64,
    max: i64,
}

impl Picker {
    fn pick(&self) -> i64 {
        match self.mode {
            Mode::Single => self.banner,
            Mode::Range => rand::thread_rng().gen_range(self.min..=self.max),
        }
    }
}

/// Split `rps` over `max(1, rps / 10)` workers, remainder to the first ones.
fn worker_rates(rps: u32) -> Vec<u32> {
    let workers = (rps / 10).max(1);
    let per = rps / workers;
    let rem = rps % workers;
    (0..workers).map(|i| if i < rem { per + 1 } else { per }).collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.rps == 0 {
        bail!("rps must be > 0");
    }
    if args.mode == Mode::Range && args.min > args.max {
        bail!("min must be <= max");
    }

    let client = reqwest::Client::builder()
        .timeout(Duration::from_millis(args.timeout_ms))
        .pool_max_idle_per_host(1000)
        .pool_idle_timeout(Duration::from_secs(90))
        .build()
        .context("Failed to build HTTP client")?;

    let stop = Shutdown::new();
    let counters = Arc::new(Counters::default());
    let base = args.base_url.trim_end_matches('/').to_string();
    let picker = Picker {
        mode: args.mode,
        banner: args.banner,
        min: args.min,
        max: args.max,
    };

    {
        let stop = stop.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                stop.trigger();
            }
        });
    }
    if args.duration_secs > 0 {
        let stop = stop.clone();
        let duration = Duration::from_secs(args.duration_secs);
        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            stop.trigger();
        });
    }

    tokio::spawn(report(counters.clone(), stop.clone()));

    let mut workers = Vec::new();
    for rate in worker_rates(args.rps) {
        workers.push(tokio::spawn(worker(
            client.clone(),
            base.clone(),
            picker,
            rate,
            counters.clone(),
            stop.clone(),
        )));
    }

    stop.wait().await;
    for handle in workers {
        let _ = handle.await;
    }

    println!(
        "done: totalOK={} totalERR={}",
        counters.ok.load(Ordering::Relaxed),
        counters.err.load(Ordering::Relaxed)
    );
    Ok(())
}

async fn report(counters: Arc<Counters>, stop: Shutdown) {
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    ticker.tick().await;
    let (mut prev_ok, mut prev_err) = (0, 0);

    loop {
        tokio::select! {
            _ = stop.wait() => return,
            _ = ticker.tick() => {
                let ok = counters.ok.load(Ordering::Relaxed);
                let err = counters.err.load(Ordering::Relaxed);
                println!(
                    "OK/s={} ERR/s={}  totalOK={} totalERR={}",
                    ok - prev_ok,
                    err - prev_err,
                    ok,
                    err
                );
                prev_ok = ok;
                prev_err = err;
            }
        }
    }
}

async fn worker(
    client: reqwest::Client,
    base: String,
    picker: Picker,
    rate: u32,
    counters: Arc<Counters>,
    stop: Shutdown,
) {
    if rate == 0 {
        return;
    }
    let mut ticker = tokio::time::interval(Duration::from_secs(1) / rate);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = stop.wait() => return,
            _ = ticker.tick() => {
                let url = format!("{}/counter/{}", base, picker.pick());
                let result = client
                    .get(&url)
                    .header(reqwest::header::CACHE_CONTROL, "no-store")
                    .send()
                    .await;
                match result {
                    Ok(resp) if resp.status().is_success() => {
                        counters.ok.fetch_add(1, Ordering::Relaxed);
                    }
                    _ => {
                        counters.err.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_rates_cover_target() {
        assert_eq!(worker_rates(5), vec![5]);
        assert_eq!(worker_rates(25), vec![13, 12]);

        let rates = worker_rates(507);
        assert_eq!(rates.len(), 50);
        assert_eq!(rates.iter().sum::<u32>(), 507);
    }

    #[test]
    fn test_range_picker_stays_in_bounds() {
        let picker = Picker { mode: Mode::Range, banner: 0, min: 3, max: 5 };
        for _ in 0..200 {
            let id = picker.pick();
            assert!((3..=5).contains(&id));
        }
    }
}
