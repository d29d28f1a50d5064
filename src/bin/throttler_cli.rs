// src/bin/throttler_cli.rs

use prettytable::{row, Table};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use structopt::StructOpt;
use tokio::time;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use throttler::config::{InMemoryConfig, RedisConfig};
use throttler::storage::{MemoryStorage, RedisStorage, StorageBackend};
use throttler::{
    ElasticWindowSettings, FixedWindowSettings, HydratorFactory, LeakyBucketSettings,
    MovingWindowSettings, RateLimiter, RateLimiterConfig, Throttle, ThrottleSettings,
    ThrottlerFactory,
};

#[derive(Debug, StructOpt)]
#[structopt(
    name = "throttler_cli",
    about = "A CLI for trying out throttling algorithms"
)]
struct Opt {
    /// Throttling algorithm to use
    #[structopt(short, long, possible_values = &["fixed_window", "elastic_window", "moving_window", "leaky_bucket"], default_value = "fixed_window")]
    algorithm: String,

    /// Identifier to throttle (random if omitted)
    #[structopt(short, long)]
    key: Option<String>,

    /// Maximum attempts, hits or tokens per window
    #[structopt(short, long, default_value = "10")]
    limit: u64,

    /// Window duration in seconds
    #[structopt(short, long, default_value = "60")]
    window_seconds: u64,

    /// Leaky bucket level above which hits are held back (defaults to half the limit)
    #[structopt(long)]
    threshold: Option<u64>,

    /// Load the rate limiter from a JSON config file instead of the flags above
    #[structopt(short, long, parse(from_os_str))]
    config: Option<PathBuf>,

    /// Use Redis at this URL instead of in-memory storage
    #[structopt(long)]
    redis_url: Option<String>,

    /// Simulation mode
    #[structopt(long, possible_values = &["burst", "steady", "jitter"], default_value = "burst")]
    simulation: String,

    /// Number of requests to simulate
    #[structopt(short = "n", long, default_value = "20")]
    num_requests: usize,

    /// Time between requests in milliseconds (for steady and jitter modes)
    #[structopt(short = "t", long, default_value = "100")]
    request_interval_ms: u64,

    /// Verbosity level
    #[structopt(short, long, parse(from_occurrences))]
    verbose: usize,

    /// Disable logs
    #[structopt(long)]
    disable_logs: bool,
}

impl Opt {
    fn settings(&self) -> ThrottleSettings {
        let window = Duration::from_secs(self.window_seconds);
        match self.algorithm.as_str() {
            "elastic_window" => ElasticWindowSettings::new(self.limit, window).into(),
            "moving_window" => MovingWindowSettings::new(self.limit, window).into(),
            "leaky_bucket" => {
                let threshold = self.threshold.unwrap_or(self.limit / 2);
                LeakyBucketSettings::new(self.limit, window, threshold).into()
            }
            _ => FixedWindowSettings::new(self.limit, window).into(),
        }
    }

    fn rate_limiter_config(&self) -> throttler::Result<RateLimiterConfig> {
        match &self.config {
            Some(path) => RateLimiterConfig::from_file(path),
            None => {
                let mut config = RateLimiterConfig::new(self.settings());
                config.key_prefix = "cli".to_string();
                Ok(config)
            }
        }
    }
}

/// Outcome of one simulated request
struct Sample {
    allowed: bool,
    count: f64,
    latency: Duration,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let opt = Opt::from_args();

    let log_level = match (opt.disable_logs, opt.verbose) {
        (true, _) => "error",
        (false, 0) => "info",
        (false, 1) => "debug",
        _ => "trace",
    };
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::new(format!(
            "throttler_cli={},throttler={}",
            log_level, log_level
        )))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = opt.rate_limiter_config()?;
    info!(
        algorithm = config.settings.algorithm(),
        key_prefix = %config.key_prefix,
        "Starting throttler CLI"
    );

    match &opt.redis_url {
        Some(url) => {
            let storage = RedisStorage::new(RedisConfig {
                url: url.clone(),
                connection_timeout: Duration::from_secs(2),
            })
            .await?;
            storage.ping().await?;
            run_simulation(&opt, &config, storage).await
        }
        None => {
            let storage = MemoryStorage::new(InMemoryConfig::default());
            run_simulation(&opt, &config, storage).await
        }
    }
}

async fn run_simulation<S>(
    opt: &Opt,
    config: &RateLimiterConfig,
    storage: S,
) -> Result<(), Box<dyn std::error::Error>>
where
    S: StorageBackend,
{
    let limiter = RateLimiter::new(
        ThrottlerFactory::new(storage),
        HydratorFactory::new(config.key_prefix.clone()),
        config.settings.clone(),
    );
    let identifier = opt
        .key
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let throttler = limiter.get(identifier.as_str())?;

    if let ThrottleSettings::LeakyBucket(settings) = limiter.settings() {
        warn!(
            threshold = settings.threshold(),
            "Leaky bucket holds back every request above the threshold; the run may take a while"
        );
    }

    let base_interval = Duration::from_millis(opt.request_interval_ms);
    let started = Instant::now();
    let mut samples = Vec::with_capacity(opt.num_requests);

    for i in 0..opt.num_requests {
        let request_time = Instant::now();
        let allowed = throttler.access().await?;
        let latency = request_time.elapsed();
        let count = throttler.count().await?;

        if allowed {
            info!(request = i + 1, count, ?latency, "ALLOWED");
        } else {
            warn!(request = i + 1, count, limit = throttler.limit(), "DENIED");
        }
        samples.push(Sample {
            allowed,
            count,
            latency,
        });

        let interval = match opt.simulation.as_str() {
            "burst" => Duration::ZERO,
            "steady" => base_interval,
            "jitter" => base_interval.mul_f64(rand::random::<f64>() + 0.5),
            other => {
                error!("Unknown simulation mode: {}", other);
                return Err("Unknown simulation mode".into());
            }
        };
        let elapsed = request_time.elapsed();
        if elapsed < interval {
            time::sleep(interval - elapsed).await;
        }
    }

    print_summary(opt, &throttler, &samples, started.elapsed());
    Ok(())
}

fn print_summary<T: Throttle>(opt: &Opt, throttler: &T, samples: &[Sample], elapsed: Duration) {
    let allowed = samples.iter().filter(|s| s.allowed).count();
    let delayed = samples
        .iter()
        .filter(|s| s.latency >= Duration::from_millis(500))
        .count();
    let peak = samples.iter().map(|s| s.count).fold(0.0, f64::max);

    let mut table = Table::new();
    table.add_row(row!["Algorithm", throttler.algorithm()]);
    table.add_row(row!["Key", throttler.key()]);
    table.add_row(row!["Limit", throttler.limit()]);
    table.add_row(row!["Window", format!("{:?}", throttler.window())]);
    table.add_row(row!["Simulation", opt.simulation]);
    table.add_row(row!["Requests", samples.len()]);
    table.add_row(row!["Allowed", allowed]);
    table.add_row(row!["Denied", samples.len() - allowed]);
    table.add_row(row!["Held back", delayed]);
    table.add_row(row!["Peak count", format!("{:.2}", peak)]);
    table.add_row(row!["Time elapsed", format!("{:?}", elapsed)]);

    println!();
    table.printstd();
}
