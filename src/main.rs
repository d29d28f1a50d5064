use dotenv::dotenv;
use std::env;
use throttler::config::InMemoryConfig;
use throttler::storage::MemoryStorage;
use throttler::{init_logging, RateLimiter, RateLimiterConfig, Throttle, ThrottlerFactory};
use tracing::{debug, error, info, warn};

// Reads THROTTLER_CONFIG (a JSON file) and THROTTLER_IDENTIFIER from the
// environment, then reports the current state of that identifier.
#[tokio::main]
async fn main() {
    dotenv().ok();
    init_logging();
    info!("Throttler starting up");

    let config = match env::var("THROTTLER_CONFIG") {
        Ok(path) => match RateLimiterConfig::from_file(&path) {
            Ok(config) => config,
            Err(err) => {
                error!(path = %path, error = %err, "Could not load configuration");
                std::process::exit(1);
            }
        },
        Err(_) => {
            warn!("THROTTLER_CONFIG must point to a rate limiter config file");
            std::process::exit(2);
        }
    };
    debug!(?config, "Configuration loaded");

    let identifier = env::var("THROTTLER_IDENTIFIER").unwrap_or_else(|_| "anonymous".to_string());
    let limiter = RateLimiter::from_config(
        ThrottlerFactory::new(MemoryStorage::new(InMemoryConfig::default())),
        &config,
    );

    let throttler = match limiter.get(identifier.as_str()) {
        Ok(throttler) => throttler,
        Err(err) => {
            error!(error = %err, "Could not build throttler");
            std::process::exit(1);
        }
    };

    match throttler.access().await {
        Ok(allowed) => info!(
            algorithm = throttler.algorithm(),
            key = throttler.key(),
            allowed,
            "Throttle decision"
        ),
        Err(err) => error!(error = %err, "Throttle check failed"),
    }
}
