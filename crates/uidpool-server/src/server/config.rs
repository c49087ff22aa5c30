use anyhow::{Context, bail};
use clap::Parser;
use core::time::Duration;
use uidpool::{LockRelease, PoolConfig};

/// Runtime configuration for the `uidpool-server` binary.
///
/// These settings control where the pool lives, when it is refilled, how big
/// each refill is, and how patiently requests wait for a refill to land. All
/// values are parsed from CLI arguments or environment variables, with
/// defaults suitable for a single Redis instance.
///
/// Every process pointing at the same `POOL_KEY` must use the same
/// `LOCK_KEY` and `COUNTER_KEY`, otherwise refills are no longer mutually
/// exclusive or identifiers may collide.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "uidpool-server",
    version,
    about = "Serves pre-minted unique IDs from a Redis-backed pool"
)]
pub struct CliArgs {
    /// Redis connection URL.
    ///
    /// Environment variable: `REDIS_URL`
    #[arg(long, env = "REDIS_URL", default_value_t = String::from("redis://127.0.0.1:6379/"))]
    pub redis_url: String,

    /// Key of the Redis list holding pre-minted IDs.
    ///
    /// Environment variable: `POOL_KEY`
    #[arg(long, env = "POOL_KEY", default_value_t = String::from("uidpool:ids"))]
    pub pool_key: String,

    /// Key of the refill lock. Defaults to `<POOL_KEY>:lock`.
    ///
    /// Environment variable: `LOCK_KEY`
    #[arg(long, env = "LOCK_KEY")]
    pub lock_key: Option<String>,

    /// Key of the counter that IDs are reserved from.
    ///
    /// Each refill reserves `BATCH_SIZE` consecutive values with `INCRBY`, so
    /// IDs stay unique across every server sharing this key.
    ///
    /// Environment variable: `COUNTER_KEY`
    #[arg(long, env = "COUNTER_KEY", default_value_t = String::from("uidpool:counter"))]
    pub counter_key: String,

    /// Low watermark. A refill is attempted once the pool holds this many IDs
    /// or fewer.
    ///
    /// Environment variable: `THRESHOLD`
    #[arg(long, env = "THRESHOLD", default_value_t = 1_000)]
    pub threshold: u64,

    /// Number of IDs reserved per refill.
    ///
    /// Environment variable: `BATCH_SIZE`
    #[arg(long, env = "BATCH_SIZE", default_value_t = 5_000)]
    pub batch_size: u64,

    /// Number of pop attempts per request before answering 503.
    ///
    /// Environment variable: `RETRY_TIMES`
    #[arg(long, env = "RETRY_TIMES", default_value_t = 3)]
    pub retry_times: u32,

    /// Delay between pop attempts, in milliseconds.
    ///
    /// Environment variable: `RETRY_SLEEP_MS`
    #[arg(long, env = "RETRY_SLEEP_MS", default_value_t = 100)]
    pub retry_sleep_ms: u64,

    /// Interval of the background refill loop, in milliseconds.
    ///
    /// Environment variable: `MAINTAIN_INTERVAL_MS`
    #[arg(long, env = "MAINTAIN_INTERVAL_MS", default_value_t = 1_000)]
    pub maintain_interval_ms: u64,

    /// Time-to-live of the refill lock, in seconds.
    ///
    /// Must exceed the slowest expected refill. It bounds how long a crashed
    /// server can block refills for everyone else.
    ///
    /// Environment variable: `LOCK_TTL_SECS`
    #[arg(long, env = "LOCK_TTL_SECS", default_value_t = 60)]
    pub lock_ttl_secs: u64,

    /// Release the refill lock with compare-and-delete on a random token
    /// instead of an unconditional delete.
    ///
    /// Environment variable: `OWNED_LOCK`
    #[arg(long, env = "OWNED_LOCK", default_value_t = false)]
    pub owned_lock: bool,

    /// Address to listen on.
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = String::from("0.0.0.0:8080"))]
    pub server_addr: String,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub redis_url: String,
    pub counter_key: String,
    pub batch_size: i64,
    pub server_addr: String,
    pub pool: PoolConfig,
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.batch_size == 0 {
            bail!("BATCH_SIZE must be greater than 0");
        }

        let batch_size = i64::try_from(args.batch_size)
            .with_context(|| format!("BATCH_SIZE ({}) exceeds i64::MAX", args.batch_size))?;

        if args.counter_key.is_empty() {
            bail!("COUNTER_KEY must not be empty");
        }

        let mut builder = PoolConfig::builder(args.pool_key)
            .threshold(args.threshold)
            .retry_times(args.retry_times)
            .retry_sleep(Duration::from_millis(args.retry_sleep_ms))
            .maintain_interval(Duration::from_millis(args.maintain_interval_ms))
            .lock_ttl(Duration::from_secs(args.lock_ttl_secs))
            .lock_release(if args.owned_lock {
                LockRelease::Owned
            } else {
                LockRelease::Unconditional
            });
        if let Some(lock_key) = args.lock_key {
            builder = builder.lock_key(lock_key);
        }
        let pool = builder.build()?;

        if args.counter_key == pool.pool_key() || args.counter_key == pool.lock_key() {
            bail!(
                "COUNTER_KEY ({}) must differ from POOL_KEY and LOCK_KEY",
                args.counter_key
            );
        }

        Ok(Self {
            redis_url: args.redis_url,
            counter_key: args.counter_key,
            batch_size,
            server_addr: args.server_addr,
            pool,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> anyhow::Result<ServerConfig> {
        let args = CliArgs::try_parse_from(
            ["uidpool-server", "--pool-key", "ids", "--counter-key", "ctr"]
                .iter()
                .chain(extra),
        )?;
        ServerConfig::try_from(args)
    }

    #[test]
    fn builds_pool_config_from_args() {
        let config = parse(&[
            "--threshold",
            "10",
            "--batch-size",
            "50",
            "--retry-times",
            "7",
            "--retry-sleep-ms",
            "25",
            "--owned-lock",
        ])
        .unwrap();

        assert_eq!(config.batch_size, 50);
        assert_eq!(config.pool.pool_key(), "ids");
        assert_eq!(config.pool.lock_key(), "ids:lock");
        assert_eq!(config.pool.threshold(), 10);
        assert_eq!(config.pool.retry_times(), 7);
        assert_eq!(config.pool.retry_sleep(), Duration::from_millis(25));
        assert_eq!(config.pool.lock_release(), LockRelease::Owned);
    }

    #[test]
    fn rejects_zero_batch_size() {
        let err = parse(&["--batch-size", "0"]).unwrap_err();
        assert!(err.to_string().contains("BATCH_SIZE"), "{err}");
    }

    #[test]
    fn rejects_oversized_batch() {
        let too_big = (i64::MAX as u64 + 1).to_string();
        assert!(parse(&["--batch-size", &too_big]).is_err());
    }

    #[test]
    fn rejects_zero_retry_times() {
        let err = parse(&["--retry-times", "0"]).unwrap_err();
        assert!(err.to_string().contains("retry_times"), "{err}");
    }

    #[test]
    fn rejects_counter_key_reuse() {
        assert!(parse(&["--lock-key", "ctr"]).is_err());
    }
}
