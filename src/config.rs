use anyhow::{Context, Result};
use clap::Parser;
use std::env;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub api_base_url: String,
    pub bot_token: String,
    pub home_shard: i32,
    pub storage_channel: i64,
    pub max_bandwidth: u64,
    pub enforce_bandwidth: bool,
    pub cache_sweep_secs: u64,
    pub fetch_retry_limit: u32,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "HTTP range-streaming gateway for chat-platform media")]
pub struct Args {
    /// Host to bind to (overrides GATEWAY_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides GATEWAY_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Database URL (overrides GATEWAY_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Platform storage API base URL (overrides GATEWAY_API_BASE_URL)
    #[arg(long)]
    pub api_base_url: Option<String>,

    /// Bot token for the platform API (overrides GATEWAY_BOT_TOKEN)
    #[arg(long)]
    pub bot_token: Option<String>,

    /// Shard the bot account is homed on (overrides GATEWAY_HOME_SHARD)
    #[arg(long)]
    pub home_shard: Option<i32>,

    /// Storage channel holding relayed files (overrides GATEWAY_STORAGE_CHANNEL)
    #[arg(long)]
    pub storage_channel: Option<i64>,

    /// Bandwidth quota in bytes (overrides GATEWAY_MAX_BANDWIDTH)
    #[arg(long)]
    pub max_bandwidth: Option<u64>,

    /// Locator cache sweep interval in seconds (overrides GATEWAY_CACHE_SWEEP_SECS)
    #[arg(long)]
    pub cache_sweep_secs: Option<u64>,

    /// Chunk fetch retry cap (overrides GATEWAY_FETCH_RETRIES)
    #[arg(long)]
    pub fetch_retry_limit: Option<u32>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        // Parse CLI once
        let args = Args::parse();

        // --- Environment fallback ---
        let env_host = env::var("GATEWAY_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_db =
            env::var("GATEWAY_DATABASE_URL").unwrap_or_else(|_| "sqlite://./data/gateway.db".into());
        let env_api_base = env::var("GATEWAY_API_BASE_URL").ok();
        let env_token = env::var("GATEWAY_BOT_TOKEN").ok();
        let env_channel = env::var("GATEWAY_STORAGE_CHANNEL").ok();

        let env_port: u16 = env_parsed("GATEWAY_PORT", 8080)?;
        let env_home_shard: i32 = env_parsed("GATEWAY_HOME_SHARD", 1)?;
        // 100 GB unless configured otherwise.
        let env_max_bandwidth: u64 = env_parsed("GATEWAY_MAX_BANDWIDTH", 107_374_182_400)?;
        let env_enforce: bool = env_parsed("GATEWAY_ENFORCE_BANDWIDTH", true)?;
        let env_sweep: u64 = env_parsed("GATEWAY_CACHE_SWEEP_SECS", 30 * 60)?;
        let env_retries: u32 = env_parsed("GATEWAY_FETCH_RETRIES", 5)?;

        let storage_channel = match args.storage_channel {
            Some(id) => id,
            None => env_channel
                .context("GATEWAY_STORAGE_CHANNEL (or --storage-channel) is required")?
                .parse::<i64>()
                .context("parsing GATEWAY_STORAGE_CHANNEL")?,
        };

        // --- Merge ---
        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            database_url: args.database_url.unwrap_or(env_db),
            api_base_url: args
                .api_base_url
                .or(env_api_base)
                .context("GATEWAY_API_BASE_URL (or --api-base-url) is required")?,
            bot_token: args
                .bot_token
                .or(env_token)
                .context("GATEWAY_BOT_TOKEN (or --bot-token) is required")?,
            home_shard: args.home_shard.unwrap_or(env_home_shard),
            storage_channel,
            max_bandwidth: args.max_bandwidth.unwrap_or(env_max_bandwidth),
            enforce_bandwidth: env_enforce,
            cache_sweep_secs: args.cache_sweep_secs.unwrap_or(env_sweep),
            fetch_retry_limit: args.fetch_retry_limit.unwrap_or(env_retries),
        };

        Ok((cfg, args.migrate))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn env_parsed<T>(key: &'static str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {key} value `{value}`")),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {key}")),
    }
}
