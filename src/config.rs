use crate::error::ScanError;
use crate::rpc::{DEFAULT_MAX_RETRIES, DEFAULT_REQUEST_TIMEOUT};
use anyhow::{Context, Result};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_CHUNK_SIZE: u64 = 500;
pub const DEFAULT_LOG_FETCH_CONCURRENCY: usize = 4;
pub const DEFAULT_ENRICHMENT_CONCURRENCY: usize = 5;
pub const DEFAULT_OUTPUT_PATH: &str = "scan-results.json";

/// End of the scanned range. `Latest` is pinned to the chain height once, when the scan starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockTarget {
    #[default]
    Latest,
    Number(u64),
}

impl FromStr for BlockTarget {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("latest") {
            return Ok(BlockTarget::Latest);
        }
        let number = s
            .parse()
            .with_context(|| format!("Invalid block target '{}', expected a number or 'latest'", s))?;
        Ok(BlockTarget::Number(number))
    }
}

impl fmt::Display for BlockTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockTarget::Latest => f.write_str("latest"),
            BlockTarget::Number(n) => write!(f, "{}", n),
        }
    }
}

/// What to do with a chunk whose logs still cannot be fetched after retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChunkFailurePolicy {
    #[default]
    Abort,
    /// Record the range in `skippedRanges` and keep scanning.
    Skip,
}

impl FromStr for ChunkFailurePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abort" => Ok(ChunkFailurePolicy::Abort),
            "skip" => Ok(ChunkFailurePolicy::Skip),
            other => Err(anyhow::anyhow!(
                "Invalid chunk failure policy '{}', expected 'abort' or 'skip'",
                other
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub chunk_size: u64,
    pub log_fetch_concurrency: usize,
    pub enrichment_concurrency: usize,
    /// Extra attempts per chunk on top of the first one.
    pub chunk_retries: usize,
    pub retry_base_delay: Duration,
    pub on_chunk_failure: ChunkFailurePolicy,
}

impl Default for ScanConfig {
    fn default() -> Self {
        ScanConfig {
            chunk_size: DEFAULT_CHUNK_SIZE,
            log_fetch_concurrency: DEFAULT_LOG_FETCH_CONCURRENCY,
            enrichment_concurrency: DEFAULT_ENRICHMENT_CONCURRENCY,
            chunk_retries: 0,
            retry_base_delay: Duration::from_millis(250),
            on_chunk_failure: ChunkFailurePolicy::Abort,
        }
    }
}

impl ScanConfig {
    pub fn validate(&self) -> Result<(), ScanError> {
        if self.chunk_size == 0 {
            return Err(ScanError::InvalidConfig("chunk size must be at least 1".into()));
        }
        if self.log_fetch_concurrency == 0 {
            return Err(ScanError::InvalidConfig(
                "log fetch concurrency must be at least 1".into(),
            ));
        }
        if self.enrichment_concurrency == 0 {
            return Err(ScanError::InvalidConfig(
                "enrichment concurrency must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub json_rpc_urls: Vec<String>,
    pub from_block: u64,
    pub to_block: BlockTarget,
    pub output_path: PathBuf,
    pub request_timeout: Duration,
    pub rpc_max_retries: usize,
    pub scan: ScanConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from a key lookup using the same variable names as
    /// the environment. Lets callers layer CLI flags over env values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let json_rpc_urls: Vec<String> = lookup("JSON_RPC_URLS")
            .or_else(|| lookup("JSON_RPC_URL"))
            .context("JSON_RPC_URL or JSON_RPC_URLS must be set")?
            .split(',')
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .collect();

        let from_block = lookup("FROM_BLOCK")
            .context("FROM_BLOCK must be set")?
            .trim()
            .parse()
            .context("Invalid FROM_BLOCK")?;

        let defaults = ScanConfig::default();
        let scan = ScanConfig {
            chunk_size: parse_or(&lookup, "CHUNK_SIZE", defaults.chunk_size)?,
            log_fetch_concurrency: parse_or(
                &lookup,
                "LOG_FETCH_CONCURRENCY",
                defaults.log_fetch_concurrency,
            )?,
            enrichment_concurrency: parse_or(
                &lookup,
                "ENRICHMENT_CONCURRENCY",
                defaults.enrichment_concurrency,
            )?,
            chunk_retries: parse_or(&lookup, "CHUNK_RETRIES", defaults.chunk_retries)?,
            retry_base_delay: Duration::from_millis(parse_or(
                &lookup,
                "CHUNK_RETRY_DELAY_MS",
                defaults.retry_base_delay.as_millis() as u64,
            )?),
            on_chunk_failure: parse_or(&lookup, "ON_CHUNK_FAILURE", defaults.on_chunk_failure)?,
        };

        let config = Config {
            json_rpc_urls,
            from_block,
            to_block: parse_or(&lookup, "TO_BLOCK", BlockTarget::Latest)?,
            output_path: lookup("OUTPUT_PATH")
                .unwrap_or_else(|| DEFAULT_OUTPUT_PATH.to_string())
                .into(),
            request_timeout: Duration::from_secs(parse_or(
                &lookup,
                "RPC_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT.as_secs(),
            )?),
            rpc_max_retries: parse_or(&lookup, "RPC_MAX_RETRIES", DEFAULT_MAX_RETRIES)?,
            scan,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.json_rpc_urls.is_empty() {
            anyhow::bail!("At least one RPC URL must be provided");
        }
        if let BlockTarget::Number(to) = self.to_block {
            if self.from_block > to {
                anyhow::bail!(
                    "FROM_BLOCK {} is greater than TO_BLOCK {}",
                    self.from_block,
                    to
                );
            }
        }
        self.scan.validate()?;
        Ok(())
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid {}: {}", key, e)),
        None => Ok(default),
    }
}
