use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};

pub const DEFAULT_PUBMED_EFETCH_URL: &str =
    "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/efetch.fcgi";
pub const DEFAULT_LLM_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_NODE_NORMALIZER_URL: &str =
    "https://nodenormalization-sri.renci.org/1.3/get_normalized_nodes";
// localhost and *.renci.org, any port
pub const DEFAULT_CORS_ORIGIN_PATTERN: &str =
    r"^https?://(((.+\.)*?renci\.org)|(localhost))(:\d{1,5})?(/.*)?$";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
    Compact,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: String,
    pub format: LogFormat,
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub openai_api_key: Option<String>,
    pub llm_base_url: String,
    pub llm_timeout: Duration,
    pub pubmed_efetch_url: String,
    pub pubmed_max_retries: u32,
    pub pubmed_timeout: Duration,
    pub cache_dir: PathBuf,
    pub node_normalizer_url: String,
    pub resolve_node_labels: bool,
    pub cors_origin_pattern: String,
    pub dev_mode: bool,
    pub transcript_path: Option<PathBuf>,
    pub log: LogConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup so tests never touch the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let pubmed_max_retries: u32 = var("PUBMED_MAX_RETRIES", "5")
            .parse()
            .context("PUBMED_MAX_RETRIES must be a positive integer")?;
        if pubmed_max_retries == 0 {
            bail!("PUBMED_MAX_RETRIES must be at least 1");
        }

        let format = match var("LOG_FORMAT", "json").to_lowercase().as_str() {
            "json" => LogFormat::Json,
            "pretty" => LogFormat::Pretty,
            "compact" => LogFormat::Compact,
            other => bail!("unsupported LOG_FORMAT '{}'", other),
        };

        // An explicitly empty TRANSCRIPT_PATH disables the transcript.
        let transcript_path = match lookup("TRANSCRIPT_PATH") {
            Some(path) if path.trim().is_empty() => None,
            Some(path) => Some(PathBuf::from(path)),
            None => Some(PathBuf::from("logs/kg_summarizer_manual.log")),
        };

        Ok(Config {
            port: var("PORT", "8080").parse().context("PORT must be a port number")?,
            openai_api_key: non_empty("OPENAI_API_KEY"),
            llm_base_url: var("LLM_BASE_URL", DEFAULT_LLM_BASE_URL),
            llm_timeout: Duration::from_secs(
                var("LLM_TIMEOUT_SECS", "600")
                    .parse()
                    .context("LLM_TIMEOUT_SECS must be a number of seconds")?,
            ),
            pubmed_efetch_url: var("PUBMED_EFETCH_URL", DEFAULT_PUBMED_EFETCH_URL),
            pubmed_max_retries,
            pubmed_timeout: Duration::from_secs(
                var("PUBMED_TIMEOUT_SECS", "30")
                    .parse()
                    .context("PUBMED_TIMEOUT_SECS must be a number of seconds")?,
            ),
            cache_dir: PathBuf::from(var("CACHE_DIR", "cache")),
            node_normalizer_url: var("NODE_NORMALIZER_URL", DEFAULT_NODE_NORMALIZER_URL),
            resolve_node_labels: parse_flag(&var("RESOLVE_NODE_LABELS", "false"))
                .context("RESOLVE_NODE_LABELS must be true or false")?,
            cors_origin_pattern: var("CORS_ORIGIN_PATTERN", DEFAULT_CORS_ORIGIN_PATTERN),
            dev_mode: var("APP_ENV", "production").eq_ignore_ascii_case("dev"),
            transcript_path,
            log: LogConfig {
                level: var("LOG_LEVEL", "info"),
                format,
                file: non_empty("LOG_FILE").map(PathBuf::from),
            },
        })
    }

    pub fn pubmed_cache_dir(&self) -> PathBuf {
        self.cache_dir.join("pubmed_abstracts")
    }
}

fn parse_flag(value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("invalid boolean '{}'", other),
    }
}
