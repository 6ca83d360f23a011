use clap::{Parser, ValueEnum};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "research-server", version, about = "Recursive deep-research server")]
pub struct ServerConfig {
    #[arg(long, env = "RESEARCH_SERVER_PORT", default_value_t = 8095)]
    pub port: u16,

    #[arg(long, env = "SEARX_HOST", default_value = "localhost")]
    pub searx_host: String,

    #[arg(long, env = "SEARX_PORT", default_value_t = 8096)]
    pub searx_port: u16,

    /// Results kept per search query
    #[arg(long, env = "RESEARCH_MAX_SEARCH_RESULTS", default_value_t = 5)]
    pub max_search_results: usize,

    #[arg(long, env = "RESEARCH_SEARCH_CACHE_TTL_SECS", default_value_t = 3600)]
    pub search_cache_ttl_secs: u64,

    #[arg(long, env = "RESEARCH_FETCH_TIMEOUT_SECS", default_value_t = 15)]
    pub fetch_timeout_secs: u64,

    /// Largest depth a request may ask for
    #[arg(long, env = "RESEARCH_MAX_DEPTH", default_value_t = 5)]
    pub max_depth: u32,

    /// Largest breadth a request may ask for
    #[arg(long, env = "RESEARCH_MAX_BREADTH", default_value_t = 10)]
    pub max_breadth: usize,

    #[arg(long, env = "RESEARCH_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}

impl ServerConfig {
    pub fn searx_url(&self) -> String {
        format!("http://{}:{}", self.searx_host, self.searx_port)
    }

    pub fn search_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.search_cache_ttl_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_defaults() {
        let config = ServerConfig::try_parse_from([
            "research-server",
            "--port",
            "9000",
            "--searx-host",
            "searx.internal",
            "--max-depth",
            "3",
            "--log-format",
            "json",
        ])
        .unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.searx_url(), "http://searx.internal:8096");
        assert_eq!(config.max_depth, 3);
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn durations_come_from_seconds() {
        let config = ServerConfig::try_parse_from([
            "research-server",
            "--search-cache-ttl-secs",
            "60",
            "--fetch-timeout-secs",
            "2",
        ])
        .unwrap();
        assert_eq!(config.search_cache_ttl(), Duration::from_secs(60));
        assert_eq!(config.fetch_timeout(), Duration::from_secs(2));
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(ServerConfig::try_parse_from(["research-server", "--port", "not-a-port"]).is_err());
        assert!(ServerConfig::try_parse_from(["research-server", "--log-format", "xml"]).is_err());
    }
}
