use serde::Deserialize;

/// Main configuration structure for Catalog-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub http: HttpConfig,
    pub output: OutputConfig,
}

/// Crawl target and worker pool configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Scheme and host of the catalog site (e.g. "https://www.unisa.ac.za")
    pub host: String,

    /// Path of the index page listing every qualification
    #[serde(rename = "catalog-path")]
    pub catalog_path: String,

    /// Upper bound on concurrently processed qualification pages
    #[serde(rename = "max-qualification-workers", default = "default_workers")]
    pub max_qualification_workers: usize,

    /// Upper bound on concurrently resolved modules within one group
    #[serde(rename = "max-module-workers", default = "default_workers")]
    pub max_module_workers: usize,

    /// Number of cache insertions between durable snapshots
    #[serde(rename = "cache-flush-interval", default = "default_flush_interval")]
    pub cache_flush_interval: usize,
}

/// HTTP client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    /// Whole-request timeout in seconds
    #[serde(rename = "timeout-secs", default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(rename = "connect-timeout-secs", default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: default_timeout(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database holding documents and snapshots
    #[serde(rename = "database-path")]
    pub database_path: String,
}

impl CrawlerConfig {
    /// Size of the qualification worker pool
    ///
    /// The configured cap, further limited to the available parallelism plus a
    /// fixed headroom since the work is dominated by network waits.
    pub fn qualification_pool_size(&self) -> usize {
        let parallelism = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        self.max_qualification_workers
            .min(parallelism + POOL_HEADROOM)
            .max(1)
    }

    /// Size of the module worker pool for a group with `links` module links
    pub fn module_pool_size(&self, links: usize) -> usize {
        self.max_module_workers.min(links).max(1)
    }
}

const POOL_HEADROOM: usize = 4;

fn default_workers() -> usize {
    32
}

fn default_flush_interval() -> usize {
    256
}

fn default_user_agent() -> String {
    format!("catalog-harvest/{}", env!("CARGO_PKG_VERSION"))
}

fn default_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}
