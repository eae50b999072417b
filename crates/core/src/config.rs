use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub tor: TorConfig,
    #[serde(default)]
    pub crawl: CrawlConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeneralConfig {
    #[serde(default = "default_depth")]
    pub default_depth: u32,
    #[serde(default = "default_search_limit")]
    pub default_search_limit: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            default_depth: default_depth(),
            default_search_limit: default_search_limit(),
        }
    }
}

impl GeneralConfig {
    pub const DEPTH_RANGE: (u32, u32) = (1, 3);
    pub const SEARCH_LIMIT_RANGE: (usize, usize) = (10, 100);

    pub fn clamp_depth(depth: u32) -> u32 {
        depth.clamp(Self::DEPTH_RANGE.0, Self::DEPTH_RANGE.1)
    }

    pub fn clamp_search_limit(limit: usize) -> usize {
        limit.clamp(Self::SEARCH_LIMIT_RANGE.0, Self::SEARCH_LIMIT_RANGE.1)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct TorConfig {
    #[serde(default = "default_socks_proxy")]
    pub socks_proxy: String,
    #[serde(default = "default_control_addr")]
    pub control_addr: String,
    #[serde(default)]
    pub control_password: String,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    #[serde(default = "default_rotation_timeout")]
    pub rotation_timeout_seconds: u64,
    /// Wait after NEWNYM so the new circuit is built before the next request.
    #[serde(default = "default_rotation_settle")]
    pub rotation_settle_seconds: u64,
    /// Tor itself ignores NEWNYM more often than every 10s.
    #[serde(default = "default_rotation_min_interval")]
    pub rotation_min_interval_seconds: u64,
    #[serde(default = "default_health_timeout")]
    pub health_timeout_seconds: u64,
    #[serde(default = "default_max_body_size_mb")]
    pub max_body_size_mb: usize,
}

impl Default for TorConfig {
    fn default() -> Self {
        Self {
            socks_proxy: default_socks_proxy(),
            control_addr: default_control_addr(),
            control_password: String::new(),
            connect_timeout_seconds: default_connect_timeout(),
            request_timeout_seconds: default_request_timeout(),
            rotation_timeout_seconds: default_rotation_timeout(),
            rotation_settle_seconds: default_rotation_settle(),
            rotation_min_interval_seconds: default_rotation_min_interval(),
            health_timeout_seconds: default_health_timeout(),
            max_body_size_mb: default_max_body_size_mb(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AddressVersion {
    /// 16-char label, 22-char host.
    #[default]
    V2,
    /// 56-char label, 62-char host.
    V3,
}

impl AddressVersion {
    pub fn host_len(&self) -> usize {
        match self {
            AddressVersion::V2 => 22,
            AddressVersion::V3 => 62,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CrawlConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_pause")]
    pub retry_pause_seconds: u64,
    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_max_links")]
    pub max_links_per_page: usize,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default)]
    pub address_version: AddressVersion,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_pause_seconds: default_retry_pause(),
            min_delay_ms: default_min_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            max_links_per_page: default_max_links(),
            workers: default_workers(),
            address_version: AddressVersion::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_database_path")]
    pub database_path: String,
    #[serde(default = "default_key_path")]
    pub key_path: String,
    #[serde(default = "default_domains_per_scan")]
    pub domains_per_scan: usize,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            key_path: default_key_path(),
            domains_per_scan: default_domains_per_scan(),
            max_connections: default_max_connections(),
        }
    }
}

fn default_depth() -> u32 { 1 }
fn default_search_limit() -> usize { 25 }
fn default_socks_proxy() -> String { "127.0.0.1:9050".to_string() }
fn default_control_addr() -> String { "127.0.0.1:9051".to_string() }
fn default_connect_timeout() -> u64 { 30 }
fn default_request_timeout() -> u64 { 30 }
fn default_rotation_timeout() -> u64 { 15 }
fn default_rotation_settle() -> u64 { 5 }
fn default_rotation_min_interval() -> u64 { 10 }
fn default_health_timeout() -> u64 { 10 }
fn default_max_body_size_mb() -> usize { 10 }
fn default_max_retries() -> u32 { 3 }
fn default_retry_pause() -> u64 { 5 }
fn default_min_delay_ms() -> u64 { 3000 }
fn default_max_delay_ms() -> u64 { 7000 }
fn default_max_links() -> usize { 20 }
fn default_workers() -> usize { 1 }
fn default_database_path() -> String { "darkweb_data.db".to_string() }
fn default_key_path() -> String { "data_key.key".to_string() }
fn default_domains_per_scan() -> usize { 10 }
fn default_max_connections() -> u32 { 5 }
