use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub transients: TransientConfig,
    pub personalization: PersonalizationConfig,
    pub documents: DocumentConfig,
    pub rate_limits: RateLimitConfig,
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: usize,
    /// Peers allowed to report the caller address through `X-Forwarded-For`.
    #[serde(default)]
    pub trusted_proxies: Vec<IpAddr>,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransientBackend {
    Memory,
    Redis,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransientConfig {
    pub backend: TransientBackend,
    pub redis_url: String,
    pub profile_ttl_seconds: u64,
    #[serde(default = "default_purge_interval")]
    pub purge_interval_seconds: u64,
}

fn default_purge_interval() -> u64 {
    60
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonalizationConfig {
    pub default_limit: usize,
    pub max_limit: usize,
    pub top_interests: usize,
    pub recently_viewed_cap: usize,
    pub price_window: usize,
    /// Keep budget, upsell and value results in band order instead of shuffling them.
    pub preserve_band_order: bool,
    pub currency_symbol: String,
    pub history_cap: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentConfig {
    pub secure_auth_key: String,
    pub admin_api_key: String,
    pub token_ttl_hours: i64,
    pub cache_ttl_seconds: u64,
    pub warranty_months: u32,
    pub site_name: String,
    pub site_url: String,
    pub store_address: String,
    pub admin_email: String,
    pub tax_label: String,
    pub qr_service_url: String,
    pub activity_log_cap: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateLimitPolicy {
    pub max_requests: u64,
    pub window_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub documents: RateLimitPolicy,
    pub verify_page: RateLimitPolicy,
    pub verify_api: RateLimitPolicy,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// JSON file with `products` and `orders` arrays loaded at startup.
    pub seed_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                workers: num_cpus::get(),
                trusted_proxies: Vec::new(),
            },
            transients: TransientConfig {
                backend: TransientBackend::Memory,
                redis_url: "redis://localhost:6379".to_string(),
                profile_ttl_seconds: 86400 * 30,
                purge_interval_seconds: default_purge_interval(),
            },
            personalization: PersonalizationConfig {
                default_limit: 8,
                max_limit: 48,
                top_interests: 3,
                recently_viewed_cap: 50,
                price_window: 20,
                preserve_band_order: false,
                currency_symbol: "₺".to_string(),
                history_cap: 100_000,
            },
            documents: DocumentConfig {
                secure_auth_key: "change-me".to_string(),
                admin_api_key: "change-me-admin".to_string(),
                token_ttl_hours: 24,
                cache_ttl_seconds: 3600,
                warranty_months: 24,
                site_name: "Bi-Siparis".to_string(),
                site_url: "http://localhost:8080".to_string(),
                store_address: "No address on file".to_string(),
                admin_email: "admin@localhost".to_string(),
                tax_label: "KDV (%18)".to_string(),
                qr_service_url: "https://api.qrserver.com/v1/create-qr-code/?size=150x150&data="
                    .to_string(),
                activity_log_cap: 10_000,
            },
            rate_limits: RateLimitConfig {
                documents: RateLimitPolicy {
                    max_requests: 10,
                    window_seconds: 300,
                },
                verify_page: RateLimitPolicy {
                    max_requests: 5,
                    window_seconds: 60,
                },
                verify_api: RateLimitPolicy {
                    max_requests: 20,
                    window_seconds: 60,
                },
            },
            store: StoreConfig::default(),
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let defaults = config::Config::try_from(&Config::default())?;
        let settings = config::Config::builder()
            .add_source(defaults)
            .add_source(config::File::with_name(path))
            .add_source(
                config::Environment::with_prefix("BISIPARIS")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Loads `path` when it exists, otherwise falls back to the defaults.
    pub fn load_or_default(path: &str) -> anyhow::Result<Self> {
        if std::path::Path::new(path).exists() {
            Self::from_file(path)
        } else {
            tracing::info!("Config file {} not found, using default configuration", path);
            Ok(Self::default())
        }
    }
}
