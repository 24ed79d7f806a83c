use thiserror::Error;

use crate::index::bloom;
use crate::vault::IndexConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub node: NodeConfig,
    pub storage: StorageConfig,
    pub index: IndexSettings,
    /// Maximum upload size in bytes
    pub max_upload_size: u64,
}

#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub bind_address: String,
    pub data_dir: String,
}

#[derive(Debug, Clone)]
pub enum StorageBackend {
    Local,
    S3,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Directory for local storage backend
    pub local_storage_path: String,
    pub s3: S3Config,
}

#[derive(Debug, Clone)]
pub struct S3Config {
    pub endpoint: String,
    pub bucket: String,
    pub region: String,
    /// Required when backend is s3
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
}

/// Membership index sizing. Either explicit bits/hashes, or derived from a
/// target false-positive rate at an expected file count.
#[derive(Debug, Clone)]
pub struct IndexSettings {
    pub bloom_bits: u64,
    pub bloom_hashes: u32,
    pub expected_items: Option<u64>,
    pub false_positive_rate: f64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            data_dir: "./data".to_string(),
        }
    }
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:9000".to_string(),
            bucket: "files".to_string(),
            region: "us-east-1".to_string(),
            access_key: None,
            secret_key: None,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Local,
            local_storage_path: "./files".to_string(),
            s3: S3Config::default(),
        }
    }
}

impl Default for IndexSettings {
    fn default() -> Self {
        let defaults = IndexConfig::default();
        Self {
            bloom_bits: defaults.bloom_bits,
            bloom_hashes: defaults.bloom_hashes,
            expected_items: None,
            false_positive_rate: 0.01,
        }
    }
}

impl IndexSettings {
    /// Resolve to concrete index sizing.
    pub fn index_config(&self) -> Result<IndexConfig, ConfigError> {
        match self.expected_items {
            Some(items) => {
                let (bloom_bits, bloom_hashes) =
                    bloom::optimal_params(items, self.false_positive_rate)
                        .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
                Ok(IndexConfig {
                    bloom_bits,
                    bloom_hashes,
                })
            }
            None => Ok(IndexConfig {
                bloom_bits: self.bloom_bits,
                bloom_hashes: self.bloom_hashes,
            }),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let node_defaults = NodeConfig::default();
        let bind_address =
            std::env::var("BIND_ADDRESS").unwrap_or(node_defaults.bind_address);
        let data_dir = std::env::var("DATA_DIR").unwrap_or(node_defaults.data_dir);

        let max_upload_size = env_parse("MAX_UPLOAD_SIZE")?.unwrap_or(50 * 1024 * 1024); // 50MB

        let storage_backend = match std::env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "local".to_string())
            .to_lowercase()
            .as_str()
        {
            "s3" | "minio" => StorageBackend::S3,
            _ => StorageBackend::Local,
        };

        let local_storage_path =
            std::env::var("LOCAL_STORAGE_PATH").unwrap_or_else(|_| "./files".to_string());

        let s3_defaults = S3Config::default();
        let s3 = S3Config {
            endpoint: std::env::var("S3_ENDPOINT").unwrap_or(s3_defaults.endpoint),
            bucket: std::env::var("S3_BUCKET").unwrap_or(s3_defaults.bucket),
            region: std::env::var("S3_REGION").unwrap_or(s3_defaults.region),
            access_key: std::env::var("S3_ACCESS_KEY").ok(),
            secret_key: std::env::var("S3_SECRET_KEY").ok(),
        };

        let index_defaults = IndexSettings::default();
        let index = IndexSettings {
            bloom_bits: env_parse("BLOOM_BITS")?.unwrap_or(index_defaults.bloom_bits),
            bloom_hashes: env_parse("BLOOM_HASHES")?.unwrap_or(index_defaults.bloom_hashes),
            expected_items: env_parse("BLOOM_EXPECTED_ITEMS")?,
            false_positive_rate: env_parse("BLOOM_FP_RATE")?
                .unwrap_or(index_defaults.false_positive_rate),
        };

        let config = Config {
            node: NodeConfig {
                bind_address,
                data_dir,
            },
            storage: StorageConfig {
                backend: storage_backend,
                local_storage_path,
                s3,
            },
            index,
            max_upload_size,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.index.expected_items.is_none() {
            if self.index.bloom_bits == 0 {
                return Err(ConfigError::ValidationError(
                    "BLOOM_BITS must be greater than 0".to_string(),
                ));
            }
            if self.index.bloom_hashes == 0 {
                return Err(ConfigError::ValidationError(
                    "BLOOM_HASHES must be greater than 0".to_string(),
                ));
            }
        }

        let rate = self.index.false_positive_rate;
        if !(rate > 0.0 && rate < 1.0) {
            return Err(ConfigError::ValidationError(
                "BLOOM_FP_RATE must be between 0 and 1".to_string(),
            ));
        }

        self.index.index_config()?;

        if matches!(self.storage.backend, StorageBackend::S3)
            && (self.storage.s3.access_key.is_none() || self.storage.s3.secret_key.is_none())
        {
            return Err(ConfigError::ValidationError(
                "S3_ACCESS_KEY and S3_SECRET_KEY are required when STORAGE_BACKEND=s3".to_string(),
            ));
        }

        Ok(())
    }
}

/// `Ok(None)` when unset; an error naming the variable when set but unparseable.
fn env_parse<T: std::str::FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
    parse_value(name, std::env::var(name).ok())
}

fn parse_value<T: std::str::FromStr>(
    name: &str,
    raw: Option<String>,
) -> Result<Option<T>, ConfigError> {
    match raw {
        None => Ok(None),
        Some(value) => value.trim().parse().map(Some).map_err(|_| {
            ConfigError::ValidationError(format!("{name} has an invalid value: {value:?}"))
        }),
    }
}
