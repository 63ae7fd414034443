use clap::Parser;
use config::{Config, ConfigError, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WarehouseConfig {
    pub db_path: String,
    pub pool_size: u32,
    pub query_timeout_secs: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CatalogConfig {
    pub db_path: String,
    pub pool_size: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LlmConfig {
    pub backend: String, // "remote" or "ollama"
    /// Model for full generation and auto-fix.
    pub model: String,
    /// Cheaper model for follow-up refinement.
    pub refine_model: String,
    pub api_key: Option<String>,
    pub api_url: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RetryConfigSection {
    pub max_retries: usize,
    pub base_delay_ms: u64,
    pub multiplier: f64,
    pub max_delay_ms: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CacheConfig {
    pub metadata_ttl_secs: u64,
    pub rules_ttl_secs: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MemoryConfig {
    /// Messages of conversation history considered per session.
    pub window: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub web: WebConfig,
    pub warehouse: WarehouseConfig,
    pub catalog: CatalogConfig,
    pub llm: LlmConfig,
    pub retry: RetryConfigSection,
    pub cache: CacheConfig,
    pub memory: MemoryConfig,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Path to the warehouse database file
    #[arg(long)]
    pub warehouse_db: Option<String>,

    /// Path to the catalog database file
    #[arg(long)]
    pub catalog_db: Option<String>,
}

impl AppConfig {
    pub fn new(args: &CliArgs) -> Result<Self, ConfigError> {
        // Defaults first, so a partial file only overrides what it names.
        let mut config_builder =
            Config::builder().add_source(Config::try_from(&AppConfig::default())?);

        if let Some(config_path) = &args.config {
            config_builder = config_builder.add_source(File::from(config_path.as_path()));
        } else {
            let default_locations = vec![
                "config.toml",
                "config/config.toml",
                "/etc/sqlpilot/config.toml",
            ];

            for location in default_locations {
                if Path::new(location).exists() {
                    config_builder =
                        config_builder.add_source(File::new(location, config::FileFormat::Toml));
                    break;
                }
            }
        }

        let mut config: AppConfig = config_builder.build()?.try_deserialize()?;

        // Override with command line args if provided
        if let Some(host) = &args.host {
            config.web.host = host.clone();
        }
        if let Some(port) = args.port {
            config.web.port = port;
        }
        if let Some(warehouse_db) = &args.warehouse_db {
            config.warehouse.db_path = warehouse_db.clone();
        }
        if let Some(catalog_db) = &args.catalog_db {
            config.catalog.db_path = catalog_db.clone();
        }

        Ok(config)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            web: WebConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
            },
            warehouse: WarehouseConfig {
                db_path: "warehouse.db".to_string(),
                pool_size: 5,
                query_timeout_secs: 30,
            },
            catalog: CatalogConfig {
                db_path: "catalog.db".to_string(),
                pool_size: 2,
            },
            llm: LlmConfig {
                backend: "ollama".to_string(),
                model: "qwen2.5-coder:14b".to_string(),
                refine_model: "qwen2.5-coder:3b".to_string(),
                api_key: None,
                api_url: None,
                timeout_secs: 60,
            },
            retry: RetryConfigSection {
                max_retries: 3,
                base_delay_ms: 500,
                multiplier: 2.0,
                max_delay_ms: 8000,
            },
            cache: CacheConfig {
                metadata_ttl_secs: 300,
                rules_ttl_secs: 300,
            },
            memory: MemoryConfig {
                window: 10,
            },
        }
    }
}
