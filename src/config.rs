use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::{CatalogueError, Result};
use crate::fetcher::{DEFAULT_ENDPOINT, DEFAULT_TIMEOUT_SECS};

pub const ENV_PREFIX: &str = "CATALOGUE";
pub const DEFAULT_CONFIG_FILE: &str = "catalogue";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Sqlite,
    Parquet,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Subscription key for the export API.
    pub api_key: Option<String>,
    pub endpoint: String,
    pub timeout_secs: u64,
    pub store: StoreKind,
    /// SQLite file for catalogue tables.
    pub catalogue_db: PathBuf,
    /// SQLite file for uploaded user data.
    pub user_data_db: PathBuf,
    /// Root directory for the parquet store.
    pub parquet_dir: PathBuf,
    pub log_dir: Option<PathBuf>,
    pub log_filter: String,
}

impl Settings {
    /// Loads settings from defaults, an optional config file and
    /// `CATALOGUE_*` environment variables, in increasing precedence.
    /// A `.env` file is read into the environment first when present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let file = match path {
            Some(p) => File::from(p).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let cfg = Config::builder()
            .set_default("endpoint", DEFAULT_ENDPOINT)?
            .set_default("timeout_secs", DEFAULT_TIMEOUT_SECS as i64)?
            .set_default("store", "sqlite")?
            .set_default("catalogue_db", "CATALOGUES.db")?
            .set_default("user_data_db", "UsersData.db")?
            .set_default("parquet_dir", "data")?
            .set_default("log_filter", "info")?
            .add_source(file)
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;

        Ok(cfg.try_deserialize()?)
    }

    pub fn require_api_key(&self) -> Result<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                CatalogueError::Config(format!(
                    "no API key configured; set {}_API_KEY or api_key in the config file",
                    ENV_PREFIX
                ))
            })
    }
}
