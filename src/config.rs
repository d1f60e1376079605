use crate::storage::{self, StorageManager};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";

/// Default score threshold for fuzzy search, on a 0-to-1 distance scale
/// (lower = stricter).
const DEFAULT_SEARCH_THRESHOLD: f32 = 0.3;
/// Default maximum number of search results per query.
const DEFAULT_SEARCH_LIMIT: usize = 20;

/// Configuration for the fuzzy search index
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Score threshold [0.0, 1.0]; matches scoring above it are dropped
    #[serde(default = "default_search_threshold")]
    pub threshold: f32,

    /// Result limit per query
    #[serde(default = "default_search_limit")]
    pub limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_SEARCH_THRESHOLD,
            limit: DEFAULT_SEARCH_LIMIT,
        }
    }
}

fn default_search_threshold() -> f32 {
    DEFAULT_SEARCH_THRESHOLD
}

fn default_search_limit() -> usize {
    DEFAULT_SEARCH_LIMIT
}

fn default_bind_addr() -> String {
    DEFAULT_BIND_ADDR.to_string()
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub search: SearchConfig,

    /// Address the daemon listens on
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    #[serde(skip_serializing, skip_deserializing)]
    base_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            search: SearchConfig::default(),
            bind_addr: default_bind_addr(),
            base_path: String::new(),
        }
    }
}

/// Data directory: `LINKSTASH_BASE_PATH` when set, otherwise
/// `~/.local/share/linkstash`.
pub fn base_path() -> PathBuf {
    if let Ok(path) = std::env::var("LINKSTASH_BASE_PATH") {
        return PathBuf::from(path);
    }

    let home = homedir::my_home()
        .expect("couldnt find home dir")
        .expect("couldnt find home dir");
    home.join(".local/share/linkstash")
}

impl Config {
    fn validate(&mut self) {
        if !(0.0..=1.0).contains(&self.search.threshold) {
            panic!(
                "search.threshold must be between 0.0 and 1.0, got {}",
                self.search.threshold
            );
        }

        if self.search.limit == 0 {
            self.search.limit = DEFAULT_SEARCH_LIMIT;
        }

        if self.bind_addr.is_empty() {
            self.bind_addr = default_bind_addr();
        }
    }

    pub fn load() -> Self {
        Self::load_with(&base_path().to_string_lossy())
    }

    pub fn load_with(base_path: &str) -> Self {
        let store = storage::BackendLocal::new(base_path).expect("couldnt create data dir");

        // create new if does not exist
        if !store.exists("config.yaml") {
            store
                .write(
                    "config.yaml",
                    serde_yml::to_string(&Self::default()).unwrap().as_bytes(),
                )
                .expect("couldnt write default config");
        }

        let config_str = String::from_utf8(store.read("config.yaml").expect("couldnt read config"))
            .expect("config file is not valid utf8");
        let mut config: Self = serde_yml::from_str(&config_str).expect("config is malformed");

        config.base_path = base_path.to_string();

        config.validate();

        // resave in case config version needs an upgrade
        if config_str != serde_yml::to_string(&config).unwrap() {
            config.save();
        }

        config
    }

    pub fn save(&self) {
        let store = storage::BackendLocal::new(&self.base_path).expect("couldnt create data dir");

        let config_str = serde_yml::to_string(&self).unwrap();
        store
            .write("config.yaml", config_str.as_bytes())
            .expect("couldnt write config");
    }

    pub fn base_path(&self) -> PathBuf {
        PathBuf::from(&self.base_path)
    }
}
