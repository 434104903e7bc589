/// External crates for the inventory application
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::campus::{CampusTextStore, UnboundCampusStore, DEFAULT_CAMPUSES};
use crate::connectivity::{Pinger, SystemPinger};
use crate::errors::StoreError;
use crate::inventory::Inventory;
use crate::navigation::Navigator;
use crate::passwd::{default_credentials, Credential};
use crate::store::{load_or_empty, DeviceStore, JsonStore};


/// Where the inventory lives on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// One JSON file for the whole inventory.
    Json,
    /// One text file per campus.
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PingConfig {
    pub count: u32,
    pub timeout_secs: u64,
}

impl Default for PingConfig {
    fn default() -> Self {
        Self {
            count: 4,
            timeout_secs: 10,
        }
    }
}

impl PingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}


/// Represents the configuration for the inventory application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub data_file: PathBuf,
    pub storage: StorageKind,
    pub campus_dir: PathBuf,
    pub reports_dir: PathBuf,
    pub log_file: PathBuf,
    pub history_file: PathBuf,
    pub campuses: Vec<String>,
    pub ping: PingConfig,
    pub max_login_attempts: u32,
    pub users: Vec<Credential>,
}


impl Default for AppConfig {

    /// Provides the default values for `AppConfig`.
    fn default() -> Self {
        Self {
            data_file: PathBuf::from("devices.json"),
            storage: StorageKind::Json,
            campus_dir: PathBuf::from("campuses"),
            reports_dir: PathBuf::from("reports"),
            log_file: PathBuf::from("campus-inventory.log"),
            history_file: PathBuf::from("history.txt"),
            campuses: DEFAULT_CAMPUSES.iter().map(|c| c.to_string()).collect(),
            ping: PingConfig::default(),
            max_login_attempts: 3,
            users: default_credentials(),
        }
    }
}

impl AppConfig {
    /// Reads a JSON configuration file. A missing file yields the defaults;
    /// an unreadable or malformed one is an error.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            info!(path = %path.display(), "no configuration file, using defaults");
            return Ok(AppConfig::default());
        }
        let contents = fs::read_to_string(path).map_err(|e| StoreError::io(path, e))?;
        let mut config: AppConfig = serde_json::from_str(&contents).map_err(|e| StoreError::Malformed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        if config.users.is_empty() {
            warn!("configuration lists no users, falling back to the built-in accounts");
            config.users = default_credentials();
        }
        if config.max_login_attempts == 0 {
            config.max_login_attempts = 1;
        }
        Ok(config)
    }
}


/// Represents the state of one interactive session.
pub struct SessionContext {
    pub config: AppConfig,
    pub user: Option<String>,
    pub navigator: Navigator,
    pub inventory: Inventory,
    pub store: Box<dyn DeviceStore>,
    pub campus: Option<String>,
    pub last_search: Option<String>,
    pub pinger: Box<dyn Pinger>,
    /// Set from the Ctrl+C handler; the controller returns to the main menu.
    pub interrupted: Arc<AtomicBool>,
}

impl SessionContext {
    /// Builds a session from the configuration and loads the inventory.
    pub fn new(config: AppConfig) -> Self {
        let pinger = Box::new(SystemPinger::new(config.ping.count, config.ping.timeout()));
        let store: Box<dyn DeviceStore> = match config.storage {
            StorageKind::Json => Box::new(JsonStore::new(&config.data_file)),
            StorageKind::Text => Box::new(UnboundCampusStore),
        };
        SessionContext::with_parts(config, store, pinger)
    }

    /// Builds a session around an explicit store and pinger.
    pub fn with_parts(config: AppConfig, store: Box<dyn DeviceStore>, pinger: Box<dyn Pinger>) -> Self {
        let (devices, _) = load_or_empty(store.as_ref());
        SessionContext {
            config,
            user: None,
            navigator: Navigator::new(),
            inventory: Inventory::new(devices),
            store,
            campus: None,
            last_search: None,
            pinger,
            interrupted: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Makes `campus` the active campus. In text mode the store is rebound
    /// to that campus's file and its devices are loaded.
    pub fn select_campus(&mut self, campus: &str) -> Option<StoreError> {
        self.campus = Some(campus.to_string());
        self.last_search = None;
        if self.config.storage != StorageKind::Text {
            return None;
        }
        let store = CampusTextStore::new(&self.config.campus_dir, campus);
        let (devices, err) = load_or_empty(&store);
        self.inventory.replace_all(devices);
        self.store = Box::new(store);
        info!(campus, devices = self.inventory.len(), "campus selected");
        err
    }

    /// Prompt prefix such as `admin@campus uno`.
    pub fn prompt_prefix(&self) -> String {
        match (&self.user, &self.campus) {
            (Some(user), Some(campus)) => format!("{}@{}", user, campus),
            (Some(user), None) => user.clone(),
            (None, Some(campus)) => campus.clone(),
            (None, None) => "inventory".to_string(),
        }
    }
}
