use std::fs;
use std::path::{Path, PathBuf};

use iroh::SecretKey;
use serde::{Deserialize, Serialize};
use url::Url;

pub const APP_NAME: &str = "hoard";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const DB_FILE_NAME: &str = "db.sqlite";
pub const KEY_FILE_NAME: &str = "key.pem";
pub const BLOBS_DIR_NAME: &str = "blobs";

const KEY_PEM_TAG: &str = "PRIVATE KEY";

/// Contents of `config.toml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Host running the directory node
    #[serde(default = "default_directory_host")]
    pub directory_host: String,
    /// Port the swarm endpoint listens on, ephemeral if unset
    #[serde(default)]
    pub peer_port: Option<u16>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Directory for rolling log files, stderr only if unset
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

fn default_directory_host() -> String {
    "127.0.0.1".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            directory_host: default_directory_host(),
            peer_port: None,
            log_level: default_log_level(),
            log_dir: None,
        }
    }
}

impl AppConfig {
    /// Configured level, `INFO` when it does not parse
    pub fn tracing_level(&self) -> tracing::Level {
        self.log_level.parse().unwrap_or(tracing::Level::INFO)
    }
}

/// Paths and configuration of one hoard state directory
#[derive(Debug, Clone)]
pub struct AppState {
    pub hoard_dir: PathBuf,
    pub config_path: PathBuf,
    pub db_path: PathBuf,
    pub key_path: PathBuf,
    pub blobs_path: PathBuf,
    pub config: AppConfig,
}

impl AppState {
    /// `~/.hoard`
    pub fn default_dir() -> Result<PathBuf, StateError> {
        dirs::home_dir()
            .map(|home| home.join(format!(".{}", APP_NAME)))
            .ok_or(StateError::NoHomeDirectory)
    }

    fn resolve_dir(custom_path: Option<PathBuf>) -> Result<PathBuf, StateError> {
        match custom_path {
            Some(path) => Ok(path),
            None => Self::default_dir(),
        }
    }

    fn at(hoard_dir: PathBuf, config: AppConfig) -> Self {
        Self {
            config_path: hoard_dir.join(CONFIG_FILE_NAME),
            db_path: hoard_dir.join(DB_FILE_NAME),
            key_path: hoard_dir.join(KEY_FILE_NAME),
            blobs_path: hoard_dir.join(BLOBS_DIR_NAME),
            hoard_dir,
            config,
        }
    }

    /// Create the state directory with a fresh key, config and empty database.
    pub fn init(
        custom_path: Option<PathBuf>,
        config: Option<AppConfig>,
    ) -> Result<Self, StateError> {
        let hoard_dir = Self::resolve_dir(custom_path)?;
        let state = Self::at(hoard_dir, config.unwrap_or_default());

        if state.config_path.exists() {
            return Err(StateError::AlreadyInitialized(state.hoard_dir));
        }

        fs::create_dir_all(&state.hoard_dir)?;
        fs::create_dir_all(&state.blobs_path)?;

        let key = generate_key()?;
        fs::write(&state.key_path, encode_key(&key))?;

        // tables are created on first open
        fs::File::create(&state.db_path)?;

        let config_toml = toml::to_string_pretty(&state.config)?;
        fs::write(&state.config_path, config_toml)?;

        tracing::info!(dir = %state.hoard_dir.display(), node_id = %key.public(), "state initialized");
        Ok(state)
    }

    /// Load an initialized state directory
    pub fn load(custom_path: Option<PathBuf>) -> Result<Self, StateError> {
        let hoard_dir = Self::resolve_dir(custom_path)?;
        let config_path = hoard_dir.join(CONFIG_FILE_NAME);
        if !config_path.exists() {
            return Err(StateError::NotInitialized(hoard_dir));
        }

        let config: AppConfig = toml::from_str(&fs::read_to_string(&config_path)?)?;
        Ok(Self::at(hoard_dir, config))
    }

    pub fn load_key(&self) -> Result<SecretKey, StateError> {
        decode_key(&fs::read_to_string(&self.key_path)?)
    }

    /// Base URL of the directory node listening on `port`
    pub fn directory_url(&self, port: u16) -> Result<Url, StateError> {
        Ok(Url::parse(&format!(
            "http://{}:{}/",
            self.config.directory_host, port
        ))?)
    }

    pub fn is_initialized(path: &Path) -> bool {
        path.join(CONFIG_FILE_NAME).exists()
    }
}

fn generate_key() -> Result<SecretKey, StateError> {
    let mut bytes = [0u8; 32];
    getrandom::getrandom(&mut bytes).map_err(|e| StateError::KeyGeneration(e.to_string()))?;
    Ok(SecretKey::from_bytes(&bytes))
}

fn encode_key(key: &SecretKey) -> String {
    pem::encode(&pem::Pem::new(KEY_PEM_TAG, key.to_bytes().to_vec()))
}

fn decode_key(contents: &str) -> Result<SecretKey, StateError> {
    let parsed = pem::parse(contents)?;
    if parsed.tag() != KEY_PEM_TAG {
        return Err(StateError::InvalidKey(format!(
            "unexpected pem tag '{}'",
            parsed.tag()
        )));
    }
    let bytes: [u8; 32] = parsed
        .contents()
        .try_into()
        .map_err(|_| StateError::InvalidKey("expected 32 key bytes".to_string()))?;
    Ok(SecretKey::from_bytes(&bytes))
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("could not determine the home directory")]
    NoHomeDirectory,
    #[error("hoard is already initialized at {0}")]
    AlreadyInitialized(PathBuf),
    #[error("hoard is not initialized at {0}, run `hoard init` first")]
    NotInitialized(PathBuf),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),
    #[error("failed to generate key: {0}")]
    KeyGeneration(String),
    #[error("failed to parse key file: {0}")]
    KeyParse(#[from] pem::PemError),
    #[error("invalid key: {0}")]
    InvalidKey(String),
    #[error("invalid directory url: {0}")]
    Url(#[from] url::ParseError),
}
