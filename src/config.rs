//! Config loading, env overrides, startup validation.
//!
//! Layering: TOML file (lowest), then environment variables matching the
//! deployment surface (`BOT_TOKEN`, `GOOGLE_SHEET_ID`, ...). Required fields
//! are validated before serving; a missing credential or identifier is fatal
//! at startup, not at first use.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::UtcOffset;

use crate::sheets::ServiceAccountKey;

pub const DEFAULT_CONFIG_FILE: &str = "codecheck.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required config: {0}")]
    Missing(&'static str),

    #[error("invalid config {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path:?}: {message}")]
    Parse { path: PathBuf, message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub sheet: SheetConfig,
    pub store: StoreConfig,
    pub bot: BotConfig,
    pub webhook: WebhookConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetConfig {
    pub spreadsheet_id: String,
    /// Tab name; the first sheet is used when unset.
    pub name: Option<String>,
    pub ttl_secs: u64,
    pub service_account_file: Option<PathBuf>,
    /// Inline credential JSON (env-only; never written back to disk).
    #[serde(skip)]
    pub service_account_json: Option<String>,
}

impl Default for SheetConfig {
    fn default() -> Self {
        Self {
            spreadsheet_id: String::new(),
            name: None,
            ttl_secs: 300,
            service_account_file: None,
            service_account_json: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub path: PathBuf,
    /// Display offset for rendered timestamps, `+HH:MM` / `-HH:MM`. Storage
    /// stays UTC regardless.
    pub display_utc_offset: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/checks.sqlite"),
            display_utc_offset: "+00:00".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct BotConfig {
    pub token: String,
    pub admin_ids: Vec<i64>,
    /// With an empty `admin_ids`, admin commands are denied unless this is set
    /// explicitly. Opting in restores "everyone may /reload".
    pub open_admin: bool,
}

impl BotConfig {
    pub fn is_admin(&self, user_id: i64) -> bool {
        if self.admin_ids.is_empty() {
            self.open_admin
        } else {
            self.admin_ids.contains(&user_id)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    pub listen_addr: String,
    pub public_url: String,
    pub secret: String,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:10000".to_string(),
            public_url: String::new(),
            secret: String::new(),
        }
    }
}

/// Load the config file (explicit path must exist; the default path may be
/// absent) and apply env overrides on top.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(path) => read_file(path)?,
        None => {
            let default = Path::new(DEFAULT_CONFIG_FILE);
            if default.exists() {
                read_file(default)?
            } else {
                Config::default()
            }
        }
    };
    apply_env_overrides(&mut config);
    Ok(config)
}

fn read_file(path: &Path) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

pub fn apply_env_overrides(config: &mut Config) {
    if let Ok(token) = std::env::var("BOT_TOKEN") {
        config.bot.token = token;
    }
    if let Ok(ids) = std::env::var("ADMIN_IDS") {
        config.bot.admin_ids = parse_admin_ids(&ids);
    }
    if let Ok(id) = std::env::var("GOOGLE_SHEET_ID") {
        config.sheet.spreadsheet_id = id;
    }
    if let Ok(name) = std::env::var("GOOGLE_SHEET_NAME") {
        let name = name.trim().to_string();
        config.sheet.name = (!name.is_empty()).then_some(name);
    }
    if let Ok(json) = std::env::var("GOOGLE_SERVICE_JSON") {
        config.sheet.service_account_json = Some(json);
    }
    if let Ok(ttl) = std::env::var("CACHE_TTL_SECONDS")
        && let Ok(secs) = ttl.trim().parse()
    {
        config.sheet.ttl_secs = secs;
    }
    if let Ok(path) = std::env::var("DB_PATH") {
        config.store.path = PathBuf::from(path);
    }
    if let Ok(offset) = std::env::var("DISPLAY_UTC_OFFSET") {
        config.store.display_utc_offset = offset;
    }
    if let Ok(port) = std::env::var("PORT")
        && let Ok(port) = port.trim().parse::<u16>()
    {
        config.webhook.listen_addr = format!("0.0.0.0:{port}");
    }
    if let Ok(url) = std::env::var("BASE_URL") {
        config.webhook.public_url = url;
    }
    if let Ok(secret) = std::env::var("TELEGRAM_WEBHOOK_SECRET") {
        config.webhook.secret = secret;
    }
}

fn parse_admin_ids(raw: &str) -> Vec<i64> {
    raw.split(',')
        .filter_map(|part| part.trim().parse().ok())
        .collect()
}

impl Config {
    pub fn ttl(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.sheet.ttl_secs)
    }

    pub fn display_offset(&self) -> Result<UtcOffset, ConfigError> {
        parse_utc_offset(&self.store.display_utc_offset).map_err(|reason| ConfigError::Invalid {
            field: "store.display_utc_offset",
            reason,
        })
    }

    /// Credential material: inline JSON wins over the key file.
    pub fn service_account_key(&self) -> Result<ServiceAccountKey, ConfigError> {
        if let Some(json) = &self.sheet.service_account_json {
            return ServiceAccountKey::from_json(json).map_err(|e| ConfigError::Invalid {
                field: "GOOGLE_SERVICE_JSON",
                reason: e.to_string(),
            });
        }
        if let Some(path) = &self.sheet.service_account_file {
            let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.clone(),
                source,
            })?;
            return ServiceAccountKey::from_json(&contents).map_err(|e| ConfigError::Invalid {
                field: "sheet.service_account_file",
                reason: e.to_string(),
            });
        }
        Err(ConfigError::Missing(
            "sheet.service_account_file or GOOGLE_SERVICE_JSON",
        ))
    }

    /// Everything the index + ledger core needs.
    pub fn validate_core(&self) -> Result<(), ConfigError> {
        if self.sheet.spreadsheet_id.trim().is_empty() {
            return Err(ConfigError::Missing(
                "sheet.spreadsheet_id or GOOGLE_SHEET_ID",
            ));
        }
        self.service_account_key()?;
        self.display_offset()?;
        Ok(())
    }

    pub fn validate_bot(&self) -> Result<(), ConfigError> {
        if self.bot.token.trim().is_empty() {
            return Err(ConfigError::Missing("bot.token or BOT_TOKEN"));
        }
        Ok(())
    }

    pub fn validate_webhook(&self) -> Result<(), ConfigError> {
        self.validate_bot()?;
        if self.webhook.public_url.trim().is_empty() {
            return Err(ConfigError::Missing("webhook.public_url or BASE_URL"));
        }
        if self.webhook.secret.trim().is_empty() {
            return Err(ConfigError::Missing(
                "webhook.secret or TELEGRAM_WEBHOOK_SECRET",
            ));
        }
        Ok(())
    }
}

fn parse_utc_offset(raw: &str) -> Result<UtcOffset, String> {
    let expected = "expected +HH:MM or -HH:MM".to_string();
    let (sign, rest) = match raw.as_bytes().first() {
        Some(b'+') => (1i8, &raw[1..]),
        Some(b'-') => (-1i8, &raw[1..]),
        _ => return Err(expected),
    };
    let Some((hours, minutes)) = rest.split_once(':') else {
        return Err(expected);
    };
    let hours: i8 = hours.parse().map_err(|_| expected.clone())?;
    let minutes: i8 = minutes.parse().map_err(|_| expected.clone())?;
    UtcOffset::from_hms(sign * hours, sign * minutes, 0).map_err(|e| e.to_string())
}
