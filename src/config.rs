use secrecy::Secret;

use crate::services::qr_generator::{DEFAULT_MODULE_SIZE, MAX_MODULE_SIZE};

/// Which record store backs the service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl std::str::FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" => Ok(StoreBackend::Postgres),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(format!("unknown store backend: {}", other)),
        }
    }
}

/// Parses `QR_MODULE_SIZE`, clamping it to `1..=MAX_MODULE_SIZE`
pub fn parse_module_size(raw: &str) -> Result<u32, config::ConfigError> {
    let requested: u32 = raw.trim().parse().map_err(|_| {
        config::ConfigError::Message(format!(
            "qr_module_size must be a positive integer, got {:?}",
            raw
        ))
    })?;

    let size = requested.clamp(1, MAX_MODULE_SIZE);
    if size != requested {
        tracing::warn!(requested, size, "qr_module_size out of range, clamped");
    }
    Ok(size)
}

#[derive(Debug, Clone)]
pub struct Config {
    pub store: StoreBackend,
    pub database_url: Option<String>,
    pub host: String,
    pub port: u16,

    // Shared secret organizers present in the x-organizer-key header
    pub organizer_key: Secret<String>,

    // Pixels per QR module in rendered PNGs
    pub qr_module_size: u32,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        // Load .env file if it exists (for local development)
        let _ = dotenvy::dotenv();

        let config = config::Config::builder()
            .add_source(config::Environment::default().separator("__"))
            .build()?;

        Self::from_settings(&config)
    }

    pub fn from_settings(config: &config::Config) -> Result<Self, config::ConfigError> {
        let store = match config.get::<String>("store") {
            Ok(raw) => raw.parse::<StoreBackend>().map_err(config::ConfigError::Message)?,
            Err(_) => StoreBackend::Postgres,
        };

        let database_url: Option<String> = config.get("database_url").ok();
        if store == StoreBackend::Postgres && database_url.is_none() {
            return Err(config::ConfigError::NotFound("database_url".to_string()));
        }

        let qr_module_size = match config.get::<String>("qr_module_size") {
            Ok(raw) => parse_module_size(&raw)?,
            Err(config::ConfigError::NotFound(_)) => DEFAULT_MODULE_SIZE,
            Err(e) => return Err(e),
        };

        Ok(Self {
            store,
            database_url,
            host: config.get("host").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: config.get("port")?,

            organizer_key: Secret::new(config.get("organizer_key")?),

            qr_module_size,
        })
    }
}
