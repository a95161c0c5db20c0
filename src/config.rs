use serde::Deserialize;
use std::net::SocketAddr;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub printer: PrinterConfig,
    pub device: DeviceConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PrinterConfig {
    pub use_mock: bool,
    pub warm_up: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    /// Substrings that mark the thermal-line backend as plausibly present.
    pub thermal_patterns: Vec<String>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes the process
    /// environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let server = ServerConfig {
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: lookup("PORT")
                .unwrap_or_else(|| "8080".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidPort)?,
        };

        let printer = PrinterConfig {
            use_mock: parse_flag(lookup("USE_MOCK_PRINTER"), false),
            warm_up: parse_flag(lookup("PRINTER_WARM_UP"), true),
        };

        let device = DeviceConfig {
            thermal_patterns: lookup("THERMAL_PROBE_PATTERNS")
                .unwrap_or_else(|| "sunmi".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            manufacturer: lookup("DEVICE_MANUFACTURER"),
            model: lookup("DEVICE_MODEL"),
        };

        let config = Config {
            server,
            printer,
            device,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::InvalidPort);
        }

        if self.device.thermal_patterns.is_empty() {
            return Err(ConfigError::EmptyProbePatterns);
        }

        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = format!("{}:{}", self.server.host, self.server.port);
        addr.parse()
            .map_err(|_| ConfigError::InvalidSocketAddr { addr })
    }
}

fn parse_flag(value: Option<String>, default: bool) -> bool {
    value.and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid port number")]
    InvalidPort,

    #[error("Invalid socket address: {addr}")]
    InvalidSocketAddr { addr: String },

    #[error("THERMAL_PROBE_PATTERNS must name at least one pattern")]
    EmptyProbePatterns,
}
