use thiserror::Error;

use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Server error: {0}")]
    Server(#[from] std::io::Error),

    #[error("Server task failed: {0}")]
    Task(String),
}

/// Raw fault raised by a vendor SDK call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct SdkFault {
    pub message: String,
}

impl SdkFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Missing vendor bindings throw "Stub!" from every entry point.
    pub fn is_stub(&self) -> bool {
        self.message.to_ascii_lowercase().contains("stub")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    Device,
    SdkNotIntegrated,
}

impl FaultKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FaultKind::Device => "Device",
            FaultKind::SdkNotIntegrated => "SdkNotIntegrated",
        }
    }
}

/// Caller-facing failure taxonomy. Callers branch on [`PrintError::code`],
/// never on the display text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PrintError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Failed to decode image: {0}")]
    DecodeFailure(String),

    #[error("Printer unavailable: {0}")]
    DriverUnavailable(String),

    #[error("Hardware fault: {detail}")]
    HardwareFault { kind: FaultKind, detail: String },

    #[error("Setting rejected: {0}")]
    SettingError(String),
}

pub type PrintResult<T> = Result<T, PrintError>;

impl From<SdkFault> for PrintError {
    fn from(fault: SdkFault) -> Self {
        let kind = if fault.is_stub() {
            FaultKind::SdkNotIntegrated
        } else {
            FaultKind::Device
        };
        PrintError::HardwareFault {
            kind,
            detail: fault.message,
        }
    }
}

impl PrintError {
    pub fn code(&self) -> &'static str {
        match self {
            PrintError::InvalidArgument(_) => "InvalidArgument",
            PrintError::DecodeFailure(_) => "DecodeFailure",
            PrintError::DriverUnavailable(_) => "DriverUnavailable",
            PrintError::HardwareFault { .. } => "HardwareFault",
            PrintError::SettingError(_) => "SettingError",
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            PrintError::InvalidArgument(_) => 400, // Bad Request
            PrintError::DecodeFailure(_) => 422, // Unprocessable Entity
            PrintError::DriverUnavailable(_) => 503, // Service Unavailable
            PrintError::HardwareFault { .. } => 502, // Bad Gateway
            PrintError::SettingError(_) => 409, // Conflict
        }
    }

    pub fn error_response(&self) -> serde_json::Value {
        let mut body = serde_json::json!({
            "ok": false,
            "code": self.code(),
            "error": self.to_string(),
        });
        if let PrintError::HardwareFault { kind, .. } = self {
            body["fault"] = serde_json::Value::from(kind.as_str());
        }
        body
    }
}
