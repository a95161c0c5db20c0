use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use tracing::{error, warn};

use crate::decoder::PixelBuffer;
use crate::errors::{PrintError, PrintResult};

pub mod raster_page;
pub mod thermal_line;

pub use raster_page::RasterPageDriver;
pub use thermal_line::ThermalLineDriver;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendId {
    RasterPage,
    ThermalLine,
}

impl BackendId {
    pub const ALL: [BackendId; 2] = [BackendId::RasterPage, BackendId::ThermalLine];

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendId::RasterPage => "raster-page",
            BackendId::ThermalLine => "thermal-line",
        }
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendId {
    type Err = PrintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "raster-page" => Ok(BackendId::RasterPage),
            "thermal-line" => Ok(BackendId::ThermalLine),
            other => Err(PrintError::InvalidArgument(format!(
                "Unknown backend: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Alignment {
    Left,
    Center,
    Right,
}

impl Alignment {
    /// Maps the caller's numeric alignment code (0 left, 1 center, 2 right).
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Alignment::Left),
            1 => Some(Alignment::Center),
            2 => Some(Alignment::Right),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub x: u32,
    pub y: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobPayload {
    Bitmap {
        pixels: PixelBuffer,
        alignment: Alignment,
    },
    Text {
        text: String,
        font_size: u32,
        alignment: Alignment,
    },
    TestPage,
}

impl JobPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            JobPayload::Bitmap { .. } => "bitmap",
            JobPayload::Text { .. } => "text",
            JobPayload::TestPage => "test-page",
        }
    }
}

/// One print request, consumed by exactly one driver call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintJob {
    pub backend: BackendId,
    pub payload: JobPayload,
    pub placement: Placement,
    pub rotation: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverState {
    Uninitialized,
    Ready,
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendStatus {
    Connected,
    Disconnected,
}

impl BackendStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendStatus::Connected => "connected",
            BackendStatus::Disconnected => "disconnected",
        }
    }
}

/// Uniform capability set over the vendor printer libraries.
///
/// Implementations own their session exclusively and are not safe for
/// concurrent jobs; the registry serializes access per backend. SDK faults are
/// converted to [`PrintError`] inside the driver and never escape as panics.
pub trait BackendDriver: Send {
    fn backend(&self) -> BackendId;

    fn state(&self) -> &DriverState;

    /// Acquires the vendor session. Failure is recorded in the state, not
    /// returned; the next job retries.
    fn initialize(&mut self);

    /// Releases the session and returns to `Uninitialized`.
    fn teardown(&mut self);

    fn submit_job(&mut self, job: PrintJob) -> PrintResult<String>;

    fn set_density(&mut self, _density: i64) -> PrintResult<u8> {
        Err(PrintError::SettingError(format!(
            "{} does not support density settings",
            self.backend()
        )))
    }

    /// Never initializes.
    fn status(&self) -> BackendStatus {
        match self.state() {
            DriverState::Ready => BackendStatus::Connected,
            _ => BackendStatus::Disconnected,
        }
    }

    /// Gives a non-ready driver exactly one initialization attempt.
    fn ensure_ready(&mut self) -> PrintResult<()> {
        if *self.state() == DriverState::Ready {
            return Ok(());
        }

        warn!(
            "{} is not initialized - attempting re-initialization",
            self.backend()
        );
        self.initialize();

        match self.state() {
            DriverState::Ready => Ok(()),
            DriverState::Failed(detail) => {
                error!("Re-initialization of {} failed: {}", self.backend(), detail);
                Err(PrintError::DriverUnavailable(format!(
                    "{}: {}",
                    self.backend(),
                    detail
                )))
            }
            DriverState::Uninitialized => Err(PrintError::DriverUnavailable(format!(
                "{} did not initialize",
                self.backend()
            ))),
        }
    }
}
