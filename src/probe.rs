// Static device detection for the thermal-line backend.
//
// There is no live handshake with the thermal printer, so presence is guessed
// from platform identity strings. The guess can be wrong either way; a wrong
// positive surfaces later as a failed job, a wrong negative as
// DriverUnavailable.

use std::path::Path;
use tracing::{debug, info};

use crate::config::DeviceConfig;

const DMI_VENDOR_PATH: &str = "/sys/class/dmi/id/sys_vendor";
const DMI_PRODUCT_PATH: &str = "/sys/class/dmi/id/product_name";
const UNKNOWN: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformIdentity {
    pub manufacturer: String,
    pub model: String,
}

impl PlatformIdentity {
    pub fn new(manufacturer: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            manufacturer: manufacturer.into(),
            model: model.into(),
        }
    }

    /// Reads the identity from config overrides, then DMI, then gives up.
    pub fn detect(config: &DeviceConfig) -> Self {
        let manufacturer = config
            .manufacturer
            .clone()
            .or_else(|| read_identity_file(Path::new(DMI_VENDOR_PATH)))
            .unwrap_or_else(|| UNKNOWN.to_string());
        let model = config
            .model
            .clone()
            .or_else(|| read_identity_file(Path::new(DMI_PRODUCT_PATH)))
            .unwrap_or_else(|| UNKNOWN.to_string());

        Self {
            manufacturer,
            model,
        }
    }

    pub fn display_name(&self) -> String {
        format!("{} {}", self.manufacturer, self.model)
            .trim()
            .to_string()
    }
}

fn read_identity_file(path: &Path) -> Option<String> {
    match std::fs::read_to_string(path) {
        Ok(contents) => {
            let value = contents.trim();
            (!value.is_empty()).then(|| value.to_string())
        }
        Err(e) => {
            debug!("Could not read {}: {}", path.display(), e);
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub identity: PlatformIdentity,
    pub thermal_line_present: bool,
    pub matched_pattern: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DeviceProbe {
    patterns: Vec<String>,
}

impl DeviceProbe {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            patterns: patterns
                .into_iter()
                .map(|p| p.into().to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn from_config(config: &DeviceConfig) -> Self {
        Self::new(config.thermal_patterns.iter().cloned())
    }

    pub fn run(&self, identity: PlatformIdentity) -> ProbeOutcome {
        let manufacturer = identity.manufacturer.to_ascii_lowercase();
        let model = identity.model.to_ascii_lowercase();

        let matched_pattern = self
            .patterns
            .iter()
            .find(|p| manufacturer.contains(p.as_str()) || model.contains(p.as_str()))
            .cloned();

        let thermal_line_present = matched_pattern.is_some();
        info!(
            "Device probe: '{}' -> thermal-line {}",
            identity.display_name(),
            if thermal_line_present {
                "plausibly present"
            } else {
                "not detected"
            }
        );

        ProbeOutcome {
            identity,
            thermal_line_present,
            matched_pattern,
        }
    }
}
