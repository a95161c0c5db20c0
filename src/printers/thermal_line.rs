use std::sync::Arc;
use tracing::{error, info, warn};

use crate::errors::{PrintError, PrintResult};
use crate::printers::{Alignment, BackendDriver, BackendId, DriverState, JobPayload, PrintJob};
use crate::sdk::{LineSdk, LineSession};

pub const DENSITY_MIN: u8 = 1;
pub const DENSITY_MAX: u8 = 15;

const TEST_PAGE_TEXT: &str = "*** PRINTER TEST PAGE ***";
const TEST_PAGE_FONT_SIZE: u32 = 24;

/// Clamps a requested density into the head's supported range.
pub fn clamp_density(density: i64) -> u8 {
    density.clamp(DENSITY_MIN as i64, DENSITY_MAX as i64) as u8
}

/// Thermal line printer backend.
///
/// Presence comes from the startup probe, not a handshake. When no vendor
/// library is linked the driver still reports ready on a detected device and
/// acknowledges jobs without touching hardware.
pub struct ThermalLineDriver {
    sdk: Option<Arc<dyn LineSdk>>,
    session: Option<Box<dyn LineSession>>,
    detected: bool,
    device_name: String,
    state: DriverState,
}

impl ThermalLineDriver {
    pub fn new(sdk: Option<Arc<dyn LineSdk>>, detected: bool, device_name: &str) -> Self {
        Self {
            sdk,
            session: None,
            detected,
            device_name: device_name.to_string(),
            state: DriverState::Uninitialized,
        }
    }

    fn acknowledge(&self, what: &str) -> PrintResult<String> {
        info!(
            "No thermal SDK bound; acknowledging {} without a hardware call",
            what
        );
        Ok(format!("{} accepted by thermal-line", what))
    }
}

impl BackendDriver for ThermalLineDriver {
    fn backend(&self) -> BackendId {
        BackendId::ThermalLine
    }

    fn state(&self) -> &DriverState {
        &self.state
    }

    fn initialize(&mut self) {
        if !self.detected {
            warn!(
                "Thermal line printer not detected on '{}'",
                self.device_name
            );
            self.state = DriverState::Failed(format!(
                "thermal-line printer not detected on '{}'",
                self.device_name
            ));
            return;
        }

        let Some(sdk) = self.sdk.as_ref() else {
            info!("Thermal line printer detected, no SDK bound");
            self.state = DriverState::Ready;
            return;
        };

        match sdk.open() {
            Ok(mut session) => {
                info!("Thermal line session opened");
                if let Err(e) = session.reset() {
                    warn!("Thermal line test operation failed: {}", e);
                }
                self.session = Some(session);
                self.state = DriverState::Ready;
            }
            Err(e) => {
                error!("Failed to open thermal line session: {}", e);
                self.session = None;
                self.state = DriverState::Failed(e.message);
            }
        }
    }

    fn teardown(&mut self) {
        if let Some(mut session) = self.session.take() {
            if let Err(e) = session.close() {
                warn!("Failed to close thermal line session: {}", e);
            }
        }
        self.state = DriverState::Uninitialized;
    }

    fn submit_job(&mut self, job: PrintJob) -> PrintResult<String> {
        self.ensure_ready()?;

        match job.payload {
            JobPayload::Bitmap { pixels, alignment } => {
                pixels.validate()?;
                info!(
                    "Thermal bitmap {}x{} aligned {:?}",
                    pixels.width, pixels.height, alignment
                );
                match self.session.as_mut() {
                    Some(session) => {
                        session.print_bitmap(&pixels, alignment)?;
                        Ok("Image printed successfully on thermal-line".to_string())
                    }
                    None => self.acknowledge("Image"),
                }
            }
            JobPayload::Text {
                text,
                font_size,
                alignment,
            } => {
                info!(
                    "Thermal text: {} chars, size {}, aligned {:?}",
                    text.chars().count(),
                    font_size,
                    alignment
                );
                match self.session.as_mut() {
                    Some(session) => {
                        session.print_text(&text, font_size, alignment)?;
                        Ok("Text printed successfully on thermal-line".to_string())
                    }
                    None => self.acknowledge("Text"),
                }
            }
            JobPayload::TestPage => match self.session.as_mut() {
                Some(session) => {
                    session.print_text(TEST_PAGE_TEXT, TEST_PAGE_FONT_SIZE, Alignment::Center)?;
                    Ok("Test page printed on thermal-line".to_string())
                }
                None => self.acknowledge("Test page"),
            },
        }
    }

    fn set_density(&mut self, density: i64) -> PrintResult<u8> {
        self.ensure_ready()
            .map_err(|e| PrintError::SettingError(e.to_string()))?;

        let applied = clamp_density(density);
        if applied as i64 != density {
            warn!(
                "Density {} outside {}-{}, clamped to {}",
                density, DENSITY_MIN, DENSITY_MAX, applied
            );
        }

        if let Some(session) = self.session.as_mut() {
            session
                .set_density(applied)
                .map_err(|fault| PrintError::SettingError(fault.message))?;
        }

        info!("Thermal density set to {}", applied);
        Ok(applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::PixelBuffer;
    use crate::errors::FaultKind;
    use crate::mock_sdk::{MockLineSdk, MockStep, SdkCall, SdkJournal};
    use crate::printers::{BackendStatus, Placement};

    fn job(payload: JobPayload) -> PrintJob {
        PrintJob {
            backend: BackendId::ThermalLine,
            payload,
            placement: Placement { x: 0, y: 10 },
            rotation: 0,
        }
    }

    fn bitmap(width: u32, height: u32) -> JobPayload {
        JobPayload::Bitmap {
            pixels: PixelBuffer {
                width,
                height,
                pixels: vec![0; (width * height) as usize],
            },
            alignment: Alignment::Center,
        }
    }

    fn mocked(detected: bool) -> (ThermalLineDriver, MockLineSdk, SdkJournal) {
        let journal = SdkJournal::default();
        let sdk = MockLineSdk::new(journal.clone());
        let driver = ThermalLineDriver::new(Some(Arc::new(sdk.clone())), detected, "SUNMI P3");
        (driver, sdk, journal)
    }

    #[test]
    fn test_clamp_density() {
        assert_eq!(clamp_density(99), 15);
        assert_eq!(clamp_density(0), 1);
        assert_eq!(clamp_density(-4), 1);
        assert_eq!(clamp_density(7), 7);
    }

    #[test]
    fn test_undetected_device_makes_no_sdk_calls() {
        let (mut driver, _sdk, journal) = mocked(false);

        let err = driver.submit_job(job(bitmap(64, 32))).unwrap_err();
        assert_eq!(err.code(), "DriverUnavailable");

        let err = driver.set_density(5).unwrap_err();
        assert_eq!(err.code(), "SettingError");

        assert!(journal.is_empty());
        assert_eq!(driver.status(), BackendStatus::Disconnected);
    }

    #[test]
    fn test_unbound_sdk_acknowledges_jobs() {
        let mut driver = ThermalLineDriver::new(None, true, "SUNMI P3");

        let message = driver.submit_job(job(bitmap(8, 8))).expect("acknowledged");
        assert_eq!(message, "Image accepted by thermal-line");
        assert_eq!(driver.status(), BackendStatus::Connected);

        let text = JobPayload::Text {
            text: "hello".to_string(),
            font_size: 24,
            alignment: Alignment::Left,
        };
        assert!(driver.submit_job(job(text)).is_ok());
        assert_eq!(driver.set_density(99), Ok(15));
    }

    #[test]
    fn test_invalid_bitmap_rejected_before_print() {
        let (mut driver, _sdk, journal) = mocked(true);
        let payload = JobPayload::Bitmap {
            pixels: PixelBuffer {
                width: 4,
                height: 4,
                pixels: vec![0; 3],
            },
            alignment: Alignment::Left,
        };

        let err = driver.submit_job(job(payload)).unwrap_err();
        assert_eq!(err.code(), "DecodeFailure");
        assert_eq!(journal.calls(), vec![SdkCall::OpenLine, SdkCall::Reset]);
    }

    #[test]
    fn test_bound_sdk_prints_text_and_density() {
        let (mut driver, _sdk, journal) = mocked(true);

        let text = JobPayload::Text {
            text: "Total: 12.00".to_string(),
            font_size: 32,
            alignment: Alignment::Right,
        };
        assert!(driver.submit_job(job(text)).is_ok());
        assert_eq!(driver.set_density(99), Ok(15));

        assert_eq!(
            journal.calls(),
            vec![
                SdkCall::OpenLine,
                SdkCall::Reset,
                SdkCall::PrintText {
                    text: "Total: 12.00".to_string(),
                    font_size: 32,
                    align: Alignment::Right,
                },
                SdkCall::SetDensity(15),
            ]
        );
    }

    #[test]
    fn test_open_failure_retried_once_per_job() {
        let (mut driver, sdk, journal) = mocked(true);
        sdk.fail_at(MockStep::Open, "serial port busy");

        driver.initialize();
        assert_eq!(
            driver.state(),
            &DriverState::Failed("serial port busy".to_string())
        );

        let err = driver.submit_job(job(bitmap(8, 8))).unwrap_err();
        assert_eq!(err.code(), "DriverUnavailable");
        assert_eq!(journal.count(&SdkCall::OpenLine), 2);

        sdk.recover(MockStep::Open);
        let message = driver.submit_job(job(bitmap(8, 8))).expect("retry succeeds");
        assert_eq!(message, "Image printed successfully on thermal-line");
        assert_eq!(journal.count(&SdkCall::OpenLine), 3);
        assert_eq!(driver.status(), BackendStatus::Connected);
    }

    #[test]
    fn test_print_fault_is_hardware_fault() {
        let (mut driver, sdk, _journal) = mocked(true);
        sdk.fail_at(MockStep::PrintBitmap, "out of paper");

        let err = driver.submit_job(job(bitmap(8, 8))).unwrap_err();
        assert_eq!(
            err,
            PrintError::HardwareFault {
                kind: FaultKind::Device,
                detail: "out of paper".to_string(),
            }
        );
        assert_eq!(driver.state(), &DriverState::Ready);
    }

    #[test]
    fn test_density_fault_is_setting_error() {
        let (mut driver, sdk, _journal) = mocked(true);
        sdk.fail_at(MockStep::SetDensity, "rejected");

        assert_eq!(
            driver.set_density(3),
            Err(PrintError::SettingError("rejected".to_string()))
        );
    }

    #[test]
    fn test_test_page_prints_banner() {
        let (mut driver, _sdk, journal) = mocked(true);
        assert_eq!(
            driver.submit_job(job(JobPayload::TestPage)).as_deref(),
            Ok("Test page printed on thermal-line")
        );
        assert_eq!(
            journal.calls().last(),
            Some(&SdkCall::PrintText {
                text: TEST_PAGE_TEXT.to_string(),
                font_size: TEST_PAGE_FONT_SIZE,
                align: Alignment::Center,
            })
        );
    }
}
