//! Command dispatch: the single boundary between printer hardware and callers.
//!
//! Every command ends as an [`OperationResult`]. Driver work runs on the
//! blocking pool under the backend's lock; a panicking driver becomes a
//! `HardwareFault` rather than unwinding into the caller.

use bytes::Bytes;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::decoder;
use crate::errors::{FaultKind, PrintError, PrintResult};
use crate::printers::{
    Alignment, BackendDriver, BackendId, JobPayload, Placement, PrintJob,
};
use crate::probe::PlatformIdentity;
use crate::registry::BackendRegistry;

pub const DEFAULT_IMAGE_WIDTH: u32 = 384;
pub const DEFAULT_FONT_SIZE: u32 = 24;
pub const DEFAULT_DENSITY: i64 = 2;

/// Where every bitmap lands on the raster canvas.
const IMAGE_PLACEMENT: Placement = Placement { x: 0, y: 10 };
const NO_ROTATION: u32 = 0;

pub type OperationResult = PrintResult<String>;

#[derive(Debug, Clone)]
pub enum Command {
    PrintImage {
        backend: BackendId,
        image: Option<Bytes>,
        width: Option<u32>,
        height: Option<u32>,
    },
    PrintText {
        text: Option<String>,
        size: Option<u32>,
        align: Option<i64>,
    },
    SetDensity {
        density: Option<i64>,
    },
    CheckStatus {
        backend: BackendId,
    },
    PrintTestPage {
        backend: BackendId,
    },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::PrintImage { .. } => "PrintImage",
            Command::PrintText { .. } => "PrintText",
            Command::SetDensity { .. } => "SetDensity",
            Command::CheckStatus { .. } => "CheckStatus",
            Command::PrintTestPage { .. } => "PrintTestPage",
        }
    }
}

pub struct Dispatcher {
    registry: Arc<BackendRegistry>,
    identity: PlatformIdentity,
}

impl Dispatcher {
    pub fn new(registry: Arc<BackendRegistry>, identity: PlatformIdentity) -> Self {
        Self { registry, identity }
    }

    pub fn registry(&self) -> &Arc<BackendRegistry> {
        &self.registry
    }

    pub async fn handle(&self, command: Command) -> OperationResult {
        let name = command.name();
        info!("Handling {}", name);

        let result = match command {
            Command::PrintImage {
                backend,
                image,
                width,
                height,
            } => self.print_image(backend, image, width, height).await,
            Command::PrintText { text, size, align } => self.print_text(text, size, align).await,
            Command::SetDensity { density } => self.set_density(density).await,
            Command::CheckStatus { backend } => Ok(self.check_status(backend).await),
            Command::PrintTestPage { backend } => {
                self.submit(PrintJob {
                    backend,
                    payload: JobPayload::TestPage,
                    placement: IMAGE_PLACEMENT,
                    rotation: NO_ROTATION,
                })
                .await
            }
        };

        match &result {
            Ok(message) => info!("{} succeeded: {}", name, message),
            Err(e) => warn!("{} failed [{}]: {}", name, e.code(), e),
        }
        result
    }

    /// "connected" or "disconnected". Never initializes a backend.
    pub async fn check_status(&self, backend: BackendId) -> String {
        let driver = self.registry.resolve(backend);
        let driver = driver.lock().await;
        driver.status().as_str().to_string()
    }

    pub fn device_model(&self) -> String {
        self.identity.display_name()
    }

    async fn print_image(
        &self,
        backend: BackendId,
        image: Option<Bytes>,
        width: Option<u32>,
        height: Option<u32>,
    ) -> OperationResult {
        let image = image
            .filter(|bytes| !bytes.is_empty())
            .ok_or_else(|| PrintError::InvalidArgument("Image data is null".to_string()))?;

        // Requested dimensions are advisory; the decoded bitmap sizes the canvas.
        info!(
            "Attempting to print image on {} with width: {}, height: {}",
            backend,
            width.unwrap_or(DEFAULT_IMAGE_WIDTH),
            height.unwrap_or(0)
        );

        // Decoding is CPU-bound; keep it off the async worker.
        let pixels = tokio::task::spawn_blocking(move || decoder::decode(&image))
            .await
            .unwrap_or_else(|e| Err(PrintError::DecodeFailure(format!("decoder aborted: {}", e))))
            .map_err(|e| {
                error!("Failed to decode bitmap from image data: {}", e);
                e
            })?;

        self.submit(PrintJob {
            backend,
            payload: JobPayload::Bitmap {
                pixels,
                alignment: Alignment::Left,
            },
            placement: IMAGE_PLACEMENT,
            rotation: NO_ROTATION,
        })
        .await
    }

    async fn print_text(
        &self,
        text: Option<String>,
        size: Option<u32>,
        align: Option<i64>,
    ) -> OperationResult {
        let text = text
            .filter(|t| !t.is_empty())
            .ok_or_else(|| PrintError::InvalidArgument("Text is null".to_string()))?;
        let align_code = align.unwrap_or(0);
        let alignment = Alignment::from_code(align_code).ok_or_else(|| {
            PrintError::InvalidArgument(format!("Unknown alignment: {}", align_code))
        })?;

        self.submit(PrintJob {
            backend: BackendId::ThermalLine,
            payload: JobPayload::Text {
                text,
                font_size: size.unwrap_or(DEFAULT_FONT_SIZE),
                alignment,
            },
            placement: IMAGE_PLACEMENT,
            rotation: NO_ROTATION,
        })
        .await
    }

    async fn set_density(&self, density: Option<i64>) -> OperationResult {
        let density = density.unwrap_or(DEFAULT_DENSITY);
        let applied = self
            .with_driver(BackendId::ThermalLine, move |driver| {
                driver.set_density(density)
            })
            .await
            .map_err(|e| match e {
                PrintError::SettingError(_) => e,
                other => PrintError::SettingError(other.to_string()),
            })?;

        Ok(format!("Density set to {}", applied))
    }

    async fn submit(&self, job: PrintJob) -> OperationResult {
        info!("Submitting {} job to {}", job.payload.kind(), job.backend);
        self.with_driver(job.backend, move |driver| driver.submit_job(job))
            .await
    }

    /// Runs `op` against the backend's driver on the blocking pool while
    /// holding that backend's lock.
    async fn with_driver<T, F>(&self, backend: BackendId, op: F) -> PrintResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn BackendDriver) -> PrintResult<T> + Send + 'static,
    {
        let driver = self.registry.resolve(backend);
        let mut guard = driver.lock_owned().await;

        tokio::task::spawn_blocking(move || op(&mut **guard))
            .await
            .unwrap_or_else(|e| {
                error!("{} driver task aborted: {}", backend, e);
                Err(PrintError::HardwareFault {
                    kind: FaultKind::Device,
                    detail: format!("{} driver task aborted: {}", backend, e),
                })
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::png_bytes;
    use crate::mock_sdk::{MockLineSdk, MockPageSdk, MockStep, SdkCall, SdkJournal};
    use crate::probe::DeviceProbe;
    use crate::registry::DriverFactory;
    use crate::sdk::SdkBindings;

    struct Harness {
        dispatcher: Arc<Dispatcher>,
        page: MockPageSdk,
        journal: SdkJournal,
    }

    fn harness(manufacturer: &str, line_bound: bool) -> Harness {
        let journal = SdkJournal::default();
        let page = MockPageSdk::new(journal.clone());
        let line: Option<Arc<dyn crate::sdk::LineSdk>> = if line_bound {
            Some(Arc::new(MockLineSdk::new(journal.clone())))
        } else {
            None
        };
        let bindings = SdkBindings {
            page: Arc::new(page.clone()),
            line,
        };
        let identity = PlatformIdentity::new(manufacturer, "Model X");
        let probe = DeviceProbe::new(["sunmi"]).run(identity.clone());
        let registry = Arc::new(BackendRegistry::new(DriverFactory::new(bindings, &probe)));

        Harness {
            dispatcher: Arc::new(Dispatcher::new(registry, identity)),
            page,
            journal,
        }
    }

    fn print_image(backend: BackendId, bytes: Vec<u8>) -> Command {
        Command::PrintImage {
            backend,
            image: Some(Bytes::from(bytes)),
            width: None,
            height: None,
        }
    }

    #[tokio::test]
    async fn test_print_image_raster_sequence() {
        let h = harness("UROVO", false);
        h.page.set_return_code(-1);

        let result = h
            .dispatcher
            .handle(print_image(BackendId::RasterPage, png_bytes(64, 32)))
            .await;

        assert_eq!(
            result.as_deref(),
            Ok("Image printed successfully on raster-page")
        );
        assert_eq!(
            h.journal.calls(),
            vec![
                SdkCall::OpenPage,
                SdkCall::ClearPage,
                SdkCall::SetupPage {
                    width: 384,
                    height: 132
                },
                SdkCall::DrawBitmap { x: 0, y: 10 },
                SdkCall::PrintPage { rotation: 0 },
                SdkCall::ClearPage,
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_image_is_invalid_argument() {
        let h = harness("UROVO", false);

        for image in [None, Some(Bytes::new())] {
            let result = h
                .dispatcher
                .handle(Command::PrintImage {
                    backend: BackendId::RasterPage,
                    image,
                    width: Some(384),
                    height: Some(0),
                })
                .await;
            assert_eq!(result.unwrap_err().code(), "InvalidArgument");
        }
        assert!(h.journal.is_empty());
        assert!(h.dispatcher.registry().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_image_never_reaches_driver() {
        let h = harness("UROVO", false);

        for _ in 0..2 {
            let result = h
                .dispatcher
                .handle(print_image(BackendId::RasterPage, b"\x89PNG garbage".to_vec()))
                .await;
            assert_eq!(result.unwrap_err().code(), "DecodeFailure");
        }

        assert!(h.journal.is_empty());
        assert!(h.dispatcher.registry().is_empty());
    }

    #[tokio::test]
    async fn test_status_checks_never_initialize() {
        let h = harness("UROVO", false);
        h.page.fail_at(MockStep::Open, "printer service missing");

        for _ in 0..5 {
            let status = h
                .dispatcher
                .handle(Command::CheckStatus {
                    backend: BackendId::RasterPage,
                })
                .await;
            assert_eq!(status.as_deref(), Ok("disconnected"));
        }
        assert_eq!(h.journal.count(&SdkCall::OpenPage), 0);

        let result = h
            .dispatcher
            .handle(print_image(BackendId::RasterPage, png_bytes(8, 8)))
            .await;
        assert_eq!(result.unwrap_err().code(), "DriverUnavailable");
        assert_eq!(h.journal.count(&SdkCall::OpenPage), 1);

        assert_eq!(
            h.dispatcher.check_status(BackendId::RasterPage).await,
            "disconnected"
        );
        assert_eq!(h.journal.count(&SdkCall::OpenPage), 1);

        // The next job gets its own fresh attempt.
        h.page.recover(MockStep::Open);
        let result = h
            .dispatcher
            .handle(print_image(BackendId::RasterPage, png_bytes(8, 8)))
            .await;
        assert!(result.is_ok());
        assert_eq!(h.journal.count(&SdkCall::OpenPage), 2);
        assert_eq!(
            h.dispatcher.check_status(BackendId::RasterPage).await,
            "connected"
        );
    }

    #[tokio::test]
    async fn test_thermal_on_probe_negative_device() {
        let h = harness("UROVO", true);

        let result = h
            .dispatcher
            .handle(print_image(BackendId::ThermalLine, png_bytes(64, 32)))
            .await;

        let err = result.unwrap_err();
        assert_eq!(err.code(), "DriverUnavailable");
        assert!(err.to_string().contains("not detected"));
        assert!(h.journal.is_empty());
    }

    #[tokio::test]
    async fn test_print_text_defaults_and_validation() {
        let h = harness("SUNMI", true);

        let result = h
            .dispatcher
            .handle(Command::PrintText {
                text: Some("Receipt #42".to_string()),
                size: None,
                align: None,
            })
            .await;
        assert!(result.is_ok());
        assert_eq!(
            h.journal.calls().last(),
            Some(&SdkCall::PrintText {
                text: "Receipt #42".to_string(),
                font_size: 24,
                align: Alignment::Left,
            })
        );

        let missing = h
            .dispatcher
            .handle(Command::PrintText {
                text: None,
                size: Some(30),
                align: Some(1),
            })
            .await;
        assert_eq!(missing.unwrap_err().code(), "InvalidArgument");

        let bad_align = h
            .dispatcher
            .handle(Command::PrintText {
                text: Some("x".to_string()),
                size: None,
                align: Some(9),
            })
            .await;
        assert_eq!(bad_align.unwrap_err().code(), "InvalidArgument");
    }

    #[tokio::test]
    async fn test_set_density_clamps() {
        let h = harness("SUNMI", true);

        let result = h
            .dispatcher
            .handle(Command::SetDensity { density: Some(99) })
            .await;
        assert_eq!(result.as_deref(), Ok("Density set to 15"));
        assert_eq!(h.journal.calls().last(), Some(&SdkCall::SetDensity(15)));

        let result = h
            .dispatcher
            .handle(Command::SetDensity { density: None })
            .await;
        assert_eq!(result.as_deref(), Ok("Density set to 2"));
    }

    #[tokio::test]
    async fn test_set_density_without_printer_is_setting_error() {
        let h = harness("UROVO", true);

        let result = h
            .dispatcher
            .handle(Command::SetDensity { density: Some(4) })
            .await;
        assert_eq!(result.unwrap_err().code(), "SettingError");
        assert!(h.journal.is_empty());
    }

    #[tokio::test]
    async fn test_hardware_fault_keeps_handle_ready() {
        let h = harness("UROVO", false);
        h.page.fail_at(MockStep::Draw, "Stub!");

        let err = h
            .dispatcher
            .handle(print_image(BackendId::RasterPage, png_bytes(8, 8)))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            PrintError::HardwareFault {
                kind: FaultKind::SdkNotIntegrated,
                detail: "Stub!".to_string(),
            }
        );
        assert_eq!(
            h.dispatcher.check_status(BackendId::RasterPage).await,
            "connected"
        );
    }

    #[tokio::test]
    async fn test_print_test_page() {
        let h = harness("SUNMI", false);

        let raster = h
            .dispatcher
            .handle(Command::PrintTestPage {
                backend: BackendId::RasterPage,
            })
            .await;
        assert_eq!(raster.as_deref(), Ok("Test page printed on raster-page"));

        let thermal = h
            .dispatcher
            .handle(Command::PrintTestPage {
                backend: BackendId::ThermalLine,
            })
            .await;
        assert_eq!(thermal.as_deref(), Ok("Test page accepted by thermal-line"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_jobs_do_not_interleave() {
        let h = harness("UROVO", false);

        let jobs: Vec<_> = (0..4)
            .map(|i| {
                let dispatcher = h.dispatcher.clone();
                tokio::spawn(async move {
                    dispatcher
                        .handle(print_image(BackendId::RasterPage, png_bytes(16, 8 + i)))
                        .await
                })
            })
            .collect();

        for job in futures::future::join_all(jobs).await {
            assert!(job.expect("task joined").is_ok());
        }

        // Drop the open + sanity clear, then every job is a contiguous block.
        let calls = h.journal.calls();
        assert_eq!(&calls[..2], &[SdkCall::OpenPage, SdkCall::ClearPage]);
        let jobs = &calls[2..];
        assert_eq!(jobs.len(), 16);
        for block in jobs.chunks(4) {
            assert!(matches!(block[0], SdkCall::SetupPage { width: 384, .. }));
            assert_eq!(block[1], SdkCall::DrawBitmap { x: 0, y: 10 });
            assert_eq!(block[2], SdkCall::PrintPage { rotation: 0 });
            assert_eq!(block[3], SdkCall::ClearPage);
        }
    }

    #[test]
    fn test_device_model() {
        let h = harness("SUNMI", false);
        assert_eq!(h.dispatcher.device_model(), "SUNMI Model X");
    }
}
