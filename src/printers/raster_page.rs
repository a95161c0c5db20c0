use std::sync::Arc;
use tracing::{error, info, warn};

use crate::decoder::PixelBuffer;
use crate::errors::{PrintError, PrintResult, SdkFault};
use crate::printers::{BackendDriver, BackendId, DriverState, JobPayload, Placement, PrintJob};
use crate::sdk::{PageSdk, PageSession};

/// Printable width of a 58mm head, in device dots.
pub const PRINT_WIDTH: u32 = 384;
/// Extra canvas height around the bitmap.
pub const PAGE_MARGIN: u32 = 100;
pub const TEST_PAGE_HEIGHT: u32 = 200;

pub struct RasterPageDriver {
    sdk: Arc<dyn PageSdk>,
    session: Option<Box<dyn PageSession>>,
    state: DriverState,
}

impl RasterPageDriver {
    pub fn new(sdk: Arc<dyn PageSdk>) -> Self {
        Self {
            sdk,
            session: None,
            state: DriverState::Uninitialized,
        }
    }
}

impl BackendDriver for RasterPageDriver {
    fn backend(&self) -> BackendId {
        BackendId::RasterPage
    }

    fn state(&self) -> &DriverState {
        &self.state
    }

    fn initialize(&mut self) {
        match self.sdk.open() {
            Ok(mut session) => {
                info!("Page printer session opened");

                // Advisory: a failure here does not demote the session.
                match session.clear_page() {
                    Ok(()) => info!("Page printer test operation successful"),
                    Err(e) => warn!("Page printer test operation failed: {}", e),
                }

                self.session = Some(session);
                self.state = DriverState::Ready;
            }
            Err(e) => {
                error!("Failed to open page printer session: {}", e);
                self.session = None;
                self.state = DriverState::Failed(e.message);
            }
        }
    }

    fn teardown(&mut self) {
        if let Some(mut session) = self.session.take() {
            match session.close() {
                Ok(()) => info!("Page printer session closed"),
                Err(e) => warn!("Failed to close page printer session: {}", e),
            }
        }
        self.state = DriverState::Uninitialized;
    }

    fn submit_job(&mut self, job: PrintJob) -> PrintResult<String> {
        self.ensure_ready()?;
        let session = self.session.as_mut().ok_or_else(|| {
            PrintError::DriverUnavailable("raster-page session missing".to_string())
        })?;

        let outcome = match &job.payload {
            JobPayload::Bitmap { pixels, .. } => {
                info!("Bitmap dimensions: {}x{}", pixels.width, pixels.height);
                let height = pixels.height.saturating_add(PAGE_MARGIN);
                run_canvas(
                    &mut **session,
                    height,
                    Some((pixels, job.placement)),
                    job.rotation,
                )
            }
            JobPayload::TestPage => {
                run_canvas(&mut **session, TEST_PAGE_HEIGHT, None, job.rotation)
            }
            JobPayload::Text { .. } => {
                return Err(PrintError::InvalidArgument(
                    "raster-page backend does not print text".to_string(),
                ));
            }
        };

        match outcome {
            Ok(()) => Ok(match job.payload {
                JobPayload::TestPage => "Test page printed on raster-page".to_string(),
                _ => "Image printed successfully on raster-page".to_string(),
            }),
            Err(fault) => {
                error!("Printer operation failed: {}", fault);
                if fault.is_stub() {
                    error!("Page SDK methods are stubs; the device lacks the printer or the SDK is not integrated");
                }
                Err(PrintError::from(fault))
            }
        }
    }
}

/// Allocates, optionally draws, prints, then clears a canvas. The clear runs
/// whenever a canvas was allocated and never affects the result.
fn run_canvas(
    session: &mut dyn PageSession,
    height: u32,
    bitmap: Option<(&PixelBuffer, Placement)>,
    rotation: u32,
) -> Result<(), SdkFault> {
    let setup = session.setup_page(PRINT_WIDTH, height)?;
    info!("Setup page result: {}", setup);

    let printed = draw_and_print(session, bitmap, rotation);
    clear_canvas(session);
    printed
}

fn draw_and_print(
    session: &mut dyn PageSession,
    bitmap: Option<(&PixelBuffer, Placement)>,
    rotation: u32,
) -> Result<(), SdkFault> {
    if let Some((pixels, at)) = bitmap {
        let drawn = session.draw_bitmap(pixels, at.x, at.y)?;
        info!("Draw bitmap result: {}", drawn);
    }

    // Vendor return codes are unreliable; only a raised fault fails the job.
    let printed = session.print_page(rotation)?;
    info!("Print result: {}", printed);
    Ok(())
}

fn clear_canvas(session: &mut dyn PageSession) {
    match session.clear_page() {
        Ok(()) => info!("Page cleared successfully"),
        Err(e) => warn!("Failed to clear page: {}", e),
    }
}
