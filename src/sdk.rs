//! Vendor SDK seams.
//!
//! Both printer families ship an imperative vendor library. These traits are
//! the narrowest surface the drivers need from each one; everything behind
//! them (USB/serial framing, firmware quirks, timeouts) belongs to the vendor.

use std::sync::Arc;
use tracing::{info, warn};

use crate::decoder::PixelBuffer;
use crate::errors::SdkFault;
use crate::mock_sdk::{MockLineSdk, MockPageSdk, SdkJournal};
use crate::printers::Alignment;

/// Raster "page" printer library.
pub trait PageSdk: Send + Sync {
    fn open(&self) -> Result<Box<dyn PageSession>, SdkFault>;
}

/// Live session with the raster page printer. Return codes are vendor status
/// codes and are not reliable; only an `Err` means the call faulted.
pub trait PageSession: Send {
    fn setup_page(&mut self, width: u32, height: u32) -> Result<i32, SdkFault>;
    fn draw_bitmap(&mut self, bitmap: &PixelBuffer, x: u32, y: u32) -> Result<i32, SdkFault>;
    fn print_page(&mut self, rotation: u32) -> Result<i32, SdkFault>;
    fn clear_page(&mut self) -> Result<(), SdkFault>;
    fn close(&mut self) -> Result<(), SdkFault>;
}

/// Thermal line printer library.
pub trait LineSdk: Send + Sync {
    fn open(&self) -> Result<Box<dyn LineSession>, SdkFault>;
}

pub trait LineSession: Send {
    fn reset(&mut self) -> Result<(), SdkFault>;
    fn print_bitmap(&mut self, bitmap: &PixelBuffer, align: Alignment) -> Result<(), SdkFault>;
    fn print_text(
        &mut self,
        text: &str,
        font_size: u32,
        align: Alignment,
    ) -> Result<(), SdkFault>;
    fn set_density(&mut self, density: u8) -> Result<(), SdkFault>;
    fn close(&mut self) -> Result<(), SdkFault>;
}

const STUB_MESSAGE: &str = "Stub!";

/// Stand-in for a page SDK whose platform binding is missing. Opening
/// succeeds, but every call on the session raises "Stub!".
pub struct StubPageSdk;

impl PageSdk for StubPageSdk {
    fn open(&self) -> Result<Box<dyn PageSession>, SdkFault> {
        Ok(Box::new(StubPageSession))
    }
}

struct StubPageSession;

impl PageSession for StubPageSession {
    fn setup_page(&mut self, _width: u32, _height: u32) -> Result<i32, SdkFault> {
        Err(SdkFault::new(STUB_MESSAGE))
    }

    fn draw_bitmap(&mut self, _bitmap: &PixelBuffer, _x: u32, _y: u32) -> Result<i32, SdkFault> {
        Err(SdkFault::new(STUB_MESSAGE))
    }

    fn print_page(&mut self, _rotation: u32) -> Result<i32, SdkFault> {
        Err(SdkFault::new(STUB_MESSAGE))
    }

    fn clear_page(&mut self) -> Result<(), SdkFault> {
        Err(SdkFault::new(STUB_MESSAGE))
    }

    fn close(&mut self) -> Result<(), SdkFault> {
        Ok(())
    }
}

/// SDK bindings handed to the driver factory.
#[derive(Clone)]
pub struct SdkBindings {
    pub page: Arc<dyn PageSdk>,
    /// `None` when no thermal library is linked; jobs are then acknowledged
    /// without a hardware call.
    pub line: Option<Arc<dyn LineSdk>>,
}

// Factory function to pick the bindings for this process
pub fn bind_sdks(use_mock: bool) -> SdkBindings {
    if use_mock {
        warn!("USE_MOCK_PRINTER set, binding recording mock SDKs");
        let journal = SdkJournal::default();
        SdkBindings {
            page: Arc::new(MockPageSdk::new(journal.clone())),
            line: Some(Arc::new(MockLineSdk::new(journal))),
        }
    } else {
        info!("Binding platform page SDK; no thermal line library linked");
        SdkBindings {
            page: Arc::new(StubPageSdk),
            line: None,
        }
    }
}
