// Recording SDK implementations for tests or when no real printer is available

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::decoder::PixelBuffer;
use crate::errors::SdkFault;
use crate::printers::Alignment;
use crate::sdk::{LineSdk, LineSession, PageSdk, PageSession};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SdkCall {
    OpenPage,
    SetupPage { width: u32, height: u32 },
    DrawBitmap { x: u32, y: u32 },
    PrintPage { rotation: u32 },
    ClearPage,
    ClosePage,
    OpenLine,
    Reset,
    PrintBitmap { width: u32, height: u32, align: Alignment },
    PrintText { text: String, font_size: u32, align: Alignment },
    SetDensity(u8),
    CloseLine,
}

/// Step names a mock can be told to fail at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockStep {
    Open,
    Setup,
    Draw,
    Print,
    Clear,
    Reset,
    PrintBitmap,
    PrintText,
    SetDensity,
}

/// Shared, append-only log of every SDK call made through the mocks.
#[derive(Debug, Clone, Default)]
pub struct SdkJournal {
    calls: Arc<Mutex<Vec<SdkCall>>>,
}

impl SdkJournal {
    fn lock(&self) -> MutexGuard<'_, Vec<SdkCall>> {
        // A poisoned journal only means a test thread panicked mid-push.
        self.calls.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn record(&self, call: SdkCall) {
        self.lock().push(call);
    }

    pub fn calls(&self) -> Vec<SdkCall> {
        self.lock().clone()
    }

    pub fn count(&self, call: &SdkCall) -> usize {
        self.lock().iter().filter(|c| *c == call).count()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

#[derive(Debug, Clone, Default)]
struct FaultPlan {
    faults: Arc<Mutex<HashMap<MockStep, String>>>,
    return_code: Arc<Mutex<i32>>,
}

impl FaultPlan {
    fn check(&self, step: MockStep) -> Result<(), SdkFault> {
        let faults = self.faults.lock().unwrap_or_else(|e| e.into_inner());
        match faults.get(&step) {
            Some(message) => Err(SdkFault::new(message.clone())),
            None => Ok(()),
        }
    }

    fn return_code(&self) -> i32 {
        *self.return_code.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Page SDK that records calls and fails on request.
#[derive(Clone)]
pub struct MockPageSdk {
    journal: SdkJournal,
    plan: FaultPlan,
}

impl MockPageSdk {
    pub fn new(journal: SdkJournal) -> Self {
        Self {
            journal,
            plan: FaultPlan::default(),
        }
    }

    /// Makes `step` raise `message` from now on.
    pub fn fail_at(&self, step: MockStep, message: &str) {
        self.plan
            .faults
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(step, message.to_string());
    }

    pub fn recover(&self, step: MockStep) {
        self.plan
            .faults
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&step);
    }

    /// Vendor status code returned by setup/draw/print.
    pub fn set_return_code(&self, code: i32) {
        *self.plan.return_code.lock().unwrap_or_else(|e| e.into_inner()) = code;
    }
}

impl PageSdk for MockPageSdk {
    fn open(&self) -> Result<Box<dyn PageSession>, SdkFault> {
        self.journal.record(SdkCall::OpenPage);
        self.plan.check(MockStep::Open)?;
        Ok(Box::new(MockPageSession {
            journal: self.journal.clone(),
            plan: self.plan.clone(),
        }))
    }
}

struct MockPageSession {
    journal: SdkJournal,
    plan: FaultPlan,
}

impl PageSession for MockPageSession {
    fn setup_page(&mut self, width: u32, height: u32) -> Result<i32, SdkFault> {
        self.journal.record(SdkCall::SetupPage { width, height });
        self.plan.check(MockStep::Setup)?;
        Ok(self.plan.return_code())
    }

    fn draw_bitmap(&mut self, _bitmap: &PixelBuffer, x: u32, y: u32) -> Result<i32, SdkFault> {
        self.journal.record(SdkCall::DrawBitmap { x, y });
        self.plan.check(MockStep::Draw)?;
        Ok(self.plan.return_code())
    }

    fn print_page(&mut self, rotation: u32) -> Result<i32, SdkFault> {
        self.journal.record(SdkCall::PrintPage { rotation });
        self.plan.check(MockStep::Print)?;
        Ok(self.plan.return_code())
    }

    fn clear_page(&mut self) -> Result<(), SdkFault> {
        self.journal.record(SdkCall::ClearPage);
        self.plan.check(MockStep::Clear)
    }

    fn close(&mut self) -> Result<(), SdkFault> {
        self.journal.record(SdkCall::ClosePage);
        Ok(())
    }
}

/// Line SDK that records calls and fails on request.
#[derive(Clone)]
pub struct MockLineSdk {
    journal: SdkJournal,
    plan: FaultPlan,
}

impl MockLineSdk {
    pub fn new(journal: SdkJournal) -> Self {
        Self {
            journal,
            plan: FaultPlan::default(),
        }
    }

    pub fn fail_at(&self, step: MockStep, message: &str) {
        self.plan
            .faults
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(step, message.to_string());
    }

    pub fn recover(&self, step: MockStep) {
        self.plan
            .faults
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&step);
    }
}

impl LineSdk for MockLineSdk {
    fn open(&self) -> Result<Box<dyn LineSession>, SdkFault> {
        self.journal.record(SdkCall::OpenLine);
        self.plan.check(MockStep::Open)?;
        Ok(Box::new(MockLineSession {
            journal: self.journal.clone(),
            plan: self.plan.clone(),
        }))
    }
}

struct MockLineSession {
    journal: SdkJournal,
    plan: FaultPlan,
}

impl LineSession for MockLineSession {
    fn reset(&mut self) -> Result<(), SdkFault> {
        self.journal.record(SdkCall::Reset);
        self.plan.check(MockStep::Reset)
    }

    fn print_bitmap(&mut self, bitmap: &PixelBuffer, align: Alignment) -> Result<(), SdkFault> {
        self.journal.record(SdkCall::PrintBitmap {
            width: bitmap.width,
            height: bitmap.height,
            align,
        });
        self.plan.check(MockStep::PrintBitmap)
    }

    fn print_text(
        &mut self,
        text: &str,
        font_size: u32,
        align: Alignment,
    ) -> Result<(), SdkFault> {
        self.journal.record(SdkCall::PrintText {
            text: text.to_string(),
            font_size,
            align,
        });
        self.plan.check(MockStep::PrintText)
    }

    fn set_density(&mut self, density: u8) -> Result<(), SdkFault> {
        self.journal.record(SdkCall::SetDensity(density));
        self.plan.check(MockStep::SetDensity)
    }

    fn close(&mut self) -> Result<(), SdkFault> {
        self.journal.record(SdkCall::CloseLine);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_journal_records_and_faults() {
        let journal = SdkJournal::default();
        let sdk = MockPageSdk::new(journal.clone());
        sdk.set_return_code(-3);

        let mut session = sdk.open().expect("mock opens");
        assert_eq!(session.setup_page(384, 132), Ok(-3));

        sdk.fail_at(MockStep::Clear, "clear jammed");
        assert_eq!(
            session.clear_page(),
            Err(SdkFault::new("clear jammed"))
        );

        sdk.recover(MockStep::Clear);
        assert!(session.clear_page().is_ok());

        assert_eq!(
            journal.calls(),
            vec![
                SdkCall::OpenPage,
                SdkCall::SetupPage {
                    width: 384,
                    height: 132
                },
                SdkCall::ClearPage,
                SdkCall::ClearPage,
            ]
        );
        assert_eq!(journal.count(&SdkCall::ClearPage), 2);
    }
}
