//! Process-wide ownership of backend drivers.
//!
//! Each backend gets one driver for the life of the process, created on first
//! use and wrapped in its own async mutex. That mutex is the only
//! synchronisation a job needs: holding it covers the whole
//! initialize → submit → cleanup sequence, so jobs on one backend never
//! interleave while the two backends stay independent.

use futures::future::join_all;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{error, info};

use crate::printers::{BackendDriver, BackendId, RasterPageDriver, ThermalLineDriver};
use crate::probe::ProbeOutcome;
use crate::sdk::SdkBindings;

pub type SharedDriver = Arc<AsyncMutex<Box<dyn BackendDriver>>>;

/// Builds the driver variant matching a backend identity.
#[derive(Clone)]
pub struct DriverFactory {
    bindings: SdkBindings,
    thermal_line_present: bool,
    device_name: String,
}

impl DriverFactory {
    pub fn new(bindings: SdkBindings, probe: &ProbeOutcome) -> Self {
        Self {
            bindings,
            thermal_line_present: probe.thermal_line_present,
            device_name: probe.identity.display_name(),
        }
    }

    pub fn build(&self, backend: BackendId) -> Box<dyn BackendDriver> {
        match backend {
            BackendId::RasterPage => Box::new(RasterPageDriver::new(self.bindings.page.clone())),
            BackendId::ThermalLine => Box::new(ThermalLineDriver::new(
                self.bindings.line.clone(),
                self.thermal_line_present,
                &self.device_name,
            )),
        }
    }
}

pub struct BackendRegistry {
    factory: DriverFactory,
    handles: Mutex<HashMap<BackendId, SharedDriver>>,
}

impl BackendRegistry {
    pub fn new(factory: DriverFactory) -> Self {
        Self {
            factory,
            handles: Mutex::new(HashMap::new()),
        }
    }

    fn handles(&self) -> MutexGuard<'_, HashMap<BackendId, SharedDriver>> {
        // The map is only ever inserted into or drained; a poisoned guard
        // still holds a consistent map.
        self.handles.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns the driver for `backend`, creating it uninitialized on first
    /// use. Never initializes or retries a failed driver.
    pub fn resolve(&self, backend: BackendId) -> SharedDriver {
        self.handles()
            .entry(backend)
            .or_insert_with(|| {
                info!("Creating driver for {}", backend);
                Arc::new(AsyncMutex::new(self.factory.build(backend)))
            })
            .clone()
    }

    pub fn len(&self) -> usize {
        self.handles().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles().is_empty()
    }

    /// Eagerly creates and initializes every backend once.
    pub async fn warm_up(&self) {
        for backend in BackendId::ALL {
            let driver = self.resolve(backend);
            let status = run_blocking(backend, driver, |driver| {
                driver.initialize();
                driver.status()
            })
            .await;
            if let Some(status) = status {
                info!("{} warm-up finished: {}", backend, status.as_str());
            }
        }
    }

    /// Drops every driver after its in-flight job, if any, finishes.
    pub async fn shutdown(&self) {
        let drained: Vec<(BackendId, SharedDriver)> = self.handles().drain().collect();
        info!("Shutting down {} printer backend(s)", drained.len());

        join_all(drained.into_iter().map(|(backend, driver)| async move {
            if run_blocking(backend, driver, |driver| driver.teardown())
                .await
                .is_some()
            {
                info!("{} released", backend);
            }
        }))
        .await;
    }
}

/// Runs a vendor-facing driver call on the blocking pool under the backend's
/// lock. `None` if the call panicked.
async fn run_blocking<T, F>(backend: BackendId, driver: SharedDriver, op: F) -> Option<T>
where
    T: Send + 'static,
    F: FnOnce(&mut dyn BackendDriver) -> T + Send + 'static,
{
    let mut guard = driver.lock_owned().await;
    match tokio::task::spawn_blocking(move || op(&mut **guard)).await {
        Ok(value) => Some(value),
        Err(e) => {
            error!("{} driver task aborted: {}", backend, e);
            None
        }
    }
}
