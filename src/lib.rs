// Library module organization

pub mod config;
pub mod decoder;
pub mod dispatcher;
pub mod errors;
pub mod mock_sdk;
pub mod printers;
pub mod probe;
pub mod registry;
pub mod routes;
pub mod sdk;

// Re-export commonly used types for convenience
pub use dispatcher::{Command, Dispatcher, OperationResult};
pub use errors::{FaultKind, PrintError, SdkFault};
pub use printers::{BackendDriver, BackendId, BackendStatus, DriverState, PrintJob};
pub use probe::{DeviceProbe, PlatformIdentity};
pub use registry::{BackendRegistry, DriverFactory};
