//! Log monitoring, error classification, and remediation engine.

pub mod detector;
pub mod dispatcher;
pub mod error;
pub mod gate;
pub mod ledger;
pub mod mapper;
pub mod monitor;
pub mod prompt;
pub mod runtime;
pub mod suggestions;

pub use detector::detect;
pub use dispatcher::Dispatcher;
pub use error::EngineError;
pub use gate::AutoApplyGate;
pub use ledger::FixLedger;
pub use mapper::map_batch;
pub use monitor::{BatchHandler, Monitor, MonitorSession, MonitorSettings, SessionStats};
pub use runtime::{Diagnosis, EMPTY_RESPONSE, LogReport, Runtime};
pub use suggestions::parse_suggestions;
