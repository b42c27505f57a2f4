//! Kubernetes log monitoring, error classification, and remediation.

pub use kubemend_application as application;
pub use kubemend_domain as domain;
pub use kubemend_ports as ports;

#[cfg(feature = "cli")]
pub use kubemend_ui_terminal as terminal;

pub use kubemend_application::{Diagnosis, EngineError, LogReport, MonitorSession, Runtime};
pub use kubemend_domain::{AppliedFix, FixAction, KubemendConfig, MonitoringTarget, Suggestion};
pub use kubemend_ports::PortSet;
