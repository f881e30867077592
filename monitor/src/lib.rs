//! Integrity monitor: resolves monitored process roots, runs the periodic
//! hash-and-compare passes, and wires alerts and workload restarts to
//! integrity violations.

pub mod config;
pub mod engine;
pub mod error;
pub mod graceful;
pub mod integrity;
pub mod options;
pub mod procroot;
pub mod producer;
pub mod run;

pub use error::{MonitorError, MonitorResult};
