//! Core: configuration, composition root and background tasks
//!
//! - [`Config`] - environment configuration
//! - [`AppContext`] - wires store, gateways, queue, monitor and orchestrator
//! - [`BackgroundTasks`] - task registry with graceful shutdown

pub mod config;
pub mod context;
pub mod tasks;

pub use config::Config;
pub use context::AppContext;
pub use tasks::{BackgroundTasks, TaskKind};
