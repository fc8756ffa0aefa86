//! POS Sync - offline-first synchronization core for a point-of-sale terminal
//!
//! # Overview
//!
//! Keeps a local product and sales store consistent with two remote systems:
//!
//! - **Catalog** (`gateway::catalog`): e-commerce product catalog, OAuth 1.0a signed
//! - **Ledger** (`gateway::ledger`): central sales ledger, bearer token
//!
//! Mutations made while offline go to a bounded queue (`sync::queue`) and are
//! replayed when the connectivity monitor (`sync::connectivity`) reports the
//! network back. The orchestrator (`sync::orchestrator`) runs one cycle at a time.
//!
//! # Layout
//!
//! ```text
//! pos-sync/src/
//! ├── core/          # config, composition root, background tasks
//! ├── store/         # local storage (redb)
//! ├── gateway/       # remote catalog and ledger clients
//! ├── sync/          # monitor, queue, conflicts, orchestrator, worker
//! ├── api/           # webhook and sync control HTTP routes
//! └── utils/         # errors, logging
//! ```

pub mod api;
pub mod core;
pub mod gateway;
pub mod store;
pub mod sync;
pub mod utils;

pub use core::{AppContext, BackgroundTasks, Config, TaskKind};
pub use store::{LocalStore, RedbStore, SharedStore};
pub use sync::{CycleOutcome, CycleTrigger, SyncOrchestrator};
pub use utils::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode};
pub use utils::logger::{init_logger, init_logger_with_file};

/// Create the log directory and start logging
pub fn setup_environment(config: &Config) -> std::io::Result<()> {
    std::fs::create_dir_all(config.log_dir())?;
    init_logger_with_file(Some(&config.log_level), config.log_json, Some(&config.log_dir()));
    Ok(())
}

pub fn print_banner() {
    println!(
        r#"
    ____  ____  _____    _____
   / __ \/ __ \/ ___/   / ___/__  ______  _____
  / /_/ / / / /\__ \    \__ \/ / / / __ \/ ___/
 / ____/ /_/ /___/ /   ___/ / /_/ / / / / /__
/_/    \____//____/   /____/\__, /_/ /_/\___/
                           /____/
    "#
    );
}
