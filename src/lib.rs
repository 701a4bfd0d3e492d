//! Floatplan - Offline-First Float Plan Sync
//!
//! A float plan records a boat trip and the time the skipper promises to
//! check in. If that deadline passes without a check-in, emergency contacts
//! are escalated. This library keeps plans usable on a flaky marine
//! connection: every change commits locally first and reaches the server
//! when it can.
//!
//! # Module Structure
//!
//! - **`shared`** - Plan data types, field validation, configuration types
//! - **`config`** - Environment and file backed configuration wrapper
//! - **`local_db`** - SQLite persistence for plans, contacts and the
//!   pending operation queue
//! - **`offline`** - Durable operation log with check-in priority and
//!   bounded retry with backoff
//! - **`remote`** - The remote API seam and its HTTP implementation
//! - **`sync`** - Sync engine, connectivity monitor, background drain loop
//! - **`store`** - In-memory plan store readers
//! - **`schedule`** - Pre-reminder and deadline notifications
//! - **`lifecycle`** - The controller every plan transition goes through
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use chrono::{Duration, Utc};
//! use floatplan::config::Config;
//! use floatplan::lifecycle::LifecycleController;
//! use floatplan::local_db::LocalDatabase;
//! use floatplan::offline::OperationLog;
//! use floatplan::remote::HttpRemote;
//! use floatplan::schedule::{DeadlineScheduler, TokioNotifier};
//! use floatplan::shared::FloatPlan;
//! use floatplan::store::PlanStore;
//! use floatplan::sync::{ConnectivityMonitor, SyncConfig, SyncEngine};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load()?;
//! let db = Arc::new(LocalDatabase::open(config.database_path()).await?);
//! let log = Arc::new(OperationLog::open(Arc::clone(&db)).await?);
//! let store = Arc::new(PlanStore::open(Arc::clone(&db)).await?);
//! let remote = Arc::new(HttpRemote::new(&config)?);
//! let engine = SyncEngine::open(
//!     SyncConfig::from_config(&config),
//!     db,
//!     log,
//!     Arc::clone(&store),
//!     remote,
//!     ConnectivityMonitor::new(false),
//! )
//! .await?;
//! let scheduler = Arc::new(DeadlineScheduler::new(Arc::new(TokioNotifier::new())));
//! let controller = LifecycleController::new(store, scheduler, engine);
//!
//! let plan = controller
//!     .create(FloatPlan::new("Sea Otter", Utc::now() + Duration::hours(2)))
//!     .await?;
//! controller.activate(plan.id).await?;
//! // ...later, even with no signal:
//! controller.check_in(plan.id, None).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! Each layer has its own `thiserror` enum: `SharedError`, `ConfigError`,
//! `RemoteError`, `SyncError` and `LifecycleError`. Storage calls return
//! `local_db::Result`. Network failures never surface from a transition.

/// Shared types and data structures
pub mod shared;

/// Runtime configuration
pub mod config;

/// Local SQLite persistence
pub mod local_db;

/// Offline operation log and retry policy
pub mod offline;

/// Remote float plan API
pub mod remote;

/// Sync engine and connectivity
pub mod sync;

/// Plan store
pub mod store;

/// Deadline notifications
pub mod schedule;

/// Plan lifecycle controller
pub mod lifecycle;
