//! Reconciliation engine that mirrors contacts and bookings from an external
//! wellness platform into a local store.
//!
//! The engine periodically pulls records over HTTP, matches each one to a
//! local entity (or creates one), applies field mapping, and stamps a sync
//! lifecycle (`pending → syncing → synced | error`) on every record it
//! touches. Failures are isolated per record: one bad record never aborts a
//! batch, and one unreachable feed never blocks the other entity kind.
//!
//! Entry points:
//! - [`orchestrator::SyncOrchestrator`] — `sync_contacts` / `sync_bookings` /
//!   `sync_all` / `force_sync`, invoked by a scheduler or an admin trigger.
//! - [`scheduler::SyncScheduler`] — tokio-based periodic driver with a
//!   manual trigger handle.
//!
//! The CRUD layer, HTTP surface, and relational schema live outside this
//! crate; the engine reaches the local store through the
//! [`store::ContactStore`] and [`store::BookingStore`] traits.

pub mod client;
pub mod config;
pub mod error;
pub mod model;
pub mod orchestrator;
pub mod reconciler;
pub mod retry;
pub mod scheduler;
pub mod store;

pub use client::ExternalApiClient;
pub use config::{ConfigError, SyncConfig};
pub use error::{TransportError, TransportResult};
pub use model::{Booking, BookingStatus, Contact, SyncStatus};
pub use orchestrator::{FullSyncReport, SyncOrchestrator, SyncReport};
pub use reconciler::{BookingReconciler, ContactReconciler, RecordError, SyncOutcome};
pub use retry::RetryPolicy;
pub use scheduler::{SchedulerHandle, SyncKind, SyncScheduler};
pub use store::{BookingStore, ContactStore, MemoryStore, StoreError, StoreResult};
