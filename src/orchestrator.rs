//! Single entry point for scheduled and on-demand synchronization.
//!
//! Runs the entity reconcilers, contacts before bookings, and keeps the two
//! failure severities apart: a fetch-level transport failure surfaces as a
//! failed report for that entity kind, while individual record failures are
//! folded into a completed report's counters.

use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::client::ExternalApiClient;
use crate::config::SyncConfig;
use crate::error::TransportResult;
use crate::reconciler::{BookingReconciler, ContactReconciler, SyncOutcome};
use crate::store::{BookingStore, ContactStore};

/// Result envelope for one entity kind's sync run.
///
/// Serializes with a boolean `success` discriminator:
/// `{ "success": true, "synced": .., "errors": .., .. }` for a completed run,
/// `{ "success": false, "error": .. }` for a fetch-level failure.
#[derive(Debug, Clone)]
pub enum SyncReport {
    /// The feed was fetched; per-record failures are in the counters.
    Completed(SyncOutcome),
    /// The fetch itself failed; nothing was reconciled this run.
    Failed { error: String },
}

impl Serialize for SyncReport {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Completed(outcome) => {
                let mut map = serializer.serialize_map(Some(5))?;
                map.serialize_entry("success", &true)?;
                map.serialize_entry("synced", &outcome.synced)?;
                map.serialize_entry("errors", &outcome.errors)?;
                map.serialize_entry("total", &outcome.total)?;
                map.serialize_entry("error_details", &outcome.error_details)?;
                map.end()
            }
            Self::Failed { error } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("success", &false)?;
                map.serialize_entry("error", error)?;
                map.end()
            }
        }
    }
}

impl SyncReport {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    /// The outcome counters, when the run completed.
    #[must_use]
    pub fn outcome(&self) -> Option<&SyncOutcome> {
        match self {
            Self::Completed(outcome) => Some(outcome),
            Self::Failed { .. } => None,
        }
    }
}

/// Aggregate of a full run across both entity kinds.
#[derive(Debug, Clone, Serialize)]
pub struct FullSyncReport {
    pub contacts: SyncReport,
    pub bookings: SyncReport,
    pub completed_at: DateTime<Utc>,
}

/// Façade invoked by the scheduler or a manual trigger.
///
/// Concurrent runs of the same entity kind are serialized by a per-kind
/// lock, so every entry point is safe to call repeatedly and concurrently.
pub struct SyncOrchestrator {
    client: Arc<ExternalApiClient>,
    contacts: Arc<dyn ContactStore>,
    bookings: Arc<dyn BookingStore>,
    page_size: u32,
    contact_run: Mutex<()>,
    booking_run: Mutex<()>,
}

impl SyncOrchestrator {
    /// Build an orchestrator from configuration and store handles.
    pub fn new(
        config: &SyncConfig,
        contacts: Arc<dyn ContactStore>,
        bookings: Arc<dyn BookingStore>,
    ) -> TransportResult<Self> {
        let client = Arc::new(ExternalApiClient::new(config)?);
        Ok(Self::with_client(client, contacts, bookings, config.page_size))
    }

    /// Build an orchestrator around an existing client (for testing).
    #[must_use]
    pub fn with_client(
        client: Arc<ExternalApiClient>,
        contacts: Arc<dyn ContactStore>,
        bookings: Arc<dyn BookingStore>,
        page_size: u32,
    ) -> Self {
        Self {
            client,
            contacts,
            bookings,
            page_size,
            contact_run: Mutex::new(()),
            booking_run: Mutex::new(()),
        }
    }

    /// Reconcile the contact feed.
    pub async fn sync_contacts(&self) -> SyncReport {
        let _guard = self.contact_run.lock().await;
        let reconciler =
            ContactReconciler::new(self.client.clone(), self.contacts.clone(), self.page_size);
        Self::report(reconciler.run().await, "contact")
    }

    /// Reconcile the booking feed.
    pub async fn sync_bookings(&self) -> SyncReport {
        let _guard = self.booking_run.lock().await;
        let reconciler = BookingReconciler::new(
            self.client.clone(),
            self.bookings.clone(),
            self.contacts.clone(),
            self.page_size,
        );
        Self::report(reconciler.run().await, "booking")
    }

    /// Reconcile both feeds, contacts first so bookings can resolve their
    /// parents. A total failure of one kind does not stop the other.
    pub async fn sync_all(&self) -> FullSyncReport {
        let contacts = self.sync_contacts().await;
        let bookings = self.sync_bookings().await;
        FullSyncReport {
            contacts,
            bookings,
            completed_at: Utc::now(),
        }
    }

    /// Run both syncs synchronously and return the full aggregate — the
    /// administrative on-demand trigger, with no scheduling indirection.
    pub async fn force_sync(&self) -> FullSyncReport {
        info!("force sync requested");
        let report = self.sync_all().await;
        info!(
            contacts_ok = report.contacts.is_success(),
            bookings_ok = report.bookings.is_success(),
            "force sync finished"
        );
        report
    }

    fn report(result: TransportResult<SyncOutcome>, entity: &str) -> SyncReport {
        match result {
            Ok(outcome) => SyncReport::Completed(outcome),
            Err(e) => {
                error!(entity = entity, error = %e, "sync run failed at fetch");
                SyncReport::Failed {
                    error: e.to_string(),
                }
            }
        }
    }
}
