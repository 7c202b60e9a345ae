//! Local store seam used by the reconcilers.
//!
//! The CRUD layer owns the real relational store; the engine only needs the
//! lookups and upserts below, so they are expressed as capability traits with
//! an in-memory implementation for tests and embedders.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::model::{Booking, Contact, SyncStatus};

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by the local store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Persistence-time validation failed; nothing was written.
    #[error("validation failed: {}", messages.join(", "))]
    Validation { messages: Vec<String> },

    /// The entity targeted by a metadata update no longer exists.
    #[error("record not found: {0}")]
    NotFound(Uuid),

    /// Backend-specific failure (connection loss, I/O).
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Counts of entities per sync status, plus the most recent sync timestamp.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct SyncStatusSummary {
    pub total: usize,
    pub synced: usize,
    pub pending: usize,
    pub error: usize,
    pub last_synced_at: Option<DateTime<Utc>>,
}

/// Contact lookups and writes needed by the reconciler.
#[async_trait]
pub trait ContactStore: Send + Sync {
    async fn find_by_external_id(&self, external_id: &str) -> StoreResult<Option<Contact>>;

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Contact>>;

    /// Insert or update by primary key, running field validation and the
    /// email uniqueness check. An invalid entity writes nothing.
    async fn upsert(&self, contact: Contact) -> StoreResult<Contact>;

    /// Update only the sync metadata triple, leaving business fields alone.
    async fn update_sync_meta(
        &self,
        id: Uuid,
        status: SyncStatus,
        sync_errors: Option<String>,
        last_synced_at: Option<DateTime<Utc>>,
    ) -> StoreResult<()>;

    async fn status_summary(&self) -> StoreResult<SyncStatusSummary>;
}

/// Booking lookups and writes needed by the reconciler.
#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn find_by_external_id(&self, external_id: &str) -> StoreResult<Option<Booking>>;

    /// Insert or update by primary key. The referenced contact is resolved
    /// by the reconciler before this is called.
    async fn upsert(&self, booking: Booking) -> StoreResult<Booking>;

    async fn update_sync_meta(
        &self,
        id: Uuid,
        status: SyncStatus,
        sync_errors: Option<String>,
        last_synced_at: Option<DateTime<Utc>>,
    ) -> StoreResult<()>;

    async fn status_summary(&self) -> StoreResult<SyncStatusSummary>;
}

/// In-memory store backing both traits.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    contacts: Arc<RwLock<HashMap<Uuid, Contact>>>,
    bookings: Arc<RwLock<HashMap<Uuid, Booking>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all contacts, for assertions and status reporting.
    pub async fn contacts(&self) -> Vec<Contact> {
        self.contacts.read().await.values().cloned().collect()
    }

    /// Snapshot of all bookings.
    pub async fn bookings(&self) -> Vec<Booking> {
        self.bookings.read().await.values().cloned().collect()
    }

    pub async fn contact_count(&self) -> usize {
        self.contacts.read().await.len()
    }

    pub async fn booking_count(&self) -> usize {
        self.bookings.read().await.len()
    }
}

#[async_trait]
impl ContactStore for MemoryStore {
    async fn find_by_external_id(&self, external_id: &str) -> StoreResult<Option<Contact>> {
        let contacts = self.contacts.read().await;
        Ok(contacts
            .values()
            .find(|c| c.external_id.as_deref() == Some(external_id))
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Contact>> {
        let contacts = self.contacts.read().await;
        Ok(contacts.values().find(|c| c.email == email).cloned())
    }

    async fn upsert(&self, mut contact: Contact) -> StoreResult<Contact> {
        let mut messages = contact.validate().err().unwrap_or_default();

        let mut contacts = self.contacts.write().await;
        let email_taken = contacts
            .values()
            .any(|c| c.id != contact.id && c.email == contact.email);
        if email_taken {
            messages.push("Email has already been taken".to_string());
        }
        if !messages.is_empty() {
            return Err(StoreError::Validation { messages });
        }

        contact.updated_at = Utc::now();
        contacts.insert(contact.id, contact.clone());
        Ok(contact)
    }

    async fn update_sync_meta(
        &self,
        id: Uuid,
        status: SyncStatus,
        sync_errors: Option<String>,
        last_synced_at: Option<DateTime<Utc>>,
    ) -> StoreResult<()> {
        let mut contacts = self.contacts.write().await;
        let contact = contacts.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        contact.sync_status = status;
        contact.sync_errors = sync_errors;
        if let Some(at) = last_synced_at {
            contact.last_synced_at = Some(at);
        }
        contact.updated_at = Utc::now();
        Ok(())
    }

    async fn status_summary(&self) -> StoreResult<SyncStatusSummary> {
        let contacts = self.contacts.read().await;
        Ok(summarize(contacts.values().map(|c| (c.sync_status, c.last_synced_at))))
    }
}

#[async_trait]
impl BookingStore for MemoryStore {
    async fn find_by_external_id(&self, external_id: &str) -> StoreResult<Option<Booking>> {
        let bookings = self.bookings.read().await;
        Ok(bookings
            .values()
            .find(|b| b.external_id.as_deref() == Some(external_id))
            .cloned())
    }

    async fn upsert(&self, mut booking: Booking) -> StoreResult<Booking> {
        let mut bookings = self.bookings.write().await;
        booking.updated_at = Utc::now();
        bookings.insert(booking.id, booking.clone());
        Ok(booking)
    }

    async fn update_sync_meta(
        &self,
        id: Uuid,
        status: SyncStatus,
        sync_errors: Option<String>,
        last_synced_at: Option<DateTime<Utc>>,
    ) -> StoreResult<()> {
        let mut bookings = self.bookings.write().await;
        let booking = bookings.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        booking.sync_status = status;
        booking.sync_errors = sync_errors;
        if let Some(at) = last_synced_at {
            booking.last_synced_at = Some(at);
        }
        booking.updated_at = Utc::now();
        Ok(())
    }

    async fn status_summary(&self) -> StoreResult<SyncStatusSummary> {
        let bookings = self.bookings.read().await;
        Ok(summarize(bookings.values().map(|b| (b.sync_status, b.last_synced_at))))
    }
}

fn summarize(
    entries: impl Iterator<Item = (SyncStatus, Option<DateTime<Utc>>)>,
) -> SyncStatusSummary {
    let mut summary = SyncStatusSummary::default();
    for (status, last_synced_at) in entries {
        summary.total += 1;
        match status {
            SyncStatus::Synced => summary.synced += 1,
            SyncStatus::Pending => summary.pending += 1,
            SyncStatus::Error => summary.error += 1,
            SyncStatus::Syncing => {}
        }
        if last_synced_at > summary.last_synced_at {
            summary.last_synced_at = last_synced_at;
        }
    }
    summary
}
