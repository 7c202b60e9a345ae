//! The fetch → transform → reconcile pipeline, one reconciler per entity kind.
//!
//! A reconciler pulls pages of raw records from the external platform,
//! matches each record to a local entity (or initializes a new one), maps the
//! external fields on, and commits the per-record outcome. A transport
//! failure during fetch aborts the whole batch; a failure on a single record
//! never does.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::client::ExternalApiClient;
use crate::error::TransportResult;
use crate::model::{Booking, BookingStatus, Contact, ExternalBooking, ExternalContact, SyncStatus};
use crate::store::{BookingStore, ContactStore, StoreError};

/// Safety cap on records fetched per run, across all pages.
const MAX_FETCH_RECORDS: usize = 10_000;

/// Aggregate result of one reconciler run.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct SyncOutcome {
    /// Records committed with `sync_status = synced`.
    pub synced: u32,
    /// Records that failed matching, mapping, or commit.
    pub errors: u32,
    /// Records seen in the fetched feed.
    pub total: u32,
    /// One human-readable message per failed record.
    pub error_details: Vec<String>,
}

/// Failure of a single record's reconciliation. Never escapes the reconciler.
#[derive(Debug, Error)]
pub enum RecordError {
    /// The raw record did not match the expected shape.
    #[error("malformed record: {0}")]
    Malformed(String),

    /// A booking referenced a contact that could not be resolved locally.
    /// Terminal for this record; the next run re-attempts it.
    #[error("contact with external_id {0} not found")]
    UnresolvedContact(String),

    /// Persistence-time validation failed; the entity (if it existed) keeps
    /// its prior business fields and carries the messages in `sync_errors`.
    #[error("validation failed: {message}")]
    Validation { message: String },

    /// Store lookup or write failed for non-validation reasons.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result of resolving an external record against the local store.
#[derive(Debug)]
pub enum MatchResolution<T> {
    /// An existing local entity claims this record.
    Found(T),
    /// No local entity matches; the caller initializes a new one.
    NotFound,
}

/// Resolve a contact by `external_id`, falling back to email.
///
/// The email fallback adopts a pre-existing local contact into the sync
/// relationship: the caller sets its `external_id` when mapping.
pub async fn match_contact(
    store: &dyn ContactStore,
    external_id: &str,
    email: &str,
) -> Result<MatchResolution<Contact>, StoreError> {
    if let Some(contact) = store.find_by_external_id(external_id).await? {
        return Ok(MatchResolution::Found(contact));
    }
    if let Some(contact) = store.find_by_email(email).await? {
        return Ok(MatchResolution::Found(contact));
    }
    Ok(MatchResolution::NotFound)
}

/// Resolve a booking by `external_id` only.
pub async fn match_booking(
    store: &dyn BookingStore,
    external_id: &str,
) -> Result<MatchResolution<Booking>, StoreError> {
    match store.find_by_external_id(external_id).await? {
        Some(booking) => Ok(MatchResolution::Found(booking)),
        None => Ok(MatchResolution::NotFound),
    }
}

/// Reconciles the external contact feed into the local contact store.
pub struct ContactReconciler {
    client: Arc<ExternalApiClient>,
    store: Arc<dyn ContactStore>,
    page_size: u32,
}

impl ContactReconciler {
    pub fn new(client: Arc<ExternalApiClient>, store: Arc<dyn ContactStore>, page_size: u32) -> Self {
        Self {
            client,
            store,
            page_size,
        }
    }

    /// Run one full reconciliation pass over the contact feed.
    ///
    /// A [`TransportError`](crate::error::TransportError) during fetch aborts
    /// the batch and propagates; per-record failures are folded into the
    /// returned [`SyncOutcome`].
    pub async fn run(&self) -> TransportResult<SyncOutcome> {
        info!(entity = "contact", "sync started");

        let records = fetch_all("contact", self.page_size, |limit, offset| {
            self.client.fetch_contacts(limit, offset)
        })
        .await?;

        let mut outcome = SyncOutcome {
            total: records.len() as u32,
            ..Default::default()
        };

        for record in &records {
            let external_id = record_id(record);
            match self.sync_single(record).await {
                Ok(()) => outcome.synced += 1,
                Err(e) => {
                    outcome.errors += 1;
                    let message = format!("failed to sync contact {external_id}: {e}");
                    error!(external_id = %external_id, error = %e, "contact record failed");
                    outcome.error_details.push(message);
                }
            }
        }

        info!(
            entity = "contact",
            synced = outcome.synced,
            errors = outcome.errors,
            total = outcome.total,
            "sync complete"
        );
        Ok(outcome)
    }

    /// Reconcile one raw record: parse, match, map, commit.
    pub async fn sync_single(&self, record: &Value) -> Result<(), RecordError> {
        let external: ExternalContact = serde_json::from_value(record.clone())
            .map_err(|e| RecordError::Malformed(e.to_string()))?;
        let now = Utc::now();

        match match_contact(self.store.as_ref(), &external.id, &external.email).await? {
            MatchResolution::Found(mut contact) => {
                // Stamp the in-progress state on the existing record before
                // touching business fields.
                self.store
                    .update_sync_meta(contact.id, SyncStatus::Syncing, None, None)
                    .await?;

                let id = contact.id;
                contact.external_id = Some(external.id.clone());
                contact.name = external.name;
                contact.email = external.email;
                contact.phone = external.phone;
                contact.mark_synced(now);

                match self.store.upsert(contact).await {
                    Ok(_) => {
                        debug!(external_id = %external.id, "contact updated");
                        Ok(())
                    }
                    Err(StoreError::Validation { messages }) => {
                        let message = messages.join(", ");
                        // Prior valid business fields survive; only the sync
                        // metadata records the failure.
                        self.store
                            .update_sync_meta(id, SyncStatus::Error, Some(message.clone()), None)
                            .await?;
                        Err(RecordError::Validation { message })
                    }
                    Err(e) => {
                        // Best effort: do not leave the record parked in
                        // `syncing` when the backend write failed.
                        let _ = self
                            .store
                            .update_sync_meta(id, SyncStatus::Error, Some(e.to_string()), None)
                            .await;
                        Err(e.into())
                    }
                }
            }
            MatchResolution::NotFound => {
                let mut contact =
                    Contact::new_pending(external.name, external.email, external.phone);
                contact.external_id = Some(external.id.clone());
                contact.mark_synced(now);

                match self.store.upsert(contact).await {
                    Ok(_) => {
                        debug!(external_id = %external.id, "contact created");
                        Ok(())
                    }
                    // Nothing was persisted; the record is counted, not stored.
                    Err(StoreError::Validation { messages }) => Err(RecordError::Validation {
                        message: messages.join(", "),
                    }),
                    Err(e) => Err(e.into()),
                }
            }
        }
    }
}

/// Reconciles the external booking feed into the local booking store.
///
/// Bookings depend on their contact being resolvable by the contact's
/// `external_id`; an unresolvable reference fails that record terminally
/// without creating a partial booking.
pub struct BookingReconciler {
    client: Arc<ExternalApiClient>,
    bookings: Arc<dyn BookingStore>,
    contacts: Arc<dyn ContactStore>,
    page_size: u32,
}

impl BookingReconciler {
    pub fn new(
        client: Arc<ExternalApiClient>,
        bookings: Arc<dyn BookingStore>,
        contacts: Arc<dyn ContactStore>,
        page_size: u32,
    ) -> Self {
        Self {
            client,
            bookings,
            contacts,
            page_size,
        }
    }

    /// Run one full reconciliation pass over the booking feed.
    pub async fn run(&self) -> TransportResult<SyncOutcome> {
        info!(entity = "booking", "sync started");

        let records = fetch_all("booking", self.page_size, |limit, offset| {
            self.client.fetch_bookings(limit, offset)
        })
        .await?;

        let mut outcome = SyncOutcome {
            total: records.len() as u32,
            ..Default::default()
        };

        for record in &records {
            let external_id = record_id(record);
            match self.sync_single(record).await {
                Ok(()) => outcome.synced += 1,
                Err(e) => {
                    outcome.errors += 1;
                    let message = format!("failed to sync booking {external_id}: {e}");
                    error!(external_id = %external_id, error = %e, "booking record failed");
                    outcome.error_details.push(message);
                }
            }
        }

        info!(
            entity = "booking",
            synced = outcome.synced,
            errors = outcome.errors,
            total = outcome.total,
            "sync complete"
        );
        Ok(outcome)
    }

    /// Reconcile one raw record: parse, resolve the parent contact, match,
    /// map, commit.
    pub async fn sync_single(&self, record: &Value) -> Result<(), RecordError> {
        let external: ExternalBooking = serde_json::from_value(record.clone())
            .map_err(|e| RecordError::Malformed(e.to_string()))?;
        let now = Utc::now();

        // The parent contact must already exist locally. Failing here leaves
        // no partial booking behind.
        let contact = self
            .contacts
            .find_by_external_id(&external.client_id)
            .await?
            .ok_or_else(|| RecordError::UnresolvedContact(external.client_id.clone()))?;

        let scheduled_time = parse_external_time(external.time.as_deref(), &external.id, now);
        let status = match external.status.as_deref() {
            Some(raw) => BookingStatus::parse(raw)
                .ok_or_else(|| format!("Status '{raw}' is not recognized")),
            None => Ok(BookingStatus::Pending),
        };

        match match_booking(self.bookings.as_ref(), &external.id).await? {
            MatchResolution::Found(mut booking) => {
                // An unrecognized status is recorded on the matched booking
                // before failing the record.
                let status = match status {
                    Ok(status) => status,
                    Err(message) => {
                        self.bookings
                            .update_sync_meta(
                                booking.id,
                                SyncStatus::Error,
                                Some(message.clone()),
                                None,
                            )
                            .await?;
                        return Err(RecordError::Validation { message });
                    }
                };

                self.bookings
                    .update_sync_meta(booking.id, SyncStatus::Syncing, None, None)
                    .await?;

                let id = booking.id;
                booking.contact_id = contact.id;
                booking.scheduled_time = scheduled_time;
                booking.notes = external.notes;
                booking.status = status;
                booking.mark_synced(now);

                match self.bookings.upsert(booking).await {
                    Ok(_) => {
                        debug!(external_id = %external.id, "booking updated");
                        Ok(())
                    }
                    Err(StoreError::Validation { messages }) => {
                        let message = messages.join(", ");
                        self.bookings
                            .update_sync_meta(id, SyncStatus::Error, Some(message.clone()), None)
                            .await?;
                        Err(RecordError::Validation { message })
                    }
                    Err(e) => {
                        // Best effort: do not leave the record parked in
                        // `syncing` when the backend write failed.
                        let _ = self
                            .bookings
                            .update_sync_meta(id, SyncStatus::Error, Some(e.to_string()), None)
                            .await;
                        Err(e.into())
                    }
                }
            }
            MatchResolution::NotFound => {
                let status = status.map_err(|message| RecordError::Validation { message })?;
                let mut booking = Booking::new_pending(contact.id, scheduled_time);
                booking.external_id = Some(external.id.clone());
                booking.notes = external.notes;
                booking.status = status;
                booking.mark_synced(now);

                match self.bookings.upsert(booking).await {
                    Ok(_) => {
                        debug!(external_id = %external.id, "booking created");
                        Ok(())
                    }
                    Err(StoreError::Validation { messages }) => Err(RecordError::Validation {
                        message: messages.join(", "),
                    }),
                    Err(e) => Err(e.into()),
                }
            }
        }
    }
}

/// Fetch every page until a short page or the safety cap.
///
/// `fetch_page` is called with `(limit, offset)`; the offset advances by the
/// number of records actually returned.
async fn fetch_all<F, Fut>(entity: &str, page_size: u32, mut fetch_page: F) -> TransportResult<Vec<Value>>
where
    F: FnMut(u32, u32) -> Fut,
    Fut: std::future::Future<Output = TransportResult<Vec<Value>>>,
{
    let mut all = Vec::new();
    let mut offset: u32 = 0;

    loop {
        let page = fetch_page(page_size, offset).await?;

        let fetched = page.len();
        all.extend(page);

        if all.len() >= MAX_FETCH_RECORDS {
            warn!(
                entity = entity,
                fetched = all.len(),
                "record cap reached, stopping fetch"
            );
            break;
        }
        if fetched < page_size as usize {
            break;
        }
        offset += fetched as u32;
    }

    Ok(all)
}

/// External id of a raw record, for log attribution.
fn record_id(record: &Value) -> String {
    match record.get("id") {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => "<missing id>".to_string(),
    }
}

/// Parse the platform's time representation.
///
/// An absent time silently falls back to `now`; an unparsable one falls back
/// with a warning. Neither is fatal for the record.
fn parse_external_time(raw: Option<&str>, external_id: &str, now: DateTime<Utc>) -> DateTime<Utc> {
    let Some(raw) = raw else {
        return now;
    };

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return parsed.with_timezone(&Utc);
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Utc.from_utc_datetime(&naive);
        }
    }

    warn!(
        external_id = %external_id,
        time = raw,
        "could not parse booking time, falling back to now"
    );
    now
}
