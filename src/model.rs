//! Local entities, their sync metadata, and the external record shapes.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-entity lifecycle of the most recent reconciliation attempt.
///
/// `Pending → Syncing → {Synced, Error}`, then back through `Syncing` on each
/// subsequent scheduled run. There is no terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Pending,
    Syncing,
    Synced,
    Error,
}

impl SyncStatus {
    /// String form as persisted by the store.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Syncing => "syncing",
            Self::Synced => "synced",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Business status of a booking.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingStatus {
    #[default]
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl BookingStatus {
    /// Parse the external platform's status string (case-insensitive).
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "confirmed" => Some(Self::Confirmed),
            "cancelled" => Some(Self::Cancelled),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

/// A person known to the local store, optionally linked to an external record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub id: Uuid,
    /// Identifier on the external platform, set once matched or created
    /// from the external feed.
    pub external_id: Option<String>,
    pub name: String,
    /// Unique within the local store.
    pub email: String,
    pub phone: String,
    pub sync_status: SyncStatus,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub sync_errors: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Contact {
    /// A contact created by a direct API request, not yet reconciled.
    #[must_use]
    pub fn new_pending(
        name: impl Into<String>,
        email: impl Into<String>,
        phone: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            external_id: None,
            name: name.into(),
            email: email.into(),
            phone: phone.into(),
            sync_status: SyncStatus::Pending,
            last_synced_at: None,
            sync_errors: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Field-presence and shape validation.
    ///
    /// Email uniqueness is enforced by the store at persistence time.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut messages = Vec::new();
        if self.name.trim().is_empty() {
            messages.push("Name can't be blank".to_string());
        }
        if self.email.trim().is_empty() {
            messages.push("Email can't be blank".to_string());
        } else if !looks_like_email(&self.email) {
            messages.push("Email is invalid".to_string());
        }
        if self.phone.trim().is_empty() {
            messages.push("Phone can't be blank".to_string());
        }
        if messages.is_empty() {
            Ok(())
        } else {
            Err(messages)
        }
    }

    /// Stamp a successful reconciliation.
    pub fn mark_synced(&mut self, now: DateTime<Utc>) {
        self.sync_status = SyncStatus::Synced;
        self.last_synced_at = Some(now);
        self.sync_errors = None;
    }

    /// Record a reconciliation failure without discarding business fields.
    pub fn mark_sync_failed(&mut self, message: impl Into<String>) {
        self.sync_status = SyncStatus::Error;
        self.sync_errors = Some(message.into());
    }

    /// Whether the next scheduled pass should treat this contact as stale.
    #[must_use]
    pub fn needs_sync(&self, now: DateTime<Utc>) -> bool {
        self.sync_status != SyncStatus::Synced
            || self
                .last_synced_at
                .map_or(true, |at| now - at > Duration::hours(6))
    }

    /// Time since the last successful reconciliation, if any.
    #[must_use]
    pub fn sync_age(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.last_synced_at.map(|at| now - at)
    }
}

/// A scheduled booking, dependent on a locally resolvable [`Contact`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub external_id: Option<String>,
    /// The referenced contact must exist before the booking can be upserted.
    pub contact_id: Uuid,
    pub scheduled_time: DateTime<Utc>,
    pub notes: Option<String>,
    pub status: BookingStatus,
    pub sync_status: SyncStatus,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub sync_errors: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// A booking created by a direct API request, not yet reconciled.
    #[must_use]
    pub fn new_pending(contact_id: Uuid, scheduled_time: DateTime<Utc>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            external_id: None,
            contact_id,
            scheduled_time,
            notes: None,
            status: BookingStatus::Pending,
            sync_status: SyncStatus::Pending,
            last_synced_at: None,
            sync_errors: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Stamp a successful reconciliation.
    pub fn mark_synced(&mut self, now: DateTime<Utc>) {
        self.sync_status = SyncStatus::Synced;
        self.last_synced_at = Some(now);
        self.sync_errors = None;
    }

    /// Record a reconciliation failure without discarding business fields.
    pub fn mark_sync_failed(&mut self, message: impl Into<String>) {
        self.sync_status = SyncStatus::Error;
        self.sync_errors = Some(message.into());
    }

    /// Whether the next scheduled pass should treat this booking as stale.
    #[must_use]
    pub fn needs_sync(&self, now: DateTime<Utc>) -> bool {
        self.sync_status != SyncStatus::Synced
            || self
                .last_synced_at
                .map_or(true, |at| now - at > Duration::hours(2))
    }

    #[must_use]
    pub fn is_upcoming(&self, now: DateTime<Utc>) -> bool {
        self.scheduled_time > now
    }
}

/// Raw contact record as returned by the external platform.
#[derive(Debug, Clone, Deserialize)]
pub struct ExternalContact {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
}

/// Raw booking record as returned by the external platform.
#[derive(Debug, Clone, Deserialize)]
pub struct ExternalBooking {
    pub id: String,
    /// External identifier of the contact this booking belongs to.
    pub client_id: String,
    /// Schedulable time in the platform's own representation.
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Minimal shape check; full address validation belongs to the CRUD layer.
fn looks_like_email(value: &str) -> bool {
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && !domain.is_empty() && !domain.starts_with('.') && domain.contains('.')
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_pending_contact_defaults() {
        let contact = Contact::new_pending("Alice", "alice@x.com", "555");
        assert_eq!(contact.sync_status, SyncStatus::Pending);
        assert!(contact.external_id.is_none());
        assert!(contact.last_synced_at.is_none());
        assert!(contact.sync_errors.is_none());
    }

    #[test]
    fn test_contact_validation_messages() {
        let mut contact = Contact::new_pending("", "", "");
        let messages = contact.validate().unwrap_err();
        assert_eq!(messages.len(), 3);

        contact.name = "Alice".into();
        contact.email = "not-an-email".into();
        contact.phone = "555".into();
        let messages = contact.validate().unwrap_err();
        assert_eq!(messages, vec!["Email is invalid".to_string()]);

        contact.email = "alice@x.com".into();
        assert!(contact.validate().is_ok());
    }

    #[test]
    fn test_mark_synced_clears_errors() {
        let mut contact = Contact::new_pending("Alice", "alice@x.com", "555");
        contact.mark_sync_failed("Email has already been taken");
        assert_eq!(contact.sync_status, SyncStatus::Error);
        assert!(contact.sync_errors.is_some());

        let now = Utc::now();
        contact.mark_synced(now);
        assert_eq!(contact.sync_status, SyncStatus::Synced);
        assert_eq!(contact.last_synced_at, Some(now));
        assert!(contact.sync_errors.is_none());
    }

    #[test]
    fn test_needs_sync_staleness() {
        let now = Utc::now();
        let mut contact = Contact::new_pending("Alice", "alice@x.com", "555");
        assert!(contact.needs_sync(now));

        contact.mark_synced(now);
        assert!(!contact.needs_sync(now));
        assert!(contact.needs_sync(now + Duration::hours(7)));
    }

    #[test]
    fn test_booking_status_parse() {
        assert_eq!(BookingStatus::parse("Confirmed"), Some(BookingStatus::Confirmed));
        assert_eq!(BookingStatus::parse("cancelled"), Some(BookingStatus::Cancelled));
        assert_eq!(BookingStatus::parse("no-show"), None);
    }

    #[test]
    fn test_sync_status_strings() {
        assert_eq!(SyncStatus::Pending.as_str(), "pending");
        assert_eq!(SyncStatus::Syncing.as_str(), "syncing");
        assert_eq!(SyncStatus::Synced.as_str(), "synced");
        assert_eq!(SyncStatus::Error.as_str(), "error");
    }

    #[test]
    fn test_external_booking_optional_fields() {
        let raw = serde_json::json!({ "id": "ext_9", "client_id": "ext_1" });
        let booking: ExternalBooking = serde_json::from_value(raw).unwrap();
        assert!(booking.time.is_none());
        assert!(booking.notes.is_none());
        assert!(booking.status.is_none());
    }
}
