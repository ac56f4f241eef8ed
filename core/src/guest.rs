//! Guest domain model.
//!
//! Profile fields are opaque to the engine: they are validated for presence at
//! the boundary and otherwise passed through unchanged. Only `center_id`,
//! `status` and `transfer_history` take part in capacity bookkeeping.

use crate::center::CenterId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Identity
// ============================================================================

/// Unique identifier for a guest, e.g. `GST-20250101120000-3f2a9c01b4de`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GuestId(String);

impl GuestId {
    /// Prefix carried by every generated guest identifier
    pub const PREFIX: &'static str = "GST";

    /// Builds an identifier from the admission time and a random UUID.
    #[must_use]
    pub fn generate(at: DateTime<Utc>, entropy: Uuid) -> Self {
        let hex = entropy.simple().to_string();
        let suffix = hex.get(..12).unwrap_or(&hex);
        Self(format!(
            "{}-{}-{suffix}",
            Self::PREFIX,
            at.format("%Y%m%d%H%M%S")
        ))
    }

    /// Wraps an existing identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GuestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Profile
// ============================================================================

/// Person to contact on the guest's behalf.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyContact {
    /// Contact name
    pub name: String,
    /// Contact phone
    #[serde(default)]
    pub phone: Option<String>,
    /// Relationship to the guest
    #[serde(default)]
    pub relationship: Option<String>,
}

/// Personal, contact and medical details of a guest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestProfile {
    /// Given name (required)
    pub first_name: String,
    /// Family name (required)
    pub last_name: String,
    /// Age in years
    #[serde(default)]
    pub age: Option<u32>,
    /// Self-described gender
    #[serde(default)]
    pub gender: Option<String>,
    /// Phone number
    #[serde(default)]
    pub phone: Option<String>,
    /// Email address
    #[serde(default)]
    pub email: Option<String>,
    /// Home address before displacement
    #[serde(default)]
    pub address: Option<String>,
    /// Emergency contact
    #[serde(default)]
    pub emergency_contact: Option<EmergencyContact>,
    /// Known medical conditions
    #[serde(default)]
    pub medical_conditions: Vec<String>,
    /// Current medications
    #[serde(default)]
    pub medications: Vec<String>,
    /// Allergies
    #[serde(default)]
    pub allergies: Vec<String>,
    /// Accessibility or care needs
    #[serde(default)]
    pub special_needs: Option<String>,
    /// Free-form notes
    #[serde(default)]
    pub notes: Option<String>,
}

impl GuestProfile {
    /// Minimal profile with just the required name fields.
    #[must_use]
    pub fn named(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            ..Self::default()
        }
    }

    /// `"first last"`
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Partial profile update. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct GuestProfilePatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub age: Option<u32>,
    pub gender: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub emergency_contact: Option<EmergencyContact>,
    pub medical_conditions: Option<Vec<String>>,
    pub medications: Option<Vec<String>>,
    pub allergies: Option<Vec<String>>,
    pub special_needs: Option<String>,
    pub notes: Option<String>,
}

impl GuestProfilePatch {
    /// Whether the patch changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Merges this patch into `profile`.
    pub fn apply_to(self, profile: &mut GuestProfile) {
        macro_rules! merge {
            ($($field:ident),* $(,)?) => {
                $(if let Some(v) = self.$field { profile.$field = v; })*
            };
        }
        macro_rules! merge_opt {
            ($($field:ident),* $(,)?) => {
                $(if let Some(v) = self.$field { profile.$field = Some(v); })*
            };
        }
        merge!(first_name, last_name, medical_conditions, medications, allergies);
        merge_opt!(age, gender, phone, email, address, emergency_contact, special_needs, notes);
    }
}

// ============================================================================
// Guest
// ============================================================================

/// Lifecycle status of a guest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GuestStatus {
    /// Counted against their center's occupancy
    #[default]
    Active,
    /// No longer counted
    Discharged,
}

impl GuestStatus {
    /// Stable lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Discharged => "discharged",
        }
    }
}

/// One move between centers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRecord {
    /// Center the guest left
    pub from_center_id: CenterId,
    /// Center the guest moved to
    pub to_center_id: CenterId,
    /// When the move was committed
    pub transferred_at: DateTime<Utc>,
}

/// A registered guest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guest {
    /// Identifier
    pub id: GuestId,
    /// Center this guest belongs to
    pub center_id: CenterId,
    /// Personal details
    #[serde(flatten)]
    pub profile: GuestProfile,
    /// Lifecycle status; records written without one are active
    #[serde(default)]
    pub status: GuestStatus,
    /// Append-only move history, oldest first
    #[serde(default)]
    pub transfer_history: Vec<TransferRecord>,
    /// Registration time
    pub created_at: DateTime<Utc>,
    /// Last mutation time
    pub updated_at: DateTime<Utc>,
    /// When the guest was discharged
    #[serde(default)]
    pub discharged_at: Option<DateTime<Utc>>,
}

impl Guest {
    /// Whether this guest currently occupies a slot.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == GuestStatus::Active
    }

    /// Case-insensitive substring match over name, phone, email and identifier.
    ///
    /// `needle` must already be lowercased.
    #[must_use]
    pub fn matches(&self, needle: &str) -> bool {
        let contains = |s: &str| s.to_lowercase().contains(needle);
        contains(&self.profile.first_name)
            || contains(&self.profile.last_name)
            || contains(&self.profile.full_name())
            || self.profile.phone.as_deref().is_some_and(contains)
            || self.profile.email.as_deref().is_some_and(contains)
            || contains(self.id.as_str())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_generated_id_format() {
        let at = Utc.with_ymd_and_hms(2025, 3, 7, 9, 5, 1).single().unwrap();
        let id = GuestId::generate(at, Uuid::nil());
        assert_eq!(id.as_str(), "GST-20250307090501-000000000000");
    }

    #[test]
    fn test_missing_status_defaults_to_active() {
        let json = serde_json::json!({
            "id": "GST-1",
            "center_id": "00000000-0000-0000-0000-000000000001",
            "first_name": "Ana",
            "last_name": "Lima",
            "created_at": "2025-01-01T00:00:00Z",
            "updated_at": "2025-01-01T00:00:00Z"
        });
        let guest: Guest = serde_json::from_value(json).unwrap();
        assert_eq!(guest.status, GuestStatus::Active);
        assert!(guest.transfer_history.is_empty());
    }

    #[test]
    fn test_patch_only_touches_named_fields() {
        let mut profile = GuestProfile::named("Ana", "Lima");
        profile.phone = Some("555-0100".to_string());

        GuestProfilePatch {
            last_name: Some("Souza".to_string()),
            age: Some(34),
            ..GuestProfilePatch::default()
        }
        .apply_to(&mut profile);

        assert_eq!(profile.first_name, "Ana");
        assert_eq!(profile.last_name, "Souza");
        assert_eq!(profile.age, Some(34));
        assert_eq!(profile.phone.as_deref(), Some("555-0100"));
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let now = Utc::now();
        let mut profile = GuestProfile::named("Maria", "Santos");
        profile.phone = Some("+1 555 0199".to_string());
        profile.email = Some("Maria.Santos@Shelter.example".to_string());
        let guest = Guest {
            id: GuestId::new("GST-20250101000000-abcdef012345"),
            center_id: CenterId::new(),
            profile,
            status: GuestStatus::Active,
            transfer_history: Vec::new(),
            created_at: now,
            updated_at: now,
            discharged_at: None,
        };

        assert!(guest.matches("maria s"));
        assert!(guest.matches("0199"));
        assert!(guest.matches("abcdef"));
        assert!(guest.matches("santos@shelter"));
        assert!(!guest.matches("pedro"));
    }
}
