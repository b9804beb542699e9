//! Records exchanged with the dashboard backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A person receiving the organization's service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Servantee {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub church: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub education: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    #[serde(default, rename = "createdAt", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Fields accepted when creating or editing a servantee.
///
/// Absent fields are left out of the payload so a PATCH only touches what was given.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ServanteeInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub church: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub education: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
}

/// An entry of a retreat's attendee list.
///
/// The backend returns either bare servantee ids or populated summaries depending on the
/// endpoint, so both shapes are accepted and normalized through [`AttendeeRef::id`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttendeeRef {
    Id(String),
    Summary(AttendeeSummary),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendeeSummary {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl AttendeeRef {
    pub fn id(&self) -> &str {
        match self {
            AttendeeRef::Id(id) => id,
            AttendeeRef::Summary(summary) => &summary.id,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            AttendeeRef::Id(_) => None,
            AttendeeRef::Summary(summary) => summary.name.as_deref(),
        }
    }

    pub fn phone(&self) -> Option<&str> {
        match self {
            AttendeeRef::Id(_) => None,
            AttendeeRef::Summary(summary) => summary.phone.as_deref(),
        }
    }
}

impl From<&str> for AttendeeRef {
    fn from(id: &str) -> Self {
        AttendeeRef::Id(id.to_string())
    }
}

/// A scheduled event with a set of attending servantees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Retreat {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default, rename = "startDate", skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default, rename = "endDate", skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default)]
    pub attendees: Vec<AttendeeRef>,
}

impl Retreat {
    /// Attendee ids with embedded summaries flattened to their id.
    pub fn attendee_ids(&self) -> impl Iterator<Item = &str> {
        self.attendees.iter().map(AttendeeRef::id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RetreatInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "startDate", skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(rename = "endDate", skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl RetreatInput {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.start_date.is_none()
            && self.end_date.is_none()
            && self.location.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Admin,
    Servant,
    #[serde(other)]
    Other,
}

impl Role {
    pub fn label(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Servant => "servant",
            Role::Other => "other",
        }
    }
}

/// A staff or volunteer user of the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Servant {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default = "Servant::default_role")]
    pub role: Role,
}

impl Servant {
    const fn default_role() -> Role {
        Role::Servant
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServantInput {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

/// Partial change to a servant account.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ServantUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

impl ServantUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.email.is_none()
            && self.password.is_none()
            && self.role.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    #[serde(rename = "_id")]
    pub id: String,
    pub content: String,
    #[serde(default, rename = "createdAt", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, rename = "updatedAt", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Record kinds that notes can be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteTarget {
    Servantee,
    Retreat,
}

impl NoteTarget {
    /// Path segment used by `GET /notes/{target}/{id}`.
    pub fn segment(self) -> &'static str {
        match self {
            NoteTarget::Servantee => "servantee",
            NoteTarget::Retreat => "retreat",
        }
    }

    /// Key naming the owning record in a note creation payload.
    pub fn owner_field(self) -> &'static str {
        match self {
            NoteTarget::Servantee => "servanteeId",
            NoteTarget::Retreat => "retreatId",
        }
    }
}

/// A list response. Paged endpoints wrap their rows, others return a bare array.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Page<T> {
    Wrapped {
        data: Vec<T>,
        #[serde(default)]
        pages: Option<u32>,
        #[serde(default)]
        total: Option<u64>,
    },
    Bare(Vec<T>),
}

impl<T> Page<T> {
    pub fn items(&self) -> &[T] {
        match self {
            Page::Wrapped { data, .. } => data,
            Page::Bare(data) => data,
        }
    }

    pub fn into_items(self) -> Vec<T> {
        match self {
            Page::Wrapped { data, .. } => data,
            Page::Bare(data) => data,
        }
    }

    pub fn pages(&self) -> Option<u32> {
        match self {
            Page::Wrapped { pages, .. } => *pages,
            Page::Bare(_) => None,
        }
    }

    pub fn total(&self) -> Option<u64> {
        match self {
            Page::Wrapped { total, .. } => *total,
            Page::Bare(_) => None,
        }
    }

    /// Whether another page follows `page` (1-based). Responses without a page count hold
    /// the whole collection.
    pub fn has_more(&self, page: u32) -> bool {
        matches!(self.pages(), Some(pages) if page < pages)
    }
}
