//! Typed records for the three collections and the in-memory dashboard model.
//!
//! DESIGN
//! ======
//! Views read `DashboardModel`, not storage. The model is loaded once per
//! context and then only changes through that context's own writes or a
//! forced refresh; writes from other contexts leave it stale until then.
//!
//! Loading decodes records one by one. A record that does not match its
//! type is skipped with a warning instead of blanking the whole collection.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use time::macros::format_description;
use tracing::warn;

use crate::collections::{NamedCollection, read_collection};
use crate::storage::StorageAdapter;

// =============================================================================
// VALIDATION
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    #[error("{field} must not be blank")]
    Blank { field: &'static str },
    #[error("{field} must be a YYYY-MM-DD date, got `{value}`")]
    InvalidDate { field: &'static str, value: String },
    #[error("invalid email address `{0}`")]
    InvalidEmail(String),
}

fn require(field: &'static str, value: &str) -> Result<(), RecordError> {
    if value.trim().is_empty() {
        return Err(RecordError::Blank { field });
    }
    Ok(())
}

fn require_date(field: &'static str, value: &str) -> Result<(), RecordError> {
    let format = format_description!("[year]-[month]-[day]");
    time::Date::parse(value.trim(), &format)
        .map(|_| ())
        .map_err(|_| RecordError::InvalidDate { field, value: value.to_owned() })
}

// =============================================================================
// RECORD TRAIT
// =============================================================================

/// A record type stored in one named collection.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const COLLECTION: NamedCollection;

    fn id(&self) -> &str;

    fn set_id(&mut self, id: String);

    /// Check field-level constraints before a write.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    fn validate(&self) -> Result<(), RecordError>;

    fn in_model(model: &DashboardModel) -> &[Self];

    fn in_model_mut(model: &mut DashboardModel) -> &mut Vec<Self>;
}

/// Decode raw records, skipping the ones that do not fit `T`.
#[must_use]
pub fn decode_records<T: Record>(values: Vec<Value>) -> Vec<T> {
    values
        .into_iter()
        .enumerate()
        .filter_map(|(index, value)| match serde_json::from_value::<T>(value) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(collection = T::COLLECTION.key(), index, error = %e, "skipping undecodable record");
                None
            }
        })
        .collect()
}

/// Read and decode one collection from storage.
#[must_use]
pub fn read_records<T: Record>(storage: &dyn StorageAdapter) -> Vec<T> {
    decode_records(read_collection(storage, T::COLLECTION))
}

// =============================================================================
// ACTION ITEMS
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    #[default]
    Open,
    InProgress,
    Done,
}

/// Follow-up captured in meeting minutes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionItem {
    #[serde(default)]
    pub id: String,
    pub description: String,
    pub owner: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(default)]
    pub status: ActionStatus,
    /// Title or date of the meeting the item came from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meeting: Option<String>,
}

impl Record for ActionItem {
    const COLLECTION: NamedCollection = NamedCollection::ActionItems;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn validate(&self) -> Result<(), RecordError> {
        require("description", &self.description)?;
        require("owner", &self.owner)?;
        if let Some(due) = &self.due_date {
            require_date("dueDate", due)?;
        }
        Ok(())
    }

    fn in_model(model: &DashboardModel) -> &[Self] {
        &model.action_items
    }

    fn in_model_mut(model: &mut DashboardModel) -> &mut Vec<Self> {
        &mut model.action_items
    }
}

// =============================================================================
// SOCIAL POSTS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Instagram,
    Facebook,
    Tiktok,
    Linkedin,
    Newsletter,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    #[default]
    Draft,
    Scheduled,
    Published,
}

/// Entry in the content calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocialPost {
    #[serde(default)]
    pub id: String,
    pub platform: Platform,
    pub caption: String,
    pub scheduled_for: String,
    #[serde(default)]
    pub status: PostStatus,
}

impl Record for SocialPost {
    const COLLECTION: NamedCollection = NamedCollection::SocialPosts;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn validate(&self) -> Result<(), RecordError> {
        require("caption", &self.caption)?;
        require_date("scheduledFor", &self.scheduled_for)
    }

    fn in_model(model: &DashboardModel) -> &[Self] {
        &model.social_posts
    }

    fn in_model_mut(model: &mut DashboardModel) -> &mut Vec<Self> {
        &mut model.social_posts
    }
}

// =============================================================================
// STAFF
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffMember {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl Record for StaffMember {
    const COLLECTION: NamedCollection = NamedCollection::Staff;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn validate(&self) -> Result<(), RecordError> {
        require("name", &self.name)?;
        if let Some(email) = &self.email {
            if !email.contains('@') {
                return Err(RecordError::InvalidEmail(email.clone()));
            }
        }
        Ok(())
    }

    fn in_model(model: &DashboardModel) -> &[Self] {
        &model.staff
    }

    fn in_model_mut(model: &mut DashboardModel) -> &mut Vec<Self> {
        &mut model.staff
    }
}

// =============================================================================
// DASHBOARD MODEL
// =============================================================================

/// What the views of one context currently show.
#[derive(Debug, Clone)]
pub struct DashboardModel {
    pub action_items: Vec<ActionItem>,
    pub social_posts: Vec<SocialPost>,
    pub staff: Vec<StaffMember>,
    pub loaded_at: OffsetDateTime,
}

impl DashboardModel {
    /// Read every collection from storage. Never fails; bad data reads as empty.
    #[must_use]
    pub fn load(storage: &dyn StorageAdapter) -> Self {
        Self {
            action_items: read_records(storage),
            social_posts: read_records(storage),
            staff: read_records(storage),
            loaded_at: OffsetDateTime::now_utc(),
        }
    }

    #[must_use]
    pub fn records<T: Record>(&self) -> &[T] {
        T::in_model(self)
    }
}

#[cfg(test)]
#[path = "model_test.rs"]
mod tests;
