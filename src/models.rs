use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

// --- Accounts ---

/// Role
///
/// The RBAC field. Children own and mutate content; parents only read the content
/// of the children linked to them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    Parent,
    Child,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Parent => "parent",
            Role::Child => "child",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "parent" => Ok(Role::Parent),
            "child" => Ok(Role::Child),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// User
///
/// The stored account record. Never serialized to clients since it carries the hash.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    // Normalized (trimmed, lower-cased) and unique.
    pub username: String,
    // Argon2id PHC string.
    pub password_hash: String,
    pub role: Role,
    // Only children carry a link, and it always names a parent account.
    pub parent_username: Option<String>,
}

/// Canonical form of a username: surrounding whitespace removed, lower-cased.
pub fn normalize_username(raw: &str) -> String {
    raw.trim().to_lowercase()
}

// --- Content ---

/// ChecklistItem
///
/// One entry of a note's ordered checklist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ChecklistItem {
    pub text: String,
    #[serde(default)]
    pub checked: bool,
}

/// Folder
///
/// A named container owned by a single child.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Folder {
    pub id: Uuid,
    pub name: String,
    pub owner_username: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Note
///
/// A child's note. Readable by its owner and the owner's linked parent, writable
/// by the owner only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Note {
    pub id: Uuid,
    pub owner_username: String,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub checkbox_items: Vec<ChecklistItem>,
    pub folder_id: Option<Uuid>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

// --- Request Payloads ---

/// SignupRequest
///
/// Input payload for POST /signup. A child must name the parent account it links to.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SignupRequest {
    pub username: String,
    pub password: String,
    pub role: Role,
    #[serde(default)]
    pub parent_username: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct FolderRequest {
    pub name: String,
}

/// NoteRequest
///
/// Body of POST /notes and PUT /notes/{id}. Updates replace every field, so
/// omitted optional fields reset to their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct NoteRequest {
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub checkbox_items: Vec<ChecklistItem>,
    #[serde(default)]
    pub folder_id: Option<Uuid>,
}

/// NoteFilter
///
/// Optional query parameters for GET /notes.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct NoteFilter {
    /// Only notes filed in this folder.
    pub folder_id: Option<Uuid>,
    /// Only notes carrying this tag (exact match).
    pub tag: Option<String>,
}

impl NoteFilter {
    pub fn matches(&self, note: &Note) -> bool {
        let folder_ok = self.folder_id.is_none_or(|id| note.folder_id == Some(id));
        let tag_ok = self
            .tag
            .as_ref()
            .is_none_or(|tag| note.tags.iter().any(|t| t == tag));
        folder_ok && tag_ok
    }
}

// --- Responses ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginResponse {
    pub access_token: String,
    /// Always `bearer`.
    pub token_type: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

/// UserProfile
///
/// Output schema for GET /me. `children` is only populated for parents.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UserProfile {
    pub username: String,
    pub role: Role,
    pub parent_username: Option<String>,
    pub children: Vec<String>,
}
