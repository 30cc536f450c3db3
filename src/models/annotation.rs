//! Read-only snapshots of annotation records as they are handed over by the
//! annotation store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{AsRefStr, Display};

/// A single user-authored annotation.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    pub id: String,
    #[serde(default, alias = "layer_id")]
    pub layer_id: Option<String>,
    #[serde(default)]
    pub visibility: Visibility,
    pub target: Target,
    #[serde(default)]
    pub bodies: Vec<Body>,
    /// Legacy singular body, still produced by older clients.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Body>,
}

impl Annotation {
    /// All bodies in export order: the `bodies` list first, then the legacy `body`.
    pub fn all_bodies(&self) -> impl Iterator<Item = &Body> {
        self.bodies.iter().chain(self.body.iter())
    }

    /// Drafts have neither content nor a position and must never be exported.
    pub fn is_draft(&self) -> bool {
        self.target.selector.is_none() && self.all_bodies().next().is_none()
    }

    pub fn is_private(&self) -> bool {
        self.visibility == Visibility::Private
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, Default, PartialEq, Eq, AsRefStr, Display)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum Visibility {
    #[default]
    Public,
    Private,
}

/// What an annotation points at. Without a selector, the annotation is a note on
/// the whole document.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator: Option<UserRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<UserRef>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Body {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator: Option<UserRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<UserRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<Purpose>,
    /// Plain text, a serialized JSON object or a serialized rich-text delta.
    #[serde(default)]
    pub value: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub body_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

#[derive(
    Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Purpose {
    Commenting,
    Replying,
    Tagging,
    Correcting,
    Describing,
}

/// Reference to a user as resolved by the caller.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct UserRef {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl UserRef {
    /// The display name, unless it is missing or blank.
    pub fn display_name(&self) -> Option<&str> {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }
}
