//! Maps stored annotation bodies to the body shape of the output vocabularies.
//!
//! The same crosswalk is used for every profile, only the target differs.

pub(crate) mod delta;

use chrono::{DateTime, Utc};
use log::debug;
use serde::Serialize;
use serde_json::Value;

use crate::{
    error::ExportError,
    models::annotation::{Body, Purpose, UserRef},
};

pub const TEXTUAL_BODY: &str = "TextualBody";
pub const FORMAT_HTML: &str = "text/html";
pub const FORMAT_JSON: &str = "application/json";

/// A body in the output vocabulary.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OutputBody {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotation: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub body_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purpose: Option<Purpose>,
    pub value: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator: Option<Creator>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<Creator>,
}

/// A user with a known display name.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Creator {
    pub id: String,
    pub name: String,
}

impl TryFrom<&UserRef> for Creator {
    type Error = ExportError;

    fn try_from(user: &UserRef) -> Result<Self, Self::Error> {
        user.display_name()
            .map(|name| Creator {
                id: user.id.clone(),
                name: name.to_string(),
            })
            .ok_or_else(|| ExportError::UnresolvableCreator(user.id.clone()))
    }
}

/// Resolve an optional user reference. Users without a display name are
/// dropped, since downstream consumers read a bare id as an unknown user.
pub fn resolve_creator(user: Option<&UserRef>) -> Option<Creator> {
    match Creator::try_from(user?) {
        Ok(creator) => Some(creator),
        Err(e) => {
            debug!("Omitting user reference: {e}");
            None
        }
    }
}

/// Crosswalk a list of bodies, keeping their order.
pub fn crosswalk<'a, I>(bodies: I) -> Vec<OutputBody>
where
    I: IntoIterator<Item = &'a Body>,
{
    bodies.into_iter().map(crosswalk_body).collect()
}

fn crosswalk_body(body: &Body) -> OutputBody {
    let textual_purpose = matches!(
        body.purpose,
        None | Some(Purpose::Commenting) | Some(Purpose::Replying)
    );

    let (value, sniffed_format, is_json) = match sniff_value(&body.value) {
        Sniffed::Delta(delta) if textual_purpose => (
            Value::String(delta::to_html(&delta)),
            Some(FORMAT_HTML.to_string()),
            false,
        ),
        Sniffed::Delta(parsed) | Sniffed::Json(parsed) => {
            (parsed, Some(FORMAT_JSON.to_string()), true)
        }
        Sniffed::Text => (Value::String(body.value.clone()), None, false),
    };

    let body_type = match &body.body_type {
        Some(t) => Some(t.clone()),
        None if !is_json && textual_purpose => Some(TEXTUAL_BODY.to_string()),
        None => None,
    };

    OutputBody {
        id: body.id.clone(),
        annotation: body.annotation.clone(),
        body_type,
        purpose: body.purpose,
        value,
        format: sniffed_format.or_else(|| body.format.clone()),
        creator: resolve_creator(body.creator.as_ref()),
        created: body.created,
        updated: body.updated,
        updated_by: resolve_creator(body.updated_by.as_ref()),
    }
}

enum Sniffed {
    Delta(Value),
    Json(Value),
    Text,
}

fn sniff_value(raw: &str) -> Sniffed {
    let parsed: Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(_) => return Sniffed::Text,
    };
    if raw.starts_with('{') && parsed.get("ops").is_some_and(Value::is_array) {
        return Sniffed::Delta(parsed);
    }
    if parsed.is_object() || parsed.is_array() {
        Sniffed::Json(parsed)
    } else {
        // Scalars such as `42` or `true` are tag or comment text, not JSON payloads.
        Sniffed::Text
    }
}
