//! Maps an annotation to exactly one export profile by inspecting the shape of
//! its selector.
//!
//! Selectors carry no explicit kind tag. The refinements of a plain text range
//! (PDF page ranges and TEI XPath ranges) are therefore tested before the
//! generic text range, and a refinement only applies when *every* element of
//! the range array carries the refining field.

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Number, Value};
use strum::{AsRefStr, Display, EnumDiscriminants, EnumIter};

use crate::{
    error::{ExportError, Result},
    models::annotation::Annotation,
};

/// The classification outcome together with the typed selector data needed to
/// serialize the profile.
#[derive(Debug, Clone, PartialEq, EnumDiscriminants)]
#[strum_discriminants(
    name(ProfileKind),
    derive(AsRefStr, Display, EnumIter, Hash),
    strum(serialize_all = "SCREAMING_SNAKE_CASE")
)]
pub enum Profile {
    Note,
    Image(ImageSelector),
    TextPlain(Vec<TextRange>),
    TextTei(Vec<TeiRange>),
    TextPdf(Vec<PdfRange>),
}

impl Profile {
    pub fn kind(&self) -> ProfileKind {
        self.into()
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum ImageSelector {
    Rectangle { geometry: RectangleGeometry },
    Polygon { geometry: PolygonGeometry },
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct RectangleGeometry {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct PolygonGeometry {
    pub points: Vec<[f64; 2]>,
}

/// A character range in a flat text stream. Offsets keep the JSON number they
/// were stored as, so `10.0` is written back as `10.0`.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct TextRange {
    pub start: Number,
    pub end: Number,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quote: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TeiRange {
    #[serde(flatten)]
    pub range: TextRange,
    pub start_selector: XPathSelector,
    pub end_selector: XPathSelector,
}

/// An XPath locating a range boundary in the XML source. Any refinements are
/// kept as they were stored.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct XPathSelector {
    #[serde(rename = "type")]
    pub selector_type: String,
    pub value: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PdfRange {
    #[serde(flatten)]
    pub range: TextRange,
    pub page_number: Number,
}

const IMAGE_GEOMETRY_TYPES: [&str; 2] = ["RECTANGLE", "POLYGON"];
const XPATH_SELECTOR: &str = "XPathSelector";

/// Determine the profile of an annotation.
///
/// Fails with [`ExportError::UnrecognizedSelector`] when the selector does not
/// have any of the known shapes or when its data cannot be read.
pub fn classify(annotation: &Annotation) -> Result<Profile> {
    let selector = match &annotation.target.selector {
        None => return Ok(Profile::Note),
        Some(selector) => selector,
    };
    match selector {
        Value::Object(object) if is_image_selector(object) => {
            typed(annotation, selector).map(Profile::Image)
        }
        Value::Array(elements) if !elements.is_empty() && elements.iter().all(has_offsets) => {
            if elements.iter().all(|e| is_number(e, "pageNumber")) {
                typed(annotation, selector).map(Profile::TextPdf)
            } else if elements.iter().all(has_xpath_selectors) {
                typed(annotation, selector).map(Profile::TextTei)
            } else {
                typed(annotation, selector).map(Profile::TextPlain)
            }
        }
        Value::Array(elements) if elements.is_empty() => Err(unrecognized(
            annotation,
            "range selector array is empty".to_string(),
        )),
        _ => Err(unrecognized(
            annotation,
            "neither an image region nor a list of text ranges".to_string(),
        )),
    }
}

fn is_image_selector(object: &Map<String, Value>) -> bool {
    object
        .get("type")
        .and_then(Value::as_str)
        .is_some_and(|t| IMAGE_GEOMETRY_TYPES.contains(&t))
}

fn is_number(element: &Value, key: &str) -> bool {
    element.get(key).is_some_and(Value::is_number)
}

fn has_offsets(element: &Value) -> bool {
    is_number(element, "start") && is_number(element, "end")
}

fn has_xpath_selectors(element: &Value) -> bool {
    let is_xpath = |key: &str| {
        element
            .get(key)
            .and_then(|s| s.get("type"))
            .and_then(Value::as_str)
            == Some(XPATH_SELECTOR)
    };
    is_xpath("startSelector") && is_xpath("endSelector")
}

fn typed<T: DeserializeOwned>(annotation: &Annotation, selector: &Value) -> Result<T> {
    T::deserialize(selector).map_err(|e| unrecognized(annotation, e.to_string()))
}

fn unrecognized(annotation: &Annotation, reason: String) -> ExportError {
    ExportError::UnrecognizedSelector {
        id: annotation.id.clone(),
        reason,
    }
}
