//! Per-profile serialization of annotation targets.
//!
//! Every profile shares the body crosswalk and the target metadata (source id,
//! creator, timestamps); only the selector differs.

pub mod image;
pub mod pdf;
pub mod tei;
pub mod text;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Number, Value};

use crate::{
    classifier::{Profile, XPathSelector},
    crosswalk::{Creator, OutputBody, crosswalk, resolve_creator},
    models::annotation::Annotation,
};

/// Selectors of the W3C Web Annotation vocabulary used by the serializers.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum W3cSelector {
    FragmentSelector {
        #[serde(rename = "conformsTo")]
        conforms_to: String,
        value: String,
        #[serde(rename = "refinedBy", skip_serializing_if = "Vec::is_empty")]
        refined_by: Vec<W3cSelector>,
    },
    SvgSelector {
        value: String,
    },
    TextQuoteSelector {
        exact: String,
    },
    TextPositionSelector {
        start: Number,
        end: Number,
        #[serde(rename = "refinedBy", skip_serializing_if = "Vec::is_empty")]
        refined_by: Vec<W3cSelector>,
    },
    RangeSelector {
        #[serde(rename = "startSelector")]
        start_selector: XPathSelector,
        #[serde(rename = "endSelector")]
        end_selector: XPathSelector,
        #[serde(rename = "refinedBy", skip_serializing_if = "Vec::is_empty")]
        refined_by: Vec<W3cSelector>,
    },
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum TargetSelector {
    Single(W3cSelector),
    List(Vec<W3cSelector>),
    /// The stored selector, for records that could not be classified.
    Unclassified(Value),
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct W3cTarget {
    /// Id of the source annotation.
    pub annotation: String,
    /// The scope (project or document) the annotation belongs to.
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selector: Option<TargetSelector>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator: Option<Creator>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<Creator>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub unclassified: bool,
}

/// Target and bodies of one annotation in the output vocabulary.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub target: W3cTarget,
    pub body: Vec<OutputBody>,
}

/// Serialize an annotation that is known to match the given profile.
pub fn serialize(annotation: &Annotation, profile: &Profile, scope: &str) -> Fragment {
    let selector = match profile {
        Profile::Note => None,
        Profile::Image(selector) => Some(image::selector(selector)),
        Profile::TextPlain(ranges) => Some(text::selector(ranges)),
        Profile::TextTei(ranges) => Some(tei::selector(ranges)),
        Profile::TextPdf(ranges) => Some(pdf::selector(ranges)),
    };
    Fragment {
        target: target(annotation, scope, selector, false),
        body: crosswalk(annotation.all_bodies()),
    }
}

/// Pass an annotation through unchanged apart from the body crosswalk and mark
/// its target as unclassified.
pub fn serialize_unclassified(annotation: &Annotation, scope: &str) -> Fragment {
    let selector = annotation
        .target
        .selector
        .clone()
        .map(TargetSelector::Unclassified);
    Fragment {
        target: target(annotation, scope, selector, true),
        body: crosswalk(annotation.all_bodies()),
    }
}

fn target(
    annotation: &Annotation,
    scope: &str,
    selector: Option<TargetSelector>,
    unclassified: bool,
) -> W3cTarget {
    let t = &annotation.target;
    W3cTarget {
        annotation: annotation.id.clone(),
        source: scope.to_string(),
        selector,
        creator: resolve_creator(t.creator.as_ref()),
        created: t.created,
        updated: t.updated,
        updated_by: resolve_creator(t.updated_by.as_ref()),
        unclassified,
    }
}
