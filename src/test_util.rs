use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::models::annotation::{Annotation, Body, Purpose, Target, UserRef, Visibility};

pub fn timestamp(value: &str) -> DateTime<Utc> {
    value.parse().unwrap()
}

pub fn user(id: &str, name: &str) -> UserRef {
    UserRef {
        id: id.to_string(),
        name: Some(name.to_string()),
    }
}

pub fn annotation(id: &str, selector: Option<Value>) -> Annotation {
    Annotation {
        id: id.to_string(),
        layer_id: Some("layer-1".to_string()),
        visibility: Visibility::Public,
        target: Target {
            selector,
            ..Default::default()
        },
        bodies: vec![],
        body: None,
    }
}

pub fn comment(id: &str, annotation_id: &str, value: &str) -> Body {
    Body {
        id: id.to_string(),
        annotation: Some(annotation_id.to_string()),
        creator: None,
        created: None,
        updated: None,
        updated_by: None,
        purpose: Some(Purpose::Commenting),
        value: value.to_string(),
        body_type: None,
        format: None,
    }
}

pub fn tag(id: &str, annotation_id: &str, value: &str) -> Body {
    Body {
        purpose: Some(Purpose::Tagging),
        ..comment(id, annotation_id, value)
    }
}

pub fn xpath(value: &str) -> Value {
    serde_json::json!({"type": "XPathSelector", "value": value})
}
