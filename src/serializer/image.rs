use itertools::Itertools;

use super::{TargetSelector, W3cSelector};
use crate::classifier::ImageSelector;

pub const MEDIA_FRAGMENTS: &str = "http://www.w3.org/TR/media-frags/";

/// Rectangles become media fragments, polygons SVG shapes.
pub fn selector(image: &ImageSelector) -> TargetSelector {
    let selector = match image {
        ImageSelector::Rectangle { geometry: g } => W3cSelector::FragmentSelector {
            conforms_to: MEDIA_FRAGMENTS.to_string(),
            value: format!("xywh=pixel:{},{},{},{}", g.x, g.y, g.w, g.h),
            refined_by: vec![],
        },
        ImageSelector::Polygon { geometry } => {
            let points = geometry
                .points
                .iter()
                .map(|[x, y]| format!("{x},{y}"))
                .join(" ");
            W3cSelector::SvgSelector {
                value: format!("<svg><polygon points=\"{points}\" /></svg>"),
            }
        }
    };
    TargetSelector::Single(selector)
}
