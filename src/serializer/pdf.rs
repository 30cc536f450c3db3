use super::{TargetSelector, W3cSelector, text::range_selectors};
use crate::classifier::PdfRange;

pub const PDF_FRAGMENTS: &str = "http://tools.ietf.org/rfc/rfc3778";

/// Each range is addressed by its page, refined by quote and offsets.
pub fn selector(ranges: &[PdfRange]) -> TargetSelector {
    TargetSelector::List(
        ranges
            .iter()
            .map(|r| W3cSelector::FragmentSelector {
                conforms_to: PDF_FRAGMENTS.to_string(),
                value: format!("page={}", r.page_number),
                refined_by: range_selectors(&r.range),
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::TextRange;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn page_fragment_with_refinements() {
        let s = selector(&[PdfRange {
            range: TextRange {
                start: 3.into(),
                end: 9.into(),
                quote: Some("Abstract".to_string()),
            },
            page_number: 2.into(),
        }]);
        assert_eq!(
            json!([{
                "type": "FragmentSelector",
                "conformsTo": "http://tools.ietf.org/rfc/rfc3778",
                "value": "page=2",
                "refinedBy": [
                    {"type": "TextQuoteSelector", "exact": "Abstract"},
                    {"type": "TextPositionSelector", "start": 3, "end": 9}
                ]
            }]),
            serde_json::to_value(s).unwrap()
        );
    }
}
