use super::{TargetSelector, W3cSelector, text::quote_selector};
use crate::classifier::TeiRange;

/// W3C form: per range, the span between the two XPath selectors, refined by
/// the quote if one was stored.
pub fn selector(ranges: &[TeiRange]) -> TargetSelector {
    TargetSelector::List(
        ranges
            .iter()
            .map(|r| W3cSelector::RangeSelector {
                start_selector: r.start_selector.clone(),
                end_selector: r.end_selector.clone(),
                refined_by: quote_selector(&r.range),
            })
            .collect(),
    )
}

/// TEI form: the value of the `target` attribute of a stand-off `<annotation>`.
///
/// Spans from the start of the first range to the end of the last one, so the
/// stand-off markup addresses the original XML tree instead of flat offsets.
pub fn target_attribute(ranges: &[TeiRange]) -> Option<String> {
    let first = ranges.first()?;
    let last = ranges.last()?;
    Some(format!(
        "{} {}",
        first.start_selector.value, last.end_selector.value
    ))
}
