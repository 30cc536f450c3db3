use super::{TargetSelector, W3cSelector};
use crate::classifier::TextRange;

/// The stored quote as a selector list, empty when the range has none.
pub(crate) fn quote_selector(range: &TextRange) -> Vec<W3cSelector> {
    range
        .quote
        .iter()
        .map(|exact| W3cSelector::TextQuoteSelector {
            exact: exact.clone(),
        })
        .collect()
}

fn position_selector(range: &TextRange, refined_by: Vec<W3cSelector>) -> W3cSelector {
    W3cSelector::TextPositionSelector {
        start: range.start.clone(),
        end: range.end.clone(),
        refined_by,
    }
}

/// The quote (if one was stored) followed by the character offsets.
pub(crate) fn range_selectors(range: &TextRange) -> Vec<W3cSelector> {
    let mut selectors = quote_selector(range);
    selectors.push(position_selector(range, Vec::new()));
    selectors
}

/// One position selector per range, refined by the quote of that range.
pub fn selector(ranges: &[TextRange]) -> TargetSelector {
    TargetSelector::List(
        ranges
            .iter()
            .map(|r| position_selector(r, quote_selector(r)))
            .collect(),
    )
}
