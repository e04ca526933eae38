//! Ordering of stops within a trip and the last-N at-risk rule.

use crate::annotator::schema::StopRecord;

/// Outcome of applying a trip's predicted defaults to its stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    /// Number of stops marked at-risk, counted from the end of the ordering.
    pub marked: usize,
    /// Predicted defaults reached or exceeded the stop count.
    pub clamped: bool,
}

/// Sorts trip members by `visit_sequence` ascending.
///
/// `members` are indices into `stops` in input order. The sort is stable, so
/// stops with equal sequences keep their input order.
pub fn order_by_visit_sequence(members: &mut [usize], stops: &[StopRecord]) {
    members.sort_by_key(|&index| stops[index].visit_sequence);
}

/// Applies the last-N rule for a trip with `stop_count` stops.
pub fn select_at_risk(stop_count: usize, defaults: i64) -> Selection {
    if defaults <= 0 || stop_count == 0 {
        return Selection {
            marked: 0,
            clamped: false,
        };
    }

    let wanted = usize::try_from(defaults).unwrap_or(usize::MAX);
    if wanted >= stop_count {
        Selection {
            marked: stop_count,
            clamped: true,
        }
    } else {
        Selection {
            marked: wanted,
            clamped: false,
        }
    }
}

/// The members to mark, given members already in visit order.
pub fn at_risk_members(ordered: &[usize], selection: Selection) -> &[usize] {
    &ordered[ordered.len() - selection.marked..]
}
