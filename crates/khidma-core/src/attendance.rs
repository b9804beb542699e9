//! Attendance across a contiguous range of retreats.

use std::cmp::Ordering;
use std::collections::HashSet;

use crate::models::{Retreat, Servantee};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttendanceFilter {
    /// Servantees that attended at least one retreat in the range.
    Attended,
    /// Servantees that attended none of them.
    NotAttended,
}

/// Sort retreats by start date, earliest first. Undated retreats go last; ties keep their
/// relative order.
pub fn sort_by_start(retreats: &mut [Retreat]) {
    retreats.sort_by(|a, b| match (a.start_date, b.start_date) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

/// The retreat with the latest start date. Falls back to the first entry when none of
/// them is dated.
pub fn latest(retreats: &[Retreat]) -> Option<&Retreat> {
    retreats
        .iter()
        .filter(|r| r.start_date.is_some())
        .max_by_key(|r| r.start_date)
        .or_else(|| retreats.first())
}

/// Ids of everyone attending a retreat between `start_id` and `end_id`, inclusive.
///
/// `retreats` must already be ordered (see [`sort_by_start`]); the two ids may be given
/// in either order. Returns `None` when either id is not in `retreats`.
pub fn attendee_ids_in_range<'a>(
    retreats: &'a [Retreat],
    start_id: &str,
    end_id: &str,
) -> Option<HashSet<&'a str>> {
    let start = retreats.iter().position(|r| r.id == start_id)?;
    let end = retreats.iter().position(|r| r.id == end_id)?;
    let (from, to) = if start <= end { (start, end) } else { (end, start) };

    Some(
        retreats[from..=to]
            .iter()
            .flat_map(Retreat::attendee_ids)
            .collect(),
    )
}

/// Filter `servantees` by attendance over the retreat range. An unknown id yields an empty
/// result whatever the filter. Input order is preserved.
pub fn resolve_range<'s>(
    retreats: &[Retreat],
    start_id: &str,
    end_id: &str,
    servantees: &'s [Servantee],
    filter: AttendanceFilter,
) -> Vec<&'s Servantee> {
    let Some(attended) = attendee_ids_in_range(retreats, start_id, end_id) else {
        return Vec::new();
    };
    partition(&attended, servantees, filter)
}

/// Servantees that are not registered for `retreat`.
pub fn missing_from<'s>(retreat: &Retreat, servantees: &'s [Servantee]) -> Vec<&'s Servantee> {
    let attended: HashSet<&str> = retreat.attendee_ids().collect();
    partition(&attended, servantees, AttendanceFilter::NotAttended)
}

fn partition<'s>(
    attended: &HashSet<&str>,
    servantees: &'s [Servantee],
    filter: AttendanceFilter,
) -> Vec<&'s Servantee> {
    servantees
        .iter()
        .filter(|s| match filter {
            AttendanceFilter::Attended => attended.contains(s.id.as_str()),
            AttendanceFilter::NotAttended => !attended.contains(s.id.as_str()),
        })
        .collect()
}
