//! Headline figures for the dashboard overview.

use chrono::{DateTime, Datelike, Months, TimeZone, Utc};
use serde::Serialize;

use crate::models::{Retreat, Servantee};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NextRetreat {
    pub id: String,
    pub name: String,
    pub start_date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardStats {
    pub new_servantees: usize,
    pub new_servantees_last_month: usize,
    /// Month-over-month change in new servantees, in whole percent.
    pub new_servantees_change: i64,
    pub servants: usize,
    pub next_retreat: Option<NextRetreat>,
}

impl DashboardStats {
    pub fn compute(
        servantees: &[Servantee],
        servant_count: usize,
        retreats: &[Retreat],
        now: DateTime<Utc>,
    ) -> Self {
        let this_month = start_of_month(now);
        let last_month = this_month
            .checked_sub_months(Months::new(1))
            .unwrap_or(this_month);

        let created: Vec<DateTime<Utc>> =
            servantees.iter().filter_map(|s| s.created_at).collect();
        let new_servantees = created.iter().filter(|at| **at > this_month).count();
        let new_servantees_last_month = created
            .iter()
            .filter(|at| **at > last_month && **at < this_month)
            .count();

        let next_retreat = retreats
            .iter()
            .filter_map(|r| r.start_date.filter(|start| *start > now).map(|start| (r, start)))
            .min_by_key(|(_, start)| *start)
            .map(|(r, start)| NextRetreat {
                id: r.id.clone(),
                name: r.name.clone(),
                start_date: start,
            });

        Self {
            new_servantees,
            new_servantees_last_month,
            new_servantees_change: percent_change(new_servantees, new_servantees_last_month),
            servants: servant_count,
            next_retreat,
        }
    }
}

/// Relative change from `previous` to `current`, rounded. Growth from zero counts as 100%.
pub fn percent_change(current: usize, previous: usize) -> i64 {
    if previous == 0 {
        return 100;
    }
    let change = (current as f64 - previous as f64) / previous as f64 * 100.0;
    change.round() as i64
}

fn start_of_month(at: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(at.year(), at.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(at)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    fn servantee(id: &str, created: Option<DateTime<Utc>>) -> Servantee {
        Servantee {
            id: id.to_string(),
            name: id.to_string(),
            phone: None,
            church: None,
            education: None,
            year: None,
            created_at: created,
        }
    }

    fn retreat(id: &str, start: Option<DateTime<Utc>>) -> Retreat {
        Retreat {
            id: id.to_string(),
            name: format!("Retreat {id}"),
            start_date: start,
            end_date: None,
            location: None,
            attendees: Vec::new(),
        }
    }

    #[test]
    fn counts_new_servantees_per_month() {
        let now = at(2025, 3, 15);
        let servantees = vec![
            servantee("a", Some(at(2025, 3, 2))),
            servantee("b", Some(at(2025, 3, 10))),
            servantee("c", Some(at(2025, 3, 12))),
            servantee("d", Some(at(2025, 2, 20))),
            servantee("e", Some(at(2025, 2, 3))),
            servantee("f", Some(at(2024, 12, 1))),
            servantee("g", None),
        ];
        let stats = DashboardStats::compute(&servantees, 4, &[], now);
        assert_eq!(stats.new_servantees, 3);
        assert_eq!(stats.new_servantees_last_month, 2);
        assert_eq!(stats.new_servantees_change, 50);
        assert_eq!(stats.servants, 4);
        assert_eq!(stats.next_retreat, None);
    }

    #[test]
    fn january_compares_against_december() {
        let now = at(2025, 1, 20);
        let servantees = vec![
            servantee("a", Some(at(2024, 12, 5))),
            servantee("b", Some(at(2024, 12, 6))),
        ];
        let stats = DashboardStats::compute(&servantees, 0, &[], now);
        assert_eq!(stats.new_servantees, 0);
        assert_eq!(stats.new_servantees_last_month, 2);
        assert_eq!(stats.new_servantees_change, -100);
    }

    #[test]
    fn change_from_empty_month_is_full_growth() {
        assert_eq!(percent_change(0, 0), 100);
        assert_eq!(percent_change(7, 0), 100);
        assert_eq!(percent_change(1, 3), -67);
    }

    #[test]
    fn next_retreat_is_earliest_future_start() {
        let now = at(2025, 5, 1);
        let retreats = vec![
            retreat("past", Some(at(2025, 4, 1))),
            retreat("later", Some(at(2025, 8, 1))),
            retreat("soon", Some(at(2025, 6, 1))),
            retreat("undated", None),
        ];
        let stats = DashboardStats::compute(&[], 0, &retreats, now);
        let next = stats.next_retreat.expect("next retreat");
        assert_eq!(next.id, "soon");
        assert_eq!(next.start_date, at(2025, 6, 1));
    }
}
