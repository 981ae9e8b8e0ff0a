use std::collections::HashMap;

use chrono::NaiveDate;

use crate::models::{AttendanceStatus, DayReport, GroupReport, UserReport};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LookupKey {
    pub date: NaiveDate,
    pub time_slot_id: String,
    pub attendance_status_id: String,
    pub user_id: Option<String>,
}

/// One rendered grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cell {
    Count(i64),
    /// The slot was never tracked for this row.
    Blank,
    /// Per-user presence indicator.
    Mark(bool),
}

/// O(1) index from `(date, slot, status[, user])` to the recorded count.
///
/// Only entries present in the payload are inserted, so a missing key means
/// "unknown" while a stored `Some(0)` means "recorded zero".
#[derive(Debug, Clone, Default)]
pub struct LookupTable {
    counts: HashMap<LookupKey, Option<i64>>,
}

impl LookupTable {
    pub fn from_group_report(report: &GroupReport) -> Self {
        let mut table = Self::default();
        table.insert_days(&report.day_reports, None);
        table
    }

    pub fn from_user_reports(reports: &[UserReport]) -> Self {
        let mut table = Self::default();
        for report in reports {
            table.insert_days(&report.day_reports, Some(&report.user.id));
        }
        table
    }

    fn insert_days(&mut self, days: &[DayReport], user_id: Option<&str>) {
        for day in days {
            for slot in &day.time_slot_reports {
                for status in &slot.attendance_status_counts {
                    let key = LookupKey {
                        date: day.date,
                        time_slot_id: slot.time_slot_id.clone(),
                        attendance_status_id: status.attendance_status_id.clone(),
                        user_id: user_id.map(str::to_string),
                    };
                    self.counts.insert(key, status.count);
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// `None` when the key is absent, `Some(None)` for a present null count.
    pub fn get(
        &self,
        date: NaiveDate,
        time_slot_id: &str,
        attendance_status_id: &str,
        user_id: Option<&str>,
    ) -> Option<Option<i64>> {
        let key = LookupKey {
            date,
            time_slot_id: time_slot_id.to_string(),
            attendance_status_id: attendance_status_id.to_string(),
            user_id: user_id.map(str::to_string),
        };
        self.counts.get(&key).copied()
    }

    /// Whether any of `statuses` has an entry for this slot on this date.
    pub fn any_status_available(
        &self,
        date: NaiveDate,
        time_slot_id: &str,
        statuses: &[AttendanceStatus],
    ) -> bool {
        statuses
            .iter()
            .any(|status| self.get(date, time_slot_id, &status.id, None).is_some())
    }

    /// Group-row cells for one slot, one per status: the stored count, else
    /// `0` when the slot was tracked, else blank.
    pub fn slot_cells(
        &self,
        date: NaiveDate,
        time_slot_id: &str,
        statuses: &[AttendanceStatus],
    ) -> Vec<Cell> {
        let tracked = self.any_status_available(date, time_slot_id, statuses);

        statuses
            .iter()
            .map(|status| match self.get(date, time_slot_id, &status.id, None) {
                Some(Some(count)) => Cell::Count(count),
                _ if tracked => Cell::Count(0),
                _ => Cell::Blank,
            })
            .collect()
    }

    /// User-row cells for one slot: marked only for a defined, non-zero count.
    pub fn user_slot_cells(
        &self,
        date: NaiveDate,
        time_slot_id: &str,
        statuses: &[AttendanceStatus],
        user_id: &str,
    ) -> Vec<Cell> {
        statuses
            .iter()
            .map(|status| {
                Cell::Mark(matches!(
                    self.get(date, time_slot_id, &status.id, Some(user_id)),
                    Some(Some(count)) if count != 0
                ))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        AttendanceStatusCount, GroupDetail, GroupType, TimeSlotReport, UserSummary,
    };

    fn status(id: &str) -> AttendanceStatus {
        AttendanceStatus {
            id: id.to_string(),
            name: id.to_string(),
            short_name: id[..1].to_uppercase(),
            color: None,
            organization_id: None,
        }
    }

    fn d() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    fn day(date: NaiveDate, slot: &str, counts: &[(&str, Option<i64>)]) -> DayReport {
        DayReport {
            date,
            time_slot_reports: vec![TimeSlotReport {
                time_slot_id: slot.to_string(),
                attendance_status_counts: counts
                    .iter()
                    .map(|(status, count)| AttendanceStatusCount {
                        attendance_status_id: status.to_string(),
                        count: *count,
                    })
                    .collect(),
            }],
        }
    }

    fn report(day_reports: Vec<DayReport>) -> GroupReport {
        GroupReport {
            group: GroupDetail {
                id: "g1".to_string(),
                name: "Choir".to_string(),
                color: None,
                group_type: GroupType::GroupsGroup,
                disabled: false,
                schedule_id: None,
                groups: vec![],
                users: vec![],
            },
            day_reports,
            time_slots: vec![],
            attendance_statuses: vec![],
            user_reports: vec![],
        }
    }

    fn user(id: &str) -> UserSummary {
        UserSummary {
            id: id.to_string(),
            first_name: "Kiara".to_string(),
            last_name: "Patel".to_string(),
            picture: None,
            disabled: false,
        }
    }

    #[test]
    fn distinguishes_recorded_zero_from_untracked() {
        let table = LookupTable::from_group_report(&report(vec![day(d(), "t1", &[("present", Some(5))])]));
        let statuses = [status("present"), status("absent")];

        assert_eq!(table.slot_cells(d(), "t1", &statuses), vec![Cell::Count(5), Cell::Count(0)]);
        assert_eq!(table.slot_cells(d(), "t2", &statuses), vec![Cell::Blank, Cell::Blank]);
    }

    #[test]
    fn explicit_zero_and_null_entries_count_as_tracked() {
        let table = LookupTable::from_group_report(&report(vec![day(
            d(),
            "t1",
            &[("present", Some(0)), ("late", None)],
        )]));
        let statuses = [status("present"), status("late"), status("absent")];

        assert_eq!(table.len(), 2);
        assert_eq!(table.get(d(), "t1", "late", None), Some(None));
        assert_eq!(table.get(d(), "t1", "absent", None), None);
        assert!(table.any_status_available(d(), "t1", &statuses));
        assert_eq!(
            table.slot_cells(d(), "t1", &statuses),
            vec![Cell::Count(0), Cell::Count(0), Cell::Count(0)]
        );
    }

    #[test]
    fn statuses_outside_the_reference_list_do_not_mark_a_slot_tracked() {
        let table = LookupTable::from_group_report(&report(vec![day(d(), "t1", &[("excused", Some(2))])]));
        let statuses = [status("present"), status("absent")];

        assert!(!table.any_status_available(d(), "t1", &statuses));
        assert_eq!(table.slot_cells(d(), "t1", &statuses), vec![Cell::Blank, Cell::Blank]);
    }

    #[test]
    fn empty_report_renders_blank() {
        let table = LookupTable::from_group_report(&report(vec![]));
        assert!(table.is_empty());
        assert_eq!(table.slot_cells(d(), "t1", &[status("present")]), vec![Cell::Blank]);
    }

    #[test]
    fn user_cells_only_mark_positive_counts() {
        let reports = vec![
            UserReport {
                user: user("u1"),
                day_reports: vec![day(d(), "t1", &[("present", Some(1)), ("absent", Some(0))])],
            },
            UserReport {
                user: user("u2"),
                day_reports: vec![day(d(), "t1", &[("absent", Some(3)), ("present", None)])],
            },
        ];
        let table = LookupTable::from_user_reports(&reports);
        let statuses = [status("present"), status("absent"), status("late")];

        assert_eq!(
            table.user_slot_cells(d(), "t1", &statuses, "u1"),
            vec![Cell::Mark(true), Cell::Mark(false), Cell::Mark(false)]
        );
        assert_eq!(
            table.user_slot_cells(d(), "t1", &statuses, "u2"),
            vec![Cell::Mark(false), Cell::Mark(true), Cell::Mark(false)]
        );
        // user entries never leak into group-level cells
        assert_eq!(table.slot_cells(d(), "t1", &statuses[..1]), vec![Cell::Blank]);
    }
}
