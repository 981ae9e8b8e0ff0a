use chrono::NaiveDate;

use crate::lookup::{Cell, LookupTable};
use crate::models::{AttendanceStatus, GroupReport, GroupSummary, TimeSlot};
use crate::registry::RowStatus;
use crate::tree::GroupViewNode;

/// Column axes shared by every row: dates × time slots × statuses.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GridAxes {
    pub dates: Vec<NaiveDate>,
    pub time_slots: Vec<TimeSlot>,
    pub statuses: Vec<AttendanceStatus>,
}

impl GridAxes {
    pub fn column_count(&self) -> usize {
        self.dates.len() * self.time_slots.len() * self.statuses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.column_count() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowKind {
    Group { group_id: String },
    User { group_id: String, user_id: String },
    /// Stand-in for a users listing that is still loading or failed.
    Users { group_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowCells {
    Loading,
    Failed(String),
    Values(Vec<Cell>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    pub level: usize,
    pub label: String,
    pub color: Option<String>,
    pub kind: RowKind,
    pub cells: RowCells,
}

#[derive(Debug, Clone, Default)]
pub struct ReportGrid {
    pub root: Option<GroupSummary>,
    pub axes: GridAxes,
    pub rows: Vec<ReportRow>,
}

/// Last accepted report for one fetch, with its lookup table.
#[derive(Debug, Clone, Copy)]
pub struct RowSource<'a> {
    pub report: &'a GroupReport,
    pub table: &'a LookupTable,
}

pub fn group_cells(axes: &GridAxes, table: &LookupTable) -> Vec<Cell> {
    let mut cells = Vec::with_capacity(axes.column_count());
    for date in &axes.dates {
        for slot in &axes.time_slots {
            cells.extend(table.slot_cells(*date, &slot.id, &axes.statuses));
        }
    }
    cells
}

pub fn user_cells(axes: &GridAxes, table: &LookupTable, user_id: &str) -> Vec<Cell> {
    let mut cells = Vec::with_capacity(axes.column_count());
    for date in &axes.dates {
        for slot in &axes.time_slots {
            cells.extend(table.user_slot_cells(*date, &slot.id, &axes.statuses, user_id));
        }
    }
    cells
}

/// The row for one tree node.
pub fn group_row(
    node: &GroupViewNode,
    status: RowStatus<'_>,
    source: Option<RowSource<'_>>,
    axes: &GridAxes,
) -> ReportRow {
    let label = source
        .map(|s| s.report.group.name.clone())
        .or_else(|| node.data.as_ref().map(|d| d.name.clone()))
        .unwrap_or_else(|| node.group_id.clone());
    let color = source
        .and_then(|s| s.report.group.color.clone())
        .or_else(|| node.data.as_ref().and_then(|d| d.color.clone()));

    let cells = match (status, source) {
        (RowStatus::Failed(message), _) => RowCells::Failed(message.to_string()),
        (RowStatus::Ready, Some(source)) => RowCells::Values(group_cells(axes, source.table)),
        _ => RowCells::Loading,
    };

    ReportRow {
        level: node.level,
        label,
        color,
        kind: RowKind::Group {
            group_id: node.group_id.clone(),
        },
        cells,
    }
}

/// The per-user rows shown beneath an expanded users group.
pub fn user_rows(
    parent: &GroupViewNode,
    status: RowStatus<'_>,
    source: Option<RowSource<'_>>,
    axes: &GridAxes,
) -> Vec<ReportRow> {
    let level = parent.level + 1;
    let placeholder = |cells: RowCells| ReportRow {
        level,
        label: "Users".to_string(),
        color: None,
        kind: RowKind::Users {
            group_id: parent.group_id.clone(),
        },
        cells,
    };

    match (status, source) {
        (RowStatus::Failed(message), _) => vec![placeholder(RowCells::Failed(message.to_string()))],
        (RowStatus::Ready, Some(source)) => source
            .report
            .user_reports
            .iter()
            .map(|user_report| ReportRow {
                level,
                label: user_report.user.display_name(),
                color: None,
                kind: RowKind::User {
                    group_id: parent.group_id.clone(),
                    user_id: user_report.user.id.clone(),
                },
                cells: RowCells::Values(user_cells(axes, source.table, &user_report.user.id)),
            })
            .collect(),
        _ => vec![placeholder(RowCells::Loading)],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        AttendanceStatusCount, DayReport, GroupDetail, GroupType, TimeSlotReport, UserReport,
        UserSummary,
    };
    use crate::tree::GroupTree;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn axes() -> GridAxes {
        GridAxes {
            dates: vec![date(1), date(2)],
            time_slots: ["t1", "t2"]
                .iter()
                .map(|id| TimeSlot {
                    id: id.to_string(),
                    start_time: "08:00:00".to_string(),
                    end_time: "09:00:00".to_string(),
                })
                .collect(),
            statuses: ["present", "absent"]
                .iter()
                .map(|id| AttendanceStatus {
                    id: id.to_string(),
                    name: id.to_string(),
                    short_name: id[..1].to_uppercase(),
                    color: None,
                    organization_id: None,
                })
                .collect(),
        }
    }

    fn day_reports(status: &str, count: Option<i64>) -> Vec<DayReport> {
        vec![DayReport {
            date: date(1),
            time_slot_reports: vec![TimeSlotReport {
                time_slot_id: "t1".to_string(),
                attendance_status_counts: vec![AttendanceStatusCount {
                    attendance_status_id: status.to_string(),
                    count,
                }],
            }],
        }]
    }

    fn report(group_type: GroupType) -> GroupReport {
        GroupReport {
            group: GroupDetail {
                id: "g1".to_string(),
                name: "Morning Class".to_string(),
                color: Some("#ff0000".to_string()),
                group_type,
                disabled: false,
                schedule_id: None,
                groups: vec![],
                users: vec![],
            },
            day_reports: day_reports("present", Some(5)),
            time_slots: vec![],
            attendance_statuses: vec![],
            user_reports: vec![],
        }
    }

    #[test]
    fn group_cells_follow_axis_order() {
        let table = LookupTable::from_group_report(&report(GroupType::GroupsGroup));
        let cells = group_cells(&axes(), &table);

        assert_eq!(cells.len(), axes().column_count());
        assert_eq!(
            cells,
            vec![
                Cell::Count(5),
                Cell::Count(0),
                Cell::Blank,
                Cell::Blank,
                Cell::Blank,
                Cell::Blank,
                Cell::Blank,
                Cell::Blank,
            ]
        );
    }

    #[test]
    fn row_status_decides_cells() {
        let tree = GroupTree::with_root_id("g1");
        let node = tree.node(tree.root()).unwrap();
        let report = report(GroupType::GroupsGroup);
        let table = LookupTable::from_group_report(&report);
        let source = Some(RowSource {
            report: &report,
            table: &table,
        });

        let ready = group_row(node, RowStatus::Ready, source, &axes());
        assert_eq!(ready.label, "Morning Class");
        assert_eq!(ready.color.as_deref(), Some("#ff0000"));
        assert!(matches!(ready.cells, RowCells::Values(ref cells) if cells.len() == 8));

        let loading = group_row(node, RowStatus::Loading, source, &axes());
        assert_eq!(loading.cells, RowCells::Loading);

        let failed = group_row(node, RowStatus::Failed("boom"), None, &axes());
        assert_eq!(failed.cells, RowCells::Failed("boom".to_string()));
        assert_eq!(failed.label, "g1");
    }

    #[test]
    fn user_rows_render_marks() {
        let tree = GroupTree::with_root_id("g1");
        let node = tree.node(tree.root()).unwrap();
        let mut report = report(GroupType::UsersGroup);
        report.day_reports.clear();
        report.user_reports = vec![UserReport {
            user: UserSummary {
                id: "u1".to_string(),
                first_name: "jules".to_string(),
                last_name: "moreno".to_string(),
                picture: None,
                disabled: false,
            },
            day_reports: day_reports("absent", Some(1)),
        }];
        let table = LookupTable::from_user_reports(&report.user_reports);
        let source = Some(RowSource {
            report: &report,
            table: &table,
        });

        let rows = user_rows(node, RowStatus::Ready, source, &axes());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].level, 1);
        assert_eq!(rows[0].label, "Jules Moreno");
        match &rows[0].cells {
            RowCells::Values(cells) => {
                assert_eq!(cells[0], Cell::Mark(false));
                assert_eq!(cells[1], Cell::Mark(true));
                assert!(cells[2..].iter().all(|c| *c == Cell::Mark(false)));
            }
            other => panic!("unexpected cells {other:?}"),
        }

        let pending = user_rows(node, RowStatus::Loading, None, &axes());
        assert_eq!(pending.len(), 1);
        assert!(matches!(pending[0].kind, RowKind::Users { .. }));
    }
}
