use std::fmt::Write;

use crate::error::Result;
use crate::lookup::Cell;
use crate::row::{ReportGrid, ReportRow, RowCells};

const MARK: &str = "✓";

pub fn cell_text(cell: &Cell) -> String {
    match cell {
        Cell::Count(count) => count.to_string(),
        Cell::Blank | Cell::Mark(false) => String::new(),
        Cell::Mark(true) => MARK.to_string(),
    }
}

/// One string per grid column; loading and failed rows put their notice in
/// the first column.
fn row_texts(row: &ReportRow, columns: usize) -> Vec<String> {
    let notice = match &row.cells {
        RowCells::Values(cells) => return cells.iter().map(cell_text).collect(),
        RowCells::Loading => "loading".to_string(),
        RowCells::Failed(message) => format!("error: {}", message),
    };

    let mut texts = vec![String::new(); columns.max(1)];
    texts[0] = notice;
    texts
}

fn column_labels(grid: &ReportGrid) -> Vec<String> {
    let axes = &grid.axes;
    let mut labels = Vec::with_capacity(axes.column_count());
    for date in &axes.dates {
        for (index, _) in axes.time_slots.iter().enumerate() {
            for status in &axes.statuses {
                labels.push(format!(
                    "{} #{} {}",
                    date.format("%m-%d"),
                    index + 1,
                    status.short_name
                ));
            }
        }
    }
    labels
}

fn escape(value: &str) -> String {
    value.replace('|', "\\|")
}

pub fn build_markdown(grid: &ReportGrid) -> String {
    let mut output = String::new();
    let root_label = grid
        .root
        .as_ref()
        .map(|root| root.name.as_str())
        .unwrap_or("no group selected");

    let _ = writeln!(output, "# Attendance Report");
    match (grid.axes.dates.first(), grid.axes.dates.last()) {
        (Some(first), Some(last)) => {
            let _ = writeln!(output, "Generated for {} ({} to {})", root_label, first, last);
        }
        _ => {
            let _ = writeln!(output, "Generated for {}", root_label);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Time Slots");
    if grid.axes.time_slots.is_empty() {
        let _ = writeln!(output, "No time slots reported.");
    } else {
        for (index, slot) in grid.axes.time_slots.iter().enumerate() {
            let _ = writeln!(output, "- #{}: {}", index + 1, slot.label());
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Statuses");
    if grid.axes.statuses.is_empty() {
        let _ = writeln!(output, "No attendance statuses reported.");
    } else {
        for status in &grid.axes.statuses {
            let _ = writeln!(output, "- {}: {}", status.short_name, status.name);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Attendance");

    if grid.axes.is_empty() {
        let _ = writeln!(output, "No dates to report for this window.");
        return output;
    }

    let labels = column_labels(grid);
    let _ = writeln!(output, "| Group | {} |", labels.join(" | "));
    let _ = writeln!(output, "|---|{}", "---|".repeat(labels.len()));

    for row in &grid.rows {
        let indent = "· ".repeat(row.level);
        let texts = row_texts(row, labels.len());
        let _ = writeln!(
            output,
            "| {}{} | {} |",
            indent,
            escape(&row.label),
            texts.iter().map(|t| escape(t)).collect::<Vec<_>>().join(" | ")
        );
    }

    output
}

/// Three header records (dates, slots, statuses) followed by one record per
/// row: colour, indented label, then the cells.
pub fn write_csv<W: std::io::Write>(grid: &ReportGrid, writer: W) -> Result<()> {
    let axes = &grid.axes;
    let columns = axes.column_count();
    let statuses = axes.statuses.len();
    let per_date = axes.time_slots.len() * statuses;

    let mut dates = vec![String::new(), "Dates".to_string()];
    let mut slots = vec![String::new(), "Slots".to_string()];
    let mut status_row = vec![String::new(), "Status".to_string()];

    for date in &axes.dates {
        for (slot_index, _) in axes.time_slots.iter().enumerate() {
            for (status_index, status) in axes.statuses.iter().enumerate() {
                let first_of_date = slot_index == 0 && status_index == 0;
                dates.push(if first_of_date {
                    date.format("%d %B, %Y").to_string()
                } else {
                    String::new()
                });
                slots.push(if status_index == 0 {
                    (slot_index + 1).to_string()
                } else {
                    String::new()
                });
                status_row.push(status.short_name.clone());
            }
        }
    }
    debug_assert_eq!(dates.len(), 2 + axes.dates.len() * per_date);

    let mut csv_writer = csv::WriterBuilder::new().flexible(true).from_writer(writer);
    csv_writer.write_record(&dates)?;
    csv_writer.write_record(&slots)?;
    csv_writer.write_record(&status_row)?;

    for row in &grid.rows {
        let mut record = vec![
            row.color.clone().unwrap_or_default(),
            format!("{}{}", "  ".repeat(row.level), row.label),
        ];
        if columns > 0 {
            record.extend(row_texts(row, columns));
        }
        csv_writer.write_record(&record)?;
    }

    csv_writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::models::{AttendanceStatus, GroupSummary, GroupType, TimeSlot};
    use crate::row::{GridAxes, RowKind};

    fn grid() -> ReportGrid {
        ReportGrid {
            root: Some(GroupSummary {
                id: "g1".to_string(),
                name: "Youth Choir".to_string(),
                color: None,
                group_type: GroupType::GroupsGroup,
                disabled: false,
                schedule_id: None,
            }),
            axes: GridAxes {
                dates: vec![
                    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                    NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(),
                ],
                time_slots: vec![TimeSlot {
                    id: "t1".to_string(),
                    start_time: "08:00:00".to_string(),
                    end_time: "09:00:00".to_string(),
                }],
                statuses: ["Present", "Absent"]
                    .iter()
                    .map(|name| AttendanceStatus {
                        id: name.to_lowercase(),
                        name: name.to_string(),
                        short_name: name[..1].to_string(),
                        color: None,
                        organization_id: None,
                    })
                    .collect(),
            },
            rows: vec![
                ReportRow {
                    level: 0,
                    label: "Youth Choir".to_string(),
                    color: Some("#00ff00".to_string()),
                    kind: RowKind::Group {
                        group_id: "g1".to_string(),
                    },
                    cells: RowCells::Values(vec![
                        Cell::Count(3),
                        Cell::Count(0),
                        Cell::Blank,
                        Cell::Blank,
                    ]),
                },
                ReportRow {
                    level: 1,
                    label: "Altos".to_string(),
                    color: None,
                    kind: RowKind::Group {
                        group_id: "g2".to_string(),
                    },
                    cells: RowCells::Failed("Request failed with status 500".to_string()),
                },
                ReportRow {
                    level: 1,
                    label: "Avery Lee".to_string(),
                    color: None,
                    kind: RowKind::User {
                        group_id: "g3".to_string(),
                        user_id: "u1".to_string(),
                    },
                    cells: RowCells::Values(vec![
                        Cell::Mark(true),
                        Cell::Mark(false),
                        Cell::Mark(false),
                        Cell::Mark(false),
                    ]),
                },
            ],
        }
    }

    #[test]
    fn markdown_has_legend_and_rows() {
        let output = build_markdown(&grid());

        assert!(output.contains("Generated for Youth Choir (2024-01-01 to 2024-01-03)"));
        assert!(output.contains("- #1: 08:00 AM - 09:00 AM"));
        assert!(output.contains("- P: Present"));
        assert!(output.contains("| Group | 01-01 #1 P | 01-01 #1 A | 01-03 #1 P | 01-03 #1 A |"));
        assert!(output.contains("| Youth Choir | 3 | 0 |  |  |"));
        assert!(output.contains("| · Altos | error: Request failed with status 500 |  |  |  |"));
        assert!(output.contains("| · Avery Lee | ✓ |  |  |  |"));
    }

    #[test]
    fn markdown_without_dates_skips_the_table() {
        let mut grid = grid();
        grid.axes.dates.clear();
        let output = build_markdown(&grid);

        assert!(output.contains("Generated for Youth Choir\n"));
        assert!(output.contains("No dates to report for this window."));
        assert!(!output.contains("| Group |"));
    }

    #[test]
    fn csv_has_three_header_rows() {
        let mut buffer = Vec::new();
        write_csv(&grid(), &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], ",Dates,\"01 January, 2024\",,\"03 January, 2024\",");
        assert_eq!(lines[1], ",Slots,1,,1,");
        assert_eq!(lines[2], ",Status,P,A,P,A");
        assert_eq!(lines[3], "#00ff00,Youth Choir,3,0,,");
        assert_eq!(lines[4], ",  Altos,error: Request failed with status 500,,,");
        assert_eq!(lines[5], ",  Avery Lee,✓,,,");
    }
}
