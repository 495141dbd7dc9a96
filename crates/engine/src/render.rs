//! Plain-text and CSV rendering of reports.

use thiserror::Error;

use crate::report::{
    ExecutionReport, FieldsReport, MessagesBody, MessagesReport, NoticeReport, StatusReport,
};

const LAST_IMPORTED_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("csv output could not be flushed: {0}")]
    Flush(String),
    #[error("csv output is not valid utf-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// A bordered text table.
#[derive(Debug, Clone, Default)]
struct Table {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    fn new(header: Vec<String>) -> Self {
        Self {
            header,
            rows: Vec::new(),
        }
    }

    fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    fn widths(&self) -> Vec<usize> {
        let columns = self
            .rows
            .iter()
            .map(Vec::len)
            .chain(std::iter::once(self.header.len()))
            .max()
            .unwrap_or(0);

        (0..columns)
            .map(|i| {
                std::iter::once(&self.header)
                    .chain(self.rows.iter())
                    .filter_map(|row| row.get(i))
                    .map(|cell| cell.chars().count())
                    .max()
                    .unwrap_or(0)
            })
            .collect()
    }

    fn render(&self) -> String {
        let widths = self.widths();
        let border = widths
            .iter()
            .map(|w| "-".repeat(w + 2))
            .collect::<Vec<_>>()
            .join("+");
        let border = format!("+{border}+\n");

        let line = |row: &[String]| {
            let cells: Vec<String> = widths
                .iter()
                .enumerate()
                .map(|(i, w)| {
                    let cell = row.get(i).map(String::as_str).unwrap_or("");
                    let pad = w - cell.chars().count();
                    format!(" {cell}{} ", " ".repeat(pad))
                })
                .collect();
            format!("|{}|\n", cells.join("|"))
        };

        let mut out = String::new();
        out.push_str(&border);
        out.push_str(&line(&self.header));
        out.push_str(&border);
        for row in &self.rows {
            out.push_str(&line(row));
        }
        out.push_str(&border);
        out
    }
}

/// One table per group. With `names_only`, only migration ids are listed.
pub fn render_status(report: &StatusReport, names_only: bool) -> String {
    let mut out = String::new();

    for group in &report.groups {
        let mut table = if names_only {
            Table::new(vec![group.header()])
        } else {
            let mut header = vec![group.header()];
            header.extend(
                ["Status", "Total", "Imported", "Unprocessed", "Last imported"].map(String::from),
            );
            Table::new(header)
        };

        for row in &group.rows {
            if names_only {
                table.push(vec![row.migration_id.to_string()]);
                continue;
            }
            table.push(vec![
                row.migration_id.to_string(),
                row.status.label().to_string(),
                row.total.to_string(),
                row.imported.to_string(),
                row.unprocessed.to_string(),
                row.last_imported
                    .map(|at| at.format(LAST_IMPORTED_FORMAT).to_string())
                    .unwrap_or_default(),
            ]);
        }

        out.push_str(&table.render());
    }

    out
}

/// Message tables, or raw CSV (header row first) when `csv` is set.
pub fn render_messages(report: &MessagesReport, csv: bool) -> Result<String, RenderError> {
    let mut out = String::new();

    for section in &report.sections {
        let id = &section.migration_id;
        match &section.body {
            MessagesBody::NotFound => out.push_str(&format!("Migration {id} does not exist\n")),
            MessagesBody::Empty => out.push_str(&format!("No messages for migration {id}\n")),
            MessagesBody::Table { header, rows } if csv => {
                out.push_str(&to_csv(header, rows)?);
            }
            MessagesBody::Table { header, rows } => {
                let mut table = Table::new(header.clone());
                for row in rows {
                    table.push(row.clone());
                }
                out.push_str(&format!("{id}\n"));
                out.push_str(&table.render());
            }
        }
    }

    Ok(out)
}

fn to_csv(header: &[String], rows: &[Vec<String>]) -> Result<String, RenderError> {
    let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());
    writer.write_record(header)?;
    for row in rows {
        writer.write_record(row)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| RenderError::Flush(e.error().to_string()))?;
    Ok(String::from_utf8(bytes)?)
}

/// A title per group, then one description/machine-name table per migration.
pub fn render_fields(report: &FieldsReport) -> String {
    let mut out = String::new();

    for group in &report.groups {
        out.push_str(&format!("[{}]\n", group.group));
        for migration in &group.migrations {
            let mut table = Table::new(vec![
                format!("{} description", migration.migration_id),
                "Machine name".to_string(),
            ]);
            for field in &migration.fields {
                table.push(vec![field.description.clone(), field.machine_name.clone()]);
            }
            out.push_str(&table.render());
        }
    }

    out
}

pub fn render_execution(report: &ExecutionReport) -> String {
    report
        .entries
        .iter()
        .map(|e| format!("{}\n", e.detail))
        .collect()
}

pub fn render_notices(report: &NoticeReport) -> String {
    report
        .notices
        .iter()
        .map(|n| format!("{}\n", n.message))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    use drover_core::{GroupId, MigrationId, MigrationStatus};

    use crate::report::{MessagesSection, RowCount, StatusGroup, StatusRow};

    fn id(s: &str) -> MigrationId {
        MigrationId::new(s).unwrap()
    }

    fn status_report() -> StatusReport {
        StatusReport {
            groups: vec![StatusGroup {
                group: GroupId::default_group(),
                label: None,
                rows: vec![
                    StatusRow {
                        migration_id: id("users"),
                        status: MigrationStatus::Idle,
                        total: RowCount::Counted(10),
                        imported: 4,
                        unprocessed: RowCount::Counted(6),
                        last_imported: Some(Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap()),
                    },
                    StatusRow {
                        migration_id: id("feed"),
                        status: MigrationStatus::RollingBack,
                        total: RowCount::Uncountable,
                        imported: 0,
                        unprocessed: RowCount::Uncountable,
                        last_imported: None,
                    },
                ],
            }],
        }
    }

    #[test]
    fn table_pads_columns() {
        let mut table = Table::new(vec!["a".into(), "bb".into()]);
        table.push(vec!["ccc".into(), "d".into()]);

        assert_eq!(
            table.render(),
            "+-----+----+\n| a   | bb |\n+-----+----+\n| ccc | d  |\n+-----+----+\n"
        );
    }

    #[test]
    fn status_table_shows_counts_and_sentinels() {
        let out = render_status(&status_report(), false);

        assert!(out.contains("Group: default"));
        assert!(out.contains("| users "));
        assert!(out.contains("2024-03-01 12:30:00"));
        assert!(out.contains("Rolling back"));
        assert_eq!(out.matches("N/A").count(), 2);
    }

    #[test]
    fn status_names_only_lists_ids() {
        let out = render_status(&status_report(), true);

        assert!(out.contains("| users "));
        assert!(!out.contains("Status"));
        assert!(!out.contains("N/A"));
    }

    #[test]
    fn fields_and_plain_reports() {
        use crate::migration::SourceField;
        use crate::report::{FieldsGroup, MigrationFields, Notice, Operation};

        let fields = FieldsReport {
            groups: vec![FieldsGroup {
                group: GroupId::default_group(),
                migrations: vec![MigrationFields {
                    migration_id: id("users"),
                    fields: vec![SourceField::new("mail", "Email")],
                }],
            }],
        };
        let out = render_fields(&fields);
        assert!(out.starts_with("[default]\n"));
        assert!(out.contains("| Email "));
        assert!(out.contains("| mail "));

        let mut notices = NoticeReport::new(Operation::Reset);
        notices.push(Notice::reset(id("users")));
        assert_eq!(render_notices(&notices), "Migration users reset to Idle\n");

        let mut execution = ExecutionReport::new(crate::report::RunId::new(), Operation::Import);
        execution.push(crate::report::ExecutionEntry::success(id("users"), Operation::Import));
        assert_eq!(render_execution(&execution), "Imported users\n");
    }

    #[test]
    fn messages_csv_has_header_and_no_title() {
        let report = MessagesReport {
            sections: vec![
                MessagesSection {
                    migration_id: id("users"),
                    body: MessagesBody::Table {
                        header: vec!["sourceid1".into(), "level".into(), "message".into()],
                        rows: vec![vec!["7".into(), "error".into(), "bad, email".into()]],
                    },
                },
                MessagesSection {
                    migration_id: id("quiet"),
                    body: MessagesBody::Empty,
                },
                MessagesSection {
                    migration_id: id("ghost"),
                    body: MessagesBody::NotFound,
                },
            ],
        };

        let out = render_messages(&report, true).unwrap();
        assert_eq!(
            out,
            "sourceid1,level,message\n7,error,\"bad, email\"\n\
             No messages for migration quiet\n\
             Migration ghost does not exist\n"
        );

        let table = render_messages(&report, false).unwrap();
        assert!(table.starts_with("users\n+"));
    }
}
