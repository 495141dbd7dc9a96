//! Read-only inspection of migrations: logged messages and source fields.

use tracing::debug;

use drover_core::MigrationId;

use crate::error::RegistryError;
use crate::migration::{MessageRow, SourceField};
use crate::plan::GroupedPlan;
use crate::registry::MigrationRegistry;
use crate::report::{
    FieldsGroup, FieldsReport, MessagesBody, MessagesReport, MessagesSection, MigrationFields,
};

/// Collect the message log of each requested migration, in request order.
pub fn messages<R>(registry: &R, ids: &[MigrationId]) -> Result<MessagesReport, RegistryError>
where
    R: MigrationRegistry + ?Sized,
{
    let mut report = MessagesReport::default();

    for id in ids {
        let body = match registry.get(id)? {
            None => MessagesBody::NotFound,
            Some(migration) => {
                let rows: Vec<MessageRow> = migration.id_map().messages().collect();
                match rows.first() {
                    None => MessagesBody::Empty,
                    Some(first) => MessagesBody::Table {
                        header: first.columns(),
                        rows: rows.iter().map(MessageRow::values).collect(),
                    },
                }
            }
        };
        debug!(migration_id = %id, "collected messages");
        report.sections.push(MessagesSection {
            migration_id: id.clone(),
            body,
        });
    }

    Ok(report)
}

/// List the source fields of every planned migration.
pub fn fields_source(plan: &GroupedPlan) -> FieldsReport {
    let groups = plan
        .groups()
        .iter()
        .map(|group| FieldsGroup {
            group: group.group.clone(),
            migrations: group
                .entries
                .iter()
                .map(|entry| MigrationFields {
                    migration_id: entry.id.clone(),
                    fields: entry
                        .migration
                        .source()
                        .fields()
                        .into_iter()
                        .map(|field| {
                            SourceField::new(field.machine_name, strip_tags(&field.description))
                        })
                        .collect(),
                })
                .collect(),
        })
        .collect();

    FieldsReport { groups }
}

/// Drop `<...>` markup from a description.
///
/// A `<` followed by whitespace or ending the text is kept as literal text.
fn strip_tags(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_tag = false;
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '<' if !in_tag => {
                if chars.peek().is_some_and(|next| !next.is_whitespace()) {
                    in_tag = true;
                } else {
                    out.push(c);
                }
            }
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}
