//! Console output for runner commands.

use anyhow::{Result, bail};
use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table};

use appflow_model::ProcessState;
use appflow_validate::{Severity, Validations};

/// Severities shown in the validation table, most severe first.
const SHOWN: [Severity; 4] = [
    Severity::Error,
    Severity::Warning,
    Severity::Informational,
    Severity::Success,
];

/// A `--set PATH=VALUE` argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub path: String,
    pub value: String,
}

/// Split `PATH=VALUE` at the first `=`. The value may be empty.
pub fn parse_assignment(arg: &str) -> Result<Assignment> {
    let Some((path, value)) = arg.split_once('=') else {
        bail!("expected PATH=VALUE, got '{arg}'");
    };
    let path = path.trim();
    if path.is_empty() {
        bail!("missing field path in '{arg}'");
    }
    Ok(Assignment {
        path: path.to_string(),
        value: value.to_string(),
    })
}

/// One row per message: page, component, severity, text.
pub fn validation_rows(validations: &Validations) -> Vec<[String; 4]> {
    let mut rows = Vec::new();
    for severity in SHOWN {
        for (layout, components) in validations.iter() {
            for (component, bindings) in components {
                for binding in bindings.values() {
                    for message in binding.list(severity) {
                        rows.push([
                            layout.to_string(),
                            component.clone(),
                            severity.label().to_string(),
                            message.clone(),
                        ]);
                    }
                }
            }
        }
    }
    rows
}

pub fn validation_table(validations: &Validations) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Page"),
        header_cell("Component"),
        header_cell("Severity"),
        header_cell("Message"),
    ]);
    apply_table_style(&mut table);
    for [layout, component, severity, message] in validation_rows(validations) {
        let color = match severity.as_str() {
            "Error" => Color::Red,
            "Warning" => Color::Yellow,
            "Success" => Color::Green,
            _ => Color::Cyan,
        };
        table.add_row(vec![
            Cell::new(layout),
            Cell::new(component),
            Cell::new(severity).fg(color),
            Cell::new(message),
        ]);
    }
    table
}

pub fn print_validations(validations: &Validations) {
    if validations.is_empty() {
        println!("No validation messages.");
        return;
    }
    println!("{}", validation_table(validations));
}

pub fn print_process(state: &ProcessState) {
    let task = state.task_id.as_deref().unwrap_or("-");
    println!("Task: {task} ({})", state.task_type.label());
    if let Some(error) = &state.error {
        println!("Process error: {error}");
    }
}

pub fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label).add_attribute(Attribute::Bold)
}

#[cfg(test)]
mod tests {
    use super::*;
    use appflow_validate::SIMPLE_BINDING;

    #[test]
    fn test_parse_assignment() {
        let set = parse_assignment("Items[1].Amount=5=6").unwrap();
        assert_eq!(set.path, "Items[1].Amount");
        assert_eq!(set.value, "5=6");
        assert_eq!(parse_assignment("Person.Name=").unwrap().value, "");
    }

    #[test]
    fn test_parse_assignment_rejects_missing_parts() {
        assert!(parse_assignment("Person.Name").is_err());
        assert!(parse_assignment("=Kari").is_err());
    }

    #[test]
    fn test_rows_put_errors_first() {
        let mut validations = Validations::new();
        validations.add("FormLayout", "age", SIMPLE_BINDING, Severity::Warning, "Check age");
        validations.add("FormLayout", "name", SIMPLE_BINDING, Severity::Error, "Name is taken");

        let rows = validation_rows(&validations);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][1], "name");
        assert_eq!(rows[0][2], "Error");
        assert_eq!(rows[1][3], "Check age");
    }
}
