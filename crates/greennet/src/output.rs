//! Rendering for `--output`.
//!
//! Device and profile lists become rounded tables, gateway answers become
//! field/value tables. `json`, `json-compact` and `yaml` always serialize
//! the underlying data, so scripts see the same shape the core produces.

use std::io::{self, IsTerminal, Write};

use serde::Serialize;
use serde_json::Value;
use tabled::builder::Builder;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::cli::{ColorMode, OutputFormat};
use crate::error::CliError;

/// `--color auto` honours `NO_COLOR` and only colors a terminal.
pub fn should_color(mode: &ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none(),
    }
}

// ── Renderers ────────────────────────────────────────────────────────

/// Render rows; `plain` prints one id per line, an empty table prints `empty`.
pub fn render_list<T, R>(
    format: &OutputFormat,
    data: &[T],
    to_row: impl Fn(&T) -> R,
    id_fn: impl Fn(&T) -> String,
    empty: &str,
) -> Result<String, CliError>
where
    T: Serialize,
    R: Tabled,
{
    match format {
        OutputFormat::Table if data.is_empty() => Ok(empty.to_owned()),
        OutputFormat::Table => {
            let rows: Vec<R> = data.iter().map(to_row).collect();
            Ok(Table::new(rows).with(Style::rounded()).to_string())
        }
        OutputFormat::Plain => Ok(data.iter().map(id_fn).collect::<Vec<_>>().join("\n")),
        structured => serialize(structured, data),
    }
}

/// Render one item; `table` uses the hand-written detail view.
pub fn render_single<T>(
    format: &OutputFormat,
    data: &T,
    detail_fn: impl Fn(&T) -> String,
    id_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: Serialize + ?Sized,
{
    match format {
        OutputFormat::Table => Ok(detail_fn(data)),
        OutputFormat::Plain => Ok(id_fn(data)),
        structured => serialize(structured, data),
    }
}

/// Render the body of a gateway answer.
///
/// Objects become one row per top-level field; nested values stay JSON.
pub fn render_answer(format: &OutputFormat, body: &Value) -> Result<String, CliError> {
    match (format, body) {
        (OutputFormat::Table, Value::Object(fields)) if !fields.is_empty() => {
            let mut builder = Builder::default();
            builder.push_record(["Field", "Value"]);
            for (key, value) in fields {
                builder.push_record([key.clone(), scalar_text(value)]);
            }
            Ok(builder.build().with(Style::rounded()).to_string())
        }
        (OutputFormat::Table | OutputFormat::Plain, Value::Null) => Ok("(empty)".into()),
        (OutputFormat::Table, other) => Ok(serde_json::to_string_pretty(other)?),
        (OutputFormat::Plain, other) => Ok(serde_json::to_string(other)?),
        (structured, other) => serialize(structured, other),
    }
}

/// Print to stdout unless quiet or empty.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

// ── Helpers ──────────────────────────────────────────────────────────

fn serialize<T: Serialize + ?Sized>(format: &OutputFormat, data: &T) -> Result<String, CliError> {
    Ok(match format {
        OutputFormat::JsonCompact => serde_json::to_string(data)?,
        OutputFormat::Yaml => serde_yaml::to_string(data)?,
        _ => serde_json::to_string_pretty(data)?,
    })
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "-".into(),
        other => other.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn answer_fields_become_rows() {
        let body = json!({"version": "2.4.1", "uptime": 3600, "radio": {"frequency": 868}});
        let table = render_answer(&OutputFormat::Table, &body).unwrap();
        assert!(table.contains("version"));
        assert!(table.contains("2.4.1"));
        assert!(table.contains(r#"{"frequency":868}"#));

        let compact = render_answer(&OutputFormat::JsonCompact, &body).unwrap();
        assert_eq!(compact, body.to_string());
        assert_eq!(render_answer(&OutputFormat::Table, &Value::Null).unwrap(), "(empty)");
    }

    #[derive(Tabled)]
    struct Row {
        id: &'static str,
    }

    #[test]
    fn empty_table_prints_note_but_json_stays_an_array() {
        let none: Vec<Value> = Vec::new();
        let row = |_: &Value| Row { id: "-" };
        let table = render_list(&OutputFormat::Table, &none, row, |_| String::new(), "no devices");
        assert_eq!(table.unwrap(), "no devices");
        let json = render_list(&OutputFormat::JsonCompact, &none, row, |_| String::new(), "no devices");
        assert_eq!(json.unwrap(), "[]");
    }
}
