//! Output formatting: table, JSON, YAML, plain.
//!
//! Renders data in the format selected by `--output`. Table uses `tabled`,
//! structured formats use serde, plain emits one identifier per line.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use tabled::{Table, Tabled, settings::Style};

use crowdlens_core::{DataMode, Severity};

use crate::cli::{ColorMode, OutputFormat};

// ── Color helpers ────────────────────────────────────────────────────

/// Determine whether color output should be enabled.
pub fn should_color(mode: &ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

pub fn paint_severity(severity: Severity, color: bool) -> String {
    let label = severity.as_ref().to_uppercase();
    if !color {
        return label;
    }
    match severity {
        Severity::High => label.red().bold().to_string(),
        Severity::Medium => label.yellow().to_string(),
        Severity::Low => label.green().to_string(),
    }
}

/// Banner for data that isn't fully live, `None` when it is.
pub fn mode_banner(mode: &DataMode, color: bool) -> Option<String> {
    if mode.is_live() {
        return None;
    }
    let text = format!("showing {mode}");
    Some(if color {
        text.yellow().italic().to_string()
    } else {
        text
    })
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render a list of serde-serializable + tabled items in the chosen format.
///
/// - `table`: uses the `Tabled` derive to build a pretty table
/// - `json` / `json-compact`: serializes the original data via serde
/// - `yaml`: serializes via serde_yaml
/// - `plain`: calls `id_fn` on each item to emit one identifier per line
pub fn render_list<T, R>(
    format: &OutputFormat,
    data: &[T],
    to_row: impl Fn(&T) -> R,
    id_fn: impl Fn(&T) -> String,
) -> String
where
    T: serde::Serialize,
    R: Tabled,
{
    match format {
        OutputFormat::Table => {
            let rows: Vec<R> = data.iter().map(to_row).collect();
            render_table(&rows)
        }
        OutputFormat::Json => render_json(data, false),
        OutputFormat::JsonCompact => render_json(data, true),
        OutputFormat::Yaml => render_yaml(data),
        OutputFormat::Plain => data.iter().map(&id_fn).collect::<Vec<_>>().join("\n"),
    }
}

/// Render a single serde-serializable item in the chosen format.
///
/// Table rendering uses `detail_fn`, since detail views don't use `Tabled`.
pub fn render_single<T>(
    format: &OutputFormat,
    data: &T,
    detail_fn: impl Fn(&T) -> String,
    id_fn: impl Fn(&T) -> String,
) -> String
where
    T: serde::Serialize,
{
    match format {
        OutputFormat::Table => detail_fn(data),
        OutputFormat::Json => render_json(data, false),
        OutputFormat::JsonCompact => render_json(data, true),
        OutputFormat::Yaml => render_yaml(data),
        OutputFormat::Plain => id_fn(data),
    }
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

// ── Format-specific renderers ────────────────────────────────────────

pub(crate) fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

pub(crate) fn render_json<T: serde::Serialize + ?Sized>(data: &T, compact: bool) -> String {
    let rendered = if compact {
        serde_json::to_string(data)
    } else {
        serde_json::to_string_pretty(data)
    };
    rendered.unwrap_or_else(|e| format!("{{\"error\":\"serialization failed: {e}\"}}"))
}

pub(crate) fn render_yaml<T: serde::Serialize + ?Sized>(data: &T) -> String {
    serde_yaml::to_string(data).unwrap_or_else(|e| format!("error: serialization failed: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(serde::Serialize)]
    struct Item {
        id: &'static str,
    }

    #[derive(Tabled)]
    struct ItemRow {
        #[tabled(rename = "ID")]
        id: &'static str,
    }

    #[test]
    fn plain_and_json_lists() {
        let items = [Item { id: "a" }, Item { id: "b" }];
        let plain = render_list(&OutputFormat::Plain, &items, |i| ItemRow { id: i.id }, |i| {
            i.id.to_owned()
        });
        assert_eq!(plain, "a\nb");

        let json = render_list(&OutputFormat::JsonCompact, &items, |i| ItemRow { id: i.id }, |i| {
            i.id.to_owned()
        });
        assert_eq!(json, r#"[{"id":"a"},{"id":"b"}]"#);

        let table = render_list(&OutputFormat::Table, &items, |i| ItemRow { id: i.id }, |i| {
            i.id.to_owned()
        });
        assert!(table.contains("ID"));
    }

    #[test]
    fn severity_without_color_is_plain_text() {
        assert_eq!(paint_severity(Severity::High, false), "HIGH");
        assert!(mode_banner(&DataMode::Live, false).is_none());
        assert_eq!(
            mode_banner(&DataMode::Degraded { reason: "down".into() }, false).as_deref(),
            Some("showing degraded (down)")
        );
    }
}
