//! Output formatting: table, JSON, YAML, plain.
//!
//! Renders data in the format selected by `--output`. Table uses `tabled`,
//! structured formats use serde, plain emits one identifier per line.

use std::io::{self, IsTerminal, Write};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use tabled::{Table, Tabled, settings::Style};

use ambutrack_core::{ConnectionState, VehicleRecord, VehicleStatus};

use crate::cli::{ColorMode, GlobalOpts, OutputFormat};
use crate::error::CliError;

// ── Color helpers ────────────────────────────────────────────────────

/// Determine whether color output should be enabled.
pub fn should_color(mode: &ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

pub fn paint_status(status: VehicleStatus, color: bool) -> String {
    let label: &'static str = status.into();
    if !color {
        return label.to_owned();
    }
    match status {
        VehicleStatus::Available => label.green().to_string(),
        VehicleStatus::EnRoute => label.yellow().to_string(),
        VehicleStatus::Busy => label.red().to_string(),
        VehicleStatus::Offline => label.dimmed().to_string(),
    }
}

pub fn paint_state(state: ConnectionState, color: bool) -> String {
    let label = state.to_string();
    if !color {
        return label;
    }
    match state {
        ConnectionState::Connected => label.green().bold().to_string(),
        ConnectionState::Connecting => label.yellow().to_string(),
        ConnectionState::Disconnected => label.red().to_string(),
    }
}

// ── Spinner ──────────────────────────────────────────────────────────

/// A stderr spinner, hidden when quiet, non-interactive, or machine output.
pub fn spinner(global: &GlobalOpts, message: &'static str) -> ProgressBar {
    let interactive = io::stderr().is_terminal();
    if global.quiet || !interactive || !matches!(global.output, OutputFormat::Table) {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        bar.set_style(style);
    }
    bar.set_message(message);
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

// ── Vehicle rendering ────────────────────────────────────────────────

#[derive(Tabled)]
struct VehicleRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Plate")]
    plate: String,
    #[tabled(rename = "Driver")]
    driver: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Position")]
    position: String,
    #[tabled(rename = "Speed")]
    speed: String,
    #[tabled(rename = "Heading")]
    heading: String,
    #[tabled(rename = "Updated")]
    updated: String,
}

impl VehicleRow {
    fn new(v: &VehicleRecord, now: DateTime<Utc>, color: bool) -> Self {
        Self {
            id: v.id.clone(),
            plate: v.plate_number.clone().unwrap_or_else(|| "-".into()),
            driver: v.driver.clone().unwrap_or_else(|| "-".into()),
            status: paint_status(v.status, color),
            position: v
                .position()
                .map_or_else(|| "-".into(), |(lat, lon)| format!("{lat:.5}, {lon:.5}")),
            speed: v.speed.map_or_else(|| "-".into(), |s| format!("{s:.1}")),
            heading: v.heading.map_or_else(|| "-".into(), |h| format!("{h:.0}°")),
            updated: format_age(v.last_update, now),
        }
    }
}

/// `"42s ago"`, truncated to whole seconds. Future timestamps read `"now"`.
pub fn format_age(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    match (now - at).to_std() {
        Ok(age) if age.as_secs() > 0 => {
            format!("{} ago", humantime::format_duration(Duration::from_secs(age.as_secs())))
        }
        _ => "now".into(),
    }
}

/// Render the fleet in the chosen format.
pub fn render_fleet(global: &GlobalOpts, fleet: &[Arc<VehicleRecord>]) -> Result<String, CliError> {
    let color = should_color(&global.color);
    let now = Utc::now();
    render_list(
        &global.output,
        fleet,
        |v| VehicleRow::new(v, now, color),
        |v| v.id.clone(),
    )
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render a list of serde-serializable + tabled items in the chosen format.
pub fn render_list<T, R>(
    format: &OutputFormat,
    data: &[T],
    to_row: impl Fn(&T) -> R,
    id_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: serde::Serialize,
    R: Tabled,
{
    match format {
        OutputFormat::Table => {
            let rows: Vec<R> = data.iter().map(to_row).collect();
            Ok(render_table(&rows))
        }
        OutputFormat::Json => render_json(data, false),
        OutputFormat::JsonCompact => render_json(data, true),
        OutputFormat::Yaml => render_yaml(data),
        OutputFormat::Plain => Ok(data.iter().map(&id_fn).collect::<Vec<_>>().join("\n")),
    }
}

/// Render a single serde-serializable item in the chosen format.
///
/// Table rendering uses a custom `detail_fn` that returns a pre-formatted
/// string, since single-item detail views don't use `Tabled` derive.
pub fn render_single<T>(
    format: &OutputFormat,
    data: &T,
    detail_fn: impl Fn(&T) -> String,
    id_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: serde::Serialize,
{
    match format {
        OutputFormat::Table => Ok(detail_fn(data)),
        OutputFormat::Json => render_json(data, false),
        OutputFormat::JsonCompact => render_json(data, true),
        OutputFormat::Yaml => render_yaml(data),
        OutputFormat::Plain => Ok(id_fn(data)),
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

fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

fn render_json<T: serde::Serialize + ?Sized>(data: &T, compact: bool) -> Result<String, CliError> {
    let out = if compact {
        serde_json::to_string(data)?
    } else {
        serde_json::to_string_pretty(data)?
    };
    Ok(out)
}

fn render_yaml<T: serde::Serialize + ?Sized>(data: &T) -> Result<String, CliError> {
    Ok(serde_yaml::to_string(data)?)
}
