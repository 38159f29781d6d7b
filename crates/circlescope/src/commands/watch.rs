//! `watch` handler: a live terminal dashboard driven by the sync controller.

use std::fmt::Write as _;
use std::io::{self, Write};

use chrono::Local;
use circlescope_core::{
    DashboardConfig, DashboardState, HISTORY_CAPACITY, NullRenderer, Renderer, SyncController,
    SystemView, format,
};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output::{self, detail_lines, led, should_color, status_label};

/// History rows shown below the panels.
const HISTORY_ROWS: usize = 10;

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

pub async fn handle(
    config: DashboardConfig,
    args: &WatchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let renderer = TerminalRenderer {
        format: global.output,
        color: should_color(global.color),
        clear: !args.no_clear && global.output == OutputFormat::Table,
    };

    if args.once {
        return render_once(config, renderer).await;
    }

    let controller = SyncController::new(config, renderer)?;
    controller.start().await?;

    let signal = tokio::signal::ctrl_c().await;
    controller.shutdown().await;
    signal?;
    Ok(())
}

/// Run the startup load only and render its result a single time.
async fn render_once(config: DashboardConfig, mut renderer: TerminalRenderer) -> Result<(), CliError> {
    let controller = SyncController::new(config, NullRenderer)?;
    let report = controller.load_initial().await;

    for (kind, err) in &report.failed {
        tracing::warn!(resource = %kind.path(), error = %err, "snapshot unavailable");
    }
    // Nothing answered: report the first failure.
    if report.loaded.is_empty() {
        if let Some((_, err)) = report.failed.into_iter().next() {
            return Err(err.into());
        }
    }

    renderer.clear = false;
    renderer.render(&controller.state());
    Ok(())
}

// ── Renderer ─────────────────────────────────────────────────────────

struct TerminalRenderer {
    format: OutputFormat,
    color: bool,
    clear: bool,
}

impl Renderer for TerminalRenderer {
    fn render(&mut self, state: &DashboardState) {
        let text = match self.format {
            OutputFormat::Table => Ok(render_dashboard(state, self.color)),
            // One document per update.
            OutputFormat::Json | OutputFormat::JsonCompact => output::render_json(state, true),
            OutputFormat::Yaml => output::render_single(self.format, state, |_| String::new())
                .map(|doc| format!("---\n{doc}")),
        };
        let text = match text {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "could not render dashboard state");
                return;
            }
        };

        let mut stdout = io::stdout().lock();
        if self.clear {
            let _ = stdout.write_all(CLEAR_SCREEN.as_bytes());
        }
        let _ = writeln!(stdout, "{text}");
        let _ = stdout.flush();
    }

    fn finish(&mut self) {
        tracing::debug!("dashboard renderer finished");
    }
}

/// Plain-text dashboard: header, latest detection, statistics, IO,
/// and the most recent history rows.
pub(crate) fn render_dashboard(state: &DashboardState, color: bool) -> String {
    let mut out = String::new();

    let system = state.system.as_ref();
    let _ = writeln!(
        out,
        "circlescope | stream {} | camera {} | recipe {} | {} fps",
        state.connection,
        system.map_or(format::PLACEHOLDER, SystemView::camera_display),
        format::text(system.and_then(|s| s.current_recipe.as_deref())),
        system.map_or_else(|| format::PLACEHOLDER.to_owned(), SystemView::fps_display),
    );
    if state.video.overlay_visible() {
        let _ = writeln!(out, "video unavailable ({})", state.video.url);
    }

    out.push_str("\nLatest detection\n");
    match &state.detection {
        None => out.push_str("  waiting for results\n"),
        Some(d) if d.is_empty() => out.push_str("  No circles detected\n"),
        Some(d) => {
            let primary = d.circles.first();
            let _ = writeln!(
                out,
                "{}",
                indent(&detail_lines(&[
                    ("Result", status_label(d.overall_status, color)),
                    ("Diameter", format::millimetres(primary.and_then(|c| c.diameter_mm))),
                    ("Circles", d.circles.len().to_string()),
                    ("Time", d.detection_time_display()),
                ]))
            );
        }
    }

    if let Some(recipe) = &state.recipe {
        let _ = writeln!(
            out,
            "  Nominal {} / Tolerance {}",
            recipe.nominal_display(),
            recipe.tolerance_display()
        );
    }

    out.push_str("\nStatistics\n");
    match &state.statistics {
        None => out.push_str("  waiting for statistics\n"),
        Some(s) => {
            let _ = writeln!(
                out,
                "{}",
                indent(&detail_lines(&[
                    ("Total", s.total_inspections.to_string()),
                    ("OK / NG", format!("{} / {}", s.ok_count, s.ng_count)),
                    ("OK rate", s.ok_rate_display()),
                    ("Throughput", s.throughput_display()),
                    ("Runtime", s.runtime_display()),
                ]))
            );
        }
    }

    out.push_str("\nIO\n");
    match &state.io {
        None => out.push_str("  waiting for IO status\n"),
        Some(io) => {
            let _ = writeln!(
                out,
                "  PLC {} | TRG {} RDY {} OK {} NG {} EN {} BSY {} ERR {}",
                if io.connected { "connected" } else { "disconnected" },
                led(io.trigger, color),
                led(io.system_ready, color),
                led(io.result_ok, color),
                led(io.result_ng, color),
                led(io.system_enable, color),
                led(io.busy, color),
                led(io.error, color),
            );
        }
    }

    let _ = writeln!(
        out,
        "\nHistory ({} of {HISTORY_CAPACITY})",
        state.history.len()
    );
    for entry in state.history.iter().take(HISTORY_ROWS) {
        let _ = writeln!(
            out,
            "  {}  {:>8}  {}",
            entry.timestamp.with_timezone(&Local).format("%H:%M:%S"),
            entry.diameter_display(),
            status_label(entry.status, color),
        );
    }

    out.trim_end().to_owned()
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|line| format!("  {line}"))
        .collect::<Vec<_>>()
        .join("\n")
}
