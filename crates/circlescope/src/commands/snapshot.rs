//! `snapshot` handlers: one REST fetch, printed.

use circlescope_api::models::{
    Calibration, IoStatus, RecipeDetail, RecipeList, Statistics, SystemStatus,
};
use circlescope_core::{ApiClient, IoView, RecipeView, StatisticsView, SystemView, format};

use crate::cli::{GlobalOpts, SnapshotResource};
use crate::error::CliError;
use crate::output::{self, detail_lines, led, should_color, status_label};

pub async fn handle(
    api: &ApiClient,
    resource: SnapshotResource,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let color = should_color(global.color);
    let out = match resource {
        SnapshotResource::Status => {
            output::render_single(global.output, &api.status().await?, status_detail)?
        }
        SnapshotResource::Statistics => {
            output::render_single(global.output, &api.statistics().await?, |s| {
                statistics_detail(s, color)
            })?
        }
        SnapshotResource::Recipes => {
            output::render_single(global.output, &api.recipes().await?, recipes_detail)?
        }
        SnapshotResource::Recipe { name } => {
            output::render_single(global.output, &api.recipe(&name).await?, recipe_detail)?
        }
        SnapshotResource::Io => {
            output::render_single(global.output, &api.io_status().await?, |io| {
                io_detail(io, color)
            })?
        }
        SnapshotResource::Calibration => output::render_single(
            global.output,
            &api.calibration().await?,
            calibration_detail,
        )?,
    };
    output::print_output(&out, global.quiet);
    Ok(())
}

// ── Detail views ─────────────────────────────────────────────────────

fn yes_no(value: bool) -> String {
    if value { "yes" } else { "no" }.to_owned()
}

pub(crate) fn status_detail(status: &SystemStatus) -> String {
    let view = SystemView::from(status);
    detail_lines(&[
        ("Camera", view.camera_display().to_owned()),
        ("Running", yes_no(view.is_running)),
        ("Recipe", format::text(view.current_recipe.as_deref())),
        ("FPS", view.fps_display()),
        ("Web clients", view.web_clients.to_string()),
    ])
}

pub(crate) fn statistics_detail(stats: &Statistics, color: bool) -> String {
    let view = StatisticsView::from(stats);
    detail_lines(&[
        ("Total", view.total_inspections.to_string()),
        ("OK", view.ok_count.to_string()),
        ("NG", view.ng_count.to_string()),
        ("OK rate", view.ok_rate_display()),
        ("Throughput", view.throughput_display()),
        ("Runtime", view.runtime_display()),
        (
            "Last result",
            view.last_result
                .map_or_else(|| format::PLACEHOLDER.to_owned(), |s| status_label(s, color)),
        ),
    ])
}

fn recipes_detail(list: &RecipeList) -> String {
    if list.recipes.is_empty() {
        return "No recipes".into();
    }
    let current = list.current.as_deref();
    list.recipes
        .iter()
        .map(|name| {
            let marker = if Some(name.as_str()) == current { " *" } else { "" };
            format!("{name}{marker}")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn recipe_detail(recipe: &RecipeDetail) -> String {
    let view = RecipeView::from(recipe);
    let detection = recipe.detection_config.clone().unwrap_or_default();
    let range = match (detection.min_diameter_mm, detection.max_diameter_mm) {
        (None, None) => format::PLACEHOLDER.to_owned(),
        (min, max) => format!(
            "{} .. {}",
            format::millimetres(min),
            format::millimetres(max)
        ),
    };
    detail_lines(&[
        ("Name", view.name_display()),
        ("Description", format::text(view.description.as_deref())),
        ("Nominal", view.nominal_display()),
        ("Tolerance", view.tolerance_display()),
        ("Diameter range", range),
        (
            "Min circularity",
            detection
                .min_circularity
                .map_or_else(|| format::PLACEHOLDER.to_owned(), |c| format!("{c:.2}")),
        ),
        (
            "Pixel to mm",
            detection
                .pixel_to_mm
                .map_or_else(|| format::PLACEHOLDER.to_owned(), |p| format!("{p:.5}")),
        ),
        ("Updated", format::text(recipe.updated_at.as_deref())),
    ])
}

pub(crate) fn io_detail(io: &IoStatus, color: bool) -> String {
    let view = IoView::from(io);
    detail_lines(&[
        ("PLC", if view.connected { "connected" } else { "disconnected" }.to_owned()),
        ("Mode", format::text(view.mode.as_deref())),
        ("Trigger", led(view.trigger, color)),
        ("Ready", led(view.system_ready, color)),
        ("Result OK", led(view.result_ok, color)),
        ("Result NG", led(view.result_ng, color)),
        ("Enable", led(view.system_enable, color)),
        ("Busy", led(view.busy, color)),
        ("Error", led(view.error, color)),
        ("Recipe index", view.recipe_index.to_string()),
    ])
}

fn calibration_detail(cal: &Calibration) -> String {
    detail_lines(&[
        ("Calibrated", yes_no(cal.is_calibrated.unwrap_or(false))),
        (
            "Pixel to mm",
            cal.pixel_to_mm
                .map_or_else(|| format::PLACEHOLDER.to_owned(), |p| format!("{p:.5}")),
        ),
        ("Reference", format::millimetres(cal.reference_size_mm)),
        (
            "Reference px",
            cal.reference_size_px
                .map_or_else(|| format::PLACEHOLDER.to_owned(), format::one_decimal),
        ),
        ("Calibrated at", format::text(cal.calibrated_at.as_deref())),
    ])
}
