//! Report generation
//!
//! Renders one SVG line chart per non-empty series and writes the optional
//! JSON session summary. Plot requests are independent, so they are rendered
//! in parallel.

use anyhow::{Context, Result};
use bms_log_decoder::{
    IngestStats, PlotRequest, PlotSink, ReportBuilder, ReportSummary, SessionOutcome,
    SessionSnapshot,
};
use plotters::prelude::*;
use rayon::prelude::*;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Chart renderer writing SVG files
#[derive(Debug, Clone, Copy)]
pub struct SvgPlotSink {
    width: u32,
    height: u32,
}

impl Default for SvgPlotSink {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 640,
        }
    }
}

fn plot_error<E: std::fmt::Display>(e: E) -> anyhow::Error {
    anyhow::anyhow!("{}", e)
}

impl PlotSink for SvgPlotSink {
    fn render(&self, request: &PlotRequest) -> Result<()> {
        let root = SVGBackend::new(&request.output_path, (self.width, self.height))
            .into_drawing_area();
        root.fill(&WHITE).map_err(plot_error)?;

        let (x_min, x_max) = request.x_range();
        let (y_min, y_max) = request.y_range();

        let mut chart = ChartBuilder::on(&root)
            .caption(&request.title, ("sans-serif", 28).into_font())
            .margin(15)
            .x_label_area_size(45)
            .y_label_area_size(70)
            .build_cartesian_2d(x_min..x_max, y_min..y_max)
            .map_err(plot_error)?;

        chart
            .configure_mesh()
            .x_desc(request.x_axis_label.as_str())
            .y_desc(request.y_axis_label.as_str())
            .draw()
            .map_err(plot_error)?;

        chart
            .draw_series(LineSeries::new(request.points.iter().copied(), &BLUE))
            .map_err(plot_error)?
            .label(request.series_label.as_str())
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &BLUE));

        chart
            .draw_series(
                request
                    .points
                    .iter()
                    .map(|&point| Circle::new(point, 3, BLUE.filled())),
            )
            .map_err(plot_error)?;

        chart
            .configure_series_labels()
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()
            .map_err(plot_error)?;

        root.present()
            .map_err(plot_error)
            .with_context(|| format!("Failed to write {:?}", request.output_path))?;
        Ok(())
    }
}

/// Build the plot requests for a finished session and render them in parallel
pub fn render_plots(
    builder: &ReportBuilder,
    outcome: &SessionOutcome,
    sink: &dyn PlotSink,
) -> Result<ReportSummary> {
    let requests = builder.build(&outcome.state);
    if requests.is_empty() {
        log::info!("No data collected, no plots to render");
        return Ok(ReportSummary::default());
    }

    fs::create_dir_all(builder.output_dir())
        .with_context(|| format!("Failed to create plot directory: {:?}", builder.output_dir()))?;

    let results: Vec<Result<()>> = requests.par_iter().map(|r| sink.render(r)).collect();

    let mut summary = ReportSummary::default();
    for (request, result) in requests.iter().zip(results) {
        summary.record(request, result);
    }
    Ok(summary)
}

/// Machine-readable summary of a session
#[derive(Debug, Serialize)]
pub struct SessionSummary {
    pub stop_reason: String,
    pub failed: bool,
    pub stats: IngestStats,
    pub final_values: SessionSnapshot,
    pub plots: Vec<PathBuf>,
    pub plot_failures: Vec<String>,
}

impl SessionSummary {
    pub fn new(outcome: &SessionOutcome, report: &ReportSummary) -> Self {
        Self {
            stop_reason: outcome.reason.to_string(),
            failed: outcome.reason.is_failure(),
            stats: outcome.stats,
            final_values: outcome.state.snapshot(),
            plots: report.rendered.clone(),
            plot_failures: report
                .failed
                .iter()
                .map(|(metric, e)| format!("{}: {}", metric, e))
                .collect(),
        }
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize summary")?;
        fs::write(path, json).with_context(|| format!("Failed to write summary: {:?}", path))?;
        log::info!("Session summary written to {:?}", path);
        Ok(())
    }
}
