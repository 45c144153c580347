//! Report building
//!
//! Turns the series accumulated in a finished session into plot requests, one
//! per metric that has data. Empty series produce no request at all.

use crate::session::{SeriesPoint, SessionState};
use std::fmt;
use std::path::{Path, PathBuf};

/// X axis label shared by every plot
pub const ELAPSED_AXIS_LABEL: &str = "Elapsed Time (s)";

/// File extension of every plot; the only chart renderer writes SVG
pub const PLOT_EXTENSION: &str = "svg";

/// The four plotted metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    TimeRemaining,
    StateOfCharge,
    StateOfHealth,
    AuxVoltage,
}

impl Metric {
    pub const ALL: [Metric; 4] = [
        Metric::TimeRemaining,
        Metric::StateOfCharge,
        Metric::StateOfHealth,
        Metric::AuxVoltage,
    ];

    /// Series label
    pub fn label(self) -> &'static str {
        match self {
            Metric::TimeRemaining => "Time Remaining",
            Metric::StateOfCharge => "State of Charge (SoC)",
            Metric::StateOfHealth => "State of Health (SoH)",
            Metric::AuxVoltage => "Aux Battery Voltage",
        }
    }

    pub fn y_axis_label(self) -> &'static str {
        match self {
            Metric::TimeRemaining => "Time Remaining (minutes)",
            Metric::StateOfCharge => "SoC (%)",
            Metric::StateOfHealth => "SoH (%)",
            Metric::AuxVoltage => "Voltage (VDC)",
        }
    }

    /// File-name stem, stable across runs
    pub fn slug(self) -> &'static str {
        match self {
            Metric::TimeRemaining => "time_remaining",
            Metric::StateOfCharge => "state_of_charge",
            Metric::StateOfHealth => "state_of_health",
            Metric::AuxVoltage => "aux_battery_voltage",
        }
    }

    pub fn title(self) -> String {
        format!("{} over Time", self.label())
    }

    /// The series in `state` that this metric plots
    pub fn series(self, state: &SessionState) -> &[SeriesPoint] {
        match self {
            Metric::TimeRemaining => state.time_remaining_series(),
            Metric::StateOfCharge => state.state_of_charge_series(),
            Metric::StateOfHealth => state.state_of_health_series(),
            Metric::AuxVoltage => state.aux_voltage_series(),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Everything a plotting sink needs to render one chart
#[derive(Debug, Clone, PartialEq)]
pub struct PlotRequest {
    pub metric: Metric,
    pub series_label: String,
    pub x_axis_label: String,
    pub y_axis_label: String,
    pub title: String,
    /// (elapsed seconds, value), in arrival order
    pub points: Vec<SeriesPoint>,
    pub output_path: PathBuf,
}

impl PlotRequest {
    /// Min and max of the y values, widened when flat so an axis can be drawn
    pub fn y_range(&self) -> (f64, f64) {
        let (min, max) = self
            .points
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &(_, y)| {
                (lo.min(y), hi.max(y))
            });
        if min < max {
            (min, max)
        } else {
            (min - 1.0, max + 1.0)
        }
    }

    /// Span of elapsed time covered, widened when there is a single point
    pub fn x_range(&self) -> (f64, f64) {
        let first = self.points.first().map_or(0.0, |p| p.0);
        let last = self.points.last().map_or(0.0, |p| p.0);
        if first < last {
            (first, last)
        } else {
            (first, first + 1.0)
        }
    }
}

/// Destination for plot requests (e.g. an SVG chart renderer)
///
/// Implementations must tolerate being called concurrently for different
/// requests.
pub trait PlotSink: Sync {
    fn render(&self, request: &PlotRequest) -> anyhow::Result<()>;
}

/// Result of rendering a report
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportSummary {
    pub rendered: Vec<PathBuf>,
    pub failed: Vec<(Metric, String)>,
}

impl ReportSummary {
    /// Record the outcome of one plot request; failures are warnings only
    pub fn record(&mut self, request: &PlotRequest, result: anyhow::Result<()>) {
        match result {
            Ok(()) => {
                log::info!("Saved {} plot to {:?}", request.metric, request.output_path);
                self.rendered.push(request.output_path.clone());
            }
            Err(e) => {
                log::warn!("Failed to render {} plot: {:#}", request.metric, e);
                self.failed.push((request.metric, format!("{:#}", e)));
            }
        }
    }
}

/// Builds plot requests from a finished session
#[derive(Debug, Clone)]
pub struct ReportBuilder {
    output_dir: PathBuf,
}

impl ReportBuilder {
    /// Plots are written as `<output_dir>/<slug>.svg`
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Deterministic output path for a metric
    pub fn output_path(&self, metric: Metric) -> PathBuf {
        self.output_dir
            .join(format!("{}.{}", metric.slug(), PLOT_EXTENSION))
    }

    /// One request per non-empty series, in `Metric::ALL` order
    pub fn build(&self, state: &SessionState) -> Vec<PlotRequest> {
        Metric::ALL
            .iter()
            .filter_map(|&metric| {
                let points = metric.series(state);
                if points.is_empty() {
                    log::debug!("No data for {}, skipping plot", metric);
                    return None;
                }
                Some(PlotRequest {
                    metric,
                    series_label: metric.label().to_string(),
                    x_axis_label: ELAPSED_AXIS_LABEL.to_string(),
                    y_axis_label: metric.y_axis_label().to_string(),
                    title: metric.title(),
                    points: points.to_vec(),
                    output_path: self.output_path(metric),
                })
            })
            .collect()
    }

    /// Consume a finished session and render its plots one after another
    pub fn render(&self, state: SessionState, sink: &dyn PlotSink) -> ReportSummary {
        let mut summary = ReportSummary::default();
        for request in self.build(&state) {
            let result = sink.render(&request);
            summary.record(&request, result);
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AlgorithmReading, AuxReading};
    use std::sync::Mutex;

    #[derive(Default)]
    struct CollectingSink {
        seen: Mutex<Vec<Metric>>,
        fail_on: Option<Metric>,
    }

    impl PlotSink for CollectingSink {
        fn render(&self, request: &PlotRequest) -> anyhow::Result<()> {
            if Some(request.metric) == self.fail_on {
                anyhow::bail!("no fonts available");
            }
            self.seen.lock().unwrap().push(request.metric);
            Ok(())
        }
    }

    fn full_session() -> SessionState {
        let mut state = SessionState::new();
        state.apply_algorithm(
            0.0,
            &AlgorithmReading {
                time_remaining_minutes: 60.0,
                state_of_charge_percent: 50,
                state_of_health_percent: 80,
            },
        );
        state.apply_aux(0.5, &AuxReading { voltage: 12.5 });
        state
    }

    #[test]
    fn test_empty_session_builds_nothing() {
        let builder = ReportBuilder::new("plots");
        assert!(builder.build(&SessionState::new()).is_empty());
    }

    #[test]
    fn test_only_series_with_data_are_plotted() {
        let mut state = SessionState::new();
        state.apply_aux(1.0, &AuxReading { voltage: 12.0 });

        let requests = ReportBuilder::new("plots").build(&state);
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].metric, Metric::AuxVoltage);
        assert_eq!(
            requests[0].output_path,
            Path::new("plots").join("aux_battery_voltage.svg")
        );
    }

    #[test]
    fn test_request_contents() {
        let requests = ReportBuilder::new("out").build(&full_session());
        let metrics: Vec<_> = requests.iter().map(|r| r.metric).collect();
        assert_eq!(metrics, Metric::ALL.to_vec());

        let soc = &requests[1];
        assert_eq!(soc.series_label, "State of Charge (SoC)");
        assert_eq!(soc.x_axis_label, ELAPSED_AXIS_LABEL);
        assert_eq!(soc.points, vec![(0.0, 50.0)]);
        assert_eq!(soc.output_path, Path::new("out").join("state_of_charge.svg"));
    }

    #[test]
    fn test_output_paths_are_svg() {
        let builder = ReportBuilder::new("out");
        for metric in Metric::ALL {
            let path = builder.output_path(metric);
            assert_eq!(path.extension().unwrap(), "svg");
            assert_eq!(path.file_stem().unwrap(), metric.slug());
        }
    }

    #[test]
    fn test_slugs_are_unique() {
        let mut slugs: Vec<_> = Metric::ALL.iter().map(|m| m.slug()).collect();
        slugs.sort();
        slugs.dedup();
        assert_eq!(slugs.len(), 4);
    }

    #[test]
    fn test_render_reports_failures_without_aborting() {
        let sink = CollectingSink {
            fail_on: Some(Metric::StateOfHealth),
            ..Default::default()
        };
        let summary = ReportBuilder::new("out").render(full_session(), &sink);

        assert_eq!(summary.rendered.len(), 3);
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].0, Metric::StateOfHealth);
        assert_eq!(sink.seen.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_ranges_for_single_point() {
        let request = &ReportBuilder::new("out").build(&full_session())[3];
        assert_eq!(request.x_range(), (0.5, 1.5));
        assert_eq!(request.y_range(), (11.5, 13.5));
    }
}
