//! Histogram figures
//!
//! Two SVG figures per feature:
//! - `<model>_<feature>.svg`: input and output distributions overlaid
//! - `<model>_<feature>_diff.svg`: relative difference

use anyhow::{Context, Result};
use plotters::prelude::*;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::analysis::{FeatureArrays, Histogram};

/// Canvas size in pixels (6 x 4.4 in at 100 dpi)
pub const FIGURE_SIZE: (u32, u32) = (600, 440);

/// Y axis label of every figure
pub const COUNT_LABEL: &str = "Particles";

const INPUT_COLOR: RGBColor = RGBColor(31, 119, 180);
const OUTPUT_COLOR: RGBColor = RGBColor(255, 127, 14);

/// Files written for one feature
#[derive(Debug, Clone, PartialEq)]
pub struct FeaturePlots {
    pub distribution: PathBuf,
    pub difference: PathBuf,
}

/// Writes the figures of one model into an output directory
pub struct FigureWriter {
    output_dir: PathBuf,
    model_name: String,
}

impl FigureWriter {
    pub fn new<P: AsRef<Path>>(output_dir: P, model_name: &str) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            model_name: model_name.to_string(),
        }
    }

    /// Path of a figure: `<output_dir>/<model>_<stem>.svg`
    pub fn figure_path(&self, stem: &str) -> PathBuf {
        self.output_dir.join(format!("{}_{}.svg", self.model_name, stem))
    }

    /// Histogram both distributions and the relative difference of a feature
    pub fn write_feature(&self, arrays: &FeatureArrays) -> Result<FeaturePlots> {
        std::fs::create_dir_all(&self.output_dir)
            .with_context(|| format!("Failed to create output directory: {:?}", self.output_dir))?;

        let feature = arrays.feature;
        let input = Histogram::from_values(feature.value_bins(), &arrays.input)?;
        let output = Histogram::from_values(feature.value_bins(), &arrays.output)?;
        let diff = Histogram::from_values(feature.diff_bins(), &arrays.diff)?;
        debug!(
            "{}: {} input / {} output values outside the plot range",
            feature,
            input.underflow() + input.overflow(),
            output.underflow() + output.overflow()
        );

        let distribution = self.figure_path(feature.short_name());
        draw_histograms(
            &distribution,
            &feature.label(),
            &[("Input", &input, INPUT_COLOR), ("Output", &output, OUTPUT_COLOR)],
            true,
        )?;

        let difference = self.figure_path(&format!("{}_diff", feature.short_name()));
        draw_histograms(
            &difference,
            &feature.diff_label(),
            &[("Difference", &diff, INPUT_COLOR)],
            false,
        )?;

        Ok(FeaturePlots {
            distribution,
            difference,
        })
    }
}

/// Draw filled-bar histograms over the edges of the first series
fn draw_histograms(
    path: &Path,
    x_label: &str,
    series: &[(&str, &Histogram, RGBColor)],
    legend: bool,
) -> Result<()> {
    let edges = series
        .first()
        .map(|(_, h, _)| h.edges())
        .ok_or_else(|| anyhow::anyhow!("No histogram to draw"))?;
    let x_range = edges[0]..edges[edges.len() - 1];
    let y_max = series
        .iter()
        .map(|(_, h, _)| h.max_count())
        .max()
        .unwrap_or(0)
        .max(1) as f64
        * 1.05;

    let root = SVGBackend::new(path, FIGURE_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .margin(12)
        .x_label_area_size(48)
        .y_label_area_size(64)
        .build_cartesian_2d(x_range, 0f64..y_max)?;

    chart
        .configure_mesh()
        .disable_mesh()
        .x_desc(x_label)
        .y_desc(COUNT_LABEL)
        .axis_desc_style(("sans-serif", 16))
        .draw()?;

    let alpha = if series.len() > 1 { 0.5 } else { 1.0 };
    for &(label, hist, color) in series {
        let style = color.mix(alpha).filled();
        chart
            .draw_series(
                hist.bins()
                    .filter(|&(_, _, c)| c > 0)
                    .map(|(l, r, c)| Rectangle::new([(l, 0.0), (r, c as f64)], style)),
            )?
            .label(label)
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 12, y + 5)], style));
    }

    if legend {
        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperRight)
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()?;
    }

    root.present().with_context(|| format!("Failed to write figure: {:?}", path))?;
    debug!("Wrote {:?}", path);
    Ok(())
}
