//! Static ECG chart rendering.
//!
//! Gridlines and the waveform are drawn into an in-memory RGB buffer with
//! plotters' bitmap backend. The caption, tick labels, axis descriptions and
//! legend are then stamped on with built-in mono fonts (`annotate`) and the
//! result is encoded to PNG with `image`, so nothing touches the filesystem.

use std::io::Cursor;

use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDateTime;
use image::{ImageFormat, RgbImage};
use plotters::prelude::*;

use super::annotate::{self, Alignment, Baseline, Font, Label, Legend};
use super::config::RenderConfig;

const WAVEFORM: RGBColor = RGBColor(31, 119, 180);
const SECOND_GRID: RGBColor = RGBColor(170, 170, 170);
const VALUE_GRID: RGBColor = RGBColor(225, 225, 225);
const VALUE_GRID_LINES: usize = 8;
const MIN_WIDTH: u32 = 160;
const MIN_HEIGHT: u32 = 120;
const GAP: u32 = 6;

pub const X_AXIS_LABEL: &str = "Time (seconds)";
pub const Y_AXIS_LABEL: &str = "ECG Value (ADC units)";
pub const LEGEND_LABEL: &str = "ECG Signal";

#[derive(Debug, Clone)]
pub struct RenderedChart {
    pub png: Vec<u8>,
    pub samples_used: usize,
    pub duration_secs: f64,
}

/// The most recent `window_len` samples, or all of them if fewer exist.
pub fn trailing_window<'a>(samples: &'a [i32], config: &RenderConfig) -> &'a [i32] {
    let keep = config.window_len().min(samples.len());
    &samples[samples.len() - keep..]
}

pub fn chart_title(patient_name: &str, patient_id: &str, duration_secs: f64) -> String {
    format!("ECG Data for {patient_name} ({patient_id}) - Last {duration_secs:.1}s")
}

pub fn x_axis_description(duration_secs: f64) -> String {
    format!("{X_AXIS_LABEL}, total {duration_secs:.1}s")
}

/// `ecg_graph_<id>_<YYYYmmdd_HHMMSS>.png`, with the id reduced to characters
/// that are safe in a storage key.
pub fn chart_file_name(patient_id: &str, generated_at: NaiveDateTime) -> String {
    let safe_id: String = patient_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!(
        "ecg_graph_{safe_id}_{}.png",
        generated_at.format("%Y%m%d_%H%M%S")
    )
}

/// Renders the trailing window of `samples`. An empty buffer yields `None`.
pub fn render(samples: &[i32], config: &RenderConfig, title: &str) -> Result<Option<RenderedChart>> {
    if samples.is_empty() {
        return Ok(None);
    }
    if config.sample_rate_hz == 0 {
        bail!("invalid chart configuration: sample rate is 0Hz");
    }
    if config.width < MIN_WIDTH || config.height < MIN_HEIGHT {
        bail!(
            "invalid chart configuration: {}x{} is smaller than {MIN_WIDTH}x{MIN_HEIGHT}",
            config.width,
            config.height
        );
    }

    let window = trailing_window(samples, config);
    let duration_secs = window.len() as f64 / config.sample_rate_hz as f64;
    let scale = annotate::text_scale(config.height);

    let mut buffer = vec![0u8; config.width as usize * config.height as usize * 3];
    let layout = draw(&mut buffer, window, config, duration_secs, scale)?;

    let mut image = RgbImage::from_raw(config.width, config.height, buffer)
        .ok_or_else(|| anyhow!("chart buffer does not match {}x{}", config.width, config.height))?;
    annotate_chart(&mut image, &layout, title, duration_secs, scale);

    let mut png = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .context("failed to encode ECG chart as PNG")?;

    Ok(Some(RenderedChart {
        png,
        samples_used: window.len(),
        duration_secs,
    }))
}

/// Pixel positions of the plot area and its ticks, taken from the plotters
/// coordinate mapping so labels line up with the gridlines.
struct Layout {
    plot_x: (i32, i32),
    plot_y: (i32, i32),
    second_ticks: Vec<(i32, u32)>,
    value_ticks: Vec<(i32, f64)>,
}

fn draw(
    buffer: &mut [u8],
    window: &[i32],
    config: &RenderConfig,
    duration_secs: f64,
    scale: u32,
) -> Result<Layout> {
    let rate = config.sample_rate_hz as f64;
    let (y_min, y_max) = value_range(window);
    let (_, title_h) = Font::Title.cell(scale);
    let (small_w, small_h) = Font::Small.cell(scale);

    let root = BitMapBackend::with_buffer(buffer, (config.width, config.height)).into_drawing_area();
    root.fill(&WHITE).map_err(drawing_error)?;

    let mut chart = ChartBuilder::on(&root)
        .margin_top(title_h + small_h + GAP * 3)
        .margin_bottom(small_h * 2 + GAP * 3)
        .margin_left(small_w * 7 + GAP * 2)
        .margin_right(GAP * 3)
        .build_cartesian_2d(0f64..duration_secs, y_min..y_max)
        .map_err(drawing_error)?;

    let (x_range, y_range) = chart.plotting_area().get_pixel_range();
    chart
        .plotting_area()
        .draw(&Rectangle::new(
            [(0.0, y_min), (duration_secs, y_max)],
            BLACK.stroke_width(1),
        ))
        .map_err(drawing_error)?;

    let step = (y_max - y_min) / VALUE_GRID_LINES as f64;
    let values: Vec<f64> = (1..VALUE_GRID_LINES).map(|i| y_min + step * i as f64).collect();
    chart
        .draw_series(
            values
                .iter()
                .map(|&y| PathElement::new(vec![(0.0, y), (duration_secs, y)], VALUE_GRID)),
        )
        .map_err(drawing_error)?;

    // One vertical line per whole second of the window.
    let seconds: Vec<u32> = (0..=duration_secs.floor() as u32).collect();
    chart
        .draw_series(
            seconds
                .iter()
                .map(|&sec| PathElement::new(vec![(sec as f64, y_min), (sec as f64, y_max)], SECOND_GRID)),
        )
        .map_err(drawing_error)?;

    chart
        .draw_series(LineSeries::new(
            window
                .iter()
                .enumerate()
                .map(|(i, value)| (i as f64 / rate, *value as f64)),
            WAVEFORM.stroke_width(1),
        ))
        .map_err(drawing_error)?;

    let layout = Layout {
        plot_x: (x_range.start, x_range.end),
        plot_y: (y_range.start, y_range.end),
        second_ticks: seconds
            .iter()
            .map(|&sec| (chart.backend_coord(&(sec as f64, y_min)).0, sec))
            .collect(),
        value_ticks: values
            .iter()
            .map(|&y| (chart.backend_coord(&(0.0, y)).1, y))
            .collect(),
    };

    root.present().map_err(drawing_error)?;
    Ok(layout)
}

fn annotate_chart(image: &mut RgbImage, layout: &Layout, title: &str, duration_secs: f64, scale: u32) {
    let (small_w, small_h) = Font::Small.cell(scale);
    let gap = GAP as i32;
    let (left, right) = layout.plot_x;
    let (top, bottom) = layout.plot_y;

    let mut labels = vec![
        Label {
            x: (left + right) / 2,
            y: gap,
            text: title.to_string(),
            font: Font::Title,
            align: Alignment::Center,
            baseline: Baseline::Top,
        },
        Label {
            x: left,
            y: top - gap,
            text: Y_AXIS_LABEL.to_string(),
            font: Font::Small,
            align: Alignment::Left,
            baseline: Baseline::Bottom,
        },
        Label {
            x: (left + right) / 2,
            y: bottom + gap * 2 + small_h as i32,
            text: x_axis_description(duration_secs),
            font: Font::Small,
            align: Alignment::Center,
            baseline: Baseline::Top,
        },
    ];

    // Skip second labels that would overlap their neighbour on long windows.
    let label_width = small_w as i32 * 3;
    let mut last_right = i32::MIN;
    for &(x, sec) in &layout.second_ticks {
        if x - label_width / 2 <= last_right {
            continue;
        }
        last_right = x + label_width / 2;
        labels.push(Label {
            x,
            y: bottom + gap,
            text: sec.to_string(),
            font: Font::Small,
            align: Alignment::Center,
            baseline: Baseline::Top,
        });
    }

    for &(y, value) in &layout.value_ticks {
        labels.push(Label {
            x: left - gap,
            y,
            text: format!("{value:.0}"),
            font: Font::Small,
            align: Alignment::Right,
            baseline: Baseline::Middle,
        });
    }

    for label in &labels {
        annotate::draw_label(image, label, scale);
    }

    annotate::draw_legend(
        image,
        &Legend {
            right: right - gap,
            top: top + gap,
            text: LEGEND_LABEL,
            color: (WAVEFORM.0, WAVEFORM.1, WAVEFORM.2),
        },
        scale,
    );
}

fn value_range(window: &[i32]) -> (f64, f64) {
    let min = window.iter().copied().min().unwrap_or(0) as f64;
    let max = window.iter().copied().max().unwrap_or(0) as f64;
    let pad = ((max - min) * 0.05).max(1.0);
    (min - pad, max + pad)
}

fn drawing_error<E: std::fmt::Display>(err: E) -> anyhow::Error {
    anyhow!("failed to draw ECG chart: {err}")
}
