//! Visual artifacts: event scatter plots (PNG) and the I-V animation (GIF).
pub mod animation;
pub mod canvas;

use crate::data::events::EventRecord;
use crate::error::AppResult;
use canvas::{padded_range, Canvas, BLACK};
use image::ImageFormat;
use std::path::Path;

pub use animation::{render_animation, AnimationStyle};

/// X axis label of every event plot.
pub const TIME_LABEL: &str = "Time (sec)";
/// Axis label for current values.
pub const CURRENT_LABEL: &str = "Current (uA)";
/// Axis label for voltage values.
pub const VOLTAGE_LABEL: &str = "Voltage (V)";

/// Render `events` as a time vs. companion-value scatter plot.
///
/// Axis ranges fit the data and their ends are printed beside the axes.
/// `title` is drawn above the plot area and `value_label` names the Y axis.
pub fn render_event_plot(
    events: &[EventRecord],
    title: &str,
    value_label: &str,
    width: u32,
    height: u32,
) -> Canvas {
    let x_range = padded_range(events.iter().map(|e| e.time));
    let y_range = padded_range(events.iter().map(|e| e.value));
    let mut canvas = Canvas::new(width, height, x_range, y_range);
    canvas.axis_labels(TIME_LABEL, value_label);
    canvas.title(title);
    for event in events {
        canvas.marker(event.time, event.value, BLACK);
    }
    canvas
}

/// Render and save an event plot as PNG at `path`.
pub fn save_event_plot(
    path: &Path,
    events: &[EventRecord],
    title: &str,
    value_label: &str,
    width: u32,
    height: u32,
) -> AppResult<()> {
    render_event_plot(events, title, value_label, width, height)
        .into_image()
        .save_with_format(path, ImageFormat::Png)?;
    tracing::debug!(path = %path.display(), events = events.len(), "saved event plot");
    Ok(())
}
