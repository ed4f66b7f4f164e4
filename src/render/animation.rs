//! Phase-plane (I-V) animation of the burn capture.
//!
//! Each animation frame plots one [`FrameWindower`] window as a cloud of
//! points against fixed axis ranges, with red reference lines at the two test
//! levels, labelled axes and the window's start time as the title. Frames are
//! encoded as a non-looping GIF whose frame delay matches the hardware output
//! frequency.

use super::canvas::{Canvas, BLUE, RED};
use super::{CURRENT_LABEL, VOLTAGE_LABEL};
use crate::data::frames::{Frame, FrameWindower};
use crate::error::{AppResult, PostError};
use image::codecs::gif::GifEncoder;
use image::{Delay, RgbaImage};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::time::Duration;

/// Fixed presentation of the I-V animation.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationStyle {
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// X (voltage) axis range.
    pub x_range: [f64; 2],
    /// Y (current) axis range.
    pub y_range: [f64; 2],
    /// X position of the vertical reference line.
    pub x_reference: f64,
    /// Y position of the horizontal reference line.
    pub y_reference: f64,
    /// Playback speed relative to real time.
    pub speedup: f64,
}

/// Draw a single animation frame.
pub fn render_frame(frame: &Frame<'_>, style: &AnimationStyle) -> RgbaImage {
    let mut canvas = axes(style);
    for (&x, &y) in frame.x.iter().zip(frame.y) {
        canvas.marker(x, y, BLUE);
    }
    canvas.title(&format!("{:.1} seconds", frame.start_time));
    canvas.into_image()
}

fn axes(style: &AnimationStyle) -> Canvas {
    let mut canvas = Canvas::new(style.width, style.height, style.x_range, style.y_range);
    canvas.vline(style.x_reference, RED);
    canvas.hline(style.y_reference, RED);
    canvas.axis_labels(VOLTAGE_LABEL, CURRENT_LABEL);
    canvas
}

/// Per-frame display time for `fps` frames per second at `speedup`.
///
/// `None` when the display time is not a representable duration, which
/// happens for rates so small that a frame would last longer than `u64::MAX`
/// seconds.
pub fn frame_delay(fps: f64, speedup: f64) -> Option<Delay> {
    Duration::try_from_secs_f64(1.0 / (fps * speedup))
        .ok()
        .map(Delay::from_saturating_duration)
}

/// Render every frame of `windower` into a GIF at `path`.
///
/// Returns the number of frames written. A capture too short for a single
/// frame still produces a one-frame animation with empty axes, so the
/// artifact set of a dataset is always complete.
///
/// # Errors
///
/// [`PostError::InvalidFrameRate`] if the frame rate and `speedup` give no
/// usable frame delay. Nothing is written in that case.
pub fn render_animation(
    path: &Path,
    windower: &FrameWindower<'_>,
    style: &AnimationStyle,
) -> AppResult<usize> {
    let delay = frame_delay(windower.fps(), style.speedup).ok_or(PostError::InvalidFrameRate {
        sample_rate: windower.sample_rate(),
        fps: windower.fps(),
    })?;
    // No NETSCAPE loop extension is written, so viewers play the animation once.
    let mut encoder = GifEncoder::new_with_speed(BufWriter::new(File::create(path)?), 10);

    let mut written = 0;
    for frame in windower {
        let image = render_frame(&frame, style);
        encoder.encode_frame(image::Frame::from_parts(image, 0, 0, delay))?;
        written += 1;
    }

    if written == 0 {
        tracing::warn!(
            path = %path.display(),
            samples_per_frame = windower.samples_per_frame(),
            "capture shorter than one frame, writing empty animation"
        );
        let mut canvas = axes(style);
        canvas.title("0.0 seconds");
        encoder.encode_frame(image::Frame::from_parts(canvas.into_image(), 0, 0, delay))?;
    }

    tracing::debug!(path = %path.display(), frames = written, "saved animation");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::channel_store::ChannelStore;
    use crate::render::canvas::BLACK;
    use image::AnimationDecoder;
    use std::io::BufReader;

    fn style() -> AnimationStyle {
        AnimationStyle {
            width: 96,
            height: 72,
            x_range: [-10.0, 10.0],
            y_range: [-100.0, 250.0],
            x_reference: 2.0,
            y_reference: 25.0,
            speedup: 1.0,
        }
    }

    fn decode_frames(path: &Path) -> Vec<image::Frame> {
        let file = BufReader::new(File::open(path).unwrap());
        image::codecs::gif::GifDecoder::new(file)
            .unwrap()
            .into_frames()
            .collect_frames()
            .unwrap()
    }

    #[test]
    fn one_gif_frame_per_window() {
        let n = 45;
        let store = ChannelStore::from_pairs(
            10.0,
            [
                ("V", (0..n).map(|i| (i % 10) as f64 - 5.0).collect()),
                ("I", (0..n).map(|i| (i % 10) as f64 * 20.0).collect()),
            ],
        )
        .unwrap();
        let windower = FrameWindower::new(&store, "V", "I", 1.0).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ivchar.gif");

        let written = render_animation(&path, &windower, &style()).unwrap();
        assert_eq!(written, 4);
        assert_eq!(decode_frames(&path).len(), 4);
    }

    #[test]
    fn short_capture_still_writes_animation() {
        let store = ChannelStore::from_pairs(10.0, [("V", vec![0.0; 3]), ("I", vec![0.0; 3])])
            .unwrap();
        let windower = FrameWindower::new(&store, "V", "I", 1.0).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ivchar.gif");

        assert_eq!(render_animation(&path, &windower, &style()).unwrap(), 0);
        assert_eq!(decode_frames(&path).len(), 1);
    }

    #[test]
    fn frame_shows_reference_lines_and_points() {
        let store =
            ChannelStore::from_pairs(2.0, [("V", vec![-5.0, 5.0]), ("I", vec![0.0, 200.0])])
                .unwrap();
        let windower = FrameWindower::new(&store, "V", "I", 1.0).unwrap();
        let frame = windower.frame(0).unwrap();
        let style = style();
        let img = render_frame(&frame, &style);

        let canvas = Canvas::new(style.width, style.height, style.x_range, style.y_range);
        let (px, py) = canvas.to_pixel(-5.0, 0.0).unwrap();
        assert_eq!(*img.get_pixel(px as u32, py as u32), BLUE);
        let (rx, _) = canvas.to_pixel(2.0, 0.0).unwrap();
        let (_, ry) = canvas.to_pixel(0.0, 100.0).unwrap();
        assert_eq!(*img.get_pixel(rx as u32, ry as u32), RED);
    }

    #[test]
    fn delay_follows_frame_rate() {
        let (num, den) = frame_delay(10.0, 1.0).unwrap().numer_denom_ms();
        assert_eq!(num / den, 100);
        let (num, den) = frame_delay(10.0, 2.0).unwrap().numer_denom_ms();
        assert_eq!(num / den, 50);
        assert!(frame_delay(1e-20, 1.0).is_none());
        assert!(frame_delay(0.0, 1.0).is_none());
    }

    #[test]
    fn unrepresentable_delay_is_a_frame_rate_error() {
        let store = ChannelStore::from_pairs(10.0, [("V", vec![0.0; 4]), ("I", vec![0.0; 4])])
            .unwrap();
        let windower = FrameWindower::new(&store, "V", "I", 1e-6).unwrap();
        let style = AnimationStyle {
            speedup: 1e-15,
            ..style()
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ivchar.gif");

        let err = render_animation(&path, &windower, &style).unwrap_err();
        assert!(matches!(err, PostError::InvalidFrameRate { fps, .. } if fps == 1e-6));
        assert!(!path.exists());
    }

    #[test]
    fn frame_carries_axis_labels() {
        let store = ChannelStore::from_pairs(2.0, [("V", vec![0.0, 0.0]), ("I", vec![0.0, 0.0])])
            .unwrap();
        let windower = FrameWindower::new(&store, "V", "I", 1.0).unwrap();
        let style = style();
        let img = render_frame(&windower.frame(0).unwrap(), &style);

        let canvas = Canvas::new(style.width, style.height, style.x_range, style.y_range);
        let [left, _, _, bottom] = canvas.plot_area();
        let below = (bottom + 1..i64::from(style.height))
            .any(|y| (left..left + 8).any(|x| *img.get_pixel(x as u32, y as u32) == BLACK));
        assert!(below);
    }
}
