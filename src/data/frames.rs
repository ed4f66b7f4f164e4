//! Fixed-size, non-overlapping windows of two channels for animation.
//!
//! The frame rate comes from the burn capture's hardware configuration (the
//! analog output frequency), so each animation frame shows exactly one period
//! of the excitation. It is passed in rather than looked up here.

use crate::data::channel_store::{ChannelKey, ChannelStore};
use crate::error::{AppResult, PostError};
use std::iter::FusedIterator;

/// One window of the X and Y channels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame<'a> {
    /// Zero-based frame number.
    pub index: usize,
    /// First sample index covered by the window.
    pub start: usize,
    /// Time of the first sample, for the frame label.
    pub start_time: f64,
    /// X samples of the window.
    pub x: &'a [f64],
    /// Y samples of the window.
    pub y: &'a [f64],
}

/// Splits a pair of channels into `floor(N / samples_per_frame)` windows.
///
/// The trailing partial window, if any, is discarded. Iterating a windower
/// (by reference) is lazy and can be repeated any number of times.
#[derive(Debug, Clone)]
pub struct FrameWindower<'a> {
    x: &'a [f64],
    y: &'a [f64],
    time: &'a [f64],
    samples_per_frame: usize,
    sample_rate: f64,
    fps: f64,
}

impl<'a> FrameWindower<'a> {
    /// Window the `x` and `y` channels of `store` at `fps` frames per second.
    ///
    /// # Errors
    ///
    /// - [`PostError::InvalidFrameRate`] if `fps` is not positive and finite or
    ///   exceeds the sample rate (so a frame would hold no samples).
    /// - [`PostError::MissingChannel`] if either channel is absent.
    pub fn new(
        store: &'a ChannelStore,
        x: impl Into<ChannelKey>,
        y: impl Into<ChannelKey>,
        fps: f64,
    ) -> AppResult<Self> {
        let samples_per_frame = samples_per_frame(store.sample_rate(), fps)?;
        Ok(Self {
            x: store.channel(x)?,
            y: store.channel(y)?,
            time: store.time(),
            samples_per_frame,
            sample_rate: store.sample_rate(),
            fps,
        })
    }

    /// Samples in each frame.
    pub fn samples_per_frame(&self) -> usize {
        self.samples_per_frame
    }

    /// Sample rate of the windowed channels.
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Frame rate the windows were cut for.
    pub fn fps(&self) -> f64 {
        self.fps
    }

    /// Number of complete frames.
    pub fn frame_count(&self) -> usize {
        self.time.len() / self.samples_per_frame
    }

    /// Lazy iterator over the frames.
    pub fn frames(&self) -> Frames<'a> {
        Frames {
            windower: self.clone(),
            next: 0,
            end: self.frame_count(),
        }
    }

    /// Frame `index`, if it is complete.
    pub fn frame(&self, index: usize) -> Option<Frame<'a>> {
        if index >= self.frame_count() {
            return None;
        }
        let start = index * self.samples_per_frame;
        let stop = start + self.samples_per_frame;
        Some(Frame {
            index,
            start,
            start_time: self.time[start],
            x: &self.x[start..stop],
            y: &self.y[start..stop],
        })
    }
}

impl<'a> IntoIterator for &FrameWindower<'a> {
    type Item = Frame<'a>;
    type IntoIter = Frames<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.frames()
    }
}

/// Iterator returned by [`FrameWindower::frames`].
#[derive(Debug, Clone)]
pub struct Frames<'a> {
    windower: FrameWindower<'a>,
    next: usize,
    end: usize,
}

impl<'a> Iterator for Frames<'a> {
    type Item = Frame<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.end {
            return None;
        }
        let frame = self.windower.frame(self.next);
        self.next += 1;
        frame
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.end - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Frames<'_> {}
impl FusedIterator for Frames<'_> {}

/// `floor(sample_rate / fps)`, rejecting rates that give empty frames or a
/// frame length no index can address.
pub fn samples_per_frame(sample_rate: f64, fps: f64) -> AppResult<usize> {
    let invalid = || PostError::InvalidFrameRate { sample_rate, fps };
    if !fps.is_finite() || fps <= 0.0 {
        return Err(invalid());
    }
    let per_frame = (sample_rate / fps).floor();
    if !per_frame.is_finite() || per_frame < 1.0 || per_frame >= usize::MAX as f64 {
        return Err(invalid());
    }
    Ok(per_frame as usize)
}
