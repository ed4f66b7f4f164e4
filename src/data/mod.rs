//! Waveform analysis: channel storage, flow summaries, threshold events and animation frames.
pub mod channel_store;
pub mod events;
pub mod frames;
pub mod summary;

pub use channel_store::{Channel, ChannelKey, ChannelStore};
pub use events::{EdgeFilter, EventDetector, EventRecord};
pub use frames::{Frame, FrameWindower, Frames};
pub use summary::{ConditionsSummary, FlowMetrics, RatioPolicy, SummaryAggregator, SummaryValue};
