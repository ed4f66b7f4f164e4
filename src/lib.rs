//! # Burn Test Post-Processing Library
//!
//! This crate turns the captures recorded during a burn test into results:
//! flow conditions, threshold-crossing events and rendered I-V artifacts. The
//! `burn-post` binary is a thin command-line layer over it, so the same logic
//! can be driven from tests or other tools.
//!
//! ## Crate Structure
//!
//! - **`capture`**: The on-disk capture format, its acquisition configuration and
//!   the `CaptureLoader` trait the pipeline reads through.
//! - **`config`**: Layered `PostConfig` (defaults, TOML file, `BURN_POST_` environment).
//! - **`data`**: The analysis engine. `ChannelStore` holds equal-length channels on
//!   one time base; `SummaryAggregator`, `EventDetector` and `FrameWindower` compute
//!   from it.
//! - **`error`**: The `PostError` enum used across the library.
//! - **`pipeline`**: Per-dataset state machine, dataset discovery and the worker pool.
//! - **`render`**: PNG event plots and the GIF phase-plane animation.
//! - **`tracing_setup`**: `tracing-subscriber` initialisation.

pub mod capture;
pub mod config;
pub mod data;
pub mod error;
pub mod pipeline;
pub mod render;
pub mod tracing_setup;
