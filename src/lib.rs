//! Tunecast - autonomous chat radio
//!
//! A playback scheduler that keeps a station playing: it picks tracks for
//! the current genre, mood or artist, downloads them through a tiered
//! search pipeline backed by a TTL result cache, and publishes them one
//! after another. Listeners steer it through timed genre votes.

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod mode;
pub mod model;
pub mod playlist;
pub mod retrieval;
pub mod scheduler;
pub mod ui;
pub mod voting;

pub use error::{ErrorKind, TunecastError, TunecastResult};
