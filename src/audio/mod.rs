//! # Audio Module
//!
//! Per-guild playback for the jukebox.
//!
//! ## Architecture
//!
//! ### [`store`] - Guild State
//! - One playback state and one set of properties per guild, created lazily
//! - Each playback state sits behind its own async mutex
//!
//! ### [`queue`] - Queue Management
//! - FIFO queue, current track and the last played track
//! - Playback generations so stale end-of-track events are ignored
//!
//! ### [`player`] - Playback Engine
//! - Starts, stops and skips tracks on a voice connection
//! - Advances the queue when a track ends
//!
//! ### [`autoplay`] - Autoplay
//! - Refills an empty queue with random or similar tracks
//!
//! ### [`voice`] - Voice Connections
//! - Songbird-backed streaming of catalog URLs

pub mod autoplay;
pub mod player;
pub mod queue;
pub mod store;
pub mod voice;
