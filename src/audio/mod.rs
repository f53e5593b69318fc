//! # Audio Module
//!
//! Per-guild playback sessions for Mokey Music.
//!
//! Every guild that asks for music gets its own session: a FIFO queue, a
//! playback controller and (while something plays) exactly one voice
//! connection. Sessions are independent of each other and are created on the
//! first `/play`, then torn down on `/stop`, on an idle timeout or when the
//! bot is kicked from the voice channel.
//!
//! ## Architecture
//!
//! ### [`registry`] - Session Registry
//! - Maps guild id to its session, creating sessions lazily
//! - Control commands on a guild without a session never create one
//!
//! ### [`session`] - Session Actor
//! - One task per guild; commands and stream completions arrive on a single
//!   channel and are processed strictly in order
//! - Owns the idle timer
//!
//! ### [`player`] - Playback Controller
//! - State machine: `Idle`, `Connecting`, `Playing`, `Paused`, `Disconnected`
//! - The only code that advances the queue; unresolvable or broken entries
//!   are skipped and reported
//!
//! ### [`bridge`] - Completion Bridge
//! - Turns "stream finished" signals raised on Songbird's threads into
//!   session messages; late signals for closed sessions are dropped
//!
//! ### [`pipeline`] / [`songbird_backend`] - Audio Pipeline
//! - Traits for voice connections and streams, plus the Songbird
//!   implementation used in production
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! let registry = SessionRegistry::new(deps);
//!
//! registry.play(guild_id, voice_channel, tracks).await?;
//! registry.pause(guild_id).await;
//! registry.skip(guild_id).await;
//! let queue = registry.list_queue(guild_id).await;
//! registry.stop(guild_id).await;
//! ```

pub mod bridge;
pub mod error;
pub mod events;
pub mod pipeline;
pub mod player;
pub mod queue;
pub mod registry;
pub mod session;
pub mod songbird_backend;

#[cfg(test)]
pub mod testing;

pub use error::{PlaybackError, ResolutionError};
pub use events::{EventSink, NowPlayingDisplay, PlaybackEvent};
pub use registry::SessionRegistry;
pub use session::SessionDeps;
