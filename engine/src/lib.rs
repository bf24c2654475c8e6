//! # Tile/sprite compositing engine
//!
//! Composes scrollable tile layers and keyed sprites into the frame memory of
//! a composite-video output chip. The chip is reached through a
//! [`framebuffer::FrameBuffer`] collaborator that offers byte reads and
//! writes plus an asynchronous hardware block move.
//!
//! ```text
//!  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!  │    Scene     │──►│ PatternCache │──►│  Compositor  │──► FrameBuffer
//!  │layers/sprites│   │ decoded rows │   │ layer/sprite │
//!  └──────┬───────┘   └──────┬───────┘   └──────▲───────┘
//!         │                  │                  │
//!         │           ┌──────▼───────┐   ┌──────┴───────┐
//!         └──────────►│  Collision   │   │  Scheduler   │
//!                     └──────────────┘   └──────────────┘
//! ```
//!
//! [`engine::Engine`] owns all of the above and is the only entry point the
//! host needs.

pub mod collision;
pub mod compositor;
pub mod config;
pub mod direction;
pub mod engine;
pub mod error;
pub mod framebuffer;
pub mod palette;
pub mod pattern;
pub mod present;
pub mod scene;
pub mod scheduler;
pub mod transport;

pub use config::EngineConfig;
pub use engine::Engine;
pub use error::EngineError;

/// Number of background layers.
pub const MAX_BG: usize = 4;
/// Number of sprites.
pub const MAX_SPRITES: usize = 32;
/// Widest sprite, in pixels.
pub const MAX_SPRITE_W: u16 = 32;
/// Tallest sprite, in pixels.
pub const MAX_SPRITE_H: u16 = 32;
/// Highest (drawn last) priority level.
#[allow(clippy::cast_possible_truncation)]
pub const MAX_PRIO: u8 = (MAX_BG - 1) as u8;
/// Smallest tile edge, in pixels.
pub const MIN_TILE_SIZE: u16 = 8;
/// Largest tile edge, in pixels.
pub const MAX_TILE_SIZE: u16 = 32;

/// Device pixel as stored in frame memory. Opaque to the engine.
pub type Pixel = u8;
