//! Hand-off between the composition thread and the presenter.
//!
//! ```text
//!   compose ── publish ──► [ pending frame ] ── take_latest / wait_for_frame ──► present
//!                          replaced if unread
//! ```
//!
//! Publishing never waits for the presenter. A frame nobody took before the
//! next one arrived is dropped and counted.

use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::framebuffer::MemoryFrameBuffer;
use crate::scheduler::RenderStats;
use crate::Pixel;

/// A completed copy of the visible area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub pixels: Vec<Pixel>,
    pub width: u16,
    pub height: u16,
    pub stats: RenderStats,
}

impl Frame {
    /// Snapshots the visible area of `fb`.
    #[must_use]
    pub fn capture(fb: &MemoryFrameBuffer, stats: RenderStats) -> Self {
        Self {
            pixels: fb.visible_frame(),
            width: fb.width(),
            height: fb.height(),
            stats,
        }
    }
}

#[derive(Debug, Default)]
struct SlotState {
    pending: Option<Frame>,
    published: u64,
    dropped: u64,
}

#[derive(Debug, Default)]
pub struct FrameSlot {
    state: Mutex<SlotState>,
    ready: Condvar,
}

impl FrameSlot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `frame` the pending frame, replacing one not taken yet.
    pub fn publish(&self, frame: Frame) {
        let mut state = self.state.lock();
        if state.pending.replace(frame).is_some() {
            state.dropped += 1;
            tracing::trace!("presenter fell behind, {} frames dropped", state.dropped);
        }
        state.published += 1;
        drop(state);
        self.ready.notify_one();
    }

    #[must_use]
    pub fn take_latest(&self) -> Option<Frame> {
        self.state.lock().pending.take()
    }

    /// Waits up to `timeout` for a frame to be published.
    #[must_use]
    pub fn wait_for_frame(&self, timeout: Duration) -> Option<Frame> {
        let mut state = self.state.lock();
        self.ready
            .wait_while_for(&mut state, |s| s.pending.is_none(), timeout);
        state.pending.take()
    }

    #[must_use]
    pub fn published(&self) -> u64 {
        self.state.lock().published
    }

    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.state.lock().dropped
    }
}
