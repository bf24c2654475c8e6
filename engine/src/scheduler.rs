//! # Render scheduler
//!
//! One call to [`RenderScheduler::run`] is one composition cycle. It runs to
//! completion and keeps no state between calls besides the frameskip gate
//! and the sync line.
//!
//! ```text
//!   frame ≤ last + frameskip ──► Skipped
//!   scene clean ───────────────► Clean
//!   reload pending patterns
//!   pass 0: rows [0, sync)     priority 0..=MAX_PRIO, layers then sprites
//!   read beam line, nudge sync line by at most one
//!   pass 1: rows [sync, h)     same order
//!   ──► Rendered(stats)
//! ```
//!
//! The frame does not fit in vertical blank, so the top part is drawn first
//! and shown while the bottom part is still being drawn. The sync line is a
//! hill climber: it moves up one line when pass 0 ends with the beam already
//! below it, and down one line when pass 0 ends before the visible area
//! starts, always within a third and two thirds of the screen height.

use std::ops::Range;

use serde::Serialize;

use crate::compositor::Compositor;
use crate::config::EngineConfig;
use crate::framebuffer::FrameBuffer;
use crate::pattern::PatternCache;
use crate::scene::Scene;
use crate::MAX_PRIO;

/// Counters of one rendered cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RenderStats {
    pub frame: u32,
    /// Line where pass 1 started.
    pub split: u16,
    /// Beam line read after pass 0.
    pub beam_after_top: u16,
    /// Split line for the next cycle.
    pub next_sync_line: u16,
    pub layers_drawn: u32,
    pub sprites_drawn: u32,
    pub reload_failures: u32,
    pub block_moves: u32,
    pub cpu_spans: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutcome {
    /// Too soon after the last cycle.
    Skipped,
    /// Nothing changed since the last cycle.
    Clean,
    Rendered(RenderStats),
}

#[derive(Debug)]
pub struct RenderScheduler {
    frameskip: u32,
    last_frame: Option<u32>,
    sync_line: u16,
    sync_bounds: (u16, u16),
    screen_h: u16,
}

impl RenderScheduler {
    #[must_use]
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            frameskip: config.frameskip,
            last_frame: None,
            sync_line: config.initial_sync_line(),
            sync_bounds: config.sync_bounds(),
            screen_h: config.screen_height,
        }
    }

    #[must_use]
    pub const fn frameskip(&self) -> u32 {
        self.frameskip
    }

    pub const fn set_frameskip(&mut self, frameskip: u32) {
        self.frameskip = frameskip;
    }

    #[must_use]
    pub const fn sync_line(&self) -> u16 {
        self.sync_line
    }

    #[must_use]
    pub const fn last_frame(&self) -> Option<u32> {
        self.last_frame
    }

    /// Whether a cycle may run at `frame`. Records `frame` when it may.
    fn gate(&mut self, frame: u32) -> bool {
        if let Some(last) = self.last_frame
            && frame.wrapping_sub(last) <= self.frameskip
        {
            return false;
        }
        self.last_frame = Some(frame);
        true
    }

    /// Moves the sync line by at most one according to where the beam was
    /// when pass 0 finished.
    fn adapt(&mut self, beam: u16) {
        let (lo, hi) = self.sync_bounds;
        if beam < self.screen_h {
            if beam >= self.sync_line && self.sync_line > lo {
                self.sync_line -= 1;
                tracing::debug!("late at line {beam}, sync line up to {}", self.sync_line);
            }
        } else if self.sync_line < hi {
            self.sync_line += 1;
            tracing::debug!("early, sync line down to {}", self.sync_line);
        }
    }

    /// Runs one composition cycle.
    pub fn run<F: FrameBuffer + ?Sized>(
        &mut self,
        fb: &mut F,
        scene: &mut Scene,
        cache: &mut PatternCache,
        compositor: &mut Compositor,
    ) -> RenderOutcome {
        let frame = fb.frame();
        if !self.gate(frame) {
            return RenderOutcome::Skipped;
        }
        if !scene.take_dirty() {
            return RenderOutcome::Clean;
        }

        let mut stats = RenderStats {
            frame,
            ..RenderStats::default()
        };

        compositor.settle(fb);
        compositor.take_counts();
        stats.reload_failures = reload_pending(fb, scene, cache, compositor, frame);

        let split = self.sync_line;
        draw_pass(fb, scene, cache, compositor, 0..split);
        let beam = fb.current_line();
        self.adapt(beam);
        draw_pass(fb, scene, cache, compositor, split..self.screen_h);

        for sprite in scene.sprites().iter().filter(|s| s.is_enabled()) {
            if let Some(h) = sprite.pattern() {
                cache.touch(h, frame);
            }
        }

        let (moves, spans) = compositor.take_counts();
        stats.split = split;
        stats.beam_after_top = beam;
        stats.next_sync_line = self.sync_line;
        stats.layers_drawn = count(
            scene
                .layers()
                .iter()
                .filter(|l| l.is_enabled() && l.has_tiles()),
        );
        stats.sprites_drawn = count(
            scene
                .sprites()
                .iter()
                .filter(|s| s.is_enabled() && (s.is_opaque() || s.pattern().is_some())),
        );
        stats.block_moves = moves;
        stats.cpu_spans = spans;
        tracing::trace!("rendered frame {frame}: {stats:?}");
        RenderOutcome::Rendered(stats)
    }
}

fn count<T>(iter: impl Iterator<Item = T>) -> u32 {
    u32::try_from(iter.count()).unwrap_or(u32::MAX)
}

/// Reloads the pattern of every enabled sprite that needs it. Sprites whose
/// pattern cannot be cached are disabled. Returns how many failed.
pub(crate) fn reload_pending<F: FrameBuffer + ?Sized>(
    fb: &mut F,
    scene: &mut Scene,
    cache: &mut PatternCache,
    compositor: &mut Compositor,
    frame: u32,
) -> u32 {
    let mut failures = 0;
    for i in 0..scene.sprites().len() {
        let Ok(sprite) = scene.sprite_mut(i) else {
            continue;
        };
        if !sprite.is_enabled() || !sprite.must_reload() {
            continue;
        }
        if let Err(e) = cache.reload_sprite(fb, compositor.tracker_mut(), sprite, frame) {
            tracing::warn!("sprite {i} disabled: {e}");
            failures += 1;
        }
    }
    failures
}

/// Draws everything enabled, restricted to `rows`.
fn draw_pass<F: FrameBuffer + ?Sized>(
    fb: &mut F,
    scene: &Scene,
    cache: &PatternCache,
    compositor: &mut Compositor,
    rows: Range<u16>,
) {
    if rows.is_empty() {
        return;
    }
    for priority in 0..=MAX_PRIO {
        for layer in scene
            .layers()
            .iter()
            .filter(|l| l.is_enabled() && l.priority() == priority)
        {
            compositor.draw_layer(fb, layer, rows.clone());
        }
        for &i in scene.draw_order() {
            let sprite = &scene.sprites()[i];
            if !sprite.is_enabled() || sprite.priority() != priority {
                continue;
            }
            let entry = sprite.pattern().and_then(|h| cache.entry(h));
            compositor.draw_sprite(fb, sprite, entry, rows.clone());
        }
    }
}
