//! # Compositor
//!
//! Draws one layer or one sprite into frame memory, limited to a range of
//! screen rows.
//!
//! ## Layer rows
//!
//! A layer is drawn in bands of rows that share one tile row. Each band is
//! split horizontally at tile boundaries:
//!
//! ```text
//!   window   ├─ lhs ─┼──── tile ────┼──── tile ────┼─ rhs ─┤
//!             partial      whole tiles (mid)        partial
//! ```
//!
//! The block mover drops pixels on moves narrower than `min_blit_width`.
//! Narrow edges are therefore either widened into a neighbour that is drawn
//! afterwards, or copied by the CPU. The shorter edge goes first so the
//! longer one can cover what the widened copy spilled.
//!
//! ## Sprite rows
//!
//! Opaque sprites are one block move from the atlas. Keyed sprites are
//! written row by row from their decoded pattern; rows with key pixels
//! inside the run read the background back and merge it in.

use std::ops::Range;

use crate::config::EngineConfig;
use crate::framebuffer::{BlitTracker, BlockMove, FrameBuffer};
use crate::pattern::{LineKind, PatternEntry};
use crate::scene::{BackgroundLayer, Sprite};

/// Widths of the three parts of a layer row.
///
/// `lhs + mid_tiles * tile_w + rhs` is always the window width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowSplit {
    pub lhs: u16,
    pub mid_tiles: u16,
    pub rhs: u16,
}

impl RowSplit {
    #[must_use]
    pub fn new(scroll_x: u32, tile_w: u16, win_w: u16) -> Self {
        #[allow(clippy::cast_possible_truncation)]
        let phase = (scroll_x % u32::from(tile_w)) as u16;
        let lhs = (tile_w - phase).min(win_w);
        let rest = win_w - lhs;
        Self {
            lhs,
            mid_tiles: rest / tile_w,
            rhs: rest % tile_w,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edge {
    Left,
    Right,
}

/// One horizontal piece of a layer band.
#[derive(Debug, Clone, Copy)]
struct Span {
    /// Window-relative destination column.
    x: u16,
    width: u16,
    /// Tile column in the map, before wrapping.
    column: u32,
    /// First pixel inside the tile.
    tile_off: u16,
}

/// Draws layers and sprites into a [`FrameBuffer`].
#[derive(Debug)]
pub struct Compositor {
    tracker: BlitTracker,
    min_blit: u16,
    filter: bool,
    screen_w: u16,
    screen_h: u16,
    cpu_spans: u32,
}

impl Compositor {
    #[must_use]
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            tracker: BlitTracker::default(),
            min_blit: config.min_blit_width.max(1),
            filter: config.lowpass,
            screen_w: config.screen_width,
            screen_h: config.screen_height,
            cpu_spans: 0,
        }
    }

    pub const fn tracker_mut(&mut self) -> &mut BlitTracker {
        &mut self.tracker
    }

    /// Waits for any block move in flight.
    pub fn settle<F: FrameBuffer + ?Sized>(&mut self, fb: &mut F) {
        self.tracker.settle(fb);
    }

    /// Returns `(block moves, cpu spans)` since the last call.
    pub const fn take_counts(&mut self) -> (u32, u32) {
        let (moves, _) = self.tracker.take_counts();
        let spans = self.cpu_spans;
        self.cpu_spans = 0;
        (moves, spans)
    }

    fn bulk<F: FrameBuffer + ?Sized>(
        &mut self,
        fb: &mut F,
        src: u32,
        dst: u32,
        width: u16,
        height: u16,
    ) {
        let mv = BlockMove::new(src, dst, fb.pitch(), width, height, self.filter);
        self.tracker.issue(fb, &mv);
    }

    /// Copies a rectangle row by row through the CPU.
    fn cpu_copy<F: FrameBuffer + ?Sized>(
        &mut self,
        fb: &mut F,
        src: u32,
        dst: u32,
        width: u16,
        height: u16,
    ) {
        self.tracker.settle(fb);
        let pitch = fb.pitch();
        let mut buf = vec![0; usize::from(width)];
        for r in 0..u32::from(height) {
            fb.read_bytes(src + r * pitch, &mut buf);
            fb.write_bytes(dst + r * pitch, &buf);
        }
        self.cpu_spans += 1;
    }

    /// Draws the part of `layer` that falls on screen rows `rows`.
    pub fn draw_layer<F: FrameBuffer + ?Sized>(
        &mut self,
        fb: &mut F,
        layer: &BackgroundLayer,
        rows: Range<u16>,
    ) {
        if !layer.has_tiles() {
            return;
        }
        let win = layer.window();
        let start = rows.start.max(win.y);
        let end = rows.end.min(win.y + win.h).min(self.screen_h);
        if start >= end || win.w == 0 {
            return;
        }

        let (_, tile_h) = layer.tile_size();
        let (_, extent_h) = layer.extent();
        let (_, scroll_y) = layer.scroll();

        let mut y = start;
        while y < end {
            let ly = (scroll_y + u32::from(y - win.y)) % extent_h;
            #[allow(clippy::cast_possible_truncation)]
            let tile_off = (ly % u32::from(tile_h)) as u16;
            let band = (tile_h - tile_off).min(end - y);
            self.draw_band(fb, layer, ly / u32::from(tile_h), tile_off, y, band);
            y += band;
        }
    }

    /// Draws `height` screen rows starting at `y`, all inside map row
    /// `tile_row` starting `tile_off` pixels into it.
    fn draw_band<F: FrameBuffer + ?Sized>(
        &mut self,
        fb: &mut F,
        layer: &BackgroundLayer,
        tile_row: u32,
        tile_off: u16,
        y: u16,
        height: u16,
    ) {
        let win = layer.window();
        let (tile_w, _) = layer.tile_size();
        let (scroll_x, _) = layer.scroll();
        let split = RowSplit::new(scroll_x, tile_w, win.w);
        let first_column = scroll_x / u32::from(tile_w);
        #[allow(clippy::cast_possible_truncation)]
        let phase = (scroll_x % u32::from(tile_w)) as u16;

        let lhs = Span {
            x: 0,
            width: split.lhs,
            column: first_column,
            tile_off: phase,
        };
        let mid_x = split.lhs;
        let rhs = Span {
            x: mid_x + split.mid_tiles * tile_w,
            width: split.rhs,
            column: first_column + 1 + u32::from(split.mid_tiles),
            tile_off: 0,
        };
        let mid_end = rhs.x;

        let (first, second) = if rhs.width > 0 && rhs.width < lhs.width {
            ((Edge::Right, rhs), (Edge::Left, lhs))
        } else {
            ((Edge::Left, lhs), (Edge::Right, rhs))
        };

        // The first edge may spill into anything drawn after it; the second
        // only into the whole tiles.
        let full = 0..win.w;
        self.draw_edge(fb, layer, first, tile_row, tile_off, y, height, &full);
        self.draw_edge(fb, layer, second, tile_row, tile_off, y, height, &(mid_x..mid_end));

        for i in 0..split.mid_tiles {
            let span = Span {
                x: mid_x + i * tile_w,
                width: tile_w,
                column: first_column + 1 + u32::from(i),
                tile_off: 0,
            };
            let (src, dst) = self.span_addresses(fb, layer, &span, tile_row, tile_off, y, 0);
            if tile_w >= self.min_blit {
                self.bulk(fb, src, dst, tile_w, height);
            } else {
                self.cpu_copy(fb, src, dst, tile_w, height);
            }
        }
    }

    /// Source and destination address of a span, with the copy moved
    /// `shift` pixels to the left.
    #[allow(clippy::too_many_arguments)]
    fn span_addresses<F: FrameBuffer + ?Sized>(
        &self,
        fb: &F,
        layer: &BackgroundLayer,
        span: &Span,
        tile_row: u32,
        tile_off: u16,
        y: u16,
        shift: u16,
    ) -> (u32, u32) {
        let win = layer.window();
        let (ax, ay) = layer.atlas_origin(tile_code(layer, span, tile_row));
        let src = fb.pixel_address(
            ax.saturating_add(span.tile_off).saturating_sub(shift),
            ay.saturating_add(tile_off),
        );
        let dst = fb.pixel_address(win.x + span.x - shift, y);
        (src, dst)
    }

    /// Draws a partial tile at the window edge. A span narrower than the
    /// minimum block move is widened when the extra pixels stay inside
    /// `spill`, otherwise it is copied by the CPU.
    #[allow(clippy::too_many_arguments)]
    fn draw_edge<F: FrameBuffer + ?Sized>(
        &mut self,
        fb: &mut F,
        layer: &BackgroundLayer,
        (edge, span): (Edge, Span),
        tile_row: u32,
        tile_off: u16,
        y: u16,
        height: u16,
        spill: &Range<u16>,
    ) {
        if span.width == 0 {
            return;
        }
        if span.width >= self.min_blit {
            let (src, dst) = self.span_addresses(fb, layer, &span, tile_row, tile_off, y, 0);
            self.bulk(fb, src, dst, span.width, height);
            return;
        }

        let extra = self.min_blit - span.width;
        let widened = match edge {
            Edge::Left => {
                let stray = span.x + span.width..span.x + self.min_blit;
                (stray.end <= spill.end && stray.start >= spill.start).then_some(0)
            }
            Edge::Right => {
                let stray = span.x.checked_sub(extra).map(|s| s..span.x);
                stray
                    .filter(|s| s.start >= spill.start && s.end <= spill.end)
                    .filter(|_| source_column(layer, &span, tile_row) >= extra)
                    .map(|_| extra)
            }
        };

        match widened {
            Some(shift) => {
                let (src, dst) =
                    self.span_addresses(fb, layer, &span, tile_row, tile_off, y, shift);
                self.bulk(fb, src, dst, self.min_blit, height);
            }
            None => {
                let (src, dst) = self.span_addresses(fb, layer, &span, tile_row, tile_off, y, 0);
                self.cpu_copy(fb, src, dst, span.width, height);
            }
        }
    }

    /// Draws the part of `sprite` that falls on screen rows `rows`.
    ///
    /// `entry` is the sprite's decoded pattern; opaque sprites have none.
    pub fn draw_sprite<F: FrameBuffer + ?Sized>(
        &mut self,
        fb: &mut F,
        sprite: &Sprite,
        entry: Option<&PatternEntry>,
        rows: Range<u16>,
    ) {
        let Some(clip) = self.clip_sprite(sprite, &rows) else {
            return;
        };
        if sprite.is_opaque() {
            self.draw_opaque(fb, sprite, &clip);
        } else if let Some(entry) = entry {
            self.draw_keyed(fb, sprite, entry, &clip);
        }
    }

    /// Visible part of a sprite in sprite-relative coordinates.
    fn clip_sprite(&self, sprite: &Sprite, rows: &Range<u16>) -> Option<Clip> {
        let (x, y) = sprite.position();
        let (w, h) = sprite.size();
        let (x, y) = (i32::from(x), i32::from(y));
        let left = (-x).max(0);
        let right = i32::from(w).min(i32::from(self.screen_w) - x);
        let top = (i32::from(rows.start) - y).max(0);
        let bottom = i32::from(h)
            .min(i32::from(rows.end) - y)
            .min(i32::from(self.screen_h) - y);
        if left >= right || top >= bottom {
            return None;
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let (cols, rows) = (left as u16..right as u16, top as u16..bottom as u16);
        Some(Clip {
            cols,
            rows,
            x: x + left,
            y: y + top,
        })
    }

    fn draw_opaque<F: FrameBuffer + ?Sized>(&mut self, fb: &mut F, sprite: &Sprite, clip: &Clip) {
        let desc = sprite.descriptor();
        let (sx, sy) = desc.source();
        let width = clip.cols.end - clip.cols.start;
        let height = clip.rows.end - clip.rows.start;
        let dst = clip.dst(fb, 0);

        if !desc.is_flipped() && width >= self.min_blit {
            let src = fb.pixel_address(
                sx.saturating_add(clip.cols.start),
                sy.saturating_add(clip.rows.start),
            );
            self.bulk(fb, src, dst, width, height);
            return;
        }

        self.tracker.settle(fb);
        let mut row = vec![0; usize::from(desc.w)];
        for r in clip.rows.clone() {
            let src_row = if desc.flip_y { desc.h - 1 - r } else { r };
            let src = fb.pixel_address(sx, sy.saturating_add(src_row));
            fb.read_bytes(src, &mut row);
            if desc.flip_x {
                row.reverse();
            }
            let dst = clip.dst(fb, r - clip.rows.start);
            fb.write_bytes(dst, &row[usize::from(clip.cols.start)..usize::from(clip.cols.end)]);
        }
        self.cpu_spans += 1;
    }

    fn draw_keyed<F: FrameBuffer + ?Sized>(
        &mut self,
        fb: &mut F,
        sprite: &Sprite,
        entry: &PatternEntry,
        clip: &Clip,
    ) {
        let key = sprite.key();
        let mut background = Vec::new();
        for r in clip.rows.clone() {
            let line = entry.line(r);
            let a = line.off.max(clip.cols.start);
            let b = line.end().min(clip.cols.end);
            if a >= b {
                continue;
            }
            let pixels = &entry.row(r)[usize::from(a)..usize::from(b)];
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let (x, y) = (
                (clip.x + i32::from(a - clip.cols.start)) as u16,
                (clip.y + i32::from(r - clip.rows.start)) as u16,
            );
            let dst = fb.pixel_address(x, y);

            self.tracker.settle(fb);
            match line.kind {
                LineKind::Solid => fb.write_bytes(dst, pixels),
                LineKind::Broken => {
                    background.resize(pixels.len(), 0);
                    fb.read_bytes(dst, &mut background);
                    for (bg, &p) in background.iter_mut().zip(pixels) {
                        if p != key {
                            *bg = p;
                        }
                    }
                    fb.write_bytes(dst, &background);
                }
            }
            self.cpu_spans += 1;
        }
    }
}

fn tile_code(layer: &BackgroundLayer, span: &Span, tile_row: u32) -> u8 {
    let (map_w, _) = layer.size();
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    let (tx, ty) = ((span.column % u32::from(map_w)) as i32, tile_row as i32);
    layer.tile_at(tx, ty).map_or(0, |c| c.0)
}

/// Atlas column of the first pixel of `span`.
fn source_column(layer: &BackgroundLayer, span: &Span, tile_row: u32) -> u16 {
    layer
        .atlas_origin(tile_code(layer, span, tile_row))
        .0
        .saturating_add(span.tile_off)
}

/// Visible part of a sprite.
#[derive(Debug)]
struct Clip {
    /// Sprite-relative columns and rows.
    cols: Range<u16>,
    rows: Range<u16>,
    /// Screen position of the first visible pixel.
    x: i32,
    y: i32,
}

impl Clip {
    /// Screen address of the first visible pixel of visible row `r`.
    fn dst<F: FrameBuffer + ?Sized>(&self, fb: &F, r: u16) -> u32 {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let (x, y) = (self.x as u16, (self.y + i32::from(r)) as u16);
        fb.pixel_address(x, y)
    }
}
