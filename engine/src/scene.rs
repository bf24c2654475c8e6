//! # Scene model
//!
//! Background layers and sprites plus the single "composition dirty" flag
//! that decides whether the scheduler has any work to do.
//!
//! ## Background layer geometry
//!
//! ```text
//!  layer space (w * tile_w by h * tile_h pixels, wraps both ways)
//!  ┌──────────────────────────────────────┐
//!  │   scroll ┌───────────────┐           │
//!  │     ────►│ win_w x win_h │           │     screen
//!  │          └───────────────┘           │   ┌─────────────┐
//!  │                                      │   │ (win_x,win_y)
//!  └──────────────────────────────────────┘   │   ┌───────┐ │
//!                                             │   │       │ │
//!                                             │   └───────┘ │
//!                                             └─────────────┘
//! ```
//!
//! Layer-space point `(scroll_x, scroll_y)` appears at screen point
//! `(win_x, win_y)`. Tile code `c` is read from the atlas cell
//! `(pat_x + (c % pat_w) * tile_w, pat_y + (c / pat_w) * tile_h)`.
//!
//! Setters that store the value already present leave the scene clean.

use serde::{Deserialize, Serialize};

use crate::direction::Bounds;
use crate::pattern::PatternHandle;
use crate::{
    EngineError, MAX_BG, MAX_PRIO, MAX_SPRITE_H, MAX_SPRITE_W, MAX_SPRITES, MAX_TILE_SIZE,
    MIN_TILE_SIZE, Pixel, error::EntityKind,
};

/// Code stored in a tile-map cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCode(pub u8);

impl TileCode {
    /// Fill value of a freshly sized map. Still drawn as atlas cell 255.
    pub const NONE: Self = Self(0xff);

    #[must_use]
    pub const fn is_none(self) -> bool {
        self.0 == Self::NONE.0
    }
}

/// On-screen rectangle a layer is drawn into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Window {
    pub x: u16,
    pub y: u16,
    pub w: u16,
    pub h: u16,
}

#[derive(Debug, Clone)]
pub struct BackgroundLayer {
    tiles: Vec<u8>,
    w: u16,
    h: u16,
    tile_w: u16,
    tile_h: u16,
    pat_x: u16,
    pat_y: u16,
    pat_w: u16,
    scroll_x: u32,
    scroll_y: u32,
    window: Window,
    enabled: bool,
    priority: u8,
    remap: Option<Box<[u8; 256]>>,
}

impl BackgroundLayer {
    fn with_defaults(index: usize, screen_w: u16, screen_h: u16) -> Self {
        #[allow(clippy::cast_possible_truncation)]
        let priority = index.min(usize::from(MAX_PRIO)) as u8;
        Self {
            tiles: Vec::new(),
            w: 0,
            h: 0,
            tile_w: MIN_TILE_SIZE,
            tile_h: MIN_TILE_SIZE,
            pat_x: 0,
            pat_y: screen_h.saturating_add(8),
            pat_w: (screen_w / MIN_TILE_SIZE).max(1),
            scroll_x: 0,
            scroll_y: 0,
            window: Window {
                x: 0,
                y: 0,
                w: screen_w,
                h: screen_h,
            },
            enabled: false,
            priority,
            remap: None,
        }
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[must_use]
    pub const fn has_tiles(&self) -> bool {
        !self.tiles.is_empty()
    }

    /// Map size in tiles.
    #[must_use]
    pub const fn size(&self) -> (u16, u16) {
        (self.w, self.h)
    }

    #[must_use]
    pub const fn tile_size(&self) -> (u16, u16) {
        (self.tile_w, self.tile_h)
    }

    /// Atlas origin and row stride in tiles.
    #[must_use]
    pub const fn pattern(&self) -> (u16, u16, u16) {
        (self.pat_x, self.pat_y, self.pat_w)
    }

    #[must_use]
    pub const fn scroll(&self) -> (u32, u32) {
        (self.scroll_x, self.scroll_y)
    }

    #[must_use]
    pub const fn window(&self) -> Window {
        self.window
    }

    #[must_use]
    pub const fn priority(&self) -> u8 {
        self.priority
    }

    /// Map size in pixels.
    #[must_use]
    pub const fn extent(&self) -> (u32, u32) {
        (
            self.w as u32 * self.tile_w as u32,
            self.h as u32 * self.tile_h as u32,
        )
    }

    /// Tile at map coordinates, wrapping in both directions.
    #[must_use]
    pub fn tile_at(&self, x: i32, y: i32) -> Option<TileCode> {
        self.tile_index(x, y).map(|i| TileCode(self.tiles[i]))
    }

    /// Raw tile codes, row-major.
    #[must_use]
    pub fn tiles(&self) -> &[u8] {
        &self.tiles
    }

    pub(crate) fn tile_index(&self, x: i32, y: i32) -> Option<usize> {
        if self.tiles.is_empty() {
            return None;
        }
        let tx = x.rem_euclid(i32::from(self.w));
        let ty = y.rem_euclid(i32::from(self.h));
        usize::try_from(tx + ty * i32::from(self.w)).ok()
    }

    /// Top-left atlas pixel of a tile code.
    #[must_use]
    pub const fn atlas_origin(&self, code: u8) -> (u16, u16) {
        let code = code as u16;
        (
            self.pat_x
                .saturating_add((code % self.pat_w).saturating_mul(self.tile_w)),
            self.pat_y
                .saturating_add((code / self.pat_w).saturating_mul(self.tile_h)),
        )
    }

    fn remapped(&self, code: u8) -> u8 {
        self.remap
            .as_ref()
            .map_or(code, |table| table[usize::from(code)])
    }

    /// Reduces the scroll offset into the current map extent.
    fn rewrap_scroll(&mut self) {
        let (ew, eh) = self.extent();
        self.scroll_x = if ew == 0 { 0 } else { self.scroll_x % ew };
        self.scroll_y = if eh == 0 { 0 } else { self.scroll_y % eh };
    }
}

/// Everything that determines a sprite's decoded pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpriteDescriptor {
    pub pat_x: u16,
    pub pat_y: u16,
    pub w: u16,
    pub h: u16,
    pub frame_x: u16,
    pub frame_y: u16,
    pub flip_x: bool,
    pub flip_y: bool,
    pub key: Pixel,
}

impl Default for SpriteDescriptor {
    fn default() -> Self {
        Self {
            pat_x: 0,
            pat_y: 0,
            w: 8,
            h: 8,
            frame_x: 0,
            frame_y: 0,
            flip_x: false,
            flip_y: false,
            key: 0,
        }
    }
}

impl SpriteDescriptor {
    /// Atlas pixel of the top-left corner of the current frame.
    #[must_use]
    pub const fn source(&self) -> (u16, u16) {
        (
            self.pat_x.saturating_add(self.frame_x.saturating_mul(self.w)),
            self.pat_y.saturating_add(self.frame_y.saturating_mul(self.h)),
        )
    }

    #[must_use]
    pub const fn is_flipped(&self) -> bool {
        self.flip_x || self.flip_y
    }
}

#[derive(Debug, Clone)]
pub struct Sprite {
    x: i16,
    y: i16,
    desc: SpriteDescriptor,
    force_opaque: bool,
    opaque: bool,
    enabled: bool,
    priority: u8,
    pattern: Option<PatternHandle>,
    must_reload: bool,
}

impl Default for Sprite {
    fn default() -> Self {
        Self {
            x: 0,
            y: 0,
            desc: SpriteDescriptor::default(),
            force_opaque: false,
            opaque: false,
            enabled: false,
            priority: MAX_PRIO,
            pattern: None,
            must_reload: false,
        }
    }
}

impl Sprite {
    #[must_use]
    pub const fn position(&self) -> (i16, i16) {
        (self.x, self.y)
    }

    #[must_use]
    pub const fn descriptor(&self) -> &SpriteDescriptor {
        &self.desc
    }

    #[must_use]
    pub const fn size(&self) -> (u16, u16) {
        (self.desc.w, self.desc.h)
    }

    #[must_use]
    pub const fn frame(&self) -> (u16, u16) {
        (self.desc.frame_x, self.desc.frame_y)
    }

    #[must_use]
    pub const fn flips(&self) -> (bool, bool) {
        (self.desc.flip_x, self.desc.flip_y)
    }

    #[must_use]
    pub const fn key(&self) -> Pixel {
        self.desc.key
    }

    /// Drawn as a plain rectangle, either on request or because its
    /// pattern has no key pixels.
    #[must_use]
    pub const fn is_opaque(&self) -> bool {
        self.opaque
    }

    /// Opaque because the caller asked for it.
    #[must_use]
    pub const fn is_forced_opaque(&self) -> bool {
        self.force_opaque
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[must_use]
    pub const fn priority(&self) -> u8 {
        self.priority
    }

    #[must_use]
    pub const fn pattern(&self) -> Option<PatternHandle> {
        self.pattern
    }

    #[must_use]
    pub const fn must_reload(&self) -> bool {
        self.must_reload
    }

    #[must_use]
    pub fn bounds(&self) -> Bounds {
        Bounds::new(
            i32::from(self.x),
            i32::from(self.y),
            i32::from(self.desc.w),
            i32::from(self.desc.h),
        )
    }

    /// Records the outcome of a pattern reload.
    pub(crate) const fn bind(&mut self, pattern: Option<PatternHandle>, opaque: bool) {
        self.pattern = pattern;
        self.opaque = opaque;
        self.must_reload = false;
    }

    pub(crate) const fn take_pattern(&mut self) -> Option<PatternHandle> {
        self.pattern.take()
    }

    pub(crate) const fn force_disable(&mut self) {
        self.enabled = false;
    }
}

#[allow(clippy::cast_possible_truncation)]
fn identity_table() -> Box<[u8; 256]> {
    Box::new(std::array::from_fn(|i| i as u8))
}

fn check_priority(priority: u8) -> Result<(), EngineError> {
    if priority > MAX_PRIO {
        return Err(EngineError::InvalidSize {
            what: "priority",
            value: u16::from(priority),
        });
    }
    Ok(())
}

/// All layers and sprites of one screen.
#[derive(Debug, Clone)]
pub struct Scene {
    layers: [BackgroundLayer; MAX_BG],
    sprites: [Sprite; MAX_SPRITES],
    order: Vec<usize>,
    dirty: bool,
    screen_w: u16,
    screen_h: u16,
}

impl Scene {
    #[must_use]
    pub fn new(screen_w: u16, screen_h: u16) -> Self {
        Self {
            layers: std::array::from_fn(|i| BackgroundLayer::with_defaults(i, screen_w, screen_h)),
            sprites: std::array::from_fn(|_| Sprite::default()),
            order: (0..MAX_SPRITES).collect(),
            dirty: true,
            screen_w,
            screen_h,
        }
    }

    #[must_use]
    pub const fn screen_size(&self) -> (u16, u16) {
        (self.screen_w, self.screen_h)
    }

    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub const fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Clears the dirty flag, returning its previous value.
    pub(crate) const fn take_dirty(&mut self) -> bool {
        let dirty = self.dirty;
        self.dirty = false;
        dirty
    }

    #[must_use]
    pub fn layer(&self, index: usize) -> Option<&BackgroundLayer> {
        self.layers.get(index)
    }

    #[must_use]
    pub fn layers(&self) -> &[BackgroundLayer] {
        &self.layers
    }

    #[must_use]
    pub fn sprite(&self, index: usize) -> Option<&Sprite> {
        self.sprites.get(index)
    }

    #[must_use]
    pub fn sprites(&self) -> &[Sprite] {
        &self.sprites
    }

    /// Sprite indices in drawing order: ascending y, ties by index.
    #[must_use]
    pub fn draw_order(&self) -> &[usize] {
        &self.order
    }

    fn layer_mut(&mut self, index: usize) -> Result<&mut BackgroundLayer, EngineError> {
        self.layers
            .get_mut(index)
            .ok_or(EngineError::layer(index))
    }

    pub(crate) fn sprite_mut(&mut self, index: usize) -> Result<&mut Sprite, EngineError> {
        self.sprites
            .get_mut(index)
            .ok_or(EngineError::sprite(index))
    }

    fn resort(&mut self) {
        let sprites = &self.sprites;
        self.order.sort_by_key(|&i| (sprites[i].y, i));
    }

    // Layers

    /// Turns a layer on. A layer without a tile map stays off.
    pub fn enable_layer(&mut self, index: usize) -> Result<(), EngineError> {
        let layer = self.layer_mut(index)?;
        if layer.enabled || !layer.has_tiles() {
            return Ok(());
        }
        layer.enabled = true;
        self.dirty = true;
        Ok(())
    }

    pub fn disable_layer(&mut self, index: usize) -> Result<(), EngineError> {
        let layer = self.layer_mut(index)?;
        if !layer.enabled {
            return Ok(());
        }
        layer.enabled = false;
        self.dirty = true;
        Ok(())
    }

    /// Releases the tile map and turns the layer off.
    pub fn free_layer(&mut self, index: usize) -> Result<(), EngineError> {
        let layer = self.layer_mut(index)?;
        layer.tiles = Vec::new();
        layer.w = 0;
        layer.h = 0;
        layer.scroll_x = 0;
        layer.scroll_y = 0;
        layer.remap = None;
        layer.enabled = false;
        self.dirty = true;
        Ok(())
    }

    /// Reallocates the tile map with every cell set to [`TileCode::NONE`].
    ///
    /// The layer ends up disabled with scroll at the origin and the window
    /// covering the whole screen. If the map cannot be allocated the layer
    /// is left without tiles.
    pub fn set_layer_size(&mut self, index: usize, w: u16, h: u16) -> Result<(), EngineError> {
        let (screen_w, screen_h) = (self.screen_w, self.screen_h);
        let layer = self.layer_mut(index)?;
        if w == 0 || h == 0 {
            return Err(EngineError::InvalidSize {
                what: "tile map",
                value: w.min(h),
            });
        }

        layer.enabled = false;
        layer.tiles = Vec::new();
        layer.w = 0;
        layer.h = 0;
        layer.scroll_x = 0;
        layer.scroll_y = 0;
        layer.window = Window {
            x: 0,
            y: 0,
            w: screen_w,
            h: screen_h,
        };
        self.dirty = true;

        let cells = usize::from(w) * usize::from(h);
        let mut tiles = Vec::new();
        if tiles.try_reserve_exact(cells).is_err() {
            tracing::warn!("cannot allocate {w}x{h} tile map for layer {index}");
            return Err(EngineError::OutOfMemory { what: "tile map" });
        }
        tiles.resize(cells, TileCode::NONE.0);

        let layer = &mut self.layers[index];
        layer.tiles = tiles;
        layer.w = w;
        layer.h = h;
        Ok(())
    }

    pub fn set_layer_tile_size(
        &mut self,
        index: usize,
        tile_w: u16,
        tile_h: u16,
    ) -> Result<(), EngineError> {
        let layer = self.layer_mut(index)?;
        for (what, value) in [("tile width", tile_w), ("tile height", tile_h)] {
            if !(MIN_TILE_SIZE..=MAX_TILE_SIZE).contains(&value) {
                return Err(EngineError::InvalidSize { what, value });
            }
        }
        if layer.tile_size() == (tile_w, tile_h) {
            return Ok(());
        }
        layer.tile_w = tile_w;
        layer.tile_h = tile_h;
        layer.rewrap_scroll();
        self.dirty = true;
        Ok(())
    }

    /// Sets the atlas origin of tile code 0 and how many tiles an atlas row
    /// holds.
    pub fn set_layer_pattern(
        &mut self,
        index: usize,
        pat_x: u16,
        pat_y: u16,
        pat_w: u16,
    ) -> Result<(), EngineError> {
        let layer = self.layer_mut(index)?;
        if pat_w == 0 {
            return Err(EngineError::InvalidSize {
                what: "pattern width",
                value: 0,
            });
        }
        if layer.pattern() == (pat_x, pat_y, pat_w) {
            return Ok(());
        }
        layer.pat_x = pat_x;
        layer.pat_y = pat_y;
        layer.pat_w = pat_w;
        self.dirty = true;
        Ok(())
    }

    /// Sets the on-screen window, clipped to the screen.
    pub fn set_layer_window(
        &mut self,
        index: usize,
        x: u16,
        y: u16,
        w: u16,
        h: u16,
    ) -> Result<(), EngineError> {
        let (screen_w, screen_h) = (self.screen_w, self.screen_h);
        let layer = self.layer_mut(index)?;
        let x = x.min(screen_w);
        let y = y.min(screen_h);
        let window = Window {
            x,
            y,
            w: w.min(screen_w - x),
            h: h.min(screen_h - y),
        };
        if layer.window == window {
            return Ok(());
        }
        layer.window = window;
        self.dirty = true;
        Ok(())
    }

    pub fn set_layer_priority(&mut self, index: usize, priority: u8) -> Result<(), EngineError> {
        let layer = self.layer_mut(index)?;
        check_priority(priority)?;
        if layer.priority == priority {
            return Ok(());
        }
        layer.priority = priority;
        self.dirty = true;
        Ok(())
    }

    /// Scrolls to the given offset, reduced modulo the map extent.
    pub fn scroll_layer(&mut self, index: usize, x: i32, y: i32) -> Result<(), EngineError> {
        let layer = self.layer_mut(index)?;
        let (ew, eh) = layer.extent();
        let wrap = |v: i32, extent: u32| -> u32 {
            if extent == 0 {
                0
            } else {
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let r = i64::from(v).rem_euclid(i64::from(extent)) as u32;
                r
            }
        };
        let (sx, sy) = (wrap(x, ew), wrap(y, eh));
        if layer.scroll() == (sx, sy) {
            return Ok(());
        }
        layer.scroll_x = sx;
        layer.scroll_y = sy;
        self.dirty = true;
        Ok(())
    }

    /// Writes one tile through the remap table. Coordinates wrap.
    pub fn set_layer_tile(
        &mut self,
        index: usize,
        x: i32,
        y: i32,
        code: u8,
    ) -> Result<(), EngineError> {
        let layer = self.layer_mut(index)?;
        let cell = layer.tile_index(x, y).ok_or(EngineError::InvalidIndex {
            kind: EntityKind::Tile,
            index,
        })?;
        let code = layer.remapped(code);
        if layer.tiles[cell] == code {
            return Ok(());
        }
        layer.tiles[cell] = code;
        self.dirty = true;
        Ok(())
    }

    /// Writes consecutive tiles along row `y` starting at column `x`,
    /// wrapping around the right edge of the map.
    pub fn set_layer_tiles(
        &mut self,
        index: usize,
        x: i32,
        y: i32,
        codes: &[u8],
    ) -> Result<(), EngineError> {
        let layer = self.layer_mut(index)?;
        if !layer.has_tiles() {
            return Err(EngineError::InvalidIndex {
                kind: EntityKind::Tile,
                index,
            });
        }
        let mut changed = false;
        let mut tx = x;
        for &code in codes {
            if let Some(cell) = layer.tile_index(tx, y) {
                let code = layer.remapped(code);
                changed |= layer.tiles[cell] != code;
                layer.tiles[cell] = code;
            }
            tx = tx.wrapping_add(1);
        }
        if changed {
            self.dirty = true;
        }
        Ok(())
    }

    /// Makes future tile writes of `from` store `to` instead.
    pub fn map_layer_tile(&mut self, index: usize, from: u8, to: u8) -> Result<(), EngineError> {
        let layer = self.layer_mut(index)?;
        let table = layer.remap.get_or_insert_with(identity_table);
        table[usize::from(from)] = to;
        Ok(())
    }

    pub fn reset_layers(&mut self) {
        let (w, h) = (self.screen_w, self.screen_h);
        for (i, layer) in self.layers.iter_mut().enumerate() {
            *layer = BackgroundLayer::with_defaults(i, w, h);
        }
        self.dirty = true;
    }

    // Sprites

    /// Sets the atlas origin of the sprite's frames and rewinds to frame 0.
    pub fn set_sprite_pattern(
        &mut self,
        index: usize,
        pat_x: u16,
        pat_y: u16,
    ) -> Result<(), EngineError> {
        let sprite = self.sprite_mut(index)?;
        let d = &mut sprite.desc;
        if (d.pat_x, d.pat_y, d.frame_x, d.frame_y) == (pat_x, pat_y, 0, 0) {
            return Ok(());
        }
        d.pat_x = pat_x;
        d.pat_y = pat_y;
        d.frame_x = 0;
        d.frame_y = 0;
        sprite.must_reload = true;
        self.dirty = true;
        Ok(())
    }

    pub fn resize_sprite(&mut self, index: usize, w: u16, h: u16) -> Result<(), EngineError> {
        let sprite = self.sprite_mut(index)?;
        if w == 0 || w > MAX_SPRITE_W {
            return Err(EngineError::InvalidSize {
                what: "sprite width",
                value: w,
            });
        }
        if h == 0 || h > MAX_SPRITE_H {
            return Err(EngineError::InvalidSize {
                what: "sprite height",
                value: h,
            });
        }
        if sprite.size() == (w, h) {
            return Ok(());
        }
        sprite.desc.w = w;
        sprite.desc.h = h;
        sprite.must_reload = true;
        self.dirty = true;
        Ok(())
    }

    pub fn set_sprite_frame(
        &mut self,
        index: usize,
        frame_x: u16,
        frame_y: u16,
        flip_x: bool,
        flip_y: bool,
    ) -> Result<(), EngineError> {
        let sprite = self.sprite_mut(index)?;
        let d = &mut sprite.desc;
        if (d.frame_x, d.frame_y, d.flip_x, d.flip_y) == (frame_x, frame_y, flip_x, flip_y) {
            return Ok(());
        }
        d.frame_x = frame_x;
        d.frame_y = frame_y;
        d.flip_x = flip_x;
        d.flip_y = flip_y;
        sprite.must_reload = true;
        self.dirty = true;
        Ok(())
    }

    /// Sets the transparent device pixel.
    pub fn set_sprite_key(&mut self, index: usize, key: Pixel) -> Result<(), EngineError> {
        let sprite = self.sprite_mut(index)?;
        if sprite.desc.key == key {
            return Ok(());
        }
        sprite.desc.key = key;
        sprite.must_reload = true;
        self.dirty = true;
        Ok(())
    }

    /// Forces plain rectangle drawing on or off. Turning it on hands back
    /// the pattern the sprite held.
    pub(crate) fn set_sprite_opaque(
        &mut self,
        index: usize,
        opaque: bool,
    ) -> Result<Option<PatternHandle>, EngineError> {
        let sprite = self.sprite_mut(index)?;
        if sprite.force_opaque == opaque {
            return Ok(None);
        }
        sprite.force_opaque = opaque;
        sprite.must_reload = true;
        let released = if opaque {
            sprite.opaque = true;
            sprite.pattern.take()
        } else {
            None
        };
        self.dirty = true;
        Ok(released)
    }

    pub fn set_sprite_priority(&mut self, index: usize, priority: u8) -> Result<(), EngineError> {
        let sprite = self.sprite_mut(index)?;
        check_priority(priority)?;
        if sprite.priority == priority {
            return Ok(());
        }
        sprite.priority = priority;
        self.dirty = true;
        Ok(())
    }

    pub fn move_sprite(&mut self, index: usize, x: i16, y: i16) -> Result<(), EngineError> {
        let sprite = self.sprite_mut(index)?;
        if sprite.position() == (x, y) {
            return Ok(());
        }
        let moved_y = sprite.y != y;
        sprite.x = x;
        sprite.y = y;
        if moved_y {
            self.resort();
        }
        self.dirty = true;
        Ok(())
    }

    /// Turns a sprite on. Its pattern is reloaded before the next draw.
    pub fn enable_sprite(&mut self, index: usize) -> Result<(), EngineError> {
        let sprite = self.sprite_mut(index)?;
        if sprite.enabled {
            return Ok(());
        }
        sprite.enabled = true;
        sprite.must_reload = true;
        self.dirty = true;
        Ok(())
    }

    /// Turns a sprite off, keeping its pattern.
    pub fn disable_sprite(&mut self, index: usize) -> Result<(), EngineError> {
        let sprite = self.sprite_mut(index)?;
        if !sprite.enabled {
            return Ok(());
        }
        sprite.enabled = false;
        self.dirty = true;
        Ok(())
    }

    /// Restores every sprite to its defaults, handing back held patterns.
    pub(crate) fn reset_sprites(&mut self) -> Vec<PatternHandle> {
        let released = self
            .sprites
            .iter_mut()
            .filter_map(Sprite::take_pattern)
            .collect();
        for sprite in &mut self.sprites {
            *sprite = Sprite::default();
        }
        self.order = (0..MAX_SPRITES).collect();
        self.dirty = true;
        released
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rand::{Rng, SeedableRng, rngs::StdRng};

    fn scene() -> Scene {
        Scene::new(320, 216)
    }

    #[test]
    fn layer_defaults() {
        let scene = scene();
        for (i, layer) in scene.layers().iter().enumerate() {
            assert!(!layer.is_enabled());
            assert_eq!(layer.tile_size(), (8, 8));
            assert_eq!(layer.pattern(), (0, 224, 40));
            assert_eq!(usize::from(layer.priority()), i);
            assert_eq!(
                layer.window(),
                Window {
                    x: 0,
                    y: 0,
                    w: 320,
                    h: 216
                }
            );
        }
    }

    #[test]
    fn sprite_defaults() {
        let scene = scene();
        let sprite = scene.sprite(3).unwrap();
        assert_eq!(sprite.position(), (0, 0));
        assert_eq!(sprite.size(), (8, 8));
        assert_eq!(sprite.priority(), MAX_PRIO);
        assert!(!sprite.is_enabled());
        assert!(!sprite.is_opaque());
        assert_eq!(sprite.pattern(), None);
    }

    #[test]
    fn set_size_fills_with_none_and_resets_view() {
        let mut scene = scene();
        scene.set_layer_size(0, 4, 4).unwrap();
        scene.scroll_layer(0, 5, 6).unwrap();
        scene.set_layer_window(0, 8, 8, 16, 16).unwrap();
        scene.enable_layer(0).unwrap();

        scene.set_layer_size(0, 6, 3).unwrap();
        let layer = scene.layer(0).unwrap();
        assert!(!layer.is_enabled());
        assert_eq!(layer.size(), (6, 3));
        assert_eq!(layer.scroll(), (0, 0));
        assert_eq!(layer.window().w, 320);
        assert!(layer.tiles().iter().all(|&t| t == TileCode::NONE.0));
        assert_eq!(layer.tile_at(-1, 0), Some(TileCode::NONE));
    }

    #[test]
    fn enabling_needs_tiles() {
        let mut scene = scene();
        scene.take_dirty();
        scene.enable_layer(1).unwrap();
        assert!(!scene.layer(1).unwrap().is_enabled());
        assert!(!scene.is_dirty());
    }

    #[test]
    fn toggling_sprites_twice_changes_nothing() {
        let mut scene = scene();
        scene.enable_sprite(3).unwrap();
        scene.take_dirty();
        scene.sprite_mut(3).unwrap().bind(None, true);
        scene.enable_sprite(3).unwrap();
        assert!(!scene.is_dirty());
        assert!(!scene.sprite(3).unwrap().must_reload());

        scene.disable_sprite(3).unwrap();
        scene.take_dirty();
        scene.disable_sprite(3).unwrap();
        assert!(!scene.is_dirty());
    }

    #[test]
    fn invalid_index_is_a_no_op() {
        let mut scene = scene();
        scene.take_dirty();
        assert_eq!(scene.enable_layer(MAX_BG), Err(EngineError::layer(MAX_BG)));
        assert_eq!(
            scene.move_sprite(MAX_SPRITES, 1, 1),
            Err(EngineError::sprite(MAX_SPRITES))
        );
        assert!(scene.set_layer_tile(0, 0, 0, 1).is_err());
        assert!(!scene.is_dirty());
    }

    #[test]
    fn invalid_sizes() {
        let mut scene = scene();
        assert!(scene.set_layer_tile_size(0, 7, 8).is_err());
        assert!(scene.set_layer_tile_size(0, 8, 33).is_err());
        assert!(scene.resize_sprite(0, 0, 8).is_err());
        assert!(scene.resize_sprite(0, 8, 33).is_err());
        assert!(scene.set_layer_priority(0, MAX_PRIO + 1).is_err());
        assert_eq!(scene.layer(0).unwrap().tile_size(), (8, 8));
    }

    #[test]
    #[allow(clippy::cast_possible_wrap)]
    fn scroll_wraps_any_offset() {
        let mut scene = scene();
        scene.set_layer_size(0, 5, 3).unwrap();
        let (ew, eh) = scene.layer(0).unwrap().extent();
        assert_eq!((ew, eh), (40, 24));

        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1000 {
            let x: i32 = rng.r#gen();
            let y: i32 = rng.r#gen();
            scene.scroll_layer(0, x, y).unwrap();
            let first = scene.layer(0).unwrap().scroll();
            assert!(first.0 < ew && first.1 < eh);
            assert_eq!(i64::from(first.0), i64::from(x).rem_euclid(i64::from(ew)));

            scene
                .scroll_layer(0, first.0 as i32, first.1 as i32)
                .unwrap();
            assert_eq!(scene.layer(0).unwrap().scroll(), first);

            scene
                .scroll_layer(0, first.0 as i32 + 7 * ew as i32, first.1 as i32 - 3 * eh as i32)
                .unwrap();
            assert_eq!(scene.layer(0).unwrap().scroll(), first);
        }
    }

    #[test]
    fn scroll_rewraps_on_tile_size_change() {
        let mut scene = scene();
        scene.set_layer_size(0, 4, 4).unwrap();
        scene.set_layer_tile_size(0, 16, 16).unwrap();
        scene.scroll_layer(0, 40, 63).unwrap();
        scene.set_layer_tile_size(0, 8, 8).unwrap();
        assert_eq!(scene.layer(0).unwrap().scroll(), (8, 31));
    }

    #[test]
    fn same_scroll_does_not_dirty() {
        let mut scene = scene();
        scene.set_layer_size(0, 4, 4).unwrap();
        scene.scroll_layer(0, 3, 0).unwrap();
        scene.take_dirty();
        scene.scroll_layer(0, 35, 32).unwrap();
        assert!(!scene.is_dirty());
    }

    #[test]
    fn tile_writes_wrap_and_remap() {
        let mut scene = scene();
        scene.set_layer_size(0, 4, 2).unwrap();
        scene.map_layer_tile(0, 10, 42).unwrap();

        scene.set_layer_tile(0, -1, 3, 10).unwrap();
        assert_eq!(scene.layer(0).unwrap().tile_at(3, 1), Some(TileCode(42)));

        scene.set_layer_tiles(0, 2, 0, &[1, 2, 3, 10]).unwrap();
        let layer = scene.layer(0).unwrap();
        assert_eq!(layer.tile_at(2, 0), Some(TileCode(1)));
        assert_eq!(layer.tile_at(3, 0), Some(TileCode(2)));
        assert_eq!(layer.tile_at(0, 0), Some(TileCode(3)));
        assert_eq!(layer.tile_at(1, 0), Some(TileCode(42)));
        assert_eq!(layer.tile_at(1, 1), Some(TileCode::NONE));
    }

    #[test]
    fn same_tile_does_not_dirty() {
        let mut scene = scene();
        scene.set_layer_size(0, 4, 4).unwrap();
        scene.set_layer_tile(0, 1, 1, 5).unwrap();
        scene.take_dirty();
        scene.set_layer_tile(0, 1, 1, 5).unwrap();
        scene.set_layer_tiles(0, 1, 1, &[5]).unwrap();
        assert!(!scene.is_dirty());
        scene.set_layer_tile(0, 1, 1, 6).unwrap();
        assert!(scene.is_dirty());
    }

    #[test]
    fn atlas_origin_of_codes() {
        let mut scene = scene();
        scene.set_layer_pattern(0, 16, 240, 4).unwrap();
        scene.set_layer_tile_size(0, 8, 16).unwrap();
        let layer = scene.layer(0).unwrap();
        assert_eq!(layer.atlas_origin(0), (16, 240));
        assert_eq!(layer.atlas_origin(5), (24, 256));
        assert_eq!(layer.atlas_origin(0xff), (16 + 3 * 8, 240 + 63 * 16));
    }

    #[test]
    fn window_is_clipped_to_screen() {
        let mut scene = scene();
        scene.set_layer_window(0, 300, 200, 64, 64).unwrap();
        assert_eq!(
            scene.layer(0).unwrap().window(),
            Window {
                x: 300,
                y: 200,
                w: 20,
                h: 16
            }
        );
    }

    #[test]
    fn sprite_descriptor_changes_mark_reload() {
        let mut scene = scene();
        scene.set_sprite_frame(0, 2, 1, true, false).unwrap();
        scene.set_sprite_pattern(0, 32, 240).unwrap();
        let sprite = scene.sprite(0).unwrap();
        assert_eq!(sprite.frame(), (0, 0));
        assert_eq!(sprite.flips(), (true, false));
        assert!(sprite.must_reload());

        scene.sprites[0].bind(None, false);
        scene.take_dirty();
        scene.set_sprite_key(0, 0).unwrap();
        scene.resize_sprite(0, 8, 8).unwrap();
        assert!(!scene.is_dirty());
        assert!(!scene.sprite(0).unwrap().must_reload());

        scene.set_sprite_key(0, 3).unwrap();
        assert!(scene.is_dirty());
        assert!(scene.sprite(0).unwrap().must_reload());
    }

    #[test]
    fn draw_order_follows_y_then_index() {
        let mut scene = scene();
        scene.move_sprite(0, 0, 50).unwrap();
        scene.move_sprite(1, 0, 10).unwrap();
        scene.move_sprite(2, 0, 50).unwrap();
        scene.move_sprite(3, 0, -5).unwrap();
        let order = &scene.draw_order()[..4];
        assert_eq!(order, &[3, 4, 5, 6]);
        let visible: Vec<usize> = scene
            .draw_order()
            .iter()
            .copied()
            .filter(|&i| i < 4)
            .collect();
        assert_eq!(visible, vec![3, 1, 0, 2]);
    }

    #[test]
    fn reading_never_clears_dirty() {
        let mut scene = scene();
        scene.take_dirty();
        scene.mark_dirty();
        let _ = scene.sprite(0).unwrap().position();
        let _ = scene.layer(0).unwrap().scroll();
        assert!(scene.is_dirty());
    }
}
