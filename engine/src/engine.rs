//! The engine façade.
//!
//! [`Engine`] owns the scene, the pattern cache, the compositor and the
//! scheduler, and talks to the output chip only through its
//! [`FrameBuffer`]. Every scene mutator is exposed here; the ones that can
//! drop a sprite's hold on a cached pattern go through the engine so the
//! reference is released exactly once.

use crate::collision::{self, Shape};
use crate::compositor::Compositor;
use crate::config::EngineConfig;
use crate::direction::Collision;
use crate::framebuffer::FrameBuffer;
use crate::palette::{ColorSpace, IdentityPalette};
use crate::pattern::PatternCache;
use crate::scene::Scene;
use crate::scheduler::{RenderOutcome, RenderScheduler};
use crate::EngineError;

pub struct Engine<F: FrameBuffer, C: ColorSpace = IdentityPalette> {
    config: EngineConfig,
    fb: F,
    colors: C,
    scene: Scene,
    cache: PatternCache,
    compositor: Compositor,
    scheduler: RenderScheduler,
}

impl<F: FrameBuffer> Engine<F, IdentityPalette> {
    pub fn new(config: EngineConfig, fb: F) -> Result<Self, EngineError> {
        Self::with_color_space(config, fb, IdentityPalette)
    }
}

impl<F: FrameBuffer, C: ColorSpace> Engine<F, C> {
    pub fn with_color_space(config: EngineConfig, fb: F, colors: C) -> Result<Self, EngineError> {
        config.validate()?;
        tracing::info!(
            "engine {}x{}, {} pattern slots, frameskip {}",
            config.screen_width,
            config.screen_height,
            config.pattern_slots,
            config.frameskip
        );
        Ok(Self {
            scene: Scene::new(config.screen_width, config.screen_height),
            cache: PatternCache::from_config(&config),
            compositor: Compositor::new(&config),
            scheduler: RenderScheduler::new(&config),
            config,
            fb,
            colors,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub const fn scene(&self) -> &Scene {
        &self.scene
    }

    #[must_use]
    pub const fn pattern_cache(&self) -> &PatternCache {
        &self.cache
    }

    #[must_use]
    pub const fn scheduler(&self) -> &RenderScheduler {
        &self.scheduler
    }

    #[must_use]
    pub const fn frame_buffer(&self) -> &F {
        &self.fb
    }

    /// Direct access to frame memory, e.g. to load the atlas.
    pub const fn frame_buffer_mut(&mut self) -> &mut F {
        &mut self.fb
    }

    #[must_use]
    pub const fn color_space(&self) -> &C {
        &self.colors
    }

    // Engine

    /// Runs one composition cycle.
    pub fn render(&mut self) -> RenderOutcome {
        self.scheduler.run(
            &mut self.fb,
            &mut self.scene,
            &mut self.cache,
            &mut self.compositor,
        )
    }

    /// Back to the state right after construction. Frame memory is left
    /// untouched.
    pub fn reset(&mut self) {
        self.reset_sprites();
        self.scene.reset_layers();
        self.compositor.settle(&mut self.fb);
        self.compositor = Compositor::new(&self.config);
        self.scheduler = RenderScheduler::new(&self.config);
        tracing::info!("engine reset");
    }

    /// Makes the next cycle draw even if nothing changed.
    pub const fn force_redraw(&mut self) {
        self.scene.mark_dirty();
    }

    #[must_use]
    pub const fn frameskip(&self) -> u32 {
        self.scheduler.frameskip()
    }

    pub const fn set_frameskip(&mut self, frameskip: u32) {
        self.scheduler.set_frameskip(frameskip);
    }

    // Layers

    pub fn enable_layer(&mut self, index: usize) -> Result<(), EngineError> {
        self.scene.enable_layer(index)
    }

    pub fn disable_layer(&mut self, index: usize) -> Result<(), EngineError> {
        self.scene.disable_layer(index)
    }

    pub fn free_layer(&mut self, index: usize) -> Result<(), EngineError> {
        self.scene.free_layer(index)
    }

    /// Allocates a `w` by `h` tile map. See [`Scene::set_layer_size`].
    pub fn set_layer_size(&mut self, index: usize, w: u16, h: u16) -> Result<(), EngineError> {
        self.scene.set_layer_size(index, w, h)
    }

    pub fn set_layer_tile_size(
        &mut self,
        index: usize,
        tile_w: u16,
        tile_h: u16,
    ) -> Result<(), EngineError> {
        self.scene.set_layer_tile_size(index, tile_w, tile_h)
    }

    pub fn set_layer_pattern(
        &mut self,
        index: usize,
        pat_x: u16,
        pat_y: u16,
        pat_w: u16,
    ) -> Result<(), EngineError> {
        self.scene.set_layer_pattern(index, pat_x, pat_y, pat_w)
    }

    pub fn set_layer_window(
        &mut self,
        index: usize,
        x: u16,
        y: u16,
        w: u16,
        h: u16,
    ) -> Result<(), EngineError> {
        self.scene.set_layer_window(index, x, y, w, h)
    }

    pub fn set_layer_priority(&mut self, index: usize, priority: u8) -> Result<(), EngineError> {
        self.scene.set_layer_priority(index, priority)
    }

    pub fn scroll_layer(&mut self, index: usize, x: i32, y: i32) -> Result<(), EngineError> {
        self.scene.scroll_layer(index, x, y)
    }

    pub fn set_layer_tile(
        &mut self,
        index: usize,
        x: i32,
        y: i32,
        code: u8,
    ) -> Result<(), EngineError> {
        self.scene.set_layer_tile(index, x, y, code)
    }

    pub fn set_layer_tiles(
        &mut self,
        index: usize,
        x: i32,
        y: i32,
        codes: &[u8],
    ) -> Result<(), EngineError> {
        self.scene.set_layer_tiles(index, x, y, codes)
    }

    pub fn map_layer_tile(&mut self, index: usize, from: u8, to: u8) -> Result<(), EngineError> {
        self.scene.map_layer_tile(index, from, to)
    }

    pub fn reset_layers(&mut self) {
        self.scene.reset_layers();
    }

    // Sprites

    pub fn set_sprite_pattern(
        &mut self,
        index: usize,
        pat_x: u16,
        pat_y: u16,
    ) -> Result<(), EngineError> {
        self.scene.set_sprite_pattern(index, pat_x, pat_y)
    }

    pub fn resize_sprite(&mut self, index: usize, w: u16, h: u16) -> Result<(), EngineError> {
        self.scene.resize_sprite(index, w, h)
    }

    pub fn set_sprite_frame(
        &mut self,
        index: usize,
        frame_x: u16,
        frame_y: u16,
        flip_x: bool,
        flip_y: bool,
    ) -> Result<(), EngineError> {
        self.scene
            .set_sprite_frame(index, frame_x, frame_y, flip_x, flip_y)
    }

    /// Sets the transparent color by palette index.
    pub fn set_sprite_key(&mut self, index: usize, palette_index: u8) -> Result<(), EngineError> {
        let key = self.colors.index_to_device_pixel(palette_index);
        self.scene.set_sprite_key(index, key)
    }

    /// Forces drawing as a plain rectangle. Any cached pattern is released.
    pub fn set_sprite_opaque(&mut self, index: usize, opaque: bool) -> Result<(), EngineError> {
        if let Some(handle) = self.scene.set_sprite_opaque(index, opaque)? {
            self.cache.release(handle);
        }
        Ok(())
    }

    pub fn set_sprite_priority(&mut self, index: usize, priority: u8) -> Result<(), EngineError> {
        self.scene.set_sprite_priority(index, priority)
    }

    pub fn move_sprite(&mut self, index: usize, x: i16, y: i16) -> Result<(), EngineError> {
        self.scene.move_sprite(index, x, y)
    }

    pub fn enable_sprite(&mut self, index: usize) -> Result<(), EngineError> {
        self.scene.enable_sprite(index)
    }

    pub fn disable_sprite(&mut self, index: usize) -> Result<(), EngineError> {
        self.scene.disable_sprite(index)
    }

    /// Disables the sprite and gives its pattern back to the cache.
    pub fn release_sprite(&mut self, index: usize) -> Result<(), EngineError> {
        let sprite = self.scene.sprite_mut(index)?;
        let was_enabled = sprite.is_enabled();
        sprite.force_disable();
        if let Some(handle) = sprite.take_pattern() {
            self.cache.release(handle);
        }
        if was_enabled {
            self.scene.mark_dirty();
        }
        Ok(())
    }

    /// Decodes the sprite's pattern now instead of at the next cycle.
    ///
    /// On failure the sprite is disabled.
    pub fn sprite_reload(&mut self, index: usize) -> Result<(), EngineError> {
        let frame = self.fb.frame();
        let sprite = self.scene.sprite_mut(index)?;
        let result = self
            .cache
            .reload_sprite(&mut self.fb, self.compositor.tracker_mut(), sprite, frame);
        if let Err(e) = &result {
            tracing::warn!("sprite {index} disabled: {e}");
            self.scene.mark_dirty();
        }
        result
    }

    pub fn reset_sprites(&mut self) {
        for handle in self.scene.reset_sprites() {
            self.cache.release(handle);
        }
        self.cache.reset();
    }

    // Collisions

    fn reload_if_pending(&mut self, index: usize) -> Result<(), EngineError> {
        let pending = self
            .scene
            .sprite(index)
            .ok_or(EngineError::sprite(index))?
            .must_reload();
        if pending {
            // a failed reload leaves the sprite without pixels
            let _ = self.sprite_reload(index);
        }
        Ok(())
    }

    /// Pixel-exact collision of sprite `b` against sprite `a`.
    pub fn sprite_collision(&mut self, a: usize, b: usize) -> Result<Collision, EngineError> {
        self.reload_if_pending(a)?;
        self.reload_if_pending(b)?;
        let sprite_a = self.scene.sprite(a).ok_or(EngineError::sprite(a))?;
        let sprite_b = self.scene.sprite(b).ok_or(EngineError::sprite(b))?;
        Ok(collision::sprite_collision(
            Shape::new(sprite_a, &self.cache),
            Shape::new(sprite_b, &self.cache),
        ))
    }

    /// One result per tile code.
    pub fn sprite_tile_collision(
        &self,
        sprite: usize,
        layer: usize,
        codes: &[u8],
    ) -> Result<Vec<Collision>, EngineError> {
        let s = self.scene.sprite(sprite).ok_or(EngineError::sprite(sprite))?;
        let l = self.scene.layer(layer).ok_or(EngineError::layer(layer))?;
        Ok(collision::sprite_tile_collision(s, l, codes))
    }

    pub fn sprite_tile_collision_single(
        &self,
        sprite: usize,
        layer: usize,
        code: u8,
    ) -> Result<Collision, EngineError> {
        let s = self.scene.sprite(sprite).ok_or(EngineError::sprite(sprite))?;
        let l = self.scene.layer(layer).ok_or(EngineError::layer(layer))?;
        Ok(collision::sprite_tile_collision_single(s, l, code))
    }
}
