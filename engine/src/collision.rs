//! # Collision queries
//!
//! Pure functions over the scene. Sprite against sprite works on drawn
//! pixels: bounding boxes first, then the decoded row runs, and only rows
//! where a run has key pixels inside it are compared pixel by pixel.
//!
//! ```text
//!   a: ####..##      Solid ∧ Solid      -> hit
//!   b:   ######      Broken ∨ Broken    -> scan the overlap against keys
//! ```
//!
//! Sprite against tiles maps the sprite box into layer space and looks at
//! every map cell it covers, wrapping around the map edges.

use crate::direction::{Bounds, Collision};
use crate::pattern::{LineKind, PatternCache, PatternEntry};
use crate::scene::{BackgroundLayer, Sprite};

/// A sprite together with its decoded pattern.
#[derive(Debug, Clone, Copy)]
pub struct Shape<'a> {
    sprite: &'a Sprite,
    entry: Option<&'a PatternEntry>,
}

impl<'a> Shape<'a> {
    #[must_use]
    pub fn new(sprite: &'a Sprite, cache: &'a PatternCache) -> Self {
        Self {
            sprite,
            entry: sprite.pattern().and_then(|h| cache.entry(h)),
        }
    }

    /// Drawn run of screen row `y` as `(left, right, kind)`, right exclusive.
    fn run(&self, y: i32) -> Option<(i32, i32, LineKind)> {
        let b = self.sprite.bounds();
        if self.sprite.is_opaque() {
            return Some((b.left, b.right, LineKind::Solid));
        }
        let row = u16::try_from(y - b.top).ok()?;
        let line = self.entry?.line(row);
        if line.is_empty() {
            return None;
        }
        Some((
            b.left + i32::from(line.off),
            b.left + i32::from(line.end()),
            line.kind,
        ))
    }

    /// Whether the sprite draws screen pixel `(x, y)`.
    fn covers(&self, x: i32, y: i32) -> bool {
        if self.sprite.is_opaque() {
            return true;
        }
        let b = self.sprite.bounds();
        let (Ok(cx), Ok(cy)) = (u16::try_from(x - b.left), u16::try_from(y - b.top)) else {
            return false;
        };
        self.entry.is_some_and(|e| e.is_set(cx, cy))
    }
}

/// Pixel-exact collision between two sprites. The direction is where `b`
/// sticks out relative to `a`.
#[must_use]
pub fn sprite_collision(a: Shape<'_>, b: Shape<'_>) -> Collision {
    let (ab, bb) = (a.sprite.bounds(), b.sprite.bounds());
    let Some(overlap) = ab.intersection(&bb) else {
        return Collision::None;
    };
    let hit = Collision::Hit(ab.direction_of(&bb));
    if a.sprite.is_opaque() && b.sprite.is_opaque() {
        return hit;
    }

    for y in overlap.top..overlap.bottom {
        let (Some(ra), Some(rb)) = (a.run(y), b.run(y)) else {
            continue;
        };
        let left = ra.0.max(rb.0).max(overlap.left);
        let right = ra.1.min(rb.1).min(overlap.right);
        if left >= right {
            continue;
        }
        if ra.2 == LineKind::Solid && rb.2 == LineKind::Solid {
            return hit;
        }
        if (left..right).any(|x| a.covers(x, y) && b.covers(x, y)) {
            return hit;
        }
    }
    Collision::None
}

/// One result per entry of `codes`: which sides of `sprite` touch map cells
/// holding that code.
#[must_use]
pub fn sprite_tile_collision(
    sprite: &Sprite,
    layer: &BackgroundLayer,
    codes: &[u8],
) -> Vec<Collision> {
    let mut out = vec![Collision::None; codes.len()];
    if !layer.has_tiles() || codes.is_empty() {
        return out;
    }

    let win = layer.window();
    let window = Bounds::new(
        i32::from(win.x),
        i32::from(win.y),
        i32::from(win.w),
        i32::from(win.h),
    );
    let sb = sprite.bounds();
    if !window.overlaps(&sb) {
        return out;
    }

    let (scroll_x, scroll_y) = layer.scroll();
    #[allow(clippy::cast_possible_wrap)]
    let (dx, dy) = (
        scroll_x as i32 - window.left,
        scroll_y as i32 - window.top,
    );
    let in_layer = Bounds {
        left: sb.left + dx,
        top: sb.top + dy,
        right: sb.right + dx,
        bottom: sb.bottom + dy,
    };

    let (tw, th) = layer.tile_size();
    let (tw, th) = (i32::from(tw), i32::from(th));
    for ty in in_layer.top.div_euclid(th)..=(in_layer.bottom - 1).div_euclid(th) {
        for tx in in_layer.left.div_euclid(tw)..=(in_layer.right - 1).div_euclid(tw) {
            let Some(code) = layer.tile_at(tx, ty) else {
                continue;
            };
            let cell = Bounds::new(tx * tw, ty * th, tw, th);
            let hit = Collision::Hit(in_layer.direction_of(&cell));
            for (slot, _) in out.iter_mut().zip(codes).filter(|(_, c)| **c == code.0) {
                *slot = slot.union(hit);
            }
        }
    }
    out
}

#[must_use]
pub fn sprite_tile_collision_single(
    sprite: &Sprite,
    layer: &BackgroundLayer,
    code: u8,
) -> Collision {
    sprite_tile_collision(sprite, layer, &[code])
        .first()
        .copied()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::direction::Direction;
    use crate::framebuffer::{BlitTracker, MemoryFrameBuffer};
    use crate::scene::Scene;
    use pretty_assertions::assert_eq;
    use rand::{Rng, SeedableRng, rngs::StdRng};

    const ATLAS_Y: u16 = 16;

    /// Atlas frames: `(0, ATLAS_Y)` draws columns 0 and 7 of every row,
    /// `(8, ATLAS_Y)` draws column 3.
    fn frame_buffer() -> MemoryFrameBuffer {
        let mut fb = MemoryFrameBuffer::new(32, 16, 16, 20);
        fb.fill_block(0, ATLAS_Y, 1, 8, 5);
        fb.fill_block(7, ATLAS_Y, 1, 8, 5);
        fb.fill_block(11, ATLAS_Y, 1, 8, 6);
        fb
    }

    struct Rig {
        fb: MemoryFrameBuffer,
        scene: Scene,
        cache: PatternCache,
    }

    impl Rig {
        fn new() -> Self {
            Self {
                fb: frame_buffer(),
                scene: Scene::new(32, 16),
                cache: PatternCache::new(8, 2),
            }
        }

        fn keyed(&mut self, i: usize, pat_x: u16, x: i16, y: i16) {
            self.scene.set_sprite_pattern(i, pat_x, ATLAS_Y).unwrap();
            self.scene.move_sprite(i, x, y).unwrap();
            self.scene.enable_sprite(i).unwrap();
            let sprite = self.scene.sprite_mut(i).unwrap();
            self.cache
                .reload_sprite(&mut self.fb, &mut BlitTracker::default(), sprite, 1)
                .unwrap();
        }

        fn opaque(&mut self, i: usize, x: i16, y: i16, size: u16) {
            self.scene.resize_sprite(i, size, size).unwrap();
            self.scene.move_sprite(i, x, y).unwrap();
            self.scene.set_sprite_opaque(i, true).unwrap();
        }

        fn collide(&self, a: usize, b: usize) -> Collision {
            let shape = |i| Shape::new(self.scene.sprite(i).unwrap(), &self.cache);
            sprite_collision(shape(a), shape(b))
        }
    }

    #[test]
    fn overlapping_opaque_sprites() {
        let mut rig = Rig::new();
        rig.opaque(0, 0, 0, 16);
        rig.opaque(1, 8, 8, 16);
        let c = rig.collide(0, 1);
        assert_eq!(c, Collision::Hit(Direction::RIGHT | Direction::DOWN));
        assert_eq!(c.bits(), 0x46);
        assert_eq!(rig.collide(1, 0), Collision::Hit(Direction::LEFT | Direction::UP));

        rig.scene.move_sprite(1, 16, 8).unwrap();
        assert_eq!(rig.collide(0, 1), Collision::None);
    }

    #[test]
    fn key_pixels_do_not_collide() {
        let mut rig = Rig::new();
        rig.keyed(0, 0, 0, 0);
        rig.keyed(1, 8, 0, 0);
        // boxes coincide but column 3 of the first sprite is transparent
        assert_eq!(rig.collide(0, 1), Collision::None);

        rig.scene.move_sprite(1, 4, 0).unwrap();
        assert_eq!(rig.collide(0, 1), Collision::Hit(Direction::RIGHT));

        rig.scene.move_sprite(1, 4, 5).unwrap();
        assert_eq!(
            rig.collide(0, 1),
            Collision::Hit(Direction::RIGHT | Direction::DOWN)
        );
    }

    #[test]
    fn solid_runs_collide_without_scanning() {
        let mut rig = Rig::new();
        rig.keyed(0, 8, 0, 0);
        rig.keyed(1, 8, 0, 2);
        assert_eq!(rig.collide(0, 1), Collision::Hit(Direction::DOWN));
        rig.keyed(1, 8, 1, 2);
        assert_eq!(rig.collide(0, 1), Collision::None);
    }

    #[test]
    fn sprite_without_pattern_never_collides() {
        let mut rig = Rig::new();
        rig.opaque(0, 0, 0, 16);
        rig.scene.move_sprite(1, 4, 4).unwrap();
        assert_eq!(rig.collide(0, 1), Collision::None);
    }

    #[test]
    fn keyed_and_opaque_mix() {
        let mut rig = Rig::new();
        rig.keyed(0, 0, 0, 0);
        rig.opaque(1, 2, 2, 4);
        assert_eq!(rig.collide(0, 1), Collision::None);
        rig.scene.move_sprite(1, 5, 2).unwrap();
        assert_eq!(rig.collide(0, 1), Collision::Hit(Direction::RIGHT));
    }

    #[test]
    fn collisions_mirror() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut rig = Rig::new();
        rig.keyed(0, 0, 0, 0);
        rig.keyed(1, 8, 0, 0);
        rig.opaque(2, 0, 0, 8);
        for _ in 0..500 {
            for i in 0..3 {
                let (x, y) = (rng.gen_range(-4..12), rng.gen_range(-4..12));
                rig.scene.move_sprite(i, x, y).unwrap();
            }
            for (a, b) in [(0, 1), (0, 2), (1, 2)] {
                let ab = rig.collide(a, b);
                let ba = rig.collide(b, a);
                assert_eq!(ab.is_hit(), ba.is_hit());
                assert_eq!(ab.direction().mirrored(), ba.direction());
            }
        }
    }

    fn tile_scene() -> Scene {
        let mut scene = Scene::new(64, 64);
        scene.set_layer_size(0, 4, 4).unwrap();
        scene.enable_layer(0).unwrap();
        scene.resize_sprite(0, 8, 8).unwrap();
        scene
    }

    #[test]
    fn sprite_over_tiles() {
        let mut scene = tile_scene();
        scene.set_layer_tile(0, 1, 1, 7).unwrap();
        scene.move_sprite(0, 4, 4).unwrap();
        let (sprite, layer) = (scene.sprite(0).unwrap(), scene.layer(0).unwrap());

        assert_eq!(
            sprite_tile_collision(sprite, layer, &[7, 9]),
            vec![
                Collision::Hit(Direction::RIGHT | Direction::DOWN),
                Collision::None
            ]
        );
        assert_eq!(sprite_tile_collision_single(sprite, layer, 0xff).bits(), 0x4f);
    }

    #[test]
    fn tile_lookup_wraps_with_scroll() {
        let mut scene = tile_scene();
        scene.set_layer_tile(0, 0, 0, 7).unwrap();
        scene.scroll_layer(0, 28, 28).unwrap();
        let (sprite, layer) = (scene.sprite(0).unwrap(), scene.layer(0).unwrap());
        assert_eq!(
            sprite_tile_collision_single(sprite, layer, 7),
            Collision::Hit(Direction::RIGHT | Direction::DOWN)
        );

        scene.move_sprite(0, 4, 4).unwrap();
        let (sprite, layer) = (scene.sprite(0).unwrap(), scene.layer(0).unwrap());
        assert_eq!(
            sprite_tile_collision_single(sprite, layer, 7),
            Collision::Hit(Direction::empty())
        );
    }

    #[test]
    fn sprite_outside_window_hits_nothing() {
        let mut scene = tile_scene();
        scene.set_layer_window(0, 16, 16, 16, 16).unwrap();
        let (sprite, layer) = (scene.sprite(0).unwrap(), scene.layer(0).unwrap());
        assert_eq!(
            sprite_tile_collision(sprite, layer, &[0xff, 0xff]),
            vec![Collision::None; 2]
        );
        assert_eq!(
            sprite_tile_collision_single(sprite, scene.layer(1).unwrap(), 0xff),
            Collision::None
        );
    }
}
