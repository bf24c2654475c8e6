//! # Demo scene
//!
//! Paints a small atlas into the off-screen rows of frame memory and drives
//! the engine with it:
//!
//! ```text
//!   atlas row h+8   │ sky │ star │ grass │ wall │ water │ ch0 │ ch1 │ ch2 │   8x8 tiles
//!   atlas row h+16  │ ball f0 │ ball f1 │ ball f2 │ ball f3 │ crate │        16x16 sprites
//! ```
//!
//! Layer 0 is a sky that scrolls slowly, layer 1 a ground strip at the
//! bottom of the screen that scrolls twice as fast. Balls bounce off the
//! screen edges, off each other and off wall tiles; the crate slides along
//! the ground.

use engine::direction::{Collision, Direction};
use engine::framebuffer::{FrameBuffer, MemoryFrameBuffer};
use engine::palette::{ColorSpace, Rgb332Palette};
use engine::{Engine, EngineConfig, EngineError, Pixel};

pub const TILE: u16 = 8;
pub const BALL: u16 = 16;
const BALL_FRAMES: u16 = 4;
/// Number of bouncing balls; the crate is the sprite right after them.
pub const BALLS: usize = 6;
const CRATE: usize = BALLS;
const SKY: usize = 0;
const GROUND: usize = 1;
const GROUND_H: u16 = 64;

/// Tile codes.
const T_SKY: u8 = 0;
const T_STAR: u8 = 1;
const T_GRASS: u8 = 2;
pub const T_WALL: u8 = 3;
const T_WATER: u8 = 4;
const T_CHECKER: u8 = 5;

const fn rgb(r: u8, g: u8, b: u8) -> Pixel {
    Rgb332Palette::pack(r, g, b)
}

/// Where the demo put its patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Atlas {
    pub tiles_y: u16,
    pub sprites_y: u16,
}

#[allow(clippy::cast_possible_truncation)]
fn tile_pixel(code: u8, x: u16, y: u16) -> Pixel {
    let brick_edge = y == 3 || y == 7 || (x == 0 && y < 3) || (x == 4 && y > 3);
    match code {
        T_SKY => rgb(0x20, 0x40, 0xa0 + (y as u8) * 8),
        T_STAR if (x, y) == (3, 3) => rgb(0xff, 0xff, 0xff),
        T_STAR => rgb(0x20, 0x40, 0xa0 + (y as u8) * 8),
        T_GRASS if y < 2 => rgb(0x40, 0xe0, 0x40),
        T_GRASS => rgb(0x80, 0x60, 0x20),
        T_WALL if brick_edge => rgb(0x60, 0x60, 0x60),
        T_WALL => rgb(0xc0, 0x40, 0x20),
        T_WATER if (x + y) % 4 == 0 => rgb(0x80, 0xc0, 0xff),
        T_WATER => rgb(0x00, 0x40, 0xc0),
        c => {
            let shade = 0x40 + (c.saturating_sub(T_CHECKER) % 3) * 0x30;
            if (x / 4 + y / 4) % 2 == 0 {
                rgb(shade, shade, shade)
            } else {
                rgb(shade / 2, shade / 2, shade)
            }
        }
    }
}

/// Ball frame `f`: a disc with a highlight that turns around it. Key
/// pixels (0) outside the disc.
fn ball_pixel(f: u16, x: u16, y: u16) -> Pixel {
    const HIGHLIGHT: [(i32, i32); 4] = [(5, 5), (10, 5), (10, 10), (5, 10)];
    let (dx, dy) = (i32::from(x) * 2 - 15, i32::from(y) * 2 - 15);
    if dx * dx + dy * dy > 15 * 15 {
        return 0;
    }
    let (hx, hy) = HIGHLIGHT[usize::from(f % BALL_FRAMES)];
    let (ex, ey) = (i32::from(x) - hx, i32::from(y) - hy);
    if ex * ex + ey * ey <= 4 {
        rgb(0xff, 0xff, 0xff)
    } else {
        rgb(0xe0, 0x20, 0x40)
    }
}

fn crate_pixel(x: u16, y: u16) -> Pixel {
    if x == 0 || y == 0 || x == BALL - 1 || y == BALL - 1 || x == y || x + y == BALL - 1 {
        rgb(0x60, 0x40, 0x00)
    } else {
        rgb(0xc0, 0x80, 0x40)
    }
}

/// Paints tiles and sprite frames into the atlas rows of `fb`.
pub fn paint_atlas(
    fb: &mut MemoryFrameBuffer,
    config: &EngineConfig,
) -> Result<Atlas, EngineError> {
    let tiles_y = config.screen_height + 8;
    let sprites_y = tiles_y + TILE;
    if config.atlas_rows < 8 + TILE + BALL || config.screen_width < (BALL_FRAMES + 1) * BALL {
        return Err(EngineError::Config(format!(
            "demo atlas needs {} rows and a {}-pixel wide screen",
            8 + TILE + BALL,
            (BALL_FRAMES + 1) * BALL
        )));
    }

    for code in 0..8u8 {
        let pixels: Vec<Pixel> = (0..TILE * TILE)
            .map(|i| tile_pixel(code, i % TILE, i / TILE))
            .collect();
        fb.load_block(u16::from(code) * TILE, tiles_y, TILE, &pixels);
    }
    for f in 0..BALL_FRAMES {
        let pixels: Vec<Pixel> = (0..BALL * BALL)
            .map(|i| ball_pixel(f, i % BALL, i / BALL))
            .collect();
        fb.load_block(f * BALL, sprites_y, BALL, &pixels);
    }
    let pixels: Vec<Pixel> = (0..BALL * BALL)
        .map(|i| crate_pixel(i % BALL, i / BALL))
        .collect();
    fb.load_block(BALL_FRAMES * BALL, sprites_y, BALL, &pixels);

    tracing::debug!("demo atlas painted at rows {tiles_y} and {sprites_y}");
    Ok(Atlas { tiles_y, sprites_y })
}

#[derive(Debug, Clone, Copy)]
struct Mover {
    x: i16,
    y: i16,
    vx: i16,
    vy: i16,
}

/// Sprite pairs and wall tiles in contact during the last tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollisionReport {
    /// `(a, b, collision of b against a)` with `a < b`.
    pub sprites: Vec<(usize, usize, Collision)>,
    /// `(ball, collision against wall tiles)`.
    pub walls: Vec<(usize, Collision)>,
}

pub struct DemoScene {
    movers: Vec<Mover>,
    tick: u32,
    screen: (i16, i16),
}

impl DemoScene {
    /// Configures layers and sprites for the painted `atlas`.
    pub fn setup<F: FrameBuffer, C: ColorSpace>(
        engine: &mut Engine<F, C>,
        atlas: Atlas,
    ) -> Result<Self, EngineError> {
        let config = engine.config();
        let (w, h) = (config.screen_width, config.screen_height);
        let screen = (
            i16::try_from(w).unwrap_or(i16::MAX),
            i16::try_from(h).unwrap_or(i16::MAX),
        );

        engine.set_layer_size(SKY, 64, 32)?;
        engine.set_layer_pattern(SKY, 0, atlas.tiles_y, 8)?;
        for y in 0..32 {
            let row: Vec<u8> = (0..64)
                .map(|x: i32| match y {
                    0..20 if (x * 7 + y * 13) % 11 == 0 => T_STAR,
                    0..20 => T_SKY,
                    _ => T_WATER,
                })
                .collect();
            engine.set_layer_tiles(SKY, 0, y, &row)?;
        }
        engine.set_layer_priority(SKY, 0)?;
        engine.enable_layer(SKY)?;

        engine.set_layer_size(GROUND, 48, 8)?;
        engine.set_layer_pattern(GROUND, 0, atlas.tiles_y, 8)?;
        for y in 0..8 {
            let row: Vec<u8> = (0..48)
                .map(|x: i32| match y {
                    0..2 => T_GRASS,
                    2 if x % 7 == 0 => T_WALL,
                    _ => T_CHECKER + u8::try_from((x + y) % 3).unwrap_or(0),
                })
                .collect();
            engine.set_layer_tiles(GROUND, 0, y, &row)?;
        }
        engine.set_layer_window(GROUND, 0, h.saturating_sub(GROUND_H), w, GROUND_H)?;
        engine.set_layer_priority(GROUND, 1)?;
        engine.enable_layer(GROUND)?;

        let mut movers = Vec::with_capacity(BALLS + 1);
        for i in 0..BALLS {
            #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
            let n = i as i16;
            let m = Mover {
                x: 8 + n * 40,
                y: 12 + n * 18,
                vx: if i % 2 == 0 { 2 } else { -3 },
                vy: 1 + n % 3,
            };
            engine.set_sprite_pattern(i, 0, atlas.sprites_y)?;
            engine.resize_sprite(i, BALL, BALL)?;
            engine.set_sprite_key(i, 0)?;
            engine.set_sprite_priority(i, 2)?;
            engine.move_sprite(i, m.x, m.y)?;
            engine.enable_sprite(i)?;
            movers.push(m);
        }

        let ground_top = screen.1 - i16::try_from(GROUND_H).unwrap_or(0);
        let crate_mover = Mover {
            x: 0,
            y: ground_top,
            vx: 1,
            vy: 0,
        };
        engine.set_sprite_pattern(CRATE, BALL_FRAMES * BALL, atlas.sprites_y)?;
        engine.resize_sprite(CRATE, BALL, BALL)?;
        engine.set_sprite_opaque(CRATE, true)?;
        engine.set_sprite_priority(CRATE, 1)?;
        engine.move_sprite(CRATE, crate_mover.x, crate_mover.y)?;
        engine.enable_sprite(CRATE)?;
        movers.push(crate_mover);

        tracing::info!("demo scene ready: {BALLS} balls and a crate");
        Ok(Self {
            movers,
            tick: 0,
            screen,
        })
    }

    #[must_use]
    pub const fn tick(&self) -> u32 {
        self.tick
    }

    /// Sprite positions, in sprite index order.
    pub fn positions(&self) -> impl Iterator<Item = (i16, i16)> + '_ {
        self.movers.iter().map(|m| (m.x, m.y))
    }

    /// Advances the animation by one frame.
    pub fn step<F: FrameBuffer, C: ColorSpace>(
        &mut self,
        engine: &mut Engine<F, C>,
    ) -> Result<(), EngineError> {
        self.tick = self.tick.wrapping_add(1);
        #[allow(clippy::cast_possible_wrap)]
        let t = self.tick as i32;
        engine.scroll_layer(SKY, t / 2, 0)?;
        engine.scroll_layer(GROUND, t, 0)?;

        let (sw, sh) = self.screen;
        #[allow(clippy::cast_possible_wrap)]
        let size = BALL as i16;
        for (i, m) in self.movers.iter_mut().enumerate() {
            m.x += m.vx;
            m.y += m.vy;
            if m.x < 0 || m.x + size > sw {
                m.vx = -m.vx;
                m.x = m.x.clamp(0, sw - size);
            }
            if m.y < 0 || m.y + size > sh {
                m.vy = -m.vy;
                m.y = m.y.clamp(0, sh - size);
            }
            engine.move_sprite(i, m.x, m.y)?;
            if i < BALLS {
                #[allow(clippy::cast_possible_truncation)]
                let frame = ((self.tick / 6 + i as u32) % u32::from(BALL_FRAMES)) as u16;
                engine.set_sprite_frame(i, frame, 0, m.vx < 0, false)?;
            }
        }
        Ok(())
    }

    /// Checks every sprite pair and every ball against wall tiles, and
    /// turns the balls that ran into something.
    pub fn collide<F: FrameBuffer, C: ColorSpace>(
        &mut self,
        engine: &mut Engine<F, C>,
    ) -> Result<CollisionReport, EngineError> {
        let mut report = CollisionReport::default();
        for a in 0..self.movers.len() {
            for b in a + 1..self.movers.len() {
                let c = engine.sprite_collision(a, b)?;
                if c.is_hit() {
                    self.bounce(a, c.direction());
                    self.bounce(b, c.direction().mirrored());
                    report.sprites.push((a, b, c));
                }
            }
        }
        for ball in 0..BALLS {
            let c = engine.sprite_tile_collision_single(ball, GROUND, T_WALL)?;
            if c.is_hit() {
                self.bounce(ball, c.direction());
                report.walls.push((ball, c));
            }
        }
        Ok(report)
    }

    /// Turns a ball away from an obstacle on side `dir`.
    fn bounce(&mut self, index: usize, dir: Direction) {
        if index >= BALLS {
            return;
        }
        let m = &mut self.movers[index];
        let towards_x = (dir.contains(Direction::RIGHT) && m.vx > 0)
            || (dir.contains(Direction::LEFT) && m.vx < 0);
        let towards_y = (dir.contains(Direction::DOWN) && m.vy > 0)
            || (dir.contains(Direction::UP) && m.vy < 0);
        if towards_x {
            m.vx = -m.vx;
        }
        if towards_y {
            m.vy = -m.vy;
        }
    }
}
