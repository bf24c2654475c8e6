//! # Pattern cache
//!
//! Decoded sprite frames shared between all sprites with the same
//! [`SpriteDescriptor`]. A frame is read from the atlas once, flipped in
//! memory, and every row is summarized so the compositor knows whether it
//! can write the row straight away:
//!
//! ```text
//!   key pixel: .          off len kind
//!   . . # # # # . .   ->   2   4  Solid
//!   . # # . . # # .   ->   1   6  Broken   (key pixels inside the run)
//!   . . . . . . . .   ->   0   0  Solid    (nothing to draw)
//! ```
//!
//! Slots are reference counted. A slot whose count dropped to zero keeps its
//! pixels until it has been idle for `evict_age` frames, so a sprite that
//! flickers between two frames does not decode them again every time.

use crate::config::EngineConfig;
use crate::framebuffer::{BlitTracker, FrameBuffer};
use crate::scene::{Sprite, SpriteDescriptor};
use crate::{EngineError, Pixel};

/// Index of a slot in the [`PatternCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PatternHandle(usize);

impl PatternHandle {
    #[must_use]
    pub const fn slot(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// No key pixel between the first and last drawn pixel.
    Solid,
    /// Key pixels inside the run; drawing needs the background.
    Broken,
}

/// Drawn part of one decoded row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpriteLine {
    pub off: u16,
    pub len: u16,
    pub kind: LineKind,
}

impl SpriteLine {
    const EMPTY: Self = Self {
        off: 0,
        len: 0,
        kind: LineKind::Solid,
    };

    #[must_use]
    pub const fn end(&self) -> u16 {
        self.off + self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[derive(Debug, Clone)]
pub struct PatternEntry {
    desc: SpriteDescriptor,
    refs: u32,
    last_used: u32,
    pixels: Vec<Pixel>,
    lines: Vec<SpriteLine>,
}

impl PatternEntry {
    #[must_use]
    pub const fn descriptor(&self) -> &SpriteDescriptor {
        &self.desc
    }

    #[must_use]
    pub const fn refs(&self) -> u32 {
        self.refs
    }

    #[must_use]
    pub const fn last_used(&self) -> u32 {
        self.last_used
    }

    #[must_use]
    pub fn lines(&self) -> &[SpriteLine] {
        &self.lines
    }

    #[must_use]
    pub fn line(&self, y: u16) -> SpriteLine {
        self.lines
            .get(usize::from(y))
            .copied()
            .unwrap_or(SpriteLine::EMPTY)
    }

    /// Decoded row `y`, flips applied.
    #[must_use]
    pub fn row(&self, y: u16) -> &[Pixel] {
        let w = usize::from(self.desc.w);
        let start = usize::from(y) * w;
        self.pixels.get(start..start + w).unwrap_or_default()
    }

    /// Whether the decoded pixel at `(x, y)` is drawn.
    #[must_use]
    pub fn is_set(&self, x: u16, y: u16) -> bool {
        self.row(y)
            .get(usize::from(x))
            .is_some_and(|&p| p != self.desc.key)
    }
}

/// Frame read from the atlas, not yet placed in a slot.
struct Decoded {
    pixels: Vec<Pixel>,
    lines: Vec<SpriteLine>,
}

/// Whether the frame `desc` names contains a key pixel. Flips do not change
/// the answer, so rows are read as stored and the scan stops at the first
/// key pixel.
fn shows_key<F: FrameBuffer + ?Sized>(
    fb: &mut F,
    tracker: &mut BlitTracker,
    desc: &SpriteDescriptor,
) -> bool {
    tracker.settle(fb);
    let (sx, sy) = desc.source();
    let mut row = vec![0; usize::from(desc.w)];
    (0..desc.h).any(|r| {
        let addr = fb.pixel_address(sx, sy.saturating_add(r));
        fb.read_bytes(addr, &mut row);
        row.contains(&desc.key)
    })
}

fn decode<F: FrameBuffer + ?Sized>(
    fb: &mut F,
    tracker: &mut BlitTracker,
    desc: &SpriteDescriptor,
) -> Decoded {
    tracker.settle(fb);

    let (w, h) = (usize::from(desc.w), usize::from(desc.h));
    let (sx, sy) = desc.source();
    let mut pixels = vec![0; w * h];
    let mut lines = Vec::with_capacity(h);

    for (r, row) in pixels.chunks_mut(w).enumerate() {
        #[allow(clippy::cast_possible_truncation)]
        let r = r as u16;
        let src_row = if desc.flip_y { desc.h - 1 - r } else { r };
        let addr = fb.pixel_address(sx, sy.saturating_add(src_row));
        fb.read_bytes(addr, row);
        if desc.flip_x {
            row.reverse();
        }

        let key = desc.key;
        let line = match (
            row.iter().position(|&p| p != key),
            row.iter().rposition(|&p| p != key),
        ) {
            (Some(first), Some(last)) => {
                let kind = if row[first..=last].contains(&key) {
                    LineKind::Broken
                } else {
                    LineKind::Solid
                };
                #[allow(clippy::cast_possible_truncation)]
                let (off, len) = (first as u16, (last - first + 1) as u16);
                SpriteLine { off, len, kind }
            }
            _ => SpriteLine::EMPTY,
        };
        lines.push(line);
    }

    Decoded { pixels, lines }
}

/// Result of [`PatternCache::acquire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquired {
    Cached(PatternHandle),
    /// No key pixels and no flip: draw the frame straight from the atlas.
    Opaque,
}

#[derive(Debug)]
pub struct PatternCache {
    slots: Vec<Option<PatternEntry>>,
    evict_age: u32,
}

impl PatternCache {
    #[must_use]
    pub fn new(capacity: usize, evict_age: u32) -> Self {
        Self {
            slots: std::iter::repeat_with(|| None).take(capacity).collect(),
            evict_age,
        }
    }

    #[must_use]
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.pattern_slots, config.pattern_evict_age)
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Slots currently holding decoded pixels, referenced or not.
    #[must_use]
    pub fn live_entries(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    #[must_use]
    pub fn entry(&self, handle: PatternHandle) -> Option<&PatternEntry> {
        self.slots.get(handle.0).and_then(Option::as_ref)
    }

    pub fn entries(&self) -> impl Iterator<Item = (PatternHandle, &PatternEntry)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.as_ref().map(|e| (PatternHandle(i), e)))
    }

    /// Slot holding `desc`, if any.
    #[must_use]
    pub fn lookup(&self, desc: &SpriteDescriptor) -> Option<PatternHandle> {
        self.entries()
            .find(|(_, e)| e.desc == *desc)
            .map(|(h, _)| h)
    }

    /// Binds a sprite currently holding `held` to the pattern for `desc`.
    ///
    /// `held` is released exactly once unless it already matches. On error
    /// the sprite holds nothing.
    pub fn acquire<F: FrameBuffer + ?Sized>(
        &mut self,
        fb: &mut F,
        tracker: &mut BlitTracker,
        held: Option<PatternHandle>,
        desc: &SpriteDescriptor,
        frame: u32,
    ) -> Result<Acquired, EngineError> {
        if let Some(h) = held
            && let Some(entry) = self.slots.get_mut(h.0).and_then(Option::as_mut)
            && entry.desc == *desc
        {
            entry.last_used = frame;
            return Ok(Acquired::Cached(h));
        }

        if let Some(h) = self.lookup(desc) {
            if let Some(entry) = self.slots[h.0].as_mut() {
                entry.refs += 1;
                entry.last_used = frame;
            }
            if let Some(old) = held {
                self.release(old);
            }
            return Ok(Acquired::Cached(h));
        }

        if let Some(old) = held {
            self.release(old);
        }

        if !desc.is_flipped() && !shows_key(fb, tracker, desc) {
            return Ok(Acquired::Opaque);
        }

        let slot = self.free_slot(frame).ok_or_else(|| {
            tracing::warn!("pattern cache exhausted ({} slots)", self.slots.len());
            EngineError::OutOfMemory {
                what: "pattern cache slot",
            }
        })?;
        let decoded = decode(fb, tracker, desc);
        if let Some(old) = &self.slots[slot] {
            tracing::debug!(
                "evicting pattern slot {slot} (idle since frame {})",
                old.last_used
            );
        }
        self.slots[slot] = Some(PatternEntry {
            desc: *desc,
            refs: 1,
            last_used: frame,
            pixels: decoded.pixels,
            lines: decoded.lines,
        });
        Ok(Acquired::Cached(PatternHandle(slot)))
    }

    /// Rebinds `sprite` to the pattern its descriptor names.
    ///
    /// A sprite forced opaque holds nothing. A sprite whose pattern cannot
    /// be cached is disabled and the error is returned.
    pub fn reload_sprite<F: FrameBuffer + ?Sized>(
        &mut self,
        fb: &mut F,
        tracker: &mut BlitTracker,
        sprite: &mut Sprite,
        frame: u32,
    ) -> Result<(), EngineError> {
        if sprite.is_forced_opaque() {
            if let Some(h) = sprite.take_pattern() {
                self.release(h);
            }
            sprite.bind(None, true);
            return Ok(());
        }
        let desc = *sprite.descriptor();
        match self.acquire(fb, tracker, sprite.pattern(), &desc, frame) {
            Ok(Acquired::Cached(h)) => sprite.bind(Some(h), false),
            Ok(Acquired::Opaque) => sprite.bind(None, true),
            Err(e) => {
                sprite.bind(None, false);
                sprite.force_disable();
                return Err(e);
            }
        }
        Ok(())
    }

    /// A never used slot, else the least recently used unreferenced slot
    /// that has been idle long enough.
    fn free_slot(&self, frame: u32) -> Option<usize> {
        if let Some(i) = self.slots.iter().position(Option::is_none) {
            return Some(i);
        }
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.as_ref().map(|e| (i, e)))
            .filter(|(_, e)| e.refs == 0 && frame.wrapping_sub(e.last_used) >= self.evict_age)
            .min_by_key(|(_, e)| e.last_used)
            .map(|(i, _)| i)
    }

    /// Drops one reference.
    pub fn release(&mut self, handle: PatternHandle) {
        if let Some(entry) = self.slots.get_mut(handle.0).and_then(Option::as_mut) {
            debug_assert!(entry.refs > 0, "pattern slot {} over-released", handle.0);
            entry.refs = entry.refs.saturating_sub(1);
        }
    }

    pub fn touch(&mut self, handle: PatternHandle, frame: u32) {
        if let Some(entry) = self.slots.get_mut(handle.0).and_then(Option::as_mut) {
            entry.last_used = frame;
        }
    }

    /// Drops every slot.
    pub fn reset(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framebuffer::{BlockMove, MemoryFrameBuffer};
    use crate::scene::Scene;
    use pretty_assertions::assert_eq;
    use rand::{Rng, SeedableRng, rngs::StdRng};

    const ATLAS_Y: u16 = 16;

    /// 64x16 visible area, atlas below. Atlas row 0 holds 8x8 frames:
    /// frame 0 has key pixels, frame 1 has none.
    fn frame_buffer() -> MemoryFrameBuffer {
        let mut fb = MemoryFrameBuffer::new(64, 16, 32, 20);
        #[rustfmt::skip]
        let keyed: [u8; 64] = [
            0, 0, 1, 1, 1, 1, 0, 0,
            0, 1, 1, 0, 0, 1, 1, 0,
            0, 0, 0, 0, 0, 0, 0, 0,
            2, 2, 2, 2, 2, 2, 2, 3,
            0, 0, 0, 0, 0, 0, 0, 4,
            5, 0, 0, 0, 0, 0, 0, 0,
            1, 1, 1, 1, 1, 1, 1, 1,
            0, 0, 0, 9, 0, 0, 0, 0,
        ];
        fb.load_block(0, ATLAS_Y, 8, &keyed);
        fb.fill_block(8, ATLAS_Y, 8, 8, 7);
        for i in 0..6 {
            fb.fill_block(16 + i * 8, ATLAS_Y, 8, 8, 10 + i as u8);
            let addr = fb.pixel_address(16 + i * 8, ATLAS_Y);
            fb.write_bytes(addr, &[0]);
        }
        fb
    }

    fn desc(frame_x: u16) -> SpriteDescriptor {
        SpriteDescriptor {
            pat_y: ATLAS_Y,
            frame_x,
            ..SpriteDescriptor::default()
        }
    }

    fn acquire(
        cache: &mut PatternCache,
        fb: &mut MemoryFrameBuffer,
        held: Option<PatternHandle>,
        d: &SpriteDescriptor,
        frame: u32,
    ) -> Result<Acquired, EngineError> {
        cache.acquire(fb, &mut BlitTracker::default(), held, d, frame)
    }

    fn cached(a: Acquired) -> PatternHandle {
        match a {
            Acquired::Cached(h) => h,
            Acquired::Opaque => panic!("expected a cached pattern"),
        }
    }

    #[test]
    fn row_classification() {
        let mut fb = frame_buffer();
        let mut cache = PatternCache::new(4, 2);
        let h = cached(acquire(&mut cache, &mut fb, None, &desc(0), 1).unwrap());
        let entry = cache.entry(h).unwrap();
        let lines: Vec<(u16, u16, LineKind)> =
            entry.lines().iter().map(|l| (l.off, l.len, l.kind)).collect();
        assert_eq!(
            lines,
            vec![
                (2, 4, LineKind::Solid),
                (1, 6, LineKind::Broken),
                (0, 0, LineKind::Solid),
                (0, 8, LineKind::Solid),
                (7, 1, LineKind::Solid),
                (0, 1, LineKind::Solid),
                (0, 8, LineKind::Solid),
                (3, 1, LineKind::Solid),
            ]
        );
        assert!(entry.is_set(2, 0));
        assert!(!entry.is_set(3, 1));
    }

    #[test]
    fn flips_are_applied_when_decoding() {
        let mut fb = frame_buffer();
        let mut cache = PatternCache::new(4, 2);
        let d = SpriteDescriptor {
            flip_x: true,
            flip_y: true,
            ..desc(0)
        };
        let h = cached(acquire(&mut cache, &mut fb, None, &d, 1).unwrap());
        let entry = cache.entry(h).unwrap();
        assert_eq!(entry.row(0), &[0, 0, 0, 0, 9, 0, 0, 0]);
        assert_eq!(entry.row(4), &[3, 2, 2, 2, 2, 2, 2, 2]);
        assert_eq!(entry.line(2), SpriteLine { off: 7, len: 1, kind: LineKind::Solid });
    }

    #[test]
    fn keyless_frame_is_opaque() {
        let mut fb = frame_buffer();
        let mut cache = PatternCache::new(4, 2);
        assert_eq!(
            acquire(&mut cache, &mut fb, None, &desc(1), 1).unwrap(),
            Acquired::Opaque
        );
        assert_eq!(cache.live_entries(), 0);

        let flipped = SpriteDescriptor {
            flip_x: true,
            ..desc(1)
        };
        assert!(matches!(
            acquire(&mut cache, &mut fb, None, &flipped, 1).unwrap(),
            Acquired::Cached(_)
        ));
    }

    #[test]
    fn identical_descriptors_share_a_slot() {
        let mut fb = frame_buffer();
        let mut cache = PatternCache::new(4, 2);
        let a = cached(acquire(&mut cache, &mut fb, None, &desc(0), 1).unwrap());
        let b = cached(acquire(&mut cache, &mut fb, None, &desc(0), 1).unwrap());
        assert_eq!(a, b);
        assert_eq!(cache.live_entries(), 1);
        assert_eq!(cache.entry(a).unwrap().refs(), 2);

        // already held: nothing changes
        let again = cached(acquire(&mut cache, &mut fb, Some(a), &desc(0), 5).unwrap());
        assert_eq!(again, a);
        assert_eq!(cache.entry(a).unwrap().refs(), 2);
        assert_eq!(cache.entry(a).unwrap().last_used(), 5);
    }

    #[test]
    fn switching_descriptor_releases_old_slot() {
        let mut fb = frame_buffer();
        let mut cache = PatternCache::new(4, 2);
        let a = cached(acquire(&mut cache, &mut fb, None, &desc(0), 1).unwrap());
        let b = cached(acquire(&mut cache, &mut fb, Some(a), &desc(2), 1).unwrap());
        assert_ne!(a, b);
        assert_eq!(cache.entry(a).unwrap().refs(), 0);
        assert_eq!(cache.entry(b).unwrap().refs(), 1);

        // the idle slot is found again instead of decoding
        let back = cached(acquire(&mut cache, &mut fb, Some(b), &desc(0), 1).unwrap());
        assert_eq!(back, a);
        assert_eq!(cache.entry(a).unwrap().refs(), 1);
        assert_eq!(cache.entry(b).unwrap().refs(), 0);
    }

    #[test]
    fn least_recently_used_idle_slot_is_evicted() {
        let mut fb = frame_buffer();
        let mut cache = PatternCache::new(3, 2);
        let mut handles = Vec::new();
        for (frame, f) in [(1, 2), (2, 3), (3, 4)] {
            handles.push(cached(acquire(&mut cache, &mut fb, None, &desc(f), frame).unwrap()));
        }
        for &h in &handles {
            cache.release(h);
        }

        let d = cached(acquire(&mut cache, &mut fb, None, &desc(5), 4).unwrap());
        assert_eq!(d, handles[0]);
        let e = cached(acquire(&mut cache, &mut fb, None, &desc(6), 4).unwrap());
        assert_eq!(e, handles[1]);

        // the remaining idle slot was used one frame ago
        assert_eq!(
            acquire(&mut cache, &mut fb, None, &desc(7), 4),
            Err(EngineError::OutOfMemory {
                what: "pattern cache slot"
            })
        );
        assert_eq!(cache.lookup(&desc(4)), Some(handles[2]));
    }

    #[test]
    fn idle_age_is_measured_across_the_frame_counter_wrap() {
        let mut fb = frame_buffer();
        let mut cache = PatternCache::new(1, 2);
        let a = cached(acquire(&mut cache, &mut fb, None, &desc(2), u32::MAX - 1).unwrap());
        cache.release(a);

        assert!(acquire(&mut cache, &mut fb, None, &desc(3), u32::MAX).is_err());
        let b = cached(acquire(&mut cache, &mut fb, None, &desc(3), 1).unwrap());
        assert_eq!(b, a);
        assert_eq!(cache.lookup(&desc(2)), None);
        assert_eq!(cache.entry(b).unwrap().last_used(), 1);
    }

    /// Counts the bytes read from the wrapped frame buffer.
    struct ReadCounter {
        fb: MemoryFrameBuffer,
        read: usize,
    }

    impl FrameBuffer for ReadCounter {
        fn read_bytes(&mut self, addr: u32, buf: &mut [u8]) {
            self.read += buf.len();
            self.fb.read_bytes(addr, buf);
        }

        fn write_bytes(&mut self, addr: u32, data: &[u8]) {
            self.fb.write_bytes(addr, data);
        }

        fn bulk_copy(&mut self, mv: &BlockMove) {
            self.fb.bulk_copy(mv);
        }

        fn copy_complete(&mut self) -> bool {
            self.fb.copy_complete()
        }

        fn pixel_address(&self, x: u16, y: u16) -> u32 {
            self.fb.pixel_address(x, y)
        }

        fn pitch(&self) -> u32 {
            self.fb.pitch()
        }

        fn current_line(&mut self) -> u16 {
            self.fb.current_line()
        }

        fn frame(&self) -> u32 {
            self.fb.frame()
        }
    }

    #[test]
    fn full_cache_fails_before_decoding() {
        let mut fb = ReadCounter {
            fb: frame_buffer(),
            read: 0,
        };
        let mut tracker = BlitTracker::default();
        let mut cache = PatternCache::new(1, 1000);
        cache.acquire(&mut fb, &mut tracker, None, &desc(2), 1).unwrap();

        fb.read = 0;
        let flipped = SpriteDescriptor {
            flip_y: true,
            ..desc(3)
        };
        assert!(cache.acquire(&mut fb, &mut tracker, None, &flipped, 1).is_err());
        assert_eq!(fb.read, 0);

        // a keyed frame is only scanned up to its first key pixel
        assert!(cache.acquire(&mut fb, &mut tracker, None, &desc(0), 1).is_err());
        assert_eq!(fb.read, 8);

        // a keyless one is drawn from the atlas and needs no slot
        fb.read = 0;
        assert_eq!(
            cache.acquire(&mut fb, &mut tracker, None, &desc(1), 1),
            Ok(Acquired::Opaque)
        );
        assert_eq!(fb.read, 64);
    }

    #[test]
    fn exhausted_cache_fails() {
        let mut fb = frame_buffer();
        let mut cache = PatternCache::new(2, 1000);
        let a = cached(acquire(&mut cache, &mut fb, None, &desc(2), 1).unwrap());
        cached(acquire(&mut cache, &mut fb, None, &desc(3), 1).unwrap());

        assert!(acquire(&mut cache, &mut fb, None, &desc(4), 100).is_err());

        // the failing sprite gives up what it held, but that slot is too
        // fresh to be reused
        assert!(acquire(&mut cache, &mut fb, Some(a), &desc(4), 100).is_err());
        assert_eq!(cache.entry(a).unwrap().refs(), 0);
        assert_eq!(cache.live_entries(), 2);
    }

    #[test]
    fn reload_binds_or_disables_sprites() {
        let mut fb = frame_buffer();
        let mut cache = PatternCache::new(1, 1000);
        let mut tracker = BlitTracker::default();
        let mut scene = Scene::new(64, 16);
        for (i, x) in [(0, 0), (1, 8), (2, 16)] {
            scene.set_sprite_pattern(i, x, ATLAS_Y).unwrap();
            scene.enable_sprite(i).unwrap();
        }

        for i in 0..2 {
            let sprite = scene.sprite_mut(i).unwrap();
            cache.reload_sprite(&mut fb, &mut tracker, sprite, 1).unwrap();
        }
        let sprite = scene.sprite_mut(2).unwrap();
        assert!(cache.reload_sprite(&mut fb, &mut tracker, sprite, 1).is_err());

        let sprites = scene.sprites();
        assert!(sprites[0].pattern().is_some() && !sprites[0].is_opaque());
        assert!(sprites[1].pattern().is_none() && sprites[1].is_opaque());
        assert!(!sprites[2].is_enabled() && sprites[2].pattern().is_none());
        assert!(!sprites[2].must_reload());

        // forcing opaque gives the slot back
        let held = scene.set_sprite_opaque(0, true).unwrap();
        assert_eq!(held, sprites_pattern(&cache));
        cache.release(held.unwrap());
        let sprite = scene.sprite_mut(0).unwrap();
        cache.reload_sprite(&mut fb, &mut tracker, sprite, 2).unwrap();
        assert!(scene.sprite(0).unwrap().is_opaque());
        assert_eq!(cache.entry(PatternHandle(0)).unwrap().refs(), 0);
    }

    fn sprites_pattern(cache: &PatternCache) -> Option<PatternHandle> {
        cache.entries().map(|(h, _)| h).next()
    }

    #[test]
    fn reference_counts_track_bound_sprites() {
        let mut fb = frame_buffer();
        let mut cache = PatternCache::new(5, 1);
        let mut rng = StdRng::seed_from_u64(42);
        let mut held: Vec<Option<PatternHandle>> = vec![None; 12];

        for frame in 1..400 {
            let s = rng.gen_range(0..held.len());
            let f = rng.gen_range(0..8);
            match acquire(&mut cache, &mut fb, held[s], &desc(f), frame) {
                Ok(Acquired::Cached(h)) => held[s] = Some(h),
                Ok(Acquired::Opaque) | Err(_) => held[s] = None,
            }

            for (h, entry) in cache.entries() {
                let bound = held.iter().filter(|x| **x == Some(h)).count();
                assert_eq!(entry.refs() as usize, bound);
            }
            let mut descs: Vec<_> = cache.entries().map(|(_, e)| *e.descriptor()).collect();
            let n = descs.len();
            descs.sort_by_key(|d| d.frame_x);
            descs.dedup();
            assert_eq!(descs.len(), n);
        }
    }
}
