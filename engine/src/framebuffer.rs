//! # Frame memory
//!
//! The display chip keeps the visible frame and the pattern atlas in one
//! linear memory. The atlas lives in the lines below the visible area:
//!
//! ```text
//!   addr 0 ┌──────────────────────────────┐
//!          │        visible frame         │  screen_height lines
//!          ├──────────────────────────────┤
//!          │   tile and sprite patterns   │  atlas_rows lines
//!          └──────────────────────────────┘
//!                     pitch bytes
//! ```
//!
//! Besides plain reads and writes the chip has a block mover that copies a
//! rectangle asynchronously. Its completion flag only reports the most recent
//! move, and a move running in the opposite direction must not be started
//! while another one is still in flight. [`BlitTracker`] enforces that rule.

use std::collections::VecDeque;

use crate::config::EngineConfig;

/// Traversal order of a block move.
///
/// Overlapping moves towards higher addresses must run backwards so that
/// source bytes are read before they are overwritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CopyDirection {
    #[default]
    Forward,
    Backward,
}

impl CopyDirection {
    #[must_use]
    pub const fn between(src: u32, dst: u32) -> Self {
        if dst > src {
            Self::Backward
        } else {
            Self::Forward
        }
    }
}

/// A rectangular hardware copy. Addresses name the top-left pixel of each
/// rectangle regardless of direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockMove {
    pub src: u32,
    pub dst: u32,
    pub pitch: u32,
    pub width: u16,
    pub height: u16,
    pub direction: CopyDirection,
    pub filter: bool,
}

impl BlockMove {
    #[must_use]
    pub const fn new(
        src: u32,
        dst: u32,
        pitch: u32,
        width: u16,
        height: u16,
        filter: bool,
    ) -> Self {
        Self {
            src,
            dst,
            pitch,
            width,
            height,
            direction: CopyDirection::between(src, dst),
            filter,
        }
    }
}

/// Operations the engine needs from the display memory transport.
pub trait FrameBuffer {
    /// Blocking read of `buf.len()` bytes starting at `addr`.
    fn read_bytes(&mut self, addr: u32, buf: &mut [u8]);

    /// Blocking write.
    fn write_bytes(&mut self, addr: u32, data: &[u8]);

    /// Starts a block move and returns immediately. Moves narrower than the
    /// configured minimum width are unreliable.
    fn bulk_copy(&mut self, mv: &BlockMove);

    /// Whether the most recent block move has finished.
    fn copy_complete(&mut self) -> bool;

    fn pixel_address(&self, x: u16, y: u16) -> u32;

    fn pitch(&self) -> u32;

    /// Line the beam is on. Visible lines come first, then blanking.
    fn current_line(&mut self) -> u16;

    /// Frame counter, incremented once per vertical blank.
    fn frame(&self) -> u32;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlitState {
    #[default]
    Idle,
    InFlight(CopyDirection),
}

/// Orders block moves and CPU accesses on the frame memory.
///
/// Same-direction moves are issued back to back. A move in the other
/// direction, and any CPU access, first waits for the in-flight move.
#[derive(Debug, Default)]
pub struct BlitTracker {
    state: BlitState,
    issued: u32,
    waits: u32,
}

impl BlitTracker {
    #[must_use]
    pub const fn state(&self) -> BlitState {
        self.state
    }

    /// Block moves issued since the last [`Self::take_counts`].
    #[must_use]
    pub const fn issued(&self) -> u32 {
        self.issued
    }

    /// Returns `(issued, waits)` and resets both.
    pub const fn take_counts(&mut self) -> (u32, u32) {
        let counts = (self.issued, self.waits);
        self.issued = 0;
        self.waits = 0;
        counts
    }

    pub fn issue<F: FrameBuffer + ?Sized>(&mut self, fb: &mut F, mv: &BlockMove) {
        if let BlitState::InFlight(dir) = self.state
            && dir != mv.direction
        {
            self.settle(fb);
        }
        tracing::trace!(
            "block move {:#x} -> {:#x} {}x{} {:?}",
            mv.src,
            mv.dst,
            mv.width,
            mv.height,
            mv.direction
        );
        fb.bulk_copy(mv);
        self.state = BlitState::InFlight(mv.direction);
        self.issued += 1;
    }

    /// Waits until no block move is in flight.
    pub fn settle<F: FrameBuffer + ?Sized>(&mut self, fb: &mut F) {
        if self.state == BlitState::Idle {
            return;
        }
        self.waits += 1;
        while !fb.copy_complete() {
            std::hint::spin_loop();
        }
        self.state = BlitState::Idle;
    }
}

/// Frame memory held in RAM.
///
/// Block moves take effect immediately but report completion only after
/// `latency` polls, so ordering mistakes are observable through
/// [`Self::direction_violations`] and [`Self::busy_accesses`].
#[derive(Debug, Clone)]
pub struct MemoryFrameBuffer {
    mem: Vec<u8>,
    width: u16,
    height: u16,
    total_lines: u16,
    pitch: u32,
    latency: u32,
    polls_left: u32,
    in_flight: Option<CopyDirection>,
    direction_violations: u32,
    busy_accesses: u32,
    copy_log: Option<Vec<BlockMove>>,
    line: u16,
    line_script: VecDeque<u16>,
    frame: u32,
}

impl MemoryFrameBuffer {
    #[must_use]
    pub fn new(width: u16, height: u16, atlas_rows: u16, total_lines: u16) -> Self {
        let pitch = u32::from(width);
        let lines = usize::from(height) + usize::from(atlas_rows);
        Self {
            mem: vec![0; lines * usize::from(width)],
            width,
            height,
            total_lines,
            pitch,
            latency: 0,
            polls_left: 0,
            in_flight: None,
            direction_violations: 0,
            busy_accesses: 0,
            copy_log: None,
            line: height,
            line_script: VecDeque::new(),
            frame: 0,
        }
    }

    #[must_use]
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            config.screen_width,
            config.screen_height,
            config.atlas_rows,
            config.total_lines,
        )
    }

    /// Number of `copy_complete` polls a block move stays busy.
    #[must_use]
    pub const fn with_latency(mut self, polls: u32) -> Self {
        self.latency = polls;
        self
    }

    /// Records every block move for inspection.
    #[must_use]
    pub fn with_copy_log(mut self) -> Self {
        self.copy_log = Some(Vec::new());
        self
    }

    #[must_use]
    pub const fn width(&self) -> u16 {
        self.width
    }

    #[must_use]
    pub const fn height(&self) -> u16 {
        self.height
    }

    /// Block moves started in the opposite direction of a busy one.
    #[must_use]
    pub const fn direction_violations(&self) -> u32 {
        self.direction_violations
    }

    /// CPU reads or writes performed while a block move was busy.
    #[must_use]
    pub const fn busy_accesses(&self) -> u32 {
        self.busy_accesses
    }

    #[must_use]
    pub fn copy_log(&self) -> &[BlockMove] {
        self.copy_log.as_deref().unwrap_or_default()
    }

    pub fn clear_copy_log(&mut self) {
        if let Some(log) = &mut self.copy_log {
            log.clear();
        }
    }

    pub const fn set_line(&mut self, line: u16) {
        self.line = line;
    }

    /// Lines returned by the next `current_line` calls, in order. Once the
    /// script runs out the last value sticks.
    pub fn script_lines(&mut self, lines: impl IntoIterator<Item = u16>) {
        self.line_script.extend(lines);
    }

    pub const fn set_frame(&mut self, frame: u32) {
        self.frame = frame;
    }

    /// Starts a new frame with the beam at the top of the screen.
    pub const fn advance_frame(&mut self) {
        self.frame = self.frame.wrapping_add(1);
        self.line = 0;
    }

    /// Moves the beam forward, wrapping into the next frame.
    pub const fn advance_lines(&mut self, lines: u16) {
        let next = self.line as u32 + lines as u32;
        if next >= self.total_lines as u32 {
            self.frame = self.frame.wrapping_add(1);
            #[allow(clippy::cast_possible_truncation)]
            let wrapped = (next % self.total_lines as u32) as u16;
            self.line = wrapped;
        } else {
            #[allow(clippy::cast_possible_truncation)]
            let line = next as u16;
            self.line = line;
        }
    }

    /// Direct pixel access, bypassing the transport bookkeeping.
    #[must_use]
    pub fn pixel(&self, x: u16, y: u16) -> u8 {
        self.mem
            .get(self.pixel_address(x, y) as usize)
            .copied()
            .unwrap_or_default()
    }

    /// Writes a `w` pixels wide block row by row, bypassing the bookkeeping.
    pub fn load_block(&mut self, x: u16, y: u16, w: u16, pixels: &[u8]) {
        if w == 0 {
            return;
        }
        for (row, chunk) in pixels.chunks(usize::from(w)).enumerate() {
            let Ok(row) = u16::try_from(row) else { break };
            let addr = self.pixel_address(x, y.saturating_add(row)) as usize;
            copy_clipped(&mut self.mem, addr, chunk);
        }
    }

    pub fn fill_block(&mut self, x: u16, y: u16, w: u16, h: u16, pixel: u8) {
        let row = vec![pixel; usize::from(w)];
        for dy in 0..h {
            let addr = self.pixel_address(x, y.saturating_add(dy)) as usize;
            copy_clipped(&mut self.mem, addr, &row);
        }
    }

    /// Copy of the visible area, `width * height` bytes.
    #[must_use]
    pub fn visible_frame(&self) -> Vec<u8> {
        let width = usize::from(self.width);
        let pitch = self.pitch as usize;
        (0..usize::from(self.height))
            .flat_map(|y| self.mem[y * pitch..y * pitch + width].iter().copied())
            .collect()
    }

    const fn busy(&self) -> bool {
        self.in_flight.is_some() && self.polls_left > 0
    }

    fn note_cpu_access(&mut self) {
        if self.busy() {
            self.busy_accesses += 1;
        }
    }

    fn move_byte(&mut self, mv: &BlockMove, x: u32, y: u32) {
        let src = (mv.src + y * mv.pitch + x) as usize;
        let dst = (mv.dst + y * mv.pitch + x) as usize;
        if let (Some(&b), true) = (self.mem.get(src), dst < self.mem.len()) {
            self.mem[dst] = b;
        }
    }
}

fn copy_clipped(mem: &mut [u8], addr: usize, data: &[u8]) {
    if addr >= mem.len() {
        return;
    }
    let n = data.len().min(mem.len() - addr);
    mem[addr..addr + n].copy_from_slice(&data[..n]);
}

impl FrameBuffer for MemoryFrameBuffer {
    fn read_bytes(&mut self, addr: u32, buf: &mut [u8]) {
        self.note_cpu_access();
        let addr = addr as usize;
        for (i, b) in buf.iter_mut().enumerate() {
            *b = self.mem.get(addr + i).copied().unwrap_or_default();
        }
    }

    fn write_bytes(&mut self, addr: u32, data: &[u8]) {
        self.note_cpu_access();
        copy_clipped(&mut self.mem, addr as usize, data);
    }

    fn bulk_copy(&mut self, mv: &BlockMove) {
        if let Some(dir) = self.in_flight
            && self.polls_left > 0
            && dir != mv.direction
        {
            tracing::warn!("block move direction reversed while busy");
            self.direction_violations += 1;
        }

        let (w, h) = (u32::from(mv.width), u32::from(mv.height));
        match mv.direction {
            CopyDirection::Forward => {
                for y in 0..h {
                    for x in 0..w {
                        self.move_byte(mv, x, y);
                    }
                }
            }
            CopyDirection::Backward => {
                for y in (0..h).rev() {
                    for x in (0..w).rev() {
                        self.move_byte(mv, x, y);
                    }
                }
            }
        }

        if let Some(log) = &mut self.copy_log {
            log.push(*mv);
        }
        self.in_flight = Some(mv.direction);
        self.polls_left = self.latency;
    }

    fn copy_complete(&mut self) -> bool {
        if self.polls_left > 0 {
            self.polls_left -= 1;
            return false;
        }
        self.in_flight = None;
        true
    }

    fn pixel_address(&self, x: u16, y: u16) -> u32 {
        u32::from(y) * self.pitch + u32::from(x)
    }

    fn pitch(&self) -> u32 {
        self.pitch
    }

    fn current_line(&mut self) -> u16 {
        if let Some(line) = self.line_script.pop_front() {
            self.line = line;
        }
        self.line
    }

    fn frame(&self) -> u32 {
        self.frame
    }
}
