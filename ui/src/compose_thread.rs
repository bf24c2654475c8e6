//! # Composition Thread
//!
//! Runs the engine and the demo scene on a dedicated thread. The UI talks
//! to it through lock-free SPSC channels and picks finished frames up from
//! a [`FrameSlot`].
//!
//! ```text
//! ┌──────────────────────────┐              ┌───────────────────────────┐
//! │    Composition Thread    │              │         UI Thread         │
//! │                          │   Commands   │   ┌───────────────────┐   │
//! │  Engine + DemoScene      │ ◄─────────── │   │   ComposeHandle   │   │
//! │  (owned here)            │    (SPSC)    │   │  - send commands  │   │
//! │                          │              │   │  - poll events    │   │
//! │  loop {                  │    Events    │   └───────────────────┘   │
//! │    process commands      │ ───────────► │                           │
//! │    if running:           │    (SPSC)    │   ┌───────────────────┐   │
//! │      step, render,       │              │   │   SceneDisplay    │   │
//! │      collide, publish    │ ──► Slot ──► │   │  (take_latest)    │   │
//! │  }                       │              │   └───────────────────┘   │
//! └──────────────────────────┘              └───────────────────────────┘
//! ```
//!
//! The frame memory itself sits behind a [`SharedTransport`], so the atlas
//! viewer can read it while the thread renders.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use engine::framebuffer::MemoryFrameBuffer;
use engine::palette::Rgb332Palette;
use engine::present::{Frame, FrameSlot};
use engine::scheduler::{RenderOutcome, RenderStats};
use engine::transport::SharedTransport;
use engine::{Engine, EngineConfig, EngineError};

use crate::demo::{self, CollisionReport, DemoScene};

pub type DemoTransport = SharedTransport<MemoryFrameBuffer>;
pub type DemoEngine = Engine<DemoTransport, Rgb332Palette>;

const COMMAND_BUFFER_SIZE: usize = 64;
const EVENT_BUFFER_SIZE: usize = 256;

/// Time between two ticks while running, about one field.
const TICK_PERIOD: Duration = Duration::from_millis(16);

/// Work items (block moves or CPU spans) the beam model charges per line.
const WORK_PER_LINE: u32 = 8;

/// Commands sent from the UI thread to the composition thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposeCommand {
    /// Animate and render continuously.
    Run,
    Pause,
    /// One tick, then stay paused.
    Step,
    SetFrameskip(u32),
    /// Redraw everything on the next cycle even if nothing changed.
    ForceRedraw,
    Shutdown,
}

/// Events sent from the composition thread to the UI thread.
#[derive(Debug, Clone)]
pub enum ComposeEvent {
    Outcome(RenderOutcome),
    Collisions(CollisionReport),
    Paused,
    Failed(String),
}

/// What the UI knows about the composition thread.
#[derive(Debug, Clone, Default)]
pub struct ComposeState {
    pub is_running: bool,
    pub frameskip: u32,
    pub last_stats: Option<RenderStats>,
    pub rendered: u64,
    pub skipped: u64,
    pub clean: u64,
    pub collisions: CollisionReport,
    pub last_error: Option<String>,
}

/// Line the beam reaches after drawing `stats`' worth of work from the top
/// of the frame.
fn beam_estimate(stats: Option<&RenderStats>, total_lines: u16) -> u16 {
    let work = stats.map_or(0, |s| s.block_moves + s.cpu_spans);
    let lines = work / WORK_PER_LINE;
    u16::try_from(lines).unwrap_or(u16::MAX).min(total_lines.saturating_sub(1))
}

struct ComposeThread {
    engine: DemoEngine,
    demo: DemoScene,
    slot: Arc<FrameSlot>,
    cmd_rx: rtrb::Consumer<ComposeCommand>,
    event_tx: rtrb::Producer<ComposeEvent>,

    running: bool,
    last_stats: Option<RenderStats>,
}

impl ComposeThread {
    const fn new(
        engine: DemoEngine,
        demo: DemoScene,
        slot: Arc<FrameSlot>,
        cmd_rx: rtrb::Consumer<ComposeCommand>,
        event_tx: rtrb::Producer<ComposeEvent>,
    ) -> Self {
        Self {
            engine,
            demo,
            slot,
            cmd_rx,
            event_tx,
            running: false,
            last_stats: None,
        }
    }

    fn run(mut self) {
        loop {
            if self.process_commands() {
                tracing::debug!("composition thread shutting down");
                return;
            }

            if self.running {
                self.tick(true);
                thread::sleep(TICK_PERIOD);
            } else {
                thread::sleep(Duration::from_millis(1));
            }
        }
    }

    /// Process all pending commands. Returns true if should shutdown.
    fn process_commands(&mut self) -> bool {
        while let Ok(cmd) = self.cmd_rx.pop() {
            match cmd {
                ComposeCommand::Run => self.running = true,
                ComposeCommand::Pause => {
                    self.running = false;
                    self.send_event(ComposeEvent::Paused);
                }
                ComposeCommand::Step => {
                    self.running = false;
                    self.tick(true);
                }
                ComposeCommand::SetFrameskip(frameskip) => {
                    self.engine.set_frameskip(frameskip);
                }
                ComposeCommand::ForceRedraw => {
                    self.engine.force_redraw();
                    if !self.running {
                        self.tick(false);
                    }
                }
                ComposeCommand::Shutdown => return true,
            }
        }
        false
    }

    /// One field: a vertical blank, then optionally a demo step, then a
    /// render cycle.
    fn tick(&mut self, animate: bool) {
        let total_lines = self.engine.config().total_lines;
        let beam = beam_estimate(self.last_stats.as_ref(), total_lines);
        self.engine.frame_buffer().with(|fb| {
            fb.advance_frame();
            fb.set_line(beam);
        });

        if animate && let Err(e) = self.demo.step(&mut self.engine) {
            self.fail(&e);
            return;
        }

        let outcome = self.engine.render();
        if let RenderOutcome::Rendered(stats) = &outcome {
            let frame = self
                .engine
                .frame_buffer()
                .with(|fb| Frame::capture(fb, stats.clone()));
            self.slot.publish(frame);
            self.last_stats = Some(stats.clone());
        }
        self.send_event(ComposeEvent::Outcome(outcome));

        if animate {
            match self.demo.collide(&mut self.engine) {
                Ok(report) => self.send_event(ComposeEvent::Collisions(report)),
                Err(e) => self.fail(&e),
            }
        }
    }

    fn fail(&mut self, e: &EngineError) {
        tracing::warn!("demo tick failed: {e}");
        self.running = false;
        self.send_event(ComposeEvent::Failed(e.to_string()));
    }

    /// Send an event to the UI (non-blocking, drops if full).
    fn send_event(&mut self, event: ComposeEvent) {
        let _ = self.event_tx.push(event);
    }
}

/// Handle for the UI thread to communicate with the composition thread.
pub struct ComposeHandle {
    cmd_tx: rtrb::Producer<ComposeCommand>,
    event_rx: rtrb::Consumer<ComposeEvent>,
    thread_handle: Option<JoinHandle<()>>,

    pub state: ComposeState,
}

impl ComposeHandle {
    pub fn send(&mut self, cmd: ComposeCommand) {
        match cmd {
            ComposeCommand::Run => self.state.is_running = true,
            ComposeCommand::Pause | ComposeCommand::Step => self.state.is_running = false,
            ComposeCommand::SetFrameskip(frameskip) => self.state.frameskip = frameskip,
            ComposeCommand::ForceRedraw | ComposeCommand::Shutdown => {}
        }
        if self.cmd_tx.push(cmd).is_err() {
            tracing::warn!("command queue full, dropped {cmd:?}");
        }
    }

    /// Poll for events and update cached state.
    pub fn poll(&mut self) {
        while let Ok(event) = self.event_rx.pop() {
            match event {
                ComposeEvent::Outcome(RenderOutcome::Rendered(stats)) => {
                    self.state.rendered += 1;
                    self.state.last_stats = Some(stats);
                }
                ComposeEvent::Outcome(RenderOutcome::Skipped) => self.state.skipped += 1,
                ComposeEvent::Outcome(RenderOutcome::Clean) => self.state.clean += 1,
                ComposeEvent::Collisions(report) => self.state.collisions = report,
                ComposeEvent::Paused => self.state.is_running = false,
                ComposeEvent::Failed(message) => {
                    self.state.is_running = false;
                    self.state.last_error = Some(message);
                }
            }
        }
    }
}

impl Drop for ComposeHandle {
    fn drop(&mut self) {
        let _ = self.cmd_tx.push(ComposeCommand::Shutdown);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

/// Everything the UI needs from a running composition thread.
pub struct Spawned {
    pub handle: ComposeHandle,
    pub slot: Arc<FrameSlot>,
    pub transport: DemoTransport,
    pub atlas: demo::Atlas,
}

/// Builds the engine and the demo scene for `config` and moves them to a
/// new composition thread. The thread starts paused.
pub fn spawn(config: EngineConfig) -> Result<Spawned, EngineError> {
    config.validate()?;
    let mut fb = MemoryFrameBuffer::from_config(&config);
    let atlas = demo::paint_atlas(&mut fb, &config)?;
    let transport = SharedTransport::new(fb);

    let mut engine =
        Engine::with_color_space(config, transport.clone(), Rgb332Palette::default())?;
    let demo = DemoScene::setup(&mut engine, atlas)?;
    let frameskip = engine.frameskip();

    let (cmd_tx, cmd_rx) = rtrb::RingBuffer::new(COMMAND_BUFFER_SIZE);
    let (event_tx, event_rx) = rtrb::RingBuffer::new(EVENT_BUFFER_SIZE);
    let slot = Arc::new(FrameSlot::new());

    let thread_slot = Arc::clone(&slot);
    let thread_handle = thread::Builder::new()
        .name("compose".to_owned())
        .spawn(move || {
            ComposeThread::new(engine, demo, thread_slot, cmd_rx, event_tx).run();
        })
        .map_err(|e| EngineError::Config(format!("can't start the composition thread: {e}")))?;

    tracing::info!("composition thread started");
    Ok(Spawned {
        handle: ComposeHandle {
            cmd_tx,
            event_rx,
            thread_handle: Some(thread_handle),
            state: ComposeState {
                frameskip,
                ..ComposeState::default()
            },
        },
        slot,
        transport,
        atlas,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const WAIT: Duration = Duration::from_secs(5);

    #[test]
    fn beam_follows_the_last_cycle_cost() {
        assert_eq!(beam_estimate(None, 262), 0);
        let stats = RenderStats {
            block_moves: 300,
            cpu_spans: 20,
            ..RenderStats::default()
        };
        assert_eq!(beam_estimate(Some(&stats), 262), 40);
        assert_eq!(beam_estimate(Some(&stats), 30), 29);
    }

    #[test]
    fn step_publishes_a_frame() {
        let mut spawned = spawn(EngineConfig::default()).unwrap();
        spawned.handle.send(ComposeCommand::Step);

        let frame = spawned.slot.wait_for_frame(WAIT).unwrap();
        assert_eq!((frame.width, frame.height), (320, 216));
        assert_eq!(frame.pixels.len(), 320 * 216);
        assert_eq!(frame.stats.sprites_drawn, demo::BALLS as u32 + 1);

        // the atlas stays readable through the shared transport
        let guard = spawned.transport.hold();
        let fb = guard.borrow();
        assert_ne!(fb.pixel(8, spawned.atlas.sprites_y + 8), 0);
    }

    #[test]
    fn handle_reports_outcomes() {
        let mut spawned = spawn(EngineConfig::default()).unwrap();
        spawned.handle.send(ComposeCommand::Run);
        let _ = spawned.slot.wait_for_frame(WAIT).unwrap();
        spawned.handle.send(ComposeCommand::Pause);

        let deadline = std::time::Instant::now() + WAIT;
        while spawned.handle.state.rendered == 0 && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
            spawned.handle.poll();
        }
        assert!(spawned.handle.state.rendered > 0);
        assert!(!spawned.handle.state.is_running);
        assert!(spawned.handle.state.last_stats.is_some());
    }

    #[test]
    fn invalid_config_does_not_spawn() {
        let config = EngineConfig {
            screen_width: 0,
            ..EngineConfig::default()
        };
        assert!(spawn(config).is_err());
    }
}
