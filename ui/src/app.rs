//! # tilecomp viewer application
//!
//! ```text
//! App::new(config)
//!     │
//!     ├─► compose_thread::spawn(config)
//!     │   ├─► paint the demo atlas into frame memory
//!     │   ├─► Engine::with_color_space(config, transport, Rgb332Palette)
//!     │   └─► DemoScene::setup, then move both to the thread
//!     │
//!     └─► Create UI tools:
//!         ├─► About
//!         ├─► SceneDisplay (FrameSlot)
//!         ├─► RenderStatsTool (ComposeHandle)
//!         └─► AtlasViewer (SharedTransport)
//! ```
//!
//! Tools can be toggled on/off via the sidebar.

use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::Mutex;

use engine::{EngineConfig, EngineError};

use crate::atlas_viewer::AtlasViewer;
use crate::compose_thread::{self, ComposeCommand, ComposeHandle};
use crate::render_stats::RenderStatsTool;
use crate::scene_display::SceneDisplay;
use crate::{about, ui_traits::UiTool};

pub struct App {
    tools: Vec<Box<dyn UiTool>>,
    open: BTreeSet<String>,
    handle: Arc<Mutex<ComposeHandle>>,
}

impl App {
    /// Starts the composition thread for `config` and builds the tool
    /// windows around it. The demo starts running right away.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        let (width, height) = (config.screen_width, config.screen_height);
        let about = about::About::new(config.clone());
        let spawned = compose_thread::spawn(config)?;
        let handle = Arc::new(Mutex::new(spawned.handle));
        handle.lock().send(ComposeCommand::Run);

        let tools: Vec<Box<dyn UiTool>> = vec![
            Box::new(about),
            Box::new(SceneDisplay::new(spawned.slot, width, height)),
            Box::new(RenderStatsTool::new(Arc::clone(&handle))),
            Box::new(AtlasViewer::new(spawned.transport, spawned.atlas)),
        ];

        Ok(Self::from_tools(tools, handle))
    }

    fn from_tools(tools: Vec<Box<dyn UiTool>>, handle: Arc<Mutex<ComposeHandle>>) -> Self {
        // everything but About starts open
        let open = tools
            .iter()
            .skip(1)
            .map(|tool| tool.name().to_owned())
            .collect();

        Self {
            tools,
            open,
            handle,
        }
    }

    pub fn checkboxes(&mut self, ui: &mut egui::Ui) {
        let Self { tools, open, .. } = self;
        for tool in tools {
            let mut is_open = open.contains(tool.name());
            ui.toggle_value(&mut is_open, tool.name());
            set_open(open, tool.name(), is_open);
        }
    }

    fn windows(&mut self, ctx: &egui::Context) {
        let Self { tools, open, .. } = self;
        for tool in tools {
            let mut is_open = open.contains(tool.name());
            tool.show(ctx, &mut is_open);
            set_open(open, tool.name(), is_open);
        }
    }
}

impl eframe::App for App {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.handle.lock().poll();
        ctx.request_repaint();

        egui::SidePanel::right("tilecomp tools")
            .resizable(false)
            .default_width(200.0)
            .show(ctx, |ui| {
                ui.vertical_centered(|ui| {
                    ui.heading("▦ tilecomp");
                });

                ui.separator();

                self.checkboxes(ui);
            });

        self.windows(ctx);
    }
}

fn set_open(open: &mut BTreeSet<String>, key: &'static str, is_open: bool) {
    if is_open {
        if !open.contains(key) {
            open.insert(key.to_owned());
        }
    } else {
        open.remove(key);
    }
}
