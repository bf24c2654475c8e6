use engine::EngineConfig;

use crate::ui_traits::UiTool;

/// Version and the configuration the engine runs with.
pub struct About {
    config: EngineConfig,
}

impl About {
    #[must_use]
    pub const fn new(config: EngineConfig) -> Self {
        Self { config }
    }
}

fn config_rows(config: &EngineConfig) -> Vec<(&'static str, String)> {
    let (lo, hi) = config.sync_bounds();
    vec![
        (
            "screen",
            format!("{}x{}", config.screen_width, config.screen_height),
        ),
        ("lines per frame", config.total_lines.to_string()),
        ("atlas rows", config.atlas_rows.to_string()),
        ("pattern slots", config.pattern_slots.to_string()),
        ("pattern evict age", config.pattern_evict_age.to_string()),
        (
            "split line",
            format!("{} in [{lo}, {hi}]", config.initial_sync_line()),
        ),
        ("min block move", config.min_blit_width.to_string()),
        ("low-pass filter", config.lowpass.to_string()),
    ]
}

impl UiTool for About {
    fn name(&self) -> &'static str {
        "About tilecomp"
    }

    fn default_pos(&self) -> egui::Pos2 {
        egui::pos2(450.0, 10.0)
    }

    fn ui(&mut self, ui: &mut egui::Ui) {
        ui.heading("▦ tilecomp");
        ui.label(format!("v{}", env!("CARGO_PKG_VERSION")));
        ui.add_space(4.0);
        ui.label(
            "Scrolling tile layers and keyed sprites composed into the frame\n\
             memory of a composite-video chip, in two passes around the beam.",
        );
        ui.add_space(8.0);

        egui::Grid::new("engine config")
            .num_columns(2)
            .striped(true)
            .show(ui, |ui| {
                for (name, value) in config_rows(&self.config) {
                    ui.label(name);
                    ui.monospace(value);
                    ui.end_row();
                }
            });
    }
}
