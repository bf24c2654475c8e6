//! Controls for the composition thread and counters of the last cycle.

use std::sync::Arc;

use parking_lot::Mutex;

use engine::direction::Collision;

use crate::compose_thread::{ComposeCommand, ComposeHandle, ComposeState};
use crate::ui_traits::UiTool;

pub struct RenderStatsTool {
    handle: Arc<Mutex<ComposeHandle>>,
    frameskip: u32,
}

impl RenderStatsTool {
    pub fn new(handle: Arc<Mutex<ComposeHandle>>) -> Self {
        let frameskip = handle.lock().state.frameskip;
        Self { handle, frameskip }
    }

    fn controls(&mut self, ui: &mut egui::Ui, running: bool) {
        ui.horizontal(|ui| {
            if ui.add_enabled(!running, egui::Button::new("▶")).clicked() {
                self.handle.lock().send(ComposeCommand::Run);
            }
            if ui.add_enabled(running, egui::Button::new("⏸ ")).clicked() {
                self.handle.lock().send(ComposeCommand::Pause);
            }
            if ui.add_enabled(!running, egui::Button::new("⏭")).clicked() {
                self.handle.lock().send(ComposeCommand::Step);
            }
            if ui.button("Force redraw").clicked() {
                self.handle.lock().send(ComposeCommand::ForceRedraw);
            }
        });

        ui.horizontal(|ui| {
            ui.label("Frameskip:");
            let changed = ui
                .add(egui::DragValue::new(&mut self.frameskip).range(0..=10))
                .changed();
            if changed {
                self.handle
                    .lock()
                    .send(ComposeCommand::SetFrameskip(self.frameskip));
            }
        });
    }
}

fn stats_grid(ui: &mut egui::Ui, state: &ComposeState) {
    egui::Grid::new("render stats")
        .num_columns(2)
        .spacing([40.0, 4.0])
        .striped(true)
        .show(ui, |ui| {
            let mut row = |name: &str, value: String| {
                ui.label(name);
                ui.monospace(value);
                ui.end_row();
            };
            row("cycles rendered", state.rendered.to_string());
            row("cycles skipped", state.skipped.to_string());
            row("cycles clean", state.clean.to_string());
            if let Some(stats) = &state.last_stats {
                row("frame", stats.frame.to_string());
                row("split line", stats.split.to_string());
                row("beam after top pass", stats.beam_after_top.to_string());
                row("next split line", stats.next_sync_line.to_string());
                row("layers drawn", stats.layers_drawn.to_string());
                row("sprites drawn", stats.sprites_drawn.to_string());
                row("reload failures", stats.reload_failures.to_string());
                row("block moves", stats.block_moves.to_string());
                row("cpu spans", stats.cpu_spans.to_string());
            }
        });
}

fn collision_label(c: Collision) -> String {
    match c {
        Collision::None => "-".to_owned(),
        Collision::Hit(dir) if dir.is_empty() => "overlap".to_owned(),
        Collision::Hit(dir) => format!("{dir:?}"),
    }
}

impl UiTool for RenderStatsTool {
    fn name(&self) -> &'static str {
        "Render Stats"
    }

    fn default_pos(&self) -> egui::Pos2 {
        egui::pos2(700.0, 10.0)
    }

    fn ui(&mut self, ui: &mut egui::Ui) {
        let state = self.handle.lock().state.clone();

        self.controls(ui, state.is_running);
        if let Some(error) = &state.last_error {
            ui.colored_label(egui::Color32::LIGHT_RED, error);
        }
        ui.separator();

        stats_grid(ui, &state);
        ui.separator();

        ui.heading("Collisions");
        egui::ScrollArea::vertical().max_height(160.0).show(ui, |ui| {
            for (a, b, c) in &state.collisions.sprites {
                ui.monospace(format!("sprite {a} / sprite {b}: {}", collision_label(*c)));
            }
            for (ball, c) in &state.collisions.walls {
                ui.monospace(format!("sprite {ball} / wall: {}", collision_label(*c)));
            }
            if state.collisions.sprites.is_empty() && state.collisions.walls.is_empty() {
                ui.weak("none");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine::direction::Direction;
    use pretty_assertions::assert_eq;

    #[test]
    fn collision_labels() {
        assert_eq!(collision_label(Collision::None), "-");
        assert_eq!(collision_label(Collision::Hit(Direction::empty())), "overlap");
        assert_eq!(
            collision_label(Collision::Hit(Direction::UP | Direction::LEFT)),
            format!("{:?}", Direction::UP | Direction::LEFT)
        );
    }
}
