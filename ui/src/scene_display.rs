use std::sync::Arc;

use eframe::epaint::textures::TextureOptions;
use egui::load::SizedTexture;
use egui::{ColorImage, ImageSource, TextureHandle, Ui};

use engine::present::FrameSlot;

use crate::pixel_color;
use crate::ui_traits::UiTool;

/// Shows the latest composed frame.
pub struct SceneDisplay {
    slot: Arc<FrameSlot>,
    texture: Option<TextureHandle>,
    size: [usize; 2],
    scale: f32,
    presented: u64,
}

impl SceneDisplay {
    #[must_use]
    pub fn new(slot: Arc<FrameSlot>, width: u16, height: u16) -> Self {
        Self {
            slot,
            texture: None,
            size: [usize::from(width), usize::from(height)],
            scale: 2.0,
            presented: 0,
        }
    }

    fn upload(&mut self, ctx: &egui::Context) {
        let Some(frame) = self.slot.take_latest() else {
            return;
        };
        self.size = [usize::from(frame.width), usize::from(frame.height)];
        let image = ColorImage::from_rgb(self.size, &pixel_color::to_rgb(&frame.pixels));
        match &mut self.texture {
            Some(texture) => texture.set(image, TextureOptions::NEAREST),
            None => {
                self.texture = Some(ctx.load_texture("scene", image, TextureOptions::NEAREST));
            }
        }
        self.presented += 1;
    }
}

impl UiTool for SceneDisplay {
    fn name(&self) -> &'static str {
        "Scene"
    }

    #[allow(clippy::cast_precision_loss)]
    fn show(&mut self, ctx: &egui::Context, open: &mut bool) {
        self.upload(ctx);
        egui::Window::new(self.name())
            .open(open)
            .default_width(self.size[0] as f32 * self.scale)
            .default_pos(egui::pos2(10.0, 10.0))
            .collapsible(false)
            .show(ctx, |ui| {
                self.ui(ui);
            });
    }

    #[allow(clippy::cast_precision_loss)]
    fn ui(&mut self, ui: &mut Ui) {
        ui.horizontal(|ui| {
            ui.add(egui::Slider::new(&mut self.scale, 1.0..=4.0).text("zoom"));
            ui.label(format!(
                "presented {} / published {} / dropped {}",
                self.presented,
                self.slot.published(),
                self.slot.dropped()
            ));
        });

        let Some(texture) = &self.texture else {
            ui.label("Waiting for the first frame, press ▶ in Render Stats.");
            return;
        };
        let size = egui::vec2(
            self.size[0] as f32 * self.scale,
            self.size[1] as f32 * self.scale,
        );
        ui.image(ImageSource::Texture(SizedTexture {
            id: texture.id(),
            size,
        }));
    }
}
