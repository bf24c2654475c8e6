use eframe::epaint::textures::TextureOptions;
use egui::load::SizedTexture;
use egui::{ColorImage, ImageSource, TextureHandle};

use crate::compose_thread::DemoTransport;
use crate::demo::Atlas;
use crate::pixel_color;
use crate::ui_traits::UiTool;

/// Rows of frame memory shown: the tile strip and the sprite strip.
const ROWS: u16 = 8 + 16;

/// Shows the off-screen pattern rows as they sit in frame memory.
pub struct AtlasViewer {
    transport: DemoTransport,
    atlas: Atlas,
    texture: Option<TextureHandle>,
    width: u16,
    scale: f32,
}

impl AtlasViewer {
    #[must_use]
    pub const fn new(transport: DemoTransport, atlas: Atlas) -> Self {
        Self {
            transport,
            atlas,
            texture: None,
            width: 0,
            scale: 3.0,
        }
    }

    /// Copies the atlas rows out while holding the transport lock.
    fn read_rows(&self) -> (u16, Vec<u8>) {
        let guard = self.transport.hold();
        let fb = guard.borrow();
        let width = fb.width();
        let pixels = (self.atlas.tiles_y..self.atlas.tiles_y + ROWS)
            .flat_map(|y| (0..width).map(move |x| (x, y)))
            .map(|(x, y)| fb.pixel(x, y))
            .collect();
        (width, pixels)
    }

    fn refresh(&mut self, ctx: &egui::Context) {
        let (width, pixels) = self.read_rows();
        self.width = width;
        let image = ColorImage::from_rgb(
            [usize::from(width), usize::from(ROWS)],
            &pixel_color::to_rgb(&pixels),
        );
        self.texture = Some(ctx.load_texture("atlas", image, TextureOptions::NEAREST));
        tracing::debug!("atlas texture refreshed");
    }
}

impl UiTool for AtlasViewer {
    fn name(&self) -> &'static str {
        "Pattern Atlas"
    }

    fn default_pos(&self) -> egui::Pos2 {
        egui::pos2(10.0, 520.0)
    }

    fn ui(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.add(egui::Slider::new(&mut self.scale, 1.0..=6.0).text("zoom"));
            if ui.button("Refresh").clicked() {
                self.texture = None;
            }
        });
        ui.label(format!(
            "tiles at row {}, sprites at row {}",
            self.atlas.tiles_y, self.atlas.sprites_y
        ));

        if self.texture.is_none() {
            self.refresh(ui.ctx());
        }
        if let Some(texture) = &self.texture {
            let size = egui::vec2(
                f32::from(self.width) * self.scale,
                f32::from(ROWS) * self.scale,
            );
            egui::ScrollArea::horizontal().show(ui, |ui| {
                ui.image(ImageSource::Texture(SizedTexture {
                    id: texture.id(),
                    size,
                }));
            });
        }
    }
}
