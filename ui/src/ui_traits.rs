pub trait UiTool {
    /// `&'static` so we can also use it as a key to store open/close state.
    fn name(&self) -> &'static str;

    /// Where the window first shows up.
    fn default_pos(&self) -> egui::Pos2 {
        egui::pos2(10.0, 10.0)
    }

    /// Shows the tool in its own window.
    fn show(&mut self, ctx: &egui::Context, open: &mut bool) {
        egui::Window::new(self.name())
            .default_pos(self.default_pos())
            .open(open)
            .show(ctx, |ui| {
                self.ui(ui);
            });
    }

    /// Contents of the tool window.
    fn ui(&mut self, ui: &mut egui::Ui);
}
