pub mod about;
pub mod app;
pub mod atlas_viewer;
pub mod compose_thread;
pub mod demo;
pub mod pixel_color;
pub mod render_stats;
pub mod scene_display;
pub mod ui_traits;
