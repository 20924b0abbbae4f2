use crate::backend::OpenCvBackend;
use crate::config::Settings;
use crate::controller::Controller;
use crate::display::DisplayFrame;
use crate::models::{resolve_cascade_dir, scan_models};
use crate::worker::Notify;
use eframe::egui;
use std::sync::Arc;
use tracing::{info, warn};

pub const WINDOW_TITLE: &str = "Patterns detection";
const ABOUT_SHORTCUT: egui::Key = egui::Key::F1;

fn about_requested(ctx: &egui::Context) -> bool {
    ctx.input(|i| i.key_pressed(ABOUT_SHORTCUT))
}

pub struct PatternApp {
    controller: Controller<OpenCvBackend>,
    texture: Option<egui::TextureHandle>,
    surface_size: egui::Vec2,
    opencv_version: String,
    show_about: bool,
}

impl PatternApp {
    pub fn new(cc: &eframe::CreationContext<'_>, settings: Settings) -> Self {
        let ctx = cc.egui_ctx.clone();
        let notify: Notify = Arc::new(move || ctx.request_repaint());

        let surface_size = egui::vec2(
            settings.display_width as f32,
            settings.display_height as f32,
        );
        let models = resolve_cascade_dir(settings.cascade_dir.as_deref())
            .and_then(|dir| {
                info!(dir = %dir.display(), "Scanning cascades");
                scan_models(&dir)
            })
            .unwrap_or_else(|err| {
                warn!(%err, "No cascades available");
                Vec::new()
            });
        let empty = models.is_empty();

        let mut controller = Controller::new(OpenCvBackend, settings, models, notify);
        if empty {
            controller.set_status("No cascade files found");
        }

        Self {
            controller,
            texture: None,
            surface_size,
            opencv_version: opencv::core::get_version_string().unwrap_or_default(),
            show_about: false,
        }
    }

    fn on_frame_published(&mut self, ctx: &egui::Context, frame: &DisplayFrame) {
        let image = egui::ColorImage::from_rgb([frame.width, frame.height], &frame.rgb);
        match &mut self.texture {
            Some(texture) => texture.set(image, egui::TextureOptions::LINEAR),
            None => {
                let texture = ctx.load_texture("camera", image, egui::TextureOptions::LINEAR);
                self.texture = Some(texture);
            }
        }
    }

    fn menu_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("menu").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.menu_button("File", |ui| {
                    if ui.button("Exit").clicked() {
                        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                    }
                });
                ui.menu_button("About", |ui| {
                    let about = egui::Button::new(format!("About {WINDOW_TITLE}"))
                        .shortcut_text(ABOUT_SHORTCUT.name());
                    if ui.add(about).clicked() {
                        self.show_about = true;
                        ui.close_menu();
                    }
                });
            });
        });
    }

    fn about_window(&mut self, ctx: &egui::Context) {
        let opencv_version = &self.opencv_version;
        egui::Window::new("About")
            .open(&mut self.show_about)
            .collapsible(false)
            .resizable(false)
            .show(ctx, |ui| {
                ui.label(format!("{WINDOW_TITLE} {}", env!("CARGO_PKG_VERSION")));
                ui.label(format!("OpenCV {opencv_version}"));
            });
    }

    fn live_surface(&self, ui: &mut egui::Ui) {
        let (rect, _) = ui.allocate_exact_size(self.surface_size, egui::Sense::hover());
        ui.painter().rect_filled(rect, 0.0, egui::Color32::BLACK);
        if let Some(texture) = &self.texture {
            let target = egui::Rect::from_center_size(rect.center(), texture.size_vec2());
            let uv = egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0));
            ui.painter().image(texture.id(), target, uv, egui::Color32::WHITE);
        }
    }

    fn model_selector(&mut self, ui: &mut egui::Ui) {
        let selected = self
            .controller
            .selected()
            .map(|model| model.name.clone())
            .unwrap_or_default();
        let mut changed = None;

        ui.group(|ui| {
            ui.label("Trained model");
            ui.horizontal(|ui| {
                ui.label("File:");
                egui::ComboBox::from_id_source("model_selector")
                    .selected_text(&selected)
                    .width(260.0)
                    .show_ui(ui, |ui| {
                        for model in self.controller.models() {
                            if ui
                                .selectable_label(model.name == selected, &model.name)
                                .clicked()
                            {
                                changed = Some(model.name.clone());
                            }
                        }
                    });
            });
        });

        if let Some(name) = changed {
            if name != selected {
                self.controller.on_model_changed(&name);
            }
        }
    }

    fn controls(&mut self, ui: &mut egui::Ui) {
        let buttons = self.controller.buttons();
        ui.horizontal(|ui| {
            if ui
                .add_enabled(buttons.stop_enabled(), egui::Button::new("Stop/Close"))
                .clicked()
            {
                self.controller.on_stop();
            }
            if ui
                .add_enabled(buttons.start_enabled(), egui::Button::new("Start"))
                .clicked()
            {
                // the controller keeps the error as its status
                _ = self.controller.on_start();
            }
            if ui
                .add_enabled(buttons.record_enabled(), egui::Button::new("Record"))
                .clicked()
            {
                if let Err(err) = self.controller.on_record() {
                    self.controller.set_status(err.to_string());
                }
            }
            if ui
                .add_enabled(buttons.stop_record_enabled(), egui::Button::new("Stop Record"))
                .clicked()
            {
                self.controller.on_stop_record();
            }
        });
    }
}

impl eframe::App for PatternApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if let Some(frame) = self.controller.poll() {
            self.on_frame_published(ctx, &frame);
        }

        if about_requested(ctx) {
            self.show_about = true;
        }
        self.menu_bar(ctx);
        self.about_window(ctx);

        egui::CentralPanel::default().show(ctx, |ui| {
            self.live_surface(ui);
            ui.horizontal(|ui| {
                self.model_selector(ui);
                self.controls(ui);
            });
            if let Some(status) = self.controller.status() {
                ui.label(status);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pressed(ctx: &egui::Context, key: egui::Key) -> bool {
        let input = egui::RawInput {
            events: vec![egui::Event::Key {
                key,
                physical_key: None,
                pressed: true,
                repeat: false,
                modifiers: egui::Modifiers::NONE,
            }],
            ..Default::default()
        };
        let mut requested = false;
        let _ = ctx.run(input, |ctx| requested = about_requested(ctx));
        requested
    }

    #[test]
    fn f1_opens_about() {
        let ctx = egui::Context::default();
        assert!(pressed(&ctx, egui::Key::F1));
        assert!(!pressed(&ctx, egui::Key::F2));
    }
}
