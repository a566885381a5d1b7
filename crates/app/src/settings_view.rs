//! API key form.

use eframe::egui;
use services::StorageAdapter;
use shared::Credential;
use std::time::{Duration, Instant};
use tracing::{error, info};
use zeroize::Zeroizing;

pub const MISSING_KEY_MESSAGE: &str = "Please enter an API key";
pub const SAVED_MESSAGE: &str = "API key saved successfully!";
const STATUS_VISIBLE_FOR: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub text: String,
    pub is_error: bool,
    shown_at: Instant,
}

pub struct SettingsView {
    pub open: bool,
    api_key: Zeroizing<String>,
    status: Option<Status>,
}

impl SettingsView {
    /// Form prefilled with the stored key, if there is one.
    pub fn load(storage: &StorageAdapter) -> Self {
        let api_key = match storage.load_credential() {
            Ok(Some(credential)) => credential.api_key,
            Ok(None) => String::new(),
            Err(e) => {
                error!("Failed to read stored API key: {:#}", e);
                String::new()
            }
        };
        Self {
            open: false,
            api_key: Zeroizing::new(api_key),
            status: None,
        }
    }

    pub fn set_key_input(&mut self, key: &str) {
        self.api_key = Zeroizing::new(key.to_string());
    }

    /// Validate and store the key typed into the form.
    pub fn save(&mut self, storage: &StorageAdapter, now: Instant) {
        let Some(credential) = Credential::new(&self.api_key) else {
            self.set_status(MISSING_KEY_MESSAGE, true, now);
            return;
        };
        match storage.save_credential(&credential) {
            Ok(()) => {
                info!("API key saved");
                self.set_status(SAVED_MESSAGE, false, now);
            }
            Err(e) => {
                error!("Failed to save API key: {:#}", e);
                self.set_status(format!("Error saving API key: {}", e), true, now);
            }
        }
    }

    fn set_status(&mut self, text: impl Into<String>, is_error: bool, now: Instant) {
        self.status = Some(Status {
            text: text.into(),
            is_error,
            shown_at: now,
        });
    }

    /// Status line, hidden once it has been up for a few seconds.
    pub fn visible_status(&self, now: Instant) -> Option<&Status> {
        self.status
            .as_ref()
            .filter(|s| now.duration_since(s.shown_at) < STATUS_VISIBLE_FOR)
    }

    pub fn show(&mut self, ctx: &egui::Context, storage: &StorageAdapter) {
        if !self.open {
            return;
        }
        let mut open = self.open;
        egui::Window::new("Settings")
            .open(&mut open)
            .collapsible(false)
            .resizable(false)
            .default_width(360.0)
            .show(ctx, |ui| {
                ui.label("Gemini API key");
                let response = ui.add(
                    egui::TextEdit::singleline(&mut *self.api_key)
                        .password(true)
                        .hint_text("Enter your API key")
                        .desired_width(f32::INFINITY),
                );
                let submitted =
                    response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));

                ui.add_space(8.0);
                if ui.button("Save").clicked() || submitted {
                    self.save(storage, Instant::now());
                }

                if let Some(status) = self.visible_status(Instant::now()) {
                    let color = if status.is_error {
                        egui::Color32::from_rgb(220, 53, 69)
                    } else {
                        egui::Color32::from_rgb(40, 167, 69)
                    };
                    ui.add_space(6.0);
                    ui.colored_label(color, &status.text);
                    ctx.request_repaint_after(Duration::from_millis(250));
                }
            });
        self.open = open;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_key_rejected() {
        let storage = StorageAdapter::in_memory();
        let mut view = SettingsView::load(&storage);
        let now = Instant::now();
        view.set_key_input("   ");
        view.save(&storage, now);

        let status = view.visible_status(now).unwrap();
        assert_eq!(status.text, MISSING_KEY_MESSAGE);
        assert!(status.is_error);
        assert!(storage.load_credential().unwrap().is_none());
    }

    #[test]
    fn test_saved_key_reloads_and_status_expires() {
        let storage = StorageAdapter::in_memory();
        let mut view = SettingsView::load(&storage);
        let now = Instant::now();
        view.set_key_input("  AIza-test  ");
        view.save(&storage, now);

        assert_eq!(view.visible_status(now).unwrap().text, SAVED_MESSAGE);
        assert!(view.visible_status(now + Duration::from_secs(3)).is_none());
        assert_eq!(storage.load_credential().unwrap().unwrap().api_key, "AIza-test");

        let reloaded = SettingsView::load(&storage);
        assert_eq!(reloaded.api_key.as_str(), "AIza-test");
    }
}
