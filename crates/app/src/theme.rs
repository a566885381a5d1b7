//! Light/dark palette for the assistant panel.

use eframe::egui::{self, Color32};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Palette {
    pub dark: bool,
    pub background: Color32,
    /// Header, input field and code block background
    pub dark_background: Color32,
    pub text: Color32,
    pub message_background: Color32,
    pub message_text: Color32,
    pub user_message_background: Color32,
    pub user_message_text: Color32,
    pub border: Color32,
    pub button_gradient: (Color32, Color32),
    pub copied: Color32,
}

impl Palette {
    pub fn light() -> Self {
        Self {
            dark: false,
            background: Color32::WHITE,
            dark_background: Color32::from_rgb(240, 240, 240),
            text: Color32::BLACK,
            message_background: Color32::from_rgb(248, 249, 250),
            message_text: Color32::BLACK,
            user_message_background: Color32::from_rgb(233, 236, 239),
            user_message_text: Color32::BLACK,
            border: Color32::from_black_alpha(26),
            button_gradient: (Color32::from_white_alpha(153), Color32::from_rgb(234, 241, 253)),
            copied: Color32::from_rgb(76, 175, 80),
        }
    }

    pub fn dark() -> Self {
        let text = Color32::from_rgb(234, 241, 253);
        Self {
            dark: true,
            background: Color32::from_rgb(43, 56, 78),
            dark_background: Color32::from_rgb(30, 39, 54),
            text,
            message_background: Color32::from_rgb(43, 56, 78),
            message_text: text,
            user_message_background: Color32::from_rgb(30, 39, 54),
            user_message_text: text,
            border: Color32::from_white_alpha(26),
            button_gradient: (Color32::from_white_alpha(153), text),
            copied: Color32::from_rgb(76, 175, 80),
        }
    }

    pub fn for_mode(dark: bool) -> Self {
        if dark {
            Self::dark()
        } else {
            Self::light()
        }
    }

    /// Same palette with every color scaled by `opacity`, for fade transitions.
    pub fn faded(&self, opacity: f32) -> Self {
        if opacity >= 1.0 {
            return *self;
        }
        let f = |c: Color32| c.gamma_multiply(opacity);
        Self {
            dark: self.dark,
            background: f(self.background),
            dark_background: f(self.dark_background),
            text: f(self.text),
            message_background: f(self.message_background),
            message_text: f(self.message_text),
            user_message_background: f(self.user_message_background),
            user_message_text: f(self.user_message_text),
            border: f(self.border),
            button_gradient: (f(self.button_gradient.0), f(self.button_gradient.1)),
            copied: f(self.copied),
        }
    }

    /// egui visuals matching this palette.
    pub fn visuals(&self) -> egui::Visuals {
        let mut visuals = if self.dark {
            egui::Visuals::dark()
        } else {
            egui::Visuals::light()
        };
        visuals.window_fill = self.background;
        visuals.panel_fill = self.dark_background;
        visuals.extreme_bg_color = self.dark_background;
        visuals.override_text_color = Some(self.text);
        visuals.window_rounding = egui::Rounding::same(12.0);
        visuals.window_stroke = egui::Stroke::new(1.0, self.border);
        visuals
    }
}

/// Re-derives the palette when the dark-mode flag flips.
///
/// Only the look changes; transcript and settings are left alone.
pub struct ThemeWatcher {
    palette: Palette,
    applied: bool,
}

impl ThemeWatcher {
    pub fn new(dark: bool) -> Self {
        Self {
            palette: Palette::for_mode(dark),
            applied: false,
        }
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    /// Report the current flag; returns true if the palette changed.
    pub fn observe(&mut self, dark: bool) -> bool {
        if self.palette.dark == dark {
            return false;
        }
        tracing::debug!("Theme changed, dark mode: {}", dark);
        self.palette = Palette::for_mode(dark);
        self.applied = false;
        true
    }

    /// Push the palette into egui once per change.
    pub fn apply(&mut self, ctx: &egui::Context) {
        if self.applied {
            return;
        }
        ctx.set_visuals(self.palette.visuals());
        self.applied = true;
    }
}
