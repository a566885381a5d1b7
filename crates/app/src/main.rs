use agent_host::Assistant;
use eframe::egui;
use services::{PageScraper, StorageAdapter};
use shared::settings::AssistantSettings;
use std::sync::mpsc::{Receiver, TryRecvError};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

mod config;
mod message_view;
mod page;
mod panel;
mod settings_view;
mod theme;

use page::{load_page_in_background, LoadedPage};
use panel::{PanelController, PanelState};
use settings_view::SettingsView;
use theme::ThemeWatcher;

fn try_read_clipboard_text() -> Option<String> {
    let mut clipboard = arboard::Clipboard::new().ok()?;
    let text = clipboard.get_text().ok()?;
    let trimmed = text.trim().to_string();
    if trimmed.is_empty() { None } else { Some(trimmed) }
}

/// Page to open at startup: first argument, else `PROBLEM_PAGE`.
fn startup_location() -> Option<String> {
    std::env::args()
        .nth(1)
        .or_else(|| std::env::var("PROBLEM_PAGE").ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn main() -> eframe::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let (settings, fresh) = config::load_settings_or_default();
    if fresh {
        info!("No settings file found, using defaults");
    }
    let storage = match StorageAdapter::open_default() {
        Ok(storage) => storage,
        Err(e) => {
            error!("Durable storage unavailable, history will not persist: {:#}", e);
            StorageAdapter::in_memory()
        }
    };
    let assistant = match Assistant::gemini(storage.clone(), &settings) {
        Ok(assistant) => assistant,
        Err(e) => {
            error!("Failed to set up the Gemini client: {}", e);
            std::process::exit(1);
        }
    };
    let app = ProblemSolverApp::new(settings, storage, assistant, startup_location());

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_min_inner_size([800.0, 600.0]),
        vsync: true,
        ..Default::default()
    };
    eframe::run_native(
        "Problem Solver",
        options,
        Box::new(move |_cc| Box::new(app)),
    )
}

struct ProblemSolverApp {
    storage: StorageAdapter,
    scraper: Arc<PageScraper>,
    page: Option<LoadedPage>,
    page_rx: Option<Receiver<Result<LoadedPage, String>>>,
    page_error: Option<String>,
    location_input: String,
    editor_code: String,
    dark_mode: bool,
    theme: ThemeWatcher,
    panel: PanelController,
    settings_view: SettingsView,
}

impl ProblemSolverApp {
    fn new(
        settings: AssistantSettings,
        storage: StorageAdapter,
        assistant: Assistant,
        location: Option<String>,
    ) -> Self {
        let scraper = Arc::new(PageScraper::new(settings.scrape.clone()));
        let mut app = Self {
            settings_view: SettingsView::load(&storage),
            panel: PanelController::new(
                storage.clone(),
                assistant,
                Arc::clone(&scraper),
                settings.clone(),
            ),
            theme: ThemeWatcher::new(settings.dark_mode),
            dark_mode: settings.dark_mode,
            storage,
            scraper,
            page: None,
            page_rx: None,
            page_error: None,
            location_input: location.clone().unwrap_or_default(),
            editor_code: String::new(),
        };
        if let Some(location) = location {
            app.open_location(location);
        }
        app
    }

    fn open_location(&mut self, location: String) {
        info!("Opening {}", location);
        self.page_error = None;
        self.page_rx = Some(load_page_in_background(location, Arc::clone(&self.scraper)));
    }

    fn poll_page(&mut self) {
        let Some(rx) = &self.page_rx else {
            return;
        };
        let result = match rx.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return,
            Err(TryRecvError::Disconnected) => Err("page loader stopped unexpectedly".to_string()),
        };
        self.page_rx = None;

        match result {
            Ok(page) => {
                if let Err(e) = self.panel.navigate(&page) {
                    warn!("Failed to switch history to {}: {:#}", page.url, e);
                }
                // Reloading the same page keeps the user's edits.
                self.editor_code = self
                    .panel
                    .editor()
                    .and_then(|editor| editor.current_code())
                    .or(page.editor_code.as_deref())
                    .unwrap_or_default()
                    .to_string();
                self.location_input = page.location.clone();
                self.page = Some(page);
            }
            Err(e) => {
                error!("Failed to load page: {}", e);
                self.page_error = Some(e);
            }
        }
    }

    fn show_top_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            ui.add_space(6.0);
            ui.horizontal(|ui| {
                ui.label("Page:");
                let response = ui.add(
                    egui::TextEdit::singleline(&mut self.location_input)
                        .hint_text("https://... or path/to/problem.html")
                        .desired_width(420.0),
                );
                let entered =
                    response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
                let loading = self.page_rx.is_some();
                if ui.add_enabled(!loading, egui::Button::new("Open")).clicked() || entered {
                    let location = self.location_input.trim().to_string();
                    if !location.is_empty() {
                        self.open_location(location);
                    }
                }
                if loading {
                    ui.spinner();
                }

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui.button("Settings").clicked() {
                        self.settings_view.open = true;
                    }
                    ui.checkbox(&mut self.dark_mode, "Dark");

                    let label = match self.panel.state() {
                        PanelState::Visible => "Hide assistant",
                        PanelState::Absent | PanelState::Hidden => "Solve with AI",
                    };
                    let solve = egui::Button::new(
                        egui::RichText::new(label).color(egui::Color32::WHITE),
                    )
                    .fill(egui::Color32::from_rgb(70, 130, 180));
                    if ui.add_enabled(self.page.is_some(), solve).clicked() {
                        self.toggle_panel();
                    }
                });
            });
            ui.add_space(6.0);
        });
    }

    fn toggle_panel(&mut self) {
        let Some(page) = &self.page else {
            return;
        };
        if let Err(e) = self.panel.toggle(page, Instant::now()) {
            error!("Failed to open assistant: {:#}", e);
        }
    }

    fn show_page(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            if let Some(error) = &self.page_error {
                ui.colored_label(egui::Color32::from_rgb(220, 53, 69), error);
                ui.add_space(8.0);
            }
            let Some(page) = &self.page else {
                ui.centered_and_justified(|ui| {
                    ui.label(
                        egui::RichText::new("Open a problem page (URL or HTML file) to get started.")
                            .size(16.0)
                            .weak(),
                    );
                });
                return;
            };

            ui.heading(&page.problem.title);
            ui.label(egui::RichText::new(&page.url).small().weak());
            ui.add_space(8.0);

            egui::ScrollArea::vertical()
                .id_source("problem_description")
                .max_height(ui.available_height() * 0.4)
                .show(ui, |ui| {
                    if page.problem.description.is_empty() {
                        ui.label(egui::RichText::new("No problem description found yet.").weak());
                    } else {
                        ui.label(&page.problem.description);
                    }
                });
            ui.separator();

            let mut action: Option<&'static str> = None;
            ui.horizontal(|ui| {
                ui.label(egui::RichText::new("Code").strong());
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui.button("Submit").clicked() {
                        action = Some("Submit");
                    }
                    if ui.button("Run").clicked() {
                        action = Some("Run");
                    }
                });
            });

            let edited = egui::ScrollArea::vertical()
                .id_source("code_editor")
                .show(ui, |ui| {
                    ui.add(
                        egui::TextEdit::multiline(&mut self.editor_code)
                            .code_editor()
                            .desired_rows(20)
                            .desired_width(f32::INFINITY),
                    )
                    .changed()
                })
                .inner;

            if edited {
                self.panel.observe_code(&self.editor_code, Instant::now());
            }
            if let Some(label) = action {
                self.panel.code_action(&self.editor_code, label);
            }
        });
    }
}

impl eframe::App for ProblemSolverApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();
        self.poll_page();
        self.panel.poll(now);

        self.theme.observe(self.dark_mode);
        self.theme.apply(ctx);
        let palette = *self.theme.palette();

        self.show_top_bar(ctx);
        self.show_page(ctx);

        let actions = self.panel.show(ctx, &palette);
        if actions.close {
            self.toggle_panel();
        }
        if actions.reextract {
            if let Some(page) = &self.page {
                let selection = try_read_clipboard_text();
                if let Err(e) = self.panel.reextract(page, selection.as_deref()) {
                    warn!("Failed to re-extract problem: {:#}", e);
                }
            }
        }

        self.settings_view.show(ctx, &self.storage);

        // Keep polling background work and debounced edits.
        let edits_pending = self.panel.editor().map_or(false, |e| e.has_pending());
        if self.page_rx.is_some() || edits_pending || self.panel.state() != PanelState::Absent {
            ctx.request_repaint_after(Duration::from_millis(250));
        }
    }
}
