//! The floating assistant panel.
//!
//! The controller owns the session for the current page and every piece of
//! background work attached to it: the model request in flight and the
//! content watch. It also tracks the page's editor, which keeps running while
//! the panel is closed. Both run on their own thread with a private tokio runtime
//! and report back over `mpsc`; `poll` drains them once per frame.

use crate::message_view::{show_message, show_thinking};
use crate::page::LoadedPage;
use crate::theme::Palette;
use agent_host::session::Submission;
use agent_host::{Assistant, AssistantSession, EditorWatch};
use anyhow::Result;
use eframe::egui;
use futures::future::{AbortHandle, Abortable};
use services::page_source::source_for;
use services::page_watch::{watch_for_content, ContentWatch, WatchConfig, WatchOutcome};
use services::{PageScraper, StorageAdapter};
use shared::settings::AssistantSettings;
use shared::AssistError;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub const TRANSITION: Duration = Duration::from_millis(300);
const SLIDE_DISTANCE: f32 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelState {
    Absent,
    Visible,
    Hidden,
}

struct PendingReply {
    rx: Receiver<Result<String, AssistError>>,
    abort: AbortHandle,
}

struct ActiveWatch {
    handle: ContentWatch,
    rx: Receiver<WatchOutcome>,
}

/// Things the panel wants the app to do after drawing.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PanelActions {
    pub reextract: bool,
    pub close: bool,
}

pub struct PanelController {
    state: PanelState,
    changed_at: Option<Instant>,
    storage: StorageAdapter,
    assistant: Assistant,
    scraper: Arc<PageScraper>,
    settings: AssistantSettings,
    session: Option<AssistantSession>,
    editor: Option<EditorWatch>,
    /// Greet even if the page already has a conversation: set for a new panel,
    /// cleared when an open panel follows the app to another page.
    greet_always: bool,
    pending: Option<PendingReply>,
    watch: Option<ActiveWatch>,
    pub input: String,
}

impl PanelController {
    pub fn new(
        storage: StorageAdapter,
        assistant: Assistant,
        scraper: Arc<PageScraper>,
        settings: AssistantSettings,
    ) -> Self {
        Self {
            state: PanelState::Absent,
            changed_at: None,
            storage,
            assistant,
            scraper,
            settings,
            session: None,
            editor: None,
            greet_always: true,
            pending: None,
            watch: None,
            input: String::new(),
        }
    }

    pub fn state(&self) -> PanelState {
        self.state
    }

    pub fn session(&self) -> Option<&AssistantSession> {
        self.session.as_ref()
    }

    pub fn editor(&self) -> Option<&EditorWatch> {
        self.editor.as_ref()
    }

    /// A request is in flight; the "Thinking" placeholder is showing.
    pub fn is_thinking(&self) -> bool {
        self.pending.is_some()
    }

    pub fn is_watching(&self) -> bool {
        self.watch.is_some()
    }

    /// Open on first use, then flip between shown and hidden.
    pub fn toggle(&mut self, page: &LoadedPage, now: Instant) -> Result<()> {
        self.state = match self.state {
            PanelState::Absent => {
                self.open_session(page)?;
                PanelState::Visible
            }
            PanelState::Visible => PanelState::Hidden,
            PanelState::Hidden => PanelState::Visible,
        };
        self.changed_at = Some(now);
        debug!("Panel is now {:?}", self.state);
        Ok(())
    }

    /// 0.0 (invisible) to 1.0 (fully shown), following the open/close fade.
    pub fn opacity(&self, now: Instant) -> f32 {
        let target = match self.state {
            PanelState::Visible => 1.0,
            PanelState::Hidden | PanelState::Absent => 0.0,
        };
        let Some(changed_at) = self.changed_at else {
            return target;
        };
        let t = (now.saturating_duration_since(changed_at).as_secs_f32()
            / TRANSITION.as_secs_f32())
        .clamp(0.0, 1.0);
        if target > 0.5 {
            t
        } else {
            1.0 - t
        }
    }

    pub fn is_animating(&self, now: Instant) -> bool {
        self.changed_at
            .map_or(false, |at| now.saturating_duration_since(at) < TRANSITION)
    }

    /// Whether anything should be drawn this frame; a hiding panel stays up until faded.
    pub fn is_drawn(&self, now: Instant) -> bool {
        match self.state {
            PanelState::Visible => true,
            PanelState::Hidden => self.opacity(now) > 0.0,
            PanelState::Absent => false,
        }
    }

    fn open_session(&mut self, page: &LoadedPage) -> Result<()> {
        self.track_editor(page)?;
        self.session = Some(AssistantSession::open(self.storage.clone(), &page.url)?);
        self.greet_always = true;
        self.attach_page(page)
    }

    /// Make sure the editor tracker follows `page`. A tracker that is already on
    /// this page keeps what it has seen of the editor.
    fn track_editor(&mut self, page: &LoadedPage) -> Result<()> {
        let switched = match self.editor.as_mut() {
            Some(editor) => editor.switch_to(&page.url)?,
            None => {
                let debounce = Duration::from_millis(self.settings.code_debounce_ms);
                self.editor = Some(EditorWatch::open(self.storage.clone(), &page.url, debounce)?);
                true
            }
        };
        if switched {
            if let (Some(editor), Some(code)) = (self.editor.as_mut(), &page.editor_code) {
                editor.seed(code);
            }
        }
        Ok(())
    }

    fn greet(&mut self) -> Result<()> {
        let Some(session) = self.session.as_mut() else {
            return Ok(());
        };
        if self.greet_always {
            session.greet()?;
        } else {
            session.greet_if_new()?;
        }
        Ok(())
    }

    /// Use the page's problem now if the scrape found one, otherwise wait for it.
    fn attach_page(&mut self, page: &LoadedPage) -> Result<()> {
        let complete = page.is_complete(&self.scraper);
        let Some(session) = self.session.as_mut() else {
            return Ok(());
        };
        session.set_problem(page.problem.clone());
        if complete {
            self.greet()?;
        } else {
            self.start_watch(&page.location);
        }
        Ok(())
    }

    fn start_watch(&mut self, location: &str) {
        self.cancel_watch();
        info!("Waiting for problem content on {}", location);

        let (handle, registration) = ContentWatch::new();
        let (tx, rx) = mpsc::channel();
        let location = location.to_string();
        let scraper = Arc::clone(&self.scraper);
        let config = WatchConfig::from(&self.settings.watch);

        std::thread::spawn(move || {
            let rt = match tokio::runtime::Runtime::new() {
                Ok(rt) => rt,
                Err(e) => {
                    warn!("Failed to start async runtime: {}", e);
                    let _ = tx.send(WatchOutcome::TimedOut(None));
                    return;
                }
            };
            let outcome = rt.block_on(async {
                match source_for(&location) {
                    Ok(source) => {
                        watch_for_content(source.as_ref(), &scraper, config, registration).await
                    }
                    Err(e) => {
                        warn!("Cannot watch {}: {:#}", location, e);
                        WatchOutcome::TimedOut(None)
                    }
                }
            });
            let _ = tx.send(outcome);
        });

        self.watch = Some(ActiveWatch { handle, rx });
    }

    fn cancel_watch(&mut self) {
        if let Some(watch) = self.watch.take() {
            watch.handle.cancel();
        }
    }

    fn abort_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.abort.abort();
        }
    }

    /// Drain background work and store due code snapshots. Call once per frame.
    pub fn poll(&mut self, now: Instant) {
        self.poll_watch();
        self.poll_reply();
        if let Some(editor) = self.editor.as_mut() {
            if let Err(e) = editor.poll(now) {
                warn!("Failed to store code snapshot: {:#}", e);
            }
        }
    }

    fn poll_watch(&mut self) -> bool {
        let Some(watch) = &self.watch else {
            return false;
        };
        let outcome = match watch.rx.try_recv() {
            Ok(outcome) => outcome,
            Err(TryRecvError::Empty) => return false,
            Err(TryRecvError::Disconnected) => WatchOutcome::TimedOut(None),
        };
        self.watch = None;

        let Some(session) = self.session.as_mut() else {
            return true;
        };
        match outcome {
            WatchOutcome::Found(problem) => session.set_problem(problem),
            WatchOutcome::TimedOut(Some(partial)) => {
                warn!("Problem details extraction incomplete, using partial content");
                session.set_problem(partial);
            }
            WatchOutcome::TimedOut(None) => {
                warn!("No problem content found; continuing without it");
            }
            WatchOutcome::Cancelled => return true,
        }
        if let Err(e) = self.greet() {
            warn!("Failed to save greeting: {:#}", e);
        }
        true
    }

    /// Collect the reply, if it has arrived. The placeholder goes away whether the
    /// request succeeded, failed or its worker vanished.
    pub fn poll_reply(&mut self) -> bool {
        let Some(pending) = &self.pending else {
            return false;
        };
        let result = match pending.rx.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return false,
            Err(TryRecvError::Disconnected) => Err(AssistError::Transport(
                "the request ended without a reply".into(),
            )),
        };
        self.pending = None;

        if let Some(session) = self.session.as_mut() {
            if let Err(e) = session.finish(result) {
                warn!("Failed to save reply: {:#}", e);
            }
        }
        true
    }

    /// Send whatever is in the input box. Ignored while a reply is pending.
    pub fn submit(&mut self) -> Result<()> {
        if self.is_thinking() {
            return Ok(());
        }
        let Some(session) = self.session.as_mut() else {
            return Ok(());
        };
        let editor_code = self.editor.as_ref().and_then(EditorWatch::current_code);
        let text = std::mem::take(&mut self.input);
        match session.submit(&text, editor_code)? {
            Submission::Ignored => self.input = text,
            Submission::Answered(category) => debug!("Answered locally ({:?})", category),
            Submission::Ask(job) => {
                let (tx, rx) = mpsc::channel();
                let (abort, registration) = AbortHandle::new_pair();
                let assistant = self.assistant.clone();

                std::thread::spawn(move || {
                    let rt = match tokio::runtime::Runtime::new() {
                        Ok(rt) => rt,
                        Err(e) => {
                            let _ = tx.send(Err(AssistError::Transport(format!(
                                "Failed to start async runtime: {}",
                                e
                            ))));
                            return;
                        }
                    };
                    let answer = rt.block_on(Abortable::new(
                        async { assistant.ask(&job.message, &job.context).await },
                        registration,
                    ));
                    if let Ok(result) = answer {
                        let _ = tx.send(result);
                    }
                });

                self.pending = Some(PendingReply { rx, abort });
            }
        }
        Ok(())
    }

    /// Forget this page's conversation.
    pub fn clear(&mut self) -> Result<()> {
        match self.session.as_mut() {
            Some(session) => {
                session.clear()?;
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Re-read the problem, from `selection` if it is long enough.
    pub fn reextract(&mut self, page: &LoadedPage, selection: Option<&str>) -> Result<()> {
        if let Some(session) = self.session.as_mut() {
            session.reextract(&self.scraper, &page.html, selection)?;
        }
        Ok(())
    }

    /// Follow the app to a freshly loaded page. Editor tracking starts here,
    /// whether or not the panel has been opened.
    pub fn navigate(&mut self, page: &LoadedPage) -> Result<()> {
        self.track_editor(page)?;
        let Some(session) = self.session.as_mut() else {
            return Ok(());
        };
        if !session.navigate(&page.url)? {
            return Ok(());
        }
        self.greet_always = false;
        self.abort_pending();
        self.cancel_watch();
        self.attach_page(page)
    }

    pub fn observe_code(&mut self, code: &str, now: Instant) {
        if let Some(editor) = self.editor.as_mut() {
            editor.observe(code, now);
        }
    }

    /// A run/test/submit control was pressed with `code` in the editor.
    pub fn code_action(&mut self, code: &str, label: &str) {
        if let Some(editor) = self.editor.as_mut() {
            if let Err(e) = editor.capture_for_action(code, label) {
                warn!("Failed to store code snapshot: {:#}", e);
            }
        }
    }

    fn flush_editor(&mut self) {
        if let Some(editor) = self.editor.as_mut() {
            if let Err(e) = editor.flush() {
                warn!("Failed to flush code history: {:#}", e);
            }
        }
    }

    /// Tear the panel down; the next toggle starts from scratch. Editor
    /// tracking carries on.
    pub fn destroy(&mut self) {
        self.cancel_watch();
        self.abort_pending();
        self.flush_editor();
        self.session = None;
        self.state = PanelState::Absent;
        self.changed_at = None;
        info!("Assistant panel destroyed");
    }

    pub fn show(&mut self, ctx: &egui::Context, palette: &Palette) -> PanelActions {
        let mut actions = PanelActions::default();
        let now = Instant::now();
        if !self.is_drawn(now) {
            return actions;
        }
        if self.is_animating(now) || self.is_thinking() || self.is_watching() {
            ctx.request_repaint_after(Duration::from_millis(16));
        }

        let opacity = self.opacity(now);
        let slide = (1.0 - opacity) * SLIDE_DISTANCE;
        let palette = palette.faded(opacity);
        let frame = egui::Frame::window(&ctx.style())
            .fill(palette.background)
            .stroke(egui::Stroke::new(1.0, palette.border));

        egui::Window::new("Problem Solver")
            .anchor(egui::Align2::RIGHT_BOTTOM, egui::vec2(-20.0, -20.0 + slide))
            .fixed_size(egui::vec2(400.0, 520.0))
            .collapsible(false)
            .title_bar(false)
            .frame(frame)
            .show(ctx, |ui| {
                self.show_header(ui, &palette, &mut actions);
                ui.separator();
                self.show_transcript(ui, &palette);
                ui.separator();
                self.show_input(ui, &palette);
            });
        actions
    }

    fn show_header(&mut self, ui: &mut egui::Ui, palette: &Palette, actions: &mut PanelActions) {
        ui.horizontal(|ui| {
            ui.label(
                egui::RichText::new("Problem Solver")
                    .strong()
                    .size(16.0)
                    .color(palette.text),
            );
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if ui.small_button("✕").on_hover_text("Close").clicked() {
                    actions.close = true;
                }
                if ui
                    .small_button("Clear")
                    .on_hover_text("Clear chat history")
                    .clicked()
                {
                    if let Err(e) = self.clear() {
                        warn!("Failed to clear history: {:#}", e);
                    }
                }
                if ui
                    .small_button("Re-extract")
                    .on_hover_text("Read the problem again (uses copied text if any)")
                    .clicked()
                {
                    actions.reextract = true;
                }
            });
        });
        if let Some(problem) = self.session.as_ref().and_then(|s| s.problem()) {
            ui.label(egui::RichText::new(&problem.title).small().weak());
        }
    }

    fn show_transcript(&mut self, ui: &mut egui::Ui, palette: &Palette) {
        egui::ScrollArea::vertical()
            .stick_to_bottom(true)
            .auto_shrink([false, false])
            .max_height(380.0)
            .show(ui, |ui| {
                if let Some(session) = &self.session {
                    for msg in session.messages() {
                        show_message(ui, msg, palette);
                    }
                }
                if self.is_watching() {
                    ui.horizontal(|ui| {
                        ui.spinner();
                        ui.label(egui::RichText::new("Waiting for the problem to load...").weak());
                    });
                }
                if self.is_thinking() {
                    show_thinking(ui, palette);
                }
            });
    }

    fn show_input(&mut self, ui: &mut egui::Ui, palette: &Palette) {
        let thinking = self.is_thinking();
        let mut send = false;
        ui.horizontal(|ui| {
            let response = ui.add_enabled(
                !thinking,
                egui::TextEdit::multiline(&mut self.input)
                    .hint_text("Ask a question about this problem...")
                    .desired_rows(2)
                    .desired_width(ui.available_width() - 64.0),
            );
            if response.has_focus()
                && ui.input(|i| i.key_pressed(egui::Key::Enter) && !i.modifiers.shift)
            {
                // Drop the newline the key press just inserted.
                let trimmed_len = self.input.trim_end_matches('\n').len();
                self.input.truncate(trimmed_len);
                send = true;
            }
            let button = egui::Button::new(
                egui::RichText::new("Send").color(palette.background),
            )
            .fill(palette.button_gradient.1);
            if ui.add_enabled(!thinking, button).clicked() {
                send = true;
            }
        });
        if send {
            if let Err(e) = self.submit() {
                warn!("Failed to send message: {:#}", e);
            }
        }
    }
}

impl Drop for PanelController {
    fn drop(&mut self) {
        if self.state != PanelState::Absent {
            self.destroy();
        } else {
            self.flush_editor();
        }
    }
}
