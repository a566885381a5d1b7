//! Best-effort extraction of a coding problem from an arbitrary page.
//!
//! Pages are not under our control, so every lookup is an ordered list of
//! selector guesses. Nothing here fails: a miss just yields an empty field.

use scraper::{ElementRef, Html, Selector};
use shared::settings::ScrapeSettings;
use shared::ProblemContext;
use tracing::debug;

pub const UNKNOWN_TITLE: &str = "Unknown Problem";
pub const EDITOR_SOURCE_LABEL: &str = "monaco-editor";

const TITLE_SELECTORS: &[&str] = &[
    "h1",
    ".problem-title",
    ".question-title",
    ".problem-header h1",
    ".problem-header h2",
    "article h1",
    "main h1",
    ".content h1",
    ".problem-statement h1",
    ".problem-description h1",
];

const DESCRIPTION_SELECTORS: &[&str] = &[
    ".problem-description",
    ".problem-statement",
    ".question-content",
    ".description",
    "article",
    ".content",
    "main",
    ".problem-container",
    ".question-detail",
];

/// Selectors whose presence means the problem has started rendering.
pub const CONTENT_MARKERS: &[&str] = &[
    ".problem-description",
    ".problem-statement",
    ".question-content",
    ".description",
    "article",
    ".content h1",
    "main h1",
    ".problem-container",
    ".question-detail",
];

const EXCLUDED_TAGS: &[&str] = &["nav", "header", "footer", "script", "style"];

fn compile(selectors: &'static [&'static str]) -> Vec<(&'static str, Selector)> {
    selectors
        .iter()
        .filter_map(|s| Selector::parse(s).ok().map(|sel| (*s, sel)))
        .collect()
}

pub struct PageScraper {
    config: ScrapeSettings,
    title: Vec<(&'static str, Selector)>,
    description: Vec<(&'static str, Selector)>,
    markers: Vec<(&'static str, Selector)>,
    paragraph: Selector,
    editor: Selector,
    roots: Vec<Selector>,
}

impl PageScraper {
    pub fn new(config: ScrapeSettings) -> Self {
        Self {
            config,
            title: compile(TITLE_SELECTORS),
            description: compile(DESCRIPTION_SELECTORS),
            markers: compile(CONTENT_MARKERS),
            paragraph: Selector::parse("p").expect("p selector"),
            editor: Selector::parse(".monaco-editor").expect("editor selector"),
            roots: ["main", "article", "body"]
                .iter()
                .map(|s| Selector::parse(s).expect("root selector"))
                .collect(),
        }
    }

    pub fn config(&self) -> &ScrapeSettings {
        &self.config
    }

    /// Title, description and URL of the problem shown in `html`.
    pub fn extract_problem_context(&self, html: &str, url: &str) -> ProblemContext {
        let document = Html::parse_document(html);
        let title = self.find_title(&document);
        let description = self
            .longest_description(&document)
            .or_else(|| self.paragraph_fallback(&document))
            .or_else(|| self.document_fallback(&document))
            .unwrap_or_default();

        debug!(
            "Extracted problem '{}' ({} chars of description) from {}",
            title,
            description.chars().count(),
            url
        );

        ProblemContext {
            title,
            description,
            url: url.to_string(),
        }
    }

    /// Text of the first code editor on the page, if any.
    pub fn editor_code(&self, html: &str) -> Option<String> {
        let document = Html::parse_document(html);
        document
            .select(&self.editor)
            .next()
            .map(|editor| editor.text().collect::<String>())
    }

    /// Whether any of the "problem has rendered" markers exist yet.
    pub fn has_content_markers(&self, html: &str) -> bool {
        let document = Html::parse_document(html);
        self.markers.iter().any(|(name, selector)| {
            let found = document.select(selector).next().is_some();
            if found {
                debug!("Problem content detected via selector: {}", name);
            }
            found
        })
    }

    /// Build a context from text the user selected themselves.
    ///
    /// Short selections are ignored so a stray click doesn't replace the problem.
    pub fn from_selection(&self, selection: &str, title: &str, url: &str) -> Option<ProblemContext> {
        let selection = selection.trim();
        if selection.chars().count() <= self.config.min_selection_len {
            return None;
        }
        let title = if title.trim().is_empty() {
            "Selected Problem"
        } else {
            title.trim()
        };
        Some(ProblemContext {
            title: title.to_string(),
            description: selection.to_string(),
            url: url.to_string(),
        })
    }

    fn find_title(&self, document: &Html) -> String {
        for (name, selector) in &self.title {
            if let Some(el) = document.select(selector).next() {
                let text = element_text(&el);
                let text = text.trim();
                if !text.is_empty() {
                    debug!("Found title using selector {}: {}", name, text);
                    return text.to_string();
                }
            }
        }
        UNKNOWN_TITLE.to_string()
    }

    // Longest candidate across every selector, not the first hit.
    fn longest_description(&self, document: &Html) -> Option<String> {
        let mut best: Option<String> = None;
        for (name, selector) in &self.description {
            for el in document.select(selector) {
                let text = element_text(&el);
                let text = text.trim();
                let len = text.chars().count();
                if len <= self.config.min_description_len {
                    continue;
                }
                if best.as_ref().map_or(true, |b| len > b.chars().count()) {
                    debug!("Description candidate from {} ({} chars)", name, len);
                    best = Some(text.to_string());
                }
            }
        }
        best
    }

    fn paragraph_fallback(&self, document: &Html) -> Option<String> {
        let mut joined = String::new();
        for p in document.select(&self.paragraph) {
            let text = element_text(&p);
            let text = text.trim();
            if text.chars().count() > self.config.min_paragraph_len {
                joined.push_str(text);
                joined.push_str("\n\n");
            }
        }
        if joined.chars().count() > self.config.min_description_len {
            Some(joined)
        } else {
            None
        }
    }

    fn document_fallback(&self, document: &Html) -> Option<String> {
        let root = self
            .roots
            .iter()
            .find_map(|sel| document.select(sel).next())
            .unwrap_or_else(|| document.root_element());

        let mut raw = String::new();
        collect_visible_text(root, &mut raw);
        let collapsed = collapse_whitespace(&raw);
        if collapsed.chars().count() > self.config.min_description_len {
            Some(collapsed)
        } else {
            None
        }
    }
}

impl Default for PageScraper {
    fn default() -> Self {
        Self::new(ScrapeSettings::default())
    }
}

fn element_text(el: &ElementRef<'_>) -> String {
    el.text().collect()
}

fn collect_visible_text(el: ElementRef<'_>, out: &mut String) {
    for child in el.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
        } else if let Some(child_el) = ElementRef::wrap(child) {
            if EXCLUDED_TAGS.contains(&child_el.value().name()) {
                continue;
            }
            collect_visible_text(child_el, out);
        }
    }
}

fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}
