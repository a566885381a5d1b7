//! Chat bubble rendering.
//!
//! Replies are split into typed blocks before drawing: fenced code becomes a
//! code block with a Copy button, backtick spans become inline code, and
//! everything else is plain text. Nothing in a reply is treated as markup.

use crate::theme::Palette;
use eframe::egui;
use regex::Regex;
use shared::ChatMessage;
use std::sync::OnceLock;

const COPIED_FEEDBACK_SECS: f64 = 2.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inline {
    Text(String),
    Code(String),
    LineBreak,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Paragraph(Vec<Inline>),
    Code {
        language: Option<String>,
        code: String,
    },
}

struct Patterns {
    fenced: Regex,
    inline: Regex,
    blank_run: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        fenced: Regex::new(r"```(\w*)\n([\s\S]+?)```").expect("fenced block pattern"),
        inline: Regex::new(r"`(.+?)`").expect("inline code pattern"),
        blank_run: Regex::new(r"\n\s*\n\s*\n").expect("blank line pattern"),
    })
}

/// Split a message into paragraphs and code blocks.
pub fn parse_message(text: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut rest_start = 0;

    for caps in patterns().fenced.captures_iter(text) {
        let (Some(whole), Some(code)) = (caps.get(0), caps.get(2)) else {
            continue;
        };
        push_prose(&mut blocks, &text[rest_start..whole.start()]);
        let language = caps
            .get(1)
            .map(|m| m.as_str())
            .filter(|l| !l.is_empty())
            .map(str::to_string);
        blocks.push(Block::Code {
            language,
            code: code.as_str().trim().to_string(),
        });
        rest_start = whole.end();
    }
    push_prose(&mut blocks, &text[rest_start..]);
    blocks
}

fn push_prose(blocks: &mut Vec<Block>, prose: &str) {
    let collapsed = patterns().blank_run.replace_all(prose, "\n\n");
    for paragraph in collapsed.split("\n\n") {
        let paragraph = paragraph.trim();
        if paragraph.is_empty() {
            continue;
        }
        let mut inlines = Vec::new();
        for (i, line) in paragraph.split('\n').enumerate() {
            if i > 0 {
                inlines.push(Inline::LineBreak);
            }
            push_inline(&mut inlines, line);
        }
        blocks.push(Block::Paragraph(inlines));
    }
}

fn push_inline(inlines: &mut Vec<Inline>, line: &str) {
    let mut last = 0;
    for caps in patterns().inline.captures_iter(line) {
        let (Some(whole), Some(code)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if whole.start() > last {
            inlines.push(Inline::Text(line[last..whole.start()].to_string()));
        }
        inlines.push(Inline::Code(code.as_str().to_string()));
        last = whole.end();
    }
    if last < line.len() {
        inlines.push(Inline::Text(line[last..].to_string()));
    }
}

/// Draw one transcript entry.
pub fn show_message(ui: &mut egui::Ui, msg: &ChatMessage, palette: &Palette) {
    let (fill, text_color) = if msg.is_user() {
        (palette.user_message_background, palette.user_message_text)
    } else {
        (palette.message_background, palette.message_text)
    };

    egui::Frame::none()
        .fill(fill)
        .stroke(egui::Stroke::new(1.0, palette.border))
        .rounding(egui::Rounding::same(8.0))
        .inner_margin(egui::Margin::same(10.0))
        .show(ui, |ui| {
            ui.set_width(ui.available_width());
            ui.label(
                egui::RichText::new(msg.sender.display_name())
                    .strong()
                    .size(13.0)
                    .color(text_color),
            );
            ui.add_space(4.0);
            if msg.is_user() {
                ui.label(egui::RichText::new(&msg.text).size(14.0).color(text_color));
            } else {
                for (i, block) in parse_message(&msg.text).iter().enumerate() {
                    show_block(ui, block, palette, text_color, ui.id().with(("block", i)));
                }
            }
        });
    ui.add_space(8.0);
}

/// Placeholder bubble while a reply is on its way.
pub fn show_thinking(ui: &mut egui::Ui, palette: &Palette) {
    egui::Frame::none()
        .fill(palette.message_background)
        .rounding(egui::Rounding::same(8.0))
        .inner_margin(egui::Margin::same(10.0))
        .show(ui, |ui| {
            ui.horizontal(|ui| {
                ui.spinner();
                ui.label(
                    egui::RichText::new("Thinking...")
                        .italics()
                        .color(palette.message_text),
                );
            });
        });
}

fn show_block(
    ui: &mut egui::Ui,
    block: &Block,
    palette: &Palette,
    text_color: egui::Color32,
    id: egui::Id,
) {
    match block {
        Block::Paragraph(inlines) => {
            ui.horizontal_wrapped(|ui| {
                ui.spacing_mut().item_spacing.x = 0.0;
                for inline in inlines {
                    match inline {
                        Inline::Text(text) => {
                            ui.label(egui::RichText::new(text).size(14.0).color(text_color));
                        }
                        Inline::Code(code) => {
                            egui::Frame::none()
                                .fill(palette.dark_background)
                                .rounding(egui::Rounding::same(4.0))
                                .inner_margin(egui::Margin::symmetric(4.0, 1.0))
                                .show(ui, |ui| {
                                    ui.label(
                                        egui::RichText::new(code)
                                            .monospace()
                                            .size(13.0)
                                            .color(text_color),
                                    );
                                });
                        }
                        Inline::LineBreak => ui.end_row(),
                    }
                }
            });
            ui.add_space(6.0);
        }
        Block::Code { language, code } => {
            egui::Frame::none()
                .fill(palette.dark_background)
                .stroke(egui::Stroke::new(1.0, palette.border))
                .rounding(egui::Rounding::same(8.0))
                .inner_margin(egui::Margin::same(12.0))
                .show(ui, |ui| {
                    ui.set_width(ui.available_width());
                    ui.horizontal(|ui| {
                        if let Some(language) = language {
                            ui.label(egui::RichText::new(language).small().weak());
                        }
                        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                            copy_button(ui, code, palette, id);
                        });
                    });
                    egui::ScrollArea::horizontal().id_source(id).show(ui, |ui| {
                        ui.label(
                            egui::RichText::new(code)
                                .monospace()
                                .size(13.0)
                                .color(text_color),
                        );
                    });
                });
            ui.add_space(6.0);
        }
    }
}

fn copy_button(ui: &mut egui::Ui, code: &str, palette: &Palette, id: egui::Id) {
    let now = ui.input(|i| i.time);
    let copied_at: Option<f64> = ui.ctx().data(|d| d.get_temp(id));
    let recently_copied = copied_at.map_or(false, |t| now - t < COPIED_FEEDBACK_SECS);

    let button = if recently_copied {
        egui::Button::new(egui::RichText::new("Copied!").color(egui::Color32::WHITE))
            .fill(palette.copied)
    } else {
        egui::Button::new("Copy").fill(palette.background)
    };
    if ui.add(button.small()).on_hover_text("Copy to clipboard").clicked() {
        ui.output_mut(|o| o.copied_text = code.to_string());
        ui.ctx().data_mut(|d| d.insert_temp(id, now));
    }
    if recently_copied {
        ui.ctx()
            .request_repaint_after(std::time::Duration::from_millis(250));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Inline {
        Inline::Text(s.to_string())
    }

    #[test]
    fn test_fenced_code_becomes_code_block() {
        let blocks = parse_message("Try this:\n```python\nprint(1)\n```\nDone.");
        assert_eq!(
            blocks,
            vec![
                Block::Paragraph(vec![text("Try this:")]),
                Block::Code {
                    language: Some("python".into()),
                    code: "print(1)".into()
                },
                Block::Paragraph(vec![text("Done.")]),
            ]
        );
    }

    #[test]
    fn test_fence_without_language() {
        let blocks = parse_message("```\nx < y && y > z\n```");
        assert_eq!(
            blocks,
            vec![Block::Code {
                language: None,
                code: "x < y && y > z".into()
            }]
        );
    }

    #[test]
    fn test_inline_code_and_line_breaks() {
        let blocks = parse_message("Use `dict.get`\nnot `dict[key]`.");
        assert_eq!(
            blocks,
            vec![Block::Paragraph(vec![
                text("Use "),
                Inline::Code("dict.get".into()),
                Inline::LineBreak,
                text("not "),
                Inline::Code("dict[key]".into()),
                text("."),
            ])]
        );
    }

    #[test]
    fn test_blank_runs_collapse_to_one_paragraph_break() {
        let blocks = parse_message("First\n\n\n\n  \nSecond");
        assert_eq!(
            blocks,
            vec![
                Block::Paragraph(vec![text("First")]),
                Block::Paragraph(vec![text("Second")]),
            ]
        );
    }

    #[test]
    fn test_markup_is_left_as_text() {
        let blocks = parse_message("<b>not bold</b> and an unterminated ``` fence");
        assert_eq!(
            blocks,
            vec![Block::Paragraph(vec![
                text("<b>not bold</b> and an unterminated "),
                Inline::Code("`".into()),
                text(" fence"),
            ])]
        );
    }
}
