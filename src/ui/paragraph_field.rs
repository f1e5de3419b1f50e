//! Paragraph field: text with a Markdown preview, or LaTeX with a typeset one
//!
//! The stored value keeps the legacy `{type, paragraph}` shape. Switching
//! the mode keeps the text as typed and only changes which preview is used.

use eframe::egui::{self, RichText, TextEdit};
use egui_commonmark::CommonMarkCache;

use super::preview::PreviewPane;
use crate::core::value::{FieldKind, FieldValue};
use crate::field::{FieldFlags, TypesetPipeline};

/// Editor for a paragraph property
pub struct ParagraphField {
    pipeline: TypesetPipeline,
    rows: usize,
}

impl ParagraphField {
    pub fn new(pipeline: TypesetPipeline, rows: usize) -> Self {
        Self { pipeline, rows }
    }

    /// Show the mode selector, editor and preview. `set_value` receives the
    /// new value on every edit and mode switch.
    pub fn show(
        &mut self,
        ui: &mut egui::Ui,
        value: &FieldValue,
        flags: FieldFlags<'_>,
        cache: &mut CommonMarkCache,
        mut set_value: impl FnMut(FieldValue),
    ) {
        self.pipeline.update(value.kind(), value.content());

        let mut kind = value.kind();
        ui.horizontal(|ui| {
            ui.label(RichText::new("Paragraph type *").strong());
            ui.add_enabled_ui(!flags.read_only(), |ui| {
                egui::ComboBox::from_id_salt("paragraph_type")
                    .selected_text(kind.label())
                    .show_ui(ui, |ui| {
                        for option in [FieldKind::PlainText, FieldKind::Markup] {
                            ui.selectable_value(&mut kind, option, option.label());
                        }
                    });
            });
        });

        let mut current = value.clone();
        if kind != value.kind() {
            tracing::debug!("Paragraph switched to {}", kind.label());
            current = value.with_kind(kind);
            self.pipeline.update(current.kind(), current.content());
            set_value(current.clone());
        }

        let hint = match kind {
            FieldKind::Markup => r"Enter LaTeX (e.g. \int_0^\infty x^2 \, dx or \frac{a}{b})",
            FieldKind::PlainText => "Enter text content (supports Markdown)",
        };
        let mut text = current.content().to_string();
        let mut editor = TextEdit::multiline(&mut text)
            .hint_text(hint)
            .desired_rows(self.rows)
            .desired_width(f32::INFINITY)
            .interactive(!flags.read_only());
        if kind == FieldKind::Markup {
            editor = editor.font(egui::TextStyle::Monospace);
        }
        let response = ui.add(editor);
        super::mark_field(ui, &response, flags);

        if response.changed() {
            current = current.with_content(text);
            self.pipeline.update(current.kind(), current.content());
            set_value(current);
        }

        PreviewPane::show(ui, &self.pipeline.snapshot(), cache);
    }
}
