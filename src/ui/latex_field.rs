//! LaTeX source field with a typeset preview

use eframe::egui::{self, TextEdit};

use super::preview::PreviewPane;
use crate::core::value::FieldKind;
use crate::field::{FieldFlags, TypesetPipeline};

/// Editor for a string property holding LaTeX
pub struct LatexField {
    pipeline: TypesetPipeline,
    rows: usize,
}

impl LatexField {
    pub fn new(pipeline: TypesetPipeline, rows: usize) -> Self {
        Self { pipeline, rows }
    }

    /// Show the editor and preview. `set_value` receives every edit.
    pub fn show(
        &mut self,
        ui: &mut egui::Ui,
        value: &str,
        flags: FieldFlags<'_>,
        mut set_value: impl FnMut(String),
    ) {
        self.pipeline.update(FieldKind::Markup, value);

        let mut text = value.to_string();
        let response = ui.add(
            TextEdit::multiline(&mut text)
                .hint_text(r"Enter LaTeX (e.g. \frac{a}{b} + c^2)")
                .font(egui::TextStyle::Monospace)
                .desired_rows(self.rows)
                .desired_width(f32::INFINITY)
                .interactive(!flags.read_only()),
        );
        super::mark_field(ui, &response, flags);

        if response.changed() {
            self.pipeline.update(FieldKind::Markup, &text);
            set_value(text);
        }

        PreviewPane::show_latex(ui, &self.pipeline.snapshot());
    }
}
