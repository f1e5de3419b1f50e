//! Preview pane shared by the LaTeX and paragraph fields

use eframe::egui::{self, RichText};
use egui_commonmark::{CommonMarkCache, CommonMarkViewer};

use crate::core::value::FieldKind;
use crate::engine::TypesetOutput;
use crate::field::PreviewSnapshot;

/// Framed preview below a field editor
pub struct PreviewPane;

impl PreviewPane {
    /// Show the preview for either mode. Nothing is shown for blank content.
    pub fn show(ui: &mut egui::Ui, snapshot: &PreviewSnapshot, cache: &mut CommonMarkCache) {
        match snapshot.kind {
            FieldKind::Markup => Self::show_latex(ui, snapshot),
            FieldKind::PlainText => Self::show_markdown(ui, snapshot, cache),
        }
    }

    /// LaTeX preview: typeset output, or the raw source while it is pending
    pub fn show_latex(ui: &mut egui::Ui, snapshot: &PreviewSnapshot) {
        if !snapshot.visible() {
            return;
        }

        Self::frame(ui, "LaTeX preview", |ui| {
            if let Some(advisory) = &snapshot.advisory {
                ui.label(
                    RichText::new(advisory)
                        .italics()
                        .color(ui.visuals().error_fg_color),
                );
            } else if let Some(output) = &snapshot.output {
                Self::show_output(ui, output);
            } else {
                ui.label(RichText::new(&snapshot.source).monospace().weak());
            }
        });
    }

    /// Markdown preview of plain text
    pub fn show_markdown(
        ui: &mut egui::Ui,
        snapshot: &PreviewSnapshot,
        cache: &mut CommonMarkCache,
    ) {
        if !snapshot.visible() {
            return;
        }

        Self::frame(ui, "Markdown preview", |ui| {
            CommonMarkViewer::new().show(ui, cache, &snapshot.source);
        });
    }

    fn show_output(ui: &mut egui::Ui, output: &TypesetOutput) {
        ui.horizontal(|ui| {
            ui.vertical_centered(|ui| {
                for line in output.text.lines() {
                    ui.label(RichText::new(line).size(18.0));
                }
            });
            if let Some(tag) = &output.tag {
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    ui.label(format!("({})", tag));
                });
            }
        });
    }

    fn frame(ui: &mut egui::Ui, title: &str, add_contents: impl FnOnce(&mut egui::Ui)) {
        egui::Frame::group(ui.style())
            .inner_margin(egui::Margin::same(8))
            .show(ui, |ui| {
                ui.set_width(ui.available_width());
                ui.label(RichText::new(title).small().weak());
                ui.add_space(4.0);
                add_contents(ui);
            });
    }
}
