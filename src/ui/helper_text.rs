//! Description or validation text under a field

use eframe::egui::{self, RichText};

pub struct FieldHelperText;

impl FieldHelperText {
    /// Errors take precedence over the property description
    pub fn show(ui: &mut egui::Ui, description: Option<&str>, error: Option<&str>) {
        if let Some(error) = error {
            ui.label(
                RichText::new(error)
                    .small()
                    .color(ui.visuals().error_fg_color),
            );
        } else if let Some(description) = description {
            ui.label(RichText::new(description).small().weak());
        }
    }
}
