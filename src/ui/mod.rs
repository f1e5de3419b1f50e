//! UI components for Bytedesk

pub mod editor;
pub mod entry_table;
pub mod helper_text;
pub mod latex_field;
pub mod paragraph_field;
pub mod preview;
pub mod sidebar;

use eframe::egui;

use crate::field::FieldFlags;

/// Apply focus and error styling to a field editor after it was added
pub(crate) fn mark_field(ui: &egui::Ui, response: &egui::Response, flags: FieldFlags<'_>) {
    if flags.autofocus {
        response.request_focus();
    }
    if flags.error.is_some() {
        ui.painter().rect_stroke(
            response.rect,
            egui::CornerRadius::same(2),
            egui::Stroke::new(1.0, ui.visuals().error_fg_color),
            egui::StrokeKind::Outside,
        );
    }
}
