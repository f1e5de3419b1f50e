//! Sidebar listing the collections

use eframe::egui;

use crate::app::BytedeskApp;

/// Collection navigation
pub struct Sidebar;

impl Sidebar {
    /// Show the sidebar
    pub fn show(ui: &mut egui::Ui, app: &mut BytedeskApp) {
        ui.vertical(|ui| {
            ui.heading("Collections");
            ui.separator();

            egui::ScrollArea::vertical()
                .id_salt("collections_scroll")
                .show(ui, |ui| {
                    let mut clicked = None;
                    for (index, collection) in app.collections.iter().enumerate() {
                        let count = app.store.list(&collection.path).len();
                        let label = format!("{} ({})", collection.name, count);
                        if ui
                            .selectable_label(index == app.selected, label)
                            .on_hover_text(&collection.path)
                            .clicked()
                        {
                            clicked = Some(index);
                        }
                    }

                    if let Some(index) = clicked {
                        app.select_collection(index);
                    }
                });
        });
    }
}
