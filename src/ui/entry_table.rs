//! Table of the entries in the selected collection

use eframe::egui;
use egui_extras::{Column, TableBuilder};

use crate::core::entry::Entry;
use crate::core::schema::Collection;

/// Entry list above the form
pub struct EntryTable;

impl EntryTable {
    /// Show the entries. Returns the id of a clicked row.
    pub fn show(
        ui: &mut egui::Ui,
        collection: &Collection,
        entries: &[Entry],
        active: Option<u64>,
    ) -> Option<u64> {
        if entries.is_empty() {
            ui.label(
                egui::RichText::new(format!("No {} yet", collection.name.to_lowercase())).weak(),
            );
            return None;
        }

        let mut clicked = None;
        TableBuilder::new(ui)
            .id_salt(&collection.path)
            .striped(true)
            .sense(egui::Sense::click())
            .max_scroll_height(160.0)
            .column(Column::exact(48.0))
            .column(Column::remainder())
            .column(Column::auto().at_least(64.0))
            .header(20.0, |mut header| {
                header.col(|ui| {
                    ui.strong("#");
                });
                header.col(|ui| {
                    ui.strong(&collection.singular_name);
                });
                header.col(|ui| {
                    ui.strong("Status");
                });
            })
            .body(|mut body| {
                for entry in entries {
                    body.row(20.0, |mut row| {
                        row.set_selected(active == Some(entry.id));
                        row.col(|ui| {
                            ui.label(entry.id.to_string());
                        });
                        row.col(|ui| {
                            ui.label(collection.entry_label(&entry.values));
                        });
                        row.col(|ui| {
                            ui.label(if entry.saved { "Saved" } else { "Draft" });
                        });
                        if row.response().clicked() {
                            clicked = Some(entry.id);
                        }
                    });
                }
            });

        clicked
    }
}
