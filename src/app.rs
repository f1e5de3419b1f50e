//! Main application state and UI coordination

use std::sync::Arc;

use chrono::Utc;
use eframe::egui;
use tokio::runtime::Handle;

use crate::core::{
    collections,
    config::AppConfig,
    entry::EntryStore,
    schema::Collection,
    validation::Issue,
};
use crate::engine::{EngineHandle, EngineLoadState};
use crate::field::{FieldContext, RepaintHook};
use crate::ui::{editor::EntryForm, entry_table::EntryTable, sidebar::Sidebar};

/// Main application state
pub struct BytedeskApp {
    /// Application configuration
    pub config: AppConfig,
    /// Collections the console can edit
    pub collections: Vec<Collection>,
    /// Index of the selected collection
    pub selected: usize,
    /// Entries created this session
    pub store: EntryStore,
    /// Entry shown in the form
    pub active_entry: Option<u64>,
    /// Validation issues from the last save of the active entry
    pub issues: Vec<Issue>,
    /// Form for the active entry
    pub form: EntryForm,
    /// Shared typesetting engine
    pub engine: Arc<EngineHandle>,
    /// Message shown in the status bar
    pub status: Option<String>,
    /// Whether sidebar is visible
    pub sidebar_visible: bool,
    /// Set when a save was requested; inputs stay read-only until it runs
    pub submitting: bool,
    /// Entry clicked this frame, opened once the panels are drawn
    pending_open: Option<u64>,
    pending_delete: bool,
}

impl BytedeskApp {
    /// Create a new application instance
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        config: AppConfig,
        engine: Arc<EngineHandle>,
        runtime: Handle,
    ) -> Self {
        Self::configure_style(&cc.egui_ctx, &config);

        let ctx = cc.egui_ctx.clone();
        let repaint: RepaintHook = Arc::new(move || ctx.request_repaint());
        let form = EntryForm::new(FieldContext {
            engine: Arc::clone(&engine),
            runtime,
            debounce: config.editor.debounce(),
            repaint,
            rows: config.editor.field_rows,
        });

        let collections = collections::all();
        let selected = config
            .last_collection
            .as_deref()
            .and_then(|path| collections.iter().position(|c| c.path == path))
            .unwrap_or(0);

        Self {
            config,
            collections,
            selected,
            store: EntryStore::new(),
            active_entry: None,
            issues: Vec::new(),
            form,
            engine,
            status: None,
            sidebar_visible: true,
            submitting: false,
            pending_open: None,
            pending_delete: false,
        }
    }

    /// Theme and font size from the config
    fn configure_style(ctx: &egui::Context, config: &AppConfig) {
        if config.ui.theme == "light" {
            ctx.set_visuals(egui::Visuals::light());
        } else {
            ctx.set_visuals(egui::Visuals::dark());
        }

        let size = config.editor.font_size;
        ctx.style_mut(|style| {
            for (text_style, font) in style.text_styles.iter_mut() {
                if matches!(text_style, egui::TextStyle::Body | egui::TextStyle::Monospace) {
                    font.size = size;
                }
            }
        });
    }

    /// Switch collections and remember the choice
    pub fn select_collection(&mut self, index: usize) {
        if index == self.selected || index >= self.collections.len() {
            return;
        }
        self.selected = index;
        self.close_entry();

        let path = self.collections[index].path.clone();
        tracing::info!("Selected collection {}", path);
        self.config.last_collection = Some(path);
        if let Err(e) = self.config.save() {
            tracing::error!("Failed to save config: {}", e);
        }
    }

    /// Show an entry in the form
    pub fn open_entry(&mut self, id: u64) {
        if self.active_entry == Some(id) {
            return;
        }
        self.form.reset();
        self.issues.clear();
        self.submitting = false;
        self.active_entry = Some(id);
    }

    fn close_entry(&mut self) {
        self.form.reset();
        self.issues.clear();
        self.submitting = false;
        self.active_entry = None;
    }

    /// Create an entry in the selected collection and open it
    pub fn new_entry(&mut self) {
        let Some(collection) = self.collections.get(self.selected) else {
            return;
        };
        let id = self.store.create(collection, Utc::now());
        self.status = Some(format!("New {}", collection.singular_name.to_lowercase()));
        self.open_entry(id);
    }

    /// Ask for the active entry to be saved on the next frame
    pub fn request_save(&mut self) {
        if self.active_entry.is_some() {
            self.submitting = true;
        }
    }

    /// Validate and save the active entry
    fn save_active_entry(&mut self) {
        self.submitting = false;
        let (Some(collection), Some(id)) = (self.collections.get(self.selected), self.active_entry)
        else {
            return;
        };

        match self.store.save(collection, id, Utc::now()) {
            Ok(()) => {
                self.issues.clear();
                self.status = Some(format!("Saved {}", collection.singular_name.to_lowercase()));
            }
            Err(issues) => {
                self.status = Some(match issues.len() {
                    1 => "1 field needs attention".to_string(),
                    n => format!("{} fields need attention", n),
                });
                self.issues = issues;
            }
        }
    }

    /// Remove the active entry
    pub fn delete_active_entry(&mut self) {
        let (Some(collection), Some(id)) = (self.collections.get(self.selected), self.active_entry)
        else {
            return;
        };
        let path = collection.path.clone();
        self.store.delete(&path, id);
        tracing::info!("Deleted {} entry {}", path, id);
        self.status = Some("Entry deleted".to_string());
        self.close_entry();
    }

    /// Render the top menu bar
    fn render_menu_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.menu_button("Entry", |ui| {
                    if ui.button("New").clicked() {
                        self.new_entry();
                        ui.close();
                    }
                    if ui
                        .add_enabled(self.active_entry.is_some(), egui::Button::new("Save"))
                        .clicked()
                    {
                        self.request_save();
                        ui.close();
                    }
                    if ui
                        .add_enabled(self.active_entry.is_some(), egui::Button::new("Delete"))
                        .clicked()
                    {
                        self.delete_active_entry();
                        ui.close();
                    }
                    ui.separator();
                    if ui.button("Exit").clicked() {
                        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                    }
                });

                ui.menu_button("View", |ui| {
                    if ui.button("Toggle Sidebar").clicked() {
                        self.sidebar_visible = !self.sidebar_visible;
                        ui.close();
                    }
                });
            });
        });
    }

    /// Render the status bar with the engine state
    fn render_status_bar(&self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if let Some(status) = &self.status {
                    ui.label(status);
                }
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    let engine = match self.engine.state() {
                        EngineLoadState::NotRequested => "Typesetting: idle".to_string(),
                        EngineLoadState::Loading => "Typesetting: loading".to_string(),
                        EngineLoadState::Ready => "Typesetting: ready".to_string(),
                        EngineLoadState::Failed(reason) => format!("Typesetting: failed ({})", reason),
                    };
                    ui.label(egui::RichText::new(engine).small().weak());
                });
            });
        });
    }

    /// Render the entry list and the active entry's form
    fn render_entries(&mut self, ui: &mut egui::Ui) {
        let Some(collection) = self.collections.get(self.selected) else {
            ui.label("No collections");
            return;
        };

        ui.horizontal(|ui| {
            ui.heading(&collection.name);
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if ui
                    .button(format!("New {}", collection.singular_name.to_lowercase()))
                    .clicked()
                {
                    let id = self.store.create(collection, Utc::now());
                    self.status = Some(format!("New {}", collection.singular_name.to_lowercase()));
                    self.pending_open = Some(id);
                }
            });
        });
        ui.separator();

        if let Some(id) = EntryTable::show(
            ui,
            collection,
            self.store.list(&collection.path),
            self.active_entry,
        ) {
            self.pending_open = Some(id);
        }
        ui.separator();

        let Some(id) = self.active_entry else {
            ui.label(egui::RichText::new("Select or create an entry").weak());
            return;
        };
        let Some(entry) = self.store.get_mut(&collection.path, id) else {
            return;
        };

        egui::ScrollArea::vertical()
            .id_salt("entry_form_scroll")
            .auto_shrink([false, false])
            .show(ui, |ui| {
                self.form
                    .show(ui, collection, &mut entry.values, &self.issues, self.submitting);

                ui.add_space(12.0);
                ui.horizontal(|ui| {
                    let label = if self.submitting { "Saving..." } else { "Save" };
                    if ui
                        .add_enabled(!self.submitting, egui::Button::new(label))
                        .clicked()
                    {
                        self.submitting = true;
                    }
                    if ui
                        .add_enabled(!self.submitting, egui::Button::new("Delete"))
                        .clicked()
                    {
                        self.pending_delete = true;
                    }
                });
            });
    }
}

impl eframe::App for BytedeskApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // A save requested last frame runs now, after inputs were drawn read-only
        if self.submitting {
            self.save_active_entry();
        }

        // Handle keyboard shortcuts
        let (save, toggle_sidebar, new_entry) = ctx.input(|i| {
            (
                i.modifiers.ctrl && i.key_pressed(egui::Key::S),
                i.modifiers.ctrl && i.key_pressed(egui::Key::B),
                i.modifiers.ctrl && i.key_pressed(egui::Key::N),
            )
        });
        if save {
            self.request_save();
        }
        if toggle_sidebar {
            self.sidebar_visible = !self.sidebar_visible;
        }
        if new_entry {
            self.new_entry();
        }

        self.render_menu_bar(ctx);
        self.render_status_bar(ctx);

        if self.sidebar_visible {
            egui::SidePanel::left("sidebar")
                .resizable(true)
                .default_width(self.config.ui.sidebar_width)
                .min_width(150.0)
                .show(ctx, |ui| {
                    Sidebar::show(ui, self);
                });
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            self.render_entries(ui);
        });

        if let Some(id) = self.pending_open.take() {
            self.open_entry(id);
        }
        if std::mem::take(&mut self.pending_delete) {
            self.delete_active_entry();
        }
        if self.submitting {
            ctx.request_repaint();
        }
    }
}
