//! Entry editor: renders a collection's properties as a form

use std::collections::HashMap;

use chrono::Utc;
use eframe::egui::{self, RichText, TextEdit};
use egui_commonmark::CommonMarkCache;
use serde_json::{Map, Number, Value};

use super::helper_text::FieldHelperText;
use super::latex_field::LatexField;
use super::paragraph_field::ParagraphField;
use crate::core::schema::{AutoValue, Collection, DataType, Property, StringKind};
use crate::core::validation::{issues_at, Issue};
use crate::core::value::FieldValue;
use crate::field::{FieldContext, FieldFlags};

/// Stateful field widgets, mounted per property path
enum FieldWidget {
    Latex(LatexField),
    Paragraph(ParagraphField),
}

/// Form for one entry
pub struct EntryForm {
    context: FieldContext,
    widgets: HashMap<String, FieldWidget>,
    commonmark_cache: CommonMarkCache,
    /// Path of a field that should take focus when it is first shown
    focus_path: Option<String>,
}

impl EntryForm {
    pub fn new(context: FieldContext) -> Self {
        Self {
            context,
            widgets: HashMap::new(),
            commonmark_cache: CommonMarkCache::default(),
            focus_path: None,
        }
    }

    /// Unmount all field widgets, e.g. when another entry is opened
    pub fn reset(&mut self) {
        self.widgets.clear();
        self.focus_path = None;
    }

    /// Show every property of the entry. Returns true when a value changed.
    pub fn show(
        &mut self,
        ui: &mut egui::Ui,
        collection: &Collection,
        values: &mut Map<String, Value>,
        issues: &[Issue],
        submitting: bool,
    ) -> bool {
        let mut changed = false;

        for (key, property) in &collection.properties {
            let value = values.entry(key.clone()).or_insert(Value::Null);
            ui.push_id(key, |ui| {
                changed |= self.show_property(ui, key, property, value, issues, submitting);
            });
            ui.add_space(8.0);
        }

        changed
    }

    fn show_property(
        &mut self,
        ui: &mut egui::Ui,
        path: &str,
        property: &Property,
        value: &mut Value,
        issues: &[Issue],
        submitting: bool,
    ) -> bool {
        let error = issues_at(issues, path);
        let title = if property.validation.required {
            format!("{} *", property.name)
        } else {
            property.name.clone()
        };

        let mut changed = false;
        match &property.data_type {
            DataType::String(kind) => {
                ui.label(RichText::new(title).strong());
                changed = self.show_string(ui, path, kind, value, error, submitting);
            }
            DataType::Reference(target) => {
                ui.label(RichText::new(title).strong());
                changed = text_input(ui, value, &format!("Entry id in {}", target), false, submitting);
            }
            DataType::Number => {
                ui.label(RichText::new(title).strong());
                let mut number = value.as_f64().unwrap_or(0.0);
                let response = ui.add_enabled(!submitting, egui::DragValue::new(&mut number));
                if response.changed() {
                    *value = Number::from_f64(number).map(Value::Number).unwrap_or(Value::Null);
                    changed = true;
                }
            }
            DataType::Boolean => {
                let mut checked = value.as_bool().unwrap_or(false);
                if ui
                    .add_enabled(!submitting, egui::Checkbox::new(&mut checked, title))
                    .changed()
                {
                    *value = Value::Bool(checked);
                    changed = true;
                }
            }
            DataType::Date(auto) => {
                ui.label(RichText::new(title).strong());
                match auto {
                    Some(AutoValue::OnCreate) | Some(AutoValue::OnUpdate) => {
                        let shown = value.as_str().unwrap_or("set on save");
                        ui.label(RichText::new(shown).weak());
                    }
                    None => {
                        changed = text_input(ui, value, "YYYY-MM-DDTHH:MM:SSZ", false, submitting);
                    }
                }
            }
            DataType::Paragraph => {
                let current = FieldValue::from_json(value);
                let flags = self.flags(path, error, submitting);
                let context = &self.context;
                let widget = self.widgets.entry(path.to_string()).or_insert_with(|| {
                    FieldWidget::Paragraph(ParagraphField::new(context.pipeline(), context.rows))
                });
                if let FieldWidget::Paragraph(field) = widget {
                    field.show(ui, &current, flags, &mut self.commonmark_cache, |new_value| {
                        *value = new_value.to_json();
                        changed = true;
                    });
                }
            }
            DataType::Array(of) => {
                ui.label(RichText::new(title).strong());
                changed = self.show_array(ui, path, of, value, issues, submitting);
            }
            DataType::Map(properties) => {
                ui.label(RichText::new(title).strong());
                if !value.is_object() {
                    *value = property.default_value(Utc::now());
                }
                if let Some(map) = value.as_object_mut() {
                    ui.indent(path, |ui| {
                        for (key, sub) in properties {
                            let sub_path = format!("{}.{}", path, key);
                            let sub_value = map.entry(key.clone()).or_insert(Value::Null);
                            ui.push_id(key, |ui| {
                                changed |= self.show_property(
                                    ui, &sub_path, sub, sub_value, issues, submitting,
                                );
                            });
                        }
                    });
                }
            }
            DataType::OneOf {
                type_field,
                value_field,
                variants,
            } => {
                let tag = value
                    .get(type_field)
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                match variants.iter().find(|(name, _)| *name == tag) {
                    Some((_, variant)) => {
                        if let Some(map) = value.as_object_mut() {
                            let inner = map.entry(value_field.clone()).or_insert(Value::Null);
                            let inner_path = format!("{}.{}", path, value_field);
                            changed = self.show_property(
                                ui, &inner_path, variant, inner, issues, submitting,
                            );
                        }
                    }
                    None => {
                        ui.label(
                            RichText::new(format!("Unsupported {} '{}'", type_field, tag))
                                .color(ui.visuals().warn_fg_color),
                        );
                    }
                }
            }
        }

        FieldHelperText::show(ui, property.description.as_deref(), error);
        changed
    }

    fn show_string(
        &mut self,
        ui: &mut egui::Ui,
        path: &str,
        kind: &StringKind,
        value: &mut Value,
        error: Option<&str>,
        submitting: bool,
    ) -> bool {
        match kind {
            StringKind::Plain => text_input(ui, value, "", false, submitting),
            StringKind::Multiline => text_input(ui, value, "", true, submitting),
            StringKind::Markdown => text_input(ui, value, "Markdown", true, submitting),
            StringKind::Storage(storage_path) => text_input(
                ui,
                value,
                &format!("File path under {}/", storage_path),
                false,
                submitting,
            ),
            StringKind::Latex => {
                let current = value.as_str().unwrap_or_default().to_string();
                let flags = self.flags(path, error, submitting);
                let context = &self.context;
                let widget = self.widgets.entry(path.to_string()).or_insert_with(|| {
                    FieldWidget::Latex(LatexField::new(context.pipeline(), context.rows))
                });

                let mut changed = false;
                if let FieldWidget::Latex(field) = widget {
                    field.show(ui, &current, flags, |text| {
                        *value = Value::String(text);
                        changed = true;
                    });
                }
                changed
            }
        }
    }

    fn show_array(
        &mut self,
        ui: &mut egui::Ui,
        path: &str,
        of: &Property,
        value: &mut Value,
        issues: &[Issue],
        submitting: bool,
    ) -> bool {
        if !value.is_array() {
            *value = Value::Array(Vec::new());
        }
        let Some(items) = value.as_array_mut() else {
            return false;
        };

        let mut changed = false;
        let mut remove = None;
        ui.indent(path, |ui| {
            for (i, item) in items.iter_mut().enumerate() {
                let item_path = format!("{}[{}]", path, i);
                ui.push_id(i, |ui| {
                    egui::Frame::group(ui.style()).show(ui, |ui| {
                        ui.set_width(ui.available_width());
                        changed |=
                            self.show_property(ui, &item_path, of, item, issues, submitting);
                        if ui
                            .add_enabled(!submitting, egui::Button::new("Remove").small())
                            .clicked()
                        {
                            remove = Some(i);
                        }
                    });
                });
            }

            ui.horizontal(|ui| {
                for (label, new_item, focus) in add_options(of) {
                    if ui
                        .add_enabled(!submitting, egui::Button::new(format!("+ {}", label)))
                        .clicked()
                    {
                        let index = items.len();
                        items.push(new_item);
                        self.focus_path = focus.map(|suffix| format!("{}[{}]{}", path, index, suffix));
                        changed = true;
                    }
                }
            });
        });

        if let Some(i) = remove {
            items.remove(i);
            // Indices shift, so widgets below the removed item are remounted
            let prefix = format!("{}[", path);
            self.widgets.retain(|key, _| !key.starts_with(&prefix));
            changed = true;
        }

        changed
    }

    /// Flags for a typeset field, consuming a pending focus request
    fn flags<'a>(&mut self, path: &str, error: Option<&'a str>, submitting: bool) -> FieldFlags<'a> {
        let autofocus = self.focus_path.as_deref() == Some(path);
        if autofocus {
            self.focus_path = None;
        }
        FieldFlags {
            disabled: false,
            submitting,
            autofocus,
            error,
        }
    }
}

/// Buttons offered under an array: label, new item, and the suffix of the
/// path that should take focus
fn add_options(of: &Property) -> Vec<(String, Value, Option<String>)> {
    let now = Utc::now();
    match &of.data_type {
        DataType::OneOf {
            type_field,
            value_field,
            variants,
        } => variants
            .iter()
            .map(|(name, variant)| {
                let mut item = Map::new();
                item.insert(type_field.clone(), Value::String(name.clone()));
                item.insert(value_field.clone(), variant.default_value(now));
                (
                    variant.name.clone(),
                    Value::Object(item),
                    Some(format!(".{}", value_field)),
                )
            })
            .collect(),
        _ => vec![(of.name.clone(), of.default_value(now), Some(String::new()))],
    }
}

/// Plain text input bound to a JSON string value
fn text_input(ui: &mut egui::Ui, value: &mut Value, hint: &str, multiline: bool, submitting: bool) -> bool {
    let mut text = value.as_str().unwrap_or_default().to_string();
    let editor = if multiline {
        TextEdit::multiline(&mut text).desired_rows(3)
    } else {
        TextEdit::singleline(&mut text)
    };
    let response = ui.add(
        editor
            .hint_text(hint)
            .desired_width(f32::INFINITY)
            .interactive(!submitting),
    );

    if response.changed() {
        *value = Value::String(text);
        true
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::runtime::Handle;

    use super::*;
    use crate::engine::testing::{FakeEngine, FakeLoader};
    use crate::engine::EngineHandle;

    fn form() -> EntryForm {
        EntryForm::new(FieldContext {
            engine: EngineHandle::new(FakeLoader::ready(FakeEngine::new())),
            runtime: Handle::current(),
            debounce: Duration::from_millis(300),
            repaint: Arc::new(|| {}),
            rows: 4,
        })
    }

    fn collect_text(shape: &egui::Shape, out: &mut Vec<String>) {
        match shape {
            egui::Shape::Text(text) => out.push(text.galley.text().to_string()),
            egui::Shape::Vec(shapes) => {
                for shape in shapes {
                    collect_text(shape, out);
                }
            }
            _ => {}
        }
    }

    /// Run one frame of the form and return every piece of text it painted
    fn painted_text(collection: &Collection, issues: &[Issue]) -> Vec<String> {
        let ctx = egui::Context::default();
        let mut form = form();
        let mut values = collection.new_entry(Utc::now());
        let output = ctx.run(egui::RawInput::default(), |ctx| {
            egui::CentralPanel::default().show(ctx, |ui| {
                form.show(ui, collection, &mut values, issues, false);
            });
        });

        let mut texts = Vec::new();
        for clipped in &output.shapes {
            collect_text(&clipped.shape, &mut texts);
        }
        texts
    }

    fn notes() -> Collection {
        Collection::new("Notes", "Note", "v1_notes").property(
            "body",
            Property::paragraph("Paragraph").description("Markdown text, or LaTeX"),
        )
    }

    #[tokio::test]
    async fn test_paragraph_description_is_shown() {
        let texts = painted_text(&notes(), &[]);
        assert!(texts.iter().any(|t| t == "Markdown text, or LaTeX"));
    }

    #[tokio::test]
    async fn test_paragraph_error_replaces_description() {
        let issues = vec![Issue {
            path: "body".to_string(),
            message: "Paragraph is required".to_string(),
        }];
        let texts = painted_text(&notes(), &issues);
        assert!(texts.iter().any(|t| t == "Paragraph is required"));
        assert!(!texts.iter().any(|t| t == "Markdown text, or LaTeX"));
    }
}
