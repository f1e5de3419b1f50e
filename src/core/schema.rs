//! Declarative collection schemas
//!
//! A [`Collection`] lists the properties of its entries. Properties are built
//! with small builder methods and describe both how a value is edited and how
//! it is validated.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use super::value::FieldValue;

/// When a date property fills itself in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoValue {
    OnCreate,
    OnUpdate,
}

/// Editing flavour of a string property
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StringKind {
    Plain,
    Multiline,
    Markdown,
    /// LaTeX source with a typeset preview
    Latex,
    /// Path of a stored file; uploads happen elsewhere
    Storage(String),
}

/// Value shape of a property
#[derive(Debug, Clone)]
pub enum DataType {
    String(StringKind),
    Number,
    Boolean,
    Date(Option<AutoValue>),
    /// Id of an entry in another collection
    Reference(String),
    Array(Box<Property>),
    Map(Vec<(String, Property)>),
    /// Tagged items, `{type_field: variant, value_field: value}`
    OneOf {
        type_field: String,
        value_field: String,
        variants: Vec<(String, Property)>,
    },
    /// Text or LaTeX paragraph stored as `{type, paragraph}`
    Paragraph,
}

/// Validation rules
#[derive(Debug, Clone, Default)]
pub struct Validation {
    pub required: bool,
    pub unique: bool,
    /// Minimum characters for text, minimum value for numbers, minimum items
    /// for arrays
    pub min: Option<usize>,
    /// Regular expression text must match
    pub matches: Option<String>,
}

/// A single property of a collection or map
#[derive(Debug, Clone)]
pub struct Property {
    pub name: String,
    pub data_type: DataType,
    pub validation: Validation,
    pub description: Option<String>,
}

impl Property {
    fn new(name: &str, data_type: DataType) -> Self {
        Self {
            name: name.to_string(),
            data_type,
            validation: Validation::default(),
            description: None,
        }
    }

    pub fn string(name: &str) -> Self {
        Self::new(name, DataType::String(StringKind::Plain))
    }

    pub fn number(name: &str) -> Self {
        Self::new(name, DataType::Number)
    }

    pub fn boolean(name: &str) -> Self {
        Self::new(name, DataType::Boolean)
    }

    pub fn date(name: &str) -> Self {
        Self::new(name, DataType::Date(None))
    }

    pub fn reference(name: &str, path: &str) -> Self {
        Self::new(name, DataType::Reference(path.to_string()))
    }

    pub fn array(name: &str, of: Property) -> Self {
        Self::new(name, DataType::Array(Box::new(of)))
    }

    pub fn map(name: &str, properties: Vec<(&str, Property)>) -> Self {
        Self::new(name, DataType::Map(named(properties)))
    }

    pub fn one_of(name: &str, variants: Vec<(&str, Property)>) -> Self {
        Self::new(
            name,
            DataType::OneOf {
                type_field: "type".to_string(),
                value_field: "value".to_string(),
                variants: named(variants),
            },
        )
    }

    pub fn paragraph(name: &str) -> Self {
        Self::new(name, DataType::Paragraph)
    }

    pub fn latex(name: &str) -> Self {
        Self::new(name, DataType::String(StringKind::Latex))
    }

    pub fn multiline(mut self) -> Self {
        self.data_type = DataType::String(StringKind::Multiline);
        self
    }

    pub fn markdown(mut self) -> Self {
        self.data_type = DataType::String(StringKind::Markdown);
        self
    }

    pub fn storage(mut self, path: &str) -> Self {
        self.data_type = DataType::String(StringKind::Storage(path.to_string()));
        self
    }

    pub fn auto(mut self, auto: AutoValue) -> Self {
        self.data_type = DataType::Date(Some(auto));
        self
    }

    pub fn required(mut self) -> Self {
        self.validation.required = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.validation.unique = true;
        self
    }

    pub fn min(mut self, min: usize) -> Self {
        self.validation.min = Some(min);
        self
    }

    pub fn matches(mut self, pattern: &str) -> Self {
        self.validation.matches = Some(pattern.to_string());
        self
    }

    pub fn description(mut self, text: &str) -> Self {
        self.description = Some(text.to_string());
        self
    }

    /// Value of a freshly created entry
    pub fn default_value(&self, now: DateTime<Utc>) -> Value {
        match &self.data_type {
            DataType::String(_) | DataType::Reference(_) => Value::String(String::new()),
            DataType::Number => Value::Null,
            DataType::Boolean => Value::Bool(false),
            DataType::Date(Some(_)) => Value::String(now.to_rfc3339()),
            DataType::Date(None) => Value::Null,
            DataType::Array(_) => Value::Array(Vec::new()),
            DataType::Map(properties) => Value::Object(
                properties
                    .iter()
                    .map(|(key, p)| (key.clone(), p.default_value(now)))
                    .collect(),
            ),
            DataType::OneOf { .. } => Value::Null,
            DataType::Paragraph => FieldValue::default().to_json(),
        }
    }
}

fn named(properties: Vec<(&str, Property)>) -> Vec<(String, Property)> {
    properties
        .into_iter()
        .map(|(key, p)| (key.to_string(), p))
        .collect()
}

/// A collection of entries sharing one schema
#[derive(Debug, Clone)]
pub struct Collection {
    pub name: String,
    pub singular_name: String,
    /// Storage path, also used as the collection id
    pub path: String,
    pub properties: Vec<(String, Property)>,
}

impl Collection {
    pub fn new(name: &str, singular_name: &str, path: &str) -> Self {
        Self {
            name: name.to_string(),
            singular_name: singular_name.to_string(),
            path: path.to_string(),
            properties: Vec::new(),
        }
    }

    pub fn property(mut self, key: &str, property: Property) -> Self {
        self.properties.push((key.to_string(), property));
        self
    }

    pub fn get(&self, key: &str) -> Option<&Property> {
        self.properties
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, p)| p)
    }

    /// Values of a new entry, with `on_create` dates filled in
    pub fn new_entry(&self, now: DateTime<Utc>) -> Map<String, Value> {
        self.properties
            .iter()
            .map(|(key, p)| (key.clone(), p.default_value(now)))
            .collect()
    }

    /// Refresh `on_update` dates before a save
    pub fn touch(&self, values: &mut Map<String, Value>, now: DateTime<Utc>) {
        for (key, property) in &self.properties {
            if let DataType::Date(Some(AutoValue::OnUpdate)) = property.data_type {
                values.insert(key.clone(), Value::String(now.to_rfc3339()));
            }
        }
    }

    /// Text used to list an entry: its title if it has one
    pub fn entry_label(&self, values: &Map<String, Value>) -> String {
        values
            .get("title")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Untitled {}", self.singular_name.to_lowercase()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn collection() -> Collection {
        Collection::new("Notes", "Note", "v1_notes")
            .property("title", Property::string("Title").required())
            .property("draft", Property::boolean("Draft"))
            .property("created", Property::date("Created").auto(AutoValue::OnCreate))
            .property("updated", Property::date("Updated").auto(AutoValue::OnUpdate))
            .property("body", Property::array("Body", Property::paragraph("Paragraph")))
    }

    #[test]
    fn test_new_entry_defaults() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let entry = collection().new_entry(now);

        assert_eq!(entry["title"], Value::String(String::new()));
        assert_eq!(entry["draft"], Value::Bool(false));
        assert_eq!(entry["created"], Value::String(now.to_rfc3339()));
        assert_eq!(entry["body"], Value::Array(Vec::new()));
    }

    #[test]
    fn test_touch_only_updates_on_update_dates() {
        let created = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2024, 3, 2, 8, 30, 0).unwrap();
        let collection = collection();
        let mut entry = collection.new_entry(created);

        collection.touch(&mut entry, later);
        assert_eq!(entry["created"], Value::String(created.to_rfc3339()));
        assert_eq!(entry["updated"], Value::String(later.to_rfc3339()));
    }

    #[test]
    fn test_entry_label() {
        let collection = collection();
        let mut entry = collection.new_entry(Utc::now());
        assert_eq!(collection.entry_label(&entry), "Untitled note");

        entry.insert("title".to_string(), Value::String("Hello".to_string()));
        assert_eq!(collection.entry_label(&entry), "Hello");
    }

    #[test]
    fn test_paragraph_default_is_legacy_text() {
        let value = Property::paragraph("P").default_value(Utc::now());
        assert_eq!(value, serde_json::json!({"type": "string", "paragraph": ""}));
    }
}
