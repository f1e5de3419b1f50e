//! Entry validation against a collection schema

use chrono::DateTime;
use regex_lite::Regex;
use serde_json::{Map, Value};

use super::schema::{Collection, DataType, Property};
use super::value::FieldValue;

/// A single validation problem
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    /// Location such as `sections[0].body[2].value`
    pub path: String,
    pub message: String,
}

/// Validate an entry. `others` are the other entries of the collection,
/// used for uniqueness checks.
pub fn validate_entry(
    collection: &Collection,
    values: &Map<String, Value>,
    others: &[&Map<String, Value>],
) -> Vec<Issue> {
    let mut issues = Vec::new();

    for (key, property) in &collection.properties {
        let value = values.get(key);
        validate_property(key, property, value, &mut issues);

        if property.validation.unique {
            if let Some(value) = value.filter(|v| !is_blank(v)) {
                if others.iter().any(|other| other.get(key) == Some(value)) {
                    issues.push(Issue {
                        path: key.clone(),
                        message: format!("{} must be unique", property.name),
                    });
                }
            }
        }
    }

    issues
}

/// Issues under `path`, for showing next to a field
pub fn issues_at<'a>(issues: &'a [Issue], path: &str) -> Option<&'a str> {
    issues
        .iter()
        .find(|issue| issue.path == path)
        .map(|issue| issue.message.as_str())
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

fn push(issues: &mut Vec<Issue>, path: &str, message: String) {
    issues.push(Issue {
        path: path.to_string(),
        message,
    });
}

fn validate_property(path: &str, property: &Property, value: Option<&Value>, issues: &mut Vec<Issue>) {
    let value = match value {
        Some(v) if !is_blank(v) => v,
        _ => {
            if property.validation.required {
                push(issues, path, format!("{} is required", property.name));
            }
            return;
        }
    };

    match &property.data_type {
        DataType::String(_) | DataType::Reference(_) => {
            let Some(text) = value.as_str() else {
                push(issues, path, format!("{} must be text", property.name));
                return;
            };
            if let Some(min) = property.validation.min {
                if text.chars().count() < min {
                    push(issues, path, format!("{} must be at least {} characters", property.name, min));
                    return;
                }
            }
            if let Some(pattern) = &property.validation.matches {
                match Regex::new(pattern) {
                    Ok(re) if !re.is_match(text) => {
                        push(issues, path, format!("{} has an invalid format", property.name));
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!("Skipping bad pattern for {}: {}", property.name, e),
                }
            }
        }
        DataType::Number => {
            let Some(number) = value.as_f64() else {
                push(issues, path, format!("{} must be a number", property.name));
                return;
            };
            if let Some(min) = property.validation.min {
                if number < min as f64 {
                    push(issues, path, format!("{} must be at least {}", property.name, min));
                }
            }
        }
        DataType::Boolean => {
            if !value.is_boolean() {
                push(issues, path, format!("{} must be yes or no", property.name));
            }
        }
        DataType::Date(_) => {
            let valid = value
                .as_str()
                .is_some_and(|s| DateTime::parse_from_rfc3339(s).is_ok());
            if !valid {
                push(issues, path, format!("{} is not a valid date", property.name));
            }
        }
        DataType::Paragraph => {
            let paragraph = FieldValue::from_json(value);
            if property.validation.required && paragraph.content().trim().is_empty() {
                push(issues, path, format!("{} is required", property.name));
            }
        }
        DataType::Array(of) => {
            let Some(items) = value.as_array() else {
                push(issues, path, format!("{} must be a list", property.name));
                return;
            };
            if let Some(min) = property.validation.min {
                if items.len() < min {
                    push(issues, path, format!("{} needs at least {} items", property.name, min));
                }
            }
            for (i, item) in items.iter().enumerate() {
                validate_property(&format!("{}[{}]", path, i), of, Some(item), issues);
            }
        }
        DataType::Map(properties) => {
            let Some(map) = value.as_object() else {
                push(issues, path, format!("{} must be a group of fields", property.name));
                return;
            };
            for (key, sub) in properties {
                validate_property(&format!("{}.{}", path, key), sub, map.get(key), issues);
            }
        }
        DataType::OneOf {
            type_field,
            value_field,
            variants,
        } => {
            let tag = value
                .as_object()
                .and_then(|map| map.get(type_field))
                .and_then(Value::as_str);
            let Some(tag) = tag else {
                push(issues, path, format!("{} has no {}", property.name, type_field));
                return;
            };
            let Some((_, variant)) = variants.iter().find(|(name, _)| name == tag) else {
                push(issues, path, format!("{} has unknown {} '{}'", property.name, type_field, tag));
                return;
            };
            let inner = value.get(value_field);
            validate_property(&format!("{}.{}", path, value_field), variant, inner, issues);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::collections;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    fn messages(issues: &[Issue]) -> Vec<(&str, &str)> {
        issues
            .iter()
            .map(|i| (i.path.as_str(), i.message.as_str()))
            .collect()
    }

    #[test]
    fn test_byte_series_accent_colour() {
        let collection = collections::byte_series();

        let good = object(json!({"title": "Maths", "accentColour": "#1a2B3c"}));
        assert!(validate_entry(&collection, &good, &[]).is_empty());

        let short = object(json!({"title": "Maths", "accentColour": "#abc"}));
        assert!(validate_entry(&collection, &short, &[]).is_empty());

        let bad = object(json!({"title": "Maths", "accentColour": "blue"}));
        assert_eq!(
            messages(&validate_entry(&collection, &bad, &[])),
            vec![("accentColour", "Accent hexadecimal colour has an invalid format")]
        );
    }

    #[test]
    fn test_required_and_unique() {
        let collection = collections::byte_series();
        let existing = object(json!({"title": "Maths", "accentColour": "#fff"}));

        let entry = object(json!({"title": "Maths", "accentColour": ""}));
        let issues = validate_entry(&collection, &entry, &[&existing]);
        assert_eq!(
            messages(&issues),
            vec![
                ("title", "Title must be unique"),
                ("accentColour", "Accent hexadecimal colour is required"),
            ]
        );
    }

    #[test]
    fn test_slug_rules() {
        let collection = collections::nibbles();
        let slug = collection.get("slug").unwrap();

        let mut issues = Vec::new();
        validate_property("slug", slug, Some(&json!("abc")), &mut issues);
        assert_eq!(issues[0].message, "Slug must be at least 5 characters");

        issues.clear();
        validate_property("slug", slug, Some(&json!("Bad-Slug")), &mut issues);
        assert_eq!(issues[0].message, "Slug has an invalid format");

        issues.clear();
        validate_property("slug", slug, Some(&json!("good-slug-2")), &mut issues);
        assert!(issues.is_empty());
    }

    #[test]
    fn test_nested_sections() {
        let collection = collections::bytes();
        let sections = collection.get("sections").unwrap();

        let value = json!([
            {
                "title": "Intro",
                "body": [
                    {"type": "paragraph", "value": {"type": "latex", "paragraph": "x^2"}},
                    {"type": "paragraph", "value": {"type": "string", "paragraph": "  "}},
                    {"type": "video", "value": "clip.mp4"}
                ]
            }
        ]);

        let mut issues = Vec::new();
        validate_property("sections", sections, Some(&value), &mut issues);
        assert_eq!(
            messages(&issues),
            vec![
                ("sections[0].body[1].value", "Paragraph is required"),
                ("sections[0].body[2]", "Body has unknown type 'video'"),
            ]
        );
    }

    #[test]
    fn test_wrong_types_are_reported() {
        let collection = collections::recipes();
        let entry = object(json!({
            "title": 7,
            "source": "Grandma",
            "ingredients": [{"name": "Flour", "quantity": "lots"}],
            "steps": [{"instruction": "Mix"}],
            "isPublished": "yes",
            "publishDate": "yesterday",
            "timeTakenMinutes": 20
        }));

        let issues = validate_entry(&collection, &entry, &[]);
        assert_eq!(
            messages(&issues),
            vec![
                ("title", "Title must be text"),
                ("ingredients[0].quantity", "Quantity must be a number"),
                ("isPublished", "Is published? must be yes or no"),
                ("publishDate", "Publish date is not a valid date"),
            ]
        );
    }

    #[test]
    fn test_min_items() {
        let collection = collections::tech_blogs();
        let sections = collection.get("sections").unwrap();
        let mut issues = Vec::new();
        validate_property("sections", sections, Some(&json!([])), &mut issues);
        assert_eq!(issues[0].message, "Sections is required");
        assert_eq!(issues_at(&issues, "sections"), Some("Sections is required"));
    }
}
