//! Paragraph field values
//!
//! Paragraphs are stored in the legacy `{type, paragraph}` shape, where `type`
//! is `"string"` or `"latex"`. The editor works on the richer `{type, content}`
//! view model instead. Reading accepts either shape, writing always emits the
//! legacy one so existing records stay readable.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How the text of a paragraph is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FieldKind {
    /// Plain text, previewed as Markdown
    #[default]
    PlainText,
    /// TeX markup, previewed through the typesetting engine
    Markup,
}

impl FieldKind {
    /// Label shown in the mode selector
    pub fn label(self) -> &'static str {
        match self {
            FieldKind::PlainText => "Text",
            FieldKind::Markup => "LaTeX",
        }
    }
}

/// A paragraph value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    PlainText { text: String },
    Markup { source: String },
}

impl Default for FieldValue {
    fn default() -> Self {
        FieldValue::PlainText { text: String::new() }
    }
}

impl FieldValue {
    /// Build a value of the given kind
    pub fn new(kind: FieldKind, content: impl Into<String>) -> Self {
        match kind {
            FieldKind::PlainText => FieldValue::PlainText { text: content.into() },
            FieldKind::Markup => FieldValue::Markup { source: content.into() },
        }
    }

    pub fn kind(&self) -> FieldKind {
        match self {
            FieldValue::PlainText { .. } => FieldKind::PlainText,
            FieldValue::Markup { .. } => FieldKind::Markup,
        }
    }

    /// Raw text, regardless of interpretation
    pub fn content(&self) -> &str {
        match self {
            FieldValue::PlainText { text } => text,
            FieldValue::Markup { source } => source,
        }
    }

    /// Same text, different interpretation
    pub fn with_kind(&self, kind: FieldKind) -> Self {
        Self::new(kind, self.content())
    }

    /// Same interpretation, different text
    pub fn with_content(&self, content: impl Into<String>) -> Self {
        Self::new(self.kind(), content)
    }

    /// Read a stored value. Accepts the legacy and the view model shape;
    /// anything else reads as empty plain text.
    pub fn from_json(value: &Value) -> Self {
        if let Ok(legacy) = serde_json::from_value::<LegacyParagraph>(value.clone()) {
            return legacy.into();
        }
        if let Ok(view) = serde_json::from_value::<ParagraphView>(value.clone()) {
            return view.into();
        }
        if !value.is_null() {
            tracing::warn!("Unrecognised paragraph value, reading as empty text: {}", value);
        }
        Self::default()
    }

    /// Encode for storage, always in the legacy shape
    pub fn to_json(&self) -> Value {
        serde_json::to_value(LegacyParagraph::from(self.clone())).unwrap_or(Value::Null)
    }
}

/// Stored shape: `{"type": "string" | "latex", "paragraph": "..."}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyParagraph {
    #[serde(rename = "type")]
    pub kind: String,
    pub paragraph: String,
}

/// View model kind tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewKind {
    Text,
    Latex,
}

/// In-memory shape: `{"type": "text" | "latex", "content": "..."}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParagraphView {
    #[serde(rename = "type")]
    pub kind: ViewKind,
    pub content: String,
}

const LEGACY_TEXT: &str = "string";
const LEGACY_LATEX: &str = "latex";

impl From<LegacyParagraph> for FieldValue {
    fn from(legacy: LegacyParagraph) -> Self {
        // Any tag other than "string" has always been treated as LaTeX
        let kind = if legacy.kind == LEGACY_TEXT {
            FieldKind::PlainText
        } else {
            FieldKind::Markup
        };
        FieldValue::new(kind, legacy.paragraph)
    }
}

impl From<FieldValue> for LegacyParagraph {
    fn from(value: FieldValue) -> Self {
        match value {
            FieldValue::PlainText { text } => Self {
                kind: LEGACY_TEXT.to_string(),
                paragraph: text,
            },
            FieldValue::Markup { source } => Self {
                kind: LEGACY_LATEX.to_string(),
                paragraph: source,
            },
        }
    }
}

impl From<ParagraphView> for FieldValue {
    fn from(view: ParagraphView) -> Self {
        match view.kind {
            ViewKind::Text => FieldValue::PlainText { text: view.content },
            ViewKind::Latex => FieldValue::Markup { source: view.content },
        }
    }
}

impl From<FieldValue> for ParagraphView {
    fn from(value: FieldValue) -> Self {
        match value {
            FieldValue::PlainText { text } => Self {
                kind: ViewKind::Text,
                content: text,
            },
            FieldValue::Markup { source } => Self {
                kind: ViewKind::Latex,
                content: source,
            },
        }
    }
}

/// Legacy record to view model
pub fn legacy_to_view(legacy: LegacyParagraph) -> ParagraphView {
    FieldValue::from(legacy).into()
}

/// View model to legacy record
pub fn view_to_legacy(view: ParagraphView) -> LegacyParagraph {
    FieldValue::from(view).into()
}
