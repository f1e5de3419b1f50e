//! Symbol table resource for the TeX engine

use std::collections::HashMap;

use serde::Deserialize;

/// Table shipped with the binary
pub const BUNDLED_TABLE: &str = include_str!("../../assets/symbols.json");

/// How a control word is spaced when rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolClass {
    /// Letters and other ordinary symbols
    Ordinary,
    /// Binary operators, padded with spaces
    Binary,
    /// Relations and arrows, padded with spaces
    Relation,
    /// Named functions such as `\sin`, followed by a space
    Function,
    /// Large operators such as `\sum`
    LargeOperator,
}

/// Control word lookup table
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SymbolTable {
    pub version: u32,
    pub ordinary: HashMap<String, String>,
    pub binary: HashMap<String, String>,
    pub relation: HashMap<String, String>,
    pub large: HashMap<String, String>,
    pub functions: Vec<String>,
    /// `\mathbb` letters
    pub blackboard: HashMap<String, String>,
}

impl SymbolTable {
    /// Parse a table from its JSON text
    pub fn parse(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Look up a control word
    pub fn lookup(&self, name: &str) -> Option<(SymbolClass, &str)> {
        if let Some(s) = self.ordinary.get(name) {
            return Some((SymbolClass::Ordinary, s));
        }
        if let Some(s) = self.binary.get(name) {
            return Some((SymbolClass::Binary, s));
        }
        if let Some(s) = self.relation.get(name) {
            return Some((SymbolClass::Relation, s));
        }
        if let Some(s) = self.large.get(name) {
            return Some((SymbolClass::LargeOperator, s));
        }
        self.functions
            .iter()
            .find(|f| f.as_str() == name)
            .map(|f| (SymbolClass::Function, f.as_str()))
    }

    pub fn blackboard(&self, letter: &str) -> Option<&str> {
        self.blackboard.get(letter).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.ordinary.len()
            + self.binary.len()
            + self.relation.len()
            + self.large.len()
            + self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
