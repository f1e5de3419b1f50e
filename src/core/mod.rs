//! Core functionality: field values, schemas, validation, entries and configuration

pub mod collections;
pub mod config;
pub mod entry;
pub mod schema;
pub mod validation;
pub mod value;
