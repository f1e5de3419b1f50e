//! Loads the TeX engine from its symbol table resource

use std::path::PathBuf;
use std::sync::Arc;

use super::symbols::{SymbolTable, BUNDLED_TABLE};
use super::tex::{TexEngine, TexOptions};
use super::{EngineFuture, EngineLoadError, EngineLoader, TypesetEngine};
use crate::core::config::EngineConfig;

/// Where the symbol table comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolSource {
    /// Table compiled into the binary
    Bundled,
    /// Table read from a file at load time
    File(PathBuf),
}

/// Builds a [`TexEngine`] from a symbol table
pub struct SymbolTableLoader {
    source: SymbolSource,
    options: TexOptions,
}

impl SymbolTableLoader {
    pub fn new(source: SymbolSource, options: TexOptions) -> Self {
        Self { source, options }
    }

    /// Loader described by the engine section of the config
    pub fn from_config(config: &EngineConfig) -> Self {
        let source = match &config.symbol_table {
            Some(path) => SymbolSource::File(path.clone()),
            None => SymbolSource::Bundled,
        };
        Self::new(
            source,
            TexOptions {
                number_equations: config.number_equations,
            },
        )
    }

    async fn read_table(&self) -> Result<String, EngineLoadError> {
        match &self.source {
            SymbolSource::Bundled => Ok(BUNDLED_TABLE.to_string()),
            SymbolSource::File(path) => {
                tracing::debug!("Reading symbol table from {}", path.display());
                tokio::fs::read_to_string(path)
                    .await
                    .map_err(|e| EngineLoadError::Resource {
                        path: path.display().to_string(),
                        reason: e.to_string(),
                    })
            }
        }
    }
}

impl EngineLoader for SymbolTableLoader {
    fn load(&self) -> EngineFuture<'_, Result<Arc<dyn TypesetEngine>, EngineLoadError>> {
        Box::pin(async move {
            let json = self.read_table().await?;
            let table = SymbolTable::parse(&json)
                .map_err(|e| EngineLoadError::InvalidTable(e.to_string()))?;
            if table.is_empty() {
                return Err(EngineLoadError::InvalidTable("no symbols defined".to_string()));
            }

            tracing::info!("Loaded symbol table v{} ({} symbols)", table.version, table.len());
            Ok(Arc::new(TexEngine::new(table, self.options)) as Arc<dyn TypesetEngine>)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::SurfaceId;

    #[tokio::test]
    async fn test_bundled_table_loads() {
        let loader = SymbolTableLoader::from_config(&EngineConfig::default());
        let engine = loader.load().await.unwrap();
        let output = engine.typeset(SurfaceId::next(), "$$\\pi r^2$$").await.unwrap();
        assert_eq!(output.text, "πr²");
    }

    #[tokio::test]
    async fn test_file_table_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("symbols.json");
        std::fs::write(&path, r#"{"version": 2, "ordinary": {"heart": "♥"}}"#).unwrap();

        let loader = SymbolTableLoader::new(SymbolSource::File(path), TexOptions::default());
        let engine = loader.load().await.unwrap();
        let output = engine.typeset(SurfaceId::next(), "\\heart").await.unwrap();
        assert_eq!(output.text, "♥");
    }

    #[tokio::test]
    async fn test_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let loader = SymbolTableLoader::new(
            SymbolSource::File(dir.path().join("missing.json")),
            TexOptions::default(),
        );
        assert!(matches!(
            loader.load().await,
            Err(EngineLoadError::Resource { .. })
        ));
    }

    #[tokio::test]
    async fn test_garbage_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("symbols.json");
        std::fs::write(&path, "<script>").unwrap();

        let loader = SymbolTableLoader::new(SymbolSource::File(path), TexOptions::default());
        assert!(matches!(
            loader.load().await,
            Err(EngineLoadError::InvalidTable(_))
        ));
    }
}
