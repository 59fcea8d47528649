use std::path::PathBuf;

pub const DEFAULT_EMBEDDING_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
    #[error("{key} must be set")]
    Missing { key: &'static str },
}

/// Which vector store backend holds the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    /// Flat JSON index inside the persistence directory.
    Local,
    /// Qdrant collection reached over gRPC.
    Qdrant,
}

/// How documents are cut into chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitterKind {
    Boundary,
    Window,
}

/// Runtime settings, resolved once at startup and handed to every component.
#[derive(Debug, Clone)]
pub struct Settings {
    pub source_dir: PathBuf,
    pub persist_dir: PathBuf,
    pub ledger_path: PathBuf,
    pub ingestion_log_file: PathBuf,
    pub embedding_model: String,
    pub embedding_batch_size: usize,
    pub llm_model: Option<String>,
    pub ollama_host: String,
    pub store: StoreKind,
    pub qdrant_url: String,
    pub qdrant_collection: String,
    pub extensions: Vec<String>,
    pub splitter: SplitterKind,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
    pub replace_modified_sources: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("Documents"),
            persist_dir: PathBuf::from("db"),
            ledger_path: PathBuf::from("processed_files.json"),
            ingestion_log_file: PathBuf::from("ingestion.log"),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            embedding_batch_size: 32,
            llm_model: None,
            ollama_host: "http://localhost:11434".to_string(),
            store: StoreKind::Local,
            qdrant_url: "http://localhost:6334".to_string(),
            qdrant_collection: "documents".to_string(),
            extensions: vec!["md".to_string()],
            splitter: SplitterKind::Boundary,
            chunk_size: 1000,
            chunk_overlap: 200,
            top_k: 4,
            replace_modified_sources: true,
        }
    }
}

impl Settings {
    /// Reads settings from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is present but cannot be parsed, or if
    /// the chunking parameters are inconsistent.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from an arbitrary key lookup. Unset or blank keys keep
    /// their defaults.
    ///
    /// # Errors
    ///
    /// See [`Settings::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let mut settings = Self::default();

        if let Some(v) = get("SOURCE_DIRECTORY") {
            settings.source_dir = PathBuf::from(v);
        }
        if let Some(v) = get("PERSIST_DIRECTORY") {
            settings.persist_dir = PathBuf::from(v);
        }
        if let Some(v) = get("PROCESSED_FILES_JSON") {
            settings.ledger_path = PathBuf::from(v);
        }
        if let Some(v) = get("INGESTION_LOG_FILE") {
            settings.ingestion_log_file = PathBuf::from(v);
        }
        if let Some(v) = get("EMBEDDING_MODEL_NAME") {
            settings.embedding_model = v;
        }
        if let Some(v) = get("EMBEDDING_BATCH_SIZE") {
            settings.embedding_batch_size = parse_positive("EMBEDDING_BATCH_SIZE", &v)?;
        }
        settings.llm_model = get("OLLAMA_MODEL");
        if let Some(v) = get("OLLAMA_HOST") {
            settings.ollama_host = v;
        }
        if let Some(v) = get("VECTOR_STORE") {
            settings.store = match v.to_ascii_lowercase().as_str() {
                "local" => StoreKind::Local,
                "qdrant" => StoreKind::Qdrant,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "VECTOR_STORE",
                        value: v,
                        reason: "expected `local` or `qdrant`".to_string(),
                    });
                }
            };
        }
        if let Some(v) = get("QDRANT_URL") {
            settings.qdrant_url = v;
        }
        if let Some(v) = get("QDRANT_COLLECTION") {
            settings.qdrant_collection = v;
        }
        if let Some(v) = get("SOURCE_EXTENSIONS") {
            settings.extensions = parse_extensions(&v);
            if settings.extensions.is_empty() {
                return Err(ConfigError::Invalid {
                    key: "SOURCE_EXTENSIONS",
                    value: v,
                    reason: "no extensions listed".to_string(),
                });
            }
        }
        if let Some(v) = get("SPLITTER") {
            settings.splitter = match v.to_ascii_lowercase().as_str() {
                "boundary" => SplitterKind::Boundary,
                "window" => SplitterKind::Window,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "SPLITTER",
                        value: v,
                        reason: "expected `boundary` or `window`".to_string(),
                    });
                }
            };
        }
        if let Some(v) = get("CHUNK_SIZE") {
            settings.chunk_size = parse_positive("CHUNK_SIZE", &v)?;
        }
        if let Some(v) = get("CHUNK_OVERLAP") {
            settings.chunk_overlap = v.parse().map_err(|e: std::num::ParseIntError| {
                ConfigError::Invalid {
                    key: "CHUNK_OVERLAP",
                    value: v.clone(),
                    reason: e.to_string(),
                }
            })?;
        }
        if let Some(v) = get("RETRIEVER_TOP_K") {
            settings.top_k = parse_positive("RETRIEVER_TOP_K", &v)?;
        }
        if let Some(v) = get("REPLACE_MODIFIED_SOURCES") {
            settings.replace_modified_sources = parse_bool("REPLACE_MODIFIED_SOURCES", &v)?;
        }

        if settings.chunk_overlap >= settings.chunk_size {
            return Err(ConfigError::Invalid {
                key: "CHUNK_OVERLAP",
                value: settings.chunk_overlap.to_string(),
                reason: format!("must be smaller than CHUNK_SIZE ({})", settings.chunk_size),
            });
        }

        Ok(settings)
    }

    /// The language model name, required by the query service.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] when `OLLAMA_MODEL` was not provided.
    pub fn require_llm_model(&self) -> Result<&str, ConfigError> {
        self.llm_model
            .as_deref()
            .ok_or(ConfigError::Missing { key: "OLLAMA_MODEL" })
    }
}

fn parse_positive(key: &'static str, value: &str) -> Result<usize, ConfigError> {
    match value.parse::<usize>() {
        Ok(0) => Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
            reason: "must be greater than zero".to_string(),
        }),
        Ok(n) => Ok(n),
        Err(e) => Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
            reason: e.to_string(),
        }),
    }
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}

fn parse_extensions(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings_from(pairs: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Settings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let settings = settings_from(&[]).unwrap();
        assert_eq!(settings.source_dir, PathBuf::from("Documents"));
        assert_eq!(settings.persist_dir, PathBuf::from("db"));
        assert_eq!(settings.ledger_path, PathBuf::from("processed_files.json"));
        assert_eq!(settings.embedding_model, DEFAULT_EMBEDDING_MODEL);
        assert_eq!(settings.extensions, vec!["md".to_string()]);
        assert_eq!(settings.store, StoreKind::Local);
        assert_eq!((settings.chunk_size, settings.chunk_overlap), (1000, 200));
        assert!(settings.llm_model.is_none());
    }

    #[test]
    fn overrides_are_read() {
        let settings = settings_from(&[
            ("SOURCE_DIRECTORY", "notes"),
            ("VECTOR_STORE", "Qdrant"),
            ("SOURCE_EXTENSIONS", ".md, TXT"),
            ("CHUNK_SIZE", "500"),
            ("CHUNK_OVERLAP", "50"),
            ("OLLAMA_MODEL", "llama3"),
            ("SPLITTER", "window"),
            ("REPLACE_MODIFIED_SOURCES", "no"),
        ])
        .unwrap();
        assert_eq!(settings.source_dir, PathBuf::from("notes"));
        assert_eq!(settings.store, StoreKind::Qdrant);
        assert_eq!(settings.extensions, vec!["md".to_string(), "txt".to_string()]);
        assert_eq!(settings.chunk_size, 500);
        assert_eq!(settings.chunk_overlap, 50);
        assert_eq!(settings.require_llm_model().unwrap(), "llama3");
        assert_eq!(settings.splitter, SplitterKind::Window);
        assert!(!settings.replace_modified_sources);
    }

    #[test]
    fn blank_values_keep_defaults() {
        let settings = settings_from(&[("PERSIST_DIRECTORY", "  "), ("OLLAMA_MODEL", "")]).unwrap();
        assert_eq!(settings.persist_dir, PathBuf::from("db"));
        assert_eq!(
            settings.require_llm_model(),
            Err(ConfigError::Missing { key: "OLLAMA_MODEL" })
        );
    }

    #[test]
    fn overlap_must_be_smaller_than_size() {
        let err = settings_from(&[("CHUNK_SIZE", "100"), ("CHUNK_OVERLAP", "100")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "CHUNK_OVERLAP", .. }));
    }

    #[test]
    fn rejects_unparseable_numbers_and_kinds() {
        assert!(settings_from(&[("CHUNK_SIZE", "lots")]).is_err());
        assert!(settings_from(&[("RETRIEVER_TOP_K", "0")]).is_err());
        assert!(settings_from(&[("VECTOR_STORE", "chroma")]).is_err());
        assert!(settings_from(&[("SOURCE_EXTENSIONS", ", ,")]).is_err());
    }
}
