use std::path::PathBuf;

use thiserror::Error;

/// Fatal conditions for a build job.
///
/// Filtered records are not errors: they are skipped and only show up in
/// the job statistics.
#[derive(Debug, Error)]
pub enum LexiconError {
    #[error("line {line}: malformed source record: {source}")]
    SourceFormat {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("line {line}: source record lacks required field `{field}`")]
    MissingField { line: usize, field: &'static str },

    #[error("line {line}: headword {word:?} reappears after other headwords; input must be grouped by headword")]
    UngroupedInput { line: usize, word: String },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("unsupported language combination: gloss language {gloss_lang:?} with lemma languages {lemma_langs:?}")]
    UnsupportedLanguage {
        gloss_lang: String,
        lemma_langs: Vec<String>,
    },

    #[error("missing resource {path:?}: {what}")]
    MissingResource { path: PathBuf, what: &'static str },

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("invalid regular expression: {0}")]
    Regex(#[from] regex::Error),
}

impl LexiconError {
    /// Job-start failures: bad tables or a missing input file.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            LexiconError::Configuration(_) | LexiconError::MissingResource { .. }
        )
    }

    /// Raised while resolving jobs, before any of them is spawned.
    pub fn is_unsupported_language(&self) -> bool {
        matches!(self, LexiconError::UnsupportedLanguage { .. })
    }
}

pub type Result<T> = std::result::Result<T, LexiconError>;
