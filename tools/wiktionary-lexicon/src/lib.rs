//! Build per-language-pair lexicon stores from Wiktionary JSONL dumps and
//! export them as KLLD lookup dictionaries.

pub mod config;
pub mod convert;
pub mod dedup;
pub mod difficulty;
pub mod error;
pub mod export;
pub mod forms;
pub mod gloss;
pub mod ingest;
pub mod pool;
pub mod pronunciation;
pub mod record;
pub mod senses;
pub mod store;

pub use config::{Directories, JobPaths, JobSpec, LanguageConfig};
pub use error::{LexiconError, Result};
pub use ingest::{run_job, JobOptions, JobStats};
