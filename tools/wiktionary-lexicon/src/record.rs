//! Typed view of one wiktextract JSONL line.
//!
//! Only the fields the pipeline consumes are modelled. Everything is
//! defaulted so that absent keys read as empty, except `word` and `pos`,
//! which are required and checked once in [`SourceRecord::parse`].

use serde::{Deserialize, Deserializer};

use crate::error::{LexiconError, Result};

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawRecord {
    word: Option<String>,
    pos: Option<String>,
    senses: Vec<SenseData>,
    forms: Vec<FormData>,
    sounds: Vec<SoundData>,
    translations: Vec<TranslationData>,
    categories: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SourceRecord {
    pub word: String,
    pub pos: String,
    pub senses: Vec<SenseData>,
    pub forms: Vec<FormData>,
    pub sounds: Vec<SoundData>,
    pub translations: Vec<TranslationData>,
    pub categories: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SenseData {
    // Usually one line; with more, the first is the parent sense's gloss
    // and the second the specific one.
    pub glosses: Vec<String>,
    pub examples: Vec<ExampleData>,
    pub tags: Vec<String>,
    pub categories: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ExampleData {
    pub text: String,
    // Chinese edition
    pub texts: Vec<String>,
    pub bold_text_offsets: Vec<(usize, usize)>,
    pub italic_text_offsets: Vec<(usize, usize)>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct FormData {
    pub form: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SoundData {
    #[serde(deserialize_with = "one_or_many")]
    pub ipa: Vec<String>,
    #[serde(rename = "zh-pron", alias = "zh_pron", deserialize_with = "one_or_many")]
    pub zh_pron: Vec<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TranslationData {
    pub code: Option<String>,
    pub lang_code: Option<String>,
    pub word: String,
    pub sense: String,
}

impl SourceRecord {
    /// Parse one line; `line` is 1-based and only used for error reports.
    pub fn parse(text: &str, line: usize) -> Result<Self> {
        let raw: RawRecord = serde_json::from_str(text)
            .map_err(|source| LexiconError::SourceFormat { line, source })?;
        let word = raw.word.ok_or(LexiconError::MissingField { line, field: "word" })?;
        let pos = raw.pos.ok_or(LexiconError::MissingField { line, field: "pos" })?;
        Ok(Self {
            word,
            pos,
            senses: raw.senses,
            forms: raw.forms,
            sounds: raw.sounds,
            translations: raw.translations,
            categories: raw.categories,
        })
    }
}

impl ExampleData {
    /// The example sentence, falling back to the first of `texts`.
    pub fn sentence(&self) -> &str {
        if !self.text.is_empty() {
            &self.text
        } else {
            self.texts.first().map(String::as_str).unwrap_or("")
        }
    }

    /// Highlighted span of the example, bold preferred over italic.
    pub fn offsets(&self) -> Option<&[(usize, usize)]> {
        if !self.bold_text_offsets.is_empty() {
            Some(&self.bold_text_offsets)
        } else if !self.italic_text_offsets.is_empty() {
            Some(&self.italic_text_offsets)
        } else {
            None
        }
    }
}

impl SoundData {
    pub fn first_ipa(&self) -> Option<&str> {
        self.ipa.iter().map(String::as_str).find(|s| !s.is_empty())
    }

    pub fn first_zh_pron(&self) -> Option<&str> {
        self.zh_pron.iter().map(String::as_str).find(|s| !s.is_empty())
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

impl TranslationData {
    pub fn language(&self) -> Option<&str> {
        self.code.as_deref().or(self.lang_code.as_deref())
    }
}

/// Accept either a single string or a list of strings.
fn one_or_many<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        Some(OneOrMany::One(s)) => vec![s],
        Some(OneOrMany::Many(v)) => v,
        None => Vec::new(),
    })
}
