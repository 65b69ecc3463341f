//! Collaborator seams for script conversion and inflection generation.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::{LexiconError, Result};

/// Traditional-to-simplified Chinese conversion.
pub trait ScriptConverter {
    fn convert(&self, text: &str) -> String;
}

/// Greedy longest-match converter over an OpenCC-style dictionary.
///
/// Each line is `source<TAB>target [alternatives...]`; only the first target
/// is used. Keys may be single characters or whole phrases.
#[derive(Debug, Clone, Default)]
pub struct DictionaryConverter {
    table: HashMap<String, String>,
    longest_key: usize,
}

impl DictionaryConverter {
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut converter = Self::default();
        for (source, target) in pairs {
            converter.insert(source, target);
        }
        converter
    }

    pub fn load(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let mut converter = Self::default();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }
            let (source, targets) = line.split_once('\t').ok_or_else(|| {
                LexiconError::Configuration(format!(
                    "{}:{}: expected `source<TAB>target`",
                    path.display(),
                    index + 1
                ))
            })?;
            if let Some(target) = targets.split_whitespace().next() {
                converter.insert(source, target);
            }
        }
        Ok(converter)
    }

    fn insert(&mut self, source: &str, target: &str) {
        self.longest_key = self.longest_key.max(source.chars().count());
        self.table.insert(source.to_string(), target.to_string());
    }
}

impl ScriptConverter for DictionaryConverter {
    fn convert(&self, text: &str) -> String {
        let chars: Vec<(usize, char)> = text.char_indices().collect();
        let mut out = String::with_capacity(text.len());
        let mut i = 0;
        while i < chars.len() {
            let start = chars[i].0;
            let max_len = self.longest_key.min(chars.len() - i);
            let matched = (1..=max_len).rev().find_map(|len| {
                let end = chars.get(i + len).map(|&(b, _)| b).unwrap_or(text.len());
                self.table.get(&text[start..end]).map(|target| (len, target))
            });
            match matched {
                Some((len, target)) => {
                    out.push_str(target);
                    i += len;
                }
                None => {
                    out.push(chars[i].1);
                    i += 1;
                }
            }
        }
        out
    }
}

/// Surface-form expansion for English headwords.
pub trait InflectionGenerator {
    fn inflections(&self, lemma: &str, pos: &str) -> HashSet<String>;
}

/// Inflections read from `lemma<TAB>pos<TAB>form` rows.
#[derive(Debug, Clone, Default)]
pub struct InflectionTable {
    forms: HashMap<(String, String), HashSet<String>>,
}

impl InflectionTable {
    pub fn load(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let mut table = Self::default();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }
            let mut cols = line.split('\t');
            match (cols.next(), cols.next(), cols.next()) {
                (Some(lemma), Some(pos), Some(form)) => table.insert(lemma, pos, form),
                _ => {
                    return Err(LexiconError::Configuration(format!(
                        "{}:{}: expected `lemma<TAB>pos<TAB>form`",
                        path.display(),
                        index + 1
                    )))
                }
            }
        }
        Ok(table)
    }

    pub fn insert(&mut self, lemma: &str, pos: &str, form: &str) {
        self.forms
            .entry((lemma.to_string(), pos.to_string()))
            .or_default()
            .insert(form.to_string());
    }
}

impl InflectionGenerator for InflectionTable {
    fn inflections(&self, lemma: &str, pos: &str) -> HashSet<String> {
        self.forms
            .get(&(lemma.to_string(), pos.to_string()))
            .cloned()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn longest_phrase_wins() {
        let converter =
            DictionaryConverter::from_pairs([("門", "门"), ("後", "后"), ("皇后", "皇后")]);
        assert_eq!(converter.convert("後門"), "后门");
        assert_eq!(converter.convert("皇后"), "皇后");
    }

    #[test]
    fn unknown_characters_pass_through() {
        let converter = DictionaryConverter::from_pairs([("貓", "猫")]);
        assert_eq!(converter.convert("一隻貓 cat"), "一隻猫 cat");
        assert_eq!(converter.convert(""), "");
    }

    #[test]
    fn loads_opencc_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t2s.tsv");
        std::fs::write(&path, "貓\t猫\n發\t发 發\n").unwrap();
        let converter = DictionaryConverter::load(&path).unwrap();
        assert_eq!(converter.convert("發貓"), "发猫");
    }

    #[test]
    fn inflection_table_is_keyed_by_pos() {
        let mut table = InflectionTable::default();
        table.insert("run", "verb", "ran");
        table.insert("run", "verb", "running");
        table.insert("run", "noun", "runs");
        assert_eq!(table.inflections("run", "verb").len(), 2);
        assert!(table.inflections("walk", "verb").is_empty());
    }
}
