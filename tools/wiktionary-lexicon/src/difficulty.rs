//! Difficulty tiers and display eligibility per headword.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::Deserialize;

use crate::error::{LexiconError, Result};

/// Word-frequency collaborator. Scores are on the Zipf scale (0..8).
pub trait FrequencyOracle {
    /// `None` when the word, or the whole language, cannot be scored.
    fn zipf(&self, word: &str, lang: &str) -> Option<f64>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub eligible: bool,
    pub difficulty: u8,
}

/// Hand-curated difficulty list for one language.
#[derive(Debug, Clone, Default)]
pub struct CuratedTable {
    entries: HashMap<String, u8>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CuratedValue {
    Tier(i64),
    // English rows are `[tier, kindle_sense_id, pos_label]`
    Row(Vec<serde_json::Value>),
}

impl CuratedTable {
    pub fn from_entries(entries: impl IntoIterator<Item = (String, u8)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    /// Load `{word: tier}` or `{word: [tier, ...]}` JSON.
    pub fn load(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let raw: HashMap<String, CuratedValue> = serde_json::from_reader(reader)?;
        let mut entries = HashMap::with_capacity(raw.len());
        for (word, value) in raw {
            let tier = match value {
                CuratedValue::Tier(t) => t,
                CuratedValue::Row(row) => match row.first().and_then(|t| t.as_i64()) {
                    Some(t) => t,
                    None => {
                        return Err(LexiconError::Configuration(format!(
                            "{}: difficulty row for {word:?} does not start with a tier",
                            path.display()
                        )))
                    }
                },
            };
            entries.insert(word, tier.clamp(1, 5) as u8);
        }
        Ok(Self { entries })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, word: &str) -> Option<u8> {
        self.entries.get(word).copied()
    }
}

/// Frequency oracle backed by a `word<TAB>zipf` file.
#[derive(Debug, Clone, Default)]
pub struct ZipfTable {
    scores: HashMap<String, f64>,
}

impl ZipfTable {
    pub fn from_entries(entries: impl IntoIterator<Item = (String, f64)>) -> Self {
        Self {
            scores: entries.into_iter().collect(),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let mut scores = HashMap::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim_end();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let parsed = line
                .split_once('\t')
                .and_then(|(word, score)| Some((word, score.trim().parse::<f64>().ok()?)));
            match parsed {
                Some((word, score)) => {
                    scores.insert(word.to_string(), score);
                }
                None => {
                    return Err(LexiconError::Configuration(format!(
                        "{}:{}: expected `word<TAB>zipf`",
                        path.display(),
                        index + 1
                    )))
                }
            }
        }
        Ok(Self { scores })
    }
}

impl FrequencyOracle for ZipfTable {
    fn zipf(&self, word: &str, _lang: &str) -> Option<f64> {
        self.scores.get(word).copied()
    }
}

/// Oracle for languages without frequency data: every word scores 0.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFrequencies;

impl FrequencyOracle for NoFrequencies {
    fn zipf(&self, _word: &str, _lang: &str) -> Option<f64> {
        None
    }
}

/// Map a Zipf score to eligibility and tier.
///
/// Both ends are kept out of the teaching set: 0 (unknown or very rare) and
/// 7 and above (too common to be worth a hint).
pub fn freq_to_difficulty(score: f64) -> Classification {
    let freq = score.max(0.0).floor() as u32;
    match freq {
        0 => Classification {
            eligible: false,
            difficulty: 1,
        },
        7.. => Classification {
            eligible: false,
            difficulty: 5,
        },
        5..=6 => Classification {
            eligible: true,
            difficulty: 5,
        },
        f => Classification {
            eligible: true,
            difficulty: f as u8,
        },
    }
}

pub struct DifficultyClassifier<'a> {
    lang: &'a str,
    curated: Option<&'a CuratedTable>,
    oracle: &'a dyn FrequencyOracle,
}

impl<'a> DifficultyClassifier<'a> {
    pub fn new(
        lang: &'a str,
        curated: Option<&'a CuratedTable>,
        oracle: &'a dyn FrequencyOracle,
    ) -> Self {
        // An empty curated table means frequency mode.
        let curated = curated.filter(|table| !table.is_empty());
        Self {
            lang,
            curated,
            oracle,
        }
    }

    pub fn is_curated(&self) -> bool {
        self.curated.is_some()
    }

    pub fn classify(&self, word: &str) -> Classification {
        match self.curated {
            Some(table) => match table.get(word) {
                Some(difficulty) => Classification {
                    eligible: true,
                    difficulty,
                },
                None => Classification {
                    eligible: false,
                    difficulty: 1,
                },
            },
            None => freq_to_difficulty(self.oracle.zipf(word, self.lang).unwrap_or(0.0)),
        }
    }
}
