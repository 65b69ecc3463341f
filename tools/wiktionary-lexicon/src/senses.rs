//! Turn one source record into sense rows.
//!
//! The `enabled` carry flag belongs to a (headword, pos) group. It is passed
//! in, handed to the first sense created, and returned cleared once a sense
//! has taken it, so only the earliest sense of the group is shown by default.

use std::collections::{HashMap, HashSet};

use regex::Regex;
use serde::Serialize;

use crate::config::{JobSpec, LanguageConfig};
use crate::gloss::short_def;
use crate::record::{ExampleData, SourceRecord};

const EXAMPLE_PLACEHOLDERS: [&str; 3] = ["...", "…", "(obsolete)"];

/// Example sentence with the highlighted span that evidences the sense.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffsetExample {
    pub text: String,
    /// JSON array of `[start, end]` pairs.
    pub offsets: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenseCandidate {
    pub enabled: bool,
    pub short_gloss: String,
    pub full_gloss: String,
    pub short_example: Option<String>,
    pub examples: Vec<OffsetExample>,
}

#[derive(Debug, Default)]
pub struct Extraction {
    pub senses: Vec<SenseCandidate>,
    /// Carry flag after this record.
    pub enabled: bool,
    /// Sub-senses folded into an earlier sense of the record.
    pub merged: usize,
}

pub struct SenseRules<'a> {
    gloss_lang: &'a str,
    config: &'a LanguageConfig,
    skip_prefixes: &'a [String],
    inflected_gloss: Option<&'a Regex>,
}

#[derive(Serialize)]
struct Span(usize, usize);

impl<'a> SenseRules<'a> {
    pub fn new(
        config: &'a LanguageConfig,
        spec: &'a JobSpec,
        inflected_gloss: Option<&'a Regex>,
    ) -> Self {
        Self {
            gloss_lang: &spec.gloss_lang,
            config,
            skip_prefixes: config
                .example_skip_prefixes
                .get(&spec.lemma_lang)
                .map(Vec::as_slice)
                .unwrap_or(&[]),
            inflected_gloss,
        }
    }

    pub fn extract(&self, record: &SourceRecord, mut enabled: bool) -> Extraction {
        let mut senses: Vec<SenseCandidate> = Vec::new();
        let mut merged = 0;

        for sense in &record.senses {
            let gloss = match sense.glosses.as_slice() {
                [] => continue,
                [only] => only,
                [_, specific, ..] => specific,
            };
            if self.config.is_form_category(self.gloss_lang, &sense.categories) {
                continue;
            }
            if self.inflected_gloss.is_some_and(|re| re.is_match(gloss)) {
                continue;
            }
            if sense.tags.iter().any(|tag| self.config.filter_tags.contains(tag)) {
                continue;
            }

            let (short_example, examples) = self.select_examples(&sense.examples);

            if let Some(parent) = senses.iter_mut().find(|s| s.full_gloss == *gloss) {
                if let Some(candidate) = short_example {
                    let shorter = parent
                        .short_example
                        .as_ref()
                        .map_or(true, |current| {
                            candidate.chars().count() < current.chars().count()
                        });
                    if shorter {
                        parent.short_example = Some(candidate);
                    }
                }
                parent.examples.extend(examples);
                merged += 1;
                continue;
            }

            let short_gloss = short_def(gloss, self.gloss_lang);
            if short_gloss.is_empty() {
                continue;
            }
            senses.push(SenseCandidate {
                enabled,
                short_gloss,
                full_gloss: gloss.clone(),
                short_example,
                examples,
            });
            enabled = false;
        }

        Extraction {
            senses,
            enabled,
            merged,
        }
    }

    /// Senses for gloss languages assembled from translation tables.
    pub fn translated(&self, record: &SourceRecord, mut enabled: bool) -> Extraction {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut group_index: HashMap<&str, usize> = HashMap::new();
        let mut groups: Vec<Vec<&str>> = Vec::new();

        for translation in &record.translations {
            if translation.language() != Some(self.gloss_lang) || translation.word.is_empty() {
                continue;
            }
            if !seen.insert(translation.word.as_str()) {
                continue;
            }
            let index = *group_index
                .entry(translation.sense.as_str())
                .or_insert_with(|| {
                    groups.push(Vec::new());
                    groups.len() - 1
                });
            groups[index].push(translation.word.as_str());
        }

        let mut senses = Vec::with_capacity(groups.len());
        for words in groups {
            let shortest = words
                .iter()
                .copied()
                .reduce(|best, w| if w.chars().count() < best.chars().count() { w } else { best })
                .unwrap_or_default();
            senses.push(SenseCandidate {
                enabled,
                short_gloss: shortest.to_string(),
                full_gloss: words.join(", "),
                short_example: None,
                examples: Vec::new(),
            });
            enabled = false;
        }

        Extraction {
            senses,
            enabled,
            merged: 0,
        }
    }

    fn is_usage_example(&self, text: &str) -> bool {
        !text.is_empty()
            && !EXAMPLE_PLACEHOLDERS.contains(&text)
            && !self.skip_prefixes.iter().any(|prefix| text.starts_with(prefix.as_str()))
    }

    /// Shortest usable example plus every offset-annotated one.
    fn select_examples(&self, examples: &[ExampleData]) -> (Option<String>, Vec<OffsetExample>) {
        let mut shortest: Option<&str> = None;
        let mut with_offsets = Vec::new();

        for example in examples {
            let text = example.sentence();
            if self.is_usage_example(text)
                && shortest.map_or(true, |s| text.chars().count() < s.chars().count())
            {
                shortest = Some(text);
            }
            if let Some(spans) = example.offsets() {
                if text.is_empty() {
                    continue;
                }
                let spans: Vec<Span> = spans.iter().map(|&(s, e)| Span(s, e)).collect();
                if let Ok(offsets) = serde_json::to_string(&spans) {
                    with_offsets.push(OffsetExample {
                        text: text.to_string(),
                        offsets,
                    });
                }
            }
        }

        (shortest.map(str::to_string), with_offsets)
    }
}
