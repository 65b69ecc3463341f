//! Alternate and inflected spellings of a headword.

use std::collections::BTreeSet;

use unicode_normalization::UnicodeNormalization;

use crate::config::LanguageConfig;
use crate::convert::{InflectionGenerator, ScriptConverter};
use crate::record::FormData;

/// Per-job inputs to form collection.
pub struct FormRules<'a> {
    pub lemma_lang: &'a str,
    pub min_len: usize,
    pub ignored_tags: Option<&'a std::collections::HashSet<String>>,
    pub strip_accents: bool,
    pub simplified: Option<&'a dyn ScriptConverter>,
    pub inflections: Option<&'a dyn InflectionGenerator>,
}

impl<'a> FormRules<'a> {
    pub fn new(config: &'a LanguageConfig, lemma_lang: &'a str) -> Self {
        Self {
            lemma_lang,
            min_len: config.min_headword_len(lemma_lang),
            ignored_tags: config.ignored_form_tags.get(lemma_lang),
            strip_accents: config.accent_stripping_languages.contains(lemma_lang),
            simplified: None,
            inflections: None,
        }
    }

    /// Collect the form set for one record, augmentation included.
    ///
    /// The set is ordered so the dedup key can be built from it directly.
    pub fn collect(&self, word: &str, pos: &str, forms: &[FormData]) -> BTreeSet<String> {
        let mut out: BTreeSet<String> = BTreeSet::new();

        let generated = self
            .inflections
            .map(|generator| generator.inflections(word, pos))
            .unwrap_or_default();
        if !generated.is_empty() {
            out.extend(generated.into_iter().filter(|form| form != word));
        } else {
            for data in forms {
                if let Some(ignored) = self.ignored_tags {
                    if data.tags.iter().any(|tag| ignored.contains(tag)) {
                        continue;
                    }
                }
                let form = data.form.as_str();
                if !form.is_empty() && form != word && form.chars().count() >= self.min_len {
                    out.insert(form.to_string());
                }
            }
        }

        if self.lemma_lang == "cs" {
            add_czech_forms(word, pos, &mut out);
        }

        if self.strip_accents {
            let stripped: Vec<String> = out.iter().map(|form| remove_accents(form)).collect();
            out.extend(stripped);
        }

        if let Some(converter) = self.simplified {
            let simplified = converter.convert(word);
            if simplified != word {
                out.insert(simplified);
            }
        }

        out
    }
}

/// Drop stress marks (combining acute and grave accents).
pub fn remove_accents(text: &str) -> String {
    text.nfd()
        .filter(|c| !matches!(c, '\u{0301}' | '\u{0300}'))
        .nfc()
        .collect()
}

fn add_czech_forms(word: &str, pos: &str, forms: &mut BTreeSet<String>) {
    if matches!(pos, "adj" | "verb" | "adv") && !word.starts_with("ne") && !word.contains(' ') {
        let negated: Vec<String> = forms.iter().map(|form| format!("ne{form}")).collect();
        forms.extend(negated);
    }
    if pos == "adj" {
        // Declension tables lack the dual instrumental.
        let dual: Vec<String> = forms
            .iter()
            .filter_map(|form| form.strip_suffix("ými").map(|stem| format!("{stem}ýma")))
            .collect();
        forms.extend(dual);
        forms.extend(czech_derived_adverb_forms(word));
    }
}

fn czech_adjective_to_adverb(word: &str) -> Option<String> {
    let replace = |suffix: &str, with: &str| {
        word.strip_suffix(suffix).map(|stem| format!("{stem}{with}"))
    };
    // Longer endings must be tried before the endings they contain.
    if word.ends_with("lý") || word.ends_with("sý") {
        replace("ý", "e")
    } else if word.ends_with("rý") {
        replace("rý", "ře")
    } else if word.ends_with("cí") {
        replace("í", "e")
    } else if word.ends_with('í') {
        replace("í", "ě")
    } else if word.ends_with("chý") {
        replace("chý", "še")
    } else if word.ends_with("cký") || word.ends_with("ský") {
        replace("ý", "y")
    } else if word.ends_with("hý") {
        replace("hý", "ze")
    } else if word.ends_with("ký") {
        replace("ký", "ce")
    } else if word.ends_with('ý') {
        replace("ý", "ě")
    } else {
        None
    }
}

fn czech_derived_adverb_forms(adjective: &str) -> BTreeSet<String> {
    let Some(adverb) = czech_adjective_to_adverb(adjective) else {
        return BTreeSet::new();
    };
    let mut base = BTreeSet::new();
    if !adverb.starts_with("ne") {
        base.insert(format!("ne{adverb}"));
    }
    base.insert(adverb);

    let mut derived = BTreeSet::new();
    for adv in &base {
        if adv.ends_with('ě') || adv.ends_with('e') {
            derived.insert(format!("{adv}ji"));
            derived.insert(format!("nej{adv}ji"));
        }
    }
    derived.extend(base);
    derived
}
