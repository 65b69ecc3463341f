//! Language tables and per-job file layout.
//!
//! Everything language-specific that is a table rather than a rule lives in
//! [`LanguageConfig`], deserialized from `schema/languages.yaml` (embedded at
//! compile time, overridable with `--config`). A config value is immutable
//! once loaded and is handed to every job explicitly.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::Deserialize;

use crate::error::{LexiconError, Result};

const BUILTIN_LANGUAGES: &str = include_str!("../schema/languages.yaml");

/// Major version stamped into every output file name.
pub const MAJOR_VERSION: &str = env!("CARGO_PKG_VERSION_MAJOR");

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GlossLanguage {
    #[serde(default)]
    pub include: Option<Vec<String>>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LanguageConfig {
    pub lemma_languages: Vec<String>,
    pub gloss_languages: BTreeMap<String, GlossLanguage>,
    #[serde(default)]
    pub translated_gloss_languages: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub wsd_pairs: HashSet<String>,
    pub filter_tags: HashSet<String>,
    pub used_pos: HashSet<String>,
    #[serde(default)]
    pub short_lemma_languages: HashSet<String>,
    #[serde(default)]
    pub form_category_suffixes: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub form_category_prefixes: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub ignored_form_tags: HashMap<String, HashSet<String>>,
    #[serde(default)]
    pub example_skip_prefixes: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub inflected_gloss_patterns: HashMap<String, String>,
    #[serde(default)]
    pub accent_stripping_languages: HashSet<String>,
    #[serde(default)]
    pub bidi_gloss_languages: HashSet<String>,
    #[serde(default)]
    pub curated_difficulty_languages: HashSet<String>,
    #[serde(default)]
    pub simplified_twin_gloss_languages: HashSet<String>,
    #[serde(default)]
    pub simplified_headword_languages: HashSet<String>,
    #[serde(default)]
    pub generated_inflection_pairs: HashSet<String>,
    #[serde(default)]
    pub source_aliases: HashMap<String, String>,
}

/// One (lemma language, gloss language) build.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobSpec {
    pub lemma_lang: String,
    pub gloss_lang: String,
}

impl JobSpec {
    pub fn new(lemma_lang: impl Into<String>, gloss_lang: impl Into<String>) -> Self {
        Self {
            lemma_lang: lemma_lang.into(),
            gloss_lang: gloss_lang.into(),
        }
    }

    /// `"<lemma>-<gloss>"`, the key used by the pair tables.
    pub fn pair(&self) -> String {
        format!("{}-{}", self.lemma_lang, self.gloss_lang)
    }
}

impl LanguageConfig {
    pub fn builtin() -> Result<Self> {
        Ok(serde_yaml::from_str(BUILTIN_LANGUAGES)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let mut file = File::open(path).map_err(|e| {
            LexiconError::Configuration(format!("failed to open {}: {}", path.display(), e))
        })?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        Ok(serde_yaml::from_str(&contents)?)
    }

    pub fn is_translated_gloss(&self, gloss_lang: &str) -> bool {
        self.translated_gloss_languages.contains_key(gloss_lang)
    }

    /// Lemma languages a gloss language can be built for, or `None` when the
    /// gloss language is not supported at all.
    pub fn lemma_languages_for(&self, gloss_lang: &str) -> Option<BTreeSet<String>> {
        if let Some(editions) = self.translated_gloss_languages.get(gloss_lang) {
            return Some(editions.iter().cloned().collect());
        }
        let gloss = self.gloss_languages.get(gloss_lang)?;
        let base: BTreeSet<String> = match &gloss.include {
            Some(include) => include.iter().cloned().collect(),
            None => self.lemma_languages.iter().cloned().collect(),
        };
        Some(
            base.into_iter()
                .filter(|lang| !gloss.exclude.contains(lang))
                .collect(),
        )
    }

    /// Expand a CLI request into build jobs.
    ///
    /// An empty request means every available lemma language. Translated
    /// gloss languages always build from their source editions.
    pub fn resolve_jobs(&self, gloss_lang: &str, requested: &[String]) -> Result<Vec<JobSpec>> {
        let unsupported = || LexiconError::UnsupportedLanguage {
            gloss_lang: gloss_lang.to_string(),
            lemma_langs: requested.to_vec(),
        };
        let available = self.lemma_languages_for(gloss_lang).ok_or_else(unsupported)?;

        let lemma_langs: BTreeSet<String> =
            if requested.is_empty() || self.is_translated_gloss(gloss_lang) {
                available
            } else {
                if requested.iter().any(|lang| !available.contains(lang)) {
                    return Err(unsupported());
                }
                requested.iter().cloned().collect()
            };
        if lemma_langs.is_empty() {
            return Err(unsupported());
        }

        Ok(lemma_langs
            .into_iter()
            .map(|lemma| JobSpec::new(lemma, gloss_lang))
            .collect())
    }

    pub fn min_headword_len(&self, lemma_lang: &str) -> usize {
        if self.short_lemma_languages.contains(lemma_lang) {
            2
        } else {
            3
        }
    }

    pub fn is_wsd(&self, spec: &JobSpec) -> bool {
        self.wsd_pairs.contains(&spec.pair())
    }

    pub fn has_simplified_twin(&self, gloss_lang: &str) -> bool {
        self.simplified_twin_gloss_languages.contains(gloss_lang)
    }

    pub fn uses_generated_inflections(&self, spec: &JobSpec) -> bool {
        self.generated_inflection_pairs.contains(&spec.pair())
    }

    pub fn is_bidi_gloss(&self, gloss_lang: &str) -> bool {
        self.bidi_gloss_languages.contains(gloss_lang)
    }

    /// True when any category marks the entry as an inflected-form page for
    /// this gloss language.
    pub fn is_form_category(&self, gloss_lang: &str, categories: &[String]) -> bool {
        let suffixes = self.form_category_suffixes.get(gloss_lang);
        let prefixes = self.form_category_prefixes.get(gloss_lang);
        if suffixes.is_none() && prefixes.is_none() {
            return false;
        }
        categories.iter().any(|category| {
            suffixes.is_some_and(|s| s.iter().any(|suffix| category.ends_with(suffix.as_str())))
                || prefixes
                    .is_some_and(|p| p.iter().any(|prefix| category.starts_with(prefix.as_str())))
        })
    }

    pub fn inflected_gloss_pattern(&self, spec: &JobSpec) -> Result<Option<Regex>> {
        self.inflected_gloss_patterns
            .get(&spec.pair())
            .map(|pattern| Regex::new(pattern).map_err(LexiconError::from))
            .transpose()
    }

    /// Language code the source dumps are filed under.
    pub fn source_code<'a>(&'a self, lang: &'a str) -> &'a str {
        self.source_aliases
            .get(lang)
            .map(String::as_str)
            .unwrap_or(lang)
    }
}

/// Root directories shared by all jobs of one invocation.
#[derive(Debug, Clone)]
pub struct Directories {
    pub input: PathBuf,
    pub data: PathBuf,
    pub output: PathBuf,
}

/// Every file a single job reads or writes.
#[derive(Debug, Clone)]
pub struct JobPaths {
    pub source: PathBuf,
    pub store: PathBuf,
    pub twin_store: Option<PathBuf>,
    pub wsd_store: Option<PathBuf>,
    pub klld: PathBuf,
    pub twin_klld: Option<PathBuf>,
    pub wsd_klld: Option<PathBuf>,
    pub difficulty: PathBuf,
    pub frequency: PathBuf,
    pub converter: PathBuf,
    pub inflections: PathBuf,
}

pub const TWIN_GLOSS_CODE: &str = "zh_cn";

impl JobPaths {
    pub fn new(dirs: &Directories, spec: &JobSpec, config: &LanguageConfig) -> Self {
        let lemma = spec.lemma_lang.as_str();
        let gloss = spec.gloss_lang.as_str();
        let source_lemma = config.source_code(lemma);
        // Translation-derived glosses come from the lemma language's own edition.
        let edition = if config.is_translated_gloss(gloss) {
            source_lemma
        } else {
            gloss
        };

        let plain = dirs
            .input
            .join(source_lemma)
            .join(format!("{source_lemma}_{edition}.jsonl"));
        let compressed = plain.with_extension("jsonl.bz2");
        let source = if !plain.exists() && compressed.exists() {
            compressed
        } else {
            plain
        };

        let out_dir = dirs.output.join(lemma);
        let store_for =
            |gloss: &str| out_dir.join(format!("wiktionary_{lemma}_{gloss}_v{MAJOR_VERSION}.db"));
        let klld_for =
            |gloss: &str| out_dir.join(format!("kll.{lemma}.{gloss}_v{MAJOR_VERSION}.klld"));

        let twin = config.has_simplified_twin(gloss);
        let wsd = config.is_wsd(spec);

        Self {
            source,
            store: store_for(gloss),
            twin_store: twin.then(|| store_for(TWIN_GLOSS_CODE)),
            wsd_store: wsd.then(|| {
                out_dir.join(format!("wiktionary_{lemma}_{gloss}_v{MAJOR_VERSION}_wsd.db"))
            }),
            klld: klld_for(gloss),
            twin_klld: twin.then(|| klld_for(TWIN_GLOSS_CODE)),
            wsd_klld: wsd.then(|| {
                out_dir.join(format!("kll.{lemma}.{gloss}_v{MAJOR_VERSION}_wsd.klld"))
            }),
            difficulty: dirs.data.join(lemma).join("difficulty.json"),
            frequency: dirs.data.join(lemma).join("frequency.tsv"),
            converter: dirs.data.join("zh").join("t2s.tsv"),
            inflections: dirs.data.join(lemma).join("inflections.tsv"),
        }
    }

    /// Every file the job writes: stores first, then dictionaries.
    pub fn outputs(&self) -> impl Iterator<Item = &Path> {
        [
            Some(&self.store),
            self.twin_store.as_ref(),
            self.wsd_store.as_ref(),
            Some(&self.klld),
            self.twin_klld.as_ref(),
            self.wsd_klld.as_ref(),
        ]
        .into_iter()
        .flatten()
        .map(PathBuf::as_path)
    }
}
