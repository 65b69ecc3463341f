//! One build job: stream a source dump into a lexicon store.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::time::{Duration, Instant};

use bzip2::read::BzDecoder;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::config::{JobPaths, JobSpec, LanguageConfig};
use crate::convert::{DictionaryConverter, InflectionGenerator, InflectionTable, ScriptConverter};
use crate::dedup::DedupStores;
use crate::difficulty::{
    Classification, CuratedTable, DifficultyClassifier, FrequencyOracle, NoFrequencies, ZipfTable,
};
use crate::error::{LexiconError, Result};
use crate::export;
use crate::forms::FormRules;
use crate::pronunciation::Pronunciation;
use crate::record::SourceRecord;
use crate::senses::SenseRules;
use crate::store::{LexiconStore, SenseRow, StoreSet};

lazy_static! {
    static ref LEADING_NON_WORD: Regex = Regex::new(r"^(?:\W|\d)").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Init,
    Streaming,
    Finalize,
    Done,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobState::Init => "init",
            JobState::Streaming => "streaming",
            JobState::Finalize => "finalize",
            JobState::Done => "done",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Default)]
pub struct JobOptions {
    /// Show a spinner while streaming.
    pub progress: bool,
    /// Also write the KLLD lookup dictionaries.
    pub export: bool,
    /// Shared by concurrent jobs so their spinners get separate lines.
    pub multi: Option<MultiProgress>,
}

#[derive(Debug, Clone, Default)]
pub struct JobStats {
    pub records: usize,
    pub headwords: usize,
    pub senses: usize,
    pub enabled_senses: usize,
    pub merged_senses: usize,
    pub form_groups: usize,
    pub sounds: usize,
    pub examples: usize,
    pub filtered_pos: usize,
    pub filtered_length: usize,
    pub filtered_pattern: usize,
    pub filtered_form_entry: usize,
    pub filtered_no_translations: usize,
    pub without_senses: usize,
    pub elapsed: Duration,
}

impl JobStats {
    pub fn filtered(&self) -> usize {
        self.filtered_pos
            + self.filtered_length
            + self.filtered_pattern
            + self.filtered_form_entry
            + self.filtered_no_translations
    }

    pub fn print(&self, spec: &JobSpec) {
        println!();
        println!("============================================================");
        println!("Job: {}", spec.pair());
        println!("Records read: {}", self.records);
        println!("Headwords: {}", self.headwords);
        println!("Senses written: {}", self.senses);
        println!("Enabled senses: {}", self.enabled_senses);
        println!("Merged senses: {}", self.merged_senses);
        println!(
            "Avg senses/headword: {:.2}",
            self.senses as f64 / self.headwords.max(1) as f64
        );
        println!("Form groups: {}", self.form_groups);
        println!("Sounds: {}", self.sounds);
        println!("Examples: {}", self.examples);
        println!("Filtered (pos): {}", self.filtered_pos);
        println!("Filtered (length): {}", self.filtered_length);
        println!("Filtered (leading symbol): {}", self.filtered_pattern);
        println!("Filtered (form entry): {}", self.filtered_form_entry);
        println!("Filtered (no translations): {}", self.filtered_no_translations);
        println!("No usable senses: {}", self.without_senses);
        println!(
            "Time: {}m {}s",
            self.elapsed.as_secs() / 60,
            self.elapsed.as_secs() % 60
        );
        println!(
            "Rate: {:.0} records/sec",
            self.records as f64 / self.elapsed.as_secs_f64().max(f64::EPSILON)
        );
        println!("============================================================");
    }
}

/// Read-only inputs loaded once at job start.
pub struct JobResources {
    pub curated: Option<CuratedTable>,
    pub frequencies: Option<ZipfTable>,
    pub converter: Option<DictionaryConverter>,
    pub inflections: Option<InflectionTable>,
    pub inflected_gloss: Option<Regex>,
}

impl JobResources {
    pub fn load(config: &LanguageConfig, spec: &JobSpec, paths: &JobPaths) -> Result<Self> {
        if !paths.source.exists() {
            return Err(LexiconError::MissingResource {
                path: paths.source.clone(),
                what: if config.is_translated_gloss(&spec.gloss_lang) {
                    "translation source edition"
                } else {
                    "source dump"
                },
            });
        }

        let curated = if config.curated_difficulty_languages.contains(&spec.lemma_lang) {
            if !paths.difficulty.exists() {
                return Err(LexiconError::MissingResource {
                    path: paths.difficulty.clone(),
                    what: "curated difficulty table",
                });
            }
            Some(CuratedTable::load(&paths.difficulty)?)
        } else if paths.difficulty.exists() {
            Some(CuratedTable::load(&paths.difficulty)?)
        } else {
            None
        };

        let frequencies = if paths.frequency.exists() {
            Some(ZipfTable::load(&paths.frequency)?)
        } else {
            None
        };

        let needs_converter = config.has_simplified_twin(&spec.gloss_lang)
            || config.simplified_headword_languages.contains(&spec.lemma_lang);
        let converter = if needs_converter {
            if !paths.converter.exists() {
                return Err(LexiconError::MissingResource {
                    path: paths.converter.clone(),
                    what: "traditional-to-simplified conversion table",
                });
            }
            Some(DictionaryConverter::load(&paths.converter)?)
        } else {
            None
        };

        let inflections = if config.uses_generated_inflections(spec) {
            if paths.inflections.exists() {
                Some(InflectionTable::load(&paths.inflections)?)
            } else {
                warn!(
                    path = %paths.inflections.display(),
                    "no inflection table, falling back to source forms"
                );
                None
            }
        } else {
            None
        };

        Ok(Self {
            curated,
            frequencies,
            converter,
            inflections,
            inflected_gloss: config.inflected_gloss_pattern(spec)?,
        })
    }
}

fn open_source(paths: &JobPaths) -> Result<Box<dyn BufRead>> {
    let file = File::open(&paths.source)?;
    let reader: Box<dyn BufRead> = if paths.source.to_string_lossy().ends_with(".bz2") {
        Box::new(BufReader::with_capacity(256 * 1024, BzDecoder::new(file)))
    } else {
        Box::new(BufReader::with_capacity(256 * 1024, file))
    };
    Ok(reader)
}

/// State kept while consecutive records share a headword.
struct HeadwordScope {
    word: String,
    classification: Classification,
    // Carry flag per pos: true until the group's first sense is written.
    carry: HashMap<String, bool>,
}

fn advance(state: &mut JobState, next: JobState, spec: &JobSpec) {
    debug!(job = %spec.pair(), from = %state, to = %next, "job state");
    *state = next;
}

/// Build the lexicon store(s) for one (lemma, gloss) pair.
pub fn run_job(
    config: &LanguageConfig,
    spec: &JobSpec,
    paths: &JobPaths,
    options: &JobOptions,
) -> Result<JobStats> {
    let result = build(config, spec, paths, options);
    if result.is_err() {
        remove_outputs(spec, paths);
    }
    result
}

/// A failed job leaves none of its outputs behind, including ones from an
/// earlier run.
fn remove_outputs(spec: &JobSpec, paths: &JobPaths) {
    for path in paths.outputs() {
        match std::fs::remove_file(path) {
            Ok(()) => debug!(job = %spec.pair(), path = %path.display(), "removed output"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                job = %spec.pair(),
                path = %path.display(),
                "could not remove output: {}",
                e
            ),
        }
    }
}

fn build(
    config: &LanguageConfig,
    spec: &JobSpec,
    paths: &JobPaths,
    options: &JobOptions,
) -> Result<JobStats> {
    let start_time = Instant::now();
    let mut state = JobState::Init;
    info!(job = %spec.pair(), source = %paths.source.display(), "starting job");

    let resources = JobResources::load(config, spec, paths)?;
    let oracle: &dyn FrequencyOracle = match &resources.frequencies {
        Some(table) => table,
        None => &NoFrequencies,
    };
    let classifier =
        DifficultyClassifier::new(&spec.lemma_lang, resources.curated.as_ref(), oracle);
    if !classifier.is_curated() && resources.frequencies.is_none() {
        warn!(job = %spec.pair(), "no difficulty data; every headword will be hidden by default");
    }

    let mut form_rules = FormRules::new(config, &spec.lemma_lang);
    if config.simplified_headword_languages.contains(&spec.lemma_lang) {
        form_rules.simplified = resources
            .converter
            .as_ref()
            .map(|c| c as &dyn ScriptConverter);
    }
    form_rules.inflections = resources
        .inflections
        .as_ref()
        .map(|t| t as &dyn InflectionGenerator);

    let sense_rules = SenseRules::new(config, spec, resources.inflected_gloss.as_ref());
    let translated = config.is_translated_gloss(&spec.gloss_lang);
    let keep_examples = paths.wsd_store.is_some();

    let mut stores = StoreSet::new(LexiconStore::create(&paths.store)?);
    if let (Some(twin_path), Some(converter)) = (&paths.twin_store, &resources.converter) {
        stores = stores.with_twin(LexiconStore::create(twin_path)?, converter);
    }

    let reader = open_source(paths)?;
    let pb = match (&options.multi, options.progress) {
        (Some(multi), true) => multi.add(ProgressBar::new_spinner()),
        (None, true) => ProgressBar::new_spinner(),
        (_, false) => ProgressBar::hidden(),
    };
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );

    advance(&mut state, JobState::Streaming, spec);
    let mut stats = JobStats::default();
    let mut dedup = DedupStores::new();
    let mut finished: HashSet<String> = HashSet::new();
    let mut scope: Option<HeadwordScope> = None;

    for (index, line) in reader.lines().enumerate() {
        let line_no = index + 1;
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        stats.records += 1;

        if stats.records % 10_000 == 0 {
            let rate = stats.records as f64 / start_time.elapsed().as_secs_f64();
            pb.set_message(format!(
                "{} | Records: {} | Headwords: {} | Senses: {} | Rate: {:.0} rec/s",
                spec.pair(),
                stats.records,
                stats.headwords,
                stats.senses,
                rate
            ));
        }

        let record = SourceRecord::parse(&line, line_no)?;

        if scope.as_ref().map(|s| s.word.as_str()) != Some(record.word.as_str()) {
            if let Some(previous) = scope.take() {
                finished.insert(previous.word);
            }
            if finished.contains(&record.word) {
                return Err(LexiconError::UngroupedInput {
                    line: line_no,
                    word: record.word,
                });
            }
            dedup.enter(&record.word);
            scope = Some(HeadwordScope {
                word: record.word.clone(),
                classification: classifier.classify(&record.word),
                carry: HashMap::new(),
            });
        }
        let Some(headword) = scope.as_mut() else {
            continue;
        };

        if !config.used_pos.contains(&record.pos) {
            stats.filtered_pos += 1;
            continue;
        }
        if record.word.chars().count() < form_rules.min_len {
            stats.filtered_length += 1;
            continue;
        }
        if LEADING_NON_WORD.is_match(&record.word) {
            stats.filtered_pattern += 1;
            continue;
        }
        if config.is_form_category(&spec.gloss_lang, &record.categories) {
            debug!(word = %record.word, "skipping form entry");
            stats.filtered_form_entry += 1;
            continue;
        }
        if translated && record.translations.is_empty() {
            stats.filtered_no_translations += 1;
            continue;
        }

        let classification = headword.classification;
        let carry = headword.carry.get(&record.pos).copied().unwrap_or(true)
            && classification.eligible;
        let extraction = if translated {
            sense_rules.translated(&record, carry)
        } else {
            sense_rules.extract(&record, carry)
        };
        if classification.eligible {
            headword.carry.insert(record.pos.clone(), extraction.enabled);
        }
        stats.merged_senses += extraction.merged;
        if extraction.senses.is_empty() {
            stats.without_senses += 1;
            continue;
        }
        let forms = form_rules.collect(&record.word, &record.pos, &record.forms);
        let form_group_id = dedup.form_group(&mut stores, &forms)?;
        let pronunciation = Pronunciation::from_sounds(&spec.lemma_lang, &record.sounds);
        let sound_id = dedup.sound(&mut stores, pronunciation.as_ref())?;

        for sense in extraction.senses {
            let id = stores.insert_sense(&SenseRow {
                enabled: sense.enabled,
                lemma: record.word.clone(),
                pos: record.pos.clone(),
                short_def: sense.short_gloss,
                full_def: sense.full_gloss,
                example: sense.short_example,
                difficulty: classification.difficulty,
                sound_id,
                form_group_id,
            })?;
            stats.senses += 1;
            if sense.enabled {
                stats.enabled_senses += 1;
            }
            if keep_examples {
                for example in &sense.examples {
                    stores.insert_example(id, example)?;
                    stats.examples += 1;
                }
            }
        }
    }
    pb.finish_and_clear();

    stats.headwords = finished.len() + usize::from(scope.is_some());
    stats.form_groups = dedup.form_groups_created;
    stats.sounds = dedup.sounds_created;

    advance(&mut state, JobState::Finalize, spec);
    stores.finalize(paths.wsd_store.as_deref())?;
    info!(
        job = %spec.pair(),
        store = %paths.store.display(),
        senses = stats.senses,
        filtered = stats.filtered(),
        "lexicon store finalized"
    );

    if options.export {
        export::export_job(config, spec, paths)?;
    }

    stats.elapsed = start_time.elapsed();
    advance(&mut state, JobState::Done, spec);
    info!(job = %spec.pair(), elapsed_ms = stats.elapsed.as_millis() as u64, "job done");
    Ok(stats)
}
