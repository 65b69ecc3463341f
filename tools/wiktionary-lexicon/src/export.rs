//! Re-key a finished lexicon store into a KLLD lookup dictionary.
//!
//! Lemma ids are surrogates assigned in `(lemma, pos, id)` order; sense ids
//! are carried over from the store. Definition text is base64 encoded.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use base64::{engine::general_purpose, Engine as _};
use rusqlite::{params, Connection};
use tracing::info;

use crate::config::{JobPaths, JobSpec, LanguageConfig, TWIN_GLOSS_CODE};
use crate::error::Result;
use crate::gloss::remove_full_stop;
use crate::store::LexiconStore;

pub const POS_TYPES: [&str; 12] = [
    "noun",
    "verb",
    "adjective",
    "adverb",
    "article",
    "number",
    "conjunction",
    "other",
    "preposition",
    "pronoun",
    "particle",
    "punctuation",
];

const SOURCES: [Option<&str>; 6] = [
    None,
    Some("Merriam-Webster"),
    None,
    Some("Wiktionary"),
    None,
    None,
];

const WIKTIONARY_SOURCE_ID: i64 = 3;
const TERM_TERMINATORS: &str = ",    ;       .       \"       '       !       ?";

const KLLD_SCHEMA: &str = "
    CREATE TABLE pos_types (
        id INTEGER NOT NULL DEFAULT '0',
        label VARCHAR(100) DEFAULT NULL,
        PRIMARY KEY (id)
    );
    CREATE TABLE sources (
        id INTEGER NOT NULL DEFAULT '0',
        label VARCHAR(200) DEFAULT NULL,
        PRIMARY KEY (id)
    );
    CREATE TABLE metadata (key TEXT PRIMARY KEY, value TEXT);
    CREATE TABLE lemmas (id INTEGER PRIMARY KEY, lemma TEXT);
    CREATE TABLE senses (
        id INTEGER PRIMARY KEY,
        display_lemma_id INTEGER,
        term_id INTEGER,
        term_lemma_id INTEGER,
        pos_type INTEGER,
        source_id INTEGER,
        sense_number REAL,
        synset_id INTEGER,
        corpus_count INTEGER,
        full_def TEXT,
        short_def TEXT,
        example_sentence TEXT
    );
";

/// Map a source pos tag to its `pos_types` id.
pub fn pos_code(pos: &str) -> i64 {
    match pos {
        "noun" => 0,
        "verb" | "adj" => 1,
        "adv" => 3,
        _ => 7,
    }
}

fn encode(text: &str) -> String {
    general_purpose::STANDARD.encode(text.as_bytes())
}

fn strip_isolates(text: &str) -> String {
    text.replace(['\u{2067}', '\u{2069}'], "")
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportStats {
    pub lemmas: usize,
    pub senses: usize,
}

/// Languages and text handling for one export.
#[derive(Debug, Clone)]
pub struct KlldTarget<'a> {
    pub lemma_lang: &'a str,
    /// Definition language as written into the metadata (`zh_cn` for twins).
    pub gloss_code: &'a str,
    pub strip_bidi: bool,
}

struct SourceSense {
    id: i64,
    lemma: String,
    pos: String,
    short_def: String,
    full_def: String,
    example: Option<String>,
}

pub fn export_klld(store: &Path, klld: &Path, target: &KlldTarget<'_>) -> Result<ExportStats> {
    if let Some(parent) = klld.parent() {
        fs::create_dir_all(parent)?;
    }
    if klld.exists() {
        fs::remove_file(klld)?;
    }

    let source = LexiconStore::open(store)?;
    let mut out = Connection::open(klld)?;
    let tx = out.transaction()?;
    tx.execute_batch(KLLD_SCHEMA)?;

    {
        let mut insert = tx.prepare("INSERT INTO pos_types VALUES (?1, ?2)")?;
        for (id, label) in POS_TYPES.iter().enumerate() {
            insert.execute(params![id as i64, label])?;
        }
        let mut insert = tx.prepare("INSERT INTO sources VALUES (?1, ?2)")?;
        for (id, label) in SOURCES.iter().enumerate() {
            insert.execute(params![id as i64, label])?;
        }

        let id = format!("kll.{}.{}", target.lemma_lang, target.gloss_code);
        let version = chrono::Local::now().date_naive().to_string();
        let metadata: [(&str, Option<&str>); 9] = [
            ("maxTermLength", Some("3")),
            ("termTerminatorList", Some(TERM_TERMINATORS)),
            ("definitionLanguage", Some(target.gloss_code)),
            ("id", Some(id.as_str())),
            ("lemmaLanguage", Some(target.lemma_lang)),
            ("version", Some(version.as_str())),
            ("revision", Some("57")),
            ("tokenSeparator", None),
            ("encoding", Some("1")),
        ];
        let mut insert = tx.prepare("INSERT INTO metadata VALUES (?1, ?2)")?;
        for (key, value) in metadata {
            insert.execute(params![key, value])?;
        }
    }

    let mut stats = ExportStats::default();
    {
        let mut select = source.connection().prepare(
            "SELECT id, lemma, pos, short_def, full_def, example
             FROM senses ORDER BY lemma, pos, id",
        )?;
        let rows = select.query_map([], |row| {
            Ok(SourceSense {
                id: row.get(0)?,
                lemma: row.get(1)?,
                pos: row.get(2)?,
                short_def: row.get(3)?,
                full_def: row.get(4)?,
                example: row.get(5)?,
            })
        })?;

        let mut insert_lemma = tx.prepare("INSERT INTO lemmas (id, lemma) VALUES (?1, ?2)")?;
        let mut insert_sense = tx.prepare(
            "INSERT INTO senses
             (id, display_lemma_id, term_id, term_lemma_id, pos_type, source_id,
              sense_number, corpus_count, short_def, full_def, example_sentence)
             VALUES (?1, ?2, ?2, ?2, ?3, ?4, 1.0, 0, ?5, ?6, ?7)",
        )?;
        let mut lemma_ids: HashMap<String, i64> = HashMap::new();

        for row in rows {
            let sense = row?;
            let lemma_id = match lemma_ids.get(&sense.lemma) {
                Some(&id) => id,
                None => {
                    let id = lemma_ids.len() as i64 + 1;
                    insert_lemma.execute(params![id, sense.lemma])?;
                    lemma_ids.insert(sense.lemma.clone(), id);
                    id
                }
            };

            let (short_def, full_def) = if target.strip_bidi {
                (strip_isolates(&sense.short_def), strip_isolates(&sense.full_def))
            } else {
                (sense.short_def, sense.full_def)
            };
            let example = sense
                .example
                .as_deref()
                .filter(|e| !e.is_empty())
                .map(encode);

            insert_sense.execute(params![
                sense.id,
                lemma_id,
                pos_code(&sense.pos),
                WIKTIONARY_SOURCE_ID,
                encode(&short_def),
                encode(remove_full_stop(&full_def)),
                example
            ])?;
            stats.senses += 1;
        }
        stats.lemmas = lemma_ids.len();
    }

    tx.execute_batch(
        "CREATE INDEX senses_synset_id_index ON senses(synset_id);
         CREATE INDEX senses_term_lemma_id_index ON senses(term_lemma_id);",
    )?;
    tx.commit()?;
    info!(
        klld = %klld.display(),
        lemmas = stats.lemmas,
        senses = stats.senses,
        "exported lookup dictionary"
    );
    Ok(stats)
}

/// Export every lookup dictionary a finished job produced.
pub fn export_job(config: &LanguageConfig, spec: &JobSpec, paths: &JobPaths) -> Result<()> {
    let strip_bidi = config.is_bidi_gloss(&spec.gloss_lang);
    let general = KlldTarget {
        lemma_lang: &spec.lemma_lang,
        gloss_code: &spec.gloss_lang,
        strip_bidi,
    };
    export_klld(&paths.store, &paths.klld, &general)?;

    if let (Some(store), Some(klld)) = (&paths.twin_store, &paths.twin_klld) {
        let twin = KlldTarget {
            gloss_code: TWIN_GLOSS_CODE,
            ..general.clone()
        };
        export_klld(store, klld, &twin)?;
    }
    if let (Some(store), Some(klld)) = (&paths.wsd_store, &paths.wsd_klld) {
        export_klld(store, klld, &general)?;
    }
    Ok(())
}
