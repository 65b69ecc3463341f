use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::Path;

use base64::{engine::general_purpose, Engine as _};
use bzip2::write::BzEncoder;
use bzip2::Compression;
use indicatif::{MultiProgress, ProgressDrawTarget};
use rusqlite::Connection;
use tempfile::TempDir;

use wiktionary_lexicon::{
    run_job, Directories, JobOptions, JobPaths, JobSpec, JobStats, LanguageConfig, LexiconError,
};

// ============================================================================
// Fixture helpers
// ============================================================================

struct Fixture {
    _root: TempDir,
    dirs: Directories,
    config: LanguageConfig,
}

impl Fixture {
    fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let dirs = Directories {
            input: root.path().join("source"),
            data: root.path().join("data"),
            output: root.path().join("build"),
        };
        Self {
            _root: root,
            dirs,
            config: LanguageConfig::builtin().unwrap(),
        }
    }

    fn source(&self, lang: &str, edition: &str, lines: &[&str]) {
        let dir = self.dirs.input.join(lang);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(format!("{lang}_{edition}.jsonl")), lines.join("\n")).unwrap();
    }

    fn data(&self, lang: &str, file: &str, contents: &str) {
        let dir = self.dirs.data.join(lang);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(file), contents).unwrap();
    }

    fn paths(&self, spec: &JobSpec) -> JobPaths {
        JobPaths::new(&self.dirs, spec, &self.config)
    }

    fn run(&self, spec: &JobSpec, export: bool) -> wiktionary_lexicon::Result<JobStats> {
        let paths = self.paths(spec);
        let options = JobOptions {
            progress: false,
            export,
            multi: None,
        };
        run_job(&self.config, spec, &paths, &options)
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Row {
    id: i64,
    enabled: bool,
    lemma: String,
    pos: String,
    short_def: String,
    full_def: String,
    example: Option<String>,
    difficulty: u8,
    sound_id: Option<i64>,
    form_group_id: Option<i64>,
}

fn senses(db: &Path) -> Vec<Row> {
    let conn = Connection::open(db).unwrap();
    let mut stmt = conn
        .prepare(
            "SELECT id, enabled, lemma, pos, short_def, full_def, example, difficulty, sound_id, form_group_id
             FROM senses ORDER BY id",
        )
        .unwrap();
    let rows = stmt
        .query_map([], |r| {
            Ok(Row {
                id: r.get(0)?,
                enabled: r.get(1)?,
                lemma: r.get(2)?,
                pos: r.get(3)?,
                short_def: r.get(4)?,
                full_def: r.get(5)?,
                example: r.get(6)?,
                difficulty: r.get(7)?,
                sound_id: r.get(8)?,
                form_group_id: r.get(9)?,
            })
        })
        .unwrap();
    rows.map(|r| r.unwrap()).collect()
}

fn has_table(db: &Path, table: &str) -> bool {
    let conn = Connection::open(db).unwrap();
    conn.query_row(
        "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |r| r.get::<_, i64>(0),
    )
    .unwrap()
        > 0
}

fn decode(text: &str) -> String {
    String::from_utf8(general_purpose::STANDARD.decode(text).unwrap()).unwrap()
}

const ENGLISH: &[&str] = &[
    r#"{"word": "cat", "pos": "noun", "forms": [{"form": "cats"}], "sounds": [{"ipa": "/kæt/"}], "senses": [{"glosses": ["A small domesticated feline."], "examples": [{"text": "The cat sat on the mat.", "bold_text_offsets": [[4, 7]]}]}, {"glosses": ["A spiteful woman."]}]}"#,
    r#"{"word": "cat", "pos": "verb", "senses": [{"glosses": ["To vomit."]}]}"#,
    r#"{"word": "cat", "pos": "noun", "senses": [{"glosses": ["A catamaran."]}]}"#,
    r#"{"word": "run", "pos": "noun", "forms": [{"form": "runs"}, {"form": "ran"}], "senses": [{"glosses": ["An act of running."]}]}"#,
    r#"{"word": "run", "pos": "verb", "forms": [{"form": "ran"}, {"form": "runs"}], "senses": [{"glosses": ["To move quickly."]}]}"#,
    r#"{"word": "zyzzyva", "pos": "noun", "senses": [{"glosses": ["A tropical weevil."]}]}"#,
    r#"{"word": "1st", "pos": "adj", "senses": [{"glosses": ["First."]}]}"#,
    r#"{"word": "ox", "pos": "noun", "senses": [{"glosses": ["A bovine."]}]}"#,
    r#"{"word": "the", "pos": "article", "senses": [{"glosses": ["Definite article."]}]}"#,
];

const CURATED: &str = r#"{"cat": 1, "run": [2, 130533, "verb"]}"#;

// ============================================================================
// General build
// ============================================================================

#[test]
fn only_earliest_sense_per_headword_and_pos_is_enabled() {
    let fx = Fixture::new();
    fx.source("en", "en", ENGLISH);
    fx.data("en", "difficulty.json", CURATED);
    let spec = JobSpec::new("en", "en");
    fx.run(&spec, false).unwrap();

    let rows = senses(&fx.paths(&spec).store);
    let mut first_seen: HashMap<(String, String), i64> = HashMap::new();
    for row in &rows {
        first_seen
            .entry((row.lemma.clone(), row.pos.clone()))
            .or_insert(row.id);
    }
    for row in &rows {
        let earliest = first_seen[&(row.lemma.clone(), row.pos.clone())] == row.id;
        let eligible = row.lemma != "zyzzyva";
        assert_eq!(row.enabled, earliest && eligible, "{row:?}");
    }

    let catamaran = rows.iter().find(|r| r.full_def == "A catamaran.").unwrap();
    assert!(!catamaran.enabled);
    assert_eq!(catamaran.short_def, "A catamaran");
}

#[test]
fn difficulty_is_per_headword() {
    let fx = Fixture::new();
    fx.source("en", "en", ENGLISH);
    fx.data("en", "difficulty.json", CURATED);
    let spec = JobSpec::new("en", "en");
    fx.run(&spec, false).unwrap();

    for row in senses(&fx.paths(&spec).store) {
        let expected = match row.lemma.as_str() {
            "cat" => 1,
            "run" => 2,
            _ => 1,
        };
        assert_eq!(row.difficulty, expected, "{row:?}");
    }
}

#[test]
fn filtered_records_are_counted_not_fatal() {
    let fx = Fixture::new();
    fx.source("en", "en", ENGLISH);
    fx.data("en", "difficulty.json", CURATED);
    let stats = fx.run(&JobSpec::new("en", "en"), false).unwrap();

    assert_eq!(stats.records, 9);
    assert_eq!(stats.headwords, 6);
    assert_eq!(stats.filtered_pos, 1);
    assert_eq!(stats.filtered_length, 1);
    assert_eq!(stats.filtered_pattern, 1);
    assert_eq!(stats.senses, 7);
    assert_eq!(stats.examples, 1);
}

#[test]
fn identical_form_sets_share_a_group_within_a_headword() {
    let fx = Fixture::new();
    fx.source("en", "en", ENGLISH);
    fx.data("en", "difficulty.json", CURATED);
    let spec = JobSpec::new("en", "en");
    fx.run(&spec, false).unwrap();

    let store = fx.paths(&spec).store;
    let rows = senses(&store);
    let run: Vec<&Row> = rows.iter().filter(|r| r.lemma == "run").collect();
    assert_eq!(run.len(), 2);
    assert!(run[0].form_group_id.is_some());
    assert_eq!(run[0].form_group_id, run[1].form_group_id);

    let cat_verb = rows.iter().find(|r| r.lemma == "cat" && r.pos == "verb").unwrap();
    assert_eq!(cat_verb.form_group_id, None);
    assert_eq!(cat_verb.sound_id, None);

    let conn = Connection::open(&store).unwrap();
    let forms: i64 = conn
        .query_row(
            "SELECT count(*) FROM forms WHERE form_group_id = ?1",
            [run[0].form_group_id],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(forms, 2);
}

#[test]
fn wsd_backup_keeps_examples_general_store_drops_them() {
    let fx = Fixture::new();
    fx.source("en", "en", ENGLISH);
    fx.data("en", "difficulty.json", CURATED);
    let spec = JobSpec::new("en", "en");
    fx.run(&spec, false).unwrap();

    let paths = fx.paths(&spec);
    assert!(!has_table(&paths.store, "examples"));

    let wsd = paths.wsd_store.unwrap();
    let conn = Connection::open(&wsd).unwrap();
    let (text, offsets): (String, String) = conn
        .query_row("SELECT text, offsets FROM examples", [], |r| Ok((r.get(0)?, r.get(1)?)))
        .unwrap();
    assert_eq!(text, "The cat sat on the mat.");
    assert_eq!(offsets, "[[4,7]]");
    assert_eq!(senses(&wsd), senses(&paths.store));
}

#[test]
fn export_round_trips_examples() {
    let fx = Fixture::new();
    fx.source("en", "en", ENGLISH);
    fx.data("en", "difficulty.json", CURATED);
    let spec = JobSpec::new("en", "en");
    fx.run(&spec, true).unwrap();

    let paths = fx.paths(&spec);
    assert!(paths.wsd_klld.as_ref().unwrap().exists());

    let store_rows = senses(&paths.store);
    let conn = Connection::open(&paths.klld).unwrap();
    let mut stmt = conn
        .prepare(
            "SELECT id, term_lemma_id, pos_type, short_def, full_def, example_sentence
             FROM senses",
        )
        .unwrap();
    let exported: Vec<(i64, i64, i64, String, String, Option<String>)> = stmt
        .query_map([], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?, r.get(5)?)))
        .unwrap()
        .map(|r| r.unwrap())
        .collect();
    assert_eq!(exported.len(), store_rows.len());

    for (id, _, _, short, full, example) in &exported {
        let source = store_rows.iter().find(|r| r.id == *id).unwrap();
        assert_eq!(decode(short), source.short_def);
        assert_eq!(decode(full), source.full_def.trim_end_matches('.'));
        assert_eq!(example.as_deref().map(decode), source.example);
    }

    let lemmas: Vec<String> = conn
        .prepare("SELECT lemma FROM lemmas ORDER BY id")
        .unwrap()
        .query_map([], |r| r.get(0))
        .unwrap()
        .map(|r| r.unwrap())
        .collect();
    assert_eq!(lemmas, vec!["cat", "run", "zyzzyva"]);
}

// ============================================================================
// Simplified-script twin
// ============================================================================

#[test]
fn twin_store_mirrors_ids_and_references() {
    let fx = Fixture::new();
    fx.source(
        "en",
        "zh",
        &[
            r#"{"word": "cat", "pos": "noun", "forms": [{"form": "cats"}], "sounds": [{"ipa": "/kæt/", "tags": ["US"]}], "senses": [{"glosses": ["貓。"], "examples": [{"text": "貓很可愛"}]}, {"glosses": ["發脾氣的女人"]}]}"#,
            r#"{"word": "dog", "pos": "noun", "senses": [{"glosses": ["狗"]}]}"#,
        ],
    );
    fx.data("en", "difficulty.json", r#"{"cat": 3, "dog": 1}"#);
    fx.data("zh", "t2s.tsv", "貓\t猫\n發\t发\n");
    let spec = JobSpec::new("en", "zh");
    fx.run(&spec, true).unwrap();

    let paths = fx.paths(&spec);
    let primary = senses(&paths.store);
    let twin = senses(paths.twin_store.as_ref().unwrap());
    assert_eq!(primary.len(), 3);
    assert_eq!(primary.len(), twin.len());
    for (p, t) in primary.iter().zip(&twin) {
        assert_eq!(p.id, t.id);
        assert_eq!(p.enabled, t.enabled);
        assert_eq!(p.difficulty, t.difficulty);
        assert_eq!(p.form_group_id, t.form_group_id);
        assert_eq!(p.sound_id, t.sound_id);
    }
    assert_eq!(primary[0].short_def, "貓");
    assert_eq!(twin[0].short_def, "猫");
    assert_eq!(twin[0].example.as_deref(), Some("猫很可愛"));
    assert_eq!(twin[1].short_def, "发脾氣的女人");

    let klld = Connection::open(paths.twin_klld.unwrap()).unwrap();
    let id: String = klld
        .query_row("SELECT value FROM metadata WHERE key = 'id'", [], |r| r.get(0))
        .unwrap();
    assert_eq!(id, "kll.en.zh_cn");
}

// ============================================================================
// Translation-derived glosses
// ============================================================================

#[test]
fn hebrew_glosses_come_from_english_translations() {
    let fx = Fixture::new();
    fx.source(
        "en",
        "en",
        &[
            r#"{"word": "cat", "pos": "noun", "senses": [{"glosses": ["A feline."]}], "translations": [{"code": "he", "word": "חתול", "sense": "feline"}, {"code": "he", "word": "חתולה", "sense": "feline"}, {"code": "fr", "word": "chat", "sense": "feline"}]}"#,
            r#"{"word": "dog", "pos": "noun", "senses": [{"glosses": ["A canine."]}]}"#,
        ],
    );
    fx.data("en", "difficulty.json", r#"{"cat": 2, "dog": 1}"#);
    let spec = JobSpec::new("en", "he");
    let stats = fx.run(&spec, false).unwrap();

    assert_eq!(stats.filtered_no_translations, 1);
    let rows = senses(&fx.paths(&spec).store);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].short_def, "חתול");
    assert_eq!(rows[0].full_def, "חתול, חתולה");
    assert!(rows[0].enabled);
}

// ============================================================================
// Input handling
// ============================================================================

#[test]
fn compressed_source_is_read() {
    let fx = Fixture::new();
    let dir = fx.dirs.input.join("fr");
    fs::create_dir_all(&dir).unwrap();
    let file = fs::File::create(dir.join("fr_en.jsonl.bz2")).unwrap();
    let mut encoder = BzEncoder::new(file, Compression::default());
    writeln!(
        encoder,
        r#"{{"word": "chat", "pos": "noun", "senses": [{{"glosses": ["cat"]}}]}}"#
    )
    .unwrap();
    encoder.finish().unwrap();

    let spec = JobSpec::new("fr", "en");
    let stats = fx.run(&spec, false).unwrap();
    assert_eq!(stats.senses, 1);
    let rows = senses(&fx.paths(&spec).store);
    // No frequency data: every headword is hidden.
    assert!(!rows[0].enabled);
    assert_eq!(rows[0].difficulty, 1);
}

#[test]
fn headword_reappearing_is_ungrouped_input() {
    let fx = Fixture::new();
    fx.source(
        "de",
        "en",
        &[
            r#"{"word": "Hund", "pos": "noun", "senses": [{"glosses": ["dog"]}]}"#,
            r#"{"word": "Katze", "pos": "noun", "senses": [{"glosses": ["cat"]}]}"#,
            r#"{"word": "Hund", "pos": "verb", "senses": [{"glosses": ["to hound"]}]}"#,
        ],
    );
    let err = fx.run(&JobSpec::new("de", "en"), false).unwrap_err();
    match err {
        LexiconError::UngroupedInput { line, word } => {
            assert_eq!(line, 3);
            assert_eq!(word, "Hund");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn malformed_line_is_fatal() {
    let fx = Fixture::new();
    fx.source(
        "de",
        "en",
        &[
            r#"{"word": "Hund", "pos": "noun", "senses": [{"glosses": ["dog"]}]}"#,
            r#"{"word": "Katze", "pos": "#,
        ],
    );
    let err = fx.run(&JobSpec::new("de", "en"), false).unwrap_err();
    assert!(matches!(err, LexiconError::SourceFormat { line: 2, .. }));
    assert!(!fx.paths(&JobSpec::new("de", "en")).store.exists());
}

#[test]
fn failed_job_leaves_no_outputs() {
    let fx = Fixture::new();
    fx.data("en", "difficulty.json", CURATED);
    fx.source("en", "en", ENGLISH);
    let spec = JobSpec::new("en", "en");
    let paths = fx.paths(&spec);
    fx.run(&spec, true).unwrap();
    assert!(paths.wsd_store.is_some());
    for path in paths.outputs() {
        assert!(path.exists(), "{}", path.display());
    }

    let mut broken = ENGLISH.to_vec();
    broken.push(r#"{"word": "zebra", "pos": "#);
    fx.source("en", "en", &broken);
    let err = fx.run(&spec, true).unwrap_err();
    assert!(matches!(err, LexiconError::SourceFormat { .. }));
    for path in paths.outputs() {
        assert!(!path.exists(), "{}", path.display());
    }
}

#[test]
fn spinner_joins_shared_multi_progress() {
    let fx = Fixture::new();
    fx.source(
        "de",
        "en",
        &[r#"{"word": "Hund", "pos": "noun", "senses": [{"glosses": ["dog"]}]}"#],
    );
    let spec = JobSpec::new("de", "en");
    let multi = MultiProgress::with_draw_target(ProgressDrawTarget::hidden());
    let options = JobOptions {
        progress: true,
        export: false,
        multi: Some(multi),
    };
    let stats = run_job(&fx.config, &spec, &fx.paths(&spec), &options).unwrap();
    assert_eq!(stats.senses, 1);
}

#[test]
fn english_requires_curated_difficulty() {
    let fx = Fixture::new();
    fx.source("en", "en", ENGLISH);
    let err = fx.run(&JobSpec::new("en", "en"), false).unwrap_err();
    assert!(matches!(err, LexiconError::MissingResource { .. }));
    assert!(err.is_configuration());
}

#[test]
fn chinese_twin_requires_conversion_table() {
    let fx = Fixture::new();
    fx.source("en", "zh", &[r#"{"word": "cat", "pos": "noun", "senses": [{"glosses": ["貓"]}]}"#]);
    fx.data("en", "difficulty.json", CURATED);
    let err = fx.run(&JobSpec::new("en", "zh"), false).unwrap_err();
    assert!(err.is_configuration());
}

#[test]
fn rerun_replaces_previous_store() {
    let fx = Fixture::new();
    fx.source("en", "en", ENGLISH);
    fx.data("en", "difficulty.json", CURATED);
    let spec = JobSpec::new("en", "en");
    fx.run(&spec, false).unwrap();
    let first = senses(&fx.paths(&spec).store);
    fx.run(&spec, false).unwrap();
    assert_eq!(senses(&fx.paths(&spec).store), first);
}
