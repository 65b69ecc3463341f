//! SQLite lexicon store.
//!
//! A store is rebuilt from scratch on every run: `create` truncates the file,
//! all rows go in under one transaction, and `finalize` commits, indexes and
//! drops the example table (after copying the store to its WSD backup when
//! one is requested).

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OpenFlags};
use tracing::{debug, info};

use crate::convert::ScriptConverter;
use crate::dedup::GroupWriter;
use crate::error::Result;
use crate::pronunciation::Pronunciation;
use crate::senses::OffsetExample;

const SCHEMA: &str = "
    CREATE TABLE sounds (
        id INTEGER PRIMARY KEY,
        ipa TEXT,
        ga_ipa TEXT,
        rp_ipa TEXT,
        pinyin TEXT,
        bopomofo TEXT
    );
    CREATE TABLE form_groups (id INTEGER PRIMARY KEY);
    CREATE TABLE forms (
        form TEXT NOT NULL,
        form_group_id INTEGER NOT NULL REFERENCES form_groups(id),
        UNIQUE(form, form_group_id)
    );
    CREATE TABLE senses (
        id INTEGER PRIMARY KEY,
        enabled INTEGER NOT NULL DEFAULT 0,
        lemma TEXT NOT NULL,
        pos TEXT NOT NULL,
        short_def TEXT NOT NULL,
        full_def TEXT NOT NULL,
        example TEXT,
        difficulty INTEGER NOT NULL,
        sound_id INTEGER REFERENCES sounds(id),
        form_group_id INTEGER REFERENCES form_groups(id)
    );
    CREATE TABLE examples (
        text TEXT NOT NULL,
        offsets TEXT NOT NULL,
        sense_id INTEGER NOT NULL REFERENCES senses(id)
    );
";

/// One `senses` row before it has an id.
#[derive(Debug, Clone)]
pub struct SenseRow {
    pub enabled: bool,
    pub lemma: String,
    pub pos: String,
    pub short_def: String,
    pub full_def: String,
    pub example: Option<String>,
    pub difficulty: u8,
    pub sound_id: Option<i64>,
    pub form_group_id: Option<i64>,
}

pub struct LexiconStore {
    conn: Connection,
    path: PathBuf,
}

impl LexiconStore {
    /// Create an empty store at `path`, replacing any previous file.
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        if path.exists() {
            fs::remove_file(path)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode=MEMORY;
             PRAGMA synchronous=OFF;
             PRAGMA temp_store=MEMORY;
             PRAGMA cache_size=-64000;",
        )?;
        conn.execute_batch(SCHEMA)?;
        conn.execute_batch("BEGIN")?;
        debug!(path = %path.display(), "created lexicon store");
        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    /// Open a finished store for reading.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn insert_sound(&self, id: Option<i64>, sound: &Pronunciation) -> Result<i64> {
        let mut stmt = self.conn.prepare_cached(
            "INSERT INTO sounds (id, ipa, ga_ipa, rp_ipa, pinyin, bopomofo)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        stmt.execute(params![
            id,
            sound.ipa,
            sound.ga_ipa,
            sound.rp_ipa,
            sound.pinyin,
            sound.bopomofo
        ])?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn insert_form_group(&self, id: Option<i64>, forms: &BTreeSet<String>) -> Result<i64> {
        self.conn
            .prepare_cached("INSERT INTO form_groups (id) VALUES (?1)")?
            .execute(params![id])?;
        let group_id = self.conn.last_insert_rowid();
        let mut stmt = self
            .conn
            .prepare_cached("INSERT OR IGNORE INTO forms (form, form_group_id) VALUES (?1, ?2)")?;
        for form in forms {
            stmt.execute(params![form, group_id])?;
        }
        Ok(group_id)
    }

    pub fn insert_sense(&self, id: Option<i64>, row: &SenseRow) -> Result<i64> {
        let mut stmt = self.conn.prepare_cached(
            "INSERT INTO senses
             (id, enabled, lemma, pos, short_def, full_def, example, difficulty, sound_id, form_group_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )?;
        stmt.execute(params![
            id,
            row.enabled,
            row.lemma,
            row.pos,
            row.short_def,
            row.full_def,
            row.example,
            row.difficulty,
            row.sound_id,
            row.form_group_id
        ])?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn insert_example(&self, sense_id: i64, example: &OffsetExample) -> Result<()> {
        self.conn
            .prepare_cached("INSERT INTO examples (text, offsets, sense_id) VALUES (?1, ?2, ?3)")?
            .execute(params![example.text, example.offsets, sense_id])?;
        Ok(())
    }

    /// Commit, index, optionally back up, then drop the example table.
    pub fn finalize(self, wsd_backup: Option<&Path>) -> Result<()> {
        self.conn.flush_prepared_statement_cache();
        self.conn.execute_batch(
            "COMMIT;
             CREATE INDEX senses_lemma_pos_index ON senses(lemma, pos);
             CREATE INDEX senses_form_group_id_index ON senses(form_group_id);",
        )?;

        if let Some(backup) = wsd_backup {
            if let Some(parent) = backup.parent() {
                fs::create_dir_all(parent)?;
            }
            if backup.exists() {
                fs::remove_file(backup)?;
            }
            self.conn
                .execute("VACUUM INTO ?1", params![backup.to_string_lossy()])?;
            info!(backup = %backup.display(), "wrote WSD backup store");
        }

        self.conn.execute_batch("DROP TABLE examples; VACUUM;")?;
        debug!(path = %self.path.display(), "finalized lexicon store");
        Ok(())
    }
}

/// The primary store plus the simplified-script twin, written in lockstep.
///
/// Every row inserted into the primary store is mirrored into the twin under
/// the same id; only gloss and example text is converted.
pub struct StoreSet<'a> {
    pub primary: LexiconStore,
    twin: Option<(LexiconStore, &'a dyn ScriptConverter)>,
}

impl<'a> StoreSet<'a> {
    pub fn new(primary: LexiconStore) -> Self {
        Self {
            primary,
            twin: None,
        }
    }

    pub fn with_twin(mut self, twin: LexiconStore, converter: &'a dyn ScriptConverter) -> Self {
        self.twin = Some((twin, converter));
        self
    }

    pub fn insert_sense(&mut self, row: &SenseRow) -> Result<i64> {
        let id = self.primary.insert_sense(None, row)?;
        if let Some((twin, converter)) = &self.twin {
            let converted = SenseRow {
                short_def: converter.convert(&row.short_def),
                full_def: converter.convert(&row.full_def),
                example: row.example.as_deref().map(|e| converter.convert(e)),
                ..row.clone()
            };
            twin.insert_sense(Some(id), &converted)?;
        }
        Ok(id)
    }

    pub fn insert_example(&mut self, sense_id: i64, example: &OffsetExample) -> Result<()> {
        self.primary.insert_example(sense_id, example)?;
        if let Some((twin, _)) = &self.twin {
            twin.insert_example(sense_id, example)?;
        }
        Ok(())
    }

    pub fn finalize(self, wsd_backup: Option<&Path>) -> Result<()> {
        self.primary.finalize(wsd_backup)?;
        if let Some((twin, _)) = self.twin {
            twin.finalize(None)?;
        }
        Ok(())
    }
}

impl GroupWriter for StoreSet<'_> {
    fn write_form_group(&mut self, forms: &BTreeSet<String>) -> Result<i64> {
        let id = self.primary.insert_form_group(None, forms)?;
        if let Some((twin, _)) = &self.twin {
            twin.insert_form_group(Some(id), forms)?;
        }
        Ok(id)
    }

    fn write_sound(&mut self, sound: &Pronunciation) -> Result<i64> {
        let id = self.primary.insert_sound(None, sound)?;
        if let Some((twin, _)) = &self.twin {
            twin.insert_sound(Some(id), sound)?;
        }
        Ok(id)
    }
}
