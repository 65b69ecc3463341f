//! Content-addressed form groups and sounds, scoped to one headword.
//!
//! Both caches are cleared whenever the headword changes, so two unrelated
//! headwords with the same form set still get separate groups and memory
//! stays bounded by a single headword's variants.

use std::collections::{BTreeSet, HashMap};

use crate::error::Result;
use crate::pronunciation::Pronunciation;

/// Persists a new group row and returns its id.
pub trait GroupWriter {
    fn write_form_group(&mut self, forms: &BTreeSet<String>) -> Result<i64>;
    fn write_sound(&mut self, sound: &Pronunciation) -> Result<i64>;
}

#[derive(Debug, Default)]
struct KeyCache {
    ids: HashMap<String, i64>,
}

impl KeyCache {
    fn get_or_create(
        &mut self,
        key: String,
        create: impl FnOnce() -> Result<i64>,
    ) -> Result<(i64, bool)> {
        if let Some(&id) = self.ids.get(&key) {
            return Ok((id, false));
        }
        let id = create()?;
        self.ids.insert(key, id);
        Ok((id, true))
    }
}

/// Sorted members joined by a unit separator; `None` for an empty set.
pub fn form_group_key(forms: &BTreeSet<String>) -> Option<String> {
    if forms.is_empty() {
        return None;
    }
    Some(forms.iter().map(String::as_str).collect::<Vec<_>>().join("\u{1f}"))
}

#[derive(Debug, Default)]
pub struct DedupStores {
    headword: Option<String>,
    forms: KeyCache,
    sounds: KeyCache,
    pub form_groups_created: usize,
    pub sounds_created: usize,
}

impl DedupStores {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter a headword's scope, dropping the previous headword's groups.
    pub fn enter(&mut self, headword: &str) {
        if self.headword.as_deref() != Some(headword) {
            self.forms.ids.clear();
            self.sounds.ids.clear();
            self.headword = Some(headword.to_string());
        }
    }

    pub fn form_group(
        &mut self,
        writer: &mut impl GroupWriter,
        forms: &BTreeSet<String>,
    ) -> Result<Option<i64>> {
        let Some(key) = form_group_key(forms) else {
            return Ok(None);
        };
        let (id, created) = self.forms.get_or_create(key, || writer.write_form_group(forms))?;
        if created {
            self.form_groups_created += 1;
        }
        Ok(Some(id))
    }

    pub fn sound(
        &mut self,
        writer: &mut impl GroupWriter,
        sound: Option<&Pronunciation>,
    ) -> Result<Option<i64>> {
        let Some(sound) = sound.filter(|s| !s.is_empty()) else {
            return Ok(None);
        };
        let (id, created) = self
            .sounds
            .get_or_create(sound.dedup_key(), || writer.write_sound(sound))?;
        if created {
            self.sounds_created += 1;
        }
        Ok(Some(id))
    }
}
