use crate::record::SoundData;

/// Pronunciation bundle stored as one `sounds` row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pronunciation {
    pub ipa: Option<String>,
    pub ga_ipa: Option<String>,
    pub rp_ipa: Option<String>,
    pub pinyin: Option<String>,
    pub bopomofo: Option<String>,
}

impl Pronunciation {
    /// Pick the pronunciation variants a language stores.
    pub fn from_sounds(lang: &str, sounds: &[SoundData]) -> Option<Self> {
        let mut p = Pronunciation::default();
        match lang {
            "en" => {
                for sound in sounds {
                    let Some(ipa) = sound.first_ipa() else {
                        continue;
                    };
                    if sound.tags.is_empty() {
                        return Some(Pronunciation {
                            ipa: Some(ipa.to_string()),
                            ..Default::default()
                        });
                    }
                    if (sound.has_tag("US") || sound.has_tag("General-American"))
                        && p.ga_ipa.is_none()
                    {
                        p.ga_ipa = Some(ipa.to_string());
                    }
                    if (sound.has_tag("UK") || sound.has_tag("Received-Pronunciation"))
                        && p.rp_ipa.is_none()
                    {
                        p.rp_ipa = Some(ipa.to_string());
                    }
                }
            }
            "zh" => {
                for sound in sounds {
                    let Some(pron) = sound.first_zh_pron() else {
                        continue;
                    };
                    if sound.tags.is_empty() {
                        return Some(Pronunciation {
                            pinyin: Some(pron.to_string()),
                            ..Default::default()
                        });
                    }
                    if !sound.has_tag("Mandarin") {
                        continue;
                    }
                    if sound.has_tag("Pinyin") {
                        if p.pinyin.is_none() {
                            p.pinyin = Some(pron.to_string());
                        }
                    } else if (sound.has_tag("bopomofo") || sound.has_tag("Zhuyin"))
                        && p.bopomofo.is_none()
                    {
                        p.bopomofo = Some(pron.to_string());
                    }
                }
            }
            _ => {
                p.ipa = sounds
                    .iter()
                    .find_map(|sound| sound.first_ipa())
                    .map(str::to_string);
            }
        }
        (!p.is_empty()).then_some(p)
    }

    pub fn is_empty(&self) -> bool {
        self.fields().iter().all(|(_, value)| value.is_none())
    }

    /// Fields in storage order.
    pub fn fields(&self) -> [(&'static str, Option<&str>); 5] {
        [
            ("ipa", self.ipa.as_deref()),
            ("ga_ipa", self.ga_ipa.as_deref()),
            ("rp_ipa", self.rp_ipa.as_deref()),
            ("pinyin", self.pinyin.as_deref()),
            ("bopomofo", self.bopomofo.as_deref()),
        ]
    }

    /// Content key: present fields in storage order.
    pub fn dedup_key(&self) -> String {
        self.fields()
            .iter()
            .filter_map(|(name, value)| value.map(|v| format!("{name}={v}")))
            .collect::<Vec<_>>()
            .join("\u{1f}")
    }
}
