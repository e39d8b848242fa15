use nlu_abstraction::EntityAnnotation;

/// One training example.
///
/// Intent-bearing ("common") examples carry an intent; label examples don't.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub text: String,
    pub intent: Option<String>,
    pub entities: Vec<EntityAnnotation>,
}

impl Message {
    #[must_use]
    pub fn common(text: impl Into<String>, intent: impl Into<String>, entities: Vec<EntityAnnotation>) -> Self {
        Self { text: text.into(), intent: Some(intent.into()), entities }
    }

    #[must_use]
    pub fn label(text: impl Into<String>, entities: Vec<EntityAnnotation>) -> Self {
        Self { text: text.into(), intent: None, entities }
    }
}

/// Raw form -> canonical value mapping, kept in insertion order.
///
/// Equality compares the mapping only; two values with the same pairs in a
/// different order are equal.
#[derive(Debug, Clone, Default)]
pub struct EntitySynonyms {
    entries: Vec<(String, String)>,
}

impl EntitySynonyms {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps `raw` to `canonical`. Re-inserting a raw form replaces its value in
    /// place and returns the previous one.
    pub fn insert(&mut self, raw: impl Into<String>, canonical: impl Into<String>) -> Option<String> {
        let raw = raw.into();
        let canonical = canonical.into();
        if let Some(entry) = self.entries.iter_mut().find(|(r, _)| *r == raw) {
            return Some(std::mem::replace(&mut entry.1, canonical));
        }
        self.entries.push((raw, canonical));
        None
    }

    #[must_use]
    pub fn get(&self, raw: &str) -> Option<&str> {
        self.entries.iter().find(|(r, _)| r == raw).map(|(_, c)| c.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(r, c)| (r.as_str(), c.as_str()))
    }

    /// Groups raw forms under their canonical value.
    ///
    /// Groups come out in first-insertion order of each canonical value and
    /// identity pairs (`raw == canonical`) are skipped.
    #[must_use]
    pub fn groups(&self) -> Vec<(&str, Vec<&str>)> {
        let mut groups: Vec<(&str, Vec<&str>)> = Vec::new();
        for (raw, canonical) in self.iter() {
            if raw == canonical {
                continue;
            }
            match groups.iter_mut().find(|(value, _)| *value == canonical) {
                Some((_, synonyms)) => synonyms.push(raw),
                None => groups.push((canonical, vec![raw])),
            }
        }
        groups
    }
}

impl PartialEq for EntitySynonyms {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(raw, canonical)| other.get(raw) == Some(canonical))
    }
}

impl Eq for EntitySynonyms {}

impl<R: Into<String>, C: Into<String>> FromIterator<(R, C)> for EntitySynonyms {
    fn from_iter<T: IntoIterator<Item = (R, C)>>(iter: T) -> Self {
        let mut synonyms = Self::new();
        for (raw, canonical) in iter {
            synonyms.insert(raw, canonical);
        }
        synonyms
    }
}

/// The fully materialized set of examples handed to a trainer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingCorpus {
    pub common_examples: Vec<Message>,
    pub label_examples: Vec<Message>,
    /// Passed through untouched; empty unless upstream provides features.
    pub regex_features: Vec<serde_json::Value>,
    pub entity_synonyms: EntitySynonyms,
}

impl TrainingCorpus {
    #[must_use]
    pub fn new(common_examples: Vec<Message>, label_examples: Vec<Message>) -> Self {
        Self { common_examples, label_examples, ..Self::default() }
    }

    /// Total number of examples, common and label.
    #[must_use]
    pub fn len(&self) -> usize {
        self.common_examples.len() + self.label_examples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Distinct intents of the common examples, in first-seen order.
    #[must_use]
    pub fn intents(&self) -> Vec<&str> {
        let mut intents: Vec<&str> = Vec::new();
        for intent in self.common_examples.iter().filter_map(|m| m.intent.as_deref()) {
            if !intents.contains(&intent) {
                intents.push(intent);
            }
        }
        intents
    }
}
