use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::ProgressionConfig;
use crate::error::StoreError;
use crate::progress::state::{ExerciseState, ExerciseStates, GroupId, GroupProgressRecord};

/// Fields for a record that does not exist yet.
#[derive(Clone, Debug)]
pub struct NewGroupRecord {
    pub user_id: String,
    pub context: String,
    pub group_id: GroupId,
    pub level: u32,
    pub exercise_states: ExerciseStates,
    pub last_practiced_at: u64,
}

impl NewGroupRecord {
    /// A record holding only the initial melody length, unlocked at the
    /// starting tempo.
    pub fn seeded(
        user_id: &str,
        context: &str,
        group_id: GroupId,
        level: u32,
        rules: &ProgressionConfig,
        now: u64,
    ) -> Self {
        let mut exercise_states = ExerciseStates::new();
        exercise_states.insert(rules.initial_melody_length, ExerciseState::unlocked(rules));
        NewGroupRecord {
            user_id: user_id.to_string(),
            context: context.to_string(),
            group_id,
            level,
            exercise_states,
            last_practiced_at: now,
        }
    }
}

/// Partial update; `None` fields are left as stored.
#[derive(Clone, Debug, Default)]
pub struct RecordUpdate {
    /// When set, the update is rejected unless the stored version matches.
    pub expected_version: Option<u64>,
    pub level: Option<u32>,
    pub is_active: Option<bool>,
    pub last_practiced_at: Option<u64>,
    pub exercise_states: Option<ExerciseStates>,
}

/// Document store holding one progress record per (user, context, group).
///
/// Implementations must keep (user, context, group) unique: creating a
/// record that already exists fails with [`StoreError::AlreadyExists`].
pub trait ProgressStore {
    fn find_group_record(
        &self,
        user_id: &str,
        context: &str,
        group_id: &GroupId,
    ) -> Result<Option<GroupProgressRecord>, StoreError>;

    fn create_group_record(&mut self, record: NewGroupRecord) -> Result<GroupProgressRecord, StoreError>;

    fn update_group_record(&mut self, id: &str, update: RecordUpdate) -> Result<GroupProgressRecord, StoreError>;

    fn list_group_records(
        &self,
        user_id: &str,
        context: &str,
        level: u32,
    ) -> Result<Vec<GroupProgressRecord>, StoreError>;
}

/// Serialize exercise states as a JSON object keyed by melody length.
pub fn encode_exercise_states(states: &ExerciseStates) -> Result<String, StoreError> {
    Ok(serde_json::to_string(states)?)
}

/// Parse stored exercise states, dropping entries whose key is not a melody
/// length or whose value does not decode. Only a document that is not a
/// JSON object at all is an error.
pub fn decode_exercise_states(raw: &str) -> Result<ExerciseStates, StoreError> {
    let value: Value = serde_json::from_str(raw)?;
    let entries = match value {
        Value::Object(entries) => entries,
        Value::Null => return Ok(ExerciseStates::new()),
        other => {
            return Err(StoreError::Backend(format!(
                "exercise states must be an object, found {}",
                other
            )))
        }
    };

    let mut states = ExerciseStates::new();
    for (key, entry) in entries {
        let length = match key.trim().parse::<u32>() {
            Ok(length) if length > 0 => length,
            _ => {
                log::warn!("store: dropping exercise state with bad melody length {:?}", key);
                continue;
            }
        };
        match serde_json::from_value::<ExerciseState>(entry) {
            Ok(state) => {
                states.insert(length, state);
            }
            Err(e) => log::warn!("store: dropping malformed exercise state for length {}: {}", length, e),
        }
    }
    Ok(states)
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
struct StoredDocument {
    id: String,
    #[serde(rename = "userID")]
    user_id: String,
    context: String,
    #[serde(rename = "groupID")]
    group_id: String,
    level: u32,
    /// JSON object keyed by melody length, as written by `encode_exercise_states`.
    exercise_states: String,
    is_active: bool,
    last_practiced_at: u64,
    #[serde(default)]
    version: u64,
}

impl StoredDocument {
    fn matches(&self, user_id: &str, context: &str) -> bool {
        self.user_id == user_id && self.context == context
    }

    fn to_record(&self) -> Result<GroupProgressRecord, StoreError> {
        let group_id = self
            .group_id
            .parse::<GroupId>()
            .map_err(|e| StoreError::Backend(format!("record {}: {}", self.id, e)))?;
        Ok(GroupProgressRecord {
            id: self.id.clone(),
            user_id: self.user_id.clone(),
            context: self.context.clone(),
            group_id,
            level: self.level,
            exercise_states: decode_exercise_states(&self.exercise_states)?,
            is_active: self.is_active,
            last_practiced_at: self.last_practiced_at,
            version: self.version,
        })
    }
}

/// In-process store, snapshot-able to JSON for the browser's local storage.
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: BTreeMap<String, StoredDocument>,
    next_id: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn to_json(&self) -> Result<String, StoreError> {
        let documents: Vec<&StoredDocument> = self.documents.values().collect();
        Ok(serde_json::to_string(&documents)?)
    }

    pub fn from_json(json: &str) -> Result<Self, StoreError> {
        let documents: Vec<StoredDocument> = serde_json::from_str(json)?;
        let mut store = MemoryStore::new();
        for document in documents {
            if store.documents.contains_key(&document.id) {
                return Err(StoreError::Backend(format!("duplicate record id {}", document.id)));
            }
            store.documents.insert(document.id.clone(), document);
        }
        store.next_id = store.documents.len() as u64;
        Ok(store)
    }

    fn allocate_id(&mut self) -> String {
        loop {
            self.next_id += 1;
            let id = format!("progress-{}", self.next_id);
            if !self.documents.contains_key(&id) {
                return id;
            }
        }
    }
}

impl ProgressStore for MemoryStore {
    fn find_group_record(
        &self,
        user_id: &str,
        context: &str,
        group_id: &GroupId,
    ) -> Result<Option<GroupProgressRecord>, StoreError> {
        let key = group_id.to_string();
        self.documents
            .values()
            .find(|doc| doc.matches(user_id, context) && doc.group_id == key)
            .map(StoredDocument::to_record)
            .transpose()
    }

    fn create_group_record(&mut self, record: NewGroupRecord) -> Result<GroupProgressRecord, StoreError> {
        if self.find_group_record(&record.user_id, &record.context, &record.group_id)?.is_some() {
            return Err(StoreError::AlreadyExists {
                user_id: record.user_id,
                context: record.context,
                group_id: record.group_id.to_string(),
            });
        }
        let id = self.allocate_id();
        let document = StoredDocument {
            id: id.clone(),
            user_id: record.user_id,
            context: record.context,
            group_id: record.group_id.to_string(),
            level: record.level,
            exercise_states: encode_exercise_states(&record.exercise_states)?,
            is_active: true,
            last_practiced_at: record.last_practiced_at,
            version: 0,
        };
        let created = document.to_record()?;
        self.documents.insert(id, document);
        Ok(created)
    }

    fn update_group_record(&mut self, id: &str, update: RecordUpdate) -> Result<GroupProgressRecord, StoreError> {
        let encoded = update
            .exercise_states
            .as_ref()
            .map(encode_exercise_states)
            .transpose()?;
        let document = self
            .documents
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        if let Some(expected) = update.expected_version {
            if expected != document.version {
                return Err(StoreError::Conflict {
                    id: id.to_string(),
                    expected,
                    actual: document.version,
                });
            }
        }
        if let Some(level) = update.level {
            document.level = level;
        }
        if let Some(is_active) = update.is_active {
            document.is_active = is_active;
        }
        if let Some(at) = update.last_practiced_at {
            document.last_practiced_at = at;
        }
        if let Some(states) = encoded {
            document.exercise_states = states;
        }
        document.version += 1;
        document.to_record()
    }

    fn list_group_records(
        &self,
        user_id: &str,
        context: &str,
        level: u32,
    ) -> Result<Vec<GroupProgressRecord>, StoreError> {
        let mut records = Vec::new();
        for doc in self.documents.values() {
            if !doc.matches(user_id, context) || doc.level != level {
                continue;
            }
            match doc.to_record() {
                Ok(record) => records.push(record),
                Err(e) => log::warn!("store: skipping unreadable record {}: {}", doc.id, e),
            }
        }
        records.sort_by(|a, b| a.group_id.cmp(&b.group_id));
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(s: &str) -> GroupId {
        s.parse().unwrap()
    }

    fn seeded(user: &str, g: &str, level: u32) -> NewGroupRecord {
        NewGroupRecord::seeded(user, "major", group(g), level, &ProgressionConfig::default(), 1_000)
    }

    #[test]
    fn test_create_seeds_initial_length() {
        let mut store = MemoryStore::new();
        let record = store.create_group_record(seeded("u1", "(1,3)", 1)).unwrap();
        assert_eq!(record.exercise_states.len(), 1);
        let state = &record.exercise_states[&2];
        assert_eq!(state.current_tempo_bpm, 60);
        assert!(state.is_unlocked);
        assert!(!state.is_graduated);
        assert_eq!(state.last_accuracy, None);
        assert!(record.is_active);
        assert_eq!(record.version, 0);
    }

    #[test]
    fn test_create_rejects_duplicates() {
        let mut store = MemoryStore::new();
        store.create_group_record(seeded("u1", "(1,3)", 1)).unwrap();
        assert!(matches!(
            store.create_group_record(seeded("u1", "(3,1)", 1)),
            Err(StoreError::AlreadyExists { .. })
        ));
        store.create_group_record(seeded("u2", "(1,3)", 1)).unwrap();
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_update_checks_version() {
        let mut store = MemoryStore::new();
        let record = store.create_group_record(seeded("u1", "(1,3)", 1)).unwrap();
        let updated = store
            .update_group_record(
                &record.id,
                RecordUpdate {
                    expected_version: Some(0),
                    last_practiced_at: Some(2_000),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.version, 1);
        assert_eq!(updated.last_practiced_at, 2_000);
        assert_eq!(updated.exercise_states, record.exercise_states);

        let stale = store.update_group_record(
            &record.id,
            RecordUpdate {
                expected_version: Some(0),
                ..Default::default()
            },
        );
        assert!(matches!(stale, Err(StoreError::Conflict { expected: 0, actual: 1, .. })));
        assert!(matches!(
            store.update_group_record("missing", RecordUpdate::default()),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_list_filters_by_level() {
        let mut store = MemoryStore::new();
        store.create_group_record(seeded("u1", "(1,3)", 1)).unwrap();
        store.create_group_record(seeded("u1", "(1,2)", 1)).unwrap();
        store.create_group_record(seeded("u1", "(1,3,5)", 2)).unwrap();
        store.create_group_record(seeded("u2", "(1,4)", 1)).unwrap();
        let level_one = store.list_group_records("u1", "major", 1).unwrap();
        let ids: Vec<String> = level_one.iter().map(|r| r.group_id.to_string()).collect();
        assert_eq!(ids, ["(1,2)", "(1,3)"]);
        assert!(store.list_group_records("u1", "minor", 1).unwrap().is_empty());
    }

    #[test]
    fn test_decode_drops_malformed_entries() {
        let raw = r#"{
            "2": {"currentTempoBPM": 80, "lastAccuracy": 0.9, "isGraduated": false, "isUnlocked": true, "accuracyHistory": [0.9]},
            "3": {"currentTempoBPM": "fast", "isGraduated": false, "isUnlocked": true},
            "4": {"isGraduated": false},
            "x": {"currentTempoBPM": 60, "isGraduated": false, "isUnlocked": true},
            "5": {"currentBPM": 60, "accuracyLastAttempt": null, "isGraduated": false, "unlocked": true}
        }"#;
        let states = decode_exercise_states(raw).unwrap();
        assert_eq!(states.keys().copied().collect::<Vec<_>>(), vec![2, 5]);
        assert_eq!(states[&2].accuracy_history.to_vec(), vec![0.9]);
        assert!(decode_exercise_states("[1, 2]").is_err());
        assert!(decode_exercise_states("null").unwrap().is_empty());
    }

    #[test]
    fn test_encode_uses_string_keys() {
        let mut states = ExerciseStates::new();
        states.insert(2, ExerciseState::unlocked(&ProgressionConfig::default()));
        let json: Value = serde_json::from_str(&encode_exercise_states(&states).unwrap()).unwrap();
        assert_eq!(json["2"]["currentTempoBPM"], 60);
    }

    #[test]
    fn test_snapshot_round_trip() {
        let mut store = MemoryStore::new();
        store.create_group_record(seeded("u1", "(1,3)", 1)).unwrap();
        store.create_group_record(seeded("u1", "(2,4)", 1)).unwrap();
        let snapshot = store.to_json().unwrap();

        let mut restored = MemoryStore::from_json(&snapshot).unwrap();
        assert_eq!(restored.len(), 2);
        let found = restored.find_group_record("u1", "major", &group("(1,3)")).unwrap().unwrap();
        assert_eq!(found.exercise_states[&2].current_tempo_bpm, 60);

        let third = restored.create_group_record(seeded("u1", "(5,6)", 1)).unwrap();
        assert_eq!(restored.len(), 3);
        assert_ne!(third.id, found.id);
    }
}
