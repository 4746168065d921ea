use std::time::{SystemTime, UNIX_EPOCH};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::config::{ContextConfig, ProgressionConfig};
use crate::error::{ProgressError, StoreError};
use crate::exercises::curriculum::level_groups;
use crate::progress::state::{ExerciseState, GroupId, GroupProgressRecord};
use crate::progress::store::{NewGroupRecord, ProgressStore, RecordUpdate};

/// Source of `lastPracticedAt` timestamps, in milliseconds since the epoch.
pub trait Clock {
    fn now_millis(&self) -> u64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// What the UI should play next.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseParams {
    #[serde(rename = "groupID")]
    pub group_id: GroupId,
    pub melody_length: u32,
    pub bpm: u32,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum NextExercise {
    Exercise(ExerciseParams),
    /// Nothing left to practise in the context; `level` is its last level.
    AllGraduated { level: u32 },
}

#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CompletionResult {
    /// State of the attempted exercise after the update.
    pub state: ExerciseState,
    /// Melody length newly unlocked by this attempt, if any.
    pub unlocked: Option<u32>,
    pub next: NextExercise,
}

/// Weighted draw favouring the slowest exercises.
///
/// Candidates are ordered by tempo (ties by group, then melody length) and
/// weighted N, N-1, ..., 1, so the slowest of N candidates is N times as
/// likely as the fastest.
pub fn pick_weighted(mut candidates: Vec<ExerciseParams>, rng: &mut impl Rng) -> Option<ExerciseParams> {
    if candidates.is_empty() {
        return None;
    }
    candidates.sort_by(|a, b| {
        a.bpm
            .cmp(&b.bpm)
            .then_with(|| a.group_id.cmp(&b.group_id))
            .then_with(|| a.melody_length.cmp(&b.melody_length))
    });
    let n = candidates.len();
    let total = n * (n + 1) / 2;
    let mut draw = rng.gen_range(0..total);
    for (i, candidate) in candidates.iter().enumerate() {
        let weight = n - i;
        if draw < weight {
            return Some(candidate.clone());
        }
        draw -= weight;
    }
    candidates.pop()
}

pub struct ProgressionEngine<S, C = SystemClock> {
    store: S,
    clock: C,
    config: ProgressionConfig,
    rng: StdRng,
}

impl<S: ProgressStore, C: Clock> ProgressionEngine<S, C> {
    pub fn new(store: S, clock: C, config: ProgressionConfig) -> Self {
        ProgressionEngine {
            store,
            clock,
            config,
            rng: StdRng::from_entropy(),
        }
    }

    /// Replace the selection RNG, e.g. with a seeded one in tests.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn config(&self) -> &ProgressionConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: ProgressionConfig) {
        self.config = config;
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    fn context(&self, context: &str) -> Result<ContextConfig, ProgressError> {
        self.config
            .context(context)
            .cloned()
            .ok_or_else(|| ProgressError::Configuration(format!("unknown context \"{}\"", context)))
    }

    /// Record one attempt and choose the next exercise.
    pub fn complete_attempt(
        &mut self,
        user_id: &str,
        context: &str,
        group_id: &GroupId,
        melody_length: u32,
        accuracy: f64,
    ) -> Result<CompletionResult, ProgressError> {
        if !accuracy.is_finite() || !(0.0..=1.0).contains(&accuracy) {
            return Err(ProgressError::InvalidInput(format!(
                "accuracy {} is outside 0-1",
                accuracy
            )));
        }
        self.context(context)?;

        let record = self
            .store
            .find_group_record(user_id, context, group_id)?
            .ok_or_else(|| {
                StoreError::NotFound(format!("{}/{}/{}", user_id, context, group_id))
            })?;
        let mut states = record.exercise_states.clone();
        let state = states
            .get_mut(&melody_length)
            .ok_or_else(|| ProgressError::MissingExerciseState {
                group_id: group_id.to_string(),
                melody_length,
            })?;

        state.normalize(&self.config);
        let before = state.current_tempo_bpm;
        state.record_attempt(accuracy, &self.config);
        let updated = state.clone();
        log::debug!(
            "progress: {} length {} accuracy {:.2}, tempo {} -> {}",
            group_id,
            melody_length,
            accuracy,
            before,
            updated.current_tempo_bpm
        );

        let mut unlocked = None;
        if !updated.is_graduated
            && melody_length < self.config.max_melody_length
            && updated.current_tempo_bpm >= self.config.unlock_tempo
        {
            let successor = melody_length + 1;
            let already_open = states.get(&successor).is_some_and(|s| s.is_unlocked);
            if !already_open {
                states.insert(successor, ExerciseState::unlocked(&self.config));
                unlocked = Some(successor);
                log::info!("progress: unlocked length {} of {}", successor, group_id);
            }
        }

        self.store.update_group_record(
            &record.id,
            RecordUpdate {
                expected_version: Some(record.version),
                is_active: Some(true),
                last_practiced_at: Some(self.clock.now_millis()),
                exercise_states: Some(states),
                ..Default::default()
            },
        )?;

        let exclude = updated.is_graduated.then(|| (group_id.clone(), melody_length));
        let next = self.select_next_excluding(user_id, context, record.level, exclude.as_ref())?;
        Ok(CompletionResult {
            state: updated,
            unlocked,
            next,
        })
    }

    /// Weighted pick across every eligible exercise at `level`, advancing
    /// to later levels while the current one is fully graduated.
    pub fn select_next(&mut self, user_id: &str, context: &str, level: u32) -> Result<NextExercise, ProgressError> {
        self.select_next_excluding(user_id, context, level, None)
    }

    fn select_next_excluding(
        &mut self,
        user_id: &str,
        context: &str,
        level: u32,
        exclude: Option<&(GroupId, u32)>,
    ) -> Result<NextExercise, ProgressError> {
        let ctx = self.context(context)?;
        if let Some(params) = self.pick_at_level(user_id, context, level, exclude)? {
            return Ok(NextExercise::Exercise(params));
        }

        let mut level = level;
        loop {
            if level >= ctx.max_level {
                log::info!("progress: {} fully graduated at level {}", context, level);
                return Ok(NextExercise::AllGraduated { level });
            }
            level += 1;
            log::info!("progress: advancing {} to level {}", context, level);

            let records = self.ensure_level_groups(user_id, context, level)?;
            if records.is_empty() {
                return Err(ProgressError::Configuration(format!(
                    "level {} of {} has no groups",
                    level, context
                )));
            }
            if let Some(params) = self.pick_at_level(user_id, context, level, None)? {
                return Ok(NextExercise::Exercise(params));
            }
            let fully_graduated = records.iter().all(|r| {
                !r.exercise_states.is_empty() && r.exercise_states.values().all(|s| s.is_graduated)
            });
            if !fully_graduated {
                return Err(ProgressError::Configuration(format!(
                    "level {} of {} has no eligible exercises",
                    level, context
                )));
            }
        }
    }

    /// Any exercise at `level`, creating the level's records first.
    ///
    /// `group_id` only has to parse; selection covers the whole level.
    pub fn get_first_exercise(
        &mut self,
        user_id: &str,
        context: &str,
        group_id: &str,
        level: u32,
    ) -> Result<NextExercise, ProgressError> {
        let ctx = self.context(context)?;
        let group: GroupId = group_id
            .parse()
            .map_err(|e| ProgressError::InvalidInput(format!("group {}: {}", group_id, e)))?;
        if level == 0 || level > ctx.max_level {
            return Err(ProgressError::InvalidInput(format!(
                "level {} is outside 1-{} for {}",
                level, ctx.max_level, context
            )));
        }
        if group.len() != level as usize + 1 {
            log::debug!("progress: group {} is not part of level {}", group, level);
        }

        let records = self.ensure_level_groups(user_id, context, level)?;
        if records.is_empty() {
            return Err(ProgressError::Configuration(format!(
                "level {} of {} has no groups",
                level, context
            )));
        }
        match self.pick_at_level(user_id, context, level, None)? {
            Some(params) => Ok(NextExercise::Exercise(params)),
            None => Ok(NextExercise::AllGraduated { level }),
        }
    }

    /// Create any missing records for `level` and return all of them.
    pub fn ensure_level_groups(
        &mut self,
        user_id: &str,
        context: &str,
        level: u32,
    ) -> Result<Vec<GroupProgressRecord>, ProgressError> {
        let ctx = self.context(context)?;
        let now = self.clock.now_millis();
        let mut created = 0;
        for group in level_groups(&ctx, level) {
            if self.store.find_group_record(user_id, context, &group)?.is_some() {
                continue;
            }
            let record = NewGroupRecord::seeded(user_id, context, group, level, &self.config, now);
            match self.store.create_group_record(record) {
                Ok(_) => created += 1,
                Err(StoreError::AlreadyExists { group_id, .. }) => {
                    log::debug!("progress: {} was created concurrently", group_id);
                }
                Err(e) => return Err(e.into()),
            }
        }
        if created > 0 {
            log::info!("progress: created {} groups at level {} of {}", created, level, context);
        }
        Ok(self.store.list_group_records(user_id, context, level)?)
    }

    fn pick_at_level(
        &mut self,
        user_id: &str,
        context: &str,
        level: u32,
        exclude: Option<&(GroupId, u32)>,
    ) -> Result<Option<ExerciseParams>, ProgressError> {
        let records = self.store.list_group_records(user_id, context, level)?;
        let mut candidates = Vec::new();
        for record in &records {
            for (melody_length, state) in record.eligible() {
                if exclude.is_some_and(|(g, len)| *g == record.group_id && *len == melody_length) {
                    continue;
                }
                candidates.push(ExerciseParams {
                    group_id: record.group_id.clone(),
                    melody_length,
                    bpm: state.current_tempo_bpm,
                });
            }
        }
        Ok(pick_weighted(candidates, &mut self.rng))
    }
}
