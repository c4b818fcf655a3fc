// src/store.rs
//! The entity store: typed commands, a pure reducer and a small
//! subscribe/dispatch container around the current snapshot.
use crate::gateway::Clock;
use crate::model::{
    AppSnapshot, BackupDocument, DayRecord, Exercise, ExerciseChanges, NewExercise, NewProfile,
    Profile, ProfileChanges,
};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::fmt;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    CreateProfile(NewProfile),
    UpdateProfile {
        id: String,
        changes: ProfileChanges,
    },
    DeleteProfile {
        id: String,
    },
    /// `None` clears the selection.
    SelectProfile {
        id: Option<String>,
    },
    AddExercise {
        profile_id: String,
        exercise: NewExercise,
    },
    UpdateExercise {
        profile_id: String,
        exercise_id: String,
        changes: ExerciseChanges,
    },
    UpdateWeight {
        profile_id: String,
        exercise_id: String,
        weight: f64,
    },
    DeleteExercise {
        profile_id: String,
        exercise_id: String,
    },
    SetDayTrained {
        date: NaiveDate,
        trained: bool,
    },
    ToggleDay {
        date: NaiveDate,
    },
    ToggleDayExercise {
        date: NaiveDate,
        exercise_id: String,
    },
    Restore(BackupDocument),
}

impl Command {
    /// Short name used in log lines.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::CreateProfile(_) => "create_profile",
            Self::UpdateProfile { .. } => "update_profile",
            Self::DeleteProfile { .. } => "delete_profile",
            Self::SelectProfile { .. } => "select_profile",
            Self::AddExercise { .. } => "add_exercise",
            Self::UpdateExercise { .. } => "update_exercise",
            Self::UpdateWeight { .. } => "update_weight",
            Self::DeleteExercise { .. } => "delete_exercise",
            Self::SetDayTrained { .. } => "set_day_trained",
            Self::ToggleDay { .. } => "toggle_day",
            Self::ToggleDayExercise { .. } => "toggle_day_exercise",
            Self::Restore(_) => "restore",
        }
    }
}

/// Why a command left the snapshot untouched. These are documented no-ops,
/// not failures; callers are never required to handle them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Skipped {
    #[error("Profile not found: {0}")]
    MissingProfile(String),
    #[error("Exercise {exercise_id} not found in profile {profile_id}")]
    MissingExercise {
        profile_id: String,
        exercise_id: String,
    },
    #[error("No profile selected")]
    NoCurrentProfile,
}

/// Applies `command` to `state`, returning the next snapshot.
/// # Errors
/// Returns the `Skipped` reason when the command is a no-op.
pub fn reduce(
    state: &AppSnapshot,
    command: &Command,
    clock: &dyn Clock,
) -> Result<AppSnapshot, Skipped> {
    let mut next = state.clone();

    match command {
        Command::CreateProfile(fields) => {
            let now = clock.now();
            let id = unique_id("profile", now, |id| next.profiles.contains_key(id));
            let profile = Profile {
                id: id.clone(),
                name: fields.name.clone(),
                start_date: fields.start_date,
                weight_initial: fields.weight_initial,
                weight_current: fields.weight_initial,
                goal_weight: fields.goal_weight,
                photo: fields.photo.clone(),
                notes: fields.notes.clone(),
                exercises: Default::default(),
                created_at: now,
            };
            next.profiles.insert(id.clone(), profile);
            next.current_profile_id = Some(id);
        }
        Command::UpdateProfile { id, changes } => {
            changes.apply_to(profile_mut(&mut next, id)?);
        }
        Command::DeleteProfile { id } => {
            if next.profiles.remove(id).is_none() {
                return Err(Skipped::MissingProfile(id.clone()));
            }
            if next.current_profile_id.as_deref() == Some(id.as_str()) {
                next.current_profile_id = None;
            }
        }
        Command::SelectProfile { id } => {
            if let Some(id) = id {
                if !next.profiles.contains_key(id) {
                    return Err(Skipped::MissingProfile(id.clone()));
                }
            }
            next.current_profile_id.clone_from(id);
        }
        Command::AddExercise {
            profile_id,
            exercise,
        } => {
            let now = clock.now();
            let profile = profile_mut(&mut next, profile_id)?;
            let id = unique_id("ex", now, |id| profile.exercises.contains_key(id));
            profile.exercises.insert(
                id.clone(),
                Exercise {
                    id,
                    name: exercise.name.clone(),
                    video_url: exercise.video_url.clone(),
                    current_weight: exercise.weight,
                    date_added: now,
                    last_updated: now,
                },
            );
        }
        Command::UpdateExercise {
            profile_id,
            exercise_id,
            changes,
        } => {
            let exercise = exercise_mut(&mut next, profile_id, exercise_id)?;
            changes.apply_to(exercise);
            exercise.last_updated = clock.now();
        }
        Command::UpdateWeight {
            profile_id,
            exercise_id,
            weight,
        } => {
            let exercise = exercise_mut(&mut next, profile_id, exercise_id)?;
            exercise.current_weight = *weight;
            exercise.last_updated = clock.now();
        }
        Command::DeleteExercise {
            profile_id,
            exercise_id,
        } => {
            let profile = profile_mut(&mut next, profile_id)?;
            if profile.exercises.remove(exercise_id).is_none() {
                return Err(Skipped::MissingExercise {
                    profile_id: profile_id.clone(),
                    exercise_id: exercise_id.clone(),
                });
            }
        }
        Command::SetDayTrained { date, trained } => {
            set_day(&mut next, *date, |_| *trained)?;
        }
        Command::ToggleDay { date } => {
            set_day(&mut next, *date, |record| !record.trained)?;
        }
        Command::ToggleDayExercise { date, exercise_id } => {
            let profile = current_profile(&next)?;
            if !profile.exercises.contains_key(exercise_id) {
                return Err(Skipped::MissingExercise {
                    profile_id: profile.id.clone(),
                    exercise_id: exercise_id.clone(),
                });
            }
            let profile_id = profile.id.clone();
            day_record_mut(&mut next, *date, profile_id).toggle_exercise(exercise_id);
        }
        Command::Restore(document) => {
            if let Some(profiles) = &document.profiles {
                next.profiles.clone_from(profiles);
            }
            if let Some(current) = &document.current_profile_id {
                next.current_profile_id.clone_from(current);
            }
            if let Some(week_data) = &document.week_data {
                next.week_data.clone_from(week_data);
            }
            let dangling = next
                .current_profile_id
                .as_ref()
                .is_some_and(|id| !next.profiles.contains_key(id));
            if dangling {
                debug!(current = ?next.current_profile_id, "restored selection names no profile; clearing");
                next.current_profile_id = None;
            }
        }
    }

    Ok(next)
}

/// `prefix_<millis>`, moved forward one millisecond at a time until `taken`
/// no longer matches.
fn unique_id(prefix: &str, now: DateTime<Utc>, taken: impl Fn(&str) -> bool) -> String {
    let mut stamp = now;
    loop {
        let id = format!("{prefix}_{}", stamp.timestamp_millis());
        if !taken(&id) {
            return id;
        }
        stamp += Duration::milliseconds(1);
    }
}

fn profile_mut<'a>(state: &'a mut AppSnapshot, id: &str) -> Result<&'a mut Profile, Skipped> {
    state
        .profiles
        .get_mut(id)
        .ok_or_else(|| Skipped::MissingProfile(id.to_string()))
}

fn exercise_mut<'a>(
    state: &'a mut AppSnapshot,
    profile_id: &str,
    exercise_id: &str,
) -> Result<&'a mut Exercise, Skipped> {
    profile_mut(state, profile_id)?
        .exercises
        .get_mut(exercise_id)
        .ok_or_else(|| Skipped::MissingExercise {
            profile_id: profile_id.to_string(),
            exercise_id: exercise_id.to_string(),
        })
}

fn current_profile(state: &AppSnapshot) -> Result<&Profile, Skipped> {
    state.current_profile().ok_or(Skipped::NoCurrentProfile)
}

fn day_record_mut(state: &mut AppSnapshot, date: NaiveDate, profile_id: String) -> &mut DayRecord {
    state
        .week_data
        .entry(date)
        .or_default()
        .entry(profile_id)
        .or_default()
}

// Whole-day forcing for the current profile. `decide` sees the existing (or
// fresh) record and returns the new trained flag.
fn set_day(
    state: &mut AppSnapshot,
    date: NaiveDate,
    decide: impl FnOnce(&DayRecord) -> bool,
) -> Result<(), Skipped> {
    let profile = current_profile(state)?;
    let profile_id = profile.id.clone();
    let exercise_ids: Vec<String> = profile.exercises.keys().cloned().collect();

    let record = day_record_mut(state, date, profile_id);
    let trained = decide(record);
    record.set_trained(trained, &exercise_ids);
    Ok(())
}

type Listener = Box<dyn FnMut(&AppSnapshot)>;

/// Holds the current snapshot and replaces it wholesale on every
/// successful dispatch.
pub struct Store {
    state: AppSnapshot,
    clock: Box<dyn Clock>,
    listeners: Vec<Listener>,
}

impl Store {
    pub fn new(initial: AppSnapshot, clock: Box<dyn Clock>) -> Self {
        Self {
            state: initial,
            clock,
            listeners: Vec::new(),
        }
    }

    pub const fn state(&self) -> &AppSnapshot {
        &self.state
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Registers a listener called with every new snapshot.
    pub fn subscribe<F>(&mut self, listener: F)
    where
        F: FnMut(&AppSnapshot) + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    /// Runs `command` through the reducer. Returns `true` if a new snapshot
    /// was produced (and listeners were notified).
    pub fn dispatch(&mut self, command: Command) -> bool {
        match reduce(&self.state, &command, self.clock.as_ref()) {
            Ok(next) => {
                self.state = next;
                debug!(command = command.name(), "applied");
                for listener in &mut self.listeners {
                    listener(&self.state);
                }
                true
            }
            Err(reason) => {
                debug!(command = command.name(), %reason, "skipped");
                false
            }
        }
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("state", &self.state)
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::ManualClock;
    use chrono::TimeZone;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn clock() -> ManualClock {
        ManualClock::new(Utc.with_ymd_and_hms(2025, 6, 4, 9, 30, 0).unwrap())
    }

    fn new_profile(name: &str) -> Command {
        Command::CreateProfile(NewProfile {
            name: name.to_string(),
            start_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            weight_initial: 70.0,
            goal_weight: None,
            photo: None,
            notes: String::new(),
        })
    }

    #[test]
    fn ids_stay_unique_within_one_millisecond() {
        let clock = clock();
        let mut store = Store::new(AppSnapshot::default(), Box::new(clock.clone()));
        assert!(store.dispatch(new_profile("Alice")));
        assert!(store.dispatch(new_profile("Bob")));

        let ids: Vec<&String> = store.state().profiles.keys().collect();
        let millis = clock.now().timestamp_millis();
        assert_eq!(ids, vec![&format!("profile_{millis}"), &format!("profile_{}", millis + 1)]);
        // Last one created is current
        assert_eq!(
            store.state().current_profile().map(|p| p.name.as_str()),
            Some("Bob")
        );
    }

    #[test]
    fn skipped_commands_do_not_notify() {
        let mut store = Store::new(AppSnapshot::default(), Box::new(clock()));
        let calls = Rc::new(RefCell::new(0));
        let seen = Rc::clone(&calls);
        store.subscribe(move |_| *seen.borrow_mut() += 1);

        assert!(!store.dispatch(Command::ToggleDay {
            date: NaiveDate::from_ymd_opt(2025, 6, 4).unwrap()
        }));
        assert!(!store.dispatch(Command::DeleteProfile {
            id: "profile_1".into()
        }));
        assert_eq!(*calls.borrow(), 0);

        assert!(store.dispatch(new_profile("Alice")));
        assert_eq!(*calls.borrow(), 1);
    }

    #[test]
    fn reduce_leaves_input_untouched() {
        let clock = clock();
        let before = AppSnapshot::default();
        let after = reduce(&before, &new_profile("Alice"), &clock).unwrap();
        assert!(before.profiles.is_empty());
        assert_eq!(after.profiles.len(), 1);
    }

    #[test]
    fn select_unknown_profile_is_skipped() {
        let clock = clock();
        let state = reduce(&AppSnapshot::default(), &new_profile("Alice"), &clock).unwrap();
        let result = reduce(
            &state,
            &Command::SelectProfile {
                id: Some("profile_nope".into()),
            },
            &clock,
        );
        assert_eq!(result, Err(Skipped::MissingProfile("profile_nope".into())));

        let cleared = reduce(&state, &Command::SelectProfile { id: None }, &clock).unwrap();
        assert_eq!(cleared.current_profile_id, None);
    }

    #[test]
    fn toggling_unknown_exercise_is_skipped() {
        let clock = clock();
        let state = reduce(&AppSnapshot::default(), &new_profile("Alice"), &clock).unwrap();
        let result = reduce(
            &state,
            &Command::ToggleDayExercise {
                date: clock.today(),
                exercise_id: "ex_ghost".into(),
            },
            &clock,
        );
        assert!(matches!(result, Err(Skipped::MissingExercise { .. })));
    }

    #[test]
    fn restoring_a_full_snapshot_replaces_everything() {
        let clock = clock();
        let saved = reduce(&AppSnapshot::default(), &new_profile("Alice"), &clock).unwrap();
        let other = reduce(&AppSnapshot::default(), &new_profile("Bob"), &clock).unwrap();

        let document = BackupDocument::from(saved.clone());
        let restored = reduce(&other, &Command::Restore(document), &clock).unwrap();
        assert_eq!(restored, saved);
    }

    #[test]
    fn restore_clears_dangling_selection() {
        let clock = clock();
        let state = reduce(&AppSnapshot::default(), &new_profile("Alice"), &clock).unwrap();
        let document = BackupDocument {
            profiles: Some(Default::default()),
            ..Default::default()
        };
        let restored = reduce(&state, &Command::Restore(document), &clock).unwrap();
        assert!(restored.profiles.is_empty());
        assert_eq!(restored.current_profile_id, None);
    }
}
