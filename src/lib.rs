// src/lib.rs
use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::{error, info};

// --- Declare modules ---
mod config;
pub mod day;
pub mod gateway;
pub mod input;
pub mod model;
pub mod persistence;
pub mod store;

// --- Expose public types ---
pub use config::{
    get_config_path as get_config_path_util, load_config as load_config_util, parse_color,
    save_config as save_config_util, Config, Error as ConfigError, StandardColor, Theme,
};
pub use day::{trained_days, week_of, week_view, DayView, ExerciseCheck};
pub use gateway::{
    BinaryEncoder, Clock, Confirmer, DataUrlEncoder, FixedAnswer, LogNotifier, ManualClock,
    Notifier, PhotoError, Severity, SystemClock,
};
pub use input::{ExerciseEditForm, ExerciseForm, ProfileEditForm, ProfileForm};
pub use model::{AppSnapshot, BackupDocument, DayRecord, Exercise, Profile, WeekData};
pub use persistence::{
    get_db_path as get_db_path_util, Error as PersistenceError, KeyValueStore, MemoryStore,
    SqliteStore,
};
pub use store::{Command, Skipped, Store};

/// Front-end facing service: wires the store to persistence and to the
/// notification and confirmation collaborators.
pub struct AppService {
    pub config: Config,
    pub config_path: PathBuf,
    pub db_path: PathBuf,
    store: Store,
    notifier: Rc<dyn Notifier>,
    confirmer: Box<dyn Confirmer>,
    encoder: Box<dyn BinaryEncoder>,
}

impl AppService {
    /// Initializes the application service from the on-disk config and
    /// database.
    /// # Errors
    /// Returns `anyhow::Error` if config/db path determination, loading, or
    /// initialization fails.
    pub fn initialize(notifier: Rc<dyn Notifier>, confirmer: Box<dyn Confirmer>) -> Result<Self> {
        let config_path =
            config::get_config_path().context("Failed to determine configuration file path")?;
        let config = config::load_config(&config_path)
            .with_context(|| format!("Failed to load config from {config_path:?}"))?;

        let db_path = match &config.db_path {
            Some(path) => path.clone(),
            None => persistence::get_db_path().context("Failed to determine database path")?,
        };
        let kv = SqliteStore::open(&db_path)
            .with_context(|| format!("Failed to open database at {db_path:?}"))?;

        Self::with_store(
            config,
            config_path,
            db_path,
            Box::new(kv),
            Box::new(SystemClock),
            notifier,
            confirmer,
        )
    }

    /// Builds a service over any key-value store and clock. Loads the saved
    /// snapshot and subscribes a listener that saves every new one.
    /// # Errors
    /// Returns `anyhow::Error` if the stored snapshot cannot be read.
    pub fn with_store(
        config: Config,
        config_path: PathBuf,
        db_path: PathBuf,
        mut kv: Box<dyn KeyValueStore>,
        clock: Box<dyn Clock>,
        notifier: Rc<dyn Notifier>,
        confirmer: Box<dyn Confirmer>,
    ) -> Result<Self> {
        let snapshot = persistence::load(kv.as_ref()).context("Failed to load saved data")?;
        let mut store = Store::new(snapshot, clock);

        let save_notifier = Rc::clone(&notifier);
        store.subscribe(move |snapshot| {
            if let Err(e) = persistence::save(kv.as_mut(), snapshot) {
                error!(error = %e, "failed to persist snapshot");
                save_notifier.notify("Failed to save data.", Severity::Error);
            }
        });

        Ok(Self {
            config,
            config_path,
            db_path,
            store,
            notifier,
            confirmer,
            encoder: Box::new(DataUrlEncoder),
        })
    }

    pub fn get_config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn get_db_path(&self) -> &Path {
        &self.db_path
    }

    /// Saves the current configuration state.
    /// # Errors
    /// Returns `ConfigError` if saving fails.
    pub fn save_config(&self) -> Result<(), ConfigError> {
        config::save_config(&self.config_path, &self.config)
    }

    pub const fn state(&self) -> &AppSnapshot {
        self.store.state()
    }

    pub fn current_profile(&self) -> Option<&Profile> {
        self.state().current_profile()
    }

    pub fn today(&self) -> NaiveDate {
        self.store.clock().today()
    }

    /// Registers an extra listener for snapshot changes (e.g. a re-render).
    pub fn subscribe<F>(&mut self, listener: F)
    where
        F: FnMut(&AppSnapshot) + 'static,
    {
        self.store.subscribe(listener);
    }

    /// Dispatches a raw command. Returns whether the state changed.
    pub fn dispatch(&mut self, command: Command) -> bool {
        self.store.dispatch(command)
    }

    fn notify(&self, message: &str, severity: Severity) {
        self.notifier.notify(message, severity);
    }

    // --- Profiles ---

    /// Creates a profile from form input and selects it. Returns the new id.
    pub fn create_profile(&mut self, form: ProfileForm) -> Option<String> {
        let profile = form.into_new_profile(self.today());
        if !self.dispatch(Command::CreateProfile(profile)) {
            return None;
        }
        self.notify("Profile created!", Severity::Success);
        self.state().current_profile_id.clone()
    }

    /// Applies the submitted fields of an edit form.
    pub fn update_profile(&mut self, id: &str, form: ProfileEditForm) -> bool {
        let changes = form.into_changes();
        let updated = self.dispatch(Command::UpdateProfile {
            id: id.to_string(),
            changes,
        });
        if updated {
            self.notify("Profile updated!", Severity::Success);
        }
        updated
    }

    /// Deletes a profile and its exercises after confirmation. Training days
    /// recorded for it are kept.
    pub fn delete_profile(&mut self, id: &str) -> bool {
        if !self.state().profiles.contains_key(id) {
            return false;
        }
        if self.config.confirm_deletions
            && !self
                .confirmer
                .confirm("Are you sure you want to permanently delete this profile?")
        {
            return false;
        }
        let deleted = self.dispatch(Command::DeleteProfile { id: id.to_string() });
        if deleted {
            self.notify("Profile deleted.", Severity::Success);
        }
        deleted
    }

    /// Selects a profile, or clears the selection with `None`.
    pub fn select_profile(&mut self, id: Option<&str>) -> bool {
        self.dispatch(Command::SelectProfile {
            id: id.map(str::to_string),
        })
    }

    /// Reads and encodes a photo file. Failures are reported to the user and
    /// yield `None`, so the surrounding edit still goes through.
    pub fn load_photo(&self, path: &Path) -> Option<String> {
        match gateway::read_photo(path, self.encoder.as_ref()) {
            Ok(encoded) => Some(encoded),
            Err(PhotoError::Empty(_)) => None,
            Err(e) => {
                error!(error = %e, "photo upload failed");
                self.notify("Could not read the photo file.", Severity::Error);
                None
            }
        }
    }

    // --- Exercises ---

    /// Adds an exercise to a profile. Returns the new exercise id.
    pub fn add_exercise(&mut self, profile_id: &str, form: ExerciseForm) -> Option<String> {
        let before: Vec<String> = self
            .state()
            .profiles
            .get(profile_id)?
            .exercises
            .keys()
            .cloned()
            .collect();
        let added = self.dispatch(Command::AddExercise {
            profile_id: profile_id.to_string(),
            exercise: form.into_new_exercise(),
        });
        if !added {
            return None;
        }
        self.notify("Exercise saved!", Severity::Success);
        self.state()
            .profiles
            .get(profile_id)?
            .exercises
            .keys()
            .find(|id| !before.contains(id))
            .cloned()
    }

    pub fn update_exercise(
        &mut self,
        profile_id: &str,
        exercise_id: &str,
        form: ExerciseEditForm,
    ) -> bool {
        let updated = self.dispatch(Command::UpdateExercise {
            profile_id: profile_id.to_string(),
            exercise_id: exercise_id.to_string(),
            changes: form.into_changes(),
        });
        if updated {
            self.notify("Exercise updated!", Severity::Success);
        }
        updated
    }

    /// Sets an exercise's working weight. `weight` is used as given; use
    /// `input::parse_weight` for raw text.
    pub fn update_weight(&mut self, profile_id: &str, exercise_id: &str, weight: f64) -> bool {
        let updated = self.dispatch(Command::UpdateWeight {
            profile_id: profile_id.to_string(),
            exercise_id: exercise_id.to_string(),
            weight,
        });
        if updated {
            self.notify("Weight updated!", Severity::Success);
        }
        updated
    }

    /// Deletes an exercise after confirmation. Day records that mention it
    /// are left as they are.
    pub fn delete_exercise(&mut self, profile_id: &str, exercise_id: &str) -> bool {
        let exists = self
            .state()
            .profiles
            .get(profile_id)
            .is_some_and(|p| p.exercises.contains_key(exercise_id));
        if !exists {
            return false;
        }
        if self.config.confirm_deletions
            && !self
                .confirmer
                .confirm("Permanently delete this exercise?")
        {
            return false;
        }
        let deleted = self.dispatch(Command::DeleteExercise {
            profile_id: profile_id.to_string(),
            exercise_id: exercise_id.to_string(),
        });
        if deleted {
            self.notify("Exercise removed.", Severity::Success);
        }
        deleted
    }

    // --- Training days ---

    pub fn toggle_day(&mut self, date: NaiveDate) -> bool {
        self.dispatch(Command::ToggleDay { date })
    }

    pub fn set_day_trained(&mut self, date: NaiveDate, trained: bool) -> bool {
        self.dispatch(Command::SetDayTrained { date, trained })
    }

    pub fn toggle_day_exercise(&mut self, date: NaiveDate, exercise_id: &str) -> bool {
        self.dispatch(Command::ToggleDayExercise {
            date,
            exercise_id: exercise_id.to_string(),
        })
    }

    /// Current profile's record for `date`, if any was written.
    pub fn day_record(&self, date: NaiveDate) -> Option<&DayRecord> {
        let id = self.state().current_profile_id.as_deref()?;
        self.state().day_record(date, id)
    }

    /// The Sunday-to-Saturday week around `date` for the current profile.
    pub fn week(&self, date: NaiveDate) -> Vec<DayView> {
        week_view(self.state(), date)
    }

    // --- Backup / restore ---

    /// The current snapshot as a backup document.
    /// # Errors
    /// Returns `PersistenceError::Serialize` if serialization fails.
    pub fn backup_json(&self) -> Result<String, PersistenceError> {
        persistence::export_backup(self.state())
    }

    /// Writes a dated backup file into `dir` (or the configured backup dir),
    /// named after the current UTC date.
    /// # Errors
    /// Returns `anyhow::Error` if the file cannot be written.
    pub fn export_backup(&self, dir: Option<&Path>) -> Result<PathBuf> {
        let dir = dir.map_or_else(|| self.config.effective_backup_dir(), Path::to_path_buf);
        let date = self.store.clock().now().date_naive();
        let path = persistence::write_backup(&dir, self.state(), date)
            .with_context(|| format!("Failed to write backup into {dir:?}"))?;
        self.notify("Backup completed successfully!", Severity::Success);
        Ok(path)
    }

    /// Restores from backup text. Keys missing from the document keep their
    /// current state. Malformed input is reported and changes nothing.
    pub fn import_backup(&mut self, text: &str) -> bool {
        match persistence::parse_backup(text) {
            Ok(document) => self.restore(document),
            Err(e) => {
                error!(error = %e, "backup rejected");
                self.notify("Error restoring file.", Severity::Error);
                false
            }
        }
    }

    /// Restores from a backup file on disk.
    pub fn restore_from_file(&mut self, path: &Path) -> bool {
        match persistence::read_backup(path) {
            Ok(document) => self.restore(document),
            Err(e) => {
                error!(error = %e, path = %path.display(), "backup rejected");
                self.notify("Error restoring file.", Severity::Error);
                false
            }
        }
    }

    fn restore(&mut self, document: BackupDocument) -> bool {
        let restored = self.dispatch(Command::Restore(document));
        if restored {
            info!("backup restored");
            self.notify("Data restored successfully!", Severity::Success);
        }
        restored
    }
}
