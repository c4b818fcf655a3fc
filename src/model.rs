// src/model.rs
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Exercises owned by a profile, keyed by exercise id.
pub type ExerciseMap = BTreeMap<String, Exercise>;
/// All profiles, keyed by profile id.
pub type ProfileMap = BTreeMap<String, Profile>;
/// Calendar date -> profile id -> that profile's record for the day.
pub type WeekData = BTreeMap<NaiveDate, BTreeMap<String, DayRecord>>;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Exercise {
    pub id: String,
    pub name: String,
    pub video_url: String,
    pub current_weight: f64,
    pub date_added: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: String,
    pub name: String,
    #[serde(deserialize_with = "date_or_timestamp::deserialize")]
    pub start_date: NaiveDate,
    pub weight_initial: f64,
    pub weight_current: f64,
    pub goal_weight: Option<f64>,
    pub photo: Option<String>, // data URL
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub exercises: ExerciseMap,
    pub created_at: DateTime<Utc>,
}

/// Completion state of one profile on one date.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct DayRecord {
    pub trained: bool,
    // Stored as "exercises" to stay readable by older backups.
    #[serde(rename = "exercises", alias = "exercisesDone", default)]
    pub exercises_done: BTreeMap<String, bool>,
}

/// The complete persisted state. Also the shape of a backup file.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct AppSnapshot {
    #[serde(default)]
    pub profiles: ProfileMap,
    #[serde(default, with = "blank_as_none")]
    pub current_profile_id: Option<String>,
    #[serde(default)]
    pub week_data: WeekData,
}

impl AppSnapshot {
    pub fn current_profile(&self) -> Option<&Profile> {
        self.current_profile_id
            .as_ref()
            .and_then(|id| self.profiles.get(id))
    }

    /// The record for `profile_id` on `date`, if one was ever written.
    pub fn day_record(&self, date: NaiveDate, profile_id: &str) -> Option<&DayRecord> {
        self.week_data
            .get(&date)
            .and_then(|profiles| profiles.get(profile_id))
    }
}

/// A parsed backup document. Each `None` field was absent (or null) in the
/// source and leaves the matching state untouched on restore.
#[derive(Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct BackupDocument {
    #[serde(default)]
    pub profiles: Option<ProfileMap>,
    #[serde(default, deserialize_with = "blank_as_none::deserialize_present")]
    pub current_profile_id: Option<Option<String>>,
    #[serde(default)]
    pub week_data: Option<WeekData>,
}

impl From<AppSnapshot> for BackupDocument {
    fn from(snapshot: AppSnapshot) -> Self {
        Self {
            profiles: Some(snapshot.profiles),
            current_profile_id: Some(snapshot.current_profile_id),
            week_data: Some(snapshot.week_data),
        }
    }
}

/// Fields for a brand new profile, already parsed from user input.
#[derive(Debug, Clone, PartialEq)]
pub struct NewProfile {
    pub name: String,
    pub start_date: NaiveDate,
    pub weight_initial: f64,
    pub goal_weight: Option<f64>,
    pub photo: Option<String>,
    pub notes: String,
}

/// Partial profile edit. `None` keeps the stored value.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProfileChanges {
    pub name: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub weight_initial: Option<f64>,
    pub weight_current: Option<f64>,
    /// `Some(None)` clears the goal.
    pub goal_weight: Option<Option<f64>>,
    pub photo: Option<String>,
    pub notes: Option<String>,
}

impl ProfileChanges {
    pub(crate) fn apply_to(&self, profile: &mut Profile) {
        if let Some(name) = &self.name {
            profile.name.clone_from(name);
        }
        if let Some(start_date) = self.start_date {
            profile.start_date = start_date;
        }
        if let Some(weight) = self.weight_initial {
            profile.weight_initial = weight;
        }
        if let Some(weight) = self.weight_current {
            profile.weight_current = weight;
        }
        if let Some(goal) = self.goal_weight {
            profile.goal_weight = goal;
        }
        if let Some(photo) = &self.photo {
            profile.photo = Some(photo.clone());
        }
        if let Some(notes) = &self.notes {
            profile.notes.clone_from(notes);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewExercise {
    pub name: String,
    pub video_url: String,
    pub weight: f64,
}

/// Partial exercise edit. `None` keeps the stored value.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExerciseChanges {
    pub name: Option<String>,
    pub video_url: Option<String>,
    pub current_weight: Option<f64>,
}

impl ExerciseChanges {
    pub(crate) fn apply_to(&self, exercise: &mut Exercise) {
        if let Some(name) = &self.name {
            exercise.name.clone_from(name);
        }
        if let Some(url) = &self.video_url {
            exercise.video_url.clone_from(url);
        }
        if let Some(weight) = self.current_weight {
            exercise.current_weight = weight;
        }
    }
}

// The persisted form uses "" for "no current profile".
mod blank_as_none {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<String>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(value.as_deref().unwrap_or(""))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.filter(|id| !id.is_empty()))
    }

    // Only called when the key is present: null means "leave alone",
    // "" means "clear the selection".
    pub fn deserialize_present<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Option<String>>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.map(|id| if id.is_empty() { None } else { Some(id) }))
    }
}

// Older data may carry a full timestamp; only the calendar date is kept.
mod date_or_timestamp {
    use chrono::{DateTime, NaiveDate};
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let raw = raw.trim();
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .or_else(|_| DateTime::parse_from_rfc3339(raw).map(|ts| ts.date_naive()))
            .map_err(|_| D::Error::custom(format!("invalid start date: {raw:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile_json(start_date: &str) -> String {
        format!(
            r#"{{"id":"profile_1","name":"Ana","startDate":"{start_date}","weightInitial":60,
                "weightCurrent":60,"goalWeight":null,"photo":null,
                "createdAt":"2025-06-06T12:00:00.000Z"}}"#
        )
    }

    #[test]
    fn start_date_accepts_plain_dates_and_timestamps() {
        let expected = NaiveDate::from_ymd_opt(2025, 6, 6).unwrap();
        for raw in ["2025-06-06", "2025-06-06T00:00:00.000Z", "2025-06-06T21:30:00-03:00"] {
            let profile: Profile = serde_json::from_str(&profile_json(raw)).unwrap();
            assert_eq!(profile.start_date, expected, "{raw}");
        }
        assert!(serde_json::from_str::<Profile>(&profile_json("June 6th")).is_err());
    }

    #[test]
    fn start_date_is_written_as_plain_date() {
        let profile: Profile =
            serde_json::from_str(&profile_json("2025-06-06T00:00:00.000Z")).unwrap();
        let json = serde_json::to_string(&profile).unwrap();
        assert!(json.contains(r#""startDate":"2025-06-06""#));
    }
}
