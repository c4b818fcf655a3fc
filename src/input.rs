// src/input.rs
//! Turns raw form text into typed commands. Nothing here touches state.
use crate::model::{ExerciseChanges, NewExercise, NewProfile, ProfileChanges};
use chrono::{Duration, NaiveDate};
use tracing::debug;

/// Parses a weight typed by the user. Anything that is not a finite number
/// becomes 0 instead of being rejected.
pub fn parse_weight(raw: &str) -> f64 {
    parse_number(raw).unwrap_or_else(|| {
        if !raw.trim().is_empty() {
            debug!(input = raw, "non-numeric weight coerced to 0");
        }
        0.0
    })
}

/// A finite number, or `None` for blank or garbage input.
/// Accepts a decimal comma ("72,5").
pub fn parse_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

// On edits a blank, invalid or zero weight keeps the stored value.
fn parse_edit_weight(raw: &str) -> Option<f64> {
    parse_number(raw).filter(|value| *value != 0.0)
}

/// Parses dates the way the CLI accepts them: `today`, `yesterday`,
/// YYYY-MM-DD, DD.MM.YYYY or YYYY/MM/DD.
/// # Errors
/// Returns a user-facing message for unrecognised input.
pub fn parse_date(raw: &str, today: NaiveDate) -> Result<NaiveDate, String> {
    let trimmed = raw.trim();
    match trimmed.to_lowercase().as_str() {
        "today" => Ok(today),
        "yesterday" => Ok(today - Duration::days(1)),
        _ => ["%Y-%m-%d", "%d.%m.%Y", "%Y/%m/%d"]
            .iter()
            .find_map(|format| NaiveDate::parse_from_str(trimmed, format).ok())
            .ok_or_else(|| {
                format!(
                    "Invalid date format: '{trimmed}'. Use 'today', 'yesterday', YYYY-MM-DD, DD.MM.YYYY, or YYYY/MM/DD."
                )
            }),
    }
}

/// Fields of the "new profile" form.
#[derive(Debug, Default, Clone)]
pub struct ProfileForm {
    pub name: String,
    pub start_date: Option<NaiveDate>,
    pub weight_initial: String,
    pub goal_weight: Option<String>,
    pub notes: Option<String>,
    /// Already-encoded photo, if one was chosen.
    pub photo: Option<String>,
}

impl ProfileForm {
    pub fn into_new_profile(self, today: NaiveDate) -> NewProfile {
        NewProfile {
            name: self.name.trim().to_string(),
            start_date: self.start_date.unwrap_or(today),
            weight_initial: parse_weight(&self.weight_initial),
            goal_weight: self.goal_weight.as_deref().and_then(parse_number),
            photo: self.photo,
            notes: self.notes.unwrap_or_default(),
        }
    }
}

/// Fields of the "edit profile" form. `None` means the field was not
/// submitted.
#[derive(Debug, Default, Clone)]
pub struct ProfileEditForm {
    pub name: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub weight_initial: Option<String>,
    pub weight_current: Option<String>,
    /// Submitted blank clears the goal.
    pub goal_weight: Option<String>,
    pub notes: Option<String>,
    pub photo: Option<String>,
}

impl ProfileEditForm {
    pub fn into_changes(self) -> ProfileChanges {
        ProfileChanges {
            name: self.name.map(|name| name.trim().to_string()),
            start_date: self.start_date,
            weight_initial: self.weight_initial.as_deref().and_then(parse_edit_weight),
            weight_current: self.weight_current.as_deref().and_then(parse_edit_weight),
            goal_weight: self.goal_weight.as_deref().map(parse_number),
            photo: self.photo,
            notes: self.notes,
        }
    }
}

/// Fields of the "new exercise" form.
#[derive(Debug, Default, Clone)]
pub struct ExerciseForm {
    pub name: String,
    pub video_url: String,
    pub weight: String,
}

impl ExerciseForm {
    pub fn into_new_exercise(self) -> NewExercise {
        NewExercise {
            name: self.name.trim().to_string(),
            video_url: self.video_url.trim().to_string(),
            weight: parse_weight(&self.weight),
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct ExerciseEditForm {
    pub name: Option<String>,
    pub video_url: Option<String>,
    pub weight: Option<String>,
}

impl ExerciseEditForm {
    pub fn into_changes(self) -> ExerciseChanges {
        ExerciseChanges {
            name: self.name.map(|name| name.trim().to_string()),
            video_url: self.video_url.map(|url| url.trim().to_string()),
            current_weight: self.weight.as_deref().and_then(parse_edit_weight),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn weights_coerce_to_zero() {
        assert_eq!(parse_weight("42.5"), 42.5);
        assert_eq!(parse_weight(" 72,5 "), 72.5);
        assert_eq!(parse_weight("heavy"), 0.0);
        assert_eq!(parse_weight(""), 0.0);
        assert_eq!(parse_weight("NaN"), 0.0);
        assert_eq!(parse_weight("inf"), 0.0);
    }

    #[test]
    fn date_shorthands() {
        let today = day(2025, 6, 4);
        assert_eq!(parse_date("today", today), Ok(today));
        assert_eq!(parse_date("Yesterday", today), Ok(day(2025, 6, 3)));
        assert_eq!(parse_date("2025-01-31", today), Ok(day(2025, 1, 31)));
        assert_eq!(parse_date("31.01.2025", today), Ok(day(2025, 1, 31)));
        assert_eq!(parse_date("2025/01/31", today), Ok(day(2025, 1, 31)));
        assert!(parse_date("next week", today).is_err());
    }

    #[test]
    fn new_profile_defaults() {
        let today = day(2025, 6, 4);
        let profile = ProfileForm {
            name: "  Alice ".into(),
            weight_initial: "70".into(),
            ..Default::default()
        }
        .into_new_profile(today);

        assert_eq!(profile.name, "Alice");
        assert_eq!(profile.start_date, today);
        assert_eq!(profile.weight_initial, 70.0);
        assert_eq!(profile.goal_weight, None);
        assert_eq!(profile.photo, None);
        assert_eq!(profile.notes, "");
    }

    #[test]
    fn profile_edit_keeps_unsubmitted_and_invalid_fields() {
        let changes = ProfileEditForm {
            weight_initial: Some("abc".into()),
            weight_current: Some("68.2".into()),
            goal_weight: Some(String::new()),
            ..Default::default()
        }
        .into_changes();

        assert_eq!(changes.name, None);
        assert_eq!(changes.weight_initial, None);
        assert_eq!(changes.weight_current, Some(68.2));
        assert_eq!(changes.goal_weight, Some(None));
        assert_eq!(changes.photo, None);
    }

    #[test]
    fn exercise_edit_ignores_zero_weight() {
        let changes = ExerciseEditForm {
            name: Some("Front Squat".into()),
            weight: Some("0".into()),
            ..Default::default()
        }
        .into_changes();
        assert_eq!(changes.name.as_deref(), Some("Front Squat"));
        assert_eq!(changes.current_weight, None);
    }
}
