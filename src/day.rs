// src/day.rs
//! Day completion rules and the weekly read model.
use crate::model::{AppSnapshot, DayRecord};
use chrono::{Datelike, Duration, NaiveDate};

impl DayRecord {
    /// True if any exercise entry is marked done. Stale entries count.
    pub fn any_done(&self) -> bool {
        self.exercises_done.values().any(|done| *done)
    }

    /// Missing entries read as not done.
    pub fn is_done(&self, exercise_id: &str) -> bool {
        self.exercises_done
            .get(exercise_id)
            .copied()
            .unwrap_or(false)
    }

    /// Forces the whole day. Marking trained sets every id in `exercise_ids`
    /// done; marking untrained clears every existing entry but keeps it.
    pub fn set_trained<'a, I>(&mut self, trained: bool, exercise_ids: I)
    where
        I: IntoIterator<Item = &'a String>,
    {
        self.trained = trained;
        if trained {
            for id in exercise_ids {
                self.exercises_done.insert(id.clone(), true);
            }
        } else {
            for done in self.exercises_done.values_mut() {
                *done = false;
            }
        }
    }

    /// Flips one exercise and re-derives `trained` from all entries.
    /// Returns the exercise's new state.
    pub fn toggle_exercise(&mut self, exercise_id: &str) -> bool {
        let done = !self.is_done(exercise_id);
        self.exercises_done.insert(exercise_id.to_string(), done);
        self.trained = self.any_done();
        done
    }
}

/// Sunday-to-Saturday week containing `date`.
pub fn week_of(date: NaiveDate) -> [NaiveDate; 7] {
    let sunday = date - Duration::days(i64::from(date.weekday().num_days_from_sunday()));
    std::array::from_fn(|offset| sunday + Duration::days(offset as i64))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExerciseCheck {
    pub exercise_id: String,
    pub name: String,
    pub done: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayView {
    pub date: NaiveDate,
    pub trained: bool,
    /// One entry per exercise the profile owns now, sorted by name.
    pub exercises: Vec<ExerciseCheck>,
}

/// Builds the seven day rows for the current profile around `date`.
/// Returns an empty list when no profile is selected.
pub fn week_view(snapshot: &AppSnapshot, date: NaiveDate) -> Vec<DayView> {
    let Some(profile) = snapshot.current_profile() else {
        return Vec::new();
    };
    let empty = DayRecord::default();

    week_of(date)
        .into_iter()
        .map(|day| {
            let record = snapshot.day_record(day, &profile.id).unwrap_or(&empty);
            let mut exercises: Vec<ExerciseCheck> = profile
                .exercises
                .values()
                .map(|exercise| ExerciseCheck {
                    exercise_id: exercise.id.clone(),
                    name: exercise.name.clone(),
                    done: record.is_done(&exercise.id),
                })
                .collect();
            exercises.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.exercise_id.cmp(&b.exercise_id)));
            DayView {
                date: day,
                trained: record.trained,
                exercises,
            }
        })
        .collect()
}

pub fn trained_days(week: &[DayView]) -> usize {
    week.iter().filter(|day| day.trained).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn marking_trained_forces_owned_exercises_only() {
        let mut record = DayRecord::default();
        record.set_trained(true, &ids(&["ex_1", "ex_2"]));
        assert!(record.trained);
        assert!(record.is_done("ex_1") && record.is_done("ex_2"));
        assert_eq!(record.exercises_done.len(), 2);
    }

    #[test]
    fn marking_untrained_keeps_entries() {
        let mut record = DayRecord::default();
        record.set_trained(true, &ids(&["ex_1", "ex_stale"]));
        record.set_trained(false, &ids(&["ex_1"]));
        assert!(!record.trained);
        assert_eq!(record.exercises_done.len(), 2);
        assert!(!record.any_done());
    }

    #[test]
    fn toggling_an_exercise_derives_trained() {
        let mut record = DayRecord::default();
        assert!(record.toggle_exercise("ex_1"));
        assert!(record.trained);
        assert!(record.toggle_exercise("ex_2"));
        assert!(!record.toggle_exercise("ex_1"));
        // ex_2 still done, day stays trained
        assert!(record.trained);
        assert!(!record.toggle_exercise("ex_2"));
        assert!(!record.trained);
        assert_eq!(record.trained, record.any_done());
    }

    #[test]
    fn week_starts_on_sunday() {
        // 2025-06-04 is a Wednesday
        let week = week_of(NaiveDate::from_ymd_opt(2025, 6, 4).unwrap());
        assert_eq!(week[0], NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());
        assert_eq!(week[6], NaiveDate::from_ymd_opt(2025, 6, 7).unwrap());

        let sunday = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        assert_eq!(week_of(sunday)[0], sunday);
    }

    #[test]
    fn week_view_without_profile_is_empty() {
        let snapshot = AppSnapshot::default();
        assert!(week_view(&snapshot, NaiveDate::from_ymd_opt(2025, 6, 4).unwrap()).is_empty());
    }
}
