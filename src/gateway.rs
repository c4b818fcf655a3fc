// src/gateway.rs
//! Collaborators the store talks to but does not own: time, user-facing
//! notifications, confirmations and binary-to-text encoding of photos.
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Local, NaiveDate, Utc};
use std::cell::Cell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use strum_macros::{AsRefStr, Display};
use thiserror::Error;

pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
    fn today(&self) -> NaiveDate;
}

/// Wall clock. "Today" is the local calendar date.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// A clock that only moves when told to. Clones share the same instant, so a
/// test can keep a handle while the store owns another.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Rc<Cell<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Rc::new(Cell::new(start)),
        }
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        self.now.set(instant);
    }

    pub fn advance(&self, by: chrono::Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.get()
    }

    fn today(&self) -> NaiveDate {
        self.now.get().date_naive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    Success,
    Error,
    Warning,
}

/// Fire-and-forget, transient user messages.
pub trait Notifier {
    fn notify(&self, message: &str, severity: Severity);
}

/// Sends notifications to the log. Used when no front end is attached.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, message: &str, severity: Severity) {
        match severity {
            Severity::Success => tracing::info!(%severity, "{message}"),
            Severity::Warning => tracing::warn!(%severity, "{message}"),
            Severity::Error => tracing::error!(%severity, "{message}"),
        }
    }
}

/// Asked synchronously before destructive actions.
pub trait Confirmer {
    fn confirm(&self, message: &str) -> bool;
}

/// Answers every confirmation with a fixed value (`--yes`, tests).
#[derive(Debug, Clone, Copy)]
pub struct FixedAnswer(pub bool);

impl Confirmer for FixedAnswer {
    fn confirm(&self, _message: &str) -> bool {
        self.0
    }
}

pub trait BinaryEncoder {
    fn encode(&self, bytes: &[u8], mime: &str) -> String;
}

/// Encodes as a `data:` URL, ready to be shown inline.
#[derive(Debug, Clone, Copy, Default)]
pub struct DataUrlEncoder;

impl BinaryEncoder for DataUrlEncoder {
    fn encode(&self, bytes: &[u8], mime: &str) -> String {
        format!("data:{mime};base64,{}", STANDARD.encode(bytes))
    }
}

#[derive(Error, Debug)]
pub enum PhotoError {
    #[error("Could not read photo {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Photo file {0:?} is empty")]
    Empty(PathBuf),
}

/// Guesses an image mime type from the file extension.
pub fn mime_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        Some("bmp") => "image/bmp",
        _ => "application/octet-stream",
    }
}

/// Reads a photo from disk and encodes it for inline storage.
/// # Errors
/// - `PhotoError::Read` if the file cannot be read.
/// - `PhotoError::Empty` for zero-length files (treated as "no photo chosen").
pub fn read_photo(path: &Path, encoder: &dyn BinaryEncoder) -> Result<String, PhotoError> {
    let bytes = fs::read(path).map_err(|source| PhotoError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    if bytes.is_empty() {
        return Err(PhotoError::Empty(path.to_path_buf()));
    }
    Ok(encoder.encode(&bytes, mime_for(path)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::io::Write;

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 6, 6, 10, 0, 0).unwrap());
        let handle = clock.clone();
        handle.advance(chrono::Duration::days(1));
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2025, 6, 7).unwrap());

        let later = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        handle.set(later);
        assert_eq!(clock.now(), later);
    }

    #[test]
    fn severity_names_are_lowercase() {
        assert_eq!(Severity::Success.to_string(), "success");
        assert_eq!(Severity::Warning.as_ref(), "warning");
        // Logging notifier never fails, with or without a subscriber
        LogNotifier.notify("Backup completed successfully!", Severity::Success);
    }

    #[test]
    fn data_url_encoding() {
        assert_eq!(DataUrlEncoder.encode(b"hi", "image/png"), "data:image/png;base64,aGk=");
    }

    #[test]
    fn read_photo_from_disk() {
        let mut file = tempfile::Builder::new().suffix(".JPG").tempfile().unwrap();
        file.write_all(&[0xff, 0xd8, 0xff]).unwrap();
        let encoded = read_photo(file.path(), &DataUrlEncoder).unwrap();
        assert_eq!(encoded, "data:image/jpeg;base64,/9j/");
    }

    #[test]
    fn empty_and_missing_photos_are_errors() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(matches!(
            read_photo(file.path(), &DataUrlEncoder),
            Err(PhotoError::Empty(_))
        ));
        assert!(matches!(
            read_photo(Path::new("/definitely/not/here.png"), &DataUrlEncoder),
            Err(PhotoError::Read { .. })
        ));
    }
}
