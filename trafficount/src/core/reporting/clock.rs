//! Bucket labels
//!
//! Reports are labelled with the wall-clock time of the flush, in the
//! camera's time zone, formatted as "HH:MM".

use chrono::{DateTime, Local, Utc};
use chrono_tz::Tz;
use tracing::warn;

/// Label format for report timestamps
pub const BUCKET_LABEL_FORMAT: &str = "%H:%M";

/// Time zone used to render bucket labels
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BucketClock {
    /// Named IANA zone (e.g. America/New_York)
    Zone(Tz),
    /// Host local time
    Local,
}

impl BucketClock {
    /// Resolves a time zone name, falling back to host local time when unknown
    pub fn from_name(name: &str) -> Self {
        match name.trim().parse::<Tz>() {
            Ok(tz) => BucketClock::Zone(tz),
            Err(e) => {
                warn!(
                    "Unknown time zone '{}' ({}). Using host local time for report labels.",
                    name, e
                );
                BucketClock::Local
            }
        }
    }

    /// Formats an instant as a bucket label
    pub fn label(&self, at: DateTime<Utc>) -> String {
        match self {
            BucketClock::Zone(tz) => at.with_timezone(tz).format(BUCKET_LABEL_FORMAT).to_string(),
            BucketClock::Local => at
                .with_timezone(&Local)
                .format(BUCKET_LABEL_FORMAT)
                .to_string(),
        }
    }
}

impl Default for BucketClock {
    fn default() -> Self {
        BucketClock::Zone(Tz::UTC)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_label_in_named_zone() {
        let at = Utc.with_ymd_and_hms(2025, 10, 30, 18, 5, 42).unwrap();

        assert_eq!(BucketClock::from_name("UTC").label(at), "18:05");
        // EDT is UTC-4 on this date.
        assert_eq!(BucketClock::from_name("America/New_York").label(at), "14:05");
        assert_eq!(BucketClock::from_name("Europe/Bucharest").label(at), "20:05");
    }

    #[test]
    fn test_unknown_zone_falls_back_to_local() {
        assert_eq!(BucketClock::from_name("Mars/Olympus_Mons"), BucketClock::Local);

        let at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let label = BucketClock::Local.label(at);
        assert_eq!(label.len(), 5);
        assert_eq!(&label[2..3], ":");
    }
}
