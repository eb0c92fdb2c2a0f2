//! The sighting record and its heading enumeration.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use crate::error::ValidationError;

pub type SightingId = String;

/// Upper bound (inclusive) for [`Sighting::count`].
pub const MAX_COUNT: i32 = 999;
/// Maximum length of [`Sighting::notes`], in characters.
pub const MAX_NOTES_CHARS: usize = 64;

/// Compass heading of the observed subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Heading {
    Stationary,
    #[serde(alias = "N")]
    North,
    #[serde(alias = "NE")]
    Northeast,
    #[serde(alias = "E")]
    East,
    #[serde(alias = "SE")]
    Southeast,
    #[serde(alias = "S")]
    South,
    #[serde(alias = "SW")]
    Southwest,
    #[serde(alias = "W")]
    West,
    #[serde(alias = "NW")]
    Northwest,
}

impl Heading {
    pub const ALL: [Heading; 9] = [
        Heading::Stationary,
        Heading::North,
        Heading::Northeast,
        Heading::East,
        Heading::Southeast,
        Heading::South,
        Heading::Southwest,
        Heading::West,
        Heading::Northwest,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Heading::Stationary => "STATIONARY",
            Heading::North => "NORTH",
            Heading::Northeast => "NORTHEAST",
            Heading::East => "EAST",
            Heading::Southeast => "SOUTHEAST",
            Heading::South => "SOUTH",
            Heading::Southwest => "SOUTHWEST",
            Heading::West => "WEST",
            Heading::Northwest => "NORTHWEST",
        }
    }

    fn abbreviation(&self) -> &'static str {
        match self {
            Heading::Stationary => "STATIONARY",
            Heading::North => "N",
            Heading::Northeast => "NE",
            Heading::East => "E",
            Heading::Southeast => "SE",
            Heading::South => "S",
            Heading::Southwest => "SW",
            Heading::West => "W",
            Heading::Northwest => "NW",
        }
    }
}

impl fmt::Display for Heading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Heading {
    type Err = ValidationError;

    /// Accepts the canonical name or the compass abbreviation, in any case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Heading::ALL
            .into_iter()
            .find(|h| {
                h.as_str().eq_ignore_ascii_case(wanted)
                    || h.abbreviation().eq_ignore_ascii_case(wanted)
            })
            .ok_or_else(|| ValidationError::InvalidHeading(s.to_string()))
    }
}

/// A single observation of a tracked subject.
///
/// Equality and hashing look only at `id`: two sightings are equal when both
/// carry the same id. A sighting without an id is equal only to itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sighting {
    #[serde(default)]
    pub id: Option<SightingId>,
    pub subject_id: i64,
    pub observer_id: i64,
    pub occurred_at: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub count: Option<i32>,
    #[serde(default)]
    pub heading: Option<Heading>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Sighting {
    /// A new, unpersisted sighting carrying only the required fields.
    pub fn new(
        subject_id: i64,
        observer_id: i64,
        occurred_at: DateTime<Utc>,
        latitude: f64,
        longitude: f64,
    ) -> Self {
        Self {
            id: None,
            subject_id,
            observer_id,
            occurred_at,
            latitude,
            longitude,
            count: None,
            heading: None,
            notes: None,
        }
    }

    pub fn with_count(mut self, count: i32) -> Self {
        self.count = Some(count);
        self
    }

    pub fn with_heading(mut self, heading: Heading) -> Self {
        self.heading = Some(heading);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_id(mut self, id: impl Into<SightingId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Returns the id if it is set and non-empty.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }

    pub fn is_persisted(&self) -> bool {
        self.id().is_some()
    }

    /// Field-level constraints. Required-field presence is enforced by the
    /// type; see [`crate::validate`] for parsing untrusted input.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.subject_id < 0 {
            return Err(ValidationError::BelowMinimum {
                field: "subjectId",
                min: 0,
                value: self.subject_id,
            });
        }
        if self.observer_id < 0 {
            return Err(ValidationError::BelowMinimum {
                field: "observerId",
                min: 0,
                value: self.observer_id,
            });
        }
        if !self.latitude.is_finite() {
            return Err(ValidationError::NotFinite { field: "latitude" });
        }
        if !self.longitude.is_finite() {
            return Err(ValidationError::NotFinite { field: "longitude" });
        }
        if let Some(count) = self.count {
            if !(0..=MAX_COUNT).contains(&count) {
                return Err(ValidationError::OutOfRange {
                    field: "count",
                    min: 0,
                    max: MAX_COUNT as i64,
                    value: count as i64,
                });
            }
        }
        if let Some(ref notes) = self.notes {
            let len = notes.chars().count();
            if len > MAX_NOTES_CHARS {
                return Err(ValidationError::TooLong {
                    field: "notes",
                    max: MAX_NOTES_CHARS,
                    len,
                });
            }
        }
        Ok(())
    }

    /// True when every field, id included, holds the same value.
    pub fn same_fields(&self, other: &Sighting) -> bool {
        self.id == other.id
            && self.subject_id == other.subject_id
            && self.observer_id == other.observer_id
            && self.occurred_at == other.occurred_at
            && self.latitude == other.latitude
            && self.longitude == other.longitude
            && self.count == other.count
            && self.heading == other.heading
            && self.notes == other.notes
    }
}

impl PartialEq for Sighting {
    fn eq(&self, other: &Self) -> bool {
        match (self.id(), other.id()) {
            (Some(a), Some(b)) => a == b,
            _ => std::ptr::eq(self, other),
        }
    }
}

impl Eq for Sighting {}

impl Hash for Sighting {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

/// Fixed-width RFC 3339 rendering; lexicographic order matches time order.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, ValidationError> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| ValidationError::InvalidTimestamp(raw.to_string()))
}
