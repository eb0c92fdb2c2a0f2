//! Boundary parsing of untrusted sighting payloads.
//!
//! [`SightingInput`] accepts any JSON object shape so that missing fields,
//! unknown headings, and malformed timestamps are reported as
//! [`ValidationError`]s instead of generic deserialization failures.

use serde::Deserialize;

use crate::error::ValidationError;
use crate::models::{parse_timestamp, Heading, Sighting};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SightingInput {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub subject_id: Option<i64>,
    #[serde(default)]
    pub observer_id: Option<i64>,
    #[serde(default)]
    pub occurred_at: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub count: Option<i64>,
    #[serde(default)]
    pub heading: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl SightingInput {
    /// Check presence, parse enumerations and timestamps, then apply
    /// [`Sighting::validate`].
    ///
    /// The id is carried through untouched; whether it may be set is an
    /// identity question decided by the synchronizer.
    pub fn into_sighting(self) -> Result<Sighting, ValidationError> {
        let subject_id = self.subject_id.ok_or(ValidationError::Missing("subjectId"))?;
        let observer_id = self
            .observer_id
            .ok_or(ValidationError::Missing("observerId"))?;
        let occurred_at = self
            .occurred_at
            .as_deref()
            .ok_or(ValidationError::Missing("occurredAt"))
            .and_then(parse_timestamp)?;
        let latitude = self.latitude.ok_or(ValidationError::Missing("latitude"))?;
        let longitude = self.longitude.ok_or(ValidationError::Missing("longitude"))?;

        let count = match self.count {
            Some(c) => Some(i32::try_from(c).map_err(|_| ValidationError::OutOfRange {
                field: "count",
                min: 0,
                max: crate::models::MAX_COUNT as i64,
                value: c,
            })?),
            None => None,
        };
        let heading = self
            .heading
            .as_deref()
            .map(str::parse::<Heading>)
            .transpose()?;

        let sighting = Sighting {
            id: self.id,
            subject_id,
            observer_id,
            occurred_at,
            latitude,
            longitude,
            count,
            heading,
            notes: self.notes,
        };
        sighting.validate()?;
        Ok(sighting)
    }
}

/// Parse a JSON document into a validated [`Sighting`].
pub fn parse_sighting_json(json: &str) -> Result<Sighting, crate::Error> {
    let input: SightingInput = serde_json::from_str(json)
        .map_err(|e| ValidationError::Malformed(e.to_string()))?;
    Ok(input.into_sighting()?)
}
