use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PhotowalkError;

/// Host serving static photo files. Part of the reference format, so changing
/// it invalidates every dedup key issued so far.
pub const PHOTO_HOST: &str = "live.staticflickr.com";

// --- Positions ---

/// A position fix reported by the device, in signed decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub lat: f64,
    pub lon: f64,
}

impl Position {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Finite and within the WGS84 degree ranges.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }

    /// Like [`Position::new`], but rejects coordinates that fail [`Position::is_valid`].
    pub fn checked(lat: f64, lon: f64) -> Result<Self, PhotowalkError> {
        let pos = Self::new(lat, lon);
        if pos.is_valid() {
            Ok(pos)
        } else {
            Err(PhotowalkError::InvalidPosition { lat, lon })
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lat, self.lon)
    }
}

// --- Photos ---

/// Location metadata attached to a search result.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoData {
    pub lat: f64,
    pub lon: f64,
}

impl GeoData {
    /// Non-finite or out-of-range coordinates count as missing metadata.
    pub fn is_usable(&self) -> bool {
        Position::new(self.lat, self.lon).is_valid()
    }
}

/// A photo returned by the search collaborator. `server`, `id` and `secret`
/// are the identity fields; `geo` is optional and candidates without it are
/// never ranked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoCandidate {
    pub id: String,
    pub server: String,
    pub secret: String,
    pub geo: Option<GeoData>,
}

impl PhotoCandidate {
    pub fn reference(&self) -> PhotoReference {
        PhotoReference::for_candidate(self)
    }
}

/// Deterministic URL of a photo, derived from its identity fields. Doubles as
/// the dedup key for a session. Serialized as the bare URL; deserializing
/// goes through the same checks as [`FromStr`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PhotoReference(String);

impl PhotoReference {
    pub fn for_candidate(candidate: &PhotoCandidate) -> Self {
        Self(format!(
            "https://{PHOTO_HOST}/{}/{}_{}.jpg",
            candidate.server, candidate.id, candidate.secret
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

}

impl fmt::Display for PhotoReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PhotoReference {
    type Err = PhotowalkError;

    /// Accepts only strings in the exact shape produced by [`PhotoReference::for_candidate`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || PhotowalkError::InvalidReference(s.to_string());

        let path = s
            .strip_prefix("https://")
            .and_then(|rest| rest.strip_prefix(PHOTO_HOST))
            .and_then(|rest| rest.strip_prefix('/'))
            .and_then(|rest| rest.strip_suffix(".jpg"))
            .ok_or_else(invalid)?;

        let (server, file) = path.split_once('/').ok_or_else(invalid)?;
        let (id, secret) = file.split_once('_').ok_or_else(invalid)?;
        if [server, id, secret]
            .iter()
            .any(|part| part.is_empty() || part.contains('/'))
        {
            return Err(invalid());
        }

        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for PhotoReference {
    type Error = PhotowalkError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PhotoReference> for String {
    fn from(reference: PhotoReference) -> Self {
        reference.0
    }
}

// --- Snapshots ---

/// Full, newest-first view of the photos accumulated in a session at the
/// moment of publication. Each snapshot replaces the previous one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Publication counter, starting at 1 for the first snapshot of a session.
    pub seq: u64,
    pub published_at: DateTime<Utc>,
    pub photos: Vec<PhotoReference>,
}

impl Snapshot {
    pub fn len(&self) -> usize {
        self.photos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.photos.is_empty()
    }

    pub fn urls(&self) -> Vec<&str> {
        self.photos.iter().map(PhotoReference::as_str).collect()
    }
}
