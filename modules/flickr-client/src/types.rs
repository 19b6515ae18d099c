use serde::{Deserialize, Deserializer};

// --- Request types ---

/// Parameters for `flickr.photos.search`, restricted to what a geographic
/// lookup needs.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchParams {
    pub lat: f64,
    pub lon: f64,
    /// Search radius in kilometres. Flickr caps this at 32.
    pub radius_km: f64,
    pub has_geo: bool,
    pub extras: Vec<String>,
}

impl SearchParams {
    /// Geotagged photos within 100 m of a point, with coordinates included.
    pub fn near(lat: f64, lon: f64) -> Self {
        Self {
            lat,
            lon,
            radius_km: 0.1,
            has_geo: true,
            extras: vec!["geo".to_string()],
        }
    }

    pub fn radius_km(mut self, radius_km: f64) -> Self {
        self.radius_km = radius_km;
        self
    }

    /// Query-string pairs for the REST endpoint, excluding the API key.
    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("method", "flickr.photos.search".to_string()),
            ("lat", self.lat.to_string()),
            ("lon", self.lon.to_string()),
            ("radius", self.radius_km.to_string()),
            ("radius_units", "km".to_string()),
            ("format", "json".to_string()),
            ("nojsoncallback", "1".to_string()),
        ];
        if self.has_geo {
            query.push(("has_geo", "1".to_string()));
        }
        if !self.extras.is_empty() {
            query.push(("extras", self.extras.join(",")));
        }
        query
    }
}

// --- Response types ---

/// Envelope shared by every Flickr JSON response.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SearchResponse {
    pub stat: String,
    pub photos: Option<PhotoPage>,
    pub code: Option<i64>,
    pub message: Option<String>,
}

/// One page of search results.
#[derive(Debug, Clone, Deserialize)]
pub struct PhotoPage {
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub pages: u32,
    #[serde(default)]
    pub perpage: u32,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub total: u64,
    #[serde(default)]
    pub photo: Vec<Photo>,
}

/// A photo record as returned by `flickr.photos.search` with `extras=geo`.
#[derive(Debug, Clone, Deserialize)]
pub struct Photo {
    pub id: String,
    #[serde(default)]
    pub owner: String,
    pub secret: String,
    pub server: String,
    #[serde(default)]
    pub farm: Option<i64>,
    #[serde(default)]
    pub title: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub latitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub longitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub accuracy: Option<f64>,
}

impl Photo {
    /// Coordinates, if the photo is geotagged. Flickr reports untagged photos
    /// as `0, 0` rather than omitting the fields.
    pub fn geo(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) if !(lat == 0.0 && lon == 0.0) => Some((lat, lon)),
            _ => None,
        }
    }
}

// --- Lenient number decoding ---

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(f64),
    String(String),
}

/// Flickr encodes numbers as JSON numbers or numeric strings depending on the
/// field and API version. Empty or unparseable strings become `None`.
fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<NumberOrString>::deserialize(deserializer)?;
    Ok(match raw {
        Some(NumberOrString::Number(n)) => Some(n),
        Some(NumberOrString::String(s)) => s.trim().parse().ok(),
        None => None,
    })
}

fn lenient_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_f64(deserializer)?
        .filter(|n| n.is_finite() && *n >= 0.0)
        .map(|n| n as u64)
        .unwrap_or(0))
}
