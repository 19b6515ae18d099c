use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::info;

use flickr_client::{FlickrClient, Photo, SearchParams};
use photowalk_common::{Config, GeoData, PhotoCandidate, Position};

use crate::traits::PhotoSearcher;

/// PhotoSearcher backed by `flickr.photos.search`.
pub struct FlickrSearcher {
    client: FlickrClient,
    radius_km: f64,
}

impl FlickrSearcher {
    pub fn new(client: FlickrClient, radius_km: f64) -> Self {
        Self { client, radius_km }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let client = FlickrClient::new(config.flickr_api_key.clone())
            .context("Failed to build Flickr client")?;
        info!(radius_km = config.search_radius_km, "Using FlickrSearcher");
        Ok(Self::new(client, config.search_radius_km))
    }
}

#[async_trait]
impl PhotoSearcher for FlickrSearcher {
    async fn search(&self, position: Position) -> Result<Vec<PhotoCandidate>> {
        let params = SearchParams::near(position.lat, position.lon).radius_km(self.radius_km);
        let photos = self
            .client
            .search_photos(&params)
            .await
            .context("Flickr photo search failed")?;
        Ok(photos.into_iter().map(candidate_from_photo).collect())
    }
}

pub fn candidate_from_photo(photo: Photo) -> PhotoCandidate {
    let geo = photo.geo().map(|(lat, lon)| GeoData { lat, lon });
    PhotoCandidate {
        id: photo.id,
        server: photo.server,
        secret: photo.secret,
        geo,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn photo(json: &str) -> Photo {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn geotagged_photo_keeps_identity_and_coordinates() {
        let candidate = candidate_from_photo(photo(
            r#"{"id":"976543","secret":"abcdefg","server":"12345","latitude":"50","longitude":"8"}"#,
        ));
        assert_eq!(candidate.id, "976543");
        assert_eq!(candidate.geo, Some(GeoData { lat: 50.0, lon: 8.0 }));
        assert_eq!(
            candidate.reference().as_str(),
            "https://live.staticflickr.com/12345/976543_abcdefg.jpg"
        );
    }

    #[test]
    fn untagged_photo_has_no_geo() {
        let candidate = candidate_from_photo(photo(
            r#"{"id":"1","secret":"s","server":"2","latitude":0,"longitude":0}"#,
        ));
        assert_eq!(candidate.geo, None);
    }
}
