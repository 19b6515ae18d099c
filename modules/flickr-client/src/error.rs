use thiserror::Error;

pub type Result<T> = std::result::Result<T, FlickrError>;

#[derive(Debug, Error)]
pub enum FlickrError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP error (status {status}): {message}")]
    Http { status: u16, message: String },

    /// The request reached Flickr but was refused (`"stat": "fail"`).
    #[error("Flickr API error {code}: {message}")]
    Api { code: i64, message: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for FlickrError {
    fn from(err: reqwest::Error) -> Self {
        FlickrError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for FlickrError {
    fn from(err: serde_json::Error) -> Self {
        FlickrError::Parse(err.to_string())
    }
}
