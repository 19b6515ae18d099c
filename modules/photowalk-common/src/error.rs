use thiserror::Error;

#[derive(Error, Debug)]
pub enum PhotowalkError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid position: lat={lat}, lon={lon}")]
    InvalidPosition { lat: f64, lon: f64 },

    #[error("Malformed position: {0}")]
    MalformedPosition(String),

    #[error("Invalid photo reference: {0}")]
    InvalidReference(String),
}
