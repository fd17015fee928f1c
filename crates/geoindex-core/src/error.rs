use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GeoindexError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("EXIF error: {0}")]
    Exif(#[from] exif::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Image container error: {0}")]
    Container(#[from] img_parts::Error),

    #[error("GPX error: {0}")]
    Gpx(#[from] gpx::errors::GpxError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Geotag writing is not supported for '{0}' (only JPEG and PNG)")]
    Unsupported(String),

    #[error("Catalog {path} is not valid JSON: {source}")]
    InvalidCatalog {
        path: PathBuf,
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, GeoindexError>;
