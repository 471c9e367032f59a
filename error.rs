use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database Pool Error: {0}")]
    DbPool(#[from] r2d2::Error),

    #[error("Database Error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Image Error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Decode Error: {0}")]
    Decode(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Layout Error: {0}")]
    Layout(String),

    #[error("Invalid Input: {0}")]
    Invalid(String),
}
