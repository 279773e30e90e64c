//! Error type shared by every stage of the pipeline.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A media server or triple store answered with a non-success status.
    #[error("{service} returned HTTP {status}: {body}")]
    Upstream {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// The upstream payload did not have the expected shape.
    #[error("malformed payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("wrong media type for '{slug}': expected 'movie', got '{found}'")]
    WrongMediaType { slug: String, found: String },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid name '{0}': only ASCII letters, digits, '-' and '_' are allowed")]
    InvalidName(String),

    #[error("invalid IRI: {0}")]
    Iri(String),

    #[error("turtle error: {0}")]
    Turtle(String),

    /// A shapes graph uses a construct the validator cannot interpret.
    #[error("invalid shape: {0}")]
    Shape(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn upstream(service: &'static str, status: u16, body: impl Into<String>) -> Self {
        Self::Upstream {
            service,
            status,
            body: body.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
