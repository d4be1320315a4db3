use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("Failed to fetch the webpage: {detail}")]
    Fetch { url: String, detail: String },
    #[error("{0}")]
    StructureNotFound(String),
    #[error("missing required parameters: {}", .missing.join(", "))]
    Validation { missing: Vec<&'static str> },
}

impl ScrapeError {
    pub fn fetch(url: &str, detail: impl std::fmt::Display) -> Self {
        ScrapeError::Fetch {
            url: url.to_string(),
            detail: detail.to_string(),
        }
    }

    /// HTTP status the handler boundary reports for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            ScrapeError::Validation { .. } => 400,
            ScrapeError::Fetch { .. } | ScrapeError::StructureNotFound(_) => 502,
        }
    }
}

pub type ScrapeResult<T> = std::result::Result<T, ScrapeError>;
