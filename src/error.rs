// csp_validator::error
//
// Crate-wide error type.  Policy violations are never errors: they come back
// as `Report`s.  Everything here aborts the operation that raised it.

use thiserror::Error;

/// Error represents every failure that can stop a policy parse, a document
/// scan, or a host fetch.
#[derive(Error, Debug)]
pub enum Error {
    /// A source expression matched none of the CSP source grammars.
    #[error("unknown source {0:?}")]
    UnknownSource(String),

    /// `'none'` appeared alongside other sources.
    #[error("'none' must be the only source in {0}")]
    NoneNotExclusive(String),

    /// A host source could not be compiled into a glob.
    #[error("invalid host pattern {pattern:?}: {source}")]
    HostPattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    /// A selector was rejected by the document query engine.
    #[error("invalid selector {0:?}")]
    Selector(String),

    /// URL parsing or resolution errors
    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),

    /// The hashing primitive failed while digesting inline content.
    #[error("digest error: {0}")]
    Digest(#[source] std::io::Error),

    /// HTTP request errors
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Meta-refresh chain longer than the configured cap.
    #[error("meta refresh redirect limit of {0} exceeded")]
    RedirectLimit(usize),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns true if the error came from the CSP grammar rather than from
    /// I/O or the document.
    pub fn is_parse_error(&self) -> bool {
        matches!(
            self,
            Error::UnknownSource(_) | Error::NoneNotExclusive(_) | Error::HostPattern { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
