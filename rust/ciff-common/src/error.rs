use std::fmt;

use thiserror::Error;

#[derive(Debug, Error)]
#[error(transparent)]
pub struct Error(Box<ErrorKind>);

pub type StdErrorBoxed = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The stage of an ingestion run an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Reading, framing and decoding the CIFF stream.
    Decode,
    /// Writing to, or reshaping tables in, the destination store.
    Load,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Decode => f.write_str("decode"),
            Phase::Load => f.write_str("load"),
        }
    }
}

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        self.0.as_ref()
    }

    pub fn into_kind(self) -> ErrorKind {
        *self.0
    }

    /// Classifies the error by the pipeline phase that produced it.
    pub fn phase(&self) -> Phase {
        match self.kind() {
            ErrorKind::CorruptStream { .. }
            | ErrorKind::TruncatedStream { .. }
            | ErrorKind::InvalidPosting { .. }
            | ErrorKind::InvalidDocument { .. } => Phase::Decode,
            _ => Phase::Load,
        }
    }

    /// Record ordinal within the CIFF stream associated with the error, if any.
    ///
    /// The header is record `0`, the first postings list is record `1`.
    pub fn record_ordinal(&self) -> Option<u64> {
        match self.kind() {
            ErrorKind::CorruptStream { ordinal, .. }
            | ErrorKind::InvalidPosting { ordinal, .. }
            | ErrorKind::InvalidDocument { ordinal, .. }
            | ErrorKind::TruncatedStream { ordinal, .. } => Some(*ordinal),
            _ => None,
        }
    }

    pub fn corrupt_stream(ordinal: u64, offset: u64, message: impl Into<String>) -> Error {
        Error(
            ErrorKind::CorruptStream {
                ordinal,
                offset,
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn truncated_stream(section: &'static str, ordinal: u64, expected: u64, read: u64) -> Error {
        Error(
            ErrorKind::TruncatedStream {
                section,
                ordinal,
                expected,
                read,
            }
            .into(),
        )
    }

    pub fn invalid_posting(
        term: impl Into<String>,
        term_id: u64,
        ordinal: u64,
        message: impl Into<String>,
    ) -> Error {
        Error(
            ErrorKind::InvalidPosting {
                term: term.into(),
                term_id,
                ordinal,
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn invalid_document(ordinal: u64, message: impl Into<String>) -> Error {
        Error(
            ErrorKind::InvalidDocument {
                ordinal,
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn name_collision(name: impl Into<String>) -> Error {
        Error(ErrorKind::NameCollision { name: name.into() }.into())
    }

    pub fn schema_mismatch(
        table: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Error {
        Error(
            ErrorKind::SchemaMismatch {
                table: table.into(),
                expected: expected.into(),
                actual: actual.into(),
            }
            .into(),
        )
    }

    pub fn table_not_found(name: impl Into<String>) -> Error {
        Error(ErrorKind::TableNotFound { name: name.into() }.into())
    }

    pub fn invalid_arg(name: impl Into<String>, message: impl Into<String>) -> Error {
        Error(
            ErrorKind::InvalidArgument {
                name: name.into(),
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn invalid_operation(name: impl Into<String>) -> Error {
        Error(ErrorKind::InvalidOperation { name: name.into() }.into())
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Error {
        Error(
            ErrorKind::Io {
                context: context.into(),
                source,
            }
            .into(),
        )
    }

    pub fn arrow<E>(context: impl Into<String>, source: E) -> Error
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error(
            ErrorKind::Arrow {
                context: context.into(),
                source: Box::new(source),
            }
            .into(),
        )
    }
}

#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error("corrupt CIFF stream at record {ordinal} (byte offset {offset}): {message}")]
    CorruptStream {
        ordinal: u64,
        offset: u64,
        message: String,
    },

    #[error(
        "truncated CIFF stream: expected {expected} {section} records, \
         stream ended after {read} (record {ordinal})"
    )]
    TruncatedStream {
        section: &'static str,
        ordinal: u64,
        expected: u64,
        read: u64,
    },

    #[error("invalid postings for term '{term}' (term id {term_id}, record {ordinal}): {message}")]
    InvalidPosting {
        term: String,
        term_id: u64,
        ordinal: u64,
        message: String,
    },

    #[error("invalid document record {ordinal}: {message}")]
    InvalidDocument { ordinal: u64, message: String },

    #[error("'{name}' already exists in the destination store")]
    NameCollision { name: String },

    #[error("schema mismatch for table '{table}': expected {expected}, got {actual}")]
    SchemaMismatch {
        table: String,
        expected: String,
        actual: String,
    },

    #[error("table '{name}' does not exist")]
    TableNotFound { name: String },

    #[error("invalid argument {name}: {message}")]
    InvalidArgument { name: String, message: String },

    #[error("invalid operation {name}")]
    InvalidOperation { name: String },

    #[error("IO error for '{context}': {source}")]
    Io {
        context: String,
        source: std::io::Error,
    },

    #[error("Arrow error: {context}: {source}")]
    Arrow {
        context: String,
        source: StdErrorBoxed,
    },
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error(kind.into())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::io("", e)
    }
}

impl From<arrow_schema::ArrowError> for Error {
    fn from(e: arrow_schema::ArrowError) -> Self {
        match e {
            arrow_schema::ArrowError::ExternalError(inner) => match inner.downcast::<Error>() {
                Ok(error) => *error,
                Err(inner) => Error::arrow("", arrow_schema::ArrowError::ExternalError(inner)),
            },
            e => Error::arrow("", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_classification() {
        assert_eq!(Error::corrupt_stream(3, 10, "bad").phase(), Phase::Decode);
        assert_eq!(
            Error::truncated_stream("postings list", 4, 5, 3).phase(),
            Phase::Decode
        );
        assert_eq!(
            Error::invalid_posting("cat", 0, 1, "gap").phase(),
            Phase::Decode
        );
        assert_eq!(Error::name_collision("ows.dict").phase(), Phase::Load);
        assert_eq!(
            Error::schema_mismatch("dict", "a", "b").phase(),
            Phase::Load
        );
    }

    #[test]
    fn test_record_ordinal() {
        assert_eq!(Error::corrupt_stream(3, 10, "bad").record_ordinal(), Some(3));
        assert_eq!(
            Error::invalid_posting("cat", 0, 7, "gap").record_ordinal(),
            Some(7)
        );
        assert_eq!(Error::table_not_found("x").record_ordinal(), None);
    }

    #[test]
    fn test_arrow_external_error_roundtrip() {
        let original = Error::name_collision("ows.docs");
        let wrapped = arrow_schema::ArrowError::ExternalError(Box::new(original));
        let error: Error = wrapped.into();
        assert!(matches!(error.kind(), ErrorKind::NameCollision { name } if name == "ows.docs"));
    }

    #[test]
    fn test_display() {
        let error = Error::invalid_posting("cat", 2, 3, "docid 5 >= num_docs 2");
        assert_eq!(
            error.to_string(),
            "invalid postings for term 'cat' (term id 2, record 3): docid 5 >= num_docs 2"
        );
    }
}
