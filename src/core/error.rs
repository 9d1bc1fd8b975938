use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Input ended in the middle of an encoded value
    Truncated,
    /// Encoded value does not fit the destination type
    Overflow,
    /// A key could not be parsed
    MalformedKey,
    /// Stored records contradict each other
    DatabaseCorrupt,
    NotFound,
    /// The operation is not meaningful for this object
    InvalidOperation,
    InvalidArgument,
    /// Another writer holds the database
    DatabaseLocked,
    /// Another handle committed a newer revision
    DatabaseModified,
    Io,
    Parse,
}

#[derive(Debug)]
pub struct Error {
    pub kind: ErrorKind,
    pub context: String,
}

impl Error {
    pub fn new(kind: ErrorKind, context: String) -> Self {
        Error { kind, context }
    }

    pub fn corrupt(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::DatabaseCorrupt, context.into())
    }

    pub fn not_found(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::NotFound, context.into())
    }

    pub fn invalid_argument(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::InvalidArgument, context.into())
    }

    /// Decoding failures inside a stored record mean the record is bad.
    pub fn at_record(self, what: &str) -> Self {
        match self.kind {
            ErrorKind::Truncated | ErrorKind::Overflow | ErrorKind::MalformedKey => {
                Error::new(ErrorKind::DatabaseCorrupt, format!("{}: {}", what, self.context))
            }
            _ => self,
        }
    }

    pub fn is_corruption(&self) -> bool {
        self.kind == ErrorKind::DatabaseCorrupt
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.context)
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error {
            kind: ErrorKind::Io,
            context: err.to_string(),
        }
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error {
            kind: ErrorKind::Parse,
            context: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error {
            kind: ErrorKind::Parse,
            context: format!("config: {}", err),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
