use std::path::Path;

/// All errors that can occur while opening or reading a catalog.
#[derive(Debug)]
pub enum Error {
    /// A catalog file, zone, or record is absent.
    NotFound(String),
    /// Fewer bytes were available than a header or record requires.
    Truncated { expected: usize, found: usize },
    /// A flag string, column header, index line, or field could not be parsed.
    Malformed(String),
    /// A record number beyond the size of the open catalog or zone.
    OutOfRange { record: u64, count: u64 },
    /// Any other I/O error from the standard library.
    Io(std::io::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;

impl Error {
    /// Build a [`Error::Malformed`] from anything displayable.
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        Error::Malformed(msg.into())
    }

    /// Map an I/O error raised while touching `path`, turning a missing file
    /// into [`Error::NotFound`].
    pub(crate) fn from_io(e: std::io::Error, path: &Path) -> Self {
        match e.kind() {
            std::io::ErrorKind::NotFound => Error::NotFound(path.display().to_string()),
            _ => Error::Io(e),
        }
    }

    /// True for errors that mean "nothing there", as opposed to a damaged catalog.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::NotFound(what) => write!(f, "not found: {what}"),
            Error::Truncated { expected, found } => {
                write!(f, "truncated read: expected {expected} bytes, found {found}")
            }
            Error::Malformed(msg) => write!(f, "malformed catalog data: {msg}"),
            Error::OutOfRange { record, count } => {
                write!(f, "record {record} out of range (catalog holds {count})")
            }
            Error::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}
