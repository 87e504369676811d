// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

/// Syntax violation inside an information file.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MalformedKind {
    /// A `[section]` line that does not parse as a section header.
    Section,

    /// A key line that does not parse as `key: value`.
    Key,

    /// A continuation line with no preceding key.
    ContinuationWithoutKey,

    /// The same key appeared twice within one section.
    DuplicateKey,
}

impl std::fmt::Display for MalformedKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Section => write!(f, "malformed section header"),
            Self::Key => write!(f, "malformed key"),
            Self::ContinuationWithoutKey => write!(f, "continuation line without key"),
            Self::DuplicateKey => write!(f, "duplicate key"),
        }
    }
}

/// Category of a failed operation.
#[derive(Debug)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Invalid input (out-of-range offset, bad code page id, empty filename list, ...).
    InvalidArgument(&'static str),

    /// Operation not legal in the handle's current state.
    InvalidState(&'static str),

    /// An expected segment or information file is missing.
    NotFound(String),

    /// A write-open would overwrite an existing non-empty segment.
    AlreadyExists(String),

    /// The segment chain is inconsistent (zero-length middle segment,
    /// size mismatch against the configured cap, truncated file).
    Corrupt(String),

    /// An underlying read/write/seek/open call failed.
    Io(std::io::Error),

    /// The OS reported fewer bytes written than requested and a retry
    /// made no progress.
    ShortWrite,

    /// The abort flag was raised during an operation.
    Cancelled,

    /// Information-file syntax violation, with the 1-based line number.
    Malformed {
        /// Which rule was violated.
        kind: MalformedKind,
        /// 1-based line number in the input text.
        line: usize,
    },

    /// Two naming schemes match the first segment name and disagree on
    /// the successor.
    Ambiguous(String),

    /// Operation refused for this access mode (e.g. `write_at` extending
    /// the medium).
    Unsupported(&'static str),
}

/// Error type carrying the failure category plus the operation during
/// which it surfaced.
///
/// The operation tag is attached once at the failing call site and kept
/// unchanged while the error propagates, same as the `kind`.
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    op: Option<&'static str>,
}

impl Error {
    pub(crate) fn new(kind: ErrorKind) -> Self {
        Self { kind, op: None }
    }

    /// Attaches an operation context tag, unless one is already present.
    pub(crate) fn during(mut self, op: &'static str) -> Self {
        if self.op.is_none() {
            self.op = Some(op);
        }
        self
    }

    /// The failure category.
    #[must_use]
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// The operation during which the error surfaced, if annotated.
    #[must_use]
    pub fn operation(&self) -> Option<&'static str> {
        self.op
    }

    /// Whether this error was caused by the abort flag.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self.kind, ErrorKind::Cancelled)
    }

    pub(crate) fn invalid_argument(msg: &'static str) -> Self {
        Self::new(ErrorKind::InvalidArgument(msg))
    }

    pub(crate) fn invalid_state(msg: &'static str) -> Self {
        Self::new(ErrorKind::InvalidState(msg))
    }

    pub(crate) fn not_found(name: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound(name.into()))
    }

    pub(crate) fn already_exists(name: impl Into<String>) -> Self {
        Self::new(ErrorKind::AlreadyExists(name.into()))
    }

    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Corrupt(msg.into()))
    }

    pub(crate) fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled)
    }

    pub(crate) fn malformed(kind: MalformedKind, line: usize) -> Self {
        Self::new(ErrorKind::Malformed { kind, line })
    }

    pub(crate) fn ambiguous(name: impl Into<String>) -> Self {
        Self::new(ErrorKind::Ambiguous(name.into()))
    }

    pub(crate) fn unsupported(msg: &'static str) -> Self {
        Self::new(ErrorKind::Unsupported(msg))
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(op) = self.op {
            write!(f, "during {op}: ")?;
        }

        match &self.kind {
            ErrorKind::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            ErrorKind::InvalidState(msg) => write!(f, "invalid state: {msg}"),
            ErrorKind::NotFound(name) => write!(f, "not found: {name}"),
            ErrorKind::AlreadyExists(name) => write!(f, "already exists: {name}"),
            ErrorKind::Corrupt(msg) => write!(f, "corrupt segment chain: {msg}"),
            ErrorKind::Io(e) => write!(f, "I/O error: {e}"),
            ErrorKind::ShortWrite => write!(f, "short write"),
            ErrorKind::Cancelled => write!(f, "cancelled"),
            ErrorKind::Malformed { kind, line } => {
                write!(f, "{kind} at line {line}")
            }
            ErrorKind::Ambiguous(name) => write!(f, "ambiguous segment naming: {name}"),
            ErrorKind::Unsupported(msg) => write!(f, "unsupported: {msg}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            ErrorKind::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::new(ErrorKind::Io(value))
    }
}

impl From<ErrorKind> for Error {
    fn from(value: ErrorKind) -> Self {
        Self::new(value)
    }
}

/// Crate result type.
pub type Result<T> = std::result::Result<T, Error>;
