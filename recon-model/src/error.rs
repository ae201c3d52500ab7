use std::fmt::{self, Display};

/// A string-valued enum received a value this client does not recognise.
///
/// The server is free to grow new statuses, severities or scan modes ahead of
/// the client; those surface here instead of being coerced into a known
/// variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownVariant {
    pub fn new(kind: &'static str, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}

impl Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {} '{}'", self.kind, self.value)
    }
}

impl std::error::Error for UnknownVariant {}

pub type Result<T> = std::result::Result<T, UnknownVariant>;
