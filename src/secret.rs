use std::fmt;

use serde::{Serialize, Serializer};

use crate::sensitivity::REDACTED;

/// A wrapper that forces redaction of a value regardless of its own type.
///
/// Sensitivity is classified by declared type name, so a password passed as
/// a plain `String` is logged verbatim. Wrapping it in `Secret` changes the
/// declared type to `Secret<String>`, which matches the `secret` marker. The
/// `Debug`, `Display` and `Serialize` impls also emit `[REDACTED]`, so the
/// value stays hidden even when nested inside another structure.
///
/// # Examples
///
/// ```
/// use service_instrument::{RedactingSerializer, LogArg, Secret};
///
/// let password = Secret::new("hunter2".to_string());
///
/// assert_eq!(format!("{:?}", password), "[REDACTED]");
/// assert_eq!(RedactingSerializer::default().serialize(&LogArg::new(&password)), "[REDACTED]");
/// assert_eq!(password.expose_secret(), "hunter2");
/// ```
// Clone is intentionally absent: duplicating secrets should be explicit.
pub struct Secret<T> {
    inner: T,
}

impl<T> Secret<T> {
    /// Wraps a sensitive value.
    pub fn new(value: T) -> Self {
        Self { inner: value }
    }

    /// Explicitly exposes the wrapped value.
    ///
    /// Callers must make sure the returned reference is not logged.
    pub fn expose_secret(&self) -> &T {
        &self.inner
    }

    /// Consumes the wrapper and returns the wrapped value.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T> fmt::Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl<T> fmt::Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl<T> Serialize for Secret<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_newtype_struct("Secret", REDACTED)
    }
}
