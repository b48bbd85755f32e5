//! Redacting, depth-bounded rendering of logged values.
//!
//! The serializer is strictly best-effort: it never fails and never panics
//! into the caller. Rendering proceeds in order of preference:
//!
//! 1. `[REDACTED]` when the declared type name is sensitive
//! 2. depth-bounded JSON built through `serde::Serialize`
//! 3. the value's `Debug` text, when one was captured, cut off after
//!    [`MAX_DEBUG_LEN`] bytes
//! 4. `null`

mod bounded;

use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use serde::Serialize;
use serde_json::Value;

pub use bounded::{BoundError, TRUNCATED};

use crate::sensitivity::{is_sensitive_type_name, short_type_name, REDACTED};

/// Default container nesting rendered before truncation.
pub const DEFAULT_MAX_DEPTH: usize = 2;

/// Text emitted when nothing better is available.
pub const NULL: &str = "null";

/// Bytes of `Debug` text kept before the rest is replaced by [`TRUNCATED`].
///
/// `Debug` has no depth bound of its own, so the cap is what stops it on
/// self-referential values.
pub const MAX_DEBUG_LEN: usize = 4096;

trait Structural {
    fn to_tree(&self, max_depth: usize) -> Result<Value, BoundError>;
}

impl<T: Serialize> Structural for T {
    fn to_tree(&self, max_depth: usize) -> Result<Value, BoundError> {
        bounded::to_bounded_value(self, max_depth)
    }
}

/// A borrowed, type-erased view of one logged value.
///
/// The view remembers the value's declared type name for sensitivity
/// classification, plus whichever renderings the type supports.
///
/// # Examples
///
/// ```
/// use service_instrument::{LogArg, RedactingSerializer};
///
/// let serializer = RedactingSerializer::default();
///
/// let page = 3_u32;
/// assert_eq!(serializer.serialize(&LogArg::new(&page)), "3");
///
/// let absent: Option<String> = None;
/// assert_eq!(serializer.serialize(&LogArg::new(&absent)), "null");
/// ```
///
/// # Locks
///
/// Structural rendering runs each type's `Serialize` impl, and serde's impls
/// for `Mutex` and `RwLock` take the lock before the depth bound is checked.
/// A graph that cycles back through a `Mutex` blocks forever on the second
/// lock. An `RwLock` cycle terminates only because repeated read locks
/// succeed while no writer is waiting. Capture lock-based graphs with
/// [`LogArg::opaque`], or with [`LogArg::debug_only`]: the standard `Debug`
/// impls use `try_lock` and print `<locked>` instead of blocking.
pub struct LogArg<'a> {
    type_name: &'static str,
    structural: Option<&'a (dyn Structural + Sync)>,
    text: Option<&'a (dyn fmt::Debug + Sync)>,
    opaque: bool,
}

impl<'a> LogArg<'a> {
    /// Captures a value with structural and `Debug` renderings.
    pub fn new<T>(value: &'a T) -> Self
    where
        T: Serialize + fmt::Debug + Sync,
    {
        Self {
            type_name: std::any::type_name::<T>(),
            structural: Some(value),
            text: Some(value),
            opaque: false,
        }
    }

    /// Captures a value that only implements `Serialize`.
    ///
    /// If structural rendering fails the value is logged as `null`.
    pub fn serialize_only<T>(value: &'a T) -> Self
    where
        T: Serialize + Sync,
    {
        Self {
            type_name: std::any::type_name::<T>(),
            structural: Some(value),
            text: None,
            opaque: false,
        }
    }

    /// Captures a value that cannot be traversed structurally.
    ///
    /// The value is logged through its `Debug` text.
    pub fn debug_only<T>(value: &'a T) -> Self
    where
        T: fmt::Debug + Sync,
    {
        Self {
            type_name: std::any::type_name::<T>(),
            structural: None,
            text: Some(value),
            opaque: false,
        }
    }

    /// Captures only the value's type; the value itself is never read.
    ///
    /// Renders as the path-free type name, or `[REDACTED]` if that name is
    /// sensitive.
    pub fn opaque<T: ?Sized>(_value: &'a T) -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
            structural: None,
            text: None,
            opaque: true,
        }
    }

    /// Returns the declared type name of the captured value.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for LogArg<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print the value itself here; it may be sensitive.
        f.debug_struct("LogArg")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

/// Converts logged values into bounded, redacted text.
///
/// # Examples
///
/// ```
/// use serde::Serialize;
/// use service_instrument::{LogArg, RedactingSerializer};
///
/// #[derive(Debug, Serialize)]
/// struct AccessToken(String);
///
/// let token = AccessToken("eyJhbGci...".to_string());
/// let text = RedactingSerializer::default().serialize(&LogArg::new(&token));
/// assert_eq!(text, "[REDACTED]");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedactingSerializer {
    max_depth: usize,
    pretty: bool,
}

impl RedactingSerializer {
    /// Creates a serializer with the default depth bound and compact output.
    pub fn new() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            pretty: false,
        }
    }

    /// Sets the container nesting rendered before truncation.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Switches to indented JSON output.
    pub fn pretty(mut self) -> Self {
        self.pretty = true;
        self
    }

    /// Returns the configured depth bound.
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Renders one captured value. Never fails.
    pub fn serialize(&self, arg: &LogArg<'_>) -> String {
        // Redaction must be decided before any traversal can fail.
        if is_sensitive_type_name(arg.type_name) {
            return REDACTED.to_string();
        }
        if arg.opaque {
            return short_type_name(arg.type_name);
        }

        if let Some(structural) = arg.structural {
            match self.render_structural(structural) {
                Ok(text) => return text,
                Err(reason) => tracing::debug!(
                    type_name = arg.type_name,
                    %reason,
                    "structural rendering failed, falling back"
                ),
            }
        }

        if let Some(text) = arg.text {
            match panic::catch_unwind(AssertUnwindSafe(|| render_debug(text, MAX_DEBUG_LEN))) {
                Ok(Some(text)) => return text,
                Ok(None) => tracing::debug!(
                    type_name = arg.type_name,
                    "Debug rendering failed, falling back"
                ),
                Err(_) => tracing::debug!(
                    type_name = arg.type_name,
                    "Debug rendering panicked, falling back"
                ),
            }
        }

        NULL.to_string()
    }

    /// Renders parameters positionally as `param1: .., param2: ..`.
    pub fn serialize_params(&self, params: &[LogArg<'_>]) -> String {
        params
            .iter()
            .enumerate()
            .map(|(i, arg)| format!("param{}: {}", i + 1, self.serialize(arg)))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn render_structural(&self, value: &(dyn Structural + Sync)) -> Result<String, String> {
        let tree = panic::catch_unwind(AssertUnwindSafe(|| value.to_tree(self.max_depth)))
            .map_err(|_| "Serialize impl panicked".to_string())?
            .map_err(|err| err.to_string())?;

        let text = if self.pretty {
            serde_json::to_string_pretty(&tree)
        } else {
            serde_json::to_string(&tree)
        };
        text.map_err(|err| err.to_string())
    }
}

impl Default for RedactingSerializer {
    fn default() -> Self {
        Self::new()
    }
}

/// Collects formatted text, failing once `limit` bytes have been written.
struct CappedWriter {
    text: String,
    limit: usize,
    truncated: bool,
}

impl fmt::Write for CappedWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let room = self.limit.saturating_sub(self.text.len());
        if s.len() <= room {
            self.text.push_str(s);
            return Ok(());
        }
        let mut end = room;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        self.text.push_str(&s[..end]);
        self.truncated = true;
        Err(fmt::Error)
    }
}

/// `Debug` text of `value`, cut to `limit` bytes plus [`TRUNCATED`].
/// `None` if the impl reported an error of its own.
fn render_debug(value: &(dyn fmt::Debug + Sync), limit: usize) -> Option<String> {
    let mut out = CappedWriter {
        text: String::new(),
        limit,
        truncated: false,
    };
    match fmt::write(&mut out, format_args!("{:?}", value)) {
        Ok(()) => Some(out.text),
        Err(_) if out.truncated => {
            out.text.push_str(TRUNCATED);
            Some(out.text)
        }
        Err(_) => None,
    }
}
