//! Type-name based sensitivity classification.
//!
//! A value is sensitive when the path-free form of its declared type name
//! contains one of [`SENSITIVE_MARKERS`], compared case-insensitively.
//! Classification never looks at field names or runtime contents.

/// Substrings that mark a type name as sensitive.
///
/// This list is compiled in and cannot be changed at runtime.
pub const SENSITIVE_MARKERS: &[&str] = &["password", "token", "secret", "key", "credential"];

/// Text substituted for any value classified as sensitive.
pub const REDACTED: &str = "[REDACTED]";

/// Returns `true` if `type_name` contains a sensitivity marker.
///
/// Module paths are stripped first, so `my_app::keys::Article` is not
/// sensitive while `my_app::ApiKey` is.
///
/// # Examples
///
/// ```
/// use service_instrument::is_sensitive_type_name;
///
/// assert!(is_sensitive_type_name("auth::AccessToken"));
/// assert!(is_sensitive_type_name("core::option::Option<auth::UserPassword>"));
/// assert!(!is_sensitive_type_name("keys::Article"));
/// ```
pub fn is_sensitive_type_name(type_name: &str) -> bool {
    let short = short_type_name(type_name).to_ascii_lowercase();
    SENSITIVE_MARKERS.iter().any(|marker| short.contains(marker))
}

/// Returns `true` if the declared type `T` is sensitive.
pub fn is_sensitive_type<T: ?Sized>() -> bool {
    is_sensitive_type_name(std::any::type_name::<T>())
}

/// Strips module paths from every segment of a type name.
///
/// `core::option::Option<alloc::string::String>` becomes `Option<String>`.
/// Punctuation (`<`, `>`, `&`, `,`, `[`, `;`, spaces) is preserved.
pub fn short_type_name(type_name: &str) -> String {
    let mut out = String::with_capacity(type_name.len());
    // Start of the path segment currently being accumulated in `out`.
    let mut segment_start = 0;
    let mut chars = type_name.chars().peekable();

    while let Some(c) = chars.next() {
        if c == ':' && chars.peek() == Some(&':') {
            chars.next();
            out.truncate(segment_start);
        } else if c.is_alphanumeric() || c == '_' {
            out.push(c);
        } else {
            out.push(c);
            segment_start = out.len();
        }
    }

    out
}
