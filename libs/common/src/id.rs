use ulid::Ulid;

/// Generates a new ULID-based ID with the given prefix.
///
/// ULIDs sort lexicographically by creation time, so IDs generated in
/// sequence within one process are ordered.
///
/// # Examples
/// ```
/// let id = pairlink_common::id::prefixed_ulid("ses");
/// assert!(id.starts_with("ses_"));
/// ```
pub fn prefixed_ulid(prefix: &str) -> String {
    format!("{}_{}", prefix, Ulid::new().to_string())
}

/// Marker trait for types that represent a prefixed ID.
pub trait PrefixedId {
    const PREFIX: &'static str;

    fn generate() -> String {
        prefixed_ulid(Self::PREFIX)
    }
}

/// Well-known ID prefixes.
pub mod prefix {
    /// Pairing session.
    pub const SESSION: &str = "ses";
    /// Chat message within a session.
    pub const MESSAGE: &str = "msg";
    /// Live transport connection handle.
    pub const CONNECTION: &str = "conn";
}
