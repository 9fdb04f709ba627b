// Object names and uids.
use thiserror::Error;

/// Maximum length of a DNS-1123 label.
pub const MAX_NAME_LENGTH: usize = 63;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NameError {
    #[error("name must not be empty")]
    Empty,
    #[error("name '{0}' is longer than 63 characters")]
    TooLong(String),
    #[error("name '{0}' must consist of lower case alphanumeric characters or '-', and must start and end with an alphanumeric character")]
    InvalidCharacters(String),
}

pub fn generate_uid() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Checks that `name` is a valid DNS-1123 label.
pub fn validate_name(name: &str) -> Result<(), NameError> {
    if name.is_empty() {
        return Err(NameError::Empty);
    }
    if name.len() > MAX_NAME_LENGTH {
        return Err(NameError::TooLong(name.to_string()));
    }
    let bytes = name.as_bytes();
    let edge_ok = |b: u8| b.is_ascii_lowercase() || b.is_ascii_digit();
    let body_ok = bytes.iter().all(|&b| edge_ok(b) || b == b'-');
    if !body_ok || !edge_ok(bytes[0]) || !edge_ok(bytes[bytes.len() - 1]) {
        return Err(NameError::InvalidCharacters(name.to_string()));
    }
    Ok(())
}

pub fn is_valid_name(name: &str) -> bool {
    validate_name(name).is_ok()
}

/// Normalises arbitrary input into a DNS-1123 label.
///
/// Upper case is folded, every other disallowed character becomes `-`, runs of
/// `-` collapse, and the result is truncated to [`MAX_NAME_LENGTH`] without a
/// trailing `-`.
pub fn to_dns_label(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        let c = c.to_ascii_lowercase();
        let c = if c.is_ascii_lowercase() || c.is_ascii_digit() {
            c
        } else {
            '-'
        };
        if c == '-' && (out.is_empty() || out.ends_with('-')) {
            continue;
        }
        out.push(c);
    }
    out.truncate(MAX_NAME_LENGTH);
    while out.ends_with('-') {
        out.pop();
    }
    out
}
