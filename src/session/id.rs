use rand::Rng;

use crate::error::{Result, SessionError};

/// Produces host session ids
pub type SessionIdSource = Box<dyn FnMut() -> String + Send>;

/// Random 4-digit channel id in `1000..=9999`.
///
/// Not coordinated with anyone; collisions surface as a registration failure.
pub fn generate_session_id() -> String {
    let id: u32 = rand::rng().random_range(1000..10000);
    id.to_string()
}

/// Clean up a user-supplied channel id.
///
/// Ids end up in signaling subjects, so only ASCII alphanumerics, `-` and `_`
/// are accepted.
pub fn normalize_session_id(input: &str) -> Result<String> {
    let id = input.trim();
    if id.is_empty()
        || !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(SessionError::InvalidSessionId(input.to_string()));
    }
    Ok(id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_four_digits() {
        for _ in 0..500 {
            let id = generate_session_id();
            assert_eq!(id.len(), 4);
            let value: u32 = id.parse().unwrap();
            assert!((1000..=9999).contains(&value));
        }
    }

    #[test]
    fn test_normalize_trims() {
        assert_eq!(normalize_session_id(" 4821 ").unwrap(), "4821");
        assert_eq!(normalize_session_id("0007").unwrap(), "0007");
    }

    #[test]
    fn test_normalize_rejects_subject_tokens() {
        assert!(normalize_session_id("").is_err());
        assert!(normalize_session_id("   ").is_err());
        assert!(normalize_session_id("48.21").is_err());
        assert!(normalize_session_id("4821>").is_err());
    }
}
