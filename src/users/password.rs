use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use tracing::error;

/// Minimum accepted password length, counted in characters.
pub const MIN_PASSWORD_LEN: usize = 5;

pub fn meets_min_length(plain: &str) -> bool {
    plain.chars().count() >= MIN_PASSWORD_LEN
}

pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "password hashing failed");
            anyhow::anyhow!("password hashing failed: {e}")
        })?;
    Ok(hash.to_string())
}

pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "stored password hash is unreadable");
        anyhow::anyhow!("stored password hash is unreadable: {e}")
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_password_verifies() {
        let hash = hash_password("chimichurri-42").expect("hash");
        assert!(verify_password("chimichurri-42", &hash).expect("verify"));
    }

    #[test]
    fn wrong_password_is_rejected() {
        let hash = hash_password("lemon-posset").expect("hash");
        assert!(!verify_password("lime-posset", &hash).expect("verify"));
    }

    #[test]
    fn same_password_salts_to_different_hashes() {
        let first = hash_password("tarte-tatin").expect("hash");
        let second = hash_password("tarte-tatin").expect("hash");
        assert_ne!(first, second);
        assert!(verify_password("tarte-tatin", &first).expect("verify"));
        assert!(verify_password("tarte-tatin", &second).expect("verify"));
    }

    #[test]
    fn unreadable_stored_hash_is_an_error() {
        let err = verify_password("anything", "plaintext-left-in-column").unwrap_err();
        assert!(err.to_string().contains("unreadable"));
    }

    #[test]
    fn min_length_counts_characters_not_bytes() {
        assert!(!meets_min_length(""));
        assert!(!meets_min_length("abcd"));
        assert!(meets_min_length("abcde"));
        // 4 characters but 6 bytes
        assert!(!meets_min_length("œufs"));
        // 5 characters but 6 bytes
        assert!(meets_min_length("crêpe"));
    }
}
