//! Salted PBKDF2-HMAC-SHA256 password hashes.

use pbkdf2::pbkdf2_hmac;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;

use crate::auth::token::constant_time_eq;
use crate::constants::{PASSWORD_HASH_LENGTH, PASSWORD_HASH_ROUNDS, PASSWORD_SALT_LENGTH};
use crate::models::PasswordHash;

fn derive(password: &str, salt: &[u8]) -> [u8; PASSWORD_HASH_LENGTH] {
    let mut out = [0u8; PASSWORD_HASH_LENGTH];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, PASSWORD_HASH_ROUNDS, &mut out);
    out
}

pub fn hash_password(password: &str) -> PasswordHash {
    let mut salt = [0u8; PASSWORD_SALT_LENGTH];
    OsRng.fill_bytes(&mut salt);
    PasswordHash {
        salt: hex::encode(salt),
        hash: hex::encode(derive(password, &salt)),
    }
}

/// Returns false for a mismatch and for a malformed stored hash alike.
pub fn verify_password(password: &str, stored: &PasswordHash) -> bool {
    let (Ok(salt), Ok(expected)) = (hex::decode(&stored.salt), hex::decode(&stored.hash)) else {
        return false;
    };
    constant_time_eq(&derive(password, &salt), &expected)
}

/// Burns the same work as a real verification. Used when the identifier is
/// unknown so both failure paths cost the same.
pub fn burn_verification(password: &str) {
    std::hint::black_box(derive(password, &[0u8; PASSWORD_SALT_LENGTH]));
}
