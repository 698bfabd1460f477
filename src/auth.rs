//! Credential store: registration and authentication over [`Database`].

use crate::db::models::UserRecord;
use crate::db::{Database, StoreError};
use crate::error::AppError;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use pbkdf2::pbkdf2_hmac;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use tracing::{debug, info};

const SCHEME: &str = "pbkdf2-sha256";
const PBKDF2_ITERATIONS: u32 = 100_000;
const SALT_SIZE: usize = 16;
const KEY_SIZE: usize = 32;

/// Encode as `pbkdf2-sha256$<iterations>$<salt>$<hash>`.
pub fn hash_password(password: &str) -> String {
    let mut salt = [0u8; SALT_SIZE];
    OsRng.fill_bytes(&mut salt);
    hash_with(password, &salt, PBKDF2_ITERATIONS)
}

fn hash_with(password: &str, salt: &[u8], iterations: u32) -> String {
    let mut derived = [0u8; KEY_SIZE];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut derived);
    format!(
        "{}${}${}${}",
        SCHEME,
        iterations,
        BASE64.encode(salt),
        BASE64.encode(derived)
    )
}

/// Check `password` against a stored value.
///
/// Values without the scheme prefix are legacy plaintext and compare directly.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let mut parts = stored.split('$');
    if parts.next() != Some(SCHEME) {
        return constant_time_eq(password.as_bytes(), stored.as_bytes());
    }
    let (Some(iterations), Some(salt), Some(expected), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    let (Ok(iterations), Ok(salt)) = (iterations.parse::<u32>(), BASE64.decode(salt)) else {
        return false;
    };
    let recomputed = hash_with(password, &salt, iterations);
    let recomputed_hash = recomputed.rsplit('$').next().unwrap_or_default();
    constant_time_eq(recomputed_hash.as_bytes(), expected.as_bytes())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

pub fn register(db: &Database, username: &str, password: &str, name: &str) -> Result<(), AppError> {
    let username = username.trim();
    if username.is_empty() || password.is_empty() {
        return Err(AppError::InvalidInput(
            "Username and password are required".to_string(),
        ));
    }
    match db.insert_user(username, &hash_password(password), name.trim()) {
        Ok(()) => {
            info!(username, "registered user");
            Ok(())
        }
        Err(StoreError::DuplicateUsername(_)) => Err(AppError::DuplicateUsername),
        Err(err) => Err(err.into()),
    }
}

/// Look up the user and verify the password; legacy plaintext rows are
/// upgraded to a hash on successful login.
pub fn authenticate(db: &Database, username: &str, password: &str) -> Result<UserRecord, AppError> {
    let user = db
        .find_user(username.trim())?
        .ok_or(AppError::AuthFailure)?;
    if !verify_password(password, &user.password) {
        debug!(username = %user.username, "password mismatch");
        return Err(AppError::AuthFailure);
    }
    if !user.password.starts_with(SCHEME) {
        db.set_password(&user.username, &hash_password(password))?;
        info!(username = %user.username, "upgraded legacy password");
    }
    Ok(user)
}
