//! Password digests.
//!
//! Passwords are stored as PBKDF2-HMAC-SHA256 digests with a random salt,
//! encoded as `pbkdf2-sha256$<iterations>$<salt>$<digest>`.

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;

use super::constant_time_eq;

const SCHEME: &str = "pbkdf2-sha256";
const ITERATIONS: u32 = 10_000;
const SALT_LEN: usize = 16;

/// Hash a password with a fresh random salt.
pub fn hash_password(password: &str) -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    let digest = pbkdf2(password.as_bytes(), &salt, ITERATIONS);
    format!(
        "{}${}${}${}",
        SCHEME,
        ITERATIONS,
        STANDARD_NO_PAD.encode(salt),
        STANDARD_NO_PAD.encode(digest)
    )
}

/// Check `password` against a stored digest in constant time.
///
/// An unparsable digest never matches but still costs one full derivation.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((iterations, salt, expected)) = parse(stored) else {
        pbkdf2(password.as_bytes(), &[0u8; SALT_LEN], ITERATIONS);
        return false;
    };
    let actual = pbkdf2(password.as_bytes(), &salt, iterations);
    constant_time_eq(&actual, &expected)
}

fn parse(stored: &str) -> Option<(u32, Vec<u8>, Vec<u8>)> {
    let mut parts = stored.split('$');
    if parts.next()? != SCHEME {
        return None;
    }
    let iterations = parts.next()?.parse().ok().filter(|n| *n > 0)?;
    let salt = STANDARD_NO_PAD.decode(parts.next()?).ok()?;
    let digest = STANDARD_NO_PAD.decode(parts.next()?).ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((iterations, salt, digest))
}

fn pbkdf2(password: &[u8], salt: &[u8], iterations: u32) -> [u8; 32] {
    let mut output = [0u8; 32];
    pbkdf2_hmac::<Sha256>(password, salt, iterations, &mut output);
    output
}
