//! PBKDF2 password hashes for the users table.

use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;

pub const PBKDF2_ITERATIONS: u32 = 600_000;
const SCHEME: &str = "pbkdf2-sha256";
const SALT_LENGTH: usize = 16;
const HASH_LENGTH: usize = 32;

/// Hash a password as `pbkdf2-sha256$<iterations>$<salt hex>$<hash hex>`
pub fn hash_password(password: &str) -> String {
    hash_password_with_iterations(password, PBKDF2_ITERATIONS)
}

/// Same as [`hash_password`] with an explicit work factor
pub fn hash_password_with_iterations(password: &str, iterations: u32) -> String {
    let mut salt = [0u8; SALT_LENGTH];
    rand::thread_rng().fill_bytes(&mut salt);
    let hash = derive(password, &salt, iterations);
    format!("{}${}${}${}", SCHEME, iterations, to_hex(&salt), to_hex(&hash))
}

/// Check a password against a stored hash; malformed hashes never verify
pub fn verify_password(password: &str, stored: &str) -> bool {
    let parts: Vec<&str> = stored.split('$').collect();
    let [scheme, iterations, salt, expected] = parts.as_slice() else {
        return false;
    };
    if *scheme != SCHEME {
        return false;
    }
    let (Ok(iterations), Some(salt), Some(expected)) =
        (iterations.parse::<u32>(), from_hex(salt), from_hex(expected))
    else {
        return false;
    };
    if iterations == 0 || expected.len() != HASH_LENGTH {
        return false;
    }

    let actual = derive(password, &salt, iterations);
    // Constant-time comparison
    actual
        .iter()
        .zip(expected.iter())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

fn derive(password: &str, salt: &[u8], iterations: u32) -> [u8; HASH_LENGTH] {
    let mut hash = [0u8; HASH_LENGTH];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut hash);
    hash
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn from_hex(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 || !hex.is_ascii() {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).ok())
        .collect()
}
