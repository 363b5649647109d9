//! Password digests and ticket minting.

use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::Sha256;
use subtle::ConstantTimeEq;

const SALT_BYTES: usize = 16;
const DIGEST_BYTES: usize = 32;
const TICKET_BYTES: usize = 32;

/// PBKDF2-HMAC-SHA256 iterations per password.
#[cfg(not(test))]
const ROUNDS: u32 = 600_000;
#[cfg(test)]
const ROUNDS: u32 = 1_000;

/// PBKDF2 digest of a password under a random salt, hex encoded for storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PasswordDigest {
    pub(crate) salt: String,
    pub(crate) digest: String,
}

impl PasswordDigest {
    /// Hashes `password` under a fresh random salt.
    pub(crate) fn create(password: &str) -> Self {
        let mut salt = [0_u8; SALT_BYTES];
        OsRng.fill_bytes(&mut salt);
        Self {
            salt: hex::encode(salt),
            digest: hex::encode(digest(&salt, password)),
        }
    }

    /// Compares `password` against the stored digest in constant time.
    ///
    /// Undecodable stored values never match.
    pub(crate) fn matches(salt: &str, stored: &str, password: &str) -> bool {
        let (Ok(salt), Ok(stored)) = (hex::decode(salt), hex::decode(stored)) else {
            return false;
        };
        bool::from(digest(&salt, password).as_slice().ct_eq(&stored))
    }
}

fn digest(salt: &[u8], password: &str) -> [u8; DIGEST_BYTES] {
    let mut output = [0_u8; DIGEST_BYTES];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, ROUNDS, &mut output);
    output
}

/// Mints an unguessable 256-bit ticket.
pub(crate) fn mint_ticket() -> String {
    let mut bytes = [0_u8; TICKET_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}
