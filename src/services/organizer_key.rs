use ring::hmac;
use ring::rand::SystemRandom;
use std::fmt;

#[derive(thiserror::Error, Debug)]
pub enum OrganizerKeyError {
    #[error("Organizer key must not be empty")]
    Empty,

    #[error("Failed to generate verification key")]
    KeyGeneration,
}

/// Verifies organizer keys presented on privileged requests.
///
/// The configured key is never compared directly: it is HMAC-tagged under a
/// per-process random key, and presented keys are checked with
/// `hmac::verify`, which runs in constant time.
#[derive(Clone)]
pub struct OrganizerKey {
    key: hmac::Key,
    tag: hmac::Tag,
}

impl OrganizerKey {
    pub fn new(secret: &str) -> Result<Self, OrganizerKeyError> {
        if secret.is_empty() {
            return Err(OrganizerKeyError::Empty);
        }

        let rng = SystemRandom::new();
        let key = hmac::Key::generate(hmac::HMAC_SHA256, &rng)
            .map_err(|_| OrganizerKeyError::KeyGeneration)?;
        let tag = hmac::sign(&key, secret.as_bytes());

        Ok(Self { key, tag })
    }

    pub fn verify(&self, presented: &str) -> bool {
        hmac::verify(&self.key, presented.as_bytes(), self.tag.as_ref()).is_ok()
    }
}

impl fmt::Debug for OrganizerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OrganizerKey([REDACTED])")
    }
}
