// Signing keys. Decodes the caller's secret (bech32 `nsec` or raw hex),
// fills in `pubkey`/`id`/`sig` on events and verifies signed events.

use std::fmt;
use std::str::FromStr;

use bech32::{Bech32, Hrp};
use secp256k1::{schnorr, Keypair, Message, SecretKey, XOnlyPublicKey, SECP256K1};
use thiserror::Error;

use crate::auth::{Event, Signer, SignerError};

const NSEC: &str = "nsec";
const NPUB: Hrp = Hrp::parse_unchecked("npub");
const SECRET_KEY_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("secret key is empty")]
    Empty,

    #[error("invalid bech32 key: {0}")]
    Bech32(#[from] bech32::DecodeError),

    #[error("expected a `{expected}` key, got `{found}`")]
    WrongPrefix { expected: &'static str, found: String },

    #[error("expected {expected} bytes of key material, got {found}")]
    InvalidLength { expected: usize, found: usize },

    #[error("invalid hex key: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    #[error("invalid secret key: {0}")]
    InvalidSecretKey(#[source] secp256k1::Error),

    #[error("invalid public key: {0}")]
    InvalidPublicKey(#[source] secp256k1::Error),

    #[error("invalid signature: {0}")]
    InvalidSignature(#[source] secp256k1::Error),

    #[error("event id does not match its content")]
    IdMismatch,

    #[error("failed to encode npub: {0}")]
    Encode(String),
}

/// A secp256k1 keypair used to sign HTTP auth events.
#[derive(Clone)]
pub struct Keys {
    keypair: Keypair,
}

impl Keys {
    /// Parses an `nsec1...` string or a 64 character hex secret key.
    pub fn parse(secret: &str) -> Result<Self, KeyError> {
        let secret = secret.trim();
        if secret.is_empty() {
            return Err(KeyError::Empty);
        }
        if secret.chars().all(|c| c.is_ascii_hexdigit()) {
            let bytes = hex::decode(secret)?;
            return Self::from_bytes(&bytes);
        }

        let (hrp, bytes) = bech32::decode(secret)?;
        if !hrp.as_str().eq_ignore_ascii_case(NSEC) {
            return Err(KeyError::WrongPrefix {
                expected: NSEC,
                found: hrp.as_str().to_string(),
            });
        }
        Self::from_bytes(&bytes)
    }

    /// Fresh random keys.
    pub fn generate() -> Self {
        loop {
            let bytes: [u8; SECRET_KEY_LEN] = rand::random();
            if let Ok(keys) = Self::from_bytes(&bytes) {
                return keys;
            }
        }
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        if bytes.len() != SECRET_KEY_LEN {
            return Err(KeyError::InvalidLength {
                expected: SECRET_KEY_LEN,
                found: bytes.len(),
            });
        }
        let secret = SecretKey::from_slice(bytes).map_err(KeyError::InvalidSecretKey)?;
        Ok(Self {
            keypair: Keypair::from_secret_key(SECP256K1, &secret),
        })
    }

    pub fn public_key(&self) -> XOnlyPublicKey {
        self.keypair.x_only_public_key().0
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key().serialize())
    }

    pub fn npub(&self) -> Result<String, KeyError> {
        bech32::encode::<Bech32>(NPUB, &self.public_key().serialize())
            .map_err(|e| KeyError::Encode(e.to_string()))
    }

    /// Sets `pubkey`, then `id` over the canonical form, then `sig`.
    pub fn sign(&self, event: &mut Event) -> Result<(), KeyError> {
        event.pubkey = self.public_key_hex();
        let digest = event.digest();
        event.id = hex::encode(digest);

        let aux: [u8; 32] = rand::random();
        let sig = SECP256K1.sign_schnorr_with_aux_rand(&Message::from_digest(digest), &self.keypair, &aux);
        event.sig = sig.to_string();
        Ok(())
    }
}

impl fmt::Debug for Keys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keys")
            .field("public_key", &self.public_key_hex())
            .finish_non_exhaustive()
    }
}

impl Signer for Keys {
    fn sign_event(&self, event: &mut Event) -> Result<(), SignerError> {
        self.sign(event)?;
        Ok(())
    }
}

impl Event {
    /// Checks that `id` matches the content and `sig` is valid for `pubkey`.
    pub fn verify(&self) -> Result<(), KeyError> {
        let digest = self.digest();
        if hex::encode(digest) != self.id {
            return Err(KeyError::IdMismatch);
        }
        let pubkey = XOnlyPublicKey::from_str(&self.pubkey).map_err(KeyError::InvalidPublicKey)?;
        let sig = schnorr::Signature::from_str(&self.sig).map_err(KeyError::InvalidSignature)?;
        SECP256K1
            .verify_schnorr(&sig, &Message::from_digest(digest), &pubkey)
            .map_err(KeyError::InvalidSignature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // NIP-19 test vector.
    const NSEC_VECTOR: &str = "nsec1vl029mgpspedva04g90vltkh6fvh240zqtv9k0t9af8935ke9laqsnlfe5";
    const HEX_VECTOR: &str = "67dea2ed018072d675f5415ecfaed7d2597555e202d85b3d65ea4e58d2d92ffa";

    fn bech32_with(hrp: &str, data: &[u8]) -> String {
        bech32::encode::<Bech32>(Hrp::parse(hrp).unwrap(), data).unwrap()
    }

    #[test]
    fn nsec_and_hex_decode_to_the_same_key() {
        let from_nsec = Keys::parse(NSEC_VECTOR).unwrap();
        let from_hex = Keys::parse(HEX_VECTOR).unwrap();
        assert_eq!(from_nsec.public_key_hex(), from_hex.public_key_hex());
        assert!(from_nsec.npub().unwrap().starts_with("npub1"));
    }

    #[test]
    fn empty_secret_is_rejected() {
        assert!(matches!(Keys::parse("   "), Err(KeyError::Empty)));
    }

    #[test]
    fn npub_is_not_accepted_as_secret() {
        let npub = bech32_with("npub", &[7u8; 32]);
        let err = Keys::parse(&npub).unwrap_err();
        assert!(matches!(err, KeyError::WrongPrefix { expected: "nsec", ref found } if found == "npub"));
    }

    #[test]
    fn short_key_material_is_rejected() {
        let short = bech32_with("nsec", &[7u8; 16]);
        let err = Keys::parse(&short).unwrap_err();
        assert!(matches!(err, KeyError::InvalidLength { expected: 32, found: 16 }));

        let err = Keys::parse("abcd").unwrap_err();
        assert!(matches!(err, KeyError::InvalidLength { found: 2, .. }));
    }

    #[test]
    fn garbage_is_a_bech32_error() {
        assert!(matches!(Keys::parse("nsec1notvalid"), Err(KeyError::Bech32(_))));
    }

    #[test]
    fn zero_key_is_invalid() {
        let err = Keys::parse(&"0".repeat(64)).unwrap_err();
        assert!(matches!(err, KeyError::InvalidSecretKey(_)));
    }

    #[test]
    fn signed_event_verifies_and_tamper_is_detected() {
        let keys = Keys::generate();
        let mut event = Event::http_auth("DELETE", "https://nostr.build/api/v2/nip96/upload/a.png", 1_700_000_000);
        keys.sign(&mut event).unwrap();
        assert_eq!(event.pubkey, keys.public_key_hex());
        assert_eq!(event.id.len(), 64);
        assert_eq!(event.sig.len(), 128);
        event.verify().unwrap();

        let mut tampered = event.clone();
        tampered.tags[0][1] = "https://nostr.build/api/v2/nip96/upload/b.png".into();
        assert!(matches!(tampered.verify(), Err(KeyError::IdMismatch)));

        let mut forged = event.clone();
        forged.pubkey = Keys::generate().public_key_hex();
        forged.id = hex::encode(forged.digest());
        assert!(matches!(forged.verify(), Err(KeyError::InvalidSignature(_))));
    }

    #[test]
    fn debug_output_hides_the_secret() {
        let keys = Keys::parse(HEX_VECTOR).unwrap();
        let debug = format!("{:?}", keys);
        assert!(!debug.contains(HEX_VECTOR));
        assert!(debug.contains(&keys.public_key_hex()));
    }
}
