use std::fmt::{self, Debug};

use openssl::ec::EcKey;
use openssl::ecdsa::EcdsaSig;
use openssl::error::ErrorStack;
use openssl::pkey::Private;
use openssl::sha;

use crate::backend::{SignError, Signer};
use crate::private_key::PrivateKey;
use crate::public_key::PublicKey;

pub type Sha256Hash = [u8; 32];

/// SHA-256 over the concatenation of `parts`.
pub fn sha256(parts: &[&[u8]]) -> Sha256Hash {
    let mut hasher = sha::Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finish()
}

/// DER-encoded ECDSA signature, at most 73 bytes for P-256.
#[derive(Clone, PartialEq, Eq)]
pub struct Signature(Vec<u8>);

impl AsRef<[u8]> for Signature {
    fn as_ref(&self) -> &[u8] {
        self.0.as_ref()
    }
}

impl Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Signature({} bytes)", self.0.len())
    }
}

pub(crate) fn generate_keypair() -> Result<(PrivateKey, PublicKey), ErrorStack> {
    let private_key = PrivateKey::generate()?;
    let public_key = PublicKey::from_key(&private_key)?;
    Ok((private_key, public_key))
}

pub(crate) fn sign_digest(
    key: &EcKey<Private>,
    digest: &Sha256Hash,
) -> Result<Signature, SignError> {
    let sig = EcdsaSig::sign(digest, key).map_err(|_| SignError)?;
    Ok(Signature(sig.to_der().map_err(|_| SignError)?))
}

/// Signs prehashed buffers with an in-memory private key, optionally
/// carrying the DER certificate matching that key.
pub struct KeySigner {
    key: PrivateKey,
    certificate: Option<Vec<u8>>,
}

impl KeySigner {
    pub fn new(key: PrivateKey) -> KeySigner {
        KeySigner {
            key,
            certificate: None,
        }
    }

    pub fn with_certificate(key: PrivateKey, certificate: Vec<u8>) -> KeySigner {
        KeySigner {
            key,
            certificate: Some(certificate),
        }
    }
}

impl Signer for KeySigner {
    fn sign(&self, digest: &Sha256Hash) -> Result<Signature, SignError> {
        sign_digest(&self.key.0, digest)
    }

    fn certificate(&self) -> Option<&[u8]> {
        self.certificate.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_concatenates_parts() {
        assert_eq!(
            sha256(&[b"ab", b"cd"]),
            sha256(&[b"abcd"]),
        );
        // SHA-256 of the empty string
        assert_eq!(
            hex::encode(sha256(&[])),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn signatures_verify_under_the_public_key() {
        let (private_key, public_key) = generate_keypair().unwrap();
        let digest = sha256(&[b"message"]);
        let signature = KeySigner::new(private_key).sign(&digest).unwrap();
        assert!(signature.as_ref().len() <= 73);

        let parsed = EcdsaSig::from_der(signature.as_ref()).unwrap();
        assert!(parsed.verify(&digest, public_key.as_ec_key()).unwrap());
    }

    #[test]
    fn signature_does_not_verify_under_another_key() {
        let (private_key, _) = generate_keypair().unwrap();
        let (_, other_public) = generate_keypair().unwrap();
        let digest = sha256(&[b"message"]);
        let signature = KeySigner::new(private_key).sign(&digest).unwrap();

        let parsed = EcdsaSig::from_der(signature.as_ref()).unwrap();
        assert!(!parsed.verify(&digest, other_public.as_ec_key()).unwrap());
    }
}
