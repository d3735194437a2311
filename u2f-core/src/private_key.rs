use std::fmt::{self, Debug};

use openssl::bn::{BigNum, BigNumContext};
use openssl::ec::{EcGroup, EcKey, EcPoint};
use openssl::error::ErrorStack;
use openssl::nid::Nid;
use openssl::pkey::Private;

/// secp256r1 private key backing a credential or the attestation batch.
pub struct PrivateKey(pub(crate) EcKey<Private>);

impl PrivateKey {
    /// Generates a fresh P-256 key.
    pub fn generate() -> Result<PrivateKey, ErrorStack> {
        let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1)?;
        Ok(PrivateKey(EcKey::generate(&group)?))
    }

    /// Rebuilds a key from its raw 32-byte big-endian scalar, recomputing
    /// the public point.
    pub fn from_scalar(bytes: &[u8]) -> Result<PrivateKey, ErrorStack> {
        let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1)?;
        let scalar = BigNum::from_slice(bytes)?;
        let ctx = BigNumContext::new()?;
        let mut point = EcPoint::new(&group)?;
        point.mul_generator(&group, &scalar, &ctx)?;
        Ok(PrivateKey(EcKey::from_private_components(
            &group, &scalar, &point,
        )?))
    }

    /// Raw 32-byte big-endian scalar, as stored in handles and records.
    pub fn to_scalar(&self) -> Result<[u8; 32], ErrorStack> {
        let padded = self.0.private_key().to_vec_padded(32)?;
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&padded);
        Ok(bytes)
    }
}

impl Clone for PrivateKey {
    fn clone(&self) -> PrivateKey {
        PrivateKey(self.0.clone())
    }
}

impl Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "PrivateKey")
    }
}
