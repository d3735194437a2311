use openssl::bn::BigNumContext;
use openssl::ec::{EcGroup, EcKey, EcPoint, PointConversionForm};
use openssl::error::ErrorStack;
use openssl::nid::Nid;
use openssl::pkey::Public;

use crate::private_key::PrivateKey;

pub(crate) const EC_POINT_FORMAT_UNCOMPRESSED: u8 = 0x04;

pub struct PublicKey(EcKey<Public>);

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PublicKey").field(&self.to_raw()).finish()
    }
}

impl PublicKey {
    pub(crate) fn from_key(key: &PrivateKey) -> Result<PublicKey, ErrorStack> {
        let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1)?;
        Ok(PublicKey(EcKey::from_public_key(
            &group,
            key.0.public_key(),
        )?))
    }

    /// Raw ANSI X9.62 formatted Elliptic Curve public key [SEC1].
    /// I.e. [0x04, X (32 bytes), Y (32 bytes)], where the byte 0x04 denotes
    /// the uncompressed point compression method.
    pub fn from_bytes(bytes: &[u8]) -> Result<PublicKey, String> {
        if bytes.len() != 65 {
            return Err(format!("Expected 65 bytes, found {}", bytes.len()));
        }
        if bytes[0] != EC_POINT_FORMAT_UNCOMPRESSED {
            return Err(String::from("Expected uncompressed point"));
        }
        let mut ctx = BigNumContext::new().map_err(|err| err.to_string())?;
        let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).map_err(|err| err.to_string())?;
        let point = EcPoint::from_bytes(&group, bytes, &mut ctx).map_err(|err| err.to_string())?;
        let key = EcKey::from_public_key(&group, &point).map_err(|err| err.to_string())?;
        Ok(PublicKey(key))
    }

    pub(crate) fn as_ec_key(&self) -> &EcKey<Public> {
        &self.0
    }

    /// Raw ANSI X9.62 uncompressed encoding, 65 bytes.
    pub fn to_raw(&self) -> Vec<u8> {
        let mut ctx = BigNumContext::new().unwrap();
        self.0
            .public_key()
            .to_bytes(self.0.group(), PointConversionForm::UNCOMPRESSED, &mut ctx)
            .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_encoding_round_trips() {
        let private = PrivateKey::generate().unwrap();
        let raw = PublicKey::from_key(&private).unwrap().to_raw();
        assert_eq!(raw.len(), 65);
        assert_eq!(raw[0], EC_POINT_FORMAT_UNCOMPRESSED);
        assert_eq!(PublicKey::from_bytes(&raw).unwrap().to_raw(), raw);
    }

    #[test]
    fn from_bytes_rejects_bad_lengths() {
        assert!(PublicKey::from_bytes(&[0x04; 64]).is_err());
    }
}
