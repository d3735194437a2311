use std::fmt::{self, Debug};

use subtle::ConstantTimeEq;

/// SHA-256 of the relying party origin; binds a credential to a site.
#[derive(Copy, Clone, Eq, Hash, PartialEq)]
pub struct AppId([u8; 32]);

impl AppId {
    pub fn from_bytes(slice: &[u8]) -> AppId {
        assert_eq!(slice.len(), 32);
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(slice);
        AppId(bytes)
    }

    pub fn eq_consttime(&self, other: &AppId) -> bool {
        self.0.ct_eq(&other.0).unwrap_u8() == 1
    }
}

impl AsRef<[u8]> for AppId {
    fn as_ref(&self) -> &[u8] {
        self.0.as_ref()
    }
}

impl Debug for AppId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "AppId(")?;
        for byte in &self.0[..4] {
            write!(f, "{:02x}", byte)?;
        }
        write!(f, "..)")
    }
}
