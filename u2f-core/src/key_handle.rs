use std::fmt::{self, Debug};

use rand::distributions::{Distribution, Standard};
use rand::Rng;
use subtle::ConstantTimeEq;

pub const MAX_KEY_HANDLE_LEN: usize = 255;

/// Length of randomly generated handles. The database backends only need
/// uniqueness per record; 64 bytes is ample entropy for that.
const RANDOM_KEY_HANDLE_LEN: usize = 64;

/// Opaque credential identifier issued at registration. The host stores it
/// and presents it back at authentication; only the issuing backend can
/// interpret it.
#[derive(Clone, Eq, PartialEq)]
pub struct KeyHandle(Vec<u8>);

impl KeyHandle {
    pub fn from(bytes: &[u8]) -> KeyHandle {
        assert!(bytes.len() <= MAX_KEY_HANDLE_LEN);
        KeyHandle(bytes.to_vec())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn eq_consttime(&self, other: &KeyHandle) -> bool {
        self.0.ct_eq(&other.0).unwrap_u8() == 1
    }
}

impl AsRef<[u8]> for KeyHandle {
    fn as_ref(&self) -> &[u8] {
        self.0.as_ref()
    }
}

impl Distribution<KeyHandle> for Standard {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> KeyHandle {
        let mut bytes = vec![0u8; RANDOM_KEY_HANDLE_LEN];
        rng.fill_bytes(&mut bytes);
        KeyHandle(bytes)
    }
}

impl Debug for KeyHandle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "KeyHandle")
    }
}
