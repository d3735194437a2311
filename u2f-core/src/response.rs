use byteorder::{BigEndian, WriteBytesExt};

use crate::crypto::Signature;
use crate::key_handle::KeyHandle;
use crate::{user_presence_byte, Counter, StatusCode};

#[derive(Debug)]
pub enum Response {
    Registration {
        user_public_key: Vec<u8>,
        key_handle: KeyHandle,
        attestation_certificate: Vec<u8>,
        signature: Signature,
    },
    Authentication {
        counter: Counter,
        signature: Signature,
        user_present: bool,
    },
    Version {
        version_string: String,
    },
    TestOfUserPresenceNotSatisfied,
    InvalidKeyHandle,
    WrongLength,
    ClaNotSupported,
    InsNotSupported,
}

impl Response {
    pub fn into_bytes(self) -> Vec<u8> {
        let mut bytes = Vec::new();
        match self {
            Response::Registration {
                user_public_key,
                key_handle,
                attestation_certificate,
                signature,
            } => {
                // A reserved byte [1 byte], which for legacy reasons has the
                // value 0x05.
                bytes.push(0x05);

                // The user public key [65 bytes], uncompressed x,y-representation
                // of a point on the P-256 NIST elliptic curve.
                bytes.extend_from_slice(&user_public_key);

                // A key handle length byte [1 byte], unsigned (range 0-255).
                bytes.push(key_handle.len() as u8);

                // The key handle [length specified in previous field].
                bytes.extend_from_slice(key_handle.as_ref());

                // An attestation certificate [variable length], X.509 DER.
                bytes.extend_from_slice(&attestation_certificate);

                // A signature [variable length, 71-73 bytes].
                bytes.extend_from_slice(signature.as_ref());

                StatusCode::NoError.write(&mut bytes);
            }
            Response::Authentication {
                counter,
                signature,
                user_present,
            } => {
                // A user presence byte [1 byte].
                bytes.push(user_presence_byte(user_present));

                // A counter [4 bytes, big-endian].
                bytes.write_u32::<BigEndian>(counter).unwrap();

                // A signature [variable length, 71-73 bytes].
                bytes.extend_from_slice(signature.as_ref());

                StatusCode::NoError.write(&mut bytes);
            }
            Response::Version { version_string } => {
                // Raw ASCII, without quotes or any NUL terminator.
                bytes.extend_from_slice(version_string.as_bytes());
                StatusCode::NoError.write(&mut bytes);
            }
            Response::TestOfUserPresenceNotSatisfied => {
                StatusCode::ConditionsNotSatisfied.write(&mut bytes);
            }
            Response::InvalidKeyHandle => {
                StatusCode::WrongData.write(&mut bytes);
            }
            Response::WrongLength => {
                StatusCode::WrongLength.write(&mut bytes);
            }
            Response::ClaNotSupported => {
                StatusCode::ClaNotSupported.write(&mut bytes);
            }
            Response::InsNotSupported => {
                StatusCode::InsNotSupported.write(&mut bytes);
            }
        }
        bytes
    }
}
