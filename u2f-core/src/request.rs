use thiserror::Error;

use crate::app_id::AppId;
use crate::key_handle::KeyHandle;
use crate::Challenge;

const INS_REGISTER: u8 = 0x01;
const INS_AUTHENTICATE: u8 = 0x02;
const INS_VERSION: u8 = 0x03;

const AUTH_ENFORCE: u8 = 0x03; // Enforce user presence and sign
const AUTH_CHECK_ONLY: u8 = 0x07; // Check only
const AUTH_DONT_ENFORCE: u8 = 0x08; // Don't enforce user presence and sign

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthenticateControlCode {
    CheckOnly,
    EnforceUserPresenceAndSign,
    DontEnforceUserPresenceAndSign,
}

#[derive(Debug)]
pub enum Request {
    Register {
        application: AppId,
        challenge: Challenge,
    },
    Authenticate {
        application: AppId,
        challenge: Challenge,
        control_code: AuthenticateControlCode,
        key_handle: KeyHandle,
    },
    GetVersion,
}

#[derive(Debug, PartialEq, Eq, Error)]
pub enum RequestDecodeError {
    /// The bytes are not a decodable extended-length APDU at all; the
    /// transport reports this as an invalid parameter rather than a
    /// status word.
    #[error("request is not a valid extended-length APDU")]
    Envelope,

    #[error("unsupported class byte {0:#04x}")]
    ClaNotSupported(u8),

    #[error("unsupported instruction {0:#04x}")]
    InsNotSupported(u8),

    #[error("request length does not match its contents")]
    WrongLength,

    #[error("invalid authenticate control byte {0:#04x}")]
    InvalidControlByte(u8),
}

impl Request {
    /// Decodes the extended-length APDU envelope:
    /// `CLA INS P1 P2 [00 Lc1 Lc2 body] [Le1 Le2]`. Both the body and the
    /// expected-response length are optional; short APDUs are not
    /// supported.
    pub fn decode(data: &[u8]) -> Result<Request, RequestDecodeError> {
        if data.len() < 4 {
            return Err(RequestDecodeError::Envelope);
        }
        let cla = data[0];
        let ins = data[1];
        let p1 = data[2];
        let _p2 = data[3];

        let body: &[u8] = if data.len() == 4 {
            // Valid request with an empty body and no length fields.
            &[]
        } else if data.len() < 7 {
            return Err(RequestDecodeError::Envelope);
        } else {
            if data[4] != 0 {
                return Err(RequestDecodeError::Envelope);
            }
            if data.len() == 7 {
                // Only Le is present. A value of 0 means 65536, but the
                // responses here never approach either bound.
                &[]
            } else {
                let body_len = usize::from(data[5]) << 8 | usize::from(data[6]);
                if data.len() == 7 + body_len {
                    &data[7..]
                } else if data.len() == 7 + body_len + 2 {
                    &data[7..7 + body_len]
                } else {
                    return Err(RequestDecodeError::Envelope);
                }
            }
        };

        if cla != 0 {
            return Err(RequestDecodeError::ClaNotSupported(cla));
        }

        match ins {
            INS_REGISTER => {
                // challenge parameter [32] || application parameter [32]
                if body.len() != 64 {
                    return Err(RequestDecodeError::WrongLength);
                }
                Ok(Request::Register {
                    challenge: Challenge::from_bytes(&body[..32]),
                    application: AppId::from_bytes(&body[32..64]),
                })
            }
            INS_AUTHENTICATE => {
                let control_code = match p1 {
                    AUTH_CHECK_ONLY => AuthenticateControlCode::CheckOnly,
                    AUTH_ENFORCE => AuthenticateControlCode::EnforceUserPresenceAndSign,
                    AUTH_DONT_ENFORCE => AuthenticateControlCode::DontEnforceUserPresenceAndSign,
                    byte => return Err(RequestDecodeError::InvalidControlByte(byte)),
                };
                // challenge [32] || application [32] || handle length [1] || handle
                if body.len() < 65 {
                    return Err(RequestDecodeError::WrongLength);
                }
                let handle_len = usize::from(body[64]);
                if body.len() != 65 + handle_len {
                    return Err(RequestDecodeError::WrongLength);
                }
                Ok(Request::Authenticate {
                    challenge: Challenge::from_bytes(&body[..32]),
                    application: AppId::from_bytes(&body[32..64]),
                    control_code,
                    key_handle: KeyHandle::from(&body[65..]),
                })
            }
            INS_VERSION => Ok(Request::GetVersion),
            ins => Err(RequestDecodeError::InsNotSupported(ins)),
        }
    }
}
