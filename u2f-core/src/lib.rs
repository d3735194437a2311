//! Device-side core of a U2F (FIDO 1.x) authenticator.
//!
//! [`U2f`] parses the ISO-7816-style APDU envelope, routes REGISTER,
//! AUTHENTICATE and VERSION requests, and serializes responses with their
//! trailing status word. Key material, counters and user presence are
//! delegated to a [`CredentialBackend`](backend::CredentialBackend) chosen
//! at construction time.

mod app_id;
mod attestation;
pub mod backend;
mod crypto;
mod key_handle;
mod private_key;
mod public_key;
mod request;
mod response;

pub use app_id::AppId;
pub use attestation::Attestation;
pub use backend::{
    AuthenticatedCredential, BackendError, CredentialBackend, Enrollment, SignError, Signer,
};
pub use crypto::{sha256, KeySigner, Sha256Hash, Signature};
pub use key_handle::{KeyHandle, MAX_KEY_HANDLE_LEN};
pub use private_key::PrivateKey;
pub use public_key::PublicKey;
pub use request::{AuthenticateControlCode, Request, RequestDecodeError};
pub use response::Response;

use byteorder::{BigEndian, WriteBytesExt};
use thiserror::Error;
use tracing::{debug, warn};

pub type Counter = u32;

pub const VERSION_STRING: &str = "U2F_V2";

const SW_NO_ERROR: u16 = 0x9000; // The command completed successfully without error.
const SW_CONDITIONS_NOT_SATISFIED: u16 = 0x6985; // The request was rejected due to test-of-user-presence being required.
const SW_WRONG_DATA: u16 = 0x6A80; // The request was rejected due to an invalid key handle.
const SW_WRONG_LENGTH: u16 = 0x6700; // The length of the request was invalid.
const SW_CLA_NOT_SUPPORTED: u16 = 0x6E00; // The Class byte of the request is not supported.
const SW_INS_NOT_SUPPORTED: u16 = 0x6D00; // The Instruction of the request is not supported.

#[derive(Debug)]
pub enum StatusCode {
    NoError,
    ConditionsNotSatisfied,
    WrongData,
    WrongLength,
    ClaNotSupported,
    InsNotSupported,
}

impl StatusCode {
    pub fn write<W: WriteBytesExt>(&self, write: &mut W) {
        let value = match self {
            StatusCode::NoError => SW_NO_ERROR,
            StatusCode::ConditionsNotSatisfied => SW_CONDITIONS_NOT_SATISFIED,
            StatusCode::WrongData => SW_WRONG_DATA,
            StatusCode::WrongLength => SW_WRONG_LENGTH,
            StatusCode::ClaNotSupported => SW_CLA_NOT_SUPPORTED,
            StatusCode::InsNotSupported => SW_INS_NOT_SUPPORTED,
        };
        write.write_u16::<BigEndian>(value).unwrap();
    }
}

/// Challenge parameter of a request, SHA-256 of the client data.
#[derive(Clone)]
pub struct Challenge([u8; 32]);

impl Challenge {
    pub fn from_bytes(slice: &[u8]) -> Challenge {
        assert_eq!(slice.len(), 32);
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(slice);
        Challenge(bytes)
    }
}

impl AsRef<[u8]> for Challenge {
    fn as_ref(&self) -> &[u8] {
        self.0.as_ref()
    }
}

impl std::fmt::Debug for Challenge {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "Challenge")
    }
}

/// The request was not a decodable APDU; there is no status word to answer
/// with and the transport reports a framing-level error instead.
#[derive(Debug, Error)]
#[error("request is not a decodable APDU")]
pub struct InvalidApdu;

/// User presence byte [1 byte]. Bit 0 indicates whether user presence was
/// verified; bits 1 through 7 are reserved and zero.
fn user_presence_byte(user_present: bool) -> u8 {
    u8::from(user_present)
}

/// The U2F application protocol over a pluggable credential backend.
pub struct U2f<B> {
    backend: B,
}

impl<B: CredentialBackend> U2f<B> {
    pub fn new(backend: B) -> U2f<B> {
        U2f { backend }
    }

    pub fn supports_wink(&self) -> bool {
        self.backend.supports_wink()
    }

    pub fn wink(&self) {
        self.backend.wink()
    }

    /// Processes one raw APDU into a raw response, status word included.
    pub fn process_apdu(&self, raw: &[u8]) -> Result<Vec<u8>, InvalidApdu> {
        let response = match Request::decode(raw) {
            Ok(request) => self.handle_request(request),
            Err(RequestDecodeError::Envelope) => {
                debug!("undecodable APDU envelope");
                return Err(InvalidApdu);
            }
            Err(RequestDecodeError::ClaNotSupported(cla)) => {
                debug!(cla, "unsupported class byte");
                Response::ClaNotSupported
            }
            Err(RequestDecodeError::InsNotSupported(ins)) => {
                debug!(ins, "unsupported instruction");
                Response::InsNotSupported
            }
            Err(RequestDecodeError::WrongLength) => Response::WrongLength,
            Err(RequestDecodeError::InvalidControlByte(byte)) => {
                debug!(byte, "invalid control byte");
                Response::InvalidKeyHandle
            }
        };
        Ok(response.into_bytes())
    }

    fn handle_request(&self, request: Request) -> Response {
        match request {
            Request::Register {
                application,
                challenge,
            } => self.register(&application, &challenge),
            Request::Authenticate {
                application,
                challenge,
                control_code,
                key_handle,
            } => self.authenticate(&application, &challenge, control_code, &key_handle),
            Request::GetVersion => Response::Version {
                version_string: String::from(VERSION_STRING),
            },
        }
    }

    fn register(&self, application: &AppId, challenge: &Challenge) -> Response {
        debug!(?application, "register");
        let enrollment = match self.backend.enroll(application) {
            Ok(enrollment) => enrollment,
            Err(err) => return backend_error_response(err),
        };
        let signer = match self.backend.attestation_signer() {
            Ok(signer) => signer,
            Err(err) => return backend_error_response(err),
        };
        let certificate = match signer.certificate() {
            Some(certificate) => certificate.to_vec(),
            None => {
                warn!("attestation signer has no certificate");
                return Response::TestOfUserPresenceNotSatisfied;
            }
        };

        let user_public_key = enrollment.public_key.to_raw();
        let digest = sha256(&[
            &[0u8], // reserved
            application.as_ref(),
            challenge.as_ref(),
            enrollment.handle.as_ref(),
            &user_public_key,
        ]);
        let signature = match signer.sign(&digest) {
            Ok(signature) => signature,
            Err(err) => {
                warn!(%err, "attestation signing failed");
                return Response::TestOfUserPresenceNotSatisfied;
            }
        };

        Response::Registration {
            user_public_key,
            key_handle: enrollment.handle,
            attestation_certificate: certificate,
            signature,
        }
    }

    fn authenticate(
        &self,
        application: &AppId,
        challenge: &Challenge,
        control_code: AuthenticateControlCode,
        key_handle: &KeyHandle,
    ) -> Response {
        debug!(?application, ?control_code, "authenticate");
        let check_presence = control_code != AuthenticateControlCode::CheckOnly;
        let credential = match self
            .backend
            .authenticate(application, key_handle, check_presence)
        {
            Ok(credential) => credential,
            Err(err) => return backend_error_response(err),
        };

        match control_code {
            // The handle is valid, which is all a check-only request asks.
            AuthenticateControlCode::CheckOnly => {
                return Response::TestOfUserPresenceNotSatisfied
            }
            AuthenticateControlCode::EnforceUserPresenceAndSign
                if !credential.user_present =>
            {
                debug!("user not present");
                return Response::TestOfUserPresenceNotSatisfied;
            }
            _ => {}
        }

        let mut header = Vec::with_capacity(5);
        header.push(user_presence_byte(credential.user_present));
        header.write_u32::<BigEndian>(credential.counter).unwrap();

        let digest = sha256(&[application.as_ref(), &header, challenge.as_ref()]);
        let signature = match credential.signer.sign(&digest) {
            Ok(signature) => signature,
            Err(err) => {
                warn!(%err, "signing failed");
                return Response::TestOfUserPresenceNotSatisfied;
            }
        };

        Response::Authentication {
            counter: credential.counter,
            signature,
            user_present: credential.user_present,
        }
    }
}

fn backend_error_response(err: BackendError) -> Response {
    match err {
        BackendError::UnknownKeyHandle => Response::InvalidKeyHandle,
        BackendError::UserNotPresent => Response::TestOfUserPresenceNotSatisfied,
        // Internal faults are reported as retryable so the host guides the
        // user to try again rather than treating the device as broken.
        err => {
            warn!(%err, "backend failure");
            Response::TestOfUserPresenceNotSatisfied
        }
    }
}
