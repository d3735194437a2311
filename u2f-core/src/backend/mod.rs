//! Pluggable credential backends.
//!
//! A backend decides how an (application, key handle) pair maps back to key
//! material and a monotonic counter: packed into the handle itself
//! ([`UnsafeBackend`], [`StatelessBackend`]) or persisted under an opaque
//! random handle ([`DatabaseBackend`], [`BiometricBackend`]).

mod biometric;
mod capture;
mod database;
mod stateless;
mod unsecure;

pub use biometric::BiometricBackend;
pub use capture::{
    CaptureError, CaptureEvent, CaptureFrame, CaptureSource, EventSink, Template,
};
pub use database::DatabaseBackend;
pub use stateless::StatelessBackend;
pub use unsecure::UnsafeBackend;

use std::io;
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;

use crate::app_id::AppId;
use crate::crypto::{Sha256Hash, Signature};
use crate::key_handle::KeyHandle;
use crate::public_key::PublicKey;
use crate::Counter;

/// Signs prehashed messages.
///
/// The indirection keeps the protocol layer ignorant of where the key
/// lives, so a hardware-backed key needs no protocol changes. Ownership is
/// single: the caller drops the signer after use.
pub trait Signer {
    fn sign(&self, digest: &Sha256Hash) -> Result<Signature, SignError>;

    /// DER certificate for the signing key, when one is bundled.
    fn certificate(&self) -> Option<&[u8]>;
}

#[derive(Debug, Error)]
#[error("signing failed")]
pub struct SignError;

/// A freshly enrolled credential.
#[derive(Debug)]
pub struct Enrollment {
    pub handle: KeyHandle,
    pub public_key: PublicKey,
}

/// A credential resolved by [`CredentialBackend::authenticate`], ready to
/// sign. The backend has already bumped the record's counter.
pub struct AuthenticatedCredential {
    pub signer: Box<dyn Signer>,
    pub counter: Counter,
    pub user_present: bool,
}

impl std::fmt::Debug for AuthenticatedCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticatedCredential")
            .field("signer", &"<dyn Signer>")
            .field("counter", &self.counter)
            .field("user_present", &self.user_present)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum BackendError {
    /// The handle does not decode or resolve under the presented application.
    #[error("unknown or foreign key handle")]
    UnknownKeyHandle,

    #[error("user presence could not be confirmed")]
    UserNotPresent,

    #[error("cryptographic operation failed")]
    Crypto(#[from] openssl::error::ErrorStack),

    #[error("credential store failure: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("biometric capture failure: {0}")]
    Capture(#[from] CaptureError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Strategy mapping an application identity and key handle back to a
/// private key and counter. Selection is a constructor-time decision; the
/// protocol layer only ever sees this trait.
pub trait CredentialBackend {
    /// Creates a credential bound to `application` and returns its handle
    /// and public key.
    fn enroll(&self, application: &AppId) -> Result<Enrollment, BackendError>;

    /// Resolves `handle` under `application`, increments the credential's
    /// counter, and returns a signer over its key. `check_presence` asks
    /// the backend to also observe user presence; backends without a
    /// presence source report the user present unconditionally.
    fn authenticate(
        &self,
        application: &AppId,
        handle: &KeyHandle,
        check_presence: bool,
    ) -> Result<AuthenticatedCredential, BackendError>;

    /// Signer over the batch attestation key, certificate included.
    fn attestation_signer(&self) -> Result<Box<dyn Signer>, BackendError>;

    fn supports_wink(&self) -> bool;

    /// User-visible acknowledgement requested by the host.
    fn wink(&self);
}

/// Counter for the backends that keep no per-record state. Monotonic only
/// while the wall clock is; the database backends persist a real counter.
pub(crate) fn wall_clock_counter() -> Counter {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as Counter)
        .unwrap_or(0)
}
