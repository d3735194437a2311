use tracing::debug;

use super::{
    wall_clock_counter, AuthenticatedCredential, BackendError, CredentialBackend, Enrollment,
    Signer,
};
use crate::app_id::AppId;
use crate::attestation::Attestation;
use crate::crypto::{self, KeySigner};
use crate::key_handle::KeyHandle;
use crate::private_key::PrivateKey;

/// The simplest working backend, for exercising the protocol only.
///
/// The handle is the application hash followed by the raw private key,
/// unencrypted: anyone holding a handle holds the key. The counter is the
/// wall clock.
pub struct UnsafeBackend {
    attestation: Attestation,
}

impl UnsafeBackend {
    pub fn new() -> Result<UnsafeBackend, BackendError> {
        Ok(UnsafeBackend {
            attestation: Attestation::batch()?,
        })
    }
}

impl CredentialBackend for UnsafeBackend {
    fn enroll(&self, application: &AppId) -> Result<Enrollment, BackendError> {
        let (private_key, public_key) = crypto::generate_keypair()?;
        let mut handle = Vec::with_capacity(64);
        handle.extend_from_slice(application.as_ref());
        handle.extend_from_slice(&private_key.to_scalar()?);
        Ok(Enrollment {
            handle: KeyHandle::from(&handle),
            public_key,
        })
    }

    fn authenticate(
        &self,
        application: &AppId,
        handle: &KeyHandle,
        _check_presence: bool,
    ) -> Result<AuthenticatedCredential, BackendError> {
        let bytes = handle.as_ref();
        if bytes.len() != 64 {
            return Err(BackendError::UnknownKeyHandle);
        }
        if !AppId::from_bytes(&bytes[..32]).eq_consttime(application) {
            debug!("handle was issued under a different application");
            return Err(BackendError::UnknownKeyHandle);
        }
        let key = PrivateKey::from_scalar(&bytes[32..])?;
        Ok(AuthenticatedCredential {
            signer: Box::new(KeySigner::new(key)),
            counter: wall_clock_counter(),
            user_present: true,
        })
    }

    fn attestation_signer(&self) -> Result<Box<dyn Signer>, BackendError> {
        Ok(Box::new(self.attestation.signer()))
    }

    fn supports_wink(&self) -> bool {
        true
    }

    fn wink(&self) {
        debug!(";)");
    }
}
