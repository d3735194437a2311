use openssl::error::ErrorStack;
use openssl::symm::{Cipher, Crypter, Mode};
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

const KEY_DERIVATION_SALT: &[u8] = b"U2F Device Library";

/// application hash (32) followed by the private key scalar (32)
const HANDLE_PLAINTEXT_LEN: usize = 64;

/// Stateless backend: the handle carries the application hash and private
/// key, AES-256-CBC encrypted under a password-derived key. No storage is
/// needed, and any instance constructed with the same password can service
/// handles it never issued. The counter is the wall clock.
pub struct StatelessBackend {
    aes_key: [u8; 32],
    attestation: Attestation,
}

impl StatelessBackend {
    pub fn new(password: &str) -> Result<StatelessBackend, BackendError> {
        Ok(StatelessBackend {
            aes_key: crypto::sha256(&[KEY_DERIVATION_SALT, password.as_bytes()]),
            attestation: Attestation::batch()?,
        })
    }

    /// Raw CBC, no padding: the plaintext is exactly four blocks, and a
    /// padded handle would leak that it came from this backend.
    fn cbc(&self, mode: Mode, iv: &[u8], data: &[u8]) -> Result<Vec<u8>, ErrorStack> {
        let cipher = Cipher::aes_256_cbc();
        let mut crypter = Crypter::new(cipher, mode, &self.aes_key, Some(iv))?;
        crypter.pad(false);
        let mut out = vec![0u8; data.len() + cipher.block_size()];
        let mut written = crypter.update(data, &mut out)?;
        written += crypter.finalize(&mut out[written..])?;
        out.truncate(written);
        Ok(out)
    }
}

impl CredentialBackend for StatelessBackend {
    fn enroll(&self, application: &AppId) -> Result<Enrollment, BackendError> {
        let (private_key, public_key) = crypto::generate_keypair()?;
        let mut plaintext = Vec::with_capacity(HANDLE_PLAINTEXT_LEN);
        plaintext.extend_from_slice(application.as_ref());
        plaintext.extend_from_slice(&private_key.to_scalar()?);

        // The application hash doubles as the IV, so equal keys under
        // different applications still produce unrelated handles.
        let iv = &application.as_ref()[..16];
        let handle = self.cbc(Mode::Encrypt, iv, &plaintext)?;
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
        if handle.len() != HANDLE_PLAINTEXT_LEN {
            debug!(len = handle.len(), "handle has the wrong size");
            return Err(BackendError::UnknownKeyHandle);
        }
        let iv = &application.as_ref()[..16];
        let plaintext = self.cbc(Mode::Decrypt, iv, handle.as_ref())?;
        if !AppId::from_bytes(&plaintext[..32]).eq_consttime(application) {
            debug!("application hash check failed");
            return Err(BackendError::UnknownKeyHandle);
        }
        let key = PrivateKey::from_scalar(&plaintext[32..])?;
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
