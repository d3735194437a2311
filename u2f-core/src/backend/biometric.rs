use std::path::Path;
use std::sync::{Arc, Mutex};

use rand::rngs::OsRng;
use rand::Rng;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, warn};

use super::capture::{CaptureSource, ScanWorker, Template};
use super::{AuthenticatedCredential, BackendError, CredentialBackend, Enrollment, Signer};
use crate::app_id::AppId;
use crate::attestation::Attestation;
use crate::crypto::{self, KeySigner};
use crate::key_handle::KeyHandle;
use crate::private_key::PrivateKey;
use crate::Counter;

/// Match scores at or above this count as user presence, on the capture
/// stack's own scale.
const MATCH_THRESHOLD: i32 = 30;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS Handle (
    applicationHash BLOB,
    handle BLOB,
    privateKey BLOB,
    fingerprintTemplate BLOB,
    authCounter INTEGER DEFAULT 0,
    PRIMARY KEY (applicationHash, handle)
)";

/// Database backend gated by a fingerprint presence check.
///
/// Enrollment stores the template scanned in the current window with the
/// new record; authentication compares the live template against the
/// record's stored one. A scan opens on wink or on any operation needing
/// presence and self-cancels after a few seconds.
pub struct BiometricBackend {
    conn: Mutex<Connection>,
    attestation: Attestation,
    scanner: Arc<dyn CaptureSource>,
    worker: ScanWorker,
}

impl BiometricBackend {
    pub fn open(
        path: impl AsRef<Path>,
        scanner: Arc<dyn CaptureSource>,
    ) -> Result<BiometricBackend, BackendError> {
        Self::with_connection(Connection::open(path)?, scanner)
    }

    pub fn open_in_memory(scanner: Arc<dyn CaptureSource>) -> Result<BiometricBackend, BackendError> {
        Self::with_connection(Connection::open_in_memory()?, scanner)
    }

    fn with_connection(
        conn: Connection,
        scanner: Arc<dyn CaptureSource>,
    ) -> Result<BiometricBackend, BackendError> {
        conn.execute(SCHEMA, [])?;
        let worker = ScanWorker::spawn(Arc::clone(&scanner))?;
        Ok(BiometricBackend {
            conn: Mutex::new(conn),
            attestation: Attestation::batch()?,
            scanner,
            worker,
        })
    }

    /// Compares the live template against the record's stored one. Missing
    /// templates and matcher failures read as absence, never as an error
    /// the host would treat as permanent.
    fn check_presence(&self, stored: Option<&Template>) -> bool {
        self.worker.request_scan();
        let live = match self.worker.peek_template() {
            Some(template) => template,
            None => return false,
        };
        let stored = match stored {
            Some(template) => template,
            None => return false,
        };
        match self.scanner.match_score(stored, &live) {
            Ok(score) if score >= MATCH_THRESHOLD => {
                debug!(score, "fingerprint matched");
                self.worker.take_template();
                self.worker.finish_scan();
                true
            }
            Ok(score) => {
                debug!(score, "fingerprints don't match");
                false
            }
            Err(err) => {
                warn!(%err, "fingerprint matching failed");
                false
            }
        }
    }
}

impl CredentialBackend for BiometricBackend {
    fn enroll(&self, application: &AppId) -> Result<Enrollment, BackendError> {
        // Scanner must be on; without a finger on it yet there is nothing
        // to bind the record to.
        self.worker.request_scan();
        let template = self
            .worker
            .peek_template()
            .ok_or(BackendError::UserNotPresent)?;

        let (private_key, public_key) = crypto::generate_keypair()?;
        let handle: KeyHandle = OsRng.gen();
        let scalar = private_key.to_scalar()?;

        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO Handle (applicationHash, handle, privateKey, fingerprintTemplate)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                application.as_ref(),
                handle.as_ref(),
                &scalar[..],
                &template[..]
            ],
        )?;
        drop(conn);

        // The scanned finger is spent on this enrollment.
        self.worker.take_template();
        self.worker.finish_scan();

        debug!(?application, "credential enrolled with fingerprint");
        Ok(Enrollment { handle, public_key })
    }

    fn authenticate(
        &self,
        application: &AppId,
        handle: &KeyHandle,
        check_presence: bool,
    ) -> Result<AuthenticatedCredential, BackendError> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                "UPDATE Handle SET authCounter = authCounter + 1
                 WHERE applicationHash = ?1 AND handle = ?2
                 RETURNING privateKey, authCounter, fingerprintTemplate",
                params![application.as_ref(), handle.as_ref()],
                |row| {
                    Ok((
                        row.get::<_, Vec<u8>>(0)?,
                        row.get::<_, Counter>(1)?,
                        row.get::<_, Option<Vec<u8>>>(2)?,
                    ))
                },
            )
            .optional()?;
        drop(conn);
        let (scalar, counter, stored_template) = row.ok_or(BackendError::UnknownKeyHandle)?;

        let user_present = check_presence && self.check_presence(stored_template.as_ref());

        let key = PrivateKey::from_scalar(&scalar)?;
        Ok(AuthenticatedCredential {
            signer: Box::new(KeySigner::new(key)),
            counter,
            user_present,
        })
    }

    fn attestation_signer(&self) -> Result<Box<dyn Signer>, BackendError> {
        Ok(Box::new(self.attestation.signer()))
    }

    fn supports_wink(&self) -> bool {
        true
    }

    /// Turns the fingerprint scanners on; a blinking reader is the wink.
    fn wink(&self) {
        self.worker.request_scan();
    }
}
