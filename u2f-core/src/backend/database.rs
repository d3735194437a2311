use std::path::Path;
use std::sync::Mutex;

use rand::rngs::OsRng;
use rand::Rng;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use super::{AuthenticatedCredential, BackendError, CredentialBackend, Enrollment, Signer};
use crate::app_id::AppId;
use crate::attestation::Attestation;
use crate::crypto::{self, KeySigner};
use crate::key_handle::KeyHandle;
use crate::private_key::PrivateKey;
use crate::Counter;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS Handle (
    applicationHash BLOB,
    handle BLOB,
    privateKey BLOB,
    authCounter INTEGER DEFAULT 0,
    PRIMARY KEY (applicationHash, handle)
)";

/// SQLite-persisted backend. Handles are opaque 64-byte random values and
/// carry no key material; records are keyed by (application hash, handle)
/// and each owns a strictly increasing authentication counter.
pub struct DatabaseBackend {
    conn: Mutex<Connection>,
    attestation: Attestation,
}

impl DatabaseBackend {
    pub fn open(path: impl AsRef<Path>) -> Result<DatabaseBackend, BackendError> {
        Self::with_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<DatabaseBackend, BackendError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<DatabaseBackend, BackendError> {
        conn.execute(SCHEMA, [])?;
        Ok(DatabaseBackend {
            conn: Mutex::new(conn),
            attestation: Attestation::batch()?,
        })
    }
}

impl CredentialBackend for DatabaseBackend {
    fn enroll(&self, application: &AppId) -> Result<Enrollment, BackendError> {
        let (private_key, public_key) = crypto::generate_keypair()?;
        let handle: KeyHandle = OsRng.gen();
        let scalar = private_key.to_scalar()?;

        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO Handle (applicationHash, handle, privateKey) VALUES (?1, ?2, ?3)",
            params![application.as_ref(), handle.as_ref(), &scalar[..]],
        )?;
        debug!(?application, "credential enrolled");
        Ok(Enrollment { handle, public_key })
    }

    fn authenticate(
        &self,
        application: &AppId,
        handle: &KeyHandle,
        _check_presence: bool,
    ) -> Result<AuthenticatedCredential, BackendError> {
        let conn = self.conn.lock().unwrap();
        // One statement, so concurrent authentications on the same record
        // can never observe the same counter value.
        let row = conn
            .query_row(
                "UPDATE Handle SET authCounter = authCounter + 1
                 WHERE applicationHash = ?1 AND handle = ?2
                 RETURNING privateKey, authCounter",
                params![application.as_ref(), handle.as_ref()],
                |row| Ok((row.get::<_, Vec<u8>>(0)?, row.get::<_, Counter>(1)?)),
            )
            .optional()?;
        let (scalar, counter) = row.ok_or(BackendError::UnknownKeyHandle)?;

        let key = PrivateKey::from_scalar(&scalar)?;
        debug!(counter, "credential authenticated");
        Ok(AuthenticatedCredential {
            signer: Box::new(KeySigner::new(key)),
            counter,
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
