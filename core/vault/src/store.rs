//! Vault container persistence and record-level encryption.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::{VaultContainer, VaultMetadata, VaultOptions, VaultSummary};
use crate::record::{Field, FieldValue, Record, RecordFields, StoredRecord};
use crate::session::KeySession;
use crate::timestamp;
use twinkey_common::{Error, RecordId, Result, ResultExt};
use twinkey_crypto::{decrypt, decrypt_from_b64, encrypt, encrypt_to_b64, SymmetricKey};
use twinkey_storage::StorageProvider;

/// Owner of the vault container.
///
/// The whole container is encrypted under the session's master key and
/// persisted as one blob. Record fields are encrypted a second time under
/// the data key. The decrypted container is cached after the first load and
/// replaced after every successful save.
pub struct VaultStore<'a> {
    session: &'a KeySession,
    provider: Arc<dyn StorageProvider>,
    options: VaultOptions,
    container: Option<VaultContainer>,
}

impl<'a> VaultStore<'a> {
    /// Create a store with default options.
    pub fn new(session: &'a KeySession, provider: Arc<dyn StorageProvider>) -> Self {
        Self::with_options(session, provider, VaultOptions::default())
    }

    /// Create a store with explicit options.
    pub fn with_options(
        session: &'a KeySession,
        provider: Arc<dyn StorageProvider>,
        options: VaultOptions,
    ) -> Self {
        Self {
            session,
            provider,
            options,
            container: None,
        }
    }

    /// Where the container is persisted.
    pub fn location(&self) -> String {
        self.provider.location()
    }

    /// Whether a non-empty vault blob exists.
    pub fn exists(&self) -> Result<bool> {
        self.provider.exists()
    }

    /// Create and persist an empty container.
    ///
    /// # Preconditions
    /// - Session keys are set
    /// - No vault exists at the provider location
    ///
    /// # Postconditions
    /// - An empty container is persisted under the master key and cached
    ///
    /// # Errors
    /// - `InvalidInput` if a vault already exists
    /// - `UninitializedKeys` if the session has no keys
    /// - `Persistence` if the blob cannot be written
    pub fn initialize(&mut self) -> Result<()> {
        if self.exists()? {
            return Err(Error::InvalidInput(format!(
                "Vault already exists at {}",
                self.location()
            )));
        }

        let container = VaultContainer::new(&self.options);
        self.save(Some(container))?;

        info!(
            provider = self.provider.name(),
            location = %self.location(),
            "Vault initialized"
        );
        Ok(())
    }

    /// Read and decrypt the container, replacing the cache.
    ///
    /// # Errors
    /// Wrapped in a "Cannot open vault" context whose kind is one of:
    /// - `UninitializedKeys` if the session has no keys
    /// - `VaultNotFound` if no vault exists
    /// - `Decryption` if the master key is wrong or the blob is corrupted
    /// - `UnsupportedVersion` if the container format is too new
    ///
    /// The cache is left untouched on error.
    pub fn load(&mut self) -> Result<()> {
        let container = self.read_container().context("Cannot open vault")?;

        info!(
            location = %self.location(),
            records = container.records.len(),
            "Vault opened"
        );
        self.container = Some(container);
        Ok(())
    }

    /// Encrypt and persist the container.
    ///
    /// With `Some(container)` that container replaces the cached one; with
    /// `None` the cached container is written back. `updated_at` is stamped
    /// before writing.
    ///
    /// # Postconditions
    /// - The previous blob is replaced atomically, or left intact on error
    /// - The cache is replaced only after a successful write
    ///
    /// # Errors
    /// Wrapped in a "Cannot persist vault" context:
    /// - `InvalidInput` if `None` is given and nothing is loaded
    /// - `UninitializedKeys` if the session has no keys
    /// - `Persistence` if the blob cannot be written
    pub fn save(&mut self, container: Option<VaultContainer>) -> Result<()> {
        let mut container = match container {
            Some(container) => container,
            None => self
                .container
                .clone()
                .ok_or_else(|| Error::InvalidInput("No vault loaded".to_string()))
                .context("Cannot persist vault")?,
        };
        container.metadata.updated_at = timestamp::now();

        self.write_container(&container)
            .context("Cannot persist vault")?;
        self.container = Some(container);
        Ok(())
    }

    /// Check whether the session keys open the persisted vault.
    ///
    /// Never modifies the cache or the blob.
    pub fn test_keys(&self) -> bool {
        match self.read_container() {
            Ok(_) => true,
            Err(e) => {
                warn!(location = %self.location(), error = %e, "Vault keys rejected");
                false
            }
        }
    }

    /// The cached container, loading it first if needed.
    pub fn container(&mut self) -> Result<&VaultContainer> {
        self.ensure_loaded()?;
        self.cached()
    }

    /// Container metadata.
    pub fn metadata(&mut self) -> Result<VaultMetadata> {
        Ok(self.container()?.metadata.clone())
    }

    /// Metadata plus record count and location.
    pub fn summary(&mut self) -> Result<VaultSummary> {
        let location = self.location();
        let container = self.container()?;
        Ok(VaultSummary {
            metadata: container.metadata.clone(),
            record_count: container.records.len(),
            location,
        })
    }

    /// Encrypt plaintext fields into a stored record.
    ///
    /// Every present, non-empty field is encrypted under the data key and
    /// base64 encoded; other fields are left unset. With `existing`, its
    /// identifier and creation time are kept and all content fields are
    /// replaced.
    ///
    /// # Errors
    /// - `UninitializedKeys` if the session has no keys
    pub fn encrypt_record(
        &self,
        fields: &RecordFields,
        existing: Option<&StoredRecord>,
    ) -> Result<StoredRecord> {
        let data_key = self.session.data_key()?;
        let mut stored = StoredRecord::new(timestamp::now());
        if let Some(previous) = existing {
            stored.id = previous.id.clone();
            stored.created_at = previous.created_at;
        }

        for field in Field::ALL {
            let encoded = fields
                .get(field)
                .map(|plain| encrypt_to_b64(data_key.as_bytes(), plain.as_bytes()))
                .transpose()?;
            stored.set(field, encoded);
        }
        Ok(stored)
    }

    /// Decrypt a stored record.
    ///
    /// A field that cannot be decrypted becomes [`FieldValue::Undecryptable`]
    /// instead of failing the record.
    ///
    /// # Errors
    /// - `UninitializedKeys` if the session has no keys
    pub fn decrypt_record(&self, stored: &StoredRecord) -> Result<Record> {
        let data_key = self.session.data_key()?;
        let open = |field: Field| {
            stored
                .get(field)
                .map(|encoded| decrypt_field(&data_key, stored, field, encoded))
        };

        Ok(Record {
            id: stored.id.clone(),
            created_at: stored.created_at,
            updated_at: stored.updated_at,
            service: open(Field::Service),
            username: open(Field::Username),
            password: open(Field::Password),
            comment: open(Field::Comment),
        })
    }

    /// Decrypt every record, in container order.
    pub fn get_all(&mut self) -> Result<Vec<Record>> {
        self.ensure_loaded()?;
        self.cached()?
            .records
            .iter()
            .map(|stored| self.decrypt_record(stored))
            .collect()
    }

    /// Encrypt and append a new record.
    ///
    /// # Postconditions
    /// - The record carries a fresh identifier unique within the container
    /// - The container is persisted
    pub fn add(&mut self, fields: &RecordFields) -> Result<RecordId> {
        self.ensure_loaded()?;
        let mut container = self.cached()?.clone();

        let mut stored = self.encrypt_record(fields, None)?;
        while container.position(stored.id.as_str()).is_some() {
            stored.id = RecordId::generate();
        }
        let id = stored.id.clone();
        container.records.push(stored);

        self.save(Some(container))?;
        info!(record_id = %id, "Record added");
        Ok(id)
    }

    /// Replace the content fields of an existing record.
    ///
    /// # Errors
    /// - `RecordNotFound` if no record has `id`
    pub fn update(&mut self, id: &RecordId, fields: &RecordFields) -> Result<()> {
        self.ensure_loaded()?;
        let mut container = self.cached()?.clone();

        let index = container
            .position(id.as_str())
            .ok_or_else(|| Error::RecordNotFound(id.to_string()))?;
        let updated = self.encrypt_record(fields, Some(&container.records[index]))?;
        container.records[index] = updated;

        self.save(Some(container))?;
        info!(record_id = %id, "Record updated");
        Ok(())
    }

    /// Remove a record.
    ///
    /// # Errors
    /// - `RecordNotFound` if no record has `id`
    pub fn delete(&mut self, id: &RecordId) -> Result<()> {
        self.ensure_loaded()?;
        let mut container = self.cached()?.clone();

        let index = container
            .position(id.as_str())
            .ok_or_else(|| Error::RecordNotFound(id.to_string()))?;
        container.records.remove(index);

        self.save(Some(container))?;
        info!(record_id = %id, "Record deleted");
        Ok(())
    }

    /// Decrypt a single record.
    ///
    /// # Errors
    /// - `RecordNotFound` if no record has `id`
    pub fn get_by_id(&mut self, id: &RecordId) -> Result<Record> {
        self.ensure_loaded()?;
        let container = self.cached()?;
        let stored = container
            .position(id.as_str())
            .map(|index| &container.records[index])
            .ok_or_else(|| Error::RecordNotFound(id.to_string()))?;
        self.decrypt_record(stored)
    }

    fn ensure_loaded(&mut self) -> Result<()> {
        if self.container.is_none() {
            self.load()?;
        }
        Ok(())
    }

    fn cached(&self) -> Result<&VaultContainer> {
        self.container
            .as_ref()
            .ok_or_else(|| Error::InvalidInput("No vault loaded".to_string()))
    }

    fn read_container(&self) -> Result<VaultContainer> {
        let master_key = self.session.master_key()?;
        let blob = self.provider.read()?;
        let payload = decrypt(master_key.as_bytes(), &blob)?;
        VaultContainer::from_bytes(&payload)
    }

    fn write_container(&self, container: &VaultContainer) -> Result<()> {
        let master_key = self.session.master_key()?;
        let payload = container.to_bytes()?;
        let blob = encrypt(master_key.as_bytes(), &payload)?;
        self.provider.write(&blob)?;

        debug!(
            location = %self.location(),
            records = container.records.len(),
            bytes = blob.len(),
            "Vault saved"
        );
        Ok(())
    }
}

fn decrypt_field(
    key: &SymmetricKey,
    stored: &StoredRecord,
    field: Field,
    encoded: &str,
) -> FieldValue {
    let text = decrypt_from_b64(key.as_bytes(), encoded).and_then(|bytes| {
        String::from_utf8(bytes)
            .map_err(|_| Error::Decryption("Field is not valid UTF-8".to_string()))
    });

    match text {
        Ok(text) => FieldValue::Decrypted(text),
        Err(e) => {
            warn!(
                record_id = %stored.id,
                field = %field,
                error = %e,
                "Field could not be decrypted"
            );
            FieldValue::Undecryptable
        }
    }
}
