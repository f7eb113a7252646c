//! Validating record manager over a vault store.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::VaultSummary;
use crate::record::{Field, Record, RecordFields};
use crate::store::VaultStore;
use crate::strength::{self, PasswordStrength};
use twinkey_common::{Error, RecordId, Result, ResultExt};

/// Most recent non-empty search and its results.
#[derive(Debug, Clone)]
pub struct SearchCache {
    pub query: String,
    pub results: Vec<Record>,
    pub timestamp: DateTime<Utc>,
}

/// CRUD and search over the records of one vault.
///
/// Inputs are validated before anything touches the store. Store failures
/// are wrapped with a description of the failed operation while keeping
/// their [`ErrorKind`](twinkey_common::ErrorKind).
pub struct RecordManager<'a> {
    store: VaultStore<'a>,
    last_search: Option<SearchCache>,
}

impl<'a> RecordManager<'a> {
    /// Create a manager over `store`.
    pub fn new(store: VaultStore<'a>) -> Self {
        Self {
            store,
            last_search: None,
        }
    }

    /// Get the underlying store.
    pub fn store(&self) -> &VaultStore<'a> {
        &self.store
    }

    /// All records, in container order.
    pub fn get_all(&mut self) -> Result<Vec<Record>> {
        self.store.get_all().context("Failed to list records")
    }

    /// Add a record.
    ///
    /// # Preconditions
    /// - `service`, `username` and `password` are present and non-empty
    ///
    /// # Postconditions
    /// - Record is persisted with a fresh identifier
    /// - Search cache is cleared
    ///
    /// # Errors
    /// - `Validation` if a required field is missing; nothing is written
    /// - Any store error, wrapped
    pub fn add(&mut self, fields: &RecordFields) -> Result<RecordId> {
        validate(fields, &[Field::Service, Field::Username, Field::Password])?;

        let id = self.store.add(fields).context("Failed to add record")?;
        self.invalidate_search();
        Ok(id)
    }

    /// Replace the fields of an existing record.
    ///
    /// Fields absent from `fields` are cleared.
    ///
    /// # Preconditions
    /// - `id` is non-empty
    /// - `service` and `username` are present and non-empty
    ///
    /// # Errors
    /// - `Validation` on an empty id or missing field; nothing is written
    /// - `RecordNotFound` if no record has `id`
    pub fn update(&mut self, id: &str, fields: &RecordFields) -> Result<()> {
        let id = RecordId::new(id)?;
        validate(fields, &[Field::Service, Field::Username])?;

        self.store
            .update(&id, fields)
            .with_context(|| format!("Failed to update record {}", id))?;
        self.invalidate_search();
        Ok(())
    }

    /// Delete a record.
    ///
    /// # Errors
    /// - `Validation` on an empty id
    /// - `RecordNotFound` if no record has `id`
    pub fn delete(&mut self, id: &str) -> Result<()> {
        let id = RecordId::new(id)?;

        self.store
            .delete(&id)
            .with_context(|| format!("Failed to delete record {}", id))?;
        self.invalidate_search();
        Ok(())
    }

    /// Fetch one record.
    ///
    /// # Errors
    /// - `Validation` on an empty id
    /// - `RecordNotFound` if no record has `id`
    pub fn get_by_id(&mut self, id: &str) -> Result<Record> {
        let id = RecordId::new(id)?;

        self.store
            .get_by_id(&id)
            .with_context(|| format!("Failed to read record {}", id))
    }

    /// Find records whose username, service or comment contains `query`,
    /// ignoring case.
    ///
    /// An empty query returns every record and leaves the cache alone.
    /// Repeating the previous non-empty query returns the cached results
    /// without touching the store.
    pub fn search(&mut self, query: &str) -> Result<Vec<Record>> {
        if query.is_empty() {
            return self.get_all();
        }

        if let Some(cached) = self.last_search.as_ref().filter(|c| c.query == query) {
            debug!(results = cached.results.len(), "Search served from cache");
            return Ok(cached.results.clone());
        }

        let needle = query.to_lowercase();
        let results: Vec<Record> = self
            .store
            .get_all()
            .context("Failed to search records")?
            .into_iter()
            .filter(|record| record.matches(&needle))
            .collect();

        debug!(results = results.len(), "Search completed");
        self.last_search = Some(SearchCache {
            query: query.to_string(),
            results: results.clone(),
            timestamp: Utc::now(),
        });
        Ok(results)
    }

    /// The cached most recent search, if still valid.
    pub fn last_search(&self) -> Option<&SearchCache> {
        self.last_search.as_ref()
    }

    /// Advisory strength score for `password`.
    pub fn check_password_strength(&self, password: &str) -> PasswordStrength {
        strength::evaluate(password)
    }

    /// Overview of the open vault.
    pub fn vault_info(&mut self) -> Result<VaultSummary> {
        self.store.summary().context("Failed to read vault information")
    }

    fn invalidate_search(&mut self) {
        self.last_search = None;
    }
}

fn validate(fields: &RecordFields, required: &[Field]) -> Result<()> {
    match required.iter().find(|f| fields.get(**f).is_none()) {
        Some(missing) => Err(Error::Validation(missing.name().to_string())),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::KeySession;
    use std::sync::Arc;
    use twinkey_common::ErrorKind;
    use twinkey_storage::MemoryProvider;

    fn keys() -> KeySession {
        let mut session = KeySession::new();
        session.set_keys("master", "data").unwrap();
        session
    }

    fn manager<'a>(keys: &'a KeySession, memory: &Arc<MemoryProvider>) -> RecordManager<'a> {
        let mut store = VaultStore::new(keys, memory.clone());
        store.initialize().unwrap();
        RecordManager::new(store)
    }

    #[test]
    fn test_add_and_get() {
        let keys = keys();
        let memory = Arc::new(MemoryProvider::new());
        let mut manager = manager(&keys, &memory);

        let fields = RecordFields::new("GitHub", "octocat", "hunter2").with_comment("work");
        let id = manager.add(&fields).unwrap();

        let record = manager.get_by_id(id.as_str()).unwrap();
        assert_eq!(record.fields(), fields);
        assert_eq!(manager.get_all().unwrap().len(), 1);
    }

    #[test]
    fn test_add_validation() {
        let keys = keys();
        let memory = Arc::new(MemoryProvider::new());
        let mut manager = manager(&keys, &memory);
        let writes = memory.write_count();

        let cases = [
            (RecordFields::new("", "octocat", "pw"), "service"),
            (RecordFields::new("GitHub", "", "pw"), "username"),
            (RecordFields::new("GitHub", "octocat", ""), "password"),
            (RecordFields::default(), "service"),
        ];
        for (fields, missing) in cases {
            let err = manager.add(&fields).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);
            assert_eq!(err.to_string(), format!("Missing required field: {}", missing));
        }
        assert_eq!(memory.write_count(), writes);
    }

    #[test]
    fn test_update_allows_missing_password() {
        let keys = keys();
        let memory = Arc::new(MemoryProvider::new());
        let mut manager = manager(&keys, &memory);

        let id = manager
            .add(&RecordFields::new("GitHub", "octocat", "hunter2"))
            .unwrap();
        let fields = RecordFields {
            service: Some("GitHub".to_string()),
            username: Some("monalisa".to_string()),
            ..Default::default()
        };
        manager.update(id.as_str(), &fields).unwrap();

        let record = manager.get_by_id(id.as_str()).unwrap();
        assert_eq!(record.text(Field::Username), Some("monalisa"));
        assert!(record.password.is_none());

        let missing_user = RecordFields {
            service: Some("GitHub".to_string()),
            ..Default::default()
        };
        let err = manager.update(id.as_str(), &missing_user).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_empty_ids_rejected() {
        let keys = keys();
        let memory = Arc::new(MemoryProvider::new());
        let mut manager = manager(&keys, &memory);

        assert_eq!(manager.get_by_id("").unwrap_err().kind(), ErrorKind::Validation);
        assert_eq!(manager.delete("  ").unwrap_err().kind(), ErrorKind::Validation);
        assert_eq!(
            manager
                .update("", &RecordFields::new("a", "b", "c"))
                .unwrap_err()
                .kind(),
            ErrorKind::Validation
        );
    }

    #[test]
    fn test_store_errors_keep_kind() {
        let keys = keys();
        let memory = Arc::new(MemoryProvider::new());
        let mut manager = manager(&keys, &memory);

        let err = manager.delete("no-such-record").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RecordNotFound);
        assert!(err.to_string().starts_with("Failed to delete record"));

        memory.set_fail_writes(true);
        let err = manager
            .add(&RecordFields::new("GitHub", "octocat", "pw"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Persistence);
        assert_eq!(err.to_string(), "Failed to add record");
    }

    #[test]
    fn test_search() {
        let keys = keys();
        let memory = Arc::new(MemoryProvider::new());
        let mut manager = manager(&keys, &memory);

        manager
            .add(&RecordFields::new("GitHub", "octocat", "pw1").with_comment("Work account"))
            .unwrap();
        manager
            .add(&RecordFields::new("Mail", "alice@example.com", "pw2"))
            .unwrap();
        manager
            .add(&RecordFields::new("Bank", "alice", "GitHub-lookalike"))
            .unwrap();

        assert_eq!(manager.search("").unwrap().len(), 3);
        assert!(manager.last_search().is_none());

        let hits = manager.search("ALICE").unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].text(Field::Service), Some("Mail"));

        // Passwords are not searched
        let hits = manager.search("github").unwrap();
        assert_eq!(hits.len(), 1);

        assert_eq!(manager.search("work").unwrap().len(), 1);
        assert!(manager.search("nothing").unwrap().is_empty());
    }

    #[test]
    fn test_search_cache_lifecycle() {
        let keys = keys();
        let memory = Arc::new(MemoryProvider::new());
        let mut manager = manager(&keys, &memory);
        manager
            .add(&RecordFields::new("GitHub", "octocat", "pw"))
            .unwrap();

        let first = manager.search("git").unwrap();
        let cached = manager.last_search().unwrap();
        assert_eq!(cached.query, "git");
        assert_eq!(cached.results, first);

        // Reads keep the cache
        manager.get_all().unwrap();
        assert!(manager.last_search().is_some());

        manager
            .add(&RecordFields::new("GitLab", "octocat", "pw"))
            .unwrap();
        assert!(manager.last_search().is_none());
        assert_eq!(manager.search("git").unwrap().len(), 2);
    }

    #[test]
    fn test_vault_info() {
        let keys = keys();
        let memory = Arc::new(MemoryProvider::new());
        let mut manager = manager(&keys, &memory);
        manager
            .add(&RecordFields::new("GitHub", "octocat", "pw"))
            .unwrap();

        let info = manager.vault_info().unwrap();
        assert_eq!(info.record_count, 1);
        assert_eq!(info.location, "memory://vault");
        assert_eq!(
            manager.check_password_strength("Password1!").score,
            70
        );
    }
}
