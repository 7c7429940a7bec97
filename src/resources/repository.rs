use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

use crate::resources::record::ResourceRecord;

/// Attempts for optimistic read-modify-write cycles against the repository.
pub const RECORD_UPDATE_ATTEMPTS: u32 = 3;

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Resource record not found: {0}")]
    NotFound(Uuid),

    #[error("Concurrent update conflict on record: {0}")]
    Conflict(Uuid),

    #[error("Resource record already exists: {0}")]
    AlreadyExists(Uuid),

    #[error("Storage error: {0}")]
    Storage(String),
}

/// CRUD over persisted resource records. Updates are optimistic: the stored
/// version must match the caller's copy or the write is rejected.
#[async_trait]
pub trait ResourceRepository: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<ResourceRecord>, RepositoryError>;

    async fn create(&self, record: ResourceRecord) -> Result<ResourceRecord, RepositoryError>;

    async fn update(&self, record: ResourceRecord) -> Result<ResourceRecord, RepositoryError>;

    /// Returns whether a record was actually removed.
    async fn delete(&self, id: Uuid) -> Result<bool, RepositoryError>;
}

/// Read-modify-write with bounded retry on version conflicts. Each attempt
/// re-reads the record so the mutation applies to fresh state.
pub async fn update_record_with_retry<F>(
    repository: &dyn ResourceRepository,
    id: Uuid,
    attempts: u32,
    mutate: F,
) -> Result<ResourceRecord, RepositoryError>
where
    F: Fn(&mut ResourceRecord) + Send + Sync,
{
    for attempt in 0..attempts {
        let mut record = repository
            .get(id)
            .await?
            .ok_or(RepositoryError::NotFound(id))?;
        mutate(&mut record);

        match repository.update(record).await {
            Ok(updated) => return Ok(updated),
            Err(RepositoryError::Conflict(_)) if attempt + 1 < attempts => {
                debug!(record_id = %id, attempt, "Record update conflicted, retrying");
            }
            Err(e) => return Err(e),
        }
    }
    Err(RepositoryError::Conflict(id))
}

/// Process-local repository. Backs tests and single-node deployments.
#[derive(Default)]
pub struct InMemoryResourceRepository {
    records: DashMap<Uuid, ResourceRecord>,
}

impl InMemoryResourceRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResourceRepository for InMemoryResourceRepository {
    async fn get(&self, id: Uuid) -> Result<Option<ResourceRecord>, RepositoryError> {
        Ok(self.records.get(&id).map(|r| r.clone()))
    }

    async fn create(&self, record: ResourceRecord) -> Result<ResourceRecord, RepositoryError> {
        if self.records.contains_key(&record.id) {
            return Err(RepositoryError::AlreadyExists(record.id));
        }
        self.records.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update(&self, mut record: ResourceRecord) -> Result<ResourceRecord, RepositoryError> {
        let mut stored = self
            .records
            .get_mut(&record.id)
            .ok_or(RepositoryError::NotFound(record.id))?;
        if stored.version != record.version {
            return Err(RepositoryError::Conflict(record.id));
        }
        record.version += 1;
        *stored = record.clone();
        Ok(record)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, RepositoryError> {
        Ok(self.records.remove(&id).is_some())
    }
}
