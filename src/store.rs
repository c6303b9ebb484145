//! Persistence contracts the crawler relies on, plus an in-memory store.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Local;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::model::{CaseRecord, DocumentRef, Identity};
use crate::Result;

#[async_trait]
pub trait CaseStore: Send + Sync {
    async fn find_by_identity(&self, identity: &Identity) -> Result<Option<CaseRecord>>;

    /// Inserts or replaces by identity. `created_at` is set on first insert
    /// and kept afterwards.
    async fn bulk_upsert(&self, records: &[CaseRecord]) -> Result<()>;
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Removes every document owned by `identity`; returns how many.
    async fn bulk_delete_by_identity(&self, identity: &Identity) -> Result<usize>;

    /// Inserts or replaces by uuid.
    async fn bulk_upsert(&self, documents: &[DocumentRef]) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    cases: RwLock<BTreeMap<Identity, CaseRecord>>,
    documents: RwLock<BTreeMap<Uuid, DocumentRef>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn case(&self, identity: &Identity) -> Option<CaseRecord> {
        self.cases.read().await.get(identity).cloned()
    }

    pub async fn cases(&self) -> Vec<CaseRecord> {
        self.cases.read().await.values().cloned().collect()
    }

    pub async fn documents_of(&self, identity: &Identity) -> Vec<DocumentRef> {
        self.documents
            .read()
            .await
            .values()
            .filter(|doc| &doc.identity == identity)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl CaseStore for MemoryStore {
    async fn find_by_identity(&self, identity: &Identity) -> Result<Option<CaseRecord>> {
        Ok(self.case(identity).await)
    }

    async fn bulk_upsert(&self, records: &[CaseRecord]) -> Result<()> {
        let mut cases = self.cases.write().await;
        for record in records {
            let created_at = cases
                .get(&record.identity)
                .and_then(|stored| stored.created_at)
                .unwrap_or_else(Local::now);
            let mut record = record.clone();
            record.created_at = Some(created_at);
            cases.insert(record.identity.clone(), record);
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn bulk_delete_by_identity(&self, identity: &Identity) -> Result<usize> {
        let mut documents = self.documents.write().await;
        let before = documents.len();
        documents.retain(|_, doc| &doc.identity != identity);
        Ok(before - documents.len())
    }

    async fn bulk_upsert(&self, documents: &[DocumentRef]) -> Result<()> {
        let mut stored = self.documents.write().await;
        for doc in documents {
            let created_at = stored
                .get(&doc.uuid)
                .and_then(|old| old.created_at)
                .unwrap_or_else(Local::now);
            let mut doc = doc.clone();
            doc.created_at = Some(created_at);
            stored.insert(doc.uuid, doc);
        }
        Ok(())
    }
}
