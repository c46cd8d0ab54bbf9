//! In-memory storage backend.
//!
//! The reference implementation of [`Storage`]: a single `RwLock` over both
//! tables, which makes `wipe_all` trivially atomic. Clones share the same
//! store via `Arc`.

use std::{
    collections::HashMap,
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use hush_crypto::ThreadId;
use uuid::Uuid;

use super::{MessageRecord, Storage, StorageError, ThreadRecord};

#[derive(Default)]
struct Tables {
    threads: Vec<ThreadRecord>,
    messages: HashMap<ThreadId, Vec<MessageRecord>>,
    message_total: usize,
}

/// Shared in-memory store.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    inner: Arc<RwLock<Tables>>,
}

impl MemoryStorage {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    // Poisoning means a writer panicked mid-operation; for an in-memory map
    // of opaque rows the data is still structurally sound, so recover the
    // guard instead of propagating the panic.
    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        match self.inner.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Storage for MemoryStorage {
    fn create_thread(
        &self,
        ciphertext: String,
        iv: String,
        created_at: u64,
    ) -> Result<ThreadRecord, StorageError> {
        let record =
            ThreadRecord { id: Uuid::new_v4().to_string(), ciphertext, iv, created_at };
        self.write().threads.push(record.clone());
        Ok(record)
    }

    fn store_message(
        &self,
        thread_id: ThreadId,
        ciphertext: String,
        iv: String,
        created_at: u64,
    ) -> Result<MessageRecord, StorageError> {
        let record = MessageRecord {
            id: Uuid::new_v4().to_string(),
            thread_id,
            ciphertext,
            iv,
            created_at,
        };

        let mut tables = self.write();
        tables.messages.entry(thread_id).or_default().push(record.clone());
        tables.message_total += 1;
        Ok(record)
    }

    fn load_messages(
        &self,
        thread_id: ThreadId,
        limit: usize,
    ) -> Result<Vec<MessageRecord>, StorageError> {
        let tables = self.read();
        let Some(messages) = tables.messages.get(&thread_id) else {
            return Ok(Vec::new());
        };

        let start = messages.len().saturating_sub(limit);
        Ok(messages[start..].to_vec())
    }

    fn wipe_all(&self) -> Result<(), StorageError> {
        // Single write guard: readers see either everything or nothing
        let mut tables = self.write();
        tables.threads.clear();
        tables.messages.clear();
        tables.message_total = 0;
        Ok(())
    }

    fn thread_count(&self) -> Result<usize, StorageError> {
        Ok(self.read().threads.len())
    }

    fn message_count(&self) -> Result<usize, StorageError> {
        Ok(self.read().message_total)
    }
}
