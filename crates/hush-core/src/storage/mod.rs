//! Storage abstraction for the two opaque tables.
//!
//! The server persists exactly two shapes, both ciphertext-only: thread rows
//! and message rows. Neither contains plaintext or participant identifiers —
//! the only linkage is the one-way thread digest. The trait is synchronous
//! (no async) so the core stays Sans-IO; durable backends live behind this
//! seam and are out of scope here.

mod error;
mod memory;

pub use error::StorageError;
use hush_crypto::ThreadId;
pub use memory::MemoryStorage;

/// A persisted thread row: `{id, ciphertext, iv, created_at}`.
///
/// The ciphertext is encrypted thread metadata produced by a client; the
/// server cannot read it and never needs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadRecord {
    /// Server-assigned opaque row id.
    pub id: String,
    /// Base64 ciphertext, opaque.
    pub ciphertext: String,
    /// Base64 IV, opaque.
    pub iv: String,
    /// Creation time, unix milliseconds.
    pub created_at: u64,
}

/// A persisted message row: `{id, thread_id, ciphertext, iv, created_at}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRecord {
    /// Server-assigned opaque row id.
    pub id: String,
    /// Thread digest this message routes under.
    pub thread_id: ThreadId,
    /// Base64 ciphertext, opaque.
    pub ciphertext: String,
    /// Base64 IV, opaque.
    pub iv: String,
    /// Receive time, unix milliseconds.
    pub created_at: u64,
}

/// Storage seam for the relay.
///
/// Implementations must be:
/// - Clone: clones share the same underlying store (typically via Arc)
/// - Send + Sync: accessed from concurrent connection tasks
/// - Synchronous: no async methods
///
/// # Wipe atomicity
///
/// `wipe_all` must clear both tables under a single write guard so that no
/// concurrent reader observes a half-wiped store.
pub trait Storage: Clone + Send + Sync + 'static {
    /// Persist a new thread row, assigning it an opaque id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the underlying store fails.
    fn create_thread(
        &self,
        ciphertext: String,
        iv: String,
        created_at: u64,
    ) -> Result<ThreadRecord, StorageError>;

    /// Persist a message under a thread digest, assigning it an opaque id.
    ///
    /// The thread digest does not need a corresponding thread row: the
    /// server cannot tell which digests are "real" and must not try.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the underlying store fails.
    fn store_message(
        &self,
        thread_id: ThreadId,
        ciphertext: String,
        iv: String,
        created_at: u64,
    ) -> Result<MessageRecord, StorageError>;

    /// Load up to `limit` most recent messages for a thread, oldest first.
    ///
    /// An unknown thread digest yields an empty list, indistinguishable from
    /// a thread with no messages.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the underlying store fails.
    fn load_messages(
        &self,
        thread_id: ThreadId,
        limit: usize,
    ) -> Result<Vec<MessageRecord>, StorageError>;

    /// Destroy every persisted row in both tables, atomically.
    ///
    /// Irrevocable. Callers await completion before acknowledging whatever
    /// request triggered it.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the underlying store fails.
    fn wipe_all(&self) -> Result<(), StorageError>;

    /// Number of thread rows (tests and telemetry).
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the underlying store fails.
    fn thread_count(&self) -> Result<usize, StorageError>;

    /// Number of message rows across all threads (tests and telemetry).
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the underlying store fails.
    fn message_count(&self) -> Result<usize, StorageError>;
}
