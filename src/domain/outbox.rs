use {
    super::error::{EventError, OutboxError},
    super::id::{EntryId, LockId},
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
    std::{fmt, future::Future, pin::Pin},
};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Replayable mutation kinds. The string forms are what the write side stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    DeleteTeam,
    CreateAsset,
    DeleteAsset,
    UpdateAsset,
    DeleteAllAssets,
    FindingOverwrite,
}

impl Action {
    pub const ALL: [Action; 6] = [
        Self::DeleteTeam,
        Self::CreateAsset,
        Self::DeleteAsset,
        Self::UpdateAsset,
        Self::DeleteAllAssets,
        Self::FindingOverwrite,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DeleteTeam => "DeleteTeam",
            Self::CreateAsset => "CreateAsset",
            Self::DeleteAsset => "DeleteAsset",
            Self::UpdateAsset => "UpdateAsset",
            Self::DeleteAllAssets => "DeleteAllAssets",
            Self::FindingOverwrite => "FindingOverwrite",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for Action {
    type Error = EventError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| EventError::UnsupportedAction(s.to_string()))
    }
}

/// One pending row of the outbox, as read back from storage.
///
/// `action` is kept as the raw stored tag: rows written by a newer release
/// may carry tags this build does not know, and that must surface as a
/// per-entry failure rather than a read failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub id: EntryId,
    pub action: String,
    pub version: i32,
    pub payload: Vec<u8>,
    pub attempts: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Outcome of a non-blocking attempt at the dispatch lock, bundled with the
/// transaction that scopes it.
///
/// Must be handed back to [`OutboxLog::release_lock`] whether or not it was
/// acquired: the transaction holds a connection until it is closed.
#[must_use = "a Lock must be released even when it was not acquired"]
#[derive(Debug)]
pub struct Lock<T> {
    acquired: bool,
    tx: T,
}

impl<T> Lock<T> {
    pub fn new(acquired: bool, tx: T) -> Self {
        Self { acquired, tx }
    }

    pub fn acquired(&self) -> bool {
        self.acquired
    }

    pub fn into_tx(self) -> T {
        self.tx
    }
}

/// Read/mutate side of the outbox plus the cross-instance lock.
///
/// Appending is not part of this port: rows are written by whoever performs
/// the domain mutation, inside that mutation's own transaction.
pub trait OutboxLog: Send + Sync + 'static {
    /// Transaction handle a [`Lock`] keeps open until released.
    type Tx: Send + 'static;

    /// All pending entries, oldest first. Empty when nothing is pending.
    fn get_log(&self) -> BoxFuture<'_, Result<Vec<LogEntry>, OutboxError>>;

    /// Bump the attempt counter of an entry that could not be applied.
    fn failed_event<'a>(&'a self, entry: &'a LogEntry) -> BoxFuture<'a, Result<(), OutboxError>>;

    /// Delete an applied entry. Deleting a row that is already gone is not an error.
    fn clean_event<'a>(&'a self, entry: &'a LogEntry) -> BoxFuture<'a, Result<(), OutboxError>>;

    /// Delete the oldest `n` entries unconditionally. Returns how many were removed.
    fn clean_log(&self, n: i64) -> BoxFuture<'_, Result<u64, OutboxError>>;

    /// Open a transaction and try, without blocking, to take the lock keyed by `id`.
    fn try_get_lock(&self, id: LockId) -> BoxFuture<'_, Result<Lock<Self::Tx>, OutboxError>>;

    /// Close the lock's transaction, dropping the lock if it was held. `None` is a no-op.
    fn release_lock(&self, lock: Option<Lock<Self::Tx>>) -> BoxFuture<'_, Result<(), OutboxError>>;
}
