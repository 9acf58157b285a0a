//! Prompt draft persistence.
//!
//! The prompt is mirrored to a key-value store so it survives restarts.
//! Writes are debounced: each [`DraftStore::save`] restarts a single-shot
//! timer, and only the value pending when the timer fires is written.
//! Storage failures never reach the caller; they are logged and the draft
//! degrades to "nothing saved".

use crate::error::{ImageReadyError, Result};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Key the prompt draft is stored under.
pub const DRAFT_KEY: &str = "imageready.prompt.v1";

/// Quiet period after the last edit before the draft is written.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Durable string key-value storage.
pub trait KeyValueStore: Send + Sync {
    /// Reads a value, `None` if the key was never written.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Writes a value, replacing any previous one.
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// In-process store. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
    writes: AtomicUsize,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `set` calls so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| ImageReadyError::Storage("memory store poisoned".into()))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| ImageReadyError::Storage("memory store poisoned".into()))?;
        entries.insert(key.to_string(), value.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Store backed by a single JSON object file.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Uses the JSON file at `path`, creating it on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) if text.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.read_all()?;
        entries.insert(key.to_string(), value.to_string());

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(&entries)?)?;
        Ok(())
    }
}

/// A scheduled write. The slot is emptied by whichever of the timer or
/// `flush` gets to it first, so a value is written at most once.
struct PendingDraft {
    slot: Arc<Mutex<Option<String>>>,
    timer: Option<JoinHandle<()>>,
}

impl PendingDraft {
    fn take(&self) -> Option<String> {
        take_slot(&self.slot)
    }
}

fn take_slot(slot: &Mutex<Option<String>>) -> Option<String> {
    slot.lock().ok().and_then(|mut value| value.take())
}

/// Debounced prompt persistence on top of a [`KeyValueStore`].
///
/// Outside a Tokio runtime no timer can be armed; the value is then held
/// until the next [`flush`](DraftStore::flush).
pub struct DraftStore {
    store: Arc<dyn KeyValueStore>,
    debounce: Duration,
    pending: Option<PendingDraft>,
}

impl DraftStore {
    /// Creates a draft store with the default 500ms debounce.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_debounce(store, DEFAULT_DEBOUNCE)
    }

    /// Creates a draft store with a custom debounce window.
    pub fn with_debounce(store: Arc<dyn KeyValueStore>, debounce: Duration) -> Self {
        Self {
            store,
            debounce,
            pending: None,
        }
    }

    /// Reads the saved draft. Any failure reads as an empty draft.
    pub fn load(&self) -> String {
        match self.store.get(DRAFT_KEY) {
            Ok(draft) => draft.unwrap_or_default(),
            Err(e) => {
                tracing::warn!("could not read prompt draft: {e}");
                String::new()
            }
        }
    }

    /// Schedules `text` to be written once no other save arrives for the debounce window.
    pub fn save(&mut self, text: impl Into<String>) {
        self.cancel();

        let slot = Arc::new(Mutex::new(Some(text.into())));
        let timer = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let store = Arc::clone(&self.store);
                let debounce = self.debounce;
                let timer_slot = Arc::clone(&slot);
                Some(runtime.spawn(async move {
                    tokio::time::sleep(debounce).await;
                    let Some(value) = take_slot(&timer_slot) else {
                        return;
                    };
                    let write = tokio::task::spawn_blocking(move || {
                        write_draft(store.as_ref(), &value);
                    });
                    if let Err(e) = write.await {
                        tracing::warn!("prompt draft write did not complete: {e}");
                    }
                }))
            }
            Err(_) => {
                tracing::warn!("no async runtime; prompt draft kept until flush");
                None
            }
        };

        self.pending = Some(PendingDraft { slot, timer });
    }

    /// True while a value is waiting to be written.
    pub fn has_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|pending| {
            pending
                .slot
                .lock()
                .map(|value| value.is_some())
                .unwrap_or(false)
        })
    }

    /// Writes any pending draft now instead of waiting for the timer.
    pub fn flush(&mut self) {
        if let Some(pending) = self.pending.take() {
            if let Some(timer) = &pending.timer {
                timer.abort();
            }
            if let Some(text) = pending.take() {
                write_draft(self.store.as_ref(), &text);
            }
        }
    }

    /// Drops any pending write without performing it.
    pub fn cancel(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.take();
            if let Some(timer) = pending.timer {
                timer.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<Option<String>> {
            Err(ImageReadyError::Storage("unavailable".into()))
        }

        fn set(&self, _key: &str, _value: &str) -> Result<()> {
            Err(ImageReadyError::Storage("unavailable".into()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_of_saves_writes_once() {
        let store = Arc::new(MemoryStore::new());
        let mut drafts = DraftStore::new(store.clone());

        drafts.save("a");
        tokio::time::sleep(Duration::from_millis(40)).await;
        drafts.save("ab");
        tokio::time::sleep(Duration::from_millis(40)).await;
        drafts.save("abc");

        tokio::time::sleep(Duration::from_millis(499)).await;
        assert_eq!(store.write_count(), 0);
        assert!(drafts.has_pending());

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(store.write_count(), 1);
        assert_eq!(store.get(DRAFT_KEY).unwrap().as_deref(), Some("abc"));
        assert_eq!(drafts.load(), "abc");
    }

    #[tokio::test(start_paused = true)]
    async fn test_spaced_saves_each_write() {
        let store = Arc::new(MemoryStore::new());
        let mut drafts = DraftStore::new(store.clone());

        drafts.save("first");
        tokio::time::sleep(Duration::from_millis(600)).await;
        drafts.save("second");
        tokio::time::sleep(Duration::from_millis(600)).await;

        assert_eq!(store.write_count(), 2);
        assert_eq!(drafts.load(), "second");
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_writes_immediately() {
        let store = Arc::new(MemoryStore::new());
        let mut drafts = DraftStore::new(store.clone());

        drafts.save("now");
        drafts.flush();
        assert_eq!(store.write_count(), 1);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_drops_pending_write() {
        let store = Arc::new(MemoryStore::new());
        let mut drafts = DraftStore::new(store.clone());

        drafts.save("never");
        drafts.cancel();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_broken_storage_fails_soft() {
        let mut drafts = DraftStore::with_debounce(Arc::new(BrokenStore), Duration::ZERO);
        assert_eq!(drafts.load(), "");
        drafts.save("lost");
        drafts.flush();
    }

    #[test]
    fn test_save_without_runtime_waits_for_flush() {
        let store = Arc::new(MemoryStore::new());
        let mut drafts = DraftStore::new(store.clone());

        drafts.save("typed");
        assert!(drafts.has_pending());
        assert_eq!(store.write_count(), 0);

        drafts.flush();
        assert_eq!(store.write_count(), 1);
        assert_eq!(drafts.load(), "typed");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_flush_after_timer_fired_does_not_rewrite() {
        let store = Arc::new(MemoryStore::new());
        let mut drafts = DraftStore::with_debounce(store.clone(), Duration::from_millis(5));

        drafts.save("once");
        tokio::time::sleep(Duration::from_millis(200)).await;
        drafts.flush();

        assert_eq!(store.write_count(), 1);
        assert!(!drafts.has_pending());
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("nested").join("drafts.json"));

        assert_eq!(store.get(DRAFT_KEY).unwrap(), None);
        store.set(DRAFT_KEY, "a red fox").unwrap();
        store.set("other", "kept").unwrap();
        assert_eq!(store.get(DRAFT_KEY).unwrap().as_deref(), Some("a red fox"));
        assert_eq!(store.get("other").unwrap().as_deref(), Some("kept"));
    }

    #[test]
    fn test_file_store_corrupt_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drafts.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = FileStore::new(&path);
        assert!(store.get(DRAFT_KEY).is_err());
        assert_eq!(DraftStore::new(Arc::new(store)).load(), "");
    }
}
