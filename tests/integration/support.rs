//! Test doubles and file helpers shared by the integration tests.

use hashsync::hashing::{
    CreatedHash, FileHashProvider, HashError, HashProvider, HashRecord, HashType,
};
use hashsync::notify::MemoryNotifier;
use hashsync::sync::{FileSync, Sleeper};
use hashsync::transfer::{FileTransferService, LocalFileTransfer, TransferError};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

/// Serializes tests that read or write `HASHSYNC_*` environment variables.
pub static ENV_MUTEX: Mutex<()> = Mutex::new(());

/// Remove every `HASHSYNC_*` variable from the environment.
pub fn clear_env() {
    for (key, _) in std::env::vars() {
        if key.starts_with("HASHSYNC_") {
            std::env::remove_var(key);
        }
    }
}

type SleepHook = Box<dyn Fn() + Send + Sync>;

/// Records requested waits instead of sleeping.
#[derive(Default)]
pub struct RecordingSleeper {
    waits: Mutex<Vec<Duration>>,
    on_sleep: Option<SleepHook>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `hook` during every wait, standing in for a concurrent process.
    pub fn with_hook(hook: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            waits: Mutex::new(Vec::new()),
            on_sleep: Some(Box::new(hook)),
        }
    }

    pub fn waits(&self) -> Vec<Duration> {
        self.waits.lock().unwrap().clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.waits.lock().unwrap().push(duration);
        if let Some(hook) = &self.on_sleep {
            hook();
        }
    }
}

/// [`LocalFileTransfer`] that counts its calls.
#[derive(Default)]
pub struct CountingTransfer {
    inner: LocalFileTransfer,
    copies: AtomicUsize,
}

impl CountingTransfer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn copies(&self) -> usize {
        self.copies.load(Ordering::SeqCst)
    }
}

impl FileTransferService for CountingTransfer {
    fn copy_file(
        &self,
        source: &Path,
        destination: &Path,
        overwrite: bool,
    ) -> Result<(), TransferError> {
        self.copies.fetch_add(1, Ordering::SeqCst);
        self.inner.copy_file(source, destination, overwrite)
    }
}

/// How [`ScriptedHashProvider`] treats `create_hash_record` for files under its prefix.
#[derive(Clone, Copy)]
pub enum CreateBehavior {
    /// Return an I/O error without hashing.
    Fail,
    /// Hash normally, skip the sidecar and report a warning.
    WarnOnly,
}

/// [`FileHashProvider`] whose `create_hash_record` misbehaves below `prefix`.
pub struct ScriptedHashProvider {
    inner: FileHashProvider,
    prefix: PathBuf,
    behavior: CreateBehavior,
}

impl ScriptedHashProvider {
    pub fn new(prefix: &Path, behavior: CreateBehavior) -> Self {
        Self {
            inner: FileHashProvider::new(),
            prefix: prefix.to_path_buf(),
            behavior,
        }
    }
}

impl HashProvider for ScriptedHashProvider {
    fn compute_file_hash(&self, path: &Path, hash_type: HashType) -> Result<String, HashError> {
        self.inner.compute_file_hash(path, hash_type)
    }

    fn read_hash_record(&self, hashcheck_path: &Path) -> Result<HashRecord, HashError> {
        self.inner.read_hash_record(hashcheck_path)
    }

    fn create_hash_record(
        &self,
        data_file: &Path,
        hash_type: HashType,
    ) -> Result<CreatedHash, HashError> {
        if !data_file.starts_with(&self.prefix) {
            return self.inner.create_hash_record(data_file, hash_type);
        }
        match self.behavior {
            CreateBehavior::Fail => Err(HashError::Io {
                path: data_file.to_path_buf(),
                source: std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    "share is read-only",
                ),
            }),
            CreateBehavior::WarnOnly => Ok(CreatedHash {
                hash_value: self.inner.compute_file_hash(data_file, hash_type)?,
                warning: Some(format!(
                    "Unable to create the .hashcheck file for {}",
                    data_file.display()
                )),
            }),
        }
    }
}

/// An orchestrator wired to test doubles.
pub struct Harness {
    pub sync: FileSync,
    pub transfer: Arc<CountingTransfer>,
    pub sleeper: Arc<RecordingSleeper>,
    pub notifier: Arc<MemoryNotifier>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_sleeper(RecordingSleeper::new())
    }

    pub fn with_sleeper(sleeper: RecordingSleeper) -> Self {
        Self::build(sleeper, Arc::new(FileHashProvider::new()))
    }

    pub fn with_hasher(hasher: Arc<dyn HashProvider>) -> Self {
        Self::build(RecordingSleeper::new(), hasher)
    }

    fn build(sleeper: RecordingSleeper, hasher: Arc<dyn HashProvider>) -> Self {
        let transfer = Arc::new(CountingTransfer::new());
        let sleeper = Arc::new(sleeper);
        let notifier = Arc::new(MemoryNotifier::new());
        let sync = FileSync::new(
            transfer.clone(),
            hasher,
            notifier.clone(),
        )
        .with_sleeper(sleeper.clone());
        Self {
            sync,
            transfer,
            sleeper,
            notifier,
        }
    }
}

/// Write `content` to `dir/name`, creating `dir`.
pub fn write_file(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
    fs::create_dir_all(dir).unwrap();
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

/// Set the modification time of `path` to `age` in the past.
pub fn set_age(path: &Path, age: Duration) {
    let when = filetime::FileTime::from_system_time(SystemTime::now() - age);
    filetime::set_file_mtime(path, when).unwrap();
}

/// Pseudo-random but deterministic bytes.
pub fn payload(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed))
        .collect()
}
