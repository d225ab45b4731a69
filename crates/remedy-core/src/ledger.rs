//! Branch Allocator and its persisted ledger.
//!
//! The ledger is a newline-delimited file next to the working copy
//! (`<working copy>.branches`) holding the 10 most recently allocated names.
//! Every allocation is a read-modify-write under an exclusive file lock on
//! `<working copy>.branches.lock`, so attempts against the same repository
//! serialize while attempts against different repositories do not contend.

use std::fs::{self, OpenOptions};
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use fs2::FileExt;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, warn};

use crate::domain::error::{RemedyError, Result};
use crate::domain::handles::LocalRepoHandle;

/// Entries kept in a ledger.
pub const LEDGER_CAPACITY: usize = 10;

/// Candidates generated before giving up.
pub const MAX_ATTEMPTS: usize = 10;

const LOCK_TIMEOUT: Duration = Duration::from_secs(10);
const LOCK_RETRY: Duration = Duration::from_millis(25);

/// Ledger file for a working copy at `repo_path`.
pub fn ledger_path_for(repo_path: &Path) -> PathBuf {
    sibling(repo_path, "branches")
}

fn lock_path_for(repo_path: &Path) -> PathBuf {
    sibling(repo_path, "branches.lock")
}

fn sibling(repo_path: &Path, extension: &str) -> PathBuf {
    let name = repo_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "repository".to_string());
    repo_path.with_file_name(format!("{name}.{extension}"))
}

/// Ordered history of used branch names, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BranchLedger {
    entries: Vec<String>,
}

impl BranchLedger {
    /// Parse newline-delimited content; blank lines are skipped.
    pub fn parse(text: &str) -> Self {
        let entries: Vec<String> = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect();
        let mut ledger = Self { entries };
        ledger.truncate();
        ledger
    }

    pub fn render(&self) -> String {
        let mut out = self.entries.join("\n");
        if !out.is_empty() {
            out.push('\n');
        }
        out
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e == name)
    }

    /// Append and keep only the most recent [`LEDGER_CAPACITY`] entries.
    pub fn record(&mut self, name: String) {
        self.entries.push(name);
        self.truncate();
    }

    fn truncate(&mut self) {
        if self.entries.len() > LEDGER_CAPACITY {
            let excess = self.entries.len() - LEDGER_CAPACITY;
            self.entries.drain(..excess);
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(text) => Ok(Self::parse(&text)),
            Err(e) if e.kind() == IoErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(RemedyError::io(path, e)),
        }
    }

    /// Write via a temporary file and rename.
    pub fn store(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| RemedyError::io(parent, e))?;
        }
        let tmp = path.with_extension("branches.tmp");
        fs::write(&tmp, self.render()).map_err(|e| RemedyError::io(&tmp, e))?;
        fs::rename(&tmp, path).map_err(|e| RemedyError::io(path, e))
    }
}

/// Exclusive lock released on drop.
struct LedgerLock {
    file: fs::File,
}

impl LedgerLock {
    fn acquire(path: &Path, timeout: Duration) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| RemedyError::io(parent, e))?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| RemedyError::io(path, e))?;

        let start = Instant::now();
        loop {
            match FileExt::try_lock_exclusive(&file) {
                Ok(()) => return Ok(Self { file }),
                Err(err) if err.kind() == IoErrorKind::WouldBlock || is_contended(&err) => {
                    if start.elapsed() >= timeout {
                        return Err(RemedyError::Lock {
                            path: path.to_path_buf(),
                            reason: format!("timed out after {}ms", timeout.as_millis()),
                        });
                    }
                    std::thread::sleep(LOCK_RETRY);
                }
                Err(err) => {
                    return Err(RemedyError::Lock {
                        path: path.to_path_buf(),
                        reason: err.to_string(),
                    })
                }
            }
        }
    }
}

fn is_contended(err: &std::io::Error) -> bool {
    err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

impl Drop for LedgerLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

type SuffixSource = Arc<Mutex<dyn FnMut() -> u16 + Send>>;

/// Produces `<prefix>-<NNNN>` names unused in the repository's ledger.
#[derive(Clone)]
pub struct BranchAllocator {
    prefix: String,
    next_suffix: SuffixSource,
    lock_timeout: Duration,
}

impl std::fmt::Debug for BranchAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BranchAllocator")
            .field("prefix", &self.prefix)
            .finish()
    }
}

impl BranchAllocator {
    /// Random 4-digit suffixes from an entropy-seeded generator.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self::from_rng(prefix, StdRng::from_entropy())
    }

    /// Deterministic suffixes for a given seed.
    pub fn seeded(prefix: impl Into<String>, seed: u64) -> Self {
        Self::from_rng(prefix, StdRng::seed_from_u64(seed))
    }

    fn from_rng(prefix: impl Into<String>, mut rng: StdRng) -> Self {
        Self::with_suffixes(prefix, move || rng.gen_range(1000..=9999))
    }

    /// Custom suffix source; values are rendered zero-padded to 4 digits.
    pub fn with_suffixes<F>(prefix: impl Into<String>, source: F) -> Self
    where
        F: FnMut() -> u16 + Send + 'static,
    {
        Self {
            prefix: prefix.into(),
            next_suffix: Arc::new(Mutex::new(source)),
            lock_timeout: LOCK_TIMEOUT,
        }
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Allocate a fresh branch name for `repo` and persist it.
    pub async fn allocate(&self, repo: &LocalRepoHandle) -> Result<String> {
        let allocator = self.clone();
        let repo_path = repo.path.clone();
        tokio::task::spawn_blocking(move || allocator.allocate_blocking(&repo_path))
            .await
            .map_err(|e| RemedyError::Internal(format!("ledger task failed: {e}")))?
    }

    /// Blocking allocation for the working copy at `repo_path`.
    pub fn allocate_blocking(&self, repo_path: &Path) -> Result<String> {
        let ledger_path = ledger_path_for(repo_path);
        let _lock = LedgerLock::acquire(&lock_path_for(repo_path), self.lock_timeout)?;

        let mut ledger = BranchLedger::load(&ledger_path)?;
        for attempt in 1..=MAX_ATTEMPTS {
            let candidate = format!("{}-{:04}", self.prefix, self.suffix()?);
            if ledger.contains(&candidate) {
                debug!(candidate = %candidate, attempt, "Branch name already used");
                continue;
            }
            ledger.record(candidate.clone());
            ledger.store(&ledger_path)?;
            debug!(branch = %candidate, entries = ledger.len(), "Allocated branch name");
            return Ok(candidate);
        }

        warn!(ledger = %ledger_path.display(), "Branch name space exhausted for this attempt");
        Err(RemedyError::AllocationExhausted {
            attempts: MAX_ATTEMPTS,
        })
    }

    fn suffix(&self) -> Result<u16> {
        let mut next = self
            .next_suffix
            .lock()
            .map_err(|_| RemedyError::Internal("branch suffix source poisoned".to_string()))?;
        Ok((&mut *next)() % 10_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sequence(values: Vec<u16>) -> impl FnMut() -> u16 + Send + 'static {
        let mut iter = values.into_iter().cycle();
        move || iter.next().unwrap_or(1000)
    }

    #[test]
    fn test_parse_skips_blank_lines_and_caps() {
        let text = (0..15)
            .map(|i| format!("remedy-patch-{:04}\n\n", 1000 + i))
            .collect::<String>();
        let ledger = BranchLedger::parse(&text);
        assert_eq!(ledger.len(), LEDGER_CAPACITY);
        assert_eq!(ledger.entries()[0], "remedy-patch-1005");
        assert_eq!(ledger.entries()[9], "remedy-patch-1014");
    }

    #[test]
    fn test_record_drops_oldest() {
        let mut ledger = BranchLedger::default();
        for i in 0..12 {
            ledger.record(format!("b-{i}"));
        }
        assert_eq!(ledger.len(), LEDGER_CAPACITY);
        assert!(!ledger.contains("b-0"));
        assert!(!ledger.contains("b-1"));
        assert!(ledger.contains("b-11"));
        assert_eq!(ledger.render().lines().count(), LEDGER_CAPACITY);
    }

    #[test]
    fn test_missing_ledger_loads_empty() {
        let dir = tempdir().unwrap();
        let ledger = BranchLedger::load(&dir.path().join("absent.branches")).unwrap();
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_allocation_skips_used_names() {
        let dir = tempdir().unwrap();
        let repo = dir.path().join("demo");
        BranchLedger::parse("remedy-patch-1111\n")
            .store(&ledger_path_for(&repo))
            .unwrap();

        let allocator = BranchAllocator::with_suffixes("remedy-patch", sequence(vec![1111, 2222]));
        let name = allocator.allocate_blocking(&repo).unwrap();
        assert_eq!(name, "remedy-patch-2222");

        let ledger = BranchLedger::load(&ledger_path_for(&repo)).unwrap();
        assert_eq!(ledger.entries(), ["remedy-patch-1111", "remedy-patch-2222"]);
    }

    #[test]
    fn test_exhaustion_after_bounded_attempts() {
        let dir = tempdir().unwrap();
        let repo = dir.path().join("demo");
        let allocator = BranchAllocator::with_suffixes("remedy-patch", || 4242);

        assert_eq!(allocator.allocate_blocking(&repo).unwrap(), "remedy-patch-4242");
        let err = allocator.allocate_blocking(&repo).unwrap_err();
        assert!(matches!(err, RemedyError::AllocationExhausted { attempts: 10 }));

        let ledger = BranchLedger::load(&ledger_path_for(&repo)).unwrap();
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_ten_allocations_are_distinct_and_ledger_stays_capped() {
        let dir = tempdir().unwrap();
        let repo = dir.path().join("demo");
        let allocator = BranchAllocator::seeded("remedy-patch", 7);

        let mut names = Vec::new();
        for _ in 0..LEDGER_CAPACITY {
            let name = allocator.allocate_blocking(&repo).unwrap();
            assert!(!names.contains(&name));
            let suffix = name.trim_start_matches("remedy-patch-");
            assert_eq!(suffix.len(), 4);
            assert!(suffix.parse::<u16>().map(|n| n >= 1000).unwrap_or(false));
            names.push(name);
            assert!(BranchLedger::load(&ledger_path_for(&repo)).unwrap().len() <= LEDGER_CAPACITY);
        }

        for _ in 0..5 {
            allocator.allocate_blocking(&repo).unwrap();
        }
        assert_eq!(
            BranchLedger::load(&ledger_path_for(&repo)).unwrap().len(),
            LEDGER_CAPACITY
        );
    }

    #[test]
    fn test_lock_timeout_when_held() {
        let dir = tempdir().unwrap();
        let repo = dir.path().join("demo");
        let _held = LedgerLock::acquire(&lock_path_for(&repo), LOCK_TIMEOUT).unwrap();

        let allocator = BranchAllocator::seeded("remedy-patch", 1)
            .with_lock_timeout(Duration::from_millis(100));
        let err = allocator.allocate_blocking(&repo).unwrap_err();
        assert!(matches!(err, RemedyError::Lock { .. }));
    }
}
