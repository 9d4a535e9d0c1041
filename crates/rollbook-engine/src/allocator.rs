//! UID number allocation
//!
//! A single counter file holds the next free UID number. Allocation takes
//! an exclusive non-blocking `flock` on the file, reads the value, and
//! only advances the counter once the caller has successfully used the
//! number. The lease is held across the caller's directory write, so two
//! concurrent registrations can never hand out the same number; a crash
//! between read and commit loses the number (a gap), never duplicates it.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

/// How often a contended lock is retried, and how many times.
const LOCK_RETRY_DELAY: Duration = Duration::from_millis(500);
const LOCK_RETRY_LIMIT: u32 = 20;

#[derive(Debug, thiserror::Error)]
pub enum CounterError {
    #[error("could not open counter file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("could not lock counter file {path} after {attempts} attempts, try again later")]
    LockExhausted { path: PathBuf, attempts: u32 },

    #[error("counter file {path} is unreadable: {message}")]
    Corrupt { path: PathBuf, message: String },

    #[error("could not update counter file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("counter file {path} already exists")]
    AlreadyInitialized { path: PathBuf },
}

impl CounterError {
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            CounterError::Open { .. } => "COUNTER_OPEN",
            CounterError::LockExhausted { .. } => "COUNTER_LOCK_EXHAUSTED",
            CounterError::Corrupt { .. } => "COUNTER_CORRUPT",
            CounterError::Write { .. } => "COUNTER_WRITE",
            CounterError::AlreadyInitialized { .. } => "COUNTER_ALREADY_INITIALIZED",
        }
    }
}

/// The shared next-UID counter file.
#[derive(Debug, Clone)]
pub struct UidCounter {
    path: PathBuf,
    retry_limit: u32,
    retry_delay: Duration,
}

impl UidCounter {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            retry_limit: LOCK_RETRY_LIMIT,
            retry_delay: LOCK_RETRY_DELAY,
        }
    }

    /// Override the lock retry budget. The defaults suit interactive use;
    /// tests shrink them.
    #[must_use]
    pub fn with_retry(mut self, limit: u32, delay: Duration) -> Self {
        self.retry_limit = limit;
        self.retry_delay = delay;
        self
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the counter file with an initial value. Refuses to clobber
    /// an existing counter.
    pub fn initialize(&self, next: u32) -> Result<(), CounterError> {
        if self.path.exists() {
            return Err(CounterError::AlreadyInitialized {
                path: self.path.clone(),
            });
        }
        let mut file = File::create(&self.path).map_err(|source| CounterError::Open {
            path: self.path.clone(),
            source,
        })?;
        write_value(&mut file, next).map_err(|source| CounterError::Write {
            path: self.path.clone(),
            source,
        })
    }

    /// Read the counter without taking the lock. Racy by nature; only for
    /// display.
    pub fn peek(&self) -> Result<u32, CounterError> {
        let mut file = self.open()?;
        self.read_value(&mut file)
    }

    /// Take the exclusive lock and read the next free number.
    ///
    /// Retries a contended lock every 500ms, giving up after 20 attempts
    /// so a wedged holder cannot block registration forever.
    ///
    /// # Errors
    ///
    /// [`CounterError::LockExhausted`] once the retry budget is spent;
    /// [`CounterError::Corrupt`] if the file does not hold an integer.
    pub fn acquire(&self) -> Result<UidLease, CounterError> {
        let file = self.open()?;
        let mut attempts = 0;
        loop {
            match try_flock_exclusive(&file) {
                Ok(true) => break,
                Ok(false) => {
                    attempts += 1;
                    if attempts >= self.retry_limit {
                        return Err(CounterError::LockExhausted {
                            path: self.path.clone(),
                            attempts,
                        });
                    }
                    debug!(path = %self.path.display(), attempts, "counter file locked, retrying");
                    std::thread::sleep(self.retry_delay);
                }
                Err(source) => {
                    return Err(CounterError::Open {
                        path: self.path.clone(),
                        source,
                    })
                }
            }
        }

        let mut file = file;
        let value = self.read_value(&mut file)?;
        Ok(UidLease {
            file,
            path: self.path.clone(),
            value,
        })
    }

    fn open(&self) -> Result<File, CounterError> {
        OpenOptions::new()
            .read(true)
            .write(true)
            .open(&self.path)
            .map_err(|source| CounterError::Open {
                path: self.path.clone(),
                source,
            })
    }

    fn read_value(&self, file: &mut File) -> Result<u32, CounterError> {
        let mut raw = String::new();
        file.rewind().and_then(|()| file.read_to_string(&mut raw)).map_err(|e| {
            CounterError::Corrupt {
                path: self.path.clone(),
                message: e.to_string(),
            }
        })?;
        raw.trim().parse().map_err(|_| CounterError::Corrupt {
            path: self.path.clone(),
            message: format!("expected an integer, found '{}'", raw.trim()),
        })
    }
}

/// An acquired allocation: the number to hand out plus the held lock.
///
/// Call [`UidLease::commit`] after the number has been durably used;
/// dropping the lease without committing releases the lock with the
/// counter unchanged, so the number is handed out again next time.
#[derive(Debug)]
#[must_use = "an uncommitted lease leaves the counter unadvanced"]
pub struct UidLease {
    file: File,
    path: PathBuf,
    value: u32,
}

impl UidLease {
    /// The allocated UID number.
    #[must_use]
    pub fn value(&self) -> u32 {
        self.value
    }

    /// Advance the counter past the allocated number and release the
    /// lock. Consumes the lease.
    pub fn commit(mut self) -> Result<(), CounterError> {
        write_value(&mut self.file, self.value + 1).map_err(|source| CounterError::Write {
            path: self.path.clone(),
            source,
        })
        // Dropping self closes the file, releasing the flock.
    }
}

fn write_value(file: &mut File, value: u32) -> io::Result<()> {
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    file.write_all(format!("{value}\n").as_bytes())?;
    file.sync_data()
}

/// Non-blocking exclusive flock. `Ok(false)` means another process holds
/// the lock.
fn try_flock_exclusive(file: &File) -> io::Result<bool> {
    use std::os::unix::io::AsRawFd;
    let fd = file.as_raw_fd();
    // SAFETY: fd is a valid descriptor owned by `file` for the duration
    // of the call.
    let result = unsafe { libc::flock(fd, libc::LOCK_EX | libc::LOCK_NB) };
    if result == 0 {
        return Ok(true);
    }
    let err = io::Error::last_os_error();
    if err.kind() == io::ErrorKind::WouldBlock || err.raw_os_error() == Some(libc::EWOULDBLOCK) {
        return Ok(false);
    }
    Err(err)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter_in(dir: &tempfile::TempDir) -> UidCounter {
        UidCounter::new(dir.path().join("next_uid.txt"))
    }

    #[test]
    fn test_initialize_and_peek() {
        let dir = tempfile::tempdir().unwrap();
        let counter = counter_in(&dir);
        counter.initialize(10_500).unwrap();
        assert_eq!(counter.peek().unwrap(), 10_500);

        let err = counter.initialize(1).unwrap_err();
        assert!(matches!(err, CounterError::AlreadyInitialized { .. }));
    }

    #[test]
    fn test_commit_advances() {
        let dir = tempfile::tempdir().unwrap();
        let counter = counter_in(&dir);
        counter.initialize(10_500).unwrap();

        let lease = counter.acquire().unwrap();
        assert_eq!(lease.value(), 10_500);
        lease.commit().unwrap();
        assert_eq!(counter.peek().unwrap(), 10_501);
    }

    #[test]
    fn test_abandoned_lease_leaves_counter() {
        let dir = tempfile::tempdir().unwrap();
        let counter = counter_in(&dir);
        counter.initialize(42).unwrap();

        let lease = counter.acquire().unwrap();
        assert_eq!(lease.value(), 42);
        drop(lease);

        // Same number offered again; nothing was consumed.
        let lease = counter.acquire().unwrap();
        assert_eq!(lease.value(), 42);
        lease.commit().unwrap();
        assert_eq!(counter.peek().unwrap(), 43);
    }

    #[test]
    fn test_missing_file_is_open_error() {
        let dir = tempfile::tempdir().unwrap();
        let counter = counter_in(&dir);
        assert!(matches!(
            counter.acquire(),
            Err(CounterError::Open { .. })
        ));
    }

    #[test]
    fn test_garbage_content_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let counter = counter_in(&dir);
        std::fs::write(counter.path(), "not a number\n").unwrap();
        assert!(matches!(
            counter.acquire(),
            Err(CounterError::Corrupt { .. })
        ));
    }

    #[test]
    fn test_contended_lock_exhausts_and_counter_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let counter = counter_in(&dir);
        counter.initialize(7_000).unwrap();

        // flock conflicts across file descriptions, so a second acquire
        // in-process behaves like another holder.
        let held = counter.acquire().unwrap();
        let contender = counter
            .clone()
            .with_retry(3, Duration::from_millis(1));
        let err = contender.acquire().unwrap_err();
        assert!(matches!(err, CounterError::LockExhausted { attempts: 3, .. }));

        drop(held);
        assert_eq!(counter.peek().unwrap(), 7_000);
    }
}
