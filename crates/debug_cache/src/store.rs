//! On-disk call records.
//!
//! Each call is stored in its own directory:
//!
//! ```text
//! <root>/<function>/<label>.<hash>/
//!   a0, a1, ...   # positional arguments, by index
//!   k<name>       # one file per named argument
//!   out           # the result, once computed
//! ```
//!
//! Argument files and the initial result are created exclusively, so two
//! processes racing on the same record never interleave writes; the loser's
//! write is dropped with a warning. Reads are fail-safe: a missing, partial,
//! corrupt or expired result is a [`CacheMiss`], never an error.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tracing::{debug, warn};

use crate::codec::Codec;
use crate::error::{CacheError, CacheMiss};
use crate::fingerprint::{validate_function_name, Fingerprint, SerializedCall};
use crate::value::{CallArgs, Value};

/// Name of the result file within a record directory.
pub const RESULT_FILE: &str = "out";

/// File name prefix for positional arguments.
const POSITIONAL_PREFIX: &str = "a";

/// File name prefix for named arguments.
const NAMED_PREFIX: &str = "k";

/// Prefix of in-flight result files; never read as part of a record.
const TEMP_PREFIX: &str = ".out.";

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// How long stored results stay valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Retention {
    /// Results are kept until explicitly deleted.
    #[default]
    Permanent,
    /// Results expire this long after they were written.
    ///
    /// Expiry is recorded as the result file's modification time, set in the
    /// future, and checked lazily on read.
    Ttl(Duration),
}

/// Filesystem-backed store of call records.
pub struct CallStore {
    root: PathBuf,
    retention: Retention,
    codec: Arc<dyn Codec>,
}

impl CallStore {
    /// Creates a store rooted at `root` with permanent retention.
    ///
    /// Nothing is created on disk until the first write.
    pub fn new(root: impl Into<PathBuf>, codec: Arc<dyn Codec>) -> Self {
        Self {
            root: root.into(),
            retention: Retention::Permanent,
            codec,
        }
    }

    /// Sets the retention policy.
    pub fn with_retention(mut self, retention: Retention) -> Self {
        self.retention = retention;
        self
    }

    /// Returns the root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the retention policy.
    pub fn retention(&self) -> Retention {
        self.retention
    }

    /// Returns the record directory for a fingerprint.
    pub fn record_dir(&self, fp: &Fingerprint) -> PathBuf {
        self.root.join(fp.function()).join(fp.state())
    }

    /// Returns the path of a fingerprint's result file.
    pub fn result_path(&self, fp: &Fingerprint) -> PathBuf {
        self.record_dir(fp).join(RESULT_FILE)
    }

    /// Returns `true` if a record directory exists for the fingerprint,
    /// whether or not it has a result yet.
    pub fn has_record(&self, fp: &Fingerprint) -> bool {
        self.record_dir(fp).is_dir()
    }

    /// Looks up the stored result for a fingerprint.
    ///
    /// Under [`Retention::Ttl`] an expired record is purged before the miss
    /// is reported.
    pub fn get(&self, fp: &Fingerprint) -> Result<Value, CacheMiss> {
        let path = self.result_path(fp);
        let meta = fs::metadata(&path).map_err(|e| miss_from_io(&e))?;

        if let Retention::Ttl(_) = self.retention {
            let expires_at = meta.modified().map_err(|e| miss_from_io(&e))?;
            if expires_at < SystemTime::now() {
                debug!(id = %fp, "stored result expired");
                self.purge(fp);
                return Err(CacheMiss::Expired);
            }
        }

        let bytes = fs::read(&path).map_err(|e| miss_from_io(&e))?;
        self.codec
            .deserialize(&bytes)
            .map_err(|e| CacheMiss::Corrupt {
                reason: e.to_string(),
            })
    }

    /// Writes a call record: every argument, plus the result if given.
    ///
    /// Files that already exist are left untouched (a concurrent writer got
    /// there first) and logged as race losses; the number of such files is
    /// returned. Use [`put_result`](Self::put_result) to replace a result.
    pub fn put(
        &self,
        fp: &Fingerprint,
        call: &SerializedCall,
        result: Option<&[u8]>,
    ) -> Result<usize, CacheError> {
        for (name, _) in &call.named {
            validate_arg_name(name)?;
        }

        let dir = self.record_dir(fp);
        fs::create_dir_all(&dir).map_err(|e| CacheError::Io {
            path: dir.clone(),
            source: e,
        })?;

        let mut kept = 0;
        for (i, bytes) in call.positional.iter().enumerate() {
            let path = dir.join(format!("{POSITIONAL_PREFIX}{i}"));
            kept += usize::from(!self.write_exclusive(&path, bytes, false)?);
        }
        for (name, bytes) in &call.named {
            let path = dir.join(format!("{NAMED_PREFIX}{name}"));
            kept += usize::from(!self.write_exclusive(&path, bytes, false)?);
        }
        if let Some(result) = result {
            kept += usize::from(!self.write_exclusive(&dir.join(RESULT_FILE), result, true)?);
        }

        debug!(id = %fp, kept, "stored call record");
        Ok(kept)
    }

    /// Writes or replaces only the result file of a record.
    ///
    /// The result is written to a temporary file and renamed into place, so
    /// readers see either the old or the new result in full.
    pub fn put_result(&self, fp: &Fingerprint, result: &[u8]) -> Result<(), CacheError> {
        let dir = self.record_dir(fp);
        fs::create_dir_all(&dir).map_err(|e| CacheError::Io {
            path: dir.clone(),
            source: e,
        })?;

        let seq = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let temp = dir.join(format!("{TEMP_PREFIX}{}.{seq}", std::process::id()));
        let written = File::create(&temp)
            .and_then(|mut file| {
                file.write_all(result)?;
                self.stamp_expiry(&file)
            })
            .and_then(|()| fs::rename(&temp, dir.join(RESULT_FILE)));

        if let Err(e) = written {
            let _ = fs::remove_file(&temp);
            return Err(CacheError::Io {
                path: dir.join(RESULT_FILE),
                source: e,
            });
        }

        debug!(id = %fp, "stored result");
        Ok(())
    }

    /// Reads back the arguments of a stored record.
    pub fn load_inputs(&self, fp: &Fingerprint) -> Result<CallArgs, CacheError> {
        let dir = self.record_dir(fp);
        let entries = fs::read_dir(&dir).map_err(|e| match e.kind() {
            ErrorKind::NotFound => CacheError::NoSuchRecord { id: fp.id() },
            _ => CacheError::Io {
                path: dir.clone(),
                source: e,
            },
        })?;

        let mut positional: Vec<(usize, PathBuf)> = Vec::new();
        let mut named: Vec<(String, PathBuf)> = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| CacheError::Io {
                path: dir.clone(),
                source: e,
            })?;
            let Some(file_name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if let Some(index) = file_name.strip_prefix(POSITIONAL_PREFIX) {
                if let Ok(index) = index.parse::<usize>() {
                    positional.push((index, entry.path()));
                }
            } else if let Some(name) = file_name.strip_prefix(NAMED_PREFIX) {
                named.push((name.to_string(), entry.path()));
            }
        }
        positional.sort_by_key(|(index, _)| *index);
        named.sort();

        let positional = positional
            .iter()
            .map(|(_, path)| self.read_value(path))
            .collect::<Result<Vec<_>, _>>()?;
        let named = named
            .into_iter()
            .map(|(name, path)| Ok((name, self.read_value(&path)?)))
            .collect::<Result<Vec<_>, CacheError>>()?;
        Ok(CallArgs::from_parts(positional, named))
    }

    /// Removes a record's result file, and its directory if that leaves it
    /// empty. Errors are ignored.
    pub fn delete(&self, fp: &Fingerprint) {
        let dir = self.record_dir(fp);
        if fs::remove_file(dir.join(RESULT_FILE)).is_ok() {
            debug!(id = %fp, "deleted stored result");
        }
        let _ = fs::remove_dir(&dir);
    }

    /// Removes a whole record directory. Errors are ignored.
    pub fn purge(&self, fp: &Fingerprint) {
        if fs::remove_dir_all(self.record_dir(fp)).is_ok() {
            debug!(id = %fp, "purged call record");
        }
    }

    /// Lists the function directories under the root, sorted.
    pub fn list_functions(&self) -> Result<Vec<String>, CacheError> {
        list_dirs(&self.root)
    }

    /// Lists the stored states of a function, sorted.
    ///
    /// A function that has never been cached has no states.
    pub fn list_states(&self, function: &str) -> Result<Vec<String>, CacheError> {
        validate_function_name(function)?;
        list_dirs(&self.root.join(function))
    }

    /// Purges every record whose result has expired, optionally restricted
    /// to one function. Returns the number of records removed.
    ///
    /// Reads already purge expired records lazily; this is only a manual
    /// sweep. Under [`Retention::Permanent`] nothing expires.
    pub fn purge_expired(&self, function: Option<&str>) -> Result<usize, CacheError> {
        if self.retention == Retention::Permanent {
            return Ok(0);
        }
        let functions = match function {
            Some(f) => vec![f.to_string()],
            None => self.list_functions()?,
        };

        let now = SystemTime::now();
        let mut removed = 0;
        for function in &functions {
            for state in self.list_states(function)? {
                let Ok(fp) = Fingerprint::from_state(function, &state) else {
                    continue;
                };
                let expired = fs::metadata(self.result_path(&fp))
                    .and_then(|m| m.modified())
                    .is_ok_and(|expires_at| expires_at < now);
                if expired {
                    self.purge(&fp);
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }

    fn read_value(&self, path: &Path) -> Result<Value, CacheError> {
        let bytes = fs::read(path).map_err(|e| CacheError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(self.codec.deserialize(&bytes)?)
    }

    /// Creates `path` exclusively and writes `bytes` to it. Returns `false`
    /// if the file already existed.
    fn write_exclusive(&self, path: &Path, bytes: &[u8], expiring: bool) -> Result<bool, CacheError> {
        let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                warn!(path = %path.display(), "cache file already exists, keeping existing data");
                return Ok(false);
            }
            Err(e) => {
                return Err(CacheError::Io {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        };

        let written = file.write_all(bytes).and_then(|()| {
            if expiring {
                self.stamp_expiry(&file)
            } else {
                Ok(())
            }
        });
        if let Err(e) = written {
            drop(file);
            let _ = fs::remove_file(path);
            return Err(CacheError::Io {
                path: path.to_path_buf(),
                source: e,
            });
        }
        Ok(true)
    }

    fn stamp_expiry(&self, file: &File) -> std::io::Result<()> {
        match self.retention {
            Retention::Permanent => Ok(()),
            Retention::Ttl(ttl) => {
                let expires_at = SystemTime::now().checked_add(ttl).ok_or_else(|| {
                    std::io::Error::new(ErrorKind::InvalidInput, "ttl overflows the system clock")
                })?;
                file.set_modified(expires_at)
            }
        }
    }
}

fn miss_from_io(e: &std::io::Error) -> CacheMiss {
    match e.kind() {
        ErrorKind::NotFound => CacheMiss::NotFound,
        _ => CacheMiss::Corrupt {
            reason: e.to_string(),
        },
    }
}

fn validate_arg_name(name: &str) -> Result<(), CacheError> {
    if name.is_empty() || name.contains(['/', '\\', '\0']) {
        return Err(CacheError::InvalidArgName {
            name: name.to_string(),
        });
    }
    Ok(())
}

fn list_dirs(dir: &Path) -> Result<Vec<String>, CacheError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(CacheError::Io {
                path: dir.to_path_buf(),
                source: e,
            })
        }
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| CacheError::Io {
            path: dir.to_path_buf(),
            source: e,
        })?;
        if entry.file_type().is_ok_and(|t| t.is_dir()) {
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}
