//! The cache engine: memoized, checked and replayed calls.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::codec::{BincodeCodec, Codec};
use crate::compare::{Comparator, Verdict};
use crate::error::CacheError;
use crate::fingerprint::{self, Fingerprint, SerializedCall};
use crate::hook::{HookAction, InspectionHook, Mismatch, MismatchKind, NoopHook};
use crate::options::{self, CacheOptions};
use crate::store::CallStore;
use crate::value::{CallArgs, Value};

/// A cache rooted at one directory, shared by every wrapped function.
pub struct DebugCache {
    store: CallStore,
    comparator: Comparator,
    codec: Arc<dyn Codec>,
    hook: Arc<dyn InspectionHook>,
    strict: bool,
    substitutions: BTreeMap<String, Fingerprint>,
}

/// Outcome of one checked call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckStatus {
    /// The fresh result matched the baseline.
    Matched,
    /// The fresh result differs; the lines explain how.
    Drifted(Vec<String>),
    /// No baseline existed and the call was reported.
    MissingBaseline,
    /// No baseline existed and the fresh result was recorded as one.
    Recorded,
}

/// Full report of a checked or replayed call.
#[derive(Debug, Clone)]
pub struct CheckReport {
    /// The record the result was compared against.
    pub fingerprint: Fingerprint,
    /// What happened.
    pub status: CheckStatus,
    /// The stored result, if there was one.
    pub baseline: Option<Value>,
    /// The freshly computed result.
    pub current: Value,
    /// Whether the stored baseline was created or replaced.
    pub baseline_updated: bool,
}

impl CheckReport {
    /// Returns `true` if the fresh result matched its baseline.
    pub fn is_match(&self) -> bool {
        self.status == CheckStatus::Matched
    }
}

/// What a settled check may write back.
#[derive(Clone, Copy)]
enum Persist<'a> {
    /// The record may not exist yet; create it from these arguments.
    Call(&'a SerializedCall),
    /// The record exists; only its result may be replaced.
    ResultOnly,
    /// Read-only lookup, nothing is written.
    Never,
}

impl DebugCache {
    /// Creates a cache from options, using the bincode codec and a no-op hook.
    ///
    /// Fails if a substitution entry is not a valid `function/state` id.
    pub fn new(options: CacheOptions) -> Result<Self, CacheError> {
        let codec: Arc<dyn Codec> = Arc::new(BincodeCodec);
        let store = CallStore::new(options.root, codec.clone()).with_retention(options.retention);
        let comparator = Comparator::new(codec.clone())
            .with_epsilon(options.epsilon)
            .with_verbose(options.verbose);
        let mut cache = Self {
            store,
            comparator,
            codec,
            hook: Arc::new(NoopHook),
            strict: options.strict,
            substitutions: BTreeMap::new(),
        };
        for (from, to) in &options.substitutions {
            cache.register_substitution(from, to)?;
        }
        Ok(cache)
    }

    /// Replaces the codec used for arguments, results and opaque comparison.
    pub fn with_codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.store = CallStore::new(self.store.root().to_path_buf(), codec.clone())
            .with_retention(self.store.retention());
        self.comparator = Comparator::new(codec.clone())
            .with_epsilon(self.comparator.epsilon())
            .with_verbose(self.comparator.verbose());
        self.codec = codec;
        self
    }

    /// Replaces the inspection hook.
    pub fn with_hook(mut self, hook: Arc<dyn InspectionHook>) -> Self {
        self.hook = hook;
        self
    }

    /// The well-known default root, `<temp dir>/debug_cache`.
    pub fn default_root() -> std::path::PathBuf {
        options::default_root()
    }

    /// The underlying call store.
    pub fn store(&self) -> &CallStore {
        &self.store
    }

    /// The comparator used by checked calls.
    pub fn comparator(&self) -> &Comparator {
        &self.comparator
    }

    /// Fingerprints a call of `function`.
    pub fn fingerprint(
        &self,
        function: &str,
        args: &CallArgs,
    ) -> Result<(Fingerprint, SerializedCall), CacheError> {
        fingerprint::fingerprint(self.codec.as_ref(), function, args)
    }

    /// Wraps `f` so repeated calls with equal arguments reuse the stored result.
    pub fn memoize<F>(&self, function: impl Into<String>, f: F) -> Memoized<'_, F>
    where
        F: Fn(&CallArgs) -> Value,
    {
        Memoized {
            cache: self,
            function: function.into(),
            f,
        }
    }

    /// Wraps `f` so every call is recomputed and compared with its baseline.
    pub fn checked<F>(&self, function: impl Into<String>, f: F) -> Checked<'_, F>
    where
        F: Fn(&CallArgs) -> Value,
    {
        Checked {
            cache: self,
            function: function.into(),
            f,
            strict: self.strict,
        }
    }

    /// Re-runs `f` on the arguments recorded under `state` and compares the
    /// result with the recorded one.
    ///
    /// Fails with [`CacheError::NoSuchRecord`] if the record or its result is
    /// missing; `f` is not invoked in that case.
    pub fn replay<F>(&self, function: &str, state: &str, f: F) -> Result<CheckReport, CacheError>
    where
        F: Fn(&CallArgs) -> Value,
    {
        let fp = Fingerprint::from_state(function, state)?;
        let args = self.store.load_inputs(&fp)?;
        let baseline = self.store.get(&fp).map_err(|miss| {
            debug!(id = %fp, reason = %miss, "replay target has no result");
            CacheError::NoSuchRecord { id: fp.id() }
        })?;
        let current = f(&args);
        self.settle(fp, Some(baseline), current, Persist::ResultOnly)
    }

    /// Lists the stored states of `function`.
    pub fn list_states(&self, function: &str) -> Result<Vec<String>, CacheError> {
        self.store.list_states(function)
    }

    /// Loads the recorded arguments of `function` under `state`.
    pub fn load_call(&self, function: &str, state: &str) -> Result<CallArgs, CacheError> {
        let fp = Fingerprint::from_state(function, state)?;
        self.store.load_inputs(&fp)
    }

    /// Makes checked calls fingerprinted as `from` run against the recorded
    /// arguments and result of `to`. Both are `function/state` ids.
    ///
    /// Substituted calls never write to either record.
    pub fn register_substitution(&mut self, from: &str, to: &str) -> Result<(), CacheError> {
        let from = Fingerprint::parse_id(from)?;
        let to = Fingerprint::parse_id(to)?;
        debug!(from = %from, to = %to, "registered substitution");
        self.substitutions.insert(from.id(), to);
        Ok(())
    }

    /// Removes the record of one call of `function`, if any.
    pub fn invalidate(&self, function: &str, args: &CallArgs) -> Result<(), CacheError> {
        let (fp, _) = self.fingerprint(function, args)?;
        debug!(id = %fp, "invalidating record");
        self.store.purge(&fp);
        Ok(())
    }

    /// Runs `f` on the arguments recorded under `target` and compares with
    /// its result. The target is never written, so a missing result is
    /// reported as [`CheckStatus::MissingBaseline`]; only strict checks pass
    /// it to the hook.
    fn check_substituted<F>(
        &self,
        target: &Fingerprint,
        f: &F,
        strict: bool,
    ) -> Result<CheckReport, CacheError>
    where
        F: Fn(&CallArgs) -> Value,
    {
        let args = self.store.load_inputs(target)?;
        let baseline = self.store.get(target).ok();
        let current = f(&args);
        if baseline.is_none() && !strict {
            debug!(id = %target, "substituted record has no result");
            return Ok(CheckReport {
                fingerprint: target.clone(),
                status: CheckStatus::MissingBaseline,
                baseline: None,
                current,
                baseline_updated: false,
            });
        }
        self.settle(target.clone(), baseline, current, Persist::Never)
    }

    /// Compares, logs and consults the hook at most once.
    fn settle(
        &self,
        fp: Fingerprint,
        baseline: Option<Value>,
        current: Value,
        persist: Persist<'_>,
    ) -> Result<CheckReport, CacheError> {
        let Some(stored) = baseline else {
            warn!(id = %fp, "no baseline recorded");
            let action = self.hook.on_mismatch(&Mismatch {
                fingerprint: &fp,
                kind: MismatchKind::MissingBaseline,
                explanation: &[],
                baseline: None,
                current: &current,
            });
            let updated = action == HookAction::AcceptNew && self.persist(&fp, &current, persist)?;
            return Ok(CheckReport {
                fingerprint: fp,
                status: CheckStatus::MissingBaseline,
                baseline: None,
                current,
                baseline_updated: updated,
            });
        };

        let status = match self.comparator.compare(&stored, &current)? {
            Verdict::Equal => {
                debug!(id = %fp, "result matches baseline");
                CheckStatus::Matched
            }
            Verdict::Differs(lines) => {
                warn!(id = %fp, "result changed");
                for line in &lines {
                    warn!(id = %fp, "{line}");
                }
                CheckStatus::Drifted(lines)
            }
        };

        let mut updated = false;
        if let CheckStatus::Drifted(lines) = &status {
            let action = self.hook.on_mismatch(&Mismatch {
                fingerprint: &fp,
                kind: MismatchKind::Drift,
                explanation: lines,
                baseline: Some(&stored),
                current: &current,
            });
            let persist = match persist {
                Persist::Call(_) => Persist::ResultOnly,
                other => other,
            };
            updated = action == HookAction::AcceptNew && self.persist(&fp, &current, persist)?;
        }
        Ok(CheckReport {
            fingerprint: fp,
            status,
            baseline: Some(stored),
            current,
            baseline_updated: updated,
        })
    }

    /// Writes `current` as the baseline if `persist` allows it.
    fn persist(
        &self,
        fp: &Fingerprint,
        current: &Value,
        persist: Persist<'_>,
    ) -> Result<bool, CacheError> {
        let call = match persist {
            Persist::Never => {
                debug!(id = %fp, "substituted record is read-only");
                return Ok(false);
            }
            Persist::Call(call) => Some(call),
            Persist::ResultOnly => None,
        };
        if let Some(call) = call {
            self.store.put(fp, call, None)?;
        }
        let bytes = self.codec.serialize(current)?;
        self.store.put_result(fp, &bytes)?;
        debug!(id = %fp, "baseline updated");
        Ok(true)
    }
}

/// A function whose results are stored and reused.
pub struct Memoized<'c, F> {
    cache: &'c DebugCache,
    function: String,
    f: F,
}

impl<F> Memoized<'_, F>
where
    F: Fn(&CallArgs) -> Value,
{
    /// Returns the stored result, or invokes the function and stores it.
    ///
    /// A missing, corrupt or expired record is a miss; the function runs at
    /// most once per miss. When the record directory survives the miss
    /// (corrupt result, or a call that never finished) only the result is
    /// rewritten.
    pub fn call(&self, args: &CallArgs) -> Result<Value, CacheError> {
        let (fp, call) = self.cache.fingerprint(&self.function, args)?;
        match self.cache.store.get(&fp) {
            Ok(value) => {
                debug!(id = %fp, "cache hit");
                Ok(value)
            }
            Err(miss) => {
                debug!(id = %fp, reason = %miss, "cache miss");
                if !self.cache.store.has_record(&fp) {
                    self.cache.store.put(&fp, &call, None)?;
                }
                let result = (self.f)(args);
                let bytes = self.cache.codec.serialize(&result)?;
                self.cache.store.put_result(&fp, &bytes)?;
                Ok(result)
            }
        }
    }
}

/// A function whose every call is recomputed and checked against history.
pub struct Checked<'c, F> {
    cache: &'c DebugCache,
    function: String,
    f: F,
    strict: bool,
}

impl<F> Checked<'_, F>
where
    F: Fn(&CallArgs) -> Value,
{
    /// Overrides the cache's strictness for this function.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Invokes the function and compares the result with the baseline.
    ///
    /// Without a baseline, strict mode reports through the hook and
    /// non-strict mode records the result.
    pub fn check(&self, args: &CallArgs) -> Result<CheckReport, CacheError> {
        let (fp, call) = self.cache.fingerprint(&self.function, args)?;
        if let Some(target) = self.cache.substitutions.get(&fp.id()) {
            debug!(id = %fp, target = %target, "checking against substituted record");
            return self.cache.check_substituted(target, &self.f, self.strict);
        }

        let baseline = match self.cache.store.get(&fp) {
            Ok(value) => Some(value),
            Err(miss) => {
                debug!(id = %fp, reason = %miss, "no stored baseline");
                None
            }
        };
        let current = (self.f)(args);

        if baseline.is_none() && !self.strict {
            self.cache.persist(&fp, &current, Persist::Call(&call))?;
            return Ok(CheckReport {
                fingerprint: fp,
                status: CheckStatus::Recorded,
                baseline: None,
                current,
                baseline_updated: true,
            });
        }
        self.cache.settle(fp, baseline, current, Persist::Call(&call))
    }

    /// Like [`check`](Self::check), returning only the fresh result.
    pub fn call(&self, args: &CallArgs) -> Result<Value, CacheError> {
        Ok(self.check(args)?.current)
    }
}
