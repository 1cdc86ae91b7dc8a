//! Callbacks invoked when a checked call does not match its baseline.

use crate::fingerprint::Fingerprint;
use crate::value::Value;

/// Why a checked call was reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MismatchKind {
    /// No baseline was recorded for this call yet.
    MissingBaseline,
    /// The fresh result differs from the recorded baseline.
    Drift,
}

/// Everything a hook needs to inspect one mismatch.
#[derive(Debug)]
pub struct Mismatch<'a> {
    /// The call that was checked.
    pub fingerprint: &'a Fingerprint,
    /// The kind of mismatch.
    pub kind: MismatchKind,
    /// Diff explanation lines; empty for a missing baseline.
    pub explanation: &'a [String],
    /// The stored result, if there was one.
    pub baseline: Option<&'a Value>,
    /// The freshly computed result.
    pub current: &'a Value,
}

/// What the cache should do after a hook has seen a mismatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HookAction {
    /// Leave the store untouched.
    #[default]
    Keep,
    /// Make the current result the new baseline.
    AcceptNew,
}

/// Inspects mismatches between a baseline and a fresh result.
///
/// Called at most once per checked call, after the explanation has been
/// logged.
pub trait InspectionHook: Send + Sync {
    /// Handles one mismatch.
    fn on_mismatch(&self, mismatch: &Mismatch<'_>) -> HookAction;
}

/// Does nothing and keeps the baseline.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHook;

impl InspectionHook for NoopHook {
    fn on_mismatch(&self, _mismatch: &Mismatch<'_>) -> HookAction {
        HookAction::Keep
    }
}

/// Accepts every fresh result as the new baseline.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAllHook;

impl InspectionHook for AcceptAllHook {
    fn on_mismatch(&self, _mismatch: &Mismatch<'_>) -> HookAction {
        HookAction::AcceptNew
    }
}

/// Adapts a closure into a hook.
pub struct FnHook<F>(F);

impl<F> FnHook<F>
where
    F: Fn(&Mismatch<'_>) -> HookAction + Send + Sync,
{
    /// Wraps `f`.
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> InspectionHook for FnHook<F>
where
    F: Fn(&Mismatch<'_>) -> HookAction + Send + Sync,
{
    fn on_mismatch(&self, mismatch: &Mismatch<'_>) -> HookAction {
        (self.0)(mismatch)
    }
}
