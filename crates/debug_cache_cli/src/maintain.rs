//! `rm` and `gc`: removing records.

use std::error::Error;
use std::io::Write;

use debug_cache::{CacheError, Fingerprint, Retention};
use tracing::warn;

use crate::context::open_cache;
use crate::GlobalArgs;

/// Removes one recorded call.
pub fn rm(
    function: &str,
    state: &str,
    global: &GlobalArgs,
    out: &mut dyn Write,
) -> Result<i32, Box<dyn Error>> {
    let cache = open_cache(global)?;
    let fp = Fingerprint::from_state(function, state)?;
    if !cache.store().has_record(&fp) {
        return Err(CacheError::NoSuchRecord { id: fp.id() }.into());
    }
    cache.store().purge(&fp);
    writeln!(out, "removed {fp}")?;
    Ok(0)
}

/// Removes every expired record, optionally for one function only.
pub fn gc(
    function: Option<&str>,
    global: &GlobalArgs,
    out: &mut dyn Write,
) -> Result<i32, Box<dyn Error>> {
    let cache = open_cache(global)?;
    if cache.store().retention() == Retention::Permanent {
        warn!("no ttl configured, records never expire");
        writeln!(out, "removed 0 expired records")?;
        return Ok(0);
    }
    let removed = cache.store().purge_expired(function)?;
    writeln!(out, "removed {removed} expired records")?;
    Ok(0)
}
