//! `diff`: compare the stored results of two recorded calls.

use std::error::Error;
use std::io::Write;

use debug_cache::{CacheError, DebugCache, Fingerprint, Value, Verdict};

use crate::context::open_cache;
use crate::{DiffArgs, GlobalArgs};

/// Prints the comparator's explanation of how `new` differs from `old`.
///
/// Exits with 0 when the results are equal and 1 when they differ.
pub fn run(
    args: &DiffArgs,
    global: &GlobalArgs,
    out: &mut dyn Write,
) -> Result<i32, Box<dyn Error>> {
    let cache = open_cache(global)?;
    let old = stored_result(&cache, &args.function, &args.old)?;
    let new = stored_result(&cache, &args.function, &args.new)?;

    match cache.comparator().compare(&old, &new)? {
        Verdict::Equal => {
            writeln!(out, "results are equal")?;
            Ok(0)
        }
        Verdict::Differs(lines) => {
            for line in lines {
                writeln!(out, "{line}")?;
            }
            Ok(1)
        }
    }
}

fn stored_result(
    cache: &DebugCache,
    function: &str,
    state: &str,
) -> Result<Value, CacheError> {
    let fp = Fingerprint::from_state(function, state)?;
    cache
        .store()
        .get(&fp)
        .map_err(|_| CacheError::NoSuchRecord { id: fp.id() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use debug_cache::{CacheOptions, CallArgs, ColumnData, Frame};

    fn record(cache: &DebugCache, arg: i64, x: Vec<f64>) -> String {
        let args = CallArgs::new().arg(arg);
        cache
            .memoize("load", move |_: &CallArgs| {
                Value::Frame(Frame::new().with_column("x", ColumnData::Float(x.clone())))
            })
            .call(&args)
            .unwrap();
        cache.fingerprint("load", &args).unwrap().0.state()
    }

    fn setup(dir: &std::path::Path) -> (GlobalArgs, DebugCache) {
        let config = dir.join("debug_cache.toml");
        std::fs::write(&config, "").unwrap();
        let cache = DebugCache::new(CacheOptions::at(dir.join("store"))).unwrap();
        let global = GlobalArgs {
            root: Some(dir.join("store")),
            config: Some(config),
        };
        (global, cache)
    }

    #[test]
    fn reports_differences() {
        let dir = tempfile::tempdir().unwrap();
        let (global, cache) = setup(dir.path());
        let old = record(&cache, 1, vec![1.0, 2.0]);
        let new = record(&cache, 2, vec![1.0, 2.5]);

        let args = DiffArgs {
            function: "load".to_string(),
            old,
            new,
        };
        let mut out = Vec::new();
        assert_eq!(run(&args, &global, &mut out).unwrap(), 1);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Column x has 1 differing value(s)\n  first one is at index 1, changed from 2.0 to 2.5\n"
        );
    }

    #[test]
    fn equal_within_tolerance() {
        let dir = tempfile::tempdir().unwrap();
        let (global, cache) = setup(dir.path());
        let old = record(&cache, 1, vec![1.0]);
        let new = record(&cache, 2, vec![1.001]);
        let args = DiffArgs {
            function: "load".to_string(),
            old,
            new,
        };
        let mut out = Vec::new();
        assert_eq!(run(&args, &global, &mut out).unwrap(), 0);
    }

    #[test]
    fn missing_record_fails() {
        let dir = tempfile::tempdir().unwrap();
        let (global, cache) = setup(dir.path());
        let old = record(&cache, 1, vec![1.0]);
        let args = DiffArgs {
            function: "load".to_string(),
            old: old.clone(),
            new: old.replace("1.", "9."),
        };
        let mut out = Vec::new();
        assert!(run(&args, &global, &mut out).is_err());
    }
}
