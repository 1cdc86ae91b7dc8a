//! `functions`, `states` and `show`: read-only browsing of recorded calls.

use std::collections::BTreeMap;
use std::error::Error;
use std::io::Write;

use debug_cache::{CallArgs, Fingerprint, Frame, Value};
use serde::Serialize;

use crate::context::open_cache;
use crate::{GlobalArgs, OutputFormat, ShowArgs};

/// Prints one function name per line.
pub fn functions(global: &GlobalArgs, out: &mut dyn Write) -> Result<i32, Box<dyn Error>> {
    let cache = open_cache(global)?;
    for function in cache.store().list_functions()? {
        writeln!(out, "{function}")?;
    }
    Ok(0)
}

/// Prints one state per line.
pub fn states(
    function: &str,
    global: &GlobalArgs,
    out: &mut dyn Write,
) -> Result<i32, Box<dyn Error>> {
    let cache = open_cache(global)?;
    for state in cache.list_states(function)? {
        writeln!(out, "{state}")?;
    }
    Ok(0)
}

/// A recorded call as printed by `show --format json`.
#[derive(Debug, Serialize)]
struct ShownCall {
    id: String,
    positional: Vec<Value>,
    named: BTreeMap<String, Value>,
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    missing: Option<String>,
}

/// Prints the arguments and result of a recorded call.
///
/// A record without a readable result is still shown; the reason the result
/// is missing takes its place.
pub fn show(
    args: &ShowArgs,
    global: &GlobalArgs,
    out: &mut dyn Write,
) -> Result<i32, Box<dyn Error>> {
    let cache = open_cache(global)?;
    let fp = Fingerprint::from_state(&args.function, &args.state)?;
    let inputs = cache.store().load_inputs(&fp)?;
    let (result, missing) = match cache.store().get(&fp) {
        Ok(value) => (Some(value), None),
        Err(miss) => (None, Some(miss.to_string())),
    };

    match args.format {
        OutputFormat::Json => {
            let shown = ShownCall {
                id: fp.id(),
                positional: inputs.positional().to_vec(),
                named: inputs.named().iter().cloned().collect(),
                result,
                missing,
            };
            writeln!(out, "{}", serde_json::to_string_pretty(&shown)?)?;
        }
        OutputFormat::Text => {
            writeln!(out, "call: {}", fp.id())?;
            write_args(out, &inputs)?;
            match (result, missing) {
                (Some(value), _) => {
                    writeln!(out, "result:")?;
                    write_value(out, &value)?;
                }
                (None, reason) => {
                    writeln!(out, "result: <{}>", reason.unwrap_or_default())?;
                }
            }
        }
    }
    Ok(0)
}

fn write_args(out: &mut dyn Write, args: &CallArgs) -> std::io::Result<()> {
    if args.is_empty() {
        return writeln!(out, "arguments: none");
    }
    writeln!(out, "arguments:")?;
    for (i, value) in args.positional().iter().enumerate() {
        writeln!(out, "  [{i}] {}", value.repr())?;
    }
    for (name, value) in args.named() {
        writeln!(out, "  {name} = {}", value.repr())?;
    }
    Ok(())
}

fn write_value(out: &mut dyn Write, value: &Value) -> std::io::Result<()> {
    match value {
        Value::Frame(frame) => write_frame(out, frame),
        Value::Series(series) => {
            writeln!(out, "  {series} dtype={}", series.data.dtype())?;
            for (pos, label) in series.index.iter().enumerate() {
                let cell = series.data.get(pos).map(|v| v.repr().to_string());
                writeln!(out, "  {}  {}", label.repr(), cell.unwrap_or_default())?;
            }
            Ok(())
        }
        other => writeln!(out, "  {}", other.repr()),
    }
}

fn write_frame(out: &mut dyn Write, frame: &Frame) -> std::io::Result<()> {
    let mut header = vec![String::new()];
    header.extend(
        frame
            .columns
            .iter()
            .map(|c| format!("{} ({})", c.name, c.data.dtype())),
    );
    let mut rows = vec![header];
    for (pos, label) in frame.index.iter().enumerate() {
        let mut row = vec![label.repr().to_string()];
        row.extend(
            frame
                .columns
                .iter()
                .map(|c| c.data.get(pos).map(|v| v.repr().to_string()).unwrap_or_default()),
        );
        rows.push(row);
    }

    let widths: Vec<usize> = (0..rows[0].len())
        .map(|col| rows.iter().map(|r| r[col].chars().count()).max().unwrap_or(0))
        .collect();
    for row in &rows {
        let cells: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect();
        writeln!(out, "  {}", cells.join("  ").trim_end())?;
    }
    Ok(())
}
