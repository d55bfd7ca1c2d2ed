use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Save any serializable value (an expression, a legend view, a config) as pretty JSON.
pub fn save_json<T: Serialize + ?Sized, P: AsRef<Path>>(value: &T, path: P) -> Result<()> {
    let path = path.as_ref();
    let s = serde_json::to_string_pretty(value)?;
    let mut f = File::create(path).with_context(|| format!("create {}", path.display()))?;
    f.write_all(s.as_bytes())?;
    f.write_all(b"\n")?;
    Ok(())
}
