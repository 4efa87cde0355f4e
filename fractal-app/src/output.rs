use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Writes `value` as JSON to `output`, or to stdout when no path is given.
/// A trailing newline is always written.
pub fn write_json<T: Serialize>(value: &T, output: Option<&Path>, pretty: bool) -> Result<()> {
    match output {
        Some(path) => {
            log::info!("Writing response to {:?}...", path);
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {path:?}"))?;
            let mut writer = BufWriter::new(file);
            write_to(&mut writer, value, pretty)?;
            writer
                .flush()
                .context("Failed to flush writer for output file")?;
            log::info!("Successfully wrote response to {:?}", path);
        }
        None => {
            let stdout = io::stdout();
            let mut writer = stdout.lock();
            write_to(&mut writer, value, pretty)?;
            writer.flush().context("Failed to flush stdout")?;
        }
    }
    Ok(())
}

fn write_to<W: Write, T: Serialize>(writer: &mut W, value: &T, pretty: bool) -> Result<()> {
    if pretty {
        serde_json::to_writer_pretty(&mut *writer, value)
    } else {
        serde_json::to_writer(&mut *writer, value)
    }
    .context("Failed to serialize response")?;
    writeln!(writer)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn writes_compact_json_with_newline() {
        let mut buf = Vec::new();
        write_to(&mut buf, &json!({ "maxIterations": 7 }), false).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "{\"maxIterations\":7}\n");
    }

    #[test]
    fn writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        write_json(&json!({ "data": [1, 2, 3] }), Some(&path), true).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["data"], json!([1, 2, 3]));
        assert!(text.contains('\n'));
    }
}
