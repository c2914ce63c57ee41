//! CLI command implementations

pub mod convert;
pub mod status;
pub mod upload;
pub mod validate;

use anyhow::Context;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};

/// Reads a JSON array of uploader entries from `path` (`-` for stdin)
///
/// Elements stay raw; the converter only parses the kinds it handles.
pub(crate) async fn read_entries(path: &str) -> anyhow::Result<Vec<Value>> {
    let mut reader: Box<dyn AsyncRead + Unpin + Send> = if path == "-" {
        Box::new(tokio::io::stdin())
    } else {
        Box::new(
            tokio::fs::File::open(path)
                .await
                .with_context(|| format!("Failed to open input file {path}"))?,
        )
    };

    let mut content = Vec::new();
    reader
        .read_to_end(&mut content)
        .await
        .with_context(|| format!("Failed to read input {path}"))?;

    serde_json::from_slice(&content)
        .with_context(|| format!("Input {path} is not a JSON array of telemetry entries"))
}

/// Opens `path` for writing (`-` for stdout)
pub(crate) async fn open_output(path: &str) -> anyhow::Result<Box<dyn AsyncWrite + Unpin + Send>> {
    if path == "-" {
        return Ok(Box::new(tokio::io::stdout()));
    }
    let file = tokio::fs::File::create(path)
        .await
        .with_context(|| format!("Failed to create output file {path}"))?;
    Ok(Box::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_read_entries_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("entries.json");
        std::fs::write(
            &path,
            r#"[{"type": "cbg", "time": "2021-10-23T02:56:21.000Z", "value": 5.5, "units": "mmol/L"},
                {"type": "deviceEvent", "time": "2021-10-23T02:57:00.000Z"}]"#,
        )
        .unwrap();

        let entries = read_entries(path.to_str().unwrap()).await.unwrap();
        assert_eq!(entries.len(), 2);
    }

    #[tokio::test]
    async fn test_read_entries_accepts_foreign_record_layouts() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("entries.json");
        std::fs::write(
            &path,
            r#"[{"type": "pumpSettings", "units": {"carb": "grams", "bg": "mg/dL"}},
                {"type": "cbg", "time": "2021-10-23T02:56:21.000Z", "value": 5.5, "units": "mmol/L"}]"#,
        )
        .unwrap();

        let entries = read_entries(path.to_str().unwrap()).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["type"], "pumpSettings");
    }

    #[tokio::test]
    async fn test_read_entries_rejects_non_array() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("entries.json");
        std::fs::write(&path, r#"{"type": "cbg"}"#).unwrap();

        let err = read_entries(path.to_str().unwrap()).await.unwrap_err();
        assert!(err.to_string().contains("not a JSON array"));
    }
}
