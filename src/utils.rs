use crate::error::Res;
use anyhow::Context;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// Write a file.
pub(crate) async fn write(path: impl AsRef<Path>, contents: impl AsRef<[u8]>) -> Res<()> {
    let path = path.as_ref();
    tokio::fs::write(path, contents)
        .await
        .context(format!("Unable to write to {}", path.to_string_lossy()))
}

/// Write a file that only the current user may read, e.g. an access token.
pub(crate) async fn write_secret(path: impl AsRef<Path>, contents: impl AsRef<[u8]>) -> Res<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        make_dir(parent).await?;
    }
    write(path, contents).await?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .await
            .with_context(|| format!("Unable to set permissions on {}", path.display()))?;
    }
    Ok(())
}

/// Read a file to a `String`.
pub(crate) async fn read(path: &Path) -> Res<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read file at {}", path.display()))
}

/// Deserialize a JSON file into type `T`.
pub(crate) async fn deserialize<T>(path: &Path) -> Res<T>
where
    T: DeserializeOwned,
{
    let content = read(path).await?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse JSON file at {}", path.display()))
}

/// Create a directory and its parents if they do not exist.
pub(crate) async fn make_dir(p: &Path) -> Res<()> {
    tokio::fs::create_dir_all(p)
        .await
        .with_context(|| format!("Unable to create directory at {}", p.to_string_lossy()))
}

pub(crate) async fn canonicalize(p: &Path) -> Res<PathBuf> {
    tokio::fs::canonicalize(p)
        .await
        .with_context(|| format!("Unable to canonicalize {}", p.to_string_lossy()))
}

pub(crate) async fn read_dir(p: &Path) -> Res<tokio::fs::ReadDir> {
    tokio::fs::read_dir(p)
        .await
        .with_context(|| format!("Unable to read directory {}", p.to_string_lossy()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_and_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.json");
        write(&path, r#"{"x": 1}"#).await.unwrap();
        let value: serde_json::Value = deserialize(&path).await.unwrap();
        assert_eq!(value["x"], 1);
    }

    #[tokio::test]
    async fn test_write_secret_creates_parent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".secrets").join("token.json");
        write_secret(&path, "{}").await.unwrap();
        assert_eq!(read(&path).await.unwrap(), "{}");
    }

    #[tokio::test]
    async fn test_missing_file_message() {
        let dir = TempDir::new().unwrap();
        let e = read(&dir.path().join("nope")).await.unwrap_err();
        assert!(format!("{e}").contains("Failed to read file"));
    }
}
