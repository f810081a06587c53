//! File system operations (read, write, remove, permissions).

use anyhow::{Context, Result, bail};
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

use super::RealRuntime;

impl RealRuntime {
    #[tracing::instrument(skip(self, contents))]
    pub(crate) fn write_private_impl(&self, path: &Path, contents: &[u8]) -> Result<()> {
        if let Ok(metadata) = fs::symlink_metadata(path) {
            if metadata.file_type().is_symlink() {
                bail!("Refusing to write through symlink {}", path.display());
            }
        }

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        // Created exclusively with mode 0600.
        let mut file = NamedTempFile::new_in(dir).context("Failed to create temporary file")?;
        file.write_all(contents).context("Failed to write to file")?;
        file.as_file().sync_all().context("Failed to flush file")?;
        file.persist(path)
            .map_err(|e| e.error)
            .context("Failed to replace file")?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn read_to_string_impl(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).context("Failed to read file to string")
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn create_dir_all_impl(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path).context("Failed to create directory")?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn remove_file_impl(&self, path: &Path) -> Result<()> {
        fs::remove_file(path).context("Failed to remove file")?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn exists_impl(&self, path: &Path) -> bool {
        path.exists()
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn set_permissions_impl(&self, path: &Path, mode: u32) -> Result<()> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = fs::Permissions::from_mode(mode);
            fs::set_permissions(path, permissions).context("Failed to set permissions")?;
        }
        #[cfg(not(unix))]
        {
            let _ = (path, mode);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::runtime::{RealRuntime, Runtime};
    use tempfile::tempdir;

    #[test]
    fn test_real_runtime_file_ops() {
        let runtime = RealRuntime;
        let dir = tempdir().unwrap();
        let nested = dir.path().join("state/nested");
        let file_path = nested.join("jar.json");

        runtime.create_dir_all(&nested).unwrap();
        runtime.write_private(&file_path, b"{}").unwrap();
        assert!(runtime.exists(&file_path));
        assert_eq!(runtime.read_to_string(&file_path).unwrap(), "{}");

        runtime.write_private(&file_path, b"{\"a\": \"b\"}").unwrap();
        assert_eq!(runtime.read_to_string(&file_path).unwrap(), "{\"a\": \"b\"}");

        runtime.remove_file(&file_path).unwrap();
        assert!(!runtime.exists(&file_path));
    }

    #[cfg(unix)]
    #[test]
    fn test_write_private_is_owner_only_even_over_open_file() {
        use std::os::unix::fs::PermissionsExt;

        let runtime = RealRuntime;
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("secret.json");
        std::fs::write(&file_path, b"planted").unwrap();
        std::fs::set_permissions(&file_path, std::fs::Permissions::from_mode(0o666)).unwrap();

        runtime.write_private(&file_path, b"{}").unwrap();

        let mode = std::fs::metadata(&file_path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(std::fs::read_to_string(&file_path).unwrap(), "{}");
    }

    #[cfg(unix)]
    #[test]
    fn test_write_private_refuses_symlink() {
        let runtime = RealRuntime;
        let dir = tempdir().unwrap();
        let elsewhere = tempdir().unwrap();
        let target = elsewhere.path().join("collected.json");
        std::fs::write(&target, b"untouched").unwrap();
        let link = dir.path().join("session.json");
        std::os::unix::fs::symlink(&target, &link).unwrap();

        let err = runtime.write_private(&link, b"secret").unwrap_err();

        assert!(err.to_string().contains("symlink"));
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "untouched");
    }

    #[cfg(unix)]
    #[test]
    fn test_real_runtime_set_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let runtime = RealRuntime;
        let dir = tempdir().unwrap();
        let state = dir.path().join("state");
        runtime.create_dir_all(&state).unwrap();

        runtime.set_permissions(&state, 0o700).unwrap();

        let mode = std::fs::metadata(&state).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o700);
    }

    #[test]
    fn test_real_runtime_errors() {
        let runtime = RealRuntime;

        let result = runtime.read_to_string(std::path::Path::new("/nonexistent/path/file.txt"));
        assert!(result.is_err());

        let result = runtime.remove_file(std::path::Path::new("/nonexistent/path/file.txt"));
        assert!(result.is_err());

        let result = runtime.write_private(std::path::Path::new("/nonexistent/path/file.txt"), b"{}");
        assert!(result.is_err());
    }
}
