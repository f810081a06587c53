//! File-backed tiers: a plain key/value file and a cookie jar with expiry.
//!
//! Each tier serializes its own read-modify-write cycles behind a lock, and
//! every write atomically replaces the file with an owner-only copy.

use anyhow::{Context, Result, anyhow};
use log::debug;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use super::StorageTier;
use crate::runtime::Runtime;

/// Directories created for token files are private to their owner.
const DIR_MODE: u32 = 0o700;

fn load<R: Runtime, T: DeserializeOwned + Default>(runtime: &R, path: &Path) -> Result<T> {
    if !runtime.exists(path) {
        return Ok(T::default());
    }

    let content = runtime.read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(T::default());
    }

    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

fn store<R: Runtime, V: Serialize>(
    runtime: &R,
    path: &Path,
    entries: &BTreeMap<String, V>,
) -> Result<()> {
    if entries.is_empty() {
        if runtime.exists(path) {
            runtime
                .remove_file(path)
                .with_context(|| format!("Failed to remove {}", path.display()))?;
        }
        return Ok(());
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !runtime.exists(parent) {
            runtime.create_dir_all(parent)?;
            runtime.set_permissions(parent, DIR_MODE)?;
        }
    }

    let json = serde_json::to_string_pretty(entries)?;
    runtime
        .write_private(path, json.as_bytes())
        .with_context(|| format!("Failed to write {}", path.display()))
}

fn lock<'a>(lock: &'a Mutex<()>, path: &Path) -> Result<MutexGuard<'a, ()>> {
    lock.lock()
        .map_err(|_| anyhow!("lock for {} poisoned", path.display()))
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// JSON object of string values stored in a single file.
pub struct FileTier<R: Runtime> {
    runtime: R,
    path: PathBuf,
    lock: Mutex<()>,
}

impl<R: Runtime> FileTier<R> {
    pub fn new(runtime: R, path: impl Into<PathBuf>) -> Self {
        Self {
            runtime,
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn entries(&self) -> Result<BTreeMap<String, String>> {
        load(&self.runtime, &self.path)
    }
}

impl<R: Runtime> StorageTier for FileTier<R> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = lock(&self.lock, &self.path)?;
        Ok(self.entries()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str, _max_age: Option<Duration>) -> Result<()> {
        let _guard = lock(&self.lock, &self.path)?;
        let mut entries = self.entries()?;
        entries.insert(key.to_string(), value.to_string());
        store(&self.runtime, &self.path, &entries)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let _guard = lock(&self.lock, &self.path)?;
        if !self.runtime.exists(&self.path) {
            return Ok(());
        }

        let mut entries = self.entries()?;
        if entries.remove(key).is_some() {
            debug!("Removed {} from {}", key, self.path.display());
            store(&self.runtime, &self.path, &entries)?;
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
struct Cookie {
    value: String,
    /// Unix timestamp (seconds) after which the cookie reads as absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<u64>,
}

impl Cookie {
    fn is_expired(&self, now: u64) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Cookie-like tier: each entry honours the max-age it was written with.
pub struct CookieJar<R: Runtime> {
    runtime: R,
    path: PathBuf,
    lock: Mutex<()>,
}

impl<R: Runtime> CookieJar<R> {
    pub fn new(runtime: R, path: impl Into<PathBuf>) -> Self {
        Self {
            runtime,
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn cookies(&self) -> Result<BTreeMap<String, Cookie>> {
        load(&self.runtime, &self.path)
    }
}

impl<R: Runtime> StorageTier for CookieJar<R> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = lock(&self.lock, &self.path)?;
        let now = now_secs();
        Ok(self
            .cookies()?
            .remove(key)
            .filter(|cookie| !cookie.is_expired(now))
            .map(|cookie| cookie.value))
    }

    fn set(&self, key: &str, value: &str, max_age: Option<Duration>) -> Result<()> {
        let _guard = lock(&self.lock, &self.path)?;
        let now = now_secs();
        let mut cookies = self.cookies()?;
        cookies.retain(|_, cookie| !cookie.is_expired(now));
        cookies.insert(
            key.to_string(),
            Cookie {
                value: value.to_string(),
                expires_at: max_age.map(|age| now.saturating_add(age.as_secs())),
            },
        );
        store(&self.runtime, &self.path, &cookies)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let _guard = lock(&self.lock, &self.path)?;
        if !self.runtime.exists(&self.path) {
            return Ok(());
        }

        let now = now_secs();
        let mut cookies = self.cookies()?;
        if cookies.remove(key).is_some() {
            debug!("Expired cookie {} in {}", key, self.path.display());
            cookies.retain(|_, cookie| !cookie.is_expired(now));
            store(&self.runtime, &self.path, &cookies)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{MockRuntime, RealRuntime};
    use mockall::predicate::eq;
    use tempfile::tempdir;

    #[test]
    fn test_file_tier_round_trip() {
        let dir = tempdir().unwrap();
        let tier = FileTier::new(RealRuntime, dir.path().join("state/session.json"));

        assert_eq!(tier.get("auth_token").unwrap(), None);

        tier.set("auth_token", "abc", None).unwrap();
        tier.set("refresh_token", "def", None).unwrap();
        assert_eq!(tier.get("auth_token").unwrap(), Some("abc".to_string()));

        tier.remove("auth_token").unwrap();
        assert_eq!(tier.get("auth_token").unwrap(), None);
        assert_eq!(tier.get("refresh_token").unwrap(), Some("def".to_string()));
    }

    #[test]
    fn test_file_tier_deletes_file_once_empty() {
        let dir = tempdir().unwrap();
        let tier = FileTier::new(RealRuntime, dir.path().join("session.json"));

        tier.set("auth_token", "abc", None).unwrap();
        assert!(tier.path().exists());

        tier.remove("auth_token").unwrap();
        assert!(!tier.path().exists());
        assert_eq!(tier.get("auth_token").unwrap(), None);
    }

    #[test]
    fn test_file_tier_reads_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        std::fs::write(&path, r#"{"auth_token": "legacy"}"#).unwrap();

        let tier = FileTier::new(RealRuntime, &path);
        assert_eq!(tier.get("auth_token").unwrap(), Some("legacy".to_string()));
    }

    #[test]
    fn test_file_tier_remove_without_file_is_noop() {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_exists()
            .with(eq(PathBuf::from("/state/credentials.json")))
            .returning(|_| false);

        let tier = FileTier::new(runtime, "/state/credentials.json");
        assert!(tier.remove("auth_token").is_ok());
    }

    #[test]
    fn test_file_tier_propagates_read_errors() {
        let mut runtime = MockRuntime::new();
        runtime.expect_exists().returning(|_| true);
        runtime
            .expect_read_to_string()
            .returning(|_| Err(anyhow::anyhow!("permission denied")));

        let tier = FileTier::new(runtime, "/state/session.json");
        assert!(tier.get("auth_token").is_err());
    }

    #[test]
    fn test_file_tier_rejects_corrupt_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "not json").unwrap();

        let tier = FileTier::new(RealRuntime, &path);
        assert!(tier.get("auth_token").is_err());
    }

    #[test]
    fn test_file_tier_writes_through_private_write() {
        let mut runtime = MockRuntime::new();
        let path = PathBuf::from("/state/session.json");

        runtime
            .expect_exists()
            .with(eq(path.clone()))
            .returning(|_| false);
        runtime
            .expect_exists()
            .with(eq(PathBuf::from("/state")))
            .returning(|_| true);
        runtime
            .expect_write_private()
            .withf(|p, contents| {
                p == Path::new("/state/session.json")
                    && String::from_utf8_lossy(contents).contains("\"auth_token\": \"abc\"")
            })
            .times(1)
            .returning(|_, _| Ok(()));
        runtime.expect_set_permissions().never();

        let tier = FileTier::new(runtime, path);
        tier.set("auth_token", "abc", None).unwrap();
    }

    #[test]
    fn test_file_tier_creates_private_parent_directory() {
        let mut runtime = MockRuntime::new();
        let path = PathBuf::from("/state/session.json");

        runtime.expect_exists().returning(|_| false);
        runtime
            .expect_create_dir_all()
            .with(eq(PathBuf::from("/state")))
            .times(1)
            .returning(|_| Ok(()));
        runtime
            .expect_set_permissions()
            .with(eq(PathBuf::from("/state")), eq(0o700))
            .times(1)
            .returning(|_, _| Ok(()));
        runtime
            .expect_write_private()
            .times(1)
            .returning(|_, _| Ok(()));

        let tier = FileTier::new(runtime, path);
        tier.set("auth_token", "abc", None).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_file_tier_does_not_write_through_planted_symlink() {
        let dir = tempdir().unwrap();
        let elsewhere = tempdir().unwrap();
        let target = elsewhere.path().join("collected.json");
        std::fs::write(&target, "{}").unwrap();
        let path = dir.path().join("session.json");
        std::os::unix::fs::symlink(&target, &path).unwrap();

        let tier = FileTier::new(RealRuntime, &path);
        assert!(tier.set("auth_token", "super-secret-bearer", None).is_err());

        assert_eq!(std::fs::read_to_string(&target).unwrap(), "{}");
    }

    #[test]
    fn test_file_tier_concurrent_writers_keep_every_key() {
        let dir = tempdir().unwrap();
        let tier = FileTier::new(RealRuntime, dir.path().join("session.json"));

        std::thread::scope(|scope| {
            for i in 0..8 {
                let tier = &tier;
                scope.spawn(move || {
                    tier.set(&format!("key{}", i), &format!("value{}", i), None)
                        .unwrap();
                });
            }
        });

        for i in 0..8 {
            assert_eq!(
                tier.get(&format!("key{}", i)).unwrap(),
                Some(format!("value{}", i))
            );
        }
    }

    #[test]
    fn test_cookie_jar_round_trip_with_max_age() {
        let dir = tempdir().unwrap();
        let jar = CookieJar::new(RealRuntime, dir.path().join("cookies.json"));

        jar.set("auth_token", "abc", Some(Duration::from_secs(3600)))
            .unwrap();
        assert_eq!(jar.get("auth_token").unwrap(), Some("abc".to_string()));

        let raw = std::fs::read_to_string(jar.path()).unwrap();
        let cookies: BTreeMap<String, Cookie> = serde_json::from_str(&raw).unwrap();
        let expires_at = cookies["auth_token"].expires_at.unwrap();
        assert!(expires_at > now_secs());
        assert!(expires_at <= now_secs() + 3600);

        jar.remove("auth_token").unwrap();
        assert_eq!(jar.get("auth_token").unwrap(), None);
        assert!(!jar.path().exists());
    }

    #[test]
    fn test_cookie_jar_hides_expired_cookies() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cookies.json");
        std::fs::write(
            &path,
            r#"{
                "auth_token": {"value": "stale", "expires_at": 1},
                "refresh_token": {"value": "fresh"}
            }"#,
        )
        .unwrap();

        let jar = CookieJar::new(RealRuntime, &path);
        assert_eq!(jar.get("auth_token").unwrap(), None);
        assert_eq!(jar.get("refresh_token").unwrap(), Some("fresh".to_string()));
    }

    #[test]
    fn test_cookie_jar_prunes_expired_cookies_on_write() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cookies.json");
        std::fs::write(&path, r#"{"old": {"value": "x", "expires_at": 1}}"#).unwrap();

        let jar = CookieJar::new(RealRuntime, &path);
        jar.set("auth_token", "abc", None).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(!raw.contains("\"old\""));
        assert!(raw.contains("\"abc\""));
    }

    #[test]
    fn test_cookie_jar_concurrent_writers_keep_every_cookie() {
        let dir = tempdir().unwrap();
        let jar = CookieJar::new(RealRuntime, dir.path().join("cookies.json"));

        std::thread::scope(|scope| {
            scope.spawn(|| {
                jar.set("auth_token", "access", Some(Duration::from_secs(60)))
                    .unwrap()
            });
            scope.spawn(|| {
                jar.set("refresh_token", "rotated", Some(Duration::from_secs(60)))
                    .unwrap()
            });
        });

        assert_eq!(jar.get("auth_token").unwrap(), Some("access".to_string()));
        assert_eq!(
            jar.get("refresh_token").unwrap(),
            Some("rotated".to_string())
        );
    }
}
