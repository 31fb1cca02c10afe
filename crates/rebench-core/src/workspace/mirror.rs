//! Local fetch-only mirrors shared by every attempt on the same repository.
//!
//! Population and refresh of one slug's mirror are serialized twice: by an
//! in-process async mutex and by a `<key>.git.lock` file for other
//! processes sharing the cache root.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tokio::time::Instant;

use crate::config::EvalConfig;
use crate::domain::error::{WorkspaceError, WorkspaceResult};
use crate::exec::Deadline;
use crate::git::GitCall;
use crate::metrics::METRICS;
use crate::obs;

const LOCK_POLL: Duration = Duration::from_millis(200);

/// Deterministic cache key for a slug: first 16 hex chars of its SHA-256.
pub fn cache_key(slug: &str) -> String {
    let digest = Sha256::digest(slug.as_bytes());
    let mut key = hex::encode(digest);
    key.truncate(16);
    key
}

#[derive(Debug)]
pub struct MirrorCache {
    root: PathBuf,
    remote_url_template: String,
    clone_timeout: Duration,
    stale_after: Duration,
    slug_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl MirrorCache {
    pub fn new(config: &EvalConfig) -> Self {
        Self {
            root: config.cache_root.clone(),
            remote_url_template: config.remote_url_template.clone(),
            clone_timeout: config.clone_timeout(),
            stale_after: config.lock_stale_after(),
            slug_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Where the mirror for `slug` lives, whether or not it exists yet.
    pub fn mirror_path(&self, slug: &str) -> PathBuf {
        self.root.join(format!("{}.git", cache_key(slug)))
    }

    pub fn remote_url(&self, slug: &str) -> String {
        self.remote_url_template.replace("{slug}", slug)
    }

    /// Make sure an up-to-date mirror of `slug` exists and return its path.
    ///
    /// An existing mirror is refreshed with `remote update --prune`. If git
    /// itself reports a failure the mirror is deleted and cloned again; a
    /// timeout, spawn failure or expired deadline leaves it in place.
    pub async fn ensure(&self, slug: &str, deadline: Deadline) -> WorkspaceResult<PathBuf> {
        tokio::fs::create_dir_all(&self.root).await?;
        let mirror = self.mirror_path(slug);

        let slug_lock = self.slug_lock(slug);
        let _guard = slug_lock.lock().await;
        let _file_lock = LockFile::acquire(
            lock_path(&mirror),
            deadline.clamp(self.clone_timeout),
            self.stale_after,
        )
        .await?;

        let start = Instant::now();
        if mirror.exists() {
            let refreshed = GitCall::new(&mirror, ["remote", "update", "--prune"])
                .timeout(self.clone_timeout)
                .deadline(deadline)
                .run()
                .await;
            match refreshed {
                Ok(_) => {
                    obs::emit_mirror_refreshed(slug, false, start.elapsed().as_millis() as u64);
                    return Ok(mirror);
                }
                Err(err @ WorkspaceError::Git { .. }) => {
                    tracing::warn!(slug = %slug, error = %err, "mirror refresh failed, recloning");
                    METRICS.inc_mirror_refresh_failures();
                    tokio::fs::remove_dir_all(&mirror).await?;
                }
                Err(err) => {
                    tracing::warn!(slug = %slug, error = %err, "mirror refresh interrupted, keeping mirror");
                    return Err(err);
                }
            }
        }

        let url = self.remote_url(slug);
        let target = mirror.to_string_lossy().into_owned();
        let cloned = GitCall::new(&self.root, ["clone", "--mirror", url.as_str(), target.as_str()])
            .timeout(self.clone_timeout)
            .deadline(deadline)
            .run()
            .await;
        if let Err(err) = cloned {
            if mirror.exists() {
                tokio::fs::remove_dir_all(&mirror).await.ok();
            }
            return Err(err);
        }

        METRICS.inc_mirrors_cloned();
        obs::emit_mirror_refreshed(slug, true, start.elapsed().as_millis() as u64);
        Ok(mirror)
    }

    fn slug_lock(&self, slug: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .slug_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.entry(slug.to_string()).or_default().clone()
    }
}

fn lock_path(mirror: &Path) -> PathBuf {
    let mut name = mirror.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}

/// Exclusive lock file, removed on drop.
#[derive(Debug)]
struct LockFile {
    path: PathBuf,
}

impl LockFile {
    async fn acquire(path: PathBuf, wait: Duration, stale_after: Duration) -> WorkspaceResult<Self> {
        let give_up = Instant::now() + wait;
        loop {
            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(mut file) => {
                    let pid = format!("{}\n", std::process::id());
                    file.write_all(pid.as_bytes()).await.ok();
                    file.flush().await.ok();
                    return Ok(Self { path });
                }
                Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                    if is_stale(&path, stale_after).await {
                        tracing::warn!(path = %path.display(), "reclaiming stale mirror lock");
                        tokio::fs::remove_file(&path).await.ok();
                        continue;
                    }
                    if Instant::now() >= give_up {
                        return Err(WorkspaceError::Lock {
                            path,
                            reason: format!("still held after {}s", wait.as_secs()),
                        });
                    }
                    tokio::time::sleep(LOCK_POLL).await;
                }
                Err(err) => {
                    return Err(WorkspaceError::Lock {
                        path,
                        reason: err.to_string(),
                    })
                }
            }
        }
    }
}

impl Drop for LockFile {
    // Synchronous: Drop cannot await.
    fn drop(&mut self) {
        std::fs::remove_file(&self.path).ok();
    }
}

async fn is_stale(path: &Path, stale_after: Duration) -> bool {
    tokio::fs::metadata(path)
        .await
        .and_then(|meta| meta.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .is_some_and(|age| age > stale_after)
}
