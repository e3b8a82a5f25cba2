//! Token storage
//!
//! `TokenStore` is the only seam for sharing a token between processes or
//! hosts. The client calls `load()` before each logical request and
//! `save()` after every issuance; `save(None)` clears the stored token when
//! the platform reports it expired.
//!
//! Two implementations ship with the crate:
//! - `MemoryTokenStore`: process-local, the default. Each process issues its
//!   own token, which invalidates tokens held by sibling processes.
//! - `FileTokenStore`: one JSON file, written atomically, shareable by
//!   processes on the same host.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::constants::ENVIRONMENT_VAR;
use crate::error::{Error, Result};
use crate::token::AccessToken;

/// Boxed future used by dyn-compatible async traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Load/save hooks for the current access token.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility
/// (`Arc<dyn TokenStore>`). Implementations needing strict single-refresh
/// semantics across processes must do their own locking.
pub trait TokenStore: Send + Sync {
    /// Last known token, or `None` when nothing is stored.
    fn load(&self) -> BoxFuture<'_, Result<Option<AccessToken>>>;

    /// Persist a new token, or clear storage when given `None`.
    fn save(&self, token: Option<AccessToken>) -> BoxFuture<'_, Result<()>>;
}

/// Process-local token store.
///
/// Not shared across processes: running several workers with this store
/// makes them invalidate each other's tokens. A warning is logged on every
/// save when `WECOM_ENV=production`.
pub struct MemoryTokenStore {
    slot: Mutex<Option<AccessToken>>,
    warn_on_save: bool,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        let production = std::env::var(ENVIRONMENT_VAR)
            .is_ok_and(|env| env.eq_ignore_ascii_case("production"));
        Self::with_production_warning(production)
    }

    pub fn with_production_warning(warn_on_save: bool) -> Self {
        Self {
            slot: Mutex::new(None),
            warn_on_save,
        }
    }

    /// Start out holding `token`, e.g. one handed over by a parent process.
    pub fn with_token(mut self, token: AccessToken) -> Self {
        self.slot = Mutex::new(Some(token));
        self
    }
}

impl Default for MemoryTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> BoxFuture<'_, Result<Option<AccessToken>>> {
        Box::pin(async move { Ok(self.slot.lock().await.clone()) })
    }

    fn save(&self, token: Option<AccessToken>) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            *self.slot.lock().await = token;
            if self.warn_on_save {
                warn!("access token kept in process memory; use a shared TokenStore when running multiple processes or hosts");
            }
            Ok(())
        })
    }
}

/// Single-file token store.
///
/// The file holds the JSON form of `Option<AccessToken>`; a missing file
/// reads as no token. Writes go through a temp file + rename so a reader in
/// another process never sees a partial write. The Mutex serializes writes
/// from this process only.
pub struct FileTokenStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> BoxFuture<'_, Result<Option<AccessToken>>> {
        Box::pin(async move {
            let contents = match tokio::fs::read_to_string(&self.path).await {
                Ok(contents) => contents,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    debug!(path = %self.path.display(), "token file not found");
                    return Ok(None);
                }
                Err(e) => return Err(Error::Io(format!("reading token file: {e}"))),
            };
            if contents.trim().is_empty() {
                return Ok(None);
            }
            serde_json::from_str(&contents)
                .map_err(|e| Error::TokenParse(format!("parsing token file: {e}")))
        })
    }

    fn save(&self, token: Option<AccessToken>) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let _guard = self.write_lock.lock().await;
            write_atomic(&self.path, &token).await
        })
    }
}

/// Suffix source for temp file names, shared by every store in the process.
static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Write the token file atomically with 0600 permissions.
///
/// Each write gets its own temp file, so stores on the same path in one
/// process never rename or chmod each other's temp files.
async fn write_atomic(path: &Path, token: &Option<AccessToken>) -> Result<()> {
    let json = serde_json::to_string(token)
        .map_err(|e| Error::TokenParse(format!("serializing token: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| Error::Io("token path has no parent directory".into()))?;
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("token");
    let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
    let tmp_path = dir.join(format!(".{file_name}.tmp.{}.{seq}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp token file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting token file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp token file: {e}")))?;

    debug!(path = %path.display(), cleared = token.is_none(), "persisted token");
    Ok(())
}
