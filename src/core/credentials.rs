//! Credential cache shared by every fetch of a workspace session.
//!
//! # Public API
//! - [`CredentialCache`]: `(remote url, username hint)` → [`Credential`] with optional expiry
//! - [`CredentialSource`]: the external lookup consulted on a cache miss
//! - [`GitCredentialHelper`]: a [`CredentialSource`] backed by `git credential fill`
//!
//! # Caching rules
//! - A credential obtained from the source never expires.
//! - When the source yields nothing, [`Credential::Default`] is cached for
//!   [`FALLBACK_TTL_MINUTES`] so the helper is not re-run on every challenge.
//! - Expired entries are evicted when they are next read.
//! - A rejected credential is evicted only when it came from the source; a rejected
//!   fallback stays until it expires.
//!
//! Falling back to the default credential on any helper failure can hide a misconfigured
//! helper; the failure is only visible in the debug log.

use crate::core::error::{GitDeckError, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::fmt;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

pub const FALLBACK_TTL_MINUTES: i64 = 30;

#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    UserPass { username: String, password: String },
    /// Whatever the transport can do without explicit secrets.
    Default,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UserPass { username, .. } => f
                .debug_struct("UserPass")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Self::Default => f.write_str("Default"),
        }
    }
}

pub trait CredentialSource: Send + Sync {
    fn resolve_external_credential(&self, url: &str) -> Option<Credential>;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    url: String,
    username: String,
}

impl CacheKey {
    fn new(url: &str, username_hint: Option<&str>) -> Self {
        Self {
            url: url.to_string(),
            username: username_hint.unwrap_or_default().to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct CachedCredential {
    credential: Credential,
    expires_at: Option<DateTime<Utc>>,
}

impl CachedCredential {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(true, |expiry| now < expiry)
    }
}

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub struct CredentialCache {
    entries: Mutex<HashMap<CacheKey, CachedCredential>>,
    source: Arc<dyn CredentialSource>,
    fallback_ttl: ChronoDuration,
    clock: Clock,
}

impl fmt::Debug for CredentialCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialCache")
            .field("entries", &self.lock().len())
            .field("fallback_ttl", &self.fallback_ttl)
            .finish()
    }
}

impl CredentialCache {
    pub fn new(source: Arc<dyn CredentialSource>) -> Self {
        Self::with_clock(source, Arc::new(Utc::now))
    }

    fn with_clock(source: Arc<dyn CredentialSource>, clock: Clock) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            source,
            fallback_ttl: ChronoDuration::minutes(FALLBACK_TTL_MINUTES),
            clock,
        }
    }

    pub fn resolve(&self, url: &str, username_hint: Option<&str>) -> Credential {
        let key = CacheKey::new(url, username_hint);
        let now = (self.clock)();

        {
            let mut entries = self.lock();
            if let Some(cached) = entries.get(&key) {
                if cached.is_live(now) {
                    return cached.credential.clone();
                }
                log::debug!("Cached credential for {url} expired");
                entries.remove(&key);
            }
        }

        // The helper runs without the lock held; the first insert for a key wins.
        let (credential, expires_at) = match self.source.resolve_external_credential(url) {
            Some(credential) => (credential, None),
            None => {
                log::debug!("No helper credential for {url}, using default credential");
                // The window starts when the helper returned, not when the lookup began.
                (Credential::Default, Some((self.clock)() + self.fallback_ttl))
            }
        };

        self.lock()
            .entry(key)
            .or_insert(CachedCredential {
                credential,
                expires_at,
            })
            .credential
            .clone()
    }

    /// Drops a credential the remote rejected, unless it is the expiring fallback.
    pub fn evict_if_durable(&self, url: &str, username_hint: Option<&str>) {
        let key = CacheKey::new(url, username_hint);
        let mut entries = self.lock();
        if entries.get(&key).is_some_and(|cached| cached.expires_at.is_none()) {
            entries.remove(&key);
            log::debug!("Evicted rejected credential for {url}");
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, CachedCredential>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

const HELPER_TIMEOUT: Duration = Duration::from_secs(15);
const HELPER_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Asks the host git installation's credential manager for secrets.
#[derive(Debug, Clone)]
pub struct GitCredentialHelper {
    git_executable: PathBuf,
    timeout: Duration,
}

impl GitCredentialHelper {
    pub fn new(git_executable: impl Into<PathBuf>) -> Self {
        Self {
            git_executable: git_executable.into(),
            timeout: HELPER_TIMEOUT,
        }
    }

    fn git(&self) -> Command {
        let mut cmd = Command::new(&self.git_executable);
        cmd.env("GIT_TERMINAL_PROMPT", "0");
        cmd
    }

    fn configured_helper(&self) -> Result<String> {
        let output = self
            .git()
            .args(["config", "--get", "credential.helper"])
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .map_err(|e| GitDeckError::process_launch_failed(&self.git_executable, e))?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn fill(&self, url: &str) -> Result<String> {
        let mut child = self
            .git()
            .args(["credential", "fill"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| GitDeckError::process_launch_failed(&self.git_executable, e))?;

        if let Some(mut stdin) = child.stdin.take() {
            write!(stdin, "url={url}\n\n")?;
        }

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                return Err(GitDeckError::credential_helper("git credential fill timed out"));
            }
            std::thread::sleep(HELPER_POLL_INTERVAL);
        };

        if !status.success() {
            return Err(GitDeckError::credential_helper(format!(
                "git credential fill exited with {status}"
            )));
        }

        let mut output = String::new();
        if let Some(mut stdout) = child.stdout.take() {
            stdout.read_to_string(&mut output)?;
        }
        Ok(output)
    }

    fn query(&self, url: &str) -> Result<Option<Credential>> {
        let helper = self.configured_helper()?;
        if !helper.contains("manager") {
            log::debug!("No credential manager configured (helper: '{helper}')");
            return Ok(None);
        }
        let output = self.fill(url)?;
        Ok(parse_credential_output(&output))
    }
}

impl CredentialSource for GitCredentialHelper {
    fn resolve_external_credential(&self, url: &str) -> Option<Credential> {
        match self.query(url) {
            Ok(credential) => credential,
            Err(e) => {
                log::debug!("Credential helper lookup for {url} failed: {e}");
                None
            }
        }
    }
}

/// Extracts `username=` / `password=` from `git credential fill` output.
pub fn parse_credential_output(output: &str) -> Option<Credential> {
    let field = |name: &str| {
        output
            .lines()
            .find_map(|line| line.trim_end_matches('\r').strip_prefix(name))
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };

    Some(Credential::UserPass {
        username: field("username=")?,
        password: field("password=")?,
    })
}
