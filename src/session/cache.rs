//! File-backed session token cache.
//!
//! One file per (host, port, username) under `<state-dir>/fritzbox/`, holding
//! the token as a single line of text. Concurrent probe runs against the same
//! key can race on the file; a lost write just forces an extra login on the
//! next run, never corruption, since store replaces the whole file.

use std::fs;
use std::path::{Path, PathBuf};

use crate::endpoint::Endpoint;
use crate::error::{FritzError, FritzResult};
use crate::session::SessionToken;

/// Separator between the key fields in the cache file name. Host and
/// username must not contain it; the port is numeric and cannot.
const KEY_SEPARATOR: &str = "__";

const CACHE_SUBDIR: &str = "fritzbox";
const FILE_EXTENSION: &str = "sid";

/// Persists session tokens across process invocations.
#[derive(Debug, Clone)]
pub struct SessionCache {
    dir: PathBuf,
}

impl SessionCache {
    /// A cache rooted at the configured state directory (the `fritzbox`
    /// subdirectory is appended here).
    pub fn new(state_dir: impl AsRef<Path>) -> Self {
        Self {
            dir: state_dir.as_ref().join(CACHE_SUBDIR),
        }
    }

    /// Load the cached token for this endpoint and user.
    ///
    /// A missing cache file is not an error: it means "perform a fresh
    /// login". A file holding the all-zero sentinel (which `store` never
    /// writes) also reads back as `None`.
    pub fn load(&self, endpoint: &Endpoint, username: &str) -> FritzResult<Option<SessionToken>> {
        let path = self.entry_path(endpoint, username)?;
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(FritzError::Config(format!(
                    "cannot read session cache {}: {err}",
                    path.display()
                )));
            }
        };

        let first_line = contents.lines().next().unwrap_or("");
        Ok(SessionToken::new(first_line))
    }

    /// Store the token for this endpoint and user, replacing any previous
    /// entry. The write goes to a temporary file in the same directory and is
    /// renamed into place, so a half-written token is never read back.
    pub fn store(
        &self,
        endpoint: &Endpoint,
        username: &str,
        token: &SessionToken,
    ) -> FritzResult<()> {
        let path = self.entry_path(endpoint, username)?;
        fs::create_dir_all(&self.dir).map_err(|err| {
            FritzError::Config(format!(
                "cannot create session cache directory {}: {err}",
                self.dir.display()
            ))
        })?;

        let tmp = path.with_extension("tmp");
        fs::write(&tmp, token.as_str()).map_err(|err| {
            FritzError::Config(format!(
                "cannot write session cache {}: {err}",
                tmp.display()
            ))
        })?;
        fs::rename(&tmp, &path).map_err(|err| {
            FritzError::Config(format!(
                "cannot replace session cache {}: {err}",
                path.display()
            ))
        })?;
        Ok(())
    }

    /// Build the entry path, rejecting key fields that would collide with the
    /// separator. This is a configuration error and is checked before any
    /// filesystem access.
    fn entry_path(&self, endpoint: &Endpoint, username: &str) -> FritzResult<PathBuf> {
        if endpoint.host.contains(KEY_SEPARATOR) || username.contains(KEY_SEPARATOR) {
            return Err(FritzError::Config(format!(
                "reserved separator \"{KEY_SEPARATOR}\" in host or user name"
            )));
        }
        let name = format!(
            "{host}{sep}{port}{sep}{user}.{FILE_EXTENSION}",
            host = endpoint.host,
            port = endpoint.port,
            user = username,
            sep = KEY_SEPARATOR,
        );
        Ok(self.dir.join(name))
    }
}
