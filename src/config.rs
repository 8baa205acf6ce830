//! Environment-based configuration, the way munin hands it to plugins.
//!
//! Munin-node exports plugin settings as `env.*` entries; the probe binaries
//! resolve them here and pass the result into the session layer, which never
//! reads the environment itself.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::endpoint::Endpoint;
use crate::error::{FritzError, FritzResult};
use crate::session::Credentials;

const DEFAULT_HOST: &str = "fritz.box";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// Resolved probe configuration.
#[derive(Debug, Clone)]
pub struct FritzboxConfig {
    /// Router host name or address (`fritzbox_ip`).
    pub host: String,
    /// Web interface port (`fritzbox_port`); defaults to 443 with TLS, 80 without.
    pub port: u16,
    /// Whether to use HTTPS (`fritzbox_use_tls`, default true).
    pub use_tls: bool,
    /// Login user (`fritzbox_user`).
    pub username: String,
    /// Login password (`fritzbox_password`). Never persisted.
    pub password: String,
    /// Trust-anchor PEM for the router's self-signed certificate
    /// (`fritzbox_certificate`, default `$MUNIN_CONFDIR/box.cer`).
    pub certificate: Option<PathBuf>,
    /// State directory for the session cache (`$MUNIN_PLUGSTATE`).
    pub state_dir: PathBuf,
    /// Bound on each HTTP call; these are one-shot processes with no
    /// supervising event loop to cancel them.
    pub timeout: Duration,
}

impl FritzboxConfig {
    /// Resolve the configuration from the munin plugin environment.
    pub fn from_env() -> FritzResult<Self> {
        let host = env::var("fritzbox_ip").unwrap_or_else(|_| DEFAULT_HOST.to_string());
        let username = require("fritzbox_user")?;
        let password = require("fritzbox_password")?;

        let use_tls = match env::var("fritzbox_use_tls") {
            Ok(value) => value == "true",
            Err(_) => true,
        };

        let port = match env::var("fritzbox_port") {
            Ok(value) => value.parse::<u16>().map_err(|_| {
                FritzError::Config(format!("fritzbox_port is not a valid port: {value}"))
            })?,
            Err(_) => {
                if use_tls {
                    443
                } else {
                    80
                }
            }
        };

        let certificate = if use_tls {
            match env::var("fritzbox_certificate") {
                Ok(path) => Some(PathBuf::from(path)),
                Err(_) => env::var("MUNIN_CONFDIR")
                    .ok()
                    .map(|dir| PathBuf::from(dir).join("box.cer")),
            }
        } else {
            None
        };

        let state_dir = PathBuf::from(require("MUNIN_PLUGSTATE")?);

        Ok(Self {
            host,
            port,
            use_tls,
            username,
            password,
            certificate,
            state_dir,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.host.clone(), self.port, self.use_tls)
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.username.clone(), self.password.clone())
    }
}

fn require(name: &str) -> FritzResult<String> {
    env::var(name).map_err(|_| FritzError::Config(format!("environment variable {name} is not set")))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Process environment is shared across the test binary, so everything
    // touching it runs in this single test.
    #[test]
    fn resolves_from_environment() {
        unsafe {
            env::set_var("fritzbox_ip", "192.168.178.1");
            env::set_var("fritzbox_user", "monitoring");
            env::set_var("fritzbox_password", "secret");
            env::set_var("MUNIN_PLUGSTATE", "/var/lib/munin-node/plugin-state");
            env::set_var("MUNIN_CONFDIR", "/etc/munin");
            env::remove_var("fritzbox_port");
            env::remove_var("fritzbox_use_tls");
            env::remove_var("fritzbox_certificate");
        }

        let config = FritzboxConfig::from_env().unwrap();
        assert_eq!(config.host, "192.168.178.1");
        assert_eq!(config.port, 443);
        assert!(config.use_tls);
        assert_eq!(
            config.certificate.as_deref(),
            Some(std::path::Path::new("/etc/munin/box.cer"))
        );

        unsafe {
            env::set_var("fritzbox_use_tls", "false");
        }
        let config = FritzboxConfig::from_env().unwrap();
        assert!(!config.use_tls);
        assert_eq!(config.port, 80);
        assert_eq!(config.certificate, None);

        unsafe {
            env::set_var("fritzbox_port", "not-a-port");
        }
        assert!(matches!(
            FritzboxConfig::from_env(),
            Err(FritzError::Config(_))
        ));

        unsafe {
            env::set_var("fritzbox_port", "8080");
        }
        let config = FritzboxConfig::from_env().unwrap();
        assert_eq!(config.port, 8080);

        unsafe {
            env::remove_var("fritzbox_user");
        }
        assert!(matches!(
            FritzboxConfig::from_env(),
            Err(FritzError::Config(_))
        ));
        unsafe {
            env::set_var("fritzbox_user", "monitoring");
        }
    }
}
