//! Munin probes built on the authenticated fetch contract.
//!
//! Munin-node invokes each plugin binary with `config` (print the graph
//! declaration), `autoconf` (print `yes`) or no argument / `fetch` (print
//! values). Probes write protocol text to the supplied writer so tests can
//! capture it; diagnostics go through `log` and never onto stdout.

pub mod ecostat;
pub mod energy;

pub use ecostat::EcostatProbe;
pub use energy::EnergyProbe;

use std::io::Write;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::config::FritzboxConfig;
use crate::error::FritzError;
use crate::session::dispatcher::FritzboxClient;

/// Result alias for probe code.
pub type ProbeResult<T> = Result<T, ProbeError>;

/// Failures a probe can surface on top of the session layer's taxonomy.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error(transparent)]
    Session(#[from] FritzError),
    #[error("unexpected payload: {0}")]
    Payload(String),
    #[error("output error: {0}")]
    Io(#[from] std::io::Error),
}

/// Munin plugin invocation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Fetch,
    Config,
    Autoconf,
}

impl Command {
    /// Parse the plugin argument. Munin calls with no argument or `fetch`
    /// for values; anything unrecognized falls back to fetching.
    pub fn from_args<I>(args: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        match args.into_iter().nth(1).as_deref() {
            Some("config") => Command::Config,
            Some("autoconf") => Command::Autoconf,
            _ => Command::Fetch,
        }
    }
}

/// One munin plugin: a graph declaration and a value fetch.
#[async_trait(?Send)]
pub trait Probe {
    fn name(&self) -> &'static str;

    /// Print the munin graph declaration.
    fn config(&self, out: &mut dyn Write) -> ProbeResult<()>;

    /// Fetch the router page(s) and print the current values.
    async fn fetch(&self, client: &FritzboxClient, out: &mut dyn Write) -> ProbeResult<()>;
}

/// Dispatch one plugin invocation. Configuration and the HTTP client are only
/// resolved when the command actually talks to the router.
pub async fn run(probe: &dyn Probe, command: Command, out: &mut dyn Write) -> ProbeResult<()> {
    match command {
        Command::Autoconf => {
            writeln!(out, "yes")?;
            Ok(())
        }
        Command::Config => probe.config(out),
        Command::Fetch => {
            let config = FritzboxConfig::from_env()?;
            let client = FritzboxClient::new(&config)?;
            probe.fetch(&client, out).await
        }
    }
}

/// Space-separated mode list from an environment variable, with a default
/// when the variable is unset.
pub(crate) fn modes_from_env(name: &str, default: &[&str]) -> Vec<String> {
    match std::env::var(name) {
        Ok(value) => value.split(' ').map(str::to_string).collect(),
        Err(_) => default.iter().map(|mode| mode.to_string()).collect(),
    }
}

/// Render a JSON leaf the way the router sends it: strings verbatim, numbers
/// through their canonical form.
pub(crate) fn leaf_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|item| item.to_string()).collect()
    }

    #[test]
    fn command_parsing_follows_munin_conventions() {
        assert_eq!(Command::from_args(args(&["plugin"])), Command::Fetch);
        assert_eq!(Command::from_args(args(&["plugin", "fetch"])), Command::Fetch);
        assert_eq!(Command::from_args(args(&["plugin", "config"])), Command::Config);
        assert_eq!(
            Command::from_args(args(&["plugin", "autoconf"])),
            Command::Autoconf
        );
    }

    #[test]
    fn leaf_rendering() {
        assert_eq!(leaf_to_string(&Value::String("37".into())), Some("37".into()));
        assert_eq!(leaf_to_string(&serde_json::json!(42)), Some("42".into()));
        assert_eq!(leaf_to_string(&Value::Null), None);
    }
}
