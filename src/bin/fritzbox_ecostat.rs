//! Munin plugin: Fritz!Box CPU load, CPU temperature and RAM usage.

use std::io::{self, Write};
use std::process::ExitCode;

use fritzmon::probes::{self, Command, EcostatProbe};

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let command = Command::from_args(std::env::args());
    let probe = EcostatProbe::from_env();

    let mut out = io::stdout().lock();
    match probes::run(&probe, command, &mut out).await {
        Ok(()) => {
            let _ = out.flush();
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("couldn't retrieve fritzbox ecostat: {err}");
            ExitCode::FAILURE
        }
    }
}
