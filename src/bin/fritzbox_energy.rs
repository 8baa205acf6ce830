//! Munin plugin: Fritz!Box power consumption, connected devices and uptime.

use std::io::{self, Write};
use std::process::ExitCode;

use fritzmon::probes::{self, Command, EnergyProbe};

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let command = Command::from_args(std::env::args());
    let probe = match EnergyProbe::from_env() {
        Ok(probe) => probe,
        Err(err) => {
            eprintln!("couldn't configure fritzbox energy probe: {err}");
            return ExitCode::FAILURE;
        }
    };

    let mut out = io::stdout().lock();
    match probes::run(&probe, command, &mut out).await {
        Ok(()) => {
            let _ = out.flush();
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("couldn't retrieve fritzbox energy stats: {err}");
            ExitCode::FAILURE
        }
    }
}
