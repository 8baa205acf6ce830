//! System statistics probe: CPU load, CPU temperature, RAM usage.
//!
//! Reads the `ecoStat` XHR payload the web UI's system monitor uses. Each
//! metric arrives as a time series; the last entry is the latest measurement.

use std::io::Write;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::probes::{leaf_to_string, modes_from_env, Probe, ProbeError, ProbeResult};
use crate::session::dispatcher::FritzboxClient;

const PAGE: &str = "data.lua";
const PARAMS: &[(&str, &str)] = &[
    ("xhr", "1"),
    ("lang", "de"),
    ("page", "ecoStat"),
    ("xhrId", "all"),
    ("useajax", "1"),
    ("no_sidrenew", ""),
];

const RAM_LABELS: &[&str] = &["strict", "cache", "free"];
const DEFAULT_MODES: &[&str] = &["cpu", "temp", "ram"];

/// Probe over the `ecoStat` page. Modes come from `ecostat_modes`
/// (space-separated subset of `cpu temp ram`).
pub struct EcostatProbe {
    modes: Vec<String>,
}

impl EcostatProbe {
    pub fn from_env() -> Self {
        Self {
            modes: modes_from_env("ecostat_modes", DEFAULT_MODES),
        }
    }

    fn enabled(&self, mode: &str) -> bool {
        self.modes.iter().any(|m| m == mode)
    }
}

#[async_trait(?Send)]
impl Probe for EcostatProbe {
    fn name(&self) -> &'static str {
        "ecostat"
    }

    fn config(&self, out: &mut dyn Write) -> ProbeResult<()> {
        if self.enabled("cpu") {
            writeln!(out, "multigraph cpuload")?;
            writeln!(out, "graph_title CPU usage")?;
            writeln!(out, "graph_vlabel %")?;
            writeln!(out, "graph_category system")?;
            writeln!(out, "graph_order cpu")?;
            writeln!(out, "graph_scale no")?;
            writeln!(out, "load.label system")?;
            writeln!(out, "load.type GAUGE")?;
            writeln!(out, "load.graph LINE1")?;
            writeln!(out, "load.min 0")?;
            writeln!(out, "load.info Fritzbox CPU usage")?;
        }
        if self.enabled("temp") {
            writeln!(out, "multigraph cputemp")?;
            writeln!(out, "graph_title CPU temperature")?;
            writeln!(out, "graph_vlabel degrees Celsius")?;
            writeln!(out, "graph_category sensors")?;
            writeln!(out, "graph_order tmp")?;
            writeln!(out, "graph_scale no")?;
            writeln!(out, "temp.label CPU temperature")?;
            writeln!(out, "temp.type GAUGE")?;
            writeln!(out, "temp.graph LINE1")?;
            writeln!(out, "temp.min 0")?;
            writeln!(out, "temp.info Fritzbox CPU temperature")?;
        }
        if self.enabled("ram") {
            writeln!(out, "multigraph ramusage")?;
            writeln!(out, "graph_title Memory")?;
            writeln!(out, "graph_vlabel %")?;
            writeln!(out, "graph_args --base 1000 -r --lower-limit 0 --upper-limit 100")?;
            writeln!(out, "graph_category system")?;
            writeln!(out, "graph_order strict cache free")?;
            for label in RAM_LABELS {
                writeln!(out, "{label}.label {label}")?;
                writeln!(out, "{label}.type GAUGE")?;
                writeln!(out, "{label}.draw AREASTACK")?;
                writeln!(out, "{label}.info Fritzbox {label} memory")?;
            }
        }
        Ok(())
    }

    async fn fetch(&self, client: &FritzboxClient, out: &mut dyn Write) -> ProbeResult<()> {
        let body = client.post_page(PAGE, PARAMS).await?;
        let payload: Value = serde_json::from_slice(&body)
            .map_err(|err| ProbeError::Payload(format!("ecoStat response is not JSON: {err}")))?;
        let data = payload
            .get("data")
            .ok_or_else(|| ProbeError::Payload("ecoStat response carries no data".to_string()))?;

        if self.enabled("cpu") {
            let cpu = section(data, "cpuutil")?;
            print_series(out, &cpu, &["load"], "cpuload", None, None)?;
        }
        if self.enabled("temp") {
            let temp = section(data, "cputemp")?;
            print_series(out, &temp, &["temp"], "cputemp", Some(0.0), Some(120.0))?;
        }
        if self.enabled("ram") {
            let ram = section(data, "ramusage")?;
            print_series(out, &ram, RAM_LABELS, "ramusage", None, None)?;
        }
        Ok(())
    }
}

/// One `ecoStat` section: a list of time series, latest measurement last.
#[derive(Debug, Deserialize)]
struct SeriesSection {
    series: Vec<Vec<Value>>,
}

fn section(data: &Value, key: &str) -> ProbeResult<SeriesSection> {
    let value = data
        .get(key)
        .ok_or_else(|| ProbeError::Payload(format!("ecoStat data carries no {key} section")))?;
    serde_json::from_value(value.clone())
        .map_err(|err| ProbeError::Payload(format!("malformed {key} section: {err}")))
}

/// Print the last value of the first `names.len()` series of a section.
/// Values outside the optional bounds are emitted as a munin comment instead,
/// so one bogus sensor reading does not poison the graph.
fn print_series(
    out: &mut dyn Write,
    data: &SeriesSection,
    names: &[&str],
    graph: &str,
    low: Option<f64>,
    high: Option<f64>,
) -> ProbeResult<()> {
    writeln!(out, "multigraph {graph}")?;
    for (index, name) in names.iter().enumerate() {
        let latest = data
            .series
            .get(index)
            .and_then(|entries| entries.last())
            .and_then(leaf_to_string)
            .ok_or_else(|| ProbeError::Payload(format!("{graph} series {index} is empty")))?;

        let numeric = latest.parse::<f64>().ok();
        let in_bounds = match (numeric, low, high) {
            (Some(value), low, high) => {
                low.is_none_or(|bound| value > bound) && high.is_none_or(|bound| value < bound)
            }
            (None, None, None) => true,
            (None, _, _) => false,
        };

        if in_bounds {
            writeln!(out, "{name}.value {latest}")?;
        } else {
            writeln!(
                out,
                "# {latest} exceeded limits {} - {}",
                bound_text(low),
                bound_text(high)
            )?;
        }
    }
    Ok(())
}

fn bound_text(bound: Option<f64>) -> String {
    match bound {
        Some(value) => value.to_string(),
        None => "None".to_string(),
    }
}
