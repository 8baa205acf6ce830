//! Power, connected-device and uptime probe over the `energy` XHR payload.
//!
//! The payload's `data.drain` array is positional: its entries line up with
//! the device list of the product variant (a DSL box has more drains than a
//! repeater). Uptime only exists as localized status text, so it is parsed
//! back out of the German or English wording.

use std::io::Write;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::probes::{leaf_to_string, modes_from_env, Probe, ProbeError, ProbeResult};
use crate::session::dispatcher::FritzboxClient;

const PAGE: &str = "data.lua";
const PARAMS: &[(&str, &str)] = &[
    ("xhr", "1"),
    ("lang", "de"),
    ("page", "energy"),
    ("xhrId", "all"),
    ("useajax", "1"),
    ("no_sidrenew", ""),
];

const DSL_DEVICES: &[&str] = &["system", "cpu", "wifi", "dsl", "ab", "usb", "lan"];
const REPEATER_DEVICES: &[&str] = &["system", "cpu", "wifi", "lan"];
const DEFAULT_MODES: &[&str] = &["power", "devices", "uptime"];

static UPTIME_DE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)\s(Tag|Stunden|Minuten)").unwrap());
static UPTIME_EN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)\s(days|hours|minutes)").unwrap());

/// Product variant, selecting which drain entries exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductKind {
    Dsl,
    Repeater,
}

impl ProductKind {
    fn from_env() -> ProbeResult<Self> {
        match std::env::var("energy_product").as_deref() {
            Ok("DSL") | Err(_) => Ok(ProductKind::Dsl),
            Ok("repeater") => Ok(ProductKind::Repeater),
            Ok(other) => Err(ProbeError::Session(crate::error::FritzError::Config(
                format!("unknown energy_product {other}"),
            ))),
        }
    }

    fn devices(self) -> &'static [&'static str] {
        match self {
            ProductKind::Dsl => DSL_DEVICES,
            ProductKind::Repeater => REPEATER_DEVICES,
        }
    }
}

/// Only the ethernet switch reports no power share.
fn has_power_stats(device: &str) -> bool {
    device != "lan"
}

fn device_info(device: &str) -> &'static str {
    match device {
        "system" => "Fritzbox overall power consumption",
        "cpu" => "Fritzbox central processor power consumption",
        "wifi" => "Fritzbox wifi power consumption",
        "dsl" => "Fritzbox dsl power consumption",
        "ab" => "Fritzbox analog phone ports power consumption",
        "usb" => "Fritzbox usb devices power consumption",
        _ => "",
    }
}

/// Uptime status locale (`locale` env, default German).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UptimeLocale {
    De,
    En,
}

impl UptimeLocale {
    fn from_env() -> Self {
        match std::env::var("locale").as_deref() {
            Ok("en") => UptimeLocale::En,
            _ => UptimeLocale::De,
        }
    }

    fn pattern(self) -> &'static Regex {
        match self {
            UptimeLocale::De => &UPTIME_DE,
            UptimeLocale::En => &UPTIME_EN,
        }
    }

    fn day_word(self) -> &'static str {
        match self {
            UptimeLocale::De => "Tag",
            UptimeLocale::En => "days",
        }
    }

    fn hour_word(self) -> &'static str {
        match self {
            UptimeLocale::De => "Stunden",
            UptimeLocale::En => "hours",
        }
    }
}

/// Probe over the `energy` page. Modes come from `energy_modes`
/// (space-separated subset of `power devices uptime`), the product variant
/// from `energy_product` (`DSL` or `repeater`).
pub struct EnergyProbe {
    modes: Vec<String>,
    product: ProductKind,
    locale: UptimeLocale,
}

impl EnergyProbe {
    pub fn from_env() -> ProbeResult<Self> {
        Ok(Self {
            modes: modes_from_env("energy_modes", DEFAULT_MODES),
            product: ProductKind::from_env()?,
            locale: UptimeLocale::from_env(),
        })
    }

    fn enabled(&self, mode: &str) -> bool {
        self.modes.iter().any(|m| m == mode)
    }

    fn device_index(&self, device: &str) -> ProbeResult<usize> {
        self.product
            .devices()
            .iter()
            .position(|candidate| *candidate == device)
            .ok_or_else(|| {
                ProbeError::Payload(format!("product variant has no {device} drain"))
            })
    }
}

#[async_trait(?Send)]
impl Probe for EnergyProbe {
    fn name(&self) -> &'static str {
        "energy"
    }

    fn config(&self, out: &mut dyn Write) -> ProbeResult<()> {
        let devices = self.product.devices();

        if self.enabled("power") {
            writeln!(out, "multigraph power")?;
            writeln!(out, "graph_title AVM Fritz!Box Power Consumption")?;
            writeln!(out, "graph_vlabel %")?;
            writeln!(out, "graph_args --lower-limit 0 --upper-limit 100 --rigid")?;
            writeln!(out, "graph_category system")?;
            let order: Vec<&str> = devices
                .iter()
                .copied()
                .filter(|device| has_power_stats(device))
                .collect();
            writeln!(out, "graph_order {}", order.join(" "))?;
            for device in order {
                writeln!(out, "{device}.label {device}")?;
                writeln!(out, "{device}.type GAUGE")?;
                writeln!(out, "{device}.graph LINE1")?;
                writeln!(out, "{device}.min 0")?;
                writeln!(out, "{device}.max 100")?;
                writeln!(out, "{device}.info {}", device_info(device))?;
            }
        }

        if self.enabled("devices") {
            writeln!(out, "multigraph devices")?;
            writeln!(out, "graph_title AVM Fritz!Box Connected Devices")?;
            writeln!(out, "graph_vlabel Number of devices")?;
            writeln!(out, "graph_args --base 1000")?;
            writeln!(out, "graph_category network")?;
            writeln!(out, "wifi.type GAUGE")?;
            writeln!(out, "wifi.graph LINE1")?;
            writeln!(out, "wifi.label wifi")?;
            writeln!(out, "wifi.info Wifi Connections on 2.4 & 5 Ghz")?;
            writeln!(out, "lan.type GAUGE")?;
            writeln!(out, "lan.graph LINE1")?;
            writeln!(out, "lan.label lan")?;
            writeln!(out, "lan.info LAN Connections")?;
        }

        if self.enabled("uptime") {
            writeln!(out, "multigraph uptime")?;
            writeln!(out, "graph_title AVM Fritz!Box Uptime")?;
            writeln!(out, "graph_vlabel uptime in days")?;
            writeln!(out, "graph_args --base 1000 -l 0")?;
            writeln!(out, "graph_scale no")?;
            writeln!(out, "graph_category system")?;
            writeln!(out, "uptime.label uptime")?;
            writeln!(out, "uptime.draw AREA")?;
        }

        Ok(())
    }

    async fn fetch(&self, client: &FritzboxClient, out: &mut dyn Write) -> ProbeResult<()> {
        let body = client.post_page(PAGE, PARAMS).await?;
        let payload: Value = serde_json::from_slice(&body)
            .map_err(|err| ProbeError::Payload(format!("energy response is not JSON: {err}")))?;
        let drain = payload
            .pointer("/data/drain")
            .and_then(Value::as_array)
            .ok_or_else(|| ProbeError::Payload("energy response carries no drain".to_string()))?;

        if self.enabled("power") {
            writeln!(out, "multigraph power")?;
            for (index, device) in self.product.devices().iter().enumerate() {
                if !has_power_stats(device) {
                    continue;
                }
                let value = drain
                    .get(index)
                    .and_then(|entry| entry.get("actPerc"))
                    .and_then(leaf_to_string)
                    .ok_or_else(|| {
                        ProbeError::Payload(format!("drain {index} ({device}) has no actPerc"))
                    })?;
                writeln!(out, "{device}.value {value}")?;
            }
        }

        if self.enabled("devices") {
            writeln!(out, "multigraph devices")?;

            // The wifi statuses come as an array whose second line counts the
            // connected stations; the lan statuses are one plain string.
            let wifi = drain
                .get(self.device_index("wifi")?)
                .and_then(|entry| entry.get("statuses"))
                .and_then(Value::as_array);
            if let Some(statuses) = wifi
                && statuses.len() == 2
                && let Some(line) = statuses[1].as_str()
                && let Some(count) = line.split_whitespace().next()
            {
                writeln!(out, "wifi.value {count}")?;
            }

            let lan = drain
                .get(self.device_index("lan")?)
                .and_then(|entry| entry.get("statuses"))
                .and_then(Value::as_str)
                .and_then(|line| line.split_whitespace().next())
                .ok_or_else(|| {
                    ProbeError::Payload("lan drain carries no status text".to_string())
                })?;
            writeln!(out, "lan.value {lan}")?;
        }

        if self.enabled("uptime") {
            writeln!(out, "multigraph uptime")?;
            let status = drain
                .get(self.device_index("system")?)
                .and_then(|entry| entry.get("statuses"))
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    ProbeError::Payload("system drain carries no status text".to_string())
                })?;
            let days = parse_uptime_days(status, self.locale);
            writeln!(out, "uptime.value {days:.2}")?;
        }

        Ok(())
    }
}

/// Sum the localized "N days, N hours, N minutes" fragments into days.
fn parse_uptime_days(status: &str, locale: UptimeLocale) -> f64 {
    let mut hours = 0.0;
    for captures in locale.pattern().captures_iter(status) {
        let amount: f64 = captures[1].parse().unwrap_or(0.0);
        let unit = &captures[2];
        if unit == locale.day_word() {
            hours += 24.0 * amount;
        } else if unit == locale.hour_word() {
            hours += amount;
        } else {
            hours += amount / 60.0;
        }
    }
    hours / 24.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn probe(modes: &[&str], product: ProductKind) -> EnergyProbe {
        EnergyProbe {
            modes: modes.iter().map(|mode| mode.to_string()).collect(),
            product,
            locale: UptimeLocale::De,
        }
    }

    fn dsl_payload() -> Vec<u8> {
        json!({
            "data": {
                "drain": [
                    {"actPerc": 27, "statuses": "seit 2 Tagen, 3 Stunden, 30 Minuten"},
                    {"actPerc": 12},
                    {"actPerc": 5, "statuses": ["an", "7 von 12 Geräten aktiv"]},
                    {"actPerc": 8},
                    {"actPerc": 1},
                    {"actPerc": 0},
                    {"statuses": "3 von 4 Anschlüssen aktiv"}
                ]
            }
        })
        .to_string()
        .into_bytes()
    }

    #[test]
    fn uptime_sums_localized_fragments() {
        let days = parse_uptime_days("seit 2 Tagen, 3 Stunden, 30 Minuten", UptimeLocale::De);
        assert!((days - (51.5 / 24.0)).abs() < 1e-9);

        let days = parse_uptime_days("up 1 days, 12 hours", UptimeLocale::En);
        assert!((days - 1.5).abs() < 1e-9);

        assert_eq!(parse_uptime_days("no digits here", UptimeLocale::De), 0.0);
    }

    #[test]
    fn config_orders_power_devices_without_lan() {
        let mut out = Vec::new();
        probe(&["power"], ProductKind::Dsl).config(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("graph_order system cpu wifi dsl ab usb"));
        assert!(!text.contains("lan.label"));
    }

    #[test]
    fn repeater_variant_has_fewer_drains() {
        let probe = probe(&["power"], ProductKind::Repeater);
        assert_eq!(probe.device_index("lan").unwrap(), 3);
        assert!(probe.device_index("dsl").is_err());
    }

    #[tokio::test]
    async fn fetch_prints_power_devices_and_uptime() {
        use crate::endpoint::Endpoint;
        use crate::session::cache::SessionCache;
        use crate::session::dispatcher::FritzboxClient;
        use crate::session::transport::{HttpTransport, PageResponse};
        use crate::session::Credentials;
        use async_trait::async_trait;
        use std::sync::Arc;
        use url::Url;

        struct Scripted;

        #[async_trait]
        impl HttpTransport for Scripted {
            async fn get(&self, _url: &Url) -> crate::error::FritzResult<PageResponse> {
                // Login handshake: grant a session without a challenge.
                Ok(PageResponse {
                    status: 200,
                    body: "<SessionInfo><SID>9c977765016899f8</SID></SessionInfo>".into(),
                })
            }

            async fn post_form(
                &self,
                _url: &Url,
                fields: &[(String, String)],
            ) -> crate::error::FritzResult<PageResponse> {
                assert!(fields.iter().any(|(key, _)| key == "sid"));
                Ok(PageResponse {
                    status: 200,
                    body: dsl_payload().into(),
                })
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let client = FritzboxClient::with_transport(
            Endpoint::new("fritz.box", 443, true),
            Credentials::new("monitoring", "secret"),
            SessionCache::new(dir.path()),
            Arc::new(Scripted),
        );

        let probe = probe(&["power", "devices", "uptime"], ProductKind::Dsl);
        let mut out = Vec::new();
        probe.fetch(&client, &mut out).await.unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("multigraph power"));
        assert!(text.contains("system.value 27"));
        assert!(text.contains("usb.value 0"));
        assert!(text.contains("wifi.value 7"));
        assert!(text.contains("lan.value 3"));
        assert!(text.contains("uptime.value 2.15"));
    }
}
