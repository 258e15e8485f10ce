//! Network probes: identity, traffic counters, interfaces, DNS, WiFi, ports

use crate::util::{bytes_to_mb, exec};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use sysinfo::{Networks, System};
use sysscope_common::{Fact, FnProbe, Platform, ProbeContext, ProbeFailure, ProbeGroup, Requirement};
use tracing::debug;

pub fn group(ctx: &ProbeContext) -> ProbeGroup {
    let wifi = match ctx.capabilities.platform {
        Platform::Windows => FnProbe::new("WiFi", wifi_info).requires(Requirement::Tool("netsh")),
        _ => FnProbe::new("WiFi", wifi_info)
            .requires(Requirement::Platform(Platform::Linux))
            .requires(Requirement::Tool("nmcli")),
    };

    ProbeGroup::new("network", ctx)
        .with(FnProbe::new("Hostname", host_info))
        .with(FnProbe::new("Network I/O", io_info))
        .with(FnProbe::new("Network Interfaces", interfaces_info))
        .with(FnProbe::new("DNS Servers", dns_info).requires(Requirement::Unix))
        .with(wifi)
        .with(FnProbe::new("Open Ports", open_ports_info))
}

pub fn host_info(ctx: &ProbeContext) -> Result<Vec<Fact>, ProbeFailure> {
    let hostname = System::host_name()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| ProbeFailure::runtime("hostname not reported"))?;

    let fqdn = if ctx.capabilities.platform.is_unix() && ctx.capabilities.has_tool("hostname") {
        exec(ctx)
            .stdout("hostname", &["-f"])
            .map(|out| out.trim().to_string())
            .ok()
            .filter(|f| !f.is_empty())
            .unwrap_or_else(|| hostname.clone())
    } else {
        hostname.clone()
    };

    let timeout = Duration::from_millis(ctx.config.collection.command_timeout_ms);
    let ip = resolve_ipv4(&hostname, timeout)
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| "N/A".to_string());

    Ok(vec![
        Fact::new("Hostname", hostname),
        Fact::new("FQDN", fqdn),
        Fact::new("IP Address (Local)", ip),
    ])
}

/// Resolve on a helper thread so a stuck resolver cannot outlive `timeout`
fn resolve_ipv4(host: &str, timeout: Duration) -> Option<Ipv4Addr> {
    let (tx, rx) = mpsc::channel();
    let host = host.to_string();
    thread::spawn(move || {
        let found = (host.as_str(), 0)
            .to_socket_addrs()
            .ok()
            .and_then(|mut addrs| {
                addrs.find_map(|a| match a.ip() {
                    IpAddr::V4(v4) => Some(v4),
                    IpAddr::V6(_) => None,
                })
            });
        let _ = tx.send(found);
    });
    rx.recv_timeout(timeout).ok().flatten()
}

pub fn io_info(_ctx: &ProbeContext) -> Result<Vec<Fact>, ProbeFailure> {
    let networks = Networks::new_with_refreshed_list();
    let (mut sent, mut received, mut packets_sent, mut packets_received) = (0u64, 0u64, 0u64, 0u64);
    for (_, data) in networks.iter() {
        sent += data.total_transmitted();
        received += data.total_received();
        packets_sent += data.total_packets_transmitted();
        packets_received += data.total_packets_received();
    }

    Ok(vec![
        Fact::new("Network Bytes Sent (MB)", bytes_to_mb(sent)),
        Fact::new("Network Bytes Received (MB)", bytes_to_mb(received)),
        Fact::new("Network Packets Sent", packets_sent),
        Fact::new("Network Packets Received", packets_received),
    ])
}

pub fn interfaces_info(ctx: &ProbeContext) -> Result<Vec<Fact>, ProbeFailure> {
    let networks = Networks::new_with_refreshed_list();
    let mut interfaces: Vec<(String, String)> = networks
        .iter()
        .map(|(name, data)| (name.clone(), data.mac_address().to_string()))
        .collect();
    interfaces.sort_by(|a, b| a.0.cmp(&b.0));

    let ipv4 = if ctx.capabilities.platform == Platform::Linux && ctx.capabilities.has_tool("ip") {
        exec(ctx)
            .stdout("ip", &["-o", "-4", "addr", "show"])
            .map(|out| parse_ip_addr(&out))
            .unwrap_or_else(|e| {
                debug!("ip addr failed: {}", e);
                HashMap::new()
            })
    } else {
        HashMap::new()
    };

    Ok(interface_facts(&interfaces, &ipv4, ctx.config.probes.max_interfaces))
}

/// `2: eth0    inet 10.0.0.2/24 ...`
static IP_ADDR_LINE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^\d+:\s+(\S+)\s+inet\s+([0-9.]+)/").ok());

/// Interface name → first IPv4 address, from `ip -o -4 addr show`
pub fn parse_ip_addr(output: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    let Some(re) = IP_ADDR_LINE.as_ref() else {
        return map;
    };
    for line in output.lines() {
        if let Some(caps) = re.captures(line.trim()) {
            map.entry(caps[1].to_string())
                .or_insert_with(|| caps[2].to_string());
        }
    }
    map
}

pub fn interface_facts(
    interfaces: &[(String, String)],
    ipv4: &HashMap<String, String>,
    limit: usize,
) -> Vec<Fact> {
    if interfaces.is_empty() {
        return vec![Fact::new("Network Interfaces", "None found")];
    }

    let mut facts = vec![Fact::new("Network Interfaces Count", interfaces.len())];
    for (i, (name, mac)) in interfaces.iter().take(limit).enumerate() {
        let n = i + 1;
        let ip = ipv4.get(name).map(String::as_str).unwrap_or("N/A");
        facts.push(Fact::new(format!("Interface {} Name", n), name.as_str()));
        facts.push(Fact::new(format!("Interface {} IPv4", n), ip));
        facts.push(Fact::new(format!("Interface {} MAC", n), mac.as_str()));
    }
    facts
}

pub fn dns_info(_ctx: &ProbeContext) -> Result<Vec<Fact>, ProbeFailure> {
    let content = fs::read_to_string("/etc/resolv.conf")?;
    let servers = parse_resolv_conf(&content);
    let text = if servers.is_empty() {
        "None configured".to_string()
    } else {
        servers.join(", ")
    };
    Ok(vec![Fact::new("DNS Servers", text)])
}

pub fn parse_resolv_conf(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.starts_with('#') && !l.starts_with(';'))
        .filter_map(|l| l.strip_prefix("nameserver"))
        .filter_map(|rest| rest.split_whitespace().next())
        .map(str::to_string)
        .collect()
}

pub fn wifi_info(ctx: &ProbeContext) -> Result<Vec<Fact>, ProbeFailure> {
    let runner = exec(ctx);
    let status = match ctx.capabilities.platform {
        Platform::Windows => parse_netsh_wlan(&runner.stdout("netsh", &["wlan", "show", "interfaces"])?),
        _ => parse_nmcli_wifi(&runner.stdout(
            "nmcli",
            &["-t", "-f", "active,ssid,signal", "dev", "wifi"],
        )?),
    };

    // Not connected: no facts
    Ok(match status {
        Some((ssid, signal)) => vec![Fact::new("WiFi SSID", ssid), Fact::new("WiFi Signal", signal)],
        None => Vec::new(),
    })
}

/// SSID and signal from `netsh wlan show interfaces`
pub fn parse_netsh_wlan(output: &str) -> Option<(String, String)> {
    let mut ssid = None;
    let mut signal = None;
    for line in output.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        match key.trim() {
            "SSID" => ssid = Some(value.trim().to_string()),
            "Signal" => signal = Some(value.trim().to_string()),
            _ => {}
        }
    }
    ssid.map(|s| (s, signal.unwrap_or_else(|| "Unknown".to_string())))
}

/// Active network from `nmcli -t -f active,ssid,signal dev wifi`.
/// Colons inside the SSID are escaped as `\:`.
pub fn parse_nmcli_wifi(output: &str) -> Option<(String, String)> {
    output.lines().find_map(|line| {
        let rest = line.strip_prefix("yes:")?;
        let (ssid, signal) = rest.rsplit_once(':')?;
        Some((ssid.replace("\\:", ":"), format!("{}%", signal.trim())))
    })
}

pub fn open_ports_info(ctx: &ProbeContext) -> Result<Vec<Fact>, ProbeFailure> {
    let timeout = Duration::from_millis(ctx.config.collection.port_timeout_ms);
    let open: Vec<String> = ctx
        .config
        .probes
        .ports
        .iter()
        .filter(|port| {
            let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, **port));
            TcpStream::connect_timeout(&addr, timeout).is_ok()
        })
        .map(|port| port.to_string())
        .collect();

    let text = if open.is_empty() {
        "None found".to_string()
    } else {
        open.join(", ")
    };
    Ok(vec![Fact::new("Open Ports (Local Sample)", text)])
}
