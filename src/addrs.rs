//! Pod to address resolution.
//!
//! Turns a pod snapshot into the `host` or `host:port` list used to join a
//! cluster. Pods that can't be resolved are reported and left out, they never
//! fail the whole resolution.

use eyre::{Result, format_err};
use log::debug;

use crate::{ANNOTATION_KEY_PORT, Instance, Options, Phase};


/// Why a pod was left out.
#[derive(Debug)]
pub enum Skip {
    NotRunning(Phase),
    NotReady,
    EmptyIp,
    Port(eyre::Report),
}
impl std::fmt::Display for Skip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        match self {
            Self::NotRunning(phase) => write!(f, "not running: phase={phase}"),
            Self::NotReady => write!(f, "not ready"),
            Self::EmptyIp => write!(f, "requested IP is empty"),
            Self::Port(e) => write!(f, "error retrieving port: {e}"),
        }
    }
}

/// Receives one call per pod left out of a resolution.
pub trait Diagnostics {
    fn ignoring(&mut self, pod: &str, reason: &Skip);
}

/// Reports skipped pods at debug level.
pub struct LogDiagnostics;
impl Diagnostics for LogDiagnostics {
    fn ignoring(&mut self, pod: &str, reason: &Skip) {
        debug!("ignoring pod {pod:?}, {reason}");
    }
}

impl Diagnostics for Vec<(String, String)> {
    fn ignoring(&mut self, pod: &str, reason: &Skip) {
        self.push((pod.to_string(), reason.to_string()));
    }
}

/// Resolves the address of every eligible pod, in input order.
pub fn resolve(
    instances: &[Instance],
    opts: &Options,
    diag: &mut impl Diagnostics,
) -> Vec<String> {
    (instances.iter())
        .filter_map(|inst| match resolve_one(inst, opts) {
            Ok(addr) => Some(addr),
            Err(reason) => {
                diag.ignoring(inst.name(), &reason);
                None
            }
        })
        .collect()
}

/// The address to join for a single pod, or why there is none.
pub fn resolve_one(inst: &Instance, opts: &Options) -> Result<String, Skip> {
    if inst.phase != Phase::Running {
        return Err(Skip::NotRunning(inst.phase.clone()));
    }

    // no Ready condition at all is accepted
    if (inst.conditions.iter()).any(|c| c.type_ == "Ready" && c.status != "True") {
        return Err(Skip::NotReady);
    }

    let ip = if opts.host_network {
        inst.host_ip.as_deref()
    } else {
        inst.pod_ip.as_deref()
    };
    let Some(ip) = ip.filter(|ip| !ip.is_empty()) else {
        return Err(Skip::EmptyIp);
    };

    let Some(annotation) = inst.annotation(ANNOTATION_KEY_PORT).filter(|v| !v.is_empty()) else {
        return Ok(ip.to_string());
    };

    let port = pod_port(inst, annotation, opts.host_network).map_err(Skip::Port)?;
    Ok(format!("{ip}:{port}"))
}

/// Port for a non-empty port annotation: a declared port name first, then a
/// literal number. With `host`, a named port only counts if it has a host port.
pub fn pod_port(inst: &Instance, annotation: &str, host: bool) -> Result<i32> {
    let named = (inst.containers.iter())
        .flat_map(|c| c.ports.iter())
        .filter(|p| p.name.as_deref() == Some(annotation))
        .find_map(|p| {
            if !host {
                return Some(p.container_port);
            }
            p.host_port.filter(|port| *port != 0)
        });

    match named {
        Some(port) => Ok(port),
        None => parse_i32(annotation),
    }
}

/// Parses a signed 32 bits integer, with `0x`, `0o`, `0b` and leading `0`
/// (octal) base prefixes. `_` may separate digits, or follow the prefix.
pub fn parse_i32(s: &str) -> Result<i32> {
    let invalid = || format_err!("parsing {s:?}: invalid syntax");

    let (negative, unsigned) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };

    let prefixed = |lower: &str, upper: &str| {
        (unsigned.strip_prefix(lower)).or_else(|| unsigned.strip_prefix(upper))
    };
    let (radix, digits) = if let Some(d) = prefixed("0x", "0X") {
        (16, d)
    } else if let Some(d) = prefixed("0o", "0O") {
        (8, d)
    } else if let Some(d) = prefixed("0b", "0B") {
        (2, d)
    } else if unsigned.len() > 1 && unsigned.starts_with('0') {
        (8, &unsigned[1..])
    } else {
        (10, unsigned)
    };

    // digits only, the sign was stripped above
    if digits.is_empty() || !digits.chars().all(|c| c == '_' || c.is_digit(radix)) {
        return Err(invalid());
    }

    // a base prefix (leading 0 included) counts as a digit before a `_`
    let mut after_digit = radix != 10;
    for c in digits.chars() {
        if c == '_' {
            if !after_digit {
                return Err(invalid());
            }
            after_digit = false;
        } else {
            after_digit = true;
        }
    }
    if !after_digit {
        return Err(invalid());
    }

    let digits: String = digits.chars().filter(|c| *c != '_').collect();

    let magnitude = u64::from_str_radix(&digits, radix)
        .map_err(|_| format_err!("parsing {s:?}: value out of range"))?;
    let value = if negative {
        -(magnitude as i128)
    } else {
        magnitude as i128
    };

    i32::try_from(value).map_err(|_| format_err!("parsing {s:?}: value out of range"))
}
