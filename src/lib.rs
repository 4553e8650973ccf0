use eyre::{Result, format_err};
use k8s_openapi::api::core::v1 as core;
use std::collections::BTreeMap as Map;

pub mod addrs;
pub mod provider;


/// Annotation giving the port name or number to append to a pod's address.
pub const ANNOTATION_KEY_PORT: &str = "hashicorp.com/consul-auto-join-port";

/// The part of a pod the address resolution looks at.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct Instance {
    pub name: Option<String>,
    pub phase: Phase,
    pub pod_ip: Option<String>,
    pub host_ip: Option<String>,
    pub conditions: Vec<Condition>,
    pub containers: Vec<Container>,
    pub annotations: Option<Map<String, String>>,
}
impl Instance {
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or_default()
    }

    pub fn annotation(&self, key: &str) -> Option<&str> {
        (self.annotations.as_ref())
            .and_then(|a| a.get(key))
            .map(|v| v.as_str())
    }
}

impl From<&core::Pod> for Instance {
    fn from(pod: &core::Pod) -> Self {
        let status = pod.status.as_ref();

        Self {
            name: pod.metadata.name.clone(),
            phase: (status.and_then(|s| s.phase.as_deref()))
                .unwrap_or_default()
                .into(),
            pod_ip: status.and_then(|s| s.pod_ip.clone()),
            host_ip: status.and_then(|s| s.host_ip.clone()),
            conditions: (status.and_then(|s| s.conditions.as_ref()).into_iter().flatten())
                .map(|c| Condition {
                    type_: c.type_.clone(),
                    status: c.status.clone(),
                })
                .collect(),
            containers: (pod.spec.as_ref().into_iter())
                .flat_map(|spec| spec.containers.iter())
                .map(|c| Container {
                    ports: (c.ports.iter().flatten())
                        .map(|p| PortDecl {
                            name: p.name.clone(),
                            container_port: p.container_port,
                            host_port: p.host_port,
                        })
                        .collect(),
                })
                .collect(),
            annotations: pod.metadata.annotations.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub enum Phase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
    Other(String),
}
impl Default for Phase {
    fn default() -> Self {
        Self::Other(String::new())
    }
}
impl From<&str> for Phase {
    fn from(s: &str) -> Self {
        match s {
            "Pending" => Self::Pending,
            "Running" => Self::Running,
            "Succeeded" => Self::Succeeded,
            "Failed" => Self::Failed,
            "Unknown" => Self::Unknown,
            _ => Self::Other(s.to_string()),
        }
    }
}
impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        let s = match self {
            Self::Pending => "Pending",
            Self::Running => "Running",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
            Self::Unknown => "Unknown",
            Self::Other(s) => s,
        };
        write!(f, "{s}")
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct Condition {
    pub type_: String,
    pub status: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct Container {
    pub ports: Vec<PortDecl>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct PortDecl {
    pub name: Option<String>,
    pub container_port: i32,
    /// 0 and None both mean "not exposed on the host"
    pub host_port: Option<i32>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Options {
    /// use the host IP and host ports instead of the pod's
    pub host_network: bool,
}
impl Options {
    pub fn from_args(args: &Args) -> Result<Self> {
        let host_network = match args.get("host_network") {
            None => false,
            Some(v) => parse_bool(v)
                .ok_or_else(|| format_err!("host_network must be boolean value: invalid syntax: {v:?}"))?,
        };
        Ok(Self { host_network })
    }
}

/// Boolean literals as accepted by the discovery config format.
pub fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

/// Discovery options, like `provider=k8s namespace=infra label_selector="app=db"`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Args(Map<String, String>);

impl Args {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Parses a whole config string. Values may be double-quoted, with `\"`
    /// and `\\` escapes inside quotes.
    pub fn parse(s: &str) -> Result<Self> {
        let mut args = Self::new();
        let mut chars = s.chars().peekable();

        loop {
            while chars.next_if(|c| c.is_whitespace()).is_some() {}
            if chars.peek().is_none() {
                break;
            }

            let mut key = String::new();
            while let Some(c) = chars.next_if(|c| *c != '=' && !c.is_whitespace()) {
                key.push(c);
            }
            if chars.next_if_eq(&'=').is_none() {
                return Err(format_err!("invalid format: {key:?} has no value"));
            }
            if key.is_empty() {
                return Err(format_err!("invalid format: empty key"));
            }

            let mut value = String::new();
            if chars.next_if_eq(&'"').is_some() {
                loop {
                    match chars.next() {
                        None => return Err(format_err!("unterminated quote in value of {key:?}")),
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(c @ ('"' | '\\')) => value.push(c),
                            Some(c) => {
                                value.push('\\');
                                value.push(c);
                            }
                            None => {
                                return Err(format_err!("unterminated quote in value of {key:?}"));
                            }
                        },
                        Some(c) => value.push(c),
                    }
                }
            } else {
                while let Some(c) = chars.next_if(|c| !c.is_whitespace()) {
                    value.push(c);
                }
            }

            args.set(key, value);
        }

        Ok(args)
    }

    /// Builds args from separate `key=value` items, split at the first `=`.
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut args = Self::new();
        for pair in pairs {
            let pair = pair.as_ref();
            let Some((key, value)) = pair.split_once('=') else {
                return Err(format_err!("invalid option {pair:?}: expected key=value"));
            };
            if key.is_empty() {
                return Err(format_err!("invalid option {pair:?}: empty key"));
            }
            args.set(key, value);
        }
        Ok(args)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn extend(&mut self, other: Args) {
        self.0.extend(other.0);
    }

    /// Empty values count as unset.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(|v| v.as_str()).filter(|v| !v.is_empty())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Args {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}
