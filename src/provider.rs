use eyre::{Result, format_err};

use crate::Args;

pub mod k8s;


/// Known discovery providers. An enum rather than a trait object since
/// providers are async.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Provider {
    K8s,
}

impl Provider {
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "k8s" => Ok(Self::K8s),
            _ => Err(format_err!("invalid provider {name}")),
        }
    }

    /// The provider named by the `provider` option.
    pub fn from_args(args: &Args) -> Result<Self> {
        Self::from_name(args.get("provider").unwrap_or_default())
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::K8s => "k8s",
        }
    }

    pub fn help(&self) -> &'static str {
        match self {
            Self::K8s => k8s::HELP,
        }
    }

    pub async fn addrs(&self, args: &Args) -> Result<Vec<String>> {
        match self {
            Self::K8s => k8s::addrs(args).await,
        }
    }
}

/// Errors of every alternative tried, reported as one.
#[derive(Debug)]
pub struct MultiError(pub Vec<eyre::Report>);

impl std::fmt::Display for MultiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(f, "{} errors occurred:", self.0.len())?;
        for e in &self.0 {
            write!(f, "\n\t* {e}")?;
        }
        Ok(())
    }
}
impl std::error::Error for MultiError {}
