use eyre::{Result, format_err};
use k8s_openapi::api::core::v1 as core;
use kube::{
    Client, Config,
    api::{Api, ListParams},
    config::{KubeConfigOptions, Kubeconfig},
};
use log::{debug, info, log_enabled, trace};

use super::MultiError;
use crate::addrs::{self, LogDiagnostics};
use crate::{Args, Instance, Options};

pub const DEFAULT_NAMESPACE: &str = "default";

pub const HELP: &str = r#"Kubernetes (K8S):

    provider:         "k8s"
    kubeconfig:       Path to the kubeconfig file.
    namespace:        Namespace to search for pods (defaults to "default").
    label_selector:   Label selector value to filter pods.
    field_selector:   Field selector value to filter pods.
    host_network:     "true" if pod host IP and ports should be used.

    The kubeconfig file value will be searched in the following locations:

     1. Use path from "kubeconfig" option if provided.
     2. Use path from KUBECONFIG environment variable.
     3. Use default path of $HOME/.kube/config

    If no kubeconfig can be loaded, the in-cluster service account is used.

    By default, the Pod IP is used to join. The "host_network" option may
    be set to use the Host IP. No port is used by default. Pods may set
    an annotation 'hashicorp.com/consul-auto-join-port' to a named port or
    an integer value. If the value matches a named port, that port will
    be used to join.

    Note that if "host_network" is set to true, then only pods that have
    a HostIP available will be selected. If a port annotation exists, then
    the port must be exposed via a HostPort as well, otherwise the pod will
    be ignored.
"#;

pub async fn addrs(args: &Args) -> Result<Vec<String>> {
    if args.get("provider") != Some("k8s") {
        return Err(format_err!(
            "discover-k8s: invalid provider {}",
            args.get("provider").unwrap_or_default()
        ));
    }

    // fail on bad options before any network call
    let opts = Options::from_args(args).map_err(|e| format_err!("discover-k8s: {e}"))?;

    let client = client(args.get("kubeconfig")).await?;

    let namespace = args.get("namespace").unwrap_or(DEFAULT_NAMESPACE);
    let params = list_params(args);

    info!(
        "listing pods in namespace {namespace} (labels: {:?}, fields: {:?})",
        params.label_selector, params.field_selector
    );

    let pods = Api::<core::Pod>::namespaced(client, namespace);
    let pods = (pods.list(&params).await)
        .map_err(|e| format_err!("discover-k8s: error listing pods: {e}"))?;

    let instances: Vec<Instance> = pods.items.iter().map(Instance::from).collect();

    if log_enabled!(log::Level::Trace) {
        trace!("pods: {}", serde_json::to_string(&instances)?);
    }

    let addrs = addrs::resolve(&instances, &opts, &mut LogDiagnostics);
    debug!("{} addresses from {} pods", addrs.len(), instances.len());

    Ok(addrs)
}

pub fn list_params(args: &Args) -> ListParams {
    let mut params = ListParams::default();
    if let Some(labels) = args.get("label_selector") {
        params = params.labels(labels);
    }
    if let Some(fields) = args.get("field_selector") {
        params = params.fields(fields);
    }
    params
}

/// Kubeconfig first, then in-cluster config. The in-cluster path is tried
/// last as it is the slowest to fail.
async fn client(kubeconfig: Option<&str>) -> Result<Client> {
    let kubeconfig_err = match client_from_kubeconfig(kubeconfig).await {
        Ok(client) => return Ok(client),
        Err(e) => e,
    };

    debug!("kubeconfig failed, trying in-cluster config: {kubeconfig_err}");

    match client_in_cluster() {
        Ok(client) => Ok(client),
        Err(e) => Err(MultiError(vec![kubeconfig_err, e]).into()),
    }
}

async fn client_from_kubeconfig(path: Option<&str>) -> Result<Client> {
    let kubeconfig = match path {
        Some(path) => Kubeconfig::read_from(path),
        None => Kubeconfig::read(),
    }
    .map_err(|e| format_err!("discover-k8s: error loading kubeconfig: {e}"))?;

    let config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
        .await
        .map_err(|e| format_err!("discover-k8s: error parsing kubeconfig: {e}"))?;

    Client::try_from(config).map_err(|e| format_err!("discover-k8s: error creating client: {e}"))
}

fn client_in_cluster() -> Result<Client> {
    let config = Config::incluster()
        .map_err(|e| format_err!("discover-k8s: error loading in-cluster config: {e}"))?;

    Client::try_from(config)
        .map_err(|e| format_err!("discover-k8s: error creating in-cluster client: {e}"))
}
