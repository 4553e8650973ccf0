use clap::Parser;
use itertools::Itertools;
use log::info;

use k8s_discover::{Args, provider::Provider};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Whole discovery config, like 'provider=k8s label_selector="app=consul"'
    #[arg(short, long)]
    config: Option<String>,
    /// Print the addresses as a JSON array
    #[arg(long)]
    json: bool,
    /// Print the provider's options and exit
    #[arg(long)]
    help_provider: bool,
    /// Options as key=value, applied over --config
    options: Vec<String>,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::new().filter_or("RUST_LOG", "info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    let mut args = match &cli.config {
        Some(config) => Args::parse(config)?,
        None => Args::new(),
    };
    args.extend(Args::from_pairs(&cli.options)?);

    if args.get("provider").is_none() {
        args.set("provider", "k8s");
    }

    let provider = Provider::from_args(&args)?;

    if cli.help_provider {
        print!("{}", provider.help());
        return Ok(());
    }

    let addrs = provider.addrs(&args).await?;
    info!("discovered {} addresses using {}", addrs.len(), provider.name());

    if cli.json {
        println!("{}", serde_json::to_string(&addrs)?);
    } else {
        println!("{}", addrs.iter().join(" "));
    }

    Ok(())
}
