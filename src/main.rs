//! # obs-bootstrap Entry Point
//!
//! One-shot provisioning of Grafana organizations, tenant datasources,
//! service-account tokens and catalog dashboards.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, error::ErrorKind};
use obs_bootstrap::{
    config::ConfigLoader,
    credentials::KubectlSecretReader,
    runner::{RunError, Session},
    telemetry,
};
use tracing::debug;

#[derive(Parser, Debug)]
#[command(
    name = "obs-bootstrap",
    version,
    about = "Bootstrap multi-tenant Grafana orgs, datasources, service accounts and dashboards"
)]
struct Cli {
    /// Create orgs, tenant datasources and service-account tokens for every tenant.
    #[arg(long)]
    bootstrap_orgs: bool,

    /// Import the catalog dashboards into Grafana.
    #[arg(long)]
    import_dashboards: bool,

    /// Open a kubectl port-forward to Grafana for the duration of the run.
    #[arg(long)]
    port_forward: bool,

    /// Where to write the bootstrap results (overrides OBS_OUTPUT_FILE).
    #[arg(long, value_name = "PATH")]
    output: Option<std::path::PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            err.exit()
        }
        Err(err) => {
            // Unrecognized input prints usage but is not a failure.
            let _ = err.print();
            return Ok(ExitCode::SUCCESS);
        }
    };

    if !cli.bootstrap_orgs && !cli.import_dashboards {
        println!("{}", Cli::command().render_help());
        return Ok(ExitCode::SUCCESS);
    }

    let mut config = ConfigLoader::new().load().context("loading configuration")?;
    if cli.port_forward {
        config.port_forward.enabled = true;
    }
    if let Some(output) = cli.output {
        config.output_file = output;
    }

    telemetry::init_tracing(&config).context("initializing logging")?;
    debug!(config = %config.redacted_json()?, "Loaded configuration for profile {}", config.profile);

    let secrets = KubectlSecretReader::new(&config.kubectl);
    let session = match Session::open(&config, &secrets).await {
        Ok(session) => session,
        Err(RunError::Connectivity(err)) => {
            eprintln!("Error: {err}");
            eprintln!("{}", err.remediation_hint());
            return Ok(ExitCode::FAILURE);
        }
        Err(err) => return Err(err).context("opening Grafana session"),
    };

    if cli.bootstrap_orgs {
        let outcome = session
            .run_bootstrap(&config, &config.output_file)
            .await
            .context("running tenant bootstrap")?;

        for (tenant, err) in &outcome.skipped {
            println!("Skipped {tenant}: {err}");
        }
        println!(
            "Bootstrap complete: {} tenant(s) provisioned. Credentials saved to {}",
            outcome.results.len(),
            config.output_file.display()
        );
    }

    if cli.import_dashboards {
        let summary = session.run_dashboard_import(&config).await;
        for outcome in &summary.outcomes {
            match &outcome.result {
                Ok(response) => match &response.imported_url {
                    Some(url) => println!("Imported {} ({url})", outcome.name),
                    None => println!("Imported {}", outcome.name),
                },
                Err(err) => println!("Failed {}: {err}", outcome.name),
            }
        }
        println!(
            "Dashboard import complete: {} imported, {} failed",
            summary.succeeded(),
            summary.failed()
        );
    }

    Ok(ExitCode::SUCCESS)
}
