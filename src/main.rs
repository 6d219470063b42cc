//! `license-pushr` — authorize against a management appliance and upload a
//! license file to every host it manages.
//!
//! # Flow
//! 1. Parse and validate CLI arguments ([`cli`]).
//! 2. Open an API session ([`api::ApiClient::new`]).
//! 3. Authorize with the account credentials ([`api::ApiClient::authorize`]).
//! 4. List the managed hosts ([`api::ApiClient::list_hosts`]).
//! 5. Upload the license to each host, one at a time, in listed order
//!    ([`api::ApiClient::upload_license`]).
//! 6. Render the requested report ([`report`]).
//! 7. Exit `0` (every host accepted) or `1` (at least one rejection);
//!    transport and filesystem errors abort earlier.

mod api;
mod cli;
mod models;
mod report;

use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use api::ApiClient;
use cli::{Cli, ReportFormat};
use models::{Host, HostOutcome, UploadStatus};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    cli.validate()?;

    let license_path = Path::new(&cli.path);

    let mut client = ApiClient::new(&cli.ip, !cli.verify_tls)?;

    client
        .authorize(&cli.login, &cli.password)
        .await
        .context("can't authorize")?;

    if !cli.quiet {
        eprintln!("  {} authorized against {}", "✓".green(), cli.ip);
    }

    let hosts = client.list_hosts().await.context("can't list hosts")?;

    if !cli.quiet {
        eprintln!("  {} {} managed host(s)", "→".cyan(), hosts.len());
    }

    let outcomes = upload_to_hosts(&client, &hosts, license_path, cli.strict, cli.quiet).await?;

    // Render report
    match cli.report {
        ReportFormat::Terminal => {
            report::terminal::render(&outcomes, &cli.ip, license_path, cli.verbose, cli.quiet)?;
        }
        ReportFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&outcomes)?);
        }
    }

    // Exit code: 1 if any host rejected the license
    let has_rejections = outcomes.iter().any(|o| !o.upload.is_accepted());

    if has_rejections {
        std::process::exit(1);
    }

    Ok(())
}

/// Upload the license to every host, one at a time, in listed order.
///
/// Returns one [`HostOutcome`] per host. A rejection only stops the loop
/// under `--strict`; filesystem and transport errors always do.
async fn upload_to_hosts(
    client: &ApiClient,
    hosts: &[Host],
    license: &Path,
    strict: bool,
    quiet: bool,
) -> Result<Vec<HostOutcome>> {
    let pb = if !quiet {
        let pb = ProgressBar::new(hosts.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
                )?
                .progress_chars("#>-"),
        );
        Some(pb)
    } else {
        None
    };

    let mut outcomes = Vec::with_capacity(hosts.len());

    for host in hosts {
        if let Some(pb) = &pb {
            pb.set_message(host.id.clone());
        }

        let upload = client.upload_license(&host.id, license).await?;

        match &upload {
            UploadStatus::Accepted => {
                if let Some(pb) = &pb {
                    pb.println(format!("  {} {} accepted the license", "✓".green(), host));
                }
            }
            UploadStatus::Rejected { status } => {
                if let Some(pb) = &pb {
                    pb.println(format!(
                        "  {} {} rejected the license (HTTP {})",
                        "✗".red(),
                        host,
                        status
                    ));
                }
                if strict {
                    bail!("host {} rejected the license (HTTP {})", host.id, status);
                }
            }
        }

        outcomes.push(HostOutcome {
            id: host.id.clone(),
            name: host.name.clone(),
            upload,
        });

        if let Some(pb) = &pb {
            pb.inc(1);
        }
    }

    if let Some(pb) = pb {
        pb.finish_with_message("Done");
    }

    Ok(outcomes)
}
