//! bulk-mailer: send a personalized email to every row of a CSV file
//!
//! # Usage
//!
//! ```bash
//! # Write a starter config.json
//! bulk-mailer --create-config
//!
//! # Preview every message without sending
//! bulk-mailer recipients.csv --dry-run
//!
//! # Send, exposing the `title` column as {paper_title}
//! bulk-mailer recipients.csv -c config.json --template-vars paper_title:title
//! ```

use anyhow::Context;
use bulk_mailer::api::MailgunClient;
use bulk_mailer::config::{CampaignConfig, DEFAULT_CONFIG_FILE};
use bulk_mailer::dispatch::{
    CampaignRunner, CampaignStatistics, EmailDispatcher, UNIQUE_CODE_VAR,
};
use bulk_mailer::events::TracingEventSink;
use bulk_mailer::logging;
use bulk_mailer::recipients::{
    ColumnMapping, CsvRecipientSource, RecipientRecord, DEFAULT_EMAIL_COLUMN,
};
use bulk_mailer::templates::TemplateRenderer;
use clap::Parser;
use std::future::Future;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "bulk-mailer")]
#[command(about = "Send emails using the Mailgun API", long_about = None)]
struct Cli {
    /// CSV file containing recipient data
    #[arg(required_unless_present = "create_config")]
    csv_file: Option<PathBuf>,

    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Name of the email column in the CSV
    #[arg(long, default_value = DEFAULT_EMAIL_COLUMN)]
    email_column: String,

    /// Template variable mappings (format: var_name:csv_column)
    #[arg(long, num_args = 0..)]
    template_vars: Vec<ColumnMapping>,

    /// Create a default configuration file and exit
    #[arg(long)]
    create_config: bool,

    /// Show what would be sent without actually sending
    #[arg(long)]
    dry_run: bool,

    /// Append log output to this file
    #[arg(long, default_value = "email_sender.log")]
    log_file: PathBuf,
}

/// Exit status when a second interrupt aborts the run
const FORCED_EXIT_CODE: i32 = 130;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.create_config {
        return match CampaignConfig::write_default(&cli.config) {
            Ok(()) => {
                println!(
                    "Default configuration file '{}' created. Please update it with your settings.",
                    cli.config.display()
                );
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                ExitCode::FAILURE
            }
        };
    }

    if let Err(e) = logging::init(Some(&cli.log_file)) {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(stats) => {
            print_summary(&stats);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<CampaignStatistics> {
    let config = CampaignConfig::from_file(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    let config = Arc::new(config);
    info!("Configuration loaded from {}", cli.config.display());

    let csv_file = cli
        .csv_file
        .context("A CSV file is required unless --create-config is given")?;
    for mapping in &cli.template_vars {
        info!("Template variable mapping {}", mapping);
    }
    let recipients = CsvRecipientSource::new(&csv_file)
        .with_email_column(cli.email_column)
        .with_mappings(cli.template_vars)
        .load()
        .with_context(|| format!("Failed to read recipients from {}", csv_file.display()))?;

    let variables = TemplateRenderer::extract_variables(&config.template);
    info!(
        "{} recipients, template variables: {}",
        recipients.len(),
        variables.join(", ")
    );
    if let Some(first) = recipients.first() {
        let missing = unsupplied_variables(&config, first);
        if !missing.is_empty() {
            warn!(
                "No column supplies template variables {}; rows without them will be skipped",
                missing.join(", ")
            );
        }
    }

    let sink = Arc::new(TracingEventSink);
    let api = MailgunClient::new(&config).context("Failed to build HTTP client")?;

    let shutdown = CancellationToken::new();
    let interrupt = shutdown.clone();
    tokio::spawn(async move {
        if watch_interrupts(tokio::signal::ctrl_c, interrupt).await {
            warn!("Second interrupt received, exiting immediately");
            std::process::exit(FORCED_EXIT_CODE);
        }
    });

    if cli.dry_run {
        println!("Dry run mode - no emails will be sent");
    } else {
        println!("Sending emails from {}...", csv_file.display());
    }

    let dispatcher = EmailDispatcher::new(api, Arc::clone(&config), sink.clone());
    let stats = CampaignRunner::new(dispatcher, sink)
        .with_shutdown(shutdown)
        .run(&recipients, cli.dry_run)
        .await;

    Ok(stats)
}

/// Template variables that neither the first row, the configuration nor the
/// generated unique code can fill
fn unsupplied_variables(config: &CampaignConfig, first: &RecipientRecord) -> Vec<String> {
    let mut available = first.fields.clone();
    available.extend(config.fixed_variables());
    available.entry(UNIQUE_CODE_VAR.to_string()).or_default();

    let mut missing = TemplateRenderer::missing_variables(&config.subject, &available);
    missing.extend(TemplateRenderer::missing_variables(&config.template, &available));
    missing.sort();
    missing.dedup();
    missing
}

/// Cancel `shutdown` on the first interrupt; true once a second one arrives
async fn watch_interrupts<F, Fut>(mut interrupted: F, shutdown: CancellationToken) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<()>>,
{
    if let Err(e) = interrupted().await {
        warn!("Cannot listen for interrupts: {}", e);
        return false;
    }
    warn!("Interrupt received, finishing the current recipient (press Ctrl-C again to abort)");
    shutdown.cancel();

    interrupted().await.is_ok()
}

fn print_summary(stats: &CampaignStatistics) {
    if stats.interrupted {
        println!("\nEmail sending interrupted!");
    } else {
        println!("\nEmail sending completed!");
    }
    println!("Total: {}", stats.total);
    println!("Successful: {}", stats.sent);
    println!("Failed: {}", stats.failed);
    println!("Skipped: {}", stats.skipped);
    if stats.previewed > 0 {
        println!("Previewed: {}", stats.previewed);
    }
    println!("Elapsed: {:.1}s", stats.elapsed.as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_full_command_line() {
        let cli = Cli::try_parse_from([
            "bulk-mailer",
            "people.csv",
            "-c",
            "campaign.json",
            "--email-column",
            "contact",
            "--template-vars",
            "paper_title:title",
            "who:name",
            "--dry-run",
        ])
        .unwrap();

        assert_eq!(cli.csv_file, Some(PathBuf::from("people.csv")));
        assert_eq!(cli.config, PathBuf::from("campaign.json"));
        assert_eq!(cli.email_column, "contact");
        assert_eq!(cli.template_vars.len(), 2);
        assert_eq!(cli.template_vars[1].variable, "who");
        assert!(cli.dry_run);
        assert!(!cli.create_config);
    }

    #[test]
    fn test_csv_file_required_unless_creating_config() {
        assert!(Cli::try_parse_from(["bulk-mailer"]).is_err());

        let cli = Cli::try_parse_from(["bulk-mailer", "--create-config"]).unwrap();
        assert!(cli.create_config);
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_FILE));
    }

    fn campaign_config(subject: &str, template: &str) -> CampaignConfig {
        CampaignConfig {
            domain: "mg.example.com".to_string(),
            api_key: secrecy::Secret::new("key-test".to_string()),
            sender_email: "team@example.com".to_string(),
            subject: subject.to_string(),
            template: template.to_string(),
            registration_link: "https://example.com/register".to_string(),
            delay_between_emails: 0.0,
            max_retries: 0,
            retry_delay: 0.0,
            api_base_url: "http://localhost".to_string(),
            request_timeout_secs: 5,
        }
    }

    #[test]
    fn test_unsupplied_variables_ignore_config_and_generated_values() {
        let config = campaign_config(
            "Hello {name}",
            "{name} {title} {registration_link} {unique_code} {venue}",
        );
        let first = RecipientRecord::new(
            1,
            "a@b.com",
            std::collections::HashMap::from([
                ("email".to_string(), "a@b.com".to_string()),
                ("name".to_string(), "A".to_string()),
            ]),
        );

        assert_eq!(unsupplied_variables(&config, &first), vec!["title", "venue"]);
    }

    #[tokio::test]
    async fn test_first_interrupt_cancels_and_second_forces_exit() {
        let token = CancellationToken::new();
        let presses = std::sync::atomic::AtomicUsize::new(0);

        let forced = watch_interrupts(
            || {
                presses.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                std::future::ready(Ok(()))
            },
            token.clone(),
        )
        .await;

        assert!(forced);
        assert!(token.is_cancelled());
        assert_eq!(presses.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_listener_failure_after_first_interrupt_does_not_force_exit() {
        let token = CancellationToken::new();
        let mut presses = 0;

        let forced = watch_interrupts(
            || {
                presses += 1;
                std::future::ready(if presses == 1 {
                    Ok(())
                } else {
                    Err(std::io::Error::new(std::io::ErrorKind::Other, "closed"))
                })
            },
            token.clone(),
        )
        .await;

        assert!(!forced);
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_listener_failure_leaves_campaign_running() {
        let token = CancellationToken::new();

        let forced = watch_interrupts(
            || std::future::ready(Err(std::io::Error::new(std::io::ErrorKind::Other, "no tty"))),
            token.clone(),
        )
        .await;

        assert!(!forced);
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_malformed_mapping_is_rejected() {
        let result =
            Cli::try_parse_from(["bulk-mailer", "people.csv", "--template-vars", "title"]);
        assert!(result.is_err());
    }
}
