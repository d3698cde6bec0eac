use anyhow::Result;
use clap::{Parser, Subcommand};
use proxy_vet::{
    config::Settings,
    proxy::{export, ExportOptions, ProxyRecordParser, RunEvent, RunOrchestrator},
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Bulk proxy list validator with ISP classification
#[derive(Parser)]
#[command(name = "proxy-vet")]
#[command(about = "Bulk proxy list validator with ISP classification")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON settings file (parser columns, proxy type, timeouts, ...)
    #[arg(short, long)]
    settings: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse proxies from a file and print the normalized records
    Parse {
        /// Input file containing proxies
        input: PathBuf,
        /// Output file for normalized `ip,port,username,password` lines
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Check all proxies in a file
    Check {
        /// Input file containing proxies
        input: PathBuf,
        /// Proxy type (http, socks4, socks5)
        #[arg(short = 't', long)]
        proxy_type: Option<String>,
        /// Maximum number of concurrent checks
        #[arg(short = 'n', long)]
        concurrency: Option<usize>,
        /// Per-attempt timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,
        /// Extra attempts per provider
        #[arg(long)]
        retries: Option<u32>,
        /// Base retry delay in milliseconds
        #[arg(long)]
        retry_delay: Option<u64>,
        /// Do not write the per-carrier / failed output files
        #[arg(long)]
        no_auto_save: bool,
        /// Export the consolidated results (all columns) to this file
        #[arg(short, long)]
        export: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = match &cli.settings {
        Some(path) => Settings::from_file(path)?,
        None => Settings::default(),
    };

    match cli.command {
        Commands::Parse { input, output } => {
            let records = ProxyRecordParser::parse_file(&input, &settings.parser)?;
            println!("Parsed {} proxies from {:?}", records.len(), input);

            if let Some(path) = output {
                let lines: Vec<String> = records.iter().map(|r| r.to_csv_line()).collect();
                std::fs::write(&path, lines.join("\n") + "\n")?;
                println!("Saved normalized records to {:?}", path);
            } else {
                for record in &records {
                    println!("{:>6}  {}", record.index, record.to_csv_line());
                }
            }
        }
        Commands::Check {
            input,
            proxy_type,
            concurrency,
            timeout,
            retries,
            retry_delay,
            no_auto_save,
            export,
        } => {
            let mut settings = settings;
            if let Some(ptype) = proxy_type {
                settings = settings.with_proxy_type(ptype.parse()?);
            }
            if let Some(n) = concurrency {
                settings = settings.with_concurrency(n);
            }
            if let Some(secs) = timeout {
                settings = settings.with_timeout_secs(secs);
            }
            if let Some(count) = retries {
                settings = settings.with_retry_count(count);
            }
            if let Some(ms) = retry_delay {
                settings = settings.with_retry_delay_ms(ms);
            }
            if no_auto_save {
                settings = settings.with_auto_save(false);
            }

            let mut orchestrator = RunOrchestrator::new(settings.clone());
            let count = orchestrator.load_file(&input)?;
            println!("Loaded {} proxies from {:?}", count, input);
            println!(
                "Checking as {} with {} concurrent, timeout: {}s",
                settings.proxy_type,
                settings.concurrency,
                settings.timeout().as_secs()
            );
            println!();

            let orchestrator = Arc::new(orchestrator);
            let mut events = orchestrator.start()?;

            tokio::spawn({
                let orchestrator = Arc::clone(&orchestrator);
                async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        eprintln!("interrupted, stopping...");
                        orchestrator.stop();
                    }
                }
            });

            let mut final_stats = None;
            while let Some(event) = events.recv().await {
                match event {
                    RunEvent::Result(result) => {
                        if result.is_success() {
                            println!(
                                "✓ {} -> {} [{}] {} {}",
                                result.record.address(),
                                result.real_ip.as_deref().unwrap_or("-"),
                                result.isp,
                                result.location.as_deref().unwrap_or("-"),
                                result.response_time_display()
                            );
                        } else {
                            println!(
                                "✗ {} {}",
                                result.record.address(),
                                result.error.as_deref().unwrap_or("-")
                            );
                        }
                    }
                    RunEvent::Progress(progress) => {
                        eprintln!(
                            "{}/{} ({:.1}%) | {} | {:.1}个/秒",
                            progress.completed,
                            progress.total,
                            progress.percent,
                            format_elapsed(progress.elapsed),
                            progress.per_second
                        );
                    }
                    RunEvent::Finished(stats) => {
                        final_stats = Some(stats);
                        break;
                    }
                }
            }

            if let Some(stats) = final_stats {
                println!();
                println!(
                    "Results: {} checked, {} success, {} failed, {} unique IPs",
                    stats.completed, stats.success, stats.failed, stats.unique_ips
                );
                println!("{}", stats.isp_distribution());
            }

            if let Some(path) = export {
                let exported = export::export_to_file(
                    &path,
                    &orchestrator.results(),
                    &ExportOptions::all_columns(),
                )?;
                println!("Exported {} results to {:?}", exported, path);
            }
        }
    }

    Ok(())
}

fn format_elapsed(elapsed: Duration) -> String {
    let total = elapsed.as_secs();
    format!("{:02}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}
