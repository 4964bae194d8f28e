use anyhow::{Context, Result};
use attachment_monitor::app_log;
use attachment_monitor::core::validate_attachment_id;
use attachment_monitor::logging::{init_logging, LogFormat};
use attachment_monitor::{
    normalize_status, start_polling, status_view, AttachmentClient, MonitorConfig, OutcomeKind,
    ParseStatus, PollCallbacks,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "attachment-monitor")]
#[command(about = "Watch the parse status of uploaded attachments")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Emit JSON lines instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Poll an attachment until parsing finishes, fails or times out
    Watch {
        attachment_id: String,
        #[arg(long)]
        interval_ms: Option<u64>,
        #[arg(long)]
        timeout_ms: Option<u64>,
        #[arg(long)]
        service_url: Option<String>,
    },
    /// Print the normalized status and the view it renders as
    View {
        raw_status: Option<String>,
        /// Render as if a poll were in flight
        #[arg(long)]
        polling: bool,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let format = if cli.json {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    };
    init_logging(format, cli.log_file.as_deref())?;

    match cli.command {
        Command::Watch {
            attachment_id,
            interval_ms,
            timeout_ms,
            service_url,
        } => {
            let mut config = MonitorConfig::load()?;
            if let Some(url) = service_url {
                config = config.with_service_url(url);
            }
            if let Some(ms) = interval_ms {
                config = config.with_interval_ms(ms);
            }
            if let Some(ms) = timeout_ms {
                config = config.with_timeout_ms(ms);
            }
            watch(&attachment_id, config.validated()?, cli.json).await
        }
        Command::View {
            raw_status,
            polling,
        } => {
            let status = normalize_status(raw_status.as_deref());
            let view = status_view(raw_status.as_deref(), polling);
            if cli.json {
                let line = serde_json::json!({ "status": status, "view": view });
                println!("{}", line);
            } else {
                println!("{} -> {} [{}]", status, view.label, view.style_class);
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn watch(attachment_id: &str, config: MonitorConfig, json: bool) -> Result<ExitCode> {
    let attachment_id = validate_attachment_id(attachment_id)?;
    let client = AttachmentClient::from_config(&config)
        .with_context(|| format!("Failed to create client for {}", config.service_url))?;

    app_log!(info, "Status service: {}", client.base_url());
    app_log!(info, "Watching attachment {}", attachment_id);

    let callbacks = PollCallbacks::new()
        .on_update(move |view, raw| {
            if json {
                let line = serde_json::json!({ "event": "update", "view": view, "raw_status": raw });
                println!("{}", line);
            } else {
                println!("{} ({})", view.label, raw);
            }
        })
        .on_error(move |err| {
            if json {
                let line = serde_json::json!({ "event": "error", "error": err.to_string() });
                println!("{}", line);
            } else {
                eprintln!("fetch failed: {}", err);
            }
        });

    let handle = start_polling(attachment_id, client, config.poll_options(), callbacks);

    let canceller = handle.canceller();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            canceller.cancel();
        }
    });

    let outcome = handle.wait().await;
    let view = outcome.status.view();

    if json {
        println!(
            "{}",
            serde_json::json!({ "event": "settle", "outcome": outcome, "view": view })
        );
    } else {
        println!("{:?}: {} [{}]", outcome.kind, view.label, view.style_class);
    }

    let code = match (outcome.kind, outcome.status) {
        (OutcomeKind::Terminal, ParseStatus::Finish) => 0,
        (OutcomeKind::Terminal, _) => 1,
        (OutcomeKind::Timeout, _) => 2,
        (OutcomeKind::Cancelled, _) => 130,
    };
    Ok(ExitCode::from(code))
}
