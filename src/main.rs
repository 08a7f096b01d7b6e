use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use openask::config::{AppConfig, Cli};
use openask::providers::GeminiProvider;
use openask::services::export::export_to_markdown;
use openask::ui::{ChatView, TerminalView};
use openask::ChatController;

enum Command<'a> {
    New,
    Attach(Vec<&'a str>),
    Detach(&'a str),
    Pending,
    History,
    Export(&'a str),
    Help,
    Quit,
    Unknown(&'a str),
    Send(&'a str),
}

fn parse_command(line: &str) -> Command<'_> {
    let Some(rest) = line.trim().strip_prefix('/') else {
        return Command::Send(line);
    };
    let (name, args) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    let args = args.trim();
    match name {
        "new" => Command::New,
        "attach" => Command::Attach(args.split_whitespace().collect()),
        "detach" => Command::Detach(args),
        "pending" => Command::Pending,
        "history" => Command::History,
        "export" => Command::Export(args),
        "help" => Command::Help,
        "quit" | "exit" => Command::Quit,
        _ => Command::Unknown(name),
    }
}

async fn send(controller: &mut ChatController, view: &mut TerminalView<std::io::Stdout>, text: &str) {
    let cancel_token = CancellationToken::new();
    let watcher = {
        let token = cancel_token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                token.cancel();
            }
        })
    };

    if !controller.send(text, view, cancel_token).await {
        view.print_info("Nothing to send.");
    }
    watcher.abort();
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("openask=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = AppConfig::from_cli(Cli::parse())?;
    if !config.color {
        colored::control::set_override(false);
    }
    tracing::debug!(?config, "Starting");

    let mut view = TerminalView::stdout(config.color);
    let mut controller = ChatController::new(Arc::new(GeminiProvider::new()), config);
    view.render(controller.messages(), controller.is_loading());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("Failed to read input")?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };

        match parse_command(&line) {
            Command::New => controller.new_chat(&mut view),
            Command::Attach(paths) => {
                if paths.is_empty() {
                    view.print_info("Usage: /attach <path>...");
                    continue;
                }
                let added = controller.attach(&paths).await;
                if added < paths.len() {
                    view.print_info(&format!("Could not read {} file(s).", paths.len() - added));
                }
                view.print_pending(controller.pending());
            }
            Command::Detach(arg) => match arg.parse::<usize>() {
                Ok(index) => {
                    if controller.remove_attachment(index).is_none() {
                        view.print_info(&format!("No queued image at index {}.", index));
                    }
                    view.print_pending(controller.pending());
                }
                Err(_) => view.print_info("Usage: /detach <index>"),
            },
            Command::Pending => view.print_pending(controller.pending()),
            Command::History => view.print_history(controller.messages()),
            Command::Export(path) => {
                if path.is_empty() {
                    view.print_info("Usage: /export <path>");
                    continue;
                }
                let markdown = export_to_markdown(controller.model(), controller.messages());
                match tokio::fs::write(path, markdown)
                    .await
                    .with_context(|| format!("Failed to write {}", path))
                {
                    Ok(()) => view.print_info(&format!("Saved to {}", path)),
                    Err(e) => {
                        tracing::error!("{:#}", e);
                        view.print_info(&format!("{:#}", e));
                    }
                }
            }
            Command::Help => view.print_help(),
            Command::Quit => break,
            Command::Unknown(name) => {
                view.print_info(&format!("Unknown command /{}. Try /help.", name));
            }
            Command::Send(text) => send(&mut controller, &mut view, text).await,
        }
    }

    Ok(())
}
