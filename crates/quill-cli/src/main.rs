use std::io::Write as _;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use quill_agents::{Agent, FileInput, ToolRegistry, call_model};
use quill_common::{Attachment, Message};
use quill_config::load_settings;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "quill", version, about = "Agentic chat for your notes")]
struct Cli {
    /// Path to the settings file.
    #[arg(long, default_value = "quill.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Send one message through the agent loop, streaming the reply.
    Chat {
        message: String,
        /// Note paths to attach to the message.
        #[arg(long = "attach")]
        attachments: Vec<String>,
        /// Image files to inline into the request.
        #[arg(long = "file")]
        files: Vec<PathBuf>,
        /// Print the model's reasoning stream to stderr.
        #[arg(long)]
        reasoning: bool,
    },
    /// One-shot model call without history or tools.
    Ask {
        prompt: String,
        #[arg(long, default_value = "You are a helpful assistant.")]
        system: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let settings = load_settings(&cli.config)?;

    match cli.command {
        Command::Chat {
            message,
            attachments,
            files,
            reasoning,
        } => {
            let attachments: Vec<Attachment> =
                attachments.into_iter().map(Attachment::new).collect();

            let mut inputs = Vec::new();
            for path in files {
                let data = std::fs::read(&path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                inputs.push(FileInput::new(name, mime_for(&path), data));
            }

            let agent = Agent::new(settings, ToolRegistry::new());
            let conversation: Vec<Message> = Vec::new();
            let (tx, mut rx) = mpsc::channel(64);

            let run = agent.run(&conversation, &message, &attachments, &inputs, tx);
            let printer = async {
                while let Some(update) = rx.recv().await {
                    if reasoning && !update.reasoning.is_empty() {
                        eprint!("{}", update.reasoning);
                    }
                    if !update.text.is_empty() {
                        print!("{}", update.text);
                        let _ = std::io::stdout().flush();
                    }
                    for call in update.tool_calls {
                        eprintln!("\n[tool] {} {}", call.name, call.args);
                    }
                }
            };
            let (result, ()) = tokio::join!(run, printer);
            result?;
            println!();
        }
        Command::Ask { prompt, system } => {
            let text = call_model(&settings, &system, &prompt, &[]).await?;
            println!("{text}");
        }
    }

    Ok(())
}

fn mime_for(path: &Path) -> String {
    match path.extension().and_then(|e| e.to_str()) {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
    .to_string()
}
