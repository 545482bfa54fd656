use anyhow::{Context, Result};
use bat::PrettyPrinter;
use clap::Parser;
use cliclack::{input, spinner};
use console::style;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use chatline::chat::{Chat, TurnOutcome};
use chatline::providers::configs::base::ProviderConfig;
use chatline::providers::configs::openai::{OpenAiProviderConfig, OPENAI_DEFAULT_HOST};
use chatline::providers::models::{catalog, ModelProfile, DEFAULT_MODEL};
use chatline::providers::openai::OpenAiProvider;
use chatline::tool::ToolRegistry;
use chatline::tools::web_browser::{WebBrowser, WebBrowserConfig};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// OpenAI API Key (can also be set via OPENAI_API_KEY environment variable)
    #[arg(short, long)]
    api_key: Option<String>,

    /// API host (can also be set via OPENAI_API_HOST environment variable)
    #[arg(long)]
    host: Option<String>,

    /// Model to use
    #[arg(short, long, default_value = DEFAULT_MODEL)]
    model: String,

    /// Request complete replies instead of streaming them
    #[arg(long)]
    no_stream: bool,
}

/// What the user typed at the prompt.
enum Command {
    Exit,
    Clear,
    Last,
    Model(String),
    Message(String),
}

impl Command {
    fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        if trimmed.eq_ignore_ascii_case("exit") {
            return Command::Exit;
        }
        match trimmed.split_once(char::is_whitespace) {
            _ if trimmed == "/clear" => Command::Clear,
            _ if trimmed == "/last" => Command::Last,
            Some(("/model", name)) => Command::Model(name.trim().to_string()),
            _ => Command::Message(line.to_string()),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match cli.api_key {
        Some(api_key) => OpenAiProviderConfig::new(api_key, OPENAI_DEFAULT_HOST.to_string()),
        None => OpenAiProviderConfig::from_env().context(
            "API key must be provided via --api-key or OPENAI_API_KEY environment variable",
        )?,
    }
    .with_host(cli.host.clone());
    let provider = OpenAiProvider::new(config)?;

    let browser = WebBrowser::new(WebBrowserConfig::from_env())?;
    let tools = ToolRegistry::new().with(Arc::new(browser))?;

    let mut chat = Chat::new(provider, tools);
    let mut model = select_model(&cli.model, cli.no_stream);

    println!(
        "chatline {} {}",
        style(&model.label).cyan(),
        style("- type \"exit\" to end the session, /clear, /last or /model NAME").dim()
    );
    println!("\n");

    let mut prefill: Option<String> = None;
    loop {
        let mut prompt = input("Message:").placeholder("").multiline();
        if let Some(text) = prefill.take() {
            prompt = prompt.default_input(&text);
        }
        let message_text: String = prompt.interact()?;

        match Command::parse(&message_text) {
            Command::Exit => break,
            Command::Clear => {
                chat.clear();
                println!("{}", style("Conversation cleared.").dim());
            }
            Command::Last => match chat.recall_last_user_input() {
                Some(last) => prefill = Some(last.to_string()),
                None => println!("{}", style("Nothing to recall yet.").dim()),
            },
            Command::Model(name) => {
                model = select_model(&name, cli.no_stream);
                chat.clear();
                println!(
                    "{} {}",
                    style("Switched to").dim(),
                    style(&model.label).cyan()
                );
            }
            Command::Message(text) => {
                let spin = spinner();
                spin.start("awaiting reply");

                // The spinner tracks the reply as it streams; once the turn
                // ends the whole processed reply is rendered below it.
                let outcome = chat
                    .send(&text, &model, |display| {
                        spin.set_message(progress_line(display))
                    })
                    .await;

                spin.stop("");
                match outcome {
                    Ok(TurnOutcome::Completed { content, .. }) => render(&content)?,
                    Ok(TurnOutcome::Skipped) => continue,
                    Err(e) => {
                        tracing::error!(error = %e, "turn failed");
                        if let Some(partial) = chat.history().last().filter(|m| !m.is_empty()) {
                            render(partial.text())?;
                        }
                        println!("{} {:#}", style("Error:").red(), e);
                    }
                }
                println!("\n");
            }
        }
    }
    Ok(())
}

fn select_model(name: &str, no_stream: bool) -> ModelProfile {
    if !catalog().iter().any(|m| m.name == name) {
        tracing::warn!(model = name, "unknown model, assuming it streams");
    }
    let model = ModelProfile::resolve(name);
    if no_stream {
        model.with_stream(false)
    } else {
        model
    }
}

const PROGRESS_WIDTH: usize = 60;

/// The last non-blank line of a reply in progress, cut to fit next to the spinner.
fn progress_line(display: &str) -> String {
    let line = display
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("awaiting reply");
    match line.char_indices().nth(PROGRESS_WIDTH) {
        Some((cut, _)) => format!("{}...", &line[..cut]),
        None => line.to_string(),
    }
}

fn render(content: &str) -> Result<()> {
    PrettyPrinter::new()
        .input_from_bytes(content.as_bytes())
        .language("markdown")
        .print()
        .context("Failed to render reply")?;
    Ok(())
}
