//! A terminal client for chatting about a PDF.

#[macro_use]
extern crate tracing;

mod cli;
mod command;
mod export;

use std::io::Write as _;
use std::path::Path;
use std::pin::pin;
use std::time::Duration;

use anyhow::Context as _;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use pdf_chat_core::notification::Notice;
use pdf_chat_core::transcript::SubmitOutcome;
use pdf_chat_core::upload::PdfUpload;
use pdf_chat_core::{ChatApp, ChatAppBuilder, ChatView, Stage};
use pdf_chat_extract::HttpTextExtractor;
use pdf_chat_openai_model::OpenAIProvider;
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt};
use tokio::select;
use tokio::sync::mpsc;
use tokio::time::sleep;

use crate::cli::Args;
use crate::command::{Command, HELP};

const BAR_CHAR: &str = "▎";

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let model_provider = OpenAIProvider::new(args.openai_config());
    let extractor = HttpTextExtractor::new(args.extract_config())
        .context("failed to create the extraction client")?;
    let mut app = ChatAppBuilder::with_model_provider(model_provider, extractor)
        .history_mode(args.history_mode.into())
        .build();

    let progress_style = ProgressStyle::with_template("{spinner} {wide_msg}")
        .context("invalid progress template")?
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");

    if let Some(path) = &args.pdf {
        open(&mut app, path, &progress_style).await;
    }

    // One reader for the whole session, so piped input is not lost.
    let mut stdin = io::BufReader::new(io::stdin());
    loop {
        let prompt = match app.stage() {
            Stage::Chat(_) => "> ",
            _ => "PDF path> ",
        };
        print!("{prompt}");
        std::io::stdout().flush()?;

        let Some(line) = read_line(&mut stdin).await else {
            break;
        };
        let command = match Command::parse(&line) {
            Ok(command) => command,
            Err(err) => {
                println!("{}", err.bright_red());
                continue;
            }
        };

        match command {
            Command::Quit => break,
            Command::Help => println!("{HELP}"),
            Command::Restart => {
                app.restart();
                println!("Chat closed.");
            }
            Command::Open(path) => open(&mut app, &path, &progress_style).await,
            Command::Ask(text) => {
                let Some(view) = app.chat_view_mut() else {
                    // Without an open chat, plain input names a file.
                    if !text.is_empty() {
                        open(&mut app, Path::new(&text), &progress_style).await;
                    }
                    continue;
                };
                ask(view, &text, &progress_style).await;
            }
            command => {
                let Some(view) = app.chat_view_mut() else {
                    println!("{}", "Open a PDF first.".bright_red());
                    continue;
                };
                run_chat_command(view, command).await;
            }
        }
    }

    Ok(())
}

async fn open(app: &mut ChatApp, path: &Path, progress_style: &ProgressStyle) {
    let upload = match PdfUpload::from_path(path).await {
        Ok(upload) => upload,
        Err(err) => {
            println!("{}", format!("Cannot read {}: {err}", path.display()).bright_red());
            return;
        }
    };

    let progress_bar = ProgressBar::new_spinner();
    progress_bar.set_style(progress_style.clone());
    progress_bar.set_message(format!("📄 Reading {}...", upload.file_name()));
    progress_bar.enable_steady_tick(Duration::from_millis(100));
    let result = app.open(upload).await;
    progress_bar.finish_and_clear();

    if let Some(notice) = app.take_notice() {
        print_notice(&notice);
    }
    match (result, app.stage()) {
        (Ok(()), Stage::Chat(view)) => {
            for message in view.transcript().messages() {
                print_bot_message(message.content());
            }
        }
        (_, Stage::Upload { error: Some(error) }) => {
            println!("{}", error.bright_red());
        }
        _ => {}
    }
}

async fn ask(view: &mut ChatView, text: &str, progress_style: &ProgressStyle) {
    let (delta_tx, mut delta_rx) = mpsc::unbounded_channel::<String>();

    let mut progress_bar = Some({
        let progress_bar = ProgressBar::new_spinner();
        progress_bar.set_style(progress_style.clone());
        progress_bar.set_message("🤔 Thinking...");
        progress_bar
    });
    let mut started = false;

    // The future borrows `view`, so it must be gone before the transcript
    // is read again below.
    let outcome = {
        let mut submit = pin!(view.submit_with(text, move |delta| {
            delta_tx.send(delta.to_owned()).ok();
        }));
        loop {
            if let Some(progress_bar) = &progress_bar {
                progress_bar.inc(1);
            }
            select! {
                outcome = &mut submit => break outcome,
                Some(delta) = delta_rx.recv() => {
                    // Finish the progress bar before printing anything else.
                    if let Some(progress_bar) = progress_bar.take() {
                        progress_bar.finish_and_clear();
                    }
                    if !started {
                        print!("{}🤖 ", BAR_CHAR.bright_cyan());
                        started = true;
                    }
                    print!("{}", delta.bright_white());
                    std::io::stdout().flush().ok();
                }
                _ = sleep(Duration::from_millis(100)) => {}
            }
        }
    };
    if let Some(progress_bar) = progress_bar.take() {
        progress_bar.finish_and_clear();
    }
    while let Ok(delta) = delta_rx.try_recv() {
        if !started {
            print!("{}🤖 ", BAR_CHAR.bright_cyan());
            started = true;
        }
        print!("{}", delta.bright_white());
    }
    if started {
        println!();
    }

    match outcome {
        Ok(SubmitOutcome::Apologized(_)) => {
            if let Some(message) = view.transcript().messages().last() {
                print_bot_message(message.content());
            }
        }
        Ok(SubmitOutcome::Ignored | SubmitOutcome::Answered) => {}
        Err(err) => println!("{}", err.bright_red()),
    }
}

async fn run_chat_command(view: &mut ChatView, command: Command) {
    match command {
        Command::Clear => {
            view.transcript_mut().clear();
            if let Some(message) = view.transcript().messages().first() {
                print_bot_message(message.content());
            }
        }
        Command::Export(path) => {
            match export::export_transcript(view.transcript(), path.as_deref()).await {
                Ok(path) => println!("Chat exported to {}", path.display()),
                Err(err) => println!("{}", format!("Export failed: {err}").bright_red()),
            }
        }
        Command::Copy(n) => {
            let transcript = view.transcript();
            let content = transcript
                .messages()
                .get(n - 1)
                .and_then(|message| transcript.copy(message.id()));
            match content {
                Some(content) => println!("{content}"),
                None => println!("{}", format!("There is no message {n}.").bright_red()),
            }
        }
        Command::Share => {
            println!("{}", view.transcript().share_text());
        }
        _ => {}
    }
}

fn print_bot_message(content: &str) {
    println!("{}🤖 {}", BAR_CHAR.bright_cyan(), content.bright_white());
}

fn print_notice(notice: &Notice) {
    let bar = BAR_CHAR.bright_yellow();
    println!("{bar}⚠️  {}", notice.title.bold());
    println!("{bar}{}", notice.body);
}

async fn read_line<R: AsyncBufRead + Unpin>(input: &mut R) -> Option<String> {
    let mut line = String::new();

    match input.read_line(&mut line).await {
        Ok(count) => {
            if count == 0 {
                return None;
            }
            Some(line)
        }
        Err(err) => {
            error!("error reading input: {}", err);
            None
        }
    }
}
