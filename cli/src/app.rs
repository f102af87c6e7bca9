use anyhow::{Context, Result};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use kbchat_core::errors::KbChatError;
use kbchat_core::session::ChatSession;
use std::io::{self, BufRead, Write};
use std::time::Duration;
use tracing::{debug, info};

use crate::output::{print_interactive_help, print_transcript, print_turn};

/// One line of interactive input, classified
#[derive(Debug, PartialEq, Eq)]
pub enum UserInput<'a> {
    Blank,
    Exit,
    Reset,
    Help,
    Question(&'a str),
}

pub fn parse_input(line: &str) -> UserInput<'_> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return UserInput::Blank;
    }
    match trimmed.to_lowercase().as_str() {
        "/exit" | "/quit" | "exit" | "quit" => UserInput::Exit,
        "/reset" => UserInput::Reset,
        "/help" => UserInput::Help,
        _ => UserInput::Question(trimmed),
    }
}

/// Asks one question and prints the whole exchange
pub async fn run_single_query(prompt: &str, session: &mut ChatSession) -> Result<()> {
    info!("Running single query");
    session.initialize();

    ask(session, prompt).await?;
    print_transcript(session.transcript());
    Ok(())
}

/// Runs an interactive chat session on stdin
pub async fn run_interactive_chat(session: &mut ChatSession) -> Result<()> {
    let stdin = io::stdin();
    run_interactive_chat_with(session, stdin.lock()).await
}

/// Interactive loop over any line source; ends on an exit command or EOF
pub async fn run_interactive_chat_with<R: BufRead>(
    session: &mut ChatSession,
    mut input: R,
) -> Result<()> {
    session.initialize();
    print_interactive_help();
    print_transcript(session.transcript());

    loop {
        print!("{}: ", "You".green().bold());
        io::stdout().flush().context("Failed to flush stdout")?;

        let mut line = String::new();
        let read = input.read_line(&mut line).context("Failed to read input")?;
        if read == 0 {
            println!();
            break;
        }

        match parse_input(&line) {
            UserInput::Blank => continue,
            UserInput::Exit => {
                println!("Exiting chat session.");
                break;
            }
            UserInput::Help => print_interactive_help(),
            UserInput::Reset => {
                session.reset();
                println!("{}", "Session restarted.".yellow());
                println!();
                print_transcript(session.transcript());
            }
            UserInput::Question(question) => {
                ask(session, question).await?;
                if let Some(reply) = session.last_turn() {
                    print_turn(reply);
                }
                println!(); // Add spacing between interactions
            }
        }
    }

    Ok(())
}

/// Submits `question` while a spinner runs
async fn ask(session: &mut ChatSession, question: &str) -> Result<()> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
            .template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message("Searching the knowledge base...");
    spinner.enable_steady_tick(Duration::from_millis(120));

    debug!(question_len = question.len(), "Submitting question");
    let result = session.submit(question).await;
    spinner.finish_and_clear();

    match result {
        Ok(()) => Ok(()),
        Err(KbChatError::EmptyQuestion) => {
            println!("{}", "Please type a question first.".yellow());
            Ok(())
        }
        Err(e) => Err(e).context("Failed to submit question"),
    }
}
