//! Interactive REPL channel with line editing and markdown rendering.
//!
//! The terminal front end for the deal team. Uses rustyline for line
//! editing, history, and slash-command completion; termimad renders the memo
//! and summaries as markdown inline.
//!
//! ## Commands
//!
//! - `/help` - Show available commands
//! - `/deals` - List the deal book
//! - `/memo` - Render the active deal's memo
//! - `/log [n]` - Show recent step records
//! - `/portfolio` - Show firm profile and holdings
//! - `/export csv|memo` - Write the active deal to a file
//! - `/analyze <path>` - Run document analysis on a file
//! - `/reset` - Clear all state
//! - `/quit` or `/exit` - Leave the REPL
//!
//! Anything else is treated as a sourcing mandate and kicks off a run. Input
//! is read one submission at a time; a new mandate cannot be entered while a
//! run is in flight.

use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rustyline::completion::Completer;
use rustyline::config::Config as LineConfig;
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::FileHistory;
use rustyline::validate::Validator;
use rustyline::{CompletionType, Editor, Helper};
use termimad::MadSkin;

use crate::attach::FileAttachment;
use crate::error::{ChannelError, Result};
use crate::export;
use crate::pipeline::DealPipeline;
use crate::state::{ChatMessage, StateStore, WorkspaceView};

/// Slash commands available in the REPL.
const SLASH_COMMANDS: &[&str] = &[
    "/help",
    "/deals",
    "/memo",
    "/log",
    "/portfolio",
    "/export",
    "/analyze",
    "/reset",
    "/quit",
    "/exit",
];

/// Rustyline helper for slash-command tab completion.
struct ReplHelper;

impl Completer for ReplHelper {
    type Candidate = String;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<String>)> {
        if !line.starts_with('/') {
            return Ok((0, vec![]));
        }
        let prefix = &line[..pos];
        let matches: Vec<String> = SLASH_COMMANDS
            .iter()
            .filter(|cmd| cmd.starts_with(prefix))
            .map(|cmd| cmd.to_string())
            .collect();
        Ok((0, matches))
    }
}

impl Hinter for ReplHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &rustyline::Context<'_>) -> Option<String> {
        if !line.starts_with('/') || pos < line.len() {
            return None;
        }
        SLASH_COMMANDS
            .iter()
            .find(|cmd| cmd.starts_with(line) && **cmd != line)
            .map(|cmd| cmd[line.len()..].to_string())
    }
}

impl Highlighter for ReplHelper {
    fn highlight_hint<'h>(&self, hint: &'h str) -> Cow<'h, str> {
        Cow::Owned(format!("\x1b[90m{hint}\x1b[0m"))
    }
}

impl Validator for ReplHelper {}
impl Helper for ReplHelper {}

/// Build a termimad skin with our color scheme.
fn make_skin() -> MadSkin {
    let mut skin = MadSkin::default();
    skin.set_headers_fg(termimad::crossterm::style::Color::Yellow);
    skin.bold.set_fg(termimad::crossterm::style::Color::White);
    skin.italic
        .set_fg(termimad::crossterm::style::Color::Magenta);
    skin.inline_code
        .set_fg(termimad::crossterm::style::Color::Green);
    skin
}

/// Guess a mime type from a file extension.
fn mime_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .as_deref()
    {
        Some("pdf") => "application/pdf",
        Some("csv") => "text/csv",
        Some("txt") | Some("md") => "text/plain",
        Some("xlsx") => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        _ => "application/octet-stream",
    }
}

/// Terminal channel driving the two pipeline flows.
pub struct ReplChannel {
    state: Arc<StateStore>,
    pipeline: Arc<DealPipeline>,
    skin: MadSkin,
    history_path: PathBuf,
}

impl ReplChannel {
    pub fn new(state: Arc<StateStore>, pipeline: Arc<DealPipeline>, data_dir: &Path) -> Self {
        Self {
            state,
            pipeline,
            skin: make_skin(),
            history_path: data_dir.join("repl_history"),
        }
    }

    /// Run the read-eval loop until `/quit` or EOF.
    pub async fn run(&self) -> Result<()> {
        let config = LineConfig::builder()
            .completion_type(CompletionType::List)
            .build();
        let mut editor: Editor<ReplHelper, FileHistory> = Editor::with_config(config)
            .map_err(|e| ChannelError::Readline(e.to_string()))?;
        editor.set_helper(Some(ReplHelper));
        let _ = editor.load_history(&self.history_path);

        println!("dealdesk - type a sourcing mandate, or /help for commands.\n");

        loop {
            let readline = tokio::task::block_in_place(|| editor.readline("dealdesk> "));
            let line = match readline {
                Ok(line) => line,
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                Err(e) => return Err(ChannelError::Readline(e.to_string()).into()),
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let _ = editor.add_history_entry(line);

            if line.starts_with('/') {
                if self.handle_command(line).await? {
                    break;
                }
            } else {
                self.handle_mandate(line).await;
            }
        }

        let _ = editor.save_history(&self.history_path);
        Ok(())
    }

    async fn handle_mandate(&self, mandate: &str) {
        self.state.push_message(ChatMessage::user(mandate)).await;
        println!("Running sourcing pipeline...");
        match self.pipeline.run_sourcing(mandate).await {
            Ok(_) => {
                if let Some(deal) = self.state.active_deal().await {
                    self.state.set_view(WorkspaceView::Memo).await;
                    self.skin.print_text(&export::memo_markdown(&deal));
                }
            }
            Err(err) => {
                eprintln!("Run failed: {err}");
                eprintln!("See /log for the failing step.");
            }
        }
    }

    /// Returns true when the REPL should exit.
    async fn handle_command(&self, line: &str) -> Result<bool> {
        let mut parts = line.split_whitespace();
        let command = parts.next().unwrap_or_default();
        let arg = parts.next();

        match command {
            "/quit" | "/exit" => return Ok(true),
            "/help" => {
                self.skin.print_text(
                    "**Commands**\n\
                     - `/deals` list the deal book\n\
                     - `/memo` render the active memo\n\
                     - `/log [n]` recent step records\n\
                     - `/portfolio` firm profile and holdings\n\
                     - `/export csv|memo` write the active deal to a file\n\
                     - `/analyze <path>` document analysis on a file\n\
                     - `/reset` clear all state\n\
                     - `/quit` leave\n\n\
                     Any other input is a sourcing mandate.\n",
                );
            }
            "/deals" => {
                let book = self.state.deal_book().await;
                if book.deals.is_empty() {
                    println!("No deals yet.");
                }
                for deal in &book.deals {
                    let marker = if Some(deal.id) == book.active { "*" } else { " " };
                    println!(
                        "{marker} {} - {} | EBITDA ${:.1}M | {} | {}",
                        deal.company_name,
                        deal.sector,
                        deal.ebitda,
                        deal.location,
                        deal.memo.investment_recommendation.as_str(),
                    );
                }
                self.state.set_view(WorkspaceView::Deals).await;
            }
            "/memo" => match self.state.active_deal().await {
                Some(deal) => {
                    self.state.set_view(WorkspaceView::Memo).await;
                    self.skin.print_text(&export::memo_markdown(&deal));
                }
                None => println!("No active deal."),
            },
            "/log" => {
                let count = arg.and_then(|n| n.parse::<usize>().ok()).unwrap_or(12);
                let steps = self.state.steps().await;
                for step in steps.iter().rev().take(count).rev() {
                    let outcome = match &step.error {
                        Some(detail) => format!("{} ({})", step.status.as_str(), detail.message),
                        None => step.status.as_str().to_string(),
                    };
                    println!(
                        "{} [{}] {} - {} ({} ms)",
                        step.trace_id,
                        step.agent.display_name(),
                        step.description,
                        outcome,
                        step.latency_ms,
                    );
                }
                self.state.set_view(WorkspaceView::Log).await;
            }
            "/portfolio" => {
                let profile = self.state.profile().await;
                println!("{} - {}", profile.firm_name, profile.strategy);
                println!("Check size: {} | Sectors: {}", profile.check_size, profile.sectors.join(", "));
                let portfolio = self.state.portfolio().await;
                if portfolio.is_empty() {
                    println!("No current holdings.");
                }
                for company in &portfolio {
                    println!("- {} ({}, ${:.1}M EBITDA)", company.name, company.sector, company.ebitda);
                }
                self.state.set_view(WorkspaceView::Portfolio).await;
            }
            "/export" => {
                let Some(deal) = self.state.active_deal().await else {
                    println!("No active deal.");
                    return Ok(false);
                };
                let slug = deal.company_name.to_lowercase().replace(' ', "_");
                match arg {
                    Some("csv") => {
                        let path = format!("{slug}_financials.csv");
                        std::fs::write(&path, export::financials_csv(&deal))
                            .map_err(ChannelError::Io)?;
                        println!("Wrote {path}");
                    }
                    Some("memo") => {
                        let path = format!("{slug}_memo.md");
                        std::fs::write(&path, export::memo_markdown(&deal))
                            .map_err(ChannelError::Io)?;
                        println!("Wrote {path}");
                    }
                    _ => println!("Usage: /export csv|memo"),
                }
            }
            "/analyze" => {
                let Some(path) = arg else {
                    println!("Usage: /analyze <path>");
                    return Ok(false);
                };
                let path = Path::new(path);
                let bytes = match std::fs::read(path) {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        eprintln!("Cannot read {}: {e}", path.display());
                        return Ok(false);
                    }
                };
                let name = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("document")
                    .to_string();
                let attachment =
                    FileAttachment::new(name.clone(), mime_for(path), STANDARD.encode(bytes));
                self.state
                    .push_message(ChatMessage::user(format!("Analyze {name}")))
                    .await;
                println!("Running document analysis...");
                match self.pipeline.run_document_analysis(attachment).await {
                    Ok(_) => {
                        if let Some(deal) = self.state.active_deal().await {
                            self.skin.print_text(&export::memo_markdown(&deal));
                        }
                    }
                    Err(err) => {
                        eprintln!("Run failed: {err}");
                        eprintln!("See /log for the failing step.");
                    }
                }
            }
            "/reset" => {
                self.state.reset().await?;
                println!("State cleared.");
            }
            other => println!("Unknown command: {other}. Try /help."),
        }

        Ok(false)
    }
}
