//! Interactive prompt for `keystead_client`.

use std::sync::mpsc as std_mpsc;
use std::thread;

use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{Context, Editor, Helper, Highlighter, Hinter, Validator};
use tokio::sync::mpsc;

use crate::client::api::LicenseApiClient;
use crate::errors::{LicenseError, LicenseResult};
use crate::models::{ApiResponse, Outcome, OutcomeResponse, PublicRecord};

pub const PROMPT: &str = ">> ";
pub const GOODBYE: &str = "Thanks for using Keystead!";

/// Commands and their descriptions, in `help` order.
pub const COMMANDS: &[(&str, &str)] = &[
    ("exit", "Quit the client"),
    ("help", "List commands"),
    ("all", "Get valid licenses for a product"),
    ("new", "Generate a new license for a product"),
    ("invalidate", "Invalidate a license"),
    ("get", "Get a specific license"),
    ("check", "Check if a license is valid"),
];

/// A parsed prompt line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Exit,
    New { email: String, product: String },
    All { product: String },
    Get { key: String },
    Invalidate { key: String },
    Check { key: String, product: String },
    /// A known command with missing arguments; carries the usage line.
    Usage(&'static str),
    Unknown(String),
    Empty,
}

pub fn parse_command(line: &str) -> Command {
    let words: Vec<&str> = line.split_whitespace().collect();

    match words.as_slice() {
        [] => Command::Empty,
        ["exit", ..] => Command::Exit,
        ["help", ..] => Command::Help,
        ["new", email, product, ..] => Command::New {
            email: email.to_string(),
            product: product.to_string(),
        },
        ["new", ..] => Command::Usage("new <email> <product>"),
        ["all", product, ..] => Command::All {
            product: product.to_string(),
        },
        ["all"] => Command::Usage("all <product>"),
        ["get", key, ..] => Command::Get {
            key: key.to_string(),
        },
        ["get"] => Command::Usage("get <key>"),
        ["invalidate", key, ..] => Command::Invalidate {
            key: key.to_string(),
        },
        ["invalidate"] => Command::Usage("invalidate <key>"),
        ["check", key, product, ..] => Command::Check {
            key: key.to_string(),
            product: product.to_string(),
        },
        ["check", ..] => Command::Usage("check <key> <product>"),
        [other, ..] => Command::Unknown(other.to_string()),
    }
}

pub fn help_text() -> String {
    COMMANDS
        .iter()
        .map(|(name, desc)| format!("{name} - {desc}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_record(record: &PublicRecord) -> String {
    format!(
        "---\nLicense Key: {}\nProduct: {}\nValid: {}\nEmail: {}",
        record.key, record.product, record.valid, record.email
    )
}

fn render_outcome(outcome: &OutcomeResponse) -> String {
    format!(
        "---\nLicense Key: {}\nStatus: {}\nCode: {}\nMessage: {}",
        outcome.license_key, outcome.status, outcome.code, outcome.message
    )
}

/// Render any API response for the terminal.
pub fn render_response(response: &ApiResponse) -> String {
    match response {
        ApiResponse::Record(record) => render_record(record),
        ApiResponse::RecordList(list) if list.licenses.is_empty() => {
            "No valid licenses found for that product!".to_string()
        }
        ApiResponse::RecordList(list) => list
            .licenses
            .iter()
            .map(render_record)
            .collect::<Vec<_>>()
            .join("\n"),
        ApiResponse::Outcome(outcome) => render_outcome(outcome),
        ApiResponse::Error(err) => format!("An error occurred:\n{}", err.message),
    }
}

/// `get` reports an unknown key in plain words instead of as an outcome.
pub fn render_get_response(response: &ApiResponse) -> String {
    match response {
        ApiResponse::Outcome(o) if o.outcome() == Some(Outcome::Nonexistent) => {
            "That license doesn't exist!".to_string()
        }
        other => render_response(other),
    }
}

pub fn render_check(key: &str, product: &str, valid: bool) -> String {
    format!("---\nLicense Key: {key}\nProduct: {product}\nValid: {valid}")
}

/// Run one command. `None` means the session is over.
pub async fn execute(client: &LicenseApiClient, command: Command) -> Option<String> {
    let output = match command {
        Command::Exit => return None,
        Command::Empty => String::new(),
        Command::Help => help_text(),
        Command::Usage(usage) => usage.to_string(),
        Command::Unknown(word) => format!("Unknown command '{word}'. Type 'help' for a list."),
        Command::New { email, product } => {
            render_result(client.create_license(&email, &product).await, render_response)
        }
        Command::All { product } => render_result(client.get_all(&product).await, render_response),
        Command::Get { key } => {
            render_result(client.get_specific(&key).await, render_get_response)
        }
        Command::Invalidate { key } => {
            render_result(client.invalidate_license(&key).await, render_response)
        }
        Command::Check { key, product } => {
            let valid = client.check_validity(&key, &product).await;
            render_check(&key, &product, valid)
        }
    };

    Some(output)
}

fn render_result(
    result: LicenseResult<ApiResponse>,
    render: fn(&ApiResponse) -> String,
) -> String {
    match result {
        Ok(response) => render(&response),
        Err(e) => format!("An error occurred:\n{e}"),
    }
}

/// Completes the command word against [`COMMANDS`].
#[derive(Helper, Highlighter, Hinter, Validator)]
pub struct CommandCompleter;

impl Completer for CommandCompleter {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        Ok(complete_command(&line[..pos]))
    }
}

/// Candidates for the text before the cursor, and where they start.
///
/// Only the first word completes; arguments get nothing.
pub fn complete_command(typed: &str) -> (usize, Vec<Pair>) {
    let start = typed.len() - typed.trim_start().len();
    let word = &typed[start..];
    if word.contains(char::is_whitespace) {
        return (start, Vec::new());
    }

    let candidates = COMMANDS
        .iter()
        .filter(|(name, _)| name.starts_with(word))
        .map(|(name, description)| Pair {
            display: format!("{name:<12}{description}"),
            replacement: name.to_string(),
        })
        .collect();
    (start, candidates)
}

/// One line from the editor: `None` at end of input.
type LineResult = Result<Option<String>, String>;

/// Run the line editor on its own thread.
///
/// The editor blocks, so it reads one line per request on `ready` and sends
/// it back over the returned channel. Dropping the `ready` sender stops it.
fn spawn_line_reader() -> (std_mpsc::Sender<()>, mpsc::Receiver<LineResult>) {
    let (ready_tx, ready_rx) = std_mpsc::channel::<()>();
    let (line_tx, line_rx) = mpsc::channel::<LineResult>(1);

    thread::spawn(move || {
        let mut editor = match Editor::<CommandCompleter, DefaultHistory>::new() {
            Ok(editor) => editor,
            Err(e) => {
                let _ = line_tx.blocking_send(Err(format!("failed to start line editor: {e}")));
                return;
            }
        };
        editor.set_helper(Some(CommandCompleter));

        while ready_rx.recv().is_ok() {
            let result = match editor.readline(PROMPT) {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        let _ = editor.add_history_entry(line.as_str());
                    }
                    Ok(Some(line))
                }
                Err(ReadlineError::Interrupted) => Ok(Some(String::new())),
                Err(ReadlineError::Eof) => Ok(None),
                Err(e) => Err(format!("failed to read input: {e}")),
            };
            if line_tx.blocking_send(result).is_err() {
                break;
            }
        }
    });

    (ready_tx, line_rx)
}

/// Read commands until `exit` or end of input.
pub async fn run_prompt(client: &LicenseApiClient) -> LicenseResult<()> {
    let (ready, mut lines) = spawn_line_reader();

    loop {
        if ready.send(()).is_err() {
            break;
        }

        let line = match lines.recv().await {
            Some(Ok(Some(line))) => line,
            Some(Ok(None)) | None => break,
            Some(Err(e)) => return Err(LicenseError::Server(e)),
        };

        match execute(client, parse_command(&line)).await {
            Some(output) if output.is_empty() => {}
            Some(output) => println!("{output}"),
            None => break,
        }
    }

    println!("{GOODBYE}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ErrorResponse, LicenseList};

    #[test]
    fn parses_commands_with_arguments() {
        assert_eq!(
            parse_command("new a@x.com acme"),
            Command::New {
                email: "a@x.com".to_string(),
                product: "acme".to_string()
            }
        );
        assert_eq!(
            parse_command("  check KEY acme "),
            Command::Check {
                key: "KEY".to_string(),
                product: "acme".to_string()
            }
        );
        assert_eq!(parse_command("exit"), Command::Exit);
        assert_eq!(parse_command(""), Command::Empty);
    }

    #[test]
    fn missing_arguments_give_usage() {
        assert_eq!(parse_command("new a@x.com"), Command::Usage("new <email> <product>"));
        assert_eq!(parse_command("all"), Command::Usage("all <product>"));
        assert_eq!(parse_command("get"), Command::Usage("get <key>"));
        assert_eq!(parse_command("invalidate"), Command::Usage("invalidate <key>"));
        assert_eq!(parse_command("check KEY"), Command::Usage("check <key> <product>"));
    }

    #[test]
    fn unknown_command() {
        assert_eq!(parse_command("frobnicate now"), Command::Unknown("frobnicate".to_string()));
    }

    #[test]
    fn help_lists_every_command() {
        let help = help_text();
        for (name, _) in COMMANDS {
            assert!(help.contains(name));
        }
    }

    #[test]
    fn renders_empty_list() {
        let out = render_response(&ApiResponse::RecordList(LicenseList::default()));
        assert_eq!(out, "No valid licenses found for that product!");
    }

    #[test]
    fn renders_error_message() {
        let out = render_response(&ApiResponse::Error(ErrorResponse {
            status: "error".to_string(),
            error: "UNAUTHORIZED".to_string(),
            message: "Authentication required".to_string(),
            code: 401,
        }));
        assert_eq!(out, "An error occurred:\nAuthentication required");
    }

    #[test]
    fn get_reports_missing_license() {
        let resp = ApiResponse::Outcome(OutcomeResponse::new("k", Outcome::Nonexistent));
        assert_eq!(render_get_response(&resp), "That license doesn't exist!");

        let resp = ApiResponse::Outcome(OutcomeResponse::new("k", Outcome::AlreadyInvalid));
        assert!(render_get_response(&resp).contains("Message: license already invalid"));
    }

    #[test]
    fn renders_check() {
        assert_eq!(
            render_check("KEY", "acme", true),
            "---\nLicense Key: KEY\nProduct: acme\nValid: true"
        );
    }

    #[test]
    fn completes_command_prefixes() {
        let names = |typed: &str| -> Vec<String> {
            complete_command(typed)
                .1
                .into_iter()
                .map(|p| p.replacement)
                .collect()
        };

        assert_eq!(names("in"), vec!["invalidate"]);
        assert_eq!(names("e"), vec!["exit"]);
        assert_eq!(names("").len(), COMMANDS.len());
        assert!(names("zzz").is_empty());
    }

    #[test]
    fn completion_skips_leading_space_and_arguments() {
        let (start, candidates) = complete_command("  ch");
        assert_eq!(start, 2);
        assert_eq!(candidates[0].replacement, "check");
        assert!(candidates[0].display.contains("Check if a license is valid"));

        assert!(complete_command("get ab").1.is_empty());
    }
}
