//! CLI interface for the relay.
//!
//! Each subcommand is non-interactive: arguments in, JSON or a bare value
//! out on stdout. Human-oriented notes go to stderr.
//!
//! Paths and timeouts come from the config file, then the environment,
//! then the global flags below.

mod format;

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};
use jiff::SignedDuration;

use console_relay::{Bridge, CommandStatus, Config, logs};

use format::{format_command_line, tail, to_json};

/// Relay: run scripts in a live browser session through a shared file.
#[derive(Debug, Parser)]
#[command(name = "relay", version, after_long_help = WORKFLOW_HELP)]
pub struct Cli {
    /// Command queue file shared with the browser executor.
    #[arg(long, global = true, value_name = "PATH")]
    store: Option<PathBuf>,

    /// Log snapshot written by the instrumentation plugin.
    #[arg(long, global = true, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// How long to wait for a command, in milliseconds.
    #[arg(long, global = true, value_name = "MS")]
    timeout_ms: Option<u64>,

    /// More diagnostics on stderr. Repeat for more.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

const WORKFLOW_HELP: &str = r#"Workflow:
  1. Start the dev server with the console plugin enabled.
  2. relay title
  3. relay exec 'document.querySelectorAll("button").length'
  4. relay set-value 'input[name=q]' "it's quoted"
  5. relay errors

Queue by hand:
  relay submit 'window.location.href'   → prints cmd_<millis>_<suffix>
  relay wait cmd_1700000000000_abc123def"#;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a script and print what it evaluated to, as JSON.
    Exec {
        /// Script text, evaluated as-is in the page.
        code: String,
    },

    /// Queue a script without waiting. Prints the command id.
    Submit {
        code: String,
    },

    /// Wait for a queued command and print it, as JSON.
    Wait {
        id: String,
    },

    /// List queued commands.
    List {
        /// Only show commands the executor hasn't resolved.
        #[arg(long)]
        pending: bool,
    },

    /// Print the page title.
    Title,

    /// Print the page URL.
    Url,

    /// Describe the first element matching a CSS selector.
    Query {
        selector: String,
    },

    /// Click the first element matching a CSS selector.
    Click {
        selector: String,
    },

    /// Set an input's value and fire `input` and `change`.
    SetValue {
        selector: String,
        value: String,
    },

    /// Print console entries from the log snapshot.
    Logs {
        /// Only the most recent N entries.
        #[arg(long, value_name = "N")]
        last: Option<usize>,
    },

    /// Print error-level monitoring entries from the log snapshot.
    Errors,

    /// Drop finished commands from the queue.
    Compact {
        /// Age threshold; defaults to the configured retention.
        #[arg(long, value_name = "SECS")]
        older_than_secs: Option<u64>,
    },
}

impl Cli {
    /// Folds the global flags into `config`.
    fn apply_to(&self, config: &mut Config) {
        if let Some(path) = &self.store {
            config.command_file.clone_from(path);
        }
        if let Some(path) = &self.log_file {
            config.log_file.clone_from(path);
        }
        if let Some(ms) = self.timeout_ms {
            config.timeout_ms = ms;
        }
    }
}

/// Run the CLI, returning an error message on failure.
pub fn run(cli: Cli, mut config: Config) -> Result<(), String> {
    cli.apply_to(&mut config);
    let bridge = config.bridge();
    let timeout = config.timeout();

    match cli.command {
        Command::Exec { code } => {
            let value = bridge.run(&code, timeout).map_err(|e| e.to_string())?;
            println!("{}", to_json(&value)?);
        }
        Command::Submit { code } => {
            let id = bridge
                .submit(&code)
                .map_err(|e| format!("failed to submit command: {e}"))?;
            println!("{id}");
        }
        Command::Wait { id } => {
            let command = bridge
                .wait_for_result(&id, timeout)
                .map_err(|e| e.to_string())?;
            println!("{}", to_json(&command)?);
        }
        Command::List { pending } => cmd_list(&bridge, pending)?,
        Command::Title => {
            println!("{}", bridge.page_title(timeout).map_err(|e| e.to_string())?);
        }
        Command::Url => {
            println!("{}", bridge.page_url(timeout).map_err(|e| e.to_string())?);
        }
        Command::Query { selector } => {
            let element = bridge
                .query_selector(&selector, timeout)
                .map_err(|e| e.to_string())?;
            println!("{}", to_json(&element)?);
        }
        Command::Click { selector } => {
            let found = bridge.click(&selector, timeout).map_err(|e| e.to_string())?;
            report_found(found, &selector);
        }
        Command::SetValue { selector, value } => {
            let found = bridge
                .set_value(&selector, &value, timeout)
                .map_err(|e| e.to_string())?;
            report_found(found, &selector);
        }
        Command::Logs { last } => {
            let entries = logs::read_console_logs(&config.log_file);
            println!("{}", to_json(tail(&entries, last))?);
        }
        Command::Errors => {
            let entries = logs::read_errors(&config.log_file);
            if entries.is_empty() {
                eprintln!("No errors in {}", config.log_file.display());
            }
            println!("{}", to_json(&entries)?);
        }
        Command::Compact { older_than_secs } => cmd_compact(&bridge, &config, older_than_secs)?,
    }

    Ok(())
}

fn cmd_list(bridge: &Bridge, pending_only: bool) -> Result<(), String> {
    let commands = bridge
        .store()
        .load()
        .map_err(|e| format!("failed to read command store: {e}"))?;

    let shown: Vec<_> = commands
        .iter()
        .filter(|c| !pending_only || c.status == CommandStatus::Pending)
        .collect();

    if shown.is_empty() {
        println!("No commands");
        return Ok(());
    }

    for command in shown {
        println!("{}", format_command_line(command));
    }

    Ok(())
}

fn cmd_compact(
    bridge: &Bridge,
    config: &Config,
    older_than_secs: Option<u64>,
) -> Result<(), String> {
    let max_age = match older_than_secs {
        Some(secs) => SignedDuration::from_secs(i64::try_from(secs).unwrap_or(i64::MAX)),
        None => config
            .retention()
            .ok_or("retention is disabled; pass --older-than-secs")?,
    };

    let removed = bridge
        .store()
        .compact(max_age)
        .map_err(|e| format!("failed to compact command store: {e}"))?;

    eprintln!(
        "Removed {removed} command(s) finished more than {}s ago",
        max_age.as_secs()
    );
    Ok(())
}

/// Prints the boolean result and notes a miss on stderr.
fn report_found(found: bool, selector: &str) {
    if !found {
        eprintln!("No element matches {selector}");
    }
    println!("{found}");
}
