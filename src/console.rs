//! Line-based operator console standing in for the UI collaborator.

use std::sync::Arc;

use anyhow::{Context, Result};
use log::{debug, warn};
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

use crate::app::ScannerApp;
use crate::events::{ScanEvent, UiEvent};

const HELP: &str = "commands: scan-start, scan-stop, scan-toggle, clear-requested, \
navigate-back, enter-scan-view, help, quit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Ui(UiEvent),
    /// Clear needs an explicit y/N answer before it is sent.
    Clear,
    Help,
    Quit,
}

pub fn parse_command(line: &str) -> Option<Command> {
    let command = match line.trim() {
        "scan-start" | "start" => Command::Ui(UiEvent::ScanStart),
        "scan-stop" | "stop" => Command::Ui(UiEvent::ScanStop),
        "scan-toggle" | "toggle" => Command::Ui(UiEvent::ScanToggle),
        "clear-requested" | "clear" => Command::Clear,
        "navigate-back" | "back" => Command::Ui(UiEvent::NavigateBack),
        "enter-scan-view" | "scan" => Command::Ui(UiEvent::EnterScanView),
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        _ => return None,
    };
    Some(command)
}

fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Text shown for one output event.
pub fn render_event(event: &ScanEvent) -> Vec<String> {
    match event {
        ScanEvent::ScanningStateChanged(true) => vec!["[scanning] stop with scan-stop".into()],
        ScanEvent::ScanningStateChanged(false) => vec!["[idle] start with scan-start".into()],
        ScanEvent::ScanAccepted(record) => vec![format!(
            "accepted {} at {}",
            record.identifier,
            record.captured_at_text()
        )],
        ScanEvent::InvalidCode { payload } => vec![format!("invalid code {payload:?}")],
        // The summary line carries the same numbers.
        ScanEvent::AggregateChanged(_) => Vec::new(),
        ScanEvent::SummaryChanged(summary) => vec![summary.clone()],
        ScanEvent::ListChanged(lines) => lines.iter().map(|line| format!("  {line}")).collect(),
        ScanEvent::Unsupported { reason } => vec![format!("scanning unavailable: {reason}")],
        ScanEvent::DeviceUnavailable { reason } => vec![format!("camera unavailable: {reason}")],
        ScanEvent::StoreError { message } => vec![format!("storage error: {message}")],
    }
}

/// Read commands from stdin until `quit` or end of input, printing every
/// output event as it arrives.
pub async fn run_console(app: Arc<ScannerApp>) -> Result<()> {
    let mut rx = app.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    for line in render_event(&event) {
                        println!("{line}");
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!("console skipped {skipped} events"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let recent = app.startup().await;
    match recent {
        Ok(lines) if !lines.is_empty() => {
            println!("recent activity:");
            for line in lines {
                println!("  {line}");
            }
        }
        Ok(_) => println!("no scans recorded yet"),
        Err(err) => println!("{err}"),
    }
    println!("{HELP}");

    let mut lines = BufReader::new(io::stdin()).lines();
    let mut stdout = io::stdout();

    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        if line.trim().is_empty() {
            continue;
        }
        let Some(command) = parse_command(&line) else {
            println!("unknown command {:?}; {HELP}", line.trim());
            continue;
        };
        debug!("console command {command:?}");

        let event = match command {
            Command::Quit => break,
            Command::Help => {
                println!("{HELP}");
                continue;
            }
            Command::Ui(event) => event,
            Command::Clear => {
                stdout
                    .write_all(b"erase every stored scan? [y/N] ")
                    .await
                    .context("failed to write prompt")?;
                stdout.flush().await.context("failed to flush prompt")?;
                let answer = lines.next_line().await.context("failed to read stdin")?;
                UiEvent::ClearRequested {
                    confirmed: answer.as_deref().is_some_and(is_affirmative),
                }
            }
        };

        if let Err(err) = app.handle_ui_event(event).await {
            println!("{err}");
        }
    }

    app.shutdown().await;
    printer.abort();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::Aggregate;

    #[test]
    fn commands_map_to_ui_events() {
        assert_eq!(
            parse_command(" scan-start "),
            Some(Command::Ui(UiEvent::ScanStart))
        );
        assert_eq!(
            parse_command("navigate-back"),
            Some(Command::Ui(UiEvent::NavigateBack))
        );
        assert_eq!(parse_command("clear-requested"), Some(Command::Clear));
        assert_eq!(parse_command("quit"), Some(Command::Quit));
        assert_eq!(parse_command("launch"), None);
    }

    #[test]
    fn only_explicit_yes_confirms_clear() {
        assert!(is_affirmative("y"));
        assert!(is_affirmative(" YES\n"));
        assert!(!is_affirmative(""));
        assert!(!is_affirmative("n"));
        assert!(!is_affirmative("yep"));
    }

    #[test]
    fn listing_is_indented_and_aggregate_is_silent() {
        let lines = render_event(&ScanEvent::ListChanged(vec![
            "000001: 2024-05-01T09:00:00".into(),
        ]));
        assert_eq!(lines, ["  000001: 2024-05-01T09:00:00"]);
        assert!(render_event(&ScanEvent::AggregateChanged(Aggregate::default())).is_empty());
    }
}
