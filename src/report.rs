use std::io::Write;

use anyhow::Result;

use crate::sync::SyncOutcome;

pub const UP_TO_DATE: &str = "No diff to add. Collection already up to date.";

pub fn report_lines(outcome: &SyncOutcome) -> Vec<String> {
    let mut lines = Vec::new();
    if !outcome.added.is_empty() {
        lines.push("Added files:".to_string());
        lines.extend(outcome.added.iter().map(|path| format!("- {}", path.display())));
    }
    if !outcome.updated.is_empty() {
        lines.push("Updated files:".to_string());
        lines.extend(outcome.updated.iter().map(|path| format!("- {}", path.display())));
    }
    if lines.is_empty() {
        lines.push(UP_TO_DATE.to_string());
    }
    lines
}

pub fn print_report(outcome: &SyncOutcome) -> Result<()> {
    for line in report_lines(outcome) {
        write_stdout_line(&line)?;
    }
    Ok(())
}

fn write_stdout_line(value: &str) -> Result<()> {
    let mut out = std::io::stdout().lock();
    if let Err(err) = out.write_all(value.as_bytes()) {
        if err.kind() == std::io::ErrorKind::BrokenPipe {
            std::process::exit(0);
        }
        return Err(err.into());
    }
    if let Err(err) = out.write_all(b"\n") {
        if err.kind() == std::io::ErrorKind::BrokenPipe {
            std::process::exit(0);
        }
        return Err(err.into());
    }
    Ok(())
}
