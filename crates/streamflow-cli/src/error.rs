use colored::Colorize;

pub fn handle_error(err: anyhow::Error) -> ! {
    eprintln!("{} {:#}", "Error:".red().bold(), err);

    let msg = format!("{err:#}").to_lowercase();

    if msg.contains("timed out") {
        eprintln!("\n{}", "Suggestion:".yellow().bold());
        eprintln!("  Raise the inactivity window with:");
        eprintln!(
            "  {} streamflow replay <events.jsonl> --timeout-secs 600",
            "$".dimmed()
        );
    }

    if msg.contains("failed to read event log") || msg.contains("invalid event") {
        eprintln!("\n{}", "Suggestion:".yellow().bold());
        eprintln!("  Each line must be a JSON object such as:");
        eprintln!(
            "  {}",
            r#"{"progress": 0.5, "data": "Hello", "delayMs": 20}"#.dimmed()
        );
    }

    if msg.contains("persistence error") {
        eprintln!("\n{}", "Suggestion:".yellow().bold());
        eprintln!("  Check that the history file is writable or pass --history.");
    }

    std::process::exit(1);
}
