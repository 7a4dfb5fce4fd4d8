use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

pub fn print_result<T: Serialize>(format: OutputFormat, quiet: bool, result: &T) {
    if quiet {
        return;
    }
    let rendered = match format {
        OutputFormat::Text => serde_json::to_string_pretty(result),
        OutputFormat::Json => serde_json::to_string(result),
    };
    if let Ok(json) = rendered {
        println!("{json}");
    }
}

pub fn print_error(format: OutputFormat, quiet: bool, message: &str) {
    if quiet {
        return;
    }
    match format {
        OutputFormat::Text => eprintln!("error: {message}"),
        OutputFormat::Json => {
            let body = serde_json::json!({ "error": message });
            eprintln!("{body}");
        }
    }
}

/// Print the structured log trail after a failure.
pub fn print_trail(format: OutputFormat, quiet: bool, lines: &[String]) {
    if quiet || format != OutputFormat::Text || lines.is_empty() {
        return;
    }
    eprintln!("\nLog trail:");
    for line in lines {
        eprintln!("  {line}");
    }
}
