//! Colorful console output for uploads and place-id resolution.

use num_format::{Locale, ToFormattedString};
use owo_colors::OwoColorize;
use std::net::SocketAddr;
use std::time::Duration;

/// ASCII art banner for server startup.
pub fn print_banner() {
    let banner = r#"
  _____ _           _     ____             _   _
 |  ___| | ___  ___| |_  |  _ \ ___  _   _| |_(_)_ __   __ _
 | |_  | |/ _ \/ _ \ __| | |_) / _ \| | | | __| | '_ \ / _` |
 |  _| | |  __/  __/ |_  |  _ < (_) | |_| | |_| | | | | (_| |
 |_|   |_|\___|\___|\__| |_| \_\___/ \__,_|\__|_|_| |_|\__, |
                                                       |___/
"#;
    println!("{}", banner.cyan().bold());
    println!(
        "  {} {}\n",
        format!("v{}", env!("CARGO_PKG_VERSION")).bright_black(),
        "Scenario Uploads".bright_cyan()
    );
}

/// Prints the listening address and which external APIs are usable.
pub fn print_server_started(addr: SocketAddr, distance_matrix_key: bool, places_key: bool, max_upload_bytes: usize) {
    let state = |set: bool| {
        if set {
            "configured".bright_green().to_string()
        } else {
            "no key".yellow().to_string()
        }
    };
    println!(
        "{} {} {} Listening on {}",
        timestamp().bright_black(),
        "INFO".bright_green(),
        "[Server]".bright_cyan(),
        format!("http://{}", addr).white().bold()
    );
    println!(
        "{} {} {} distance matrix ({}), places ({}), upload limit ({} bytes)",
        timestamp().bright_black(),
        "INFO".bright_green(),
        "[Server]".bright_cyan(),
        state(distance_matrix_key),
        state(places_key),
        max_upload_bytes.to_formatted_string(&Locale::en).bright_yellow()
    );
}

/// Prints a summary box for a valid upload.
pub fn print_upload_valid(
    file_name: &str,
    upload_type: &str,
    shipments: usize,
    vehicles: usize,
    has_distance_matrix: bool,
    elapsed: Duration,
) {
    println!(
        "{} {} {} {} validated in ({})",
        timestamp().bright_black(),
        "INFO".bright_green(),
        "[Upload]".bright_cyan(),
        file_name.white().bold(),
        format_duration(elapsed).yellow()
    );

    // 60 chars wide, 56 char content area
    println!();
    println!("{}", "╔══════════════════════════════════════════════════════════╗".bright_cyan());
    let status_text = "✓ UPLOAD VALID";
    let status_padding = 56 - status_text.chars().count();
    let left_pad = status_padding / 2;
    println!(
        "{}{}{}{}{}",
        "║".bright_cyan(),
        " ".repeat(left_pad),
        status_text.bright_green().bold(),
        " ".repeat(status_padding - left_pad),
        "║".bright_cyan()
    );
    println!("{}", "╠══════════════════════════════════════════════════════════╣".bright_cyan());
    summary_line("Upload Type:", upload_type);
    summary_line("Shipments:", &shipments.to_formatted_string(&Locale::en));
    summary_line("Vehicles:", &vehicles.to_formatted_string(&Locale::en));
    summary_line("Distance Matrix:", if has_distance_matrix { "yes" } else { "no" });
    println!("{}", "╚══════════════════════════════════════════════════════════╝".bright_cyan());
    println!();
}

/// Prints a rejected upload with its reason key.
pub fn print_upload_invalid(file_name: &str, reason: &str, message: &str) {
    println!(
        "{} {} {} {} rejected ({}): {}",
        timestamp().bright_black(),
        "WARN".bright_yellow(),
        "[Upload]".bright_cyan(),
        file_name.white().bold(),
        reason.bright_red(),
        message
    );
}

/// Prints the end of a place-id resolution run.
pub fn print_place_ids_resolved(resolved: usize, total: usize, elapsed: Duration, error: Option<&str>) {
    let count = format!(
        "{}/{}",
        resolved.to_formatted_string(&Locale::en),
        total.to_formatted_string(&Locale::en)
    );
    let count = if resolved == total {
        count.bright_green().to_string()
    } else {
        count.yellow().to_string()
    };
    println!(
        "{} {} {} place ids resolved ({}) in ({}){}",
        timestamp().bright_black(),
        "INFO".bright_green(),
        "[Places]".bright_cyan(),
        count,
        format_duration(elapsed).yellow(),
        error.map(|e| format!(": {}", e.bright_red())).unwrap_or_default()
    );
}

fn summary_line(label: &str, value: &str) {
    println!(
        "{}  {:<18}{:>36}  {}",
        "║".bright_cyan(),
        label,
        value,
        "║".bright_cyan()
    );
}

/// Formats a duration nicely.
fn format_duration(d: Duration) -> String {
    let total_ms = d.as_millis();
    if total_ms < 1000 {
        format!("{}ms", total_ms)
    } else if total_ms < 60_000 {
        format!("{:.2}s", d.as_secs_f64())
    } else {
        let mins = total_ms / 60_000;
        let secs = (total_ms % 60_000) / 1000;
        format!("{}m {}s", mins, secs)
    }
}

/// Returns a wall-clock timestamp string.
fn timestamp() -> String {
    chrono::Local::now().format("%H:%M:%S%.3f").to_string()
}
