//! Pretty terminal output with colors and badges.

use colored::Colorize;

// === Startup ===

pub fn print_banner() {
    println!();
    println!("{}", "╔═══════════════════════════════════════════════════════════╗".cyan());
    println!("{}", "║                                                           ║".cyan());
    println!("║     {}                                   ║", "💬 chatgate v0.1.0".bold().white());
    println!("║     {}    ║", "Abuse-gated chat relay for the site widget".dimmed());
    println!("{}", "║                                                           ║".cyan());
    println!("{}", "╚═══════════════════════════════════════════════════════════╝".cyan());
    println!();
}

pub fn print_startup(addr: &str, reference_url: &str) {
    println!("{} {}", "✓".green().bold(), "Server ready".white().bold());
    println!("  {} {}", "→".dimmed(), format!("http://{}", addr).cyan().underline());
    println!("  {} {} {}", "→".dimmed(), "reference:".dimmed(), reference_url.white());
    println!();
    println!("{}", "Endpoints:".white().bold());
    println!("  {} {}       {}", "POST".yellow(), "/api/chat".white(), "Relay a widget message".dimmed());
    println!("  {} {}    {}", "POST".yellow(), "/api/unblock".white(), "Remove an IP from the block list".dimmed());
    println!("  {} {}    {}", "GET ".green(), "/api/blocked".white(), "List blocked IPs".dimmed());
    println!("  {} {} {}", "GET ".green(), "/api/transcript".white(), "Recent chat transcript".dimmed());
    println!("  {} {}        {}", "GET ".green(), "/metrics".white(), "Telemetry".dimmed());
    println!("  {} {}         {}", "GET ".green(), "/health".white(), "Health check".dimmed());
    println!();
}

// === Badges ===

fn badge(text: &str, fg: colored::Color, bg: colored::Color) -> colored::ColoredString {
    format!(" {} ", text).color(fg).on_color(bg).bold()
}

fn preview(message: &str) -> String {
    const MAX: usize = 40;
    if message.chars().count() > MAX {
        format!("{}…", message.chars().take(MAX).collect::<String>())
    } else {
        message.to_owned()
    }
}

// === Gate ===

pub fn log_irrelevant(ip: &str, message: &str, irrelevant: u32) {
    println!(
        "{} {} {} {}",
        badge("OFF-TOPIC", colored::Color::Black, colored::Color::Yellow),
        format!("ip:{}", ip).white(),
        format!("\"{}\"", preview(message)).dimmed(),
        format!("count={}", irrelevant).yellow()
    );
}

pub fn log_blocked(ip: &str) {
    println!(
        "{} {} {}",
        badge("BLOCKED", colored::Color::White, colored::Color::Red),
        format!("ip:{}", ip).yellow(),
        "too many irrelevant messages".red()
    );
}

pub fn log_unblock(ip: &str) {
    println!(
        "{} {} {}",
        badge("UNBLOCK", colored::Color::Black, colored::Color::Green),
        format!("ip:{}", ip).white(),
        "✓ restored".green()
    );
}

// === Rate Limiting ===

pub fn log_rate_limited(ip: &str, reason: &str) {
    println!(
        "{} {} {} {}",
        badge("RATE", colored::Color::Black, colored::Color::Yellow),
        format!("ip:{}", ip).yellow(),
        "→".dimmed(),
        reason.yellow()
    );
}

// === Backend ===

pub fn log_backend_failure(ip: &str, reason: &str) {
    println!(
        "{} {} {}",
        badge("BACKEND", colored::Color::White, colored::Color::Red),
        format!("ip:{}", ip).yellow(),
        reason.red()
    );
}
