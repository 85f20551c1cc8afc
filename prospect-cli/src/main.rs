//! prospect-cli: terminal client for the Prospect startup research service
//!
//! # Subcommands
//! - `send <message> [--json]` : ask a question, render the companies table
//! - `history [-n <limit>] [--json]`: recent exchanges, newest first
//! - `status`                   : show server health

use clap::{Parser, Subcommand};
use serde::Deserialize;

const DEFAULT_SERVER: &str = "http://127.0.0.1:8000";
const DEFAULT_HISTORY: u32 = 10;
const MAX_CELL_WIDTH: usize = 40;

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(name = "prospect-cli", version, about = "Prospect startup research from the terminal")]
struct Cli {
    /// Prospect HTTP server URL (overrides PROSPECT_HTTP_URL env var)
    #[arg(long, env = "PROSPECT_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Send one message and render the reply
    Send {
        /// Question about startups, e.g. "Find startups in Berlin"
        message: String,

        /// Print the raw JSON envelope
        #[arg(long)]
        json: bool,
    },

    /// List recent exchanges
    History {
        #[arg(short = 'n', long, default_value_t = DEFAULT_HISTORY)]
        limit: u32,

        #[arg(long)]
        json: bool,
    },

    /// Show Prospect server status
    Status,
}

/// One row of GET /messages/get_history
#[derive(Debug, Deserialize)]
pub struct ExchangeRow {
    pub id: String,
    pub user_message: String,
    pub bot_response: String,
    pub timestamp: String,
}

// ============================================================================
// Rendering
// ============================================================================

/// "company_name" → "Company Name". Keys that already contain spaces are kept.
pub fn column_header(key: &str) -> String {
    if key.contains(' ') {
        return key.to_string();
    }
    key.split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn cell_text(value: Option<&serde_json::Value>) -> String {
    let text = match value {
        Some(serde_json::Value::String(s)) => s.trim().to_string(),
        Some(serde_json::Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    };
    if text.is_empty() {
        return "-".to_string();
    }
    if text.chars().count() > MAX_CELL_WIDTH {
        let cut: String = text.chars().take(MAX_CELL_WIDTH - 1).collect();
        return format!("{}…", cut);
    }
    text
}

/// Plain-text table over company rows. Columns appear in first-seen order.
pub fn render_table(companies: &[serde_json::Value]) -> String {
    let mut columns: Vec<&str> = Vec::new();
    for company in companies {
        if let Some(map) = company.as_object() {
            for key in map.keys() {
                if !columns.contains(&key.as_str()) {
                    columns.push(key);
                }
            }
        }
    }
    if columns.is_empty() {
        return String::new();
    }

    let headers: Vec<String> = columns.iter().map(|c| column_header(c)).collect();
    let rows: Vec<Vec<String>> = companies
        .iter()
        .map(|company| columns.iter().map(|c| cell_text(company.get(*c))).collect())
        .collect();

    let widths: Vec<usize> = (0..columns.len())
        .map(|i| {
            rows.iter()
                .map(|r| r[i].chars().count())
                .chain(std::iter::once(headers[i].chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let format_row = |cells: &[String]| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
            .collect::<Vec<_>>()
            .join(" | ")
            .trim_end()
            .to_string()
    };

    let mut out = vec![format_row(&headers)];
    out.push(widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>().join("-+-"));
    out.extend(rows.iter().map(|r| format_row(r)));
    out.join("\n")
}

/// Human-readable form of a send_message envelope.
pub fn render_result(body: &serde_json::Value) -> String {
    if body["status"] == "error" {
        let mut out = format!("Error: {}", body["message"].as_str().unwrap_or("unknown error"));
        if let Some(raw) = body["raw_response"].as_str() {
            let preview: String = raw.chars().take(300).collect();
            out.push_str(&format!("\n\nRaw response:\n{}", preview));
        }
        return out;
    }

    let doc = &body["data"];
    let mut sections = Vec::new();

    if let Some(summary) = doc["summary"].as_str().filter(|s| !s.is_empty()) {
        sections.push(summary.to_string());
    }

    let companies = doc["data"]["companies"].as_array().map(Vec::as_slice).unwrap_or(&[]);
    if companies.is_empty() {
        sections.push("No companies returned.".to_string());
    } else {
        sections.push(render_table(companies));
    }

    let insights: Vec<&str> = doc["key_insights"]
        .as_array()
        .map(|items| items.iter().filter_map(|i| i.as_str()).collect())
        .unwrap_or_default();
    if !insights.is_empty() {
        let lines: Vec<String> = insights.iter().map(|i| format!("  • {}", i)).collect();
        sections.push(format!("Key insights:\n{}", lines.join("\n")));
    }

    sections.join("\n\n")
}

/// One-line digest of a stored bot response.
pub fn describe_stored_response(bot_response: &str) -> String {
    let body: serde_json::Value = match serde_json::from_str(bot_response) {
        Ok(v) => v,
        Err(_) => return "(unreadable response)".to_string(),
    };
    if body["status"] == "error" {
        return format!("error: {}", body["message"].as_str().unwrap_or("unknown"));
    }
    let count = body["data"]["data"]["companies"].as_array().map_or(0, Vec::len);
    let summary: String = body["data"]["summary"].as_str().unwrap_or("").chars().take(80).collect();
    if summary.is_empty() {
        format!("{} companies", count)
    } else {
        format!("{} companies: {}", count, summary)
    }
}

// ============================================================================
// HTTP Client Calls
// ============================================================================

fn do_send(server: &str, message: &str, json_output: bool) -> anyhow::Result<()> {
    let client = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(90))
        .build()?;

    let url = format!("{}/messages/send_message", server);
    let resp = match client.post(&url).json(&serde_json::json!({ "message": message })).send() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("prospect-cli: connection failed to {}: {}", url, e);
            std::process::exit(1);
        }
    };

    let status = resp.status();
    let body: serde_json::Value = resp.json().unwrap_or_default();

    if !status.is_success() {
        eprintln!(
            "prospect-cli: server returned {}: {}",
            status,
            body["error"].as_str().unwrap_or("unknown error")
        );
        if let Some(details) = body["details"].as_str() {
            eprintln!("  {}", details);
        }
        std::process::exit(1);
    }

    if json_output {
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        println!("{}", render_result(&body));
    }

    Ok(())
}

fn do_history(server: &str, limit: u32, json_output: bool) -> anyhow::Result<()> {
    let client = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(10))
        .build()?;

    let url = format!("{}/messages/get_history?limit={}", server, limit);
    let resp = match client.get(&url).send() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("prospect-cli: connection failed to {}: {}", url, e);
            std::process::exit(1);
        }
    };

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().unwrap_or_default();
        eprintln!("prospect-cli: server returned {}: {}", status, body);
        std::process::exit(1);
    }

    let rows: Vec<ExchangeRow> = match resp.json() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("prospect-cli: failed to parse history: {}", e);
            std::process::exit(1);
        }
    };

    if json_output {
        let value: Vec<serde_json::Value> = rows
            .iter()
            .map(|r| {
                serde_json::json!({
                    "id": r.id,
                    "user_message": r.user_message,
                    "bot_response": r.bot_response,
                    "timestamp": r.timestamp,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    if rows.is_empty() {
        eprintln!("No exchanges yet");
        return Ok(());
    }
    for r in &rows {
        println!("[{}] {}", r.timestamp, r.user_message);
        println!("    {}", describe_stored_response(&r.bot_response));
    }

    Ok(())
}

/// Show the server status by calling GET /health.
fn do_status(server: &str) -> anyhow::Result<()> {
    let client = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(10))
        .build()?;

    let url = format!("{}/health", server);
    match client.get(&url).send() {
        Ok(r) if r.status().is_success() => {
            let body: serde_json::Value = r.json().unwrap_or_default();
            println!("Prospect server: {}", body["status"].as_str().unwrap_or("unknown"));
            println!("Version:         {}", body["version"].as_str().unwrap_or("?"));
            println!("Store:           {}", body["store"].as_str().unwrap_or("?"));
            println!("Store status:    {}", body["store_status"].as_str().unwrap_or("?"));
        }
        Ok(r) => {
            eprintln!("prospect-cli: server unhealthy (HTTP {})", r.status());
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("prospect-cli: cannot reach {}: {}", url, e);
            std::process::exit(1);
        }
    }

    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let cli = Cli::parse();
    let server = cli.server.trim_end_matches('/').to_string();

    let result = match cli.command {
        Commands::Send { message, json } => do_send(&server, &message, json),
        Commands::History { limit, json } => do_history(&server, limit, json),
        Commands::Status => do_status(&server),
    };

    if let Err(e) = result {
        eprintln!("prospect-cli: {}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================
