//! 🚀 logship-cli, the front door for piping logs into a cluster.
//!
//! 🎬 *[narrator voice]* "It all started with `tail -f app.log | logship-cli`..."
//! 📦 This binary crate is the thin CLI wrapper that loads config, sets up
//! logging, reads stdin, and lets the handler do the heavy lifting. Like a manager. 🦆

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use comfy_table::Table;
use indicatif::ProgressBar;
use logship::{ElasticsearchHandler, Level, LogRecord};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// 📡 Ship log lines from stdin to Elasticsearch, in bulk.
#[derive(Debug, Parser)]
#[command(name = "logship", version, about)]
struct Args {
    /// TOML config file, merged over LOGSHIP_* environment variables
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Channel stamped on plain-text lines
    #[arg(long, default_value = "app")]
    channel: String,

    /// Minimum level to ship, also the level of plain-text lines
    #[arg(long, default_value = "info")]
    level: Level,

    /// Records per bulk request
    #[arg(long, default_value_t = 100)]
    batch_size: usize,
}

#[derive(Debug, Default)]
struct Tally {
    /// Records in batches the handler accepted. Swallowed failures count too under `ignore_error`.
    submitted: usize,
    skipped: usize,
    batches: usize,
}

/// 🔄 A line becomes a record. JSON objects may bring their own message, level, channel and context.
fn parse_line(line: &str, channel: &str, default_level: Level) -> Option<LogRecord> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let Ok(Value::Object(mut fields)) = serde_json::from_str::<Value>(line) else {
        return Some(LogRecord::new(default_level, channel, line));
    };

    let message = match fields.remove("message") {
        Some(Value::String(message)) => message,
        _ => line.to_string(),
    };
    let level = fields
        .get("level")
        .and_then(Value::as_str)
        .and_then(|level| level.parse().ok())
        .unwrap_or(default_level);
    let channel = fields
        .get("channel")
        .and_then(Value::as_str)
        .unwrap_or(channel)
        .to_string();

    let mut record = LogRecord::new(level, channel, message);
    if let Some(Value::Object(context)) = fields.remove("context") {
        record.context = context;
    }
    Some(record)
}

/// 📦 One bulk request. The tally only moves once the handler has said yes.
async fn flush(
    handler: &ElasticsearchHandler,
    batch: Vec<LogRecord>,
    tally: &mut Tally,
) -> Result<(), logship::HandlerError> {
    let count = batch.len();
    handler.submit_batch(batch).await?;
    tally.submitted += count;
    tally.batches += 1;
    Ok(())
}

async fn ship(handler: &ElasticsearchHandler, args: &Args) -> Result<Tally> {
    let mut tally = Tally::default();
    let mut batch = Vec::with_capacity(args.batch_size);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let spinner = ProgressBar::new_spinner();
    while let Some(line) = lines
        .next_line()
        .await
        .context("💀 stdin stopped making sense")?
    {
        let Some(record) = parse_line(&line, &args.channel, args.level) else {
            continue;
        };
        if !handler.is_handling(&record) {
            tally.skipped += 1;
            continue;
        }
        batch.push(record);

        if batch.len() >= args.batch_size {
            flush(handler, std::mem::take(&mut batch), &mut tally)
                .await
                .context("💀 a bulk request came back with bad news")?;
            spinner.set_message(format!("📦 {} records submitted", tally.submitted));
            spinner.tick();
        }
    }

    if !batch.is_empty() {
        flush(handler, batch, &mut tally)
            .await
            .context("💀 the last bulk request came back with bad news")?;
    }
    spinner.finish_and_clear();

    Ok(tally)
}

async fn run(args: Args) -> Result<()> {
    let provider = logship::load_provider(args.config.as_deref())
        .context("💀 In logship-cli we couldn't load the config. Check the file, then check it again.")?;

    let handler = ElasticsearchHandler::from_provider(&provider).with_level(args.level);
    if let Some(reason) = handler.inactive_reason() {
        anyhow::bail!("💀 The handler is inactive, nothing would be shipped: {reason}");
    }
    info!(
        "🚀 shipping stdin to index '{}' in batches of {}",
        handler.options().index,
        args.batch_size
    );

    let tally = ship(&handler, &args).await?;

    let mut table = Table::new();
    table.set_header(vec!["index", "submitted", "skipped", "bulk requests"]);
    table.add_row(vec![
        handler.options().index.clone(),
        tally.submitted.to_string(),
        tally.skipped.to_string(),
        tally.batches.to_string(),
    ]);
    println!("{table}");
    Ok(())
}

#[tokio::main]
async fn main() {
    // 📡 tracing goes to stderr, so stdout stays clean for the summary table
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Err(err) = run(args).await {
        error!("💀 error: {}", err);
        // -- 🧅 peel the onion of sadness, one layer at a time
        let mut smells_like_connection_trouble = false;
        for cause in err.chain().skip(1) {
            error!("⚠️  cause: {}", cause);
            let cause_str = cause.to_string();
            if cause_str.contains("error sending request")
                || cause_str.contains("connection refused")
                || cause_str.contains("Connection refused")
                || cause_str.contains("tcp connect error")
                || cause_str.contains("dns error")
            {
                smells_like_connection_trouble = true;
            }
        }

        if smells_like_connection_trouble {
            error!(
                "🔧 hint: looks like Elasticsearch isn't reachable. Check `hosts` under \
                 [elasticsearch_logger.config], and whether the cluster is actually up."
            );
        }
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use logship::{BulkResponse, HandlerOptions, RecordingClient};

    use super::*;

    fn handler_with(client: RecordingClient, ignore_error: bool) -> ElasticsearchHandler {
        let the_options = HandlerOptions {
            ignore_error,
            ..HandlerOptions::default()
        };
        ElasticsearchHandler::with_client(Box::new(client), the_options)
    }

    fn two_records() -> Vec<LogRecord> {
        vec![
            LogRecord::new(Level::Error, "app", "one"),
            LogRecord::new(Level::Error, "app", "two"),
        ]
    }

    #[tokio::test]
    async fn the_one_where_a_failed_batch_is_not_counted() {
        let the_handler = handler_with(RecordingClient::failing("cluster on fire"), false);
        let mut the_tally = Tally::default();

        assert!(flush(&the_handler, two_records(), &mut the_tally).await.is_err());
        assert_eq!(the_tally.submitted, 0);
        assert_eq!(the_tally.batches, 0);
    }

    #[tokio::test]
    async fn the_one_where_an_accepted_batch_is_counted() {
        let the_handler = handler_with(RecordingClient::responding(BulkResponse::ok(vec![])), false);
        let mut the_tally = Tally::default();

        flush(&the_handler, two_records(), &mut the_tally)
            .await
            .expect("errors=false means success");
        assert_eq!(the_tally.submitted, 2);
        assert_eq!(the_tally.batches, 1);
    }

    #[tokio::test]
    async fn the_one_where_ignore_error_makes_a_swallowed_batch_look_submitted() {
        let the_handler = handler_with(RecordingClient::failing("cluster on fire"), true);
        let mut the_tally = Tally::default();

        flush(&the_handler, two_records(), &mut the_tally)
            .await
            .expect("ignore_error swallows the failure");
        assert_eq!(the_tally.submitted, 2);
    }

    #[test]
    fn the_one_where_plain_text_gets_the_defaults() {
        let the_record = parse_line("  disk is 91% full  ", "ops", Level::Warning)
            .expect("non-empty line");
        assert_eq!(the_record.message, "disk is 91% full");
        assert_eq!(the_record.channel, "ops");
        assert_eq!(the_record.level, Level::Warning);
    }

    #[test]
    fn the_one_where_json_lines_bring_their_own_luggage() {
        let the_record = parse_line(
            r#"{"message":"card declined","level":"error","channel":"checkout","context":{"order":7}}"#,
            "app",
            Level::Info,
        )
        .expect("non-empty line");
        assert_eq!(the_record.message, "card declined");
        assert_eq!(the_record.level, Level::Error);
        assert_eq!(the_record.channel, "checkout");
        assert_eq!(the_record.context["order"], 7);
    }

    #[test]
    fn the_one_where_blank_lines_are_not_records() {
        assert!(parse_line("   ", "app", Level::Info).is_none());
    }

    #[test]
    fn the_one_where_args_parse_like_a_normal_cli() {
        let the_args = Args::try_parse_from([
            "logship",
            "--config",
            "logship.toml",
            "--level",
            "warning",
            "--batch-size",
            "25",
        ])
        .expect("valid args");
        assert_eq!(the_args.level, Level::Warning);
        assert_eq!(the_args.batch_size, 25);
        assert_eq!(the_args.channel, "app");
        assert_eq!(the_args.config, Some(PathBuf::from("logship.toml")));
    }
}
