mod logging;
mod server;

use std::io::{self, Write};
use std::process;

use clap::{Parser, Subcommand};
use progresslog_lib::{LogFilter, ProgressEntry};

use crate::server::config::{ProgressLogConfig, StorageBackend};
use crate::server::store::open_store;
use crate::server::ServeArgs;

#[derive(Parser, Debug)]
#[command(name = "progresslog")]
#[command(version)]
#[command(about = "Record and query student progress entries", long_about = None)]
struct Args {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP service
    Serve {
        /// Port to listen on
        #[arg(short = 'p', long = "port")]
        port: Option<u16>,

        /// Address to bind
        #[arg(short = 'H', long = "host")]
        host: Option<String>,

        /// Storage backend: csv, document or memory
        #[arg(short = 's', long = "storage", value_parser = parse_storage)]
        storage: Option<StorageBackend>,

        /// Path to config file
        #[arg(short = 'c', long = "config", default_value = "progresslog.toml", env = "PROGRESSLOG_CONFIG")]
        config: String,
    },
    /// Print stored entries as JSON lines
    List {
        /// Only entries for this email (case-insensitive)
        #[arg(long = "email")]
        email: Option<String>,

        /// Only entries for this student id
        #[arg(long = "student-id")]
        student_id: Option<String>,

        /// Only entries for this week (case-insensitive)
        #[arg(long = "week")]
        week: Option<String>,

        /// Storage backend: csv, document or memory
        #[arg(short = 's', long = "storage", value_parser = parse_storage)]
        storage: Option<StorageBackend>,

        /// Path to config file
        #[arg(short = 'c', long = "config", default_value = "progresslog.toml", env = "PROGRESSLOG_CONFIG")]
        config: String,
    },
}

fn parse_storage(value: &str) -> Result<StorageBackend, String> {
    StorageBackend::parse(value)
        .ok_or_else(|| format!("unknown storage backend '{}' (expected csv, document or memory)", value))
}

async fn run_list(config_path: &str, storage: Option<StorageBackend>, filter: LogFilter) {
    let mut config = ProgressLogConfig::load(config_path);
    config.apply_env_overrides();
    if let Some(storage) = storage {
        config.server.storage = storage;
    }

    let store = match open_store(&config.server) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Failed to open {} storage: {}", config.server.storage.as_str(), e);
            process::exit(1);
        }
    };

    let entries = match store.query(&filter).await {
        Ok(entries) => entries,
        Err(e) => {
            eprintln!("Failed to read entries: {}", e);
            process::exit(1);
        }
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match write_entries(&mut out, &entries) {
        Ok(count) => eprintln!("{} entries", count),
        Err(e) => {
            eprintln!("Failed to write entries: {}", e);
            process::exit(1);
        }
    }
}

/// Write one JSON document per line and flush. Stops at the first failure.
fn write_entries<W: Write>(out: &mut W, entries: &[ProgressEntry]) -> io::Result<usize> {
    for entry in entries {
        serde_json::to_writer(&mut *out, entry)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(entries.len())
}

#[tokio::main]
async fn main() {
    let cli = Args::parse();
    match cli.cmd {
        Command::Serve {
            port,
            host,
            storage,
            config,
        } => {
            let log_filter = logging::init_logging("info");
            let args = ServeArgs {
                port,
                hostname: host,
                storage,
            };
            server::run_serve(&config, args, log_filter).await
        }
        Command::List {
            email,
            student_id,
            week,
            storage,
            config,
        } => {
            logging::init_logging("warn");
            run_list(&config, storage, LogFilter::new(email, student_id, week)).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingWriter;

    impl Write for FailingWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn entry(email: &str) -> ProgressEntry {
        ProgressEntry {
            email: email.into(),
            student_id: "1".into(),
            week: "w1".into(),
            exercise: "ex".into(),
            status: "completed".into(),
            feedback: "fb".into(),
            created_at: None,
        }
    }

    #[test]
    fn test_write_entries_one_json_per_line() {
        let mut buf = Vec::new();
        let count = write_entries(&mut buf, &[entry("a@b.c"), entry("d@e.f")]).unwrap();
        assert_eq!(count, 2);

        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: ProgressEntry = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.email, "a@b.c");
    }

    #[test]
    fn test_write_entries_reports_write_failure() {
        let err = write_entries(&mut FailingWriter, &[entry("a@b.c")]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn test_write_entries_empty_still_succeeds() {
        assert_eq!(write_entries(&mut FailingWriter, &[]).unwrap(), 0);
    }
}
