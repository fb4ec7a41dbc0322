//! Convert a DHCP lease rate-limit into a static simple queue.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example queue_convert -- --host 192.168.88.1 --user admin --password secret \
//!     --name printer --target 192.168.88.10 --decision overwrite
//! ```
//!
//! Undo the recorded action afterwards:
//! ```bash
//! cargo run --example queue_convert -- --host 192.168.88.1 --user admin --password secret --undo 3
//! ```

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use tikscrape::{Ledger, QueueConverter, QueueDecision, SessionBuilder, Settings};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging (set RUST_LOG=debug for verbose output)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let settings = Settings::load_or_default(&args.settings)?;
    let ledger = Ledger::open(&settings.ledger_path)?
        .with_failure_markers(settings.failure_markers.clone());

    let mut builder = SessionBuilder::new(&args.host)
        .port(args.port)
        .username(&args.user)
        .timeout(Duration::from_secs(settings.timeout_secs));
    if let Some(password) = &args.password {
        builder = builder.password(password);
    } else if let Some(key_path) = &args.key {
        builder = builder.private_key(key_path);
    } else {
        eprintln!("Error: Must provide either --password or --key");
        std::process::exit(1);
    }

    println!("Connecting to {}:{}...", args.host, args.port);
    let router = builder.connect().await?;

    if let Some(id) = args.undo {
        let report = ledger.undo(id, &router).await?;
        println!("Undid action {} ({} commands)", report.id, report.commands.len());
        router.close().await?;
        return Ok(());
    }

    let (Some(name), Some(target)) = (&args.name, &args.target) else {
        eprintln!("Error: --name and --target are required");
        std::process::exit(1);
    };

    let mut converter = QueueConverter::new(&router, &settings);
    let conversion = converter.convert(name, target).await?;
    println!("Cleared lease rate-limit {}", conversion.lease_rate);
    if let Some(existing) = &conversion.conflict {
        println!(
            "Conflicting queue '{}' -> {} ({})",
            existing.name, existing.target, existing.max_limit
        );
    }

    let outcome = converter.apply(&conversion, args.decision, &ledger).await?;
    println!("{}", outcome.message);
    println!("Recorded as action {}", outcome.action_id);
    for command in outcome.saga.executed() {
        println!("  {}", command);
    }

    router.close().await?;
    Ok(())
}

/// Simple argument parser (avoiding external dependencies)
struct Args {
    host: String,
    port: u16,
    user: String,
    password: Option<String>,
    key: Option<PathBuf>,
    settings: PathBuf,
    name: Option<String>,
    target: Option<String>,
    decision: QueueDecision,
    undo: Option<u64>,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = env::args().collect();
        let mut parsed = Self {
            host: "192.168.88.1".to_string(),
            port: 22,
            user: "admin".to_string(),
            password: None,
            key: None,
            settings: PathBuf::from("tikscrape.json"),
            name: None,
            target: None,
            decision: QueueDecision::Overwrite,
            undo: None,
        };

        let mut i = 1;
        while i < args.len() {
            let value = args.get(i + 1).cloned();
            match (args[i].as_str(), value) {
                ("--host" | "-h", Some(v)) => parsed.host = v,
                ("--port" | "-p", Some(v)) => parsed.port = v.parse().unwrap_or(22),
                ("--user" | "-u", Some(v)) => parsed.user = v,
                ("--password" | "-P", Some(v)) => parsed.password = Some(v),
                ("--key" | "-k", Some(v)) => parsed.key = Some(PathBuf::from(v)),
                ("--settings" | "-s", Some(v)) => parsed.settings = PathBuf::from(v),
                ("--name" | "-n", Some(v)) => parsed.name = Some(v),
                ("--target" | "-t", Some(v)) => parsed.target = Some(v),
                ("--decision" | "-d", Some(v)) => {
                    parsed.decision = match v.as_str() {
                        "overwrite" => QueueDecision::Overwrite,
                        "remove-rate" | "remove_rate_only" => QueueDecision::RemoveRateOnly,
                        "none" | "no_action" => QueueDecision::NoAction,
                        other => {
                            eprintln!("Unknown decision: {}", other);
                            std::process::exit(1);
                        }
                    }
                }
                ("--undo", Some(v)) => parsed.undo = v.parse().ok(),
                ("--help", _) => {
                    Self::print_help();
                    std::process::exit(0);
                }
                (other, _) => {
                    eprintln!("Unknown or incomplete argument: {}", other);
                    i -= 1;
                }
            }
            i += 2;
        }

        parsed
    }

    fn print_help() {
        println!(
            r#"tikscrape queue_convert example

USAGE:
    cargo run --example queue_convert -- [OPTIONS]

OPTIONS:
    -h, --host <HOST>          Router address [default: 192.168.88.1]
    -p, --port <PORT>          SSH port [default: 22]
    -u, --user <USER>          Username [default: admin]
    -P, --password <PASS>      Password for authentication
    -k, --key <PATH>           Path to SSH private key
    -s, --settings <PATH>      Settings file [default: tikscrape.json]
    -n, --name <NAME>          Client name
    -t, --target <ADDR>        Lease address
    -d, --decision <WHAT>      overwrite | remove-rate | none [default: overwrite]
    --undo <ID>                Undo a recorded action instead
    --help                     Print this help message
"#
        );
    }
}
