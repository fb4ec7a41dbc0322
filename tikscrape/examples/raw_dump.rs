//! Capture every detail menu and print the parsed records as JSON.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example raw_dump -- --host 192.168.88.1 --user admin --password secret
//! ```
//!
//! Parse a saved transcript without connecting:
//! ```bash
//! cargo run --example raw_dump -- --file dump.txt
//! ```

use std::env;
use std::fs;
use std::path::PathBuf;

use indexmap::IndexMap;
use tikscrape::device::DUMP_COMMANDS;
use tikscrape::{Device, Record, SessionBuilder, Settings, split_sections_str};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let sections: IndexMap<String, Vec<Record>> = if let Some(path) = &args.file {
        split_sections_str(&fs::read_to_string(path)?)
    } else {
        let Some(password) = &args.password else {
            eprintln!("Error: Must provide --password or --file");
            std::process::exit(1);
        };
        let router = SessionBuilder::new(&args.host)
            .port(args.port)
            .username(&args.user)
            .password(password)
            .connect()
            .await?;

        let device = Device::new(&router, Settings::default());
        let dump = device.raw_dump(DUMP_COMMANDS).await?;
        router.close().await?;

        if let Some(out) = &args.save {
            fs::write(out, &dump.transcript)?;
            println!("Transcript saved to {}", out.display());
        }
        dump.sections
    };

    for (command, records) in &sections {
        println!("{} ({} records)", command, records.len());
    }
    println!("{}", serde_json::to_string_pretty(&sections)?);
    Ok(())
}

/// Simple argument parser (avoiding external dependencies)
struct Args {
    host: String,
    port: u16,
    user: String,
    password: Option<String>,
    file: Option<PathBuf>,
    save: Option<PathBuf>,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = env::args().collect();
        let mut host = "192.168.88.1".to_string();
        let mut port = 22u16;
        let mut user = "admin".to_string();
        let mut password = None;
        let mut file = None;
        let mut save = None;

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--host" | "-h" => {
                    i += 1;
                    if i < args.len() {
                        host = args[i].clone();
                    }
                }
                "--port" | "-p" => {
                    i += 1;
                    if i < args.len() {
                        port = args[i].parse().unwrap_or(22);
                    }
                }
                "--user" | "-u" => {
                    i += 1;
                    if i < args.len() {
                        user = args[i].clone();
                    }
                }
                "--password" | "-P" => {
                    i += 1;
                    if i < args.len() {
                        password = Some(args[i].clone());
                    }
                }
                "--file" | "-f" => {
                    i += 1;
                    if i < args.len() {
                        file = Some(PathBuf::from(&args[i]));
                    }
                }
                "--save" | "-o" => {
                    i += 1;
                    if i < args.len() {
                        save = Some(PathBuf::from(&args[i]));
                    }
                }
                _ => {
                    eprintln!("Unknown argument: {}", args[i]);
                }
            }
            i += 1;
        }

        Self {
            host,
            port,
            user,
            password,
            file,
            save,
        }
    }
}
