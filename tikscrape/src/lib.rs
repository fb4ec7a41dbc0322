//! # tikscrape
//!
//! Async RouterOS CLI automation over SSH.
//!
//! tikscrape reads MikroTik `print detail` output into structured records
//! and makes queue and lease changes that can be undone later from a
//! persistent action ledger.
//!
//! ## Features
//!
//! - Async SSH exec transport via russh
//! - Line-oriented `print detail` parser with per-menu flag decoding
//! - Conversion of DHCP lease rate-limits into static simple queues
//! - ARP, DHCP lease and reachability workflows
//! - JSON action ledger with replayable inverse commands
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tikscrape::{Ledger, QueueConverter, QueueDecision, SessionBuilder, Settings};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), tikscrape::Error> {
//!     let settings = Settings::load_or_default("tikscrape.json")?;
//!     let ledger = Ledger::open(&settings.ledger_path)?;
//!
//!     let router = SessionBuilder::new("192.168.88.1")
//!         .username("admin")
//!         .password("secret")
//!         .connect()
//!         .await?;
//!
//!     let mut converter = QueueConverter::new(&router, &settings);
//!     let conversion = converter.convert("printer", "192.168.88.10").await?;
//!     let outcome = converter
//!         .apply(&conversion, QueueDecision::Overwrite, &ledger)
//!         .await?;
//!     println!("{}", outcome.message);
//!
//!     // put everything back
//!     ledger.undo(outcome.action_id, &router).await?;
//!     router.close().await?;
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod config;
pub mod device;
pub mod error;
pub mod ledger;
pub mod parser;
pub mod queue;
pub mod transport;

// Re-export main types for convenience
pub use config::Settings;
pub use device::{Device, RawDump};
pub use error::{Error, Result};
pub use ledger::{Action, Change, Ledger};
pub use parser::{Record, parse_detail, parse_detail_str, split_sections, split_sections_str};
pub use queue::{QueueConverter, QueueDecision, QueueSnapshot};
pub use transport::{
    AuthMethod, CommandOutput, FailureMarkers, SessionBuilder, SshConfig, SshTransport, Transport,
};
