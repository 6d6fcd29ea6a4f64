//! # wiremail-smtp
//!
//! A blocking SMTP client implementing the RFC 5321 mail transaction.
//!
//! ## Features
//!
//! - **Explicit session state**: every command checks its precondition
//!   before anything reaches the wire
//! - **TLS support**: both implicit TLS (port 465) and STARTTLS, via rustls
//! - **Authentication**: PLAIN, LOGIN, CRAM-MD5
//! - **Diagnostics**: bounded transaction log of raw lines, last request and
//!   reply, `tracing` events
//!
//! ## Quick Start
//!
//! ```no_run
//! use wiremail_smtp::{Config, Security, Session};
//!
//! fn main() -> wiremail_smtp::Result<()> {
//!     let config = Config::builder("smtp.example.com")
//!         .security(Security::StartTls)
//!         .helo_name("client.example.com")
//!         .credentials("user@example.com", "password")
//!         .build();
//!
//!     let mut session = Session::new(config);
//!
//!     // Connect, EHLO, STARTTLS, AUTH
//!     session.establish()?;
//!
//!     // Send email
//!     session.mail("sender@example.com")?;
//!     session.rcpt("recipient@example.com")?;
//!     session.data("Subject: Test\r\n\r\nHello, World!\r\n")?;
//!
//!     session.quit()?;
//!     Ok(())
//! }
//! ```
//!
//! ## Session States
//!
//! ```text
//! New ─ connect() ─→ Connected ─ helo() ─→ Greeted ─ starttls() ─→ TlsUpgraded
//!                                             │                        │
//!                                             └──────── auth() ────────┴─→ Authenticated
//!                                             │
//!                                             └─ mail() ─→ SenderSet ─ rcpt() ─→ RecipientSet ─ data() ─→ DataSent
//! ```
//!
//! `quit()`, `close()` and any I/O failure lead to `Closed`.
//!
//! ## Modules
//!
//! - [`command`]: SMTP command builders
//! - [`config`]: Session configuration
//! - [`connection`]: Transport, TLS streams and transaction log
//! - [`parser`]: Reply parser
//! - [`session`]: Session state machine
//! - [`types`]: Core SMTP types (extensions, replies)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod config;
pub mod connection;
mod error;
pub mod parser;
pub mod session;
pub mod types;

pub use config::{Config, ConfigBuilder, Credentials, Security, Timeouts};
pub use connection::{Connection, ServerInfo, Transport};
pub use error::{Error, Result};
pub use session::{Session, State, TransactionFlags};
pub use types::{AuthMechanism, Extension, Reply, ReplyCode};
