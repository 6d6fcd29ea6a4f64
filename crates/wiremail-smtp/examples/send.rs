//! Example: Send one message through a submission server
//!
//! Connects with STARTTLS on port 587, authenticates, and sends a short
//! quoted-printable message with an encoded subject.
//!
//! ## Running
//!
//! ```bash
//! RUST_LOG=wiremail_smtp=debug cargo run --package wiremail-smtp --example send
//! ```

use std::io::{self, Write};

use tracing_subscriber::EnvFilter;
use wiremail_mime::encoding::{LINE_LENGTH, LineEnd};
use wiremail_mime::header::encode_quoted_printable_header;
use wiremail_mime::{TransferEncoding, encode, is_printable};
use wiremail_smtp::{Config, Security, Session};

fn prompt(label: &str) -> io::Result<String> {
    print!("{label}: ");
    io::stdout().flush()?;
    let mut value = String::new();
    io::stdin().read_line(&mut value)?;
    Ok(value.trim().to_string())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("wiremail - SMTP send test");
    println!("=========================\n");

    let host = prompt("SMTP server")?;
    let username = prompt("Username")?;
    let password = prompt("Password")?;
    let to = prompt("Recipient")?;

    let subject = "Grüße from wiremail";
    let text = "Hello,\n\nthis line is plain ASCII.\nThis one is not: Grüße!\n.\nBye!";
    let encoding = if text.lines().all(|line| is_printable(line.as_bytes())) {
        TransferEncoding::SevenBit
    } else {
        TransferEncoding::QuotedPrintable
    };
    let mut message = format!(
        "From: {username}\r\nTo: {to}\r\nSubject: {}\r\nMIME-Version: 1.0\r\n\
         Content-Type: text/plain; charset=UTF-8\r\nContent-Transfer-Encoding: {encoding}\r\n\r\n",
        encode_quoted_printable_header(subject.as_bytes(), "UTF-8", LINE_LENGTH, LineEnd::CrLf),
    )
    .into_bytes();
    for line in text.lines() {
        message.extend(encode(line.as_bytes(), encoding, LineEnd::CrLf).into_bytes());
        message.extend_from_slice(b"\r\n");
    }

    let config = Config::builder(host)
        .security(Security::StartTls)
        .credentials(username.clone(), password)
        .build();
    let mut session = Session::new(config);

    println!("\nConnecting...");
    session.establish()?;
    println!("✓ Connected (TLS: {})", session.is_tls());

    session.send_mail(&username, &[to.as_str()], message.as_slice())?;
    println!(
        "✓ Accepted: {}",
        session.last_reply().map(|r| r.last_line()).unwrap_or_default()
    );

    session.quit()?;
    println!("✓ Disconnected");

    Ok(())
}
