//! Connect to the daemon and look up a printer.
//!
//! Demonstrates:
//! - Building a bridge with a certificate
//! - Waiting for the bootstrap to finish
//! - Reading cached preemptive results
//! - Calling an operation with a continuation
//!
//! Usage:
//!   cargo run --example 001_find_printer -- zebra
//!   cargo run --example 001_find_printer -- zebra --cert site.pem
//!   cargo run --example 001_find_printer -- zebra --debug

mod common;

// ============================================================================
// Imports
// ============================================================================

use anyhow::Context;
use common::Args;
use qz_bridge::{Argument, Bridge, Continuation};
use tokio::sync::oneshot;

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let args = Args::parse();
    common::init_logging(args.debug);

    if let Err(e) = run(args).await {
        eprintln!("\n[ERROR] {e:#}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    println!("=== 001: Find Printer ===\n");

    let printer = std::env::args()
        .skip(1)
        .find(|a| !a.starts_with("--"))
        .unwrap_or_else(|| "zebra".to_string());

    // ========================================================================
    // Connect
    // ========================================================================

    println!("[1] Connecting to {}...", args.host);

    let bridge = Bridge::builder()
        .host(args.host.clone())
        .secure_page(args.secure)
        .certificate(args.certificate_pem()?)
        .connect()?;

    bridge
        .wait_ready()
        .await
        .context("print daemon did not become ready")?;

    let remote = bridge.remote();
    println!("    ✓ Ready");
    println!("    Version: {:?}", remote.cached("getVersion"));
    println!("    Active: {:?}\n", remote.cached("isActive"));

    // ========================================================================
    // Find Printer
    // ========================================================================

    println!("[2] Finding printer {printer:?}...");

    let (tx, rx) = oneshot::channel();
    let tx = std::sync::Mutex::new(Some(tx));

    remote.call(
        "findPrinter",
        vec![
            Argument::value(printer),
            Continuation::unnamed(move |payload| {
                if let Some(tx) = tx.lock().ok().and_then(|mut t| t.take()) {
                    let _ = tx.send(payload.clone());
                }
                Ok(())
            })
            .into(),
        ],
    )?;

    let payload = rx.await.context("bridge closed before the printer was found")?;
    match payload.exception() {
        Some(exception) => println!("    ✗ {}", exception.localized_message()),
        None => println!("    ✓ Found: {:?}\n", payload.first()),
    }

    common::wait_for_exit(args.no_wait).await;
    bridge.shutdown().await;
    Ok(())
}
