//! Follow connection status and bridge events.
//!
//! Demonstrates:
//! - Registering an event handler
//! - Registering page-level callbacks
//! - Redeploying after the daemon went away
//!
//! Usage:
//!   cargo run --example 002_status_events
//!   cargo run --example 002_status_events -- --host 192.168.1.20 --debug

mod common;

// ============================================================================
// Imports
// ============================================================================

use common::Args;
use qz_bridge::{Bridge, BridgeEvent, ConnectionStatus};

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
    println!("=== 002: Status and Events ===\n");

    let bridge = Bridge::builder()
        .host(args.host.clone())
        .certificate(args.certificate_pem()?)
        .fallback(|| println!("    ! Daemon not found, please start it"))
        .on_event(|event| match event {
            BridgeEvent::Ready => println!("    [event] ready"),
            other => println!("    [event] {other:?}"),
        })
        .connect()?;

    bridge.register_global("qzDoneFinding", |payload| {
        println!("    [qzDoneFinding] {:?}", payload.args());
        Ok(())
    });

    let mut status = bridge.subscribe();
    loop {
        let current = status.borrow_and_update().clone();
        println!("[status] {current:?}");

        match current {
            ConnectionStatus::Ready => {
                bridge.remote().call("findPrinters", vec![])?;
                break;
            }
            ConnectionStatus::NoConnection { .. } if !args.no_wait => {
                tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                bridge.reconnect()?;
            }
            s if !s.is_pending() => break,
            _ => {}
        }

        status.changed().await?;
    }

    common::wait_for_exit(args.no_wait).await;
    bridge.shutdown().await;
    Ok(())
}
