//! Basic usage example for the Nauta client
//!
//! This example demonstrates how to:
//! - Create a captive portal session with custom settings
//! - Open an internet session, check the time left and close it again
//! - Save a session to disk and resume it later
//! - Log in to the user portal with a CAPTCHA and read the account data
//!
//! Note: This example needs real Nauta credentials and a network that routes
//! to the ETECSA portals. Set `NAUTA_USERNAME` and `NAUTA_PASSWORD`, and
//! `RUST_LOG=nauta_client=debug` to watch the requests.

use nauta_client::{Credentials, Language, NautaSession, PortalClient, RemainingTime};
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const STATE_FILE: &str = "nauta-session.json";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let username = std::env::var("NAUTA_USERNAME")?;
    let password = std::env::var("NAUTA_PASSWORD")?;
    let credentials = Credentials::new(username, password)?;

    // Example 1: Captive portal session with custom settings
    println!("=== Example 1: Captive Portal ===");
    let mut session = NautaSession::builder(credentials.clone())
        .timeout(Duration::from_secs(30))
        .language(Language::Spanish)
        .build()?;
    println!("✓ Landing page loaded (client IP {})", session.tokens().wlanuserip);

    // Example 2: Resume a saved session, or log in and save it
    println!("\n=== Example 2: Saved Sessions ===");
    if Path::new(STATE_FILE).exists() {
        session.load_state(STATE_FILE)?;
        println!("✓ Session restored from {}", STATE_FILE);
    } else {
        session.login()?;
        session.save_state(STATE_FILE)?;
        println!("✓ Logged in, session saved to {}", STATE_FILE);
    }

    match session.get_user_info() {
        Ok(info) => println!("Credit: {} (expires {})", info.credit, info.expiration_date),
        Err(e) => println!("ℹ No account snapshot: {}", e),
    }
    if let RemainingTime::Clock(clock) = session.get_remaining_time(false)? {
        println!("Time left: {}", clock);
    }

    session.logout()?;
    std::fs::remove_file(STATE_FILE)?;
    println!("✓ Logged out");

    // Example 3: User portal with a human-solved CAPTCHA
    println!("\n=== Example 3: User Portal ===");
    let mut portal = PortalClient::builder(credentials).build()?;
    std::fs::write("captcha.png", portal.get_captcha_image()?)?;
    print!("Enter the text shown in captcha.png: ");
    std::io::stdout().flush()?;
    let mut captcha = String::new();
    std::io::stdin().read_line(&mut captcha)?;

    match portal.submit_captcha(captcha.trim()) {
        Ok(()) => {
            let data = portal.get_account_data(true)?;
            println!("✓ Balance: {}, time left: {}", data.available_balance, data.remaining_time);

            for (period, usage) in portal.get_connection_details()? {
                println!("{}: {} connections, {}", period, usage.summary.connections, usage.summary.total_traffic);
            }
        }
        Err(e) => println!("✗ Failed to log in to the user portal: {}", e),
    }

    Ok(())
}
