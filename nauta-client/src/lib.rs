//! Nauta Client Library
//!
//! Session management for ETECSA's Nauta internet service: the captive portal
//! that opens and closes internet sessions, and the user portal that shows
//! account details and usage history.
//!
//! # Features
//!
//! - Captive portal login, logout and remaining time queries
//! - Account snapshot scraped from the captive portal before login
//! - User portal login with a human-solved CAPTCHA
//! - Connection, recharge and transfer history across every page
//! - Session export and import as JSON, so a session survives restarts
//! - Secure TLS using rustls (no OpenSSL dependencies)
//! - Blocking synchronous API
//! - Well-typed errors using thiserror
//!
//! # Example
//!
//! ```no_run
//! use nauta_client::{NautaSession, RemainingTime};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut session = NautaSession::new("user@nauta.com.cu", "password")?;
//!
//! let left = session.with_login(|session| session.get_remaining_time(false))?;
//! if let RemainingTime::Clock(clock) = left {
//!     println!("Time left: {}", clock);
//! }
//!
//! // Or keep the session open across runs
//! session.login()?;
//! session.save_state("session.json")?;
//! # Ok(())
//! # }
//! ```

mod captive;
mod credentials;
mod error;
mod layout;
mod lifecycle;
mod model;
mod parser;
mod persistence;
mod portal;
mod scrape;
mod transport;
mod usage;

pub use captive::{NautaSession, NautaSessionBuilder};
pub use credentials::{ACCOUNT_DOMAINS, Credentials};
pub use error::NautaError;
pub use lifecycle::Phase;
pub use model::{
    AccountData, AccountSnapshot, AmbientTokens, ConnectionHistory, ConnectionRecord, ConnectionSummary, Language,
    RechargeHistory, RechargeRecord, RechargeSummary, RemainingTime, SessionRecord, TransferHistory, TransferRecord,
    TransferSummary, UsageHistory, UsagePeriod,
};
pub use persistence::{CaptiveState, CaptiveTokens, PortalState, PortalTokens, STATE_VERSION, StateBlob};
pub use portal::{PortalClient, PortalClientBuilder};
