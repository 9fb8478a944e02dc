//! Records scraped from the portals

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Interface language requested from the portals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Language {
    #[default]
    English,
    Spanish,
}

impl Language {
    /// Value of the `lang` form field on the captive portal
    pub fn captive_code(self) -> &'static str {
        match self {
            Language::English => "en_US",
            Language::Spanish => "es_ES",
        }
    }

    /// Path segment selecting the user portal language
    pub fn portal_code(self) -> &'static str {
        match self {
            Language::English => "en-en",
            Language::Spanish => "es-es",
        }
    }
}

/// Values embedded in the captive portal landing page that every later request needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmbientTokens {
    /// Client IP marker (`wlanuserip`)
    pub wlanuserip: String,
    /// Anti-forgery token (`CSRFHW`)
    pub csrfhw: String,
}

/// One previous connection listed on the captive portal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub start: String,
    pub end: String,
    pub duration: String,
}

/// Account information shown by the captive portal before login
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub account_state: String,
    pub credit: String,
    pub expiration_date: String,
    pub access_areas: String,
    pub sessions: Vec<SessionRecord>,
}

/// Time left on the account, as reported or converted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemainingTime {
    /// `HH:MM:SS` text as returned by the server
    Clock(String),
    /// Total seconds
    Seconds(u64),
}

/// Account details from the user portal's info page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountData {
    pub username: String,
    pub blocking_date: String,
    pub elimination_date: String,
    pub account_type: String,
    pub service_type: String,
    pub available_balance: String,
    pub remaining_time: String,
    pub email_account: String,
}

/// Summary counters and every listed row of one year-month period
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsagePeriod<S, R> {
    pub summary: S,
    pub rows: Vec<R>,
}

/// Usage periods keyed by their `year_month` value
pub type UsageHistory<S, R> = BTreeMap<String, UsagePeriod<S, R>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSummary {
    pub connections: u32,
    pub total_time: String,
    pub total_import: String,
    pub upload_traffic: String,
    pub download_traffic: String,
    pub total_traffic: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionRecord {
    pub start_datetime: String,
    pub end_datetime: String,
    pub duration: String,
    pub upload_traffic: String,
    pub download_traffic: String,
    pub import: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RechargeSummary {
    pub recharges: u32,
    pub total_import: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RechargeRecord {
    pub datetime: String,
    pub import: String,
    pub channel: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferSummary {
    pub transfers: u32,
    pub total_import: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRecord {
    pub datetime: String,
    pub import: String,
    pub target_account: String,
}

pub type ConnectionHistory = UsageHistory<ConnectionSummary, ConnectionRecord>;
pub type RechargeHistory = UsageHistory<RechargeSummary, RechargeRecord>;
pub type TransferHistory = UsageHistory<TransferSummary, TransferRecord>;
