//! User portal client (www.portal.nauta.cu)

use crate::credentials::{self, Credentials};
use crate::error::NautaError;
use crate::layout;
use crate::lifecycle::{Lifecycle, Phase};
use crate::model::{AccountData, ConnectionHistory, Language, RechargeHistory, TransferHistory};
use crate::parser::{FailureEncoding, ResponseParser};
use crate::persistence::{self, PortalState, PortalTokens, STATE_VERSION, StateBlob};
use crate::scrape;
use crate::transport::{Page, Transport, TransportConfig};
use crate::usage::{self, Connections, Recharges, Transfers, USER_AREA};
use scraper::Html;
use std::path::Path;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://www.portal.nauta.cu/";
const LOGIN_PATH: [&str; 2] = ["user", "login"];
const CAPTCHA_PATH: [&str; 1] = ["captcha"];
const USER_INFO_PATH: [&str; 2] = [USER_AREA, "user_info"];
const CHANGE_PASSWORD_PATH: [&str; 2] = [USER_AREA, "change_password"];
const CHANGE_EMAIL_PASSWORD_PATH: [&str; 2] = ["email", "change_password"];
const TRANSFER_BALANCE_PATH: [&str; 2] = [USER_AREA, "transfer_balance"];

/// Failure encodings used by the user portal, in priority order
const PORTAL_FAILURES: &[FailureEncoding] = &[FailureEncoding::ToastrError, FailureEncoding::AlertDialog];

/// Accepted length of a recharge code
const RECHARGE_CODE_LENGTH: std::ops::RangeInclusive<usize> = 12..=16;

/// A client for the Nauta user portal
///
/// Logging in requires a CAPTCHA: fetch the image with
/// [`get_captcha_image`](Self::get_captcha_image), have a human read it and
/// pass the text to [`submit_captcha`](Self::submit_captcha).
///
/// # Example
///
/// ```no_run
/// use nauta_client::{Credentials, PortalClient};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut portal = PortalClient::builder(Credentials::new("user@nauta.com.cu", "password")?).build()?;
///
/// std::fs::write("captcha.png", portal.get_captcha_image()?)?;
/// let mut captcha = String::new();
/// std::io::stdin().read_line(&mut captcha)?;
/// portal.submit_captcha(captcha.trim())?;
///
/// let data = portal.get_account_data(true)?;
/// println!("Balance: {}", data.available_balance);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct PortalClient {
    transport: Transport,
    parser: ResponseParser,
    credentials: Credentials,
    language: Language,
    csrf: String,
    /// Authenticated sessions cache the last account data page
    lifecycle: Lifecycle<Option<AccountData>>,
}

impl PortalClient {
    /// Create a client with default settings
    pub fn new(username: &str, password: &str) -> Result<Self, NautaError> {
        Self::builder(Credentials::new(username, password)?).build()
    }

    pub fn builder(credentials: Credentials) -> PortalClientBuilder {
        PortalClientBuilder::new(credentials)
    }

    pub fn username(&self) -> &str {
        self.credentials.username()
    }

    pub fn phase(&self) -> Phase {
        self.lifecycle.phase()
    }

    pub fn is_logged_in(&self) -> bool {
        self.phase() == Phase::Authenticated
    }

    /// Anti-forgery token sent with every form
    pub fn csrf(&self) -> &str {
        &self.csrf
    }

    /// Download the CAPTCHA image bound to the current cookies
    pub fn get_captcha_image(&self) -> Result<Vec<u8>, NautaError> {
        self.transport.get_bytes(&CAPTCHA_PATH, "Get captcha")
    }

    /// Log in with the credentials and the CAPTCHA text read by a human
    ///
    /// # Errors
    ///
    /// * `State` - already logged in
    /// * `Transport` - non-success HTTP status
    /// * `Runtime` - the portal rejected the form and said why
    /// * `Parse` - the portal stayed on the login page without an error message
    pub fn submit_captcha(&mut self, captcha: &str) -> Result<(), NautaError> {
        self.lifecycle.require_unauthenticated("submit captcha")?;

        let form = [
            ("csrf", self.csrf.as_str()),
            ("login_user", self.credentials.username()),
            ("password_user", self.credentials.password()),
            ("captcha", captcha),
            ("btn_submit", ""),
        ];
        let page = self.transport.post_form(&LOGIN_PATH, &form, "Submit captcha")?;

        let login_path = self.transport.endpoint(&LOGIN_PATH)?;
        if page.url.path().starts_with(login_path.path()) {
            return match self.parser.failure_reason(&page.body, PORTAL_FAILURES) {
                Some(reason) => {
                    tracing::warn!(username = self.username(), "Login rejected: {}", reason);
                    Err(NautaError::Runtime(format!("Failed to submit CAPTCHA code: {}", reason)))
                }
                None => Err(NautaError::Parse(
                    "login page returned without an error message".to_string(),
                )),
            };
        }

        self.lifecycle.authenticate(None);
        tracing::info!(username = self.username(), "Logged in to user portal");
        Ok(())
    }

    /// Forget the portal session locally
    ///
    /// The user portal has no logout endpoint; cookies and cached account
    /// data are dropped and the login page is fetched again for a new token.
    ///
    /// # Errors
    ///
    /// If the login page cannot be fetched the session is left as it was,
    /// cookies included.
    pub fn logout(&mut self) -> Result<(), NautaError> {
        self.lifecycle.require_authenticated("log out")?;

        let cookies = self.transport.cookies().snapshot();
        self.transport.cookies().clear();
        let csrf = match bootstrap(&self.transport, self.language) {
            Ok(csrf) => csrf,
            Err(e) => {
                self.transport.cookies().restore(cookies);
                return Err(e);
            }
        };

        self.csrf = csrf;
        self.lifecycle.terminate();
        tracing::info!(username = self.username(), "Left user portal session");
        Ok(())
    }

    /// Account details, fetched when `refresh` is set or nothing is cached
    pub fn get_account_data(&mut self, refresh: bool) -> Result<&AccountData, NautaError> {
        let cached = self.lifecycle.require_authenticated("get account data")?.is_some();
        if refresh || !cached {
            let page = self.transport.get(&USER_INFO_PATH, "Get account info")?;
            let data = parse_account_data(&page.body)?;
            *self.lifecycle.require_authenticated_mut("get account data")? = Some(data);
        }

        self.lifecycle
            .require_authenticated("get account data")?
            .as_ref()
            .ok_or_else(|| NautaError::Unavailable("account data was not fetched".to_string()))
    }

    /// Every connection of every period the portal offers
    pub fn get_connection_details(&self) -> Result<ConnectionHistory, NautaError> {
        self.lifecycle.require_authenticated("get connection details")?;
        usage::fetch_history::<Connections>(&self.transport, &self.csrf)
    }

    /// Every recharge of every period the portal offers
    pub fn get_recharge_details(&self) -> Result<RechargeHistory, NautaError> {
        self.lifecycle.require_authenticated("get recharge details")?;
        usage::fetch_history::<Recharges>(&self.transport, &self.csrf)
    }

    /// Every balance transfer of every period the portal offers
    pub fn get_transfer_details(&self) -> Result<TransferHistory, NautaError> {
        self.lifecycle.require_authenticated("get transfer details")?;
        usage::fetch_history::<Transfers>(&self.transport, &self.csrf)
    }

    /// Apply a prepaid recharge code to the account
    ///
    /// # Errors
    ///
    /// Returns `Validation` unless the code is 12 to 16 ASCII digits.
    pub fn recharge_account(&self, recharge_code: &str) -> Result<(), NautaError> {
        self.lifecycle.require_authenticated("recharge account")?;
        if !recharge_code.chars().all(|c| c.is_ascii_digit()) {
            return Err(NautaError::Validation("recharge_code chars must be all digits.".to_string()));
        }
        if !RECHARGE_CODE_LENGTH.contains(&recharge_code.len()) {
            return Err(NautaError::Validation(
                "recharge_code must be between 12 and 16 digits long.".to_string(),
            ));
        }

        let form = [
            ("csrf", self.csrf.as_str()),
            ("recharge_code", recharge_code),
            ("btn_submit", ""),
        ];
        let page = self.transport.post_form(&LOGIN_PATH, &form, "Post recharge code")?;
        self.check_rejection(&page, "Failed to post recharge code")
    }

    /// Change the account password
    ///
    /// The credentials held by this client keep the old password.
    pub fn change_account_password(&self, new_password: &str) -> Result<(), NautaError> {
        self.lifecycle.require_authenticated("change account password")?;
        let form = [
            ("csrf", self.csrf.as_str()),
            ("old_password", self.credentials.password()),
            ("new_password", new_password),
            ("repeat_new_password", new_password),
            ("btn_submit", ""),
        ];
        let page = self.transport.post_form(&CHANGE_PASSWORD_PATH, &form, "Change password")?;
        self.check_rejection(&page, "Failed to change account password")
    }

    /// Change the password of the account's email box
    pub fn change_email_password(&self, old_password: &str, new_password: &str) -> Result<(), NautaError> {
        self.lifecycle.require_authenticated("change email password")?;
        let form = [
            ("csrf", self.csrf.as_str()),
            ("old_password", old_password),
            ("new_password", new_password),
            ("repeat_new_password", new_password),
            ("btn_submit", ""),
        ];
        let page = self
            .transport
            .post_form(&CHANGE_EMAIL_PASSWORD_PATH, &form, "Change email password")?;
        self.check_rejection(&page, "Failed to change email password")
    }

    /// Move `amount` of balance to another Nauta account
    ///
    /// # Errors
    ///
    /// Returns `Validation` for a target outside the accepted domains or an
    /// amount that is not a positive finite number.
    pub fn transfer_balance(&self, target_account: &str, amount: f64) -> Result<(), NautaError> {
        self.lifecycle.require_authenticated("transfer balance")?;
        credentials::validate_account(target_account, "target_account")?;
        if !amount.is_finite() || amount <= 0.0 {
            return Err(NautaError::Validation("amount must be a positive number.".to_string()));
        }

        let amount = format!("{:.2}", amount);
        let form = [
            ("csrf", self.csrf.as_str()),
            ("transfer", amount.as_str()),
            ("password_user", self.credentials.password()),
            ("id_cuenta", target_account),
            ("action", "checkdata"),
        ];
        let page = self.transport.post_form(&TRANSFER_BALANCE_PATH, &form, "Transfer balance")?;
        self.check_rejection(&page, "Failed to transfer balance")
    }

    fn check_rejection(&self, page: &Page, action: &str) -> Result<(), NautaError> {
        match self.parser.failure_reason(&page.body, &[FailureEncoding::ToastrError]) {
            Some(reason) => {
                tracing::warn!(username = self.username(), "{}: {}", action, reason);
                Err(NautaError::Runtime(format!("{}: {}", action, reason)))
            }
            None => Ok(()),
        }
    }

    /// Snapshot of cookies and the anti-forgery token
    pub fn export_state(&self) -> Result<PortalState, NautaError> {
        self.lifecycle.require_authenticated("export session data")?;
        Ok(StateBlob {
            version: STATE_VERSION,
            username: self.username().to_string(),
            cookies: self.transport.cookies().snapshot(),
            tokens: PortalTokens {
                csrf: self.csrf.clone(),
            },
        })
    }

    /// Adopt a previously exported session without solving a CAPTCHA
    pub fn import_state(&mut self, state: PortalState) -> Result<(), NautaError> {
        self.lifecycle.require_unauthenticated("import session data")?;
        state.check_owner(self.username())?;

        self.transport.cookies().restore(state.cookies);
        self.csrf = state.tokens.csrf;
        self.lifecycle.authenticate(None);
        tracing::info!(username = self.username(), "User portal session restored");
        Ok(())
    }

    pub fn save_state(&self, path: impl AsRef<Path>) -> Result<(), NautaError> {
        persistence::write_state(path.as_ref(), &self.export_state()?)
    }

    pub fn load_state(&mut self, path: impl AsRef<Path>) -> Result<(), NautaError> {
        self.lifecycle.require_unauthenticated("import session data")?;
        let state = persistence::read_state(path.as_ref())?;
        self.import_state(state)
    }
}

/// Fetch the localized login page and capture its anti-forgery token
fn bootstrap(transport: &Transport, language: Language) -> Result<String, NautaError> {
    let landing = [LOGIN_PATH[0], LOGIN_PATH[1], language.portal_code()];
    let page = transport.get(&landing, "Init session")?;
    let [csrf] = scrape::extract(&Html::parse_document(&page.body), &layout::PORTAL_TOKENS)?;
    Ok(csrf)
}

fn parse_account_data(html: &str) -> Result<AccountData, NautaError> {
    let document = Html::parse_document(html);
    let [
        username,
        blocking_date,
        elimination_date,
        account_type,
        service_type,
        available_balance,
        remaining_time,
        email_account,
    ] = scrape::extract(&document, &layout::ACCOUNT_DATA)?;

    Ok(AccountData {
        username,
        blocking_date,
        elimination_date,
        account_type,
        service_type,
        available_balance,
        remaining_time,
        email_account,
    })
}

/// Builder for configuring a [`PortalClient`]
#[derive(Debug)]
pub struct PortalClientBuilder {
    credentials: Credentials,
    transport: TransportConfig,
    language: Language,
}

impl PortalClientBuilder {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            transport: TransportConfig::default(),
            language: Language::default(),
        }
    }

    pub fn base_url(mut self, url: impl reqwest::IntoUrl) -> Result<Self, NautaError> {
        self.transport.base_url(url)?;
        Ok(self)
    }

    /// Set a custom HTTP client builder
    ///
    /// The cookie provider and redirect policy are always overridden.
    pub fn client_builder(mut self, builder: reqwest::blocking::ClientBuilder) -> Self {
        self.transport.client_builder = Some(builder);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.transport.timeout = Some(timeout);
        self
    }

    pub fn language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }

    /// Build the client, fetching the localized login page
    pub fn build(self) -> Result<PortalClient, NautaError> {
        let transport = self.transport.build(DEFAULT_BASE_URL)?;
        let csrf = bootstrap(&transport, self.language)?;

        Ok(PortalClient {
            transport,
            parser: ResponseParser::new(),
            credentials: self.credentials,
            language: self.language,
            csrf,
            lifecycle: Lifecycle::Unauthenticated,
        })
    }
}
