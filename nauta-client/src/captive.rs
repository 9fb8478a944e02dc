//! Captive portal session (secure.etecsa.net)

use crate::credentials::Credentials;
use crate::error::NautaError;
use crate::layout;
use crate::lifecycle::{Lifecycle, Phase};
use crate::model::{AccountSnapshot, AmbientTokens, Language, RemainingTime, SessionRecord};
use crate::parser::{self, FailureEncoding, ResponseParser};
use crate::persistence::{self, CaptiveState, CaptiveTokens, STATE_VERSION, StateBlob};
use crate::scrape;
use crate::transport::{Transport, TransportConfig};
use scraper::Html;
use std::path::Path;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://secure.etecsa.net:8443/";
const LOGIN_ENDPOINT: &str = "LoginServlet";
const QUERY_ENDPOINT: &str = "EtecsaQueryServlet";
const LOGOUT_ENDPOINT: &str = "LogoutServlet";

/// Present in the final URL of a successful login
const LOGIN_SUCCESS_FRAGMENT: &str = "online.do";

/// Present in the body of a successful logout
const LOGOUT_SUCCESS_MARKER: &str = "SUCCESS";

/// Failure encodings used by the captive portal, in priority order
const CAPTIVE_FAILURES: &[FailureEncoding] = &[FailureEncoding::AlertDialog];

/// A session against the captive portal
///
/// Construction fetches the landing page and captures the ambient tokens.
/// After that the session moves between `Unauthenticated` and `Authenticated`
/// through [`login`](Self::login) / [`logout`](Self::logout), or through
/// [`import_state`](Self::import_state) to resume a saved session.
///
/// # Example
///
/// ```no_run
/// use nauta_client::{Credentials, NautaSession, RemainingTime};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let credentials = Credentials::new("user@nauta.com.cu", "password")?;
/// let mut session = NautaSession::builder(credentials).build()?;
///
/// session.login()?;
/// if let RemainingTime::Seconds(left) = session.get_remaining_time(true)? {
///     println!("{} seconds left", left);
/// }
/// session.logout()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct NautaSession {
    transport: Transport,
    parser: ResponseParser,
    credentials: Credentials,
    language: Language,
    tokens: AmbientTokens,
    user_info: Option<AccountSnapshot>,
    /// Authenticated sessions carry the server-issued `ATTRIBUTE_UUID`
    lifecycle: Lifecycle<String>,
}

impl NautaSession {
    /// Create a session with default settings
    ///
    /// # Errors
    ///
    /// Fails with `Validation` for a malformed username, `Transport` if the
    /// landing page cannot be fetched, and `Parse` if it lacks the tokens.
    pub fn new(username: &str, password: &str) -> Result<Self, NautaError> {
        Self::builder(Credentials::new(username, password)?).build()
    }

    /// Create a builder for configuring the session
    pub fn builder(credentials: Credentials) -> NautaSessionBuilder {
        NautaSessionBuilder::new(credentials)
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

    /// Tokens captured from the landing page (or restored from saved state)
    pub fn tokens(&self) -> &AmbientTokens {
        &self.tokens
    }

    /// The server-issued session identifier while authenticated
    pub fn session_id(&self) -> Option<&str> {
        self.lifecycle.require_authenticated("read session id").ok().map(String::as_str)
    }

    /// Log in with the session's credentials
    ///
    /// # Errors
    ///
    /// * `State` - already logged in
    /// * `Transport` - non-success HTTP status
    /// * `Runtime` - the portal rejected the login and said why
    /// * `Parse` - the response neither reached the success page nor carried
    ///   a recognizable failure message
    pub fn login(&mut self) -> Result<(), NautaError> {
        self.lifecycle.require_unauthenticated("log in")?;

        let form = [
            ("username", self.credentials.username()),
            ("password", self.credentials.password()),
            ("wlanuserip", self.tokens.wlanuserip.as_str()),
            ("CSRFHW", self.tokens.csrfhw.as_str()),
            ("lang", self.language.captive_code()),
        ];
        let page = self.transport.post_form(&[LOGIN_ENDPOINT], &form, "Login")?;

        if !page.url.as_str().contains(LOGIN_SUCCESS_FRAGMENT) {
            return match self.parser.failure_reason(&page.body, CAPTIVE_FAILURES) {
                Some(reason) => {
                    tracing::warn!(username = self.username(), "Login rejected: {}", reason);
                    Err(NautaError::Runtime(format!("Login failure reason: \"{}\"", reason)))
                }
                None => Err(NautaError::Parse(format!(
                    "login response from {} has no success page and no failure message",
                    page.url
                ))),
            };
        }

        let session_id = self.parser.extract_session_id(&page.body)?;
        self.lifecycle.authenticate(session_id);
        tracing::info!(username = self.username(), "Logged in");
        Ok(())
    }

    /// End the session on the server
    ///
    /// The cookie jar is kept so the same instance can log in again.
    ///
    /// # Errors
    ///
    /// * `State` - not logged in
    /// * `Transport` - non-success HTTP status
    /// * `Runtime` - the body lacks the success marker; carries the raw body,
    ///   and the session stays authenticated
    pub fn logout(&mut self) -> Result<(), NautaError> {
        let session_id = self.lifecycle.require_authenticated("log out")?;

        let query = [
            ("username", self.credentials.username()),
            ("wlanuserip", self.tokens.wlanuserip.as_str()),
            ("CSRFHW", self.tokens.csrfhw.as_str()),
            ("ATTRIBUTE_UUID", session_id.as_str()),
        ];
        let page = self.transport.get_with_query(&[LOGOUT_ENDPOINT], &query, "Logout")?;

        if !page.body.contains(LOGOUT_SUCCESS_MARKER) {
            return Err(NautaError::Runtime(format!("Logout failure reason: \"{}\"", page.body)));
        }

        self.lifecycle.terminate();
        tracing::info!(username = self.username(), "Logged out");
        Ok(())
    }

    /// Log in, run `f`, then log out whatever `f` returned
    ///
    /// An error from `f` takes precedence over an error from logging out.
    pub fn with_login<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, NautaError>,
    ) -> Result<T, NautaError> {
        self.login()?;
        let outcome = f(self);
        let logout = if self.is_logged_in() { self.logout() } else { Ok(()) };
        match (outcome, logout) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(logout_error)) => {
                tracing::warn!(
                    username = self.username(),
                    "Logout after failed operation also failed: {}",
                    logout_error
                );
                Err(e)
            }
        }
    }

    /// Account information captured when the session was built
    ///
    /// # Errors
    ///
    /// * `State` - not logged in
    /// * `Unavailable` - the builder disabled `acquire_user_info`
    pub fn get_user_info(&self) -> Result<&AccountSnapshot, NautaError> {
        self.lifecycle.require_authenticated("get user info")?;
        self.user_info.as_ref().ok_or_else(|| {
            NautaError::Unavailable("no user information since acquire_user_info was disabled".to_string())
        })
    }

    /// Time left on the account
    ///
    /// With `in_seconds` the server's `HH:MM:SS` text is converted into total
    /// seconds.
    pub fn get_remaining_time(&self, in_seconds: bool) -> Result<RemainingTime, NautaError> {
        let session_id = self.lifecycle.require_authenticated("get remaining time")?;

        let form = [
            ("op", "getLeftTime"),
            ("username", self.credentials.username()),
            ("wlanuserip", self.tokens.wlanuserip.as_str()),
            ("CSRFHW", self.tokens.csrfhw.as_str()),
            ("ATTRIBUTE_UUID", session_id.as_str()),
        ];
        let page = self.transport.post_form(&[QUERY_ENDPOINT], &form, "Get remaining time")?;
        let clock = page.body.trim().to_string();

        if in_seconds {
            Ok(RemainingTime::Seconds(parser::parse_clock_seconds(&clock)?))
        } else {
            Ok(RemainingTime::Clock(clock))
        }
    }

    /// Snapshot of cookies and tokens for resuming this session later
    pub fn export_state(&self) -> Result<CaptiveState, NautaError> {
        let session_id = self.lifecycle.require_authenticated("export session data")?;
        Ok(StateBlob {
            version: STATE_VERSION,
            username: self.username().to_string(),
            cookies: self.transport.cookies().snapshot(),
            tokens: CaptiveTokens {
                wlanuserip: self.tokens.wlanuserip.clone(),
                csrfhw: self.tokens.csrfhw.clone(),
                attribute_uuid: session_id.clone(),
            },
        })
    }

    /// Adopt a previously exported session without logging in
    ///
    /// # Errors
    ///
    /// * `State` - already logged in
    /// * `Validation` - the state belongs to another account or comes from a
    ///   newer schema
    pub fn import_state(&mut self, state: CaptiveState) -> Result<(), NautaError> {
        self.lifecycle.require_unauthenticated("import session data")?;
        state.check_owner(self.username())?;

        self.transport.cookies().restore(state.cookies);
        self.tokens = AmbientTokens {
            wlanuserip: state.tokens.wlanuserip,
            csrfhw: state.tokens.csrfhw,
        };
        self.lifecycle.authenticate(state.tokens.attribute_uuid);
        tracing::info!(username = self.username(), "Session restored");
        Ok(())
    }

    /// Write [`export_state`](Self::export_state) to a JSON file
    pub fn save_state(&self, path: impl AsRef<Path>) -> Result<(), NautaError> {
        persistence::write_state(path.as_ref(), &self.export_state()?)
    }

    /// Read a JSON file written by [`save_state`](Self::save_state) and import it
    pub fn load_state(&mut self, path: impl AsRef<Path>) -> Result<(), NautaError> {
        self.lifecycle.require_unauthenticated("import session data")?;
        let state = persistence::read_state(path.as_ref())?;
        self.import_state(state)
    }
}

/// Fetch the landing page and capture the ambient tokens
fn bootstrap(transport: &Transport) -> Result<AmbientTokens, NautaError> {
    let page = transport.get(&[], "Init session")?;
    let document = Html::parse_document(&page.body);
    let [wlanuserip, csrfhw] = scrape::extract(&document, &layout::CAPTIVE_TOKENS)?;
    Ok(AmbientTokens { wlanuserip, csrfhw })
}

/// Query the account page the portal serves to unauthenticated users
fn acquire_user_info(
    transport: &Transport,
    parser: &ResponseParser,
    credentials: &Credentials,
    tokens: &AmbientTokens,
    language: Language,
) -> Result<AccountSnapshot, NautaError> {
    let form = [
        ("username", credentials.username()),
        ("password", credentials.password()),
        ("wlanuserip", tokens.wlanuserip.as_str()),
        ("CSRFHW", tokens.csrfhw.as_str()),
        ("lang", language.captive_code()),
    ];
    let page = transport.post_form(&[QUERY_ENDPOINT], &form, "Get user data")?;

    if let Some(reason) = parser.failure_reason(&page.body, CAPTIVE_FAILURES) {
        return Err(NautaError::Runtime(format!(
            "Failed to get user data (wrong credentials or insufficient balance): \"{}\"",
            reason
        )));
    }

    parse_account_snapshot(&page.body)
}

fn parse_account_snapshot(html: &str) -> Result<AccountSnapshot, NautaError> {
    let document = Html::parse_document(html);
    let [account_state, credit, expiration_date, access_areas] =
        scrape::extract(&document, &layout::ACCOUNT_SNAPSHOT)?;

    let cells = scrape::texts(&document, layout::SESSION_HISTORY_CELLS)?;
    let sessions = scrape::rows(&cells, layout::SESSION_ROW_STRIDE, "session history")?
        .into_iter()
        .map(|row| match row {
            [start, end, duration] => Ok(SessionRecord {
                start: start.clone(),
                end: end.clone(),
                duration: duration.clone(),
            }),
            _ => Err(NautaError::Parse("malformed session history row".to_string())),
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(AccountSnapshot {
        account_state,
        credit,
        expiration_date,
        access_areas,
        sessions,
    })
}

/// Builder for configuring a [`NautaSession`]
///
/// # Example
///
/// ```no_run
/// use nauta_client::{Credentials, Language, NautaSession};
/// use std::time::Duration;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let session = NautaSession::builder(Credentials::new("user@nauta.co.cu", "password")?)
///     .language(Language::Spanish)
///     .timeout(Duration::from_secs(20))
///     .acquire_user_info(false)
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct NautaSessionBuilder {
    credentials: Credentials,
    transport: TransportConfig,
    language: Language,
    acquire_user_info: bool,
}

impl NautaSessionBuilder {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            transport: TransportConfig::default(),
            language: Language::default(),
            acquire_user_info: true,
        }
    }

    /// Set a custom base URL, e.g. a mock server
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

    /// Total timeout of each request
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.transport.timeout = Some(timeout);
        self
    }

    pub fn language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }

    /// Whether to fetch the account snapshot while building (default: true)
    pub fn acquire_user_info(mut self, acquire: bool) -> Self {
        self.acquire_user_info = acquire;
        self
    }

    /// Build the session, performing the bootstrap round-trips
    pub fn build(self) -> Result<NautaSession, NautaError> {
        let transport = self.transport.build(DEFAULT_BASE_URL)?;
        let parser = ResponseParser::new();

        let tokens = bootstrap(&transport)?;
        tracing::debug!(wlanuserip = %tokens.wlanuserip, "Captured ambient tokens");

        let user_info = if self.acquire_user_info {
            Some(acquire_user_info(
                &transport,
                &parser,
                &self.credentials,
                &tokens,
                self.language,
            )?)
        } else {
            None
        };

        Ok(NautaSession {
            transport,
            parser,
            credentials: self.credentials,
            language: self.language,
            tokens,
            user_info,
            lifecycle: Lifecycle::Unauthenticated,
        })
    }
}
