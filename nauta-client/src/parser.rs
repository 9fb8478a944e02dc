//! Pattern-based response parsing utilities

use crate::error::NautaError;
use regex::Regex;
use std::cell::OnceCell;

/// Ways a page can report an application-level failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FailureEncoding {
    /// `alert("...")` dialog emitted by the captive portal
    AlertDialog,
    /// `toastr.error(...)` notification list emitted by the user portal
    ToastrError,
}

/// Parser for Nauta responses with cached regex patterns
#[derive(Clone, Debug)]
pub(crate) struct ResponseParser {
    alert_regex: OnceCell<Regex>,
    toastr_regex: OnceCell<Regex>,
    toastr_details_regex: OnceCell<Regex>,
    session_id_regex: OnceCell<Regex>,
}

impl ResponseParser {
    /// Create a new parser with uninitialized caches
    pub fn new() -> Self {
        Self {
            alert_regex: OnceCell::new(),
            toastr_regex: OnceCell::new(),
            toastr_details_regex: OnceCell::new(),
            session_id_regex: OnceCell::new(),
        }
    }

    fn alert_regex(&self) -> &Regex {
        self.alert_regex
            .get_or_init(|| Regex::new(r#"alert\("(?P<reason>[^"]*?)"\)"#).unwrap())
    }

    fn toastr_regex(&self) -> &Regex {
        self.toastr_regex.get_or_init(|| {
            Regex::new(r#"toastr\.error\('<ul><li class="msg_error">(?P<reason>.*?)<ul>"#).unwrap()
        })
    }

    fn toastr_details_regex(&self) -> &Regex {
        self.toastr_details_regex.get_or_init(|| {
            Regex::new(r#"<li class="sub-message">(?P<details>.*?)</li></ul></li></ul>'"#).unwrap()
        })
    }

    fn session_id_regex(&self) -> &Regex {
        self.session_id_regex
            .get_or_init(|| Regex::new(r"ATTRIBUTE_UUID=(?P<uuid>\w+)&CSRFHW=").unwrap())
    }

    /// Message of the first `alert("...")` call in the page
    pub fn extract_alert(&self, html: &str) -> Option<String> {
        let captures = self.alert_regex().captures(html)?;
        Some(captures.name("reason")?.as_str().to_string())
    }

    /// Main message and detail list of a toastr error notification
    ///
    /// Rendered as `main ("detail", "detail")`, or just `main` without details.
    pub fn extract_toastr_error(&self, html: &str) -> Option<String> {
        let main = self.toastr_regex().captures(html)?.name("reason")?.as_str();

        let details = self
            .toastr_details_regex()
            .captures(html)
            .and_then(|captures| captures.name("details"))
            .map(|details| {
                details
                    .as_str()
                    .split(r#"</li><li class="sub-message">"#)
                    .map(|detail| format!("\"{}\"", detail))
                    .collect::<Vec<_>>()
                    .join(", ")
            });

        Some(match details {
            Some(details) => format!("{} ({})", main, details),
            None => main.to_string(),
        })
    }

    /// Try each encoding in order and return the first failure reason found
    pub fn failure_reason(&self, html: &str, encodings: &[FailureEncoding]) -> Option<String> {
        encodings.iter().find_map(|encoding| match encoding {
            FailureEncoding::AlertDialog => self.extract_alert(html),
            FailureEncoding::ToastrError => self.extract_toastr_error(html),
        })
    }

    /// Session identifier embedded in the captive portal's post-login page
    pub fn extract_session_id(&self, html: &str) -> Result<String, NautaError> {
        self.session_id_regex()
            .captures(html)
            .and_then(|captures| captures.name("uuid"))
            .map(|uuid| uuid.as_str().to_string())
            .ok_or_else(|| NautaError::Parse("session identifier not found in login response".to_string()))
    }
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Convert an `HH:MM:SS` duration into total seconds
pub(crate) fn parse_clock_seconds(text: &str) -> Result<u64, NautaError> {
    let malformed = || NautaError::Parse(format!("expected HH:MM:SS duration, got \"{}\"", text));

    let mut fields = text.trim().split(':');
    let mut next = || -> Result<u64, NautaError> {
        fields
            .next()
            .and_then(|field| field.trim().parse::<u64>().ok())
            .ok_or_else(malformed)
    };
    let (hours, minutes, seconds) = (next()?, next()?, next()?);
    if fields.next().is_some() {
        return Err(malformed());
    }

    hours
        .checked_mul(3600)
        .and_then(|total| total.checked_add(minutes.checked_mul(60)?))
        .and_then(|total| total.checked_add(seconds))
        .ok_or_else(malformed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const TOASTR_PAGE: &str = r#"<script>toastr.error('<ul><li class="msg_error">Se han detectado algunos errores.<ul><li class="sub-message">El código Captcha no es correcto.</li><li class="sub-message">Usuario o contraseña incorrectos.</li></ul></li></ul>');</script>"#;

    #[test]
    fn test_clock_to_seconds() {
        assert_eq!(parse_clock_seconds("01:02:03").unwrap(), 3723);
        assert_eq!(parse_clock_seconds("00:00:00\n").unwrap(), 0);
        assert_eq!(parse_clock_seconds("120:00:01").unwrap(), 432_001);
    }

    #[test]
    fn test_malformed_clock() {
        for text in ["", "01:02", "01:02:03:04", "aa:bb:cc", "errorop"] {
            assert!(
                matches!(parse_clock_seconds(text), Err(NautaError::Parse(_))),
                "{} should not parse",
                text
            );
        }
    }

    #[test]
    fn test_clock_overflow_is_parse_error() {
        assert!(matches!(
            parse_clock_seconds("18446744073709551615:00:00"),
            Err(NautaError::Parse(_))
        ));
        assert!(matches!(
            parse_clock_seconds("5124095576030431:00:16"),
            Err(NautaError::Parse(_))
        ));
        assert!(matches!(
            parse_clock_seconds("00:00:18446744073709551615"),
            Ok(18446744073709551615)
        ));
    }

    #[test]
    fn test_extract_alert() {
        let parser = ResponseParser::new();
        let html = r#"<script type="text/javascript">alert("El usuario ya está conectado.");</script>"#;
        assert_eq!(parser.extract_alert(html).as_deref(), Some("El usuario ya está conectado."));
        assert_eq!(parser.extract_alert("<html></html>"), None);
    }

    #[test]
    fn test_extract_toastr_error() {
        let parser = ResponseParser::new();
        assert_eq!(
            parser.extract_toastr_error(TOASTR_PAGE).as_deref(),
            Some(
                "Se han detectado algunos errores. (\"El código Captcha no es correcto.\", \
                 \"Usuario o contraseña incorrectos.\")"
            )
        );
    }

    #[test]
    fn test_failure_reason_priority() {
        let parser = ResponseParser::new();
        let both = format!(r#"{}<script>alert("second");</script>"#, TOASTR_PAGE);

        let toastr_first = parser.failure_reason(
            &both,
            &[FailureEncoding::ToastrError, FailureEncoding::AlertDialog],
        );
        assert!(toastr_first.unwrap().starts_with("Se han detectado"));

        let alert_first = parser.failure_reason(
            &both,
            &[FailureEncoding::AlertDialog, FailureEncoding::ToastrError],
        );
        assert_eq!(alert_first.as_deref(), Some("second"));

        let alert_only = parser.failure_reason(r#"alert("x")"#, &[FailureEncoding::ToastrError]);
        assert_eq!(alert_only, None);
    }

    #[test]
    fn test_session_id_missing() {
        let parser = ResponseParser::new();
        let result = parser.extract_session_id("<html>online</html>");
        assert!(matches!(result, Err(NautaError::Parse(_))));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(10))]

        #[test]
        fn prop_clock_seconds(hours in 0u64..1000, minutes in 0u64..60, seconds in 0u64..60) {
            let text = format!("{:02}:{:02}:{:02}", hours, minutes, seconds);
            prop_assert_eq!(parse_clock_seconds(&text).unwrap(), hours * 3600 + minutes * 60 + seconds);
        }

        #[test]
        fn prop_session_id_extraction(
            uuid in "[A-F0-9]{32}",
            prefix in "[a-zA-Z0-9 .,!?\\n]{0,100}",
        ) {
            let html = format!(
                r#"{}<script>var urlParam = "ATTRIBUTE_UUID={}&CSRFHW=abc&wlanuserip=10.0.0.1";</script>"#,
                prefix, uuid
            );
            let parser = ResponseParser::new();
            prop_assert_eq!(parser.extract_session_id(&html).unwrap(), uuid);
        }

        #[test]
        fn prop_alert_extraction(reason in "[a-zA-Z0-9 .,!?]{0,80}") {
            let html = format!(r#"<script>alert("{}");</script>"#, reason);
            let parser = ResponseParser::new();
            prop_assert_eq!(parser.extract_alert(&html), Some(reason));
        }
    }
}
