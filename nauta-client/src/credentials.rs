//! Account credentials and username validation

use crate::error::NautaError;
use std::fmt;
use zeroize::Zeroizing;

/// Account domains accepted by both portals
pub const ACCOUNT_DOMAINS: [&str; 2] = ["@nauta.com.cu", "@nauta.co.cu"];

/// Check that an account name ends with one of the accepted domains
pub(crate) fn validate_account(account: &str, field: &str) -> Result<(), NautaError> {
    let has_local_part = ACCOUNT_DOMAINS
        .iter()
        .any(|domain| account.len() > domain.len() && account.ends_with(domain));
    if has_local_part {
        Ok(())
    } else {
        Err(NautaError::Validation(format!(
            "{} is not valid. It must end with {} or {}.",
            field, ACCOUNT_DOMAINS[0], ACCOUNT_DOMAINS[1]
        )))
    }
}

/// Username and password of a Nauta account
///
/// The password is zeroized when the credentials are dropped and is never
/// printed by the `Debug` implementation.
#[derive(Clone)]
pub struct Credentials {
    username: String,
    password: Zeroizing<String>,
}

impl Credentials {
    /// Validate and wrap a username/password pair
    ///
    /// # Errors
    ///
    /// Returns `NautaError::Validation` if the username does not end with
    /// `@nauta.com.cu` or `@nauta.co.cu`.
    ///
    /// # Example
    ///
    /// ```
    /// use nauta_client::Credentials;
    ///
    /// assert!(Credentials::new("user@nauta.com.cu", "secret").is_ok());
    /// assert!(Credentials::new("user@example.com", "secret").is_err());
    /// ```
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Result<Self, NautaError> {
        let username = username.into();
        validate_account(&username, "username")?;
        Ok(Self {
            username,
            password: Zeroizing::new(password.into()),
        })
    }

    /// The account name, including its domain
    pub fn username(&self) -> &str {
        &self.username
    }

    pub(crate) fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_rejects_foreign_domain() {
        let result = Credentials::new("someone@gmail.com", "pw");
        assert!(matches!(result, Err(NautaError::Validation(_))));
    }

    #[test]
    fn test_rejects_bare_domain() {
        let result = Credentials::new("@nauta.com.cu", "pw");
        assert!(matches!(result, Err(NautaError::Validation(_))));
    }

    #[test]
    fn test_debug_hides_password() {
        let credentials = Credentials::new("user@nauta.co.cu", "hunter2").unwrap();
        let printed = format!("{:?}", credentials);
        assert!(printed.contains("user@nauta.co.cu"));
        assert!(!printed.contains("hunter2"));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(10))]

        #[test]
        fn prop_accepted_domains_validate(
            local in "[a-z][a-z0-9._]{0,20}",
            domain in prop::sample::select(ACCOUNT_DOMAINS.to_vec()),
        ) {
            let username = format!("{}{}", local, domain);
            let credentials = Credentials::new(username.clone(), "pw");
            prop_assert!(credentials.is_ok());
            let credentials = credentials.unwrap();
            prop_assert_eq!(credentials.username(), username.as_str());
        }
    }
}
