//! Exportable session state and its JSON file format

use crate::error::NautaError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Schema version written by this crate
pub const STATE_VERSION: u32 = 1;

/// Files written without a version field use the first schema
fn unversioned() -> u32 {
    1
}

/// Everything needed to resume a session without logging in again
///
/// `T` carries the tokens specific to each portal. The serialized form is a
/// flat JSON object, e.g. for the captive portal:
///
/// ```json
/// {
///   "version": 1,
///   "username": "user@nauta.com.cu",
///   "cookies": { "JSESSIONID": "..." },
///   "wlanuserip": "10.0.0.1",
///   "CSRFHW": "...",
///   "ATTRIBUTE_UUID": "..."
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateBlob<T> {
    #[serde(default = "unversioned")]
    pub version: u32,
    pub username: String,
    pub cookies: BTreeMap<String, String>,
    #[serde(flatten)]
    pub tokens: T,
}

/// Tokens of a captive portal session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptiveTokens {
    pub wlanuserip: String,
    #[serde(rename = "CSRFHW")]
    pub csrfhw: String,
    #[serde(rename = "ATTRIBUTE_UUID")]
    pub attribute_uuid: String,
}

/// Tokens of a user portal session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortalTokens {
    pub csrf: String,
}

pub type CaptiveState = StateBlob<CaptiveTokens>;
pub type PortalState = StateBlob<PortalTokens>;

impl<T: DeserializeOwned> StateBlob<T> {
    /// Decode a state blob from an arbitrary JSON value
    ///
    /// # Errors
    ///
    /// Returns `NautaError::Validation` if the value is not an object or a
    /// required key is missing or has the wrong type.
    pub fn from_json(value: serde_json::Value) -> Result<Self, NautaError> {
        if !value.is_object() {
            return Err(NautaError::Validation(
                "session data must be a key-value mapping".to_string(),
            ));
        }
        serde_json::from_value(value).map_err(|e| NautaError::Validation(format!("session data is incomplete: {}", e)))
    }
}

impl<T> StateBlob<T> {
    /// Check the blob can be adopted by the account `username`
    pub(crate) fn check_owner(&self, username: &str) -> Result<(), NautaError> {
        if self.version > STATE_VERSION {
            return Err(NautaError::Validation(format!(
                "session data version {} is newer than supported version {}",
                self.version, STATE_VERSION
            )));
        }
        if self.username != username {
            return Err(NautaError::Validation(
                "session data is not for this account".to_string(),
            ));
        }
        Ok(())
    }
}

pub(crate) fn write_state<T: Serialize>(path: &Path, state: &StateBlob<T>) -> Result<(), NautaError> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, state)?;
    writer.flush()?;
    Ok(())
}

pub(crate) fn read_state<T: DeserializeOwned>(path: &Path) -> Result<StateBlob<T>, NautaError> {
    let reader = BufReader::new(File::open(path)?);
    let value: serde_json::Value = serde_json::from_reader(reader)?;
    StateBlob::from_json(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn captive_state() -> CaptiveState {
        StateBlob {
            version: STATE_VERSION,
            username: "user@nauta.com.cu".to_string(),
            cookies: BTreeMap::from([("JSESSIONID".to_string(), "abc".to_string())]),
            tokens: CaptiveTokens {
                wlanuserip: "10.0.0.1".to_string(),
                csrfhw: "csrf".to_string(),
                attribute_uuid: "UUID".to_string(),
            },
        }
    }

    #[test]
    fn test_flat_key_layout() {
        let value = serde_json::to_value(captive_state()).unwrap();
        assert_eq!(value["CSRFHW"], "csrf");
        assert_eq!(value["ATTRIBUTE_UUID"], "UUID");
        assert_eq!(value["wlanuserip"], "10.0.0.1");
        assert_eq!(value["cookies"]["JSESSIONID"], "abc");
        assert_eq!(value["version"], 1);
    }

    #[test]
    fn test_unversioned_blob_loads() {
        let value = json!({
            "username": "user@nauta.com.cu",
            "cookies": {},
            "wlanuserip": "10.0.0.1",
            "CSRFHW": "csrf",
            "ATTRIBUTE_UUID": "UUID"
        });
        let state = CaptiveState::from_json(value).unwrap();
        assert_eq!(state.version, 1);
        assert_eq!(state.tokens.attribute_uuid, "UUID");
    }

    #[test]
    fn test_missing_key_is_validation_error() {
        let value = json!({
            "username": "user@nauta.com.cu",
            "cookies": {},
            "wlanuserip": "10.0.0.1",
            "CSRFHW": "csrf"
        });
        match CaptiveState::from_json(value) {
            Err(NautaError::Validation(message)) => assert!(message.contains("ATTRIBUTE_UUID")),
            other => panic!("Expected Validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_non_mapping_is_validation_error() {
        for value in [json!([1, 2, 3]), json!("text"), json!(null)] {
            assert!(matches!(
                PortalState::from_json(value),
                Err(NautaError::Validation(_))
            ));
        }
    }

    #[test]
    fn test_owner_checks() {
        let state = captive_state();
        assert!(state.check_owner("user@nauta.com.cu").is_ok());
        assert!(matches!(
            state.check_owner("other@nauta.com.cu"),
            Err(NautaError::Validation(_))
        ));

        let future = StateBlob {
            version: STATE_VERSION + 1,
            ..captive_state()
        };
        assert!(matches!(
            future.check_owner("user@nauta.com.cu"),
            Err(NautaError::Validation(_))
        ));
    }

    #[test]
    fn test_file_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("session.json");

        write_state(&path, &captive_state()).unwrap();
        let loaded: CaptiveState = read_state(&path).unwrap();
        assert_eq!(loaded, captive_state());
    }

    #[test]
    fn test_file_with_list_is_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("session.json");
        std::fs::write(&path, "[\"not\", \"a\", \"mapping\"]").unwrap();

        let result = read_state::<CaptiveTokens>(&path);
        assert!(matches!(result, Err(NautaError::Validation(_))));
    }

    #[test]
    fn test_file_with_invalid_json() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("session.json");
        std::fs::write(&path, "{ username: ").unwrap();

        let result = read_state::<PortalTokens>(&path);
        assert!(matches!(result, Err(NautaError::Serialization(_))));
    }
}
