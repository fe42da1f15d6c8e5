// ── Config flow ──
//
// Turns a user-supplied API key into a config entry: validate the key
// against the live API, learn the device id, and either create the entry
// or re-present the form with a base error.

use std::collections::BTreeMap;

use secrecy::SecretString;
use serde::Serialize;
use tracing::{debug, error};

use crate::client::StatusClient;

/// Title given to every created entry.
pub const ENTRY_TITLE: &str = "PoolCop";
/// The flow's only step.
pub const STEP_USER: &str = "user";
/// Key under which form-wide errors are reported.
pub const BASE_ERROR: &str = "base";

/// Why the form is shown again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display, strum::AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FlowError {
    CannotConnect,
    InvalidAuth,
    Unknown,
}

/// What the user typed.
#[derive(Debug, Clone)]
pub struct UserInput {
    pub api_key: SecretString,
}

/// Title and unique id of a validated key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    pub title: String,
    pub unique_id: String,
}

#[derive(Debug)]
pub enum FlowResult {
    /// Ask for input, optionally flagging errors from the previous attempt.
    Form {
        step_id: &'static str,
        errors: BTreeMap<&'static str, FlowError>,
    },
    /// Validation succeeded.
    CreateEntry {
        title: String,
        unique_id: String,
        data: UserInput,
    },
}

impl FlowResult {
    fn form(errors: BTreeMap<&'static str, FlowError>) -> Self {
        Self::Form {
            step_id: STEP_USER,
            errors,
        }
    }

    /// The base error, if this is a form re-shown after a failure.
    pub fn base_error(&self) -> Option<FlowError> {
        match self {
            Self::Form { errors, .. } => errors.get(BASE_ERROR).copied(),
            Self::CreateEntry { .. } => None,
        }
    }
}

/// Check that `client` can fetch the status, and learn the device id.
///
/// The client is closed before returning regardless of outcome.
pub async fn validate_input<C: StatusClient>(client: &C) -> Result<EntryInfo, FlowError> {
    let outcome = match client.fetch_status().await {
        Ok(_) => client.poolcop_id().ok_or(FlowError::Unknown).map(|id| EntryInfo {
            title: ENTRY_TITLE.to_owned(),
            unique_id: id,
        }),
        Err(e) if e.is_invalid_key() => Err(FlowError::InvalidAuth),
        Err(e) => {
            debug!(error = %e, "validation request failed");
            Err(FlowError::CannotConnect)
        }
    };
    client.close().await;
    outcome
}

/// Single-step flow collecting an API key.
///
/// `make_client` builds a fresh client for each submitted key.
pub struct ConfigFlow<F> {
    make_client: F,
}

impl<F, C, E> ConfigFlow<F>
where
    F: Fn(&SecretString) -> Result<C, E>,
    C: StatusClient,
    E: std::fmt::Display,
{
    pub fn new(make_client: F) -> Self {
        Self { make_client }
    }

    /// Handle the user step. `None` shows the empty form.
    pub async fn step_user(&self, input: Option<UserInput>) -> FlowResult {
        let Some(input) = input else {
            return FlowResult::form(BTreeMap::new());
        };

        let client = match (self.make_client)(&input.api_key) {
            Ok(client) => client,
            Err(e) => {
                error!(error = %e, "unexpected error building client");
                return FlowResult::form(BTreeMap::from([(BASE_ERROR, FlowError::Unknown)]));
            }
        };

        match validate_input(&client).await {
            Ok(info) => FlowResult::CreateEntry {
                title: info.title,
                unique_id: info.unique_id,
                data: input,
            },
            Err(kind) => {
                if kind == FlowError::Unknown {
                    error!("validation succeeded but no PoolCop id was reported");
                }
                FlowResult::form(BTreeMap::from([(BASE_ERROR, kind)]))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use serde_json::{Value, json};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone, Copy)]
    enum Behaviour {
        Ok,
        OkWithoutId,
        BadKey,
        Offline,
    }

    struct StubClient {
        behaviour: Behaviour,
        closed: Arc<AtomicUsize>,
    }

    impl StatusClient for StubClient {
        async fn fetch_status(&self) -> Result<Value, poolcop_api::Error> {
            match self.behaviour {
                Behaviour::Ok | Behaviour::OkWithoutId => Ok(json!({ "PoolCop": {} })),
                Behaviour::BadKey => Err(poolcop_api::Error::InvalidApiKey),
                Behaviour::Offline => Err(poolcop_api::Error::Connection("offline".into())),
            }
        }

        fn poolcop_id(&self) -> Option<String> {
            matches!(self.behaviour, Behaviour::Ok).then(|| "9876".to_owned())
        }

        async fn close(&self) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn flow(
        behaviour: Behaviour,
    ) -> (
        ConfigFlow<impl Fn(&SecretString) -> Result<StubClient, String>>,
        Arc<AtomicUsize>,
    ) {
        let closed = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&closed);
        let flow = ConfigFlow::new(move |_: &SecretString| {
            Ok(StubClient {
                behaviour,
                closed: Arc::clone(&counter),
            })
        });
        (flow, closed)
    }

    fn input() -> Option<UserInput> {
        Some(UserInput {
            api_key: SecretString::from("secret-key".to_owned()),
        })
    }

    #[tokio::test]
    async fn shows_empty_form_without_input() {
        let (flow, _) = flow(Behaviour::Ok);
        match flow.step_user(None).await {
            FlowResult::Form { step_id, errors } => {
                assert_eq!(step_id, "user");
                assert!(errors.is_empty());
            }
            FlowResult::CreateEntry { .. } => panic!("expected a form"),
        }
    }

    #[tokio::test]
    async fn creates_entry_for_valid_key() {
        let (flow, closed) = flow(Behaviour::Ok);
        match flow.step_user(input()).await {
            FlowResult::CreateEntry {
                title,
                unique_id,
                data,
            } => {
                assert_eq!(title, "PoolCop");
                assert_eq!(unique_id, "9876");
                assert_eq!(data.api_key.expose_secret(), "secret-key");
            }
            FlowResult::Form { errors, .. } => panic!("unexpected form: {errors:?}"),
        }
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn refused_key_is_invalid_auth() {
        let (flow, closed) = flow(Behaviour::BadKey);
        let result = flow.step_user(input()).await;
        assert_eq!(result.base_error(), Some(FlowError::InvalidAuth));
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn network_failure_is_cannot_connect() {
        let (flow, _) = flow(Behaviour::Offline);
        let result = flow.step_user(input()).await;
        assert_eq!(result.base_error(), Some(FlowError::CannotConnect));
    }

    #[tokio::test]
    async fn missing_device_id_is_unknown() {
        let (flow, _) = flow(Behaviour::OkWithoutId);
        let result = flow.step_user(input()).await;
        assert_eq!(result.base_error(), Some(FlowError::Unknown));
    }

    #[tokio::test]
    async fn client_construction_failure_is_unknown() {
        let flow = ConfigFlow::new(|_: &SecretString| -> Result<StubClient, String> {
            Err("no TLS backend".into())
        });
        let result = flow.step_user(input()).await;
        assert_eq!(result.base_error(), Some(FlowError::Unknown));
    }

    #[test]
    fn errors_render_as_form_keys() {
        assert_eq!(FlowError::InvalidAuth.as_ref(), "invalid_auth");
        assert_eq!(FlowError::CannotConnect.to_string(), "cannot_connect");
    }
}
