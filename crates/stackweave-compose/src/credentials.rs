//! Generated credentials.
//!
//! The store is the only owner of generated secret material. Callers hold a
//! [`CredentialHandle`] and ask the store to reveal one field at a time.
//! Secret values are never passed to a tracing macro.

use std::collections::BTreeMap;
use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize, Serializer};
use stackweave_common::constants::GENERATED_PASSWORD_LENGTH;
use stackweave_common::error::{Result, StackweaveError};
use stackweave_common::types::ResourceId;
use zeroize::Zeroizing;

/// Field holding the fixed username.
pub const FIELD_USERNAME: &str = "username";
/// Field holding the generated password.
pub const FIELD_PASSWORD: &str = "password";

/// A string holding secret material. Zeroed on drop, redacted when printed.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretString(Zeroizing<String>);

impl SecretString {
    /// Wraps a secret value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(Zeroizing::new(value.into()))
    }

    /// Exposes the secret value.
    #[must_use]
    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    /// Returns `true` if the secret is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretString([REDACTED])")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

// The plan is handed to the provisioning executor, which needs the value.
impl Serialize for SecretString {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// Opaque reference to a generated credential.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CredentialHandle(ResourceId);

impl CredentialHandle {
    /// Resource id of the secret.
    #[must_use]
    pub const fn id(&self) -> &ResourceId {
        &self.0
    }
}

impl fmt::Display for CredentialHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Names and field keys of one stored credential; never its values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecretSummary {
    /// Secret id.
    pub id: ResourceId,
    /// Field names present in the secret.
    pub fields: Vec<String>,
}

/// Owner of every generated credential in a plan.
#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    secrets: BTreeMap<ResourceId, BTreeMap<String, SecretString>>,
}

impl CredentialStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Generates a credential with a fixed username and a random password.
    ///
    /// A credential is generated at most once: asking again for the same
    /// name returns the existing handle and keeps the original password.
    pub fn generate(&mut self, name: &ResourceId, username: &str) -> CredentialHandle {
        let handle = CredentialHandle(name.clone());
        if self.secrets.contains_key(name) {
            return handle;
        }
        let mut fields = BTreeMap::new();
        let _ = fields.insert(FIELD_USERNAME.to_owned(), SecretString::new(username));
        let _ = fields.insert(FIELD_PASSWORD.to_owned(), generate_password());
        let _ = self.secrets.insert(name.clone(), fields);
        tracing::debug!(secret = %name, "credential generated");
        handle
    }

    /// Attaches a non-generated field (host, port, ...) to a credential.
    ///
    /// Generated fields cannot be overwritten.
    ///
    /// # Errors
    ///
    /// Returns [`StackweaveError::SecretUnavailable`] if the credential has
    /// not been generated, and [`StackweaveError::Config`] on an attempt to
    /// replace a generated field.
    pub fn attach(
        &mut self,
        handle: &CredentialHandle,
        field: &str,
        value: impl Into<String>,
    ) -> Result<()> {
        if field == FIELD_USERNAME || field == FIELD_PASSWORD {
            return Err(StackweaveError::config(format!(
                "field \"{field}\" of {handle} is generated and cannot be replaced"
            )));
        }
        let fields = self
            .secrets
            .get_mut(handle.id())
            .ok_or_else(|| unavailable(handle, field))?;
        let _ = fields.insert(field.to_owned(), SecretString::new(value));
        Ok(())
    }

    /// Reveals one field of a credential.
    ///
    /// # Errors
    ///
    /// Returns [`StackweaveError::SecretUnavailable`] if the credential has
    /// not been generated or has no such field.
    pub fn reveal(&self, handle: &CredentialHandle, field: &str) -> Result<SecretString> {
        self.secrets
            .get(handle.id())
            .and_then(|fields| fields.get(field))
            .cloned()
            .ok_or_else(|| unavailable(handle, field))
    }

    /// Lists every credential by id and field names.
    #[must_use]
    pub fn summaries(&self) -> Vec<SecretSummary> {
        self.secrets
            .iter()
            .map(|(id, fields)| SecretSummary {
                id: id.clone(),
                fields: fields.keys().cloned().collect(),
            })
            .collect()
    }
}

impl Serialize for CredentialStore {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.summaries().serialize(serializer)
    }
}

fn unavailable(handle: &CredentialHandle, field: &str) -> StackweaveError {
    StackweaveError::SecretUnavailable {
        secret: handle.to_string(),
        field: field.to_owned(),
    }
}

fn generate_password() -> SecretString {
    let password: String = rand::thread_rng()
        .sample_iter(&rand::distributions::Alphanumeric)
        .take(GENERATED_PASSWORD_LENGTH)
        .map(char::from)
        .collect();
    SecretString::new(password)
}
