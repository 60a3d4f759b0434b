use crate::{
    model::{Id, auth::CredentialHash},
    validation::{DEFAULT_MAX_LEN, FieldInput, ValidationErrors, max_chars, required_string},
};
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use thiserror::Error;
use time::OffsetDateTime;

pub const USER_NAME_MAX_LEN: usize = DEFAULT_MAX_LEN;
pub const EMAIL_MAX_LEN: usize = DEFAULT_MAX_LEN;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct UserMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct User {
    pub id: Id<UserMarker>,
    pub name: UserName,
    pub email: Email,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// The slice of a user embedded in post listings.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub struct UserSummary {
    pub id: Id<UserMarker>,
    pub name: UserName,
}

impl From<User> for UserSummary {
    fn from(value: User) -> Self {
        Self {
            id: value.id,
            name: value.name,
        }
    }
}

/// A user about to be inserted. The password is already hashed.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct NewUser {
    pub name: UserName,
    pub email: Email,
    pub password_hash: CredentialHash,
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize)]
#[serde(transparent)]
pub struct UserName(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The user name is invalid: {0}")]
pub struct InvalidUserNameError(String);

impl UserName {
    pub fn new(name: String) -> Result<Self, InvalidUserNameError> {
        let trimmed = name.trim();
        if trimmed.is_empty() || trimmed.chars().count() > USER_NAME_MAX_LEN {
            return Err(InvalidUserNameError(name));
        }

        Ok(UserName(trimmed.to_owned()))
    }

    /// Validates a raw `name` request field.
    pub fn validate(errors: &mut ValidationErrors, name: Option<&FieldInput>) -> Option<Self> {
        let name = required_string(errors, "name", name)?;
        if !max_chars(errors, "name", name.trim(), USER_NAME_MAX_LEN) {
            return None;
        }

        Self::new(name.to_owned()).ok()
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for UserName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        UserName::new(inner).map_err(|err| Error::invalid_value(Unexpected::Str(&err.0), &"UserName"))
    }
}

/// A lowercased email address of the shape `local@domain`.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize)]
#[serde(transparent)]
pub struct Email(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The email address is invalid: {0}")]
pub struct InvalidEmailError(String);

impl Email {
    pub fn new(email: String) -> Result<Self, InvalidEmailError> {
        let normalized = email.trim().to_lowercase();
        let well_formed = normalized.chars().count() <= EMAIL_MAX_LEN
            && !normalized.chars().any(char::is_whitespace)
            && normalized.split_once('@').is_some_and(|(local, domain)| {
                !local.is_empty()
                    && !domain.is_empty()
                    && !domain.contains('@')
                    && !domain.starts_with('.')
                    && !domain.ends_with('.')
            });

        if well_formed {
            Ok(Email(normalized))
        } else {
            Err(InvalidEmailError(email))
        }
    }

    /// Validates a raw `email` request field.
    pub fn validate(errors: &mut ValidationErrors, email: Option<&FieldInput>) -> Option<Self> {
        let email = required_string(errors, "email", email)?;
        if !max_chars(errors, "email", email.trim(), EMAIL_MAX_LEN) {
            return None;
        }

        let email = Self::new(email.to_owned()).ok();
        if email.is_none() {
            errors.add("email", "The email field must be a valid email address.");
        }
        email
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for Email {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        Email::new(inner).map_err(|err| Error::invalid_value(Unexpected::Str(&err.0), &"Email"))
    }
}
