use crate::{
    model::{
        Id,
        user::{Email, NewUser, User, UserMarker, UserName},
    },
    util::PositiveDuration,
    validation::{FieldInput, ValidationErrors, min_chars, required_string},
};
use argon2::{
    Argon2, Params,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use base64::{DecodeError, Engine, display::Base64Display, prelude::BASE64_STANDARD};
use serde::{Deserialize, Serialize};
use std::{
    fmt::{Debug, Formatter},
    num::ParseIntError,
    str::FromStr,
};
use thiserror::Error;
use time::OffsetDateTime;

pub const AUTH_TOKEN_CORE_LEN: usize = 24;
pub const AUTH_TOKEN_SALT_LEN: usize = 18;
pub const AUTH_TOKEN_HASH_LEN: usize = Params::DEFAULT_OUTPUT_LEN;
pub const PASSWORD_MIN_LEN: usize = 8;
pub const TOKEN_TYPE: &str = "Bearer";

#[derive(Clone, Eq, PartialEq, Debug, Error)]
#[error("Hashing auth token failed: {0}")]
pub struct AuthTokenHashError(argon2::Error);

#[derive(Clone, Eq, PartialEq, Debug, Error)]
pub enum AuthTokenDecodeError {
    #[error("Not enough parts separated by ':'")]
    NotEnoughParts,
    #[error("Invalid user id: {0}")]
    InvalidUserId(ParseIntError),
    #[error("Decoding base64 failed: {0}")]
    Decode(#[from] DecodeError),
    #[error("The length of the core part is incorrect")]
    InvalidCoreLength,
    #[error("The length of the salt part is incorrect")]
    InvalidSaltLength,
}

/// The bearer credential handed to a client. Only its hash is ever stored.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct AuthToken {
    pub user_id: Id<UserMarker>,
    pub core: [u8; AUTH_TOKEN_CORE_LEN],
    pub salt: [u8; AUTH_TOKEN_SALT_LEN],
}

#[derive(Clone, Eq, PartialEq, Hash)]
pub struct AuthTokenHash(pub Box<[u8; AUTH_TOKEN_HASH_LEN]>);

/// A stored session: which user a token hash belongs to and how long it lives.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Authentication {
    pub user: Id<UserMarker>,
    pub token_hash: AuthTokenHash,
    pub created_at: OffsetDateTime,
    pub expires_after: Option<PositiveDuration>,
}

impl Authentication {
    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.expires_after
            .is_some_and(|expires_after| self.created_at + expires_after.get() < now)
    }
}

impl AuthToken {
    #[must_use]
    pub fn generate_random(user_id: Id<UserMarker>) -> Self {
        let core = rand::random();
        let salt = rand::random();

        Self {
            user_id,
            core,
            salt,
        }
    }

    #[must_use]
    pub fn as_token_str(&self) -> String {
        let user_id = self.user_id;
        let encoded_core = Base64Display::new(&self.core, &BASE64_STANDARD);
        let encoded_salt = Base64Display::new(&self.salt, &BASE64_STANDARD);

        format!("{user_id}:{encoded_core}:{encoded_salt}")
    }

    pub fn hash(&self) -> Result<AuthTokenHash, AuthTokenHashError> {
        let argon2 = Argon2::default();

        let mut hash = Box::new([0; AUTH_TOKEN_HASH_LEN]);
        argon2
            .hash_password_into(&self.core, &self.salt, &mut *hash)
            .map_err(AuthTokenHashError)?;

        Ok(AuthTokenHash(hash))
    }

    /// Builds the stored session for this token, created now.
    pub fn authentication(
        &self,
        expires_after: Option<PositiveDuration>,
    ) -> Result<Authentication, AuthTokenHashError> {
        Ok(Authentication {
            user: self.user_id,
            token_hash: self.hash()?,
            created_at: OffsetDateTime::now_utc(),
            expires_after,
        })
    }
}

impl FromStr for AuthToken {
    type Err = AuthTokenDecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');

        let user_id_part = parts.next().ok_or(Self::Err::NotEnoughParts)?;
        let core_part = parts.next().ok_or(Self::Err::NotEnoughParts)?;
        let salt_part = parts.next().ok_or(Self::Err::NotEnoughParts)?;

        let user_id = u64::from_str(user_id_part)
            .map_err(Self::Err::InvalidUserId)?
            .into();
        let core = BASE64_STANDARD
            .decode(core_part)?
            .try_into()
            .map_err(|_| Self::Err::InvalidCoreLength)?;
        let salt = BASE64_STANDARD
            .decode(salt_part)?
            .try_into()
            .map_err(|_| Self::Err::InvalidSaltLength)?;

        Ok(Self {
            user_id,
            core,
            salt,
        })
    }
}

impl Debug for AuthToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthToken")
            .field("user_id", &self.user_id)
            .field("core", &"[redacted]")
            .field("salt", &"[redacted]")
            .finish()
    }
}

impl Debug for AuthTokenHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("AuthTokenHash").field(&"[redacted]").finish()
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The auth token hash had an invalid length")]
pub struct InvalidAuthTokenHashError;

impl TryFrom<Vec<u8>> for AuthTokenHash {
    type Error = InvalidAuthTokenHashError;

    fn try_from(value: Vec<u8>) -> Result<Self, Self::Error> {
        let hash: [u8; AUTH_TOKEN_HASH_LEN] =
            value.try_into().map_err(|_| InvalidAuthTokenHashError)?;
        Ok(Self(Box::new(hash)))
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Error)]
#[error("Hashing credential failed: {0}")]
pub struct CredentialHashError(argon2::password_hash::Error);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The stored credential hash is not a valid PHC string")]
pub struct InvalidCredentialHashError;

/// An argon2id password hash in PHC string form.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct CredentialHash(String);

impl CredentialHash {
    pub fn generate(password: &str) -> Result<Self, CredentialHashError> {
        let salt_bytes: [u8; 16] = rand::random();
        let salt = SaltString::encode_b64(&salt_bytes).map_err(CredentialHashError)?;
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(CredentialHashError)?;

        Ok(Self(hash.to_string()))
    }

    pub fn from_phc(phc: String) -> Result<Self, InvalidCredentialHashError> {
        PasswordHash::new(&phc).map_err(|_| InvalidCredentialHashError)?;
        Ok(Self(phc))
    }

    #[must_use]
    pub fn verify(&self, password: &str) -> bool {
        PasswordHash::new(&self.0).is_ok_and(|hash| {
            Argon2::default()
                .verify_password(password.as_bytes(), &hash)
                .is_ok()
        })
    }

    #[must_use]
    pub fn as_phc(&self) -> &str {
        &self.0
    }
}

impl Debug for CredentialHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("CredentialHash").field(&"[redacted]").finish()
    }
}

#[derive(Clone, Eq, PartialEq, Default, Deserialize, Serialize)]
pub struct RegisterPayload {
    #[serde(default)]
    pub name: Option<FieldInput>,
    #[serde(default)]
    pub email: Option<FieldInput>,
    #[serde(default)]
    pub password: Option<FieldInput>,
    #[serde(default)]
    pub password_confirmation: Option<FieldInput>,
}

impl RegisterPayload {
    #[must_use]
    pub fn new(name: &str, email: &str, password: &str) -> Self {
        Self {
            name: Some(name.into()),
            email: Some(email.into()),
            password: Some(password.into()),
            password_confirmation: Some(password.into()),
        }
    }
}

impl Debug for RegisterPayload {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterPayload")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &"[redacted]")
            .finish_non_exhaustive()
    }
}

/// A registration whose fields all passed validation.
#[derive(Clone, Eq, PartialEq)]
pub struct Registration {
    pub name: UserName,
    pub email: Email,
    password: String,
}

impl Registration {
    pub fn validate(payload: &RegisterPayload) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let name = UserName::validate(&mut errors, payload.name.as_ref());
        let email = Email::validate(&mut errors, payload.email.as_ref());
        let password = required_string(&mut errors, "password", payload.password.as_ref())
            .filter(|password| min_chars(&mut errors, "password", password, PASSWORD_MIN_LEN))
            .filter(|password| {
                let confirmed = payload
                    .password_confirmation
                    .as_ref()
                    .and_then(FieldInput::as_text)
                    == Some(*password);
                if !confirmed {
                    errors.add("password", "The password field confirmation does not match.");
                }
                confirmed
            });

        match (name, email, password) {
            (Some(name), Some(email), Some(password)) => errors.into_result(Self {
                name,
                email,
                password: password.to_owned(),
            }),
            _ => Err(errors),
        }
    }

    pub fn into_new_user(self) -> Result<NewUser, CredentialHashError> {
        Ok(NewUser {
            password_hash: CredentialHash::generate(&self.password)?,
            name: self.name,
            email: self.email,
        })
    }
}

#[derive(Clone, Eq, PartialEq, Default, Deserialize, Serialize)]
pub struct LoginPayload {
    #[serde(default)]
    pub email: Option<FieldInput>,
    #[serde(default)]
    pub password: Option<FieldInput>,
}

impl LoginPayload {
    #[must_use]
    pub fn new(email: &str, password: &str) -> Self {
        Self {
            email: Some(email.into()),
            password: Some(password.into()),
        }
    }

    /// Returns the email and password when both are present.
    pub fn validate(&self) -> Result<(&str, &str), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let email = required_string(&mut errors, "email", self.email.as_ref());
        let password = required_string(&mut errors, "password", self.password.as_ref());

        match (email, password) {
            (Some(email), Some(password)) => Ok((email, password)),
            _ => Err(errors),
        }
    }
}

impl Debug for LoginPayload {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginPayload")
            .field("email", &self.email)
            .field("password", &"[redacted]")
            .finish()
    }
}

/// What register and login hand back to the client.
#[derive(Clone, Eq, PartialEq, Debug, Deserialize, Serialize)]
pub struct AccessTokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub user: User,
}

impl AccessTokenResponse {
    #[must_use]
    pub fn new(token: &AuthToken, user: User) -> Self {
        Self {
            access_token: token.as_token_str(),
            token_type: TOKEN_TYPE.to_owned(),
            user,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::model::{
        Id,
        auth::{
            AuthToken, AuthTokenDecodeError, Authentication, CredentialHash, LoginPayload,
            RegisterPayload, Registration,
        },
    };
    use crate::util::PositiveDuration;
    use time::{Duration, OffsetDateTime};

    #[test]
    fn token_string_round_trips() {
        let token = AuthToken::generate_random(Id::from(1234_u64));
        let parsed: AuthToken = token.as_token_str().parse().unwrap();

        assert_eq!(parsed, token);
        assert_eq!(parsed.hash().unwrap(), token.hash().unwrap());
    }

    #[test]
    fn malformed_tokens_are_rejected() {
        assert_eq!(
            "1234".parse::<AuthToken>(),
            Err(AuthTokenDecodeError::NotEnoughParts)
        );
        assert!(matches!(
            "abc:AAAA:AAAA".parse::<AuthToken>(),
            Err(AuthTokenDecodeError::InvalidUserId(_))
        ));
        assert_eq!(
            "1:AAAA:AAAA".parse::<AuthToken>(),
            Err(AuthTokenDecodeError::InvalidCoreLength)
        );
    }

    #[test]
    fn different_tokens_hash_differently() {
        let first = AuthToken::generate_random(Id::from(1_u64));
        let second = AuthToken::generate_random(Id::from(1_u64));

        assert_ne!(first.hash().unwrap(), second.hash().unwrap());
    }

    #[test]
    fn expiry() {
        let token = AuthToken::generate_random(Id::from(1_u64));
        let created_at = OffsetDateTime::now_utc();
        let authentication = Authentication {
            created_at,
            ..token
                .authentication(PositiveDuration::new(Duration::hours(1)))
                .unwrap()
        };

        assert!(!authentication.is_expired_at(created_at + Duration::minutes(59)));
        assert!(authentication.is_expired_at(created_at + Duration::minutes(61)));

        let forever = token.authentication(None).unwrap();
        assert!(!forever.is_expired_at(created_at + Duration::days(10_000)));
    }

    #[test]
    fn credential_hash_verifies_only_the_right_password() {
        let hash = CredentialHash::generate("secret123").unwrap();

        assert!(hash.verify("secret123"));
        assert!(!hash.verify("secret124"));
        assert_eq!(
            CredentialHash::from_phc(hash.as_phc().to_owned()).as_ref(),
            Ok(&hash)
        );
        assert!(CredentialHash::from_phc("plaintext".to_owned()).is_err());
    }

    #[test]
    fn registration_checks_password_rules() {
        let mut payload = RegisterPayload::new("A", "a@x.com", "short");
        let errors = Registration::validate(&payload).err().unwrap();
        assert_eq!(
            errors.get("password"),
            ["The password field must be at least 8 characters."]
        );

        payload = RegisterPayload::new("A", "a@x.com", "secret123");
        payload.password_confirmation = Some("secret321".into());
        let errors = Registration::validate(&payload).err().unwrap();
        assert_eq!(
            errors.get("password"),
            ["The password field confirmation does not match."]
        );

        let registration =
            Registration::validate(&RegisterPayload::new("A", "A@X.com", "secret123")).unwrap();
        assert_eq!(registration.email.get(), "a@x.com");
        assert!(registration.into_new_user().unwrap().password_hash.verify("secret123"));
    }

    #[test]
    fn login_requires_both_fields() {
        let errors = LoginPayload::default().validate().unwrap_err();
        assert_eq!(errors.fields().collect::<Vec<_>>(), ["email", "password"]);
        assert_eq!(
            LoginPayload::new("a@x.com", "pw").validate(),
            Ok(("a@x.com", "pw"))
        );
    }
}
