//! User model and related types

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, FromRow, Postgres};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::error::AppError;
use crate::models::text_filter_matches;
use crate::search::{EntityKind, IndexDocument, Indexable};

/// User rights, ordered by privilege: `Student < Librarian < Admin`
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Rights {
    #[default]
    Student,
    Librarian,
    Admin,
}

impl Rights {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rights::Student => "student",
            Rights::Librarian => "librarian",
            Rights::Admin => "admin",
        }
    }

    /// Librarians and admins
    pub fn is_librarian(&self) -> bool {
        *self >= Rights::Librarian
    }

    pub fn is_admin(&self) -> bool {
        *self == Rights::Admin
    }
}

impl std::fmt::Display for Rights {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Rights {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "student" => Ok(Rights::Student),
            "librarian" => Ok(Rights::Librarian),
            "admin" => Ok(Rights::Admin),
            _ => Err(format!("Invalid rights: {}", s)),
        }
    }
}

// Stored as text, see the CHECK constraint on users.rights
impl sqlx::Type<Postgres> for Rights {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }
}

impl<'r> Decode<'r, Postgres> for Rights {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: &str = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for Rights {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        <&str as Encode<Postgres>>::encode(self.as_str(), buf)
    }
}

/// Full user model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct User {
    pub id: i32,
    pub login: String,
    /// Hashed password (argon2)
    #[serde(skip_serializing, default)]
    pub password: String,
    pub name: Option<String>,
    pub middlename: Option<String>,
    pub surname: Option<String>,
    pub birthdate: Option<NaiveDate>,
    pub year_of_study: Option<i32>,
    pub rights: Rights,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Indexable for User {
    const KIND: EntityKind = EntityKind::User;

    fn to_document(&self) -> IndexDocument {
        IndexDocument::new(self.id)
            .optional_field("name", self.name.as_deref())
            .optional_field("middlename", self.middlename.as_deref())
            .optional_field("surname", self.surname.as_deref())
            .field("login", self.login.as_str())
    }
}

/// User query parameters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct UserQuery {
    /// Full-text search over names and login. The other filters narrow its
    /// matches; at most `search.max_candidates` are ranked.
    pub q: Option<String>,
    pub name: Option<String>,
    pub middlename: Option<String>,
    pub surname: Option<String>,
    pub year_of_study: Option<i32>,
    /// Only honoured for admins
    pub rights: Option<Rights>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl UserQuery {
    /// Field filters applied to a user fetched for a text search, with the
    /// same meaning as in the database listing. `rights` counts only when
    /// `with_rights` is set.
    pub fn matches(&self, user: &User, with_rights: bool) -> bool {
        text_filter_matches(user.name.as_deref(), self.name.as_deref())
            && text_filter_matches(user.middlename.as_deref(), self.middlename.as_deref())
            && text_filter_matches(user.surname.as_deref(), self.surname.as_deref())
            && self
                .year_of_study
                .map_or(true, |year| user.year_of_study == Some(year))
            && (!with_rights || self.rights.map_or(true, |rights| user.rights == rights))
    }
}

/// One account of an admin bulk creation; login and password are generated
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct NewUserEntry {
    #[validate(length(max = 32, message = "Name must be at most 32 characters"))]
    pub name: Option<String>,
    #[validate(length(max = 32, message = "Middlename must be at most 32 characters"))]
    pub middlename: Option<String>,
    #[validate(length(max = 32, message = "Surname must be at most 32 characters"))]
    pub surname: Option<String>,
    #[validate(range(min = 1, max = 11, message = "Year of study must be between 1 and 11"))]
    pub year_of_study: Option<i32>,
    pub birthdate: Option<NaiveDate>,
    pub rights: Option<Rights>,
}

/// Generated credentials, returned once at creation
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreatedCredentials {
    pub id: i32,
    pub login: String,
    pub password: String,
}

/// Update user request (admin only). Unset fields are left unchanged.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateUser {
    #[validate(length(max = 32, message = "Name must be at most 32 characters"))]
    pub name: Option<String>,
    #[validate(length(max = 32, message = "Middlename must be at most 32 characters"))]
    pub middlename: Option<String>,
    #[validate(length(max = 32, message = "Surname must be at most 32 characters"))]
    pub surname: Option<String>,
    #[validate(range(min = 1, max = 11, message = "Year of study must be between 1 and 11"))]
    pub year_of_study: Option<i32>,
    pub birthdate: Option<NaiveDate>,
    pub rights: Option<Rights>,
}

impl UpdateUser {
    /// True when an indexed field is part of the update
    pub fn touches_index(&self) -> bool {
        self.name.is_some() || self.middlename.is_some() || self.surname.is_some()
    }
}

/// Change password request (admin only)
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ChangePassword {
    #[validate(length(min = 4, message = "Password must be at least 4 characters"))]
    pub password: String,
}

/// JWT flavour: access tokens authenticate requests, refresh tokens only
/// mint new access tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT Claims for authenticated users
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    /// Login
    pub sub: String,
    pub user_id: i32,
    pub rights: Rights,
    pub kind: TokenKind,
    pub exp: i64,
    pub iat: i64,
}

impl UserClaims {
    /// Create a new JWT token
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Parse JWT token
    pub fn from_token(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }
}

/// The caller of a request, as currently stored
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: i32,
    pub login: String,
    pub rights: Rights,
}

impl From<&User> for CurrentUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            login: user.login.clone(),
            rights: user.rights,
        }
    }
}

impl CurrentUser {
    pub fn is_librarian(&self) -> bool {
        self.rights.is_librarian()
    }

    pub fn is_admin(&self) -> bool {
        self.rights.is_admin()
    }

    pub fn require_librarian(&self) -> Result<(), AppError> {
        if self.is_librarian() {
            Ok(())
        } else {
            Err(AppError::Authorization("Librarian privileges required".to_string()))
        }
    }

    /// Require admin privileges
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Authorization("Administrator privileges required".to_string()))
        }
    }

    /// Own records, or any record for librarians
    pub fn require_self_or_librarian(&self, user_id: i32) -> Result<(), AppError> {
        if self.id == user_id || self.is_librarian() {
            Ok(())
        } else {
            Err(AppError::Authorization(
                "Cannot access another user's records".to_string(),
            ))
        }
    }
}
