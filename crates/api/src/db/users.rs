//! User repository.
//!
//! Password hashes are only returned by the `*_password_hash` lookups, which
//! the auth service uses. Every other method works on [`User`].

use chrono::{DateTime, Utc};
use sqlx::types::Json;

use shoplane_core::{Email, ProductId, UserId, UserRole};

use super::memory::StoredUser;
use super::{Database, RepositoryError, conflict_on_unique};
use crate::models::{Address, NewUser, User};

const SELECT_USER: &str = r#"
    SELECT id, name, email, role, is_active, last_login, password_changed_at,
           addresses, wishlist, created_at, updated_at
    FROM shop."user"
"#;

const RETURNING_USER: &str = r"
    RETURNING id, name, email, role, is_active, last_login, password_changed_at,
              addresses, wishlist, created_at, updated_at
";

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i32,
    name: String,
    email: String,
    role: String,
    is_active: bool,
    last_login: Option<DateTime<Utc>>,
    password_changed_at: Option<DateTime<Utc>>,
    addresses: Json<Vec<Address>>,
    wishlist: Vec<i32>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct UserWithHashRow {
    #[sqlx(flatten)]
    user: UserRow,
    password_hash: String,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(r: UserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&r.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;
        let role = r.role.parse::<UserRole>().map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid role in database: {e}"))
        })?;

        Ok(Self {
            id: UserId::new(r.id),
            name: r.name,
            email,
            role,
            is_active: r.is_active,
            last_login: r.last_login,
            password_changed_at: r.password_changed_at,
            addresses: r.addresses.0,
            wishlist: r.wishlist.into_iter().map(ProductId::new).collect(),
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

/// Repository for user accounts.
pub struct UserRepository<'a> {
    db: &'a Database,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Get a user by their ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored row is invalid.
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        match self.db {
            Database::Postgres(pool) => {
                let sql = format!("{SELECT_USER} WHERE id = $1");
                sqlx::query_as::<_, UserRow>(&sql)
                    .bind(id)
                    .fetch_optional(pool)
                    .await?
                    .map(User::try_from)
                    .transpose()
            }
            Database::Memory(store) => Ok(store.read().await.users.get(&id).map(|s| s.user.clone())),
        }
    }

    /// Get a user by their email address.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored row is invalid.
    pub async fn get_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        Ok(self.get_password_hash(email).await?.map(|(user, _)| user))
    }

    /// Get a user and their password hash by email.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored row is invalid.
    pub async fn get_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        match self.db {
            Database::Postgres(pool) => {
                let sql = r#"
                    SELECT id, name, email, role, is_active, last_login, password_changed_at,
                           addresses, wishlist, created_at, updated_at, password_hash
                    FROM shop."user"
                    WHERE email = $1
                "#;
                sqlx::query_as::<_, UserWithHashRow>(sql)
                    .bind(email.as_str())
                    .fetch_optional(pool)
                    .await?
                    .map(|r| Ok((User::try_from(r.user)?, r.password_hash)))
                    .transpose()
            }
            Database::Memory(store) => Ok(store
                .read()
                .await
                .users
                .values()
                .find(|s| s.user.email == *email)
                .map(|s| (s.user.clone(), s.password_hash.clone()))),
        }
    }

    /// Get the password hash for a user ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_password_hash_by_id(
        &self,
        id: UserId,
    ) -> Result<Option<String>, RepositoryError> {
        match self.db {
            Database::Postgres(pool) => {
                let hash = sqlx::query_scalar::<_, String>(
                    r#"SELECT password_hash FROM shop."user" WHERE id = $1"#,
                )
                .bind(id)
                .fetch_optional(pool)
                .await?;
                Ok(hash)
            }
            Database::Memory(store) => Ok(store
                .read()
                .await
                .users
                .get(&id)
                .map(|s| s.password_hash.clone())),
        }
    }

    /// Create a new user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email already exists.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(&self, new: NewUser) -> Result<User, RepositoryError> {
        match self.db {
            Database::Postgres(pool) => {
                let sql = format!(
                    r#"INSERT INTO shop."user" (name, email, password_hash, role)
                       VALUES ($1, $2, $3, $4) {RETURNING_USER}"#
                );
                let row = sqlx::query_as::<_, UserRow>(&sql)
                    .bind(&new.name)
                    .bind(new.email.as_str())
                    .bind(&new.password_hash)
                    .bind(new.role.as_str())
                    .fetch_one(pool)
                    .await
                    .map_err(|e| conflict_on_unique(e, "email"))?;
                User::try_from(row)
            }
            Database::Memory(store) => {
                let mut data = store.write().await;
                if data.users.values().any(|s| s.user.email == new.email) {
                    return Err(RepositoryError::Conflict("email already exists".to_owned()));
                }

                let now = Utc::now();
                let user = User {
                    id: data.next_user_id(),
                    name: new.name,
                    email: new.email,
                    role: new.role,
                    is_active: true,
                    last_login: None,
                    password_changed_at: None,
                    addresses: Vec::new(),
                    wishlist: Vec::new(),
                    created_at: now,
                    updated_at: now,
                };
                data.users.insert(
                    user.id,
                    StoredUser {
                        user: user.clone(),
                        password_hash: new.password_hash,
                    },
                );
                Ok(user)
            }
        }
    }

    /// Stamp a successful login.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    pub async fn record_login(&self, id: UserId, at: DateTime<Utc>) -> Result<(), RepositoryError> {
        match self.db {
            Database::Postgres(pool) => {
                let result = sqlx::query(r#"UPDATE shop."user" SET last_login = $2 WHERE id = $1"#)
                    .bind(id)
                    .bind(at)
                    .execute(pool)
                    .await?;
                if result.rows_affected() == 0 {
                    return Err(RepositoryError::NotFound);
                }
                Ok(())
            }
            Database::Memory(store) => {
                let mut data = store.write().await;
                let stored = data.users.get_mut(&id).ok_or(RepositoryError::NotFound)?;
                stored.user.last_login = Some(at);
                Ok(())
            }
        }
    }

    /// Replace the password hash and stamp the change.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    pub async fn update_password(
        &self,
        id: UserId,
        password_hash: &str,
        changed_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        match self.db {
            Database::Postgres(pool) => {
                let result = sqlx::query(
                    r#"
                    UPDATE shop."user"
                    SET password_hash = $2, password_changed_at = $3, updated_at = $3
                    WHERE id = $1
                    "#,
                )
                .bind(id)
                .bind(password_hash)
                .bind(changed_at)
                .execute(pool)
                .await?;
                if result.rows_affected() == 0 {
                    return Err(RepositoryError::NotFound);
                }
                Ok(())
            }
            Database::Memory(store) => {
                let mut data = store.write().await;
                let stored = data.users.get_mut(&id).ok_or(RepositoryError::NotFound)?;
                password_hash.clone_into(&mut stored.password_hash);
                stored.user.password_changed_at = Some(changed_at);
                stored.user.updated_at = changed_at;
                Ok(())
            }
        }
    }

    /// Change a user's role.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no user has this email.
    pub async fn set_role(&self, email: &Email, role: UserRole) -> Result<User, RepositoryError> {
        match self.db {
            Database::Postgres(pool) => {
                let sql = format!(
                    r#"UPDATE shop."user" SET role = $2, updated_at = NOW()
                       WHERE email = $1 {RETURNING_USER}"#
                );
                sqlx::query_as::<_, UserRow>(&sql)
                    .bind(email.as_str())
                    .bind(role.as_str())
                    .fetch_optional(pool)
                    .await?
                    .ok_or(RepositoryError::NotFound)
                    .and_then(User::try_from)
            }
            Database::Memory(store) => {
                let mut data = store.write().await;
                let stored = data
                    .users
                    .values_mut()
                    .find(|s| s.user.email == *email)
                    .ok_or(RepositoryError::NotFound)?;
                stored.user.role = role;
                stored.user.updated_at = Utc::now();
                Ok(stored.user.clone())
            }
        }
    }

    /// Replace the saved address list.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    pub async fn save_addresses(
        &self,
        id: UserId,
        addresses: &[Address],
    ) -> Result<(), RepositoryError> {
        match self.db {
            Database::Postgres(pool) => {
                let result = sqlx::query(
                    r#"UPDATE shop."user" SET addresses = $2, updated_at = NOW() WHERE id = $1"#,
                )
                .bind(id)
                .bind(Json(addresses))
                .execute(pool)
                .await?;
                if result.rows_affected() == 0 {
                    return Err(RepositoryError::NotFound);
                }
                Ok(())
            }
            Database::Memory(store) => {
                let mut data = store.write().await;
                let stored = data.users.get_mut(&id).ok_or(RepositoryError::NotFound)?;
                stored.user.addresses = addresses.to_vec();
                stored.user.updated_at = Utc::now();
                Ok(())
            }
        }
    }

    /// Replace the wishlist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    pub async fn set_wishlist(
        &self,
        id: UserId,
        wishlist: &[ProductId],
    ) -> Result<(), RepositoryError> {
        match self.db {
            Database::Postgres(pool) => {
                let ids: Vec<i32> = wishlist
                    .iter()
                    .copied()
                    .map(ProductId::as_i32)
                    .collect();
                let result = sqlx::query(
                    r#"UPDATE shop."user" SET wishlist = $2, updated_at = NOW() WHERE id = $1"#,
                )
                .bind(id)
                .bind(ids)
                .execute(pool)
                .await?;
                if result.rows_affected() == 0 {
                    return Err(RepositoryError::NotFound);
                }
                Ok(())
            }
            Database::Memory(store) => {
                let mut data = store.write().await;
                let stored = data.users.get_mut(&id).ok_or(RepositoryError::NotFound)?;
                stored.user.wishlist = wishlist.to_vec();
                stored.user.updated_at = Utc::now();
                Ok(())
            }
        }
    }

    /// Deactivate or reactivate an account.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    pub async fn set_active(&self, id: UserId, active: bool) -> Result<(), RepositoryError> {
        match self.db {
            Database::Postgres(pool) => {
                let result = sqlx::query(
                    r#"UPDATE shop."user" SET is_active = $2, updated_at = NOW() WHERE id = $1"#,
                )
                .bind(id)
                .bind(active)
                .execute(pool)
                .await?;
                if result.rows_affected() == 0 {
                    return Err(RepositoryError::NotFound);
                }
                Ok(())
            }
            Database::Memory(store) => {
                let mut data = store.write().await;
                let stored = data.users.get_mut(&id).ok_or(RepositoryError::NotFound)?;
                stored.user.is_active = active;
                stored.user.updated_at = Utc::now();
                Ok(())
            }
        }
    }
}
