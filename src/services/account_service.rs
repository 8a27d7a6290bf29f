use async_trait::async_trait;
use deadpool_postgres::Pool;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{Role, User};

/// Account record plus its stored credential hash, for login verification.
/// The hash never leaves the service layer.
#[derive(Debug, Clone)]
pub struct AccountCredentials {
    pub user: User,
    pub password_hash: String,
}

/// Account lookup and creation contract.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<AccountCredentials>, AppError>;

    async fn create(
        &self,
        name: Option<&str>,
        email: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<User, AppError>;
}

pub struct PgAccountStore {
    db: Pool,
}

impl PgAccountStore {
    pub fn new(db: Pool) -> Self {
        Self { db }
    }
}

fn user_from_row(row: &tokio_postgres::Row) -> Result<User, AppError> {
    let role_str: String = row.get("role");
    let role = Role::from_db(&role_str)
        .ok_or_else(|| AppError::Database(format!("invalid role in users row: {role_str}")))?;

    Ok(User {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        role,
        created_at: row.get("created_at"),
    })
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let client = self.db.get().await?;
        let row = client
            .query_opt(
                "SELECT id, name, email, role, created_at FROM users WHERE id = $1",
                &[&id],
            )
            .await?;

        row.map(|r| user_from_row(&r)).transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<AccountCredentials>, AppError> {
        let client = self.db.get().await?;
        let row = client
            .query_opt(
                "SELECT id, name, email, role, created_at, password_hash \
                 FROM users WHERE email = $1",
                &[&email],
            )
            .await?;

        row.map(|r| {
            Ok(AccountCredentials {
                user: user_from_row(&r)?,
                password_hash: r.get("password_hash"),
            })
        })
        .transpose()
    }

    async fn create(
        &self,
        name: Option<&str>,
        email: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<User, AppError> {
        let id = Uuid::new_v4();
        let client = self.db.get().await?;
        let row = client
            .query_one(
                "INSERT INTO users (id, name, email, password_hash, role) \
                 VALUES ($1, $2, $3, $4, $5) \
                 RETURNING id, name, email, role, created_at",
                &[&id, &name, &email, &password_hash, &role.as_db()],
            )
            .await?;

        user_from_row(&row)
    }
}
