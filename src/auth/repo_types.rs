use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Account record in the database.
#[derive(Debug, Clone, FromRow)]
pub struct Account {
    pub id: Uuid,
    pub username: String,
    pub email: String,            // lower-cased on write
    pub password_hash: String,    // Argon2 PHC string
    pub first_name: String,
    pub last_name: String,
    pub created_at: OffsetDateTime,
}

/// Validated registration data, ready to insert.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
}
