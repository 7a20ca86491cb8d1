//! Database access for customer records.
//!
//! All lookups and mutations go through this module; Postgres is the system
//! of record, so concurrent updates are left to its native transaction
//! semantics. The unique index on `email` arbitrates duplicate signups.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sqlx::{postgres::PgRow, PgPool, Row};
use tracing::{info_span, Instrument};
use utoipa::ToSchema;
use uuid::Uuid;

const CUSTOMER_COLUMNS: &str =
    "id, uid, email, fullname, password, salt, phone, is_active, is_blocked";

/// A full customer row. Never serialized; responses use [`CustomerProfile`].
#[derive(Debug, Clone)]
pub struct Customer {
    pub id: i64,
    pub uid: Uuid,
    pub email: String,
    pub fullname: String,
    pub password: String,
    pub salt: String,
    pub phone: String,
    pub is_active: bool,
    pub is_blocked: bool,
}

/// Public projection of a customer record: no password, no salt, no
/// internal id.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CustomerProfile {
    pub uid: Uuid,
    pub email: String,
    pub fullname: String,
    pub phone: String,
    pub is_active: bool,
    pub is_blocked: bool,
}

impl From<Customer> for CustomerProfile {
    fn from(customer: Customer) -> Self {
        Self {
            uid: customer.uid,
            email: customer.email,
            fullname: customer.fullname,
            phone: customer.phone,
            is_active: customer.is_active,
            is_blocked: customer.is_blocked,
        }
    }
}

/// Fields required to create a record on signup.
#[derive(Debug)]
pub struct NewCustomer<'a> {
    pub uid: Uuid,
    pub email: &'a str,
    pub fullname: &'a str,
    pub password: &'a str,
    pub salt: &'a str,
    pub phone: &'a str,
}

/// Outcome of an insert attempt; the unique index reports duplicates the
/// pre-check may have missed under concurrency.
#[derive(Debug)]
pub enum InsertOutcome {
    Created(Customer),
    DuplicateEmail,
}

/// Partial profile update; `None` fields are left untouched.
#[derive(Debug, Default)]
pub struct ProfileChanges {
    pub fullname: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl ProfileChanges {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.fullname.is_none() && self.email.is_none() && self.phone.is_none()
    }
}

fn customer_from_row(row: &PgRow) -> Customer {
    Customer {
        id: row.get("id"),
        uid: row.get("uid"),
        email: row.get("email"),
        fullname: row.get("fullname"),
        password: row.get("password"),
        salt: row.get("salt"),
        phone: row.get("phone"),
        is_active: row.get("is_active"),
        is_blocked: row.get("is_blocked"),
    }
}

/// Look up a customer by email, blocked or not (signup pre-check).
///
/// # Errors
/// Returns an error if the query fails.
pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Customer>> {
    let query = format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE email = $1");
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(email)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to look up customer by email")?;

    Ok(row.as_ref().map(customer_from_row))
}

/// Signin lookup: only records that are not blocked. A blocked account is
/// indistinguishable from a missing one to the caller.
///
/// # Errors
/// Returns an error if the query fails.
pub async fn find_unblocked_by_email(pool: &PgPool, email: &str) -> Result<Option<Customer>> {
    let query =
        format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE email = $1 AND NOT is_blocked");
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(email)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to look up customer for signin")?;

    Ok(row.as_ref().map(customer_from_row))
}

/// Look up a customer by public uid (authenticated routes).
///
/// # Errors
/// Returns an error if the query fails.
pub async fn find_by_uid(pool: &PgPool, uid: Uuid) -> Result<Option<Customer>> {
    let query = format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE uid = $1");
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(uid)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to look up customer by uid")?;

    Ok(row.as_ref().map(customer_from_row))
}

/// Create a record with an already-hashed password.
///
/// # Errors
/// Returns an error if the insert fails for any reason other than the email
/// unique index.
pub async fn insert_customer(pool: &PgPool, new: NewCustomer<'_>) -> Result<InsertOutcome> {
    let query = format!(
        "INSERT INTO customers (uid, email, fullname, password, salt, phone) \
         VALUES ($1, $2, $3, $4, $5, $6) RETURNING {CUSTOMER_COLUMNS}"
    );
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(new.uid)
        .bind(new.email)
        .bind(new.fullname)
        .bind(new.password)
        .bind(new.salt)
        .bind(new.phone)
        .fetch_one(pool)
        .instrument(span)
        .await;

    match row {
        Ok(row) => Ok(InsertOutcome::Created(customer_from_row(&row))),
        Err(err) if is_unique_violation(&err) => Ok(InsertOutcome::DuplicateEmail),
        Err(err) => Err(err).context("failed to insert customer"),
    }
}

/// Mark a customer active and rotate its public uid (successful signin).
///
/// # Errors
/// Returns an error if the update fails.
pub async fn begin_session(pool: &PgPool, id: i64, uid: Uuid) -> Result<bool> {
    let query = "UPDATE customers SET is_active = TRUE, uid = $1 WHERE id = $2";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(uid)
        .bind(id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to activate customer session")?;

    Ok(result.rows_affected() > 0)
}

/// Apply a partial profile update keyed by uid. Password, salt, uid, and the
/// account flags are not reachable through this path.
///
/// # Errors
/// Returns an error if the update fails.
pub async fn update_profile(pool: &PgPool, uid: Uuid, changes: &ProfileChanges) -> Result<bool> {
    let query = "UPDATE customers SET \
         fullname = COALESCE($1, fullname), \
         email = COALESCE($2, email), \
         phone = COALESCE($3, phone) \
         WHERE uid = $4";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(changes.fullname.as_deref())
        .bind(changes.email.as_deref())
        .bind(changes.phone.as_deref())
        .bind(uid)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to update customer record")?;

    Ok(result.rows_affected() > 0)
}

/// Mark a customer inactive (logout). The uid is left untouched.
///
/// # Errors
/// Returns an error if the update fails.
pub async fn end_session(pool: &PgPool, uid: Uuid) -> Result<bool> {
    let query = "UPDATE customers SET is_active = FALSE WHERE uid = $1";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(uid)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to deactivate customer session")?;

    Ok(result.rows_affected() > 0)
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some("23505"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
    use std::time::Duration;

    fn unreachable_pool() -> PgPool {
        let options = PgConnectOptions::new()
            .host("127.0.0.1")
            .port(1)
            .username("invalid")
            .database("invalid")
            .ssl_mode(PgSslMode::Disable);
        PgPoolOptions::new()
            .acquire_timeout(Duration::from_millis(200))
            .connect_lazy_with(options)
    }

    #[test]
    fn profile_hides_credentials() {
        let customer = Customer {
            id: 7,
            uid: Uuid::new_v4(),
            email: "a@b.tld".to_string(),
            fullname: "A B".to_string(),
            password: "digest".to_string(),
            salt: "salt".to_string(),
            phone: "+1555".to_string(),
            is_active: true,
            is_blocked: false,
        };

        let json = serde_json::to_value(CustomerProfile::from(customer)).unwrap();
        let object = json.as_object().unwrap();
        assert!(!object.contains_key("password"));
        assert!(!object.contains_key("salt"));
        assert!(!object.contains_key("id"));
        assert_eq!(object["email"], "a@b.tld");
    }

    #[test]
    fn profile_changes_emptiness() {
        assert!(ProfileChanges::default().is_empty());
        let changes = ProfileChanges {
            fullname: Some("X".to_string()),
            ..ProfileChanges::default()
        };
        assert!(!changes.is_empty());
    }

    #[tokio::test]
    async fn find_by_email_errors_without_db() {
        let pool = unreachable_pool();
        assert!(find_by_email(&pool, "a@b.tld").await.is_err());
    }

    #[tokio::test]
    async fn insert_customer_errors_without_db() {
        let pool = unreachable_pool();
        let new = NewCustomer {
            uid: Uuid::new_v4(),
            email: "a@b.tld",
            fullname: "A B",
            password: "digest",
            salt: "salt",
            phone: "+1555",
        };
        assert!(insert_customer(&pool, new).await.is_err());
    }

    #[tokio::test]
    async fn session_updates_error_without_db() {
        let pool = unreachable_pool();
        assert!(begin_session(&pool, 1, Uuid::new_v4()).await.is_err());
        assert!(end_session(&pool, Uuid::new_v4()).await.is_err());
    }
}
