//! Postgres-backed store for profiles and trusted devices.

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::{
    NewTrustedDevice, RegisterDeviceOutcome, SecondFactorProfile, StoreError, TwoFactorStore,
};

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::Backend(err.to_string())
    }
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

fn query_span(operation: &str, statement: &str) -> tracing::Span {
    tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

#[async_trait]
impl TwoFactorStore for PgStore {
    async fn create_profile(
        &self,
        user_id: Uuid,
        email: &str,
        name: &str,
    ) -> Result<(), StoreError> {
        let query = r"
            INSERT INTO profiles (id, email, name)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO NOTHING
        ";
        sqlx::query(query)
            .bind(user_id)
            .bind(email)
            .bind(name)
            .execute(&self.pool)
            .instrument(query_span("INSERT", query))
            .await?;

        Ok(())
    }

    async fn find_profile(
        &self,
        user_id: Uuid,
    ) -> Result<Option<SecondFactorProfile>, StoreError> {
        let query = r"
            SELECT id, email, name, two_factor_enabled, totp_secret, pending_totp_secret, created_at
            FROM profiles
            WHERE id = $1
        ";
        let row = sqlx::query(query)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", query))
            .await?;

        Ok(row.map(|row| SecondFactorProfile {
            user_id: row.get("id"),
            email: row.get("email"),
            name: row.get("name"),
            two_factor_enabled: row.get("two_factor_enabled"),
            totp_secret: row.get("totp_secret"),
            pending_totp_secret: row.get("pending_totp_secret"),
            created_at: row.get("created_at"),
        }))
    }

    async fn set_pending_secret(
        &self,
        user_id: Uuid,
        email: &str,
        secret: &str,
    ) -> Result<(), StoreError> {
        // Single statement so a pending and an active secret never coexist,
        // even when enrollment restarts for an account with an active factor.
        let query = r"
            INSERT INTO profiles (id, email, name, pending_totp_secret)
            VALUES ($1, $2, '', $3)
            ON CONFLICT (id) DO UPDATE
            SET pending_totp_secret = EXCLUDED.pending_totp_secret,
                totp_secret = NULL,
                two_factor_enabled = FALSE
        ";
        sqlx::query(query)
            .bind(user_id)
            .bind(email)
            .bind(secret)
            .execute(&self.pool)
            .instrument(query_span("INSERT", query))
            .await?;

        Ok(())
    }

    async fn promote_pending_secret(
        &self,
        user_id: Uuid,
        expected_secret: &str,
    ) -> Result<bool, StoreError> {
        // Guarded by the expected value: a concurrent re-enrollment that
        // overwrote the pending secret turns this into a no-op.
        let query = r"
            UPDATE profiles
            SET totp_secret = pending_totp_secret,
                pending_totp_secret = NULL,
                two_factor_enabled = TRUE
            WHERE id = $1 AND pending_totp_secret = $2
        ";
        let result = sqlx::query(query)
            .bind(user_id)
            .bind(expected_secret)
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn clear_second_factor(&self, user_id: Uuid) -> Result<(), StoreError> {
        let query = r"
            UPDATE profiles
            SET totp_secret = NULL,
                pending_totp_secret = NULL,
                two_factor_enabled = FALSE
            WHERE id = $1
        ";
        sqlx::query(query)
            .bind(user_id)
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await?;

        Ok(())
    }

    async fn register_device(
        &self,
        user_id: Uuid,
        device: NewTrustedDevice<'_>,
    ) -> Result<RegisterDeviceOutcome, StoreError> {
        let query = r"
            INSERT INTO trusted_devices (user_id, device_id, device_model, device_platform)
            VALUES ($1, $2, $3, $4)
        ";
        let result = sqlx::query(query)
            .bind(user_id)
            .bind(device.device_id)
            .bind(device.device_model)
            .bind(device.device_platform)
            .execute(&self.pool)
            .instrument(query_span("INSERT", query))
            .await;

        match result {
            Ok(_) => Ok(RegisterDeviceOutcome::Registered),
            Err(err) if is_unique_violation(&err) => Ok(RegisterDeviceOutcome::AlreadyRegistered),
            Err(err) => Err(err.into()),
        }
    }

    async fn revoke_device(&self, user_id: Uuid, device_id: &str) -> Result<(), StoreError> {
        // Zero rows deleted is still success; revocation is idempotent.
        let query = "DELETE FROM trusted_devices WHERE user_id = $1 AND device_id = $2";
        sqlx::query(query)
            .bind(user_id)
            .bind(device_id)
            .execute(&self.pool)
            .instrument(query_span("DELETE", query))
            .await?;

        Ok(())
    }

    async fn device_registered(
        &self,
        user_id: Uuid,
        device_id: &str,
    ) -> Result<bool, StoreError> {
        let query =
            "SELECT EXISTS(SELECT 1 FROM trusted_devices WHERE user_id = $1 AND device_id = $2)";
        let row = sqlx::query(query)
            .bind(user_id)
            .bind(device_id)
            .fetch_one(&self.pool)
            .instrument(query_span("SELECT", query))
            .await?;

        Ok(row.get::<bool, _>(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::error::{DatabaseError, ErrorKind};
    use std::borrow::Cow;
    use std::error::Error as StdError;
    use std::fmt;

    #[derive(Debug)]
    struct TestDbError {
        code: Option<&'static str>,
    }

    impl fmt::Display for TestDbError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "test database error")
        }
    }

    impl StdError for TestDbError {}

    impl DatabaseError for TestDbError {
        fn message(&self) -> &'static str {
            "test database error"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            self.code.map(Cow::Borrowed)
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            ErrorKind::UniqueViolation
        }
    }

    #[test]
    fn is_unique_violation_matches_sqlstate() {
        let err = sqlx::Error::Database(Box::new(TestDbError {
            code: Some("23505"),
        }));
        assert!(is_unique_violation(&err));

        let err = sqlx::Error::Database(Box::new(TestDbError {
            code: Some("99999"),
        }));
        assert!(!is_unique_violation(&err));

        let err = sqlx::Error::RowNotFound;
        assert!(!is_unique_violation(&err));
    }

    #[test]
    fn store_error_from_sqlx_keeps_message() {
        let err = StoreError::from(sqlx::Error::RowNotFound);
        let StoreError::Backend(message) = err;
        assert!(message.contains("no rows"));
    }
}
