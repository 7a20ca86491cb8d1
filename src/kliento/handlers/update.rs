use axum::{extract::Extension, response::Json};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::instrument;
use utoipa::ToSchema;

use crate::kliento::{
    handlers::{
        normalize_optional, respond, valid_email, valid_phone, Envelope, ErrorKind, HandlerError,
    },
    session::AuthUser,
    store::{self, CustomerProfile, ProfileChanges},
};

/// Partial update; absent or blank fields are left untouched. Password,
/// salt, uid and the account flags cannot be changed here.
#[derive(ToSchema, Serialize, Deserialize, Debug, Default)]
pub struct UpdateRequest {
    fullname: Option<String>,
    email: Option<String>,
    phone: Option<String>,
}

#[utoipa::path(
    patch,
    path = "/customer/profile",
    request_body = UpdateRequest,
    responses(
        (status = 200, description = "Envelope with `Update Successful`, or `Could not update record` when the uid no longer resolves", content_type = "application/json"),
        (status = 401, description = "Missing or invalid session token"),
    ),
    tag = "customer"
)]
#[instrument(skip(pool, payload))]
pub async fn update(
    pool: Extension<PgPool>,
    Extension(auth): Extension<AuthUser>,
    payload: Option<Json<UpdateRequest>>,
) -> Json<Envelope<CustomerProfile>> {
    let Some(Json(request)) = payload else {
        return Json(Envelope::fail("Missing payload"));
    };

    respond(run(&pool, auth, request).await)
}

async fn run(
    pool: &PgPool,
    auth: AuthUser,
    request: UpdateRequest,
) -> Result<Envelope<CustomerProfile>, HandlerError> {
    let changes = ProfileChanges {
        fullname: normalize_optional(request.fullname),
        email: normalize_optional(request.email),
        phone: normalize_optional(request.phone),
    };

    if changes.is_empty() {
        return Err(HandlerError::new(
            ErrorKind::InvalidInput,
            "No updates provided",
        ));
    }

    if let Some(email) = &changes.email {
        if !valid_email(email) {
            return Err(HandlerError::new(ErrorKind::InvalidInput, "Invalid email"));
        }
    }

    if let Some(phone) = &changes.phone {
        if !valid_phone(phone) {
            return Err(HandlerError::new(ErrorKind::InvalidInput, "Invalid phone"));
        }
    }

    let updated = store::update_profile(pool, auth.uid, &changes)
        .await
        .map_err(HandlerError::store)?;

    if !updated {
        return Err(HandlerError::new(
            ErrorKind::UpdateFailed,
            "Could not update record",
        ));
    }

    Ok(Envelope::ok_message("Update Successful"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
    use std::time::Duration;
    use uuid::Uuid;

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

    fn auth() -> AuthUser {
        AuthUser {
            uid: Uuid::new_v4(),
            is_blocked: false,
        }
    }

    #[tokio::test]
    async fn empty_update_is_rejected_before_the_store() {
        let err = run(&unreachable_pool(), auth(), UpdateRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert_eq!(err.message(), "No updates provided");
    }

    #[tokio::test]
    async fn blank_fields_count_as_absent() {
        let request = UpdateRequest {
            fullname: Some("   ".to_string()),
            email: None,
            phone: None,
        };
        let err = run(&unreachable_pool(), auth(), request)
            .await
            .unwrap_err();
        assert_eq!(err.message(), "No updates provided");
    }

    #[tokio::test]
    async fn invalid_replacement_email_is_rejected() {
        let request = UpdateRequest {
            email: Some("nope".to_string()),
            ..UpdateRequest::default()
        };
        let err = run(&unreachable_pool(), auth(), request)
            .await
            .unwrap_err();
        assert_eq!(err.message(), "Invalid email");
    }

    #[tokio::test]
    async fn store_failure_is_forwarded_in_band() {
        let request = UpdateRequest {
            fullname: Some("X".to_string()),
            ..UpdateRequest::default()
        };
        let err = run(&unreachable_pool(), auth(), request)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Store);
    }
}
