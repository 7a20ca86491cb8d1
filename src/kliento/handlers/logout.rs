use axum::{extract::Extension, response::Json};
use sqlx::PgPool;
use tracing::instrument;

use crate::kliento::{
    handlers::{respond, Envelope, ErrorKind, HandlerError},
    session::AuthUser,
    store::{self, CustomerProfile},
};

#[utoipa::path(
    post,
    path = "/customer/logout",
    responses(
        (status = 200, description = "Envelope with `Logout Successful`, or `Could not update record` when the uid no longer resolves", content_type = "application/json"),
        (status = 401, description = "Missing or invalid session token"),
    ),
    tag = "customer"
)]
#[instrument(skip(pool))]
pub async fn logout(
    pool: Extension<PgPool>,
    Extension(auth): Extension<AuthUser>,
) -> Json<Envelope<CustomerProfile>> {
    respond(run(&pool, auth).await)
}

// Clears is_active only; uid and credentials stay as they are.
async fn run(pool: &PgPool, auth: AuthUser) -> Result<Envelope<CustomerProfile>, HandlerError> {
    let updated = store::end_session(pool, auth.uid)
        .await
        .map_err(HandlerError::store)?;

    if !updated {
        return Err(HandlerError::new(
            ErrorKind::UpdateFailed,
            "Could not update record",
        ));
    }

    Ok(Envelope::ok_message("Logout Successful"))
}
