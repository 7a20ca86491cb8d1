use axum::{extract::Extension, response::Json};
use sqlx::PgPool;
use tracing::instrument;

use crate::kliento::{
    handlers::{respond, Envelope, ErrorKind, HandlerError},
    session::AuthUser,
    store::{self, CustomerProfile},
};

#[utoipa::path(
    get,
    path = "/customer/profile",
    responses(
        (status = 200, description = "Envelope with the customer profile, or `Invalid Account` when the uid no longer resolves", body = CustomerProfile, content_type = "application/json"),
        (status = 401, description = "Missing or invalid session token"),
    ),
    tag = "customer"
)]
#[instrument(skip(pool))]
pub async fn profile(
    pool: Extension<PgPool>,
    Extension(auth): Extension<AuthUser>,
) -> Json<Envelope<CustomerProfile>> {
    respond(run(&pool, auth).await)
}

async fn run(pool: &PgPool, auth: AuthUser) -> Result<Envelope<CustomerProfile>, HandlerError> {
    let Some(customer) = store::find_by_uid(pool, auth.uid)
        .await
        .map_err(HandlerError::store)?
    else {
        return Err(HandlerError::new(ErrorKind::NotFound, "Invalid Account"));
    };

    Ok(Envelope::ok("success", CustomerProfile::from(customer)))
}
