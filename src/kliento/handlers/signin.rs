use axum::{extract::Extension, response::Json};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{debug, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::kliento::{
    handlers::{respond, Envelope, ErrorKind, HandlerError},
    password,
    session::{DynSessionIssuer, SessionIssuer},
    store,
};

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SigninRequest {
    email: String,
    password: String,
}

#[utoipa::path(
    post,
    path = "/customer/signin",
    request_body = SigninRequest,
    responses(
        (status = 200, description = "Envelope with a session token on success; `Account Not Valid` or `Wrong Credentials` on failure", body = String, content_type = "application/json"),
    ),
    tag = "customer"
)]
#[instrument(skip(pool, issuer, payload))]
pub async fn signin(
    pool: Extension<PgPool>,
    issuer: Extension<DynSessionIssuer>,
    payload: Option<Json<SigninRequest>>,
) -> Json<Envelope<String>> {
    let Some(Json(request)) = payload else {
        return Json(Envelope::fail("Missing payload"));
    };

    debug!("signin request for {}", request.email);

    respond(run(&pool, issuer.as_ref(), &request).await)
}

async fn run(
    pool: &PgPool,
    issuer: &dyn SessionIssuer,
    request: &SigninRequest,
) -> Result<Envelope<String>, HandlerError> {
    let lookup = store::find_unblocked_by_email(pool, &request.email)
        .await
        .map_err(HandlerError::store)?;

    let customer = authorize(lookup, &request.password)?;

    // Rotate the public uid first so the token is minted for the identity
    // the record will carry after this signin.
    let fresh_uid = Uuid::new_v4();
    let updated = store::begin_session(pool, customer.id, fresh_uid)
        .await
        .map_err(HandlerError::store)?;

    if !updated {
        return Err(HandlerError::new(
            ErrorKind::UpdateFailed,
            "Could not update record",
        ));
    }

    let token = issuer
        .issue(fresh_uid, customer.is_blocked)
        .map_err(HandlerError::session)?;

    Ok(Envelope::ok("success", token))
}

// Credential check over an already-fetched row; nothing is mutated until
// this succeeds. Blocked accounts are filtered in the lookup, so they are
// indistinguishable from missing ones here.
fn authorize(
    lookup: Option<store::Customer>,
    password: &str,
) -> Result<store::Customer, HandlerError> {
    let Some(customer) = lookup else {
        return Err(HandlerError::new(
            ErrorKind::AccountNotValid,
            "Account Not Valid",
        ));
    };

    let verified =
        password::verify(password, &customer.salt, &customer.password).map_err(HandlerError::store)?;

    if !verified {
        return Err(HandlerError::new(
            ErrorKind::InvalidCredentials,
            "Wrong Credentials",
        ));
    }

    Ok(customer)
}
