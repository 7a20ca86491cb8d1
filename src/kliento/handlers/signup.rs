use axum::{extract::Extension, response::Json};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{debug, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::kliento::{
    handlers::{respond, valid_email, valid_password, valid_phone, Envelope, ErrorKind, HandlerError},
    password,
    store::{self, CustomerProfile, InsertOutcome, NewCustomer},
};

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SignupRequest {
    email: String,
    fullname: String,
    password: String,
    phone: String,
}

#[utoipa::path(
    post,
    path = "/customer/signup",
    request_body = SignupRequest,
    responses(
        (status = 200, description = "Envelope with the created profile on success, or a failure message such as `<email> already exists`", body = CustomerProfile, content_type = "application/json"),
    ),
    tag = "customer"
)]
#[instrument(skip(pool, payload))]
pub async fn signup(
    pool: Extension<PgPool>,
    payload: Option<Json<SignupRequest>>,
) -> Json<Envelope<CustomerProfile>> {
    let Some(Json(request)) = payload else {
        return Json(Envelope::fail("Missing payload"));
    };

    debug!("signup request for {}", request.email);

    respond(run(&pool, &request).await)
}

async fn run(
    pool: &PgPool,
    request: &SignupRequest,
) -> Result<Envelope<CustomerProfile>, HandlerError> {
    if !valid_email(&request.email) {
        return Err(HandlerError::new(ErrorKind::InvalidInput, "Invalid email"));
    }

    if !valid_password(&request.password) {
        return Err(HandlerError::new(ErrorKind::InvalidInput, "Invalid password"));
    }

    if !request.phone.is_empty() && !valid_phone(&request.phone) {
        return Err(HandlerError::new(ErrorKind::InvalidInput, "Invalid phone"));
    }

    if store::find_by_email(pool, &request.email)
        .await
        .map_err(HandlerError::store)?
        .is_some()
    {
        return Err(duplicate_email(&request.email));
    }

    let salt = password::generate_salt();
    let digest = password::derive(&request.password, &salt).map_err(HandlerError::store)?;

    let new = NewCustomer {
        uid: Uuid::new_v4(),
        email: &request.email,
        fullname: &request.fullname,
        password: &digest,
        salt: &salt,
        phone: &request.phone,
    };

    // The pre-check races with concurrent signups; the unique index on email
    // has the final word.
    match store::insert_customer(pool, new)
        .await
        .map_err(HandlerError::store)?
    {
        InsertOutcome::Created(customer) => {
            Ok(Envelope::ok("success", CustomerProfile::from(customer)))
        }
        InsertOutcome::DuplicateEmail => Err(duplicate_email(&request.email)),
    }
}

fn duplicate_email(email: &str) -> HandlerError {
    HandlerError::new(ErrorKind::Conflict, format!("{email} already exists"))
}
