//! # Kliento (Customer Accounts API)
//!
//! `kliento` serves the customer account lifecycle: signup, signin, profile
//! fetch/update, and logout, backed by Postgres.
//!
//! ## Credentials
//!
//! Passwords are stored as salted argon2 digests; the salt lives in its own
//! column and plaintext never reaches the database or any response body.
//! Verification recomputes the digest and compares in constant time.
//!
//! ## Sessions
//!
//! Signin mints a signed session token through an injected [`kliento::session::SessionIssuer`]
//! and rotates the customer's public `uid`. Authenticated routes resolve the
//! bearer token back into a `{uid, is_blocked}` claim before any handler runs.
//!
//! ## Responses
//!
//! Every account handler answers with the uniform envelope
//! `{success, message, data?}`; business failures and collaborator failures
//! alike are reported in-band rather than as transport errors.

pub mod cli;
pub mod kliento;

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
