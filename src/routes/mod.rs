/// Router Module Index
///
/// Routes are split by access level so that authentication is applied to a whole
/// module at once (via an Axum layer) rather than handler by handler.

/// Routes accessible without a token: health, signup and login.
pub mod public;

/// Routes protected by the `AuthUser` middleware layer. Role checks (child vs parent)
/// happen inside the handlers.
pub mod authenticated;
