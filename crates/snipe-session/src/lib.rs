//! The authenticated session: login/2FA handshake, validity checks, and the
//! navigation steps that must happen on the owning task.

pub mod manager;

pub use manager::{Credentials, LoginOutcome, SessionManager};
