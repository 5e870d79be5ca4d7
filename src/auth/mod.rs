pub mod authenticator;
pub mod error;
pub mod token;

pub use authenticator::TokenAuthenticator;
pub use error::AuthError;
pub use token::{BearerToken, TokenCell, TokenResponse, TokenStatus};
