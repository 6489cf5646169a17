//! Authentication for the studio server
//!
//! Protected endpoints take an [`AuthenticatedUser`] argument; the
//! extractor checks the HS256 bearer token against `auth.jwt_secret`.

mod extractor;
mod token;

pub use extractor::AuthenticatedUser;
pub use token::{decode_token, issue_token, issue_token_at, Claims};
