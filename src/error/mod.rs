mod keeper;
mod oauth;

pub use keeper::{ApiErrorBody, ApiErrorObject, KeeperError};
pub use oauth::OauthError;
