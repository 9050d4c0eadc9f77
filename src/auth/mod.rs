mod gate;
mod keys;
mod token;

pub use gate::{requires_auth, AuthContext, AuthLayer, Credential};
pub use keys::{
    Clock, HttpKeyFetcher, KeyCache, KeyFetchError, KeyFetchOutcome, KeyFetcher, SystemClock,
    KEY_ENDPOINT_PATH,
};
pub use token::{AuthError, Claims, TokenValidator, ValidatedToken};
