// Session module - who the connection authenticates as and where its token comes from
mod token;
mod user;

pub use token::{
    FallbackTokenProvider, SessionServiceTokenProvider, StoredTokenProvider, TokenProvider,
    is_valid_token,
};
pub use user::{SessionUser, UserType};
