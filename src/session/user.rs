use crate::types::RealtimeError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Role of the signed-in user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    Customer,
    Admin,
    Driver,
}

impl UserType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Admin => "admin",
            Self::Driver => "driver",
        }
    }
}

impl FromStr for UserType {
    type Err = RealtimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "customer" => Ok(Self::Customer),
            "admin" => Ok(Self::Admin),
            "driver" => Ok(Self::Driver),
            other => Err(RealtimeError::Config(format!("Unknown user type '{}'", other))),
        }
    }
}

impl std::fmt::Display for UserType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The user a realtime session authenticates as
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUser {
    pub id: String,
    pub user_type: UserType,
}

impl SessionUser {
    pub fn new(id: impl Into<String>, user_type: UserType) -> Self {
        Self {
            id: id.into(),
            user_type,
        }
    }
}
