use caltrack_core::types::{RequestContext, UserId, UserRole};
use serde::{Deserialize, Serialize};

/// Account record. The password hash never leaves the crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub role: UserRole,
    /// Free-text department label given at registration.
    pub department: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl User {
    pub fn context(&self) -> RequestContext {
        RequestContext {
            user_id: self.id.clone(),
            username: self.username.clone(),
            role: self.role.clone(),
        }
    }
}

/// Registration form.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub department: Option<String>,
}
