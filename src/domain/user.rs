use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub name: String,
    pub role: Role,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Member,
}

/// Things a signed-in user may be allowed to do. `Role::can` is the one
/// place that maps roles onto these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    ManageMembers,
    RecordOfflinePayment,
    SubmitRequests,
    MakePayments,
    /// Not subject to overdue-based access restriction.
    OverdueExempt,
}

impl Role {
    pub fn can(self, capability: Capability) -> bool {
        match (self, capability) {
            (Role::Admin, Capability::ManageMembers)
            | (Role::Admin, Capability::RecordOfflinePayment)
            | (Role::Admin, Capability::OverdueExempt) => true,
            (Role::Member, Capability::SubmitRequests)
            | (Role::Member, Capability::MakePayments) => true,
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Member => "member",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub session_token: String,
    pub user: User,
}
