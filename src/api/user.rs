use serde::{Deserialize, Serialize};

pub use crate::catalog::user::{Id, Role};

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct User {
    pub id: Id,
    pub name: String,
}

impl From<&crate::catalog::User> for User {
    fn from(user: &crate::catalog::User) -> Self {
        Self {
            id: user.id,
            name: user.display_name(),
        }
    }
}

/// Who is acting, as vouched for by the identity collaborator.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_id: Id,
    pub role: Role,
}
