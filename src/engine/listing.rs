//! Role-scoped "my work" listing.

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::{
    api::{user::Role, Identity},
    catalog::user,
    store::Store,
    ticket::Ticket,
    Error, Missing,
};

/// Which tickets a caller gets to see in their work list.
#[async_trait]
pub trait Scope: Send + Sync {
    async fn tickets(&self, store: &dyn Store) -> Result<Vec<Ticket>, Error>;
}

/// Tickets assigned to one executor.
pub struct PersonalScope {
    pub executor: user::Id,
}

#[async_trait]
impl Scope for PersonalScope {
    async fn tickets(&self, store: &dyn Store) -> Result<Vec<Ticket>, Error> {
        store.tickets_by_executor(self.executor).await
    }
}

/// Every ticket of the department `member` belongs to.
pub struct DepartmentScope {
    pub member: user::Id,
}

#[async_trait]
impl Scope for DepartmentScope {
    async fn tickets(&self, store: &dyn Store) -> Result<Vec<Ticket>, Error> {
        let member = store
            .user(self.member)
            .await?
            .ok_or(Missing::User(self.member))?;
        match member.department {
            Some(department) => store.tickets_by_department(department).await,
            None => Ok(Vec::new()),
        }
    }
}

/// Picks the scope for `identity`, or `None` for roles without a work list.
pub fn scope_for(identity: Identity) -> Option<Box<dyn Scope>> {
    match identity.role {
        Role::User => Some(Box::new(PersonalScope {
            executor: identity.user_id,
        })),
        Role::Coordinator => Some(Box::new(DepartmentScope {
            member: identity.user_id,
        })),
        Role::Other => None,
    }
}

/// Orders tickets overdue first, then urgent, then the rest. Each tier is
/// sorted by `assigned_end`, tickets without one last.
pub fn prioritize(
    mut tickets: Vec<Ticket>,
    now: OffsetDateTime,
) -> Vec<Ticket> {
    tickets.sort_by_key(|t| {
        let tier = if t.is_overdue(now) {
            0
        } else if t.urgent {
            1
        } else {
            2
        };
        (tier, t.assigned_end.is_none(), t.assigned_end)
    });
    tickets
}
