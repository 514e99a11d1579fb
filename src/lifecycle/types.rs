use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::enums::Role;

/// The identity an operation runs as. Always passed explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub id: Uuid,
    pub role: Role,
}

impl Caller {
    pub fn new(id: Uuid, role: Role) -> Self {
        Self { id, role }
    }

    pub fn parent(id: Uuid) -> Self {
        Self::new(id, Role::Parent)
    }

    pub fn nurse(id: Uuid) -> Self {
        Self::new(id, Role::Nurse)
    }

    pub fn manager(id: Uuid) -> Self {
        Self::new(id, Role::Manager)
    }

    pub fn admin(id: Uuid) -> Self {
        Self::new(id, Role::Admin)
    }
}

impl std::fmt::Display for Caller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.role, self.id)
    }
}
