//! Legal status transitions for medication requests.
//!
//! Every status change goes through `next_status`; nothing else in the
//! crate compares status values to decide what is allowed.

use crate::models::enums::{RequestAction, RequestStatus, Role};

use RequestAction::*;
use RequestStatus::*;

/// (from, action, to). PendingConfirmation is never a target except
/// for the parent's own edit, which keeps it in place.
pub const TRANSITIONS: &[(RequestStatus, RequestAction, RequestStatus)] = &[
    (PendingConfirmation, Edit, PendingConfirmation),
    (PendingConfirmation, Accept, Approved),
    (PendingConfirmation, Reject, Rejected),
    (Approved, MarkAdministered, Administered),
    (Approved, Discontinue, Discontinued),
];

/// Status reached by applying `action` in `from`, or `None` if illegal.
pub fn next_status(from: RequestStatus, action: RequestAction) -> Option<RequestStatus> {
    TRANSITIONS
        .iter()
        .find(|(f, a, _)| *f == from && *a == action)
        .map(|(_, _, to)| *to)
}

/// Roles permitted to perform an action.
pub fn allowed_roles(action: RequestAction) -> &'static [Role] {
    match action {
        Edit => &[Role::Parent],
        Accept | Reject | MarkAdministered => &[Role::Nurse],
        Discontinue => &[Role::Nurse, Role::Manager],
    }
}

pub fn role_may(role: Role, action: RequestAction) -> bool {
    allowed_roles(action).contains(&role)
}
