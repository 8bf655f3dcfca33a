//! Stable exit codes for erk commands.

use crate::core::errors::ErrorKind;

/// Command succeeded (or was previewed, or its script was written).
pub const OK: i32 = 0;
/// A precondition failed or the user declined; nothing was changed.
pub const PRECONDITION: i32 = 1;
/// The target branch or worktree is held elsewhere.
pub const CONFLICT: i32 = 2;
/// Execution failed after at least one mutation; see the printed step lists.
pub const PARTIAL_MUTATION: i32 = 3;
/// A collaborator tool was missing, timed out, or misbehaved.
pub const INFRASTRUCTURE: i32 = 4;
/// erk itself is wrong (e.g. an execution state missing a validated field).
pub const INTERNAL: i32 = 5;

pub fn for_kind(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::Precondition => PRECONDITION,
        ErrorKind::Conflict => CONFLICT,
        ErrorKind::PartialMutation => PARTIAL_MUTATION,
        ErrorKind::Infrastructure => INFRASTRUCTURE,
        ErrorKind::Internal => INTERNAL,
    }
}
