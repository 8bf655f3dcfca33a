//! `erk branch create|checkout|delete`.
//!
//! Thin commands over the [`BranchManager`](crate::branch_manager::BranchManager).
//! Each runs a validation pipeline and then an execution pipeline; only
//! `checkout --worktree` hands execution to a generated script, since it
//! moves the shell.

mod checkout;
mod create;
mod delete;

pub use checkout::{CheckoutState, checkout_execution, checkout_validation, run_checkout};
pub use create::{CreateBranchState, create_execution, create_validation, run_create};
pub use delete::{DeleteBranchState, delete_execution, delete_validation, run_delete};
