//! Access gate: who is calling and which scope they get.
//!
//! Every business request passes through two steps before any handler runs:
//!
//! 1. A [`CallerResolver`] establishes the [`CallerIdentity`] from the
//!    request's credentials.
//! 2. The [`AccessGate`] turns the identity and the optional `X-Tenant-ID`
//!    attribute into a [`TenantScope`](bastion_persistence::tenant::TenantScope).
//!
//! Operators get the privileged scope; everyone else gets exactly one
//! tenant or is rejected. Privilege comes from the role alone, never from
//! the URL.
//!
//! Routes in an exempt [`OperationCategory`] are mounted outside the gate.

mod caller;
mod gate;

pub use caller::{
    AuthenticationError, CallerIdentity, CallerResolver, RequestEvidence, Role,
    StaticTokenResolver,
};
pub use gate::{AccessGate, GateError, OperationCategory};
