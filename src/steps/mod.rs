pub mod actions;
pub mod classify;
pub mod extract;

pub use actions::{Evidence, StepContext};
pub use classify::{ActionKind, classify, is_credential_fill};
pub use extract::{
    InputSpec, RouteEntry, RouteTable, extract_input, extract_target, resolve_url, verify_target,
    wait_duration,
};
