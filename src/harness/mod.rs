pub mod batch;
pub mod feature;
pub mod types;

pub use batch::{run_all, should_run};
pub use feature::{GENERIC_CHECK_STEP, ensure_dependency, run_feature_in_session, run_feature_test};
pub use types::{CommandClass, Credentials, RunOptions, SettleDelays, Timeouts};
