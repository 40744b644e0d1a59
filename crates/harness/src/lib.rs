mod auth;
mod site;

pub use auth::{RecordingMenu, StaticAuthorizer};
pub use site::{SEED_COURSE_CREATED, TestSite, UNIQUE_FIELD, USER_FIELD};

/// Routes `tracing` output through the test writer. Filter with `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
