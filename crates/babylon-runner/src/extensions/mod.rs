//! Demo extensions hosted by the runner.

mod example_actor;
mod example_driver;
mod file_reporter;
mod live_reporter;

pub use example_actor::ExampleActor;
pub use example_driver::ExampleDriver;
pub use file_reporter::FileReporter;
pub use live_reporter::LiveLogReporter;

use std::path::{Component, Path};

/// Secret used when neither `BABYLON_SECRET` nor a secret file is present.
pub const FALLBACK_SECRET: &str = "default-secret";

/// Whether a session id can be used as a file name inside a log directory.
pub(crate) fn is_safe_file_stem(session_id: &str) -> bool {
    if session_id.contains(['/', '\\']) {
        return false;
    }
    let mut components = Path::new(session_id).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}
