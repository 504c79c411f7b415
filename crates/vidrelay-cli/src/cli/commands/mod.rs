//! One module per subcommand.

mod cancel;
mod cookies;
mod fetch;
mod history;
mod logs;
mod purge;
mod serve;
mod status;
mod submit;

pub use cancel::run_cancel;
pub use cookies::run_cookies;
pub use fetch::run_fetch;
pub use history::run_history;
pub use logs::run_logs;
pub use purge::run_purge;
pub use serve::run_serve;
pub use status::run_status;
pub use submit::run_submit;
