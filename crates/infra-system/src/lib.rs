// OIS Workbench Infrastructure - System Adapters
// Implements: CommandRunner (real OS processes)

pub mod environment;
pub mod platform;
pub mod resolve;
pub mod subprocess_executor;

pub use platform::{CommandFormatter, FormattedCommand, TargetPlatform};
pub use resolve::ExecutableResolver;
pub use subprocess_executor::SubprocessExecutor;
