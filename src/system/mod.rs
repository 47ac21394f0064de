pub mod exec;
pub mod host;

pub use exec::{CommandOutput, DevExecutor, Executor, Invocation, SystemExecutor};
pub use host::{effective_uid, machine, TargetUser};
