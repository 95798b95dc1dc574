// ABOUTME: Sandboxed command execution for agent tasks
// ABOUTME: Picks a container or local-process provider once and runs commands through it

pub mod error;
pub mod executor;
pub mod providers;

pub use error::{Result, SandboxError};
pub use executor::{SandboxSettings, SandboxedExecutor, StrategyPreference};
pub use providers::{
    DockerProvider, ExecOutput, ExecRequest, ExecutionProvider, LocalProcessProvider,
    ProviderKind,
};
