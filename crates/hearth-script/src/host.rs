//! The ScriptHost contract consumed by the program engine

use std::any::Any;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use hearth_core::ProgramAddress;

use crate::error::{ProgramError, ScriptFault};

/// Future type returned by script host operations
///
/// The trait must stay object-safe, so operations return pinned boxed
/// futures instead of using `async fn`.
pub type ScriptFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// Outcome of a condition evaluation
///
/// `Ok(None)` means the condition produced no boolean; the engine treats it
/// as false.
pub type ConditionOutcome = Result<Option<bool>, ScriptFault>;

/// Outcome of a body run, carrying the script's return value if any
pub type RunOutcome = Result<Option<serde_json::Value>, ScriptFault>;

/// Source code of one program as handed to a host for compilation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramSource {
    /// Address of the program the source belongs to
    pub address: ProgramAddress,

    /// Trigger condition source
    pub condition: String,

    /// Action body source
    pub body: String,
}

impl ProgramSource {
    /// Bundle program source for compilation
    pub fn new(
        address: ProgramAddress,
        condition: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            address,
            condition: condition.into(),
            body: body.into(),
        }
    }
}

/// Opaque reference to a host's compiled condition/body pair
///
/// The engine stores the handle on the program record and passes it back on
/// every evaluation and run; only the host that produced it can interpret
/// the inner value.
#[derive(Clone)]
pub struct ScriptHandle {
    address: ProgramAddress,
    inner: Arc<dyn Any + Send + Sync>,
}

impl ScriptHandle {
    /// Wrap a host's compiled unit
    pub fn new(address: ProgramAddress, inner: Arc<dyn Any + Send + Sync>) -> Self {
        Self { address, inner }
    }

    /// Address of the program this handle was compiled for
    pub fn address(&self) -> ProgramAddress {
        self.address
    }

    /// The host's compiled unit
    pub fn inner(&self) -> &Arc<dyn Any + Send + Sync> {
        &self.inner
    }
}

impl std::fmt::Debug for ScriptHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptHandle")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// Result of compiling a program's sources
#[derive(Debug)]
pub struct CompileOutcome {
    /// Handle to the compiled units, absent when compilation failed
    pub handle: Option<ScriptHandle>,

    /// Compile diagnostics
    pub errors: Vec<ProgramError>,
}

/// A language host that compiles and evaluates program code
///
/// Implementations own the compiled artifacts behind [`ScriptHandle`]s.
/// `stop` requests termination of any active body worker for the handle;
/// the engine separately aborts the run's execution context.
pub trait ScriptHost: Send + Sync {
    /// Compile a program's condition and body sources
    fn compile(&self, source: ProgramSource) -> ScriptFuture<CompileOutcome>;

    /// Evaluate the trigger condition
    fn evaluate_condition(&self, handle: ScriptHandle) -> ScriptFuture<ConditionOutcome>;

    /// Run the action body with an optional options string
    fn run(&self, handle: ScriptHandle, options: Option<String>) -> ScriptFuture<RunOutcome>;

    /// Request termination of any active body worker for this handle
    fn stop(&self, handle: &ScriptHandle);
}

/// A host that compiles everything cleanly and does nothing
///
/// Conditions evaluate to false and bodies complete immediately. Useful for
/// wiring an engine without a language host and for smoke tests.
#[derive(Debug, Default)]
pub struct NullScriptHost;

impl ScriptHost for NullScriptHost {
    fn compile(&self, source: ProgramSource) -> ScriptFuture<CompileOutcome> {
        let handle = ScriptHandle::new(source.address, Arc::new(()));
        Box::pin(async move {
            CompileOutcome {
                handle: Some(handle),
                errors: Vec::new(),
            }
        })
    }

    fn evaluate_condition(&self, _handle: ScriptHandle) -> ScriptFuture<ConditionOutcome> {
        Box::pin(async { Ok(Some(false)) })
    }

    fn run(&self, _handle: ScriptHandle, _options: Option<String>) -> ScriptFuture<RunOutcome> {
        Box::pin(async { Ok(None) })
    }

    fn stop(&self, _handle: &ScriptHandle) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_null_host_compiles_cleanly() {
        let host = NullScriptHost;
        let outcome = host
            .compile(ProgramSource::new(ProgramAddress::new(1001), "", ""))
            .await;

        assert!(outcome.errors.is_empty());
        let handle = outcome.handle.unwrap();
        assert_eq!(handle.address(), ProgramAddress::new(1001));
    }

    #[tokio::test]
    async fn test_null_host_condition_is_false() {
        let host = NullScriptHost;
        let handle = ScriptHandle::new(ProgramAddress::new(1001), Arc::new(()));

        assert_eq!(host.evaluate_condition(handle).await.unwrap(), Some(false));
    }

    #[tokio::test]
    async fn test_null_host_run_completes() {
        let host = NullScriptHost;
        let handle = ScriptHandle::new(ProgramAddress::new(1001), Arc::new(()));

        assert_eq!(host.run(handle, None).await.unwrap(), None);
    }
}
