//! Program lifecycle management
//!
//! The ProgramManager owns the registry of programs and their lifecycle:
//! add/remove, enable/disable, PID allocation, engine-wide flags, and the
//! publication of observable program properties.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use thiserror::Error;
use tracing::{debug, info, trace};

use hearth_bus::SharedProgramEventBus;
use hearth_core::{
    Context, ProgramAddress, ProgramEvent, ProgramStatus, PropertyChange, USER_SPACE_BASE,
    PROP_PROGRAM_STATUS, PROP_RUNTIME_ERROR,
};
use hearth_script::{CodeBlock, ProgramError, ScriptFault, ScriptHost};

use crate::api::DynamicApiRegistry;
use crate::program::{Program, ProgramConfig};
use crate::store::ArtifactStore;
use crate::{evaluator, router, runner, scheduler};

/// Errors from address-keyed manager operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProgramManagerError {
    #[error("program not found: {0}")]
    NotFound(ProgramAddress),
}

/// Result type for manager operations
pub type ManagerResult<T> = Result<T, ProgramManagerError>;

/// Registry and lifecycle façade for automation programs
///
/// The manager is live from construction; [`stop_all`](Self::stop_all) is
/// the single one-way shutdown transition. The engine-wide enabled flag is
/// distinct from per-program enablement: while it is false the manager
/// still accepts registrations but suppresses body dispatch in post-change
/// routing and in tick evaluation.
pub struct ProgramManager {
    registry: RwLock<Vec<Arc<Program>>>,
    bus: SharedProgramEventBus,
    host: Arc<dyn ScriptHost>,
    api: Arc<DynamicApiRegistry>,
    store: ArtifactStore,
    /// Engine-wide master switch for body dispatch
    enabled: AtomicBool,
    /// Engine lifecycle flag, flipped once by stop_all
    running: AtomicBool,
}

impl ProgramManager {
    /// Create a live manager publishing to `bus` and evaluating via `host`
    pub fn new(
        bus: SharedProgramEventBus,
        host: Arc<dyn ScriptHost>,
        programs_dir: impl Into<PathBuf>,
    ) -> Arc<Self> {
        Arc::new(Self {
            registry: RwLock::new(Vec::new()),
            bus,
            host,
            api: Arc::new(DynamicApiRegistry::new()),
            store: ArtifactStore::new(programs_dir),
            enabled: AtomicBool::new(true),
            running: AtomicBool::new(true),
        })
    }

    /// Whether the engine is still live
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Whether body dispatch is currently allowed engine-wide
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Flip the engine-wide body-dispatch switch
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
        info!(enabled, "Program engine dispatch switch changed");
    }

    /// The command URI registry
    pub fn api(&self) -> &Arc<DynamicApiRegistry> {
        &self.api
    }

    /// The on-disk artifact store
    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub(crate) fn host(&self) -> &Arc<dyn ScriptHost> {
        &self.host
    }

    /// Stable view of the registry for one routing or shutdown pass
    pub fn snapshot(&self) -> Vec<Arc<Program>> {
        self.registry.read().expect("lock poisoned").clone()
    }

    /// Look up a program by address
    pub fn get(&self, address: ProgramAddress) -> Option<Arc<Program>> {
        self.registry
            .read()
            .expect("lock poisoned")
            .iter()
            .find(|p| p.address() == address)
            .cloned()
    }

    /// Number of registered programs
    pub fn count(&self) -> usize {
        self.registry.read().expect("lock poisoned").len()
    }

    /// Allocate the next free program address
    ///
    /// Strictly greater than every existing address and never below
    /// [`USER_SPACE_BASE`].
    pub fn generate_pid(&self) -> ProgramAddress {
        next_pid(&self.registry.read().expect("lock poisoned"))
    }

    /// Register a program
    ///
    /// A missing, colliding, or below-user-space address is replaced by the
    /// PID allocator. The program is announced as idle, and its tick
    /// scheduler starts when it is enabled.
    pub fn add(self: &Arc<Self>, config: ProgramConfig) -> Arc<Program> {
        let program = {
            let mut registry = self.registry.write().expect("lock poisoned");
            let address = match config.address.map(ProgramAddress::new) {
                Some(requested)
                    if requested.is_user_space()
                        && !registry.iter().any(|p| p.address() == requested) =>
                {
                    requested
                }
                _ => next_pid(&registry),
            };
            let program = Arc::new(Program::from_config(config, address));
            registry.push(program.clone());
            program
        };

        info!(
            address = %program.address(),
            name = %program.name(),
            "Added program"
        );
        self.publish_status(&program, ProgramStatus::Idle);

        if program.is_enabled() {
            scheduler::start(self, &program);
        }

        program
    }

    /// Remove a program: disable it, stop body and scheduler, drop it from
    /// the registry, and delete its on-disk artifacts (best-effort)
    pub async fn remove(self: &Arc<Self>, address: ProgramAddress) -> ManagerResult<Arc<Program>> {
        let program = self
            .get(address)
            .ok_or(ProgramManagerError::NotFound(address))?;

        self.disable_program(&program).await;
        runner::stop(self, &program).await;

        self.registry
            .write()
            .expect("lock poisoned")
            .retain(|p| p.address() != address);

        self.store.remove_artifacts(address);

        info!(address = %address, name = %program.name(), "Removed program");
        Ok(program)
    }

    /// Enable a program by address
    pub fn enable(self: &Arc<Self>, address: ProgramAddress) -> ManagerResult<()> {
        let program = self
            .get(address)
            .ok_or(ProgramManagerError::NotFound(address))?;
        self.enable_program(&program);
        Ok(())
    }

    /// Disable a program by address
    pub async fn disable(self: &Arc<Self>, address: ProgramAddress) -> ManagerResult<()> {
        let program = self
            .get(address)
            .ok_or(ProgramManagerError::NotFound(address))?;
        self.disable_program(&program).await;
        Ok(())
    }

    /// Toggle a program, returning its new enabled state
    pub async fn toggle(self: &Arc<Self>, address: ProgramAddress) -> ManagerResult<bool> {
        let program = self
            .get(address)
            .ok_or(ProgramManagerError::NotFound(address))?;

        if program.is_enabled() {
            self.disable_program(&program).await;
            Ok(false)
        } else {
            self.enable_program(&program);
            Ok(true)
        }
    }

    /// Compile a program's sources, storing handle and diagnostics
    ///
    /// Compile errors do not disable the program.
    pub async fn compile(&self, address: ProgramAddress) -> ManagerResult<Vec<ProgramError>> {
        let program = self
            .get(address)
            .ok_or(ProgramManagerError::NotFound(address))?;

        let outcome = self.host.compile(program.source()).await;
        debug!(
            address = %address,
            errors = outcome.errors.len(),
            compiled = outcome.handle.is_some(),
            "Compiled program"
        );
        program.set_script_handle(outcome.handle);
        program.set_script_errors(outcome.errors.clone());
        Ok(outcome.errors)
    }

    /// Start a program's body directly, bypassing its trigger condition
    ///
    /// Subject to the same single-flight rule as triggered runs.
    pub async fn run(
        self: &Arc<Self>,
        address: ProgramAddress,
        options: Option<String>,
    ) -> ManagerResult<()> {
        let program = self
            .get(address)
            .ok_or(ProgramManagerError::NotFound(address))?;

        if !program.is_enabled() {
            debug!(address = %address, "Program is disabled, not running");
            return Ok(());
        }

        runner::start(self, &program, options).await;
        Ok(())
    }

    /// Re-evaluate a program's trigger, returning whether it is satisfied
    ///
    /// Applies the trigger mode on top of the raw script result and records
    /// the evaluation on the program; the body is not started.
    pub async fn evaluate_condition(
        self: &Arc<Self>,
        address: ProgramAddress,
    ) -> ManagerResult<bool> {
        let program = self
            .get(address)
            .ok_or(ProgramManagerError::NotFound(address))?;
        Ok(evaluator::evaluate(self, &program).await)
    }

    /// Deliver a module property change through all enabled programs
    ///
    /// The pre-change stage runs synchronously on the caller; the
    /// post-change stage is dispatched to the runtime. Returns false when a
    /// pre-change hook halted propagation, in which case the post-change
    /// stage is not emitted.
    pub fn handle_property_change(self: &Arc<Self>, change: PropertyChange) -> bool {
        trace!(
            module = %change.module.address(),
            parameter = %change.parameter.name(),
            "Routing property change"
        );

        if !router::module_is_changing(self, &change) {
            return false;
        }

        let manager = self.clone();
        tokio::spawn(async move {
            router::module_changed(&manager, &change);
        });
        true
    }

    /// Shut the engine down: no further dispatch, all schedulers and bodies
    /// stopped
    pub async fn stop_all(self: &Arc<Self>) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }

        info!("Stopping program engine");

        for program in self.snapshot() {
            scheduler::stop(&program).await;
            runner::stop(self, &program).await;
        }
    }

    fn enable_program(self: &Arc<Self>, program: &Arc<Program>) {
        if program.swap_enabled(true) {
            return;
        }

        info!(address = %program.address(), name = %program.name(), "Enabled program");
        self.publish_status(program, ProgramStatus::Enabled);
        scheduler::start(self, program);
    }

    async fn disable_program(self: &Arc<Self>, program: &Arc<Program>) {
        if !program.swap_enabled(false) {
            return;
        }

        info!(address = %program.address(), name = %program.name(), "Disabled program");
        self.publish_status(program, ProgramStatus::Disabled);
        scheduler::stop(program).await;
    }

    /// Disable a program from inside the engine (fault, one-shot retire)
    ///
    /// Unlike [`disable`](Self::disable) this never joins the tick task -
    /// the call may originate from inside that very task. The scheduler is
    /// signalled and winds down on its own; a running body is left alone.
    pub(crate) fn auto_disable(&self, program: &Program) {
        if !program.swap_enabled(false) {
            return;
        }

        info!(address = %program.address(), name = %program.name(), "Auto-disabled program");
        self.publish_status(program, ProgramStatus::Disabled);
        program.signal_scheduler();
    }

    pub(crate) fn publish_status(&self, program: &Program, status: ProgramStatus) {
        self.bus.fire(ProgramEvent::new(
            program.address(),
            program.domain(),
            PROP_PROGRAM_STATUS,
            status.as_str(),
            Context::for_program(program.address()),
        ));
    }

    pub(crate) fn publish_runtime_error(
        &self,
        program: &Program,
        code_block: CodeBlock,
        fault: &ScriptFault,
    ) {
        let value = format!("{}: {}", code_block.prefix(), fault.sanitized_message());
        self.bus.fire(ProgramEvent::new(
            program.address(),
            program.domain(),
            PROP_RUNTIME_ERROR,
            value,
            Context::for_program(program.address()),
        ));
    }
}

fn next_pid(registry: &[Arc<Program>]) -> ProgramAddress {
    let next = registry
        .iter()
        .map(|p| p.address().value() + 1)
        .max()
        .unwrap_or(USER_SPACE_BASE);
    ProgramAddress::new(next.max(USER_SPACE_BASE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_bus::ProgramEventBus;
    use hearth_script::NullScriptHost;

    fn test_manager() -> Arc<ProgramManager> {
        ProgramManager::new(
            Arc::new(ProgramEventBus::new()),
            Arc::new(NullScriptHost),
            std::env::temp_dir().join("hearth-manager-tests"),
        )
    }

    fn config(name: &str, address: Option<u32>) -> ProgramConfig {
        ProgramConfig {
            address,
            name: name.to_string(),
            description: None,
            domain: "automation".to_string(),
            condition_type: Default::default(),
            condition: String::new(),
            body: String::new(),
            enabled: false,
        }
    }

    #[tokio::test]
    async fn test_generate_pid_starts_at_user_space_base() {
        let manager = test_manager();
        assert_eq!(manager.generate_pid(), ProgramAddress::new(USER_SPACE_BASE));
    }

    #[tokio::test]
    async fn test_generate_pid_exceeds_every_address() {
        let manager = test_manager();
        manager.add(config("a", Some(1000)));
        manager.add(config("b", Some(1207)));
        manager.add(config("c", Some(1005)));

        let pid = manager.generate_pid();
        assert_eq!(pid, ProgramAddress::new(1208));
        for program in manager.snapshot() {
            assert!(pid > program.address());
        }
    }

    #[tokio::test]
    async fn test_add_assigns_address_when_absent() {
        let manager = test_manager();
        let program = manager.add(config("auto", None));
        assert_eq!(program.address(), ProgramAddress::new(USER_SPACE_BASE));
    }

    #[tokio::test]
    async fn test_add_reassigns_colliding_address() {
        let manager = test_manager();
        manager.add(config("first", Some(1001)));
        let second = manager.add(config("second", Some(1001)));

        assert_eq!(second.address(), ProgramAddress::new(1002));
        assert_eq!(manager.count(), 2);
    }

    #[tokio::test]
    async fn test_add_reassigns_below_user_space() {
        let manager = test_manager();
        let program = manager.add(config("reserved", Some(7)));
        assert!(program.address().is_user_space());
    }

    #[tokio::test]
    async fn test_unknown_address_errors() {
        let manager = test_manager();
        let missing = ProgramAddress::new(4040);

        assert_eq!(
            manager.enable(missing),
            Err(ProgramManagerError::NotFound(missing))
        );
        assert_eq!(
            manager.toggle(missing).await,
            Err(ProgramManagerError::NotFound(missing))
        );
    }

    #[tokio::test]
    async fn test_toggle() {
        let manager = test_manager();
        let program = manager.add(config("toggled", None));
        let address = program.address();

        assert_eq!(manager.toggle(address).await, Ok(true));
        assert!(program.is_enabled());

        assert_eq!(manager.toggle(address).await, Ok(false));
        assert!(!program.is_enabled());
    }

    #[tokio::test]
    async fn test_remove_unregisters() {
        let manager = test_manager();
        let program = manager.add(config("doomed", None));
        let address = program.address();

        manager.remove(address).await.unwrap();
        assert!(manager.get(address).is_none());
        assert_eq!(manager.count(), 0);

        assert_eq!(
            manager.remove(address).await.unwrap_err(),
            ProgramManagerError::NotFound(address)
        );
    }

    #[tokio::test]
    async fn test_compile_stores_handle() {
        let manager = test_manager();
        let program = manager.add(config("compiled", None));

        let errors = manager.compile(program.address()).await.unwrap();
        assert!(errors.is_empty());
        assert!(program.script_handle().is_some());
    }
}
