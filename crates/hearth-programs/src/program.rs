//! Program records
//!
//! A [`Program`] is the in-memory state of one automation program: identity,
//! trigger mode, enablement, evaluation state, diagnostics, compiled script
//! handle, and the coordination primitives the engine uses to schedule it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, MutexGuard};
use tokio::task::JoinHandle;

use hearth_core::{Module, ModuleParameter, ProgramAddress};
use hearth_script::{ProgramError, ProgramSource, ScriptHandle};

use crate::scheduler::SchedulerHandle;

/// A pre-change or post-change hook
///
/// Hooks receive the module and the changing parameter; returning false
/// halts further propagation of the change.
pub type ChangeHook = Arc<dyn Fn(&Module, &ModuleParameter) -> bool + Send + Sync>;

/// Trigger mode applied on top of the raw condition result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConditionType {
    /// Run whenever the condition evaluates true
    #[default]
    OnTrue,

    /// Run whenever the condition evaluates false
    OnFalse,

    /// Run on false→true transitions of the condition
    OnSwitchTrue,

    /// Run on true→false transitions of the condition
    OnSwitchFalse,

    /// Run on first satisfaction, then auto-disable
    Once,
}

/// Program configuration as loaded from storage or an API surface
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramConfig {
    /// Program address; assigned from the PID allocator when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<u32>,

    /// Human-readable name
    pub name: String,

    /// Description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Display domain
    #[serde(default = "default_domain")]
    pub domain: String,

    /// Trigger mode
    #[serde(default)]
    pub condition_type: ConditionType,

    /// Trigger condition source
    #[serde(default)]
    pub condition: String,

    /// Action body source
    #[serde(default)]
    pub body: String,

    /// Whether the program starts enabled
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_domain() -> String {
    "automation".to_string()
}

fn default_enabled() -> bool {
    true
}

/// In-memory state of one automation program
pub struct Program {
    address: ProgramAddress,
    name: String,
    description: Option<String>,
    domain: String,

    condition_type: RwLock<ConditionType>,
    enabled: AtomicBool,
    running: AtomicBool,
    last_condition_result: AtomicBool,
    trigger_time: RwLock<Option<DateTime<Utc>>>,
    script_errors: RwLock<Vec<ProgramError>>,

    condition_source: RwLock<String>,
    body_source: RwLock<String>,
    script_handle: RwLock<Option<ScriptHandle>>,

    // Serializes condition evaluation with itself and with body entry.
    // It does not cover the body's runtime.
    operation_lock: Mutex<()>,

    will_change_hook: RwLock<Option<ChangeHook>>,
    changed_hook: RwLock<Option<ChangeHook>>,

    scheduler: StdMutex<Option<SchedulerHandle>>,
    worker: StdMutex<Option<JoinHandle<()>>>,
}

impl Program {
    /// Create a record from config at the given address
    pub(crate) fn from_config(config: ProgramConfig, address: ProgramAddress) -> Self {
        Self {
            address,
            name: config.name,
            description: config.description,
            domain: config.domain,
            condition_type: RwLock::new(config.condition_type),
            enabled: AtomicBool::new(config.enabled),
            running: AtomicBool::new(false),
            last_condition_result: AtomicBool::new(false),
            trigger_time: RwLock::new(None),
            script_errors: RwLock::new(Vec::new()),
            condition_source: RwLock::new(config.condition),
            body_source: RwLock::new(config.body),
            script_handle: RwLock::new(None),
            operation_lock: Mutex::new(()),
            will_change_hook: RwLock::new(None),
            changed_hook: RwLock::new(None),
            scheduler: StdMutex::new(None),
            worker: StdMutex::new(None),
        }
    }

    /// Program address
    pub fn address(&self) -> ProgramAddress {
        self.address
    }

    /// Program name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Program description
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Display domain
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Current trigger mode
    pub fn condition_type(&self) -> ConditionType {
        *self.condition_type.read().expect("lock poisoned")
    }

    /// Change the trigger mode
    pub fn set_condition_type(&self, condition_type: ConditionType) {
        *self.condition_type.write().expect("lock poisoned") = condition_type;
    }

    /// Whether the program is enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Set the enabled flag, returning the previous value
    pub(crate) fn swap_enabled(&self, enabled: bool) -> bool {
        self.enabled.swap(enabled, Ordering::SeqCst)
    }

    /// Whether a body execution is in progress
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub(crate) fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
    }

    /// Result of the most recent condition evaluation
    pub fn last_condition_result(&self) -> bool {
        self.last_condition_result.load(Ordering::SeqCst)
    }

    /// Record a condition result, returning the previous one
    pub(crate) fn swap_last_condition_result(&self, result: bool) -> bool {
        self.last_condition_result.swap(result, Ordering::SeqCst)
    }

    /// When the most recent body execution started
    pub fn trigger_time(&self) -> Option<DateTime<Utc>> {
        *self.trigger_time.read().expect("lock poisoned")
    }

    pub(crate) fn set_trigger_time(&self, time: DateTime<Utc>) {
        *self.trigger_time.write().expect("lock poisoned") = Some(time);
    }

    /// Current script diagnostics
    pub fn script_errors(&self) -> Vec<ProgramError> {
        self.script_errors.read().expect("lock poisoned").clone()
    }

    /// Replace the script diagnostics
    pub fn set_script_errors(&self, errors: Vec<ProgramError>) {
        *self.script_errors.write().expect("lock poisoned") = errors;
    }

    /// Bundle the current sources for compilation
    pub fn source(&self) -> ProgramSource {
        ProgramSource::new(
            self.address,
            self.condition_source.read().expect("lock poisoned").clone(),
            self.body_source.read().expect("lock poisoned").clone(),
        )
    }

    /// Replace the program sources
    ///
    /// Editing invalidates the compiled handle and clears diagnostics; the
    /// program must be compiled again before it can fire.
    pub fn set_source(&self, condition: impl Into<String>, body: impl Into<String>) {
        *self.condition_source.write().expect("lock poisoned") = condition.into();
        *self.body_source.write().expect("lock poisoned") = body.into();
        *self.script_handle.write().expect("lock poisoned") = None;
        self.set_script_errors(Vec::new());
    }

    /// Handle to the compiled condition/body pair, if compiled
    pub fn script_handle(&self) -> Option<ScriptHandle> {
        self.script_handle.read().expect("lock poisoned").clone()
    }

    pub(crate) fn set_script_handle(&self, handle: Option<ScriptHandle>) {
        *self.script_handle.write().expect("lock poisoned") = handle;
    }

    /// Install the pre-change hook
    pub fn on_module_changing<F>(&self, hook: F)
    where
        F: Fn(&Module, &ModuleParameter) -> bool + Send + Sync + 'static,
    {
        *self.will_change_hook.write().expect("lock poisoned") = Some(Arc::new(hook));
    }

    /// Install the post-change hook
    pub fn on_module_changed<F>(&self, hook: F)
    where
        F: Fn(&Module, &ModuleParameter) -> bool + Send + Sync + 'static,
    {
        *self.changed_hook.write().expect("lock poisoned") = Some(Arc::new(hook));
    }

    pub(crate) fn will_change_hook(&self) -> Option<ChangeHook> {
        self.will_change_hook.read().expect("lock poisoned").clone()
    }

    pub(crate) fn changed_hook(&self) -> Option<ChangeHook> {
        self.changed_hook.read().expect("lock poisoned").clone()
    }

    pub(crate) async fn lock_operations(&self) -> MutexGuard<'_, ()> {
        self.operation_lock.lock().await
    }

    pub(crate) fn store_scheduler(&self, handle: SchedulerHandle) {
        *self.scheduler.lock().expect("lock poisoned") = Some(handle);
    }

    pub(crate) fn take_scheduler(&self) -> Option<SchedulerHandle> {
        self.scheduler.lock().expect("lock poisoned").take()
    }

    /// Ask the tick scheduler to wind down without joining it
    ///
    /// Used on auto-disable, which can happen from inside the tick task
    /// itself; the stale handle is replaced on the next enable.
    pub(crate) fn signal_scheduler(&self) {
        if let Some(handle) = self.scheduler.lock().expect("lock poisoned").as_ref() {
            handle.signal();
        }
    }

    pub(crate) fn store_worker(&self, worker: JoinHandle<()>) {
        *self.worker.lock().expect("lock poisoned") = Some(worker);
    }

    pub(crate) fn take_worker(&self) -> Option<JoinHandle<()>> {
        self.worker.lock().expect("lock poisoned").take()
    }
}

impl std::fmt::Debug for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Program")
            .field("address", &self.address)
            .field("name", &self.name)
            .field("domain", &self.domain)
            .field("condition_type", &self.condition_type())
            .field("enabled", &self.is_enabled())
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> ProgramConfig {
        serde_json::from_str(
            r#"{
                "address": 1001,
                "name": "Porch Light",
                "condition_type": "on_switch_true",
                "condition": "porch.motion == 1",
                "body": "porch.light.on()"
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_config_defaults() {
        let config: ProgramConfig = serde_json::from_str(r#"{"name": "Minimal"}"#).unwrap();

        assert!(config.address.is_none());
        assert_eq!(config.domain, "automation");
        assert_eq!(config.condition_type, ConditionType::OnTrue);
        assert!(config.enabled);
        assert!(config.condition.is_empty());
        assert!(config.body.is_empty());
    }

    #[test]
    fn test_from_config() {
        let program = Program::from_config(sample_config(), ProgramAddress::new(1001));

        assert_eq!(program.address(), ProgramAddress::new(1001));
        assert_eq!(program.name(), "Porch Light");
        assert_eq!(program.condition_type(), ConditionType::OnSwitchTrue);
        assert!(program.is_enabled());
        assert!(!program.is_running());
        assert!(!program.last_condition_result());
        assert!(program.trigger_time().is_none());
        assert!(program.script_handle().is_none());
    }

    #[test]
    fn test_condition_type_serde() {
        let json = serde_json::to_string(&ConditionType::OnSwitchFalse).unwrap();
        assert_eq!(json, "\"on_switch_false\"");

        let parsed: ConditionType = serde_json::from_str("\"once\"").unwrap();
        assert_eq!(parsed, ConditionType::Once);
    }

    #[test]
    fn test_edit_invalidates_handle() {
        let program = Program::from_config(sample_config(), ProgramAddress::new(1001));
        program.set_script_handle(Some(hearth_script::ScriptHandle::new(
            program.address(),
            Arc::new(()),
        )));

        program.set_source("porch.motion == 0", "porch.light.off()");

        assert!(program.script_handle().is_none());
        assert!(program.script_errors().is_empty());
        assert_eq!(program.source().condition, "porch.motion == 0");
    }

    #[test]
    fn test_swap_last_condition_result() {
        let program = Program::from_config(sample_config(), ProgramAddress::new(1001));

        assert!(!program.swap_last_condition_result(true));
        assert!(program.swap_last_condition_result(true));
        assert!(program.last_condition_result());
    }
}
