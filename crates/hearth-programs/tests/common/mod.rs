//! Test harness for engine scenarios
//!
//! Provides an isolated engine instance wired to a scripted mock host, with
//! captured published events for assertions.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;

use hearth_bus::ProgramEventBus;
use hearth_core::{
    ChangeSource, Module, ProgramAddress, ProgramEvent, PropertyChange, PROP_PROGRAM_STATUS,
    PROP_RUNTIME_ERROR,
};
use hearth_programs::{ConditionType, Program, ProgramConfig, ProgramManager};
use hearth_script::{
    CompileOutcome, ConditionOutcome, ProgramSource, RunOutcome, ScriptFault, ScriptFuture,
    ScriptHandle, ScriptHost,
};

/// Scripted behavior of one mock program
#[derive(Clone, Default)]
pub struct Scripted {
    condition: Arc<AtomicBool>,
    condition_fault: Arc<Mutex<Option<ScriptFault>>>,
    body_fault: Arc<Mutex<Option<ScriptFault>>>,
    body_gate: Arc<Mutex<Option<Arc<Notify>>>>,
    body_runs: Arc<AtomicUsize>,
}

impl Scripted {
    /// Set the raw condition value the host reports
    pub fn set_condition(&self, value: bool) {
        self.condition.store(value, Ordering::SeqCst);
    }

    /// Make the next condition evaluation fault
    pub fn fail_condition(&self, fault: ScriptFault) {
        *self.condition_fault.lock().unwrap() = Some(fault);
    }

    /// Make the next body run fault after it starts
    pub fn fail_body(&self, fault: ScriptFault) {
        *self.body_fault.lock().unwrap() = Some(fault);
    }

    /// Block body runs until the returned gate is notified
    pub fn gate_body(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.body_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    /// Number of body runs started so far
    pub fn runs(&self) -> usize {
        self.body_runs.load(Ordering::SeqCst)
    }
}

/// A script host whose programs behave as scripted by the test
#[derive(Default)]
pub struct MockScriptHost {
    programs: Mutex<HashMap<u32, Scripted>>,
}

impl MockScriptHost {
    /// The scripted behavior for an address, created on first use
    pub fn scripted(&self, address: ProgramAddress) -> Scripted {
        self.programs
            .lock()
            .unwrap()
            .entry(address.value())
            .or_default()
            .clone()
    }
}

impl ScriptHost for MockScriptHost {
    fn compile(&self, source: ProgramSource) -> ScriptFuture<CompileOutcome> {
        self.scripted(source.address);
        let handle = ScriptHandle::new(source.address, Arc::new(()));
        Box::pin(async move {
            CompileOutcome {
                handle: Some(handle),
                errors: Vec::new(),
            }
        })
    }

    fn evaluate_condition(&self, handle: ScriptHandle) -> ScriptFuture<ConditionOutcome> {
        let scripted = self.scripted(handle.address());
        Box::pin(async move {
            if let Some(fault) = scripted.condition_fault.lock().unwrap().take() {
                return Err(fault);
            }
            Ok(Some(scripted.condition.load(Ordering::SeqCst)))
        })
    }

    fn run(&self, handle: ScriptHandle, _options: Option<String>) -> ScriptFuture<RunOutcome> {
        let scripted = self.scripted(handle.address());
        Box::pin(async move {
            scripted.body_runs.fetch_add(1, Ordering::SeqCst);

            let gate = scripted.body_gate.lock().unwrap().clone();
            if let Some(gate) = gate {
                gate.notified().await;
            }

            if let Some(fault) = scripted.body_fault.lock().unwrap().take() {
                return Err(fault);
            }
            Ok(None)
        })
    }

    fn stop(&self, _handle: &ScriptHandle) {}
}

/// Captured program events for assertions
pub struct EventCapture {
    events: Arc<Mutex<Vec<ProgramEvent>>>,
}

impl EventCapture {
    fn spawn(bus: &ProgramEventBus) -> Self {
        let mut rx = bus.subscribe();
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();

        tokio::spawn(async move {
            while let Ok(event) = rx.recv().await {
                sink.lock().unwrap().push(event);
            }
        });

        Self { events }
    }

    /// All captured events
    pub fn all(&self) -> Vec<ProgramEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Captured values of one property of one program, in publish order
    pub fn values(&self, address: ProgramAddress, property: &str) -> Vec<String> {
        self.all()
            .into_iter()
            .filter(|e| e.address == address && e.property == property)
            .map(|e| e.value)
            .collect()
    }

    /// Captured status values of one program
    pub fn statuses(&self, address: ProgramAddress) -> Vec<String> {
        self.values(address, PROP_PROGRAM_STATUS)
    }

    /// Captured runtime errors of one program
    pub fn runtime_errors(&self, address: ProgramAddress) -> Vec<String> {
        self.values(address, PROP_RUNTIME_ERROR)
    }
}

/// An isolated engine instance for one test
pub struct TestHub {
    pub manager: Arc<ProgramManager>,
    pub host: Arc<MockScriptHost>,
    pub events: EventCapture,
    pub module: Arc<Module>,
}

impl TestHub {
    /// Create an engine over a mock host with captured events
    pub fn new() -> Self {
        let bus = Arc::new(ProgramEventBus::new());
        let host = Arc::new(MockScriptHost::default());
        let events = EventCapture::spawn(&bus);
        let manager = ProgramManager::new(
            bus,
            host.clone(),
            std::env::temp_dir().join(format!("hearth-engine-tests-{}", std::process::id())),
        );
        let module = Arc::new(Module::new("HomeAutomation.Test", "7"));

        Self {
            manager,
            host,
            events,
            module,
        }
    }

    /// Add and compile an enabled program with the given trigger mode
    pub async fn add_program(&self, name: &str, condition_type: ConditionType) -> (Arc<Program>, Scripted) {
        let program = self.manager.add(ProgramConfig {
            address: None,
            name: name.to_string(),
            description: None,
            domain: "automation".to_string(),
            condition_type,
            condition: String::new(),
            body: String::new(),
            enabled: true,
        });
        self.manager.compile(program.address()).await.unwrap();
        let scripted = self.host.scripted(program.address());
        (program, scripted)
    }

    /// Deliver a module parameter change originating from the test module
    pub fn fire_change(&self, parameter: &str, value: serde_json::Value) -> bool {
        let parameter = self.module.set_parameter(parameter, value);
        self.manager.handle_property_change(PropertyChange::new(
            ChangeSource::Module {
                domain: self.module.domain().to_string(),
                address: self.module.address().to_string(),
            },
            self.module.clone(),
            parameter,
        ))
    }

    /// Let spawned routing and body tasks run to completion
    pub async fn settle(&self) {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
