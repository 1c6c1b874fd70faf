//! Program body execution
//!
//! Starts action bodies with the single-flight guarantee: at most one active
//! body per program. Each run gets a dedicated task whose faults are
//! contained to the owning program.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, trace, warn};

use hearth_core::ProgramStatus;
use hearth_script::CodeBlock;

use crate::manager::ProgramManager;
use crate::program::{ConditionType, Program};

/// Start the program's action body at most once
///
/// A call while a body is already active is a no-op: no error, no queueing.
pub(crate) async fn start(
    manager: &Arc<ProgramManager>,
    program: &Arc<Program>,
    options: Option<String>,
) {
    let _operations = program.lock_operations().await;

    if program.is_running() {
        trace!(address = %program.address(), "Body already running, ignoring trigger");
        return;
    }

    let Some(script) = program.script_handle() else {
        trace!(address = %program.address(), "Program not compiled, nothing to run");
        return;
    };

    // A worker left over from a previous run is asked to stop first.
    if let Some(stale) = program.take_worker() {
        manager.host().stop(&script);
        stale.abort();
        program.set_running(false);
    }

    program.set_running(true);
    program.set_trigger_time(Utc::now());
    manager.publish_status(program, ProgramStatus::Running);

    // A one-shot program is retired before its body is dispatched.
    if program.condition_type() == ConditionType::Once {
        manager.auto_disable(program);
    }

    debug!(address = %program.address(), "Dispatching program body");

    let manager = manager.clone();
    let program = program.clone();
    let worker = tokio::spawn({
        let program = program.clone();
        async move {
            let outcome = manager.host().run(script, options).await;
            program.set_running(false);

            match outcome {
                Ok(_) => {}
                Err(fault) if fault.is_benign() => {}
                Err(fault) => {
                    warn!(
                        address = %program.address(),
                        error = %fault,
                        "Runtime fault in program body"
                    );
                    program.set_script_errors(vec![fault.to_program_error(CodeBlock::Body)]);
                    manager.auto_disable(&program);
                    manager.publish_runtime_error(&program, CodeBlock::Body, &fault);
                }
            }

            manager.publish_status(&program, ProgramStatus::Idle);
            program.take_worker();
        }
    });
    program.store_worker(worker);
}

/// Force-terminate any active body execution
///
/// An aborted worker cannot run its own epilogue, so the stopping side
/// publishes `Interrupted` and `Idle` on its behalf.
pub(crate) async fn stop(manager: &Arc<ProgramManager>, program: &Arc<Program>) {
    let _operations = program.lock_operations().await;

    let Some(worker) = program.take_worker() else {
        program.set_running(false);
        return;
    };

    if let Some(script) = program.script_handle() {
        manager.host().stop(&script);
    }

    if worker.is_finished() {
        program.set_running(false);
        return;
    }

    worker.abort();
    program.set_running(false);
    debug!(address = %program.address(), "Program body interrupted");
    manager.publish_status(program, ProgramStatus::Interrupted);
    manager.publish_status(program, ProgramStatus::Idle);
}
