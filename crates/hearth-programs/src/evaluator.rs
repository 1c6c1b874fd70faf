//! Trigger condition evaluation
//!
//! Applies the program's trigger mode (level, edge, once) on top of the raw
//! boolean the script host produces. Evaluation runs under the program's
//! operation lock, serializing it against itself and against body entry.

use std::sync::Arc;

use tracing::{trace, warn};

use hearth_script::CodeBlock;

use crate::manager::ProgramManager;
use crate::program::{ConditionType, Program};
use crate::runner;

/// Re-evaluate the trigger and start the body if it is satisfied
pub(crate) async fn check_and_run(manager: &Arc<ProgramManager>, program: &Arc<Program>) {
    if !manager.is_enabled() || !program.is_enabled() || program.is_running() {
        return;
    }

    if evaluate(manager, program).await {
        runner::start(manager, program, None).await;
    }
}

/// Evaluate the trigger condition, returning whether the body should run now
pub(crate) async fn evaluate(manager: &Arc<ProgramManager>, program: &Arc<Program>) -> bool {
    let _operations = program.lock_operations().await;

    let outcome = match program.script_handle() {
        Some(handle) => manager.host().evaluate_condition(handle).await,
        // an uncompiled condition never fires
        None => Ok(Some(false)),
    };

    let raw = match outcome {
        Ok(value) => value.unwrap_or(false),
        Err(fault) if fault.is_benign() => false,
        Err(fault) => {
            warn!(
                address = %program.address(),
                error = %fault,
                "Runtime fault while evaluating trigger condition"
            );
            program.set_script_errors(vec![fault.to_program_error(CodeBlock::Condition)]);
            manager.auto_disable(program);
            manager.publish_runtime_error(program, CodeBlock::Condition, &fault);
            false
        }
    };

    let previous = program.swap_last_condition_result(raw);

    // Edges are relative to the previous evaluation, however much time
    // elapsed between the two.
    let satisfied = match program.condition_type() {
        ConditionType::OnTrue | ConditionType::Once => raw,
        ConditionType::OnFalse => !raw,
        ConditionType::OnSwitchTrue => raw && raw != previous,
        ConditionType::OnSwitchFalse => !raw && raw != previous,
    };

    trace!(
        address = %program.address(),
        raw,
        previous,
        satisfied,
        "Trigger condition evaluated"
    );

    // A fault above may have disabled the program.
    satisfied && program.is_enabled()
}
