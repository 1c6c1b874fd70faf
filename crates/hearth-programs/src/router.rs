//! Property-change routing
//!
//! Every module property change is delivered in two stages. The pre-change
//! stage runs synchronously on the caller and lets any program veto further
//! propagation; the post-change stage runs asynchronously and both invokes
//! post-change hooks and drives trigger re-evaluation.

use std::sync::Arc;

use tracing::debug;

use hearth_core::PropertyChange;

use crate::evaluator;
use crate::manager::ProgramManager;

/// Pre-change stage: returns whether the change may propagate
///
/// Programs are visited in registry order. A hook returning false halts
/// propagation, as does a hook rewriting the parameter value - the mutation
/// is considered terminal.
pub(crate) fn module_is_changing(manager: &ProgramManager, change: &PropertyChange) -> bool {
    for program in manager.snapshot() {
        if !program.is_enabled() {
            continue;
        }
        // A program never observes its own echo.
        if change.sender.is_program(program.address()) {
            continue;
        }
        let Some(hook) = program.will_change_hook() else {
            continue;
        };

        let original = change.parameter.value();
        if !hook(&change.module, &change.parameter) {
            debug!(
                address = %program.address(),
                parameter = %change.parameter.name(),
                "Pre-change hook vetoed propagation"
            );
            return false;
        }
        if change.parameter.value() != original {
            debug!(
                address = %program.address(),
                parameter = %change.parameter.name(),
                "Pre-change hook rewrote the parameter, halting propagation"
            );
            return false;
        }
    }

    true
}

/// Post-change stage: hook delivery and trigger re-evaluation
///
/// For each program the trigger re-evaluation is dispatched concurrently
/// and independently of the hook; a hook veto or parameter rewrite stops
/// delivery to the remaining programs.
pub(crate) fn module_changed(manager: &Arc<ProgramManager>, change: &PropertyChange) {
    for program in manager.snapshot() {
        if !program.is_enabled() {
            continue;
        }
        if change.sender.is_program(program.address()) {
            continue;
        }

        if manager.is_enabled() && !program.is_running() {
            let manager = manager.clone();
            let program = program.clone();
            tokio::spawn(async move {
                evaluator::check_and_run(&manager, &program).await;
            });
        }

        if let Some(hook) = program.changed_hook() {
            let original = change.parameter.value();
            if !hook(&change.module, &change.parameter) {
                debug!(
                    address = %program.address(),
                    parameter = %change.parameter.name(),
                    "Post-change hook vetoed further delivery"
                );
                break;
            }
            if change.parameter.value() != original {
                debug!(
                    address = %program.address(),
                    parameter = %change.parameter.name(),
                    "Post-change hook rewrote the parameter, stopping delivery"
                );
                break;
            }
        }
    }
}
