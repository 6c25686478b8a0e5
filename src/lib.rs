//! Static vulnerability scanner for native executables.
//!
//! The crate disassembles a binary with the external `objdump` program,
//! recovers functions and their instructions, and runs a bank of detectors
//! over them: misuse-prone C-library calls, heap copies exceeding a tracked
//! allocation size, and calls to process-spawning functions. Findings are
//! aggregated into a [analysis::Report] that renders as a textual report
//! grouped by vulnerability class and risk level.
//!
//! The pipeline is sequential and best-effort: a binary that can not be read
//! or disassembled yields an empty report rather than an error, and a
//! malformed listing line never aborts a run.

pub mod analysis;
pub mod disasm;

use crate::analysis::{
    CommandInjectionDetector, Detector, HeapOverflowDetector, Report, UnsafeCallDetector,
};
use crate::disasm::objdump::ObjdumpDisasm;

/// Analyzes a binary and returns the aggregated report.
///
/// The binary is disassembled once and every detector runs over the same
/// function set. An unreadable path or a missing `objdump` degrades to an
/// empty function list, and therefore an empty report.
pub fn analyze(binary: &str) -> Report {
    let functions = match ObjdumpDisasm::new(binary) {
        Ok(disasm) => disasm.functions(),
        Err(error) => {
            log::error!("could not open {}: {}", binary, error);
            Vec::new()
        }
    };
    log::info!("recovered {} functions from {}", functions.len(), binary);
    let unsafe_calls = UnsafeCallDetector.detect(&functions);
    let heap_overflows = HeapOverflowDetector.detect(&functions);
    let command_injections = CommandInjectionDetector.detect(&functions);
    Report {
        functions_analyzed: functions.len(),
        unsafe_calls,
        heap_overflows,
        command_injections,
    }
}
