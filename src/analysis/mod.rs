mod context;
pub use self::context::analyze_context;
pub use self::context::SizeFacts;
pub use self::context::{ARG_FACT, STACK_FACT};
mod unsafe_calls;
pub use self::unsafe_calls::{RiskLevel, UnsafeCallDetector, UnsafeFinding};
mod heap;
pub use self::heap::{HeapFinding, HeapOverflowDetector};
mod command_injection;
pub use self::command_injection::{CommandInjectionDetector, CommandInjectionFinding};
mod report;
pub use self::report::Report;

use crate::disasm::Function;

/// Trait providing vulnerability detection over a disassembled function set.
pub trait Detector {
    /// Record type emitted by this detector.
    type Finding;

    /// Scans every function and returns the findings.
    ///
    /// Functions are visited in the order the disassembler emitted them and
    /// findings inside each function follow the instruction stream.
    fn detect(&self, funcs: &[Function]) -> Vec<Self::Finding>;
}
