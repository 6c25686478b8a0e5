use crate::analysis::context::dollar_immediate;
use crate::analysis::Detector;
use crate::disasm::{display_address, Demangler, Function, Instruction};
use lazy_static::lazy_static;
use parse_int::parse;
use regex::Regex;

/// A copy call or repeat-string operation that can overrun a heap buffer.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct HeapFinding {
    /// Display name of the enclosing function, empty when unknown.
    pub func_name: String,
    /// Address of the flagged instruction, canonical form.
    pub instr_addr: String,
    /// Copy function or string operation responsible for the write.
    pub target: String,
    /// Why this site was flagged.
    pub detail: String,
}

impl HeapFinding {
    /// Returns the flagged address in display form.
    pub fn display_addr(&self) -> String {
        display_address(&self.instr_addr)
    }
}

/// Detector matching known-sized heap allocations against bounded copies.
///
/// Within each function the most recent `malloc`/`calloc` whose size resolves
/// to an immediate constant is tracked in a single slot; a later allocation
/// shadows the earlier one. Copy calls whose staged size exceeds the tracked
/// size are flagged, as is every `rep stosb`/`rep movsb`. Tracking a single
/// slot is a coarse approximation that relies on the allocate-then-use
/// locality of compiled code; copies into stale allocations are missed.
pub struct HeapOverflowDetector;

const COPY_FUNCTIONS: &[&str] = &["memcpy", "memmove", "strcpy", "strncpy"];

lazy_static! {
    static ref RE_IMMEDIATE: Regex = Regex::new(r"0x[0-9A-Fa-f]+|\d+").unwrap();
}

// most recent allocation with a resolvable constant size
struct TrackedAlloc {
    size: u64,
    site: String,
}

impl Detector for HeapOverflowDetector {
    type Finding = HeapFinding;

    fn detect(&self, funcs: &[Function]) -> Vec<HeapFinding> {
        let mut findings = Vec::new();
        let mut dem = Demangler::new();
        for func in funcs {
            let func_name = func.display_name(&mut dem);
            let insns = func.get_insns();
            let tracked = track_allocation(insns);
            if let Some(alloc) = &tracked {
                log::trace!(
                    "<{}> allocates {} bytes at {}",
                    func.get_mangled_name(),
                    alloc.size,
                    alloc.site
                );
            }
            for (at, ins) in insns.iter().enumerate() {
                if ins.is_call() {
                    let target = COPY_FUNCTIONS
                        .iter()
                        .find(|name| ins.get_operands().contains(*name));
                    let target = match target {
                        Some(name) => name,
                        None => continue,
                    };
                    let copy_size = match staged_copy_size(insns, at) {
                        Some(size) => size,
                        None => continue,
                    };
                    let alloc_size = tracked.as_ref().map(|alloc| alloc.size).unwrap_or(0);
                    if copy_size > alloc_size {
                        findings.push(HeapFinding {
                            func_name: func_name.clone(),
                            instr_addr: ins.get_address().to_string(),
                            target: target.to_string(),
                            detail: format!(
                                "{} at {} copies {} bytes into buffer of size {}",
                                target,
                                display_address(ins.get_address()),
                                copy_size,
                                alloc_size
                            ),
                        });
                    }
                } else if ins.get_mnemonic() == "rep" {
                    let operands = ins.get_operands();
                    let target = if operands.contains("stosb") {
                        "stosb"
                    } else if operands.contains("movsb") {
                        "movsb"
                    } else {
                        continue;
                    };
                    let site = match &tracked {
                        Some(alloc) => display_address(&alloc.site),
                        None => "unknown".to_string(),
                    };
                    findings.push(HeapFinding {
                        func_name: func_name.clone(),
                        instr_addr: ins.get_address().to_string(),
                        target: target.to_string(),
                        detail: format!(
                            "repeat string operation at {} may overflow heap buffer allocated at {}",
                            display_address(ins.get_address()),
                            site
                        ),
                    });
                }
            }
        }
        findings
    }
}

// walks the function with a one-instruction lookahead and keeps the last
// allocation whose size argument resolves to a constant
fn track_allocation(insns: &[Instruction]) -> Option<TrackedAlloc> {
    let mut tracked = None;
    for at in 0..insns.len().saturating_sub(1) {
        let ins = &insns[at];
        let next = &insns[at + 1];
        if ins.get_mnemonic() != "mov" || !next.is_call() {
            continue;
        }
        let size = if next.get_operands().contains("malloc") {
            first_immediate(ins.get_operands())
        } else if next.get_operands().contains("calloc") {
            calloc_size(insns, at)
        } else {
            None
        };
        if let Some(size) = size {
            if size > 0 {
                tracked = Some(TrackedAlloc {
                    size,
                    site: next.get_address().to_string(),
                });
            }
        }
    }
    tracked
}

// calloc takes (nmemb, size); the product of the two movs staging them is the
// allocation size
fn calloc_size(insns: &[Instruction], at: usize) -> Option<u64> {
    if at == 0 {
        return None;
    }
    let prev = &insns[at - 1];
    if prev.get_mnemonic() != "mov" {
        return None;
    }
    let nmemb = first_immediate(prev.get_operands())?;
    let size = first_immediate(insns[at].get_operands())?;
    Some(nmemb.saturating_mul(size))
}

// the size argument of a bounded copy is staged by the mov immediately
// preceding the call; the call operands themselves never carry it
fn staged_copy_size(insns: &[Instruction], at: usize) -> Option<u64> {
    if at == 0 {
        return None;
    }
    let prev = &insns[at - 1];
    if prev.get_mnemonic() != "mov" {
        return None;
    }
    dollar_immediate(prev.get_operands())
}

fn first_immediate(operands: &str) -> Option<u64> {
    RE_IMMEDIATE
        .find(operands)
        .and_then(|imm| parse::<u64>(imm.as_str()).ok())
}
