use crate::analysis::context::{analyze_context, argument_size_imm};
use crate::analysis::Detector;
use crate::disasm::{display_address, Demangler, Function};
use lazy_static::lazy_static;
use maplit::hashset;
use regex::Regex;
use std::collections::HashSet;
use std::fmt::{Display, Formatter};

/// Coarse classification of how likely a flagged call is to be exploitable.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum RiskLevel {
    High,
    Medium,
    Low,
}

impl RiskLevel {
    /// Returns the uppercase name of this risk level, as printed in reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::High => "HIGH",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::Low => "LOW",
        }
    }
}

impl Display for RiskLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A call site flagged as a misuse-prone C-library call.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct UnsafeFinding {
    /// Display name of the enclosing function, empty when unknown.
    pub func_name: String,
    /// Start address of the enclosing function, canonical form.
    pub func_start: String,
    /// Address of the call instruction, canonical form.
    pub instr_addr: String,
    /// Mnemonic of the call instruction (`call` or `callq`).
    pub mnemonic: String,
    /// Name of the function being called.
    pub target: String,
    /// Why this call site was flagged.
    pub detail: String,
    pub risk_level: RiskLevel,
}

impl UnsafeFinding {
    /// Returns the call address in display form.
    pub fn display_addr(&self) -> String {
        display_address(&self.instr_addr)
    }
}

/// Detector flagging calls to misuse-prone C-library functions.
///
/// Calls are classified by the name of the called function: a safe set is
/// never flagged, a high-risk set always is, and a medium-risk set only when
/// the local call-site heuristic agrees. Remaining names are matched by
/// substring against a legacy watchlist and flagged at low risk, again only
/// when the heuristic agrees.
pub struct UnsafeCallDetector;

lazy_static! {
    static ref SAFE_FUNCTIONS: HashSet<&'static str> = hashset! {
        "puts", "printf", "fprintf", "fwrite", "write",
        "strlen", "strcmp", "strncmp", "memcmp", "malloc", "free",
        "fopen", "fclose", "exit", "_exit", "abort",
        "getpid", "getuid", "getgid", "time", "clock",
    };
    static ref HIGH_RISK: HashSet<&'static str> = hashset! {
        "gets", "strcpy", "strcat", "sprintf", "vsprintf",
        "scanf", "sscanf", "fscanf",
    };
    static ref MEDIUM_RISK: HashSet<&'static str> = hashset! {
        "strncpy", "strncat", "snprintf", "vsnprintf",
        "memcpy", "memmove", "fgets", "getchar",
    };
    static ref RE_CALL_TARGET: Regex = Regex::new(r"<([^>@]+)(?:@plt)?>").unwrap();
    static ref RE_PLT_TARGET: Regex = Regex::new(r"(\w+)@plt").unwrap();
}

// ordered high to low so a substring hit resolves to the riskiest entry
const WATCHLIST: &[&str] = &[
    "gets", "strcpy", "strcat", "sprintf", "vsprintf", "scanf", "sscanf", "fscanf", "strncpy",
    "strncat", "snprintf", "vsnprintf", "memcpy", "memmove", "fgets", "getchar", "wcscpy",
    "wcscat", "swprintf", "readlink", "getwd", "realpath", "syslog",
];

// how many instructions before a call are searched for a staged size argument
const SIZE_WINDOW: usize = 5;

impl Detector for UnsafeCallDetector {
    type Finding = UnsafeFinding;

    fn detect(&self, funcs: &[Function]) -> Vec<UnsafeFinding> {
        let mut findings = Vec::new();
        let mut dem = Demangler::new();
        for func in funcs {
            if func.is_plt_stub() {
                continue;
            }
            let func_name = func.display_name(&mut dem);
            let facts = analyze_context(func);
            if !facts.is_empty() {
                log::debug!(
                    "size facts for <{}>: {:?}",
                    func.get_mangled_name(),
                    facts
                );
            }
            for (at, ins) in func.get_insns().iter().enumerate() {
                if !ins.is_call() {
                    continue;
                }
                let extracted = match called_function(ins.get_operands()) {
                    Some(name) => name,
                    None => continue,
                };
                if SAFE_FUNCTIONS.contains(extracted.as_str()) {
                    continue;
                }
                let mut target = extracted;
                let risk = if HIGH_RISK.contains(target.as_str()) {
                    Some(RiskLevel::High)
                } else if MEDIUM_RISK.contains(target.as_str()) {
                    if is_likely_vulnerable(func, at, &target) {
                        Some(RiskLevel::Medium)
                    } else {
                        None
                    }
                } else {
                    watchlist_risk(func, at, &mut target)
                };
                if let Some(risk_level) = risk {
                    findings.push(UnsafeFinding {
                        func_name: func_name.clone(),
                        func_start: func.get_start_address().to_string(),
                        instr_addr: ins.get_address().to_string(),
                        mnemonic: ins.get_mnemonic().to_string(),
                        detail: format!("Risk: {} - {}", risk_level, reason(&target)),
                        target,
                        risk_level,
                    });
                }
            }
        }
        findings
    }
}

/// Extracts the name of the called function from call operands.
///
/// Angle-bracket symbols (`<NAME>`, `<NAME@plt>`) are tried first, then a
/// bare `NAME@plt` token. None when the operands carry no recognizable name.
fn called_function(operands: &str) -> Option<String> {
    if let Some(cap) = RE_CALL_TARGET.captures(operands) {
        return Some(cap[1].to_string());
    }
    if let Some(cap) = RE_PLT_TARGET.captures(operands) {
        return Some(cap[1].to_string());
    }
    None
}

// substring fallback against the legacy watchlist; rewrites `target` to the
// matched entry so the finding reports the library function, not the
// decorated symbol (e.g. __isoc99_scanf -> scanf)
fn watchlist_risk(func: &Function, at: usize, target: &mut String) -> Option<RiskLevel> {
    for name in WATCHLIST {
        if target.contains(name) {
            let risk = if HIGH_RISK.contains(name) {
                Some(RiskLevel::High)
            } else if MEDIUM_RISK.contains(name) {
                if is_likely_vulnerable(func, at, name) {
                    Some(RiskLevel::Medium)
                } else {
                    None
                }
            } else if is_likely_vulnerable(func, at, name) {
                Some(RiskLevel::Low)
            } else {
                None
            };
            *target = name.to_string();
            return risk;
        }
    }
    None
}

/// Local heuristic deciding whether a call to `callee` looks dangerous.
///
/// For the bounded copy functions the size argument staged in the preceding
/// instructions is inspected: a very large count or a suspiciously round one
/// flags the site, a window without any staged size does not.
fn is_likely_vulnerable(func: &Function, at: usize, callee: &str) -> bool {
    match callee {
        "gets" | "scanf" | "sprintf" => true,
        "strncpy" | "strncat" | "snprintf" => {
            let insns = func.get_insns();
            let window = &insns[at.saturating_sub(SIZE_WINDOW)..at];
            for prev in window.iter().rev() {
                if let Some(size) = argument_size_imm(prev) {
                    if size > 1000 || size % 100 == 0 {
                        return true;
                    }
                }
            }
            false
        }
        "memcpy" | "memmove" => true,
        // fgets takes an explicit size bound
        "fgets" => false,
        _ => false,
    }
}

fn reason(target: &str) -> &'static str {
    match target {
        "gets" => "gets() doesn't check buffer bounds",
        "strcpy" => "strcpy() doesn't check destination size",
        "strcat" => "strcat() doesn't check destination size",
        "sprintf" => "sprintf() doesn't check buffer size",
        "scanf" | "sscanf" | "fscanf" => "scanf family can overflow buffers",
        "memcpy" | "memmove" => "Memory copy without bounds checking",
        _ => "Potentially unsafe function call",
    }
}

#[cfg(test)]
mod tests {
    use crate::analysis::{Detector, RiskLevel, UnsafeCallDetector};
    use crate::disasm::{Function, Instruction};

    fn func(name: &str, start: &str, body: &[(&str, &str, &str)]) -> Function {
        let mut f = Function::new(name, start).with_demangled_name(name);
        for (addr, mnemonic, operands) in body {
            f.push_instruction(Instruction::new(addr, mnemonic, operands));
        }
        f
    }

    #[test]
    fn gets_call_is_high_risk() {
        let funcs = vec![func(
            "main",
            "401136",
            &[("4011a0", "call", "401030 <gets@plt>")],
        )];
        let findings = UnsafeCallDetector.detect(&funcs);
        assert_eq!(findings.len(), 1);
        let finding = &findings[0];
        assert_eq!(finding.target, "gets");
        assert_eq!(finding.risk_level, RiskLevel::High);
        assert_eq!(finding.display_addr(), "0x0000004011a0");
        assert_eq!(finding.mnemonic, "call");
        assert_eq!(finding.func_start, "401136");
        assert_eq!(
            finding.detail,
            "Risk: HIGH - gets() doesn't check buffer bounds"
        );
    }

    #[test]
    fn strncpy_with_large_size_is_medium_risk() {
        let funcs = vec![func(
            "main",
            "401136",
            &[
                ("401150", "mov", "$4096,%rdx"),
                ("401157", "call", "401040 <strncpy@plt>"),
            ],
        )];
        let findings = UnsafeCallDetector.detect(&funcs);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].target, "strncpy");
        assert_eq!(findings[0].risk_level, RiskLevel::Medium);
    }

    #[test]
    fn strncpy_with_round_size_is_medium_risk() {
        let funcs = vec![func(
            "main",
            "401136",
            &[
                ("401150", "mov", "$200,%rcx"),
                ("401157", "call", "401040 <strncpy@plt>"),
            ],
        )];
        let findings = UnsafeCallDetector.detect(&funcs);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].risk_level, RiskLevel::Medium);
    }

    #[test]
    fn strncpy_with_small_size_is_not_flagged() {
        let funcs = vec![func(
            "main",
            "401136",
            &[
                ("401150", "mov", "$16,%rdx"),
                ("401157", "call", "401040 <strncpy@plt>"),
            ],
        )];
        assert!(UnsafeCallDetector.detect(&funcs).is_empty());
    }

    #[test]
    fn strncpy_without_staged_size_is_not_flagged() {
        let funcs = vec![func(
            "main",
            "401136",
            &[
                ("401150", "mov", "%rax,%rdi"),
                ("401157", "call", "401040 <strncpy@plt>"),
            ],
        )];
        assert!(UnsafeCallDetector.detect(&funcs).is_empty());
    }

    #[test]
    fn strncpy_size_outside_window_is_not_seen() {
        let funcs = vec![func(
            "main",
            "401136",
            &[
                ("401140", "mov", "$4096,%rdx"),
                ("401147", "nop", "word"),
                ("401148", "nop", "word"),
                ("401149", "nop", "word"),
                ("40114a", "nop", "word"),
                ("40114b", "nop", "word"),
                ("401150", "call", "401040 <strncpy@plt>"),
            ],
        )];
        assert!(UnsafeCallDetector.detect(&funcs).is_empty());
    }

    #[test]
    fn memcpy_is_always_medium_risk() {
        let funcs = vec![func(
            "main",
            "401136",
            &[("401150", "call", "401060 <memcpy@plt>")],
        )];
        let findings = UnsafeCallDetector.detect(&funcs);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].risk_level, RiskLevel::Medium);
        assert_eq!(
            findings[0].detail,
            "Risk: MEDIUM - Memory copy without bounds checking"
        );
    }

    #[test]
    fn fgets_is_never_flagged() {
        let funcs = vec![func(
            "main",
            "401136",
            &[
                ("401150", "mov", "$4096,%rdx"),
                ("401157", "call", "401040 <fgets@plt>"),
            ],
        )];
        assert!(UnsafeCallDetector.detect(&funcs).is_empty());
    }

    #[test]
    fn safe_functions_are_never_flagged() {
        let funcs = vec![func(
            "main",
            "401136",
            &[
                ("401150", "call", "401020 <puts@plt>"),
                ("401157", "call", "401021 <printf@plt>"),
                ("40115e", "call", "401022 <malloc@plt>"),
            ],
        )];
        assert!(UnsafeCallDetector.detect(&funcs).is_empty());
    }

    #[test]
    fn plt_stub_functions_are_skipped() {
        let funcs = vec![func(
            "gets@plt",
            "401030",
            &[("401030", "call", "401030 <gets@plt>")],
        )];
        assert!(UnsafeCallDetector.detect(&funcs).is_empty());
    }

    #[test]
    fn decorated_symbol_resolves_through_watchlist() {
        let funcs = vec![func(
            "main",
            "401136",
            &[("401150", "call", "401050 <__isoc99_scanf@plt>")],
        )];
        let findings = UnsafeCallDetector.detect(&funcs);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].target, "scanf");
        assert_eq!(findings[0].risk_level, RiskLevel::High);
        assert_eq!(
            findings[0].detail,
            "Risk: HIGH - scanf family can overflow buffers"
        );
    }

    #[test]
    fn bare_plt_token_is_extracted() {
        let funcs = vec![func(
            "main",
            "401136",
            &[("401150", "call", "gets@plt")],
        )];
        let findings = UnsafeCallDetector.detect(&funcs);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].target, "gets");
    }

    #[test]
    fn call_without_target_is_skipped() {
        let funcs = vec![func("main", "401136", &[("401150", "call", "*%rax")])];
        assert!(UnsafeCallDetector.detect(&funcs).is_empty());
    }

    #[test]
    fn findings_follow_instruction_order() {
        let funcs = vec![func(
            "main",
            "401136",
            &[
                ("401150", "call", "401030 <gets@plt>"),
                ("401160", "call", "401031 <strcpy@plt>"),
            ],
        )];
        let findings = UnsafeCallDetector.detect(&funcs);
        assert_eq!(findings.len(), 2);
        assert!(findings[0].instr_addr < findings[1].instr_addr);
    }
}
