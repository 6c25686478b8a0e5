use crate::analysis::Detector;
use crate::disasm::{display_address, Demangler, Function};

/// A call site targeting a process-spawning library function.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct CommandInjectionFinding {
    /// Display name of the enclosing function, empty when unknown.
    pub func_name: String,
    /// Address of the call instruction, canonical form.
    pub instr_addr: String,
    /// Matched process-spawning function.
    pub target: String,
    /// Why this call site was flagged.
    pub detail: String,
}

impl CommandInjectionFinding {
    /// Returns the call address in display form.
    pub fn display_addr(&self) -> String {
        display_address(&self.instr_addr)
    }
}

/// Detector flagging every call to a process-spawning function.
///
/// The watchlist is matched by substring against the call operands and the
/// first hit wins, so the `exec` family resolves to its shortest prefix
/// (`execve` reports as `execv`).
pub struct CommandInjectionDetector;

const EXEC_FUNCTIONS: &[&str] = &[
    "system", "popen", "execl", "execle", "execlp", "execv", "execve", "execvp", "execvpe",
];

impl Detector for CommandInjectionDetector {
    type Finding = CommandInjectionFinding;

    fn detect(&self, funcs: &[Function]) -> Vec<CommandInjectionFinding> {
        let mut findings = Vec::new();
        let mut dem = Demangler::new();
        for func in funcs {
            let func_name = func.display_name(&mut dem);
            for ins in func.get_insns() {
                if !ins.is_call() {
                    continue;
                }
                let target = EXEC_FUNCTIONS
                    .iter()
                    .find(|name| ins.get_operands().contains(*name));
                if let Some(target) = target {
                    findings.push(CommandInjectionFinding {
                        func_name: func_name.clone(),
                        instr_addr: ins.get_address().to_string(),
                        target: target.to_string(),
                        detail: format!(
                            "Call to `{}` at {} can lead to command injection risks.",
                            target,
                            display_address(ins.get_address())
                        ),
                    });
                }
            }
        }
        findings
    }
}
