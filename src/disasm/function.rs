use crate::disasm::{Demangler, Instruction};
use std::cmp::Ordering;

/// Struct providing information about a disassembled function.
///
/// The Function struct owns the ordered sequence of instructions recovered
/// from the listing, together with the name and start address of the symbol
/// that introduced them. Instruction addresses strictly increase in
/// disassembly order.
#[derive(Eq, PartialEq, Clone, Debug)]
pub struct Function {
    mangled_name: String,
    demangled_name: String,
    start_address: String,
    insns: Vec<Instruction>,
}

impl Function {
    /// Creates a new function with the following parameters:
    /// - `mangled_name`: the symbol name exactly as it appears in the listing
    /// - `start_address`: address of the first instruction; canonicalized by
    ///   this constructor
    ///
    /// The instruction list starts empty and the demangled name unresolved.
    /// # Examples
    /// Basic usage:
    /// ```
    /// use vulnscan::disasm::Function;
    ///
    /// let func = Function::new("_Z7processPc", "401136");
    ///
    /// assert_eq!(func.get_start_address(), "401136");
    /// assert!(func.get_insns().is_empty());
    /// ```
    pub fn new(mangled_name: &str, start_address: &str) -> Function {
        Function {
            mangled_name: mangled_name.to_string(),
            demangled_name: String::new(),
            start_address: crate::disasm::canonicalize(start_address),
            insns: Vec::new(),
        }
    }

    /// Sets an already-resolved demangled name on this function.
    ///
    /// [Function::display_name] honors this value without spawning the
    /// external demangler.
    pub fn with_demangled_name(mut self, name: &str) -> Function {
        self.demangled_name = name.to_string();
        self
    }

    /// Appends one instruction to this function.
    pub fn push_instruction(&mut self, ins: Instruction) {
        self.insns.push(ins);
    }

    /// Returns the symbol name of this function as found in the listing.
    pub fn get_mangled_name(&self) -> &str {
        &self.mangled_name
    }

    /// Returns the resolved demangled name, or an empty string when the name
    /// has not been resolved yet.
    pub fn get_demangled_name(&self) -> &str {
        &self.demangled_name
    }

    /// Returns the start address of this function, in canonical form.
    pub fn get_start_address(&self) -> &str {
        &self.start_address
    }

    /// Returns the numeric offset of this function in the binary.
    pub fn get_start_offset(&self) -> u64 {
        u64::from_str_radix(&self.start_address, 16).unwrap_or(0)
    }

    /// Returns the instructions of this function, in disassembly order.
    pub fn get_insns(&self) -> &[Instruction] {
        &self.insns
    }

    /// Returns true if this function is a dynamic-linker trampoline rather
    /// than user code.
    /// # Examples
    /// Basic usage:
    /// ```
    /// use vulnscan::disasm::Function;
    ///
    /// assert!(Function::new("gets@plt", "401030").is_plt_stub());
    /// assert!(!Function::new("main", "401136").is_plt_stub());
    /// ```
    pub fn is_plt_stub(&self) -> bool {
        self.mangled_name.contains("@plt")
    }

    /// Resolves the name used to present this function in findings.
    ///
    /// A pre-resolved demangled name is used when present, otherwise the
    /// mangled name is passed through `dem`. Non-informative results (the
    /// mangled name coming back unchanged, the `.text` section pseudo-name,
    /// or an empty string) resolve to the empty string.
    pub fn display_name(&self, dem: &mut Demangler) -> String {
        let resolved = if self.demangled_name.is_empty() {
            dem.demangle(&self.mangled_name)
        } else {
            self.demangled_name.clone()
        };
        if resolved == self.mangled_name || resolved == ".text" || resolved.is_empty() {
            String::new()
        } else {
            resolved
        }
    }
}

impl Ord for Function {
    fn cmp(&self, other: &Self) -> Ordering {
        self.get_start_offset().cmp(&other.get_start_offset())
    }
}

impl PartialOrd for Function {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use crate::disasm::{Demangler, Function, Instruction};

    #[test]
    fn new_canonicalizes_start_address() {
        let func = Function::new("main", "0000000000401136");
        assert_eq!(func.get_start_address(), "401136");
        assert_eq!(func.get_start_offset(), 0x401136);
    }

    #[test]
    fn push_keeps_disassembly_order() {
        let mut func = Function::new("main", "401136");
        func.push_instruction(Instruction::new("401136", "push", "%rbp"));
        func.push_instruction(Instruction::new("401137", "mov", "%rsp,%rbp"));
        let insns = func.get_insns();
        assert_eq!(insns.len(), 2);
        assert!(insns[0] < insns[1]);
    }

    #[test]
    fn display_name_honors_preset_value() {
        let mut dem = Demangler::new();
        let func = Function::new("_Z7processPc", "401136").with_demangled_name("process(char*)");
        assert_eq!(func.display_name(&mut dem), "process(char*)");
    }

    #[test]
    fn display_name_clears_uninformative_values() {
        let mut dem = Demangler::new();
        let same = Function::new("main", "401136").with_demangled_name("main");
        assert_eq!(same.display_name(&mut dem), "");
        let text = Function::new("sometext", "401000").with_demangled_name(".text");
        assert_eq!(text.display_name(&mut dem), "");
    }

    #[test]
    fn ord() {
        let func0 = Function::new("main", "401136");
        let func1 = Function::new("helper", "401190");
        assert!(func0 < func1);
    }
}
