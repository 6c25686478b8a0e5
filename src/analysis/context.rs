use crate::disasm::{Function, Instruction};
use fnv::FnvHashMap;
use lazy_static::lazy_static;
use parse_int::parse;
use regex::Regex;

/// Heuristic size facts extracted from a single function.
///
/// Keys are [STACK_FACT] and [ARG_FACT]; the absence of a key means the fact
/// is unknown, not zero.
pub type SizeFacts = FnvHashMap<&'static str, u64>;

/// Key of the stack-frame size reserved by the function prologue.
pub const STACK_FACT: &str = "stack";
/// Key of the last plausible buffer size loaded into an argument register.
pub const ARG_FACT: &str = "arg";

// sizes loaded into an argument register above this bound are not buffer
// lengths in practice (pointers, flags, encoded constants)
const PLAUSIBLE_BUFFER_SIZE: u64 = 10_000;

lazy_static! {
    static ref RE_DOLLAR_IMM: Regex = Regex::new(r"\$(0x[0-9a-fA-F]+|\d+)").unwrap();
    static ref RE_DECIMAL_IMM: Regex = Regex::new(r"\$(\d+)\b").unwrap();
}

/// Scans a function once and returns advisory size facts about it.
///
/// Two patterns are recognized:
/// - `sub $<imm>,%rsp` records the stack-frame size under [STACK_FACT]; the
///   immediate may be hexadecimal (`$0x50`) or decimal (`$80`).
/// - `mov $<dec>` into `%rdx` or `%rcx` (the third and fourth integer
///   argument registers of the x86-64 SysV ABI) records the immediate under
///   [ARG_FACT] when it is small enough to plausibly be a buffer size. The
///   last such mov wins.
pub fn analyze_context(func: &Function) -> SizeFacts {
    let mut facts = SizeFacts::default();
    for ins in func.get_insns() {
        match ins.get_mnemonic() {
            "sub" if ins.get_operands().contains("%rsp") => {
                if let Some(size) = dollar_immediate(ins.get_operands()) {
                    facts.insert(STACK_FACT, size);
                }
            }
            "mov" => {
                if let Some(size) = argument_size_imm(ins) {
                    if size < PLAUSIBLE_BUFFER_SIZE {
                        facts.insert(ARG_FACT, size);
                    }
                }
            }
            _ => {}
        }
    }
    facts
}

/// Extracts the decimal immediate a `mov` loads into `%rdx` or `%rcx`.
///
/// Hexadecimal immediates are deliberately not accepted here: the callers
/// reason about sizes an author wrote out in decimal, and a naive decimal
/// scan of `$0x…` would read the leading zero.
pub(crate) fn argument_size_imm(ins: &Instruction) -> Option<u64> {
    if ins.get_mnemonic() != "mov" {
        return None;
    }
    let operands = ins.get_operands();
    if !operands.contains("%rdx") && !operands.contains("%rcx") {
        return None;
    }
    RE_DECIMAL_IMM
        .captures(operands)
        .and_then(|cap| cap[1].parse().ok())
}

/// Extracts a `$`-prefixed immediate, hexadecimal or decimal, from a string
/// of operands.
pub(crate) fn dollar_immediate(operands: &str) -> Option<u64> {
    RE_DOLLAR_IMM
        .captures(operands)
        .and_then(|cap| parse::<u64>(&cap[1]).ok())
}

#[cfg(test)]
mod tests {
    use crate::analysis::context::{analyze_context, ARG_FACT, STACK_FACT};
    use crate::disasm::{Function, Instruction};

    fn func(body: &[(&str, &str, &str)]) -> Function {
        let mut f = Function::new("main", "401136");
        for (addr, mnemonic, operands) in body {
            f.push_instruction(Instruction::new(addr, mnemonic, operands));
        }
        f
    }

    #[test]
    fn stack_fact_hex_immediate() {
        let facts = analyze_context(&func(&[("40113a", "sub", "$0x50,%rsp")]));
        assert_eq!(facts.get(STACK_FACT), Some(&0x50));
    }

    #[test]
    fn stack_fact_decimal_immediate() {
        let facts = analyze_context(&func(&[("40113a", "sub", "$80,%rsp")]));
        assert_eq!(facts.get(STACK_FACT), Some(&80));
    }

    #[test]
    fn stack_fact_requires_stack_pointer() {
        let facts = analyze_context(&func(&[("40113a", "sub", "$0x50,%rax")]));
        assert!(facts.get(STACK_FACT).is_none());
    }

    #[test]
    fn arg_fact_from_argument_register() {
        let facts = analyze_context(&func(&[("401150", "mov", "$64,%rdx")]));
        assert_eq!(facts.get(ARG_FACT), Some(&64));
    }

    #[test]
    fn arg_fact_last_mov_wins() {
        let facts = analyze_context(&func(&[
            ("401150", "mov", "$64,%rdx"),
            ("401158", "mov", "$128,%rcx"),
        ]));
        assert_eq!(facts.get(ARG_FACT), Some(&128));
    }

    #[test]
    fn arg_fact_rejects_implausible_sizes() {
        let facts = analyze_context(&func(&[("401150", "mov", "$20000,%rdx")]));
        assert!(facts.get(ARG_FACT).is_none());
    }

    #[test]
    fn arg_fact_rejects_hex_immediates() {
        // $0x1000 must not be read as the decimal zero
        let facts = analyze_context(&func(&[("401150", "mov", "$0x1000,%rdx")]));
        assert!(facts.get(ARG_FACT).is_none());
    }

    #[test]
    fn arg_fact_ignores_other_registers() {
        let facts = analyze_context(&func(&[("401150", "mov", "$64,%rsi")]));
        assert!(facts.get(ARG_FACT).is_none());
    }

    #[test]
    fn no_facts_on_empty_function() {
        assert!(analyze_context(&func(&[])).is_empty());
    }
}
