use crate::disasm::canonicalize;
use std::cmp::Ordering;

/// Struct representing a single disassembled instruction.
///
/// The Instruction struct is an immutable record of one line of disassembly.
/// It is composed of:
/// - an address in canonical form (lowercase hex, no `0x` prefix, no leading
///   zeros)
/// - the mnemonic, a single lowercase token
/// - the operands, the remainder of the line with whitespace collapsed
///
/// Instructions are owned by the [crate::disasm::Function] containing them and
/// are never modified after the listing has been parsed.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Instruction {
    address: String,
    mnemonic: String,
    operands: String,
}

impl Instruction {
    /// Creates a new instruction with the following parameters:
    /// - `address`: the instruction address; canonicalized by this constructor
    /// - `mnemonic`: the instruction mnemonic, e.g. `"mov"`
    /// - `operands`: the rest of the line, e.g. `"$0x50,%rsp"`
    /// # Examples
    /// Basic usage:
    /// ```
    /// use vulnscan::disasm::Instruction;
    ///
    /// let ins = Instruction::new("00000000004011a0", "SUB", "$0x50,%rsp");
    ///
    /// assert_eq!(ins.get_address(), "4011a0");
    /// assert_eq!(ins.get_mnemonic(), "sub");
    /// ```
    pub fn new(address: &str, mnemonic: &str, operands: &str) -> Instruction {
        Instruction {
            address: canonicalize(address),
            mnemonic: mnemonic.trim().to_ascii_lowercase(),
            operands: operands.split_whitespace().collect::<Vec<_>>().join(" "),
        }
    }

    /// Returns the address of this instruction, in canonical form.
    pub fn get_address(&self) -> &str {
        &self.address
    }

    /// Returns the numeric offset of this instruction in the binary.
    ///
    /// Addresses that do not parse as hexadecimal map to offset zero.
    pub fn get_offset(&self) -> u64 {
        u64::from_str_radix(&self.address, 16).unwrap_or(0)
    }

    /// Returns the mnemonic of this instruction.
    ///
    /// The mnemonic will be **always** lowercase.
    pub fn get_mnemonic(&self) -> &str {
        &self.mnemonic
    }

    /// Returns the operands of this instruction.
    ///
    /// If no operands were present, an empty string is returned.
    /// # Examples
    /// Basic usage:
    /// ```
    /// use vulnscan::disasm::Instruction;
    ///
    /// let ins = Instruction::new("40114a", "call", "401030  <gets@plt>");
    ///
    /// assert_eq!(ins.get_operands(), "401030 <gets@plt>");
    /// ```
    pub fn get_operands(&self) -> &str {
        &self.operands
    }

    /// Returns true if this instruction is a call (`call` or `callq`).
    pub fn is_call(&self) -> bool {
        self.mnemonic == "call" || self.mnemonic == "callq"
    }
}

impl Ord for Instruction {
    fn cmp(&self, other: &Self) -> Ordering {
        self.get_offset().cmp(&other.get_offset())
    }
}

impl PartialOrd for Instruction {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
