use crate::disasm::{Function, Instruction};
use lazy_static::lazy_static;
use regex::Regex;
use std::fs;
use std::io::{self, ErrorKind};
use std::process::Command;

lazy_static! {
    static ref RE_FUNCTION_HEADER: Regex = Regex::new(r"^([0-9a-fA-F]+)\s+<([^>]+)>:").unwrap();
    static ref RE_INSTRUCTION: Regex =
        Regex::new(r"^\s*([0-9a-fA-F]+):\s*([\da-fA-F]{2}(?:\s+[\da-fA-F]{2})*)\s+(\w+)\s+(.+)$")
            .unwrap();
}

/// Disassembler using the objdump backend.
///
/// Using this struct requires having binutils installed, with the `objdump`
/// binary on the path.
pub struct ObjdumpDisasm {
    binary: String,
}

impl ObjdumpDisasm {
    /// Creates a new objdump disassembling interface.
    ///
    /// In case of errors [io::Error] is returned with the following ErrorKind:
    /// - [io::ErrorKind::NotFound] : if the binary file can not be found or read
    pub fn new(binary: &str) -> Result<ObjdumpDisasm, io::Error> {
        if fs::metadata(binary).is_ok() {
            Ok(ObjdumpDisasm {
                binary: binary.to_string(),
            })
        } else {
            Err(io::Error::new(ErrorKind::NotFound, "Could not open file"))
        }
    }

    /// Disassembles the underlying binary and returns every function found in
    /// the listing, in disassembly order.
    ///
    /// Invokes `objdump -d` on the binary, drains its standard output to EOF
    /// and waits on the child. A child that can not be spawned yields an empty
    /// vector; a non-zero exit status is logged but whatever could be parsed
    /// from the output is kept.
    pub fn functions(&self) -> Vec<Function> {
        let output = match Command::new("objdump").arg("-d").arg(&self.binary).output() {
            Ok(output) => output,
            Err(error) => {
                log::error!("could not spawn objdump: {}", error);
                return Vec::new();
            }
        };
        if !output.status.success() {
            log::warn!("objdump exited with {} on {}", output.status, self.binary);
        }
        parse_listing(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Parses the textual listing produced by `objdump -d`.
///
/// Two line patterns are recognized: a function header (`<hex> <<name>>:`),
/// which opens a new [Function], and an instruction line (address, colon, hex
/// byte pairs, mnemonic, operands), which is appended to the open function.
/// Instruction lines before the first header are dropped; every other line
/// (banners, section markers, blanks) is ignored. A malformed line never
/// aborts the parse.
pub fn parse_listing(listing: &str) -> Vec<Function> {
    let mut funcs: Vec<Function> = Vec::new();
    for line in listing.lines() {
        if let Some(header) = RE_FUNCTION_HEADER.captures(line) {
            funcs.push(Function::new(&header[2], &header[1]));
            continue;
        }
        if let Some(current) = funcs.last_mut() {
            if let Some(ins) = RE_INSTRUCTION.captures(line) {
                current.push_instruction(Instruction::new(&ins[1], &ins[3], &ins[4]));
            }
        }
    }
    funcs
}
