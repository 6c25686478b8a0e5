use clap::Parser;
use log::LevelFilter;
use std::process::exit;
use vulnscan::disasm::canonicalize;
use vulnscan::disasm::objdump::ObjdumpDisasm;

/// Dumps the disassembly around one instruction address.
///
/// The binary is disassembled with objdump, the function containing the
/// given address is located and a window of instructions around the hit is
/// printed. Useful to inspect the context of an address reported by the
/// scanner.
#[derive(Parser)]
#[clap(author, version, about, verbatim_doc_comment)]
struct Args {
    /// Binary file to disassemble.
    binary: String,
    /// Address of the instruction of interest, with or without 0x prefix.
    address: String,
    /// Instructions printed before the hit.
    #[clap(short, long, default_value_t = 10)]
    before: usize,
    /// Instructions printed after the hit.
    #[clap(short, long, default_value_t = 10)]
    after: usize,
    /// Prints the whole containing function instead of a window.
    #[clap(short, long)]
    full: bool,
    /// Log file.
    #[clap(short, long, value_name = "FILE")]
    log: Option<String>,
}

fn main() {
    let args = parse_args();
    if let Some(logfile) = args.log.as_deref() {
        simple_logging::log_to_file(logfile, LevelFilter::Debug).expect("Could not setup log");
    }
    let disassembler = match ObjdumpDisasm::new(&args.binary) {
        Ok(disassembler) => disassembler,
        Err(error) => {
            eprintln!("Error: cannot open binary file '{}': {}", args.binary, error);
            exit(1);
        }
    };
    let target = canonicalize(&args.address);
    for func in disassembler.functions() {
        let insns = func.get_insns();
        if let Some(hit) = insns.iter().position(|ins| ins.get_address() == target) {
            println!("Function: {}", func.get_mangled_name());
            let (start, end) = if args.full {
                (0, insns.len())
            } else {
                (
                    hit.saturating_sub(args.before),
                    (hit + args.after + 1).min(insns.len()),
                )
            };
            for ins in &insns[start..end] {
                println!(
                    "  {}:\t{}\t{}",
                    ins.get_address(),
                    ins.get_mnemonic(),
                    ins.get_operands()
                );
            }
            return;
        }
    }
    println!("Address 0x{} not found in disassembly.", target);
    exit(1);
}

// clap exits with code 2 on usage errors; argument misuse must exit with 1
fn parse_args() -> Args {
    Args::try_parse().unwrap_or_else(|error| {
        let _ = error.print();
        let code = match error.kind() {
            clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => 0,
            _ => 1,
        };
        std::process::exit(code);
    })
}
