use clap::Parser;
use log::LevelFilter;

/// Scans a native executable for common vulnerability patterns.
///
/// The binary is disassembled with objdump and searched for three classes of
/// issues: misuse-prone C-library calls (stack-based overflows), heap copies
/// larger than the tracked allocation, and calls to process-spawning
/// functions (command injection). The report is printed to stdout, grouped
/// by vulnerability class and risk level.
#[derive(Parser)]
#[clap(author, version, about, verbatim_doc_comment)]
struct Args {
    /// Binary file to analyze.
    binary: String,
    /// Log file.
    #[clap(short, long, value_name = "FILE")]
    log: Option<String>,
}

fn main() {
    let args = parse_args();
    if let Some(logfile) = args.log.as_deref() {
        simple_logging::log_to_file(logfile, LevelFilter::Debug).expect("Could not setup log");
    }
    println!("Analyzing binary: {}", args.binary);
    let report = vulnscan::analyze(&args.binary);
    println!("Found {} functions to analyze.", report.functions_analyzed);
    print!("{}", report);
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
