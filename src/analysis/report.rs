use crate::analysis::{CommandInjectionFinding, HeapFinding, RiskLevel, UnsafeFinding};
use std::fmt::{Display, Formatter};

/// Aggregated result of one analysis run.
///
/// The report owns every finding produced by the detectors and renders them
/// as a textual report with one section per vulnerability class plus a
/// summary. Rendering happens through the [Display] implementation.
#[derive(Debug, Default)]
pub struct Report {
    /// Number of functions recovered from the disassembly.
    pub functions_analyzed: usize,
    pub unsafe_calls: Vec<UnsafeFinding>,
    pub heap_overflows: Vec<HeapFinding>,
    pub command_injections: Vec<CommandInjectionFinding>,
}

impl Report {
    /// Returns the total number of findings across every class.
    pub fn total_issues(&self) -> usize {
        self.unsafe_calls.len() + self.heap_overflows.len() + self.command_injections.len()
    }
}

impl Display for Report {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.write_unsafe_section(f)?;
        self.write_heap_section(f)?;
        self.write_command_section(f)?;
        self.write_summary(f)
    }
}

impl Report {
    fn write_unsafe_section(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write_banner(f, "BUFFER OVERFLOW ANALYSIS")?;
        if self.unsafe_calls.is_empty() {
            return writeln!(f, "✓ No unsafe function calls detected.");
        }
        for level in [RiskLevel::High, RiskLevel::Medium, RiskLevel::Low] {
            let in_level = self
                .unsafe_calls
                .iter()
                .filter(|finding| finding.risk_level == level)
                .collect::<Vec<_>>();
            if in_level.is_empty() {
                continue;
            }
            writeln!(f, "\n[{} RISK] Found {} issues:", level, in_level.len())?;
            writeln!(f, "{}", "-".repeat(50))?;
            for group in group_findings(&in_level) {
                let functions = group
                    .iter()
                    .map(|finding| finding.func_name.as_str())
                    .filter(|name| !name.is_empty())
                    .fold(Vec::new(), |mut names, name| {
                        if !names.contains(&name) {
                            names.push(name);
                        }
                        names
                    });
                if !functions.is_empty() {
                    writeln!(f, "   Function : {}", functions.join(", "))?;
                }
                writeln!(f, "   Calls    : {}", group[0].target)?;
                writeln!(f, "   Analysis : {}", group[0].detail)?;
                let addresses = group
                    .iter()
                    .map(|finding| finding.display_addr())
                    .collect::<Vec<_>>()
                    .join(", ");
                writeln!(f, "   Addresses: {}", addresses)?;
                writeln!(f)?;
            }
        }
        Ok(())
    }

    fn write_heap_section(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write_banner(f, "HEAP OVERFLOW ANALYSIS")?;
        if self.heap_overflows.is_empty() {
            return writeln!(f, "✓ No heap overflow vulnerabilities detected.");
        }
        for finding in &self.heap_overflows {
            if !finding.func_name.is_empty() {
                writeln!(f, "   Potential heap overflow in '{}':", finding.func_name)?;
            }
            writeln!(f, "   Address: {}", finding.display_addr())?;
            writeln!(f, "   Detail : {}", finding.detail)?;
            writeln!(f)?;
        }
        Ok(())
    }

    fn write_command_section(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write_banner(f, "COMMAND INJECTION ANALYSIS")?;
        if self.command_injections.is_empty() {
            return writeln!(f, "✓ No command injection vulnerabilities detected.");
        }
        for finding in &self.command_injections {
            if !finding.func_name.is_empty() {
                writeln!(
                    f,
                    "   Potential command injection in '{}':",
                    finding.func_name
                )?;
            }
            writeln!(f, "   Address: {}", finding.display_addr())?;
            writeln!(f, "   Calls  : {}", finding.target)?;
            writeln!(f, "   Detail : {}", finding.detail)?;
            writeln!(f)?;
        }
        Ok(())
    }

    fn write_summary(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write_banner(f, "SUMMARY")?;
        let total = self.total_issues();
        writeln!(f, "Total issues found: {}", total)?;
        writeln!(f, "├─ Unsafe function calls: {}", self.unsafe_calls.len())?;
        writeln!(f, "├─ Heap overflows       : {}", self.heap_overflows.len())?;
        writeln!(
            f,
            "└─ Command injections   : {}",
            self.command_injections.len()
        )?;
        if total == 0 {
            writeln!(
                f,
                "\nBinary appears to be free of common vulnerability patterns."
            )
        } else {
            writeln!(
                f,
                "\nReview flagged issues carefully - some may be false positives."
            )?;
            writeln!(f, "   Focus on HIGH risk findings first.")
        }
    }
}

// deduplicates findings of one risk level by (target, detail), keeping the
// first-seen order of both the groups and the addresses inside them
fn group_findings<'a>(findings: &[&'a UnsafeFinding]) -> Vec<Vec<&'a UnsafeFinding>> {
    let mut groups: Vec<Vec<&UnsafeFinding>> = Vec::new();
    for &finding in findings {
        let slot = groups.iter_mut().find(|group| {
            group[0].target == finding.target && group[0].detail == finding.detail
        });
        match slot {
            Some(group) => group.push(finding),
            None => groups.push(vec![finding]),
        }
    }
    groups
}

fn write_banner(f: &mut Formatter<'_>, title: &str) -> std::fmt::Result {
    writeln!(f, "\n{}", "=".repeat(60))?;
    writeln!(f, " {}", title)?;
    writeln!(f, "{}", "=".repeat(60))
}
