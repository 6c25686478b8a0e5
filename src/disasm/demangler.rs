use fnv::FnvHashMap;
use std::process::Command;

/// Symbol demangler backed by the external `c++filt` program.
///
/// Every lookup spawns `c++filt` with the symbol as argument and captures its
/// standard output, trimming a single trailing newline. When the program can
/// not be spawned or produces empty output the input name is returned
/// unchanged. Results are memoized for the lifetime of the demangler, so the
/// same symbol is never demangled twice by one instance.
pub struct Demangler {
    cache: FnvHashMap<String, String>,
}

impl Demangler {
    /// Creates a new demangling interface with an empty cache.
    pub fn new() -> Demangler {
        Demangler {
            cache: FnvHashMap::default(),
        }
    }

    /// Demangles a single symbol name.
    ///
    /// Returns the demangled name, or `name` unchanged when demangling is not
    /// possible.
    pub fn demangle(&mut self, name: &str) -> String {
        if let Some(hit) = self.cache.get(name) {
            return hit.clone();
        }
        let demangled = match run_demangler(name) {
            Some(output) => output,
            None => name.to_string(),
        };
        self.cache.insert(name.to_string(), demangled.clone());
        demangled
    }
}

impl Default for Demangler {
    fn default() -> Self {
        Demangler::new()
    }
}

fn run_demangler(name: &str) -> Option<String> {
    let output = match Command::new("c++filt").arg(name).output() {
        Ok(output) => output,
        Err(error) => {
            log::debug!("could not spawn c++filt: {}", error);
            return None;
        }
    };
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    if text.ends_with('\n') {
        text.pop();
    }
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

#[cfg(test)]
mod tests {
    use crate::disasm::Demangler;
    use serial_test::serial;

    #[test]
    #[serial]
    fn demangler_process_not_existing() {
        let old_path = std::env::var("PATH").unwrap_or_else(|_| "".to_string());
        std::env::set_var("PATH", "");
        let mut dem = Demangler::new();
        let demangled = dem.demangle("_Z7processPc");
        std::env::set_var("PATH", old_path);
        assert_eq!(demangled, "_Z7processPc");
    }

    #[test]
    #[serial]
    fn demangler_caches_results() {
        let old_path = std::env::var("PATH").unwrap_or_else(|_| "".to_string());
        std::env::set_var("PATH", "");
        let mut dem = Demangler::new();
        let first = dem.demangle("_Z4funcv");
        std::env::set_var("PATH", old_path);
        // second lookup is answered from the cache, no process involved
        let second = dem.demangle("_Z4funcv");
        assert_eq!(first, second);
    }
}
