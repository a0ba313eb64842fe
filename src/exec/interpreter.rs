//! Interpreter selection for runbook scripts

use std::path::PathBuf;

const DEFAULT_INTERPRETER: &str = "bash";

/// Interpreters whose scripts get wrapped for environment capture
const SHELL_COMPATIBLE: &[&str] = &[
    "bash",
    "sh",
    "/bin/bash",
    "/bin/sh",
    "/usr/bin/bash",
    "/usr/bin/sh",
];

/// The program a script runs under, plus arguments placed before the
/// script path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interpreter {
    pub program: String,
    pub args: Vec<String>,
}

impl Interpreter {
    fn bare(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn is_shell_compatible(&self) -> bool {
        is_shell_compatible(&self.program)
    }

    /// Absolute path to the program when it can be found on `PATH`.
    /// Falls back to the name as given.
    pub fn resolve_program(&self) -> PathBuf {
        let program = PathBuf::from(&self.program);
        if program.is_absolute() {
            return program;
        }
        which::which(&self.program).unwrap_or(program)
    }
}

/// Pick the interpreter for `script`.
///
/// An explicit `language` wins and takes no arguments. Otherwise a `#!`
/// first line is honored: `env`-style shebangs name the interpreter in
/// their second field, anything else is reduced to its binary name. With
/// neither, scripts run under bash.
pub fn detect_interpreter(script: &str, language: Option<&str>) -> Interpreter {
    if let Some(language) = language.map(str::trim).filter(|l| !l.is_empty()) {
        return Interpreter::bare(language);
    }

    let first_line = script.lines().next().unwrap_or_default();
    let Some(shebang) = first_line.strip_prefix("#!") else {
        return Interpreter::bare(DEFAULT_INTERPRETER);
    };
    let shebang = shebang.trim();
    let parts: Vec<&str> = shebang.split_whitespace().collect();

    if shebang.contains("/env ") {
        if parts.len() >= 2 {
            return Interpreter {
                program: parts[1].to_string(),
                args: parts[2..].iter().map(|s| s.to_string()).collect(),
            };
        }
    } else if let Some((first, rest)) = parts.split_first() {
        let program = first.rsplit('/').next().unwrap_or(*first);
        return Interpreter {
            program: program.to_string(),
            args: rest.iter().map(|s| s.to_string()).collect(),
        };
    }

    Interpreter::bare(DEFAULT_INTERPRETER)
}

/// Whether scripts for `interpreter` can be wrapped for environment capture.
pub fn is_shell_compatible(interpreter: &str) -> bool {
    SHELL_COMPATIBLE.contains(&interpreter)
}
