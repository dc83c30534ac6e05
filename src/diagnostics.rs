//! Shared error shape and configuration threaded through every stage.
//!
//! A plain `{kind, position, message, cause}` struct with hand-rolled
//! `Display`/`Error` impls, one flavor per pipeline stage.

use std::error::Error;
use std::fmt::{self, Display};

use crate::position::Position;

/// Which stage raised the error. Used only for the `<Kind> Error` prefix
/// in the formatted message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Syntax,
    Type,
    Compile,
    Runtime,
}

impl Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Kind::Syntax => "Syntax",
            Kind::Type => "Type",
            Kind::Compile => "Compile",
            Kind::Runtime => "Runtime",
        })
    }
}

/// A single diagnostic. Shared by all four stages; `cause` links a
/// runtime error back to whatever lower-level condition produced it
/// (e.g. a `Compile` error wrapping a register-exhaustion condition).
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub kind: Kind,
    pub position: Position,
    pub message: String,
    pub cause: Option<Box<Diagnostic>>,
}

impl Diagnostic {
    pub fn new(kind: Kind, position: Position, message: impl Into<String>) -> Self {
        Self {
            kind,
            position,
            message: message.into(),
            cause: None,
        }
    }

    pub fn with_cause(mut self, cause: Diagnostic) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Render as `<Kind> Error at L:C: msg` plus the offending source
    /// line and a caret. Lines over 100 bytes are truncated around the
    /// error column with `…`; inputs whose single line exceeds 200
    /// bytes suppress the source display entirely.
    pub fn render(&self, source: &str) -> String {
        let mut out = format!(
            "{} Error at {}: {}",
            self.kind, self.position, self.message
        );

        let Some(line) = source.lines().nth(self.position.line.saturating_sub(1)) else {
            return out;
        };
        let line = line.trim_end();
        if line.len() > 200 && source.lines().count() == 1 {
            return out;
        }

        let (display_line, caret_col) = truncate_around(line, self.position.column);
        out.push('\n');
        out.push_str(display_line.trim_start());
        out.push('\n');
        let leading = display_line.len() - display_line.trim_start().len();
        out.push_str(&" ".repeat(caret_col.saturating_sub(leading)));
        out.push('^');
        out
    }
}

/// Truncate `line` to at most 100 bytes, keeping a window around
/// `column`, and return the truncated line plus the caret's adjusted
/// column within it.
fn truncate_around(line: &str, column: usize) -> (String, usize) {
    const MAX: usize = 100;
    if line.len() <= MAX {
        return (line.to_string(), column.saturating_sub(1));
    }

    let col0 = column.saturating_sub(1).min(line.len());
    let half = MAX / 2;
    let start = col0.saturating_sub(half);
    let end = (start + MAX).min(line.len());
    let start = end.saturating_sub(MAX).max(0);

    let mut display = String::new();
    if start > 0 {
        display.push_str("…");
    }
    display.push_str(&line[start..end]);
    if end < line.len() {
        display.push_str("…");
    }

    let prefix_markers = if start > 0 { 1 } else { 0 };
    let new_col = (col0 - start) + prefix_markers;
    (display, new_col)
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Error at {}: {}", self.kind, self.position, self.message)
    }
}

impl Error for Diagnostic {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.cause.as_deref().map(|c| c as &(dyn Error + 'static))
    }
}

macro_rules! stage_error {
    ($name:ident, $kind:expr) => {
        #[derive(Debug, Clone)]
        pub struct $name(pub Diagnostic);

        impl $name {
            pub fn new(position: Position, message: impl Into<String>) -> Self {
                Self(Diagnostic::new($kind, position, message))
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                Display::fmt(&self.0, f)
            }
        }

        impl Error for $name {
            fn source(&self) -> Option<&(dyn Error + 'static)> {
                self.0.source()
            }
        }

        impl From<$name> for Diagnostic {
            fn from(e: $name) -> Diagnostic {
                e.0
            }
        }
    };
}

stage_error!(SyntaxError, Kind::Syntax);
stage_error!(TypeError, Kind::Type);
stage_error!(CompileError, Kind::Compile);
stage_error!(RuntimeError, Kind::Runtime);

/// Configuration threaded explicitly through the pipeline (lexer, parser,
/// checker, compiler, VM) instead of living in process-wide statics, so
/// two runs in the same process never interfere with each other's debug
/// flags or step budgets.
#[derive(Debug, Clone)]
pub struct Config {
    /// Print the AST after parsing.
    pub debug_ast: bool,
    /// Print the disassembly of every compiled chunk before execution.
    pub debug_bytecode: bool,
    /// Maximum number of VM dispatch steps before the run is aborted
    /// with a `RuntimeError`. `None` means unbounded.
    pub step_budget: Option<u64>,
    /// Call-frame depth at which the VM reports a stack overflow.
    pub max_call_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debug_ast: false,
            debug_bytecode: false,
            step_budget: None,
            max_call_depth: 1024,
        }
    }
}
