use std::fmt;

use crate::lexer::Position;
use crate::source::Source;


/// An error message anchored to a source position, rendered as
///
/// ```text
/// file:line:col
/// Error: message
/// <source line>
///     ^
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub file: String,
    pub pos: Position,
    pub message: String,
    pub line: Option<String>,
}

impl Diagnostic {
    pub fn new(source: &Source, pos: Position, message: impl Into<String>) -> Diagnostic {
        Diagnostic {
            file: source.name().to_string(),
            pos,
            message: message.into(),
            line: source.line(pos.line()).map(str::to_string),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{}:{}:{}", self.file, self.pos.line(), self.pos.column())?;
        write!(f, "Error: {}", self.message)?;
        if let Some(line) = &self.line {
            let indent = self.pos.column().saturating_sub(1) as usize;
            write!(f, "\n{}\n{}^", line, " ".repeat(indent))?;
        }
        Ok(())
    }
}
