use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::diagnostic::Diagnostic;
use crate::lexer::Position;


#[derive(Debug, Error)]
pub enum LexError {
    #[error("invalid source path")]
    InvalidPath,
    #[error("source file {} not found", .0.display())]
    NotFound(PathBuf),
    #[error("could not read source file {}: {source}", .path.display())]
    Unreadable { path: PathBuf, source: io::Error },
    #[error("source file {} is too large ({size} bytes, limit is {limit})", .path.display())]
    TooLarge { path: PathBuf, size: u64, limit: u64 },
    #[error("source file {} is empty", .0.display())]
    Empty(PathBuf),
    #[error("unknown character {ch:?} at line {} col {}", .pos.0, .pos.1)]
    UnknownCharacter { ch: char, pos: Position },
}

#[derive(Debug, Error, PartialEq, Clone)]
#[error("{message}")]
pub struct SyntaxError {
    pub message: String,
    pub pos: Position,
    pub offset: usize,
    pub length: usize,
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
}

#[derive(Debug, Error, PartialEq, Clone)]
pub enum TypeError {
    #[error("undefined identifier {name} (NOTE: you cannot use a variable in its own initializer)")]
    UndefinedIdentifier { name: String, pos: Position },
    #[error("variable {name} has not been assigned a type")]
    UntypedVariable { name: String, pos: Position },
    #[error("unknown type name {name}")]
    UnknownType { name: String, pos: Position },
    #[error("invalid type {ty} for unary operator {op}")]
    InvalidUnaryOperand { ty: &'static str, op: &'static str, pos: Position },
    #[error("incompatible operand for operator {op} of type {ty}")]
    IncompatibleOperand { ty: &'static str, op: &'static str, pos: Position },
    #[error("mismatching types for operator ({left} and {right})")]
    MismatchedTypes { left: &'static str, right: &'static str, pos: Position },
    #[error("mismatch between types of variable {name} ({declared}) and initializer expression ({found})")]
    InitializerMismatch { name: String, declared: &'static str, found: &'static str, pos: Position },
    #[error("left side of an assignment must be a variable")]
    InvalidAssignTarget { pos: Position },
    #[error("integer literal {value} does not fit in {ty}")]
    LiteralOutOfRange { value: u64, ty: &'static str, pos: Position },
}

impl TypeError {
    pub fn pos(&self) -> Position {
        use TypeError::*;
        match self {
            UndefinedIdentifier { pos, .. }
            | UntypedVariable { pos, .. }
            | UnknownType { pos, .. }
            | InvalidUnaryOperand { pos, .. }
            | IncompatibleOperand { pos, .. }
            | MismatchedTypes { pos, .. }
            | InitializerMismatch { pos, .. }
            | LiteralOutOfRange { pos, .. }
            | InvalidAssignTarget { pos } => *pos,
        }
    }
}

#[derive(Debug, Error, PartialEq, Clone)]
pub enum InternalError {
    #[error("operand stack holds {0} entries after evaluating an expression, expected 1")]
    UnbalancedStack(usize),
    #[error("operand stack underflow")]
    StackUnderflow,
    #[error("no variable symbol named {0}")]
    UnknownVariable(String),
    #[error("variable {name} is read before any value was assigned to it")]
    UnassignedVariable { name: String, pos: Position },
    #[error("assignment target is not a variable")]
    InvalidAssignTarget { pos: Position },
    #[error("declaration of {0} was not registered by semantic analysis")]
    UnregisteredDeclaration(String),
    #[error("IR generation is not implemented for {0}")]
    UnsupportedStatement(&'static str),
    #[error("operator {0} has no IR instruction")]
    UnmappedOperator(&'static str),
}

impl InternalError {
    pub fn pos(&self) -> Option<Position> {
        match self {
            InternalError::UnassignedVariable { pos, .. }
            | InternalError::InvalidAssignTarget { pos } => Some(*pos),
            _ => None,
        }
    }
}

/// Failure of a single statement during analysis.
#[derive(Debug, Error, PartialEq, Clone)]
pub enum AnalysisError {
    #[error(transparent)]
    Type(#[from] TypeError),
    #[error(transparent)]
    Internal(#[from] InternalError),
}

#[derive(Debug, Error)]
pub enum SemaError {
    #[error("semantic analysis failed with {} error(s)", .diagnostics.len())]
    Failed { diagnostics: Vec<Diagnostic> },
    #[error("internal error during semantic analysis: {0}")]
    Internal(#[from] InternalError),
}

pub type IrError = InternalError;
