pub mod error;
pub mod source;
pub mod lexer;
pub mod types;
pub mod ast;
pub mod parser;
pub mod diagnostic;
pub mod sem;
pub mod ssa;
