use std::mem;

use tracing::{debug, warn};

use crate::ast::{Expr, ExprKind, FunDecl, Statement, TypeName, VarDecl};
use crate::diagnostic::Diagnostic;
use crate::error::{AnalysisError, InternalError, SemaError, TypeError};
use crate::source::Source;
use crate::types::{self, OperatorCode, Type};


#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(pub usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SymbolKind {
    Variable,
    TypeAlias,
}

#[derive(Debug, PartialEq, Clone)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    /// `None` for a variable whose type is not inferred yet.
    pub ty: Option<&'static Type>,
}

impl Symbol {
    pub fn variable(name: &str, ty: Option<&'static Type>) -> Symbol {
        Symbol { name: name.to_string(), kind: SymbolKind::Variable, ty }
    }

    pub fn type_alias(ty: &'static Type) -> Symbol {
        Symbol { name: ty.name.to_string(), kind: SymbolKind::TypeAlias, ty: Some(ty) }
    }
}

/// Append-only list of symbols. Lookup returns the first symbol with a
/// matching name and kind, so a redeclared name keeps resolving to its
/// earliest binding.
#[derive(Debug, PartialEq, Clone)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
}

impl Default for SymbolTable {
    fn default() -> SymbolTable {
        SymbolTable {
            symbols: types::BUILTIN_TYPES.iter().map(|&ty| Symbol::type_alias(ty)).collect(),
        }
    }
}

impl SymbolTable {
    pub fn new() -> SymbolTable {
        SymbolTable::default()
    }

    pub fn push(&mut self, symbol: Symbol) -> SymbolId {
        self.symbols.push(symbol);
        SymbolId(self.symbols.len() - 1)
    }

    pub fn get(&self, id: SymbolId) -> Option<&Symbol> {
        self.symbols.get(id.0)
    }

    fn set_type(&mut self, id: SymbolId, ty: &'static Type) -> Result<(), InternalError> {
        match self.symbols.get_mut(id.0) {
            Some(sym) => {
                sym.ty = Some(ty);
                Ok(())
            }
            None => Err(InternalError::UnknownVariable(format!("#{}", id.0))),
        }
    }

    pub fn lookup(&self, name: &str, kind: SymbolKind) -> Option<(SymbolId, &Symbol)> {
        self.symbols.iter()
            .enumerate()
            .find(|(_, sym)| sym.kind == kind && sym.name == name)
            .map(|(idx, sym)| (SymbolId(idx), sym))
    }

    pub fn lookup_variable(&self, name: &str) -> Option<(SymbolId, &Symbol)> {
        self.lookup(name, SymbolKind::Variable)
    }

    pub fn lookup_type(&self, name: &str) -> Option<&'static Type> {
        self.lookup(name, SymbolKind::TypeAlias).and_then(|(_, sym)| sym.ty)
    }

    pub fn len(&self) -> usize { self.symbols.len() }
    pub fn is_empty(&self) -> bool { self.symbols.is_empty() }

    pub fn iter(&self) -> impl Iterator<Item = (SymbolId, &Symbol)> {
        self.symbols.iter().enumerate().map(|(idx, sym)| (SymbolId(idx), sym))
    }
}

type AnalysisResult<T> = Result<T, AnalysisError>;

/// Type checker. Expression types are computed with an explicit operand
/// stack in post-order; implicit widening casts are spliced into the AST
/// in place.
pub struct Analyser {
    symbols: SymbolTable,
    stack: Vec<&'static Type>,
}

impl Default for Analyser {
    fn default() -> Analyser {
        Analyser { symbols: SymbolTable::new(), stack: Vec::new() }
    }
}

impl Analyser {
    pub fn new() -> Analyser {
        Analyser::default()
    }

    pub fn symbols(&self) -> &SymbolTable { &self.symbols }

    pub fn into_symbols(self) -> SymbolTable { self.symbols }

    fn pop(&mut self) -> Result<&'static Type, InternalError> {
        self.stack.pop().ok_or(InternalError::StackUnderflow)
    }

    fn resolve_type(&self, name: &TypeName) -> Result<&'static Type, TypeError> {
        self.symbols.lookup_type(&name.name).ok_or_else(|| TypeError::UnknownType {
            name: name.name.clone(),
            pos: name.loc,
        })
    }

    /// Type checks one expression and returns its type. The expression may
    /// come back rewritten with implicit casts.
    pub fn analyse_expression(&mut self, e: &mut Expr) -> AnalysisResult<&'static Type> {
        self.stack.clear();
        self.evaluate(e)?;
        if self.stack.len() != 1 {
            return Err(InternalError::UnbalancedStack(self.stack.len()).into());
        }
        Ok(self.pop()?)
    }

    fn evaluate(&mut self, e: &mut Expr) -> AnalysisResult<()> {
        let loc = e.loc;
        match &mut e.kind {
            ExprKind::Integer { ty, value, .. } => {
                if !ty.fits(*value) {
                    return Err(TypeError::LiteralOutOfRange { value: *value, ty: ty.name, pos: loc }.into());
                }
                self.stack.push(*ty);
            }
            ExprKind::Ident(name) => {
                let (_, sym) = self.symbols.lookup_variable(name)
                    .ok_or_else(|| TypeError::UndefinedIdentifier { name: name.clone(), pos: loc })?;
                let ty = sym.ty
                    .ok_or_else(|| TypeError::UntypedVariable { name: name.clone(), pos: loc })?;
                self.stack.push(ty);
            }
            ExprKind::Unary(op, operand) => {
                match operand.kind {
                    ExprKind::Integer { ty, value, .. }
                        if *op == OperatorCode::UnaryMinus && ty.fits_negated(value) => self.stack.push(ty),
                    _ => self.evaluate(operand)?,
                }
                let ty = self.pop()?;
                if !types::type_supports_op(ty, *op) {
                    return Err(TypeError::InvalidUnaryOperand { ty: ty.name, op: op.symbol(), pos: loc }.into());
                }
                self.stack.push(ty);
            }
            ExprKind::Cast(ty, inner) => {
                self.evaluate(inner)?;
                self.pop()?;
                self.stack.push(*ty);
            }
            ExprKind::Binary(op, l, r) => {
                let op = *op;
                if op == OperatorCode::Assign && l.as_ident().is_none() {
                    return Err(TypeError::InvalidAssignTarget { pos: loc }.into());
                }

                self.evaluate(l)?;
                self.evaluate(r)?;
                let rt = self.pop()?;
                let lt = self.pop()?;

                for ty in &[lt, rt] {
                    if !types::type_supports_op(ty, op) {
                        return Err(TypeError::IncompatibleOperand { ty: ty.name, op: op.symbol(), pos: loc }.into());
                    }
                }

                // The left side of an assignment is never widened.
                let result = if lt == rt {
                    lt
                } else if op != OperatorCode::Assign && types::types_compatible(lt, rt) {
                    debug!(from = lt.name, to = rt.name, line = loc.line(), "widening left operand");
                    widen(l, rt);
                    rt
                } else if types::types_compatible(rt, lt) {
                    debug!(from = rt.name, to = lt.name, line = loc.line(), "widening right operand");
                    widen(r, lt);
                    lt
                } else {
                    return Err(TypeError::MismatchedTypes { left: lt.name, right: rt.name, pos: loc }.into());
                };
                self.stack.push(result);
            }
        }
        Ok(())
    }

    fn analyse_var_decl(&mut self, decl: &mut VarDecl) -> AnalysisResult<()> {
        let declared = match &decl.ty {
            Some(name) => Some(self.resolve_type(name)?),
            None => None,
        };

        // Registered before the initializer is checked.
        let id = self.symbols.push(Symbol::variable(&decl.name, declared));
        decl.symbol = Some(id);

        let init = match &mut decl.init {
            Some(init) => init,
            None => return Ok(()),
        };

        if let Some(ty) = declared {
            adopt_literal_type(init, ty);
        }
        let found = self.analyse_expression(init)?;
        match declared {
            Some(ty) if ty != found => Err(TypeError::InitializerMismatch {
                name: decl.name.clone(),
                declared: ty.name,
                found: found.name,
                pos: init.loc,
            }.into()),
            Some(_) => Ok(()),
            None => Ok(self.symbols.set_type(id, found)?),
        }
    }

    // Parameters are registered in the one flat table, after the types of
    // all of them and of the return value have resolved.
    fn analyse_function_header(&mut self, fun: &FunDecl) -> AnalysisResult<()> {
        let mut params = Vec::with_capacity(fun.params.len());
        for param in &fun.params {
            params.push((param.name.as_str(), self.resolve_type(&param.ty)?));
        }
        if let Some(ret) = &fun.ret {
            self.resolve_type(ret)?;
        }
        for (name, ty) in params {
            self.symbols.push(Symbol::variable(name, Some(ty)));
        }
        Ok(())
    }

    /// Analyses a single statement, stopping at its first error. Inside a
    /// function body that means the first failing body statement.
    pub fn analyse_statement(&mut self, stat: &mut Statement) -> AnalysisResult<()> {
        match stat {
            Statement::Expr(e) => self.analyse_expression(e).map(|_| ()),
            Statement::VarDecl(decl) => self.analyse_var_decl(decl),
            Statement::Function(fun) => {
                self.analyse_function_header(fun)?;
                for body_stat in fun.body.iter_mut() {
                    self.analyse_statement(body_stat)?;
                }
                Ok(())
            }
        }
    }

    /// Analyses statements in order. A type error ends its own statement
    /// only; an internal error ends the whole pass.
    fn analyse_block(
        &mut self,
        source: &Source,
        statements: &mut [Statement],
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<(), InternalError> {
        for stat in statements.iter_mut() {
            let result = match stat {
                Statement::Function(fun) => {
                    match self.analyse_function_header(fun) {
                        Ok(()) => {
                            debug!(name = %fun.name, "analysing function body");
                            self.analyse_block(source, &mut fun.body, diagnostics)?;
                            Ok(())
                        }
                        Err(err) => Err(err),
                    }
                }
                _ => self.analyse_statement(stat),
            };
            match result {
                Ok(()) => debug!(line = stat.loc().line(), "statement ok: {}", stat),
                Err(AnalysisError::Type(err)) => {
                    warn!(line = err.pos().line(), "{}", err);
                    diagnostics.push(Diagnostic::new(source, err.pos(), err.to_string()));
                }
                Err(AnalysisError::Internal(err)) => return Err(err),
            }
        }
        Ok(())
    }
}

// Splices a cast to `ty` between `operand` and its parent.
fn widen(operand: &mut Box<Expr>, ty: &'static Type) {
    let placeholder = Expr::number(0, operand.loc);
    let inner = mem::replace(&mut **operand, placeholder);
    **operand = inner.into_cast(ty);
}

/// An unsuffixed literal initializing a typed declaration takes the
/// declared type when its value fits, so `let a: u8 = 1;` is accepted.
fn adopt_literal_type(init: &mut Expr, declared: &'static Type) {
    adopt_literal(init, declared, false);
}

fn adopt_literal(e: &mut Expr, declared: &'static Type, negated: bool) {
    match &mut e.kind {
        ExprKind::Integer { ty, value, suffixed: false } => {
            let fits = if negated { declared.fits_negated(*value) } else { declared.fits(*value) };
            if fits {
                *ty = declared;
            }
        }
        ExprKind::Unary(op, operand) => {
            let negated = *op == OperatorCode::UnaryMinus;
            adopt_literal(operand, declared, negated)
        }
        _ => {}
    }
}

/// Type checks a whole program. Every failing statement contributes one
/// diagnostic; the symbol table is returned only when none failed.
pub fn analyse(source: &Source, statements: &mut [Statement]) -> Result<SymbolTable, SemaError> {
    let mut analyser = Analyser::new();
    let mut diagnostics = Vec::new();
    analyser.analyse_block(source, statements, &mut diagnostics)?;

    if diagnostics.is_empty() {
        debug!(symbols = analyser.symbols.len(), "semantic analysis succeeded");
        Ok(analyser.into_symbols())
    } else {
        Err(SemaError::Failed { diagnostics })
    }
}


#[cfg(test)]
mod test {
    use crate::ast::{Expr, ExprKind, Statement};
    use crate::error::{AnalysisError, SemaError, TypeError};
    use crate::lexer::Position;
    use crate::parser::parse;
    use crate::source::Source;
    use crate::types::{I8, I16, I32, I64, U8};
    use super::{analyse, Analyser, Symbol, SymbolKind, SymbolTable, SymbolId};

    fn analysed(src: &str) -> (Vec<Statement>, Result<SymbolTable, SemaError>) {
        let mut stats = parse(src).unwrap();
        let source = Source::new("test.lang", src);
        let result = analyse(&source, &mut stats);
        (stats, result)
    }

    fn type_errors(src: &str) -> Vec<TypeError> {
        let mut stats = parse(src).unwrap();
        let mut analyser = Analyser::new();
        stats.iter_mut()
            .filter_map(|stat| match analyser.analyse_statement(stat) {
                Err(AnalysisError::Type(err)) => Some(err),
                Err(other) => panic!("unexpected error {:?}", other),
                Ok(()) => None,
            })
            .collect()
    }

    fn expr_type(setup: &str, expr: &str) -> &'static crate::types::Type {
        let mut analyser = Analyser::new();
        for stat in parse(setup).unwrap().iter_mut() {
            analyser.analyse_statement(stat).unwrap();
        }
        match parse(expr).unwrap().pop() {
            Some(Statement::Expr(mut e)) => analyser.analyse_expression(&mut e).unwrap(),
            other => panic!("expected an expression, got {:?}", other),
        }
    }

    #[test]
    fn table_is_seeded_with_builtins() {
        let table = SymbolTable::new();
        assert_eq!(table.len(), 8);
        assert_eq!(table.lookup_type("u16").map(|t| t.name), Some("u16"));
        assert_eq!(table.lookup_type("bool"), None);
        assert!(table.iter().all(|(_, sym)| sym.kind == SymbolKind::TypeAlias));
    }

    #[test]
    fn lookup_returns_first_match() {
        let mut table = SymbolTable::new();
        let first = table.push(Symbol::variable("x", Some(&I8)));
        let second = table.push(Symbol::variable("x", Some(&I64)));
        assert_eq!(first, SymbolId(8));
        assert_eq!(second, SymbolId(9));
        assert_eq!(table.lookup_variable("x").map(|(id, _)| id), Some(first));
        assert_eq!(table.lookup_variable("x").and_then(|(_, s)| s.ty), Some(&I8));
        // a variable named like a type does not hide the type
        table.push(Symbol::variable("i32", None));
        assert_eq!(table.lookup_type("i32"), Some(&I32));
    }

    #[test]
    fn implicit_widening_wraps_left_operand() {
        let (stats, result) = analysed("let a: i8 = 1; let b: i32 = 2; a + b;");
        assert!(result.is_ok());
        match &stats[2] {
            Statement::Expr(Expr { kind: ExprKind::Binary(_, l, r), .. }) => {
                assert_eq!(l.kind, ExprKind::Cast(&I32, Box::new(Expr::var("a", Position(1, 32)))));
                assert_eq!(r.as_ident(), Some("b"));
            }
            other => panic!("expected a binary expression, got {:?}", other),
        }
        assert_eq!(stats[2].to_string(), "a (i32) b +");
        assert_eq!(expr_type("let a: i8 = 1; let b: i32 = 2;", "a + b;"), &I32);
    }

    #[test]
    fn widening_right_operand() {
        assert_eq!(expr_type("let a: i64 = 1; let b: i16 = 2;", "a * b;"), &I64);
        let (stats, _) = analysed("let a: i64 = 1; let b: i16 = 2; a * b;");
        assert_eq!(stats[2].to_string(), "a b (i64) *");
    }

    #[test]
    fn assignment_only_widens_right_side() {
        let (stats, result) = analysed("let a: i64 = 0; let b: i8 = 1; a = b;");
        assert!(result.is_ok());
        assert_eq!(stats[2].to_string(), "a b (i64) =");

        assert_eq!(type_errors("let a: i8 = 0; let b: i64 = 1; a = b;"), vec![
            TypeError::MismatchedTypes { left: "i8", right: "i64", pos: Position(1, 34) },
        ]);
    }

    #[test]
    fn unsigned_unary_minus_is_rejected() {
        assert_eq!(type_errors("let a: u8 = 1; -a;"), vec![
            TypeError::InvalidUnaryOperand { ty: "u8", op: "u-", pos: Position(1, 16) },
        ]);
        assert!(type_errors("let a: u8 = 1; +a;").is_empty());
    }

    #[test]
    fn undefined_identifier() {
        let errors = type_errors("x + 1;");
        assert_eq!(errors, vec![TypeError::UndefinedIdentifier { name: "x".to_string(), pos: Position(1, 1) }]);
        assert!(errors[0].to_string().contains("undefined identifier x"));
    }

    #[test]
    fn declarations() {
        assert_eq!(type_errors("let a: i16 = 1i8;"), vec![
            TypeError::InitializerMismatch {
                name: "a".to_string(), declared: "i16", found: "i8", pos: Position(1, 14),
            },
        ]);
        assert_eq!(type_errors("let a: bool = 1;"), vec![
            TypeError::UnknownType { name: "bool".to_string(), pos: Position(1, 8) },
        ]);
        // no widening at the declaration boundary
        assert_eq!(type_errors("let a: i8 = 1; let b: i16 = a;").len(), 1);
        // the variable exists, untyped, while its own initializer is checked
        assert_eq!(type_errors("let a = a + 1;"), vec![
            TypeError::UntypedVariable { name: "a".to_string(), pos: Position(1, 9) },
        ]);
        assert_eq!(type_errors("let a: u8 = 300;"), vec![
            TypeError::InitializerMismatch {
                name: "a".to_string(), declared: "u8", found: "i32", pos: Position(1, 13),
            },
        ]);
    }

    #[test]
    fn inferred_declarations() {
        assert_eq!(expr_type("let a = 1u16;", "a;").name, "u16");
        assert_eq!(expr_type("let a: i8 = -1; let b = a;", "b;"), &I8);
        assert_eq!(expr_type("let a: u8 = 1; let b: u8;", "b = a;"), &U8);
        assert_eq!(expr_type("let a: i8 = 1;", "i16(a) + 1i16;"), &I16);
    }

    #[test]
    fn signed_minimum_literals() {
        assert!(type_errors("let a: i8 = -128;").is_empty());
        assert_eq!(expr_type("let a: i8 = -128;", "a;"), &I8);
        assert_eq!(expr_type("", "-2147483648;"), &I32);
        assert_eq!(expr_type("", "-128i8;"), &I8);
        assert_eq!(expr_type("", "-9223372036854775808i64;"), &I64);

        // the extra magnitude is only available under a minus
        assert_eq!(type_errors("128i8;"), vec![
            TypeError::LiteralOutOfRange { value: 128, ty: "i8", pos: Position(1, 1) },
        ]);
        assert_eq!(type_errors("let a: i8 = 128;"), vec![
            TypeError::InitializerMismatch {
                name: "a".to_string(), declared: "i8", found: "i32", pos: Position(1, 13),
            },
        ]);
        assert_eq!(type_errors("let a: i8 = -129;").len(), 1);
        assert_eq!(type_errors("2147483648;").len(), 1);
    }

    #[test]
    fn operand_support_and_literals() {
        assert_eq!(type_errors("3000000000;"), vec![
            TypeError::LiteralOutOfRange { value: 3_000_000_000, ty: "i32", pos: Position(1, 1) },
        ]);
        assert_eq!(type_errors("1 = 2;"), vec![TypeError::InvalidAssignTarget { pos: Position(1, 3) }]);
        assert_eq!(type_errors("let a: u8 = 1; a + 1;"), vec![
            TypeError::MismatchedTypes { left: "u8", right: "i32", pos: Position(1, 18) },
        ]);
    }

    #[test]
    fn fail_slow_collects_one_diagnostic_per_statement() {
        let (_, result) = analysed("x;\nlet a: u8 = 1;\n-a;\ny + z;\na;\n");
        match result {
            Err(SemaError::Failed { diagnostics }) => {
                let lines: Vec<u32> = diagnostics.iter().map(|d| d.pos.line()).collect();
                assert_eq!(lines, vec![1, 3, 4]);
                assert_eq!(
                    diagnostics[1].to_string(),
                    "test.lang:3:1\nError: invalid type u8 for unary operator u-\n-a;\n^");
            }
            other => panic!("expected failed analysis, got {:?}", other),
        }
    }

    #[test]
    fn functions() {
        let (_, result) = analysed("function f(x: i8, y: i8) -> i8 { x + y; }\nx;");
        let table = result.unwrap();
        assert_eq!(table.lookup_variable("y").and_then(|(_, s)| s.ty), Some(&I8));

        let (_, result) = analysed("function f(x: q) { x; }");
        assert!(matches!(result, Err(SemaError::Failed { ref diagnostics }) if diagnostics.len() == 1));

        let (_, result) = analysed("function f() -> i8 { a; b; }");
        assert!(matches!(result, Err(SemaError::Failed { ref diagnostics }) if diagnostics.len() == 2));
    }
}
