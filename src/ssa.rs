use std::fmt;

use tracing::{debug, trace};

use crate::ast::{Expr, ExprKind, Statement, VarDecl};
use crate::error::{InternalError, IrError};
use crate::sem::{SymbolId, SymbolTable};
use crate::types::{OperatorCode, Type};


/// Virtual register number, printed as `t<n>`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Register(pub u32);

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// Index of an instruction in its unit's instruction list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct InstrRef(pub usize);

#[derive(Debug, PartialEq, Clone)]
pub enum Op {
    Const { value: u64 },
    Add(InstrRef, InstrRef),
    Sub(InstrRef, InstrRef),
    Mul(InstrRef, InstrRef),
    Div(InstrRef, InstrRef),
    Modulus(InstrRef, InstrRef),
    Negate(InstrRef),
    Cast(InstrRef),
}

impl Op {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Op::Const { .. } => "const",
            Op::Add(..) => "add",
            Op::Sub(..) => "sub",
            Op::Mul(..) => "mul",
            Op::Div(..) => "div",
            Op::Modulus(..) => "mod",
            Op::Negate(..) => "neg",
            Op::Cast(..) => "cast",
        }
    }

    pub fn operands(&self) -> Vec<InstrRef> {
        match *self {
            Op::Const { .. } => vec![],
            Op::Add(l, r) | Op::Sub(l, r) | Op::Mul(l, r) | Op::Div(l, r) | Op::Modulus(l, r) => vec![l, r],
            Op::Negate(v) | Op::Cast(v) => vec![v],
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct Instruction {
    pub id: Register,
    pub ty: &'static Type,
    pub op: Op,
}

pub const FIRST_REGISTER: u32 = 1;

/// Source of register numbers. Each generation pass starts by resetting
/// it, so the same program always gets the same numbering.
#[derive(Debug)]
pub struct RegisterCounter {
    next: u32,
}

impl Default for RegisterCounter {
    fn default() -> RegisterCounter {
        RegisterCounter { next: FIRST_REGISTER }
    }
}

impl RegisterCounter {
    pub fn new() -> RegisterCounter {
        RegisterCounter::default()
    }

    pub fn reset(&mut self) {
        self.next = FIRST_REGISTER;
    }

    pub fn fresh(&mut self) -> Register {
        let r = Register(self.next);
        self.next += 1;
        r
    }
}

/// Instructions of one compilation unit, plus the instruction each
/// variable was last bound to.
#[derive(Debug, PartialEq)]
pub struct IrUnit {
    instructions: Vec<Instruction>,
    bindings: Vec<Option<InstrRef>>,
}

impl IrUnit {
    pub fn instructions(&self) -> &[Instruction] { &self.instructions }
    pub fn len(&self) -> usize { self.instructions.len() }
    pub fn is_empty(&self) -> bool { self.instructions.is_empty() }

    pub fn get(&self, r: InstrRef) -> Option<&Instruction> {
        self.instructions.get(r.0)
    }

    /// Current value of a variable, `None` if it was never assigned.
    pub fn binding(&self, symbol: SymbolId) -> Option<&Instruction> {
        self.bindings.get(symbol.0).copied().flatten().and_then(|r| self.get(r))
    }

    fn write_instruction(&self, f: &mut fmt::Formatter, instr: &Instruction) -> fmt::Result {
        write!(f, "{} = {} {}", instr.id, instr.op.mnemonic(), instr.ty)?;
        if let Op::Const { value } = instr.op {
            return write!(f, " {}", value);
        }
        let operands: Vec<String> = instr.op.operands().iter()
            .map(|&r| match self.get(r) {
                Some(operand) => operand.id.to_string(),
                None => "t?".to_string(),
            })
            .collect();
        write!(f, " {}", operands.join(", "))
    }
}

/// One instruction per line, e.g. `t3 = add i32 t1, t2`.
impl fmt::Display for IrUnit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for instr in &self.instructions {
            self.write_instruction(f, instr)?;
            writeln!(f)?;
        }
        Ok(())
    }
}

struct Generator<'a> {
    symbols: &'a SymbolTable,
    counter: &'a mut RegisterCounter,
    instructions: Vec<Instruction>,
    bindings: Vec<Option<InstrRef>>,
}

impl<'a> Generator<'a> {
    fn new(symbols: &'a SymbolTable, counter: &'a mut RegisterCounter) -> Generator<'a> {
        counter.reset();
        Generator {
            symbols,
            counter,
            instructions: Vec::new(),
            bindings: vec![None; symbols.len()],
        }
    }

    fn emit(&mut self, ty: &'static Type, op: Op) -> InstrRef {
        let id = self.counter.fresh();
        trace!(%id, ty = ty.name, op = op.mnemonic(), "emit");
        self.instructions.push(Instruction { id, ty, op });
        InstrRef(self.instructions.len() - 1)
    }

    fn type_of(&self, r: InstrRef) -> &'static Type {
        self.instructions[r.0].ty
    }

    fn bind(&mut self, symbol: SymbolId, value: InstrRef) -> Result<(), IrError> {
        match self.bindings.get_mut(symbol.0) {
            Some(slot) => {
                *slot = Some(value);
                Ok(())
            }
            None => Err(InternalError::UnknownVariable(format!("#{}", symbol.0))),
        }
    }

    fn variable(&self, name: &str) -> Result<SymbolId, IrError> {
        self.symbols.lookup_variable(name)
            .map(|(id, _)| id)
            .ok_or_else(|| InternalError::UnknownVariable(name.to_string()))
    }

    fn lower_expr(&mut self, e: &Expr) -> Result<InstrRef, IrError> {
        match &e.kind {
            ExprKind::Integer { ty, value, .. } => Ok(self.emit(*ty, Op::Const { value: *value })),
            ExprKind::Ident(name) => {
                let id = self.variable(name)?;
                self.bindings.get(id.0).copied().flatten().ok_or_else(|| {
                    InternalError::UnassignedVariable { name: name.clone(), pos: e.loc }
                })
            }
            ExprKind::Unary(op, operand) => {
                let v = self.lower_expr(operand)?;
                match op {
                    OperatorCode::UnaryPlus => Ok(v),
                    OperatorCode::UnaryMinus => Ok(self.emit(self.type_of(v), Op::Negate(v))),
                    other => Err(InternalError::UnmappedOperator(other.symbol())),
                }
            }
            ExprKind::Cast(ty, inner) => {
                let v = self.lower_expr(inner)?;
                Ok(self.emit(*ty, Op::Cast(v)))
            }
            ExprKind::Binary(OperatorCode::Assign, l, r) => {
                let name = l.as_ident().ok_or(InternalError::InvalidAssignTarget { pos: e.loc })?;
                let target = self.variable(name)?;
                let v = self.lower_expr(r)?;
                self.bind(target, v)?;
                Ok(v)
            }
            ExprKind::Binary(op, l, r) => {
                let lv = self.lower_expr(l)?;
                let rv = self.lower_expr(r)?;
                let op = match op {
                    OperatorCode::Add => Op::Add(lv, rv),
                    OperatorCode::Sub => Op::Sub(lv, rv),
                    OperatorCode::Mul => Op::Mul(lv, rv),
                    OperatorCode::Div => Op::Div(lv, rv),
                    OperatorCode::Mod => Op::Modulus(lv, rv),
                    other => return Err(InternalError::UnmappedOperator(other.symbol())),
                };
                Ok(self.emit(self.type_of(lv), op))
            }
        }
    }

    fn lower_var_decl(&mut self, decl: &VarDecl) -> Result<(), IrError> {
        let symbol = decl.symbol
            .ok_or_else(|| InternalError::UnregisteredDeclaration(decl.name.clone()))?;
        if let Some(init) = &decl.init {
            let v = self.lower_expr(init)?;
            self.bind(symbol, v)?;
        }
        Ok(())
    }

    fn lower_statement(&mut self, stat: &Statement) -> Result<(), IrError> {
        match stat {
            Statement::Expr(e) => self.lower_expr(e).map(|_| ()),
            Statement::VarDecl(decl) => self.lower_var_decl(decl),
            Statement::Function(_) => Err(InternalError::UnsupportedStatement("function declaration")),
        }
    }

    fn finish(self) -> IrUnit {
        IrUnit { instructions: self.instructions, bindings: self.bindings }
    }
}

/// Lowers analysed statements to IR, numbering registers with `counter`
/// from `FIRST_REGISTER`.
pub fn generate_with(
    statements: &[Statement],
    symbols: &SymbolTable,
    counter: &mut RegisterCounter,
) -> Result<IrUnit, IrError> {
    let mut gen = Generator::new(symbols, counter);
    for stat in statements {
        gen.lower_statement(stat)?;
    }
    let unit = gen.finish();
    debug!(instructions = unit.len(), "IR generated");
    Ok(unit)
}

pub fn generate(statements: &[Statement], symbols: &SymbolTable) -> Result<IrUnit, IrError> {
    generate_with(statements, symbols, &mut RegisterCounter::new())
}


#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use crate::ast::Statement;
    use crate::error::InternalError;
    use crate::lexer::Position;
    use crate::parser::parse;
    use crate::sem::{analyse, SymbolTable};
    use crate::source::Source;
    use crate::types::{I32, I64};
    use super::{generate, generate_with, Instruction, InstrRef, IrUnit, Op, Register, RegisterCounter};

    fn front_end(src: &str) -> (Vec<Statement>, SymbolTable) {
        let mut stats = parse(src).unwrap();
        let symbols = analyse(&Source::new("test.lang", src), &mut stats).unwrap();
        (stats, symbols)
    }

    fn compile(src: &str) -> IrUnit {
        let (stats, symbols) = front_end(src);
        generate(&stats, &symbols).unwrap()
    }

    #[test]
    fn chained_assignment_shares_one_constant() {
        let src = "let a: i32 = 0; let b: i32 = 0; a = b = 1;";
        let (stats, symbols) = front_end(src);
        let unit = generate(&stats, &symbols).unwrap();

        assert_eq!(unit.len(), 3);
        let one = Instruction { id: Register(3), ty: &I32, op: Op::Const { value: 1 } };
        assert_eq!(unit.get(InstrRef(2)), Some(&one));

        let a = symbols.lookup_variable("a").map(|(id, _)| id).unwrap();
        let b = symbols.lookup_variable("b").map(|(id, _)| id).unwrap();
        assert_eq!(unit.binding(a), Some(&one));
        assert_eq!(unit.binding(b), Some(&one));
    }

    #[test]
    fn dump() {
        let unit = compile("let a: i8 = 1; let b: i32 = 2; -a + b * 3;\nlet c = b % 5 / 2 - a;");
        assert_eq!(unit.to_string(), "\
t1 = const i8 1
t2 = const i32 2
t3 = neg i8 t1
t4 = cast i32 t3
t5 = const i32 3
t6 = mul i32 t2, t5
t7 = add i32 t4, t6
t8 = const i32 5
t9 = mod i32 t2, t8
t10 = const i32 2
t11 = div i32 t9, t10
t12 = cast i32 t1
t13 = sub i32 t11, t12
");
    }

    #[test]
    fn unary_plus_and_variables_emit_nothing() {
        let unit = compile("let a: i64 = 7; let b = +a; b;");
        assert_eq!(unit.instructions(), &[
            Instruction { id: Register(1), ty: &I64, op: Op::Const { value: 7 } },
        ][..]);
    }

    #[test]
    fn explicit_cast() {
        let unit = compile("let a: u8 = 200; i64(a);");
        assert_eq!(unit.to_string(), "t1 = const u8 200\nt2 = cast i64 t1\n");
    }

    #[test]
    fn generation_is_deterministic() {
        let (stats, symbols) = front_end("let x: i16 = 4; let y = x * x + 1i16; y = y - x;");
        let mut counter = RegisterCounter::new();
        let first = generate_with(&stats, &symbols, &mut counter).unwrap().to_string();
        let second = generate_with(&stats, &symbols, &mut counter).unwrap().to_string();
        assert_eq!(first, second);
        assert!(first.starts_with("t1 = const i16 4\n"));
    }

    #[test]
    fn counter_resets() {
        let mut counter = RegisterCounter::new();
        assert_eq!(counter.fresh(), Register(1));
        assert_eq!(counter.fresh(), Register(2));
        counter.reset();
        assert_eq!(counter.fresh(), Register(1));
    }

    #[test]
    fn read_before_assignment() {
        let (stats, symbols) = front_end("let a: i32; a + 1;");
        assert_eq!(generate(&stats, &symbols), Err(InternalError::UnassignedVariable {
            name: "a".to_string(),
            pos: Position(1, 13),
        }));

        // an assignment gives the variable its first value
        let unit = compile("let a: i32; a = 5; a + 1;");
        assert_eq!(unit.len(), 3);
    }

    #[test]
    fn functions_are_not_lowered() {
        let (stats, symbols) = front_end("function f(x: i8) -> i8 { x; }");
        assert_eq!(
            generate(&stats, &symbols),
            Err(InternalError::UnsupportedStatement("function declaration")));
    }

    #[test]
    fn unregistered_declaration() {
        // statements that skipped analysis carry no symbol
        let stats = parse("let a = 1;").unwrap();
        assert_eq!(
            generate(&stats, &SymbolTable::new()),
            Err(InternalError::UnregisteredDeclaration("a".to_string())));
    }
}
