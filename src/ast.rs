use std::fmt;

use crate::lexer::Position;
use crate::sem::SymbolId;
use crate::types::{self, OperatorCode, Type};

pub type Location = Position;


#[derive(Debug, PartialEq, Clone)]
pub enum ExprKind {
    /// `suffixed` records whether the type came from a literal suffix such
    /// as `10u8` rather than from the default.
    Integer { ty: &'static Type, value: u64, suffixed: bool },
    Ident(String),
    Unary(OperatorCode, Box<Expr>),
    Binary(OperatorCode, Box<Expr>, Box<Expr>),
    Cast(&'static Type, Box<Expr>),
}

#[derive(Debug, PartialEq, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub loc: Location,
}

impl Expr {
    pub fn new(kind: ExprKind, loc: Location) -> Expr {
        Expr { kind, loc }
    }

    pub fn number(value: u64, loc: Location) -> Expr {
        Expr::new(ExprKind::Integer { ty: types::default_int(), value, suffixed: false }, loc)
    }
    pub fn typed_number(value: u64, ty: &'static Type, loc: Location) -> Expr {
        Expr::new(ExprKind::Integer { ty, value, suffixed: true }, loc)
    }
    pub fn var(name: &str, loc: Location) -> Expr {
        Expr::new(ExprKind::Ident(name.to_string()), loc)
    }
    pub fn unary(op: OperatorCode, operand: Expr, loc: Location) -> Expr {
        Expr::new(ExprKind::Unary(op, Box::new(operand)), loc)
    }
    pub fn binop(op: OperatorCode, l: Expr, r: Expr, loc: Location) -> Expr {
        Expr::new(ExprKind::Binary(op, Box::new(l), Box::new(r)), loc)
    }
    pub fn cast(ty: &'static Type, inner: Expr, loc: Location) -> Expr {
        Expr::new(ExprKind::Cast(ty, Box::new(inner)), loc)
    }

    /// Wraps the expression in a cast to `ty`. The cast inherits the
    /// location of the expression it takes ownership of.
    pub fn into_cast(self, ty: &'static Type) -> Expr {
        let loc = self.loc;
        Expr::cast(ty, self, loc)
    }

    pub fn as_ident(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Ident(name) => Some(name),
            _ => None,
        }
    }

    fn write_rpn(&self, out: &mut Vec<String>) {
        match &self.kind {
            ExprKind::Integer { value, .. } => out.push(value.to_string()),
            ExprKind::Ident(name) => out.push(name.clone()),
            ExprKind::Unary(op, operand) => {
                operand.write_rpn(out);
                out.push(op.symbol().to_string());
            }
            ExprKind::Binary(op, l, r) => {
                l.write_rpn(out);
                r.write_rpn(out);
                out.push(op.symbol().to_string());
            }
            ExprKind::Cast(ty, inner) => {
                inner.write_rpn(out);
                out.push(format!("({})", ty.name));
            }
        }
    }
}

/// Postfix rendering: operands first, then the operator.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut parts = Vec::new();
        self.write_rpn(&mut parts);
        f.write_str(&parts.join(" "))
    }
}

/// A type name as written in the source, resolved during analysis.
#[derive(Debug, PartialEq, Clone)]
pub struct TypeName {
    pub name: String,
    pub loc: Location,
}

impl TypeName {
    pub fn new(name: &str, loc: Location) -> TypeName {
        TypeName { name: name.to_string(), loc }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct VarDecl {
    pub name: String,
    pub ty: Option<TypeName>,
    pub init: Option<Expr>,
    pub loc: Location,
    /// Filled in by semantic analysis with the symbol this declaration created.
    pub symbol: Option<SymbolId>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct Param {
    pub name: String,
    pub ty: TypeName,
}

#[derive(Debug, PartialEq, Clone)]
pub struct FunDecl {
    pub name: String,
    pub params: Vec<Param>,
    pub ret: Option<TypeName>,
    pub body: Vec<Statement>,
    pub loc: Location,
}

#[derive(Debug, PartialEq, Clone)]
pub enum Statement {
    Expr(Expr),
    VarDecl(VarDecl),
    Function(FunDecl),
}

impl Statement {
    pub fn expr(e: Expr) -> Statement {
        Statement::Expr(e)
    }

    pub fn var_decl(name: &str, ty: Option<TypeName>, init: Option<Expr>, loc: Location) -> Statement {
        Statement::VarDecl(VarDecl {
            name: name.to_string(),
            ty,
            init,
            loc,
            symbol: None,
        })
    }

    pub fn loc(&self) -> Location {
        match self {
            Statement::Expr(e) => e.loc,
            Statement::VarDecl(decl) => decl.loc,
            Statement::Function(fun) => fun.loc,
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Statement::Expr(e) => write!(f, "{}", e),
            Statement::VarDecl(decl) => {
                match &decl.init {
                    Some(init) => write!(f, "{} {} =", decl.name, init)?,
                    None => write!(f, "{} = no-init", decl.name)?,
                }
                if let Some(ty) = &decl.ty {
                    write!(f, " {}", ty.name)?;
                }
                Ok(())
            }
            Statement::Function(fun) => {
                write!(f, "function {} ({} params)", fun.name, fun.params.len())?;
                if let Some(ret) = &fun.ret {
                    write!(f, " -> {}", ret.name)?;
                }
                writeln!(f, " {{")?;
                for stat in &fun.body {
                    writeln!(f, "{}", stat)?;
                }
                write!(f, "}}")
            }
        }
    }
}


#[cfg(test)]
mod test {
    use crate::lexer::Position;
    use crate::types::{OperatorCode, I32, U8};
    use super::{Expr, Statement, TypeName, FunDecl, Param};

    fn at() -> Position { Position(1, 1) }

    #[test]
    fn rpn() {
        let e = Expr::binop(
            OperatorCode::Add,
            Expr::number(1, at()),
            Expr::binop(OperatorCode::Mul, Expr::number(2, at()), Expr::number(3, at()), at()),
            at());
        assert_eq!(e.to_string(), "1 2 3 * +");

        let e = Expr::unary(OperatorCode::UnaryMinus, Expr::var("a", at()).into_cast(&I32), at());
        assert_eq!(e.to_string(), "a (i32) u-");
    }

    #[test]
    fn statements() {
        let decl = Statement::var_decl(
            "a", Some(TypeName::new("u8", at())), Some(Expr::typed_number(10, &U8, at())), at());
        assert_eq!(decl.to_string(), "a 10 = u8");

        let decl = Statement::var_decl("b", Some(TypeName::new("i64", at())), None, at());
        assert_eq!(decl.to_string(), "b = no-init i64");

        let fun = Statement::Function(FunDecl {
            name: "f".to_string(),
            params: vec![Param { name: "x".to_string(), ty: TypeName::new("i8", at()) }],
            ret: Some(TypeName::new("i8", at())),
            body: vec![Statement::expr(Expr::var("x", at()))],
            loc: at(),
        });
        assert_eq!(fun.to_string(), "function f (1 params) -> i8 {\nx\n}");
    }
}
