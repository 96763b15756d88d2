use tracing::debug;

use crate::ast::*;
use crate::error::{ParseError, SyntaxError};
use crate::lexer::{Lexer, Token, TokenClass};
use crate::types::{self, OperatorCode};

// Grammar:
// S -> E ; | let sym (: typename)? (= E)? ; | function sym ( X? ) (-> typename)? { S* }
// X -> sym : typename (, sym : typename)*
// E -> P (op E)*            precedence climbing over the binding powers below
// P -> number | sym | ( E ) | + P | - P | P ( E (, E)* )

type ParseResult<T> = Result<T, ParseError>;

const PREFIX_BP: u8 = 17;
const CALL_BP: u8 = 19;

/// Left and right binding power of an infix operator. Assignment binds
/// weaker on its right, which makes it right-associative.
fn infix_binding_power(class: TokenClass) -> Option<(OperatorCode, u8, u8)> {
    let bp = match class {
        TokenClass::Assign => (OperatorCode::Assign, 2, 1),
        TokenClass::Plus => (OperatorCode::Add, 11, 12),
        TokenClass::Minus => (OperatorCode::Sub, 11, 12),
        TokenClass::Times => (OperatorCode::Mul, 13, 14),
        TokenClass::Div => (OperatorCode::Div, 13, 14),
        TokenClass::Mod => (OperatorCode::Mod, 13, 14),
        _ => return None,
    };
    Some(bp)
}

fn prefix_operator(class: TokenClass) -> Option<OperatorCode> {
    match class {
        TokenClass::Plus => Some(OperatorCode::UnaryPlus),
        TokenClass::Minus => Some(OperatorCode::UnaryMinus),
        _ => None,
    }
}

fn syntax_error(tok: &Token, message: impl Into<String>) -> SyntaxError {
    SyntaxError {
        message: message.into(),
        pos: tok.pos(),
        offset: tok.offset(),
        length: tok.len(),
    }
}

/// Interprets the text of a number token: an optional base prefix (`0b`,
/// `0x`, or a leading `0` for octal), digits, then an optional type suffix.
pub fn parse_int_literal(tok: &Token) -> Result<Expr, SyntaxError> {
    let text = tok.text();
    if text == "0" {
        return Ok(Expr::number(0, tok.pos()));
    }

    let bytes = text.as_bytes();
    let (base, digits) = if bytes.first() == Some(&b'0') {
        match bytes.get(1) {
            Some(b'b') | Some(b'B') => (2, &text[2..]),
            Some(b'x') | Some(b'X') => (16, &text[2..]),
            Some(c) if c.is_ascii_digit() => (8, &text[1..]),
            _ => return Err(syntax_error(tok, "invalid base specifier in integer literal")),
        }
    } else {
        (10, text)
    };

    let mut value: u64 = 0;
    let mut digit_count = 0;
    let mut suffix = None;
    for (idx, c) in digits.char_indices() {
        match c.to_digit(base) {
            Some(d) => {
                value = value.checked_mul(u64::from(base))
                    .and_then(|v| v.checked_add(u64::from(d)))
                    .ok_or_else(|| syntax_error(tok, "integer literal is too large"))?;
                digit_count += 1;
            }
            None => {
                let rest = &digits[idx..];
                if rest.len() > 1 && rest.len() < 4 {
                    suffix = types::builtin(rest);
                }
                if suffix.is_none() {
                    return Err(syntax_error(tok, "non-digit present in number literal"));
                }
                break;
            }
        }
    }

    if digit_count == 0 {
        return Err(syntax_error(tok, "missing digits in integer literal"));
    }

    // The magnitude of a signed minimum such as `-128i8` is accepted here;
    // analysis rejects it unless a unary minus applies to it.
    match suffix {
        Some(ty) if !ty.fits_negated(value) => Err(syntax_error(
            tok, format!("integer literal {} does not fit in {}", value, ty.name))),
        Some(ty) => Ok(Expr::typed_number(value, ty, tok.pos())),
        None => Ok(Expr::number(value, tok.pos())),
    }
}

pub struct Parser<'a> {
    lexer: Lexer<'a>,
}

impl<'a> Parser<'a> {
    pub fn new(input: &'a str) -> Parser<'a> {
        Parser { lexer: Lexer::new(input) }
    }

    pub fn from_lexer(lexer: Lexer<'a>) -> Parser<'a> {
        Parser { lexer }
    }

    fn peek(&mut self) -> ParseResult<Token<'a>> {
        Ok(self.lexer.peek_token()?)
    }

    fn next(&mut self) -> ParseResult<Token<'a>> {
        Ok(self.lexer.next_token()?)
    }

    fn expect(&mut self, class: TokenClass, message: &str) -> ParseResult<Token<'a>> {
        let tok = self.next()?;
        if tok.class() == class {
            Ok(tok)
        } else {
            Err(syntax_error(&tok, message).into())
        }
    }

    fn expect_ident(&mut self, message: &str) -> ParseResult<Token<'a>> {
        self.expect(TokenClass::Ident, message)
    }

    /// Parses one statement, or returns `None` at the end of input. A
    /// syntax error abandons the statement; no attempt is made to skip
    /// ahead to the next one.
    pub fn parse_statement(&mut self) -> ParseResult<Option<Statement>> {
        let tok = self.peek()?;
        let stat = match tok.class() {
            TokenClass::EOF => {
                self.next()?;
                return Ok(None);
            }
            TokenClass::Let => {
                self.next()?;
                self.parse_var_decl()?
            }
            TokenClass::Function => {
                self.next()?;
                let fun = self.parse_function(&tok)?;
                return Ok(Some(fun));
            }
            _ => Statement::Expr(self.parse_expr(0)?),
        };
        self.expect(TokenClass::Semicolon, "expected ';' here")?;
        debug!(line = tok.pos().line(), "parsed statement: {}", stat);
        Ok(Some(stat))
    }

    fn parse_var_decl(&mut self) -> ParseResult<Statement> {
        let name = self.expect_ident("expected an identifier")?;

        let mut ty = None;
        if self.peek()?.class() == TokenClass::Colon {
            self.next()?;
            let ty_tok = self.expect_ident("expected a type name here")?;
            ty = Some(TypeName::new(ty_tok.text(), ty_tok.pos()));
        }

        let op = self.peek()?;
        let init = match op.class() {
            TokenClass::Assign => {
                self.next()?;
                Some(self.parse_expr(0)?)
            }
            TokenClass::Semicolon if ty.is_none() => {
                return Err(syntax_error(
                    &name,
                    "variables without an initializer must have a type provided to them").into());
            }
            TokenClass::Semicolon => None,
            _ => return Err(syntax_error(&op, "expected '=' or ';' here").into()),
        };

        Ok(Statement::var_decl(name.text(), ty, init, name.pos()))
    }

    fn parse_params(&mut self) -> ParseResult<Vec<Param>> {
        let mut params = Vec::new();
        if self.peek()?.class() == TokenClass::RParen {
            self.next()?;
            return Ok(params);
        }

        loop {
            let name = self.expect_ident("expected name of parameter")?;
            self.expect(TokenClass::Colon, "expected ':' between name of parameter and type")?;
            let ty = self.expect_ident("expected parameter type")?;
            params.push(Param {
                name: name.text().to_string(),
                ty: TypeName::new(ty.text(), ty.pos()),
            });

            let sep = self.next()?;
            match sep.class() {
                TokenClass::RParen => return Ok(params),
                TokenClass::Comma => continue,
                _ => return Err(syntax_error(&sep, "expected ',' between parameters").into()),
            }
        }
    }

    fn parse_function(&mut self, kw: &Token<'a>) -> ParseResult<Statement> {
        let name = self.expect_ident("expected function name here")?;
        self.expect(TokenClass::LParen, "expected '(' here")?;
        let params = self.parse_params()?;

        let tok = self.next()?;
        let ret = match tok.class() {
            TokenClass::Arrow => {
                let ret = self.expect_ident("expected return type after '->'")?;
                self.expect(TokenClass::LBrace, "expected '{' here")?;
                Some(TypeName::new(ret.text(), ret.pos()))
            }
            TokenClass::LBrace => None,
            _ => return Err(syntax_error(&tok, "expected '->' or '{' here").into()),
        };

        let mut body = Vec::new();
        loop {
            let next = self.peek()?;
            match next.class() {
                TokenClass::RBrace => {
                    self.next()?;
                    break;
                }
                TokenClass::EOF => {
                    return Err(syntax_error(&next, "expected '}' to terminate function").into());
                }
                _ => {
                    if let Some(stat) = self.parse_statement()? {
                        body.push(stat);
                    }
                }
            }
        }

        debug!(name = name.text(), params = params.len(), "parsed function");
        Ok(Statement::Function(FunDecl {
            name: name.text().to_string(),
            params,
            ret,
            body,
            loc: kw.pos(),
        }))
    }

    pub fn parse_expr(&mut self, min_bp: u8) -> ParseResult<Expr> {
        let mut lhs = self.parse_predicate()?;

        loop {
            let op = self.peek()?;
            if op.class() == TokenClass::LParen {
                if CALL_BP < min_bp {
                    break;
                }
                self.next()?;
                lhs = self.parse_cast(lhs, &op)?;
                continue;
            }

            let (code, l_bp, r_bp) = match infix_binding_power(op.class()) {
                Some(bp) => bp,
                None => break,
            };
            if l_bp < min_bp {
                break;
            }

            self.next()?;
            let rhs = self.parse_expr(r_bp)?;
            lhs = Expr::binop(code, lhs, rhs, op.pos());
        }

        Ok(lhs)
    }

    fn parse_predicate(&mut self) -> ParseResult<Expr> {
        let tok = self.next()?;
        match tok.class() {
            TokenClass::Number => Ok(parse_int_literal(&tok)?),
            TokenClass::Ident => Ok(Expr::var(tok.text(), tok.pos())),
            TokenClass::LParen => {
                let inner = self.parse_expr(0)?;
                self.expect(TokenClass::RParen, "expected ')' to end parenthesized expression")?;
                Ok(inner)
            }
            class => match prefix_operator(class) {
                Some(code) => {
                    let operand = self.parse_expr(PREFIX_BP)?;
                    Ok(Expr::unary(code, operand, tok.pos()))
                }
                None => Err(syntax_error(
                    &tok, "expected literal/identifier/'+'/'-' or '(' here").into()),
            },
        }
    }

    // Call syntax `T(x)` is only meaningful as a cast to a built-in type.
    fn parse_cast(&mut self, callee: Expr, lparen: &Token<'a>) -> ParseResult<Expr> {
        let mut args = Vec::new();
        if self.peek()?.class() == TokenClass::RParen {
            self.next()?;
        } else {
            loop {
                args.push(self.parse_expr(0)?);
                let sep = self.next()?;
                match sep.class() {
                    TokenClass::Comma => continue,
                    TokenClass::RParen => break,
                    _ => return Err(syntax_error(&sep, "expected ',' or ')' here").into()),
                }
            }
        }

        let name = match callee.as_ident() {
            Some(name) => name,
            None => return Err(syntax_error(lparen, "only type names can be called").into()),
        };
        let ty = match types::builtin(name) {
            Some(ty) => ty,
            None => {
                return Err(syntax_error(
                    lparen, format!("{} is not a built-in type and cannot be used as a cast", name)).into());
            }
        };
        if args.len() != 1 {
            return Err(syntax_error(
                lparen, format!("a cast to {} takes exactly one argument, {} given", ty.name, args.len())).into());
        }

        let inner = args.remove(0);
        Ok(Expr::cast(ty, inner, callee.loc))
    }
}

/// Parses every statement of `input`, stopping at the first error.
pub fn parse(input: &str) -> ParseResult<Vec<Statement>> {
    let mut parser = Parser::new(input);
    let mut statements = Vec::new();
    while let Some(stat) = parser.parse_statement()? {
        statements.push(stat);
    }
    Ok(statements)
}
