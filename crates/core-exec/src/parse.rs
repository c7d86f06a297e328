//! Script parser.
//!
//! Recursive descent over the token stream, producing a directly executable
//! statement tree. The precedence ladder, low to high: assignment
//! (right-associative, including compound forms), ternary, `or`, `and`,
//! `not`, equality, relational, bitwise or/xor/and, shift, additive,
//! multiplicative, power, unary, postfix.
//!
//! Statements separate on newline or `;`; block keywords close blocks.
//! A statement that begins with an identifier followed by something that
//! starts an expression parses as a command invocation with comma-separated
//! arguments (script command style); everything else is an expression.

use crate::datum::Datum;
use crate::lexer::{decode_escape, Kw, Lexer, Tok};
use core_status::{Outcome, Status};

#[derive(Debug, Clone, PartialEq)]
pub enum LitVal {
    Nil,
    Bool(bool),
    Int(i64),
    Str(Vec<u8>),
    /// The `defn` keyword: the default numeric prefix.
    DefaultN,
}

impl LitVal {
    pub fn to_datum(&self) -> Datum {
        match self {
            LitVal::Nil => Datum::Nil,
            LitVal::Bool(b) => Datum::Bool(*b),
            LitVal::Int(i) => Datum::Int(*i),
            LitVal::Str(s) => Datum::Str(s.clone()),
            LitVal::DefaultN => Datum::Int(crate::datum::DEFAULT_N),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Lsh,
    Rsh,
    BAnd,
    BOr,
    BXor,
    Eq,
    Ne,
    REq,
    RNe,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Pos,
    BNot,
}

#[derive(Debug, Clone, PartialEq)]
pub enum VarRef {
    /// Bare identifier: local variable.
    Local(String),
    /// `$name`: global user variable or system variable.
    Dollar(String),
    /// `$N`: positional macro argument.
    Arg(u16),
}

#[derive(Debug, Clone, PartialEq)]
pub enum StrPart {
    Text(Vec<u8>),
    Interp(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Lit(LitVal),
    /// Double-quoted string with `#{…}` interpolations.
    StrCat(Vec<StrPart>),
    ArrayLit(Vec<Expr>),
    Var(VarRef),
    /// Bare identifier: resolved at evaluation to a local variable or a
    /// zero-argument command/macro call.
    Name(String),
    Index(Box<Expr>, Box<Expr>),
    Call {
        name: String,
        predicate: bool,
        args: Vec<Expr>,
        /// Numeric prefix supplied via `n => name`.
        n: Option<Box<Expr>>,
    },
    Unary(UnOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Logic {
        or: bool,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    NotExpr(Box<Expr>),
    Ternary(Box<Expr>, Box<Expr>, Box<Expr>),
    Assign {
        target: Box<Expr>,
        op: Option<BinOp>,
        value: Box<Expr>,
    },
    IncDec {
        target: Box<Expr>,
        inc: bool,
        post: bool,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Expr(Expr),
    If {
        arms: Vec<(Expr, Vec<Stmt>)>,
        alt: Vec<Stmt>,
    },
    While {
        cond: Expr,
        until: bool,
        body: Vec<Stmt>,
    },
    Loop {
        body: Vec<Stmt>,
    },
    For {
        var: String,
        list: Expr,
        body: Vec<Stmt>,
    },
    Break(Option<Expr>),
    Next(Option<Expr>),
    Return(Option<Expr>),
    Force(Box<Stmt>),
    MacroDef(MacroDef),
}

/// A parsed macro definition: parameters, declared argument bounds, and the
/// body tree.
#[derive(Debug, Clone, PartialEq)]
pub struct MacroDef {
    pub name: String,
    pub params: Vec<String>,
    pub min_args: u16,
    pub max_args: Option<u16>,
    pub usage: Option<String>,
    pub desc: Option<String>,
    pub body: Vec<Stmt>,
}

/// Parse a complete script.
pub fn parse_script(src: &str) -> Outcome<Vec<Stmt>> {
    let tokens = Lexer::new(src).tokenize()?;
    let mut parser = Parser { toks: tokens, pos: 0 };
    let (stmts, end) = parser.block(&[])?;
    debug_assert!(end.is_none());
    Ok(stmts)
}

/// Parse a single expression (for `-e` and interpolations).
pub fn parse_expression(src: &str) -> Outcome<Expr> {
    let tokens = Lexer::new(src).tokenize()?;
    let mut parser = Parser { toks: tokens, pos: 0 };
    let expr = parser.expr()?;
    parser.skip_seps();
    if !parser.at_end() {
        return Err(Status::failure(format!("Extraneous token {:?}", parser.peek())));
    }
    Ok(expr)
}

struct Parser {
    toks: Vec<Tok>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Tok {
        self.toks.get(self.pos).unwrap_or(&Tok::Sep)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.toks.len()
    }

    fn bump(&mut self) -> Tok {
        let tok = self.toks.get(self.pos).cloned().unwrap_or(Tok::Sep);
        self.pos += 1;
        tok
    }

    fn eat(&mut self, tok: &Tok) -> bool {
        if self.peek() == tok {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tok: &Tok, what: &str) -> Outcome<()> {
        if self.eat(tok) {
            Ok(())
        } else {
            Err(Status::failure(format!("Expected {what}, got {:?}", self.peek())))
        }
    }

    fn skip_seps(&mut self) {
        while !self.at_end() && self.peek() == &Tok::Sep {
            self.pos += 1;
        }
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    /// Parse statements until one of `closers` (or end of input). Returns
    /// the closing keyword when one was consumed.
    fn block(&mut self, closers: &[Kw]) -> Outcome<(Vec<Stmt>, Option<Kw>)> {
        let mut out = Vec::new();
        loop {
            self.skip_seps();
            if self.at_end() {
                if closers.is_empty() {
                    return Ok((out, None));
                }
                return Err(Status::failure(block_end_msg(closers)));
            }
            if let Tok::Kw(kw) = self.peek() {
                if closers.contains(kw) {
                    let kw = *kw;
                    self.pos += 1;
                    return Ok((out, Some(kw)));
                }
            }
            out.push(self.statement()?);
        }
    }

    fn statement(&mut self) -> Outcome<Stmt> {
        match self.peek().clone() {
            Tok::Kw(Kw::If) => {
                self.pos += 1;
                self.if_stmt()
            }
            Tok::Kw(Kw::While) | Tok::Kw(Kw::Until) => {
                let until = matches!(self.bump(), Tok::Kw(Kw::Until));
                let cond = self.expr()?;
                let (body, _) = self.block(&[Kw::Endloop])?;
                Ok(Stmt::While { cond, until, body })
            }
            Tok::Kw(Kw::Loop) => {
                self.pos += 1;
                let (body, _) = self.block(&[Kw::Endloop])?;
                Ok(Stmt::Loop { body })
            }
            Tok::Kw(Kw::For) => {
                self.pos += 1;
                let Tok::Ident(var) = self.bump() else {
                    return Err(Status::failure("Expected loop variable after 'for'"));
                };
                self.expect(&Tok::Kw(Kw::In), "'in'")?;
                let list = self.expr()?;
                let (body, _) = self.block(&[Kw::Endloop])?;
                Ok(Stmt::For { var, list, body })
            }
            Tok::Kw(Kw::Break) => {
                self.pos += 1;
                Ok(Stmt::Break(self.optional_expr()?))
            }
            Tok::Kw(Kw::Next) => {
                self.pos += 1;
                Ok(Stmt::Next(self.optional_expr()?))
            }
            Tok::Kw(Kw::Return) => {
                self.pos += 1;
                Ok(Stmt::Return(self.optional_expr()?))
            }
            Tok::Kw(Kw::Force) => {
                self.pos += 1;
                Ok(Stmt::Force(Box::new(self.statement()?)))
            }
            Tok::Kw(Kw::Macro) => {
                self.pos += 1;
                self.macro_def()
            }
            Tok::Kw(Kw::Constrain) => {
                Err(Status::failure("'constrain' is only valid inside a macro"))
            }
            Tok::Kw(kw @ (Kw::Else | Kw::Elsif | Kw::Endif | Kw::Endloop | Kw::Endmacro)) => {
                Err(Status::failure(format!("Unexpected '{}'", kw_text(kw))))
            }
            Tok::Ident(name) => self.command_or_expr(name, false),
            Tok::IdentQ(name) => self.command_or_expr(name, true),
            _ => Ok(Stmt::Expr(self.expr()?)),
        }
    }

    fn optional_expr(&mut self) -> Outcome<Option<Expr>> {
        if self.peek() == &Tok::Sep {
            Ok(None)
        } else {
            Ok(Some(self.expr()?))
        }
    }

    fn if_stmt(&mut self) -> Outcome<Stmt> {
        let mut arms = Vec::new();
        let mut alt = Vec::new();
        let mut cond = self.expr()?;
        loop {
            let (body, closer) = self.block(&[Kw::Elsif, Kw::Else, Kw::Endif])?;
            arms.push((cond, body));
            match closer {
                Some(Kw::Elsif) => cond = self.expr()?,
                Some(Kw::Else) => {
                    let (body, _) = self.block(&[Kw::Endif])?;
                    alt = body;
                    break;
                }
                _ => break,
            }
        }
        Ok(Stmt::If { arms, alt })
    }

    fn macro_def(&mut self) -> Outcome<Stmt> {
        let Tok::Ident(name) = self.bump() else {
            return Err(Status::failure("Expected macro name"));
        };
        let mut params = Vec::new();
        if self.eat(&Tok::LParen) {
            while self.peek() != &Tok::RParen {
                let Tok::Ident(param) = self.bump() else {
                    return Err(Status::failure("Expected parameter name"));
                };
                params.push(param);
                if !self.eat(&Tok::Comma) {
                    break;
                }
            }
            self.expect(&Tok::RParen, "')'")?;
        }
        // Body, with `constrain` and metadata honored at the top.
        let declared = params.len() as u16;
        let mut def = MacroDef {
            name,
            params,
            min_args: declared,
            max_args: Some(declared),
            usage: None,
            desc: None,
            body: Vec::new(),
        };
        loop {
            self.skip_seps();
            match self.peek().clone() {
                Tok::Kw(Kw::Endmacro) => {
                    self.pos += 1;
                    break;
                }
                Tok::Kw(Kw::Constrain) => {
                    self.pos += 1;
                    let Tok::Int(min) = self.bump() else {
                        return Err(Status::failure("Expected argument count after 'constrain'"));
                    };
                    def.min_args = min as u16;
                    def.max_args = if self.eat(&Tok::Comma) {
                        match self.bump() {
                            Tok::Int(max) => Some(max as u16),
                            Tok::Mul => None, // unbounded
                            _ => return Err(Status::failure("Expected maximum argument count")),
                        }
                    } else {
                        Some(min as u16)
                    };
                }
                _ => {
                    if self.at_end() {
                        return Err(Status::failure("'macro' without 'endmacro'"));
                    }
                    def.body.push(self.statement()?);
                }
            }
        }
        Ok(Stmt::MacroDef(def))
    }

    /// A statement beginning with an identifier: a command invocation when
    /// followed by the start of an expression, otherwise an expression
    /// (assignment, subscript, arithmetic, …).
    fn command_or_expr(&mut self, name: String, predicate: bool) -> Outcome<Stmt> {
        if starts_expression(self.toks.get(self.pos + 1).unwrap_or(&Tok::Sep)) {
            self.pos += 1;
            let args = self.comma_args()?;
            return Ok(Stmt::Expr(Expr::Call { name, predicate, args, n: None }));
        }
        Ok(Stmt::Expr(self.expr()?))
    }

    fn comma_args(&mut self) -> Outcome<Vec<Expr>> {
        let mut args = vec![self.expr()?];
        while self.eat(&Tok::Comma) {
            args.push(self.expr()?);
        }
        Ok(args)
    }

    // ------------------------------------------------------------------
    // Expression ladder
    // ------------------------------------------------------------------

    fn expr(&mut self) -> Outcome<Expr> {
        self.assignment()
    }

    fn assignment(&mut self) -> Outcome<Expr> {
        let lhs = self.narg()?;
        let op = match self.peek() {
            Tok::Assign => None,
            Tok::AsAdd => Some(BinOp::Add),
            Tok::AsSub => Some(BinOp::Sub),
            Tok::AsMul => Some(BinOp::Mul),
            Tok::AsDiv => Some(BinOp::Div),
            Tok::AsMod => Some(BinOp::Mod),
            Tok::AsLsh => Some(BinOp::Lsh),
            Tok::AsRsh => Some(BinOp::Rsh),
            Tok::AsBAnd => Some(BinOp::BAnd),
            Tok::AsBOr => Some(BinOp::BOr),
            Tok::AsBXor => Some(BinOp::BXor),
            _ => return Ok(lhs),
        };
        if !is_lvalue(&lhs) {
            return Err(Status::failure("Invalid assignment target"));
        }
        self.pos += 1;
        let value = self.assignment()?;
        Ok(Expr::Assign { target: Box::new(lhs), op, value: Box::new(value) })
    }

    /// `n => command` numeric-prefix invocation.
    fn narg(&mut self) -> Outcome<Expr> {
        let lhs = self.ternary()?;
        if !self.eat(&Tok::NArg) {
            return Ok(lhs);
        }
        let (name, predicate) = match self.bump() {
            Tok::Ident(name) => (name, false),
            Tok::IdentQ(name) => (name, true),
            other => {
                return Err(Status::failure(format!("Expected command name after '=>', got {other:?}")))
            }
        };
        let args = if self.eat(&Tok::LParen) {
            let args = if self.peek() == &Tok::RParen { Vec::new() } else { self.comma_args()? };
            self.expect(&Tok::RParen, "')'")?;
            args
        } else if starts_expression(self.peek()) {
            self.comma_args()?
        } else {
            Vec::new()
        };
        Ok(Expr::Call { name, predicate, args, n: Some(Box::new(lhs)) })
    }

    fn ternary(&mut self) -> Outcome<Expr> {
        let cond = self.logic_or()?;
        if !self.eat(&Tok::Hook) {
            return Ok(cond);
        }
        let then = self.expr()?;
        self.expect(&Tok::Colon, "':'")?;
        let other = self.ternary()?;
        Ok(Expr::Ternary(Box::new(cond), Box::new(then), Box::new(other)))
    }

    fn logic_or(&mut self) -> Outcome<Expr> {
        let mut lhs = self.logic_and()?;
        while matches!(self.peek(), Tok::Kw(Kw::Or) | Tok::OrOr) {
            self.pos += 1;
            let rhs = self.logic_and()?;
            lhs = Expr::Logic { or: true, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
        Ok(lhs)
    }

    fn logic_and(&mut self) -> Outcome<Expr> {
        let mut lhs = self.logic_not()?;
        while matches!(self.peek(), Tok::Kw(Kw::And) | Tok::AndAnd) {
            self.pos += 1;
            let rhs = self.logic_not()?;
            lhs = Expr::Logic { or: false, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
        Ok(lhs)
    }

    fn logic_not(&mut self) -> Outcome<Expr> {
        if matches!(self.peek(), Tok::Kw(Kw::Not) | Tok::Not) {
            self.pos += 1;
            let inner = self.logic_not()?;
            return Ok(Expr::NotExpr(Box::new(inner)));
        }
        self.equality()
    }

    fn equality(&mut self) -> Outcome<Expr> {
        let mut lhs = self.relational()?;
        loop {
            let op = match self.peek() {
                Tok::EqEq => BinOp::Eq,
                Tok::Ne => BinOp::Ne,
                Tok::REq => BinOp::REq,
                Tok::RNe => BinOp::RNe,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.relational()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn relational(&mut self) -> Outcome<Expr> {
        let mut lhs = self.bit_or()?;
        loop {
            let op = match self.peek() {
                Tok::Lt => BinOp::Lt,
                Tok::Le => BinOp::Le,
                Tok::Gt => BinOp::Gt,
                Tok::Ge => BinOp::Ge,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.bit_or()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn bit_or(&mut self) -> Outcome<Expr> {
        let mut lhs = self.bit_xor()?;
        while self.eat(&Tok::BOr) {
            let rhs = self.bit_xor()?;
            lhs = Expr::Binary(BinOp::BOr, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn bit_xor(&mut self) -> Outcome<Expr> {
        let mut lhs = self.bit_and()?;
        while self.eat(&Tok::BXor) {
            let rhs = self.bit_and()?;
            lhs = Expr::Binary(BinOp::BXor, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn bit_and(&mut self) -> Outcome<Expr> {
        let mut lhs = self.shift()?;
        while self.eat(&Tok::BAnd) {
            let rhs = self.shift()?;
            lhs = Expr::Binary(BinOp::BAnd, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn shift(&mut self) -> Outcome<Expr> {
        let mut lhs = self.additive()?;
        loop {
            let op = match self.peek() {
                Tok::Lsh => BinOp::Lsh,
                Tok::Rsh => BinOp::Rsh,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.additive()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn additive(&mut self) -> Outcome<Expr> {
        let mut lhs = self.multiplicative()?;
        loop {
            let op = match self.peek() {
                Tok::Plus => BinOp::Add,
                Tok::Minus => BinOp::Sub,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.multiplicative()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn multiplicative(&mut self) -> Outcome<Expr> {
        let mut lhs = self.power()?;
        loop {
            let op = match self.peek() {
                Tok::Mul => BinOp::Mul,
                Tok::Div => BinOp::Div,
                Tok::Mod => BinOp::Mod,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.power()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn power(&mut self) -> Outcome<Expr> {
        let lhs = self.unary()?;
        if self.eat(&Tok::Pow) {
            let rhs = self.power()?;
            return Ok(Expr::Binary(BinOp::Pow, Box::new(lhs), Box::new(rhs)));
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Outcome<Expr> {
        match self.peek() {
            Tok::Minus => {
                self.pos += 1;
                Ok(Expr::Unary(UnOp::Neg, Box::new(self.unary()?)))
            }
            Tok::Plus => {
                self.pos += 1;
                Ok(Expr::Unary(UnOp::Pos, Box::new(self.unary()?)))
            }
            Tok::BNot => {
                self.pos += 1;
                Ok(Expr::Unary(UnOp::BNot, Box::new(self.unary()?)))
            }
            Tok::Incr | Tok::Decr => {
                let inc = matches!(self.bump(), Tok::Incr);
                let target = self.unary()?;
                if !is_lvalue(&target) {
                    return Err(Status::failure("Invalid operand for '++' or '--'"));
                }
                Ok(Expr::IncDec { target: Box::new(target), inc, post: false })
            }
            _ => self.postfix(),
        }
    }

    fn postfix(&mut self) -> Outcome<Expr> {
        let mut expr = self.primary()?;
        loop {
            match self.peek() {
                Tok::LBrkt => {
                    self.pos += 1;
                    let index = self.expr()?;
                    self.expect(&Tok::RBrkt, "']'")?;
                    expr = Expr::Index(Box::new(expr), Box::new(index));
                }
                Tok::Incr | Tok::Decr => {
                    if !is_lvalue(&expr) {
                        return Ok(expr);
                    }
                    let inc = matches!(self.bump(), Tok::Incr);
                    expr = Expr::IncDec { target: Box::new(expr), inc, post: true };
                }
                _ => return Ok(expr),
            }
        }
    }

    fn primary(&mut self) -> Outcome<Expr> {
        match self.bump() {
            Tok::Int(i) => Ok(Expr::Lit(LitVal::Int(i))),
            Tok::Kw(Kw::True) => Ok(Expr::Lit(LitVal::Bool(true))),
            Tok::Kw(Kw::False) => Ok(Expr::Lit(LitVal::Bool(false))),
            Tok::Kw(Kw::Nil) => Ok(Expr::Lit(LitVal::Nil)),
            Tok::Kw(Kw::Defn) => Ok(Expr::Lit(LitVal::DefaultN)),
            Tok::Str { raw, interp } => parse_string_literal(&raw, interp),
            Tok::GVar(name) => Ok(Expr::Var(VarRef::Dollar(name))),
            Tok::NVar(n) => Ok(Expr::Var(VarRef::Arg(n))),
            Tok::Ident(name) => self.name_primary(name, false),
            Tok::IdentQ(name) => self.name_primary(name, true),
            Tok::LParen => {
                let inner = self.expr()?;
                self.expect(&Tok::RParen, "')'")?;
                Ok(inner)
            }
            Tok::LBrkt => {
                let mut items = Vec::new();
                self.skip_seps();
                if !self.eat(&Tok::RBrkt) {
                    loop {
                        items.push(self.expr()?);
                        if !self.eat(&Tok::Comma) {
                            break;
                        }
                    }
                    self.expect(&Tok::RBrkt, "']'")?;
                }
                Ok(Expr::ArrayLit(items))
            }
            other => Err(Status::failure(format!("Unexpected token {other:?}"))),
        }
    }

    fn name_primary(&mut self, name: String, predicate: bool) -> Outcome<Expr> {
        if self.eat(&Tok::LParen) {
            let args = if self.peek() == &Tok::RParen { Vec::new() } else { self.comma_args()? };
            self.expect(&Tok::RParen, "')'")?;
            return Ok(Expr::Call { name, predicate, args, n: None });
        }
        if predicate {
            // Predicate identifiers are always invocations.
            let args = if starts_expression(self.peek()) { self.comma_args()? } else { Vec::new() };
            return Ok(Expr::Call { name, predicate, args, n: None });
        }
        Ok(Expr::Name(name))
    }
}

fn is_lvalue(expr: &Expr) -> bool {
    matches!(expr, Expr::Var(_) | Expr::Name(_) | Expr::Index(..))
}

fn starts_expression(tok: &Tok) -> bool {
    matches!(
        tok,
        Tok::Ident(_)
            | Tok::IdentQ(_)
            | Tok::GVar(_)
            | Tok::NVar(_)
            | Tok::Int(_)
            | Tok::Str { .. }
            | Tok::Kw(Kw::True | Kw::False | Kw::Nil | Kw::Defn | Kw::Not)
            | Tok::LBrkt
    )
}

fn kw_text(kw: Kw) -> &'static str {
    match kw {
        Kw::Else => "else",
        Kw::Elsif => "elsif",
        Kw::Endif => "endif",
        Kw::Endloop => "endloop",
        Kw::Endmacro => "endmacro",
        _ => "keyword",
    }
}

fn block_end_msg(closers: &[Kw]) -> String {
    match closers.first() {
        Some(Kw::Endif) | Some(Kw::Elsif) | Some(Kw::Else) => "'if' without 'endif'".into(),
        Some(Kw::Endloop) => "Loop without 'endloop'".into(),
        Some(Kw::Endmacro) => "'macro' without 'endmacro'".into(),
        _ => "Unterminated block".into(),
    }
}

/// Decode a raw string literal body into parts: escape processing and
/// `#{…}` interpolation (double-quoted), or near-literal text
/// (single-quoted, only `\'` and `\\` collapse).
pub fn parse_string_literal(raw: &str, interp: bool) -> Outcome<Expr> {
    let bytes = raw.as_bytes();
    let mut parts: Vec<StrPart> = Vec::new();
    let mut text: Vec<u8> = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        if !interp {
            if c == b'\\' && matches!(bytes.get(i + 1), Some(b'\'') | Some(b'\\')) {
                text.push(bytes[i + 1]);
                i += 2;
            } else {
                text.push(c);
                i += 1;
            }
            continue;
        }
        match c {
            b'\\' => {
                i += 1;
                match decode_escape(bytes, &mut i) {
                    Some(decoded) => text.push(decoded),
                    None => return Err(Status::failure("Invalid escape in string literal")),
                }
            }
            b'#' if bytes.get(i + 1) == Some(&b'{') => {
                // Find the balanced closing brace; the lexer validated it.
                let start = i + 2;
                let mut depth = 1;
                let mut j = start;
                while j < bytes.len() {
                    match bytes[j] {
                        b'{' => depth += 1,
                        b'}' => {
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                        }
                        b'"' | b'\'' => {
                            let quote = bytes[j];
                            j += 1;
                            while j < bytes.len() && bytes[j] != quote {
                                if bytes[j] == b'\\' {
                                    j += 1;
                                }
                                j += 1;
                            }
                        }
                        _ => {}
                    }
                    j += 1;
                }
                if depth != 0 {
                    return Err(Status::failure("Unterminated string"));
                }
                if !text.is_empty() {
                    parts.push(StrPart::Text(std::mem::take(&mut text)));
                }
                let inner = std::str::from_utf8(&bytes[start..j])
                    .map_err(|_| Status::failure("Invalid interpolation"))?;
                parts.push(StrPart::Interp(parse_expression(inner)?));
                i = j + 1;
            }
            _ => {
                text.push(c);
                i += 1;
            }
        }
    }
    if parts.is_empty() {
        return Ok(Expr::Lit(LitVal::Str(text)));
    }
    if !text.is_empty() {
        parts.push(StrPart::Text(text));
    }
    Ok(Expr::StrCat(parts))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expr(src: &str) -> Expr {
        parse_expression(src).unwrap()
    }

    #[test]
    fn precedence_shapes() {
        // 1 + 2 * 3 parses as 1 + (2 * 3).
        let e = expr("1 + 2 * 3");
        match e {
            Expr::Binary(BinOp::Add, _, rhs) => {
                assert!(matches!(*rhs, Expr::Binary(BinOp::Mul, _, _)));
            }
            other => panic!("unexpected shape {other:?}"),
        }
        // Relational binds tighter than 'and'.
        let e = expr("a < b and c");
        assert!(matches!(e, Expr::Logic { or: false, .. }));
        // 'not' binds tighter than 'and'.
        let e = expr("not a and b");
        match e {
            Expr::Logic { or: false, lhs, .. } => assert!(matches!(*lhs, Expr::NotExpr(_))),
            other => panic!("unexpected shape {other:?}"),
        }
    }

    #[test]
    fn assignment_is_right_associative() {
        let e = expr("a = b = 1");
        match e {
            Expr::Assign { value, .. } => assert!(matches!(*value, Expr::Assign { .. })),
            other => panic!("unexpected shape {other:?}"),
        }
    }

    #[test]
    fn compound_assignment() {
        let e = expr("x += 2");
        assert!(matches!(e, Expr::Assign { op: Some(BinOp::Add), .. }));
        assert!(parse_expression("1 += 2").is_err());
    }

    #[test]
    fn ternary_chain() {
        let e = expr("a ? 1 : b ? 2 : 3");
        match e {
            Expr::Ternary(_, _, other) => assert!(matches!(*other, Expr::Ternary(..))),
            other => panic!("unexpected shape {other:?}"),
        }
    }

    #[test]
    fn postfix_and_prefix_incdec() {
        assert!(matches!(expr("x++"), Expr::IncDec { post: true, inc: true, .. }));
        assert!(matches!(expr("--x"), Expr::IncDec { post: false, inc: false, .. }));
    }

    #[test]
    fn narg_invocation() {
        let e = expr("2 => forwChar");
        match e {
            Expr::Call { name, n, args, .. } => {
                assert_eq!(name, "forwChar");
                assert!(n.is_some());
                assert!(args.is_empty());
            }
            other => panic!("unexpected shape {other:?}"),
        }
    }

    #[test]
    fn subscript_and_array_literal() {
        let e = expr("[1, 2, 3][1]");
        assert!(matches!(e, Expr::Index(..)));
    }

    #[test]
    fn string_interpolation_parses() {
        let e = expr(r#""a#{1 + 2}b""#);
        match e {
            Expr::StrCat(parts) => {
                assert_eq!(parts.len(), 3);
                assert!(matches!(&parts[1], StrPart::Interp(Expr::Binary(BinOp::Add, _, _))));
            }
            other => panic!("unexpected shape {other:?}"),
        }
        // Escapes decode in plain strings.
        assert_eq!(expr(r#""a\tb""#), Expr::Lit(LitVal::Str(b"a\tb".to_vec())));
        // Single quotes keep backslashes.
        assert_eq!(expr(r"'a\tb'"), Expr::Lit(LitVal::Str(b"a\\tb".to_vec())));
    }

    #[test]
    fn script_blocks() {
        let stmts = parse_script(
            "if x > 0\n  y = 1\nelsif x < 0\n  y = 2\nelse\n  y = 3\nendif\n",
        )
        .unwrap();
        match &stmts[0] {
            Stmt::If { arms, alt } => {
                assert_eq!(arms.len(), 2);
                assert_eq!(alt.len(), 1);
            }
            other => panic!("unexpected shape {other:?}"),
        }
    }

    #[test]
    fn loops_parse() {
        let stmts = parse_script("while x < 3\n x = x + 1\nendloop\nloop\n break\nendloop\n").unwrap();
        assert!(matches!(stmts[0], Stmt::While { until: false, .. }));
        assert!(matches!(stmts[1], Stmt::Loop { .. }));
        let stmts = parse_script("for v in [1,2]\n next\nendloop\n").unwrap();
        assert!(matches!(stmts[0], Stmt::For { .. }));
    }

    #[test]
    fn macro_definitions() {
        let stmts = parse_script("macro inc(x)\n return x + 1\nendmacro\n").unwrap();
        match &stmts[0] {
            Stmt::MacroDef(def) => {
                assert_eq!(def.name, "inc");
                assert_eq!(def.params, vec!["x".to_string()]);
                assert_eq!(def.min_args, 1);
                assert_eq!(def.max_args, Some(1));
                assert_eq!(def.body.len(), 1);
            }
            other => panic!("unexpected shape {other:?}"),
        }
        // Inline form with a ';' separator.
        let stmts = parse_script("macro inc(x) return x + 1 endmacro; inc(41)").unwrap();
        assert_eq!(stmts.len(), 2);
    }

    #[test]
    fn constrain_in_macro() {
        let stmts = parse_script("macro f\n constrain 1, 3\n return $1\nendmacro\n").unwrap();
        match &stmts[0] {
            Stmt::MacroDef(def) => {
                assert_eq!(def.min_args, 1);
                assert_eq!(def.max_args, Some(3));
            }
            other => panic!("unexpected shape {other:?}"),
        }
        assert!(parse_script("constrain 1\n").is_err());
    }

    #[test]
    fn command_style_statements() {
        let stmts = parse_script("insert \"abc\", 2\n").unwrap();
        match &stmts[0] {
            Stmt::Expr(Expr::Call { name, args, .. }) => {
                assert_eq!(name, "insert");
                assert_eq!(args.len(), 2);
            }
            other => panic!("unexpected shape {other:?}"),
        }
        // A leading identifier followed by an operator is an expression.
        let stmts = parse_script("x = 1\n").unwrap();
        assert!(matches!(&stmts[0], Stmt::Expr(Expr::Assign { .. })));
    }

    #[test]
    fn force_and_return() {
        let stmts = parse_script("force deleteBuf \"x\"\nreturn 5\n").unwrap();
        assert!(matches!(stmts[0], Stmt::Force(_)));
        assert!(matches!(stmts[1], Stmt::Return(Some(_))));
    }

    #[test]
    fn unbalanced_blocks_fail() {
        assert!(parse_script("if x\n y\n").is_err());
        assert!(parse_script("endif\n").is_err());
        assert!(parse_script("while x\n").is_err());
    }
}
