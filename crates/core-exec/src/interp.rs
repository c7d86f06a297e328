//! The script interpreter.
//!
//! Executes parsed statement trees against an [`Interp`] (variables, script
//! frames, macro registry, hooks) and a [`Host`] (built-in commands, system
//! variables, regex services, macro-buffer bookkeeping). Commands reached
//! through the host may manipulate any editor state except the interpreter
//! itself; re-entry happens at the host layer, which owns both.
//!
//! Frame rules: `$0` is the caller's numeric prefix and is assignable;
//! `$1..$k` are the positional arguments; declared parameters are bound as
//! locals over the same values. Locals die with their frame. Recursion is
//! bounded by `max_macro_depth`, loops by `max_loop`.

use crate::datum::{Datum, DEFAULT_N};
use crate::parse::{
    parse_expression, parse_script, BinOp, Expr, MacroDef, Stmt, StrPart, UnOp, VarRef,
};
use core_status::{Outcome, Status};
use std::collections::HashMap;
use std::rc::Rc;
use tracing::debug;

/// Host services the interpreter calls out to. Methods that can trigger
/// nested evaluation receive the interpreter back as an argument, so a
/// command may re-enter it (hooks, `xeqFile`) through a plain reborrow.
pub trait Host {
    /// Invoke a built-in command. `n` is the numeric prefix (`None` when
    /// defaulted). Predicate commands arrive with their trailing `?`.
    fn call_command(
        &mut self,
        interp: &mut Interp,
        name: &str,
        n: Option<i64>,
        args: Vec<Datum>,
    ) -> Outcome<Datum>;

    /// Whether a built-in command of this name exists.
    fn knows_command(&self, name: &str) -> bool;

    /// System variable access; unknown names fail.
    fn sysvar_get(&mut self, interp: &mut Interp, name: &str) -> Outcome<Datum>;
    fn sysvar_set(&mut self, interp: &mut Interp, name: &str, value: Datum) -> Outcome<()>;
    fn knows_sysvar(&self, name: &str) -> bool;

    /// `=~` support: does the pattern match anywhere in the subject?
    fn regex_match(&mut self, subject: &[u8], pat: &str) -> Outcome<bool>;

    /// A macro was (re)defined; the host mirrors it into a macro buffer.
    fn macro_created(&mut self, def: &MacroDef) -> Outcome<()>;

    /// Bracket macro execution; the host bumps the buffer's executing
    /// counter so destructive operations are refused while it runs.
    fn macro_guard(&mut self, name: &str, enter: bool);
}

/// Events a macro can hook.
pub const HOOK_NAMES: [&str; 10] =
    ["chDir", "enterBuf", "exitBuf", "help", "mode", "postKey", "preKey", "read", "wrap", "write"];

#[derive(Debug)]
struct Frame {
    n: Datum,
    args: Vec<Datum>,
    locals: HashMap<String, Datum>,
}

impl Frame {
    fn base() -> Frame {
        Frame { n: Datum::Int(DEFAULT_N), args: Vec::new(), locals: HashMap::new() }
    }
}

/// Control flow signal threaded through block execution.
#[derive(Debug)]
enum Flow {
    Normal(Datum),
    Break(u64),
    Next(u64),
    Return(Datum),
}

#[derive(Debug)]
pub struct Interp {
    globals: HashMap<String, Datum>,
    frames: Vec<Frame>,
    macros: HashMap<String, Rc<MacroDef>>,
    hooks: HashMap<&'static str, String>,
    pub max_macro_depth: u32,
    pub max_loop: u64,
}

impl Default for Interp {
    fn default() -> Self {
        Self::new()
    }
}

impl Interp {
    pub fn new() -> Self {
        Interp {
            globals: HashMap::new(),
            frames: vec![Frame::base()],
            macros: HashMap::new(),
            hooks: HashMap::new(),
            max_macro_depth: 100,
            max_loop: 2500,
        }
    }

    // ------------------------------------------------------------------
    // Entry points
    // ------------------------------------------------------------------

    /// Parse and run a script in the current frame. The value of a
    /// top-level `return` (or nil) comes back.
    pub fn run_script(&mut self, host: &mut dyn Host, src: &str) -> Outcome<Datum> {
        let stmts = parse_script(src)?;
        match self.exec_block(host, &stmts)? {
            Flow::Return(value) | Flow::Normal(value) => Ok(value),
            Flow::Break(_) | Flow::Next(_) => {
                Err(Status::failure("'break' or 'next' outside of a loop"))
            }
        }
    }

    /// Run a script file in a fresh frame carrying a numeric prefix and
    /// positional arguments (`$0`, `$1..`).
    pub fn run_script_with_args(
        &mut self,
        host: &mut dyn Host,
        src: &str,
        n: Option<i64>,
        args: Vec<Datum>,
    ) -> Outcome<Datum> {
        if self.frames.len() > self.max_macro_depth as usize {
            return Err(Status::failure(format!(
                "Maximum macro recursion depth ({}) exceeded",
                self.max_macro_depth
            )));
        }
        self.frames.push(Frame {
            n: Datum::Int(n.unwrap_or(DEFAULT_N)),
            args,
            locals: HashMap::new(),
        });
        let result = self.run_script(host, src);
        self.frames.pop();
        result
    }

    /// Parse and evaluate one expression.
    pub fn eval_str(&mut self, host: &mut dyn Host, src: &str) -> Outcome<Datum> {
        let expr = parse_expression(src)?;
        self.eval(host, &expr)
    }

    /// Invoke a defined macro with a numeric prefix and arguments.
    pub fn call_macro(
        &mut self,
        host: &mut dyn Host,
        name: &str,
        n: Option<i64>,
        args: Vec<Datum>,
    ) -> Outcome<Datum> {
        let Some(def) = self.macros.get(name).cloned() else {
            return Err(Status::failure(format!("No such macro '{name}'")));
        };
        let given = args.len();
        if given < def.min_args as usize
            || def.max_args.is_some_and(|max| given > max as usize)
        {
            return Err(Status::failure(format!(
                "Wrong number of arguments (given {given}) for macro '{name}'"
            )));
        }
        if self.frames.len() > self.max_macro_depth as usize {
            return Err(Status::failure(format!(
                "Maximum macro recursion depth ({}) exceeded",
                self.max_macro_depth
            )));
        }
        let mut frame = Frame {
            n: Datum::Int(n.unwrap_or(DEFAULT_N)),
            args: args.clone(),
            locals: HashMap::new(),
        };
        for (param, value) in def.params.iter().zip(args) {
            frame.locals.insert(param.clone(), value);
        }
        debug!(target: "exec.frame", name, depth = self.frames.len(), "macro enter");
        host.macro_guard(name, true);
        self.frames.push(frame);
        let result = self.exec_block(host, &def.body);
        self.frames.pop();
        host.macro_guard(name, false);
        debug!(target: "exec.frame", name, "macro leave");
        match result? {
            Flow::Return(value) => Ok(value),
            Flow::Normal(_) => Ok(Datum::Nil),
            Flow::Break(_) | Flow::Next(_) => {
                Err(Status::failure("'break' or 'next' outside of a loop"))
            }
        }
    }

    pub fn has_macro(&self, name: &str) -> bool {
        self.macros.contains_key(name)
    }

    pub fn macro_def(&self, name: &str) -> Option<&Rc<MacroDef>> {
        self.macros.get(name)
    }

    pub fn macro_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.macros.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    // ------------------------------------------------------------------
    // Hooks
    // ------------------------------------------------------------------

    pub fn set_hook(&mut self, hook: &str, macro_name: &str) -> Outcome<()> {
        let Some(&canon) = HOOK_NAMES.iter().find(|&&h| h == hook) else {
            return Err(Status::failure(format!("No such hook '{hook}'")));
        };
        self.hooks.insert(canon, macro_name.to_string());
        Ok(())
    }

    pub fn clear_hook(&mut self, hook: &str) {
        self.hooks.remove(hook);
    }

    pub fn hook_macro(&self, hook: &str) -> Option<&str> {
        self.hooks.get(hook).map(String::as_str)
    }

    /// Run a hook if one is set; nil when unset. A hook macro that has
    /// disappeared is silently unhooked.
    pub fn run_hook(
        &mut self,
        host: &mut dyn Host,
        hook: &str,
        args: Vec<Datum>,
    ) -> Outcome<Datum> {
        let Some(name) = self.hooks.get(hook).cloned() else {
            return Ok(Datum::Nil);
        };
        if !self.macros.contains_key(&name) {
            self.hooks.remove(hook);
            return Ok(Datum::Nil);
        }
        // Hooks receive exactly the arguments their event documents; a
        // declared-parameter mismatch surfaces as a normal failure.
        let take = args.len();
        let mut args = args;
        if let Some(def) = self.macros.get(&name) {
            if let Some(max) = def.max_args {
                args.truncate((max as usize).min(take));
            }
        }
        self.call_macro(host, &name, None, args)
    }

    // ------------------------------------------------------------------
    // Statement execution
    // ------------------------------------------------------------------

    fn exec_block(&mut self, host: &mut dyn Host, stmts: &[Stmt]) -> Outcome<Flow> {
        let mut last = Datum::Nil;
        for stmt in stmts {
            match self.exec_stmt(host, stmt)? {
                Flow::Normal(value) => last = value,
                other => return Ok(other),
            }
        }
        Ok(Flow::Normal(last))
    }

    fn exec_stmt(&mut self, host: &mut dyn Host, stmt: &Stmt) -> Outcome<Flow> {
        match stmt {
            Stmt::Expr(expr) => Ok(Flow::Normal(self.eval(host, expr)?)),
            Stmt::If { arms, alt } => {
                for (cond, body) in arms {
                    if self.eval(host, cond)?.is_truthy() {
                        return self.exec_block(host, body);
                    }
                }
                self.exec_block(host, alt)
            }
            Stmt::While { cond, until, body } => {
                let mut iterations = 0u64;
                loop {
                    let go = self.eval(host, cond)?.is_truthy() != *until;
                    if !go {
                        return Ok(Flow::Normal(Datum::Nil));
                    }
                    self.check_loop(&mut iterations)?;
                    match self.exec_block(host, body)? {
                        Flow::Normal(_) | Flow::Next(1) => {}
                        Flow::Next(k) => return Ok(Flow::Next(k - 1)),
                        Flow::Break(1) => return Ok(Flow::Normal(Datum::Nil)),
                        Flow::Break(k) => return Ok(Flow::Break(k - 1)),
                        ret @ Flow::Return(_) => return Ok(ret),
                    }
                }
            }
            Stmt::Loop { body } => {
                let mut iterations = 0u64;
                loop {
                    self.check_loop(&mut iterations)?;
                    match self.exec_block(host, body)? {
                        Flow::Normal(_) | Flow::Next(1) => {}
                        Flow::Next(k) => return Ok(Flow::Next(k - 1)),
                        Flow::Break(1) => return Ok(Flow::Normal(Datum::Nil)),
                        Flow::Break(k) => return Ok(Flow::Break(k - 1)),
                        ret @ Flow::Return(_) => return Ok(ret),
                    }
                }
            }
            Stmt::For { var, list, body } => {
                let items = match self.eval(host, list)? {
                    Datum::Array(items) => items.borrow().clone(),
                    other => {
                        return Err(Status::failure(format!(
                            "'for' requires an array, got {}",
                            other.type_name()
                        )))
                    }
                };
                let mut iterations = 0u64;
                for item in items {
                    self.check_loop(&mut iterations)?;
                    self.current_frame_mut().locals.insert(var.clone(), item);
                    match self.exec_block(host, body)? {
                        Flow::Normal(_) | Flow::Next(1) => {}
                        Flow::Next(k) => return Ok(Flow::Next(k - 1)),
                        Flow::Break(1) => return Ok(Flow::Normal(Datum::Nil)),
                        Flow::Break(k) => return Ok(Flow::Break(k - 1)),
                        ret @ Flow::Return(_) => return Ok(ret),
                    }
                }
                Ok(Flow::Normal(Datum::Nil))
            }
            Stmt::Break(count) => Ok(Flow::Break(self.flow_count(host, count.as_ref())?)),
            Stmt::Next(count) => Ok(Flow::Next(self.flow_count(host, count.as_ref())?)),
            Stmt::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval(host, expr)?,
                    None => Datum::Nil,
                };
                Ok(Flow::Return(value))
            }
            Stmt::Force(inner) => match self.exec_stmt(host, inner) {
                Ok(flow) => Ok(flow),
                Err(status) => {
                    let msg = status.forced()?;
                    debug!(target: "exec.frame", msg = msg.as_deref().unwrap_or(""), "forced");
                    Ok(Flow::Normal(Datum::Nil))
                }
            },
            Stmt::MacroDef(def) => {
                host.macro_created(def)?;
                self.macros.insert(def.name.clone(), Rc::new(def.clone()));
                Ok(Flow::Normal(Datum::Nil))
            }
        }
    }

    fn flow_count(&mut self, host: &mut dyn Host, expr: Option<&Expr>) -> Outcome<u64> {
        let count = match expr {
            Some(expr) => self.eval(host, expr)?.to_int()?,
            None => 1,
        };
        if count < 1 {
            return Err(Status::failure("Loop level must be 1 or greater"));
        }
        Ok(count as u64)
    }

    fn check_loop(&self, iterations: &mut u64) -> Outcome<()> {
        *iterations += 1;
        if self.max_loop > 0 && *iterations > self.max_loop {
            return Err(Status::failure(format!(
                "Maximum number of loop iterations ({}) exceeded",
                self.max_loop
            )));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Expression evaluation
    // ------------------------------------------------------------------

    fn current_frame(&self) -> &Frame {
        self.frames.last().expect("base frame always present")
    }

    fn current_frame_mut(&mut self) -> &mut Frame {
        self.frames.last_mut().expect("base frame always present")
    }

    pub fn eval(&mut self, host: &mut dyn Host, expr: &Expr) -> Outcome<Datum> {
        match expr {
            Expr::Lit(lit) => Ok(lit.to_datum()),
            Expr::StrCat(parts) => {
                let mut out = Vec::new();
                for part in parts {
                    match part {
                        StrPart::Text(text) => out.extend_from_slice(text),
                        StrPart::Interp(inner) => {
                            out.extend_from_slice(&self.eval(host, inner)?.to_text());
                        }
                    }
                }
                Ok(Datum::Str(out))
            }
            Expr::ArrayLit(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.eval(host, item)?);
                }
                Ok(Datum::array(out))
            }
            Expr::Var(var) => self.read_var(host, var),
            Expr::Name(name) => {
                if self.current_frame().locals.contains_key(name) {
                    return Ok(self.current_frame().locals[name].clone());
                }
                self.invoke(host, name, None, Vec::new())
            }
            Expr::Index(array, index) => {
                let array = self.eval(host, array)?;
                let index = self.eval(host, index)?.to_int()?;
                index_read(&array, index)
            }
            Expr::Call { name, predicate, args, n } => {
                let full_name =
                    if *predicate { format!("{name}?") } else { name.clone() };
                let n = match n {
                    Some(expr) => {
                        let value = self.eval(host, expr)?.to_int()?;
                        if value == DEFAULT_N { None } else { Some(value) }
                    }
                    None => None,
                };
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval(host, arg)?);
                }
                self.invoke(host, &full_name, n, values)
            }
            Expr::Unary(op, inner) => {
                let value = self.eval(host, inner)?;
                match op {
                    UnOp::Neg => Ok(Datum::Int(
                        value.to_int()?.checked_neg().ok_or_else(overflow)?,
                    )),
                    UnOp::Pos => Ok(Datum::Int(value.to_int()?)),
                    UnOp::BNot => Ok(Datum::Int(!value.to_int()?)),
                }
            }
            Expr::NotExpr(inner) => {
                let value = self.eval(host, inner)?;
                Ok(Datum::Bool(!value.is_truthy()))
            }
            Expr::Logic { or, lhs, rhs } => {
                let left = self.eval(host, lhs)?.is_truthy();
                if left == *or {
                    return Ok(Datum::Bool(left));
                }
                Ok(Datum::Bool(self.eval(host, rhs)?.is_truthy()))
            }
            Expr::Ternary(cond, then, other) => {
                if self.eval(host, cond)?.is_truthy() {
                    self.eval(host, then)
                } else {
                    self.eval(host, other)
                }
            }
            Expr::Binary(op, lhs, rhs) => {
                let left = self.eval(host, lhs)?;
                let right = self.eval(host, rhs)?;
                self.binary(host, *op, left, right)
            }
            Expr::Assign { target, op, value } => {
                let mut value = self.eval(host, value)?;
                if let Some(op) = op {
                    let current = self.read_lvalue(host, target)?;
                    value = self.binary(host, *op, current, value)?;
                }
                self.write_lvalue(host, target, value.clone())?;
                Ok(value)
            }
            Expr::IncDec { target, inc, post } => {
                let old = self.read_lvalue(host, target)?.to_int()?;
                let new = if *inc {
                    old.checked_add(1).ok_or_else(overflow)?
                } else {
                    old.checked_sub(1).ok_or_else(overflow)?
                };
                self.write_lvalue(host, target, Datum::Int(new))?;
                Ok(Datum::Int(if *post { old } else { new }))
            }
        }
    }

    fn invoke(
        &mut self,
        host: &mut dyn Host,
        name: &str,
        n: Option<i64>,
        args: Vec<Datum>,
    ) -> Outcome<Datum> {
        if self.macros.contains_key(name) {
            return self.call_macro(host, name, n, args);
        }
        if host.knows_command(name) {
            return host.call_command(self, name, n, args);
        }
        Err(Status::failure(format!("No such command, macro, or variable '{name}'")))
    }

    fn read_var(&mut self, host: &mut dyn Host, var: &VarRef) -> Outcome<Datum> {
        match var {
            VarRef::Local(name) => match self.current_frame().locals.get(name) {
                Some(value) => Ok(value.clone()),
                None => Err(Status::failure(format!("No such variable '{name}'"))),
            },
            VarRef::Dollar(name) => {
                if let Some(value) = self.globals.get(name) {
                    return Ok(value.clone());
                }
                if host.knows_sysvar(name) {
                    return host.sysvar_get(self, name);
                }
                Err(Status::failure(format!("No such variable '${name}'")))
            }
            VarRef::Arg(k) => {
                let frame = self.current_frame();
                if *k == 0 {
                    return Ok(frame.n.clone());
                }
                match frame.args.get(*k as usize - 1) {
                    Some(value) => Ok(value.clone()),
                    None => Err(Status::failure(format!("No such macro argument '${k}'"))),
                }
            }
        }
    }

    fn read_lvalue(&mut self, host: &mut dyn Host, target: &Expr) -> Outcome<Datum> {
        match target {
            Expr::Var(var) => self.read_var(host, var),
            Expr::Name(name) => self.read_var(host, &VarRef::Local(name.clone())),
            Expr::Index(array, index) => {
                let array = self.eval(host, array)?;
                let index = self.eval(host, index)?.to_int()?;
                index_read(&array, index)
            }
            _ => Err(Status::failure("Invalid assignment target")),
        }
    }

    fn write_lvalue(&mut self, host: &mut dyn Host, target: &Expr, value: Datum) -> Outcome<()> {
        match target {
            Expr::Var(VarRef::Local(name)) | Expr::Name(name) => {
                self.current_frame_mut().locals.insert(name.clone(), value);
                Ok(())
            }
            Expr::Var(VarRef::Dollar(name)) => {
                if self.globals.contains_key(name) {
                    self.globals.insert(name.clone(), value);
                    return Ok(());
                }
                if host.knows_sysvar(name) {
                    return host.sysvar_set(self, name, value);
                }
                self.globals.insert(name.clone(), value);
                Ok(())
            }
            Expr::Var(VarRef::Arg(k)) => {
                let frame = self.current_frame_mut();
                if *k == 0 {
                    frame.n = value;
                    return Ok(());
                }
                match frame.args.get_mut(*k as usize - 1) {
                    Some(slot) => {
                        *slot = value;
                        Ok(())
                    }
                    None => Err(Status::failure(format!("No such macro argument '${k}'"))),
                }
            }
            Expr::Index(array, index) => {
                let array = self.eval(host, array)?;
                let index = self.eval(host, index)?.to_int()?;
                let Datum::Array(items) = array else {
                    return Err(Status::failure(format!(
                        "Cannot index {} value",
                        array.type_name()
                    )));
                };
                let mut items = items.borrow_mut();
                let len = items.len() as i64;
                let slot = if index < 0 { index + len } else { index };
                if slot == len {
                    // Writing one past the end appends.
                    items.push(value);
                    return Ok(());
                }
                if slot < 0 || slot > len {
                    return Err(Status::failure(format!("Array index {index} out of range")));
                }
                items[slot as usize] = value;
                Ok(())
            }
            _ => Err(Status::failure("Invalid assignment target")),
        }
    }

    fn binary(
        &mut self,
        host: &mut dyn Host,
        op: BinOp,
        left: Datum,
        right: Datum,
    ) -> Outcome<Datum> {
        match op {
            BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod | BinOp::Pow
            | BinOp::Lsh | BinOp::Rsh | BinOp::BOr | BinOp::BXor => {
                let a = left.to_int()?;
                let b = right.to_int()?;
                let value = match op {
                    BinOp::Add => a.checked_add(b).ok_or_else(overflow)?,
                    BinOp::Sub => a.checked_sub(b).ok_or_else(overflow)?,
                    BinOp::Mul => a.checked_mul(b).ok_or_else(overflow)?,
                    BinOp::Div => {
                        if b == 0 {
                            return Err(Status::failure("Division by zero"));
                        }
                        a / b
                    }
                    BinOp::Mod => {
                        if b == 0 {
                            return Err(Status::failure("Division by zero"));
                        }
                        a % b
                    }
                    BinOp::Pow => {
                        if b < 0 {
                            return Err(Status::failure("Negative exponent"));
                        }
                        let exp = u32::try_from(b).map_err(|_| overflow())?;
                        a.checked_pow(exp).ok_or_else(overflow)?
                    }
                    BinOp::Lsh => a.checked_shl(b as u32).unwrap_or(0),
                    BinOp::Rsh => a.checked_shr(b as u32).unwrap_or(0),
                    BinOp::BOr => a | b,
                    BinOp::BXor => a ^ b,
                    _ => unreachable!(),
                };
                Ok(Datum::Int(value))
            }
            BinOp::BAnd => match (&left, &right) {
                // Bitwise on integer pairs, concatenation otherwise.
                (Datum::Int(a), Datum::Int(b)) => Ok(Datum::Int(a & b)),
                (Datum::Array(a), Datum::Array(b)) => {
                    let mut out = a.borrow().clone();
                    out.extend(b.borrow().iter().cloned());
                    Ok(Datum::array(out))
                }
                _ => {
                    let mut out = left.to_text();
                    out.extend_from_slice(&right.to_text());
                    Ok(Datum::Str(out))
                }
            },
            BinOp::Eq => Ok(Datum::Bool(left.datum_eq(&right))),
            BinOp::Ne => Ok(Datum::Bool(!left.datum_eq(&right))),
            BinOp::REq | BinOp::RNe => {
                let Datum::Str(pat) = &right else {
                    return Err(Status::failure("Pattern operand of '=~' must be a string"));
                };
                let pat = String::from_utf8_lossy(pat).into_owned();
                let hit = host.regex_match(&left.to_text(), &pat)?;
                Ok(Datum::Bool(hit == matches!(op, BinOp::REq)))
            }
            BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
                let ordering = match (&left, &right) {
                    (Datum::Int(a), Datum::Int(b)) => a.cmp(b),
                    _ => left.to_text().cmp(&right.to_text()),
                };
                let ok = match op {
                    BinOp::Lt => ordering.is_lt(),
                    BinOp::Le => ordering.is_le(),
                    BinOp::Gt => ordering.is_gt(),
                    BinOp::Ge => ordering.is_ge(),
                    _ => unreachable!(),
                };
                Ok(Datum::Bool(ok))
            }
        }
    }

    // ------------------------------------------------------------------
    // Introspection for commands (show listings, completion)
    // ------------------------------------------------------------------

    pub fn global_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.globals.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn global_get(&self, name: &str) -> Option<&Datum> {
        self.globals.get(name)
    }

    pub fn global_set(&mut self, name: &str, value: Datum) {
        self.globals.insert(name.to_string(), value);
    }

    pub fn local_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> =
            self.current_frame().locals.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn frame_depth(&self) -> usize {
        self.frames.len()
    }
}

fn index_read(array: &Datum, index: i64) -> Outcome<Datum> {
    match array {
        Datum::Array(items) => {
            let items = items.borrow();
            let len = items.len() as i64;
            let slot = if index < 0 { index + len } else { index };
            if slot < 0 || slot >= len {
                return Err(Status::failure(format!("Array index {index} out of range")));
            }
            Ok(items[slot as usize].clone())
        }
        Datum::Str(bytes) => {
            let len = bytes.len() as i64;
            let slot = if index < 0 { index + len } else { index };
            if slot < 0 || slot >= len {
                return Err(Status::failure(format!("String index {index} out of range")));
            }
            Ok(Datum::Int(i64::from(bytes[slot as usize])))
        }
        other => Err(Status::failure(format!("Cannot index {} value", other.type_name()))),
    }
}

fn overflow() -> Status {
    Status::failure("Integer overflow")
}
