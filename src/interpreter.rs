//! Tree-walking evaluator.
//!
//! A development tool that runs the typed AST directly instead of going
//! through the native pipeline. It implements the same observable
//! semantics as compiled programs: short-circuit `and`/`or`, scoped
//! blocks, loop control flow, user-defined functions, and the three I/O
//! builtins. Input and output are injected so tests can capture them.
//!
//! Expects a type-checked module; internal invariant violations (calling a
//! non-function, a non-boolean condition) surface as compile errors rather
//! than panics.

use crate::ast::{Definition, ExprKind, Expression, Location, LiteralValue, Module};
use crate::error::CompileError;
use crate::symtab::SymTab;
use std::collections::HashMap;
use std::io::{BufRead, Write};

/// Recursion limit for user-defined function calls.
const MAX_CALL_DEPTH: usize = 10_000;

/// Unwrap a `Flow::Value`, propagating any control-flow outcome upward.
macro_rules! value_of {
    ($flow:expr) => {
        match $flow {
            Flow::Value(v) => v,
            other => return Ok(other),
        }
    };
}

/// A runtime value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Int(i64),
    Bool(bool),
    Unit,
}

impl Value {
    fn as_int(&self, location: &Location) -> Result<i64, CompileError> {
        match self {
            Value::Int(v) => Ok(*v),
            other => Err(CompileError::compile(
                location.clone(),
                format!("expected an Int value, got {:?}", other),
            )),
        }
    }

    fn as_bool(&self, location: &Location) -> Result<bool, CompileError> {
        match self {
            Value::Bool(v) => Ok(*v),
            other => Err(CompileError::compile(
                location.clone(),
                format!("expected a Bool value, got {:?}", other),
            )),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Unit => write!(f, "unit"),
        }
    }
}

/// How evaluation of a subtree ended.
enum Flow {
    Value(Value),
    Break,
    Continue,
    Return(Value),
}

/// Evaluate a module and, like compiled programs, print a trailing `Int` or
/// `Bool` result. Returns the module's value.
pub fn run_module<R: BufRead, W: Write>(
    module: &Module,
    input: R,
    output: W,
) -> Result<Value, CompileError> {
    let mut interpreter = Interpreter::new(module, input, output);
    let value = interpreter.evaluate()?;
    match value {
        Value::Int(v) => writeln!(interpreter.output, "{}", v)?,
        Value::Bool(v) => writeln!(interpreter.output, "{}", v)?,
        Value::Unit => {}
    }
    Ok(value)
}

pub struct Interpreter<'m, R, W> {
    module: &'m Module,
    defs: HashMap<&'m str, &'m Definition>,
    input: R,
    output: W,
    call_depth: usize,
}

impl<'m, R: BufRead, W: Write> Interpreter<'m, R, W> {
    pub fn new(module: &'m Module, input: R, output: W) -> Self {
        let defs = module.defs.iter().map(|d| (d.name.as_str(), d)).collect();
        Interpreter {
            module,
            defs,
            input,
            output,
            call_depth: 0,
        }
    }

    /// Evaluate the module: the top-level expression if there is one,
    /// otherwise a `fun main` definition acting as the entry point.
    pub fn evaluate(&mut self) -> Result<Value, CompileError> {
        let module = self.module;
        if let Some(expr) = &module.expr {
            let mut scope = SymTab::new();
            return match self.eval(expr, &mut scope)? {
                Flow::Value(v) | Flow::Return(v) => Ok(v),
                Flow::Break | Flow::Continue => Err(CompileError::compile(
                    expr.location.clone(),
                    "break or continue outside of a loop",
                )),
            };
        }
        if let Some(main) = self.defs.get("main").copied() {
            return self.call("main", &[], &main.location.clone());
        }
        Ok(Value::Unit)
    }

    fn eval(
        &mut self,
        expr: &Expression,
        scope: &mut SymTab<Value>,
    ) -> Result<Flow, CompileError> {
        let loc = &expr.location;
        match &expr.kind {
            ExprKind::Literal(value) => Ok(Flow::Value(match value {
                LiteralValue::Int(v) => Value::Int(*v),
                LiteralValue::Bool(v) => Value::Bool(*v),
                LiteralValue::Unit => Value::Unit,
            })),

            ExprKind::Identifier(name) => match scope.get(name) {
                Some(v) => Ok(Flow::Value(*v)),
                None => Err(CompileError::compile(
                    loc.clone(),
                    format!("undefined identifier \"{}\"", name),
                )),
            },

            ExprKind::BinaryOp { left, op, right } => {
                if op == "and" || op == "or" {
                    let lhs = value_of!(self.eval(left, scope)?).as_bool(loc)?;
                    // Short-circuit: the right operand may not run at all
                    if (op == "and" && !lhs) || (op == "or" && lhs) {
                        return Ok(Flow::Value(Value::Bool(lhs)));
                    }
                    let rhs = value_of!(self.eval(right, scope)?);
                    return Ok(Flow::Value(Value::Bool(rhs.as_bool(loc)?)));
                }

                if op == "=" {
                    let name = match &left.kind {
                        ExprKind::Identifier(name) => name.clone(),
                        _ => {
                            return Err(CompileError::compile(
                                loc.clone(),
                                "left side of assignment is not an identifier",
                            ));
                        }
                    };
                    let value = value_of!(self.eval(right, scope)?);
                    if scope.get(&name).is_none() {
                        return Err(CompileError::compile(
                            loc.clone(),
                            format!("undefined variable \"{}\"", name),
                        ));
                    }
                    scope.set(&name, value);
                    return Ok(Flow::Value(value));
                }

                let lhs = value_of!(self.eval(left, scope)?);
                let rhs = value_of!(self.eval(right, scope)?);
                Ok(Flow::Value(self.apply_binary(op, lhs, rhs, loc)?))
            }

            ExprKind::UnaryOp { op, param } => {
                let value = value_of!(self.eval(param, scope)?);
                match op.as_str() {
                    "()" => Ok(Flow::Value(value)),
                    "unary_-" => Ok(Flow::Value(Value::Int(value.as_int(loc)?.wrapping_neg()))),
                    "unary_not" => Ok(Flow::Value(Value::Bool(!value.as_bool(loc)?))),
                    other => Err(CompileError::compile(
                        loc.clone(),
                        format!("unknown unary operator \"{}\"", other),
                    )),
                }
            }

            ExprKind::If {
                condition,
                true_branch,
                false_branch,
            } => {
                let cond = value_of!(self.eval(condition, scope)?).as_bool(loc)?;
                if cond {
                    let value = value_of!(self.eval(true_branch, scope)?);
                    Ok(Flow::Value(if false_branch.is_some() {
                        value
                    } else {
                        Value::Unit
                    }))
                } else {
                    match false_branch {
                        Some(branch) => self.eval(branch, scope),
                        None => Ok(Flow::Value(Value::Unit)),
                    }
                }
            }

            ExprKind::Call { name, args } => {
                let mut arg_values = Vec::with_capacity(args.len());
                for arg in args {
                    arg_values.push(value_of!(self.eval(arg, scope)?));
                }
                Ok(Flow::Value(self.call(name, &arg_values, loc)?))
            }

            ExprKind::Block { exprs, result } => {
                scope.push_scope();
                let mut flow = Ok(Flow::Value(Value::Unit));
                for e in exprs {
                    match self.eval(e, scope) {
                        Ok(Flow::Value(_)) => {}
                        other => {
                            flow = other;
                            break;
                        }
                    }
                }
                if let Ok(Flow::Value(_)) = flow
                    && let Some(res) = result
                {
                    flow = self.eval(res, scope);
                }
                scope.pop_scope();
                flow
            }

            ExprKind::While { condition, body } => {
                loop {
                    // break/continue may fire inside the condition as well
                    let cond = match self.eval(condition, scope)? {
                        Flow::Value(v) => v.as_bool(loc)?,
                        Flow::Break => break,
                        Flow::Continue => continue,
                        ret @ Flow::Return(_) => return Ok(ret),
                    };
                    if !cond {
                        break;
                    }
                    match self.eval(body, scope)? {
                        Flow::Value(_) | Flow::Continue => {}
                        Flow::Break => break,
                        ret @ Flow::Return(_) => return Ok(ret),
                    }
                }
                Ok(Flow::Value(Value::Unit))
            }

            ExprKind::Var { name, value, .. } => {
                let value = value_of!(self.eval(value, scope)?);
                scope.define(name, value);
                Ok(Flow::Value(Value::Unit))
            }

            ExprKind::Break => Ok(Flow::Break),
            ExprKind::Continue => Ok(Flow::Continue),

            ExprKind::Return(value) => {
                let value = match value {
                    Some(e) => value_of!(self.eval(e, scope)?),
                    None => Value::Unit,
                };
                Ok(Flow::Return(value))
            }
        }
    }

    fn apply_binary(
        &mut self,
        op: &str,
        lhs: Value,
        rhs: Value,
        loc: &Location,
    ) -> Result<Value, CompileError> {
        if op == "==" {
            return Ok(Value::Bool(lhs == rhs));
        }
        if op == "!=" {
            return Ok(Value::Bool(lhs != rhs));
        }
        let a = lhs.as_int(loc)?;
        let b = rhs.as_int(loc)?;
        let value = match op {
            "+" => Value::Int(a.wrapping_add(b)),
            "-" => Value::Int(a.wrapping_sub(b)),
            "*" => Value::Int(a.wrapping_mul(b)),
            "/" => {
                if b == 0 {
                    return Err(CompileError::compile(loc.clone(), "division by zero"));
                }
                Value::Int(a.wrapping_div(b))
            }
            "%" => {
                if b == 0 {
                    return Err(CompileError::compile(loc.clone(), "division by zero"));
                }
                Value::Int(a.wrapping_rem(b))
            }
            "<" => Value::Bool(a < b),
            "<=" => Value::Bool(a <= b),
            ">" => Value::Bool(a > b),
            ">=" => Value::Bool(a >= b),
            other => {
                return Err(CompileError::compile(
                    loc.clone(),
                    format!("unknown operator \"{}\"", other),
                ));
            }
        };
        Ok(value)
    }

    fn call(&mut self, name: &str, args: &[Value], loc: &Location) -> Result<Value, CompileError> {
        if let Some(def) = self.defs.get(name).copied() {
            if self.call_depth >= MAX_CALL_DEPTH {
                return Err(CompileError::compile(
                    loc.clone(),
                    format!("call depth exceeded in \"{}\"", name),
                ));
            }
            if args.len() != def.params.len() {
                return Err(CompileError::compile(
                    loc.clone(),
                    format!(
                        "function \"{}\" takes {} argument(s), got {}",
                        name,
                        def.params.len(),
                        args.len()
                    ),
                ));
            }
            let mut scope = SymTab::new();
            for (param, value) in def.params.iter().zip(args) {
                scope.define(param, *value);
            }
            self.call_depth += 1;
            let flow = self.eval(&def.body, &mut scope);
            self.call_depth -= 1;
            return match flow? {
                Flow::Value(v) | Flow::Return(v) => Ok(v),
                Flow::Break | Flow::Continue => Err(CompileError::compile(
                    loc.clone(),
                    "break or continue outside of a loop",
                )),
            };
        }

        match name {
            "print_int" => {
                writeln!(self.output, "{}", args[0].as_int(loc)?)?;
                Ok(Value::Unit)
            }
            "print_bool" => {
                writeln!(self.output, "{}", args[0].as_bool(loc)?)?;
                Ok(Value::Unit)
            }
            "read_int" => {
                let mut line = String::new();
                let read = self.input.read_line(&mut line)?;
                if read == 0 {
                    return Err(CompileError::compile(loc.clone(), "read_int: end of input"));
                }
                line.trim().parse::<i64>().map(Value::Int).map_err(|_| {
                    CompileError::compile(
                        loc.clone(),
                        format!("read_int: invalid input {:?}", line.trim()),
                    )
                })
            }
            other => Err(CompileError::compile(
                loc.clone(),
                format!("undefined function \"{}\"", other),
            )),
        }
    }
}
