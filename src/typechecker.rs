//! Type checker for Skald.
//!
//! Walks the AST and decorates every node in place with its resolved type
//! (the one permitted cross-stage mutation). Operators are checked against
//! the builtin signature table through the same scope mechanism as
//! variables, so a local binding may shadow a builtin name.

use crate::ast::{Definition, ExprKind, Expression, LiteralValue, Module};
use crate::builtins::builtin_function_types;
use crate::error::CompileError;
use crate::symtab::SymTab;
use crate::types::Type;

/// Type-check a whole module and return its result type.
///
/// All top-level function names are bound before any body is checked, so
/// definitions may call each other regardless of order.
pub fn typecheck_module(module: &mut Module) -> Result<Type, CompileError> {
    let mut checker = TypeChecker::new();

    for def in &module.defs {
        if checker.symtab.is_in_scope(&def.name) {
            return Err(CompileError::type_error(
                def.location.clone(),
                format!("function \"{}\" is already defined", def.name),
            ));
        }
        checker.symtab.define(&def.name, def.fun_type.clone());
    }

    for def in &mut module.defs {
        checker.check_definition(def)?;
    }

    match &mut module.expr {
        Some(expr) => checker.check(expr),
        None => Ok(Type::Unit),
    }
}

struct TypeChecker {
    symtab: SymTab<Type>,
    /// Declared result type of the definition currently being checked, used
    /// to validate `return` expressions. `None` at top level.
    return_type: Option<Type>,
}

impl TypeChecker {
    fn new() -> Self {
        TypeChecker {
            symtab: SymTab::with_root(builtin_function_types()),
            return_type: None,
        }
    }

    fn check_definition(&mut self, def: &mut Definition) -> Result<(), CompileError> {
        let (param_types, result_type) = match &def.fun_type {
            Type::Fn { params, result } => (params.clone(), (**result).clone()),
            other => {
                return Err(CompileError::compile(
                    def.location.clone(),
                    format!("definition \"{}\" carries a non-function type {}", def.name, other),
                ));
            }
        };

        self.symtab.push_scope();
        for (name, ty) in def.params.iter().zip(param_types) {
            self.symtab.define(name, ty);
        }
        self.return_type = Some(result_type.clone());

        let body_type = self.check(&mut def.body);

        self.return_type = None;
        self.symtab.pop_scope();

        let body_type = body_type?;
        if body_type != result_type {
            return Err(CompileError::type_error(
                def.location.clone(),
                format!(
                    "function \"{}\" is declared to return {} but its body has type {}",
                    def.name, result_type, body_type
                ),
            ));
        }
        Ok(())
    }

    fn check(&mut self, expr: &mut Expression) -> Result<Type, CompileError> {
        let ty = self.infer(expr)?;
        expr.ty = ty.clone();
        Ok(ty)
    }

    fn require(
        &self,
        expr: &Expression,
        expected: &Type,
        got: &Type,
    ) -> Result<(), CompileError> {
        if expected != got {
            return Err(CompileError::type_error(
                expr.location.clone(),
                format!("expected type {}, got {}", expected, got),
            ));
        }
        Ok(())
    }

    fn infer(&mut self, expr: &mut Expression) -> Result<Type, CompileError> {
        let location = expr.location.clone();
        match &mut expr.kind {
            ExprKind::Literal(value) => Ok(match value {
                LiteralValue::Bool(_) => Type::Bool,
                LiteralValue::Int(_) => Type::Int,
                LiteralValue::Unit => Type::Unit,
            }),

            ExprKind::Identifier(name) => match self.symtab.get(name) {
                Some(ty) => Ok(ty.clone()),
                None => Err(CompileError::type_error(
                    location,
                    format!("undefined identifier \"{}\"", name),
                )),
            },

            ExprKind::BinaryOp { left, op, right } => {
                // Work around simultaneous borrows of the kind's fields
                let op = op.clone();
                let left_type = self.check(left)?;
                let right_type = self.check(right)?;

                if op == "==" || op == "!=" {
                    if left_type != right_type {
                        return Err(CompileError::type_error(
                            location,
                            format!(
                                "comparison operand types mismatch (got {} and {})",
                                left_type, right_type
                            ),
                        ));
                    }
                    return Ok(Type::Bool);
                }

                if op == "=" {
                    let name = match &left.kind {
                        ExprKind::Identifier(name) => name.clone(),
                        _ => {
                            return Err(CompileError::type_error(
                                location,
                                "left side of assignment is not an identifier",
                            ));
                        }
                    };
                    if self.symtab.get(&name).is_none() {
                        return Err(CompileError::type_error(
                            location,
                            format!("undefined variable \"{}\"", name),
                        ));
                    }
                    self.require(left, &left_type, &right_type)?;
                    self.symtab.set(&name, right_type.clone());
                    return Ok(right_type);
                }

                let op_type = match self.symtab.get(&op) {
                    Some(ty) => ty.clone(),
                    None => {
                        return Err(CompileError::type_error(
                            location,
                            format!("undefined operator \"{}\"", op),
                        ));
                    }
                };
                let (params, result) = match &op_type {
                    Type::Fn { params, result } if params.len() == 2 => {
                        (params.clone(), (**result).clone())
                    }
                    _ => {
                        return Err(CompileError::type_error(
                            location,
                            format!("\"{}\" is not a binary operator", op),
                        ));
                    }
                };
                self.require(left, &params[0], &left_type)?;
                self.require(right, &params[1], &right_type)?;
                Ok(result)
            }

            ExprKind::UnaryOp { op, param } => {
                let op = op.clone();
                let param_type = self.check(param)?;
                match op.as_str() {
                    "()" => Ok(param_type),
                    "unary_-" => {
                        self.require(param, &Type::Int, &param_type)?;
                        Ok(Type::Int)
                    }
                    "unary_not" => {
                        self.require(param, &Type::Bool, &param_type)?;
                        Ok(Type::Bool)
                    }
                    other => Err(CompileError::compile(
                        location,
                        format!("unknown unary operator \"{}\"", other),
                    )),
                }
            }

            ExprKind::If {
                condition,
                true_branch,
                false_branch,
            } => {
                let cond_type = self.check(condition)?;
                self.require(condition, &Type::Bool, &cond_type)?;
                let true_type = self.check(true_branch)?;
                match false_branch {
                    None => Ok(Type::Unit),
                    Some(branch) => {
                        let false_type = self.check(branch)?;
                        if true_type != false_type {
                            return Err(CompileError::type_error(
                                location,
                                format!(
                                    "mismatching types in conditional branches ({} and {})",
                                    true_type, false_type
                                ),
                            ));
                        }
                        Ok(true_type)
                    }
                }
            }

            ExprKind::Call { name, args } => {
                let name = name.clone();
                let fn_type = match self.symtab.get(&name) {
                    Some(ty) => ty.clone(),
                    None => {
                        return Err(CompileError::type_error(
                            location,
                            format!("undefined function \"{}\"", name),
                        ));
                    }
                };
                let (params, result) = match &fn_type {
                    Type::Fn { params, result } => (params.clone(), (**result).clone()),
                    other => {
                        return Err(CompileError::type_error(
                            location,
                            format!("\"{}\" has type {} and cannot be called", name, other),
                        ));
                    }
                };
                if args.len() != params.len() {
                    return Err(CompileError::type_error(
                        location,
                        format!(
                            "function \"{}\" takes {} argument(s), got {}",
                            name,
                            params.len(),
                            args.len()
                        ),
                    ));
                }
                for (arg, param_type) in args.iter_mut().zip(&params) {
                    let arg_type = self.check(arg)?;
                    if &arg_type != param_type {
                        return Err(CompileError::type_error(
                            arg.location.clone(),
                            format!(
                                "argument to \"{}\" has type {}, expected {}",
                                name, arg_type, param_type
                            ),
                        ));
                    }
                }
                Ok(result)
            }

            ExprKind::Block { exprs, result } => {
                self.symtab.push_scope();
                let mut block_type = Ok(Type::Unit);
                for e in exprs.iter_mut() {
                    if let Err(err) = self.check(e) {
                        block_type = Err(err);
                        break;
                    }
                }
                if block_type.is_ok()
                    && let Some(res) = result
                {
                    block_type = self.check(res);
                }
                self.symtab.pop_scope();
                block_type
            }

            ExprKind::While { condition, body } => {
                let cond_type = self.check(condition)?;
                self.require(condition, &Type::Bool, &cond_type)?;
                self.check(body)?;
                Ok(Type::Unit)
            }

            ExprKind::Var {
                name,
                value,
                typed,
                declared,
            } => {
                let name = name.clone();
                let typed = *typed;
                let declared = declared.clone();
                if self.symtab.is_in_scope(&name) {
                    return Err(CompileError::type_error(
                        location,
                        format!("variable \"{}\" is already declared in this scope", name),
                    ));
                }
                let value_type = self.check(value)?;
                if typed && declared != value_type {
                    return Err(CompileError::type_error(
                        location,
                        format!(
                            "mismatch between declared type {} and actual type {}",
                            declared, value_type
                        ),
                    ));
                }
                self.symtab.define(&name, value_type);
                Ok(Type::Unit)
            }

            ExprKind::Break | ExprKind::Continue => Ok(Type::Unit),

            ExprKind::Return(value) => {
                let value_type = match value {
                    Some(e) => self.check(e)?,
                    None => Type::Unit,
                };
                // `return` from the top level leaves `main` unchecked
                if let Some(expected) = self.return_type.clone()
                    && value_type != expected
                {
                    return Err(CompileError::type_error(
                        location,
                        format!(
                            "return value has type {}, expected {}",
                            value_type, expected
                        ),
                    ));
                }
                Ok(Type::Unit)
            }
        }
    }
}
