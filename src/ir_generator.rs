//! Lowering from the typed AST to the three-address IR.
//!
//! Each function definition becomes its own instruction sequence; the
//! module's top-level expression is lowered under the synthetic name
//! `main`. Minted temporaries use the reserved `$` prefix, which no source
//! identifier can produce, so they can never collide with builtins,
//! parameters or user functions. Label names are unique across the whole
//! compilation.
//!
//! If the top-level expression evaluates to an `Int` or a `Bool`, a final
//! `print_int`/`print_bool` call is synthesized so the program prints its
//! result.

use crate::ast::{Definition, ExprKind, Expression, LiteralValue, Location, Module};
use crate::builtins::builtin_function_types;
use crate::error::CompileError;
use crate::ir::{Instruction, InstructionKind, IrVar};
use crate::symtab::SymTab;
use crate::types::Type;
use std::collections::{HashMap, HashSet};

/// Lower a type-checked module into one instruction sequence per function.
pub fn generate_ir(module: &Module) -> Result<Vec<(String, Vec<Instruction>)>, CompileError> {
    let mut root_types: HashMap<IrVar, Type> = builtin_function_types()
        .into_iter()
        .map(|(name, ty)| (IrVar::new(name), ty))
        .collect();
    for def in &module.defs {
        root_types.insert(IrVar::new(&def.name), def.fun_type.clone());
    }

    let mut labels: HashSet<String> = HashSet::new();
    let mut functions = Vec::new();

    for def in &module.defs {
        if def.name == "main" && module.expr.is_some() {
            return Err(CompileError::compile(
                def.location.clone(),
                "function \"main\" conflicts with the module's top-level expression",
            ));
        }
        let mut lowerer = FunctionLowerer::new(&root_types, &mut labels);
        functions.push((def.name.clone(), lowerer.lower_definition(def)?));
    }

    if let Some(expr) = &module.expr {
        let mut lowerer = FunctionLowerer::new(&root_types, &mut labels);
        functions.push(("main".to_string(), lowerer.lower_main(expr)?));
    }

    Ok(functions)
}

/// `break` and `continue` targets of the innermost enclosing loop.
#[derive(Clone)]
struct LoopLabels {
    break_label: String,
    continue_label: String,
}

struct FunctionLowerer<'a> {
    /// Type of every known IR variable, seeded with builtins and top-level
    /// function names.
    var_types: HashMap<IrVar, Type>,
    /// Label names used so far, shared across the compilation.
    labels: &'a mut HashSet<String>,
    ins: Vec<Instruction>,
    next_var: usize,
    unit: IrVar,
}

impl<'a> FunctionLowerer<'a> {
    fn new(root_types: &HashMap<IrVar, Type>, labels: &'a mut HashSet<String>) -> Self {
        let mut var_types = root_types.clone();
        let unit = IrVar::new("$unit");
        var_types.insert(unit.clone(), Type::Unit);
        FunctionLowerer {
            var_types,
            labels,
            ins: Vec::new(),
            next_var: 0,
            unit,
        }
    }

    fn new_var(&mut self, ty: Type) -> IrVar {
        self.next_var += 1;
        let var = IrVar::new(format!("${}", self.next_var));
        self.var_types.insert(var.clone(), ty);
        var
    }

    fn new_label(&mut self, hint: &str) -> String {
        let mut name = hint.to_string();
        let mut suffix = 1;
        while self.labels.contains(&name) {
            suffix += 1;
            name = format!("{}{}", hint, suffix);
        }
        self.labels.insert(name.clone());
        name
    }

    fn emit(&mut self, kind: InstructionKind, location: Location) {
        self.ins.push(Instruction::new(kind, location));
    }

    /// The scope's root bindings: every known variable under its own name.
    fn root_scope(&self) -> SymTab<IrVar> {
        let root = self
            .var_types
            .keys()
            .map(|v| (v.name().to_string(), v.clone()))
            .collect();
        SymTab::with_root(root)
    }

    fn lower_definition(&mut self, def: &Definition) -> Result<Vec<Instruction>, CompileError> {
        let (param_types, result_type) = match &def.fun_type {
            Type::Fn { params, result } => (params.clone(), (**result).clone()),
            other => {
                return Err(CompileError::compile(
                    def.location.clone(),
                    format!("definition \"{}\" carries a non-function type {}", def.name, other),
                ));
            }
        };

        let mut params = Vec::new();
        for (name, ty) in def.params.iter().zip(param_types) {
            let var = IrVar::new(name);
            self.var_types.insert(var.clone(), ty);
            params.push(var);
        }

        let mut scope = self.root_scope();
        self.emit(
            InstructionKind::Fun {
                name: def.name.clone(),
                params,
            },
            def.location.clone(),
        );
        let var_final = self.visit(&mut scope, &def.body, None)?;

        let returned = if result_type == Type::Unit {
            None
        } else {
            Some(var_final)
        };
        self.emit(InstructionKind::Return { var: returned }, def.location.clone());
        Ok(std::mem::take(&mut self.ins))
    }

    fn lower_main(&mut self, expr: &Expression) -> Result<Vec<Instruction>, CompileError> {
        let mut scope = self.root_scope();
        self.emit(
            InstructionKind::Fun {
                name: "main".to_string(),
                params: vec![],
            },
            expr.location.clone(),
        );
        let var_final = self.visit(&mut scope, expr, None)?;

        // Print a trailing printable result
        let print_fn = match self.var_types.get(&var_final) {
            Some(Type::Int) => Some("print_int"),
            Some(Type::Bool) => Some("print_bool"),
            _ => None,
        };
        if let Some(name) = print_fn {
            let fun = self.require(&scope, name, &expr.location)?;
            let dest = self.unit.clone();
            self.emit(
                InstructionKind::Call {
                    fun,
                    args: vec![var_final],
                    dest,
                },
                expr.location.clone(),
            );
        }

        self.emit(InstructionKind::Return { var: None }, Location::dummy());
        Ok(std::mem::take(&mut self.ins))
    }

    fn require(
        &self,
        scope: &SymTab<IrVar>,
        name: &str,
        location: &Location,
    ) -> Result<IrVar, CompileError> {
        scope.get(name).cloned().ok_or_else(|| {
            CompileError::compile(
                location.clone(),
                format!("\"{}\" is not bound to an IR variable", name),
            )
        })
    }

    fn visit(
        &mut self,
        scope: &mut SymTab<IrVar>,
        expr: &Expression,
        loop_labels: Option<&LoopLabels>,
    ) -> Result<IrVar, CompileError> {
        let loc = expr.location.clone();
        match &expr.kind {
            ExprKind::Literal(value) => match value {
                LiteralValue::Int(v) => {
                    let var = self.new_var(Type::Int);
                    self.emit(
                        InstructionKind::LoadIntConst {
                            value: *v,
                            dest: var.clone(),
                        },
                        loc,
                    );
                    Ok(var)
                }
                LiteralValue::Bool(v) => {
                    let var = self.new_var(Type::Bool);
                    self.emit(
                        InstructionKind::LoadBoolConst {
                            value: *v,
                            dest: var.clone(),
                        },
                        loc,
                    );
                    Ok(var)
                }
                LiteralValue::Unit => Ok(self.unit.clone()),
            },

            ExprKind::Identifier(name) => self.require(scope, name, &loc),

            ExprKind::BinaryOp { left, op, right } => {
                let var_left = self.visit(scope, left, loop_labels)?;

                if op == "and" || op == "or" {
                    let l_right = self.new_label(&format!("{}_right", op));
                    let l_skip = self.new_label(&format!("{}_skip", op));
                    let l_end = self.new_label(&format!("{}_end", op));

                    let (then_label, else_label) = if op == "and" {
                        (l_right.clone(), l_skip.clone())
                    } else {
                        (l_skip.clone(), l_right.clone())
                    };
                    self.emit(
                        InstructionKind::CondJump {
                            cond: var_left,
                            then_label,
                            else_label,
                        },
                        loc.clone(),
                    );

                    self.emit(InstructionKind::Label { name: l_right }, loc.clone());
                    let var_right = self.visit(scope, right, loop_labels)?;
                    let var_result = self.new_var(Type::Bool);
                    self.emit(
                        InstructionKind::Copy {
                            source: var_right,
                            dest: var_result.clone(),
                        },
                        loc.clone(),
                    );
                    self.emit(
                        InstructionKind::Jump {
                            label: l_end.clone(),
                        },
                        loc.clone(),
                    );

                    self.emit(InstructionKind::Label { name: l_skip }, loc.clone());
                    self.emit(
                        InstructionKind::LoadBoolConst {
                            value: op == "or",
                            dest: var_result.clone(),
                        },
                        loc.clone(),
                    );
                    self.emit(
                        InstructionKind::Jump {
                            label: l_end.clone(),
                        },
                        loc.clone(),
                    );

                    self.emit(InstructionKind::Label { name: l_end }, loc);
                    return Ok(var_result);
                }

                let var_right = self.visit(scope, right, loop_labels)?;

                if op == "=" {
                    self.emit(
                        InstructionKind::Copy {
                            source: var_right,
                            dest: var_left.clone(),
                        },
                        loc,
                    );
                    return Ok(var_left);
                }

                let var_result = self.new_var(expr.ty.clone());
                // Polymorphic equality bypasses the scope: the callee name is
                // the operator itself, resolved by the emitter's intrinsics.
                let var_op = if op == "==" || op == "!=" {
                    IrVar::new(op)
                } else {
                    self.require(scope, op, &loc)?
                };
                self.emit(
                    InstructionKind::Call {
                        fun: var_op,
                        args: vec![var_left, var_right],
                        dest: var_result.clone(),
                    },
                    loc,
                );
                Ok(var_result)
            }

            ExprKind::UnaryOp { op, param } => {
                let var_param = self.visit(scope, param, loop_labels)?;
                if op == "()" {
                    return Ok(var_param);
                }
                let var_result = self.new_var(expr.ty.clone());
                let var_op = self.require(scope, op, &loc)?;
                self.emit(
                    InstructionKind::Call {
                        fun: var_op,
                        args: vec![var_param],
                        dest: var_result.clone(),
                    },
                    loc,
                );
                Ok(var_result)
            }

            ExprKind::If {
                condition,
                true_branch,
                false_branch,
            } => {
                let l_then = self.new_label("then");
                let l_end = self.new_label("if_end");

                let var_cond = self.visit(scope, condition, loop_labels)?;

                match false_branch {
                    None => {
                        self.emit(
                            InstructionKind::CondJump {
                                cond: var_cond,
                                then_label: l_then.clone(),
                                else_label: l_end.clone(),
                            },
                            loc.clone(),
                        );
                        self.emit(InstructionKind::Label { name: l_then }, loc.clone());
                        self.visit(scope, true_branch, loop_labels)?;
                        self.emit(InstructionKind::Label { name: l_end }, loc);
                        Ok(self.unit.clone())
                    }
                    Some(false_branch) => {
                        let var_result = self.new_var(expr.ty.clone());
                        let l_else = self.new_label("else");

                        self.emit(
                            InstructionKind::CondJump {
                                cond: var_cond,
                                then_label: l_then.clone(),
                                else_label: l_else.clone(),
                            },
                            loc.clone(),
                        );

                        self.emit(InstructionKind::Label { name: l_then }, loc.clone());
                        let var_then = self.visit(scope, true_branch, loop_labels)?;
                        self.emit(
                            InstructionKind::Copy {
                                source: var_then,
                                dest: var_result.clone(),
                            },
                            loc.clone(),
                        );
                        self.emit(
                            InstructionKind::Jump {
                                label: l_end.clone(),
                            },
                            loc.clone(),
                        );

                        self.emit(InstructionKind::Label { name: l_else }, loc.clone());
                        let var_else = self.visit(scope, false_branch, loop_labels)?;
                        self.emit(
                            InstructionKind::Copy {
                                source: var_else,
                                dest: var_result.clone(),
                            },
                            loc.clone(),
                        );

                        self.emit(InstructionKind::Label { name: l_end }, loc);
                        Ok(var_result)
                    }
                }
            }

            ExprKind::Call { name, args } => {
                let var_fun = self.require(scope, name, &loc)?;
                let mut var_args = Vec::with_capacity(args.len());
                for arg in args {
                    var_args.push(self.visit(scope, arg, loop_labels)?);
                }
                let var_result = self.new_var(expr.ty.clone());
                self.emit(
                    InstructionKind::Call {
                        fun: var_fun,
                        args: var_args,
                        dest: var_result.clone(),
                    },
                    loc,
                );
                Ok(var_result)
            }

            ExprKind::Block { exprs, result } => {
                scope.push_scope();
                let mut lowered = Ok(self.unit.clone());
                for e in exprs {
                    if let Err(err) = self.visit(scope, e, loop_labels) {
                        lowered = Err(err);
                        break;
                    }
                }
                if lowered.is_ok()
                    && let Some(res) = result
                {
                    lowered = self.visit(scope, res, loop_labels);
                }
                scope.pop_scope();
                lowered
            }

            ExprKind::While { condition, body } => {
                let l_start = self.new_label("while_start");
                let l_body = self.new_label("while_body");
                let l_end = self.new_label("while_end");
                let inner = LoopLabels {
                    break_label: l_end.clone(),
                    continue_label: l_start.clone(),
                };

                self.emit(
                    InstructionKind::Label {
                        name: l_start.clone(),
                    },
                    loc.clone(),
                );
                let var_cond = self.visit(scope, condition, Some(&inner))?;
                self.emit(
                    InstructionKind::CondJump {
                        cond: var_cond,
                        then_label: l_body.clone(),
                        else_label: l_end.clone(),
                    },
                    loc.clone(),
                );

                self.emit(InstructionKind::Label { name: l_body }, loc.clone());
                self.visit(scope, body, Some(&inner))?;
                self.emit(InstructionKind::Jump { label: l_start }, loc.clone());

                self.emit(InstructionKind::Label { name: l_end }, loc);
                Ok(self.unit.clone())
            }

            ExprKind::Var { name, value, .. } => {
                let var_value = self.visit(scope, value, loop_labels)?;
                let var_result = self.new_var(value.ty.clone());
                scope.define(name, var_result.clone());
                self.emit(
                    InstructionKind::Copy {
                        source: var_value,
                        dest: var_result,
                    },
                    loc,
                );
                Ok(self.unit.clone())
            }

            ExprKind::Break => match loop_labels {
                Some(labels) => {
                    self.emit(
                        InstructionKind::Jump {
                            label: labels.break_label.clone(),
                        },
                        loc,
                    );
                    Ok(self.unit.clone())
                }
                None => Err(CompileError::compile(loc, "break outside of a loop")),
            },

            ExprKind::Continue => match loop_labels {
                Some(labels) => {
                    self.emit(
                        InstructionKind::Jump {
                            label: labels.continue_label.clone(),
                        },
                        loc,
                    );
                    Ok(self.unit.clone())
                }
                None => Err(CompileError::compile(loc, "continue outside of a loop")),
            },

            ExprKind::Return(value) => {
                let var = match value {
                    Some(e) => Some(self.visit(scope, e, loop_labels)?),
                    None => None,
                };
                self.emit(InstructionKind::Return { var }, loc);
                Ok(self.unit.clone())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::tokenizer::tokenize;
    use crate::typechecker::typecheck_module;

    fn lower(source: &str) -> Vec<(String, Vec<Instruction>)> {
        let tokens = tokenize(source, "test").unwrap();
        let mut module = parse(&tokens).unwrap();
        typecheck_module(&mut module).unwrap();
        generate_ir(&module).unwrap()
    }

    fn lower_err(source: &str) -> CompileError {
        let tokens = tokenize(source, "test").unwrap();
        let mut module = parse(&tokens).unwrap();
        typecheck_module(&mut module).unwrap();
        generate_ir(&module).unwrap_err()
    }

    fn main_instructions(functions: &[(String, Vec<Instruction>)]) -> &[Instruction] {
        &functions
            .iter()
            .find(|(name, _)| name == "main")
            .expect("no main sequence")
            .1
    }

    /// Every label referenced by a jump must be defined exactly once within
    /// its function, and every definition must be unique.
    fn assert_labels_well_formed(functions: &[(String, Vec<Instruction>)]) {
        for (name, instructions) in functions {
            let mut defined: HashMap<&str, usize> = HashMap::new();
            for ins in instructions {
                if let InstructionKind::Label { name } = &ins.kind {
                    *defined.entry(name.as_str()).or_default() += 1;
                }
            }
            for (label, count) in &defined {
                assert_eq!(*count, 1, "label {} defined {} times in {}", label, count, name);
            }
            for ins in instructions {
                match &ins.kind {
                    InstructionKind::Jump { label } => {
                        assert!(defined.contains_key(label.as_str()), "undefined {}", label);
                    }
                    InstructionKind::CondJump {
                        then_label,
                        else_label,
                        ..
                    } => {
                        assert!(defined.contains_key(then_label.as_str()));
                        assert!(defined.contains_key(else_label.as_str()));
                    }
                    _ => {}
                }
            }
        }
    }

    #[test]
    fn test_int_literal_lowering_and_auto_print() {
        let functions = lower("42");
        let main = main_instructions(&functions);
        assert!(matches!(
            main[0].kind,
            InstructionKind::Fun { ref name, ref params } if name == "main" && params.is_empty()
        ));
        assert!(matches!(
            main[1].kind,
            InstructionKind::LoadIntConst { value: 42, .. }
        ));
        assert!(matches!(
            main[2].kind,
            InstructionKind::Call { ref fun, .. } if fun.name() == "print_int"
        ));
        assert!(matches!(main[3].kind, InstructionKind::Return { var: None }));
    }

    #[test]
    fn test_bool_result_prints_bool() {
        let functions = lower("true or false");
        let main = main_instructions(&functions);
        assert!(main.iter().any(|i| matches!(
            &i.kind,
            InstructionKind::Call { fun, .. } if fun.name() == "print_bool"
        )));
    }

    #[test]
    fn test_unit_result_prints_nothing() {
        let functions = lower("print_int(1)");
        let main = main_instructions(&functions);
        let calls = main
            .iter()
            .filter(|i| matches!(i.kind, InstructionKind::Call { .. }))
            .count();
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_equality_callee_is_the_operator_name() {
        let functions = lower("1 == 2");
        let main = main_instructions(&functions);
        assert!(main.iter().any(|i| matches!(
            &i.kind,
            InstructionKind::Call { fun, .. } if fun.name() == "=="
        )));
    }

    #[test]
    fn test_short_circuit_and() {
        let functions = lower("fun f(): Bool { true } false and f()");
        let main = main_instructions(&functions);

        let cond_jump = main
            .iter()
            .find_map(|i| match &i.kind {
                InstructionKind::CondJump {
                    then_label,
                    else_label,
                    ..
                } => Some((then_label.clone(), else_label.clone())),
                _ => None,
            })
            .expect("no CondJump in main");
        assert_eq!(cond_jump.0, "and_right");
        assert_eq!(cond_jump.1, "and_skip");

        // The call to f must sit between and_right and and_skip: the skip
        // path only loads the constant false.
        let pos_of = |label: &str| {
            main.iter()
                .position(|i| matches!(&i.kind, InstructionKind::Label { name } if name == label))
                .unwrap()
        };
        let call_pos = main
            .iter()
            .position(|i| matches!(&i.kind, InstructionKind::Call { fun, .. } if fun.name() == "f"))
            .expect("no call to f");
        assert!(pos_of("and_right") < call_pos && call_pos < pos_of("and_skip"));
        assert_labels_well_formed(&functions);
    }

    #[test]
    fn test_short_circuit_or_swaps_branches() {
        let functions = lower("fun f(): Bool { true } true or f()");
        let main = main_instructions(&functions);
        let cond_jump = main
            .iter()
            .find_map(|i| match &i.kind {
                InstructionKind::CondJump {
                    then_label,
                    else_label,
                    ..
                } => Some((then_label.clone(), else_label.clone())),
                _ => None,
            })
            .unwrap();
        assert_eq!(cond_jump.0, "or_skip");
        assert_eq!(cond_jump.1, "or_right");
    }

    #[test]
    fn test_while_shape() {
        let functions = lower("{ var i = 0; while i < 5 do i = i + 1 }");
        let main = main_instructions(&functions);
        let labels: Vec<&str> = main
            .iter()
            .filter_map(|i| match &i.kind {
                InstructionKind::Label { name } => Some(name.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(labels, vec!["while_start", "while_body", "while_end"]);
        assert!(main.iter().any(|i| matches!(
            &i.kind,
            InstructionKind::CondJump { then_label, else_label, .. }
                if then_label == "while_body" && else_label == "while_end"
        )));
        assert!(main.iter().any(|i| matches!(
            &i.kind,
            InstructionKind::Jump { label } if label == "while_start"
        )));
        assert_labels_well_formed(&functions);
    }

    #[test]
    fn test_break_and_continue_target_loop_labels() {
        let functions = lower("while true do { break; continue }");
        let main = main_instructions(&functions);
        assert!(main.iter().any(|i| matches!(
            &i.kind,
            InstructionKind::Jump { label } if label == "while_end"
        )));
        assert_labels_well_formed(&functions);
    }

    #[test]
    fn test_break_outside_loop_is_a_compile_error() {
        assert!(matches!(lower_err("break"), CompileError::Compile { .. }));
        assert!(matches!(lower_err("continue"), CompileError::Compile { .. }));
    }

    #[test]
    fn test_labels_unique_across_functions() {
        let functions = lower(
            "fun f(): Unit { while true do break } \
             fun g(): Unit { while true do break } \
             f()",
        );
        let mut all_labels: Vec<String> = Vec::new();
        for (_, instructions) in &functions {
            for ins in instructions {
                if let InstructionKind::Label { name } = &ins.kind {
                    all_labels.push(name.clone());
                }
            }
        }
        let unique: HashSet<&String> = all_labels.iter().collect();
        assert_eq!(unique.len(), all_labels.len(), "labels: {:?}", all_labels);
        assert_labels_well_formed(&functions);
    }

    #[test]
    fn test_definition_returns_its_result() {
        let functions = lower("fun sq(x: Int): Int { x * x } sq(7)");
        let sq = &functions.iter().find(|(n, _)| n == "sq").unwrap().1;
        assert!(matches!(
            sq.first().unwrap().kind,
            InstructionKind::Fun { ref params, .. } if params.len() == 1
        ));
        assert!(matches!(
            sq.last().unwrap().kind,
            InstructionKind::Return { var: Some(_) }
        ));
    }

    #[test]
    fn test_unit_definition_returns_none() {
        let functions = lower("fun p(): Unit { print_int(1) } p()");
        let p = &functions.iter().find(|(n, _)| n == "p").unwrap().1;
        assert!(matches!(
            p.last().unwrap().kind,
            InstructionKind::Return { var: None }
        ));
    }

    #[test]
    fn test_main_definition_with_top_level_expression_conflicts() {
        assert!(matches!(
            lower_err("fun main(): Int { 1 } 2"),
            CompileError::Compile { .. }
        ));
    }

    #[test]
    fn test_main_definition_without_top_level_expression_is_fine() {
        let functions = lower("fun main(): Unit { print_int(1) }");
        assert_eq!(functions.len(), 1);
        assert_eq!(functions[0].0, "main");
    }

    #[test]
    fn test_if_else_merges_into_result_var() {
        let functions = lower("if 3 < 5 then 10 else 20");
        let main = main_instructions(&functions);
        let copies: Vec<&IrVar> = main
            .iter()
            .filter_map(|i| match &i.kind {
                InstructionKind::Copy { dest, .. } => Some(dest),
                _ => None,
            })
            .collect();
        assert_eq!(copies.len(), 2);
        assert_eq!(copies[0], copies[1]);
        assert_labels_well_formed(&functions);
    }

    #[test]
    fn test_catalog_labels_well_formed() {
        for source in [
            "1 + 2 * 3",
            "{ var x = 5; x = x + 1; x }",
            "if 3 < 5 then 10 else 20",
            "{ var s = 0; var i = 0; while i < 5 do { s = s + i; i = i + 1 }; s }",
            "print_bool(true and false); print_bool(true or false)",
            "fun sq(x: Int): Int { x * x } sq(7)",
            "while true do { if read_int() == 0 then break else continue }",
            "{ var b = true; while b and read_int() < 10 do b = false }",
        ] {
            assert_labels_well_formed(&lower(source));
        }
    }
}
