//! AT&T-syntax x86-64 assembly emission.
//!
//! Every IR variable is spilled to its own 8-byte stack slot below `%rbp`;
//! no register allocation. Calls follow the SysV AMD64 convention: the
//! first six arguments in registers, the rest pushed in reverse source
//! order, `%rsp` aligned to 16 bytes at the call instruction. Operator
//! calls whose name is in the intrinsics table are expanded inline instead.

use crate::intrinsics::{IntrinsicArgs, intrinsic};
use crate::ir::{Instruction, InstructionKind, IrVar};
use std::collections::{HashMap, HashSet};

const ARG_REGISTERS: [&str; 6] = ["%rdi", "%rsi", "%rdx", "%rcx", "%r8", "%r9"];

/// Stack slot assignment for one function's IR variables.
struct Locals {
    var_to_location: HashMap<IrVar, String>,
    stack_used: usize,
}

impl Locals {
    fn new(variables: &[IrVar]) -> Self {
        let mut var_to_location = HashMap::new();
        for (i, var) in variables.iter().enumerate() {
            var_to_location.insert(var.clone(), format!("-{}(%rbp)", 8 * (i + 1)));
        }
        Locals {
            var_to_location,
            stack_used: 8 * variables.len(),
        }
    }

    fn get_ref(&self, var: &IrVar) -> &str {
        self.var_to_location
            .get(var)
            .map(String::as_str)
            .expect("IR variable collected from the same instruction list")
    }

    fn stack_used(&self) -> usize {
        self.stack_used
    }
}

/// Distinct IR variables in order of first appearance.
fn collect_ir_variables(instructions: &[Instruction]) -> Vec<IrVar> {
    let mut seen = HashSet::new();
    let mut result = Vec::new();
    for ins in instructions {
        for var in ins.kind.ir_variables() {
            if seen.insert(var.clone()) {
                result.push(var.clone());
            }
        }
    }
    result
}

/// Emit assembly for the whole program, one function at a time.
pub fn generate_asm(functions: &[(String, Vec<Instruction>)]) -> String {
    let mut lines: Vec<String> = vec![
        ".extern print_int".to_string(),
        ".extern print_bool".to_string(),
        ".extern read_int".to_string(),
        ".section .text".to_string(),
    ];

    for (_, instructions) in functions {
        lines.push(String::new());
        emit_function(&mut lines, instructions);
    }

    lines.push(String::new());
    lines.join("\n")
}

/// Push one indented instruction line.
fn push_ins(lines: &mut Vec<String>, line: impl AsRef<str>) {
    lines.push(format!("    {}", line.as_ref()));
}

fn emit_function(lines: &mut Vec<String>, instructions: &[Instruction]) {
    let variables = collect_ir_variables(instructions);
    let locals = Locals::new(&variables);

    // Parameters only need their register copied to the slot if some later
    // instruction actually reads them.
    let mut referenced: HashSet<&IrVar> = HashSet::new();
    for ins in instructions {
        if !matches!(ins.kind, InstructionKind::Fun { .. }) {
            referenced.extend(ins.kind.ir_variables());
        }
    }

    for ins in instructions {
        push_ins(lines, format!("# {}", ins.kind));
        match &ins.kind {
            InstructionKind::Fun { name, params } => {
                lines.push(format!(".global {}", name));
                lines.push(format!(".type {}, @function", name));
                lines.push(format!("{}:", name));

                push_ins(lines, "pushq %rbp");
                push_ins(lines, "movq %rsp, %rbp");
                for (i, param) in params.iter().take(ARG_REGISTERS.len()).enumerate() {
                    if referenced.contains(param) {
                        push_ins(
                            lines,
                            format!("movq {}, {}", ARG_REGISTERS[i], locals.get_ref(param)),
                        );
                    }
                }
                push_ins(lines, format!("subq ${}, %rsp", locals.stack_used()));
            }

            InstructionKind::Label { name } => {
                lines.push(String::new());
                lines.push(format!(".L{}:", name));
            }

            InstructionKind::LoadIntConst { value, dest } => {
                if i32::try_from(*value).is_ok() {
                    push_ins(lines, format!("movq ${}, {}", value, locals.get_ref(dest)));
                } else {
                    // Too wide for a movq immediate
                    push_ins(lines, format!("movabsq ${}, %rax", value));
                    push_ins(lines, format!("movq %rax, {}", locals.get_ref(dest)));
                }
            }

            InstructionKind::LoadBoolConst { value, dest } => {
                push_ins(
                    lines,
                    format!(
                        "movq ${}, {}",
                        if *value { 1 } else { 0 },
                        locals.get_ref(dest)
                    ),
                );
            }

            InstructionKind::Copy { source, dest } => {
                push_ins(lines, format!("movq {}, %rax", locals.get_ref(source)));
                push_ins(lines, format!("movq %rax, {}", locals.get_ref(dest)));
            }

            InstructionKind::CondJump {
                cond,
                then_label,
                else_label,
            } => {
                push_ins(lines, format!("movq {}, %rax", locals.get_ref(cond)));
                push_ins(lines, "cmpq $0, %rax");
                push_ins(lines, format!("jne .L{}", then_label));
                push_ins(lines, format!("jmp .L{}", else_label));
            }

            InstructionKind::Jump { label } => {
                push_ins(lines, format!("jmp .L{}", label));
            }

            InstructionKind::Call { fun, args, dest } => {
                emit_call(lines, &locals, fun, args, dest);
            }

            InstructionKind::Return { var } => {
                match var {
                    Some(v) => push_ins(lines, format!("movq {}, %rax", locals.get_ref(v))),
                    None => push_ins(lines, "movq $0, %rax"),
                }
                push_ins(lines, "movq %rbp, %rsp");
                push_ins(lines, "popq %rbp");
                push_ins(lines, "ret");
            }
        }
    }
}

fn emit_call(lines: &mut Vec<String>, locals: &Locals, fun: &IrVar, args: &[IrVar], dest: &IrVar) {
    let mut emit = |line: String| lines.push(format!("    {}", line));

    let register_args = args.len().min(ARG_REGISTERS.len());
    let stack_arg_bytes = 8 * (args.len() - register_args);
    // Keep %rsp 16-byte aligned at the call instruction: the prologue's
    // pushq leaves it aligned, so pad by the parity of what we add on top.
    let mut alignment = (locals.stack_used() + stack_arg_bytes) % 16;

    if let Some(expand) = intrinsic(fun.name()) {
        alignment = 0;
        let arg_refs: Vec<&str> = args.iter().map(|a| locals.get_ref(a)).collect();
        expand(
            &IntrinsicArgs {
                arg_refs,
                result_register: "%rax",
            },
            &mut emit,
        );
    } else {
        if alignment > 0 {
            emit(format!("subq ${}, %rsp", alignment));
        }
        for (i, arg) in args.iter().take(register_args).enumerate() {
            emit(format!("movq {}, {}", locals.get_ref(arg), ARG_REGISTERS[i]));
        }
        for arg in args[register_args..].iter().rev() {
            emit(format!("pushq {}", locals.get_ref(arg)));
        }
        emit(format!("callq {}", fun.name()));
    }

    emit(format!("movq %rax, {}", locals.get_ref(dest)));
    let restore = alignment + stack_arg_bytes;
    if restore > 0 {
        emit(format!("addq ${}, %rsp", restore));
    }
}
