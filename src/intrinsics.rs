//! Inline-expanded operators.
//!
//! Arithmetic, comparison and unary operator calls in the IR are not real
//! calls: the assembly emitter looks the operator up here and expands it
//! inline. Intrinsics read their operands from memory references, leave the
//! result in the requested register and never call anything, so they cannot
//! disturb stack alignment.

use std::collections::HashMap;
use std::sync::LazyLock;

/// Operand references and result register for one intrinsic expansion.
pub struct IntrinsicArgs<'a> {
    /// Memory references of the operands, e.g. `-8(%rbp)`.
    pub arg_refs: Vec<&'a str>,
    /// Register the result must end up in.
    pub result_register: &'a str,
}

pub type Intrinsic = fn(&IntrinsicArgs, &mut dyn FnMut(String));

static INTRINSICS: LazyLock<HashMap<&'static str, Intrinsic>> = LazyLock::new(|| {
    let mut m: HashMap<&'static str, Intrinsic> = HashMap::new();
    m.insert("unary_-", unary_minus);
    m.insert("unary_not", unary_not);
    m.insert("+", plus);
    m.insert("-", minus);
    m.insert("*", multiply);
    m.insert("/", divide);
    m.insert("%", remainder);
    m.insert("==", |a, emit| comparison(a, "sete", emit));
    m.insert("!=", |a, emit| comparison(a, "setne", emit));
    m.insert("<", |a, emit| comparison(a, "setl", emit));
    m.insert("<=", |a, emit| comparison(a, "setle", emit));
    m.insert(">", |a, emit| comparison(a, "setg", emit));
    m.insert(">=", |a, emit| comparison(a, "setge", emit));
    m
});

/// Look up the intrinsic for an operator name.
pub fn intrinsic(name: &str) -> Option<Intrinsic> {
    INTRINSICS.get(name).copied()
}

fn unary_minus(a: &IntrinsicArgs, emit: &mut dyn FnMut(String)) {
    emit(format!("movq {}, {}", a.arg_refs[0], a.result_register));
    emit(format!("negq {}", a.result_register));
}

fn unary_not(a: &IntrinsicArgs, emit: &mut dyn FnMut(String)) {
    emit(format!("movq {}, {}", a.arg_refs[0], a.result_register));
    emit(format!("xorq $1, {}", a.result_register));
}

fn plus(a: &IntrinsicArgs, emit: &mut dyn FnMut(String)) {
    if a.result_register != a.arg_refs[0] {
        emit(format!("movq {}, {}", a.arg_refs[0], a.result_register));
    }
    emit(format!("addq {}, {}", a.arg_refs[1], a.result_register));
}

fn minus(a: &IntrinsicArgs, emit: &mut dyn FnMut(String)) {
    if a.result_register != a.arg_refs[0] {
        emit(format!("movq {}, {}", a.arg_refs[0], a.result_register));
    }
    emit(format!("subq {}, {}", a.arg_refs[1], a.result_register));
}

fn multiply(a: &IntrinsicArgs, emit: &mut dyn FnMut(String)) {
    if a.result_register != a.arg_refs[0] {
        emit(format!("movq {}, {}", a.arg_refs[0], a.result_register));
    }
    emit(format!("imulq {}, {}", a.arg_refs[1], a.result_register));
}

fn divide(a: &IntrinsicArgs, emit: &mut dyn FnMut(String)) {
    emit(format!("movq {}, %rax", a.arg_refs[0]));
    // Sign-extend %rax into %rdx:%rax before the signed division
    emit("cqto".to_string());
    emit(format!("idivq {}", a.arg_refs[1]));
    if a.result_register != "%rax" {
        emit(format!("movq %rax, {}", a.result_register));
    }
}

fn remainder(a: &IntrinsicArgs, emit: &mut dyn FnMut(String)) {
    // Same as division; the remainder lands in %rdx
    emit(format!("movq {}, %rax", a.arg_refs[0]));
    emit("cqto".to_string());
    emit(format!("idivq {}", a.arg_refs[1]));
    if a.result_register != "%rdx" {
        emit(format!("movq %rdx, {}", a.result_register));
    }
}

fn comparison(a: &IntrinsicArgs, setcc: &str, emit: &mut dyn FnMut(String)) {
    // Clear %rax so the setcc byte is the whole result
    emit("xorq %rax, %rax".to_string());
    emit(format!("movq {}, %rdx", a.arg_refs[0]));
    emit(format!("cmpq {}, %rdx", a.arg_refs[1]));
    emit(format!("{} %al", setcc));
    if a.result_register != "%rax" {
        emit(format!("movq %rax, {}", a.result_register));
    }
}
