//! Three-address intermediate representation.
//!
//! One flat instruction list per function. IR variables are opaque names;
//! at runtime each holds one 8-byte value in a stack slot. Every
//! instruction keeps the source location it was lowered from so later
//! diagnostics can point back at source.

use crate::ast::Location;

/// An opaque IR variable name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IrVar(String);

impl IrVar {
    pub fn new(name: impl Into<String>) -> Self {
        IrVar(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for IrVar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub location: Location,
    pub kind: InstructionKind,
}

impl Instruction {
    pub fn new(kind: InstructionKind, location: Location) -> Self {
        Instruction { location, kind }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InstructionKind {
    /// A jump target local to the enclosing function.
    Label { name: String },
    /// Function entry: a label that also names the IR-vars receiving the
    /// argument registers.
    Fun { name: String, params: Vec<IrVar> },
    LoadIntConst { value: i64, dest: IrVar },
    LoadBoolConst { value: bool, dest: IrVar },
    Copy { source: IrVar, dest: IrVar },
    Call { fun: IrVar, args: Vec<IrVar>, dest: IrVar },
    Jump { label: String },
    /// Jumps to `then_label` iff `cond != 0`.
    CondJump {
        cond: IrVar,
        then_label: String,
        else_label: String,
    },
    Return { var: Option<IrVar> },
}

impl InstructionKind {
    /// Every IR variable appearing as a field of this instruction, in field
    /// order. The assembly emitter assigns one stack slot per distinct
    /// variable returned here.
    pub fn ir_variables(&self) -> Vec<&IrVar> {
        match self {
            InstructionKind::Label { .. } | InstructionKind::Jump { .. } => vec![],
            InstructionKind::Fun { params, .. } => params.iter().collect(),
            InstructionKind::LoadIntConst { dest, .. }
            | InstructionKind::LoadBoolConst { dest, .. } => vec![dest],
            InstructionKind::Copy { source, dest } => vec![source, dest],
            InstructionKind::Call { fun, args, dest } => {
                let mut vars = vec![fun];
                vars.extend(args.iter());
                vars.push(dest);
                vars
            }
            InstructionKind::CondJump { cond, .. } => vec![cond],
            InstructionKind::Return { var } => var.iter().collect(),
        }
    }
}

impl std::fmt::Display for InstructionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn list(vars: &[IrVar]) -> String {
            let names: Vec<&str> = vars.iter().map(|v| v.name()).collect();
            format!("[{}]", names.join(", "))
        }
        match self {
            InstructionKind::Label { name } => write!(f, "Label({})", name),
            InstructionKind::Fun { name, params } => {
                write!(f, "Fun({}, {})", name, list(params))
            }
            InstructionKind::LoadIntConst { value, dest } => {
                write!(f, "LoadIntConst({}, {})", value, dest)
            }
            InstructionKind::LoadBoolConst { value, dest } => {
                write!(f, "LoadBoolConst({}, {})", value, dest)
            }
            InstructionKind::Copy { source, dest } => write!(f, "Copy({}, {})", source, dest),
            InstructionKind::Call { fun, args, dest } => {
                write!(f, "Call({}, {}, {})", fun, list(args), dest)
            }
            InstructionKind::Jump { label } => write!(f, "Jump({})", label),
            InstructionKind::CondJump {
                cond,
                then_label,
                else_label,
            } => write!(f, "CondJump({}, {}, {})", cond, then_label, else_label),
            InstructionKind::Return { var } => match var {
                Some(v) => write!(f, "Return({})", v),
                None => write!(f, "Return(none)"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let kind = InstructionKind::Call {
            fun: IrVar::new("print_int"),
            args: vec![IrVar::new("$1")],
            dest: IrVar::new("$unit"),
        };
        assert_eq!(kind.to_string(), "Call(print_int, [$1], $unit)");

        let kind = InstructionKind::CondJump {
            cond: IrVar::new("$2"),
            then_label: "then".to_string(),
            else_label: "if_end".to_string(),
        };
        assert_eq!(kind.to_string(), "CondJump($2, then, if_end)");

        assert_eq!(
            InstructionKind::Return { var: None }.to_string(),
            "Return(none)"
        );
    }

    #[test]
    fn test_ir_variables_collects_all_fields() {
        let kind = InstructionKind::Call {
            fun: IrVar::new("+"),
            args: vec![IrVar::new("a"), IrVar::new("b")],
            dest: IrVar::new("c"),
        };
        let names: Vec<&str> = kind.ir_variables().iter().map(|v| v.name()).collect();
        assert_eq!(names, vec!["+", "a", "b", "c"]);

        let fun = InstructionKind::Fun {
            name: "f".to_string(),
            params: vec![IrVar::new("x")],
        };
        assert_eq!(fun.ir_variables().len(), 1);

        assert!(
            InstructionKind::Jump {
                label: "l".to_string()
            }
            .ir_variables()
            .is_empty()
        );
    }
}
