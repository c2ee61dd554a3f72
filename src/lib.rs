//! Skald compiler library.
//!
//! Compiles a small strictly-typed expression language to native x86-64
//! Linux executables. The pipeline is one pass per stage:
//!
//! ```text
//! source -> tokenizer -> parser -> type checker -> IR generator -> asm emitter
//! ```
//!
//! The emitted AT&T assembly links against a small hand-written runtime
//! (`print_int`, `print_bool`, `read_int`, `_start`) via GNU `as` and `ld`;
//! see [`assembler`]. A JSON-over-TCP front end lives in [`server`], and an
//! experimental tree-walking [`interpreter`] runs programs without the
//! native toolchain.

pub mod assembler;
pub mod ast;
pub mod builtins;
pub mod codegen;
pub mod error;
pub mod interpreter;
pub mod intrinsics;
pub mod ir;
pub mod ir_generator;
pub mod parser;
pub mod server;
pub mod stdlib;
pub mod symtab;
pub mod tokenizer;
pub mod typechecker;
pub mod types;

pub use assembler::{LinkOptions, assemble, assemble_to_bytes, toolchain_available};
pub use ast::{Expression, Location, Module};
pub use error::CompileError;
pub use types::Type;

use std::path::Path;
use tracing::debug;

/// Compile source text to AT&T-syntax x86-64 assembly.
pub fn compile_to_assembly(source: &str, filename: &str) -> Result<String, CompileError> {
    let tokens = tokenizer::tokenize(source, filename)?;
    debug!(tokens = tokens.len(), "tokenized");
    let mut module = parser::parse(&tokens)?;
    let module_type = typechecker::typecheck_module(&mut module)?;
    debug!(%module_type, "type checked");
    let ir = ir_generator::generate_ir(&module)?;
    debug!(functions = ir.len(), "lowered to IR");
    Ok(codegen::generate_asm(&ir))
}

/// Compile source text all the way to an ELF executable, in memory.
pub fn compile_to_executable(
    source: &str,
    filename: &str,
    options: &LinkOptions,
) -> Result<Vec<u8>, CompileError> {
    let asm = compile_to_assembly(source, filename)?;
    assembler::assemble_to_bytes(&asm, options)
}

/// Compile source text to an executable written at `output`.
pub fn compile_to_file(
    source: &str,
    filename: &str,
    output: &Path,
    options: &LinkOptions,
) -> Result<(), CompileError> {
    let asm = compile_to_assembly(source, filename)?;
    assembler::assemble(&asm, output, options)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_compiles_to_assembly() {
        for source in [
            "1 + 2 * 3",
            "{ var x = 5; x = x + 1; x }",
            "if 3 < 5 then 10 else 20",
            "{ var s = 0; var i = 0; while i < 5 do { s = s + i; i = i + 1 }; s }",
            "print_bool(true and false); print_bool(true or false)",
            "fun sq(x: Int): Int { x * x } sq(7)",
        ] {
            let asm = compile_to_assembly(source, "test").unwrap();
            assert!(asm.contains(".global main"), "no main for {:?}", source);
        }
    }

    #[test]
    fn test_each_error_taxon_propagates() {
        assert!(matches!(
            compile_to_assembly("1 + @", "test"),
            Err(CompileError::Lex { .. })
        ));
        assert!(matches!(
            compile_to_assembly("{ a b }", "test"),
            Err(CompileError::Parse { .. })
        ));
        assert!(matches!(
            compile_to_assembly("1 + true", "test"),
            Err(CompileError::Type { .. })
        ));
        assert!(matches!(
            compile_to_assembly("break", "test"),
            Err(CompileError::Compile { .. })
        ));
    }

    #[test]
    fn test_error_messages_carry_the_filename() {
        let err = compile_to_assembly("1 +", "prog.sk").unwrap_err();
        assert!(err.to_string().contains("prog.sk"), "message: {}", err);
    }
}
