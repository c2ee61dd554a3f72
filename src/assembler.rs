//! External toolchain driver.
//!
//! Turns assembly text into an ELF executable by writing the stdlib and the
//! program into a private working directory and running GNU `as` plus `ld`
//! (or `cc` when linking with the C runtime). The directory is released on
//! every exit path.

use crate::error::CompileError;
use crate::stdlib::{STDLIB_ASM, stdlib_without_start};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// Linking configuration for [`assemble`]/[`assemble_to_bytes`].
#[derive(Debug, Clone, Default)]
pub struct LinkOptions {
    /// Link with `cc` and let the C runtime provide `_start`.
    pub link_with_c: bool,
    /// Extra `-l` libraries passed to the linker.
    pub extra_libraries: Vec<String>,
}

/// Assemble and link, writing the executable to `output_file`.
pub fn assemble(
    assembly_code: &str,
    output_file: &Path,
    options: &LinkOptions,
) -> Result<(), CompileError> {
    let workdir = tempfile::Builder::new().prefix("skaldc_").tempdir()?;
    let built = assemble_in(assembly_code, workdir.path(), options)?;
    fs::copy(&built, output_file)?;
    Ok(())
}

/// Assemble and link, returning the executable's bytes.
pub fn assemble_to_bytes(
    assembly_code: &str,
    options: &LinkOptions,
) -> Result<Vec<u8>, CompileError> {
    let workdir = tempfile::Builder::new().prefix("skaldc_").tempdir()?;
    let built = assemble_in(assembly_code, workdir.path(), options)?;
    Ok(fs::read(&built)?)
}

fn assemble_in(
    assembly_code: &str,
    workdir: &Path,
    options: &LinkOptions,
) -> Result<PathBuf, CompileError> {
    let stdlib_asm = workdir.join("stdlib.s");
    let stdlib_obj = workdir.join("stdlib.o");
    let program_asm = workdir.join("program.s");
    let program_obj = workdir.join("program.o");
    let output = workdir.join("a.out");

    let stdlib_code = if options.link_with_c {
        stdlib_without_start()
    } else {
        STDLIB_ASM.to_string()
    };
    fs::write(&stdlib_asm, stdlib_code)?;
    fs::write(&program_asm, assembly_code)?;

    run_checked(
        Command::new("as")
            .arg("-g")
            .arg("-o")
            .arg(&stdlib_obj)
            .arg(&stdlib_asm),
    )?;
    run_checked(
        Command::new("as")
            .arg("-g")
            .arg("-o")
            .arg(&program_obj)
            .arg(&program_asm),
    )?;

    if options.link_with_c {
        // Linking with the C standard library correctly is complicated, so
        // let the C compiler build the linker command.
        let mut cc = Command::new("cc");
        cc.arg("-o").arg(&output).arg("-static");
        for lib in &options.extra_libraries {
            cc.arg(format!("-l{}", lib));
        }
        cc.arg(&stdlib_obj).arg(&program_obj);
        run_checked(&mut cc)?;
    } else {
        let mut ld = Command::new("ld");
        ld.arg("-o").arg(&output).arg("-static");
        for lib in &options.extra_libraries {
            ld.arg(format!("-l{}", lib));
        }
        ld.arg(&stdlib_obj).arg(&program_obj);
        run_checked(&mut ld)?;
    }

    debug!(output = %output.display(), "linked executable");
    Ok(output)
}

fn run_checked(command: &mut Command) -> Result<(), CompileError> {
    let program = command.get_program().to_string_lossy().to_string();
    let output = command
        .output()
        .map_err(|e| CompileError::Toolchain(format!("failed to run {}: {}", program, e)))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(CompileError::Toolchain(format!(
            "{} exited with {}:\n{}",
            program,
            output.status,
            stderr.trim_end()
        )));
    }
    Ok(())
}

/// Whether `as` and `ld` can be run on this machine. Integration tests use
/// this to skip execution scenarios on hosts without a toolchain.
pub fn toolchain_available() -> bool {
    let probe = |name: &str| {
        Command::new(name)
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    };
    probe("as") && probe("ld")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_command_surfaces_stderr() {
        let err = run_checked(Command::new("sh").arg("-c").arg("echo boom >&2; exit 3"))
            .unwrap_err();
        match err {
            CompileError::Toolchain(message) => {
                assert!(message.contains("boom"), "message: {}", message);
            }
            other => panic!("expected toolchain error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_command_is_a_toolchain_error() {
        let err = run_checked(&mut Command::new("definitely-not-a-real-assembler")).unwrap_err();
        assert!(matches!(err, CompileError::Toolchain(_)));
    }
}
