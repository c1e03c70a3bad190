//! Single-pass parser and register-allocating code generator (spec §4.5).
//!
//! Parses source directly into a [`compiled::CompiledProgram`] — a plain
//! data tree with no heap dependency. Loading that tree into live heap
//! objects (`FunctionObj`/`Closure`) is [`pebble-vm`]'s job.

mod compiled;
mod error;
mod expr;
mod func_builder;
mod operand;
mod parser;
mod precedence;
mod stmt;

pub use compiled::{CompiledFunction, CompiledProgram, ConstantValue};
pub use error::CodegenError;
pub use func_builder::SENTINEL_SLOT;
pub use parser::Parser;

use pebble_common::FileId;

/// Compiles a whole source file into its root [`CompiledFunction`] plus the
/// atom/literal tables it was compiled against.
pub fn compile(source: &str, file: FileId) -> Result<CompiledProgram, CodegenError> {
    let parser = Parser::new(source, file);
    let (root, atoms, literals) = parser.parse_program()?;
    Ok(CompiledProgram {
        root,
        atoms,
        literals,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_empty_program() {
        let program = compile("", FileId::DUMMY).unwrap();
        assert_eq!(program.root.nparams, 0);
    }

    #[test]
    fn compiles_var_and_arithmetic() {
        let program = compile("var x = 1 + 2; var y = x * 3;", FileId::DUMMY).unwrap();
        assert_eq!(program.root.nlocals, 2);
    }

    #[test]
    fn compiles_function_with_closure() {
        let source = r#"
            function makeCounter() {
                var count = 0;
                function increment() {
                    count = count + 1;
                    return count;
                }
                return increment;
            }
        "#;
        let program = compile(source, FileId::DUMMY).unwrap();
        assert_eq!(program.root.nlocals, 1);
    }

    #[test]
    fn reports_unexpected_token() {
        let err = compile("var ;", FileId::DUMMY).unwrap_err();
        assert!(matches!(err, CodegenError::Internal(_)));
    }

    #[test]
    fn compiles_for_and_switch() {
        let source = r#"
            var total = 0;
            for (var i = 0; i < 10; i = i + 1) {
                if (i == 5) { continue; }
                total = total + i;
            }
            switch (total) {
                case 0:
                    total = 1;
                    break;
                default:
                    total = 2;
            }
        "#;
        compile(source, FileId::DUMMY).unwrap();
    }
}
