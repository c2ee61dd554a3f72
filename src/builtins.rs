//! Builtin function and operator signatures.
//!
//! These seed the root scope of both the type checker and the IR generator.
//! Note that `==` and `!=` are absent: they are polymorphic over matching
//! operand types and are handled specially by the checker and the emitter.

use crate::types::Type;
use std::collections::HashMap;

/// Name -> type for every builtin function and operator.
pub fn builtin_function_types() -> HashMap<String, Type> {
    let int2_int = || Type::function(vec![Type::Int, Type::Int], Type::Int);
    let int2_bool = || Type::function(vec![Type::Int, Type::Int], Type::Bool);
    let bool2_bool = || Type::function(vec![Type::Bool, Type::Bool], Type::Bool);

    let table = [
        ("print_int", Type::function(vec![Type::Int], Type::Unit)),
        ("print_bool", Type::function(vec![Type::Bool], Type::Unit)),
        ("read_int", Type::function(vec![], Type::Int)),
        ("+", int2_int()),
        ("-", int2_int()),
        ("*", int2_int()),
        ("/", int2_int()),
        ("%", int2_int()),
        ("<", int2_bool()),
        (">", int2_bool()),
        ("<=", int2_bool()),
        (">=", int2_bool()),
        ("and", bool2_bool()),
        ("or", bool2_bool()),
        ("unary_-", Type::function(vec![Type::Int], Type::Int)),
        ("unary_not", Type::function(vec![Type::Bool], Type::Bool)),
    ];

    table
        .into_iter()
        .map(|(name, ty)| (name.to_string(), ty))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_builtin_signatures() {
        let builtins = builtin_function_types();
        assert_eq!(
            builtins.get("print_int"),
            Some(&Type::function(vec![Type::Int], Type::Unit))
        );
        assert_eq!(
            builtins.get("read_int"),
            Some(&Type::function(vec![], Type::Int))
        );
    }

    #[test]
    fn test_equality_is_not_a_builtin() {
        let builtins = builtin_function_types();
        assert!(builtins.get("==").is_none());
        assert!(builtins.get("!=").is_none());
    }

    #[test]
    fn test_unary_operators_are_tagged() {
        let builtins = builtin_function_types();
        assert_eq!(
            builtins.get("unary_not"),
            Some(&Type::function(vec![Type::Bool], Type::Bool))
        );
        assert!(builtins.get("not").is_none());
    }
}
