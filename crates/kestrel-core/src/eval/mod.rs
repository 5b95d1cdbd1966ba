//! # Expression Evaluator
//!
//! Unsigned 64-bit arithmetic over literals, registers, and symbols.
//!
//! Evaluation is two passes: [`parser::parse`] builds an [`Expr`] tree and
//! [`evaluate`] walks it post-order, asking an [`Environment`] for register
//! and symbol values as leaves are reached. Arithmetic wraps.
//!
//! ## Example
//!
//! ```rust
//! use kestrel_core::eval::{evaluate_str, Environment};
//! use kestrel_core::KestrelResult;
//!
//! struct Fixed;
//!
//! impl Environment for Fixed
//! {
//!     fn register(&self, _name: &str) -> KestrelResult<u64> { Ok(0x10) }
//!     fn symbol(&self, _name: &str) -> KestrelResult<u64> { Ok(0x1000) }
//! }
//!
//! assert_eq!(evaluate_str(&Fixed, "@eax*2+main").unwrap(), 0x1020);
//! assert_eq!(evaluate_str(&Fixed, "0n10").unwrap(), 10);
//! ```

pub mod lexer;
pub mod parser;

pub use lexer::{parse_number, BinaryOp};
pub use parser::{parse, Expr};

use crate::error::{KestrelError, KestrelResult};

/// Source of values for the leaves of an expression.
pub trait Environment
{
    /// Value of a register named without its `@` prefix.
    ///
    /// ## Errors
    ///
    /// Returns [`KestrelError::NotFound`] for unknown registers.
    fn register(&self, name: &str) -> KestrelResult<u64>;

    /// Value of a possibly module-qualified symbol.
    ///
    /// ## Errors
    ///
    /// Implementation-defined; see [`crate::context::DebuggerContext`].
    fn symbol(&self, name: &str) -> KestrelResult<u64>;
}

/// Evaluate a parsed expression.
///
/// ## Errors
///
/// Returns [`KestrelError::Invalid`] on division by zero, plus whatever the
/// environment reports for unresolved leaves.
pub fn evaluate(environment: &dyn Environment, expr: &Expr) -> KestrelResult<u64>
{
    match expr {
        Expr::Value(value) => Ok(*value),
        Expr::Register(name) => environment.register(name),
        Expr::Symbol(name) => environment.symbol(name),
        Expr::Binary { op, left, right } => {
            let left = evaluate(environment, left)?;
            let right = evaluate(environment, right)?;
            match op {
                BinaryOp::Add => Ok(left.wrapping_add(right)),
                BinaryOp::Sub => Ok(left.wrapping_sub(right)),
                BinaryOp::Mul => Ok(left.wrapping_mul(right)),
                BinaryOp::Div => left
                    .checked_div(right)
                    .ok_or_else(|| KestrelError::invalid("Division by zero")),
            }
        }
    }
}

/// Parse and evaluate `source` in one step.
///
/// ## Errors
///
/// See [`parse`] and [`evaluate`].
pub fn evaluate_str(environment: &dyn Environment, source: &str) -> KestrelResult<u64>
{
    let expr = parse(source)?;
    let value = evaluate(environment, &expr)?;
    tracing::trace!(source, value, "evaluated expression");
    Ok(value)
}

#[cfg(test)]
mod tests
{
    use super::*;

    struct Registers;

    impl Environment for Registers
    {
        fn register(&self, name: &str) -> KestrelResult<u64>
        {
            match name.to_ascii_lowercase().as_str() {
                "eax" => Ok(5),
                _ => Err(KestrelError::not_found(format!("Register @{name}"))),
            }
        }

        fn symbol(&self, name: &str) -> KestrelResult<u64>
        {
            Err(KestrelError::not_found(format!("Symbol {name}")))
        }
    }

    #[test]
    fn test_arithmetic_wraps()
    {
        assert_eq!(evaluate_str(&Registers, "0-1").unwrap(), u64::MAX);
        assert_eq!(evaluate_str(&Registers, "0n7/2").unwrap(), 3);
    }

    #[test]
    fn test_division_by_zero()
    {
        assert!(matches!(evaluate_str(&Registers, "@eax/(1-1)"), Err(KestrelError::Invalid(_))));
    }

    #[test]
    fn test_unknown_leaves()
    {
        assert!(matches!(evaluate_str(&Registers, "@EAX+@zz"), Err(KestrelError::NotFound(_))));
        assert!(matches!(evaluate_str(&Registers, "missing"), Err(KestrelError::NotFound(_))));
    }
}
