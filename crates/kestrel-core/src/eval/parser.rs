//! Recursive-descent parser producing an expression tree.
//!
//! ```text
//! expr   = term { ("+"|"-") term }
//! term   = factor { ("*"|"/") factor }
//! factor = number | "@" regname | symbol | "(" expr ")"
//! ```

use super::lexer::{BinaryOp, Lexer, Token};
use crate::error::{KestrelError, KestrelResult};

/// Parsed expression. Leaves are resolved only at evaluation time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr
{
    Value(u64),
    Register(String),
    Symbol(String),
    Binary
    {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

struct Parser<'a>
{
    lexer: Lexer<'a>,
    lookahead: Token<'a>,
    source: &'a str,
}

impl<'a> Parser<'a>
{
    fn new(source: &'a str) -> KestrelResult<Self>
    {
        let mut lexer = Lexer::new(source);
        let lookahead = lexer.next_token()?;
        Ok(Self {
            lexer,
            lookahead,
            source,
        })
    }

    fn advance(&mut self) -> KestrelResult<Token<'a>>
    {
        let next = self.lexer.next_token()?;
        Ok(std::mem::replace(&mut self.lookahead, next))
    }

    fn expr(&mut self) -> KestrelResult<Expr>
    {
        let mut left = self.term()?;
        while let Token::Op(op @ (BinaryOp::Add | BinaryOp::Sub)) = self.lookahead {
            self.advance()?;
            let right = self.term()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn term(&mut self) -> KestrelResult<Expr>
    {
        let mut left = self.factor()?;
        while let Token::Op(op @ (BinaryOp::Mul | BinaryOp::Div)) = self.lookahead {
            self.advance()?;
            let right = self.factor()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn factor(&mut self) -> KestrelResult<Expr>
    {
        match self.advance()? {
            Token::Value(value) => Ok(Expr::Value(value)),
            Token::Register(name) => Ok(Expr::Register(name.to_string())),
            Token::Symbol(name) => Ok(Expr::Symbol(name.to_string())),
            Token::OpenParen => {
                let inner = self.expr()?;
                match self.advance()? {
                    Token::CloseParen => Ok(inner),
                    other => Err(self.unexpected(other, "')'")),
                }
            }
            other => Err(self.unexpected(other, "a number, register, symbol, or '('")),
        }
    }

    fn unexpected(&self, token: Token<'_>, wanted: &str) -> KestrelError
    {
        let found = match token {
            Token::End => "end of input".to_string(),
            Token::Op(op) => format!("operator {op:?}"),
            Token::CloseParen => "')'".to_string(),
            Token::OpenParen => "'('".to_string(),
            other => format!("{other:?}"),
        };
        KestrelError::invalid(format!("Expected {wanted} but found {found} in '{}'", self.source))
    }
}

/// Parse an expression string into a tree.
///
/// ## Errors
///
/// Returns [`KestrelError::Invalid`] for syntax errors, including trailing
/// tokens after a complete expression.
pub fn parse(source: &str) -> KestrelResult<Expr>
{
    let mut parser = Parser::new(source)?;
    let expr = parser.expr()?;
    match parser.lookahead {
        Token::End => Ok(expr),
        other => Err(parser.unexpected(other, "end of input")),
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr
    {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    #[test]
    fn test_precedence()
    {
        assert_eq!(
            parse("1+2*3").unwrap(),
            binary(
                BinaryOp::Add,
                Expr::Value(1),
                binary(BinaryOp::Mul, Expr::Value(2), Expr::Value(3))
            )
        );
    }

    #[test]
    fn test_left_associative_subtraction()
    {
        assert_eq!(
            parse("8-2-1").unwrap(),
            binary(
                BinaryOp::Sub,
                binary(BinaryOp::Sub, Expr::Value(8), Expr::Value(2)),
                Expr::Value(1)
            )
        );
    }

    #[test]
    fn test_parentheses_override_precedence()
    {
        assert_eq!(
            parse("(@eax+1)*2").unwrap(),
            binary(
                BinaryOp::Mul,
                binary(BinaryOp::Add, Expr::Register("eax".to_string()), Expr::Value(1)),
                Expr::Value(2)
            )
        );
    }

    #[test]
    fn test_syntax_errors()
    {
        for source in ["", "1+", "(1", "1)", "*2", "()", "1 2"] {
            assert!(matches!(parse(source), Err(KestrelError::Invalid(_))), "{source}");
        }
    }
}
