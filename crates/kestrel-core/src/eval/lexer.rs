//! Tokenizer for debugger expressions.

use crate::error::{KestrelError, KestrelResult};

/// Arithmetic operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp
{
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp
{
    fn from_char(c: char) -> Option<Self>
    {
        match c {
            '+' => Some(Self::Add),
            '-' => Some(Self::Sub),
            '*' => Some(Self::Mul),
            '/' => Some(Self::Div),
            _ => None,
        }
    }
}

/// One lexical token. Names borrow from the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a>
{
    Value(u64),
    Register(&'a str),
    Symbol(&'a str),
    Op(BinaryOp),
    OpenParen,
    CloseParen,
    End,
}

fn is_terminator(c: char) -> bool
{
    matches!(c, '+' | '-' | '*' | '/' | '(' | ')' | '@')
}

/// Streaming tokenizer over an expression string.
#[derive(Debug, Clone)]
pub struct Lexer<'a>
{
    source: &'a str,
    position: usize,
}

impl<'a> Lexer<'a>
{
    #[must_use]
    pub fn new(source: &'a str) -> Self
    {
        Self { source, position: 0 }
    }

    fn rest(&self) -> &'a str
    {
        &self.source[self.position..]
    }

    /// Take characters up to the next operator, parenthesis, or `@`.
    fn take_word(&mut self) -> KestrelResult<&'a str>
    {
        let rest = self.rest();
        let length = rest.find(is_terminator).unwrap_or(rest.len());
        let word = &rest[..length];
        if let Some(space) = word.find(char::is_whitespace) {
            return Err(KestrelError::invalid(format!(
                "Unexpected whitespace at offset {} in '{}'",
                self.position + space,
                self.source
            )));
        }
        self.position += length;
        Ok(word)
    }

    /// Produce the next token.
    ///
    /// ## Errors
    ///
    /// Returns [`KestrelError::Invalid`] for malformed numbers, empty register
    /// names, and whitespace between tokens.
    pub fn next_token(&mut self) -> KestrelResult<Token<'a>>
    {
        let Some(first) = self.rest().chars().next() else {
            return Ok(Token::End);
        };

        if let Some(op) = BinaryOp::from_char(first) {
            self.position += 1;
            return Ok(Token::Op(op));
        }

        match first {
            '(' => {
                self.position += 1;
                Ok(Token::OpenParen)
            }
            ')' => {
                self.position += 1;
                Ok(Token::CloseParen)
            }
            '@' => {
                self.position += 1;
                let name = self.take_word()?;
                if name.is_empty() {
                    return Err(KestrelError::invalid("Expected a register name after '@'"));
                }
                Ok(Token::Register(name))
            }
            c if c.is_ascii_digit() => {
                let word = self.take_word()?;
                parse_number(word).map(Token::Value)
            }
            c if c.is_whitespace() => Err(KestrelError::invalid(format!(
                "Unexpected whitespace at offset {} in '{}'",
                self.position, self.source
            ))),
            _ => Ok(Token::Symbol(self.take_word()?)),
        }
    }
}

/// Parse a numeric literal.
///
/// `0x` forces hexadecimal and `0n` forces decimal. Anything else, including
/// a bare leading zero, is hexadecimal.
///
/// ## Errors
///
/// Returns [`KestrelError::Invalid`] for invalid digits, an empty digit run, or overflow.
pub fn parse_number(text: &str) -> KestrelResult<u64>
{
    let (digits, radix) = if let Some(rest) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        (rest, 16)
    } else if let Some(rest) = text.strip_prefix("0n").or_else(|| text.strip_prefix("0N")) {
        (rest, 10)
    } else {
        (text, 16)
    };

    if digits.is_empty() {
        return Err(KestrelError::invalid(format!("Missing digits in '{text}'")));
    }

    u64::from_str_radix(digits, radix).map_err(|e| KestrelError::invalid(format!("Invalid number '{text}': {e}")))
}
