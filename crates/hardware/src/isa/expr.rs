//! Interpreter for instruction semantics written in postfix notation.
//!
//! Each instruction's behavior is an expression such as `\rs1 \rs2 + \rd =`. Tokens are
//! separated by whitespace:
//! 1. **Variables:** `\name` pushes the operand called `name` (or `\pc`).
//! 2. **Constants:** decimal or `0x` integers, and reals containing a `.`.
//! 3. **Operators:** arithmetic, logic, shifts, comparisons and conversions.
//! 4. **Assignment:** `\name =` pops the top value into operand `name`, converted to its type.
//!
//! Integer operands are widened to `i128`, computed, and wrapped back to the promoted type,
//! which makes every RV32 overflow case fall out of ordinary arithmetic.

use std::collections::BTreeSet;
use std::fmt;

use serde::Deserialize;

use crate::common::data::{DataType, Value};
use crate::common::error::RuntimeException;
use crate::config::Capability;

/// Two-operand operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`, low half of the product.
    Mul,
    /// `*h`, high half of the product.
    MulHigh,
    /// `*hsu`, high half with a signed left and unsigned right operand.
    MulHighSignedUnsigned,
    /// `/`
    Div,
    /// `%`
    Rem,
    /// `&`
    And,
    /// `|`
    Or,
    /// `^`
    Xor,
    /// `<<`
    Shl,
    /// `>>`, arithmetic for signed types.
    Shr,
    /// `>>>`, always logical.
    ShrLogical,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `min`
    Min,
    /// `max`
    Max,
}

/// One-operand operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `~`, bitwise complement.
    Not,
    /// `!`, logical negation.
    LogicalNot,
    /// `neg`
    Neg,
    /// `sqrt`
    Sqrt,
    /// `abs`
    Abs,
    /// `int`, `uint`, `long`, `ulong`, `float`, `double`: numeric conversion.
    Convert(DataType),
    /// `bits`: float bit pattern as an integer.
    FloatBits,
    /// `fbits`: integer bit pattern as a float.
    BitsToFloat,
}

/// A parsed token.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Push an operand.
    Variable(String),
    /// Push a literal.
    Constant(Value),
    /// Pop two, push one.
    Binary(BinaryOp),
    /// Pop one, push one.
    Unary(UnaryOp),
    /// Pop one into the named operand.
    Assign(String),
}

impl BinaryOp {
    fn parse(token: &str) -> Option<Self> {
        Some(match token {
            "+" => Self::Add,
            "-" => Self::Sub,
            "*" => Self::Mul,
            "*h" => Self::MulHigh,
            "*hsu" => Self::MulHighSignedUnsigned,
            "/" => Self::Div,
            "%" => Self::Rem,
            "&" => Self::And,
            "|" => Self::Or,
            "^" => Self::Xor,
            "<<" => Self::Shl,
            ">>" => Self::Shr,
            ">>>" => Self::ShrLogical,
            "<" => Self::Lt,
            "<=" => Self::Le,
            ">" => Self::Gt,
            ">=" => Self::Ge,
            "==" => Self::Eq,
            "!=" => Self::Ne,
            "min" => Self::Min,
            "max" => Self::Max,
            _ => return None,
        })
    }

    const fn capability(self) -> Capability {
        match self {
            Self::Add
            | Self::Sub
            | Self::Lt
            | Self::Le
            | Self::Gt
            | Self::Ge
            | Self::Eq
            | Self::Ne
            | Self::Min
            | Self::Max => Capability::Addition,
            Self::And | Self::Or | Self::Xor | Self::Shl | Self::Shr | Self::ShrLogical => {
                Capability::Bitwise
            }
            Self::Mul | Self::MulHigh | Self::MulHighSignedUnsigned => Capability::Multiplication,
            Self::Div | Self::Rem => Capability::Division,
        }
    }
}

impl UnaryOp {
    fn parse(token: &str) -> Option<Self> {
        Some(match token {
            "~" => Self::Not,
            "!" => Self::LogicalNot,
            "neg" => Self::Neg,
            "sqrt" => Self::Sqrt,
            "abs" => Self::Abs,
            "int" => Self::Convert(DataType::Int),
            "uint" => Self::Convert(DataType::UInt),
            "long" => Self::Convert(DataType::Long),
            "ulong" => Self::Convert(DataType::ULong),
            "float" => Self::Convert(DataType::Float),
            "double" => Self::Convert(DataType::Double),
            "bits" => Self::FloatBits,
            "fbits" => Self::BitsToFloat,
            _ => return None,
        })
    }

    const fn capability(self) -> Capability {
        match self {
            Self::Not | Self::LogicalNot => Capability::Bitwise,
            Self::Neg | Self::Abs => Capability::Addition,
            Self::Sqrt | Self::Convert(_) | Self::FloatBits | Self::BitsToFloat => {
                Capability::Special
            }
        }
    }
}

/// Named operand values an expression reads and assigns.
#[derive(Debug, Clone, Default)]
pub struct Environment<'a> {
    vars: Vec<(&'a str, Value)>,
}

impl<'a> Environment<'a> {
    /// Empty environment.
    pub const fn new() -> Self {
        Self { vars: Vec::new() }
    }

    /// Binds `name` to `value`, replacing an earlier binding.
    pub fn bind(&mut self, name: &'a str, value: Value) {
        if let Some(slot) = self.vars.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = value;
        } else {
            self.vars.push((name, value));
        }
    }

    /// Current value of `name`.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.vars.iter().find(|(n, _)| *n == name).map(|(_, v)| *v)
    }

    fn assign(&mut self, name: &str, value: Value) -> Result<(), RuntimeException> {
        let slot = self
            .vars
            .iter_mut()
            .find(|(n, _)| *n == name)
            .ok_or_else(|| RuntimeException::InvalidExpression(format!("unknown target \\{name}")))?;
        slot.1 = value.cast(slot.1.data_type());
        Ok(())
    }
}

/// A parsed postfix expression.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(try_from = "String")]
pub struct Expression {
    source: String,
    tokens: Vec<Token>,
}

/// Error produced when an expression string contains an unknown token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpressionSyntaxError {
    /// The offending token.
    pub token: String,
    /// The full expression.
    pub source: String,
}

impl fmt::Display for ExpressionSyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown token '{}' in '{}'", self.token, self.source)
    }
}

impl std::error::Error for ExpressionSyntaxError {}

impl TryFrom<String> for Expression {
    type Error = ExpressionSyntaxError;

    fn try_from(source: String) -> Result<Self, Self::Error> {
        Self::parse(&source)
    }
}

impl Expression {
    /// Parses a whitespace-separated postfix expression.
    ///
    /// # Errors
    ///
    /// Returns the first token that is neither a variable, a literal nor an operator.
    pub fn parse(source: &str) -> Result<Self, ExpressionSyntaxError> {
        let raw: Vec<&str> = source.split_whitespace().collect();
        let mut tokens = Vec::with_capacity(raw.len());
        let mut i = 0;
        while i < raw.len() {
            let token = raw[i];
            if let Some(name) = token.strip_prefix('\\') {
                if raw.get(i + 1) == Some(&"=") {
                    tokens.push(Token::Assign(name.to_string()));
                    i += 2;
                    continue;
                }
                tokens.push(Token::Variable(name.to_string()));
            } else if let Some(op) = BinaryOp::parse(token) {
                tokens.push(Token::Binary(op));
            } else if let Some(op) = UnaryOp::parse(token) {
                tokens.push(Token::Unary(op));
            } else if let Some(value) = parse_constant(token) {
                tokens.push(Token::Constant(value));
            } else {
                return Err(ExpressionSyntaxError {
                    token: token.to_string(),
                    source: source.to_string(),
                });
            }
            i += 1;
        }
        Ok(Self {
            source: source.to_string(),
            tokens,
        })
    }

    /// The original text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns true if the expression has no tokens.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Names of the operands the expression reads.
    pub fn reads(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().filter_map(|t| match t {
            Token::Variable(name) => Some(name.as_str()),
            _ => None,
        })
    }

    /// Names of the operands the expression assigns.
    pub fn writes(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().filter_map(|t| match t {
            Token::Assign(name) => Some(name.as_str()),
            _ => None,
        })
    }

    /// Operation classes a functional unit needs to evaluate the expression.
    pub fn capabilities(&self) -> BTreeSet<Capability> {
        self.tokens
            .iter()
            .filter_map(|t| match t {
                Token::Binary(op) => Some(op.capability()),
                Token::Unary(op) => Some(op.capability()),
                _ => None,
            })
            .collect()
    }

    /// Evaluates the expression against `env`, applying assignments to it.
    ///
    /// # Returns
    ///
    /// The value left on top of the stack, if any.
    ///
    /// # Errors
    ///
    /// `DivisionByZero` for integer division or remainder by zero; `InvalidExpression`
    /// for stack underflow, unknown operands or operators applied to unsupported types.
    pub fn evaluate(&self, env: &mut Environment<'_>) -> Result<Option<Value>, RuntimeException> {
        let mut stack: Vec<Value> = Vec::with_capacity(self.tokens.len());
        for token in &self.tokens {
            match token {
                Token::Variable(name) => {
                    let value = env.get(name).ok_or_else(|| {
                        RuntimeException::InvalidExpression(format!("unknown operand \\{name}"))
                    })?;
                    stack.push(value);
                }
                Token::Constant(value) => stack.push(*value),
                Token::Binary(op) => {
                    let b = pop(&mut stack, &self.source)?;
                    let a = pop(&mut stack, &self.source)?;
                    stack.push(apply_binary(*op, a, b)?);
                }
                Token::Unary(op) => {
                    let a = pop(&mut stack, &self.source)?;
                    stack.push(apply_unary(*op, a)?);
                }
                Token::Assign(name) => {
                    let value = pop(&mut stack, &self.source)?;
                    env.assign(name, value)?;
                }
            }
        }
        Ok(stack.pop())
    }
}

fn pop(stack: &mut Vec<Value>, source: &str) -> Result<Value, RuntimeException> {
    stack
        .pop()
        .ok_or_else(|| RuntimeException::InvalidExpression(format!("stack underflow in '{source}'")))
}

fn parse_constant(token: &str) -> Option<Value> {
    if token.contains('.') {
        return token.parse::<f32>().ok().map(Value::Float);
    }
    let (negative, digits) = match token.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, token),
    };
    let magnitude = if let Some(hex) = digits.strip_prefix("0x") {
        i64::from_str_radix(hex, 16).ok()?
    } else {
        digits.parse::<i64>().ok()?
    };
    let value = if negative { -magnitude } else { magnitude };
    Some(i32::try_from(value).map_or(Value::Long(value), Value::Int))
}

/// Common type of two operands: float beats integer, 64 bits beat 32, signedness follows
/// the left operand.
fn promote(a: DataType, b: DataType) -> DataType {
    if a == DataType::Double || b == DataType::Double {
        return DataType::Double;
    }
    if a == DataType::Float || b == DataType::Float {
        return DataType::Float;
    }
    let wide = matches!(a, DataType::Long | DataType::ULong)
        || matches!(b, DataType::Long | DataType::ULong);
    match (wide, a.is_signed()) {
        (true, true) => DataType::Long,
        (true, false) => DataType::ULong,
        (false, true) => DataType::Int,
        (false, false) => DataType::UInt,
    }
}

fn apply_binary(op: BinaryOp, a: Value, b: Value) -> Result<Value, RuntimeException> {
    let ty = promote(a.data_type(), b.data_type());
    if ty.is_float() {
        return float_binary(op, a.as_f64(), b.as_f64(), ty);
    }
    let bits = ty.bits();
    let x = a.cast(ty).as_i128();
    let y = b.cast(ty).as_i128();
    let shift = (y as u32) & (bits - 1);
    let mask = (1i128 << bits) - 1;
    let raw = match op {
        BinaryOp::Add => x + y,
        BinaryOp::Sub => x - y,
        BinaryOp::Mul => x.wrapping_mul(y),
        BinaryOp::MulHigh => {
            if ty.is_signed() {
                (x * y) >> bits
            } else {
                ((x as u128 * y as u128) >> bits) as i128
            }
        }
        BinaryOp::MulHighSignedUnsigned => {
            let y = b.cast(ty.unsigned()).as_i128();
            (x * y) >> bits
        }
        BinaryOp::Div => {
            if y == 0 {
                return Err(RuntimeException::DivisionByZero);
            }
            x / y
        }
        BinaryOp::Rem => {
            if y == 0 {
                return Err(RuntimeException::DivisionByZero);
            }
            x % y
        }
        BinaryOp::And => x & y,
        BinaryOp::Or => x | y,
        BinaryOp::Xor => x ^ y,
        BinaryOp::Shl => x << shift,
        BinaryOp::Shr => x >> shift,
        BinaryOp::ShrLogical => (x & mask) >> shift,
        BinaryOp::Lt => return Ok(Value::Bool(x < y)),
        BinaryOp::Le => return Ok(Value::Bool(x <= y)),
        BinaryOp::Gt => return Ok(Value::Bool(x > y)),
        BinaryOp::Ge => return Ok(Value::Bool(x >= y)),
        BinaryOp::Eq => return Ok(Value::Bool(x == y)),
        BinaryOp::Ne => return Ok(Value::Bool(x != y)),
        BinaryOp::Min => x.min(y),
        BinaryOp::Max => x.max(y),
    };
    Ok(Value::from_i128(ty, raw))
}

fn float_binary(op: BinaryOp, x: f64, y: f64, ty: DataType) -> Result<Value, RuntimeException> {
    let raw = match op {
        BinaryOp::Add => x + y,
        BinaryOp::Sub => x - y,
        BinaryOp::Mul => x * y,
        BinaryOp::Div => x / y,
        BinaryOp::Rem => x % y,
        BinaryOp::Min => x.min(y),
        BinaryOp::Max => x.max(y),
        BinaryOp::Lt => return Ok(Value::Bool(x < y)),
        BinaryOp::Le => return Ok(Value::Bool(x <= y)),
        BinaryOp::Gt => return Ok(Value::Bool(x > y)),
        BinaryOp::Ge => return Ok(Value::Bool(x >= y)),
        BinaryOp::Eq => return Ok(Value::Bool(x == y)),
        BinaryOp::Ne => return Ok(Value::Bool(x != y)),
        other => {
            return Err(RuntimeException::InvalidExpression(format!(
                "{other:?} is not defined for floating point operands"
            )));
        }
    };
    Ok(Value::Double(raw).cast(ty))
}

fn apply_unary(op: UnaryOp, a: Value) -> Result<Value, RuntimeException> {
    let ty = a.data_type();
    Ok(match op {
        UnaryOp::Not => {
            if ty.is_float() {
                return Err(RuntimeException::InvalidExpression(
                    "~ is not defined for floating point operands".to_string(),
                ));
            }
            let ty = if ty == DataType::Bool { DataType::Int } else { ty };
            Value::from_i128(ty, !a.as_i128())
        }
        UnaryOp::LogicalNot => Value::Bool(!a.is_truthy()),
        UnaryOp::Neg => {
            if ty.is_float() {
                Value::Double(-a.as_f64()).cast(ty)
            } else {
                Value::from_i128(ty, -a.as_i128())
            }
        }
        UnaryOp::Abs => {
            if ty.is_float() {
                Value::Double(a.as_f64().abs()).cast(ty)
            } else {
                Value::from_i128(ty, a.as_i128().abs())
            }
        }
        UnaryOp::Sqrt => {
            let target = if ty.is_float() { ty } else { DataType::Double };
            Value::Double(a.as_f64().sqrt()).cast(target)
        }
        UnaryOp::Convert(target) => a.cast(target),
        UnaryOp::FloatBits => match a {
            Value::Float(f) => Value::Int(f.to_bits() as i32),
            Value::Double(d) => Value::Long(d.to_bits() as i64),
            other => other,
        },
        UnaryOp::BitsToFloat => match a {
            Value::Long(_) | Value::ULong(_) => Value::Double(f64::from_bits(a.to_bits())),
            Value::Float(_) | Value::Double(_) => a,
            other => Value::Float(f32::from_bits(other.to_bits() as u32)),
        },
    })
}
