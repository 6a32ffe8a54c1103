//! Typed values carried by registers, operands and expressions.
//!
//! Register storage is an untyped 64-bit container; the type comes from the operand
//! that reads or writes it. This module provides:
//! 1. **Data Types:** The scalar types an instruction operand may declare.
//! 2. **Values:** A tagged scalar used while interpreting instruction semantics.
//! 3. **Conversions:** Numeric casts, bit reinterpretation and container packing.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Scalar type of an operand or register.
///
/// `Int` and `UInt` are 32 bits wide (RV32 registers); `Long`/`ULong` are 64 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// Signed 32-bit integer.
    #[default]
    Int,
    /// Unsigned 32-bit integer.
    #[serde(alias = "uInt", alias = "unsigned")]
    UInt,
    /// Signed 64-bit integer.
    Long,
    /// Unsigned 64-bit integer.
    #[serde(alias = "uLong")]
    ULong,
    /// IEEE-754 single precision.
    Float,
    /// IEEE-754 double precision.
    Double,
    /// Boolean, stored as 0 or 1.
    #[serde(alias = "boolean")]
    Bool,
}

impl DataType {
    /// Returns true for `Float` and `Double`.
    pub const fn is_float(self) -> bool {
        matches!(self, Self::Float | Self::Double)
    }

    /// Returns true for types interpreted with two's complement sign.
    pub const fn is_signed(self) -> bool {
        matches!(self, Self::Int | Self::Long | Self::Bool)
    }

    /// Width in bits of the type.
    pub const fn bits(self) -> u32 {
        match self {
            Self::Int | Self::UInt | Self::Float => 32,
            Self::Long | Self::ULong | Self::Double => 64,
            Self::Bool => 1,
        }
    }

    /// The unsigned counterpart of an integer type; other types are returned unchanged.
    pub const fn unsigned(self) -> Self {
        match self {
            Self::Int | Self::Bool => Self::UInt,
            Self::Long => Self::ULong,
            other => other,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Int => "int",
            Self::UInt => "uint",
            Self::Long => "long",
            Self::ULong => "ulong",
            Self::Float => "float",
            Self::Double => "double",
            Self::Bool => "bool",
        };
        f.write_str(name)
    }
}

/// A typed scalar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    /// Signed 32-bit integer.
    Int(i32),
    /// Unsigned 32-bit integer.
    UInt(u32),
    /// Signed 64-bit integer.
    Long(i64),
    /// Unsigned 64-bit integer.
    ULong(u64),
    /// Single precision float.
    Float(f32),
    /// Double precision float.
    Double(f64),
    /// Boolean.
    Bool(bool),
}

impl Value {
    /// Decodes a register container as a value of type `ty`.
    ///
    /// Only the low `ty.bits()` bits of the container are significant.
    pub fn from_bits(ty: DataType, bits: u64) -> Self {
        match ty {
            DataType::Int => Self::Int(bits as u32 as i32),
            DataType::UInt => Self::UInt(bits as u32),
            DataType::Long => Self::Long(bits as i64),
            DataType::ULong => Self::ULong(bits),
            DataType::Float => Self::Float(f32::from_bits(bits as u32)),
            DataType::Double => Self::Double(f64::from_bits(bits)),
            DataType::Bool => Self::Bool(bits & 1 != 0),
        }
    }

    /// Encodes the value into a register container.
    ///
    /// 32-bit types occupy the low half; the high half is zero.
    pub fn to_bits(self) -> u64 {
        match self {
            Self::Int(v) => u64::from(v as u32),
            Self::UInt(v) => u64::from(v),
            Self::Long(v) => v as u64,
            Self::ULong(v) => v,
            Self::Float(v) => u64::from(v.to_bits()),
            Self::Double(v) => v.to_bits(),
            Self::Bool(v) => u64::from(v),
        }
    }

    /// The type tag of the value.
    pub const fn data_type(self) -> DataType {
        match self {
            Self::Int(_) => DataType::Int,
            Self::UInt(_) => DataType::UInt,
            Self::Long(_) => DataType::Long,
            Self::ULong(_) => DataType::ULong,
            Self::Float(_) => DataType::Float,
            Self::Double(_) => DataType::Double,
            Self::Bool(_) => DataType::Bool,
        }
    }

    /// Integer view, sign- or zero-extended according to the value's type.
    ///
    /// Floats truncate toward zero and saturate.
    pub fn as_i128(self) -> i128 {
        match self {
            Self::Int(v) => i128::from(v),
            Self::UInt(v) => i128::from(v),
            Self::Long(v) => i128::from(v),
            Self::ULong(v) => i128::from(v),
            Self::Float(v) => v as i128,
            Self::Double(v) => v as i128,
            Self::Bool(v) => i128::from(v),
        }
    }

    /// Floating point view of the value.
    pub fn as_f64(self) -> f64 {
        match self {
            Self::Int(v) => f64::from(v),
            Self::UInt(v) => f64::from(v),
            Self::Long(v) => v as f64,
            Self::ULong(v) => v as f64,
            Self::Float(v) => f64::from(v),
            Self::Double(v) => v,
            Self::Bool(v) => f64::from(u8::from(v)),
        }
    }

    /// Returns true for any non-zero value.
    pub fn is_truthy(self) -> bool {
        match self {
            Self::Float(v) => v != 0.0,
            Self::Double(v) => v != 0.0,
            Self::Bool(v) => v,
            other => other.as_i128() != 0,
        }
    }

    /// Builds an integer value of type `ty` from a wide intermediate, wrapping to its width.
    pub fn from_i128(ty: DataType, raw: i128) -> Self {
        match ty {
            DataType::Int => Self::Int(raw as i32),
            DataType::UInt => Self::UInt(raw as u32),
            DataType::Long => Self::Long(raw as i64),
            DataType::ULong => Self::ULong(raw as u64),
            DataType::Float => Self::Float(raw as f32),
            DataType::Double => Self::Double(raw as f64),
            DataType::Bool => Self::Bool(raw != 0),
        }
    }

    /// Numeric conversion to `ty`.
    ///
    /// Integer narrowing wraps, float to integer truncates and saturates, integer to
    /// float rounds to nearest.
    pub fn cast(self, ty: DataType) -> Self {
        if self.data_type() == ty {
            return self;
        }
        match ty {
            DataType::Float => Self::Float(self.as_f64() as f32),
            DataType::Double => Self::Double(self.as_f64()),
            DataType::Bool => Self::Bool(self.is_truthy()),
            _ => Self::from_i128(ty, self.as_i128()),
        }
    }

    /// Interprets the value as a byte address in a 32-bit address space.
    ///
    /// Negative signed values are reported as `Err` with the offending number.
    pub fn as_address(self) -> Result<u64, i64> {
        match self {
            Self::Int(v) if v < 0 => Err(i64::from(v)),
            Self::Long(v) if v < 0 => Err(v),
            other => Ok(other.as_i128() as u64),
        }
    }

    /// Interprets the value as a code address: the low 32 bits, unsigned.
    pub fn as_code_address(self) -> u64 {
        u64::from(self.as_i128() as u32)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::UInt(v) => write!(f, "{v}"),
            Self::Long(v) => write!(f, "{v}"),
            Self::ULong(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_round_trips_through_container() {
        let v = Value::Int(-5);
        assert_eq!(v.to_bits(), 0xFFFF_FFFB);
        assert_eq!(Value::from_bits(DataType::Int, v.to_bits()), v);
    }

    #[test]
    fn test_cast_wraps_when_narrowing() {
        assert_eq!(Value::Long(0x1_0000_0001).cast(DataType::Int), Value::Int(1));
        assert_eq!(Value::Int(-1).cast(DataType::UInt), Value::UInt(u32::MAX));
    }

    #[test]
    fn test_float_bits_reinterpretation() {
        let bits = Value::Float(1.5).to_bits();
        assert_eq!(bits, u64::from(1.5f32.to_bits()));
        assert_eq!(Value::from_bits(DataType::Float, bits), Value::Float(1.5));
    }

    #[test]
    fn test_negative_address_is_rejected() {
        assert_eq!(Value::Int(-4).as_address(), Err(-4));
        assert_eq!(Value::Int(64).as_address(), Ok(64));
        assert_eq!(Value::Int(-16).as_code_address(), 0xFFFF_FFF0);
    }
}
