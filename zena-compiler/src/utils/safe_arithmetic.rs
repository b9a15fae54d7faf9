// Safe arithmetic operations to prevent integer overflow and truncation bugs
//
// This module provides checked arithmetic operations and safe type conversions
// to prevent security vulnerabilities and undefined behavior.

use std::fmt;

/// Error type for arithmetic operations
#[derive(Debug, Clone)]
pub struct ArithmeticError {
    pub message: String,
}

impl fmt::Display for ArithmeticError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Arithmetic error: {}", self.message)
    }
}

impl std::error::Error for ArithmeticError {}

impl From<ArithmeticError> for String {
    fn from(err: ArithmeticError) -> String {
        err.message
    }
}

/// Trait providing checked arithmetic operations
pub trait CheckedArithmetic: Sized {
    /// Safely add two values, returning error on overflow
    fn safe_add(&self, rhs: Self) -> Result<Self, ArithmeticError>;
    
    /// Safely multiply two values, returning error on overflow
    fn safe_mul(&self, rhs: Self) -> Result<Self, ArithmeticError>;
    
    /// Safely subtract two values, returning error on overflow
    fn safe_sub(&self, rhs: Self) -> Result<Self, ArithmeticError>;
}

/// Trait for safe type conversions
pub trait SafeCast<T> {
    /// Safely cast to target type, returning error if value doesn't fit
    fn safe_cast(&self) -> Result<T, ArithmeticError>;
}

// Implementations for usize
impl CheckedArithmetic for usize {
    fn safe_add(&self, rhs: Self) -> Result<Self, ArithmeticError> {
        self.checked_add(rhs).ok_or_else(|| ArithmeticError {
            message: format!("Overflow in addition: {} + {}", self, rhs),
        })
    }
    
    fn safe_mul(&self, rhs: Self) -> Result<Self, ArithmeticError> {
        self.checked_mul(rhs).ok_or_else(|| ArithmeticError {
            message: format!("Overflow in multiplication: {} * {}", self, rhs),
        })
    }
    
    fn safe_sub(&self, rhs: Self) -> Result<Self, ArithmeticError> {
        self.checked_sub(rhs).ok_or_else(|| ArithmeticError {
            message: format!("Overflow in subtraction: {} - {}", self, rhs),
        })
    }
}

impl SafeCast<u32> for usize {
    fn safe_cast(&self) -> Result<u32, ArithmeticError> {
        u32::try_from(*self).map_err(|_| ArithmeticError {
            message: format!("Cannot cast {} (usize) to u32: value too large", self),
        })
    }
}

impl SafeCast<i32> for usize {
    fn safe_cast(&self) -> Result<i32, ArithmeticError> {
        i32::try_from(*self).map_err(|_| ArithmeticError {
            message: format!("Cannot cast {} (usize) to i32: value too large", self),
        })
    }
}

// Implementations for u32
impl CheckedArithmetic for u32 {
    fn safe_add(&self, rhs: Self) -> Result<Self, ArithmeticError> {
        self.checked_add(rhs).ok_or_else(|| ArithmeticError {
            message: format!("Overflow in addition: {} + {}", self, rhs),
        })
    }
    
    fn safe_mul(&self, rhs: Self) -> Result<Self, ArithmeticError> {
        self.checked_mul(rhs).ok_or_else(|| ArithmeticError {
            message: format!("Overflow in multiplication: {} * {}", self, rhs),
        })
    }
    
    fn safe_sub(&self, rhs: Self) -> Result<Self, ArithmeticError> {
        self.checked_sub(rhs).ok_or_else(|| ArithmeticError {
            message: format!("Overflow in subtraction: {} - {}", self, rhs),
        })
    }
}

impl SafeCast<usize> for u32 {
    fn safe_cast(&self) -> Result<usize, ArithmeticError> {
        Ok(*self as usize) // u32 always fits in usize on 32-bit+ platforms
    }
}

/// Helper function to safely compute a local-variable index with offset.
///
/// `wasm_encoder` function bodies address locals by `u32`, but parameter
/// lists are built from Rust collections that count in `usize`. This adds
/// an offset (for the receiver local, capture-context local, etc.) to a
/// loop index before narrowing to `u32`.
pub fn safe_param_index(index: usize, offset: usize) -> Result<u32, ArithmeticError> {
    index.safe_add(offset)?.safe_cast()
}

/// Safely cast a `usize` length to the `u32` array size `wasm_encoder`'s
/// `ArrayType` expects.
pub fn safe_array_size(size: usize) -> Result<u32, ArithmeticError> {
    size.safe_cast()
}

/// Safely cast a `usize` field position to the `u32` struct field index
/// `wasm_encoder`'s `StructType`/`struct.get` instructions expect.
pub fn safe_field_index(index: usize) -> Result<u32, ArithmeticError> {
    index.safe_cast()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_add_success() {
        assert_eq!(5usize.safe_add(3).unwrap(), 8);
        assert_eq!(100u32.safe_add(50).unwrap(), 150);
    }

    #[test]
    fn test_safe_add_overflow() {
        let result = usize::MAX.safe_add(1);
        assert!(result.is_err());
        assert!(result.unwrap_err().message.contains("Overflow"));
    }

    #[test]
    fn test_safe_cast_u32_success() {
        let value = 42usize;
        let result: u32 = value.safe_cast().unwrap();
        assert_eq!(result, 42u32);
    }

    #[test]
    fn test_safe_cast_u32_overflow() {
        let value = (u32::MAX as usize) + 1;
        let result: Result<u32, _> = value.safe_cast();
        assert!(result.is_err());
    }

    #[test]
    fn test_safe_param_index() {
        assert_eq!(safe_param_index(0, 0).unwrap(), 0);
        assert_eq!(safe_param_index(5, 1).unwrap(), 6);
        assert_eq!(safe_param_index(10, 2).unwrap(), 12);
    }

    #[test]
    fn test_safe_param_index_overflow() {
        let result = safe_param_index(usize::MAX, 1);
        assert!(result.is_err());
    }
}
