/// Numeric literal accumulation.
///
/// The lexer collects digits into a 128-bit significand so overflow is caught
/// exactly once, here, instead of being re-validated downstream. The final
/// decimal-to-double step is an explicit rescale (significand times a power of
/// the radix) rather than a general-purpose string parser.

/// Raised when the literal cannot become a finite double.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberError {
    /// The 128-bit accumulator or the exponent overflowed.
    Huge,
    /// The rescaled value falls outside the finite double range.
    NotRepresentable,
}

/// Exponents beyond this bound cannot produce a finite, nonzero double in any
/// supported radix.
const EXPONENT_BOUND: i64 = 100_000;

/// A literal part-way through lexing: an integer significand, the radix its
/// digits were written in, and a net exponent in that radix.
#[derive(Debug, Clone, Copy)]
pub struct Accumulator {
    radix: u32,
    significand: u128,
    exponent: i64,
}

impl Accumulator {
    pub fn new(radix: u32) -> Self {
        Accumulator {
            radix,
            significand: 0,
            exponent: 0,
        }
    }

    pub fn radix(&self) -> u32 {
        self.radix
    }

    /// Append one whole-part digit.
    pub fn push_digit(&mut self, digit: u32) -> Result<(), NumberError> {
        self.significand = self
            .significand
            .checked_mul(self.radix as u128)
            .and_then(|widened| widened.checked_add(digit as u128))
            .ok_or(NumberError::Huge)?;
        Ok(())
    }

    /// Append one fraction digit: same accumulation, but the scale shifts
    /// down one radix place.
    pub fn push_fraction_digit(&mut self, digit: u32) -> Result<(), NumberError> {
        self.push_digit(digit)?;
        self.exponent -= 1;
        Ok(())
    }

    /// Apply an explicit exponent (`e`/`p` suffix), already signed.
    pub fn apply_exponent(&mut self, exponent: i64) -> Result<(), NumberError> {
        if exponent.abs() > EXPONENT_BOUND {
            return Err(NumberError::Huge);
        }
        self.exponent = self
            .exponent
            .checked_add(exponent)
            .ok_or(NumberError::Huge)?;
        Ok(())
    }

    /// Rescale to the nearest double. A nonnegative net exponent multiplies
    /// by the radix power; a negative one divides, so that exactly one
    /// rounding step happens whenever both factors are exactly representable.
    pub fn to_double(&self) -> Result<f64, NumberError> {
        if self.significand == 0 {
            return Ok(0.0);
        }
        let significand = self.significand as f64;
        let magnitude = self.exponent.unsigned_abs().min(EXPONENT_BOUND as u64) as i32;
        let scale = (self.radix as f64).powi(magnitude);
        let value = if self.exponent >= 0 {
            significand * scale
        } else {
            significand / scale
        };
        if value.is_finite() {
            Ok(value)
        } else {
            Err(NumberError::NotRepresentable)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decimal(digits: &str) -> Accumulator {
        let mut accumulator = Accumulator::new(10);
        for digit in digits.bytes() {
            accumulator.push_digit((digit - b'0') as u32).unwrap();
        }
        accumulator
    }

    #[test]
    fn whole_decimal() {
        assert_eq!(decimal("42").to_double().unwrap(), 42.0);
    }

    #[test]
    fn fraction_rescales_by_division() {
        let mut accumulator = decimal("3");
        accumulator.push_fraction_digit(1).unwrap();
        accumulator.push_fraction_digit(4).unwrap();
        assert_eq!(accumulator.to_double().unwrap(), 3.14);
    }

    #[test]
    fn tenth_is_correctly_rounded() {
        let mut accumulator = Accumulator::new(10);
        accumulator.push_fraction_digit(1).unwrap();
        assert_eq!(accumulator.to_double().unwrap(), 0.1);
    }

    #[test]
    fn explicit_exponent_combines_with_fraction() {
        let mut accumulator = decimal("25");
        accumulator.push_fraction_digit(5).unwrap();
        accumulator.apply_exponent(2).unwrap();
        assert_eq!(accumulator.to_double().unwrap(), 2550.0);
    }

    #[test]
    fn hexadecimal_digits() {
        let mut accumulator = Accumulator::new(16);
        accumulator.push_digit(0xf).unwrap();
        accumulator.push_digit(0xf).unwrap();
        assert_eq!(accumulator.to_double().unwrap(), 255.0);
    }

    #[test]
    fn significand_overflow_is_huge() {
        let mut accumulator = Accumulator::new(10);
        for _ in 0..38 {
            accumulator.push_digit(9).unwrap();
        }
        assert_eq!(accumulator.push_digit(9), Err(NumberError::Huge));
    }

    #[test]
    fn double_overflow_is_not_representable() {
        let mut accumulator = decimal("1");
        accumulator.apply_exponent(400).unwrap();
        assert_eq!(accumulator.to_double(), Err(NumberError::NotRepresentable));
    }

    #[test]
    fn zero_with_huge_negative_exponent_is_zero() {
        let mut accumulator = Accumulator::new(10);
        accumulator.apply_exponent(-40_000).unwrap();
        assert_eq!(accumulator.to_double().unwrap(), 0.0);
    }
}
