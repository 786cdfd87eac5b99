use std::{fmt, ops};

#[cfg(feature = "serde")]
mod serde_support;

/// The widest bit-vector that can be represented.
pub const MAX_WIDTH: u32 = 64;

/// A fixed-width two's-complement integer.
///
/// The width is carried at runtime and never changes for a given value. The
/// stored magnitude is always canonicalized to `width` bits: every
/// constructor and every operation reduces its result modulo `2^width`, so a
/// `BitVector` never carries bits above its declared width.
///
/// Operations that combine two vectors of the same width (`&`, `|`, `^`, `+`,
/// `-`, the multiply and divide families, comparisons) panic if the widths
/// differ. That is a bug in whoever built the operation, not a runtime
/// condition; the expression evaluator checks widths before it gets here.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct BitVector {
    width: u32,
    bits: u64,
}

/// Returns a bit mask with 1 for the low `width` bits.
pub(crate) const fn mask(width: u32) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1 << width) - 1
    }
}

impl BitVector {
    /// Make a vector of `width` bits from `value`, silently discarding any
    /// bits above `width`.
    pub const fn new(width: u32, value: u64) -> BitVector {
        assert!(width <= MAX_WIDTH, "BitVector wider than 64 bits");
        BitVector {
            width,
            bits: value & mask(width),
        }
    }
    /// Make a vector of `width` bits from a signed integer, keeping the low
    /// `width` bits of its two's-complement representation.
    pub const fn from_i64(width: u32, value: i64) -> BitVector {
        BitVector::new(width, value as u64)
    }
    pub const fn zero(width: u32) -> BitVector {
        BitVector::new(width, 0)
    }
    /// All bits set. As a signed value this is -1 (for nonzero widths).
    pub const fn ones(width: u32) -> BitVector {
        BitVector::new(width, u64::MAX)
    }
    /// A one-bit vector: 1 for true, 0 for false.
    pub const fn from_bool(value: bool) -> BitVector {
        BitVector::new(1, value as u64)
    }
    pub const fn width(self) -> u32 {
        self.width
    }
    /// The stored magnitude.
    pub const fn unsigned(self) -> u64 {
        self.bits
    }
    /// The two's-complement interpretation: if bit `width-1` is set, the
    /// value is `magnitude - 2^width`.
    pub const fn signed(self) -> i64 {
        if self.width == 0 {
            return 0;
        }
        let spare = 64 - self.width;
        ((self.bits << spare) as i64) >> spare
    }
    /// Returns whether bit `index` (0 = least significant) is set. Indices
    /// at or beyond the width always read as false.
    pub const fn bit(self, index: u32) -> bool {
        index < self.width && (self.bits >> index) & 1 == 1
    }
    pub const fn count_ones(self) -> u32 {
        self.bits.count_ones()
    }
    pub const fn is_zero(self) -> bool {
        self.bits == 0
    }
    fn check_width(self, rhs: BitVector, what: &str) {
        assert_eq!(
            self.width, rhs.width,
            "{what} of a {}-bit and a {}-bit vector",
            self.width, rhs.width
        );
    }

    /// Shift by a signed amount: positive shifts left, negative shifts right.
    /// Both directions are logical (zero-filling). Bits pushed past either
    /// end are gone.
    pub fn shift(self, amount: i64) -> BitVector {
        if amount >= 0 {
            self.shift_left(amount as u64)
        } else {
            self.shift_right_logical(amount.unsigned_abs())
        }
    }
    /// Logical left shift. Amounts of `width` or more give zero.
    pub fn shift_left(self, amount: u64) -> BitVector {
        if amount >= self.width as u64 {
            BitVector::zero(self.width)
        } else {
            BitVector::new(self.width, self.bits << amount)
        }
    }
    /// Zero-filling right shift. Amounts of `width` or more give zero.
    pub fn shift_right_logical(self, amount: u64) -> BitVector {
        if amount >= self.width as u64 {
            BitVector::zero(self.width)
        } else {
            BitVector::new(self.width, self.bits >> amount)
        }
    }
    /// Sign-filling right shift. Amounts of `width` or more give all copies
    /// of the sign bit.
    pub fn shift_right_arithmetic(self, amount: u64) -> BitVector {
        if self.width == 0 {
            return self;
        }
        let amount = amount.min(self.width as u64 - 1);
        BitVector::from_i64(self.width, self.signed() >> amount)
    }
    /// Rotate left by `amount`, which is first reduced modulo the width (so
    /// negative amounts rotate right). Rotating a zero-width vector does
    /// nothing.
    pub fn rotate(self, amount: i64) -> BitVector {
        if self.width == 0 {
            return self;
        }
        let amount = amount.rem_euclid(self.width as i64);
        self.shift(amount) | self.shift(amount - self.width as i64)
    }

    /// Concatenate: `self` supplies the high-order bits, `low` the low-order
    /// bits. The result is `self.width() + low.width()` bits wide.
    pub fn concat(self, low: BitVector) -> BitVector {
        let width = self.width + low.width;
        assert!(width <= MAX_WIDTH, "concatenation wider than 64 bits");
        let high = self.bits.checked_shl(low.width).unwrap_or(0);
        BitVector::new(width, high | low.bits)
    }
    /// The `width`-bit slice starting at bit `low`. There is no bounds
    /// checking: positions past the source width read as zero.
    pub fn extract(self, low: u32, width: u32) -> BitVector {
        BitVector::new(width, self.bits.checked_shr(low).unwrap_or(0))
    }
    /// Keep the low `width` bits.
    pub fn truncate(self, width: u32) -> BitVector {
        assert!(width <= self.width, "truncation must not widen");
        BitVector::new(width, self.bits)
    }
    /// Widen, filling the new high bits with zero.
    pub fn zero_extend(self, width: u32) -> BitVector {
        assert!(width >= self.width, "zero extension must not narrow");
        BitVector::new(width, self.bits)
    }
    /// Widen, filling the new high bits with copies of the sign bit.
    pub fn sign_extend(self, width: u32) -> BitVector {
        assert!(width >= self.width, "sign extension must not narrow");
        BitVector::from_i64(width, self.signed())
    }

    /// Low half of the product (MUL).
    pub fn mul(self, rhs: BitVector) -> BitVector {
        self.check_width(rhs, "multiplication");
        BitVector::new(self.width, self.bits.wrapping_mul(rhs.bits))
    }
    /// High half of the signed × signed product (MULH).
    pub fn mulh_ss(self, rhs: BitVector) -> BitVector {
        self.check_width(rhs, "multiplication");
        let product = self.signed() as i128 * rhs.signed() as i128;
        BitVector::new(self.width, (product >> self.width) as u64)
    }
    /// High half of the unsigned × unsigned product (MULHU).
    pub fn mulh_uu(self, rhs: BitVector) -> BitVector {
        self.check_width(rhs, "multiplication");
        let product = self.bits as u128 * rhs.bits as u128;
        BitVector::new(self.width, (product >> self.width) as u64)
    }
    /// High half of the signed × unsigned product (MULHSU). `self` is the
    /// signed operand.
    pub fn mulh_su(self, rhs: BitVector) -> BitVector {
        self.check_width(rhs, "multiplication");
        let product = self.signed() as i128 * rhs.bits as i128;
        BitVector::new(self.width, (product >> self.width) as u64)
    }
    /// Unsigned quotient. Dividing by zero gives all ones.
    pub fn div_u(self, rhs: BitVector) -> BitVector {
        self.check_width(rhs, "division");
        match self.bits.checked_div(rhs.bits) {
            Some(quotient) => BitVector::new(self.width, quotient),
            None => BitVector::ones(self.width),
        }
    }
    /// Signed quotient, rounding toward zero. Dividing by zero gives all
    /// ones (-1); the most negative value divided by -1 gives itself.
    pub fn div_s(self, rhs: BitVector) -> BitVector {
        self.check_width(rhs, "division");
        if rhs.bits == 0 {
            return BitVector::ones(self.width);
        }
        BitVector::from_i64(self.width, self.signed().wrapping_div(rhs.signed()))
    }
    /// Unsigned remainder. The remainder of a division by zero is the
    /// dividend.
    pub fn rem_u(self, rhs: BitVector) -> BitVector {
        self.check_width(rhs, "remainder");
        match self.bits.checked_rem(rhs.bits) {
            Some(remainder) => BitVector::new(self.width, remainder),
            None => self,
        }
    }
    /// Signed remainder, taking the sign of the dividend. The remainder of a
    /// division by zero is the dividend; the most negative value modulo -1
    /// is zero.
    pub fn rem_s(self, rhs: BitVector) -> BitVector {
        self.check_width(rhs, "remainder");
        if rhs.bits == 0 {
            return self;
        }
        BitVector::from_i64(self.width, self.signed().wrapping_rem(rhs.signed()))
    }

    /// One-bit equality.
    pub fn equals(self, rhs: BitVector) -> BitVector {
        self.check_width(rhs, "comparison");
        BitVector::from_bool(self.bits == rhs.bits)
    }
    /// One-bit unsigned less-than.
    pub fn lt_u(self, rhs: BitVector) -> BitVector {
        self.check_width(rhs, "comparison");
        BitVector::from_bool(self.bits < rhs.bits)
    }
    /// One-bit signed less-than.
    pub fn lt_s(self, rhs: BitVector) -> BitVector {
        self.check_width(rhs, "comparison");
        BitVector::from_bool(self.signed() < rhs.signed())
    }
}

impl ops::BitAnd for BitVector {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self::Output {
        self.check_width(rhs, "AND");
        BitVector::new(self.width, self.bits & rhs.bits)
    }
}

impl ops::BitOr for BitVector {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        self.check_width(rhs, "OR");
        BitVector::new(self.width, self.bits | rhs.bits)
    }
}

impl ops::BitXor for BitVector {
    type Output = Self;

    fn bitxor(self, rhs: Self) -> Self::Output {
        self.check_width(rhs, "XOR");
        BitVector::new(self.width, self.bits ^ rhs.bits)
    }
}

impl ops::Not for BitVector {
    type Output = Self;

    fn not(self) -> Self::Output {
        // `new` masks off the high bits the u64 complement would set
        BitVector::new(self.width, !self.bits)
    }
}

impl ops::Add for BitVector {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        self.check_width(rhs, "addition");
        BitVector::new(self.width, self.bits.wrapping_add(rhs.bits))
    }
}

impl ops::Sub for BitVector {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        self.check_width(rhs, "subtraction");
        BitVector::new(self.width, self.bits.wrapping_sub(rhs.bits))
    }
}

impl ops::Neg for BitVector {
    type Output = Self;

    fn neg(self) -> Self::Output {
        BitVector::new(self.width, self.bits.wrapping_neg())
    }
}

impl fmt::Display for BitVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = (self.width as usize).div_ceil(4).max(1);
        write!(f, "0x{:0digits$X}:{}", self.bits, self.width)
    }
}

impl fmt::Debug for BitVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BitVector({self})")
    }
}

impl fmt::LowerHex for BitVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.bits, f)
    }
}

impl fmt::UpperHex for BitVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::UpperHex::fmt(&self.bits, f)
    }
}
