//! The language instruction semantics are written in.
//!
//! A [`Formula`] is an ordered list of [`Statement`]s, each of which
//! evaluates one or two [`Expr`] trees and performs exactly one mutation of
//! the machine state. Formulas are built once, by a catalog, and then
//! evaluated against many decoded instructions.

use std::fmt;

use crate::BitVector;

/// How an instruction's fields are laid out. Each format has a fixed list
/// of positional parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Format {
    /// Register-register: `rd, rs1, rs2`
    R,
    /// Immediate: `rd, rs1, imm`
    I,
    /// Store: `rs1, rs2, imm`
    S,
    /// Branch: `rs1, rs2, imm`
    B,
    /// Upper immediate: `rd, imm`
    U,
    /// Jump: `rd, imm`
    J,
}

/// One named field of a decoded instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Param {
    Rd,
    Rs1,
    Rs2,
    Imm,
}

impl Format {
    /// The parameters of this format, in positional order.
    pub const fn params(self) -> &'static [Param] {
        use Param::*;
        match self {
            Format::R => &[Rd, Rs1, Rs2],
            Format::I => &[Rd, Rs1, Imm],
            Format::S | Format::B => &[Rs1, Rs2, Imm],
            Format::U | Format::J => &[Rd, Imm],
        }
    }
    /// Position of `param` within this format, if it has one.
    pub fn position(self, param: Param) -> Option<usize> {
        self.params().iter().position(|&p| p == param)
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}-type")
    }
}

/// The decoded, positional field values of one instruction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Operands {
    format: Format,
    values: Vec<BitVector>,
}

impl Operands {
    /// Panics if the number of values doesn't match the format.
    pub fn new(format: Format, values: Vec<BitVector>) -> Operands {
        assert_eq!(
            values.len(),
            format.params().len(),
            "wrong number of operands for {format}"
        );
        Operands { format, values }
    }
    pub fn r_type(rd: BitVector, rs1: BitVector, rs2: BitVector) -> Operands {
        Operands::new(Format::R, vec![rd, rs1, rs2])
    }
    pub fn i_type(rd: BitVector, rs1: BitVector, imm: BitVector) -> Operands {
        Operands::new(Format::I, vec![rd, rs1, imm])
    }
    pub fn s_type(rs1: BitVector, rs2: BitVector, imm: BitVector) -> Operands {
        Operands::new(Format::S, vec![rs1, rs2, imm])
    }
    pub fn b_type(rs1: BitVector, rs2: BitVector, imm: BitVector) -> Operands {
        Operands::new(Format::B, vec![rs1, rs2, imm])
    }
    pub fn u_type(rd: BitVector, imm: BitVector) -> Operands {
        Operands::new(Format::U, vec![rd, imm])
    }
    pub fn j_type(rd: BitVector, imm: BitVector) -> Operands {
        Operands::new(Format::J, vec![rd, imm])
    }
    pub fn format(&self) -> Format {
        self.format
    }
    pub fn values(&self) -> &[BitVector] {
        &self.values
    }
    /// Value of `param`, or `None` if this format has no such field.
    pub fn get(&self, param: Param) -> Option<BitVector> {
        self.format.position(param).map(|index| self.values[index])
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    And,
    Or,
    Xor,
    Add,
    Sub,
    /// Low half of the product.
    Mul,
    /// High half, signed × signed.
    MulhSS,
    /// High half, unsigned × unsigned.
    MulhUU,
    /// High half, signed × unsigned.
    MulhSU,
    DivU,
    DivS,
    RemU,
    RemS,
    /// Logical left shift by the right operand's unsigned value.
    Shl,
    /// Zero-filling right shift.
    Lshr,
    /// Sign-filling right shift.
    Ashr,
    /// Rotate left by the right operand's unsigned value, modulo the width.
    Rotate,
    Eq,
    LtU,
    LtS,
}

impl BinaryOp {
    /// Shifts and rotates accept an amount of any width. Everything else
    /// wants two operands of the same width.
    pub fn needs_equal_widths(self) -> bool {
        !matches!(
            self,
            BinaryOp::Shl | BinaryOp::Lshr | BinaryOp::Ashr | BinaryOp::Rotate
        )
    }
    /// Apply to already-evaluated operands.
    pub fn apply(self, l: BitVector, r: BitVector) -> BitVector {
        match self {
            BinaryOp::And => l & r,
            BinaryOp::Or => l | r,
            BinaryOp::Xor => l ^ r,
            BinaryOp::Add => l + r,
            BinaryOp::Sub => l - r,
            BinaryOp::Mul => l.mul(r),
            BinaryOp::MulhSS => l.mulh_ss(r),
            BinaryOp::MulhUU => l.mulh_uu(r),
            BinaryOp::MulhSU => l.mulh_su(r),
            BinaryOp::DivU => l.div_u(r),
            BinaryOp::DivS => l.div_s(r),
            BinaryOp::RemU => l.rem_u(r),
            BinaryOp::RemS => l.rem_s(r),
            BinaryOp::Shl => l.shift_left(r.unsigned()),
            BinaryOp::Lshr => l.shift_right_logical(r.unsigned()),
            BinaryOp::Ashr => l.shift_right_arithmetic(r.unsigned()),
            BinaryOp::Rotate => {
                l.rotate((r.unsigned() % l.width().max(1) as u64) as i64)
            }
            BinaryOp::Eq => l.equals(r),
            BinaryOp::LtU => l.lt_u(r),
            BinaryOp::LtS => l.lt_s(r),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Not,
    Neg,
}

impl UnaryOp {
    pub fn apply(self, v: BitVector) -> BitVector {
        match self {
            UnaryOp::Not => !v,
            UnaryOp::Neg => -v,
        }
    }
}

/// A state-reading computation yielding a [`BitVector`].
///
/// Reads of the PC, registers, and memory are effects as far as a backend
/// is concerned, so evaluation order is fixed: binary operands left then
/// right, and for [`Expr::Select`] the condition first and then *both*
/// branches.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Expr {
    Literal(BitVector),
    /// A field of the decoded instruction.
    Operand(Format, Param),
    Pc,
    /// The register width, as an `XLEN`-bit value.
    Xlen,
    /// Length of the current instruction in bytes, as an `XLEN`-bit value.
    InstructionBytes,
    /// Read the register whose index the inner expression yields.
    Register(Box<Expr>),
    /// Read the byte at the address the inner expression yields.
    Memory(Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Unary(UnaryOp, Box<Expr>),
    ZeroExtend(u32, Box<Expr>),
    SignExtend(u32, Box<Expr>),
    Extract { low: u32, width: u32, source: Box<Expr> },
    /// High part first.
    Concat(Box<Expr>, Box<Expr>),
    /// If the condition equals 1, the first branch, otherwise the second.
    Select(Box<Expr>, Box<Expr>, Box<Expr>),
}

// Method names follow the operations, even where they shadow std::ops names.
#[allow(clippy::should_implement_trait)]
impl Expr {
    pub fn literal(width: u32, value: u64) -> Expr {
        Expr::Literal(BitVector::new(width, value))
    }
    pub fn operand(format: Format, param: Param) -> Expr {
        Expr::Operand(format, param)
    }
    pub fn register(id: Expr) -> Expr {
        Expr::Register(Box::new(id))
    }
    pub fn memory(address: Expr) -> Expr {
        Expr::Memory(Box::new(address))
    }
    pub fn binary(op: BinaryOp, l: Expr, r: Expr) -> Expr {
        Expr::Binary(op, Box::new(l), Box::new(r))
    }
    pub fn select(condition: Expr, then: Expr, otherwise: Expr) -> Expr {
        Expr::Select(Box::new(condition), Box::new(then), Box::new(otherwise))
    }

    pub fn and(self, rhs: Expr) -> Expr {
        Expr::binary(BinaryOp::And, self, rhs)
    }
    pub fn or(self, rhs: Expr) -> Expr {
        Expr::binary(BinaryOp::Or, self, rhs)
    }
    pub fn xor(self, rhs: Expr) -> Expr {
        Expr::binary(BinaryOp::Xor, self, rhs)
    }
    pub fn add(self, rhs: Expr) -> Expr {
        Expr::binary(BinaryOp::Add, self, rhs)
    }
    pub fn sub(self, rhs: Expr) -> Expr {
        Expr::binary(BinaryOp::Sub, self, rhs)
    }
    pub fn shl(self, amount: Expr) -> Expr {
        Expr::binary(BinaryOp::Shl, self, amount)
    }
    pub fn lshr(self, amount: Expr) -> Expr {
        Expr::binary(BinaryOp::Lshr, self, amount)
    }
    pub fn ashr(self, amount: Expr) -> Expr {
        Expr::binary(BinaryOp::Ashr, self, amount)
    }
    pub fn equals(self, rhs: Expr) -> Expr {
        Expr::binary(BinaryOp::Eq, self, rhs)
    }
    pub fn lt_u(self, rhs: Expr) -> Expr {
        Expr::binary(BinaryOp::LtU, self, rhs)
    }
    pub fn lt_s(self, rhs: Expr) -> Expr {
        Expr::binary(BinaryOp::LtS, self, rhs)
    }
    pub fn not(self) -> Expr {
        Expr::Unary(UnaryOp::Not, Box::new(self))
    }
    pub fn zext(self, width: u32) -> Expr {
        Expr::ZeroExtend(width, Box::new(self))
    }
    pub fn sext(self, width: u32) -> Expr {
        Expr::SignExtend(width, Box::new(self))
    }
    pub fn extract(self, low: u32, width: u32) -> Expr {
        Expr::Extract {
            low,
            width,
            source: Box::new(self),
        }
    }
    pub fn concat(self, low: Expr) -> Expr {
        Expr::Concat(Box::new(self), Box::new(low))
    }
}

/// One effectful action.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Statement<E> {
    SetRegister { id: Expr, value: Expr },
    /// Stores exactly one byte. Wider stores are several statements.
    SetMemory { address: Expr, value: Expr },
    SetPc(Expr),
    /// Raise `exception` if the condition evaluates to 1. Execution of the
    /// formula continues either way.
    RaiseIf { condition: Expr, exception: E },
}

/// The ordered statements defining one instruction's semantics.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Formula<E> {
    statements: Vec<Statement<E>>,
}

impl<E> Formula<E> {
    pub fn new(statements: Vec<Statement<E>>) -> Formula<E> {
        Formula { statements }
    }
    pub fn statements(&self) -> &[Statement<E>] {
        &self.statements
    }
}

impl<E> FromIterator<Statement<E>> for Formula<E> {
    fn from_iter<T: IntoIterator<Item = Statement<E>>>(iter: T) -> Self {
        Formula::new(iter.into_iter().collect())
    }
}
