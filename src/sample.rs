//! A sample catalog: the RV32I base integer instructions plus RV32M, with
//! every instruction's semantics written as a [`Formula`].
//!
//! Not decoded: FENCE, SYSTEM, and JALR. JALR writes `rd` and jumps to an
//! address computed from `rs1`, and when those are the same register one of
//! the two statements would see the other's result.
//!
//! Jumps and taken branches to an address that is not 4-byte aligned raise
//! `MisalignedPC` and leave the PC (and, for JAL, `rd`) alone.

use crate::{
    BitVector, Catalog, Decoded, ExceptionCause, Expr, Extensions, Format,
    Formula, Operands, Param, Statement,
};

const XLEN: u32 = 32;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Opcode {
    Lui,
    Auipc,
    Jal,
    Beq,
    Bne,
    Blt,
    Bge,
    Bltu,
    Bgeu,
    Lb,
    Lh,
    Lw,
    Lbu,
    Lhu,
    Sb,
    Sh,
    Sw,
    Addi,
    Slti,
    Sltiu,
    Xori,
    Ori,
    Andi,
    Slli,
    Srli,
    Srai,
    Add,
    Sub,
    Sll,
    Slt,
    Sltu,
    Xor,
    Srl,
    Sra,
    Or,
    And,
    Mul,
    Mulh,
    Mulhsu,
    Mulhu,
    Div,
    Divu,
    Rem,
    Remu,
}

impl Opcode {
    /// Every opcode, in declaration order.
    pub const ALL: [Opcode; 44] = {
        use Opcode::*;
        [
            Lui, Auipc, Jal, Beq, Bne, Blt, Bge, Bltu, Bgeu, Lb, Lh, Lw, Lbu,
            Lhu, Sb, Sh, Sw, Addi, Slti, Sltiu, Xori, Ori, Andi, Slli, Srli,
            Srai, Add, Sub, Sll, Slt, Sltu, Xor, Srl, Sra, Or, And, Mul, Mulh,
            Mulhsu, Mulhu, Div, Divu, Rem, Remu,
        ]
    };

    pub fn format(self) -> Format {
        use Opcode::*;
        match self {
            Lui | Auipc => Format::U,
            Jal => Format::J,
            Beq | Bne | Blt | Bge | Bltu | Bgeu => Format::B,
            Lb | Lh | Lw | Lbu | Lhu => Format::I,
            Sb | Sh | Sw => Format::S,
            Addi | Slti | Sltiu | Xori | Ori | Andi | Slli | Srli | Srai => {
                Format::I
            }
            _ => Format::R,
        }
    }
    /// True for the opcodes that need the M extension.
    pub fn is_m(self) -> bool {
        use Opcode::*;
        matches!(self, Mul | Mulh | Mulhsu | Mulhu | Div | Divu | Rem | Remu)
    }
}

type Stmt = Statement<ExceptionCause>;

fn lit(width: u32, value: u64) -> Expr {
    Expr::literal(width, value)
}

fn reg(format: Format, param: Param) -> Expr {
    Expr::register(Expr::operand(format, param))
}

fn rs1(format: Format) -> Expr {
    reg(format, Param::Rs1)
}

fn rs2(format: Format) -> Expr {
    reg(format, Param::Rs2)
}

/// The immediate, sign-extended to XLEN.
fn imm(format: Format) -> Expr {
    Expr::operand(format, Param::Imm).sext(XLEN)
}

fn next_pc() -> Expr {
    Expr::Pc.add(Expr::InstructionBytes)
}

fn misaligned(target: Expr) -> Expr {
    target.extract(0, 2).equals(lit(2, 0)).not()
}

fn set_rd(format: Format, value: Expr) -> Stmt {
    Statement::SetRegister {
        id: Expr::operand(format, Param::Rd),
        value,
    }
}

fn advance() -> Stmt {
    Statement::SetPc(next_pc())
}

/// `rs1 + imm`, the effective address of loads and stores.
fn effective_address(format: Format, offset: u64) -> Expr {
    rs1(format).add(imm(format)).add(lit(XLEN, offset))
}

/// Little-endian load of `bytes` bytes, as a `bytes * 8`-bit value.
fn load(bytes: u64) -> Expr {
    let byte = |k| Expr::memory(effective_address(Format::I, k));
    (0..bytes - 1)
        .rev()
        .fold(byte(bytes - 1), |high, k| high.concat(byte(k)))
}

fn store(bytes: u64) -> Formula<ExceptionCause> {
    (0..bytes)
        .map(|k| Statement::SetMemory {
            address: effective_address(Format::S, k),
            value: rs2(Format::S).extract(8 * k as u32, 8),
        })
        .chain([advance()])
        .collect()
}

fn branch(condition: Expr) -> Formula<ExceptionCause> {
    let target = || Expr::Pc.add(imm(Format::B));
    Formula::new(vec![
        Statement::RaiseIf {
            condition: condition.clone().and(misaligned(target())),
            exception: ExceptionCause::MisalignedPC,
        },
        Statement::SetPc(Expr::select(
            condition,
            Expr::select(misaligned(target()), Expr::Pc, target()),
            next_pc(),
        )),
    ])
}

fn jal() -> Formula<ExceptionCause> {
    let f = Format::J;
    let target = || Expr::Pc.add(imm(f));
    Formula::new(vec![
        Statement::RaiseIf {
            condition: misaligned(target()),
            exception: ExceptionCause::MisalignedPC,
        },
        set_rd(
            f,
            Expr::select(misaligned(target()), reg(f, Param::Rd), next_pc()),
        ),
        Statement::SetPc(Expr::select(misaligned(target()), Expr::Pc, target())),
    ])
}

fn alu(format: Format, value: Expr) -> Formula<ExceptionCause> {
    Formula::new(vec![set_rd(format, value), advance()])
}

fn formula_for(opcode: Opcode) -> Formula<ExceptionCause> {
    use Opcode::*;
    let (i, r) = (Format::I, Format::R);
    let shamt_i = || Expr::operand(i, Param::Imm).extract(0, 5);
    let shamt_r = || rs2(r).extract(0, 5);
    match opcode {
        Lui => alu(
            Format::U,
            Expr::operand(Format::U, Param::Imm).concat(lit(12, 0)),
        ),
        Auipc => alu(
            Format::U,
            Expr::Pc.add(Expr::operand(Format::U, Param::Imm).concat(lit(12, 0))),
        ),
        Jal => jal(),
        Beq => branch(rs1(Format::B).equals(rs2(Format::B))),
        Bne => branch(rs1(Format::B).equals(rs2(Format::B)).not()),
        Blt => branch(rs1(Format::B).lt_s(rs2(Format::B))),
        Bge => branch(rs1(Format::B).lt_s(rs2(Format::B)).not()),
        Bltu => branch(rs1(Format::B).lt_u(rs2(Format::B))),
        Bgeu => branch(rs1(Format::B).lt_u(rs2(Format::B)).not()),
        Lb => alu(i, load(1).sext(XLEN)),
        Lh => alu(i, load(2).sext(XLEN)),
        Lw => alu(i, load(4)),
        Lbu => alu(i, load(1).zext(XLEN)),
        Lhu => alu(i, load(2).zext(XLEN)),
        Sb => store(1),
        Sh => store(2),
        Sw => store(4),
        Addi => alu(i, rs1(i).add(imm(i))),
        Slti => alu(i, rs1(i).lt_s(imm(i)).zext(XLEN)),
        Sltiu => alu(i, rs1(i).lt_u(imm(i)).zext(XLEN)),
        Xori => alu(i, rs1(i).xor(imm(i))),
        Ori => alu(i, rs1(i).or(imm(i))),
        Andi => alu(i, rs1(i).and(imm(i))),
        Slli => alu(i, rs1(i).shl(shamt_i())),
        Srli => alu(i, rs1(i).lshr(shamt_i())),
        Srai => alu(i, rs1(i).ashr(shamt_i())),
        Add => alu(r, rs1(r).add(rs2(r))),
        Sub => alu(r, rs1(r).sub(rs2(r))),
        Sll => alu(r, rs1(r).shl(shamt_r())),
        Slt => alu(r, rs1(r).lt_s(rs2(r)).zext(XLEN)),
        Sltu => alu(r, rs1(r).lt_u(rs2(r)).zext(XLEN)),
        Xor => alu(r, rs1(r).xor(rs2(r))),
        Srl => alu(r, rs1(r).lshr(shamt_r())),
        Sra => alu(r, rs1(r).ashr(shamt_r())),
        Or => alu(r, rs1(r).or(rs2(r))),
        And => alu(r, rs1(r).and(rs2(r))),
        Mul | Mulh | Mulhsu | Mulhu | Div | Divu | Rem | Remu => {
            use crate::BinaryOp as B;
            let op = match opcode {
                Mul => B::Mul,
                Mulh => B::MulhSS,
                Mulhsu => B::MulhSU,
                Mulhu => B::MulhUU,
                Div => B::DivS,
                Divu => B::DivU,
                Rem => B::RemS,
                _ => B::RemU,
            };
            alu(r, Expr::binary(op, rs1(r), rs2(r)))
        }
    }
}

/// RV32IM, with M decoded only when the extension is enabled.
pub struct Rv32Sample {
    formulas: Vec<Formula<ExceptionCause>>,
}

impl Rv32Sample {
    pub fn new() -> Rv32Sample {
        Rv32Sample {
            formulas: Opcode::ALL.iter().map(|&op| formula_for(op)).collect(),
        }
    }
}

impl Default for Rv32Sample {
    fn default() -> Self {
        Rv32Sample::new()
    }
}

impl Catalog for Rv32Sample {
    type Opcode = Opcode;
    type Exception = ExceptionCause;
    fn decode(&self, word: u32, extensions: Extensions) -> Option<Decoded<Opcode>> {
        if word & 0b11 != 0b11 {
            return None;
        }
        use Opcode::*;
        // Field extractors, only evaluated by the arms that need them.
        macro_rules! funct3 { () => { (word >> 12) & 0b111 }; }
        macro_rules! funct7 { () => { (word >> 25) & 0b1111111 }; }
        macro_rules! rs1 { () => { BitVector::new(5, ((word >> 15) & 0b11111) as u64) }; }
        macro_rules! rs2 { () => { BitVector::new(5, ((word >> 20) & 0b11111) as u64) }; }
        macro_rules! rd { () => { BitVector::new(5, ((word >> 7) & 0b11111) as u64) }; }
        macro_rules! imm12 { () => { BitVector::new(12, (word >> 20) as u64) }; }
        macro_rules! imm12s { () => {
            BitVector::new(12, (((word >> 25) << 5) | ((word >> 7) & 0b11111)) as u64)
        }; }
        macro_rules! imm20 { () => { BitVector::new(20, (word >> 12) as u64) }; }
        macro_rules! imm_j { () => {
            {
                let imm_10_1 = (word >> 21) & 0b1111111111;
                let imm_11 = (word >> 20) & 0b1;
                let imm_19_12 = (word >> 12) & 0b11111111;
                let imm_20 = word >> 31;
                BitVector::new(21, ((imm_10_1 << 1)
                    | (imm_11 << 11)
                    | (imm_19_12 << 12)
                    | (imm_20 << 20)) as u64)
            }
        }; }
        macro_rules! imm_b { () => {
            {
                let imm_4_1 = (word >> 8) & 0b1111;
                let imm_10_5 = (word >> 25) & 0b111111;
                let imm_11 = (word >> 7) & 0b1;
                let imm_12 = word >> 31;
                BitVector::new(13, ((imm_4_1 << 1)
                    | (imm_10_5 << 5)
                    | (imm_11 << 11)
                    | (imm_12 << 12)) as u64)
            }
        }; }
        let (opcode, operands) = match (word >> 2) & 0b11111 {
            0b00000 => {
                // LOAD
                let opcode = match funct3!() {
                    0b000 => Lb,
                    0b001 => Lh,
                    0b010 => Lw,
                    0b100 => Lbu,
                    0b101 => Lhu,
                    _ => return None,
                };
                (opcode, Operands::i_type(rd!(), rs1!(), imm12!()))
            }
            0b00100 => {
                // OP-IMM
                let opcode = match (funct3!(), funct7!()) {
                    (0b000, _) => Addi,
                    (0b010, _) => Slti,
                    (0b011, _) => Sltiu,
                    (0b100, _) => Xori,
                    (0b110, _) => Ori,
                    (0b111, _) => Andi,
                    (0b001, 0b0000000) => Slli,
                    (0b101, 0b0000000) => Srli,
                    (0b101, 0b0100000) => Srai,
                    _ => return None,
                };
                (opcode, Operands::i_type(rd!(), rs1!(), imm12!()))
            }
            0b00101 => (Auipc, Operands::u_type(rd!(), imm20!())),
            0b01000 => {
                // STORE
                let opcode = match funct3!() {
                    0b000 => Sb,
                    0b001 => Sh,
                    0b010 => Sw,
                    _ => return None,
                };
                (opcode, Operands::s_type(rs1!(), rs2!(), imm12s!()))
            }
            0b01100 => {
                // OP
                let opcode = match (funct7!(), funct3!()) {
                    (0b0000000, 0b000) => Add,
                    (0b0100000, 0b000) => Sub,
                    (0b0000000, 0b001) => Sll,
                    (0b0000000, 0b010) => Slt,
                    (0b0000000, 0b011) => Sltu,
                    (0b0000000, 0b100) => Xor,
                    (0b0000000, 0b101) => Srl,
                    (0b0100000, 0b101) => Sra,
                    (0b0000000, 0b110) => Or,
                    (0b0000000, 0b111) => And,
                    (0b0000001, _) if !extensions.m => return None,
                    (0b0000001, 0b000) => Mul,
                    (0b0000001, 0b001) => Mulh,
                    (0b0000001, 0b010) => Mulhsu,
                    (0b0000001, 0b011) => Mulhu,
                    (0b0000001, 0b100) => Div,
                    (0b0000001, 0b101) => Divu,
                    (0b0000001, 0b110) => Rem,
                    (0b0000001, 0b111) => Remu,
                    _ => return None,
                };
                (opcode, Operands::r_type(rd!(), rs1!(), rs2!()))
            }
            0b01101 => (Lui, Operands::u_type(rd!(), imm20!())),
            0b11000 => {
                // BRANCH
                let opcode = match funct3!() {
                    0b000 => Beq,
                    0b001 => Bne,
                    0b100 => Blt,
                    0b101 => Bge,
                    0b110 => Bltu,
                    0b111 => Bgeu,
                    _ => return None,
                };
                (opcode, Operands::b_type(rs1!(), rs2!(), imm_b!()))
            }
            0b11011 => (Jal, Operands::j_type(rd!(), imm_j!())),
            _ => return None,
        };
        Some(Decoded { opcode, operands })
    }
    fn semantics_for(&self, opcode: Opcode) -> &Formula<ExceptionCause> {
        &self.formulas[opcode as usize]
    }
}
