#![allow(dead_code)]

use std::{cell::Cell, collections::BTreeMap};

use rvformula::*;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fault(pub &'static str);

/// Everything a formula or the run loop did to a [`MockHart`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    GetPc,
    SetPc(u64),
    GetRegister(u64),
    SetRegister(u64, u64),
    GetMemory(u64),
    SetMemory(u64, u64),
    Throw(Fault),
}

/// A 32-bit backend with sparse memory that records every call made on it.
#[derive(Debug, Default)]
pub struct MockHart {
    pub pc: u64,
    pub registers: [u64; 32],
    pub memory: BTreeMap<u64, u8>,
    pub pending: Option<Fault>,
    /// Width of the values `get_memory` returns; 8 unless set.
    pub cell_width: Option<u32>,
    pub calls: Vec<Call>,
    pub status_checks: Cell<usize>,
}

impl MockHart {
    pub fn new() -> MockHart {
        MockHart::default()
    }
    pub fn with_registers(values: &[(usize, u64)]) -> MockHart {
        let mut hart = MockHart::new();
        for &(index, value) in values {
            hart.registers[index] = value;
        }
        hart
    }
    pub fn put_word(&mut self, address: u64, word: u32) {
        for (offset, byte) in word.to_le_bytes().into_iter().enumerate() {
            self.memory.insert(address + offset as u64, byte);
        }
    }
}

impl MachineState for MockHart {
    type Exception = Fault;
    const XLEN: u32 = 32;
    fn get_pc(&mut self) -> BitVector {
        self.calls.push(Call::GetPc);
        BitVector::new(32, self.pc)
    }
    fn set_pc(&mut self, value: BitVector) {
        self.calls.push(Call::SetPc(value.unsigned()));
        self.pc = value.unsigned();
    }
    fn get_register(&mut self, id: BitVector) -> BitVector {
        self.calls.push(Call::GetRegister(id.unsigned()));
        match id.unsigned() {
            0 => BitVector::zero(32),
            n => BitVector::new(32, self.registers[n as usize]),
        }
    }
    fn set_register(&mut self, id: BitVector, value: BitVector) {
        self.calls.push(Call::SetRegister(id.unsigned(), value.unsigned()));
        if id.unsigned() != 0 {
            self.registers[id.unsigned() as usize] = value.unsigned();
        }
    }
    fn get_memory(&mut self, address: BitVector) -> BitVector {
        self.calls.push(Call::GetMemory(address.unsigned()));
        let byte = self.memory.get(&address.unsigned()).copied().unwrap_or(0);
        BitVector::new(self.cell_width.unwrap_or(8), byte as u64)
    }
    fn set_memory(&mut self, address: BitVector, value: BitVector) {
        self.calls.push(Call::SetMemory(address.unsigned(), value.unsigned()));
        self.memory.insert(address.unsigned(), value.unsigned() as u8);
    }
    fn throw_exception(&mut self, exception: Fault) {
        self.calls.push(Call::Throw(exception.clone()));
        if self.pending.is_none() {
            self.pending = Some(exception);
        }
    }
    fn exception_status(&self) -> Option<Fault> {
        self.status_checks.set(self.status_checks.get() + 1);
        self.pending.clone()
    }
}

/// A catalog that recognizes exact instruction words. The opcode is the
/// entry's index.
#[derive(Default)]
pub struct TableCatalog {
    entries: Vec<(u32, Operands, Formula<Fault>)>,
}

impl TableCatalog {
    pub fn new() -> TableCatalog {
        TableCatalog::default()
    }
    pub fn with(mut self, word: u32, operands: Operands, formula: Formula<Fault>) -> Self {
        self.entries.push((word, operands, formula));
        self
    }
}

impl Catalog for TableCatalog {
    type Opcode = usize;
    type Exception = Fault;
    fn decode(&self, word: u32, _extensions: Extensions) -> Option<Decoded<usize>> {
        self.entries
            .iter()
            .position(|(w, _, _)| *w == word)
            .map(|opcode| Decoded {
                opcode,
                operands: self.entries[opcode].1.clone(),
            })
    }
    fn semantics_for(&self, opcode: usize) -> &Formula<Fault> {
        &self.entries[opcode].2
    }
}

/// `rd := rs1 + rs2; pc := pc + 4`
pub fn add_formula() -> Formula<Fault> {
    Formula::new(vec![
        Statement::SetRegister {
            id: Expr::operand(Format::R, Param::Rd),
            value: Expr::register(Expr::operand(Format::R, Param::Rs1))
                .add(Expr::register(Expr::operand(Format::R, Param::Rs2))),
        },
        Statement::SetPc(Expr::Pc.add(Expr::literal(32, 4))),
    ])
}

pub fn r_operands(rd: u64, rs1: u64, rs2: u64) -> Operands {
    Operands::r_type(
        BitVector::new(5, rd),
        BitVector::new(5, rs1),
        BitVector::new(5, rs2),
    )
}

// RV32 encoders, for building test programs.

pub fn enc_r(funct7: u32, rs2: u32, rs1: u32, funct3: u32, rd: u32, opcode: u32) -> u32 {
    (funct7 << 25) | (rs2 << 20) | (rs1 << 15) | (funct3 << 12) | (rd << 7) | opcode
}

pub fn enc_i(imm: i32, rs1: u32, funct3: u32, rd: u32, opcode: u32) -> u32 {
    (((imm as u32) & 0xFFF) << 20) | (rs1 << 15) | (funct3 << 12) | (rd << 7) | opcode
}

pub fn enc_s(imm: i32, rs2: u32, rs1: u32, funct3: u32) -> u32 {
    let imm = imm as u32;
    (((imm >> 5) & 0x7F) << 25)
        | (rs2 << 20)
        | (rs1 << 15)
        | (funct3 << 12)
        | ((imm & 0x1F) << 7)
        | 0b0100011
}

pub fn enc_b(imm: i32, rs2: u32, rs1: u32, funct3: u32) -> u32 {
    let imm = imm as u32;
    (((imm >> 12) & 1) << 31)
        | (((imm >> 5) & 0x3F) << 25)
        | (rs2 << 20)
        | (rs1 << 15)
        | (funct3 << 12)
        | (((imm >> 1) & 0xF) << 8)
        | (((imm >> 11) & 1) << 7)
        | 0b1100011
}

pub fn enc_u(imm20: u32, rd: u32, opcode: u32) -> u32 {
    (imm20 << 12) | (rd << 7) | opcode
}

pub fn enc_j(imm: i32, rd: u32) -> u32 {
    let imm = imm as u32;
    (((imm >> 20) & 1) << 31)
        | (((imm >> 1) & 0x3FF) << 21)
        | (((imm >> 11) & 1) << 20)
        | (((imm >> 12) & 0xFF) << 12)
        | (rd << 7)
        | 0b1101111
}

pub const OP: u32 = 0b0110011;
pub const OP_IMM: u32 = 0b0010011;
pub const LOAD: u32 = 0b0000011;
pub const LUI: u32 = 0b0110111;
pub const AUIPC: u32 = 0b0010111;
pub const M: u32 = 0b0000001;

pub fn addi(rd: u32, rs1: u32, imm: i32) -> u32 {
    enc_i(imm, rs1, 0b000, rd, OP_IMM)
}

pub fn add(rd: u32, rs1: u32, rs2: u32) -> u32 {
    enc_r(0, rs2, rs1, 0b000, rd, OP)
}

/// Put a program at address 0 of a fresh 32-bit hart.
pub fn flat_hart(program: &[u32], ram_size: usize, extensions: Extensions) -> backend::FlatHart<32> {
    let mut hart = backend::FlatHart::<32>::new(ram_size, extensions);
    for (index, word) in program.iter().enumerate() {
        hart.ram_mut()[index * 4..index * 4 + 4].copy_from_slice(&word.to_le_bytes());
    }
    hart
}
