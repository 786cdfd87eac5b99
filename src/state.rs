use std::fmt;

use thiserror::Error;

use crate::BitVector;

/// Width of a register index.
pub const REGISTER_ID_WIDTH: u32 = 5;
/// Width of one memory cell.
pub const BYTE_WIDTH: u32 = 8;

/// Exceptions a hart can raise. Values correspond to `mcause` values.
///
/// The interpreter never constructs or inspects these itself; they are a
/// ready-made taxonomy for catalogs and backends that don't need their own.
#[repr(i32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ExceptionCause {
    MisalignedPC = 0,
    InstructionFault = 1,
    IllegalInstruction = 2,
    Breakpoint = 3,
    MisalignedLoad = 4,
    LoadFault = 5,
    MisalignedStore = 6,
    StoreFault = 7,
    EcallFromUmode = 8,
    EcallFromSmode = 9,
    EcallFromMmode = 11,
    InstructionPageFault = 12,
    LoadPageFault = 13,
    StorePageFault = 15,
}

impl ExceptionCause {
    /// The value this exception writes to `mcause`.
    pub fn mcause(self) -> u32 {
        self as i32 as u32
    }
}

impl fmt::Display for ExceptionCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?} (mcause {})", self.mcause())
    }
}

/// Which standard extensions are active on top of the base integer ISA.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Extensions {
    /// Integer multiply/divide.
    pub m: bool,
    /// Atomics.
    pub a: bool,
    /// Single-precision float.
    pub f: bool,
    /// Double-precision float.
    pub d: bool,
    /// Compressed instructions.
    pub c: bool,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IsaError {
    #[error("ISA must start with 'rv32' or 'rv64'")]
    BadBase,
    #[error("'i' must be present in ISA")]
    MissingBaseInteger,
    #[error("unknown ISA extension {0:?}")]
    UnknownExtension(char),
    #[error("'f' must be present in ISA if 'd' is")]
    DoubleWithoutFloat,
}

impl Extensions {
    /// Everything off: the bare base integer ISA.
    pub const BASE: Extensions = Extensions {
        m: false,
        a: false,
        f: false,
        d: false,
        c: false,
    };

    /// Parse an ISA string such as `rv32imac`, returning the register width
    /// and the extensions it names.
    pub fn parse_isa(isa: &str) -> Result<(u32, Extensions), IsaError> {
        let isa = isa.trim().to_ascii_lowercase();
        let (xlen, letters) = if let Some(rest) = isa.strip_prefix("rv32") {
            (32, rest)
        } else if let Some(rest) = isa.strip_prefix("rv64") {
            (64, rest)
        } else {
            return Err(IsaError::BadBase);
        };
        if !letters.contains('i') {
            return Err(IsaError::MissingBaseInteger);
        }
        let mut ret = Extensions::BASE;
        for el in letters.chars() {
            match el {
                'i' => (),
                'm' => ret.m = true,
                'a' => ret.a = true,
                'f' => ret.f = true,
                'd' => ret.d = true,
                'c' => ret.c = true,
                _ => return Err(IsaError::UnknownExtension(el)),
            }
        }
        if ret.d && !ret.f {
            return Err(IsaError::DoubleWithoutFloat);
        }
        Ok((xlen, ret))
    }
}

/// The primitive state accessors a backend provides so that formulas can
/// run against it. This trait is the entire coupling between the
/// interpreter and a backend.
///
/// All values are `XLEN` bits wide except register indices
/// ([`REGISTER_ID_WIDTH`] bits) and memory cells ([`BYTE_WIDTH`] bits).
///
/// None of these operations can fail. A backend that cannot satisfy an
/// access (say, an address with nothing behind it) should call
/// `throw_exception` on itself and return something harmless. The run loop
/// checks `exception_status` before every step, and that is the only place
/// execution stops.
///
/// Reads take `&mut self`: a backend may count, trace, or block on them.
pub trait MachineState {
    /// Whatever the backend uses to represent a pending exception.
    type Exception: Clone + fmt::Debug;
    /// Width of addresses, registers, and the PC.
    const XLEN: u32;
    /// Which extensions are currently enabled. Default implementation
    /// enables none of them.
    fn extensions(&self) -> Extensions {
        Extensions::BASE
    }
    fn get_pc(&mut self) -> BitVector;
    fn set_pc(&mut self, value: BitVector);
    /// Read an integer register. Register 0 MUST read as zero, no matter
    /// what has been written to it.
    fn get_register(&mut self, id: BitVector) -> BitVector;
    /// Write an integer register. Writes to register 0 MUST be discarded.
    fn set_register(&mut self, id: BitVector, value: BitVector);
    /// Read one byte of memory.
    fn get_memory(&mut self, address: BitVector) -> BitVector;
    /// Write one byte of memory.
    fn set_memory(&mut self, address: BitVector, value: BitVector);
    /// Record that an exception has taken place.
    fn throw_exception(&mut self, exception: Self::Exception);
    /// The pending exception, if any.
    fn exception_status(&self) -> Option<Self::Exception>;
}
