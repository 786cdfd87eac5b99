//! Backends that ship with the crate.
//!
//! The interpreter only ever talks to [`MachineState`]; these are here so
//! that there is something concrete to run formulas against, and something
//! that shows you exactly what a formula did.

use log::trace;

use crate::{BitVector, ExceptionCause, Extensions, MachineState, BYTE_WIDTH};

/// A simple concrete hart: 32 integer registers, a flat byte-addressed RAM
/// starting at address 0, and one pending-exception slot.
///
/// Reads from beyond the end of RAM return zero and raise `LoadFault`.
/// Writes beyond the end are dropped and raise `StoreFault`. If an exception
/// is already pending, later ones are ignored until `clear_exception`.
#[derive(Clone, Debug)]
pub struct FlatHart<const XLEN: u32> {
    registers: [u64; 32], // pc is stored where x0 would be
    ram: Vec<u8>,
    extensions: Extensions,
    exception: Option<ExceptionCause>,
}

impl<const XLEN: u32> FlatHart<XLEN> {
    pub fn new(ram_size: usize, extensions: Extensions) -> FlatHart<XLEN> {
        assert!(XLEN > 0 && XLEN <= 64, "unsupported XLEN {XLEN}");
        FlatHart {
            registers: [0; 32],
            ram: vec![0; ram_size],
            extensions,
            exception: None,
        }
    }
    pub fn ram(&self) -> &[u8] {
        &self.ram[..]
    }
    pub fn ram_mut(&mut self) -> &mut [u8] {
        &mut self.ram[..]
    }
    /// The PC, without going through the (effectful) trait accessor.
    pub fn pc(&self) -> u64 {
        self.registers[0]
    }
    pub fn put_pc(&mut self, new_pc: u64) {
        self.registers[0] = BitVector::new(XLEN, new_pc).unsigned();
    }
    /// The value of register `index`, without going through the trait.
    pub fn register(&self, index: usize) -> u64 {
        if index >= 1 && index < 32 {
            self.registers[index]
        } else if index == 0 {
            0
        } else {
            panic!("register {index} out of range")
        }
    }
    pub fn put_register(&mut self, index: usize, value: u64) {
        if index >= 1 && index < 32 {
            self.registers[index] = BitVector::new(XLEN, value).unsigned();
        } else if index == 0 {
            // do nothing
        } else {
            panic!("register {index} out of range")
        }
    }
    pub fn set_extensions(&mut self, extensions: Extensions) {
        self.extensions = extensions;
    }
    /// Forget the pending exception, so that a driver can carry on.
    pub fn clear_exception(&mut self) -> Option<ExceptionCause> {
        self.exception.take()
    }
    fn ram_index(&self, address: BitVector) -> Option<usize> {
        usize::try_from(address.unsigned())
            .ok()
            .filter(|&index| index < self.ram.len())
    }
}

impl<const XLEN: u32> MachineState for FlatHart<XLEN> {
    type Exception = ExceptionCause;
    const XLEN: u32 = XLEN;
    fn extensions(&self) -> Extensions {
        self.extensions
    }
    fn get_pc(&mut self) -> BitVector {
        BitVector::new(XLEN, self.pc())
    }
    fn set_pc(&mut self, value: BitVector) {
        self.put_pc(value.unsigned());
    }
    fn get_register(&mut self, id: BitVector) -> BitVector {
        BitVector::new(XLEN, self.register(id.unsigned() as usize))
    }
    fn set_register(&mut self, id: BitVector, value: BitVector) {
        self.put_register(id.unsigned() as usize, value.unsigned());
    }
    fn get_memory(&mut self, address: BitVector) -> BitVector {
        match self.ram_index(address) {
            Some(index) => BitVector::new(BYTE_WIDTH, self.ram[index] as u64),
            None => {
                self.throw_exception(ExceptionCause::LoadFault);
                BitVector::zero(BYTE_WIDTH)
            }
        }
    }
    fn set_memory(&mut self, address: BitVector, value: BitVector) {
        match self.ram_index(address) {
            Some(index) => self.ram[index] = value.unsigned() as u8,
            None => self.throw_exception(ExceptionCause::StoreFault),
        }
    }
    fn throw_exception(&mut self, exception: ExceptionCause) {
        if self.exception.is_none() {
            self.exception = Some(exception);
        }
    }
    fn exception_status(&self) -> Option<ExceptionCause> {
        self.exception
    }
}

/// One call a [`Tracing`] backend saw, with the value read or written.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Access<E> {
    GetPc(BitVector),
    SetPc(BitVector),
    GetRegister { id: BitVector, value: BitVector },
    SetRegister { id: BitVector, value: BitVector },
    GetMemory { address: BitVector, value: BitVector },
    SetMemory { address: BitVector, value: BitVector },
    Throw(E),
}

/// Wraps another backend, forwarding every call to it, logging each one at
/// `trace` level, and keeping an ordered record of them.
pub struct Tracing<M: MachineState> {
    inner: M,
    accesses: Vec<Access<M::Exception>>,
}

impl<M: MachineState> Tracing<M> {
    pub fn new(inner: M) -> Tracing<M> {
        Tracing {
            inner,
            accesses: Vec::new(),
        }
    }
    pub fn inner(&self) -> &M {
        &self.inner
    }
    pub fn inner_mut(&mut self) -> &mut M {
        &mut self.inner
    }
    pub fn into_inner(self) -> M {
        self.inner
    }
    pub fn accesses(&self) -> &[Access<M::Exception>] {
        &self.accesses[..]
    }
    /// Hand over everything recorded so far, leaving the record empty.
    pub fn take_accesses(&mut self) -> Vec<Access<M::Exception>> {
        std::mem::take(&mut self.accesses)
    }
}

impl<M: MachineState> MachineState for Tracing<M> {
    type Exception = M::Exception;
    const XLEN: u32 = M::XLEN;
    fn extensions(&self) -> Extensions {
        self.inner.extensions()
    }
    fn get_pc(&mut self) -> BitVector {
        let value = self.inner.get_pc();
        trace!("pc -> {value}");
        self.accesses.push(Access::GetPc(value));
        value
    }
    fn set_pc(&mut self, value: BitVector) {
        trace!("pc <- {value}");
        self.accesses.push(Access::SetPc(value));
        self.inner.set_pc(value)
    }
    fn get_register(&mut self, id: BitVector) -> BitVector {
        let value = self.inner.get_register(id);
        trace!("x{} -> {value}", id.unsigned());
        self.accesses.push(Access::GetRegister { id, value });
        value
    }
    fn set_register(&mut self, id: BitVector, value: BitVector) {
        trace!("x{} <- {value}", id.unsigned());
        self.accesses.push(Access::SetRegister { id, value });
        self.inner.set_register(id, value)
    }
    fn get_memory(&mut self, address: BitVector) -> BitVector {
        let value = self.inner.get_memory(address);
        trace!("[{address}] -> {value}");
        self.accesses.push(Access::GetMemory { address, value });
        value
    }
    fn set_memory(&mut self, address: BitVector, value: BitVector) {
        trace!("[{address}] <- {value}");
        self.accesses.push(Access::SetMemory { address, value });
        self.inner.set_memory(address, value)
    }
    fn throw_exception(&mut self, exception: M::Exception) {
        trace!("throw {exception:?}");
        self.accesses.push(Access::Throw(exception.clone()));
        self.inner.throw_exception(exception)
    }
    fn exception_status(&self) -> Option<M::Exception> {
        self.inner.exception_status()
    }
}
