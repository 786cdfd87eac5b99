use std::fmt;

use log::{debug, trace, warn};
use thiserror::Error;

use crate::{
    evaluate::{expect_byte, expect_width},
    BitVector, EvalError, Evaluator, Extensions, Formula, MachineState,
    Operands, Statement,
};

/// Every instruction fetched by the run loop is this many bytes long.
pub const INSTRUCTION_BYTES: u32 = 4;

/// An instruction the catalog recognized.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Decoded<O> {
    pub opcode: O,
    pub operands: Operands,
}

/// The instruction set: a decoder plus the semantics of everything it can
/// decode.
pub trait Catalog {
    type Opcode: Copy + fmt::Debug;
    /// The exception type raised by this catalog's formulas. It must match
    /// the backend's.
    type Exception: Clone + fmt::Debug;
    /// Decode one instruction word, or return `None` if it isn't a known
    /// encoding under the given extensions.
    fn decode(
        &self,
        word: u32,
        extensions: Extensions,
    ) -> Option<Decoded<Self::Opcode>>;
    /// The formula for `opcode`. This must be total over every opcode
    /// `decode` can produce; a missing mapping is a bug in the catalog and
    /// may panic.
    fn semantics_for(&self, opcode: Self::Opcode) -> &Formula<Self::Exception>;
}

/// Why a run stopped without finishing and without an architectural
/// exception.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RunError {
    #[error("no instruction decodes from {word:#010x} at pc {pc}")]
    Decode { pc: BitVector, word: u32 },
    #[error("formula contract violated at pc {pc}: {source}")]
    Contract {
        pc: BitVector,
        #[source]
        source: EvalError,
    },
}

/// Perform one statement: evaluate its expressions, then make exactly one
/// call on the backend.
pub fn execute_statement<M: MachineState>(
    statement: &Statement<M::Exception>,
    evaluator: &Evaluator,
    state: &mut M,
) -> Result<(), EvalError> {
    match statement {
        Statement::SetRegister { id, value } => {
            let id = evaluator.register_id(id, state)?;
            let value = evaluator.evaluate(value, state)?;
            let value = expect_width("register value", value, M::XLEN)?;
            state.set_register(id, value);
        }
        Statement::SetMemory { address, value } => {
            let address = evaluator.address(address, state)?;
            let value = expect_byte("stored value", evaluator.evaluate(value, state)?)?;
            state.set_memory(address, value);
        }
        Statement::SetPc(value) => {
            let value = evaluator.evaluate(value, state)?;
            let value = expect_width("new pc", value, M::XLEN)?;
            state.set_pc(value);
        }
        Statement::RaiseIf {
            condition,
            exception,
        } => {
            if evaluator.evaluate(condition, state)?.unsigned() == 1 {
                state.throw_exception(exception.clone());
            }
        }
    }
    Ok(())
}

/// Run every statement of `formula`, in order. There is no early exit: a
/// raised exception is only noticed by the run loop, before the next step.
/// A contract violation abandons the remaining statements.
pub fn execute_formula<M: MachineState>(
    formula: &Formula<M::Exception>,
    operands: &Operands,
    instruction_bytes: u32,
    state: &mut M,
) -> Result<(), EvalError> {
    let evaluator = Evaluator::new(operands, instruction_bytes);
    for statement in formula.statements() {
        execute_statement(statement, &evaluator, state)?;
    }
    Ok(())
}

/// Read the PC, then the four bytes at PC, PC+1, PC+2, PC+3, and assemble
/// them into a little-endian instruction word.
pub fn fetch<M: MachineState>(state: &mut M) -> (BitVector, u32) {
    let pc = state.get_pc();
    let mut word = 0;
    for offset in 0..INSTRUCTION_BYTES {
        let address = pc + BitVector::new(pc.width(), offset as u64);
        let byte = state.get_memory(address).extract(0, 8);
        word |= (byte.unsigned() as u32) << (offset * 8);
    }
    (pc, word)
}

/// Fetch, decode, and execute one instruction.
///
/// The step never touches the PC itself; advancing it is up to the
/// instruction's formula.
pub fn step<C, M>(catalog: &C, state: &mut M) -> Result<(), RunError>
where
    C: Catalog,
    M: MachineState<Exception = C::Exception>,
{
    let (pc, word) = fetch(state);
    let Some(decoded) = catalog.decode(word, state.extensions()) else {
        warn!("undecodable instruction {word:#010x} at pc {pc}");
        return Err(RunError::Decode { pc, word });
    };
    trace!("pc {pc}: {word:#010x} {:?}", decoded.opcode);
    let formula = catalog.semantics_for(decoded.opcode);
    execute_formula(formula, &decoded.operands, INSTRUCTION_BYTES, state)
        .map_err(|source| RunError::Contract { pc, source })
}

/// Run up to `steps` instructions.
///
/// Before every step, the backend's pending exception is checked; if there
/// is one, the run stops and returns it without executing anything more.
/// Returns `Ok(None)` once the step budget is used up. Nothing is checked
/// after the last step, so an exception raised by it is reported by the
/// backend's `exception_status` (and by the next `run`), not by this one.
/// With a budget of zero nothing at all is read.
pub fn run<C, M>(
    catalog: &C,
    state: &mut M,
    steps: u64,
) -> Result<Option<M::Exception>, RunError>
where
    C: Catalog,
    M: MachineState<Exception = C::Exception>,
{
    let mut remaining = steps;
    while remaining > 0 {
        if let Some(exception) = state.exception_status() {
            debug!(
                "halted by {exception:?} after {} of {steps} steps",
                steps - remaining
            );
            return Ok(Some(exception));
        }
        step(catalog, state)?;
        remaining -= 1;
    }
    debug!("ran {steps} steps");
    Ok(None)
}
