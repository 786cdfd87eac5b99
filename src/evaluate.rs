use thiserror::Error;

use crate::{
    BitVector, Expr, Format, MachineState, Operands, Param, BYTE_WIDTH,
    MAX_WIDTH, REGISTER_ID_WIDTH,
};

/// A formula and the instruction it was run against disagree.
///
/// These are never architectural conditions. They mean a catalog's decoder
/// and its formulas are out of step, and evaluation stops at once.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EvalError {
    #[error("formula reads {param:?} of a {expected} instruction, but a {found} instruction was decoded")]
    OperandMismatch {
        expected: Format,
        param: Param,
        found: Format,
    },
    #[error("{what} of a {left}-bit and a {right}-bit value")]
    WidthMismatch {
        what: &'static str,
        left: u32,
        right: u32,
    },
    #[error("register index is {0} bits wide, expected 5")]
    RegisterIdWidth(u32),
    #[error("{what} is {found} bits wide, expected {expected}")]
    ValueWidth {
        what: &'static str,
        expected: u32,
        found: u32,
    },
    #[error("result would be {0} bits wide, more than 64")]
    WidthOverflow(u32),
    #[error("cannot extend a {from}-bit value to {to} bits")]
    NarrowingExtension { from: u32, to: u32 },
}

/// Fail with `ValueWidth` unless `value` is exactly `expected` bits wide.
pub(crate) fn expect_width(
    what: &'static str,
    value: BitVector,
    expected: u32,
) -> Result<BitVector, EvalError> {
    if value.width() == expected {
        Ok(value)
    } else {
        Err(EvalError::ValueWidth {
            what,
            expected,
            found: value.width(),
        })
    }
}

fn expect_fits(width: u32) -> Result<u32, EvalError> {
    if width <= MAX_WIDTH {
        Ok(width)
    } else {
        Err(EvalError::WidthOverflow(width))
    }
}

/// Evaluates expressions for one decoded instruction.
///
/// Sub-expressions are evaluated strictly left to right. A `Select`
/// evaluates its condition, then both branches, and only then picks one, so
/// every backend sees the same sequence of reads no matter which way the
/// condition goes.
pub struct Evaluator<'a> {
    operands: &'a Operands,
    instruction_bytes: u32,
}

impl<'a> Evaluator<'a> {
    pub fn new(operands: &'a Operands, instruction_bytes: u32) -> Evaluator<'a> {
        Evaluator {
            operands,
            instruction_bytes,
        }
    }
    pub fn operands(&self) -> &'a Operands {
        self.operands
    }
    pub fn instruction_bytes(&self) -> u32 {
        self.instruction_bytes
    }
    /// Evaluate a register index, which must be 5 bits wide.
    pub fn register_id<M: MachineState>(
        &self,
        expr: &Expr,
        state: &mut M,
    ) -> Result<BitVector, EvalError> {
        let id = self.evaluate(expr, state)?;
        if id.width() != REGISTER_ID_WIDTH {
            return Err(EvalError::RegisterIdWidth(id.width()));
        }
        Ok(id)
    }
    /// Evaluate an address, which must be `XLEN` bits wide.
    pub fn address<M: MachineState>(
        &self,
        expr: &Expr,
        state: &mut M,
    ) -> Result<BitVector, EvalError> {
        let address = self.evaluate(expr, state)?;
        expect_width("address", address, M::XLEN)
    }
    pub fn evaluate<M: MachineState>(
        &self,
        expr: &Expr,
        state: &mut M,
    ) -> Result<BitVector, EvalError> {
        Ok(match expr {
            Expr::Literal(value) => *value,
            Expr::Operand(format, param) => {
                let found = self.operands.format();
                match self.operands.get(*param) {
                    Some(value) if found == *format => value,
                    _ => {
                        return Err(EvalError::OperandMismatch {
                            expected: *format,
                            param: *param,
                            found,
                        })
                    }
                }
            }
            Expr::Pc => state.get_pc(),
            Expr::Xlen => BitVector::new(M::XLEN, M::XLEN as u64),
            Expr::InstructionBytes => {
                BitVector::new(M::XLEN, self.instruction_bytes as u64)
            }
            Expr::Register(id) => {
                let id = self.register_id(id, state)?;
                state.get_register(id)
            }
            Expr::Memory(address) => {
                let address = self.address(address, state)?;
                expect_byte("loaded value", state.get_memory(address))?
            }
            Expr::Binary(op, l, r) => {
                let l = self.evaluate(l, state)?;
                let r = self.evaluate(r, state)?;
                if op.needs_equal_widths() && l.width() != r.width() {
                    return Err(EvalError::WidthMismatch {
                        what: "binary operation",
                        left: l.width(),
                        right: r.width(),
                    });
                }
                op.apply(l, r)
            }
            Expr::Unary(op, e) => op.apply(self.evaluate(e, state)?),
            Expr::ZeroExtend(width, e) => {
                let v = self.evaluate(e, state)?;
                let width = expect_fits(*width)?;
                if width < v.width() {
                    return Err(EvalError::NarrowingExtension {
                        from: v.width(),
                        to: width,
                    });
                }
                v.zero_extend(width)
            }
            Expr::SignExtend(width, e) => {
                let v = self.evaluate(e, state)?;
                let width = expect_fits(*width)?;
                if width < v.width() {
                    return Err(EvalError::NarrowingExtension {
                        from: v.width(),
                        to: width,
                    });
                }
                v.sign_extend(width)
            }
            Expr::Extract { low, width, source } => {
                let v = self.evaluate(source, state)?;
                v.extract(*low, expect_fits(*width)?)
            }
            Expr::Concat(high, low) => {
                let high = self.evaluate(high, state)?;
                let low = self.evaluate(low, state)?;
                expect_fits(high.width() + low.width())?;
                high.concat(low)
            }
            Expr::Select(condition, then, otherwise) => {
                let condition = self.evaluate(condition, state)?;
                let then = self.evaluate(then, state)?;
                let otherwise = self.evaluate(otherwise, state)?;
                if then.width() != otherwise.width() {
                    return Err(EvalError::WidthMismatch {
                        what: "select",
                        left: then.width(),
                        right: otherwise.width(),
                    });
                }
                if condition.unsigned() == 1 {
                    then
                } else {
                    otherwise
                }
            }
        })
    }
}

/// Fail unless `value` is one memory cell wide. Checked on bytes read back
/// from a backend and on bytes about to be stored.
pub(crate) fn expect_byte(what: &'static str, value: BitVector) -> Result<BitVector, EvalError> {
    expect_width(what, value, BYTE_WIDTH)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backend::{Access, FlatHart, Tracing},
        BinaryOp, Extensions, UnaryOp,
    };

    fn bv(width: u32, value: u64) -> BitVector {
        BitVector::new(width, value)
    }

    fn hart() -> Tracing<FlatHart<32>> {
        let mut hart = FlatHart::<32>::new(16, Extensions::BASE);
        hart.put_pc(8);
        hart.put_register(1, 100);
        hart.put_register(2, 200);
        Tracing::new(hart)
    }

    fn eval(expr: &Expr) -> Result<BitVector, EvalError> {
        let operands = Operands::r_type(bv(5, 3), bv(5, 1), bv(5, 2));
        Evaluator::new(&operands, 4).evaluate(expr, &mut hart())
    }

    #[test]
    fn operands() {
        let operands = Operands::i_type(bv(5, 3), bv(5, 1), bv(12, 0xFFF));
        let evaluator = Evaluator::new(&operands, 4);
        let mut state = hart();
        assert_eq!(
            evaluator.evaluate(&Expr::operand(Format::I, Param::Imm), &mut state),
            Ok(bv(12, 0xFFF))
        );
        assert_eq!(
            evaluator.evaluate(&Expr::operand(Format::R, Param::Rs2), &mut state),
            Err(EvalError::OperandMismatch {
                expected: Format::R,
                param: Param::Rs2,
                found: Format::I,
            })
        );
        // right format, but I-type has no rs2
        assert_eq!(
            evaluator.evaluate(&Expr::operand(Format::I, Param::Rs2), &mut state),
            Err(EvalError::OperandMismatch {
                expected: Format::I,
                param: Param::Rs2,
                found: Format::I,
            })
        );
        assert!(state.accesses().is_empty());
    }

    #[test]
    fn constants() {
        let operands = Operands::u_type(bv(5, 0), bv(20, 0));
        let mut wide = FlatHart::<64>::new(0, Extensions::BASE);
        let evaluator = Evaluator::new(&operands, 2);
        assert_eq!(evaluator.evaluate(&Expr::Xlen, &mut wide), Ok(bv(64, 64)));
        assert_eq!(
            evaluator.evaluate(&Expr::InstructionBytes, &mut wide),
            Ok(bv(64, 2))
        );
        assert_eq!(eval(&Expr::literal(7, 0xFF)), Ok(bv(7, 0x7F)));
    }

    #[test]
    fn width_checks() {
        assert_eq!(
            eval(&Expr::literal(8, 1).add(Expr::literal(16, 1))),
            Err(EvalError::WidthMismatch {
                what: "binary operation",
                left: 8,
                right: 16,
            })
        );
        // shift amounts may be any width
        assert_eq!(
            eval(&Expr::literal(32, 1).shl(Expr::literal(5, 4))),
            Ok(bv(32, 16))
        );
        assert_eq!(
            eval(&Expr::register(Expr::literal(4, 1))),
            Err(EvalError::RegisterIdWidth(4))
        );
        assert_eq!(
            eval(&Expr::memory(Expr::literal(16, 0))),
            Err(EvalError::ValueWidth {
                what: "address",
                expected: 32,
                found: 16,
            })
        );
        assert_eq!(
            eval(&Expr::literal(8, 0).zext(4)),
            Err(EvalError::NarrowingExtension { from: 8, to: 4 })
        );
        assert_eq!(
            eval(&Expr::literal(8, 0).sext(65)),
            Err(EvalError::WidthOverflow(65))
        );
        assert_eq!(
            eval(&Expr::literal(40, 0).concat(Expr::literal(40, 0))),
            Err(EvalError::WidthOverflow(80))
        );
        assert_eq!(
            eval(&Expr::select(
                Expr::literal(1, 1),
                Expr::literal(8, 0),
                Expr::literal(9, 0)
            )),
            Err(EvalError::WidthMismatch {
                what: "select",
                left: 8,
                right: 9,
            })
        );
    }

    #[test]
    fn combinators() {
        assert_eq!(eval(&Expr::literal(8, 0x80).sext(16)), Ok(bv(16, 0xFF80)));
        assert_eq!(eval(&Expr::literal(8, 0x80).zext(16)), Ok(bv(16, 0x0080)));
        assert_eq!(
            eval(&Expr::literal(32, 0xAABCDEF0).extract(12, 8)),
            Ok(bv(8, 0xCD))
        );
        assert_eq!(
            eval(&Expr::literal(8, 0xAA).concat(Expr::literal(24, 0xBCDEF0))),
            Ok(bv(32, 0xAABCDEF0))
        );
        assert_eq!(
            eval(&Expr::literal(32, 5).lt_s(Expr::literal(32, 0xFFFF_FFFF))),
            Ok(bv(1, 0))
        );
        assert_eq!(
            eval(&Expr::literal(32, 5).lt_u(Expr::literal(32, 0xFFFF_FFFF))),
            Ok(bv(1, 1))
        );
        assert_eq!(
            eval(&Expr::Unary(UnaryOp::Neg, Box::new(Expr::literal(8, 1)))),
            Ok(bv(8, 0xFF))
        );
    }

    #[test]
    fn rotate_amount_is_unsigned() {
        let rotate = |amount| {
            eval(&Expr::binary(
                BinaryOp::Rotate,
                Expr::literal(12, 1),
                Expr::literal(8, amount),
            ))
        };
        // 200 mod 12 = 8
        assert_eq!(rotate(200), Ok(bv(12, 0x100)));
        assert_eq!(rotate(200), Ok(bv(12, 1).rotate(200)));
        // 0xFF is 255, not -1: 255 mod 12 = 3
        assert_eq!(rotate(0xFF), Ok(bv(12, 0x008)));
        assert_eq!(rotate(12), Ok(bv(12, 1)));
    }

    #[test]
    fn select_needs_exactly_one() {
        for condition in [Expr::literal(2, 2), Expr::literal(32, 3), Expr::literal(1, 0)] {
            assert_eq!(
                eval(&Expr::select(
                    condition,
                    Expr::literal(8, 1),
                    Expr::literal(8, 9)
                )),
                Ok(bv(8, 9))
            );
        }
        assert_eq!(
            eval(&Expr::select(
                Expr::literal(32, 1),
                Expr::literal(8, 1),
                Expr::literal(8, 9)
            )),
            Ok(bv(8, 1))
        );
    }

    #[test]
    fn left_to_right() {
        let operands = Operands::r_type(bv(5, 3), bv(5, 1), bv(5, 2));
        let evaluator = Evaluator::new(&operands, 4);
        let mut state = hart();
        let expr = Expr::Pc.add(Expr::register(Expr::operand(Format::R, Param::Rs2)));
        assert_eq!(evaluator.evaluate(&expr, &mut state), Ok(bv(32, 208)));
        assert_eq!(
            state.take_accesses(),
            vec![
                Access::GetPc(bv(32, 8)),
                Access::GetRegister {
                    id: bv(5, 2),
                    value: bv(32, 200)
                },
            ]
        );
    }

    #[test]
    fn select_evaluates_both_branches() {
        let operands = Operands::r_type(bv(5, 3), bv(5, 1), bv(5, 2));
        let evaluator = Evaluator::new(&operands, 4);
        for (condition, expected) in [(1, 100), (0, 200)] {
            let mut state = hart();
            let expr = Expr::select(
                Expr::register(Expr::literal(5, 0)).equals(Expr::literal(32, condition ^ 1)),
                Expr::register(Expr::literal(5, 1)),
                Expr::register(Expr::literal(5, 2)),
            );
            assert_eq!(evaluator.evaluate(&expr, &mut state), Ok(bv(32, expected)));
            assert_eq!(
                state.take_accesses(),
                vec![
                    Access::GetRegister {
                        id: bv(5, 0),
                        value: bv(32, 0)
                    },
                    Access::GetRegister {
                        id: bv(5, 1),
                        value: bv(32, 100)
                    },
                    Access::GetRegister {
                        id: bv(5, 2),
                        value: bv(32, 200)
                    },
                ]
            );
        }
    }
}
