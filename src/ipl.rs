//! Loading a Logisim "v2.0 raw" memory image into a backend.

use std::io::BufRead;

use anyhow::{anyhow, bail, Context};

use crate::{BitVector, MachineState, BYTE_WIDTH};

/// Read a Logisim memory image and store it, one byte at a time through
/// [`MachineState::set_memory`], starting at `base`.
///
/// The first line must be `v2.0 raw`. Every following line is either a hex
/// word, or `count*word` for `count` copies of it. Words are 32 bits and are
/// stored little-endian. Returns the number of bytes stored.
///
/// Fails if the backend has an exception pending once the image is stored
/// (typically a store fault from an image that doesn't fit).
pub fn initial_program_load<M: MachineState, R: BufRead>(
    state: &mut M,
    base: u64,
    reader: R,
) -> anyhow::Result<u64> {
    let mut lines = reader.lines();
    match lines.next() {
        None => bail!("unexpected eof"),
        Some(Err(x)) => return Err(x.into()),
        Some(Ok(x)) => {
            if x.trim() != "v2.0 raw" {
                bail!("invalid Logisim memory image header (file must begin with a line \"v2.0 raw\")")
            }
        }
    }
    let mut address = BitVector::new(M::XLEN, base);
    let one = BitVector::new(M::XLEN, 1);
    let mut stored = 0;
    for (number, line) in lines.enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (count, value) = match line.split_once('*') {
            None => (1, line),
            Some((count, value)) => (
                count
                    .parse::<u64>()
                    .with_context(|| format!("unable to parse count on line {}", number + 2))?,
                value,
            ),
        };
        let value = u32::from_str_radix(value, 16)
            .with_context(|| format!("unable to parse value on line {}", number + 2))?;
        for _ in 0..count {
            for byte in value.to_le_bytes() {
                state.set_memory(address, BitVector::new(BYTE_WIDTH, byte as u64));
                address = address + one;
                stored += 1;
            }
        }
    }
    if let Some(exception) = state.exception_status() {
        return Err(anyhow!("{exception:?} while storing a {stored}-byte image at {base:#x}"));
    }
    Ok(stored)
}
