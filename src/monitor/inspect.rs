//! Read-only views of target state: the register dump and the memory scan.

use std::io::{self, Write};

use crate::target::{Gpr, Registers, Target, Width};

use super::CmdErr;

/// Prints every general-purpose register in register-file order, then the
/// PC. Each line carries the 32-bit, 16-bit, and both 8-bit views, in hex
/// and signed decimal.
pub(crate) fn dump_registers(regs: &Registers, out: &mut impl Write) -> io::Result<()> {
    for r in Gpr::ALL {
        let word = regs.word(r);
        let half = regs.half(r);
        let lo = regs.byte_lo(r);
        let hi = regs.byte_hi(r);
        writeln!(
            out,
            "{:<4} 0x{word:08x} {:<11} 0x{half:04x} {:<6} 0x{lo:02x} {:<4} 0x{hi:02x} {}",
            r.name(),
            word as i32,
            half as i16,
            lo as i8,
            hi as i8,
        )?;
    }
    writeln!(out, "{:<4} 0x{:08x} {}", "pc", regs.pc(), regs.pc() as i32)
}

/// Prints `len` lines, one per 4-byte block starting at `start`: the block
/// address, the little-endian word read there, and its 4 bytes.
///
/// Reads go through the target's virtual-address read; an unmapped block
/// aborts the scan with the fault.
pub(crate) fn scan_memory<T: Target>(
    target: &T,
    len: u32,
    start: u32,
    out: &mut impl Write,
) -> Result<(), CmdErr> {
    let mut addr = start;
    for _ in 0..len {
        let word = target.read_mem(addr, Width::Word)?;
        let [b0, b1, b2, b3] = word.to_le_bytes();
        writeln!(out, "0x{addr:08x}: 0x{word:08x}  {b0:02x} {b1:02x} {b2:02x} {b3:02x}")?;
        addr = addr.wrapping_add(4);
    }
    Ok(())
}
