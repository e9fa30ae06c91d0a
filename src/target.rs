//! The seam between the monitor and the simulator it debugs.
//!
//! The monitor never owns CPU state. It drives a [`Target`] — anything that
//! can execute one instruction at a time, service virtual-address memory
//! reads, and produce a [`Registers`] snapshot. The simulator proper
//! (instruction decoding, translation, devices) lives behind this trait.
//!
//! The register model is a 32-bit machine with eight general-purpose
//! registers. Each register exposes a 32-bit view, a 16-bit low-half view,
//! and two 8-bit views (low and high byte of the low half), addressable from
//! expressions by their conventional names (`eax`, `ax`, `al`, `ah`, ...).

use std::fmt;
use std::str::FromStr;

const NAMES_32: [&str; 8] = ["eax", "ecx", "edx", "ebx", "esp", "ebp", "esi", "edi"];
const NAMES_16: [&str; 8] = ["ax", "cx", "dx", "bx", "sp", "bp", "si", "di"];
const NAMES_8L: [&str; 4] = ["al", "cl", "dl", "bl"];
const NAMES_8H: [&str; 4] = ["ah", "ch", "dh", "bh"];

/// A general-purpose register of the target machine.
///
/// A `Gpr` can either be selected from [`gpr_consts`], or constructed
/// from a register number with [`Gpr::try_from`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Gpr(pub(crate) u8);

/// Register constants!
pub mod gpr_consts {
    use super::Gpr;

    #[allow(missing_docs)]
    pub const EAX: Gpr = Gpr(0);
    #[allow(missing_docs)]
    pub const ECX: Gpr = Gpr(1);
    #[allow(missing_docs)]
    pub const EDX: Gpr = Gpr(2);
    #[allow(missing_docs)]
    pub const EBX: Gpr = Gpr(3);
    #[allow(missing_docs)]
    pub const ESP: Gpr = Gpr(4);
    #[allow(missing_docs)]
    pub const EBP: Gpr = Gpr(5);
    #[allow(missing_docs)]
    pub const ESI: Gpr = Gpr(6);
    #[allow(missing_docs)]
    pub const EDI: Gpr = Gpr(7);
}

impl Gpr {
    /// All general-purpose registers, in register-file order.
    pub const ALL: [Gpr; 8] = [
        Gpr(0), Gpr(1), Gpr(2), Gpr(3), Gpr(4), Gpr(5), Gpr(6), Gpr(7),
    ];

    /// Gets the register number of this [`Gpr`]. This is always between 0 and 7.
    pub fn reg_no(self) -> u8 {
        self.0
    }

    /// The register's 32-bit name (`eax`, `ecx`, ...).
    pub fn name(self) -> &'static str {
        NAMES_32[usize::from(self.0)]
    }
}
impl fmt::Display for Gpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
impl From<Gpr> for usize {
    fn from(value: Gpr) -> Self {
        usize::from(value.0)
    }
}
impl TryFrom<u8> for Gpr {
    type Error = u8;

    /// Tries to convert a register number into a [`Gpr`],
    /// returning the original number on failure.
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0..=7 => Ok(Gpr(value)),
            _ => Err(value),
        }
    }
}

/// A read-only snapshot of the target's register file.
///
/// Snapshots are produced by [`Target::regs`] and observed by the inspector
/// and the expression evaluator; the monitor never writes registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registers {
    gprs: [u32; 8],
    pc: u32,
}
impl Registers {
    /// Creates a snapshot from the general-purpose registers
    /// (in register-file order) and the program counter.
    pub fn new(gprs: [u32; 8], pc: u32) -> Self {
        Self { gprs, pc }
    }

    /// The program counter.
    pub fn pc(&self) -> u32 {
        self.pc
    }
    /// The full 32-bit view of a register.
    pub fn word(&self, r: Gpr) -> u32 {
        self.gprs[usize::from(r)]
    }
    /// The 16-bit low-half view of a register (`ax` for `eax`, ...).
    pub fn half(&self, r: Gpr) -> u16 {
        self.word(r) as u16
    }
    /// The low byte of a register's low half (`al` for `eax`, ...).
    pub fn byte_lo(&self, r: Gpr) -> u8 {
        self.word(r) as u8
    }
    /// The high byte of a register's low half (`ah` for `eax`, ...).
    pub fn byte_hi(&self, r: Gpr) -> u8 {
        (self.word(r) >> 8) as u8
    }
}
impl std::ops::Index<Gpr> for Registers {
    type Output = u32;

    fn index(&self, index: Gpr) -> &Self::Output {
        &self.gprs[usize::from(index)]
    }
}

/// A width-qualified register reference, as written in an expression.
///
/// This resolves a name like `$ax` or `$ah` to the corresponding view of a
/// [`Registers`] snapshot. Parsing accepts the 32-bit names (`eax`..`edi`),
/// the 16-bit names (`ax`..`di`), the byte names of the first four registers
/// (`al`/`ah`, `cl`/`ch`, `dl`/`dh`, `bl`/`bh`), and `pc` (or `eip`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegRef {
    /// The full 32-bit register.
    Word(Gpr),
    /// The 16-bit low half.
    Half(Gpr),
    /// The low byte of the low half.
    ByteLo(Gpr),
    /// The high byte of the low half.
    ByteHi(Gpr),
    /// The program counter.
    Pc,
}
impl RegRef {
    /// Reads this reference out of a register snapshot,
    /// zero-extended to 32 bits.
    pub fn read(self, regs: &Registers) -> u32 {
        match self {
            RegRef::Word(r)   => regs.word(r),
            RegRef::Half(r)   => u32::from(regs.half(r)),
            RegRef::ByteLo(r) => u32::from(regs.byte_lo(r)),
            RegRef::ByteHi(r) => u32::from(regs.byte_hi(r)),
            RegRef::Pc        => regs.pc(),
        }
    }
}
impl FromStr for RegRef {
    type Err = UnknownRegister;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.to_lowercase();
        if let Some(i) = NAMES_32.iter().position(|&n| n == name) {
            return Ok(RegRef::Word(Gpr(i as u8)));
        }
        if let Some(i) = NAMES_16.iter().position(|&n| n == name) {
            return Ok(RegRef::Half(Gpr(i as u8)));
        }
        if let Some(i) = NAMES_8L.iter().position(|&n| n == name) {
            return Ok(RegRef::ByteLo(Gpr(i as u8)));
        }
        if let Some(i) = NAMES_8H.iter().position(|&n| n == name) {
            return Ok(RegRef::ByteHi(Gpr(i as u8)));
        }
        match &*name {
            "pc" | "eip" => Ok(RegRef::Pc),
            _ => Err(UnknownRegister),
        }
    }
}
impl fmt::Display for RegRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            RegRef::Word(r) => write!(f, "${r}"),
            RegRef::Half(r) => write!(f, "${}", NAMES_16[usize::from(r)]),
            RegRef::ByteLo(r) => match NAMES_8L.get(usize::from(r)) {
                Some(n) => write!(f, "${n}"),
                None => write!(f, "${}.lo", NAMES_16[usize::from(r)]),
            },
            RegRef::ByteHi(r) => match NAMES_8H.get(usize::from(r)) {
                Some(n) => write!(f, "${n}"),
                None => write!(f, "${}.hi", NAMES_16[usize::from(r)]),
            },
            RegRef::Pc => f.write_str("$pc"),
        }
    }
}

/// A register name that does not exist on the target machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownRegister;
impl fmt::Display for UnknownRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("unknown register")
    }
}
impl std::error::Error for UnknownRegister {}

/// The width of a virtual-address memory read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    /// 1 byte.
    Byte,
    /// 2 bytes.
    Half,
    /// 4 bytes (the platform word size).
    Word,
}
impl Width {
    /// The number of bytes this width covers.
    pub fn bytes(self) -> u32 {
        match self {
            Width::Byte => 1,
            Width::Half => 2,
            Width::Word => 4,
        }
    }
}

/// The result of advancing the target by one instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// One instruction was executed.
    Ran,
    /// The target has halted; no instruction was executed and
    /// no further stepping is possible.
    Halted,
}

/// A fault reported by the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetFault {
    /// A virtual address had no mapping.
    Unmapped {
        /// The faulting virtual address.
        addr: u32,
    },
    /// The simulator reported an unrecoverable fault while executing.
    ///
    /// This ends the current step/continue request but not the monitor.
    Fatal(String),
}
impl fmt::Display for TargetFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetFault::Unmapped { addr } => write!(f, "unmapped address 0x{addr:08x}"),
            TargetFault::Fatal(msg)        => write!(f, "fatal fault: {msg}"),
        }
    }
}
impl std::error::Error for TargetFault {}

/// A simulator that the monitor can debug.
///
/// All monitor components are serialized on one control thread, so `step` is
/// the only mutating entry point and readers never observe a half-executed
/// instruction.
pub trait Target {
    /// Advances the target by exactly one instruction.
    fn step(&mut self) -> Result<StepOutcome, TargetFault>;

    /// Reads `width` bytes at the given virtual address as a
    /// zero-extended little-endian value.
    ///
    /// This must not mutate observable target state; the expression
    /// evaluator and the memory scanner call it freely.
    fn read_mem(&self, addr: u32, width: Width) -> Result<u32, TargetFault>;

    /// Takes a snapshot of the register file.
    fn regs(&self) -> Registers;
}
impl dyn Target {} // assert Target is dyn safe
