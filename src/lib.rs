//! A gdb-like interactive debugging monitor for 32-bit CPU
//! instruction-set simulators.
//!
//! This crate is the control plane of a simulator, not the simulator itself.
//! It reads commands from a line source, drives execution one instruction at
//! a time, inspects registers and memory, evaluates C-like expressions, and
//! tracks watchpoints whose expressions are re-checked after every single
//! step. The machine being debugged sits behind the [`target::Target`]
//! trait; any simulator that can step, read memory, and snapshot its
//! registers can be plugged in.
//!
//! The crate is split into three modules:
//! - [`target`]: the seam between the monitor and the simulator
//!   (the [`Target`](target::Target) trait and the register model);
//! - [`expr`]: the expression evaluator used by the `p` command and by
//!   watchpoints;
//! - [`monitor`]: the command loop, the execution controller, and the
//!   watchpoint set.
//!
//! # Usage
//!
//! Implement [`Target`](target::Target) for the simulator, wrap it in a
//! [`Monitor`](monitor::Monitor), and hand the monitor a line source and an
//! output writer:
//!
//! ```
//! use minimon::monitor::Monitor;
//! use minimon::target::{Registers, StepOutcome, Target, TargetFault, Width};
//!
//! /// A machine that decrements `eax` once per instruction and halts at 0.
//! struct Countdown {
//!     count: u32,
//! }
//! impl Target for Countdown {
//!     fn step(&mut self) -> Result<StepOutcome, TargetFault> {
//!         if self.count == 0 {
//!             return Ok(StepOutcome::Halted);
//!         }
//!         self.count -= 1;
//!         Ok(StepOutcome::Ran)
//!     }
//!     fn read_mem(&self, addr: u32, _width: Width) -> Result<u32, TargetFault> {
//!         Err(TargetFault::Unmapped { addr })
//!     }
//!     fn regs(&self) -> Registers {
//!         let mut gprs = [0; 8];
//!         gprs[0] = self.count;
//!         Registers::new(gprs, 0)
//!     }
//! }
//!
//! let mut mon = Monitor::new(Countdown { count: 10 });
//!
//! // Watch for eax reaching 5, then continue. The run stops at the exact
//! // instruction after which the watched expression changes value.
//! let session = "w $eax == 5\nc\nq\n";
//! let mut out = Vec::new();
//! mon.run(session.as_bytes(), &mut out).unwrap();
//!
//! let out = String::from_utf8(out).unwrap();
//! assert!(out.contains("Hit watchpoint 1: $eax == 5"));
//! assert_eq!(mon.target.count, 5);
//! ```
//!
//! Interactive use is the same loop over stdin and stdout:
//!
//! ```no_run
//! # use minimon::monitor::Monitor;
//! # use minimon::target::{Registers, StepOutcome, Target, TargetFault, Width};
//! # struct Countdown { count: u32 }
//! # impl Target for Countdown {
//! #     fn step(&mut self) -> Result<StepOutcome, TargetFault> { Ok(StepOutcome::Halted) }
//! #     fn read_mem(&self, addr: u32, _width: Width) -> Result<u32, TargetFault> {
//! #         Err(TargetFault::Unmapped { addr })
//! #     }
//! #     fn regs(&self) -> Registers { Registers::new([0; 8], 0) }
//! # }
//! let mut mon = Monitor::new(Countdown { count: 10 });
//! let stdin = std::io::stdin();
//! mon.run(stdin.lock(), std::io::stdout()).unwrap();
//! ```

#![warn(missing_docs)]

pub mod expr;
pub mod monitor;
pub mod target;
