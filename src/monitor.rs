//! The interactive monitor: command dispatch and execution control.
//!
//! [`Monitor`] owns a [`Target`] and a [`Watchpoints`] set and runs a
//! gdb-like command loop over a line source. Each iteration reads one line,
//! drains stale device events, splits off the command token, and dispatches
//! it against a fixed, ordered command table:
//!
//! | command | args | effect |
//! |---|---|---|
//! | `help` | `[cmd]` | list commands, or describe one |
//! | `c` | — | continue until halt or watchpoint change |
//! | `q` | — | quit the monitor |
//! | `si` | `[n]` | step `n` instructions (default 1; `-1` runs to completion) |
//! | `info` | `r` \| `w` | dump registers, or list watchpoints |
//! | `x` | `len addr` | dump `len` words of memory from `addr` (hex) |
//! | `p` | `expr` | evaluate and print an expression |
//! | `w` | `expr` | set a watchpoint on an expression |
//! | `d` | `id` | delete a watchpoint |
//!
//! Stepping is coupled to watchpoints at per-instruction granularity: no
//! matter how many instructions a request asks for, every single step is
//! followed by a full watchpoint re-evaluation pass, and the first observed
//! change stops the request on the spot. This is the core behavioral
//! contract of the controller; collapsing it into one post-hoc evaluation
//! would change stop timing.
//!
//! Command errors (bad arguments, unknown watchpoint ids, invalid
//! expressions, target faults) are printed and the loop keeps going. Only
//! `q`, end of input, or a failing output writer end the loop.

pub mod watch;
mod inspect;

use std::io::{self, BufRead, Write};

use crossbeam_channel as cbc;

use crate::expr::{self, EvalErr};
use crate::target::{StepOutcome, Target, TargetFault};
use watch::{UnknownWatchpoint, WatchChange, Watchpoints};

/// An asynchronous event published by a device front end (keyboard, timer).
///
/// The monitor never interprets these. Any events still queued when a
/// command line arrives are stale — produced while the target was running or
/// between commands — and are drained before dispatch so they cannot leak
/// into command handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceEvent {
    /// A key press forwarded by the input front end.
    Key(u8),
    /// A timer tick.
    Tick,
}

/// Configuration flags for [`Monitor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MonitorFlags {
    /// Batch mode: instead of entering the command loop, run the target to
    /// completion once (the `c` behavior) and return.
    ///
    /// Used for unattended runs with no interactive input.
    /// By default, this flag is `false`.
    pub batch: bool,
}

/// Where execution currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecState {
    /// The target is stopped between commands.
    #[default]
    Stopped,
    /// The target is being stepped. Only ever observed inside the
    /// controller's step loop.
    Running,
    /// The target has halted; step and continue requests do nothing.
    Halted,
}

/// Whether the command loop should keep going after a handler returns.
enum Status {
    Continue,
    Quit,
}

/// A stepping request issued to the execution controller.
enum StepRequest {
    /// Execute up to this many instructions.
    Count(u64),
    /// Execute until the target halts or faults.
    UntilHalt,
}

/// Any errors raised while handling a single command.
///
/// All of these are user-visible and recoverable: the dispatcher prints the
/// error and moves on to the next line. The one exception is [`CmdErr::Io`],
/// which means the output writer itself failed and ends the loop.
#[derive(Debug)]
pub enum CmdErr {
    /// A required argument was absent.
    MissingArg(&'static str),
    /// A numeric argument did not parse.
    BadNumber(String),
    /// A step count below the run-to-completion sentinel (`-1`).
    BadStepCount(i64),
    /// An `info` subcommand that is neither `r` nor `w`.
    BadSubcommand(String),
    /// A watchpoint id with no live watchpoint.
    Watch(UnknownWatchpoint),
    /// An expression produced an invalid result.
    Eval(EvalErr),
    /// The target faulted during stepping or a memory scan.
    Fault(TargetFault),
    /// The output writer failed.
    Io(io::Error),
}
impl std::fmt::Display for CmdErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CmdErr::MissingArg(msg)    => f.write_str(msg),
            CmdErr::BadNumber(s)       => write!(f, "cannot parse '{s}' as a number"),
            CmdErr::BadStepCount(n)    => write!(f, "invalid step count {n}"),
            CmdErr::BadSubcommand(s)   => write!(f, "info: unknown subcommand '{s}'"),
            CmdErr::Watch(e)           => e.fmt(f),
            CmdErr::Eval(e)            => write!(f, "invalid expression: {e}"),
            CmdErr::Fault(e)           => write!(f, "target fault: {e}"),
            CmdErr::Io(e)              => write!(f, "output error: {e}"),
        }
    }
}
impl std::error::Error for CmdErr {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CmdErr::Watch(e) => Some(e),
            CmdErr::Eval(e)  => Some(e),
            CmdErr::Fault(e) => Some(e),
            CmdErr::Io(e)    => Some(e),
            _ => None,
        }
    }
}
impl From<UnknownWatchpoint> for CmdErr {
    fn from(value: UnknownWatchpoint) -> Self {
        Self::Watch(value)
    }
}
impl From<EvalErr> for CmdErr {
    fn from(value: EvalErr) -> Self {
        Self::Eval(value)
    }
}
impl From<TargetFault> for CmdErr {
    fn from(value: TargetFault) -> Self {
        Self::Fault(value)
    }
}
impl From<io::Error> for CmdErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

/// One entry of the command table.
struct Command<T, W> {
    name: &'static str,
    desc: &'static str,
    run: fn(&mut Monitor<T>, Option<&str>, &mut W) -> Result<Status, CmdErr>,
}

/// The interactive debugging monitor.
///
/// See the [module docs](self) for the command surface.
#[derive(Debug)]
pub struct Monitor<T> {
    /// The simulator being debugged.
    pub target: T,

    /// The live watchpoints, re-evaluated after every instruction step.
    pub watchpoints: Watchpoints,

    /// Configuration settings for the monitor.
    pub flags: MonitorFlags,

    state: ExecState,
    events: Option<cbc::Receiver<DeviceEvent>>,
}

impl<T: Target> Monitor<T> {
    /// Creates a monitor over the given target, with default flags.
    pub fn new(target: T) -> Self {
        Self::with_flags(target, MonitorFlags::default())
    }

    /// Creates a monitor over the given target with the provided flags.
    pub fn with_flags(target: T, flags: MonitorFlags) -> Self {
        Self {
            target,
            watchpoints: Watchpoints::new(),
            flags,
            state: ExecState::Stopped,
            events: None,
        }
    }

    /// Attaches the channel on which device front ends publish events.
    ///
    /// Events still queued when a command is dispatched are stale and get
    /// drained without being observed.
    pub fn set_event_channel(&mut self, rx: cbc::Receiver<DeviceEvent>) {
        self.events = Some(rx);
    }

    /// Where execution currently stands. Between commands this is always
    /// [`ExecState::Stopped`] or [`ExecState::Halted`].
    pub fn exec_state(&self) -> ExecState {
        self.state
    }

    fn command_table<W: Write>() -> [Command<T, W>; 9] {
        [
            Command { name: "help", desc: "Display information about all supported commands", run: Self::cmd_help },
            Command { name: "c",    desc: "Continue execution until halt or watchpoint change", run: Self::cmd_c },
            Command { name: "q",    desc: "Quit the monitor", run: Self::cmd_q },
            Command { name: "si",   desc: "Execute one or more instructions (si [N])", run: Self::cmd_si },
            Command { name: "info", desc: "Dump registers (info r) or list watchpoints (info w)", run: Self::cmd_info },
            Command { name: "x",    desc: "Scan memory (x LEN ADDR)", run: Self::cmd_x },
            Command { name: "p",    desc: "Evaluate and print an expression", run: Self::cmd_p },
            Command { name: "w",    desc: "Set a watchpoint on an expression", run: Self::cmd_w },
            Command { name: "d",    desc: "Delete a watchpoint by id", run: Self::cmd_d },
        ]
    }

    /// Runs the monitor over a line source, writing all output to `out`.
    ///
    /// Returns when the input is exhausted or the `q` command is issued.
    /// In batch mode ([`MonitorFlags::batch`]), the input is never read:
    /// the target is run to completion once and the monitor returns.
    ///
    /// The only error this returns is a failure of the output writer; every
    /// command-level error is printed to `out` and the loop continues.
    pub fn run<R: BufRead, W: Write>(&mut self, mut input: R, mut out: W) -> io::Result<()> {
        if self.flags.batch {
            return match self.advance(StepRequest::UntilHalt, &mut out) {
                Ok(()) => Ok(()),
                Err(CmdErr::Io(e)) => Err(e),
                Err(e) => writeln!(out, "{e}"),
            };
        }

        let table = Self::command_table::<W>();
        // The line buffer is owned here and recycled every iteration;
        // its contents never outlive one dispatch.
        let mut line = String::new();
        loop {
            line.clear();
            if input.read_line(&mut line)? == 0 {
                break; // end of input
            }
            self.drain_events();

            let mut parts = line.trim().splitn(2, char::is_whitespace);
            let cmd = match parts.next().filter(|c| !c.is_empty()) {
                Some(c) => c,
                None => continue,
            };
            let args = parts.next().map(str::trim).filter(|a| !a.is_empty());

            match table.iter().find(|c| c.name == cmd) {
                Some(c) => match (c.run)(self, args, &mut out) {
                    Ok(Status::Continue) => {}
                    Ok(Status::Quit) => break,
                    Err(CmdErr::Io(e)) => return Err(e),
                    Err(e) => writeln!(out, "{e}")?,
                },
                None => writeln!(out, "Unknown command '{cmd}'")?,
            }
        }
        Ok(())
    }

    /// Discards any device events queued since the last command.
    fn drain_events(&mut self) {
        let Some(rx) = &self.events else { return };
        let mut dropped = 0usize;
        while rx.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            log::trace!("dropped {dropped} stale device event(s)");
        }
    }

    /// The execution controller: drives the target one instruction at a
    /// time, re-evaluating every watchpoint after each step.
    ///
    /// The request ends at the first of: the count running out, the target
    /// halting, a fatal target fault, or any watchpoint changing value.
    fn advance<W: Write>(&mut self, req: StepRequest, out: &mut W) -> Result<(), CmdErr> {
        if self.state == ExecState::Halted {
            writeln!(out, "The target has halted. Nothing to execute.")?;
            return Ok(());
        }

        self.state = ExecState::Running;
        let mut executed: u64 = 0;
        let result = loop {
            if let StepRequest::Count(n) = req {
                if executed >= n {
                    break Ok(ExecState::Stopped);
                }
            }

            match self.target.step() {
                Ok(StepOutcome::Ran) => executed += 1,
                Ok(StepOutcome::Halted) => {
                    writeln!(out, "Target halted.")?;
                    break Ok(ExecState::Halted);
                }
                Err(fault) => break Err(CmdErr::Fault(fault)),
            }

            // The pass observes the state immediately after the instruction
            // that just executed, never a stale or future state.
            let changes = self.watchpoints.reevaluate(&self.target);
            if !changes.is_empty() {
                for change in &changes {
                    report_change(change, out)?;
                }
                break Ok(ExecState::Stopped);
            }
        };
        log::trace!("request ran {executed} instruction(s)");

        match result {
            Ok(state) => {
                self.state = state;
                Ok(())
            }
            Err(e) => {
                self.state = ExecState::Stopped;
                Err(e)
            }
        }
    }

    fn cmd_help<W: Write>(&mut self, args: Option<&str>, out: &mut W) -> Result<Status, CmdErr> {
        match args {
            None => {
                for c in Self::command_table::<W>() {
                    writeln!(out, "{} - {}", c.name, c.desc)?;
                }
            }
            Some(name) => {
                let name = first_token(name);
                match Self::command_table::<W>().iter().find(|c| c.name == name) {
                    Some(c) => writeln!(out, "{} - {}", c.name, c.desc)?,
                    None => writeln!(out, "Unknown command '{name}'")?,
                }
            }
        }
        Ok(Status::Continue)
    }

    fn cmd_c<W: Write>(&mut self, _args: Option<&str>, out: &mut W) -> Result<Status, CmdErr> {
        self.advance(StepRequest::UntilHalt, out)?;
        Ok(Status::Continue)
    }

    fn cmd_q<W: Write>(&mut self, _args: Option<&str>, _out: &mut W) -> Result<Status, CmdErr> {
        Ok(Status::Quit)
    }

    fn cmd_si<W: Write>(&mut self, args: Option<&str>, out: &mut W) -> Result<Status, CmdErr> {
        let req = match args {
            None => StepRequest::Count(1),
            Some(s) => {
                let s = first_token(s);
                let n: i64 = s.parse().map_err(|_| CmdErr::BadNumber(s.to_string()))?;
                match n {
                    -1 => StepRequest::UntilHalt,
                    n if n < -1 => return Err(CmdErr::BadStepCount(n)),
                    // a request for zero instructions still steps once
                    0 => StepRequest::Count(1),
                    n => StepRequest::Count(n as u64),
                }
            }
        };
        self.advance(req, out)?;
        Ok(Status::Continue)
    }

    fn cmd_info<W: Write>(&mut self, args: Option<&str>, out: &mut W) -> Result<Status, CmdErr> {
        let sub = args.ok_or(CmdErr::MissingArg("info: missing subcommand ('r' or 'w')"))?;
        match first_token(sub) {
            "r" => inspect::dump_registers(&self.target.regs(), out)?,
            "w" => self.list_watchpoints(out)?,
            other => return Err(CmdErr::BadSubcommand(other.to_string())),
        }
        Ok(Status::Continue)
    }

    fn cmd_x<W: Write>(&mut self, args: Option<&str>, out: &mut W) -> Result<Status, CmdErr> {
        let args = args.ok_or(CmdErr::MissingArg("x: missing length and start address"))?;
        let mut parts = args.split_whitespace();
        let len_s = match parts.next() {
            Some(s) => s,
            None => return Err(CmdErr::MissingArg("x: missing length and start address")),
        };
        let addr_s = parts
            .next()
            .ok_or(CmdErr::MissingArg("x: missing start address"))?;

        let len: u32 = len_s.parse().map_err(|_| CmdErr::BadNumber(len_s.to_string()))?;
        let addr = parse_hex(addr_s).ok_or_else(|| CmdErr::BadNumber(addr_s.to_string()))?;

        inspect::scan_memory(&self.target, len, addr, out)?;
        Ok(Status::Continue)
    }

    fn cmd_p<W: Write>(&mut self, args: Option<&str>, out: &mut W) -> Result<Status, CmdErr> {
        let src = args.ok_or(CmdErr::MissingArg("p: missing expression"))?;
        let value = expr::eval(src, &self.target)?;
        writeln!(out, "0x{value:x} ({value})")?;
        Ok(Status::Continue)
    }

    fn cmd_w<W: Write>(&mut self, args: Option<&str>, out: &mut W) -> Result<Status, CmdErr> {
        let src = args.ok_or(CmdErr::MissingArg("w: missing expression"))?;
        let wp = self.watchpoints.add(src, &self.target);
        writeln!(out, "Watchpoint {}: {} = {}", wp.id(), wp.expr(), fmt_value(wp.last_value()))?;
        Ok(Status::Continue)
    }

    fn cmd_d<W: Write>(&mut self, args: Option<&str>, out: &mut W) -> Result<Status, CmdErr> {
        let s = first_token(args.ok_or(CmdErr::MissingArg("d: missing watchpoint id"))?);
        let id: u32 = s.parse().map_err(|_| CmdErr::BadNumber(s.to_string()))?;
        let wp = self.watchpoints.remove(id)?;
        writeln!(out, "Deleted watchpoint {}: {}", wp.id(), wp.expr())?;
        Ok(Status::Continue)
    }

    fn list_watchpoints<W: Write>(&self, out: &mut W) -> io::Result<()> {
        if self.watchpoints.is_empty() {
            return writeln!(out, "No watchpoints.");
        }
        for wp in self.watchpoints.iter() {
            writeln!(out, "{}: {} = {}", wp.id(), wp.expr(), fmt_value(wp.last_value()))?;
        }
        Ok(())
    }
}

/// The first whitespace-delimited token of an argument string.
fn first_token(s: &str) -> &str {
    s.split_whitespace().next().unwrap_or("")
}

/// Parses a hexadecimal address, with or without a `0x` prefix.
fn parse_hex(s: &str) -> Option<u32> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    u32::from_str_radix(digits, 16).ok()
}

fn fmt_value(value: Option<u32>) -> String {
    match value {
        Some(v) => format!("0x{v:x} ({v})"),
        None => String::from("<invalid>"),
    }
}

fn report_change(change: &WatchChange, out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "Hit watchpoint {}: {}", change.id, change.expr)?;
    writeln!(out, "  old = {}", fmt_value(change.old))?;
    writeln!(out, "  new = {}", fmt_value(change.new))
}
