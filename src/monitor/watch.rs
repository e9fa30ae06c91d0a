//! Watchpoints: user-registered expressions tracked across instruction steps.
//!
//! A [`Watchpoint`] binds an id to an expression string and remembers the
//! last `(value, validity)` pair it evaluated to. [`Watchpoints`] owns the
//! live set; the execution controller calls [`Watchpoints::reevaluate`]
//! after every single instruction and stops the current request when the
//! pass reports any [`WatchChange`].

use crate::expr;
use crate::target::Target;

/// A single tracked expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Watchpoint {
    id: u32,
    expr: String,
    /// Last evaluation result; `None` means the last evaluation was invalid.
    last: Option<u32>,
}
impl Watchpoint {
    /// The watchpoint's id, unique among live watchpoints and stable for
    /// the whole session.
    pub fn id(&self) -> u32 {
        self.id
    }
    /// The expression text, as captured at creation.
    pub fn expr(&self) -> &str {
        &self.expr
    }
    /// The value from the most recent evaluation,
    /// or `None` if that evaluation was invalid.
    pub fn last_value(&self) -> Option<u32> {
        self.last
    }
}

/// A value change observed during a re-evaluation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchChange {
    /// Id of the watchpoint that changed.
    pub id: u32,
    /// Its expression text.
    pub expr: String,
    /// The stored value before this pass (`None` = invalid).
    pub old: Option<u32>,
    /// The value after this pass (`None` = invalid).
    pub new: Option<u32>,
}

/// Deletion referenced an id with no live watchpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownWatchpoint(pub u32);
impl std::fmt::Display for UnknownWatchpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "no watchpoint with id {}", self.0)
    }
}
impl std::error::Error for UnknownWatchpoint {}

/// The set of live watchpoints, in creation order.
///
/// Ids are assigned monotonically and never reused, so references a user
/// holds onto stay unambiguous for the whole session.
#[derive(Debug, Default)]
pub struct Watchpoints {
    points: Vec<Watchpoint>,
    next_id: u32,
}

impl Watchpoints {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self { points: Vec::new(), next_id: 1 }
    }

    /// Creates a watchpoint on the given expression, seeding its baseline
    /// by evaluating once against the target's current state.
    ///
    /// An invalid initial evaluation is recorded as such, not rejected:
    /// the watchpoint still fires once the expression becomes evaluable
    /// (or vice versa).
    pub fn add(&mut self, expr: impl Into<String>, target: &impl Target) -> &Watchpoint {
        let expr = expr.into();
        let last = expr::eval(&expr, target).ok();
        let id = self.next_id;
        self.next_id += 1;

        log::debug!("watchpoint {id} set on `{expr}` (baseline {last:?})");
        self.points.push(Watchpoint { id, expr, last });
        match self.points.last() {
            Some(wp) => wp,
            None => unreachable!("watchpoint was just pushed"),
        }
    }

    /// Removes the watchpoint with the given id, returning it.
    pub fn remove(&mut self, id: u32) -> Result<Watchpoint, UnknownWatchpoint> {
        match self.points.iter().position(|wp| wp.id == id) {
            Some(i) => {
                log::debug!("watchpoint {id} deleted");
                Ok(self.points.remove(i))
            }
            None => Err(UnknownWatchpoint(id)),
        }
    }

    /// The number of live watchpoints.
    pub fn len(&self) -> usize {
        self.points.len()
    }
    /// Whether there are no live watchpoints.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
    /// Iterates over live watchpoints in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &Watchpoint> {
        self.points.iter()
    }

    /// Re-evaluates every live watchpoint against the target's current
    /// state, updating stored `(value, validity)` pairs and returning the
    /// changes observed in this pass (possibly none).
    pub fn reevaluate(&mut self, target: &impl Target) -> Vec<WatchChange> {
        let mut changed = Vec::new();
        for wp in &mut self.points {
            let new = expr::eval(&wp.expr, target).ok();
            if new != wp.last {
                changed.push(WatchChange {
                    id: wp.id,
                    expr: wp.expr.clone(),
                    old: wp.last,
                    new,
                });
                wp.last = new;
            }
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::{UnknownWatchpoint, Watchpoints};
    use crate::target::fixture::ScriptedCpu;
    use crate::target::gpr_consts::EAX;

    #[test]
    fn test_create_seeds_baseline() {
        let mut cpu = ScriptedCpu::new();
        cpu.set_reg(EAX, 5);
        let mut wps = Watchpoints::new();

        let wp = wps.add("$eax", &cpu);
        assert_eq!(wp.id(), 1);
        assert_eq!(wp.expr(), "$eax");
        assert_eq!(wp.last_value(), Some(5));
    }

    #[test]
    fn test_invalid_baseline_still_created() {
        let cpu = ScriptedCpu::new();
        let mut wps = Watchpoints::new();

        let wp = wps.add("[0x9000]", &cpu);
        assert_eq!(wp.last_value(), None);
        assert_eq!(wps.len(), 1);
    }

    #[test]
    fn test_ids_not_reused_after_delete() {
        let cpu = ScriptedCpu::new();
        let mut wps = Watchpoints::new();

        assert_eq!(wps.add("1", &cpu).id(), 1);
        assert_eq!(wps.add("2", &cpu).id(), 2);
        assert!(wps.remove(2).is_ok());
        assert_eq!(wps.add("3", &cpu).id(), 3);

        let ids: Vec<_> = wps.iter().map(|wp| wp.id()).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn test_remove_unknown() {
        let cpu = ScriptedCpu::new();
        let mut wps = Watchpoints::new();
        wps.add("1", &cpu);

        assert_eq!(wps.remove(7), Err(UnknownWatchpoint(7)));
        assert_eq!(wps.len(), 1);
    }

    #[test]
    fn test_reevaluate_reports_changes_once() {
        let mut cpu = ScriptedCpu::new();
        let mut wps = Watchpoints::new();
        wps.add("$eax + 1", &cpu);

        assert!(wps.reevaluate(&cpu).is_empty());

        cpu.set_reg(EAX, 41);
        let changes = wps.reevaluate(&cpu);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].old, Some(1));
        assert_eq!(changes[0].new, Some(42));

        // stable until the value moves again
        assert!(wps.reevaluate(&cpu).is_empty());
    }

    #[test]
    fn test_reevaluate_validity_flip_is_a_change() {
        let mut cpu = ScriptedCpu::new();
        cpu.write_word(0x1000, 3);
        let mut wps = Watchpoints::new();
        wps.add("[0x1000] / $eax", &cpu); // eax = 0: invalid baseline

        assert!(wps.reevaluate(&cpu).is_empty());

        cpu.set_reg(EAX, 1);
        let changes = wps.reevaluate(&cpu);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].old, None);
        assert_eq!(changes[0].new, Some(3));
    }

    #[test]
    fn test_deleted_watchpoint_not_reevaluated() {
        let mut cpu = ScriptedCpu::new();
        let mut wps = Watchpoints::new();
        let id = wps.add("$eax", &cpu).id();
        wps.remove(id).unwrap();

        cpu.set_reg(EAX, 9);
        assert!(wps.reevaluate(&cpu).is_empty());
    }
}
