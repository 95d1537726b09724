//! Linear scan register allocation (Poletto & Sarkar) over live intervals.
//!
//! 8 callee-saved registers (`$s0..$s7`) and 9 caller-saved (`$t0..$t8`).
//! Intervals that cross a call only ever receive callee-saved registers;
//! acquiring a fresh callee register reserves a `local` slot for the
//! prologue/epilogue save. Spilling picks the farthest-ending active
//! interval and steals its register when that pays off, so allocation is
//! total: any well-formed input succeeds.

use crate::regalloc::liveness::{LiveInterval, Liveness};
use std::collections::HashMap;

pub const CALLEE_SAVED: [&str; 8] = ["$s0", "$s1", "$s2", "$s3", "$s4", "$s5", "$s6", "$s7"];
pub const CALLER_SAVED: [&str; 9] = [
    "$t0", "$t1", "$t2", "$t3", "$t4", "$t5", "$t6", "$t7", "$t8",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Reg(&'static str),
    Local(usize),
    In(usize),
}

impl Slot {
    pub fn is_reg(&self) -> bool {
        matches!(self, Slot::Reg(_))
    }
}

impl std::fmt::Display for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Slot::Reg(name) => write!(f, "{name}"),
            Slot::Local(i) => write!(f, "local[{i}]"),
            Slot::In(i) => write!(f, "in[{i}]"),
        }
    }
}

#[derive(Debug)]
pub struct Allocation {
    pub slots: HashMap<String, Slot>,
    pub local_count: usize,
    /// Callee-saved registers in acquisition order with their reserved
    /// save slots; the rewriter saves them in the prologue and restores
    /// before every `ret`.
    pub callee_saved: Vec<(&'static str, usize)>,
    pub in_count: usize,
    pub out_count: usize,
}

pub fn allocate(liveness: &Liveness, param_count: usize) -> Allocation {
    Lsra::new(&liveness.intervals).run(liveness.out_count, param_count)
}

fn is_callee(reg: &str) -> bool {
    reg.starts_with("$s")
}

struct Lsra<'a> {
    intervals: &'a [LiveInterval],
    /// Indices into `intervals` holding a register, sorted by ascending end.
    active: Vec<usize>,
    /// Registers returned by expired intervals, oldest first.
    free: Vec<&'static str>,
    reg_of: Vec<Option<&'static str>>,
    spill_of: Vec<Option<Slot>>,
    next_callee: usize,
    next_caller: usize,
    local_count: usize,
    callee_saved: Vec<(&'static str, usize)>,
}

impl<'a> Lsra<'a> {
    fn new(intervals: &'a [LiveInterval]) -> Self {
        Lsra {
            intervals,
            active: Vec::new(),
            free: Vec::new(),
            reg_of: vec![None; intervals.len()],
            spill_of: vec![None; intervals.len()],
            next_callee: 0,
            next_caller: 0,
            local_count: 0,
            callee_saved: Vec::new(),
        }
    }

    fn run(mut self, out_count: usize, param_count: usize) -> Allocation {
        let mut order: Vec<usize> = (0..self.intervals.len()).collect();
        order.sort_by_key(|&i| self.intervals[i].start);

        for v in order {
            self.expire_old(v);
            let total = CALLEE_SAVED.len() + CALLER_SAVED.len();
            let callee_available =
                self.free.iter().any(|r| is_callee(r)) || self.next_callee < CALLEE_SAVED.len();
            if self.active.len() == total || (self.intervals[v].after_call && !callee_available) {
                self.spill_at(v);
            } else {
                let reg = self.free_register(self.intervals[v].after_call);
                self.reg_of[v] = Some(reg);
                self.insert_active(v);
            }
        }

        let mut slots = HashMap::new();
        for (i, interval) in self.intervals.iter().enumerate() {
            let slot = match (self.reg_of[i], self.spill_of[i]) {
                (Some(reg), _) => Slot::Reg(reg),
                (None, Some(slot)) => slot,
                (None, None) => continue,
            };
            slots.insert(interval.var.clone(), slot);
        }
        Allocation {
            slots,
            local_count: self.local_count,
            callee_saved: self.callee_saved,
            in_count: param_count.saturating_sub(4),
            out_count,
        }
    }

    fn expire_old(&mut self, v: usize) {
        while let Some(&oldest) = self.active.first() {
            if self.intervals[oldest].end >= self.intervals[v].start {
                break;
            }
            self.active.remove(0);
            if let Some(reg) = self.reg_of[oldest] {
                self.free.push(reg);
            }
        }
    }

    fn insert_active(&mut self, v: usize) {
        let end = self.intervals[v].end;
        let pos = self
            .active
            .partition_point(|&x| self.intervals[x].end <= end);
        self.active.insert(pos, v);
    }

    fn fresh_callee(&mut self) -> &'static str {
        let reg = CALLEE_SAVED[self.next_callee];
        self.next_callee += 1;
        self.callee_saved.push((reg, self.local_count));
        self.local_count += 1;
        reg
    }

    fn free_register(&mut self, after_call: bool) -> &'static str {
        if after_call {
            if let Some(pos) = self.free.iter().position(|r| is_callee(r)) {
                return self.free.remove(pos);
            }
            return self.fresh_callee();
        }
        if !self.free.is_empty() {
            return self.free.remove(0);
        }
        if self.next_caller < CALLER_SAVED.len() {
            let reg = CALLER_SAVED[self.next_caller];
            self.next_caller += 1;
            return reg;
        }
        self.fresh_callee()
    }

    fn spill_slot(&mut self, v: usize) -> Slot {
        match self.intervals[v].param_index {
            // fifth and later parameters already have a stack home
            Some(i) if i >= 4 => Slot::In(i - 4),
            _ => {
                let slot = Slot::Local(self.local_count);
                self.local_count += 1;
                slot
            }
        }
    }

    fn spill_at(&mut self, v: usize) {
        // farthest-ending active interval; a call-crossing interval may
        // only steal a callee-saved register
        let victim = self
            .active
            .iter()
            .rev()
            .copied()
            .find(|&s| !self.intervals[v].after_call || self.reg_of[s].is_some_and(is_callee));
        match victim {
            Some(s) if self.intervals[s].end > self.intervals[v].end => {
                self.reg_of[v] = self.reg_of[s];
                self.reg_of[s] = None;
                self.spill_of[s] = Some(self.spill_slot(s));
                self.active.retain(|&x| x != s);
                self.insert_active(v);
            }
            _ => {
                self.spill_of[v] = Some(self.spill_slot(v));
            }
        }
    }
}
