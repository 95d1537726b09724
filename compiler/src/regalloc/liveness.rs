//! Per-function liveness over Vapor program points.
//!
//! Every variable gets one interval `[start, end]` (inclusive, in line
//! numbers). Reads extend the end, writes create or extend; intervals
//! never shrink. A branch or goto whose target label is already defined
//! is a back-edge: every variable live across the label is extended to
//! the jump, which keeps loop-carried values alive through the whole
//! iteration. A variable is `after_call` iff some call instruction lies
//! strictly inside its range; those must survive in callee-saved state.

use crate::vapor::{VCode, VEntry, VFunction, VOperand};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct LiveInterval {
    pub var: String,
    pub start: usize,
    pub end: usize,
    pub after_call: bool,
    /// Position in the parameter list, when the variable is a parameter.
    /// The allocator spills the fifth and later parameters back to their
    /// `in[i]` arrival slots.
    pub param_index: Option<usize>,
}

#[derive(Debug)]
pub struct Liveness {
    /// In creation order, which is also start order: parameters first,
    /// then first-write order.
    pub intervals: Vec<LiveInterval>,
    /// Maximum number of call arguments beyond the four register-passed
    /// ones, over all call sites.
    pub out_count: usize,
}

pub fn analyze(function: &VFunction) -> Liveness {
    let mut intervals: Vec<LiveInterval> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut call_lines: Vec<usize> = Vec::new();
    let mut out_count = 0usize;

    for (i, param) in function.params.iter().enumerate() {
        index.insert(param.clone(), intervals.len());
        intervals.push(LiveInterval {
            var: param.clone(),
            start: function.header_line,
            end: function.header_line,
            after_call: false,
            param_index: Some(i),
        });
    }

    let mut label_lines: HashMap<&str, usize> = HashMap::new();
    for line in &function.body {
        if let VEntry::Label(name) = &line.entry {
            label_lines.insert(name, line.line);
        }
    }

    fn touch(
        intervals: &mut Vec<LiveInterval>,
        index: &mut HashMap<String, usize>,
        name: &str,
        line: usize,
    ) {
        match index.get(name) {
            Some(&i) => intervals[i].end = intervals[i].end.max(line),
            None => {
                index.insert(name.to_string(), intervals.len());
                intervals.push(LiveInterval {
                    var: name.to_string(),
                    start: line,
                    end: line,
                    after_call: false,
                    param_index: None,
                });
            }
        }
    }

    for line in &function.body {
        let VEntry::Code(code) = &line.entry else {
            continue;
        };
        let at = line.line;
        let read_op = |intervals: &mut Vec<LiveInterval>,
                       index: &mut HashMap<String, usize>,
                       op: &VOperand| {
            if let VOperand::Var(name) = op {
                touch(intervals, index, name, at);
            }
        };
        let back_edge = |intervals: &mut Vec<LiveInterval>, target: &str| {
            if let Some(&def) = label_lines.get(target) {
                if def <= at {
                    for interval in intervals.iter_mut() {
                        if interval.start <= def && interval.end >= def {
                            interval.end = interval.end.max(at);
                        }
                    }
                }
            }
        };

        match code {
            VCode::Assign { dst, src } => {
                read_op(&mut intervals, &mut index, src);
                touch(&mut intervals, &mut index, dst, at);
            }
            VCode::Call { dst, func, args } => {
                read_op(&mut intervals, &mut index, func);
                for arg in args {
                    read_op(&mut intervals, &mut index, arg);
                }
                call_lines.push(at);
                if args.len() > 4 {
                    out_count = out_count.max(args.len() - 4);
                }
                if let Some(dst) = dst {
                    touch(&mut intervals, &mut index, dst, at);
                }
            }
            VCode::Builtin { dst, args, .. } => {
                for arg in args {
                    read_op(&mut intervals, &mut index, arg);
                }
                if let Some(dst) = dst {
                    touch(&mut intervals, &mut index, dst, at);
                }
            }
            VCode::MemWrite { base, src, .. } => {
                touch(&mut intervals, &mut index, base, at);
                read_op(&mut intervals, &mut index, src);
            }
            VCode::MemRead { dst, base, .. } => {
                touch(&mut intervals, &mut index, base, at);
                touch(&mut intervals, &mut index, dst, at);
            }
            VCode::Branch { cond, target, .. } => {
                back_edge(&mut intervals, target);
                read_op(&mut intervals, &mut index, cond);
            }
            VCode::Goto { target } => {
                back_edge(&mut intervals, target);
            }
            VCode::Ret { value } => {
                if let Some(value) = value {
                    read_op(&mut intervals, &mut index, value);
                }
            }
        }
    }

    for interval in &mut intervals {
        interval.after_call = call_lines
            .iter()
            .any(|&c| interval.start < c && c < interval.end);
    }

    Liveness {
        intervals,
        out_count,
    }
}
