//! Rewrites each Vapor function into VaporM: every variable operand is
//! replaced by its allocated register or stack slot.
//!
//! MIPS-facing constraints handled here rather than in the allocator:
//! memory-backed operands (`local[i]`, `in[i]`, `out[i]`) are shuttled
//! through the scratch registers `$v0`/`$v1`, which LSRA never hands out;
//! the first four call arguments travel in `$a0..$a3` and the rest in
//! `out[i]`; results and return values travel in `$v0`; used callee-saved
//! registers are saved in the prologue and restored before every `ret`.

use crate::error::CompileError;
use crate::regalloc::liveness;
use crate::regalloc::lsra::{self, Allocation, Slot};
use crate::vapor::{VCode, VEntry, VFunction, VOperand, VProgram};
use itertools::Itertools;
use tracing_log::log::debug;

pub fn rewrite(program: &VProgram) -> Result<String, CompileError> {
    let mut chunks: Vec<String> = Vec::new();
    for segment in &program.consts {
        chunks.push(segment.to_string());
    }
    for function in &program.functions {
        let live = liveness::analyze(function);
        let allocation = lsra::allocate(&live, function.params.len());
        debug!(
            "allocated `{}`: {} intervals, {} locals, {} callee saves",
            function.name,
            live.intervals.len(),
            allocation.local_count,
            allocation.callee_saved.len()
        );
        chunks.push(emit_function(function, &allocation)?);
    }
    Ok(chunks.join("\n"))
}

fn emit_function(function: &VFunction, allocation: &Allocation) -> Result<String, CompileError> {
    let mut lines: Vec<String> = Vec::new();

    for (reg, slot) in &allocation.callee_saved {
        lines.push(format!("local[{slot}] = {reg}"));
    }
    for (i, param) in function.params.iter().enumerate() {
        let arrival = if i < 4 {
            format!("$a{i}")
        } else {
            format!("in[{}]", i - 4)
        };
        match slot_of(allocation, param)? {
            Slot::Reg(reg) => lines.push(format!("{reg} = {arrival}")),
            Slot::Local(j) => {
                if i < 4 {
                    lines.push(format!("local[{j}] = {arrival}"));
                } else {
                    lines.push(format!("$v0 = {arrival}"));
                    lines.push(format!("local[{j}] = $v0"));
                }
            }
            // a parameter spilled to in[i] already sits where it arrives
            Slot::In(_) => {}
        }
    }

    for line in &function.body {
        match &line.entry {
            VEntry::Label(name) => lines.push(format!("{name}:")),
            VEntry::Code(code) => emit_code(code, allocation, &mut lines)?,
        }
    }

    let mut text = format!(
        "func {} [in {}, out {}, local {}]\n",
        function.name, allocation.in_count, allocation.out_count, allocation.local_count
    );
    for line in lines {
        if line.ends_with(':') {
            text.push_str(&line);
        } else {
            text.push_str("  ");
            text.push_str(&line);
        }
        text.push('\n');
    }
    Ok(text)
}

fn slot_of(allocation: &Allocation, var: &str) -> Result<Slot, CompileError> {
    allocation
        .slots
        .get(var)
        .copied()
        .ok_or(CompileError::Internal("variable without an allocation"))
}

/// Render an operand for use inside an instruction, loading memory-backed
/// variables into `scratch` first.
fn read_operand(
    op: &VOperand,
    scratch: &'static str,
    allocation: &Allocation,
    lines: &mut Vec<String>,
) -> Result<String, CompileError> {
    match op {
        VOperand::Var(name) => match slot_of(allocation, name)? {
            Slot::Reg(reg) => Ok(reg.to_string()),
            mem => {
                lines.push(format!("{scratch} = {mem}"));
                Ok(scratch.to_string())
            }
        },
        VOperand::Imm(value) => Ok(value.to_string()),
        VOperand::Label(name) => Ok(format!(":{name}")),
        VOperand::Str(text) => Ok(format!("\"{text}\"")),
    }
}

/// Move an already-rendered value into a destination slot. `value` must be
/// a register, an immediate, or a label; stack slots only accept registers
/// directly, everything else goes through `$v0`.
fn store_into(slot: Slot, value: &str, lines: &mut Vec<String>) {
    match slot {
        Slot::Reg(reg) => lines.push(format!("{reg} = {value}")),
        mem => {
            if value.starts_with('$') {
                lines.push(format!("{mem} = {value}"));
            } else {
                lines.push(format!("$v0 = {value}"));
                lines.push(format!("{mem} = $v0"));
            }
        }
    }
}

fn mem_address(base: &str, offset: i32) -> String {
    if offset == 0 {
        format!("[{base}]")
    } else {
        format!("[{base}+{offset}]")
    }
}

fn emit_code(
    code: &VCode,
    allocation: &Allocation,
    lines: &mut Vec<String>,
) -> Result<(), CompileError> {
    match code {
        VCode::Assign { dst, src } => {
            let dst_slot = slot_of(allocation, dst)?;
            match (dst_slot, src) {
                // register destinations load anything in one move
                (Slot::Reg(reg), VOperand::Var(name)) => {
                    let src_slot = slot_of(allocation, name)?;
                    lines.push(format!("{reg} = {src_slot}"));
                }
                (Slot::Reg(reg), other) => {
                    let value = read_operand(other, "$v0", allocation, lines)?;
                    lines.push(format!("{reg} = {value}"));
                }
                (mem, src) => {
                    let value = read_operand(src, "$v0", allocation, lines)?;
                    store_into(mem, &value, lines);
                }
            }
            Ok(())
        }
        VCode::Builtin { dst, op, args } => {
            let mut rendered = Vec::with_capacity(args.len());
            let scratches = ["$v0", "$v1"];
            let mut next_scratch = 0;
            for arg in args {
                let needs_scratch = match arg {
                    VOperand::Var(name) => !slot_of(allocation, name)?.is_reg(),
                    _ => false,
                };
                let scratch = if needs_scratch {
                    let s = scratches[next_scratch.min(1)];
                    next_scratch += 1;
                    s
                } else {
                    "$v0"
                };
                rendered.push(read_operand(arg, scratch, allocation, lines)?);
            }
            let call_text = format!("{}({})", op.name(), rendered.iter().join(" "));
            match dst {
                None => lines.push(call_text),
                Some(dst) => match slot_of(allocation, dst)? {
                    Slot::Reg(reg) => lines.push(format!("{reg} = {call_text}")),
                    mem => {
                        lines.push(format!("$v0 = {call_text}"));
                        lines.push(format!("{mem} = $v0"));
                    }
                },
            }
            Ok(())
        }
        VCode::Call { dst, func, args } => {
            for (i, arg) in args.iter().enumerate() {
                if i < 4 {
                    let target = format!("$a{i}");
                    match arg {
                        VOperand::Var(name) => {
                            let slot = slot_of(allocation, name)?;
                            lines.push(format!("{target} = {slot}"));
                        }
                        other => {
                            let value = read_operand(other, "$v0", allocation, lines)?;
                            lines.push(format!("{target} = {value}"));
                        }
                    }
                } else {
                    let value = read_operand(arg, "$v0", allocation, lines)?;
                    let target = format!("out[{}]", i - 4);
                    if value.starts_with('$') {
                        lines.push(format!("{target} = {value}"));
                    } else {
                        lines.push(format!("$v0 = {value}"));
                        lines.push(format!("{target} = $v0"));
                    }
                }
            }
            let target = read_operand(func, "$v0", allocation, lines)?;
            lines.push(format!("call {target}"));
            if let Some(dst) = dst {
                store_into(slot_of(allocation, dst)?, "$v0", lines);
            }
            Ok(())
        }
        VCode::MemWrite { base, offset, src } => {
            let base_reg = read_operand(&VOperand::var(base), "$v0", allocation, lines)?;
            let value = read_operand(src, "$v1", allocation, lines)?;
            lines.push(format!("{} = {value}", mem_address(&base_reg, *offset)));
            Ok(())
        }
        VCode::MemRead { dst, base, offset } => {
            let base_reg = read_operand(&VOperand::var(base), "$v0", allocation, lines)?;
            let address = mem_address(&base_reg, *offset);
            match slot_of(allocation, dst)? {
                Slot::Reg(reg) => lines.push(format!("{reg} = {address}")),
                mem => {
                    lines.push(format!("$v1 = {address}"));
                    lines.push(format!("{mem} = $v1"));
                }
            }
            Ok(())
        }
        VCode::Branch {
            if_zero,
            cond,
            target,
        } => {
            let value = read_operand(cond, "$v0", allocation, lines)?;
            let mnemonic = if *if_zero { "if0" } else { "if" };
            lines.push(format!("{mnemonic} {value} goto :{target}"));
            Ok(())
        }
        VCode::Goto { target } => {
            lines.push(format!("goto :{target}"));
            Ok(())
        }
        VCode::Ret { value } => {
            if let Some(value) = value {
                match value {
                    VOperand::Var(name) => {
                        let slot = slot_of(allocation, name)?;
                        lines.push(format!("$v0 = {slot}"));
                    }
                    other => {
                        let rendered = read_operand(other, "$v0", allocation, lines)?;
                        lines.push(format!("$v0 = {rendered}"));
                    }
                }
            }
            for (reg, slot) in allocation.callee_saved.iter().rev() {
                lines.push(format!("{reg} = local[{slot}]"));
            }
            lines.push("ret".to_string());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vapor::parse::parse_vapor;

    fn rewrite_source(source: &str) -> String {
        rewrite(&parse_vapor(source).unwrap()).unwrap()
    }

    #[test]
    fn headers_carry_in_out_local_counts() {
        let out = rewrite_source(
            "func Main()\n  t.0 = call :F(1 2 3 4 5)\n  PrintIntS(t.0)\n  ret\n\nfunc F(a b c d e)\n  t.0 = Add(a e)\n  ret t.0\n",
        );
        assert!(out.contains("func Main [in 0, out 1, local 0]"), "{out}");
        assert!(out.contains("func F [in 1, out 0, local 0]"), "{out}");
    }

    #[test]
    fn extra_arguments_travel_in_out_slots() {
        let out = rewrite_source(
            "func Main()\n  t.0 = call :F(1 2 3 4 5)\n  PrintIntS(t.0)\n  ret\n\nfunc F(a b c d e)\n  t.0 = Add(a e)\n  ret t.0\n",
        );
        for expected in ["$a0 = 1", "$a1 = 2", "$a2 = 3", "$a3 = 4", "out[0] = $v0", "call :F"] {
            assert!(out.contains(expected), "missing {expected:?} in:\n{out}");
        }
    }

    #[test]
    fn fifth_parameter_arrives_from_in_slot() {
        let out = rewrite_source("func F(a b c d e)\n  t.0 = Add(a e)\n  ret t.0\n");
        assert!(out.contains("= in[0]"), "{out}");
        assert!(out.contains("$t0 = $a0"), "{out}");
    }

    #[test]
    fn callee_saved_registers_are_saved_and_restored() {
        let out = rewrite_source(
            "func F(a)\n  t.0 = call :G(a)\n  t.1 = Add(t.0 a)\n  ret t.1\n",
        );
        assert!(out.contains("func F [in 0, out 0, local 1]"), "{out}");
        assert!(out.contains("local[0] = $s0"), "{out}");
        assert!(out.contains("$s0 = local[0]"), "{out}");
        // `a` crosses the call in a callee-saved register
        assert!(out.contains("$s0 = $a0"), "{out}");
    }

    #[test]
    fn call_results_come_from_v0() {
        let out = rewrite_source("func F(a)\n  t.0 = call :G(a)\n  ret t.0\n");
        assert!(out.contains("call :G"), "{out}");
        let call_at = out.find("call :G").unwrap();
        let after = &out[call_at..];
        assert!(after.contains("= $v0"), "{out}");
        assert!(after.contains("$v0 = $t"), "{out}");
    }

    #[test]
    fn consts_pass_through_unchanged() {
        let out = rewrite_source(
            "const vmt_A\n  :A.f\n\nfunc Main()\n  PrintIntS(3)\n  ret\n",
        );
        assert!(out.starts_with("const vmt_A\n  :A.f\n"), "{out}");
    }

    #[test]
    fn labels_and_branches_survive_rewrite() {
        let out = rewrite_source(
            "func F(n)\n  i = 0\n  while1_top:\n  t.0 = LtS(i n)\n  if0 t.0 goto :while1_end\n  i = Add(i 1)\n  goto :while1_top\n  while1_end:\n  ret i\n",
        );
        for expected in ["while1_top:", "if0 $t", "goto :while1_top", "while1_end:"] {
            assert!(out.contains(expected), "missing {expected:?} in:\n{out}");
        }
        // no symbolic variable names survive
        assert!(!out.contains(" i "), "{out}");
    }

    #[test]
    fn register_operands_are_machine_only() {
        let out = rewrite_source(
            "func F(a b)\n  t.0 = Add(a b)\n  [t.0] = 7\n  t.1 = [t.0+4]\n  ret t.1\n",
        );
        for line in out.lines().skip(1) {
            let line = line.trim();
            if line.is_empty() || line.ends_with(':') {
                continue;
            }
            for token in line
                .split(|c: char| !(c.is_ascii_alphanumeric() || c == '$' || c == '.' || c == '_'))
            {
                if token.is_empty() || token.chars().next().is_some_and(|c| c.is_ascii_digit()) {
                    continue;
                }
                let ok = token.starts_with('$')
                    || ["local", "in", "out", "call", "ret", "goto", "if", "if0", "func",
                        "Add", "Sub", "MulS", "LtS", "Eq", "HeapAllocZ", "PrintIntS", "Error", "F"]
                        .contains(&token);
                assert!(ok, "unexpected operand token {token:?} in line {line:?}");
            }
        }
    }
}
