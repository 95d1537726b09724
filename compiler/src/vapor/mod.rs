//! Vapor IR: the three-address form produced by the lowerer and consumed
//! by the register allocator, plus its textual syntax.
//!
//! Instructions carry a monotonically increasing `line` used as the
//! program point by liveness analysis. Indentation is advisory and only
//! affects pretty-printing.

use itertools::Itertools;
use smallvec::SmallVec;
use std::fmt::Display;

pub mod parse;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VOperand {
    Var(String),
    Imm(i32),
    /// An address literal, printed `:name`.
    Label(String),
    /// A string literal; only `Error` takes one.
    Str(String),
}

impl VOperand {
    pub fn var(name: impl Into<String>) -> Self {
        VOperand::Var(name.into())
    }

    pub fn as_var(&self) -> Option<&str> {
        match self {
            VOperand::Var(name) => Some(name),
            _ => None,
        }
    }
}

impl Display for VOperand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VOperand::Var(name) => write!(f, "{name}"),
            VOperand::Imm(value) => write!(f, "{value}"),
            VOperand::Label(name) => write!(f, ":{name}"),
            VOperand::Str(text) => write!(f, "\"{text}\""),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Add,
    Sub,
    MulS,
    LtS,
    Eq,
    HeapAllocZ,
    PrintIntS,
    Error,
}

impl Builtin {
    pub fn name(self) -> &'static str {
        match self {
            Builtin::Add => "Add",
            Builtin::Sub => "Sub",
            Builtin::MulS => "MulS",
            Builtin::LtS => "LtS",
            Builtin::Eq => "Eq",
            Builtin::HeapAllocZ => "HeapAllocZ",
            Builtin::PrintIntS => "PrintIntS",
            Builtin::Error => "Error",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let op = match name {
            "Add" => Builtin::Add,
            "Sub" => Builtin::Sub,
            "MulS" => Builtin::MulS,
            "LtS" => Builtin::LtS,
            "Eq" => Builtin::Eq,
            "HeapAllocZ" => Builtin::HeapAllocZ,
            "PrintIntS" => Builtin::PrintIntS,
            "Error" => Builtin::Error,
            _ => return None,
        };
        Some(op)
    }
}

pub type Args = SmallVec<[VOperand; 4]>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VCode {
    Assign {
        dst: String,
        src: VOperand,
    },
    Call {
        dst: Option<String>,
        func: VOperand,
        args: Args,
    },
    Builtin {
        dst: Option<String>,
        op: Builtin,
        args: Args,
    },
    MemWrite {
        base: String,
        offset: i32,
        src: VOperand,
    },
    MemRead {
        dst: String,
        base: String,
        offset: i32,
    },
    Branch {
        /// `if0` branches when the condition is zero, `if` when nonzero.
        if_zero: bool,
        cond: VOperand,
        target: String,
    },
    Goto {
        target: String,
    },
    Ret {
        value: Option<VOperand>,
    },
}

impl Display for VCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VCode::Assign { dst, src } => write!(f, "{dst} = {src}"),
            VCode::Call { dst, func, args } => {
                if let Some(dst) = dst {
                    write!(f, "{dst} = ")?;
                }
                write!(f, "call {func}({})", args.iter().join(" "))
            }
            VCode::Builtin { dst, op, args } => {
                if let Some(dst) = dst {
                    write!(f, "{dst} = ")?;
                }
                write!(f, "{}({})", op.name(), args.iter().join(" "))
            }
            VCode::MemWrite { base, offset, src } => {
                if *offset == 0 {
                    write!(f, "[{base}] = {src}")
                } else {
                    write!(f, "[{base}+{offset}] = {src}")
                }
            }
            VCode::MemRead { dst, base, offset } => {
                if *offset == 0 {
                    write!(f, "{dst} = [{base}]")
                } else {
                    write!(f, "{dst} = [{base}+{offset}]")
                }
            }
            VCode::Branch {
                if_zero,
                cond,
                target,
            } => {
                let mnemonic = if *if_zero { "if0" } else { "if" };
                write!(f, "{mnemonic} {cond} goto :{target}")
            }
            VCode::Goto { target } => write!(f, "goto :{target}"),
            VCode::Ret { value } => match value {
                Some(value) => write!(f, "ret {value}"),
                None => write!(f, "ret"),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VEntry {
    Code(VCode),
    Label(String),
}

#[derive(Debug, Clone)]
pub struct VLine {
    pub line: usize,
    pub indent: u8,
    pub entry: VEntry,
}

#[derive(Debug, Clone)]
pub struct VFunction {
    pub name: String,
    pub params: Vec<String>,
    pub header_line: usize,
    pub body: Vec<VLine>,
}

impl Display for VFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "func {}({})", self.name, self.params.iter().join(" "))?;
        for line in &self.body {
            let pad = "  ".repeat(1 + line.indent as usize);
            match &line.entry {
                VEntry::Code(code) => writeln!(f, "{pad}{code}")?,
                VEntry::Label(name) => writeln!(f, "{pad}{name}:")?,
            }
        }
        Ok(())
    }
}

/// A data segment: `const vmt_C` followed by one address per vtable slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VConst {
    pub name: String,
    pub entries: Vec<String>,
}

impl Display for VConst {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "const {}", self.name)?;
        for entry in &self.entries {
            writeln!(f, "  :{entry}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct VProgram {
    pub consts: Vec<VConst>,
    pub functions: Vec<VFunction>,
}

impl Display for VProgram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for c in &self.consts {
            if !first {
                writeln!(f)?;
            }
            first = false;
            write!(f, "{c}")?;
        }
        for function in &self.functions {
            if !first {
                writeln!(f)?;
            }
            first = false;
            write!(f, "{function}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    #[test]
    fn instructions_print_in_vapor_syntax() {
        let cases: Vec<(VCode, &str)> = vec![
            (
                VCode::Assign {
                    dst: "t.0".to_string(),
                    src: VOperand::Imm(5),
                },
                "t.0 = 5",
            ),
            (
                VCode::Call {
                    dst: Some("t.1".to_string()),
                    func: VOperand::var("t.0"),
                    args: smallvec![VOperand::var("this"), VOperand::Imm(3)],
                },
                "t.1 = call t.0(this 3)",
            ),
            (
                VCode::Builtin {
                    dst: None,
                    op: Builtin::Error,
                    args: smallvec![VOperand::Str("null pointer".to_string())],
                },
                "Error(\"null pointer\")",
            ),
            (
                VCode::MemWrite {
                    base: "t.0".to_string(),
                    offset: 4,
                    src: VOperand::Label("vmt_A".to_string()),
                },
                "[t.0+4] = :vmt_A",
            ),
            (
                VCode::MemRead {
                    dst: "t.2".to_string(),
                    base: "this".to_string(),
                    offset: 0,
                },
                "t.2 = [this]",
            ),
            (
                VCode::Branch {
                    if_zero: true,
                    cond: VOperand::var("t.3"),
                    target: "if1_else".to_string(),
                },
                "if0 t.3 goto :if1_else",
            ),
            (
                VCode::Ret {
                    value: Some(VOperand::var("t.4")),
                },
                "ret t.4",
            ),
        ];
        for (code, expected) in cases {
            assert_eq!(code.to_string(), expected);
        }
    }

    #[test]
    fn function_bodies_indent_by_level() {
        let function = VFunction {
            name: "Main".to_string(),
            params: vec![],
            header_line: 1,
            body: vec![
                VLine {
                    line: 2,
                    indent: 0,
                    entry: VEntry::Code(VCode::Builtin {
                        dst: None,
                        op: Builtin::PrintIntS,
                        args: smallvec![VOperand::Imm(12)],
                    }),
                },
                VLine {
                    line: 3,
                    indent: 0,
                    entry: VEntry::Code(VCode::Ret { value: None }),
                },
            ],
        };
        assert_eq!(function.to_string(), "func Main()\n  PrintIntS(12)\n  ret\n");
    }
}
