//! Reader for the Vapor surface syntax fixed by the lowerer: const
//! segments, `func` headers, and the eight instruction forms. Program
//! points are the 1-based source line numbers, which keeps them strictly
//! increasing per function.

use crate::error::CompileError;
use crate::vapor::{Args, Builtin, VCode, VConst, VEntry, VFunction, VLine, VOperand, VProgram};

pub fn parse_vapor(source: &str) -> Result<VProgram, CompileError> {
    let mut program = VProgram::default();
    let mut in_const = false;

    for (idx, raw) in source.lines().enumerate() {
        let line = idx + 1;
        let text = raw.trim();
        if text.is_empty() {
            continue;
        }

        if let Some(rest) = text.strip_prefix("const ") {
            program.consts.push(VConst {
                name: rest.trim().to_string(),
                entries: Vec::new(),
            });
            in_const = true;
            continue;
        }
        if let Some(rest) = text.strip_prefix("func ") {
            let (name, params) = parse_header(rest, line)?;
            program.functions.push(VFunction {
                name,
                params,
                header_line: line,
                body: Vec::new(),
            });
            in_const = false;
            continue;
        }

        if in_const {
            let Some(entry) = text.strip_prefix(':') else {
                return Err(malformed(line, "expected `:label` inside const segment"));
            };
            let Some(segment) = program.consts.last_mut() else {
                return Err(malformed(line, "const entry outside of a segment"));
            };
            segment.entries.push(entry.to_string());
            continue;
        }

        let entry = parse_entry(text, line)?;
        let Some(function) = program.functions.last_mut() else {
            return Err(malformed(line, "instruction outside of a function"));
        };
        function.body.push(VLine {
            line,
            indent: 0,
            entry,
        });
    }
    Ok(program)
}

fn malformed(line: usize, message: impl Into<String>) -> CompileError {
    CompileError::MalformedVapor {
        line,
        message: message.into(),
    }
}

fn parse_header(rest: &str, line: usize) -> Result<(String, Vec<String>), CompileError> {
    let rest = rest.trim();
    let open = rest
        .find('(')
        .ok_or_else(|| malformed(line, "function header without `(`"))?;
    if !rest.ends_with(')') {
        return Err(malformed(line, "function header without `)`"));
    }
    let name = rest[..open].trim().to_string();
    if name.is_empty() {
        return Err(malformed(line, "function header without a name"));
    }
    let params = rest[open + 1..rest.len() - 1]
        .split_whitespace()
        .map(str::to_string)
        .collect();
    Ok((name, params))
}

fn parse_entry(text: &str, line: usize) -> Result<VEntry, CompileError> {
    if let Some(label) = text.strip_suffix(':') {
        if !label.is_empty() && !label.contains(char::is_whitespace) {
            return Ok(VEntry::Label(label.to_string()));
        }
    }
    Ok(VEntry::Code(parse_code(&tokenize(text, line)?, line)?))
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Word(String),
    Num(i32),
    LabelRef(String),
    Str(String),
    LBracket,
    RBracket,
    LParen,
    RParen,
    Assign,
    Plus,
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '$'
}

fn tokenize(text: &str, line: usize) -> Result<Vec<Tok>, CompileError> {
    let mut toks = Vec::new();
    let mut chars = text.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '[' => {
                chars.next();
                toks.push(Tok::LBracket);
            }
            ']' => {
                chars.next();
                toks.push(Tok::RBracket);
            }
            '(' => {
                chars.next();
                toks.push(Tok::LParen);
            }
            ')' => {
                chars.next();
                toks.push(Tok::RParen);
            }
            '=' => {
                chars.next();
                toks.push(Tok::Assign);
            }
            '+' => {
                chars.next();
                toks.push(Tok::Plus);
            }
            ':' => {
                chars.next();
                let mut name = String::new();
                while let Some(&c) = chars.peek() {
                    if is_word_char(c) {
                        name.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if name.is_empty() {
                    return Err(malformed(line, "empty label reference"));
                }
                toks.push(Tok::LabelRef(name));
            }
            '"' => {
                chars.next();
                let mut text = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == '"' {
                        closed = true;
                        break;
                    }
                    text.push(c);
                }
                if !closed {
                    return Err(malformed(line, "unterminated string literal"));
                }
                toks.push(Tok::Str(text));
            }
            '-' | '0'..='9' => {
                let mut text = String::new();
                if c == '-' {
                    text.push(c);
                    chars.next();
                }
                while let Some(d) = chars.peek().filter(|c| c.is_ascii_digit()) {
                    text.push(*d);
                    chars.next();
                }
                let value = text
                    .parse::<i32>()
                    .map_err(|_| malformed(line, format!("bad integer literal `{text}`")))?;
                toks.push(Tok::Num(value));
            }
            c if is_word_char(c) => {
                let mut word = String::new();
                while let Some(&c) = chars.peek() {
                    if is_word_char(c) {
                        word.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                toks.push(Tok::Word(word));
            }
            other => {
                return Err(malformed(line, format!("unexpected character `{other}`")));
            }
        }
    }
    Ok(toks)
}

fn operand(tok: &Tok, line: usize) -> Result<VOperand, CompileError> {
    match tok {
        Tok::Word(name) => Ok(VOperand::Var(name.clone())),
        Tok::Num(value) => Ok(VOperand::Imm(*value)),
        Tok::LabelRef(name) => Ok(VOperand::Label(name.clone())),
        Tok::Str(text) => Ok(VOperand::Str(text.clone())),
        other => Err(malformed(line, format!("expected operand, found {other:?}"))),
    }
}

fn operands(toks: &[Tok], line: usize) -> Result<Args, CompileError> {
    toks.iter().map(|t| operand(t, line)).collect()
}

fn parse_code(toks: &[Tok], line: usize) -> Result<VCode, CompileError> {
    use Tok::*;
    match toks {
        [Word(kw), LabelRef(target)] if kw == "goto" => Ok(VCode::Goto {
            target: target.clone(),
        }),
        [Word(kw), cond, Word(go), LabelRef(target)]
            if (kw == "if" || kw == "if0") && go == "goto" =>
        {
            Ok(VCode::Branch {
                if_zero: kw == "if0",
                cond: operand(cond, line)?,
                target: target.clone(),
            })
        }
        [Word(kw)] if kw == "ret" => Ok(VCode::Ret { value: None }),
        [Word(kw), value] if kw == "ret" => Ok(VCode::Ret {
            value: Some(operand(value, line)?),
        }),
        [LBracket, Word(base), RBracket, Assign, src] => Ok(VCode::MemWrite {
            base: base.clone(),
            offset: 0,
            src: operand(src, line)?,
        }),
        [LBracket, Word(base), Plus, Num(offset), RBracket, Assign, src] => Ok(VCode::MemWrite {
            base: base.clone(),
            offset: *offset,
            src: operand(src, line)?,
        }),
        [Word(dst), Assign, LBracket, Word(base), RBracket] => Ok(VCode::MemRead {
            dst: dst.clone(),
            base: base.clone(),
            offset: 0,
        }),
        [Word(dst), Assign, LBracket, Word(base), Plus, Num(offset), RBracket] => {
            Ok(VCode::MemRead {
                dst: dst.clone(),
                base: base.clone(),
                offset: *offset,
            })
        }
        [Word(dst), Assign, Word(kw), func, LParen, middle @ .., RParen] if kw == "call" => {
            Ok(VCode::Call {
                dst: Some(dst.clone()),
                func: operand(func, line)?,
                args: operands(middle, line)?,
            })
        }
        [Word(kw), func, LParen, middle @ .., RParen] if kw == "call" => Ok(VCode::Call {
            dst: None,
            func: operand(func, line)?,
            args: operands(middle, line)?,
        }),
        [Word(dst), Assign, Word(op), LParen, middle @ .., RParen]
            if Builtin::from_name(op).is_some() =>
        {
            Ok(VCode::Builtin {
                dst: Some(dst.clone()),
                op: Builtin::from_name(op).ok_or_else(|| malformed(line, "unknown builtin"))?,
                args: operands(middle, line)?,
            })
        }
        [Word(op), LParen, middle @ .., RParen] if Builtin::from_name(op).is_some() => {
            Ok(VCode::Builtin {
                dst: None,
                op: Builtin::from_name(op).ok_or_else(|| malformed(line, "unknown builtin"))?,
                args: operands(middle, line)?,
            })
        }
        [Word(dst), Assign, src] => Ok(VCode::Assign {
            dst: dst.clone(),
            src: operand(src, line)?,
        }),
        _ => Err(malformed(line, "unrecognized instruction")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
const vmt_A
  :A.f

func Main()
  t.0 = HeapAllocZ(8)
  [t.0] = :vmt_A
  if t.0 goto :null1
    Error(\"null pointer\")
  null1:
  t.1 = [t.0]
  t.2 = [t.1+0]
  t.3 = call t.2(t.0)
  PrintIntS(t.3)
  ret

func A.f(this)
  ret 12
";

    #[test]
    fn parses_consts_functions_and_lines() {
        let program = parse_vapor(SAMPLE).unwrap();
        assert_eq!(program.consts.len(), 1);
        assert_eq!(program.consts[0].name, "vmt_A");
        assert_eq!(program.consts[0].entries, vec!["A.f".to_string()]);
        assert_eq!(program.functions.len(), 2);

        let main = &program.functions[0];
        assert_eq!(main.header_line, 4);
        assert_eq!(main.params.len(), 0);
        assert_eq!(main.body.len(), 10);
        assert!(matches!(
            &main.body[2].entry,
            VEntry::Code(VCode::Branch { if_zero: false, .. })
        ));
        assert!(matches!(&main.body[4].entry, VEntry::Label(l) if l == "null1"));
        assert_eq!(main.body[4].line, 9);

        let f = &program.functions[1];
        assert_eq!(f.params, vec!["this".to_string()]);
        assert!(matches!(
            &f.body[0].entry,
            VEntry::Code(VCode::Ret {
                value: Some(VOperand::Imm(12))
            })
        ));
    }

    #[test]
    fn printed_programs_parse_back() {
        let program = parse_vapor(SAMPLE).unwrap();
        let reparsed = parse_vapor(&program.to_string()).unwrap();
        assert_eq!(program.consts, reparsed.consts);
        assert_eq!(program.functions.len(), reparsed.functions.len());
        for (a, b) in program.functions.iter().zip(reparsed.functions.iter()) {
            assert_eq!(a.name, b.name);
            let codes = |f: &VFunction| {
                f.body
                    .iter()
                    .map(|l| l.entry.clone())
                    .collect::<Vec<_>>()
            };
            assert_eq!(codes(a), codes(b));
        }
    }

    #[test]
    fn call_with_many_args() {
        let program =
            parse_vapor("func F(a b c d e f)\n  t.0 = call :G(a b c d e f)\n  ret t.0\n").unwrap();
        let VEntry::Code(VCode::Call { args, func, .. }) = &program.functions[0].body[0].entry
        else {
            panic!("expected call");
        };
        assert_eq!(args.len(), 6);
        assert_eq!(func, &VOperand::Label("G".to_string()));
    }

    #[test]
    fn junk_reports_its_line() {
        let err = parse_vapor("func Main()\n  widget frobnicate\n").unwrap_err();
        assert!(matches!(err, CompileError::MalformedVapor { line: 2, .. }));
    }

    #[test]
    fn instruction_outside_function_is_rejected() {
        assert!(matches!(
            parse_vapor("t.0 = 1\n"),
            Err(CompileError::MalformedVapor { line: 1, .. })
        ));
    }
}
