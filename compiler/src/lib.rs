//! MiniJava → Vapor → VaporM compiler pipeline.
//!
//! Three stages behind four entrypoints: semantic analysis of MiniJava
//! ([`check`]), lowering to Vapor IR ([`compile_to_vapor`]), and linear
//! scan register allocation over Vapor ([`vapor_to_vaporm`]), with
//! [`compile_to_vaporm`] composing all of them. Phases are strict: each
//! sees only its predecessor's output, and the first error aborts.

pub mod ast;
pub mod error;
pub mod frontend;
pub mod keys;
pub mod lower;
pub mod regalloc;
pub mod table;
pub mod typecheck;
pub mod vapor;

pub use error::CompileError;

use table::SymbolTable;

/// Phases A–C: build the symbol table, type check, finalize layouts.
pub fn check(source: &str) -> Result<(), CompileError> {
    let program = frontend::parse_program(source)?;
    let table = SymbolTable::build(&program)?;
    typecheck::check(&program, &table)?;
    table.finalize_layouts()
}

/// Phases A–D: MiniJava source to a Vapor program.
pub fn compile_to_vapor(source: &str) -> Result<String, CompileError> {
    let program = frontend::parse_program(source)?;
    let table = SymbolTable::build(&program)?;
    typecheck::check(&program, &table)?;
    table.finalize_layouts()?;
    Ok(lower::lower(&program, &table)?.to_string())
}

/// Phase E alone: Vapor source to VaporM.
pub fn vapor_to_vaporm(source: &str) -> Result<String, CompileError> {
    let program = vapor::parse::parse_vapor(source)?;
    regalloc::rewrite::rewrite(&program)
}

/// The whole pipeline: MiniJava source to VaporM.
pub fn compile_to_vaporm(source: &str) -> Result<String, CompileError> {
    let program = frontend::parse_program(source)?;
    let table = SymbolTable::build(&program)?;
    typecheck::check(&program, &table)?;
    table.finalize_layouts()?;
    let vapor = lower::lower(&program, &table)?;
    regalloc::rewrite::rewrite(&vapor)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FACTORIAL: &str = r#"
        class M {
            public static void main(String[] a) {
                System.out.println(new F().fac(5));
            }
        }
        class F {
            public int fac(int n) {
                int acc;
                if (n < 1) acc = 1; else acc = n * this.fac(n - 1);
                return acc;
            }
        }
    "#;

    #[test]
    fn pipeline_produces_vapor_then_vaporm() {
        let vapor = compile_to_vapor(FACTORIAL).unwrap();
        assert!(vapor.contains("func F.fac(this n)"));

        let vaporm = vapor_to_vaporm(&vapor).unwrap();
        assert!(vaporm.contains("func F.fac [in 0,"));
        assert!(vaporm.contains("const vmt_F"));
    }

    #[test]
    fn single_shot_compile_matches_two_stage_output() {
        let two_stage = vapor_to_vaporm(&compile_to_vapor(FACTORIAL).unwrap()).unwrap();
        let one_shot = compile_to_vaporm(FACTORIAL).unwrap();
        assert_eq!(two_stage, one_shot);
    }

    #[test]
    fn check_rejects_what_the_checker_rejects() {
        let bad = "class M { public static void main(String[] a) { System.out.println(x); } }";
        assert!(check(bad).is_err());
        assert!(check(FACTORIAL).is_ok());
    }
}
