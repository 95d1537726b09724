//! MiniJava front end: a hand-written lexer and recursive-descent parser
//! covering exactly the subset the checker accepts. The first syntax error
//! aborts with a line-numbered diagnostic.

use crate::ast::{
    ClassDecl, Expr, ExprKind, MainClass, MethodDecl, Program, Stmt, StmtKind, Type, VarDecl,
};
use crate::error::CompileError;
use crate::frontend::lexer::{Tok, Token, lex};

pub mod lexer;

pub fn parse_program(source: &str) -> Result<Program, CompileError> {
    let tokens = lex(source)?;
    let mut parser = Parser { tokens, pos: 0 };
    let main = parser.parse_main_class()?;
    let mut classes = Vec::new();
    while parser.peek() != &Tok::Eof {
        classes.push(parser.parse_class()?);
    }
    Ok(Program { main, classes })
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Tok {
        &self.tokens[self.pos].tok
    }

    fn peek_at(&self, offset: usize) -> &Tok {
        let idx = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[idx].tok
    }

    fn line(&self) -> usize {
        self.tokens[self.pos].line
    }

    fn advance(&mut self) -> Tok {
        let tok = self.tokens[self.pos].tok.clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn error(&self, message: impl Into<String>) -> CompileError {
        CompileError::Syntax {
            line: self.line(),
            message: message.into(),
        }
    }

    fn expect(&mut self, expected: Tok, what: &str) -> Result<(), CompileError> {
        if self.peek() == &expected {
            self.advance();
            Ok(())
        } else {
            Err(self.error(format!("expected {what}, found {:?}", self.peek())))
        }
    }

    fn expect_ident(&mut self, what: &str) -> Result<String, CompileError> {
        match self.peek().clone() {
            Tok::Ident(name) => {
                self.advance();
                Ok(name)
            }
            other => Err(self.error(format!("expected {what}, found {other:?}"))),
        }
    }

    fn parse_main_class(&mut self) -> Result<MainClass, CompileError> {
        let line = self.line();
        self.expect(Tok::Class, "`class`")?;
        let name = self.expect_ident("main class name")?;
        self.expect(Tok::LBrace, "`{`")?;
        self.expect(Tok::Public, "`public`")?;
        self.expect(Tok::Static, "`static`")?;
        self.expect(Tok::Void, "`void`")?;
        self.expect(Tok::Main, "`main`")?;
        self.expect(Tok::LParen, "`(`")?;
        self.expect(Tok::StringKw, "`String`")?;
        self.expect(Tok::LBracket, "`[`")?;
        self.expect(Tok::RBracket, "`]`")?;
        let args_name = self.expect_ident("argument name")?;
        self.expect(Tok::RParen, "`)`")?;
        self.expect(Tok::LBrace, "`{`")?;
        let (locals, body) = self.parse_body_until(&Tok::RBrace)?;
        self.expect(Tok::RBrace, "`}`")?;
        self.expect(Tok::RBrace, "`}`")?;
        Ok(MainClass {
            name,
            args_name,
            locals,
            body,
            line,
        })
    }

    fn parse_class(&mut self) -> Result<ClassDecl, CompileError> {
        let line = self.line();
        self.expect(Tok::Class, "`class`")?;
        let name = self.expect_ident("class name")?;
        let parent = if self.peek() == &Tok::Extends {
            self.advance();
            Some(self.expect_ident("parent class name")?)
        } else {
            None
        };
        self.expect(Tok::LBrace, "`{`")?;
        let mut fields = Vec::new();
        let mut methods = Vec::new();
        loop {
            match self.peek() {
                Tok::RBrace => break,
                Tok::Public => methods.push(self.parse_method()?),
                _ => fields.push(self.parse_var_decl()?),
            }
        }
        self.expect(Tok::RBrace, "`}`")?;
        Ok(ClassDecl {
            name,
            parent,
            fields,
            methods,
            line,
        })
    }

    fn parse_method(&mut self) -> Result<MethodDecl, CompileError> {
        let line = self.line();
        self.expect(Tok::Public, "`public`")?;
        let return_type = self.parse_type()?;
        let name = self.expect_ident("method name")?;
        self.expect(Tok::LParen, "`(`")?;
        let mut params = Vec::new();
        if self.peek() != &Tok::RParen {
            loop {
                let pline = self.line();
                let ty = self.parse_type()?;
                let pname = self.expect_ident("parameter name")?;
                params.push(VarDecl {
                    name: pname,
                    ty,
                    line: pline,
                });
                if self.peek() == &Tok::Comma {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect(Tok::RParen, "`)`")?;
        self.expect(Tok::LBrace, "`{`")?;
        let (locals, body) = self.parse_body_until(&Tok::Return)?;
        self.expect(Tok::Return, "`return`")?;
        let ret = self.parse_expr()?;
        self.expect(Tok::Semi, "`;`")?;
        self.expect(Tok::RBrace, "`}`")?;
        Ok(MethodDecl {
            name,
            params,
            locals,
            return_type,
            body,
            ret,
            line,
        })
    }

    /// Local declarations first, then statements, stopping before `end`.
    /// The decl/statement split needs one token of lookahead: an identifier
    /// followed by another identifier opens a declaration.
    fn parse_body_until(&mut self, end: &Tok) -> Result<(Vec<VarDecl>, Vec<Stmt>), CompileError> {
        let mut locals = Vec::new();
        loop {
            let is_decl = match self.peek() {
                Tok::Int | Tok::Boolean => true,
                Tok::Ident(_) => matches!(self.peek_at(1), Tok::Ident(_)),
                _ => false,
            };
            if !is_decl {
                break;
            }
            locals.push(self.parse_var_decl()?);
        }
        let mut body = Vec::new();
        while self.peek() != end {
            body.push(self.parse_stmt()?);
        }
        Ok((locals, body))
    }

    fn parse_var_decl(&mut self) -> Result<VarDecl, CompileError> {
        let line = self.line();
        let ty = self.parse_type()?;
        let name = self.expect_ident("variable name")?;
        self.expect(Tok::Semi, "`;`")?;
        Ok(VarDecl { name, ty, line })
    }

    fn parse_type(&mut self) -> Result<Type, CompileError> {
        match self.advance() {
            Tok::Int => {
                if self.peek() == &Tok::LBracket {
                    self.advance();
                    self.expect(Tok::RBracket, "`]`")?;
                    Ok(Type::IntArray)
                } else {
                    Ok(Type::Int)
                }
            }
            Tok::Boolean => Ok(Type::Bool),
            Tok::Ident(name) => Ok(Type::Class(name)),
            other => Err(self.error(format!("expected type, found {other:?}"))),
        }
    }

    fn parse_stmt(&mut self) -> Result<Stmt, CompileError> {
        let line = self.line();
        match self.peek().clone() {
            Tok::LBrace => {
                self.advance();
                let mut stmts = Vec::new();
                while self.peek() != &Tok::RBrace {
                    stmts.push(self.parse_stmt()?);
                }
                self.advance();
                Ok(Stmt {
                    line,
                    kind: StmtKind::Block(stmts),
                })
            }
            Tok::If => {
                self.advance();
                self.expect(Tok::LParen, "`(`")?;
                let cond = self.parse_expr()?;
                self.expect(Tok::RParen, "`)`")?;
                let then_branch = Box::new(self.parse_stmt()?);
                self.expect(Tok::Else, "`else`")?;
                let else_branch = Box::new(self.parse_stmt()?);
                Ok(Stmt {
                    line,
                    kind: StmtKind::If {
                        cond,
                        then_branch,
                        else_branch,
                    },
                })
            }
            Tok::While => {
                self.advance();
                self.expect(Tok::LParen, "`(`")?;
                let cond = self.parse_expr()?;
                self.expect(Tok::RParen, "`)`")?;
                let body = Box::new(self.parse_stmt()?);
                Ok(Stmt {
                    line,
                    kind: StmtKind::While { cond, body },
                })
            }
            Tok::Ident(name) if name == "System" && self.peek_at(1) == &Tok::Dot => {
                self.advance();
                self.expect(Tok::Dot, "`.`")?;
                let out = self.expect_ident("`out`")?;
                self.expect(Tok::Dot, "`.`")?;
                let println = self.expect_ident("`println`")?;
                if out != "out" || println != "println" {
                    return Err(self.error("expected `System.out.println`"));
                }
                self.expect(Tok::LParen, "`(`")?;
                let arg = self.parse_expr()?;
                self.expect(Tok::RParen, "`)`")?;
                self.expect(Tok::Semi, "`;`")?;
                Ok(Stmt {
                    line,
                    kind: StmtKind::Println(arg),
                })
            }
            Tok::Ident(name) => {
                self.advance();
                match self.peek() {
                    Tok::Assign => {
                        self.advance();
                        let value = self.parse_expr()?;
                        self.expect(Tok::Semi, "`;`")?;
                        Ok(Stmt {
                            line,
                            kind: StmtKind::Assign {
                                target: name,
                                value,
                            },
                        })
                    }
                    Tok::LBracket => {
                        self.advance();
                        let index = self.parse_expr()?;
                        self.expect(Tok::RBracket, "`]`")?;
                        self.expect(Tok::Assign, "`=`")?;
                        let value = self.parse_expr()?;
                        self.expect(Tok::Semi, "`;`")?;
                        Ok(Stmt {
                            line,
                            kind: StmtKind::ArrayAssign {
                                target: name,
                                index,
                                value,
                            },
                        })
                    }
                    other => Err(self.error(format!("expected `=` or `[`, found {other:?}"))),
                }
            }
            other => Err(self.error(format!("expected statement, found {other:?}"))),
        }
    }

    fn parse_expr(&mut self) -> Result<Expr, CompileError> {
        let mut lhs = self.parse_comparison()?;
        while self.peek() == &Tok::AndAnd {
            let line = self.line();
            self.advance();
            let rhs = self.parse_comparison()?;
            lhs = Expr {
                line,
                kind: ExprKind::And(Box::new(lhs), Box::new(rhs)),
            };
        }
        Ok(lhs)
    }

    fn parse_comparison(&mut self) -> Result<Expr, CompileError> {
        let lhs = self.parse_additive()?;
        if self.peek() == &Tok::Less {
            let line = self.line();
            self.advance();
            let rhs = self.parse_additive()?;
            return Ok(Expr {
                line,
                kind: ExprKind::Less(Box::new(lhs), Box::new(rhs)),
            });
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> Result<Expr, CompileError> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let line = self.line();
            match self.peek() {
                Tok::Plus => {
                    self.advance();
                    let rhs = self.parse_multiplicative()?;
                    lhs = Expr {
                        line,
                        kind: ExprKind::Add(Box::new(lhs), Box::new(rhs)),
                    };
                }
                Tok::Minus => {
                    self.advance();
                    let rhs = self.parse_multiplicative()?;
                    lhs = Expr {
                        line,
                        kind: ExprKind::Sub(Box::new(lhs), Box::new(rhs)),
                    };
                }
                _ => return Ok(lhs),
            }
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, CompileError> {
        let mut lhs = self.parse_unary()?;
        while self.peek() == &Tok::Star {
            let line = self.line();
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = Expr {
                line,
                kind: ExprKind::Mul(Box::new(lhs), Box::new(rhs)),
            };
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, CompileError> {
        if self.peek() == &Tok::Bang {
            let line = self.line();
            self.advance();
            let inner = self.parse_unary()?;
            return Ok(Expr {
                line,
                kind: ExprKind::Not(Box::new(inner)),
            });
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, CompileError> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek() {
                Tok::LBracket => {
                    let line = self.line();
                    self.advance();
                    let index = self.parse_expr()?;
                    self.expect(Tok::RBracket, "`]`")?;
                    expr = Expr {
                        line,
                        kind: ExprKind::Index {
                            array: Box::new(expr),
                            index: Box::new(index),
                        },
                    };
                }
                Tok::Dot => {
                    let line = self.line();
                    self.advance();
                    let member = self.expect_ident("member name")?;
                    if member == "length" && self.peek() != &Tok::LParen {
                        expr = Expr {
                            line,
                            kind: ExprKind::Length(Box::new(expr)),
                        };
                        continue;
                    }
                    self.expect(Tok::LParen, "`(`")?;
                    let mut args = Vec::new();
                    if self.peek() != &Tok::RParen {
                        loop {
                            args.push(self.parse_expr()?);
                            if self.peek() == &Tok::Comma {
                                self.advance();
                            } else {
                                break;
                            }
                        }
                    }
                    self.expect(Tok::RParen, "`)`")?;
                    expr = Expr {
                        line,
                        kind: ExprKind::Call {
                            receiver: Box::new(expr),
                            method: member,
                            args,
                        },
                    };
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, CompileError> {
        let line = self.line();
        match self.advance() {
            Tok::IntLit(value) => Ok(Expr {
                line,
                kind: ExprKind::IntLit(value),
            }),
            Tok::True => Ok(Expr {
                line,
                kind: ExprKind::True,
            }),
            Tok::False => Ok(Expr {
                line,
                kind: ExprKind::False,
            }),
            Tok::Ident(name) => Ok(Expr {
                line,
                kind: ExprKind::Ident(name),
            }),
            Tok::This => Ok(Expr {
                line,
                kind: ExprKind::This,
            }),
            Tok::New => match self.peek().clone() {
                Tok::Int => {
                    self.advance();
                    self.expect(Tok::LBracket, "`[`")?;
                    let len = self.parse_expr()?;
                    self.expect(Tok::RBracket, "`]`")?;
                    Ok(Expr {
                        line,
                        kind: ExprKind::NewArray(Box::new(len)),
                    })
                }
                Tok::Ident(name) => {
                    self.advance();
                    self.expect(Tok::LParen, "`(`")?;
                    self.expect(Tok::RParen, "`)`")?;
                    Ok(Expr {
                        line,
                        kind: ExprKind::NewObject(name),
                    })
                }
                other => Err(self.error(format!(
                    "expected `int` or class name after `new`, found {other:?}"
                ))),
            },
            Tok::LParen => {
                let inner = self.parse_expr()?;
                self.expect(Tok::RParen, "`)`")?;
                Ok(inner)
            }
            other => Err(self.error(format!("expected expression, found {other:?}"))),
        }
    }
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
                acc = 1;
                if (n < 1) acc = 1; else acc = n * this.fac(n - 1);
                return acc;
            }
        }
    "#;

    #[test]
    fn parses_factorial() {
        let program = parse_program(FACTORIAL).unwrap();
        assert_eq!(program.main.name, "M");
        assert_eq!(program.classes.len(), 1);
        let f = &program.classes[0];
        assert_eq!(f.name, "F");
        assert_eq!(f.methods.len(), 1);
        let fac = &f.methods[0];
        assert_eq!(fac.name, "fac");
        assert_eq!(fac.params.len(), 1);
        assert_eq!(fac.params[0].ty, Type::Int);
        assert_eq!(fac.locals.len(), 1);
        assert_eq!(fac.body.len(), 2);
    }

    #[test]
    fn main_accepts_local_declarations() {
        let src = r#"
            class M {
                public static void main(String[] a) {
                    int[] x;
                    x = new int[3];
                    System.out.println(x[5]);
                }
            }
        "#;
        let program = parse_program(src).unwrap();
        assert_eq!(program.main.locals.len(), 1);
        assert_eq!(program.main.locals[0].ty, Type::IntArray);
        assert_eq!(program.main.body.len(), 2);
    }

    #[test]
    fn extends_and_fields() {
        let src = r#"
            class M { public static void main(String[] a) { System.out.println(1); } }
            class A { int x; boolean b; public int get() { return x; } }
            class B extends A { }
        "#;
        let program = parse_program(src).unwrap();
        assert_eq!(program.classes[0].fields.len(), 2);
        assert_eq!(program.classes[1].parent.as_deref(), Some("A"));
    }

    #[test]
    fn precedence_binds_mul_over_add_over_less() {
        let src = r#"
            class M { public static void main(String[] a) { System.out.println(1); } }
            class C { public boolean p(int x) { return x < 1 + x * 2; } }
        "#;
        let program = parse_program(src).unwrap();
        let ret = &program.classes[0].methods[0].ret;
        let ExprKind::Less(_, rhs) = &ret.kind else {
            panic!("expected `<` at the top");
        };
        let ExprKind::Add(_, mul) = &rhs.kind else {
            panic!("expected `+` under `<`");
        };
        assert!(matches!(mul.kind, ExprKind::Mul(_, _)));
    }

    #[test]
    fn syntax_error_carries_line() {
        let err = parse_program("class M {\n  public static void main(String[] a) {\n    x = ;\n  }\n}")
            .unwrap_err();
        assert!(matches!(err, CompileError::Syntax { line: 3, .. }));
    }

    #[test]
    fn length_and_index_postfix() {
        let src = r#"
            class M { public static void main(String[] a) { System.out.println(1); } }
            class C { public int f(int[] xs) { return xs[xs.length - 1]; } }
        "#;
        let program = parse_program(src).unwrap();
        let ret = &program.classes[0].methods[0].ret;
        assert!(matches!(ret.kind, ExprKind::Index { .. }));
    }
}
