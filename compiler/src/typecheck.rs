//! Pass 2: type every expression and validate every statement against the
//! symbol table. The first violation aborts the phase.

use crate::ast::{Expr, ExprKind, MainClass, MethodDecl, Program, Stmt, StmtKind, Type};
use crate::error::CompileError;
use crate::keys::ClassId;
use crate::table::SymbolTable;
use tracing_log::log::debug;

pub fn check(program: &Program, table: &SymbolTable) -> Result<(), CompileError> {
    let checker = TypeChecker { table };
    checker.check_main(&program.main)?;
    for class in &program.classes {
        let id = table.class_id(&class.name)?;
        for method in &class.methods {
            checker.check_method(id, method)?;
        }
    }
    debug!("type check passed for class `{}`", program.main.name);
    Ok(())
}

struct TypeChecker<'a> {
    table: &'a SymbolTable,
}

/// Identifier environment for one method body (or for `main`, which has
/// locals but no enclosing class and therefore no `this` and no fields).
struct Scope<'a> {
    class: Option<ClassId>,
    vars: Vec<(&'a str, &'a Type)>,
}

impl Scope<'_> {
    fn var_type(&self, name: &str) -> Option<&Type> {
        self.vars
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, ty)| *ty)
    }
}

impl TypeChecker<'_> {
    fn check_main(&self, main: &MainClass) -> Result<(), CompileError> {
        let scope = Scope {
            class: None,
            vars: main
                .locals
                .iter()
                .map(|l| (l.name.as_str(), &l.ty))
                .collect(),
        };
        for stmt in &main.body {
            self.check_stmt(&scope, stmt)?;
        }
        Ok(())
    }

    fn check_method(&self, class: ClassId, decl: &MethodDecl) -> Result<(), CompileError> {
        let mid = self
            .table
            .resolve_method(class, &decl.name)
            .ok_or_else(|| CompileError::UnboundMethod(decl.name.clone()))?;
        let info = self.table.method(mid);
        let scope = Scope {
            class: Some(class),
            vars: info
                .locals
                .iter()
                .chain(info.params.iter())
                .map(|(name, ty)| (name.as_str(), ty))
                .collect(),
        };
        for stmt in &decl.body {
            self.check_stmt(&scope, stmt)?;
        }
        let ret_ty = self.infer_expr(&scope, &decl.ret)?;
        if !self.table.is_subtype(&ret_ty, &info.return_type) {
            return Err(CompileError::TypeMismatch {
                expected: info.return_type.to_string(),
                actual: ret_ty.to_string(),
                context: "return",
            });
        }
        Ok(())
    }

    fn check_stmt(&self, scope: &Scope, stmt: &Stmt) -> Result<(), CompileError> {
        match &stmt.kind {
            StmtKind::Block(stmts) => {
                for s in stmts {
                    self.check_stmt(scope, s)?;
                }
                Ok(())
            }
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.expect_expr(scope, cond, &Type::Bool, "if condition")?;
                self.check_stmt(scope, then_branch)?;
                self.check_stmt(scope, else_branch)
            }
            StmtKind::While { cond, body } => {
                self.expect_expr(scope, cond, &Type::Bool, "while condition")?;
                self.check_stmt(scope, body)
            }
            StmtKind::Println(arg) => self.expect_expr(scope, arg, &Type::Int, "System.out.println"),
            StmtKind::Assign { target, value } => {
                let target_ty = self.ident_type(scope, target)?;
                let value_ty = self.infer_expr(scope, value)?;
                if !self.table.is_subtype(&value_ty, &target_ty) {
                    return Err(CompileError::TypeMismatch {
                        expected: target_ty.to_string(),
                        actual: value_ty.to_string(),
                        context: "assignment",
                    });
                }
                Ok(())
            }
            StmtKind::ArrayAssign {
                target,
                index,
                value,
            } => {
                let target_ty = self.ident_type(scope, target)?;
                if target_ty != Type::IntArray {
                    return Err(CompileError::TypeMismatch {
                        expected: Type::IntArray.to_string(),
                        actual: target_ty.to_string(),
                        context: "array assignment",
                    });
                }
                self.expect_expr(scope, index, &Type::Int, "array index")?;
                self.expect_expr(scope, value, &Type::Int, "array assignment")
            }
        }
    }

    fn expect_expr(
        &self,
        scope: &Scope,
        expr: &Expr,
        expected: &Type,
        context: &'static str,
    ) -> Result<(), CompileError> {
        let actual = self.infer_expr(scope, expr)?;
        if &actual != expected {
            return Err(CompileError::TypeMismatch {
                expected: expected.to_string(),
                actual: actual.to_string(),
                context,
            });
        }
        Ok(())
    }

    /// Locals, then parameters, then fields up the inheritance chain.
    fn ident_type(&self, scope: &Scope, name: &str) -> Result<Type, CompileError> {
        if let Some(ty) = scope.var_type(name) {
            return Ok(ty.clone());
        }
        if let Some(class) = scope.class {
            if let Some(ty) = self.table.resolve_field(class, name) {
                return Ok(ty.clone());
            }
        }
        Err(CompileError::UnboundIdent(name.to_string()))
    }

    fn infer_expr(&self, scope: &Scope, expr: &Expr) -> Result<Type, CompileError> {
        match &expr.kind {
            ExprKind::IntLit(_) => Ok(Type::Int),
            ExprKind::True | ExprKind::False => Ok(Type::Bool),
            ExprKind::Ident(name) => self.ident_type(scope, name),
            ExprKind::This => match scope.class {
                Some(class) => Ok(Type::Class(self.table.class(class).name.clone())),
                None => Err(CompileError::BadMain("`this` used in main".to_string())),
            },
            ExprKind::And(lhs, rhs) => {
                self.expect_expr(scope, lhs, &Type::Bool, "&&")?;
                self.expect_expr(scope, rhs, &Type::Bool, "&&")?;
                Ok(Type::Bool)
            }
            ExprKind::Less(lhs, rhs) => {
                self.expect_expr(scope, lhs, &Type::Int, "<")?;
                self.expect_expr(scope, rhs, &Type::Int, "<")?;
                Ok(Type::Bool)
            }
            ExprKind::Add(lhs, rhs) => self.arith(scope, lhs, rhs, "+"),
            ExprKind::Sub(lhs, rhs) => self.arith(scope, lhs, rhs, "-"),
            ExprKind::Mul(lhs, rhs) => self.arith(scope, lhs, rhs, "*"),
            ExprKind::Index { array, index } => {
                self.expect_expr(scope, array, &Type::IntArray, "array index")?;
                self.expect_expr(scope, index, &Type::Int, "array index")?;
                Ok(Type::Int)
            }
            ExprKind::Length(array) => {
                self.expect_expr(scope, array, &Type::IntArray, ".length")?;
                Ok(Type::Int)
            }
            ExprKind::Call {
                receiver,
                method,
                args,
            } => {
                let receiver_ty = self.infer_expr(scope, receiver)?;
                let Type::Class(class_name) = &receiver_ty else {
                    return Err(CompileError::TypeMismatch {
                        expected: "an object".to_string(),
                        actual: receiver_ty.to_string(),
                        context: "method call",
                    });
                };
                let class = self.table.class_id(class_name)?;
                let mid = self
                    .table
                    .resolve_method(class, method)
                    .ok_or_else(|| CompileError::UnboundMethod(method.clone()))?;
                let info = self.table.method(mid);
                if args.len() != info.params.len() {
                    return Err(CompileError::ArgCountMismatch {
                        method: method.clone(),
                        expected: info.params.len(),
                        actual: args.len(),
                    });
                }
                for (arg, (_, param_ty)) in args.iter().zip(info.params.iter()) {
                    let arg_ty = self.infer_expr(scope, arg)?;
                    if !self.table.is_subtype(&arg_ty, param_ty) {
                        return Err(CompileError::TypeMismatch {
                            expected: param_ty.to_string(),
                            actual: arg_ty.to_string(),
                            context: "argument",
                        });
                    }
                }
                Ok(info.return_type.clone())
            }
            ExprKind::NewArray(len) => {
                self.expect_expr(scope, len, &Type::Int, "new int[]")?;
                Ok(Type::IntArray)
            }
            ExprKind::NewObject(class_name) => {
                if class_name == self.table.main_class_name() {
                    return Err(CompileError::BadMain(
                        "the main class cannot be instantiated".to_string(),
                    ));
                }
                self.table.class_id(class_name)?;
                Ok(Type::Class(class_name.clone()))
            }
            ExprKind::Not(inner) => {
                self.expect_expr(scope, inner, &Type::Bool, "!")?;
                Ok(Type::Bool)
            }
        }
    }

    fn arith(
        &self,
        scope: &Scope,
        lhs: &Expr,
        rhs: &Expr,
        context: &'static str,
    ) -> Result<Type, CompileError> {
        self.expect_expr(scope, lhs, &Type::Int, context)?;
        self.expect_expr(scope, rhs, &Type::Int, context)?;
        Ok(Type::Int)
    }
}
