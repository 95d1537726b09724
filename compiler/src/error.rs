use std::fmt::Display;

/// Every phase fails fast: the first error aborts the phase and is printed
/// as a single diagnostic by the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    Syntax {
        line: usize,
        message: String,
    },
    MalformedVapor {
        line: usize,
        message: String,
    },
    DuplicateClass(String),
    DuplicateField(String),
    DuplicateMethod(String),
    DuplicateParam(String),
    DuplicateLocal(String),
    UnknownType(String),
    UnknownClass(String),
    UnboundIdent(String),
    UnboundMethod(String),
    TypeMismatch {
        expected: String,
        actual: String,
        context: &'static str,
    },
    ArgCountMismatch {
        method: String,
        expected: usize,
        actual: usize,
    },
    CyclicInheritance(String),
    BadMain(String),
    Internal(&'static str),
}

impl Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompileError::Syntax { line, message } => {
                write!(f, "syntax error at line {line}: {message}")
            }
            CompileError::MalformedVapor { line, message } => {
                write!(f, "malformed vapor at line {line}: {message}")
            }
            CompileError::DuplicateClass(name) => write!(f, "duplicate class `{name}`"),
            CompileError::DuplicateField(name) => write!(f, "duplicate field `{name}`"),
            CompileError::DuplicateMethod(name) => write!(f, "duplicate method `{name}`"),
            CompileError::DuplicateParam(name) => write!(f, "duplicate parameter `{name}`"),
            CompileError::DuplicateLocal(name) => write!(f, "duplicate local `{name}`"),
            CompileError::UnknownType(name) => write!(f, "unknown type `{name}`"),
            CompileError::UnknownClass(name) => write!(f, "unknown class `{name}`"),
            CompileError::UnboundIdent(name) => write!(f, "unbound identifier `{name}`"),
            CompileError::UnboundMethod(name) => write!(f, "unbound method `{name}`"),
            CompileError::TypeMismatch {
                expected,
                actual,
                context,
            } => {
                write!(f, "type mismatch in {context}: expected {expected}, found {actual}")
            }
            CompileError::ArgCountMismatch {
                method,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "wrong number of arguments to `{method}`: expected {expected}, found {actual}"
                )
            }
            CompileError::CyclicInheritance(name) => {
                write!(f, "cyclic inheritance involving class `{name}`")
            }
            CompileError::BadMain(what) => write!(f, "malformed main class: {what}"),
            CompileError::Internal(what) => write!(f, "internal error: {what}"),
        }
    }
}
