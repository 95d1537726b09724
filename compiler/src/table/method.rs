use crate::ast::Type;
use crate::keys::ClassId;

/// A method recorded in the symbol table arena. Parameter and local names
/// are pairwise distinct within the method; the builder enforces this.
#[derive(Debug, Clone)]
pub struct MethodInfo {
    pub owner: ClassId,
    pub name: String,
    pub params: Vec<(String, Type)>,
    pub locals: Vec<(String, Type)>,
    pub return_type: Type,
}

impl MethodInfo {
    /// Identifier resolution inside a method body: locals shadow nothing
    /// (names are unique), but lookup order is locals, then parameters.
    pub fn var_type(&self, name: &str) -> Option<&Type> {
        self.locals
            .iter()
            .chain(self.params.iter())
            .find(|(n, _)| n == name)
            .map(|(_, ty)| ty)
    }

    pub fn param_types(&self) -> Vec<&Type> {
        self.params.iter().map(|(_, ty)| ty).collect()
    }
}
