//! Symbol table construction (context building) and class layout.
//!
//! Classes and methods live in flat arenas indexed by [`ClassId`] and
//! [`MethodId`]. A class referenced through `extends` before it is declared
//! gets a pre-initialized arena slot; the real declaration promotes that
//! slot in place, so children referring to the id never need rewiring.
//! Layouts are finalized parents-first after type checking and cached in a
//! per-class `OnceCell`.

use crate::ast::{ClassDecl, Program, Type};
use crate::error::CompileError;
use crate::keys::{ClassId, MethodId};
use crate::table::class::{ClassInfo, ClassLayout, VtableSlot};
use crate::table::method::MethodInfo;
use std::collections::HashMap;
use tracing_log::log::debug;

pub mod class;
pub mod method;

#[derive(Debug)]
pub struct SymbolTable {
    classes: Vec<ClassInfo>,
    class_index: HashMap<String, ClassId>,
    methods: Vec<MethodInfo>,
    main_name: String,
}

impl SymbolTable {
    /// Pass 1: walk class declarations only, recording classes, fields,
    /// methods, parameters, and locals. Statements and expressions are not
    /// visited here.
    pub fn build(program: &Program) -> Result<Self, CompileError> {
        let mut table = SymbolTable {
            classes: Vec::new(),
            class_index: HashMap::new(),
            methods: Vec::new(),
            main_name: program.main.name.clone(),
        };

        for (idx, local) in program.main.locals.iter().enumerate() {
            if program.main.locals[..idx].iter().any(|l| l.name == local.name) {
                return Err(CompileError::DuplicateLocal(local.name.clone()));
            }
        }

        for decl in &program.classes {
            table.declare_class(decl)?;
        }
        for class in &table.classes {
            if class.is_placeholder() {
                return Err(CompileError::UnknownClass(class.name.clone()));
            }
        }
        table.check_cycles()?;
        table.check_declared_types(program)?;
        table.check_hierarchy()?;

        debug!(
            "symbol table built: {} classes, {} methods",
            table.classes.len(),
            table.methods.len()
        );
        Ok(table)
    }

    fn declare_class(&mut self, decl: &ClassDecl) -> Result<(), CompileError> {
        if decl.name == self.main_name {
            return Err(CompileError::DuplicateClass(decl.name.clone()));
        }
        let parent = match &decl.parent {
            Some(parent_name) => {
                if parent_name == &self.main_name {
                    return Err(CompileError::BadMain(format!(
                        "class `{}` extends the main class",
                        decl.name
                    )));
                }
                Some(self.class_id_or_pre_initialize(parent_name))
            }
            None => None,
        };

        let id = match self.class_index.get(&decl.name).copied() {
            Some(id) if self.classes[id.as_usize()].is_placeholder() => {
                self.classes[id.as_usize()].promote(parent);
                id
            }
            Some(_) => return Err(CompileError::DuplicateClass(decl.name.clone())),
            None => self.push_class(ClassInfo::new(decl.name.clone(), parent)),
        };

        for field in &decl.fields {
            if self.classes[id.as_usize()].declared_field(&field.name).is_some() {
                return Err(CompileError::DuplicateField(field.name.clone()));
            }
            self.classes[id.as_usize()]
                .fields
                .push((field.name.clone(), field.ty.clone()));
        }

        for method in &decl.methods {
            let already_declared = self.classes[id.as_usize()]
                .methods
                .iter()
                .any(|&mid| self.methods[mid.as_usize()].name == method.name);
            if already_declared {
                return Err(CompileError::DuplicateMethod(method.name.clone()));
            }

            let mut params: Vec<(String, Type)> = Vec::new();
            for param in &method.params {
                if params.iter().any(|(name, _)| name == &param.name) {
                    return Err(CompileError::DuplicateParam(param.name.clone()));
                }
                params.push((param.name.clone(), param.ty.clone()));
            }
            let mut locals: Vec<(String, Type)> = Vec::new();
            for local in &method.locals {
                let taken = params.iter().any(|(name, _)| name == &local.name)
                    || locals.iter().any(|(name, _)| name == &local.name);
                if taken {
                    return Err(CompileError::DuplicateLocal(local.name.clone()));
                }
                locals.push((local.name.clone(), local.ty.clone()));
            }

            let mid = self.push_method(MethodInfo {
                owner: id,
                name: method.name.clone(),
                params,
                locals,
                return_type: method.return_type.clone(),
            });
            self.classes[id.as_usize()].methods.push(mid);
        }
        Ok(())
    }

    fn class_id_or_pre_initialize(&mut self, name: &str) -> ClassId {
        if let Some(&id) = self.class_index.get(name) {
            return id;
        }
        self.push_class(ClassInfo::pre_initialized(name.to_string()))
    }

    fn push_class(&mut self, class: ClassInfo) -> ClassId {
        let id = ClassId::from_usize(self.classes.len());
        self.class_index.insert(class.name.clone(), id);
        self.classes.push(class);
        id
    }

    fn push_method(&mut self, method: MethodInfo) -> MethodId {
        let id = MethodId::from_usize(self.methods.len());
        self.methods.push(method);
        id
    }

    pub fn class(&self, id: ClassId) -> &ClassInfo {
        &self.classes[id.as_usize()]
    }

    pub fn method(&self, id: MethodId) -> &MethodInfo {
        &self.methods[id.as_usize()]
    }

    pub fn lookup_class(&self, name: &str) -> Option<ClassId> {
        self.class_index.get(name).copied()
    }

    pub fn class_id(&self, name: &str) -> Result<ClassId, CompileError> {
        self.lookup_class(name)
            .ok_or_else(|| CompileError::UnknownClass(name.to_string()))
    }

    pub fn main_class_name(&self) -> &str {
        &self.main_name
    }

    /// Class ids in declaration order (placeholders are promoted in place,
    /// so a forward-referenced parent keeps its first-mention position).
    pub fn class_ids(&self) -> impl Iterator<Item = ClassId> + '_ {
        (0..self.classes.len()).map(ClassId::from_usize)
    }

    /// Resolve a method on a class or the nearest ancestor declaring it.
    pub fn resolve_method(&self, class: ClassId, name: &str) -> Option<MethodId> {
        let mut cur = Some(class);
        while let Some(id) = cur {
            let info = self.class(id);
            let found = info
                .methods
                .iter()
                .copied()
                .find(|&mid| self.method(mid).name == name);
            if found.is_some() {
                return found;
            }
            cur = info.parent;
        }
        None
    }

    /// Resolve a field on a class or any ancestor.
    pub fn resolve_field(&self, class: ClassId, name: &str) -> Option<&Type> {
        let mut cur = Some(class);
        while let Some(id) = cur {
            let info = self.class(id);
            if let Some(ty) = info.declared_field(name) {
                return Some(ty);
            }
            cur = info.parent;
        }
        None
    }

    /// Structural subtyping: `t <: u` iff `t = u`, or both are class types
    /// and `t` transitively extends `u`.
    pub fn is_subtype(&self, t: &Type, u: &Type) -> bool {
        if t == u {
            return true;
        }
        let (Type::Class(tn), Type::Class(un)) = (t, u) else {
            return false;
        };
        let Some(mut cur) = self.lookup_class(tn) else {
            return false;
        };
        while let Some(pid) = self.class(cur).parent {
            if self.class(pid).name == *un {
                return true;
            }
            cur = pid;
        }
        false
    }

    fn check_cycles(&self) -> Result<(), CompileError> {
        for start in &self.classes {
            let mut steps = 0;
            let mut cur = start.parent;
            while let Some(id) = cur {
                steps += 1;
                if steps > self.classes.len() {
                    return Err(CompileError::CyclicInheritance(start.name.clone()));
                }
                cur = self.class(id).parent;
            }
        }
        Ok(())
    }

    fn check_declared_types(&self, program: &Program) -> Result<(), CompileError> {
        for local in &program.main.locals {
            self.check_type_ref(&local.ty)?;
        }
        for class in &self.classes {
            for (_, ty) in &class.fields {
                self.check_type_ref(ty)?;
            }
            for &mid in &class.methods {
                let method = self.method(mid);
                for (_, ty) in method.params.iter().chain(method.locals.iter()) {
                    self.check_type_ref(ty)?;
                }
                self.check_type_ref(&method.return_type)?;
            }
        }
        Ok(())
    }

    fn check_type_ref(&self, ty: &Type) -> Result<(), CompileError> {
        if let Type::Class(name) = ty {
            if self.lookup_class(name).is_none() {
                return Err(CompileError::UnknownType(name.clone()));
            }
        }
        Ok(())
    }

    /// Field names are unique across the whole inheritance chain, and an
    /// override must keep the parent's parameter types with a covariant
    /// return. A same-name method with a different signature is overloading,
    /// which MiniJava forbids.
    fn check_hierarchy(&self) -> Result<(), CompileError> {
        for class in &self.classes {
            for (field_name, _) in &class.fields {
                let mut cur = class.parent;
                while let Some(pid) = cur {
                    if self.class(pid).declared_field(field_name).is_some() {
                        return Err(CompileError::DuplicateField(field_name.clone()));
                    }
                    cur = self.class(pid).parent;
                }
            }
            for &mid in &class.methods {
                let method = self.method(mid);
                let mut cur = class.parent;
                while let Some(pid) = cur {
                    let parent_method = self.class(pid)
                        .methods
                        .iter()
                        .copied()
                        .find(|&pm| self.method(pm).name == method.name);
                    if let Some(pm) = parent_method {
                        let parent_method = self.method(pm);
                        let compatible = method.param_types() == parent_method.param_types()
                            && self.is_subtype(&method.return_type, &parent_method.return_type);
                        if !compatible {
                            return Err(CompileError::DuplicateMethod(method.name.clone()));
                        }
                        break;
                    }
                    cur = self.class(pid).parent;
                }
            }
        }
        Ok(())
    }

    /// Phase C: finalize every class layout, parents first.
    pub fn finalize_layouts(&self) -> Result<(), CompileError> {
        for id in self.class_ids() {
            self.layout_of(id)?;
        }
        debug!("class layouts finalized for {} classes", self.classes.len());
        Ok(())
    }

    /// Layout of `id`, computing (and caching) it and its ancestors on
    /// first use. A child clones the parent's field list and vtable, then
    /// appends its own fields and either overrides a slot in place or
    /// appends a new one.
    pub fn layout_of(&self, id: ClassId) -> Result<&ClassLayout, CompileError> {
        if let Some(layout) = self.class(id).layout_cell().get() {
            return Ok(layout);
        }
        let class = self.class(id);
        let parent_layout = match class.parent {
            Some(pid) => Some(self.layout_of(pid)?),
            None => None,
        };

        let (mut fields_all, mut field_offsets) = parent_layout
            .map(|l| (l.fields_all.clone(), l.field_offsets.clone()))
            .unwrap_or_default();
        for (name, ty) in &class.fields {
            let offset = 4 + 4 * fields_all.len() as i32;
            field_offsets.insert(name.clone(), offset);
            fields_all.push((name.clone(), ty.clone()));
        }

        let (mut vtable, mut vtable_index) = parent_layout
            .map(|l| (l.vtable.clone(), l.vtable_index.clone()))
            .unwrap_or_default();
        for &mid in &class.methods {
            let name = &self.method(mid).name;
            if let Some(&slot) = vtable_index.get(name) {
                vtable[slot] = VtableSlot {
                    method: name.clone(),
                    definer: id,
                };
            } else {
                vtable_index.insert(name.clone(), vtable.len());
                vtable.push(VtableSlot {
                    method: name.clone(),
                    definer: id,
                });
            }
        }

        let instance_size = 4 + 4 * fields_all.len() as i32;
        let _ = class.layout_cell().set(ClassLayout {
            fields_all,
            field_offsets,
            vtable,
            vtable_index,
            instance_size,
        });
        class.layout()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::parse_program;
    use rstest::rstest;

    fn build(source: &str) -> Result<SymbolTable, CompileError> {
        SymbolTable::build(&parse_program(source).unwrap())
    }

    const MAIN: &str =
        "class M { public static void main(String[] a) { System.out.println(1); } }";

    #[test]
    fn forward_reference_matches_parent_first_layout() {
        let child_first = format!(
            "{MAIN} class B extends A {{ int y; }} class A {{ int x; public int f() {{ return x; }} }}"
        );
        let parent_first = format!(
            "{MAIN} class A {{ int x; public int f() {{ return x; }} }} class B extends A {{ int y; }}"
        );
        let t1 = build(&child_first).unwrap();
        let t2 = build(&parent_first).unwrap();
        t1.finalize_layouts().unwrap();
        t2.finalize_layouts().unwrap();

        for table in [&t1, &t2] {
            let b = table.lookup_class("B").unwrap();
            let layout = table.layout_of(b).unwrap();
            assert_eq!(layout.field_offset("x"), Some(4));
            assert_eq!(layout.field_offset("y"), Some(8));
            assert_eq!(layout.object_size(), 12);
            assert_eq!(layout.method_slot("f"), Some(0));
        }
    }

    #[test]
    fn placeholder_left_unresolved_is_unknown_class() {
        let err = build(&format!("{MAIN} class B extends Nowhere {{ }}")).unwrap_err();
        assert_eq!(err, CompileError::UnknownClass("Nowhere".to_string()));
    }

    #[rstest]
    #[case(
        "class A { } class A { }",
        CompileError::DuplicateClass("A".to_string())
    )]
    #[case(
        "class A { int x; int x; }",
        CompileError::DuplicateField("x".to_string())
    )]
    #[case(
        "class A { public int f(int x) { return x; } public int f(int x, int y) { return x; } }",
        CompileError::DuplicateMethod("f".to_string())
    )]
    #[case(
        "class A { public int f(int x, int x) { return x; } }",
        CompileError::DuplicateParam("x".to_string())
    )]
    #[case(
        "class A { public int f(int x) { int x; return x; } }",
        CompileError::DuplicateLocal("x".to_string())
    )]
    fn duplicate_declarations_are_rejected(#[case] classes: &str, #[case] expected: CompileError) {
        let err = build(&format!("{MAIN} {classes}")).unwrap_err();
        assert_eq!(err, expected);
    }

    #[test]
    fn inheritance_cycle_is_rejected() {
        let err = build(&format!(
            "{MAIN} class A extends B {{ }} class B extends A {{ }}"
        ))
        .unwrap_err();
        assert!(matches!(err, CompileError::CyclicInheritance(_)));
    }

    #[test]
    fn field_shadowing_across_chain_is_rejected() {
        let err = build(&format!(
            "{MAIN} class A {{ int x; }} class B extends A {{ int x; }}"
        ))
        .unwrap_err();
        assert_eq!(err, CompileError::DuplicateField("x".to_string()));
    }

    #[test]
    fn override_with_different_params_is_overloading() {
        let err = build(&format!(
            "{MAIN} class A {{ public int f(int x) {{ return x; }} }} \
             class B extends A {{ public int f(boolean b) {{ return 1; }} }}"
        ))
        .unwrap_err();
        assert_eq!(err, CompileError::DuplicateMethod("f".to_string()));
    }

    #[test]
    fn override_with_identical_signature_is_allowed() {
        let table = build(&format!(
            "{MAIN} class A {{ public int f() {{ return 1; }} }} \
             class B extends A {{ public int f() {{ return 2; }} }}"
        ))
        .unwrap();
        table.finalize_layouts().unwrap();
        let a = table.lookup_class("A").unwrap();
        let b = table.lookup_class("B").unwrap();
        assert_eq!(table.layout_of(a).unwrap().method_slot("f"), Some(0));
        let b_layout = table.layout_of(b).unwrap();
        assert_eq!(b_layout.method_slot("f"), Some(0));
        assert_eq!(b_layout.vtable[0].definer, b);
    }

    #[test]
    fn covariant_override_return_is_allowed() {
        let table = build(&format!(
            "{MAIN} class Base {{ }} class Derived extends Base {{ }} \
             class A {{ public Base get() {{ return new Base(); }} }} \
             class B extends A {{ public Derived get() {{ return new Derived(); }} }}"
        ));
        assert!(table.is_ok());
    }

    #[test]
    fn vtable_preserves_parent_slots_for_non_overridden_methods() {
        let table = build(&format!(
            "{MAIN} class A {{ public int f() {{ return 1; }} public int g() {{ return 2; }} }} \
             class B extends A {{ public int g() {{ return 3; }} public int h() {{ return 4; }} }}"
        ))
        .unwrap();
        table.finalize_layouts().unwrap();
        let a = table.lookup_class("A").unwrap();
        let b = table.lookup_class("B").unwrap();
        let la = table.layout_of(a).unwrap();
        let lb = table.layout_of(b).unwrap();
        assert_eq!(la.method_slot("f"), lb.method_slot("f"));
        assert_eq!(la.method_slot("g"), lb.method_slot("g"));
        assert_eq!(lb.method_slot("h"), Some(8));
        assert_eq!(lb.vtable[la.vtable_index["g"]].definer, b);
        assert_eq!(lb.vtable[la.vtable_index["f"]].definer, a);
    }

    #[test]
    fn object_size_is_monotone_down_the_chain() {
        let table = build(&format!(
            "{MAIN} class A {{ int x; }} class B extends A {{ }} class C extends B {{ int y; int z; }}"
        ))
        .unwrap();
        table.finalize_layouts().unwrap();
        let size = |name: &str| {
            table
                .layout_of(table.lookup_class(name).unwrap())
                .unwrap()
                .object_size()
        };
        assert_eq!(size("A"), 8);
        assert_eq!(size("B"), 8);
        assert_eq!(size("C"), 16);
    }

    #[test]
    fn subtyping_is_transitive_and_reflexive() {
        let table = build(&format!(
            "{MAIN} class A {{ }} class B extends A {{ }} class C extends B {{ }}"
        ))
        .unwrap();
        let class = |n: &str| Type::Class(n.to_string());
        assert!(table.is_subtype(&class("C"), &class("A")));
        assert!(table.is_subtype(&class("B"), &class("B")));
        assert!(!table.is_subtype(&class("A"), &class("C")));
        assert!(!table.is_subtype(&Type::Int, &Type::Bool));
    }

    #[test]
    fn extending_the_main_class_is_rejected() {
        let err = build(&format!("{MAIN} class A extends M {{ }}")).unwrap_err();
        assert!(matches!(err, CompileError::BadMain(_)));
    }
}
