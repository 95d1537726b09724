use crate::ast::Type;
use crate::error::CompileError;
use crate::keys::{ClassId, MethodId};
use once_cell::sync::OnceCell;
use std::collections::HashMap;

/// One dispatch-table slot: the method name and the class whose body fills
/// the slot. Overrides replace the definer in place, keeping the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VtableSlot {
    pub method: String,
    pub definer: ClassId,
}

/// Memory layout of a class, finalized after type checking. Word-sized
/// fields start at offset 4; offset 0 holds the vtable pointer.
#[derive(Debug, Clone)]
pub struct ClassLayout {
    pub fields_all: Vec<(String, Type)>,
    pub field_offsets: HashMap<String, i32>,
    pub vtable: Vec<VtableSlot>,
    pub vtable_index: HashMap<String, usize>,
    pub instance_size: i32,
}

impl ClassLayout {
    pub fn field_offset(&self, name: &str) -> Option<i32> {
        self.field_offsets.get(name).copied()
    }

    pub fn method_slot(&self, name: &str) -> Option<i32> {
        self.vtable_index.get(name).map(|&idx| 4 * idx as i32)
    }

    pub fn object_size(&self) -> i32 {
        self.instance_size
    }
}

#[derive(Debug)]
pub struct ClassInfo {
    pub name: String,
    pub parent: Option<ClassId>,
    pub fields: Vec<(String, Type)>,
    pub methods: Vec<MethodId>,
    placeholder: bool,
    layout: OnceCell<ClassLayout>,
}

impl ClassInfo {
    pub fn new(name: String, parent: Option<ClassId>) -> Self {
        ClassInfo {
            name,
            parent,
            fields: Vec::new(),
            methods: Vec::new(),
            placeholder: false,
            layout: OnceCell::new(),
        }
    }

    /// A class referenced through `extends` before its own declaration.
    /// The real declaration later fills this arena slot in place, so every
    /// child holding the id needs no rewiring.
    pub fn pre_initialized(name: String) -> Self {
        ClassInfo {
            placeholder: true,
            ..ClassInfo::new(name, None)
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.placeholder
    }

    pub(super) fn promote(&mut self, parent: Option<ClassId>) {
        self.placeholder = false;
        self.parent = parent;
    }

    pub fn declared_field(&self, name: &str) -> Option<&Type> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, ty)| ty)
    }

    pub(super) fn layout_cell(&self) -> &OnceCell<ClassLayout> {
        &self.layout
    }

    pub fn layout(&self) -> Result<&ClassLayout, CompileError> {
        self.layout
            .get()
            .ok_or(CompileError::Internal("class layout not finalized"))
    }
}
