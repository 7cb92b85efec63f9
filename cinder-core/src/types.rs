//! Target type table shared by every file of a build.

use std::fmt;

/// A type the target provides without any declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinType {
    Int,
    Bool,
    Void,
}

impl BuiltinType {
    pub fn name(self) -> &'static str {
        match self {
            BuiltinType::Int => "int",
            BuiltinType::Bool => "bool",
            BuiltinType::Void => "void",
        }
    }
}

impl fmt::Display for BuiltinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Sizes and names of the builtin types for one target data model.
///
/// Built once per invocation and only ever read by file processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeTable {
    data_model: &'static str,
    int_size: usize,
    bool_size: usize,
    pointer_size: usize,
}

impl TypeTable {
    /// The LP64 data model used on x86-64 Linux. Every value occupies one
    /// 8-byte stack slot.
    pub fn lp64() -> Self {
        Self {
            data_model: "lp64",
            int_size: 8,
            bool_size: 8,
            pointer_size: 8,
        }
    }

    /// Name of the data model.
    pub fn data_model(&self) -> &'static str {
        self.data_model
    }

    /// Look up a builtin type by its source name.
    pub fn lookup(&self, name: &str) -> Option<BuiltinType> {
        match name {
            "int" => Some(BuiltinType::Int),
            "bool" => Some(BuiltinType::Bool),
            "void" => Some(BuiltinType::Void),
            _ => None,
        }
    }

    /// Storage size of a builtin type in bytes; `void` has none.
    pub fn size_of(&self, ty: BuiltinType) -> usize {
        match ty {
            BuiltinType::Int => self.int_size,
            BuiltinType::Bool => self.bool_size,
            BuiltinType::Void => 0,
        }
    }

    /// Size of any pointer in bytes.
    pub fn pointer_size(&self) -> usize {
        self.pointer_size
    }

    /// Size of the stack slot every local and parameter occupies.
    pub fn slot_size(&self) -> usize {
        self.int_size.max(self.bool_size).max(self.pointer_size)
    }
}

impl Default for TypeTable {
    fn default() -> Self {
        Self::lp64()
    }
}
