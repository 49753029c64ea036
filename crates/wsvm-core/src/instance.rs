// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! [`InstanceView`] (C4): the narrow interface the interpreter consumes from
//! its host. Module decoding, validation, constant-expression evaluation and
//! import resolution all happen upstream of this boundary -- the
//! interpreter only ever calls these methods, never parses bytes.

use std::cell::RefCell;

use wsvm_types::{FunctionType, Instruction, Value, ValueType};

use crate::{error::RuntimeError, memory::Memory, table::ElementSegment, table::Table};

/// A typed global cell. Writes to an immutable global are rejected at
/// runtime by [`InstanceView::write_global`], not by this type itself --
/// mutability is a property the host enforces, the cell just holds state.
#[derive(Debug, Clone)]
pub struct Global {
    value: Value,
    mutable: bool,
}

impl Global {
    pub fn new(value: Value, mutable: bool) -> Self {
        Global { value, mutable }
    }

    pub fn get(&self) -> Value {
        self.value
    }

    pub fn set(&mut self, value: Value) -> Result<(), RuntimeError> {
        if !self.mutable {
            return Err(RuntimeError::fatal("write to an immutable global"));
        }
        self.value = value;
        Ok(())
    }
}

/// A host function: takes the calling instance and the already-popped,
/// already-type-checked argument values, returns either no values (for a
/// void signature) or the declared result values in order. May trap.
pub type HostFunction =
    dyn Fn(&dyn InstanceView, &[Value]) -> Result<Option<Vec<Value>>, RuntimeError>;

/// What `call`/`call_indirect` find at a function index.
pub enum Callee<'a> {
    /// A function defined in this instance, with its decoded body.
    Module { type_id: u32, body: &'a [Instruction], local_types: &'a [ValueType] },
    /// An imported host function.
    Host { type_id: u32, func: &'a HostFunction },
}

pub trait InstanceView {
    fn function_type_id(&self, func_id: u32) -> u32;
    fn get_type(&self, type_id: u32) -> &FunctionType;
    fn resolve_callee(&self, func_id: u32) -> Result<Callee<'_>, RuntimeError>;
    fn function_count(&self) -> u32;

    fn table(&self, index: u32) -> &RefCell<Table>;
    fn memory(&self) -> &RefCell<Memory>;

    fn read_global(&self, index: u32) -> Value;
    fn write_global(&self, index: u32, value: Value) -> Result<(), RuntimeError>;

    fn element(&self, index: u32) -> &RefCell<ElementSegment>;
    fn element_count(&self) -> u32;
    fn set_element_dropped(&self, index: u32);
}
