// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! `call`/`call_indirect` and the host-function interop they both bottom out
//! in. Argument marshalling is symmetric for both: pop `params.len()` values
//! off the operand stack in declaration order, hand them to the callee, push
//! however many result values it produced back in declaration order.

use std::rc::Rc;

use wsvm_types::{Value, ValueType};

use crate::error::{RuntimeError, Trap};
use crate::frame::StackFrame;
use crate::instance::{Callee, InstanceView};
use crate::interpreter::CallStack;
use crate::stack::ValueStack;

/// What the interpreter's main loop does after resolving a callee: either
/// push a fresh module-function activation and keep looping, or invoke a
/// host closure immediately and stay on the caller's frame.
pub enum Dispatch {
    EnterModuleFrame(StackFrame),
    HostCallComplete,
}

/// Pops `params.len()` values in declaration order, checking each popped
/// value's type tag against the callee's declared parameter type. A
/// well-typed program can never trigger a mismatch here -- encountering one
/// means the embedder handed the interpreter a bogus argument list, which is
/// a fatal error rather than a trap.
fn pop_args(stack: &mut ValueStack, params: &[ValueType]) -> Result<Vec<Value>, RuntimeError> {
    let mut args = vec![Value::I32(0); params.len()];
    for (slot, expected) in args.iter_mut().rev().zip(params.iter().rev()) {
        let v = stack.pop();
        if v.value_type() != *expected {
            return Err(RuntimeError::fatal(format!(
                "argument type mismatch: expected {expected:?}, found {:?}",
                v.value_type()
            )));
        }
        *slot = v;
    }
    Ok(args)
}

fn push_results(stack: &mut ValueStack, results: Option<Vec<Value>>) {
    if let Some(values) = results {
        stack.extend(values);
    }
}

pub fn call(stack: &mut ValueStack, call_stack: &mut CallStack, instance: Rc<dyn InstanceView>, func_id: u32) -> Result<Dispatch, RuntimeError> {
    dispatch_callee(stack, call_stack, instance, func_id)
}

/// `call_indirect`: reads a funcref out of `table_idx`, checks it against
/// `expected_type_id` before ever invoking it.
pub fn call_indirect(
    stack: &mut ValueStack,
    call_stack: &mut CallStack,
    instance: Rc<dyn InstanceView>,
    table_idx: u32,
    expected_type_id: u32,
) -> Result<Dispatch, RuntimeError> {
    let elem_idx = stack.pop().as_i32() as u32;
    let func_id = {
        let table = instance.table(table_idx).borrow();
        let slot_count = table.size();
        if elem_idx >= slot_count {
            return Err(Trap::UndefinedElement.into());
        }
        match table.get(elem_idx).map_err(|_| Trap::UndefinedElement)? {
            Value::FuncRef(id) if id != wsvm_types::value::NULL_REF => id,
            _ => return Err(Trap::UninitializedElement(elem_idx).into()),
        }
    };
    let actual_type_id = instance.function_type_id(func_id);
    if actual_type_id != expected_type_id || !instance.get_type(actual_type_id).types_match(instance.get_type(expected_type_id)) {
        return Err(Trap::IndirectCallTypeMismatch.into());
    }
    dispatch_callee(stack, call_stack, instance, func_id)
}

fn dispatch_callee(stack: &mut ValueStack, call_stack: &mut CallStack, instance: Rc<dyn InstanceView>, func_id: u32) -> Result<Dispatch, RuntimeError> {
    match instance.resolve_callee(func_id)? {
        Callee::Module { type_id, body, local_types } => {
            let function_type = instance.get_type(type_id);
            let return_arity = function_type.returns.len();
            let args = pop_args(stack, &function_type.params)?;
            let entry_height = stack.size();
            let frame = StackFrame::new(
                Rc::from(body.to_vec().into_boxed_slice()),
                instance.clone(),
                func_id,
                args,
                local_types,
                entry_height,
                return_arity,
            );
            Ok(Dispatch::EnterModuleFrame(frame))
        }
        Callee::Host { type_id, func } => {
            let args = pop_args(stack, &instance.get_type(type_id).params)?;
            // pushed for the duration of the call so a trap or re-entrant
            // call during `func` still shows the host call site in a trace;
            // popped only on success, left in place if `func` errors.
            call_stack.push(StackFrame::host_placeholder(instance.clone(), func_id));
            let results = func(instance.as_ref(), &args)?;
            call_stack.pop();
            push_results(stack, results);
            Ok(Dispatch::HostCallComplete)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Memory;
    use crate::table::{ElementSegment, Table};
    use std::cell::RefCell;
    use wsvm_types::{FunctionType, Instruction, Opcode, ValueType};

    struct FakeInstance {
        ty: FunctionType,
        body: Vec<Instruction>,
        table: RefCell<Table>,
    }

    impl InstanceView for FakeInstance {
        fn function_type_id(&self, _func_id: u32) -> u32 {
            0
        }
        fn get_type(&self, _type_id: u32) -> &FunctionType {
            &self.ty
        }
        fn resolve_callee(&self, func_id: u32) -> Result<Callee<'_>, RuntimeError> {
            if func_id == 0 {
                Ok(Callee::Module { type_id: 0, body: &self.body, local_types: &[] })
            } else {
                Err(RuntimeError::Trap(Trap::MissingHostImport(func_id)))
            }
        }
        fn function_count(&self) -> u32 {
            1
        }
        fn table(&self, _index: u32) -> &RefCell<Table> {
            &self.table
        }
        fn memory(&self) -> &RefCell<Memory> {
            unimplemented!()
        }
        fn read_global(&self, _index: u32) -> Value {
            unimplemented!()
        }
        fn write_global(&self, _index: u32, _value: Value) -> Result<(), RuntimeError> {
            unimplemented!()
        }
        fn element(&self, _index: u32) -> &RefCell<ElementSegment> {
            unimplemented!()
        }
        fn element_count(&self) -> u32 {
            0
        }
        fn set_element_dropped(&self, _index: u32) {}
    }

    #[test]
    fn call_indirect_traps_on_uninitialized_slot() {
        let instance = Rc::new(FakeInstance {
            ty: FunctionType::new(vec![], vec![]),
            body: vec![Instruction::new(Opcode::end)],
            table: RefCell::new(Table::new(2, None, Value::FuncRef(wsvm_types::value::NULL_REF))),
        });
        let mut stack = ValueStack::new();
        let mut call_stack = CallStack::new();
        stack.push(Value::I32(0));
        let err = call_indirect(&mut stack, &mut call_stack, instance, 0, 0).unwrap_err();
        assert_eq!(err.trap_kind(), Some(&Trap::UninitializedElement(0)));
    }

    #[test]
    fn call_indirect_traps_on_out_of_range_index() {
        let instance = Rc::new(FakeInstance {
            ty: FunctionType::new(vec![], vec![]),
            body: vec![Instruction::new(Opcode::end)],
            table: RefCell::new(Table::new(1, None, Value::FuncRef(wsvm_types::value::NULL_REF))),
        });
        let mut stack = ValueStack::new();
        let mut call_stack = CallStack::new();
        stack.push(Value::I32(5));
        let err = call_indirect(&mut stack, &mut call_stack, instance, 0, 0).unwrap_err();
        assert_eq!(err.trap_kind(), Some(&Trap::UndefinedElement));
    }

    #[test]
    fn call_rejects_argument_whose_type_tag_mismatches_declared_param() {
        let ty = FunctionType::new(vec![ValueType::I32], vec![]);
        let instance = Rc::new(FakeInstance {
            ty,
            body: vec![Instruction::new(Opcode::end)],
            table: RefCell::new(Table::new(0, None, Value::FuncRef(wsvm_types::value::NULL_REF))),
        });
        let mut stack = ValueStack::new();
        let mut call_stack = CallStack::new();
        stack.push(Value::F32(0));
        let err = call(&mut stack, &mut call_stack, instance, 0).unwrap_err();
        assert!(err.trap_kind().is_none());
        assert!(matches!(err, RuntimeError::Fatal(_)));
    }

    #[test]
    fn call_pops_declared_arity_and_enters_module_frame() {
        let ty = FunctionType::new(vec![ValueType::I32, ValueType::I32], vec![]);
        let instance = Rc::new(FakeInstance {
            ty,
            body: vec![Instruction::new(Opcode::end)],
            table: RefCell::new(Table::new(0, None, Value::FuncRef(wsvm_types::value::NULL_REF))),
        });
        let mut stack = ValueStack::new();
        let mut call_stack = CallStack::new();
        stack.push(Value::I32(1));
        stack.push(Value::I32(2));
        match call(&mut stack, &mut call_stack, instance, 0).unwrap() {
            Dispatch::EnterModuleFrame(frame) => {
                assert_eq!(frame.local_get(0), Value::I32(1));
                assert_eq!(frame.local_get(1), Value::I32(2));
            }
            Dispatch::HostCallComplete => panic!("expected a module frame"),
        }
    }
}
