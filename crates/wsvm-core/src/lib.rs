// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! The execution core of a stack-based virtual machine: value representation,
//! the operand stack, linear memory and tables, the host interface, the
//! numeric kernels, and the interpreter loop that ties them together.
//!
//! Decoding module bytes into an [`wsvm_types::Instruction`] stream,
//! validating a module, evaluating constant expressions, and resolving
//! imports all happen upstream of [`InstanceView`] -- none of that lives in
//! this crate.

pub mod error;
pub mod frame;
pub mod instance;
pub mod interpreter;
pub mod memory;
pub mod numeric;
pub mod stack;
pub mod table;

use std::rc::Rc;

use tracing::instrument;
use wsvm_types::Instruction;
use wsvm_types::Value;

pub use error::{RuntimeError, Trap};
pub use instance::{Callee, Global, HostFunction, InstanceView};
pub use interpreter::{CallStack, Engine};
pub use memory::Memory;
pub use table::{ElementSegment, Table};

/// The entry point described in the host-interface design: call a function
/// by index, with the call stack and operand stack owned entirely by this
/// type and reset between independent top-level calls.
pub struct Interpreter {
    engine: Engine,
}

impl Default for Interpreter {
    fn default() -> Self {
        Interpreter::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Interpreter { engine: Engine::new() }
    }

    /// Invokes `func_id` on `instance` with `args`, returning its declared
    /// result values. A host function reachable from `func_id` may itself
    /// call back into the interpreter (through [`InstanceView`]); nothing
    /// about this call assumes it's the only activation on the stack.
    #[instrument(skip(self, instance, args))]
    pub fn call(&mut self, instance: Rc<dyn InstanceView>, func_id: u32, args: Vec<Value>) -> Result<Vec<Value>, RuntimeError> {
        match instance.resolve_callee(func_id)? {
            Callee::Module { type_id, body, local_types } => {
                let function_type = instance.get_type(type_id).clone();
                let entry_height = self.engine.stack.size();
                let frame = frame::StackFrame::new(
                    instruction_slice(body),
                    instance,
                    func_id,
                    args,
                    local_types,
                    entry_height,
                    function_type.returns.len(),
                );
                self.engine.run(frame, function_type.returns.len())
            }
            Callee::Host { func, .. } => {
                let results = func(instance.as_ref(), &args)?;
                Ok(results.unwrap_or_default())
            }
        }
    }

    /// `(func_id, pc)` for every activation still on the call stack, useful
    /// after a trap to report where execution stopped.
    pub fn stack_trace(&self) -> Vec<(u32, usize)> {
        self.engine.call_stack.trace()
    }
}

fn instruction_slice(body: &[Instruction]) -> Rc<[Instruction]> {
    Rc::from(body.to_vec().into_boxed_slice())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use wsvm_types::{FunctionType, Opcode, ValueType};

    struct TestInstance {
        types: Vec<FunctionType>,
        bodies: Vec<Vec<Instruction>>,
        locals: Vec<Vec<ValueType>>,
        memory: RefCell<Memory>,
        table: RefCell<Table>,
        globals: RefCell<Vec<Global>>,
        elements: Vec<RefCell<ElementSegment>>,
    }

    impl InstanceView for TestInstance {
        fn function_type_id(&self, func_id: u32) -> u32 {
            func_id
        }
        fn get_type(&self, type_id: u32) -> &FunctionType {
            &self.types[type_id as usize]
        }
        fn resolve_callee(&self, func_id: u32) -> Result<Callee<'_>, RuntimeError> {
            let idx = func_id as usize;
            Ok(Callee::Module { type_id: func_id, body: &self.bodies[idx], local_types: &self.locals[idx] })
        }
        fn function_count(&self) -> u32 {
            self.bodies.len() as u32
        }
        fn table(&self, _index: u32) -> &RefCell<Table> {
            &self.table
        }
        fn memory(&self) -> &RefCell<Memory> {
            &self.memory
        }
        fn read_global(&self, index: u32) -> Value {
            self.globals.borrow()[index as usize].get()
        }
        fn write_global(&self, index: u32, value: Value) -> Result<(), RuntimeError> {
            self.globals.borrow_mut()[index as usize].set(value)
        }
        fn element(&self, index: u32) -> &RefCell<ElementSegment> {
            &self.elements[index as usize]
        }
        fn element_count(&self) -> u32 {
            self.elements.len() as u32
        }
        fn set_element_dropped(&self, index: u32) {
            self.elements[index as usize].borrow_mut().drop();
        }
    }

    fn instr(opcode: Opcode, operands: Vec<i64>) -> Instruction {
        Instruction::with_operands(opcode, operands)
    }

    #[test]
    fn add_two_constants_and_return() {
        let instance: Rc<dyn InstanceView> = Rc::new(TestInstance {
            types: vec![FunctionType::new(vec![ValueType::I32, ValueType::I32], vec![ValueType::I32])],
            bodies: vec![vec![
                instr(Opcode::local_get, vec![0]),
                instr(Opcode::local_get, vec![1]),
                instr(Opcode::i32_add, vec![]),
                instr(Opcode::end, vec![]),
            ]],
            locals: vec![vec![]],
            memory: RefCell::new(Memory::new(1, None)),
            table: RefCell::new(Table::new(0, None, Value::FuncRef(wsvm_types::value::NULL_REF))),
            globals: RefCell::new(vec![]),
            elements: vec![],
        });
        let mut interp = Interpreter::new();
        let result = interp.call(instance, 0, vec![Value::I32(3), Value::I32(4)]).unwrap();
        assert_eq!(result, vec![Value::I32(7)]);
    }

    #[test]
    fn i32_div_by_zero_traps_and_leaves_a_stack_trace() {
        let instance: Rc<dyn InstanceView> = Rc::new(TestInstance {
            types: vec![FunctionType::new(vec![], vec![ValueType::I32])],
            bodies: vec![vec![
                instr(Opcode::i32_const, vec![1]),
                instr(Opcode::i32_const, vec![0]),
                instr(Opcode::i32_div_s, vec![]),
                instr(Opcode::end, vec![]),
            ]],
            locals: vec![vec![]],
            memory: RefCell::new(Memory::new(1, None)),
            table: RefCell::new(Table::new(0, None, Value::FuncRef(wsvm_types::value::NULL_REF))),
            globals: RefCell::new(vec![]),
            elements: vec![],
        });
        let mut interp = Interpreter::new();
        let err = interp.call(instance, 0, vec![]).unwrap_err();
        assert_eq!(err.trap_kind(), Some(&Trap::IntegerDivideByZero));
        // the cursor already advanced past `i32.div_s` by the time it trapped
        assert_eq!(interp.stack_trace(), vec![(0, 3)]);
    }

    #[test]
    fn branch_out_of_a_block_drops_excess_operands_to_declared_arity() {
        // block (result i32)
        //   i32.const 7
        //   i32.const 8
        //   br 0
        // end
        let body = vec![
            instr(Opcode::block, vec![]),
            instr(Opcode::i32_const, vec![7]),
            instr(Opcode::i32_const, vec![8]),
            instr(Opcode::br, vec![0]),
            instr(Opcode::end, vec![]),
            instr(Opcode::end, vec![]),
        ];
        let mut block_instr = instr(Opcode::block, vec![]);
        block_instr.block_type = Some(wsvm_types::BlockType::Value(ValueType::I32));
        block_instr.end_target = Some(5);
        let mut body = body;
        body[0] = block_instr;

        let instance: Rc<dyn InstanceView> = Rc::new(TestInstance {
            types: vec![FunctionType::new(vec![], vec![ValueType::I32])],
            bodies: vec![body],
            locals: vec![vec![]],
            memory: RefCell::new(Memory::new(1, None)),
            table: RefCell::new(Table::new(0, None, Value::FuncRef(wsvm_types::value::NULL_REF))),
            globals: RefCell::new(vec![]),
            elements: vec![],
        });
        let mut interp = Interpreter::new();
        let result = interp.call(instance, 0, vec![]).unwrap();
        assert_eq!(result, vec![Value::I32(8)]);
    }
}
