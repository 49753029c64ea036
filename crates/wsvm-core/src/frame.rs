// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! Per-activation state (C3): the instruction cursor, locals, and the
//! label stack that backs block/loop/if control transfer.
//!
//! A [`Label`] is pushed whenever `block`/`loop`/`if` is entered and records
//! everything a later branch into it needs: the operand-stack height at
//! entry (so excess operands can be dropped), the result arity for a
//! forward exit, and -- only for loops -- the param arity and re-entry pc
//! for a backward branch. This is the "explicit label frame" alternative
//! the interpreter notes call out as equivalent to a detachable unwind
//! sub-stack; operand rescue across nested drops still goes through
//! [`crate::stack::ValueStack`]'s unwind buffer, it is just exercised once
//! per branch instead of being threaded through every intervening `end`.

use std::rc::Rc;

use wsvm_types::{BlockType, Instruction, Value, ValueType};

use crate::instance::InstanceView;
use crate::stack::ValueStack;

#[derive(Debug, Clone, Copy)]
pub struct Label {
    pub height: usize,
    pub result_arity: usize,
    pub param_arity: usize,
    /// `Some` only for a loop label: where a branch into it re-enters.
    pub loop_start: Option<usize>,
    /// Where control resumes after the matching `end` -- used by a forward
    /// branch, and by `else` skipping an untaken alternative.
    pub after_end: usize,
}

impl Label {
    pub fn from_block_type(block_type: &BlockType, height: usize, after_end: usize, loop_start: Option<usize>) -> Self {
        Label {
            height,
            result_arity: block_type.arity(),
            param_arity: block_type.param_arity(),
            loop_start,
            after_end,
        }
    }
}

pub struct StackFrame {
    pub instructions: Rc<[Instruction]>,
    pub pc: usize,
    pub func_id: u32,
    pub locals: Vec<Value>,
    pub instance: Rc<dyn InstanceView>,
    /// True for an ordinary module-function activation; false for the
    /// placeholder frame pushed around a host-function call (it exists only
    /// so a stack trace taken mid-call still shows the host call site).
    pub is_control_frame: bool,
    pub should_return: bool,
    labels: Vec<Label>,
}

impl StackFrame {
    /// `entry_height`/`return_arity` describe the function's own implicit
    /// scope: the operand-stack height right after arguments were popped by
    /// the caller, and the declared number of return values. These back an
    /// implicit label pushed here so that the function body's own trailing
    /// `end` -- or an early `return` -- realigns the stack through the same
    /// [`exit_scope`] path as any nested block, rather than needing special
    /// casing in the interpreter loop.
    pub fn new(
        instructions: Rc<[Instruction]>,
        instance: Rc<dyn InstanceView>,
        func_id: u32,
        args: Vec<Value>,
        local_types: &[ValueType],
        entry_height: usize,
        return_arity: usize,
    ) -> Self {
        let mut locals = args;
        locals.reserve(local_types.len());
        locals.extend(local_types.iter().map(|ty| Value::default_for(*ty)));
        let instruction_count = instructions.len();
        let mut frame = StackFrame {
            instructions,
            pc: 0,
            func_id,
            locals,
            instance,
            is_control_frame: true,
            should_return: false,
            labels: Vec::new(),
        };
        frame.push_label(Label {
            height: entry_height,
            result_arity: return_arity,
            param_arity: 0,
            loop_start: None,
            after_end: instruction_count,
        });
        frame
    }

    /// A placeholder frame for an imported host-function call: no body, no
    /// locals beyond nothing, kept only for stack-trace fidelity.
    pub fn host_placeholder(instance: Rc<dyn InstanceView>, func_id: u32) -> Self {
        StackFrame {
            instructions: Rc::from(Vec::new().into_boxed_slice()),
            pc: 0,
            func_id,
            locals: Vec::new(),
            instance,
            is_control_frame: false,
            should_return: false,
            labels: Vec::new(),
        }
    }

    pub fn terminated(&self) -> bool {
        self.pc >= self.instructions.len()
    }

    /// Fetches the current instruction and advances the cursor.
    pub fn load_current_instruction(&mut self) -> &Instruction {
        let index = self.pc;
        self.pc += 1;
        &self.instructions[index]
    }

    pub fn jump_to(&mut self, label: usize) {
        self.pc = label;
    }

    pub fn block_depth(&self) -> usize {
        self.labels.len()
    }

    pub fn push_label(&mut self, label: Label) {
        self.labels.push(label);
    }

    /// Pops `count` labels (innermost first) and returns the last one
    /// popped -- the actual target of a branch `count - 1` levels up.
    pub fn pop_labels(&mut self, count: usize) -> Label {
        assert!(count >= 1, "a branch always targets at least one label");
        let mut target = None;
        for _ in 0..count {
            target = Some(self.labels.pop().expect("branch target deeper than the live label stack"));
        }
        target.unwrap()
    }

    pub fn pop_innermost_label(&mut self) -> Label {
        self.labels.pop().expect("`end` with no open block")
    }

    /// True iff this `end` closes the function body itself (no blocks left
    /// open).
    pub fn is_last_block(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn local_get(&self, index: u32) -> Value {
        self.locals[index as usize]
    }

    pub fn local_set(&mut self, index: u32, value: Value) {
        self.locals[index as usize] = value;
    }
}

/// Realigns `stack` to the label's entry height, keeping exactly `arity`
/// result values (dropping everything else pushed inside the exited
/// scope), then -- if `jump_to` is given -- moves the frame's cursor there.
/// Routes the saved values through the stack's unwind buffer, matching the
/// control-transfer protocol: detach, compute the surviving values, store
/// them in the buffer, then flush the buffer back.
pub fn exit_scope(frame: &mut StackFrame, stack: &mut ValueStack, height: usize, arity: usize, jump_to: Option<usize>) {
    let _ = stack.unwind_frame();
    let mut survivors = Vec::with_capacity(arity);
    for _ in 0..arity {
        survivors.push(stack.pop());
    }
    survivors.reverse();
    stack.truncate(height);
    stack.set_unwind_frame(survivors);
    let restored = stack.reset_unwind_frame();
    stack.extend(restored);
    if let Some(target) = jump_to {
        frame.jump_to(target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wsvm_types::ValueType;

    struct NoopInstance;
    impl InstanceView for NoopInstance {
        fn function_type_id(&self, _: u32) -> u32 {
            unimplemented!()
        }
        fn get_type(&self, _: u32) -> &wsvm_types::FunctionType {
            unimplemented!()
        }
        fn resolve_callee(&self, _: u32) -> Result<crate::instance::Callee<'_>, crate::error::RuntimeError> {
            unimplemented!()
        }
        fn function_count(&self) -> u32 {
            0
        }
        fn table(&self, _: u32) -> &std::cell::RefCell<crate::table::Table> {
            unimplemented!()
        }
        fn memory(&self) -> &std::cell::RefCell<crate::memory::Memory> {
            unimplemented!()
        }
        fn read_global(&self, _: u32) -> Value {
            unimplemented!()
        }
        fn write_global(&self, _: u32, _: Value) -> Result<(), crate::error::RuntimeError> {
            unimplemented!()
        }
        fn element(&self, _: u32) -> &std::cell::RefCell<crate::table::ElementSegment> {
            unimplemented!()
        }
        fn element_count(&self) -> u32 {
            0
        }
        fn set_element_dropped(&self, _: u32) {}
    }

    #[test]
    fn locals_are_args_then_zeroed_declared_types() {
        let frame = StackFrame::new(
            Rc::from(Vec::new().into_boxed_slice()),
            Rc::new(NoopInstance),
            0,
            vec![Value::I32(9)],
            &[ValueType::I64, ValueType::F32],
            0,
            0,
        );
        assert_eq!(frame.local_get(0), Value::I32(9));
        assert_eq!(frame.local_get(1), Value::I64(0));
        assert_eq!(frame.local_get(2), Value::F32(0));
    }

    #[test]
    fn exit_scope_drops_extra_operands_keeping_only_arity() {
        let mut stack = ValueStack::new();
        stack.push(Value::I32(7));
        let height = stack.size();
        let mut frame = StackFrame::new(
            Rc::from(Vec::new().into_boxed_slice()),
            Rc::new(NoopInstance),
            0,
            vec![],
            &[],
            height,
            1,
        );
        stack.push(Value::I32(7));
        stack.push(Value::I32(8));
        exit_scope(&mut frame, &mut stack, height, 1, None);
        assert_eq!(stack.size(), height + 1);
        assert_eq!(stack.pop(), Value::I32(8));
    }
}
