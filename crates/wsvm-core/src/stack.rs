// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! The operand stack (C2): a LIFO of [`Value`]s plus a detachable "unwind
//! buffer" the control-transfer machinery uses to rescue values that must
//! survive a block exit (see `interpreter::control_flow`).

use wsvm_types::Value;

#[derive(Debug, Default)]
pub struct ValueStack {
    values: Vec<Value>,
    unwind: Vec<Value>,
}

impl ValueStack {
    pub fn new() -> Self {
        ValueStack { values: Vec::with_capacity(256), unwind: Vec::new() }
    }

    #[inline]
    pub fn push(&mut self, value: Value) {
        self.values.push(value);
    }

    #[inline]
    pub fn pop(&mut self) -> Value {
        self.values.pop().expect("operand stack underflow")
    }

    #[inline]
    pub fn peek(&self) -> Value {
        *self.values.last().expect("operand stack underflow")
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.values.len()
    }

    /// Drops values down to `height`. `height` must not exceed the current
    /// size.
    pub fn truncate(&mut self, height: usize) {
        debug_assert!(height <= self.values.len());
        self.values.truncate(height);
    }

    pub fn values_from(&self, height: usize) -> &[Value] {
        &self.values[height..]
    }

    /// Detaches and returns the current unwind buffer, leaving an empty one
    /// behind. Paired with [`ValueStack::set_unwind_frame`] this lets a
    /// control transfer save values separately from the general operand
    /// stack so they aren't clobbered by the intermediate drops of nested
    /// block exits.
    pub fn unwind_frame(&mut self) -> Vec<Value> {
        std::mem::take(&mut self.unwind)
    }

    /// Clears and returns the unwind buffer without installing a
    /// replacement.
    pub fn reset_unwind_frame(&mut self) -> Vec<Value> {
        std::mem::take(&mut self.unwind)
    }

    pub fn set_unwind_frame(&mut self, buffer: Vec<Value>) {
        self.unwind = buffer;
    }

    pub fn extend(&mut self, values: impl IntoIterator<Item = Value>) {
        self.values.extend(values);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wsvm_types::Value;

    #[test]
    fn push_pop_is_lifo() {
        let mut stack = ValueStack::new();
        stack.push(Value::I32(1));
        stack.push(Value::I32(2));
        assert_eq!(stack.pop(), Value::I32(2));
        assert_eq!(stack.pop(), Value::I32(1));
        assert_eq!(stack.size(), 0);
    }

    #[test]
    fn truncate_drops_excess_operands() {
        let mut stack = ValueStack::new();
        for i in 0..5 {
            stack.push(Value::I32(i));
        }
        stack.truncate(2);
        assert_eq!(stack.size(), 2);
        assert_eq!(stack.pop(), Value::I32(1));
    }

    #[test]
    fn unwind_frame_is_detach_and_reattach() {
        let mut stack = ValueStack::new();
        stack.push(Value::I32(42));
        let saved = stack.unwind_frame();
        assert!(saved.is_empty());
        stack.set_unwind_frame(vec![Value::I32(7)]);
        let restored = stack.reset_unwind_frame();
        assert_eq!(restored, vec![Value::I32(7)]);
        // the main stack was untouched by the unwind-buffer dance
        assert_eq!(stack.pop(), Value::I32(42));
    }
}
