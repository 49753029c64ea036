// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! `nop`/`drop`/`select`, constants, locals, globals, and the bare reference
//! instructions (`ref.null`/`ref.is_null`/`ref.func`).

use wsvm_types::{RefType, Value};

use crate::error::RuntimeError;
use crate::frame::StackFrame;
use crate::instance::InstanceView;
use crate::stack::ValueStack;

pub fn drop_top(stack: &mut ValueStack) {
    stack.pop();
}

pub fn select(stack: &mut ValueStack) {
    let cond = stack.pop().as_i32();
    let b = stack.pop();
    let a = stack.pop();
    stack.push(if cond != 0 { a } else { b });
}

pub fn i32_const(stack: &mut ValueStack, v: i32) {
    stack.push(Value::I32(v));
}

pub fn i64_const(stack: &mut ValueStack, v: i64) {
    stack.push(Value::I64(v));
}

pub fn f32_const(stack: &mut ValueStack, bits: u32) {
    stack.push(Value::F32(bits));
}

pub fn f64_const(stack: &mut ValueStack, bits: u64) {
    stack.push(Value::F64(bits));
}

pub fn local_get(stack: &mut ValueStack, frame: &StackFrame, index: u32) {
    stack.push(frame.local_get(index));
}

pub fn local_set(stack: &mut ValueStack, frame: &mut StackFrame, index: u32) {
    let v = stack.pop();
    frame.local_set(index, v);
}

pub fn local_tee(stack: &mut ValueStack, frame: &mut StackFrame, index: u32) {
    let v = stack.peek();
    frame.local_set(index, v);
}

pub fn global_get(stack: &mut ValueStack, instance: &dyn InstanceView, index: u32) {
    stack.push(instance.read_global(index));
}

pub fn global_set(stack: &mut ValueStack, instance: &dyn InstanceView, index: u32) -> Result<(), RuntimeError> {
    let v = stack.pop();
    instance.write_global(index, v)
}

pub fn ref_null(stack: &mut ValueStack, ty: RefType) {
    stack.push(Value::null_ref(ty));
}

pub fn ref_is_null(stack: &mut ValueStack) {
    let v = stack.pop();
    stack.push(if v.is_null_ref() { wsvm_types::TRUE } else { wsvm_types::FALSE });
}

pub fn ref_func(stack: &mut ValueStack, func_id: u32) {
    stack.push(Value::FuncRef(func_id));
}
