// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! The fetch-dispatch-mutate loop (C8) and the opcode handlers it drives.
//!
//! Dispatch is a single `match` over [`Opcode`] rather than a literal
//! `[fn; MAX_OPCODE_NUMBER]` array of function pointers: with ~200 variants
//! of wildly different arity (some need nothing but the stack, some need an
//! immediate plus the host memory, `call`/`call_indirect` need the whole
//! call stack) a uniform function-pointer signature would force every
//! handler behind an adapter closure anyway, and `rustc` already lowers a
//! dense match over a field-less enum to a jump table. `call`/`call_indirect`
//! are the one family handled directly in the loop rather than delegated to
//! a handler function, since only the loop owns the call stack they push
//! onto.

pub mod control_flow;
pub mod fundamental;
pub mod funcall;
pub mod memtable;

use std::rc::Rc;

use tracing::trace;
use wsvm_types::{Opcode, RefType, Value};

use crate::error::RuntimeError;
use crate::frame::StackFrame;
use crate::numeric;
use crate::stack::ValueStack;
use funcall::Dispatch;

/// The live chain of activations. Frames are never popped on a trap, so the
/// contents at the moment an error is returned double as a stack trace.
#[derive(Default)]
pub struct CallStack {
    frames: Vec<StackFrame>,
}

impl CallStack {
    pub fn new() -> Self {
        CallStack { frames: Vec::new() }
    }

    pub fn push(&mut self, frame: StackFrame) {
        self.frames.push(frame);
    }

    pub fn pop(&mut self) -> Option<StackFrame> {
        self.frames.pop()
    }

    pub fn top_mut(&mut self) -> &mut StackFrame {
        self.frames.last_mut().expect("call stack is never empty while running")
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// `(func_id, pc)` for every live activation, innermost last.
    pub fn trace(&self) -> Vec<(u32, usize)> {
        self.frames.iter().map(|f| (f.func_id, f.pc)).collect()
    }
}

/// Owns the single operand stack shared by every activation and the call
/// stack of activations itself.
pub struct Engine {
    pub stack: ValueStack,
    pub call_stack: CallStack,
}

impl Engine {
    pub fn new() -> Self {
        Engine { stack: ValueStack::new(), call_stack: CallStack::new() }
    }

    /// Runs `entry` (and anything it calls) to completion and returns its
    /// result values. On a trap the call stack is left exactly as it stood
    /// at the moment of the trap, so [`CallStack::trace`] still reflects
    /// where execution was.
    pub fn run(&mut self, entry: StackFrame, result_arity: usize) -> Result<Vec<Value>, RuntimeError> {
        let base_depth = self.call_stack.len();
        self.call_stack.push(entry);

        loop {
            let frame = self.call_stack.top_mut();
            if frame.should_return || frame.terminated() {
                self.call_stack.pop();
                if self.call_stack.len() == base_depth {
                    let height = self.stack.size() - result_arity;
                    let results = self.stack.values_from(height).to_vec();
                    self.stack.truncate(height);
                    return Ok(results);
                }
                continue;
            }

            let instructions = Rc::clone(&frame.instructions);
            let index = frame.pc;
            frame.pc += 1;
            let instr = &instructions[index];
            trace!(opcode = ?instr.opcode, pc = index, "dispatch");

            if let Err(err) = self.step(instr) {
                return Err(err);
            }
        }
    }

    fn step(&mut self, instr: &wsvm_types::Instruction) -> Result<(), RuntimeError> {
        use Opcode::*;

        // `call`/`call_indirect` are handled up front: they may push a new
        // frame onto `self.call_stack`, which no per-op handler below has
        // access to.
        match instr.opcode {
            call => {
                let frame = self.call_stack.top_mut();
                let instance = Rc::clone(&frame.instance);
                let func_id = instr.operand(0) as u32;
                match funcall::call(&mut self.stack, &mut self.call_stack, instance, func_id)? {
                    Dispatch::EnterModuleFrame(new_frame) => self.call_stack.push(new_frame),
                    Dispatch::HostCallComplete => {}
                }
                return Ok(());
            }
            call_indirect => {
                let frame = self.call_stack.top_mut();
                let instance = Rc::clone(&frame.instance);
                let table_idx = instr.operand(0) as u32;
                let type_id = instr.operand(1) as u32;
                match funcall::call_indirect(&mut self.stack, &mut self.call_stack, instance, table_idx, type_id)? {
                    Dispatch::EnterModuleFrame(new_frame) => self.call_stack.push(new_frame),
                    Dispatch::HostCallComplete => {}
                }
                return Ok(());
            }
            _ => {}
        }

        let frame = self.call_stack.top_mut();
        let stack = &mut self.stack;

        match instr.opcode {
            unreachable => return Err(crate::error::Trap::Unreachable.into()),
            nop => {}
            block => control_flow::enter_block(frame, stack, instr),
            loop_ => control_flow::enter_loop(frame, stack, instr),
            if_ => control_flow::enter_if(frame, stack, instr),
            else_ => control_flow::exec_else(frame, stack),
            end => control_flow::exec_end(frame, stack),
            br => control_flow::br(frame, stack, instr.operand(0) as u32),
            br_if => control_flow::br_if(frame, stack, instr.operand(0) as u32),
            br_table => control_flow::br_table(frame, stack, &instr.label_table),
            return_ => control_flow::exec_return(frame, stack),

            drop => fundamental::drop_top(stack),
            select => fundamental::select(stack),

            local_get => fundamental::local_get(stack, frame, instr.operand(0) as u32),
            local_set => fundamental::local_set(stack, frame, instr.operand(0) as u32),
            local_tee => fundamental::local_tee(stack, frame, instr.operand(0) as u32),
            global_get => fundamental::global_get(stack, frame.instance.as_ref(), instr.operand(0) as u32),
            global_set => fundamental::global_set(stack, frame.instance.as_ref(), instr.operand(0) as u32)?,

            table_get => memtable::table_get(stack, frame.instance.as_ref(), instr.operand(0) as u32)?,
            table_set => memtable::table_set(stack, frame.instance.as_ref(), instr.operand(0) as u32)?,
            table_size => memtable::table_size(stack, frame.instance.as_ref(), instr.operand(0) as u32),
            table_grow => memtable::table_grow(stack, frame.instance.as_ref(), instr.operand(0) as u32),
            table_fill => memtable::table_fill(stack, frame.instance.as_ref(), instr.operand(0) as u32)?,
            table_copy => memtable::table_copy(stack, frame.instance.as_ref(), instr.operand(0) as u32, instr.operand(1) as u32)?,
            table_init => memtable::table_init(stack, frame.instance.as_ref(), instr.operand(0) as u32, instr.operand(1) as u32)?,
            elem_drop => memtable::elem_drop(frame.instance.as_ref(), instr.operand(0) as u32),
            ref_null => fundamental::ref_null(stack, if instr.operand(0) == 0 { RefType::Func } else { RefType::Extern }),
            ref_is_null => fundamental::ref_is_null(stack),
            ref_func => fundamental::ref_func(stack, instr.operand(0) as u32),

            i32_load => memtable::load_i32(stack, frame.instance.as_ref(), instr.operand(0) as u32)?,
            i64_load => memtable::load_i64(stack, frame.instance.as_ref(), instr.operand(0) as u32)?,
            f32_load => memtable::load_f32(stack, frame.instance.as_ref(), instr.operand(0) as u32)?,
            f64_load => memtable::load_f64(stack, frame.instance.as_ref(), instr.operand(0) as u32)?,
            i32_load8_s => memtable::load_i32_8s(stack, frame.instance.as_ref(), instr.operand(0) as u32)?,
            i32_load8_u => memtable::load_i32_8u(stack, frame.instance.as_ref(), instr.operand(0) as u32)?,
            i32_load16_s => memtable::load_i32_16s(stack, frame.instance.as_ref(), instr.operand(0) as u32)?,
            i32_load16_u => memtable::load_i32_16u(stack, frame.instance.as_ref(), instr.operand(0) as u32)?,
            i64_load8_s => memtable::load_i64_8s(stack, frame.instance.as_ref(), instr.operand(0) as u32)?,
            i64_load8_u => memtable::load_i64_8u(stack, frame.instance.as_ref(), instr.operand(0) as u32)?,
            i64_load16_s => memtable::load_i64_16s(stack, frame.instance.as_ref(), instr.operand(0) as u32)?,
            i64_load16_u => memtable::load_i64_16u(stack, frame.instance.as_ref(), instr.operand(0) as u32)?,
            i64_load32_s => memtable::load_i64_32s(stack, frame.instance.as_ref(), instr.operand(0) as u32)?,
            i64_load32_u => memtable::load_i64_32u(stack, frame.instance.as_ref(), instr.operand(0) as u32)?,
            i32_store => memtable::store_i32(stack, frame.instance.as_ref(), instr.operand(0) as u32)?,
            i64_store => memtable::store_i64(stack, frame.instance.as_ref(), instr.operand(0) as u32)?,
            f32_store => memtable::store_f32(stack, frame.instance.as_ref(), instr.operand(0) as u32)?,
            f64_store => memtable::store_f64(stack, frame.instance.as_ref(), instr.operand(0) as u32)?,
            i32_store8 => memtable::store_i32_8(stack, frame.instance.as_ref(), instr.operand(0) as u32)?,
            i32_store16 => memtable::store_i32_16(stack, frame.instance.as_ref(), instr.operand(0) as u32)?,
            i64_store8 => memtable::store_i64_8(stack, frame.instance.as_ref(), instr.operand(0) as u32)?,
            i64_store16 => memtable::store_i64_16(stack, frame.instance.as_ref(), instr.operand(0) as u32)?,
            i64_store32 => memtable::store_i64_32(stack, frame.instance.as_ref(), instr.operand(0) as u32)?,
            memory_size => memtable::memory_size(stack, frame.instance.as_ref()),
            memory_grow => memtable::memory_grow(stack, frame.instance.as_ref()),
            memory_init => memtable::memory_init(stack, frame.instance.as_ref(), instr.operand(0) as u32)?,
            data_drop => memtable::data_drop(frame.instance.as_ref(), instr.operand(0) as u32),
            memory_copy => memtable::memory_copy(stack, frame.instance.as_ref())?,
            memory_fill => memtable::memory_fill(stack, frame.instance.as_ref())?,

            i32_const => fundamental::i32_const(stack, instr.operand(0) as i32),
            i64_const => fundamental::i64_const(stack, instr.operand(0)),
            f32_const => fundamental::f32_const(stack, instr.operand(0) as u32),
            f64_const => fundamental::f64_const(stack, instr.operand(0) as u64),

            i32_eqz => unary_i32(stack, |a| (a == 0) as i32),
            i32_eq => binary_i32_cmp(stack, |a, b| a == b),
            i32_ne => binary_i32_cmp(stack, |a, b| a != b),
            i32_lt_s => binary_i32_cmp(stack, |a, b| a < b),
            i32_lt_u => binary_u32_cmp(stack, |a, b| a < b),
            i32_gt_s => binary_i32_cmp(stack, |a, b| a > b),
            i32_gt_u => binary_u32_cmp(stack, |a, b| a > b),
            i32_le_s => binary_i32_cmp(stack, |a, b| a <= b),
            i32_le_u => binary_u32_cmp(stack, |a, b| a <= b),
            i32_ge_s => binary_i32_cmp(stack, |a, b| a >= b),
            i32_ge_u => binary_u32_cmp(stack, |a, b| a >= b),

            i64_eqz => unary_i64_to_i32(stack, |a| (a == 0) as i32),
            i64_eq => binary_i64_cmp(stack, |a, b| a == b),
            i64_ne => binary_i64_cmp(stack, |a, b| a != b),
            i64_lt_s => binary_i64_cmp(stack, |a, b| a < b),
            i64_lt_u => binary_u64_cmp(stack, |a, b| a < b),
            i64_gt_s => binary_i64_cmp(stack, |a, b| a > b),
            i64_gt_u => binary_u64_cmp(stack, |a, b| a > b),
            i64_le_s => binary_i64_cmp(stack, |a, b| a <= b),
            i64_le_u => binary_u64_cmp(stack, |a, b| a <= b),
            i64_ge_s => binary_i64_cmp(stack, |a, b| a >= b),
            i64_ge_u => binary_u64_cmp(stack, |a, b| a >= b),

            f32_eq => binary_f32_cmp(stack, |a, b| a == b),
            f32_ne => binary_f32_cmp(stack, |a, b| a != b),
            f32_lt => binary_f32_cmp(stack, |a, b| a < b),
            f32_gt => binary_f32_cmp(stack, |a, b| a > b),
            f32_le => binary_f32_cmp(stack, |a, b| a <= b),
            f32_ge => binary_f32_cmp(stack, |a, b| a >= b),
            f64_eq => binary_f64_cmp(stack, |a, b| a == b),
            f64_ne => binary_f64_cmp(stack, |a, b| a != b),
            f64_lt => binary_f64_cmp(stack, |a, b| a < b),
            f64_gt => binary_f64_cmp(stack, |a, b| a > b),
            f64_le => binary_f64_cmp(stack, |a, b| a <= b),
            f64_ge => binary_f64_cmp(stack, |a, b| a >= b),

            i32_clz => unary_i32(stack, |a| a.leading_zeros() as i32),
            i32_ctz => unary_i32(stack, |a| a.trailing_zeros() as i32),
            i32_popcnt => unary_i32(stack, |a| a.count_ones() as i32),
            i32_add => binary_i32(stack, |a, b| a.wrapping_add(b)),
            i32_sub => binary_i32(stack, |a, b| a.wrapping_sub(b)),
            i32_mul => binary_i32(stack, |a, b| a.wrapping_mul(b)),
            i32_div_s => try_binary_i32(stack, numeric::i32_div_s)?,
            i32_div_u => try_binary_i32(stack, numeric::i32_div_u)?,
            i32_rem_s => try_binary_i32(stack, numeric::i32_rem_s)?,
            i32_rem_u => try_binary_i32(stack, numeric::i32_rem_u)?,
            i32_and => binary_i32(stack, |a, b| a & b),
            i32_or => binary_i32(stack, |a, b| a | b),
            i32_xor => binary_i32(stack, |a, b| a ^ b),
            i32_shl => binary_i32(stack, |a, b| a.wrapping_shl(b as u32 & 31)),
            i32_shr_s => binary_i32(stack, |a, b| a.wrapping_shr(b as u32 & 31)),
            i32_shr_u => binary_i32(stack, |a, b| ((a as u32).wrapping_shr(b as u32 & 31)) as i32),
            i32_rotl => binary_i32(stack, numeric::i32_rotl),
            i32_rotr => binary_i32(stack, numeric::i32_rotr),

            i64_clz => unary_i64(stack, |a| a.leading_zeros() as i64),
            i64_ctz => unary_i64(stack, |a| a.trailing_zeros() as i64),
            i64_popcnt => unary_i64(stack, |a| a.count_ones() as i64),
            i64_add => binary_i64(stack, |a, b| a.wrapping_add(b)),
            i64_sub => binary_i64(stack, |a, b| a.wrapping_sub(b)),
            i64_mul => binary_i64(stack, |a, b| a.wrapping_mul(b)),
            i64_div_s => try_binary_i64(stack, numeric::i64_div_s)?,
            i64_div_u => try_binary_i64(stack, numeric::i64_div_u)?,
            i64_rem_s => try_binary_i64(stack, numeric::i64_rem_s)?,
            i64_rem_u => try_binary_i64(stack, numeric::i64_rem_u)?,
            i64_and => binary_i64(stack, |a, b| a & b),
            i64_or => binary_i64(stack, |a, b| a | b),
            i64_xor => binary_i64(stack, |a, b| a ^ b),
            i64_shl => binary_i64(stack, |a, b| a.wrapping_shl(b as u32 & 63)),
            i64_shr_s => binary_i64(stack, |a, b| a.wrapping_shr(b as u32 & 63)),
            i64_shr_u => binary_i64(stack, |a, b| ((a as u64).wrapping_shr(b as u32 & 63)) as i64),
            i64_rotl => binary_i64(stack, numeric::i64_rotl),
            i64_rotr => binary_i64(stack, numeric::i64_rotr),

            f32_abs => unary_f32_bits(stack, numeric::f32_abs_bits),
            f32_neg => unary_f32_bits(stack, numeric::f32_neg_bits),
            f32_ceil => unary_f32(stack, f32::ceil),
            f32_floor => unary_f32(stack, f32::floor),
            f32_trunc => unary_f32(stack, f32::trunc),
            f32_nearest => unary_f32(stack, numeric::f32_nearest),
            f32_sqrt => unary_f32(stack, f32::sqrt),
            f32_add => binary_f32(stack, |a, b| a + b),
            f32_sub => binary_f32(stack, |a, b| a - b),
            f32_mul => binary_f32(stack, |a, b| a * b),
            f32_div => binary_f32(stack, |a, b| a / b),
            f32_min => binary_f32(stack, numeric::f32_min),
            f32_max => binary_f32(stack, numeric::f32_max),
            f32_copysign => binary_f32_bits(stack, numeric::f32_copysign_bits),
            f64_abs => unary_f64_bits(stack, numeric::f64_abs_bits),
            f64_neg => unary_f64_bits(stack, numeric::f64_neg_bits),
            f64_ceil => unary_f64(stack, f64::ceil),
            f64_floor => unary_f64(stack, f64::floor),
            f64_trunc => unary_f64(stack, f64::trunc),
            f64_nearest => unary_f64(stack, numeric::f64_nearest),
            f64_sqrt => unary_f64(stack, f64::sqrt),
            f64_add => binary_f64(stack, |a, b| a + b),
            f64_sub => binary_f64(stack, |a, b| a - b),
            f64_mul => binary_f64(stack, |a, b| a * b),
            f64_div => binary_f64(stack, |a, b| a / b),
            f64_min => binary_f64(stack, numeric::f64_min),
            f64_max => binary_f64(stack, numeric::f64_max),
            f64_copysign => binary_f64_bits(stack, numeric::f64_copysign_bits),

            i32_wrap_i64 => unary_i64_to_i32(stack, |a| a as i32),
            i32_trunc_f32_s => try_unary_f32_to_i32(stack, numeric::i32_trunc_f32_s)?,
            i32_trunc_f32_u => try_unary_f32_to_i32(stack, numeric::i32_trunc_f32_u)?,
            i32_trunc_f64_s => try_unary_f64_to_i32(stack, numeric::i32_trunc_f64_s)?,
            i32_trunc_f64_u => try_unary_f64_to_i32(stack, numeric::i32_trunc_f64_u)?,
            i64_extend_i32_s => unary_i32_to_i64(stack, |a| a as i64),
            i64_extend_i32_u => unary_i32_to_i64(stack, |a| a as u32 as i64),
            i64_trunc_f32_s => try_unary_f32_to_i64(stack, numeric::i64_trunc_f32_s)?,
            i64_trunc_f32_u => try_unary_f32_to_i64(stack, numeric::i64_trunc_f32_u)?,
            i64_trunc_f64_s => try_unary_f64_to_i64(stack, numeric::i64_trunc_f64_s)?,
            i64_trunc_f64_u => try_unary_f64_to_i64(stack, numeric::i64_trunc_f64_u)?,
            f32_convert_i32_s => unary_i32_to_f32(stack, |a| a as f32),
            f32_convert_i32_u => unary_i32_to_f32(stack, |a| a as u32 as f32),
            f32_convert_i64_s => unary_i64_to_f32(stack, |a| a as f32),
            f32_convert_i64_u => unary_i64_to_f32(stack, numeric::f32_convert_i64_u),
            f32_demote_f64 => unary_f64_to_f32(stack, |a| a as f32),
            f64_convert_i32_s => unary_i32_to_f64(stack, |a| a as f64),
            f64_convert_i32_u => unary_i32_to_f64(stack, |a| a as u32 as f64),
            f64_convert_i64_s => unary_i64_to_f64(stack, |a| a as f64),
            f64_convert_i64_u => unary_i64_to_f64(stack, numeric::f64_convert_i64_u),
            f64_promote_f32 => unary_f32_to_f64(stack, |a| a as f64),
            i32_reinterpret_f32 => unary_f32_bits_to_i32(stack),
            i64_reinterpret_f64 => unary_f64_bits_to_i64(stack),
            f32_reinterpret_i32 => unary_i32_to_f32_bits(stack),
            f64_reinterpret_i64 => unary_i64_to_f64_bits(stack),

            i32_extend8_s => unary_i32(stack, numeric::i32_extend8_s),
            i32_extend16_s => unary_i32(stack, numeric::i32_extend16_s),
            i64_extend8_s => unary_i64(stack, numeric::i64_extend8_s),
            i64_extend16_s => unary_i64(stack, numeric::i64_extend16_s),
            i64_extend32_s => unary_i64(stack, numeric::i64_extend32_s),

            i32_trunc_sat_f32_s => unary_f32_to_i32(stack, numeric::i32_trunc_sat_f32_s),
            i32_trunc_sat_f32_u => unary_f32_to_i32(stack, numeric::i32_trunc_sat_f32_u),
            i32_trunc_sat_f64_s => unary_f64_to_i32(stack, numeric::i32_trunc_sat_f64_s),
            i32_trunc_sat_f64_u => unary_f64_to_i32(stack, numeric::i32_trunc_sat_f64_u),
            i64_trunc_sat_f32_s => unary_f32_to_i64(stack, numeric::i64_trunc_sat_f32_s),
            i64_trunc_sat_f32_u => unary_f32_to_i64(stack, numeric::i64_trunc_sat_f32_u),
            i64_trunc_sat_f64_s => unary_f64_to_i64(stack, numeric::i64_trunc_sat_f64_s),
            i64_trunc_sat_f64_u => unary_f64_to_i64(stack, numeric::i64_trunc_sat_f64_u),

            call | call_indirect => unreachable!("handled above"),
        }

        Ok(())
    }
}

impl Default for Engine {
    fn default() -> Self {
        Engine::new()
    }
}

// ---- small typed stack helpers used only by the dispatch match above ------

fn unary_i32(stack: &mut ValueStack, f: impl Fn(i32) -> i32) {
    let a = stack.pop().as_i32();
    stack.push(Value::I32(f(a)));
}
fn unary_i64(stack: &mut ValueStack, f: impl Fn(i64) -> i64) {
    let a = stack.pop().as_i64();
    stack.push(Value::I64(f(a)));
}
fn unary_i64_to_i32(stack: &mut ValueStack, f: impl Fn(i64) -> i32) {
    let a = stack.pop().as_i64();
    stack.push(Value::I32(f(a)));
}
fn unary_i32_to_i64(stack: &mut ValueStack, f: impl Fn(i32) -> i64) {
    let a = stack.pop().as_i32();
    stack.push(Value::I64(f(a)));
}
fn unary_f32(stack: &mut ValueStack, f: impl Fn(f32) -> f32) {
    let a = stack.pop().as_f32();
    stack.push(Value::from_f32(f(a)));
}
fn unary_f64(stack: &mut ValueStack, f: impl Fn(f64) -> f64) {
    let a = stack.pop().as_f64();
    stack.push(Value::from_f64(f(a)));
}
fn unary_f32_bits(stack: &mut ValueStack, f: impl Fn(u32) -> u32) {
    let a = stack.pop().as_u32_bits();
    stack.push(Value::F32(f(a)));
}
fn unary_f64_bits(stack: &mut ValueStack, f: impl Fn(u64) -> u64) {
    let a = stack.pop().as_u64_bits();
    stack.push(Value::F64(f(a)));
}
fn unary_i32_to_f32(stack: &mut ValueStack, f: impl Fn(i32) -> f32) {
    let a = stack.pop().as_i32();
    stack.push(Value::from_f32(f(a)));
}
fn unary_i64_to_f32(stack: &mut ValueStack, f: impl Fn(i64) -> f32) {
    let a = stack.pop().as_i64();
    stack.push(Value::from_f32(f(a)));
}
fn unary_i32_to_f64(stack: &mut ValueStack, f: impl Fn(i32) -> f64) {
    let a = stack.pop().as_i32();
    stack.push(Value::from_f64(f(a)));
}
fn unary_i64_to_f64(stack: &mut ValueStack, f: impl Fn(i64) -> f64) {
    let a = stack.pop().as_i64();
    stack.push(Value::from_f64(f(a)));
}
fn unary_f64_to_f32(stack: &mut ValueStack, f: impl Fn(f64) -> f32) {
    let a = stack.pop().as_f64();
    stack.push(Value::from_f32(f(a)));
}
fn unary_f32_to_f64(stack: &mut ValueStack, f: impl Fn(f32) -> f64) {
    let a = stack.pop().as_f32();
    stack.push(Value::from_f64(f(a)));
}
fn unary_f32_to_i32(stack: &mut ValueStack, f: impl Fn(f32) -> i32) {
    let a = stack.pop().as_f32();
    stack.push(Value::I32(f(a)));
}
fn unary_f64_to_i32(stack: &mut ValueStack, f: impl Fn(f64) -> i32) {
    let a = stack.pop().as_f64();
    stack.push(Value::I32(f(a)));
}
fn unary_f32_to_i64(stack: &mut ValueStack, f: impl Fn(f32) -> i64) {
    let a = stack.pop().as_f32();
    stack.push(Value::I64(f(a)));
}
fn unary_f64_to_i64(stack: &mut ValueStack, f: impl Fn(f64) -> i64) {
    let a = stack.pop().as_f64();
    stack.push(Value::I64(f(a)));
}
fn unary_f32_bits_to_i32(stack: &mut ValueStack) {
    let bits = stack.pop().as_u32_bits();
    stack.push(Value::I32(bits as i32));
}
fn unary_f64_bits_to_i64(stack: &mut ValueStack) {
    let bits = stack.pop().as_u64_bits();
    stack.push(Value::I64(bits as i64));
}
fn unary_i32_to_f32_bits(stack: &mut ValueStack) {
    let a = stack.pop().as_i32();
    stack.push(Value::F32(a as u32));
}
fn unary_i64_to_f64_bits(stack: &mut ValueStack) {
    let a = stack.pop().as_i64();
    stack.push(Value::F64(a as u64));
}

fn try_unary_f32_to_i32(stack: &mut ValueStack, f: impl Fn(f32) -> Result<i32, crate::error::Trap>) -> Result<(), RuntimeError> {
    let a = stack.pop().as_f32();
    stack.push(Value::I32(f(a)?));
    Ok(())
}
fn try_unary_f64_to_i32(stack: &mut ValueStack, f: impl Fn(f64) -> Result<i32, crate::error::Trap>) -> Result<(), RuntimeError> {
    let a = stack.pop().as_f64();
    stack.push(Value::I32(f(a)?));
    Ok(())
}
fn try_unary_f32_to_i64(stack: &mut ValueStack, f: impl Fn(f32) -> Result<i64, crate::error::Trap>) -> Result<(), RuntimeError> {
    let a = stack.pop().as_f32();
    stack.push(Value::I64(f(a)?));
    Ok(())
}
fn try_unary_f64_to_i64(stack: &mut ValueStack, f: impl Fn(f64) -> Result<i64, crate::error::Trap>) -> Result<(), RuntimeError> {
    let a = stack.pop().as_f64();
    stack.push(Value::I64(f(a)?));
    Ok(())
}

fn binary_i32(stack: &mut ValueStack, f: impl Fn(i32, i32) -> i32) {
    let b = stack.pop().as_i32();
    let a = stack.pop().as_i32();
    stack.push(Value::I32(f(a, b)));
}
fn binary_i64(stack: &mut ValueStack, f: impl Fn(i64, i64) -> i64) {
    let b = stack.pop().as_i64();
    let a = stack.pop().as_i64();
    stack.push(Value::I64(f(a, b)));
}
fn binary_f32(stack: &mut ValueStack, f: impl Fn(f32, f32) -> f32) {
    let b = stack.pop().as_f32();
    let a = stack.pop().as_f32();
    stack.push(Value::from_f32(f(a, b)));
}
fn binary_f64(stack: &mut ValueStack, f: impl Fn(f64, f64) -> f64) {
    let b = stack.pop().as_f64();
    let a = stack.pop().as_f64();
    stack.push(Value::from_f64(f(a, b)));
}
fn binary_f32_bits(stack: &mut ValueStack, f: impl Fn(u32, u32) -> u32) {
    let b = stack.pop().as_u32_bits();
    let a = stack.pop().as_u32_bits();
    stack.push(Value::F32(f(a, b)));
}
fn binary_f64_bits(stack: &mut ValueStack, f: impl Fn(u64, u64) -> u64) {
    let b = stack.pop().as_u64_bits();
    let a = stack.pop().as_u64_bits();
    stack.push(Value::F64(f(a, b)));
}
fn try_binary_i32(stack: &mut ValueStack, f: impl Fn(i32, i32) -> Result<i32, crate::error::Trap>) -> Result<(), RuntimeError> {
    let b = stack.pop().as_i32();
    let a = stack.pop().as_i32();
    stack.push(Value::I32(f(a, b)?));
    Ok(())
}
fn try_binary_i64(stack: &mut ValueStack, f: impl Fn(i64, i64) -> Result<i64, crate::error::Trap>) -> Result<(), RuntimeError> {
    let b = stack.pop().as_i64();
    let a = stack.pop().as_i64();
    stack.push(Value::I64(f(a, b)?));
    Ok(())
}
fn binary_i32_cmp(stack: &mut ValueStack, f: impl Fn(i32, i32) -> bool) {
    let b = stack.pop().as_i32();
    let a = stack.pop().as_i32();
    stack.push(Value::I32(f(a, b) as i32));
}
fn binary_u32_cmp(stack: &mut ValueStack, f: impl Fn(u32, u32) -> bool) {
    let b = stack.pop().as_i32() as u32;
    let a = stack.pop().as_i32() as u32;
    stack.push(Value::I32(f(a, b) as i32));
}
fn binary_i64_cmp(stack: &mut ValueStack, f: impl Fn(i64, i64) -> bool) {
    let b = stack.pop().as_i64();
    let a = stack.pop().as_i64();
    stack.push(Value::I32(f(a, b) as i32));
}
fn binary_u64_cmp(stack: &mut ValueStack, f: impl Fn(u64, u64) -> bool) {
    let b = stack.pop().as_i64() as u64;
    let a = stack.pop().as_i64() as u64;
    stack.push(Value::I32(f(a, b) as i32));
}
fn binary_f32_cmp(stack: &mut ValueStack, f: impl Fn(f32, f32) -> bool) {
    let b = stack.pop().as_f32();
    let a = stack.pop().as_f32();
    stack.push(Value::I32(f(a, b) as i32));
}
fn binary_f64_cmp(stack: &mut ValueStack, f: impl Fn(f64, f64) -> bool) {
    let b = stack.pop().as_f64();
    let a = stack.pop().as_f64();
    stack.push(Value::I32(f(a, b) as i32));
}
