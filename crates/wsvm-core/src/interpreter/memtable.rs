// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! Linear-memory and table instructions: loads/stores, `memory.size`/`grow`,
//! bulk `copy`/`fill`/`init`/`drop`, and their table counterparts.

use wsvm_types::Value;

use crate::error::Trap;
use crate::instance::InstanceView;
use crate::memory::Memory;
use crate::stack::ValueStack;
use crate::table::Table;

pub fn memory_size(stack: &mut ValueStack, instance: &dyn InstanceView) {
    let pages = instance.memory().borrow().page_count();
    stack.push(Value::I32(pages as i32));
}

pub fn memory_grow(stack: &mut ValueStack, instance: &dyn InstanceView) {
    let delta = stack.pop().as_i32() as u32;
    let previous = instance.memory().borrow_mut().grow(delta);
    stack.push(Value::I32(previous as i32));
}

pub fn memory_fill(stack: &mut ValueStack, instance: &dyn InstanceView) -> Result<(), Trap> {
    let size = stack.pop().as_i32() as u32 as u64;
    let byte = stack.pop().as_i32() as u8;
    let offset = stack.pop().as_i32() as u32 as u64;
    instance.memory().borrow_mut().fill(offset, byte, size)
}

pub fn memory_copy(stack: &mut ValueStack, instance: &dyn InstanceView) -> Result<(), Trap> {
    let size = stack.pop().as_i32() as u32 as u64;
    let src = stack.pop().as_i32() as u32 as u64;
    let dst = stack.pop().as_i32() as u32 as u64;
    instance.memory().borrow_mut().copy_within(dst, src, size)
}

pub fn memory_init(stack: &mut ValueStack, instance: &dyn InstanceView, seg_id: u32) -> Result<(), Trap> {
    let size = stack.pop().as_i32() as u32 as u64;
    let src = stack.pop().as_i32() as u32 as u64;
    let dst = stack.pop().as_i32() as u32 as u64;
    instance.memory().borrow_mut().init_passive_segment(seg_id, dst, src, size)
}

pub fn data_drop(instance: &dyn InstanceView, seg_id: u32) {
    instance.memory().borrow_mut().drop_segment(seg_id);
}

/// Macro-free load/store dispatch mirrors the teacher's preference for an
/// explicit match over opcode-indexed closures for memory ops -- there are
/// few enough of them that a dispatch table would not earn its keep.
pub fn load_i32(stack: &mut ValueStack, instance: &dyn InstanceView, offset: u32) -> Result<(), Trap> {
    let addr = stack.pop().as_i32() as u32 as u64 + offset as u64;
    let v = instance.memory().borrow().load_i32(addr)?;
    stack.push(Value::I32(v));
    Ok(())
}

pub fn load_i64(stack: &mut ValueStack, instance: &dyn InstanceView, offset: u32) -> Result<(), Trap> {
    let addr = stack.pop().as_i32() as u32 as u64 + offset as u64;
    let v = instance.memory().borrow().load_i64(addr)?;
    stack.push(Value::I64(v));
    Ok(())
}

pub fn load_f32(stack: &mut ValueStack, instance: &dyn InstanceView, offset: u32) -> Result<(), Trap> {
    let addr = stack.pop().as_i32() as u32 as u64 + offset as u64;
    let bits = instance.memory().borrow().load_f32_bits(addr)?;
    stack.push(Value::F32(bits));
    Ok(())
}

pub fn load_f64(stack: &mut ValueStack, instance: &dyn InstanceView, offset: u32) -> Result<(), Trap> {
    let addr = stack.pop().as_i32() as u32 as u64 + offset as u64;
    let bits = instance.memory().borrow().load_f64_bits(addr)?;
    stack.push(Value::F64(bits));
    Ok(())
}

pub fn load_i32_8s(stack: &mut ValueStack, instance: &dyn InstanceView, offset: u32) -> Result<(), Trap> {
    load_i32_with(stack, instance, offset, Memory::load_i8_s)
}
pub fn load_i32_8u(stack: &mut ValueStack, instance: &dyn InstanceView, offset: u32) -> Result<(), Trap> {
    load_i32_with(stack, instance, offset, Memory::load_i8_u)
}
pub fn load_i32_16s(stack: &mut ValueStack, instance: &dyn InstanceView, offset: u32) -> Result<(), Trap> {
    load_i32_with(stack, instance, offset, Memory::load_i16_s)
}
pub fn load_i32_16u(stack: &mut ValueStack, instance: &dyn InstanceView, offset: u32) -> Result<(), Trap> {
    load_i32_with(stack, instance, offset, Memory::load_i16_u)
}

fn load_i32_with(stack: &mut ValueStack, instance: &dyn InstanceView, offset: u32, f: fn(&Memory, u64) -> Result<i32, Trap>) -> Result<(), Trap> {
    let addr = stack.pop().as_i32() as u32 as u64 + offset as u64;
    let v = f(&instance.memory().borrow(), addr)?;
    stack.push(Value::I32(v));
    Ok(())
}

pub fn load_i64_8s(stack: &mut ValueStack, instance: &dyn InstanceView, offset: u32) -> Result<(), Trap> {
    load_i64_with(stack, instance, offset, |m, a| m.load_i8_s(a).map(|v| v as i64))
}
pub fn load_i64_8u(stack: &mut ValueStack, instance: &dyn InstanceView, offset: u32) -> Result<(), Trap> {
    load_i64_with(stack, instance, offset, |m, a| m.load_i8_u(a).map(|v| v as i64))
}
pub fn load_i64_16s(stack: &mut ValueStack, instance: &dyn InstanceView, offset: u32) -> Result<(), Trap> {
    load_i64_with(stack, instance, offset, |m, a| m.load_i16_s(a).map(|v| v as i64))
}
pub fn load_i64_16u(stack: &mut ValueStack, instance: &dyn InstanceView, offset: u32) -> Result<(), Trap> {
    load_i64_with(stack, instance, offset, |m, a| m.load_i16_u(a).map(|v| v as i64))
}
pub fn load_i64_32s(stack: &mut ValueStack, instance: &dyn InstanceView, offset: u32) -> Result<(), Trap> {
    load_i64_with(stack, instance, offset, Memory::load_i32_s_as_i64)
}
pub fn load_i64_32u(stack: &mut ValueStack, instance: &dyn InstanceView, offset: u32) -> Result<(), Trap> {
    load_i64_with(stack, instance, offset, Memory::load_i32_u_as_i64)
}

fn load_i64_with(stack: &mut ValueStack, instance: &dyn InstanceView, offset: u32, f: impl Fn(&Memory, u64) -> Result<i64, Trap>) -> Result<(), Trap> {
    let addr = stack.pop().as_i32() as u32 as u64 + offset as u64;
    let v = f(&instance.memory().borrow(), addr)?;
    stack.push(Value::I64(v));
    Ok(())
}

pub fn store_i32(stack: &mut ValueStack, instance: &dyn InstanceView, offset: u32) -> Result<(), Trap> {
    let v = stack.pop().as_i32();
    let addr = stack.pop().as_i32() as u32 as u64 + offset as u64;
    instance.memory().borrow_mut().store_i32(addr, v)
}

pub fn store_i64(stack: &mut ValueStack, instance: &dyn InstanceView, offset: u32) -> Result<(), Trap> {
    let v = stack.pop().as_i64();
    let addr = stack.pop().as_i32() as u32 as u64 + offset as u64;
    instance.memory().borrow_mut().store_i64(addr, v)
}

pub fn store_f32(stack: &mut ValueStack, instance: &dyn InstanceView, offset: u32) -> Result<(), Trap> {
    let bits = stack.pop().as_u32_bits();
    let addr = stack.pop().as_i32() as u32 as u64 + offset as u64;
    instance.memory().borrow_mut().write_bytes(addr, &bits.to_le_bytes())
}

pub fn store_f64(stack: &mut ValueStack, instance: &dyn InstanceView, offset: u32) -> Result<(), Trap> {
    let bits = stack.pop().as_u64_bits();
    let addr = stack.pop().as_i32() as u32 as u64 + offset as u64;
    instance.memory().borrow_mut().write_bytes(addr, &bits.to_le_bytes())
}

pub fn store_i32_8(stack: &mut ValueStack, instance: &dyn InstanceView, offset: u32) -> Result<(), Trap> {
    let v = stack.pop().as_i32();
    let addr = stack.pop().as_i32() as u32 as u64 + offset as u64;
    instance.memory().borrow_mut().store_i8(addr, v)
}

pub fn store_i32_16(stack: &mut ValueStack, instance: &dyn InstanceView, offset: u32) -> Result<(), Trap> {
    let v = stack.pop().as_i32();
    let addr = stack.pop().as_i32() as u32 as u64 + offset as u64;
    instance.memory().borrow_mut().store_i16(addr, v)
}

pub fn store_i64_8(stack: &mut ValueStack, instance: &dyn InstanceView, offset: u32) -> Result<(), Trap> {
    let v = stack.pop().as_i64();
    let addr = stack.pop().as_i32() as u32 as u64 + offset as u64;
    instance.memory().borrow_mut().store_i8(addr, v as i32)
}

pub fn store_i64_16(stack: &mut ValueStack, instance: &dyn InstanceView, offset: u32) -> Result<(), Trap> {
    let v = stack.pop().as_i64();
    let addr = stack.pop().as_i32() as u32 as u64 + offset as u64;
    instance.memory().borrow_mut().store_i16(addr, v as i32)
}

pub fn store_i64_32(stack: &mut ValueStack, instance: &dyn InstanceView, offset: u32) -> Result<(), Trap> {
    let v = stack.pop().as_i64();
    let addr = stack.pop().as_i32() as u32 as u64 + offset as u64;
    instance.memory().borrow_mut().store_i32(addr, v as i32)
}

// ---- table ------------------------------------------------------------

pub fn table_get(stack: &mut ValueStack, instance: &dyn InstanceView, table_idx: u32) -> Result<(), Trap> {
    let index = stack.pop().as_i32() as u32;
    let v = instance.table(table_idx).borrow().get(index)?;
    stack.push(v);
    Ok(())
}

pub fn table_set(stack: &mut ValueStack, instance: &dyn InstanceView, table_idx: u32) -> Result<(), Trap> {
    let v = stack.pop();
    let index = stack.pop().as_i32() as u32;
    instance.table(table_idx).borrow_mut().set(index, v)
}

pub fn table_size(stack: &mut ValueStack, instance: &dyn InstanceView, table_idx: u32) {
    let size = instance.table(table_idx).borrow().size();
    stack.push(Value::I32(size as i32));
}

pub fn table_grow(stack: &mut ValueStack, instance: &dyn InstanceView, table_idx: u32) {
    let delta = stack.pop().as_i32() as u32;
    let fill = stack.pop();
    let previous = instance.table(table_idx).borrow_mut().grow(delta, fill);
    stack.push(Value::I32(previous as i32));
}

pub fn table_fill(stack: &mut ValueStack, instance: &dyn InstanceView, table_idx: u32) -> Result<(), Trap> {
    let size = stack.pop().as_i32() as u32;
    let value = stack.pop();
    let offset = stack.pop().as_i32() as u32;
    instance.table(table_idx).borrow_mut().fill(offset, value, size)
}

pub fn table_copy(stack: &mut ValueStack, instance: &dyn InstanceView, dst_table_idx: u32, src_table_idx: u32) -> Result<(), Trap> {
    let size = stack.pop().as_i32() as u32;
    let src = stack.pop().as_i32() as u32;
    let dst = stack.pop().as_i32() as u32;
    if dst_table_idx == src_table_idx {
        instance.table(dst_table_idx).borrow_mut().copy_within(dst, src, size)
    } else {
        let src_table = instance.table(src_table_idx).borrow();
        let mut dst_table = instance.table(dst_table_idx).borrow_mut();
        Table::copy_between(&mut dst_table, &src_table, dst, src, size)
    }
}

pub fn table_init(stack: &mut ValueStack, instance: &dyn InstanceView, table_idx: u32, elem_idx: u32) -> Result<(), Trap> {
    let size = stack.pop().as_i32() as u32;
    let src = stack.pop().as_i32() as u32;
    let dst = stack.pop().as_i32() as u32;
    let element = instance.element(elem_idx).borrow();
    element.check_funcrefs_in_range(src, size, instance.function_count())?;
    instance.table(table_idx).borrow_mut().init_from(dst, &*element, src, size)
}

pub fn elem_drop(instance: &dyn InstanceView, elem_idx: u32) {
    instance.set_element_dropped(elem_idx);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RuntimeError;
    use crate::instance::Callee;
    use std::cell::RefCell;
    use wsvm_types::{FunctionType, Value};

    struct TestInstance {
        memory: RefCell<Memory>,
        tables: Vec<RefCell<Table>>,
        elements: Vec<RefCell<crate::table::ElementSegment>>,
        function_count: u32,
    }

    impl InstanceView for TestInstance {
        fn function_type_id(&self, _func_id: u32) -> u32 {
            unimplemented!()
        }
        fn get_type(&self, _type_id: u32) -> &FunctionType {
            unimplemented!()
        }
        fn resolve_callee(&self, _func_id: u32) -> Result<Callee<'_>, RuntimeError> {
            unimplemented!()
        }
        fn function_count(&self) -> u32 {
            self.function_count
        }
        fn table(&self, index: u32) -> &RefCell<Table> {
            &self.tables[index as usize]
        }
        fn memory(&self) -> &RefCell<Memory> {
            &self.memory
        }
        fn read_global(&self, _index: u32) -> Value {
            unimplemented!()
        }
        fn write_global(&self, _index: u32, _value: Value) -> Result<(), RuntimeError> {
            unimplemented!()
        }
        fn element(&self, index: u32) -> &RefCell<crate::table::ElementSegment> {
            &self.elements[index as usize]
        }
        fn element_count(&self) -> u32 {
            self.elements.len() as u32
        }
        fn set_element_dropped(&self, index: u32) {
            self.elements[index as usize].borrow_mut().drop();
        }
    }

    fn one_table_instance() -> TestInstance {
        TestInstance {
            memory: RefCell::new(Memory::new(1, None)),
            tables: vec![RefCell::new(Table::new(4, None, Value::FuncRef(wsvm_types::value::NULL_REF)))],
            elements: vec![],
            function_count: 0,
        }
    }

    #[test]
    fn store_then_load_round_trip() {
        let instance = one_table_instance();
        let mut stack = ValueStack::new();
        stack.push(Value::I32(0)); // address
        stack.push(Value::I32(-7)); // value
        store_i32(&mut stack, &instance, 0).unwrap();
        stack.push(Value::I32(0));
        load_i32(&mut stack, &instance, 0).unwrap();
        assert_eq!(stack.pop(), Value::I32(-7));
    }

    #[test]
    fn narrow_store_then_sign_extending_load() {
        let instance = one_table_instance();
        let mut stack = ValueStack::new();
        stack.push(Value::I32(0));
        stack.push(Value::I32(-1));
        store_i32_8(&mut stack, &instance, 0).unwrap();
        stack.push(Value::I32(0));
        load_i32_8s(&mut stack, &instance, 0).unwrap();
        assert_eq!(stack.pop(), Value::I32(-1));
    }

    #[test]
    fn memory_init_then_data_drop_rejects_further_init() {
        let memory = Memory::with_segments(1, None, vec![crate::memory::DataSegment::new(vec![1, 2, 3, 4])]);
        let instance = TestInstance { memory: RefCell::new(memory), tables: vec![], elements: vec![], function_count: 0 };
        let mut stack = ValueStack::new();
        stack.push(Value::I32(0)); // dst
        stack.push(Value::I32(0)); // src
        stack.push(Value::I32(4)); // size
        memory_init(&mut stack, &instance, 0).unwrap();
        assert_eq!(instance.memory.borrow().read_bytes(0, 4).unwrap(), &[1, 2, 3, 4]);

        data_drop(&instance, 0);
        stack.push(Value::I32(0));
        stack.push(Value::I32(0));
        stack.push(Value::I32(4));
        let err = memory_init(&mut stack, &instance, 0).unwrap_err();
        assert_eq!(err, Trap::OutOfBoundsMemoryAccess);
    }

    #[test]
    fn table_copy_between_distinct_tables() {
        let default = Value::FuncRef(wsvm_types::value::NULL_REF);
        let src = Table::new(2, None, default);
        let dst = Table::new(2, None, default);
        let instance = TestInstance { memory: RefCell::new(Memory::new(1, None)), tables: vec![RefCell::new(dst), RefCell::new(src)], elements: vec![], function_count: 0 };
        instance.tables[1].borrow_mut().set(0, Value::FuncRef(9)).unwrap();

        let mut stack = ValueStack::new();
        stack.push(Value::I32(1)); // dst offset
        stack.push(Value::I32(0)); // src offset
        stack.push(Value::I32(1)); // size
        table_copy(&mut stack, &instance, 0, 1).unwrap();
        assert_eq!(instance.tables[0].borrow().get(1).unwrap(), Value::FuncRef(9));
    }

    #[test]
    fn elem_drop_marks_element_segment_dropped() {
        let instance = TestInstance {
            memory: RefCell::new(Memory::new(1, None)),
            tables: vec![],
            elements: vec![RefCell::new(crate::table::ElementSegment::new(vec![Value::FuncRef(1)]))],
            function_count: 0,
        };
        elem_drop(&instance, 0);
        assert!(instance.elements[0].borrow().is_dropped());
    }

    #[test]
    fn table_init_traps_on_funcref_index_beyond_function_count() {
        let instance = TestInstance {
            memory: RefCell::new(Memory::new(1, None)),
            tables: vec![RefCell::new(Table::new(4, None, Value::FuncRef(wsvm_types::value::NULL_REF)))],
            elements: vec![RefCell::new(crate::table::ElementSegment::new(vec![Value::FuncRef(7)]))],
            function_count: 2,
        };
        let mut stack = ValueStack::new();
        stack.push(Value::I32(0)); // dst
        stack.push(Value::I32(0)); // src
        stack.push(Value::I32(1)); // size
        let err = table_init(&mut stack, &instance, 0, 0).unwrap_err();
        assert_eq!(err, Trap::OutOfBoundsTableAccess);
    }
}
