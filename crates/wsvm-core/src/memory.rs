// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! Linear memory: a contiguous byte buffer organised in 64 KiB pages, plus
//! passive data segments consumed by `memory.init`/`data.drop`.

use crate::error::Trap;

pub const WASM_PAGE_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone)]
pub struct DataSegment {
    bytes: Vec<u8>,
    dropped: bool,
}

impl DataSegment {
    pub fn new(bytes: Vec<u8>) -> Self {
        DataSegment { bytes, dropped: false }
    }
}

pub struct Memory {
    data: Vec<u8>,
    max_pages: Option<u32>,
    segments: Vec<DataSegment>,
}

impl Memory {
    pub fn new(initial_pages: u32, max_pages: Option<u32>) -> Self {
        Memory {
            data: vec![0u8; initial_pages as usize * WASM_PAGE_SIZE],
            max_pages,
            segments: Vec::new(),
        }
    }

    pub fn with_segments(initial_pages: u32, max_pages: Option<u32>, segments: Vec<DataSegment>) -> Self {
        let mut memory = Memory::new(initial_pages, max_pages);
        memory.segments = segments;
        memory
    }

    pub fn page_count(&self) -> u32 {
        (self.data.len() / WASM_PAGE_SIZE) as u32
    }

    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    /// Grows memory by `delta_pages`; returns the previous page count, or
    /// `-1` if growth would exceed the configured maximum.
    pub fn grow(&mut self, delta_pages: u32) -> i64 {
        let previous = self.page_count();
        let target = previous as u64 + delta_pages as u64;
        if let Some(max) = self.max_pages {
            if target > max as u64 {
                return -1;
            }
        }
        if target > u32::MAX as u64 {
            return -1;
        }
        self.data.resize(target as usize * WASM_PAGE_SIZE, 0);
        previous as i64
    }

    fn bounds_check(&self, addr: u64, len: usize) -> Result<usize, Trap> {
        let end = addr.checked_add(len as u64).ok_or(Trap::OutOfBoundsMemoryAccess)?;
        if end > self.data.len() as u64 {
            return Err(Trap::OutOfBoundsMemoryAccess);
        }
        Ok(addr as usize)
    }

    pub fn read_bytes(&self, addr: u64, len: usize) -> Result<&[u8], Trap> {
        let start = self.bounds_check(addr, len)?;
        Ok(&self.data[start..start + len])
    }

    pub fn write_bytes(&mut self, addr: u64, bytes: &[u8]) -> Result<(), Trap> {
        let start = self.bounds_check(addr, bytes.len())?;
        self.data[start..start + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    pub fn load_i32(&self, addr: u64) -> Result<i32, Trap> {
        Ok(i32::from_le_bytes(self.read_bytes(addr, 4)?.try_into().unwrap()))
    }

    pub fn load_i64(&self, addr: u64) -> Result<i64, Trap> {
        Ok(i64::from_le_bytes(self.read_bytes(addr, 8)?.try_into().unwrap()))
    }

    pub fn load_f32_bits(&self, addr: u64) -> Result<u32, Trap> {
        Ok(u32::from_le_bytes(self.read_bytes(addr, 4)?.try_into().unwrap()))
    }

    pub fn load_f64_bits(&self, addr: u64) -> Result<u64, Trap> {
        Ok(u64::from_le_bytes(self.read_bytes(addr, 8)?.try_into().unwrap()))
    }

    pub fn load_i8_s(&self, addr: u64) -> Result<i32, Trap> {
        Ok(self.read_bytes(addr, 1)?[0] as i8 as i32)
    }

    pub fn load_i8_u(&self, addr: u64) -> Result<i32, Trap> {
        Ok(self.read_bytes(addr, 1)?[0] as i32)
    }

    pub fn load_i16_s(&self, addr: u64) -> Result<i32, Trap> {
        Ok(i16::from_le_bytes(self.read_bytes(addr, 2)?.try_into().unwrap()) as i32)
    }

    pub fn load_i16_u(&self, addr: u64) -> Result<i32, Trap> {
        Ok(u16::from_le_bytes(self.read_bytes(addr, 2)?.try_into().unwrap()) as i32)
    }

    pub fn load_i32_s_as_i64(&self, addr: u64) -> Result<i64, Trap> {
        Ok(self.load_i32(addr)? as i64)
    }

    pub fn load_i32_u_as_i64(&self, addr: u64) -> Result<i64, Trap> {
        Ok(self.load_i32(addr)? as u32 as i64)
    }

    pub fn store_i8(&mut self, addr: u64, value: i32) -> Result<(), Trap> {
        self.write_bytes(addr, &[(value as u8)])
    }

    pub fn store_i16(&mut self, addr: u64, value: i32) -> Result<(), Trap> {
        self.write_bytes(addr, &(value as u16).to_le_bytes())
    }

    pub fn store_i32(&mut self, addr: u64, value: i32) -> Result<(), Trap> {
        self.write_bytes(addr, &value.to_le_bytes())
    }

    pub fn store_i64(&mut self, addr: u64, value: i64) -> Result<(), Trap> {
        self.write_bytes(addr, &value.to_le_bytes())
    }

    pub fn fill(&mut self, offset: u64, byte: u8, size: u64) -> Result<(), Trap> {
        let start = self.bounds_check(offset, size as usize)?;
        self.data[start..start + size as usize].fill(byte);
        Ok(())
    }

    pub fn copy_within(&mut self, dst: u64, src: u64, size: u64) -> Result<(), Trap> {
        self.bounds_check(dst, size as usize)?;
        self.bounds_check(src, size as usize)?;
        // `copy_within` on a slice handles overlap correctly regardless of
        // direction, matching the overlap-aware semantics table.copy needs
        // explicit ascending/descending logic for.
        self.data.copy_within(src as usize..src as usize + size as usize, dst as usize);
        Ok(())
    }

    pub fn init_passive_segment(&mut self, seg_id: u32, dst: u64, src_off: u64, size: u64) -> Result<(), Trap> {
        let segment = self.segments.get(seg_id as usize).ok_or(Trap::OutOfBoundsMemoryAccess)?;
        if segment.dropped {
            return Err(Trap::OutOfBoundsMemoryAccess);
        }
        let src_end = src_off.checked_add(size).ok_or(Trap::OutOfBoundsMemoryAccess)?;
        if src_end > segment.bytes.len() as u64 {
            return Err(Trap::OutOfBoundsMemoryAccess);
        }
        let slice = segment.bytes[src_off as usize..src_end as usize].to_vec();
        self.write_bytes(dst, &slice)
    }

    pub fn drop_segment(&mut self, seg_id: u32) {
        if let Some(segment) = self.segments.get_mut(seg_id as usize) {
            segment.dropped = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grow_reports_previous_page_count() {
        let mut memory = Memory::new(1, Some(2));
        assert_eq!(memory.grow(1), 1);
        assert_eq!(memory.page_count(), 2);
        assert_eq!(memory.grow(1), -1);
    }

    #[test]
    fn store_then_load_round_trips() {
        let mut memory = Memory::new(1, None);
        memory.store_i32(0, -7).unwrap();
        assert_eq!(memory.load_i32(0).unwrap(), -7);
        memory.store_i32(4, i32::MIN).unwrap();
        assert_eq!(memory.load_i32(4).unwrap(), i32::MIN);
    }

    #[test]
    fn out_of_range_load_traps() {
        let memory = Memory::new(1, None);
        let err = memory.load_i64(WASM_PAGE_SIZE as u64 - 4).unwrap_err();
        assert_eq!(err, Trap::OutOfBoundsMemoryAccess);
    }

    #[test]
    fn init_passive_segment_copies_bytes_and_rejects_oversize() {
        let mut memory = Memory::with_segments(1, None, vec![DataSegment::new(vec![1, 2, 3, 4])]);
        memory.init_passive_segment(0, 10, 0, 4).unwrap();
        assert_eq!(memory.read_bytes(10, 4).unwrap(), &[1, 2, 3, 4]);

        let err = memory.init_passive_segment(0, 0, 0, 5).unwrap_err();
        assert_eq!(err, Trap::OutOfBoundsMemoryAccess);
    }

    #[test]
    fn dropped_segment_cannot_be_initialized_from() {
        let mut memory = Memory::with_segments(1, None, vec![DataSegment::new(vec![9, 9])]);
        memory.drop_segment(0);
        let err = memory.init_passive_segment(0, 0, 0, 2).unwrap_err();
        assert_eq!(err, Trap::OutOfBoundsMemoryAccess);
    }
}
