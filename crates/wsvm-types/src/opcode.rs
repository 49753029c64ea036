// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

// The opcode ordinal is a dense index `wsvm_core::interpreter::Engine::step`
// matches on, so this enum must stay dense and `MAX_OPCODE_NUMBER` must stay
// in sync with the last variant.

#[repr(u16)]
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
#[allow(non_camel_case_types)]
pub enum Opcode {
    // control flow
    unreachable = 0x00,
    nop,
    block,
    loop_,
    if_,
    else_,
    end,
    br,
    br_if,
    br_table,
    return_,
    call,
    call_indirect,

    // parametric
    drop,
    select,

    // variables
    local_get = 0x20,
    local_set,
    local_tee,
    global_get,
    global_set,

    // table
    table_get = 0x30,
    table_set,
    table_size,
    table_grow,
    table_fill,
    table_init,
    table_copy,
    elem_drop,
    ref_null,
    ref_is_null,
    ref_func,

    // memory
    i32_load = 0x40,
    i64_load,
    f32_load,
    f64_load,
    i32_load8_s,
    i32_load8_u,
    i32_load16_s,
    i32_load16_u,
    i64_load8_s,
    i64_load8_u,
    i64_load16_s,
    i64_load16_u,
    i64_load32_s,
    i64_load32_u,
    i32_store,
    i64_store,
    f32_store,
    f64_store,
    i32_store8,
    i32_store16,
    i64_store8,
    i64_store16,
    i64_store32,
    memory_size,
    memory_grow,
    memory_init,
    data_drop,
    memory_copy,
    memory_fill,

    // numeric constants
    i32_const = 0x60,
    i64_const,
    f32_const,
    f64_const,

    // i32 comparisons
    i32_eqz = 0x70,
    i32_eq,
    i32_ne,
    i32_lt_s,
    i32_lt_u,
    i32_gt_s,
    i32_gt_u,
    i32_le_s,
    i32_le_u,
    i32_ge_s,
    i32_ge_u,

    // i64 comparisons
    i64_eqz = 0x80,
    i64_eq,
    i64_ne,
    i64_lt_s,
    i64_lt_u,
    i64_gt_s,
    i64_gt_u,
    i64_le_s,
    i64_le_u,
    i64_ge_s,
    i64_ge_u,

    // f32 / f64 comparisons
    f32_eq = 0x90,
    f32_ne,
    f32_lt,
    f32_gt,
    f32_le,
    f32_ge,
    f64_eq,
    f64_ne,
    f64_lt,
    f64_gt,
    f64_le,
    f64_ge,

    // i32 arithmetic / bitwise
    i32_clz = 0xa0,
    i32_ctz,
    i32_popcnt,
    i32_add,
    i32_sub,
    i32_mul,
    i32_div_s,
    i32_div_u,
    i32_rem_s,
    i32_rem_u,
    i32_and,
    i32_or,
    i32_xor,
    i32_shl,
    i32_shr_s,
    i32_shr_u,
    i32_rotl,
    i32_rotr,

    // i64 arithmetic / bitwise
    i64_clz = 0xb0,
    i64_ctz,
    i64_popcnt,
    i64_add,
    i64_sub,
    i64_mul,
    i64_div_s,
    i64_div_u,
    i64_rem_s,
    i64_rem_u,
    i64_and,
    i64_or,
    i64_xor,
    i64_shl,
    i64_shr_s,
    i64_shr_u,
    i64_rotl,
    i64_rotr,

    // f32 / f64 arithmetic
    f32_abs = 0xc0,
    f32_neg,
    f32_ceil,
    f32_floor,
    f32_trunc,
    f32_nearest,
    f32_sqrt,
    f32_add,
    f32_sub,
    f32_mul,
    f32_div,
    f32_min,
    f32_max,
    f32_copysign,
    f64_abs,
    f64_neg,
    f64_ceil,
    f64_floor,
    f64_trunc,
    f64_nearest,
    f64_sqrt,
    f64_add,
    f64_sub,
    f64_mul,
    f64_div,
    f64_min,
    f64_max,
    f64_copysign,

    // conversions
    i32_wrap_i64 = 0xe0,
    i32_trunc_f32_s,
    i32_trunc_f32_u,
    i32_trunc_f64_s,
    i32_trunc_f64_u,
    i64_extend_i32_s,
    i64_extend_i32_u,
    i64_trunc_f32_s,
    i64_trunc_f32_u,
    i64_trunc_f64_s,
    i64_trunc_f64_u,
    f32_convert_i32_s,
    f32_convert_i32_u,
    f32_convert_i64_s,
    f32_convert_i64_u,
    f32_demote_f64,
    f64_convert_i32_s,
    f64_convert_i32_u,
    f64_convert_i64_s,
    f64_convert_i64_u,
    f64_promote_f32,
    i32_reinterpret_f32,
    i64_reinterpret_f64,
    f32_reinterpret_i32,
    f64_reinterpret_i64,

    // sign extension
    i32_extend8_s = 0xf8,
    i32_extend16_s,
    i64_extend8_s,
    i64_extend16_s,
    i64_extend32_s,

    // saturating truncation
    i32_trunc_sat_f32_s = 0x100,
    i32_trunc_sat_f32_u,
    i32_trunc_sat_f64_s,
    i32_trunc_sat_f64_u,
    i64_trunc_sat_f32_s,
    i64_trunc_sat_f32_u,
    i64_trunc_sat_f64_s,
    i64_trunc_sat_f64_u,
}

/// One past the highest opcode ordinal, i.e. the required length of the
/// dispatch table.
pub const MAX_OPCODE_NUMBER: usize = 0x108;
