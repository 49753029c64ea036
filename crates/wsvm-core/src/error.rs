// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! The canonical trap taxonomy (ss7) plus the fatal-error channel used for
//! invariant violations that are bugs in the embedder, not in the running
//! program.

use thiserror::Error;

/// A VM-visible error that terminates execution of the current call. Traps
/// are part of the contract a well-behaved program can hit (divide by zero,
/// an out-of-range truncation, a bad indirect call) and are always
/// recoverable by the host.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Trap {
    #[error("unreachable")]
    Unreachable,
    #[error("integer divide by zero")]
    IntegerDivideByZero,
    #[error("integer overflow")]
    IntegerOverflow,
    #[error("invalid conversion to integer")]
    InvalidConversionToInteger,
    #[error("out of bounds memory access")]
    OutOfBoundsMemoryAccess,
    #[error("out of bounds table access")]
    OutOfBoundsTableAccess,
    #[error("uninitialized element {0}")]
    UninitializedElement(u32),
    #[error("indirect call type mismatch")]
    IndirectCallTypeMismatch,
    #[error("undefined element")]
    UndefinedElement,
    #[error("missing host import {0}")]
    MissingHostImport(u32),
}

/// Top-level error returned by [`crate::Interpreter::call`]: either a trap
/// raised by the running program, or a fatal error meaning the embedder
/// handed the interpreter something it promised would never happen (a
/// mistyped argument, a write to an immutable global).
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Trap(#[from] Trap),
    #[error("fatal interpreter error: {0}")]
    Fatal(String),
}

impl RuntimeError {
    pub fn fatal(message: impl Into<String>) -> Self {
        RuntimeError::Fatal(message.into())
    }

    pub fn trap_kind(&self) -> Option<&Trap> {
        match self {
            RuntimeError::Trap(trap) => Some(trap),
            RuntimeError::Fatal(_) => None,
        }
    }
}
