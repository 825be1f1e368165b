// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Custom error types for asmon.
//!
//! Every failure is an explicit enum variant. No `Box<dyn Error>` and no
//! `anyhow::Result` in the library; the binary decides what is fatal.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for the telemetry monitor.
#[derive(Debug, Error)]
pub enum AsmError {
    // =========================================================================
    // Configuration Errors - Fail-Fast on Invalid Config
    // =========================================================================
    #[error("Hard validation error: {0}")]
    HardValidation(#[from] HardValidationError),

    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    #[error("Configuration parse error: {message}")]
    ConfigParse { message: String },

    // =========================================================================
    // Telemetry Store Errors
    // =========================================================================
    #[error("Telemetry store error: {0}")]
    Store(#[from] StoreError),

    // =========================================================================
    // Wire Protocol Errors
    // =========================================================================
    #[error("Wire protocol error: {0}")]
    Wire(#[from] WireError),

    // =========================================================================
    // Server Lifecycle Errors
    // =========================================================================
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(#[from] StateTransitionError),

    // =========================================================================
    // Network / System Errors
    // =========================================================================
    #[error("Could not connect to {target}: {reason}")]
    Connect { target: String, reason: String },

    #[error("IO error: {context} - {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Hard validation errors abort startup.
#[derive(Debug, Error)]
pub enum HardValidationError {
    #[error("Invalid field value: {field} = {value} - {reason}")]
    InvalidFieldValue {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("Invalid port: {port} - {reason}")]
    InvalidPort { port: u16, reason: String },
}

/// Telemetry store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The shared memory object could not be created, sized or mapped.
    /// Fatal to the caller's telemetry role.
    #[error("Telemetry store unavailable: {name} - {reason}")]
    StoreUnavailable { name: String, reason: String },

    #[error("No free slot: all {capacity} slots are occupied and fresh")]
    NoFreeSlot { capacity: usize },

    #[error("Slot index {index} out of range (capacity {capacity})")]
    SlotOutOfRange { index: usize, capacity: usize },

    #[error("Invalid store capacity {capacity} (must be 1..={max})")]
    InvalidCapacity { capacity: usize, max: usize },
}

/// Wire codec errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    /// The buffer ended before every slot was decoded.
    #[error("Incomplete snapshot at offset {offset}: need {needed} bytes, have {available}")]
    Incomplete {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("Snapshot carries {extra} unexpected trailing bytes")]
    TrailingBytes { extra: usize },
}

/// Server lifecycle transition errors.
#[derive(Debug, Error)]
pub enum StateTransitionError {
    #[error("Cannot transition server from {from} to {to}")]
    InvalidTransition {
        from: &'static str,
        to: &'static str,
    },

    #[error("Server is in terminal state: {state}")]
    TerminalState { state: &'static str },
}

/// Result type alias using AsmError.
pub type AsmResult<T> = Result<T, AsmError>;
