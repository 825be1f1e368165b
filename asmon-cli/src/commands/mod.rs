// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! CLI command modules.

pub mod poll;
pub mod serve;
pub mod simulate;
pub mod validate;
