// Copyright 2025 Cisco Systems, Inc. and its affiliates
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

//! Error types for the decompiler core.

use thiserror::Error;

/// Everything that can go wrong while decoding, interpreting, or rendering
/// a pickle stream.
#[derive(Debug, Error)]
pub enum DecompileError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("decode error at offset {offset:#x}: {mnemonic}")]
    Decode { offset: u64, mnemonic: String },

    #[error("handler error at offset {offset:#x} ({mnemonic}): {reason}")]
    Handler {
        offset: u64,
        mnemonic: String,
        reason: String,
    },

    #[error("allocation error")]
    Allocation,

    #[error("render error: {reason}")]
    Render { reason: String },
}

pub type Result<T> = std::result::Result<T, DecompileError>;
