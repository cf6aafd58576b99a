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

//! `pickledec` reconstructs the object graph a Python pickle byte stream
//! would produce, without executing it, and renders it as Python-like
//! pseudocode or structured JSON.
//!
//! The core (object model, machine state, interpreter, renderers) is
//! decoupled from any concrete byte decoder via the [`disasm`] module's
//! [`disasm::Disassembler`]/[`disasm::HostIo`] traits; [`disasm::SliceDisassembler`]
//! and [`disasm::SliceHost`] are the reference implementation used by the
//! `pdp` binary and by this crate's own tests.

pub mod cli;
pub mod config;
pub mod disasm;
pub mod error;
pub mod interp;
pub mod opcode;
pub mod render;
pub mod state;
pub mod value;

pub use config::Config;
pub use error::{DecompileError, Result};
pub use interp::Interpreter;
pub use state::MachineState;
