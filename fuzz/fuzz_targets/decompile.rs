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

#![no_main]

use libfuzzer_sys::fuzz_target;

use pickledec::config::Config;
use pickledec::disasm::{SliceDisassembler, SliceHost};
use pickledec::render::{render_json, render_pseudocode};
use pickledec::{Interpreter, MachineState};

// feeds arbitrary bytes through the full interpret-then-render pipeline.
// a crash or panic here is always a bug: malformed pickle streams must
// surface a `DecompileError`, never abort the process.
fuzz_target!(|data: &[u8]| {
    let disasm = SliceDisassembler::new(data);
    let host = SliceHost::new(data);
    let interp = Interpreter::new(&disasm, &host, data.len() as u64);
    let mut state = match MachineState::new(&Config::default()) {
        Ok(s) => s,
        Err(_) => return,
    };

    match interp.run(&mut state) {
        Ok(complete) => {
            let _ = render_pseudocode(&state.stack, false, !complete);
            let _ = render_json(&state, !complete);
        }
        Err(_) => {}
    }
});
