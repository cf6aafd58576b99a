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

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use pickledec::config::Config;
use pickledec::disasm::{SliceDisassembler, SliceHost};
use pickledec::render::render_pseudocode;
use pickledec::{Interpreter, MachineState};

/// a moderately large pickle: a list of a thousand small dicts, each
/// memoized, to exercise the interpreter's memo path and the renderer's
/// hoisting path together.
fn build_sample() -> Vec<u8> {
    let mut bytes = vec![0x80, 0x04]; // PROTO 4
    bytes.push(0x5d); // EMPTY_LIST
    bytes.push(0x94); // MEMOIZE
    bytes.push(0x28); // MARK
    for i in 0..1000u32 {
        bytes.push(0x7d); // EMPTY_DICT
        bytes.push(b'K');
        bytes.push((i % 256) as u8); // BININT1 key
        bytes.push(0x8c); // SHORT_BINUNICODE
        bytes.push(3);
        bytes.extend_from_slice(b"val");
        bytes.push(b's'); // SETITEM
    }
    bytes.push(b'e'); // APPENDS
    bytes.push(b'.'); // STOP
    bytes
}

fn decompile_benchmark(c: &mut Criterion) {
    let bytes = build_sample();
    c.bench_function("decompile_list_of_1000_dicts", |b| {
        b.iter(|| {
            let disasm = SliceDisassembler::new(black_box(&bytes));
            let host = SliceHost::new(&bytes);
            let interp = Interpreter::new(&disasm, &host, bytes.len() as u64);
            let mut state = MachineState::new(&Config::default()).unwrap();
            let complete = interp.run(&mut state).unwrap();
            black_box(render_pseudocode(&state.stack, false, !complete));
        });
    });
}

criterion_group!(benches, decompile_benchmark);
criterion_main!(benches);
