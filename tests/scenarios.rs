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

//! The six concrete byte-sequence scenarios, end to end through the
//! interpreter and both renderers.

use pickledec::config::Config;
use pickledec::disasm::{SliceDisassembler, SliceHost};
use pickledec::render::{render_json, render_pseudocode};
use pickledec::{DecompileError, Interpreter, MachineState};

fn decompile(bytes: &[u8]) -> (MachineState, bool) {
    let disasm = SliceDisassembler::new(bytes);
    let host = SliceHost::new(bytes);
    let interp = Interpreter::new(&disasm, &host, bytes.len() as u64);
    let mut state = MachineState::new(&Config::default()).unwrap();
    let complete = interp.run(&mut state).expect("scenario should not error");
    (state, complete)
}

#[test]
fn scenario_1_empty_list() {
    let (state, complete) = decompile(&[0x5d, b'.']);
    assert!(complete);
    assert_eq!(render_pseudocode(&state.stack, false, false), "return []\n");
}

#[test]
fn scenario_2_nested_self_reference() {
    let (state, complete) = decompile(&[0x5d, 0x94, b'h', 0x00, b'a', b'.']);
    assert!(complete);
    assert_eq!(
        render_pseudocode(&state.stack, false, false),
        "var_0 = []\nvar_0.append(var_0)\nreturn var_0\n"
    );
}

#[test]
fn scenario_3_tuple_of_ints() {
    let (state, complete) = decompile(&[0x4b, 0x01, 0x4b, 0x02, 0x4b, 0x03, 0x87, b'.']);
    assert!(complete);
    assert_eq!(
        render_pseudocode(&state.stack, false, false),
        "return (1, 2, 3)\n"
    );
}

#[test]
fn scenario_4_reduce() {
    let mut bytes = vec![b'c'];
    bytes.extend_from_slice(b"__builtin__\n");
    bytes.extend_from_slice(b"eval\n");
    bytes.push(b'(');
    bytes.push(b'V');
    bytes.extend_from_slice(b"1+1\n");
    bytes.push(b't');
    bytes.push(b'R');
    bytes.push(b'.');

    let (state, complete) = decompile(&bytes);
    assert!(complete);
    assert_eq!(
        render_pseudocode(&state.stack, false, false),
        "var_0 = __import__(\"__builtin__\").eval\nvar_0 = var_0(*('1+1',))\nreturn var_0\n"
    );
}

#[test]
fn scenario_5_memoized_dict_with_shared_list_value() {
    // build a list, memoize it, leave it as one top-level stack element,
    // and also store it as a dict value via SETITEM — it must be emitted
    // once and referenced by name everywhere else.
    let bytes = [
        0x5d, // EMPTY_LIST
        0x94, // MEMOIZE (slot 0, the list)
        0x7d, // EMPTY_DICT
        b'K', 0x01, // BININT1 1 (key)
        b'h', 0x00, // BINGET 0 (value: the list again)
        b's', // SETITEM: dict[1] = list
        b'.',
    ];

    let (state, complete) = decompile(&bytes);
    assert!(complete);
    assert_eq!(state.stack.len(), 2);
    let out = render_pseudocode(&state.stack, false, false);
    // the shared list must appear exactly once as a literal/declaration
    // and be referenced by name everywhere else.
    assert_eq!(out.matches("var_0 = []").count(), 1);
    assert_eq!(out, "var_0 = []\nreturn {1: var_0}\n");
}

#[test]
fn scenario_6_dict_with_odd_close_is_handler_error() {
    let bytes = [0x28, 0x4b, 0x01, b'd', b'.'];
    let disasm = SliceDisassembler::new(&bytes);
    let host = SliceHost::new(&bytes);
    let interp = Interpreter::new(&disasm, &host, bytes.len() as u64);
    let mut state = MachineState::new(&Config::default()).unwrap();
    let err = interp.run(&mut state).unwrap_err();
    assert!(matches!(err, DecompileError::Handler { .. }));
}

#[test]
fn json_rendering_is_stable_across_two_runs() {
    let bytes = [0x4b, 0x01, 0x4b, 0x02, 0x4b, 0x03, 0x87, b'.'];
    let (state1, _) = decompile(&bytes);
    let (state2, _) = decompile(&bytes);
    let j1 = serde_json::to_string(&render_json(&state1, false)).unwrap();
    let j2 = serde_json::to_string(&render_json(&state2, false)).unwrap();
    assert_eq!(j1, j2);
}

#[test]
fn pseudocode_rendering_is_idempotent() {
    let bytes = [0x5d, 0x94, b'h', 0x00, b'a', b'.'];
    let (state, _) = decompile(&bytes);
    let first = render_pseudocode(&state.stack, false, false);
    // names are sticky on the objects, so a second render of the same
    // final state must reproduce the same text.
    let second = render_pseudocode(&state.stack, false, false);
    assert_eq!(first, second);
}
