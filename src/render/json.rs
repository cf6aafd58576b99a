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

//! Renders the object graph as a structured JSON tree mirroring §3's
//! variant shapes, substituting `{"ref": id}` nodes for re-encountered
//! shared or cyclic objects.

use std::collections::HashSet;
use std::rc::Rc;

use serde_json::{json, Value};

use crate::state::MachineState;
use crate::value::{ObjKind, ObjRef};

struct JsonCtx {
    generation: u64,
    seen: HashSet<usize>,
}

fn ptr_id(obj: &ObjRef) -> usize {
    Rc::as_ptr(obj) as usize
}

fn ref_id(obj: &ObjRef) -> u64 {
    obj.memo_id.get().unwrap_or_else(|| ptr_id(obj) as u64)
}

fn node(ctx: &mut JsonCtx, obj: &ObjRef) -> Value {
    let id = ptr_id(obj);
    if obj.recurse.get() == ctx.generation && ctx.seen.contains(&id) {
        return json!({ "ref": ref_id(obj) });
    }
    obj.recurse.set(ctx.generation);
    ctx.seen.insert(id);

    let mut out = match &*obj.kind.borrow() {
        ObjKind::None => json!({ "type": "None" }),
        ObjKind::Bool(b) => json!({ "type": "Bool", "value": b }),
        ObjKind::Int(v) => json!({ "type": "Int", "value": v }),
        ObjKind::Float(v) => json!({ "type": "Float", "value": v }),
        ObjKind::Str(bytes) => json!({
            "type": "Str",
            "value": String::from_utf8_lossy(bytes),
        }),
        ObjKind::Tuple(items) => json!({
            "type": "Tuple",
            "value": items.iter().map(|o| node(ctx, o)).collect::<Vec<_>>(),
        }),
        ObjKind::List(items) => json!({
            "type": "List",
            "value": items.borrow().iter().map(|o| node(ctx, o)).collect::<Vec<_>>(),
        }),
        ObjKind::Set(items) => json!({
            "type": "Set",
            "value": items.borrow().iter().map(|o| node(ctx, o)).collect::<Vec<_>>(),
        }),
        ObjKind::FrozenSet(items) => json!({
            "type": "FrozenSet",
            "value": items.iter().map(|o| node(ctx, o)).collect::<Vec<_>>(),
        }),
        ObjKind::Dict(items) => {
            let items = items.borrow();
            let pairs: Vec<Value> = items
                .chunks(2)
                .map(|pair| {
                    json!({
                        "key": node(ctx, &pair[0]),
                        "value": pair.get(1).map(|v| node(ctx, v)),
                    })
                })
                .collect();
            json!({ "type": "Dict", "value": pairs })
        }
        ObjKind::Func { module, name } => json!({
            "type": "Func",
            "module": node(ctx, module),
            "name": node(ctx, name),
        }),
        ObjKind::What(ops) => {
            let ops = ops.borrow();
            let history: Vec<Value> = ops
                .iter()
                .map(|op| {
                    json!({
                        "op": op.op.name(),
                        "offset": op.offset,
                        "stack": op.stack.iter().map(|o| node(ctx, o)).collect::<Vec<_>>(),
                    })
                })
                .collect();
            json!({ "type": "What", "value": history })
        }
        ObjKind::Split(_) => json!({ "type": "Split" }),
    };

    if let Value::Object(ref mut map) = out {
        map.insert("offset".to_string(), json!(obj.offset));
        if let Some(mid) = obj.memo_id.get() {
            map.insert("memo_id".to_string(), json!(mid));
        }
    }
    out
}

/// renders a full machine state as `{ "stack": [...], "popstack": [...],
/// "memo": {...} }`.
pub fn render_json(state: &MachineState, incomplete: bool) -> Value {
    let mut ctx = JsonCtx {
        generation: state.recurse + 1,
        seen: HashSet::new(),
    };
    let stack: Vec<Value> = state.stack.iter().map(|o| node(&mut ctx, o)).collect();
    let popstack: Vec<Value> = state.popstack.iter().map(|o| node(&mut ctx, o)).collect();
    let memo: serde_json::Map<String, Value> = state
        .memo
        .iter()
        .map(|(slot, obj)| (slot.to_string(), node(&mut ctx, obj)))
        .collect();

    json!({
        "stack": stack,
        "popstack": popstack,
        "memo": Value::Object(memo),
        "incomplete": incomplete,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::disasm::{SliceDisassembler, SliceHost};
    use crate::interp::Interpreter;

    fn run(bytes: &[u8]) -> MachineState {
        let disasm = SliceDisassembler::new(bytes);
        let host = SliceHost::new(bytes);
        let interp = Interpreter::new(&disasm, &host, bytes.len() as u64);
        let mut state = MachineState::new(&Config::default()).unwrap();
        interp.run(&mut state).unwrap();
        state
    }

    #[test]
    fn empty_list_json() {
        let state = run(&[0x5d, b'.']);
        let v = render_json(&state, false);
        assert_eq!(v["stack"][0]["type"], "List");
        assert_eq!(v["stack"][0]["value"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn self_referential_list_uses_ref_node() {
        let state = run(&[0x5d, 0x94, b'h', 0x00, b'a', b'.']);
        let v = render_json(&state, false);
        let inner = &v["stack"][0]["value"][0];
        assert!(inner.get("ref").is_some());
    }

    #[test]
    fn tuple_of_ints_json() {
        let state = run(&[0x4b, 0x01, 0x4b, 0x02, 0x4b, 0x03, 0x87, b'.']);
        let v = render_json(&state, false);
        assert_eq!(v["stack"][0]["type"], "Tuple");
        let vals: Vec<i64> = v["stack"][0]["value"]
            .as_array()
            .unwrap()
            .iter()
            .map(|n| n["value"].as_i64().unwrap())
            .collect();
        assert_eq!(vals, vec![1, 2, 3]);
    }
}
