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

//! Renders the reconstructed object graph as Python-like pseudocode,
//! hoisting shared or cyclic objects into named variables with forward
//! declarations.

use std::collections::HashSet;
use std::rc::Rc;

use crate::value::{ObjKind, ObjRef, OperKind};

/// rendering state threaded through the traversal. `out` accumulates the
/// statement currently being built; `flushed` holds everything already
/// committed. `outstack` lets a mid-expression hoist suspend `out` while a
/// forward declaration is produced and flushed ahead of it.
struct PrintInfo {
    flushed: String,
    out: String,
    outstack: Vec<String>,
    first: bool,
    ret: bool,
    varid: u64,
    verbose: bool,
    cyclic: HashSet<usize>,
}

fn ptr_of(obj: &ObjRef) -> usize {
    Rc::as_ptr(obj) as usize
}

/// renders one or more stack frames (VM stack by default) bottom to top,
/// one statement per element; the topmost is prefixed `return`.
pub fn render_pseudocode(stack: &[ObjRef], verbose: bool, incomplete: bool) -> String {
    let cyclic = detect_cycles(stack);
    let mut pi = PrintInfo {
        flushed: String::new(),
        out: String::new(),
        outstack: Vec::new(),
        first: true,
        ret: false,
        varid: 0,
        verbose,
        cyclic,
    };

    let n = stack.len();
    for (i, obj) in stack.iter().enumerate() {
        pi.first = true;
        pi.ret = i + 1 == n;
        dump_obj(&mut pi, obj);
        pi.flushed.push_str(&pi.out);
        pi.out.clear();
    }

    if incomplete {
        pi.flushed
            .push_str("# incomplete: end of buffer reached before STOP\n");
    }
    pi.flushed
}

fn detect_cycles(stack: &[ObjRef]) -> HashSet<usize> {
    let mut cyclic = HashSet::new();
    let mut onstack: HashSet<usize> = HashSet::new();
    let mut done: HashSet<usize> = HashSet::new();
    let mut path: Vec<usize> = Vec::new();
    for obj in stack {
        visit_for_cycles(obj, &mut onstack, &mut done, &mut cyclic, &mut path);
    }
    cyclic
}

fn visit_for_cycles(
    obj: &ObjRef,
    onstack: &mut HashSet<usize>,
    done: &mut HashSet<usize>,
    cyclic: &mut HashSet<usize>,
    path: &mut Vec<usize>,
) {
    let ptr = ptr_of(obj);
    if done.contains(&ptr) {
        return;
    }
    if onstack.contains(&ptr) {
        if let Some(pos) = path.iter().position(|&p| p == ptr) {
            for &p in &path[pos..] {
                cyclic.insert(p);
            }
        }
        cyclic.insert(ptr);
        return;
    }
    onstack.insert(ptr);
    path.push(ptr);
    let children: Vec<ObjRef> = match &*obj.kind.borrow() {
        ObjKind::Tuple(v) => v.clone(),
        ObjKind::List(v) => v.borrow().clone(),
        ObjKind::Set(v) => v.borrow().clone(),
        ObjKind::FrozenSet(v) => v.clone(),
        ObjKind::Dict(v) => v.borrow().clone(),
        ObjKind::Func { module, name } => vec![module.clone(), name.clone()],
        ObjKind::What(ops) => ops
            .borrow()
            .iter()
            .flat_map(|o| o.stack.clone())
            .collect(),
        _ => Vec::new(),
    };
    for c in &children {
        visit_for_cycles(c, onstack, done, cyclic, path);
    }
    path.pop();
    onstack.remove(&ptr);
    done.insert(ptr);
}

fn named(obj: &ObjRef) -> Option<String> {
    obj.varname.borrow().clone()
}

fn needs_name(pi: &PrintInfo, obj: &ObjRef) -> bool {
    obj.is_what() || obj.memo_id.get().is_some() || pi.cyclic.contains(&ptr_of(obj))
}

fn assign_name(pi: &mut PrintInfo, obj: &ObjRef) -> String {
    let name = match obj.memo_id.get() {
        Some(mid) => format!("var_{:x}", mid),
        None => {
            let id = pi.varid;
            pi.varid += 1;
            format!("var_{:x}", id)
        }
    };
    *obj.varname.borrow_mut() = Some(name.clone());
    name
}

fn dump_obj(pi: &mut PrintInfo, obj: &ObjRef) {
    if let Some(name) = named(obj) {
        if pi.ret {
            pi.out.push_str(&format!("return {}\n", name));
        } else if pi.first {
            if pi.verbose {
                pi.out.push_str(&format!("# {} previously declared\n", name));
            }
        } else {
            pi.out.push_str(&name);
        }
        return;
    }

    let nn = needs_name(pi, obj);
    if pi.first {
        if nn {
            let name = assign_name(pi, obj);
            emit_declaration(pi, obj, &name);
            if pi.ret {
                pi.out.push_str(&format!("return {}\n", name));
            }
        } else if pi.ret {
            pi.out.push_str("return ");
            emit_literal(pi, obj);
            pi.out.push('\n');
        } else {
            let name = assign_name(pi, obj);
            pi.out.push_str(&format!("{} = ", name));
            emit_literal(pi, obj);
            pi.out.push('\n');
        }
    } else if nn {
        hoist(pi, obj);
    } else {
        emit_literal(pi, obj);
    }
}

/// used for every child reference: always an inline position.
fn dump_inline(pi: &mut PrintInfo, obj: &ObjRef) {
    let (sf, sr) = (pi.first, pi.ret);
    pi.first = false;
    pi.ret = false;
    dump_obj(pi, obj);
    pi.first = sf;
    pi.ret = sr;
}

/// suspends the in-progress buffer, flushes a forward declaration ahead of
/// it, then resumes and inlines just the name.
fn hoist(pi: &mut PrintInfo, obj: &ObjRef) {
    let suspended = std::mem::take(&mut pi.out);
    pi.outstack.push(suspended);
    let (sf, sr) = (pi.first, pi.ret);
    pi.first = true;
    pi.ret = false;
    dump_obj(pi, obj);
    pi.flushed.push_str(&pi.out);
    pi.out = pi.outstack.pop().unwrap_or_default();
    pi.first = sf;
    pi.ret = sr;
    if let Some(name) = named(obj) {
        pi.out.push_str(&name);
    }
}

fn emit_declaration(pi: &mut PrintInfo, obj: &ObjRef, name: &str) {
    let kind_is_list_set_dict_or_what = {
        let k = obj.kind.borrow();
        matches!(
            &*k,
            ObjKind::List(_) | ObjKind::Set(_) | ObjKind::Dict(_) | ObjKind::What(_)
        )
    };
    if !kind_is_list_set_dict_or_what {
        // cyclic tuple/frozenset: can't defer construction, degrade gracefully.
        pi.out
            .push_str(&format!("{} = (...)  # cyclic, offset {:#x}\n", name, obj.offset));
        return;
    }

    let snapshot = {
        let k = obj.kind.borrow();
        match &*k {
            ObjKind::List(v) => Snapshot::List(v.borrow().clone()),
            ObjKind::Set(v) => Snapshot::Set(v.borrow().clone()),
            ObjKind::Dict(v) => Snapshot::Dict(v.borrow().clone()),
            ObjKind::What(ops) => Snapshot::What(ops.borrow().clone()),
            _ => unreachable!(),
        }
    };

    match snapshot {
        Snapshot::List(items) => {
            pi.out.push_str(&format!("{} = []\n", name));
            for item in &items {
                pi.out.push_str(&format!("{}.append(", name));
                dump_inline(pi, item);
                pi.out.push_str(")\n");
            }
        }
        Snapshot::Set(items) => {
            pi.out.push_str(&format!("{} = set()\n", name));
            for item in &items {
                pi.out.push_str(&format!("{}.add(", name));
                dump_inline(pi, item);
                pi.out.push_str(")\n");
            }
        }
        Snapshot::Dict(items) => {
            pi.out.push_str(&format!("{} = {{}}\n", name));
            for pair in items.chunks(2) {
                pi.out.push_str(&format!("{}[", name));
                dump_inline(pi, &pair[0]);
                pi.out.push_str("] = ");
                if let Some(v) = pair.get(1) {
                    dump_inline(pi, v);
                }
                pi.out.push('\n');
            }
        }
        Snapshot::What(ops) => {
            for op in &ops {
                match op.op {
                    OperKind::FakeInit => {
                        pi.out.push_str(&format!("{} = ", name));
                        dump_inline(pi, &op.stack[0]);
                        pi.out.push('\n');
                    }
                    OperKind::Reduce => {
                        pi.out.push_str(&format!("{} = {}(*", name, name));
                        dump_inline(pi, &op.stack[0]);
                        pi.out.push_str(")\n");
                    }
                    OperKind::NewObj => {
                        pi.out
                            .push_str(&format!("{} = {}.__new__({}, *", name, name, name));
                        dump_inline(pi, &op.stack[0]);
                        pi.out.push_str(")\n");
                    }
                    other => {
                        pi.out
                            .push_str(&format!("{}.{}(", name, other.name().to_lowercase()));
                        for (j, arg) in op.stack.iter().enumerate() {
                            if j > 0 {
                                pi.out.push_str(", ");
                            }
                            dump_inline(pi, arg);
                        }
                        pi.out.push_str(")\n");
                    }
                }
            }
        }
    }
}

enum Snapshot {
    List(Vec<ObjRef>),
    Set(Vec<ObjRef>),
    Dict(Vec<ObjRef>),
    What(Vec<Rc<crate::value::Oper>>),
}

fn emit_literal(pi: &mut PrintInfo, obj: &ObjRef) {
    let kind_snapshot = {
        let k = obj.kind.borrow();
        match &*k {
            ObjKind::None => LiteralKind::None,
            ObjKind::Bool(b) => LiteralKind::Bool(*b),
            ObjKind::Int(v) => LiteralKind::Int(*v),
            ObjKind::Float(v) => LiteralKind::Float(*v),
            ObjKind::Str(b) => LiteralKind::Str(b.clone()),
            ObjKind::Tuple(v) => LiteralKind::Tuple(v.clone()),
            ObjKind::List(v) => LiteralKind::List(v.borrow().clone()),
            ObjKind::Set(v) => LiteralKind::Set(v.borrow().clone()),
            ObjKind::FrozenSet(v) => LiteralKind::FrozenSet(v.clone()),
            ObjKind::Dict(v) => LiteralKind::Dict(v.borrow().clone()),
            ObjKind::Func { module, name } => LiteralKind::Func(module.clone(), name.clone()),
            ObjKind::What(_) => LiteralKind::Opaque,
            ObjKind::Split(_) => LiteralKind::Split,
        }
    };

    match kind_snapshot {
        LiteralKind::None => pi.out.push_str("None"),
        LiteralKind::Bool(b) => pi.out.push_str(if b { "True" } else { "False" }),
        LiteralKind::Int(v) => pi.out.push_str(&v.to_string()),
        LiteralKind::Float(v) => pi.out.push_str(&format!("{:?}", v)),
        LiteralKind::Str(bytes) => {
            pi.out.push('\'');
            pi.out.push_str(&String::from_utf8_lossy(&bytes).replace('\'', "\\'"));
            pi.out.push('\'');
        }
        LiteralKind::Tuple(items) => {
            pi.out.push('(');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    pi.out.push_str(", ");
                }
                dump_inline(pi, item);
            }
            if items.len() == 1 {
                pi.out.push(',');
            }
            pi.out.push(')');
        }
        LiteralKind::List(items) => {
            pi.out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    pi.out.push_str(", ");
                }
                dump_inline(pi, item);
            }
            pi.out.push(']');
        }
        LiteralKind::Set(items) => {
            if items.is_empty() {
                pi.out.push_str("set()");
            } else {
                pi.out.push('{');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        pi.out.push_str(", ");
                    }
                    dump_inline(pi, item);
                }
                pi.out.push('}');
            }
        }
        LiteralKind::FrozenSet(items) => {
            pi.out.push_str("frozenset([");
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    pi.out.push_str(", ");
                }
                dump_inline(pi, item);
            }
            pi.out.push_str("])");
        }
        LiteralKind::Dict(items) => {
            pi.out.push('{');
            for (i, pair) in items.chunks(2).enumerate() {
                if i > 0 {
                    pi.out.push_str(", ");
                }
                dump_inline(pi, &pair[0]);
                pi.out.push_str(": ");
                if let Some(v) = pair.get(1) {
                    dump_inline(pi, v);
                }
            }
            pi.out.push('}');
        }
        LiteralKind::Func(module, name) => {
            let m = match &*module.kind.borrow() {
                ObjKind::Str(b) => String::from_utf8_lossy(b).into_owned(),
                _ => String::new(),
            };
            let n = match &*name.kind.borrow() {
                ObjKind::Str(b) => String::from_utf8_lossy(b).into_owned(),
                _ => String::new(),
            };
            pi.out.push_str(&format!("__import__(\"{}\").{}", m, n));
        }
        LiteralKind::Opaque => pi.out.push_str("<opaque>"),
        LiteralKind::Split => {}
    }
}

enum LiteralKind {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Vec<u8>),
    Tuple(Vec<ObjRef>),
    List(Vec<ObjRef>),
    Set(Vec<ObjRef>),
    FrozenSet(Vec<ObjRef>),
    Dict(Vec<ObjRef>),
    Func(ObjRef, ObjRef),
    Opaque,
    Split,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::disasm::{SliceDisassembler, SliceHost};
    use crate::interp::Interpreter;
    use crate::state::MachineState;

    fn render(bytes: &[u8]) -> String {
        let disasm = SliceDisassembler::new(bytes);
        let host = SliceHost::new(bytes);
        let interp = Interpreter::new(&disasm, &host, bytes.len() as u64);
        let mut state = MachineState::new(&Config::default()).unwrap();
        let complete = interp.run(&mut state).unwrap();
        render_pseudocode(&state.stack, false, !complete)
    }

    #[test]
    fn empty_list() {
        assert_eq!(render(&[0x5d, b'.']), "return []\n");
    }

    #[test]
    fn nested_self_reference() {
        assert_eq!(
            render(&[0x5d, 0x94, b'h', 0x00, b'a', b'.']),
            "var_0 = []\nvar_0.append(var_0)\nreturn var_0\n"
        );
    }

    #[test]
    fn tuple_of_three_ints() {
        assert_eq!(
            render(&[0x4b, 0x01, 0x4b, 0x02, 0x4b, 0x03, 0x87, b'.']),
            "return (1, 2, 3)\n"
        );
    }

    #[test]
    fn reduce_call() {
        let mut bytes = vec![b'c'];
        bytes.extend_from_slice(b"__builtin__\n");
        bytes.extend_from_slice(b"eval\n");
        bytes.push(b'(');
        bytes.push(b'V');
        bytes.extend_from_slice(b"1+1\n");
        bytes.push(b't');
        bytes.push(b'R');
        bytes.push(b'.');
        assert_eq!(
            render(&bytes),
            "var_0 = __import__(\"__builtin__\").eval\nvar_0 = var_0(*('1+1',))\nreturn var_0\n"
        );
    }
}
