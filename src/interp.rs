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

//! The stack-machine interpreter: per-opcode handlers driving
//! [`MachineState`] and the [`crate::value`] object model.

use std::rc::Rc;

use crate::disasm::{DecodedOp, Disassembler, HostIo};
use crate::error::{DecompileError, Result};
use crate::opcode::OpCode;
use crate::state::MachineState;
use crate::value::{upgrade_to_what, Obj, ObjKind, ObjRef, Oper, OperKind};

/// drives a [`MachineState`] to completion (or first error) using a
/// [`Disassembler`] to decode opcodes and a [`HostIo`] to fetch oversized
/// string payloads.
pub struct Interpreter<'a, D, H> {
    disasm: &'a D,
    host: &'a H,
    len: u64,
}

impl<'a, D: Disassembler, H: HostIo> Interpreter<'a, D, H> {
    pub fn new(disasm: &'a D, host: &'a H, len: u64) -> Self {
        Interpreter { disasm, host, len }
    }

    /// runs until `STOP`, the configured end offset, or the end of the
    /// buffer. Returns `true` if `STOP` was reached (a complete run) or
    /// `false` if the buffer ran out first (still renderable, but marked
    /// incomplete by the caller).
    pub fn run(&self, state: &mut MachineState) -> Result<bool> {
        loop {
            if let Some(end) = state.end {
                if state.offset >= end {
                    return Ok(false);
                }
            }
            if state.offset >= self.len {
                return Ok(false);
            }
            let proto = state.ver.unwrap_or(5);
            let op = self.disasm.decode(proto, state.offset)?;
            if op.len == 0 {
                return Err(DecompileError::Decode {
                    offset: state.offset,
                    mnemonic: op.mnemonic.to_string(),
                });
            }
            tracing::debug!(offset = state.offset, mnemonic = op.mnemonic, "dispatch");
            let stop = self.dispatch(state, &op)?;
            state.offset += op.len as u64;
            if stop {
                return Ok(true);
            }
        }
    }

    fn dispatch(&self, state: &mut MachineState, op: &DecodedOp) -> Result<bool> {
        use OpCode::*;
        match op.code {
            Mark => self.op_mark(state),
            PopMark => self.op_pop_mark(state, op)?,
            Pop => self.op_pop(state, op)?,
            Dup => self.op_dup(state, op)?,

            None => self.push(state, Obj::new(ObjKind::None, op.offset)),
            NewTrue => self.push(state, Obj::new(ObjKind::Bool(true), op.offset)),
            NewFalse => self.push(state, Obj::new(ObjKind::Bool(false), op.offset)),
            BinInt | BinInt1 | BinInt2 | Long1 | Long4 => {
                self.push(state, Obj::new(ObjKind::Int(op.value), op.offset))
            }
            Float => {
                let text = op.text.as_deref().unwrap_or("0");
                let v: f64 = text.trim().parse().unwrap_or(0.0);
                self.push(state, Obj::new(ObjKind::Float(v), op.offset));
            }
            BinFloat => {
                let v = f64::from_bits(op.value as u64);
                self.push(state, Obj::new(ObjKind::Float(v), op.offset));
            }
            String | BinString | ShortBinString | Unicode | BinUnicode | ShortBinUnicode
            | BinUnicode8 | BinBytes | ShortBinBytes | BinBytes8 | ByteArray8 => {
                let bytes = self.str_bytes(op)?;
                self.push(state, Obj::new(ObjKind::Str(bytes), op.offset));
            }

            EmptyTuple => self.push(state, Obj::new(ObjKind::Tuple(Vec::new()), op.offset)),
            EmptyList => self.push(
                state,
                Obj::new(ObjKind::List(std::cell::RefCell::new(Vec::new())), op.offset),
            ),
            EmptyDict => self.push(
                state,
                Obj::new(ObjKind::Dict(std::cell::RefCell::new(Vec::new())), op.offset),
            ),
            EmptySet => self.push(
                state,
                Obj::new(ObjKind::Set(std::cell::RefCell::new(Vec::new())), op.offset),
            ),
            Tuple1 => self.op_tuple_n(state, op, 1)?,
            Tuple2 => self.op_tuple_n(state, op, 2)?,
            Tuple3 => self.op_tuple_n(state, op, 3)?,
            Tuple => self.op_mark_bounded(state, op, MarkKind::Tuple)?,
            List => self.op_mark_bounded(state, op, MarkKind::List)?,
            Dict => self.op_mark_bounded(state, op, MarkKind::Dict)?,
            FrozenSet => self.op_mark_bounded(state, op, MarkKind::FrozenSet)?,

            Append => self.op_append(state, op)?,
            Appends => self.op_appends(state, op)?,
            SetItem => self.op_setitem(state, op)?,
            SetItems => self.op_setitems(state, op)?,
            AddItems => self.op_additems(state, op)?,

            Reduce => self.op_reduce(state, op)?,
            Build => self.op_build(state, op)?,
            NewObj => self.op_newobj(state, op)?,
            Inst => self.op_inst(state, op)?,
            Obj => self.op_obj(state, op)?,
            StackGlobal => self.op_stack_global(state, op)?,
            Global => self.op_global(state, op),

            Memoize => self.op_memoize(state, op)?,
            BinPut | LongBinPut => self.op_put(state, op)?,
            BinGet | LongBinGet => self.op_get(state, op)?,

            Proto => state.ver = Some(op.value as u8),
            Frame => {}
            Stop => {
                if state.break_on_stop {
                    return Ok(true);
                }
            }

            NewObjEx | PersId | BinPersId | Ext1 | Ext2 | Ext4 | NextBuffer | ReadOnlyBuffer
            | Int | Long | Get | Put => {
                tracing::warn!(offset = op.offset, mnemonic = op.mnemonic, "unhandled opcode");
                return Err(DecompileError::Handler {
                    offset: op.offset,
                    mnemonic: op.mnemonic.to_string(),
                    reason: "opcode recognized but not implemented".to_string(),
                });
            }
        }
        Ok(false)
    }

    fn push(&self, state: &mut MachineState, obj: ObjRef) {
        state.stack.push(obj);
    }

    fn pop(&self, state: &mut MachineState, op: &DecodedOp) -> Result<ObjRef> {
        state.stack.pop().ok_or_else(|| DecompileError::Handler {
            offset: op.offset,
            mnemonic: op.mnemonic.to_string(),
            reason: "stack underflow".to_string(),
        })
    }

    fn peek(&self, state: &MachineState, op: &DecodedOp) -> Result<ObjRef> {
        state
            .stack
            .last()
            .cloned()
            .ok_or_else(|| DecompileError::Handler {
                offset: op.offset,
                mnemonic: op.mnemonic.to_string(),
                reason: "stack underflow".to_string(),
            })
    }

    fn pop_to_mark(&self, state: &mut MachineState, op: &DecodedOp) -> Result<Vec<ObjRef>> {
        let items = std::mem::take(&mut state.stack);
        state.stack = state.metastack.pop().ok_or_else(|| DecompileError::Handler {
            offset: op.offset,
            mnemonic: op.mnemonic.to_string(),
            reason: "missing MARK".to_string(),
        })?;
        Ok(items)
    }

    fn str_bytes(&self, op: &DecodedOp) -> Result<Vec<u8>> {
        if let Some(b) = &op.bytes {
            return Ok(b.clone());
        }
        if let Some((off, len)) = op.ptr {
            return self.host.read_at(off, len);
        }
        Ok(op
            .text
            .clone()
            .map(|t| t.into_bytes())
            .unwrap_or_default())
    }

    fn op_mark(&self, state: &mut MachineState) {
        let prev = std::mem::take(&mut state.stack);
        state.metastack.push(prev);
    }

    fn op_pop_mark(&self, state: &mut MachineState, op: &DecodedOp) -> Result<()> {
        let cur = std::mem::take(&mut state.stack);
        state.popstack.extend(cur);
        state.stack = state.metastack.pop().ok_or_else(|| DecompileError::Handler {
            offset: op.offset,
            mnemonic: op.mnemonic.to_string(),
            reason: "missing MARK".to_string(),
        })?;
        Ok(())
    }

    fn op_pop(&self, state: &mut MachineState, op: &DecodedOp) -> Result<()> {
        let top = self.pop(state, op)?;
        state.popstack.push(top);
        Ok(())
    }

    fn op_dup(&self, state: &mut MachineState, op: &DecodedOp) -> Result<()> {
        let top = self.peek(state, op)?;
        top.bump_refcnt();
        state.stack.push(top);
        Ok(())
    }

    fn op_tuple_n(&self, state: &mut MachineState, op: &DecodedOp, n: usize) -> Result<()> {
        if state.stack.len() < n {
            return Err(DecompileError::Handler {
                offset: op.offset,
                mnemonic: op.mnemonic.to_string(),
                reason: "stack underflow".to_string(),
            });
        }
        let items: Vec<ObjRef> = state.stack.split_off(state.stack.len() - n);
        self.push(state, Obj::new(ObjKind::Tuple(items), op.offset));
        Ok(())
    }

    fn op_mark_bounded(&self, state: &mut MachineState, op: &DecodedOp, kind: MarkKind) -> Result<()> {
        let items = self.pop_to_mark(state, op)?;
        let obj = match kind {
            MarkKind::Tuple => Obj::new(ObjKind::Tuple(items), op.offset),
            MarkKind::List => Obj::new(ObjKind::List(std::cell::RefCell::new(items)), op.offset),
            MarkKind::FrozenSet => Obj::new(ObjKind::FrozenSet(items), op.offset),
            MarkKind::Dict => {
                if items.len() % 2 != 0 {
                    return Err(DecompileError::Handler {
                        offset: op.offset,
                        mnemonic: op.mnemonic.to_string(),
                        reason: "dict requires an even number of items".to_string(),
                    });
                }
                Obj::new(ObjKind::Dict(std::cell::RefCell::new(items)), op.offset)
            }
        };
        self.push(state, obj);
        Ok(())
    }

    fn op_append(&self, state: &mut MachineState, op: &DecodedOp) -> Result<()> {
        let item = self.pop(state, op)?;
        let target = self.peek(state, op)?;
        let is_list = matches!(&*target.kind.borrow(), ObjKind::List(_));
        if is_list {
            if let ObjKind::List(v) = &*target.kind.borrow() {
                v.borrow_mut().push(item);
            }
        } else {
            add_oper(&target, OperKind::Append, vec![item], op.offset)?;
        }
        Ok(())
    }

    fn op_appends(&self, state: &mut MachineState, op: &DecodedOp) -> Result<()> {
        let items = self.pop_to_mark(state, op)?;
        let target = self.peek(state, op)?;
        match &*target.kind.borrow() {
            ObjKind::List(v) => {
                v.borrow_mut().extend(items);
                return Ok(());
            }
            ObjKind::Set(v) => {
                v.borrow_mut().extend(items);
                return Ok(());
            }
            _ => {}
        }
        add_oper(&target, OperKind::Appends, items, op.offset)?;
        Ok(())
    }

    fn op_setitem(&self, state: &mut MachineState, op: &DecodedOp) -> Result<()> {
        let value = self.pop(state, op)?;
        let key = self.pop(state, op)?;
        let target = self.peek(state, op)?;
        let is_dict = matches!(&*target.kind.borrow(), ObjKind::Dict(_));
        if is_dict {
            if let ObjKind::Dict(v) = &*target.kind.borrow() {
                let mut v = v.borrow_mut();
                v.push(key);
                v.push(value);
            }
        } else {
            add_oper(&target, OperKind::SetItem, vec![key, value], op.offset)?;
        }
        Ok(())
    }

    fn op_setitems(&self, state: &mut MachineState, op: &DecodedOp) -> Result<()> {
        let items = self.pop_to_mark(state, op)?;
        let target = self.peek(state, op)?;
        let is_dict = matches!(&*target.kind.borrow(), ObjKind::Dict(_));
        if is_dict {
            if let ObjKind::Dict(v) = &*target.kind.borrow() {
                v.borrow_mut().extend(items);
            }
            return Ok(());
        }
        add_oper(&target, OperKind::SetItems, items, op.offset)?;
        Ok(())
    }

    fn op_additems(&self, state: &mut MachineState, op: &DecodedOp) -> Result<()> {
        let items = self.pop_to_mark(state, op)?;
        let target = self.peek(state, op)?;
        let is_set = matches!(&*target.kind.borrow(), ObjKind::Set(_));
        if is_set {
            if let ObjKind::Set(v) = &*target.kind.borrow() {
                v.borrow_mut().extend(items);
            }
            return Ok(());
        }
        add_oper(&target, OperKind::AddItems, items, op.offset)?;
        Ok(())
    }

    fn op_reduce(&self, state: &mut MachineState, op: &DecodedOp) -> Result<()> {
        let args = self.pop(state, op)?;
        let callable = self.peek(state, op)?;
        let oper = add_oper(&callable, OperKind::Reduce, vec![args.clone()], op.offset)?;
        self.split_pass(state, &oper, &args);
        Ok(())
    }

    fn op_build(&self, state: &mut MachineState, op: &DecodedOp) -> Result<()> {
        let arg = self.pop(state, op)?;
        let target = self.peek(state, op)?;
        add_oper(&target, OperKind::Build, vec![arg], op.offset)?;
        Ok(())
    }

    fn op_newobj(&self, state: &mut MachineState, op: &DecodedOp) -> Result<()> {
        let args = self.pop(state, op)?;
        let cls = self.peek(state, op)?;
        add_oper(&cls, OperKind::NewObj, vec![args], op.offset)?;
        Ok(())
    }

    fn op_inst(&self, state: &mut MachineState, op: &DecodedOp) -> Result<()> {
        let items = self.pop_to_mark(state, op)?;
        let args = Obj::new(ObjKind::Tuple(items), op.offset);
        let module = Obj::new(
            ObjKind::Str(op.text.clone().unwrap_or_default().into_bytes()),
            op.offset,
        );
        let name = Obj::new(
            ObjKind::Str(op.text2.clone().unwrap_or_default().into_bytes()),
            op.offset,
        );
        let cls = Obj::new(ObjKind::Func { module, name }, op.offset);
        add_oper(&cls, OperKind::Inst, vec![args], op.offset)?;
        self.push(state, cls);
        Ok(())
    }

    fn op_obj(&self, state: &mut MachineState, op: &DecodedOp) -> Result<()> {
        let mut items = self.pop_to_mark(state, op)?;
        if items.is_empty() {
            return Err(DecompileError::Handler {
                offset: op.offset,
                mnemonic: op.mnemonic.to_string(),
                reason: "OBJ requires a class reference".to_string(),
            });
        }
        let cls = items.remove(0);
        let args = Obj::new(ObjKind::Tuple(items), op.offset);
        add_oper(&cls, OperKind::Obj, vec![args], op.offset)?;
        self.push(state, cls);
        Ok(())
    }

    fn op_stack_global(&self, state: &mut MachineState, op: &DecodedOp) -> Result<()> {
        let name = self.pop(state, op)?;
        let module = self.pop(state, op)?;
        self.push(state, Obj::new(ObjKind::Func { module, name }, op.offset));
        Ok(())
    }

    fn op_global(&self, state: &mut MachineState, op: &DecodedOp) {
        let module = Obj::new(
            ObjKind::Str(op.text.clone().unwrap_or_default().into_bytes()),
            op.offset,
        );
        let name = Obj::new(
            ObjKind::Str(op.text2.clone().unwrap_or_default().into_bytes()),
            op.offset,
        );
        self.push(state, Obj::new(ObjKind::Func { module, name }, op.offset));
    }

    fn op_memoize(&self, state: &mut MachineState, op: &DecodedOp) -> Result<()> {
        let top = self.peek(state, op)?;
        state.memoize(top);
        Ok(())
    }

    fn op_put(&self, state: &mut MachineState, op: &DecodedOp) -> Result<()> {
        let top = self.peek(state, op)?;
        state.put_memo(op.value as u64, top);
        Ok(())
    }

    fn op_get(&self, state: &mut MachineState, op: &DecodedOp) -> Result<()> {
        let obj = state
            .get_memo(op.value as u64)
            .ok_or_else(|| DecompileError::Handler {
                offset: op.offset,
                mnemonic: op.mnemonic.to_string(),
                reason: format!("no memo entry at slot {}", op.value),
            })?;
        obj.bump_refcnt();
        self.push(state, obj);
        Ok(())
    }

    /// marks, inside `args_tuple`, every reachable mutable container with a
    /// `Split` sentinel referencing `oper` — the point at which `REDUCE`'s
    /// target became live. `state`'s generation counter prevents descending
    /// into the same container twice within one pass.
    fn split_pass(&self, state: &mut MachineState, oper: &Rc<Oper>, args_tuple: &ObjRef) {
        let gen = state.next_generation();
        apply_split(args_tuple, oper, gen);
    }
}

enum MarkKind {
    Tuple,
    List,
    Dict,
    FrozenSet,
}

fn add_oper(obj: &ObjRef, kind: OperKind, args: Vec<ObjRef>, offset: u64) -> Result<Rc<Oper>> {
    upgrade_to_what(obj, offset);
    let oper = Oper::new(kind, args, offset);
    if let ObjKind::What(ops) = &*obj.kind.borrow() {
        ops.borrow_mut().push(oper.clone());
    }
    Ok(oper)
}

fn apply_split(obj: &ObjRef, oper: &Rc<Oper>, gen: u64) {
    if obj.recurse.get() == gen {
        return;
    }
    obj.recurse.set(gen);
    let children: Vec<ObjRef> = match &*obj.kind.borrow() {
        ObjKind::Tuple(v) => v.clone(),
        ObjKind::List(v) => v.borrow().clone(),
        ObjKind::Set(v) => v.borrow().clone(),
        ObjKind::FrozenSet(v) => v.clone(),
        ObjKind::Dict(v) => v.borrow().clone(),
        _ => Vec::new(),
    };
    for child in &children {
        apply_split(child, oper, gen);
    }
    match &*obj.kind.borrow() {
        ObjKind::List(v) => insert_split(&mut v.borrow_mut(), oper),
        ObjKind::Set(v) => insert_split(&mut v.borrow_mut(), oper),
        ObjKind::Dict(v) => insert_split(&mut v.borrow_mut(), oper),
        _ => {}
    }
}

fn insert_split(vec: &mut Vec<ObjRef>, oper: &Rc<Oper>) {
    let marker = Obj::new(ObjKind::Split(oper.clone()), 0);
    if let Some(last) = vec.last() {
        if matches!(&*last.kind.borrow(), ObjKind::Split(_)) {
            let idx = vec.len() - 1;
            vec[idx] = marker;
            return;
        }
    }
    vec.push(marker);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::disasm::{SliceDisassembler, SliceHost};

    fn run_bytes(bytes: &[u8]) -> (MachineState, bool) {
        let disasm = SliceDisassembler::new(bytes);
        let host = SliceHost::new(bytes);
        let interp = Interpreter::new(&disasm, &host, bytes.len() as u64);
        let mut state = MachineState::new(&Config::default()).unwrap();
        let complete = interp.run(&mut state).unwrap();
        (state, complete)
    }

    #[test]
    fn empty_list_then_stop() {
        let (state, complete) = run_bytes(&[0x5d, b'.']);
        assert!(complete);
        assert_eq!(state.stack.len(), 1);
        assert!(matches!(&*state.stack[0].kind.borrow(), ObjKind::List(v) if v.borrow().is_empty()));
    }

    #[test]
    fn nested_self_reference_via_binget_append() {
        let (state, complete) = run_bytes(&[0x5d, 0x94, b'h', 0x00, b'a', b'.']);
        assert!(complete);
        assert_eq!(state.stack.len(), 1);
        let top = &state.stack[0];
        if let ObjKind::List(v) = &*top.kind.borrow() {
            let inner = v.borrow();
            assert_eq!(inner.len(), 1);
            assert!(Rc::ptr_eq(&inner[0], top));
        } else {
            panic!("expected list");
        }
    }

    #[test]
    fn tuple_of_three_ints() {
        let (state, complete) = run_bytes(&[
            0x4b, 0x01, 0x4b, 0x02, 0x4b, 0x03, 0x87, b'.',
        ]);
        assert!(complete);
        if let ObjKind::Tuple(items) = &*state.stack[0].kind.borrow() {
            let vals: Vec<i64> = items
                .iter()
                .map(|o| match &*o.kind.borrow() {
                    ObjKind::Int(v) => *v,
                    _ => panic!("expected int"),
                })
                .collect();
            assert_eq!(vals, vec![1, 2, 3]);
        } else {
            panic!("expected tuple");
        }
    }

    #[test]
    fn long1_pushes_decoded_integer_not_byte_count() {
        // LONG1 with a 2-byte little-endian payload encoding 1000, not 2.
        let (state, complete) = run_bytes(&[0x8a, 2, 0xe8, 0x03, b'.']);
        assert!(complete);
        assert!(matches!(&*state.stack[0].kind.borrow(), ObjKind::Int(1000)));
    }

    #[test]
    fn dict_with_odd_close_is_handler_error() {
        let bytes = [0x28, 0x4b, 0x01, b'd', b'.'];
        let disasm = SliceDisassembler::new(&bytes);
        let host = SliceHost::new(&bytes);
        let interp = Interpreter::new(&disasm, &host, bytes.len() as u64);
        let mut state = MachineState::new(&Config::default()).unwrap();
        let err = interp.run(&mut state).unwrap_err();
        assert!(matches!(err, DecompileError::Handler { .. }));
    }

    #[test]
    fn reduce_upgrades_callable_to_what() {
        // "c__builtin__\neval\n(V1+1\ntR." from the concrete scenario list.
        let mut bytes = vec![b'c'];
        bytes.extend_from_slice(b"__builtin__\n");
        bytes.extend_from_slice(b"eval\n");
        bytes.push(b'(');
        bytes.push(b'V');
        bytes.extend_from_slice(b"1+1\n");
        bytes.push(b't');
        bytes.push(b'R');
        bytes.push(b'.');

        let disasm = SliceDisassembler::new(&bytes);
        let host = SliceHost::new(&bytes);
        let interp = Interpreter::new(&disasm, &host, bytes.len() as u64);
        let mut state = MachineState::new(&Config::default()).unwrap();
        let complete = interp.run(&mut state).unwrap();
        assert!(complete);
        assert!(state.stack[0].is_what());
    }
}
