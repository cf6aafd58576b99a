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

//! The reconstructed object graph: [`Obj`], [`Oper`], and the `What`
//! opaque-construction machinery.
//!
//! Sharing is modeled with `Rc` rather than the manual refcounting of the
//! plugin this crate descends from. `refcnt` is kept as an explicit `Cell`
//! anyway — it is no longer load-bearing for memory safety, but the
//! invariants in §8.1 talk about it directly, so it stays observable and
//! testable. Self-referential containers form a real `Rc` cycle that is
//! never broken; this process is a one-shot CLI, so the cycle dies with it.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// one opcode's effect on a `What` under construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperKind {
    FakeInit,
    Reduce,
    Build,
    NewObj,
    NewObjEx,
    Append,
    Appends,
    SetItem,
    SetItems,
    AddItems,
    Inst,
    Obj,
}

impl OperKind {
    pub fn name(self) -> &'static str {
        use OperKind::*;
        match self {
            FakeInit => "FAKE_INIT",
            Reduce => "REDUCE",
            Build => "BUILD",
            NewObj => "NEWOBJ",
            NewObjEx => "NEWOBJ_EX",
            Append => "APPEND",
            Appends => "APPENDS",
            SetItem => "SETITEM",
            SetItems => "SETITEMS",
            AddItems => "ADDITEMS",
            Inst => "INST",
            Obj => "OBJ",
        }
    }
}

/// an operation record: one opcode applied to a `What`, and the arguments
/// it consumed.
#[derive(Debug)]
pub struct Oper {
    pub op: OperKind,
    pub stack: Vec<ObjRef>,
    pub offset: u64,
    pub refcnt: Cell<u64>,
}

impl Oper {
    pub fn new(op: OperKind, stack: Vec<ObjRef>, offset: u64) -> Rc<Self> {
        Rc::new(Oper {
            op,
            stack,
            offset,
            refcnt: Cell::new(1),
        })
    }
}

pub type ObjRef = Rc<Obj>;

/// the tagged value variants §3.1 names. `What`'s payload is `RefCell` so an
/// existing `Obj` can be upgraded in place without re-homing every pointer
/// into it (callers hold `Rc<Obj>`, not `Rc<RefCell<Obj>>`, so the kind
/// itself must be the interior-mutable cell).
#[derive(Debug)]
pub enum ObjKind {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Vec<u8>),
    Tuple(Vec<ObjRef>),
    List(RefCell<Vec<ObjRef>>),
    Set(RefCell<Vec<ObjRef>>),
    FrozenSet(Vec<ObjRef>),
    Dict(RefCell<Vec<ObjRef>>),
    Func { module: ObjRef, name: ObjRef },
    What(RefCell<Vec<Rc<Oper>>>),
    /// an internal marker identifying where, inside a `What`'s REDUCE
    /// arguments, the instance becomes live. Never emitted to users.
    Split(Rc<Oper>),
}

impl ObjKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            ObjKind::None => "None",
            ObjKind::Bool(_) => "Bool",
            ObjKind::Int(_) => "Int",
            ObjKind::Float(_) => "Float",
            ObjKind::Str(_) => "Str",
            ObjKind::Tuple(_) => "Tuple",
            ObjKind::List(_) => "List",
            ObjKind::Set(_) => "Set",
            ObjKind::FrozenSet(_) => "FrozenSet",
            ObjKind::Dict(_) => "Dict",
            ObjKind::Func { .. } => "Func",
            ObjKind::What(_) => "What",
            ObjKind::Split(_) => "Split",
        }
    }
}

/// an `Obj` with the bookkeeping fields every variant carries: source
/// offset, memo slot, refcount, renderer-assigned name, and the cycle-
/// breaking generation counter.
pub struct Obj {
    pub kind: RefCell<ObjKind>,
    pub offset: u64,
    pub memo_id: Cell<Option<u64>>,
    pub refcnt: Cell<u64>,
    pub varname: RefCell<Option<String>>,
    pub recurse: Cell<u64>,
}

impl fmt::Debug for Obj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Obj")
            .field("kind", &self.kind.borrow().type_name())
            .field("offset", &self.offset)
            .field("memo_id", &self.memo_id.get())
            .finish()
    }
}

impl Obj {
    pub fn new(kind: ObjKind, offset: u64) -> ObjRef {
        Rc::new(Obj {
            kind: RefCell::new(kind),
            offset,
            memo_id: Cell::new(None),
            refcnt: Cell::new(1),
            varname: RefCell::new(None),
            recurse: Cell::new(0),
        })
    }

    pub fn bump_refcnt(&self) {
        self.refcnt.set(self.refcnt.get() + 1);
    }

    pub fn type_name(&self) -> &'static str {
        self.kind.borrow().type_name()
    }

    /// true for variants that can hold other `Obj`s, per §4.A's
    /// `has_depth` query — iterables plus the opaque/marker variants.
    pub fn has_depth(&self) -> bool {
        matches!(
            &*self.kind.borrow(),
            ObjKind::Tuple(_)
                | ObjKind::List(_)
                | ObjKind::Set(_)
                | ObjKind::FrozenSet(_)
                | ObjKind::Dict(_)
                | ObjKind::Func { .. }
                | ObjKind::What(_)
                | ObjKind::Split(_)
        )
    }

    pub fn is_what(&self) -> bool {
        matches!(&*self.kind.borrow(), ObjKind::What(_))
    }
}

/// diagnostic name for an `OperKind`, matching spec.md's `op_to_name`.
pub fn op_to_name(op: OperKind) -> &'static str {
    op.name()
}

/// diagnostic name for an `Obj`'s current variant, matching spec.md's
/// `type_to_name`.
pub fn type_to_name(obj: &Obj) -> &'static str {
    obj.type_name()
}

/// upgrades `obj` to a `What` if it is not already one, synthesizing the
/// mandatory `FAKE_INIT` operation whose single argument is the pre-upgrade
/// value. Returns the (possibly newly-wrapped) `What` object — since the
/// upgrade happens in place via `RefCell`, the same `Rc<Obj>` identity is
/// preserved for every existing holder.
pub fn upgrade_to_what(obj: &ObjRef, offset: u64) {
    let already_what = obj.is_what();
    if already_what {
        return;
    }
    // FAKE_INIT's single argument is a fresh Obj carrying the pre-upgrade
    // kind, so `obj` itself becomes the `What` wrapper and its old payload
    // lives on as FAKE_INIT's argument.
    let old_kind = obj.kind.replace(ObjKind::None);
    let pre_upgrade = Obj::new(old_kind, obj.offset);
    let fake_init = Oper::new(OperKind::FakeInit, vec![pre_upgrade], offset);
    *obj.kind.borrow_mut() = ObjKind::What(RefCell::new(vec![fake_init]));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upgrade_synthesizes_fake_init() {
        let obj = Obj::new(ObjKind::Int(42), 0);
        upgrade_to_what(&obj, 10);
        assert!(obj.is_what());
        if let ObjKind::What(ops) = &*obj.kind.borrow() {
            let ops = ops.borrow();
            assert_eq!(ops.len(), 1);
            assert_eq!(ops[0].op, OperKind::FakeInit);
            assert_eq!(ops[0].stack.len(), 1);
            if let ObjKind::Int(v) = &*ops[0].stack[0].kind.borrow() {
                assert_eq!(*v, 42);
            } else {
                panic!("expected Int");
            }
        } else {
            panic!("expected What");
        }
    }

    #[test]
    fn upgrade_is_idempotent_on_already_what() {
        let obj = Obj::new(ObjKind::Int(1), 0);
        upgrade_to_what(&obj, 1);
        upgrade_to_what(&obj, 2);
        if let ObjKind::What(ops) = &*obj.kind.borrow() {
            assert_eq!(ops.borrow().len(), 1);
        } else {
            panic!("expected What");
        }
    }

    #[test]
    fn has_depth_true_for_containers_false_for_scalars() {
        assert!(!Obj::new(ObjKind::Int(1), 0).has_depth());
        assert!(Obj::new(ObjKind::Tuple(vec![]), 0).has_depth());
        assert!(Obj::new(ObjKind::List(RefCell::new(vec![])), 0).has_depth());
    }
}
