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

//! The pickle machine's registers: the evaluation stack, the mark
//! meta-stack, the discard pile, and the memo table.

use std::collections::BTreeMap;

use crate::config::Config;
use crate::error::Result;
use crate::value::ObjRef;

/// `PMState` — the stack machine's full mutable state.
pub struct MachineState {
    /// the main evaluation stack.
    pub stack: Vec<ObjRef>,
    /// pushed whenever `MARK` fires; bounds mark-delimited constructors.
    pub metastack: Vec<Vec<ObjRef>>,
    /// objects discarded by `POP`/`POP_MARK`, kept for diagnostics.
    pub popstack: Vec<ObjRef>,
    /// the pickle memo table.
    pub memo: BTreeMap<u64, ObjRef>,
    /// next free memo slot for `MEMOIZE`.
    pub memo_next: u64,
    /// current decode cursor.
    pub offset: u64,
    pub start: u64,
    pub end: Option<u64>,
    /// protocol version, once a `PROTO` opcode has been observed.
    pub ver: Option<u8>,
    /// monotonic generation counter for cycle-breaking traversals.
    pub recurse: u64,
    /// set once `STOP` is reached and honored.
    pub break_on_stop: bool,
    pub verbose: bool,
}

impl MachineState {
    /// validates the config (architecture must be `pickle`) and returns a
    /// freshly initialized machine positioned at `config.start`.
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;
        Ok(MachineState {
            stack: Vec::new(),
            metastack: Vec::new(),
            popstack: Vec::new(),
            memo: BTreeMap::new(),
            memo_next: 0,
            offset: config.start,
            start: config.start,
            end: config.end,
            ver: None,
            recurse: 0,
            break_on_stop: true,
            verbose: config.verbose,
        })
    }

    /// bumps and returns the generation counter, to mark the start of a
    /// new cycle-breaking traversal.
    pub fn next_generation(&mut self) -> u64 {
        self.recurse += 1;
        self.recurse
    }

    pub fn memoize(&mut self, obj: ObjRef) {
        let slot = self.memo_next;
        self.memo_next += 1;
        self.put_memo(slot, obj);
    }

    pub fn put_memo(&mut self, slot: u64, obj: ObjRef) {
        if obj.memo_id.get().is_none() {
            obj.memo_id.set(Some(slot));
        }
        obj.bump_refcnt();
        self.memo.insert(slot, obj);
        if slot >= self.memo_next {
            self.memo_next = slot + 1;
        }
    }

    pub fn get_memo(&self, slot: u64) -> Option<ObjRef> {
        self.memo.get(&slot).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Obj, ObjKind};

    #[test]
    fn new_state_has_empty_registers() {
        let st = MachineState::new(&Config::default()).unwrap();
        assert!(st.stack.is_empty());
        assert!(st.metastack.is_empty());
        assert!(st.popstack.is_empty());
        assert!(st.memo.is_empty());
    }

    #[test]
    fn rejects_wrong_arch() {
        let cfg = Config::new("x86", false, 0, None);
        assert!(MachineState::new(&cfg).is_err());
    }

    #[test]
    fn memoize_assigns_sequential_slots() {
        let mut st = MachineState::new(&Config::default()).unwrap();
        let a = Obj::new(ObjKind::Int(1), 0);
        let b = Obj::new(ObjKind::Int(2), 1);
        st.memoize(a.clone());
        st.memoize(b.clone());
        assert_eq!(a.memo_id.get(), Some(0));
        assert_eq!(b.memo_id.get(), Some(1));
        assert!(rc_ptr_eq(&st.get_memo(0).unwrap(), &a));
    }

    fn rc_ptr_eq(a: &ObjRef, b: &ObjRef) -> bool {
        std::rc::Rc::ptr_eq(a, b)
    }
}
