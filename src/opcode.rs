// SPDX-License-Identifier: Apache-2.0
//
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

//! Pickle opcode table.
//!
//! source: <https://github.com/python/cpython/blob/main/Lib/pickletools.py>

use phf::phf_map;

/// every opcode byte this crate can name, whether or not the interpreter
/// implements semantics for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpCode {
    Mark,           // 0x28 (
    Stop,           // 0x2e .
    Pop,            // 0x30 0
    PopMark,        // 0x31 1
    Dup,            // 0x32 2
    Float,          // 0x46 F
    Int,            // 0x49 I
    BinInt,         // 0x4a J
    BinInt1,        // 0x4b K
    Long,           // 0x4c L
    BinInt2,        // 0x4d M
    None,           // 0x4e N
    PersId,         // 0x50 P
    BinPersId,      // 0x51 Q
    Reduce,         // 0x52 R
    String,         // 0x53 S
    BinString,      // 0x54 T
    ShortBinString, // 0x55 U
    Unicode,        // 0x56 V
    BinUnicode,     // 0x58 X
    Append,         // 0x61 a
    Build,          // 0x62 b
    Global,         // 0x63 c
    Dict,           // 0x64 d
    Appends,        // 0x65 e
    Get,            // 0x67 g
    BinGet,         // 0x68 h
    Inst,           // 0x69 i
    LongBinGet,     // 0x6a j
    List,           // 0x6c l
    Obj,            // 0x6f o
    Put,            // 0x70 p
    BinPut,         // 0x71 q
    LongBinPut,     // 0x72 r
    SetItem,        // 0x73 s
    Tuple,          // 0x74 t
    SetItems,       // 0x75 u
    BinFloat,       // 0x47 G
    EmptyDict,      // 0x7d }
    EmptyList,      // 0x5d ]
    EmptyTuple,     // 0x29 )
    BinBytes,       // 0x42 B
    ShortBinBytes,  // 0x43 C
    Proto,          // 0x80
    NewObj,         // 0x81
    Ext1,           // 0x82
    Ext2,           // 0x83
    Ext4,           // 0x84
    Tuple1,         // 0x85
    Tuple2,         // 0x86
    Tuple3,         // 0x87
    NewTrue,        // 0x88
    NewFalse,       // 0x89
    Long1,          // 0x8a
    Long4,          // 0x8b
    ShortBinUnicode,// 0x8c
    BinUnicode8,    // 0x8d
    BinBytes8,      // 0x8e
    EmptySet,       // 0x8f
    AddItems,       // 0x90
    FrozenSet,      // 0x91
    NewObjEx,       // 0x92
    StackGlobal,    // 0x93
    Memoize,        // 0x94
    Frame,          // 0x95
    ByteArray8,     // 0x96
    NextBuffer,     // 0x97
    ReadOnlyBuffer, // 0x98
}

impl OpCode {
    pub fn as_u8(self) -> u8 {
        use OpCode::*;
        match self {
            Mark => 0x28,
            Stop => 0x2e,
            Pop => 0x30,
            PopMark => 0x31,
            Dup => 0x32,
            Float => 0x46,
            BinFloat => 0x47,
            Int => 0x49,
            BinInt => 0x4a,
            BinInt1 => 0x4b,
            Long => 0x4c,
            BinInt2 => 0x4d,
            None => 0x4e,
            PersId => 0x50,
            BinPersId => 0x51,
            Reduce => 0x52,
            String => 0x53,
            BinString => 0x54,
            ShortBinString => 0x55,
            Unicode => 0x56,
            BinUnicode => 0x58,
            EmptyTuple => 0x29,
            BinBytes => 0x42,
            ShortBinBytes => 0x43,
            Append => 0x61,
            Build => 0x62,
            Global => 0x63,
            Dict => 0x64,
            Appends => 0x65,
            Get => 0x67,
            BinGet => 0x68,
            Inst => 0x69,
            LongBinGet => 0x6a,
            List => 0x6c,
            Obj => 0x6f,
            Put => 0x70,
            BinPut => 0x71,
            LongBinPut => 0x72,
            SetItem => 0x73,
            Tuple => 0x74,
            SetItems => 0x75,
            EmptyDict => 0x7d,
            EmptyList => 0x5d,
            Proto => 0x80,
            NewObj => 0x81,
            Ext1 => 0x82,
            Ext2 => 0x83,
            Ext4 => 0x84,
            Tuple1 => 0x85,
            Tuple2 => 0x86,
            Tuple3 => 0x87,
            NewTrue => 0x88,
            NewFalse => 0x89,
            Long1 => 0x8a,
            Long4 => 0x8b,
            ShortBinUnicode => 0x8c,
            BinUnicode8 => 0x8d,
            BinBytes8 => 0x8e,
            EmptySet => 0x8f,
            AddItems => 0x90,
            FrozenSet => 0x91,
            NewObjEx => 0x92,
            StackGlobal => 0x93,
            Memoize => 0x94,
            Frame => 0x95,
            ByteArray8 => 0x96,
            NextBuffer => 0x97,
            ReadOnlyBuffer => 0x98,
        }
    }

    /// short mnemonic name, the way `pickletools.py` names them.
    pub fn name(self) -> &'static str {
        use OpCode::*;
        match self {
            Mark => "MARK",
            Stop => "STOP",
            Pop => "POP",
            PopMark => "POP_MARK",
            Dup => "DUP",
            Float => "FLOAT",
            BinFloat => "BINFLOAT",
            Int => "INT",
            BinInt => "BININT",
            BinInt1 => "BININT1",
            Long => "LONG",
            BinInt2 => "BININT2",
            None => "NONE",
            PersId => "PERSID",
            BinPersId => "BINPERSID",
            Reduce => "REDUCE",
            String => "STRING",
            BinString => "BINSTRING",
            ShortBinString => "SHORT_BINSTRING",
            Unicode => "UNICODE",
            BinUnicode => "BINUNICODE",
            EmptyTuple => "EMPTY_TUPLE",
            BinBytes => "BINBYTES",
            ShortBinBytes => "SHORT_BINBYTES",
            Append => "APPEND",
            Build => "BUILD",
            Global => "GLOBAL",
            Dict => "DICT",
            Appends => "APPENDS",
            Get => "GET",
            BinGet => "BINGET",
            Inst => "INST",
            LongBinGet => "LONG_BINGET",
            List => "LIST",
            Obj => "OBJ",
            Put => "PUT",
            BinPut => "BINPUT",
            LongBinPut => "LONG_BINPUT",
            SetItem => "SETITEM",
            Tuple => "TUPLE",
            SetItems => "SETITEMS",
            EmptyDict => "EMPTY_DICT",
            EmptyList => "EMPTY_LIST",
            Proto => "PROTO",
            NewObj => "NEWOBJ",
            Ext1 => "EXT1",
            Ext2 => "EXT2",
            Ext4 => "EXT4",
            Tuple1 => "TUPLE1",
            Tuple2 => "TUPLE2",
            Tuple3 => "TUPLE3",
            NewTrue => "NEWTRUE",
            NewFalse => "NEWFALSE",
            Long1 => "LONG1",
            Long4 => "LONG4",
            ShortBinUnicode => "SHORT_BINUNICODE",
            BinUnicode8 => "BINUNICODE8",
            BinBytes8 => "BINBYTES8",
            EmptySet => "EMPTY_SET",
            AddItems => "ADDITEMS",
            FrozenSet => "FROZENSET",
            NewObjEx => "NEWOBJ_EX",
            StackGlobal => "STACK_GLOBAL",
            Memoize => "MEMOIZE",
            Frame => "FRAME",
            ByteArray8 => "BYTEARRAY8",
            NextBuffer => "NEXT_BUFFER",
            ReadOnlyBuffer => "READONLY_BUFFER",
        }
    }
}

/// opcodes legal for a given protocol version, lowest protocol first.
/// each table is additive over the previous protocol's, mirroring
/// `pickletools.py`'s per-opcode `proto` field.
pub static PICKLE_OPCODES: phf::Map<u8, &'static [OpCode]> = phf_map! {
    0_u8 => &[
        OpCode::Mark, OpCode::Stop, OpCode::Pop, OpCode::PopMark, OpCode::Dup,
        OpCode::Float, OpCode::Int, OpCode::Long, OpCode::None, OpCode::PersId,
        OpCode::Reduce, OpCode::String, OpCode::Unicode, OpCode::Append,
        OpCode::Build, OpCode::Global, OpCode::Dict, OpCode::Get, OpCode::Inst,
        OpCode::List, OpCode::Obj, OpCode::Put, OpCode::SetItem, OpCode::Tuple,
    ],
    1_u8 => &[
        OpCode::Mark, OpCode::Stop, OpCode::Pop, OpCode::PopMark, OpCode::Dup,
        OpCode::Float, OpCode::Int, OpCode::Long, OpCode::None, OpCode::PersId,
        OpCode::Reduce, OpCode::String, OpCode::Unicode, OpCode::Append,
        OpCode::Build, OpCode::Global, OpCode::Dict, OpCode::Get, OpCode::Inst,
        OpCode::List, OpCode::Obj, OpCode::Put, OpCode::SetItem, OpCode::Tuple,
        OpCode::BinPersId, OpCode::BinString, OpCode::ShortBinString,
        OpCode::BinUnicode, OpCode::BinInt, OpCode::BinInt1, OpCode::BinInt2,
        OpCode::BinFloat, OpCode::EmptyDict, OpCode::EmptyList, OpCode::Appends,
        OpCode::SetItems, OpCode::BinGet, OpCode::LongBinGet, OpCode::BinPut,
        OpCode::LongBinPut,
    ],
    2_u8 => &[
        OpCode::Mark, OpCode::Stop, OpCode::Pop, OpCode::PopMark, OpCode::Dup,
        OpCode::Float, OpCode::Int, OpCode::Long, OpCode::None, OpCode::PersId,
        OpCode::Reduce, OpCode::String, OpCode::Unicode, OpCode::Append,
        OpCode::Build, OpCode::Global, OpCode::Dict, OpCode::Get, OpCode::Inst,
        OpCode::List, OpCode::Obj, OpCode::Put, OpCode::SetItem, OpCode::Tuple,
        OpCode::BinPersId, OpCode::BinString, OpCode::ShortBinString,
        OpCode::BinUnicode, OpCode::BinInt, OpCode::BinInt1, OpCode::BinInt2,
        OpCode::BinFloat, OpCode::EmptyDict, OpCode::EmptyList, OpCode::Appends,
        OpCode::SetItems, OpCode::BinGet, OpCode::LongBinGet, OpCode::BinPut,
        OpCode::LongBinPut, OpCode::Proto, OpCode::NewObj, OpCode::Ext1,
        OpCode::Ext2, OpCode::Ext4, OpCode::Tuple1, OpCode::Tuple2,
        OpCode::Tuple3, OpCode::NewTrue, OpCode::NewFalse, OpCode::Long1,
        OpCode::Long4,
    ],
    3_u8 => &[
        OpCode::Mark, OpCode::Stop, OpCode::Pop, OpCode::PopMark, OpCode::Dup,
        OpCode::Float, OpCode::Int, OpCode::Long, OpCode::None, OpCode::PersId,
        OpCode::Reduce, OpCode::String, OpCode::Unicode, OpCode::Append,
        OpCode::Build, OpCode::Global, OpCode::Dict, OpCode::Get, OpCode::Inst,
        OpCode::List, OpCode::Obj, OpCode::Put, OpCode::SetItem, OpCode::Tuple,
        OpCode::BinPersId, OpCode::BinString, OpCode::ShortBinString,
        OpCode::BinUnicode, OpCode::BinInt, OpCode::BinInt1, OpCode::BinInt2,
        OpCode::BinFloat, OpCode::EmptyDict, OpCode::EmptyList, OpCode::Appends,
        OpCode::SetItems, OpCode::BinGet, OpCode::LongBinGet, OpCode::BinPut,
        OpCode::LongBinPut, OpCode::Proto, OpCode::NewObj, OpCode::Ext1,
        OpCode::Ext2, OpCode::Ext4, OpCode::Tuple1, OpCode::Tuple2,
        OpCode::Tuple3, OpCode::NewTrue, OpCode::NewFalse, OpCode::Long1,
        OpCode::Long4, OpCode::BinBytes, OpCode::ShortBinBytes,
    ],
    4_u8 => &[
        OpCode::Mark, OpCode::Stop, OpCode::Pop, OpCode::PopMark, OpCode::Dup,
        OpCode::Float, OpCode::Int, OpCode::Long, OpCode::None, OpCode::PersId,
        OpCode::Reduce, OpCode::String, OpCode::Unicode, OpCode::Append,
        OpCode::Build, OpCode::Global, OpCode::Dict, OpCode::Get, OpCode::Inst,
        OpCode::List, OpCode::Obj, OpCode::Put, OpCode::SetItem, OpCode::Tuple,
        OpCode::BinPersId, OpCode::BinString, OpCode::ShortBinString,
        OpCode::BinUnicode, OpCode::BinInt, OpCode::BinInt1, OpCode::BinInt2,
        OpCode::BinFloat, OpCode::EmptyDict, OpCode::EmptyList, OpCode::Appends,
        OpCode::SetItems, OpCode::BinGet, OpCode::LongBinGet, OpCode::BinPut,
        OpCode::LongBinPut, OpCode::Proto, OpCode::NewObj, OpCode::Ext1,
        OpCode::Ext2, OpCode::Ext4, OpCode::Tuple1, OpCode::Tuple2,
        OpCode::Tuple3, OpCode::NewTrue, OpCode::NewFalse, OpCode::Long1,
        OpCode::Long4, OpCode::BinBytes, OpCode::ShortBinBytes,
        OpCode::ShortBinUnicode, OpCode::BinUnicode8, OpCode::BinBytes8,
        OpCode::EmptySet, OpCode::AddItems, OpCode::FrozenSet, OpCode::NewObjEx,
        OpCode::StackGlobal, OpCode::Memoize, OpCode::Frame,
    ],
    5_u8 => &[
        OpCode::Mark, OpCode::Stop, OpCode::Pop, OpCode::PopMark, OpCode::Dup,
        OpCode::Float, OpCode::Int, OpCode::Long, OpCode::None, OpCode::PersId,
        OpCode::Reduce, OpCode::String, OpCode::Unicode, OpCode::Append,
        OpCode::Build, OpCode::Global, OpCode::Dict, OpCode::Get, OpCode::Inst,
        OpCode::List, OpCode::Obj, OpCode::Put, OpCode::SetItem, OpCode::Tuple,
        OpCode::BinPersId, OpCode::BinString, OpCode::ShortBinString,
        OpCode::BinUnicode, OpCode::BinInt, OpCode::BinInt1, OpCode::BinInt2,
        OpCode::BinFloat, OpCode::EmptyDict, OpCode::EmptyList, OpCode::Appends,
        OpCode::SetItems, OpCode::BinGet, OpCode::LongBinGet, OpCode::BinPut,
        OpCode::LongBinPut, OpCode::Proto, OpCode::NewObj, OpCode::Ext1,
        OpCode::Ext2, OpCode::Ext4, OpCode::Tuple1, OpCode::Tuple2,
        OpCode::Tuple3, OpCode::NewTrue, OpCode::NewFalse, OpCode::Long1,
        OpCode::Long4, OpCode::BinBytes, OpCode::ShortBinBytes,
        OpCode::ShortBinUnicode, OpCode::BinUnicode8, OpCode::BinBytes8,
        OpCode::EmptySet, OpCode::AddItems, OpCode::FrozenSet, OpCode::NewObjEx,
        OpCode::StackGlobal, OpCode::Memoize, OpCode::Frame,
        OpCode::ByteArray8, OpCode::NextBuffer, OpCode::ReadOnlyBuffer,
    ],
};

/// find the `OpCode` for a raw byte under a given protocol, if legal.
pub fn lookup(proto: u8, byte: u8) -> Option<OpCode> {
    let table = PICKLE_OPCODES.get(&proto.min(5))?;
    table.iter().copied().find(|op| op.as_u8() == byte)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_every_byte() {
        for (_, ops) in PICKLE_OPCODES.entries() {
            for op in ops.iter() {
                assert_eq!(lookup(5, op.as_u8()), Some(*op));
            }
        }
    }

    #[test]
    fn protocol_zero_excludes_binary_opcodes() {
        assert_eq!(lookup(0, OpCode::BinInt.as_u8()), None);
        assert!(lookup(0, OpCode::Mark.as_u8()).is_some());
    }

    #[test]
    fn unknown_byte_is_none() {
        assert_eq!(lookup(5, 0xff), None);
    }
}
