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

//! The external decoder contract, and a reference implementation over an
//! in-memory byte slice.
//!
//! The interpreter never touches raw bytes directly — it asks a
//! [`Disassembler`] to decode the opcode at an offset, and a [`HostIo`] to
//! fetch long string payloads. A host embedding this crate (a disassembler
//! framework, a debugger) can supply its own implementations; [`SliceDisassembler`]
//! and [`SliceHost`] exist so the crate is runnable standalone.

use crate::error::{DecompileError, Result};
use crate::opcode::{lookup, OpCode};

/// payloads longer than this are reported by pointer/length rather than
/// inlined into the decoded op, mirroring `get_big_str`'s threshold.
pub const BIG_STR_THRESHOLD: usize = 80;

/// one decoded pickle instruction.
#[derive(Debug, Clone)]
pub struct DecodedOp {
    pub code: OpCode,
    pub mnemonic: &'static str,
    pub offset: u64,
    /// total bytes this instruction occupies, including the opcode byte.
    pub len: usize,
    /// generic immediate value: ints, lengths, protocol numbers, memo ids.
    pub value: i64,
    /// first textual argument (e.g. GLOBAL's module, INST's module, PERSID's id).
    pub text: Option<String>,
    /// second textual argument (e.g. GLOBAL's qualname).
    pub text2: Option<String>,
    /// payload bytes, when short enough to inline (<= BIG_STR_THRESHOLD).
    pub bytes: Option<Vec<u8>>,
    /// (offset, length) of a payload too long to inline.
    pub ptr: Option<(u64, usize)>,
}

impl DecodedOp {
    fn simple(code: OpCode, offset: u64) -> Self {
        DecodedOp {
            mnemonic: code.name(),
            code,
            offset,
            len: 1,
            value: 0,
            text: None,
            text2: None,
            bytes: None,
            ptr: None,
        }
    }
}

/// turns a byte offset into a decoded opcode. Implemented here over an
/// in-memory slice; a host disassembler may implement this over its own
/// address space instead.
pub trait Disassembler {
    fn decode(&self, proto: u8, offset: u64) -> Result<DecodedOp>;
}

/// fetches raw bytes at an offset, used for payloads the decoder reports
/// by pointer rather than inlining.
pub trait HostIo {
    fn read_at(&self, offset: u64, len: usize) -> Result<Vec<u8>>;
}

/// decodes `LONG1`/`LONG4`'s payload the way Python's `decode_long` does:
/// little-endian, two's-complement, sign-extended from the MSB of the last
/// byte. An empty payload is `0`.
fn decode_long(bytes: &[u8]) -> i64 {
    if bytes.is_empty() {
        return 0;
    }
    let mut value: i128 = 0;
    for (i, &b) in bytes.iter().enumerate() {
        value |= (b as i128) << (8 * i);
    }
    let nbits = bytes.len() * 8;
    if nbits < 128 && (bytes[bytes.len() - 1] & 0x80) != 0 {
        value -= 1i128 << nbits;
    }
    value as i64
}

/// reference [`Disassembler`] over a `&[u8]` buffer.
pub struct SliceDisassembler<'a> {
    buf: &'a [u8],
}

impl<'a> SliceDisassembler<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        SliceDisassembler { buf }
    }

    fn byte_at(&self, offset: u64) -> Result<u8> {
        self.buf
            .get(offset as usize)
            .copied()
            .ok_or_else(|| DecompileError::Decode {
                offset,
                mnemonic: "<eof>".to_string(),
            })
    }

    fn slice(&self, offset: u64, len: usize) -> Result<&'a [u8]> {
        let start = offset as usize;
        let end = start
            .checked_add(len)
            .ok_or_else(|| DecompileError::Decode {
                offset,
                mnemonic: "<overflow>".to_string(),
            })?;
        self.buf.get(start..end).ok_or_else(|| DecompileError::Decode {
            offset,
            mnemonic: "<truncated>".to_string(),
        })
    }

    fn read_line(&self, offset: u64) -> Result<(&'a [u8], usize)> {
        let start = offset as usize;
        let rest = self.buf.get(start..).ok_or_else(|| DecompileError::Decode {
            offset,
            mnemonic: "<eof>".to_string(),
        })?;
        let nl = rest
            .iter()
            .position(|&b| b == b'\n')
            .ok_or_else(|| DecompileError::Decode {
                offset,
                mnemonic: "<unterminated line>".to_string(),
            })?;
        Ok((&rest[..nl], nl + 1))
    }

    fn text_arg(&self, offset: u64) -> Result<(String, usize)> {
        let (line, consumed) = self.read_line(offset)?;
        Ok((String::from_utf8_lossy(line).into_owned(), consumed))
    }

    fn le_u32(&self, offset: u64) -> Result<u32> {
        let s = self.slice(offset, 4)?;
        Ok(u32::from_le_bytes([s[0], s[1], s[2], s[3]]))
    }

    fn le_u64(&self, offset: u64) -> Result<u64> {
        let s = self.slice(offset, 8)?;
        let mut arr = [0u8; 8];
        arr.copy_from_slice(s);
        Ok(u64::from_le_bytes(arr))
    }

    fn payload(&self, mut op: DecodedOp, data_off: u64, data_len: usize) -> Result<DecodedOp> {
        if data_len > BIG_STR_THRESHOLD {
            op.ptr = Some((data_off, data_len));
        } else {
            op.bytes = Some(self.slice(data_off, data_len)?.to_vec());
        }
        op.len = (data_off - op.offset) as usize + data_len;
        Ok(op)
    }
}

impl<'a> Disassembler for SliceDisassembler<'a> {
    fn decode(&self, proto: u8, offset: u64) -> Result<DecodedOp> {
        let byte = self.byte_at(offset)?;
        let code = lookup(proto, byte).ok_or_else(|| DecompileError::Decode {
            offset,
            mnemonic: format!("<illegal opcode {byte:#04x}>"),
        })?;
        let mut op = DecodedOp::simple(code, offset);

        use OpCode::*;
        match code {
            Mark | Stop | Pop | PopMark | Dup | None | NewTrue | NewFalse | EmptyDict
            | EmptyList | EmptyTuple | EmptySet | Append | Appends | Build | Dict | List
            | Obj | SetItem | SetItems | Tuple | Tuple1 | Tuple2 | Tuple3 | Reduce | AddItems
            | FrozenSet | NewObj | NewObjEx | StackGlobal | Memoize | BinPersId
            | NextBuffer | ReadOnlyBuffer => {
                op.len = 1;
            }
            Int | Long => {
                let (text, consumed) = self.text_arg(offset + 1)?;
                let trimmed = text.trim_end_matches('L');
                op.value = trimmed.parse::<i64>().unwrap_or(0);
                op.text = Some(text);
                op.len = 1 + consumed;
            }
            Float | Unicode | String => {
                let (text, consumed) = self.text_arg(offset + 1)?;
                op.text = Some(text);
                op.len = 1 + consumed;
            }
            Get | Put | PersId => {
                let (text, consumed) = self.text_arg(offset + 1)?;
                op.value = text.trim().parse::<i64>().unwrap_or(0);
                op.text = Some(text);
                op.len = 1 + consumed;
            }
            BinInt => {
                let v = self.le_u32(offset + 1)?;
                op.value = v as i32 as i64;
                op.len = 5;
            }
            BinInt1 => {
                op.value = self.byte_at(offset + 1)? as i64;
                op.len = 2;
            }
            BinInt2 => {
                let s = self.slice(offset + 1, 2)?;
                op.value = u16::from_le_bytes([s[0], s[1]]) as i64;
                op.len = 3;
            }
            BinFloat => {
                let s = self.slice(offset + 1, 8)?;
                let mut arr = [0u8; 8];
                arr.copy_from_slice(s);
                op.value = f64::from_be_bytes(arr).to_bits() as i64;
                op.len = 9;
            }
            Long1 => {
                let n = self.byte_at(offset + 1)? as usize;
                let data_off = offset + 2;
                op.value = decode_long(self.slice(data_off, n)?);
                op = self.payload(op, data_off, n)?;
            }
            Long4 => {
                let n = self.le_u32(offset + 1)? as usize;
                let data_off = offset + 5;
                op.value = decode_long(self.slice(data_off, n)?);
                op = self.payload(op, data_off, n)?;
            }
            BinGet => {
                op.value = self.byte_at(offset + 1)? as i64;
                op.len = 2;
            }
            LongBinGet => {
                op.value = self.le_u32(offset + 1)? as i64;
                op.len = 5;
            }
            BinPut => {
                op.value = self.byte_at(offset + 1)? as i64;
                op.len = 2;
            }
            LongBinPut => {
                op.value = self.le_u32(offset + 1)? as i64;
                op.len = 5;
            }
            Proto => {
                op.value = self.byte_at(offset + 1)? as i64;
                op.len = 2;
            }
            Frame => {
                op.value = self.le_u64(offset + 1)? as i64;
                op.len = 9;
            }
            Ext1 => {
                op.value = self.byte_at(offset + 1)? as i64;
                op.len = 2;
            }
            Ext2 => {
                let s = self.slice(offset + 1, 2)?;
                op.value = u16::from_le_bytes([s[0], s[1]]) as i64;
                op.len = 3;
            }
            Ext4 => {
                op.value = self.le_u32(offset + 1)? as i64;
                op.len = 5;
            }
            ShortBinString | ShortBinUnicode | ShortBinBytes => {
                let n = self.byte_at(offset + 1)? as usize;
                op = self.payload(op, offset + 2, n)?;
            }
            BinString | BinUnicode | BinBytes => {
                let n = self.le_u32(offset + 1)? as usize;
                op = self.payload(op, offset + 5, n)?;
            }
            BinUnicode8 | BinBytes8 | ByteArray8 => {
                let n = self.le_u64(offset + 1)? as usize;
                op = self.payload(op, offset + 9, n)?;
            }
            Global | Inst => {
                let (module, c1) = self.text_arg(offset + 1)?;
                let (qualname, c2) = self.text_arg(offset + 1 + c1 as u64)?;
                op.text = Some(module);
                op.text2 = Some(qualname);
                op.len = 1 + c1 + c2;
            }
        }

        Ok(op)
    }
}

/// reference [`HostIo`] over a `&[u8]` buffer.
pub struct SliceHost<'a> {
    buf: &'a [u8],
}

impl<'a> SliceHost<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        SliceHost { buf }
    }
}

impl<'a> HostIo for SliceHost<'a> {
    fn read_at(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let start = offset as usize;
        let end = start
            .checked_add(len)
            .ok_or_else(|| DecompileError::Decode {
                offset,
                mnemonic: "<overflow>".to_string(),
            })?;
        self.buf
            .get(start..end)
            .map(|s| s.to_vec())
            .ok_or_else(|| DecompileError::Decode {
                offset,
                mnemonic: "<truncated read>".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_proto_and_stop() {
        let buf = [0x80, 0x04, b'.'];
        let d = SliceDisassembler::new(&buf);
        let op = d.decode(4, 0).unwrap();
        assert_eq!(op.code, OpCode::Proto);
        assert_eq!(op.value, 4);
        assert_eq!(op.len, 2);

        let op2 = d.decode(4, 2).unwrap();
        assert_eq!(op2.code, OpCode::Stop);
        assert_eq!(op2.len, 1);
    }

    #[test]
    fn decodes_short_binunicode_inline() {
        let mut buf = vec![0x8c, 5];
        buf.extend_from_slice(b"hello");
        let d = SliceDisassembler::new(&buf);
        let op = d.decode(4, 0).unwrap();
        assert_eq!(op.code, OpCode::ShortBinUnicode);
        assert_eq!(op.bytes.as_deref(), Some(b"hello".as_slice()));
        assert_eq!(op.len, 7);
    }

    #[test]
    fn long_string_reports_pointer_not_inline() {
        let payload = vec![b'x'; 200];
        let mut buf = vec![0x58]; // BINUNICODE
        buf.extend_from_slice(&(200u32).to_le_bytes());
        buf.extend_from_slice(&payload);
        let d = SliceDisassembler::new(&buf);
        let op = d.decode(4, 0).unwrap();
        assert_eq!(op.code, OpCode::BinUnicode);
        assert!(op.bytes.is_none());
        assert_eq!(op.ptr, Some((5, 200)));
    }

    #[test]
    fn global_reads_two_lines() {
        let mut buf = Vec::new();
        buf.push(b'c');
        buf.extend_from_slice(b"builtins\n");
        buf.extend_from_slice(b"dict\n");
        let d = SliceDisassembler::new(&buf);
        let op = d.decode(2, 0).unwrap();
        assert_eq!(op.text.as_deref(), Some("builtins"));
        assert_eq!(op.text2.as_deref(), Some("dict"));
    }

    #[test]
    fn illegal_opcode_is_decode_error() {
        let buf = [0xffu8];
        let d = SliceDisassembler::new(&buf);
        assert!(d.decode(5, 0).is_err());
    }

    #[test]
    fn long1_decodes_value_not_byte_count() {
        // LONG1, 2-byte payload, little-endian 1000 = 0x03e8 -> bytes [e8, 03].
        let buf = [0x8a, 2, 0xe8, 0x03];
        let d = SliceDisassembler::new(&buf);
        let op = d.decode(5, 0).unwrap();
        assert_eq!(op.code, OpCode::Long1);
        assert_eq!(op.value, 1000);
        assert_eq!(op.len, 4);
    }

    #[test]
    fn long1_decodes_negative_value() {
        // -1 as a single byte is 0xff.
        let buf = [0x8a, 1, 0xff];
        let d = SliceDisassembler::new(&buf);
        let op = d.decode(5, 0).unwrap();
        assert_eq!(op.value, -1);
    }

    #[test]
    fn long4_decodes_value_not_byte_count() {
        let buf = [0x8b, 2, 0, 0, 0, 0xe8, 0x03];
        let d = SliceDisassembler::new(&buf);
        let op = d.decode(5, 0).unwrap();
        assert_eq!(op.code, OpCode::Long4);
        assert_eq!(op.value, 1000);
    }

    #[test]
    fn long1_empty_payload_is_zero() {
        let buf = [0x8a, 0];
        let d = SliceDisassembler::new(&buf);
        let op = d.decode(5, 0).unwrap();
        assert_eq!(op.value, 0);
    }

    #[test]
    fn host_reads_pointer_payload() {
        let payload = vec![b'y'; 120];
        let host = SliceHost::new(&payload);
        let got = host.read_at(10, 50).unwrap();
        assert_eq!(got.len(), 50);
        assert_eq!(got[0], b'y');
    }
}
