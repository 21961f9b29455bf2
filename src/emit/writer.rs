//! Serializes a `VMProto` to a Lua 5.3 `.luac` image in a growable buffer.

use crate::emit::encode::encode_instruction;
use crate::emit::header;
use crate::reconstruct::VMProto;
use crate::vm::ConstantValue;
use std::io::{self, Write};

#[derive(Debug, Clone, Default)]
pub struct Emitter {
    buf: Vec<u8>,
}

impl Emitter {
    pub fn new() -> Self {
        Emitter::default()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    fn u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn i64(&mut self, v: i64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn f64(&mut self, v: f64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    /// `size:u8` encoding `len+1`, then raw bytes; empty strings are a
    /// single `0` byte with no payload.
    fn lua_string(&mut self, s: &str) {
        if s.is_empty() {
            self.u8(0);
            return;
        }
        let len = s.len().min(254);
        self.u8((len + 1) as u8);
        self.buf.extend_from_slice(&s.as_bytes()[..len]);
    }

    fn header(&mut self) {
        self.u32(header::MAGIC);
        self.u8(header::VERSION);
        self.u8(header::FORMAT);
        self.buf.extend_from_slice(&header::DATA_MARKER);
        self.buf.extend_from_slice(&header::SIZES);
        self.i64(header::INT_CHECK);
        self.f64(header::NUM_CHECK);
    }

    fn constant(&mut self, value: &ConstantValue) {
        match value {
            ConstantValue::Nil => self.u8(0),
            ConstantValue::Bool(b) => {
                self.u8(1);
                self.u8(*b as u8);
            }
            ConstantValue::Number(crate::vm::LuaNumber::Int(i)) => {
                self.u8(3);
                self.i64(*i);
            }
            ConstantValue::Number(crate::vm::LuaNumber::Float(f)) => {
                self.u8(19);
                self.f64(*f);
            }
            ConstantValue::String(s) => {
                self.u8(4);
                self.lua_string(s);
            }
        }
    }

    fn function(&mut self, proto: &VMProto) {
        self.lua_string(&proto.source);
        self.u32(proto.line_defined);
        self.u32(proto.last_line_defined);
        self.u8(proto.num_params);
        self.u8(proto.is_vararg as u8);
        self.u8(proto.max_stack);

        self.u32(proto.code.len() as u32);
        for instr in &proto.code {
            self.u32(encode_instruction(instr));
        }

        let mut constants: Vec<_> = proto.constants.iter().collect();
        constants.sort_by_key(|c| c.pool_index);
        self.u32(constants.len() as u32);
        for c in constants {
            self.constant(&c.value);
        }

        // No upvalues or nested prototypes: every handler lifts to exactly
        // one flat instruction stream with no closures captured.
        self.u32(0); // upvalues
        self.u32(0); // nested protos

        // debug info: line_info aligned 1:1 with code (handler index as
        // line, matching VMInstruction.line), no locals, no upvalue names.
        self.u32(proto.code.len() as u32);
        for instr in &proto.code {
            self.u32(instr.line);
        }
        self.u32(0); // locals
        self.u32(0); // upvalue names
    }

    pub fn emit(mut self, proto: &VMProto) -> Vec<u8> {
        self.header();
        self.function(proto);
        self.into_bytes()
    }

    pub fn write_to(self, proto: &VMProto, out: &mut impl Write) -> io::Result<()> {
        out.write_all(&self.emit(proto))
    }
}

pub fn emit(proto: &VMProto) -> Vec<u8> {
    Emitter::new().emit(proto)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_function_header_round_trips() {
        let proto = VMProto::new("chunk");
        let bytes = emit(&proto);
        // Lua 5.3's real on-disk signature, `\x1bLua` (lundump.c's
        // LUA_SIGNATURE), spelled out literally so a regression in `MAGIC`
        // can't hide behind re-deriving the same wrong constant.
        assert_eq!(&bytes[0..4], &[0x1B, b'L', b'u', b'a']);
        assert_eq!(bytes[4], header::VERSION);
        assert_eq!(bytes[5], header::FORMAT);
        assert_eq!(&bytes[6..12], &header::DATA_MARKER);
        assert_eq!(&bytes[12..17], &header::SIZES);
        let int_check = i64::from_le_bytes(bytes[17..25].try_into().unwrap());
        assert_eq!(int_check, header::INT_CHECK);
        let num_check = f64::from_le_bytes(bytes[25..33].try_into().unwrap());
        assert_eq!(num_check, header::NUM_CHECK);
    }

    #[test]
    fn empty_string_is_a_single_zero_byte() {
        let mut e = Emitter::new();
        e.lua_string("");
        assert_eq!(e.buf, vec![0]);
    }

    #[test]
    fn nonempty_string_encodes_length_plus_one() {
        let mut e = Emitter::new();
        e.lua_string("hi");
        assert_eq!(e.buf, vec![3, b'h', b'i']);
    }
}
