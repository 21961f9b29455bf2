//! Writes a recovered `VMProto` out as a Lua 5.3 `.luac` image and
//! validates the result reads back with the expected header.

mod encode;
mod header;
mod validate;
mod writer;

pub use encode::{decode_instruction, encode_instruction};
pub use validate::validate;
pub use writer::{emit, Emitter};
