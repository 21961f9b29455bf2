//! Lua 5.3 `.luac` header constants, taken verbatim from `lundump.c` so the
//! emitted file loads in a stock `lua5.3` interpreter.

/// Written little-endian via `u32::to_le_bytes`, so this constant must be
/// the signature's bytes reversed: `\x1bLua` is `[0x1B, 0x4C, 0x75, 0x61]`
/// on disk, which requires `0x61754C1B` here, not the byte sequence itself
/// read as a big-endian number.
pub const MAGIC: u32 = 0x61754C1B;
pub const VERSION: u8 = 0x53;
pub const FORMAT: u8 = 0;
pub const DATA_MARKER: [u8; 6] = [0x19, 0x93, 0x0D, 0x0A, 0x1A, 0x0A];
/// `[int, size_t, Instruction, lua_Integer, lua_Number]`, all in bytes.
pub const SIZES: [u8; 5] = [4, 8, 4, 8, 8];
pub const INT_CHECK: i64 = 0x5678;
pub const NUM_CHECK: f64 = 370.5;
