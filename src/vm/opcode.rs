/// The 47 Lua 5.3 opcodes, in their fixed `lopcodes.h` ordering — this
/// ordinal IS the wire encoding, so the variant order must never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[repr(u8)]
pub enum OpCode {
    Move = 0,
    LoadK = 1,
    LoadKx = 2,
    LoadBool = 3,
    LoadNil = 4,
    GetUpval = 5,
    GetTabUp = 6,
    GetTable = 7,
    SetTabUp = 8,
    SetUpval = 9,
    SetTable = 10,
    NewTable = 11,
    Self_ = 12,
    Add = 13,
    Sub = 14,
    Mul = 15,
    Mod = 16,
    Pow = 17,
    Div = 18,
    IDiv = 19,
    BAnd = 20,
    BOr = 21,
    BXor = 22,
    Shl = 23,
    Shr = 24,
    Unm = 25,
    BNot = 26,
    Not = 27,
    Len = 28,
    Concat = 29,
    Jmp = 30,
    Eq = 31,
    Lt = 32,
    Le = 33,
    Test = 34,
    TestSet = 35,
    Call = 36,
    TailCall = 37,
    Return = 38,
    ForLoop = 39,
    ForPrep = 40,
    TForCall = 41,
    TForLoop = 42,
    SetList = 43,
    Closure = 44,
    Vararg = 45,
    ExtraArg = 46,
}

/// Which fields of the 32-bit instruction word are populated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpMode {
    /// `op, a, b, c`.
    ABC,
    /// `op, a, bx` (unsigned extended operand).
    ABx,
    /// `op, a, sbx` (signed extended operand, bias 131071).
    AsBx,
    /// `op, ax` (26-bit extended operand, no `a`/`b`/`c`).
    Ax,
}

impl OpCode {
    pub fn mode(self) -> OpMode {
        match self {
            OpCode::LoadK | OpCode::LoadKx | OpCode::Closure => OpMode::ABx,
            OpCode::Jmp | OpCode::ForLoop | OpCode::ForPrep | OpCode::TForLoop => OpMode::AsBx,
            OpCode::ExtraArg => OpMode::Ax,
            _ => OpMode::ABC,
        }
    }

    pub fn from_u8(value: u8) -> Option<OpCode> {
        use OpCode::*;
        const TABLE: [OpCode; 47] = [
            Move, LoadK, LoadKx, LoadBool, LoadNil, GetUpval, GetTabUp, GetTable, SetTabUp,
            SetUpval, SetTable, NewTable, Self_, Add, Sub, Mul, Mod, Pow, Div, IDiv, BAnd, BOr,
            BXor, Shl, Shr, Unm, BNot, Not, Len, Concat, Jmp, Eq, Lt, Le, Test, TestSet, Call,
            TailCall, Return, ForLoop, ForPrep, TForCall, TForLoop, SetList, Closure, Vararg,
            ExtraArg,
        ];
        TABLE.get(value as usize).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinal_round_trips() {
        for op in 0u8..47 {
            let code = OpCode::from_u8(op).unwrap();
            assert_eq!(code as u8, op);
        }
    }

    #[test]
    fn extended_operand_families_are_exact() {
        assert_eq!(OpCode::LoadK.mode(), OpMode::ABx);
        assert_eq!(OpCode::LoadKx.mode(), OpMode::ABx);
        assert_eq!(OpCode::Closure.mode(), OpMode::ABx);
        assert_eq!(OpCode::Jmp.mode(), OpMode::AsBx);
        assert_eq!(OpCode::ForLoop.mode(), OpMode::AsBx);
        assert_eq!(OpCode::ForPrep.mode(), OpMode::AsBx);
        assert_eq!(OpCode::TForLoop.mode(), OpMode::AsBx);
        assert_eq!(OpCode::ExtraArg.mode(), OpMode::Ax);
        assert_eq!(OpCode::Move.mode(), OpMode::ABC);
        assert_eq!(OpCode::Call.mode(), OpMode::ABC);
    }
}
