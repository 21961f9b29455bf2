use crate::vm::{ConstantValue, VMConstant, VMInstruction};

/// A recovered function prototype: the reconstructor's working buffer and
/// the emitter's direct input. Field names line up with `4.E`'s `Function`
/// layout so the emitter can serialize it without a translation step.
#[derive(Debug, Clone, Default)]
pub struct VMProto {
    pub source: String,
    pub line_defined: u32,
    pub last_line_defined: u32,
    pub num_params: u8,
    pub is_vararg: bool,
    pub code: Vec<VMInstruction>,
    pub constants: Vec<VMConstant>,
    pub max_stack: u8,
}

impl VMProto {
    pub fn new(source: impl Into<String>) -> Self {
        VMProto {
            source: source.into(),
            max_stack: 2,
            ..Default::default()
        }
    }

    pub fn constant_value(&self, pool_index: u32) -> Option<&ConstantValue> {
        self.constants
            .iter()
            .find(|c| c.pool_index == pool_index)
            .map(|c| &c.value)
    }
}
