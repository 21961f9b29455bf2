//! Lifts analyzed VM handlers to a `VMProto` instruction list and runs the
//! fixed-point peephole passes over it.

mod lift;
mod peephole;
mod proto;

pub use lift::lift_handler;
pub use peephole::{optimize, PeepholePass};
pub use proto::VMProto;

use crate::vm::VmContext;
use crate::Stats;

/// Builds a `VMProto` from analyzed context: handlers sorted by index,
/// lifted in order, then optimized to a fixed point.
pub fn reconstruct(ctx: &VmContext, source_name: &str, stats: &mut Stats) -> VMProto {
    let mut proto = VMProto::new(source_name);
    proto.constants = ctx.constants.clone();

    let mut handlers: Vec<_> = ctx.handlers.iter().collect();
    handlers.sort_by_key(|h| h.index);

    for handler in handlers {
        let lifted = lift_handler(handler);
        if lifted.len() == 1 && lifted[0].opcode == crate::vm::OpCode::Move && handler.opcode.is_none()
        {
            stats.warn(format!(
                "handler #{}: no recognizable body, emitted MOVE 0 0 0",
                handler.index
            ));
        }
        proto.code.extend(lifted);
        stats.handlers_processed += 1;
    }
    stats.instructions_reconstructed = proto.code.len();

    optimize(&mut proto);
    proto
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::{AnalyzerStats, OpCode, VMHandler};

    #[test]
    fn reconstructs_and_orders_by_handler_index() {
        let ctx = VmContext {
            handlers: vec![
                VMHandler {
                    index: 1,
                    opcode: None,
                    body_code: "R[2] = R[3]".into(),
                    encrypted: false,
                    decrypted_code: None,
                },
                VMHandler {
                    index: 0,
                    opcode: None,
                    body_code: "R[0] = R[1]".into(),
                    encrypted: false,
                    decrypted_code: None,
                },
            ],
            constants: vec![],
            encryption: None,
            stats: AnalyzerStats::default(),
            decrypt_report: Default::default(),
        };
        let mut stats = Stats::default();
        let proto = reconstruct(&ctx, "chunk", &mut stats);
        assert_eq!(proto.code[0].opcode, OpCode::Move);
        assert_eq!(proto.code[0].a, 0);
        assert_eq!(proto.code[1].a, 2);
        assert_eq!(stats.handlers_processed, 2);
    }

    #[test]
    fn warns_on_unrecognized_handler() {
        let ctx = VmContext {
            handlers: vec![VMHandler {
                index: 0,
                opcode: None,
                body_code: "local unrelated = 1".into(),
                encrypted: false,
                decrypted_code: None,
            }],
            constants: vec![],
            encryption: None,
            stats: AnalyzerStats::default(),
            decrypt_report: Default::default(),
        };
        let mut stats = Stats::default();
        reconstruct(&ctx, "chunk", &mut stats);
        assert_eq!(stats.warnings.len(), 1);
    }
}
