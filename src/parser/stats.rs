/// Counters accumulated during the single parse pass, read directly by the
/// orchestrator's `looks_like_luraph` gate instead of a second AST walk.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParserStats {
    pub handlers_seen: usize,
    pub constant_tables_seen: usize,
    pub encrypted_strings_seen: usize,
}
