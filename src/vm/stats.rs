/// Counts how each recovered handler got its opcode, so a caller can judge
/// how much of the output was guessed versus derived from first principles.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct AnalyzerStats {
    pub handlers_found: usize,
    pub resolved_by_name: usize,
    pub resolved_by_body: usize,
    pub resolved_by_symbolic: usize,
    pub unresolved: usize,
}

impl AnalyzerStats {
    pub fn record(&mut self, rule: Option<super::inference::CascadeRule>) {
        use super::inference::CascadeRule;
        match rule {
            Some(CascadeRule::Name) => self.resolved_by_name += 1,
            Some(CascadeRule::Body) => self.resolved_by_body += 1,
            Some(CascadeRule::Symbolic) => self.resolved_by_symbolic += 1,
            None => self.unresolved += 1,
        }
    }
}
