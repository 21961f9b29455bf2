/// Summary counters returned alongside the recovered output. `warnings` is
/// the record of everything the pipeline had to paper over with a local
/// recovery: a placeholder instruction, a constant left encrypted, and so
/// on — failures are contained locally but never hidden from the caller.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct Stats {
    pub handlers_processed: usize,
    pub instructions_reconstructed: usize,
    pub constants_decrypted: usize,
    pub warnings: Vec<String>,
}

impl Stats {
    pub fn warn(&mut self, msg: impl Into<String>) {
        let msg = msg.into();
        tracing::warn!("{msg}");
        self.warnings.push(msg);
    }
}
