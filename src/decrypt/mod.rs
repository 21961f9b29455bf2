//! Candidate-key extraction and multi-algorithm string/constant decryption
//! with best-of scoring.

mod algorithms;
mod candidates;
mod info;
mod score;

pub use algorithms::DecryptOutcome;
pub use candidates::extract_candidate_keys;
pub use info::{EncryptionInfo, LuraphVersion, Method};
pub use score::score_plaintext;

/// Every algorithm tried in `auto` mode, kept even for the losers so a
/// caller doing manual inspection can see the runner-up candidates.
#[derive(Debug, Clone)]
pub struct DecryptAttempt {
    pub method: Method,
    pub plaintext: Vec<u8>,
    pub score: i64,
}

/// Decrypts `cipher` under one specific, named method (not `Auto`).
pub fn decrypt_with(cipher: &[u8], key: &[u8], method: Method) -> DecryptOutcome {
    match method {
        Method::XorV1 => DecryptOutcome {
            ok: true,
            plaintext: algorithms::xor_v1(cipher, key),
            method,
            error: None,
        },
        Method::XorV2 => DecryptOutcome {
            ok: true,
            plaintext: algorithms::xor_v2(cipher, key),
            method,
            error: None,
        },
        Method::AesCbc => algorithms::aes_cbc_decrypt(cipher, key),
        Method::AesCbcV2 => algorithms::aes_cbc_v2_decrypt(cipher, key),
        Method::LuraphCustom => DecryptOutcome {
            ok: true,
            plaintext: algorithms::luraph_custom_decrypt(cipher, key),
            method,
            error: None,
        },
        Method::Auto => auto_decrypt(cipher, key).0,
    }
}

/// Encrypts `plain` under one specific method; used only by tests and by
/// the candidate-key scoring harness to build known-good fixtures.
pub fn encrypt_with(plain: &[u8], key: &[u8], method: Method) -> Option<Vec<u8>> {
    match method {
        Method::XorV1 => Some(algorithms::xor_v1(plain, key)),
        Method::XorV2 => Some(algorithms::xor_v2(plain, key)),
        Method::AesCbc => algorithms::aes_cbc_encrypt(plain, key),
        Method::AesCbcV2 => algorithms::aes_cbc_v2_encrypt(plain, key),
        Method::LuraphCustom => Some(algorithms::luraph_custom_encrypt(plain, key)),
        Method::Auto => None,
    }
}

/// Runs every supported algorithm against `cipher` and returns the
/// best-scoring plaintext plus the full ranked attempt list (for
/// diagnostics). Ties break in `Method::CANDIDATES` order.
pub fn auto_decrypt(cipher: &[u8], key: &[u8]) -> (DecryptOutcome, Vec<DecryptAttempt>) {
    let mut attempts = Vec::new();
    for method in Method::CANDIDATES {
        let outcome = decrypt_with(cipher, key, method);
        let score = if outcome.ok {
            score_plaintext(&outcome.plaintext)
        } else {
            i64::MIN
        };
        attempts.push(DecryptAttempt {
            method,
            plaintext: outcome.plaintext,
            score,
        });
    }

    let best_idx = attempts
        .iter()
        .enumerate()
        .max_by_key(|(idx, a)| (a.score, std::cmp::Reverse(*idx)))
        .map(|(idx, _)| idx)
        .expect("Method::CANDIDATES is non-empty");

    let best = &attempts[best_idx];
    let outcome = DecryptOutcome {
        ok: best.score > i64::MIN,
        plaintext: best.plaintext.clone(),
        method: best.method,
        error: None,
    };
    (outcome, attempts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_picks_xor_v1_for_xor_v1_ciphertext() {
        let key = b"0123456789ABCDEF";
        let plain = b"local x=1";
        let cipher = algorithms::xor_v1(plain, key);
        let (best, _) = auto_decrypt(&cipher, key);
        assert_eq!(best.method, Method::XorV1);
        assert_eq!(best.plaintext, plain);
    }

    #[test]
    fn auto_keeps_every_attempt_for_diagnostics() {
        let key = b"0123456789ABCDEF";
        let cipher = algorithms::xor_v1(b"return 1", key);
        let (_, attempts) = auto_decrypt(&cipher, key);
        assert_eq!(attempts.len(), Method::CANDIDATES.len());
    }
}
