//! Whole-pipeline scenarios, from raw source bytes down to an emitted
//! `.luac` image or a specific error.

use luraph_recover::decrypt::{auto_decrypt, Method};
use luraph_recover::emit;
use luraph_recover::reconstruct::VMProto;
use luraph_recover::{deobfuscate, Error, Options};
use pretty_assertions::assert_eq as assert_eq_pretty;

fn recover(src: &str) -> Result<luraph_recover::DeobfuscateOutput, Error> {
    deobfuscate(src.as_bytes(), Options::default(), |_| {})
}

#[test]
fn plain_lua_is_not_luraph() {
    let err = recover("print(\"hello\")\n").unwrap_err();
    assert!(matches!(err, Error::NotLuraph));
}

#[test]
fn trivial_handler_recovers_a_single_move() {
    let src = "local function handler_1(a, b) R[0] = R[1] end\n";
    let out = recover(src).unwrap();
    assert_eq!(out.stats.handlers_processed, 1);

    let bytecode = out.bytecode.unwrap();
    assert!(emit::validate(&bytecode).is_ok());
}

#[test]
fn constant_pool_feeds_a_loadk() {
    let src = r#"
        local K = {"print", 2, 3, 4, 5, 6}
        function handler_1(a) R[0] = K[0] end
    "#;
    let out = recover(src).unwrap();
    assert_eq!(out.stats.handlers_processed, 1);
    assert!(out.bytecode.is_some());
}

#[test]
fn xor_v1_ciphertext_round_trips_through_auto_decrypt() {
    let key = b"0123456789ABCDEF";
    let plain = b"local x=1";
    let cipher = luraph_recover::decrypt::encrypt_with(plain, key, Method::XorV1).unwrap();
    let (outcome, _) = auto_decrypt(&cipher, key);
    assert!(outcome.ok);
    assert_eq!(outcome.method, Method::XorV1);
    assert_eq!(outcome.plaintext, plain);
}

#[test]
fn empty_function_header_round_trips() {
    let proto = VMProto::new("chunk");
    let bytes = emit::emit(&proto);
    assert!(emit::validate(&bytes).is_ok());
    // Lua 5.3's real on-disk signature bytes, not the `MAGIC` constant
    // re-derived as a number.
    assert_eq!(&bytes[0..4], &[0x1B, b'L', b'u', b'a']);
    assert_eq!(bytes[4], 0x53);
}

/// Writes `s` back out as a Lua double-quoted literal with every byte
/// `\xHH`-escaped, so the lexer's `looks_encrypted` heuristic classifies it
/// as an `EncryptedString` regardless of its actual content.
fn hex_escape_literal(s: &str) -> String {
    let mut out = String::from("\"");
    for b in s.bytes() {
        out.push_str(&format!("\\x{b:02x}"));
    }
    out.push('"');
    out
}

#[test]
fn partial_decryption_failure_downgrades_to_a_warning() {
    let key = b"0123456789ABCDEF";
    let good1 = luraph_recover::decrypt::encrypt_with(b"one", key, Method::AesCbc).unwrap();
    let good2 = luraph_recover::decrypt::encrypt_with(b"two", key, Method::AesCbc).unwrap();
    let good1 = String::from_utf8(good1).unwrap();
    let good2 = String::from_utf8(good2).unwrap();

    let src = format!(
        "local K = {{{}, {}, {}}}\nfunction handler_1(a) R[0] = K[0] end\n",
        hex_escape_literal(&good1),
        hex_escape_literal(&good2),
        hex_escape_literal("not valid hex at all"),
    );

    let options = Options {
        method: Method::AesCbc,
        key: Some(key.to_vec()),
        ..Options::default()
    };
    let out = deobfuscate(src.as_bytes(), options, |_| {}).unwrap();
    assert_eq!(out.stats.warnings.len(), 1);
    assert!(out.stats.warnings[0].contains("decryption failed"));
    assert!(out.stats.warnings[0].contains("constant #2"));
}

#[test]
fn empty_input_is_rejected() {
    let err = recover("").unwrap_err();
    assert!(matches!(err, Error::NotLuraph));
}

#[test]
fn whitespace_only_input_is_rejected() {
    let err = recover("   \n\t\n").unwrap_err();
    assert!(matches!(err, Error::NotLuraph));
}

#[test]
fn unrecognized_handler_body_falls_back_to_a_nop_with_a_warning() {
    let src = "function handler_0() local unrelated = 1 end\nlocal y = R[9]\n";
    let out = recover(src).unwrap();
    assert_eq!(out.stats.handlers_processed, 1);
    assert_eq!(out.stats.warnings.len(), 1);
    assert!(out.stats.warnings[0].contains("no recognizable body"));
}

#[test]
fn deobfuscate_is_deterministic() {
    let src = "local K = {\"print\"}\nfunction handler_1(a) R[0] = K[0] end\n";
    let first = recover(src).unwrap();
    let second = recover(src).unwrap();
    assert_eq_pretty!(first.bytecode, second.bytecode);
}
