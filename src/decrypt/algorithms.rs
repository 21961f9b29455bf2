use aes::Aes128;
use cbc::cipher::block_padding::{NoPadding, Pkcs7};
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use cbc::{Decryptor, Encryptor};

use super::info::Method;

/// Outcome of a single decryption attempt. AES failures don't propagate as
/// `Result::Err` — per the "local recovery" rule, a failed decrypt leaves
/// the ciphertext in place and lets the caller decide whether that's fatal.
#[derive(Debug, Clone)]
pub struct DecryptOutcome {
    pub ok: bool,
    pub plaintext: Vec<u8>,
    pub method: Method,
    pub error: Option<String>,
}

impl DecryptOutcome {
    fn ok(method: Method, plaintext: Vec<u8>) -> Self {
        DecryptOutcome {
            ok: true,
            plaintext,
            method,
            error: None,
        }
    }

    fn fail(method: Method, ciphertext: &[u8], error: impl Into<String>) -> Self {
        DecryptOutcome {
            ok: false,
            plaintext: ciphertext.to_vec(),
            method,
            error: Some(error.into()),
        }
    }
}

/// `out[i] = data[i] XOR key[i mod |key|]`. Self-inverse: used for both
/// directions of `xor_v1`.
pub fn xor_v1(data: &[u8], key: &[u8]) -> Vec<u8> {
    if key.is_empty() {
        return data.to_vec();
    }
    data.iter()
        .enumerate()
        .map(|(i, &b)| b ^ key[i % key.len()])
        .collect()
}

/// `out[i] = data[i] XOR ((key[i mod |key|] + i) mod 256)`. Also
/// self-inverse, since the mask depends only on position and key, never on
/// the data being transformed.
pub fn xor_v2(data: &[u8], key: &[u8]) -> Vec<u8> {
    if key.is_empty() {
        return data.to_vec();
    }
    data.iter()
        .enumerate()
        .map(|(i, &b)| {
            let mask = (key[i % key.len()] as u16 + i as u16) % 256;
            b ^ mask as u8
        })
        .collect()
}

/// Three-layer transform, decrypt direction: XOR with key, rotate left 3,
/// subtract key (mod 256).
pub fn luraph_custom_decrypt(cipher: &[u8], key: &[u8]) -> Vec<u8> {
    if key.is_empty() {
        return cipher.to_vec();
    }
    cipher
        .iter()
        .enumerate()
        .map(|(i, &b)| {
            let k = key[i % key.len()];
            let t1 = b ^ k;
            let t2 = t1.rotate_left(3);
            t2.wrapping_sub(k)
        })
        .collect()
}

/// Inverse of [`luraph_custom_decrypt`]: add key, rotate right 3, XOR key.
pub fn luraph_custom_encrypt(plain: &[u8], key: &[u8]) -> Vec<u8> {
    if key.is_empty() {
        return plain.to_vec();
    }
    plain
        .iter()
        .enumerate()
        .map(|(i, &b)| {
            let k = key[i % key.len()];
            let t2 = b.wrapping_add(k);
            let t1 = t2.rotate_right(3);
            t1 ^ k
        })
        .collect()
}

fn aes128_key(key: &[u8]) -> Option<[u8; 16]> {
    if key.len() < 16 {
        return None;
    }
    let mut out = [0u8; 16];
    out.copy_from_slice(&key[..16]);
    Some(out)
}

/// v11.7: AES-128-CBC of hex-encoded ciphertext, PKCS7-padded, default IV
/// of 16 zero bytes.
pub fn aes_cbc_decrypt(hex_cipher: &[u8], key: &[u8]) -> DecryptOutcome {
    let method = Method::AesCbc;
    let Some(key16) = aes128_key(key) else {
        return DecryptOutcome::fail(method, hex_cipher, "key shorter than 16 bytes");
    };
    let hex_str = match std::str::from_utf8(hex_cipher) {
        Ok(s) => s,
        Err(e) => return DecryptOutcome::fail(method, hex_cipher, e.to_string()),
    };
    let ciphertext = match hex::decode(hex_str.trim()) {
        Ok(bytes) => bytes,
        Err(e) => return DecryptOutcome::fail(method, hex_cipher, e.to_string()),
    };
    let iv = [0u8; 16];
    let decryptor = Decryptor::<Aes128>::new(key16.into(), iv.into());
    match decryptor.decrypt_padded_vec_mut::<Pkcs7>(&ciphertext) {
        Ok(plain) => DecryptOutcome::ok(method, plain),
        Err(e) => DecryptOutcome::fail(method, hex_cipher, format!("{e:?}")),
    }
}

pub fn aes_cbc_encrypt(plain: &[u8], key: &[u8]) -> Option<Vec<u8>> {
    let key16 = aes128_key(key)?;
    let iv = [0u8; 16];
    let encryptor = Encryptor::<Aes128>::new(key16.into(), iv.into());
    let ct = encryptor.encrypt_padded_vec_mut::<Pkcs7>(plain);
    Some(hex::encode(ct).into_bytes())
}

fn derived_iv(key: &[u8]) -> [u8; 16] {
    let mut iv = [0u8; 16];
    for (i, slot) in iv.iter_mut().enumerate() {
        *slot = key[i % key.len()] ^ (i as u8);
    }
    iv
}

/// Strips the bespoke trailing-byte padding scheme used by `aes_cbc_v2`:
/// the last byte of the padded plaintext encodes how many padding bytes
/// (1..=16) were appended, NOT a PKCS7-style repeated value.
fn strip_custom_padding(mut data: Vec<u8>) -> Result<Vec<u8>, String> {
    let Some(&last) = data.last() else {
        return Err("empty block".into());
    };
    let pad_len = last as usize;
    if pad_len == 0 || pad_len > 16 || pad_len > data.len() {
        return Err(format!("invalid custom padding length {pad_len}"));
    }
    data.truncate(data.len() - pad_len);
    Ok(data)
}

fn append_custom_padding(mut data: Vec<u8>, block_size: usize) -> Vec<u8> {
    let remainder = data.len() % block_size;
    let mut pad_len = block_size - remainder;
    if pad_len == 0 {
        pad_len = block_size;
    }
    if pad_len > 16 {
        pad_len %= 16;
        if pad_len == 0 {
            pad_len = 16;
        }
    }
    for _ in 0..pad_len {
        data.push(pad_len as u8);
    }
    data
}

/// v11.8/v11.8.1: AES-CBC with a key-derived IV and the custom trailing-byte
/// padding described above (not PKCS7), so block decryption is done with
/// `NoPadding` and the padding is stripped by hand afterward.
pub fn aes_cbc_v2_decrypt(cipher: &[u8], key: &[u8]) -> DecryptOutcome {
    let method = Method::AesCbcV2;
    let Some(key16) = aes128_key(key) else {
        return DecryptOutcome::fail(method, cipher, "key shorter than 16 bytes");
    };
    if cipher.is_empty() || cipher.len() % 16 != 0 {
        return DecryptOutcome::fail(method, cipher, "ciphertext not block-aligned");
    }
    let iv = derived_iv(key);
    let decryptor = Decryptor::<Aes128>::new(key16.into(), iv.into());
    let padded = match decryptor.decrypt_padded_vec_mut::<NoPadding>(cipher) {
        Ok(p) => p,
        Err(e) => return DecryptOutcome::fail(method, cipher, format!("{e:?}")),
    };
    match strip_custom_padding(padded) {
        Ok(plain) => DecryptOutcome::ok(method, plain),
        Err(e) => DecryptOutcome::fail(method, cipher, e),
    }
}

pub fn aes_cbc_v2_encrypt(plain: &[u8], key: &[u8]) -> Option<Vec<u8>> {
    let key16 = aes128_key(key)?;
    let iv = derived_iv(key);
    let padded = append_custom_padding(plain.to_vec(), 16);
    let encryptor = Encryptor::<Aes128>::new(key16.into(), iv.into());
    Some(encryptor.encrypt_padded_vec_mut::<NoPadding>(&padded))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xor_v1_is_self_inverse() {
        let key = b"0123456789ABCDEF";
        let plain = b"local x=1";
        let cipher = xor_v1(plain, key);
        assert_eq!(xor_v1(&cipher, key), plain);
    }

    #[test]
    fn xor_v2_is_self_inverse() {
        let key = b"0123456789ABCDEF";
        let plain = b"local x=1";
        let cipher = xor_v2(plain, key);
        assert_eq!(xor_v2(&cipher, key), plain);
    }

    #[test]
    fn luraph_custom_round_trips() {
        let key = b"sixteen byte key";
        let plain = b"return print(1)";
        let cipher = luraph_custom_encrypt(plain, key);
        let back = luraph_custom_decrypt(&cipher, key);
        assert_eq!(back, plain);
    }

    #[test]
    fn aes_cbc_round_trips() {
        let key = b"0123456789ABCDEF";
        let plain = b"local function f() end";
        let hex_cipher = aes_cbc_encrypt(plain, key).unwrap();
        let out = aes_cbc_decrypt(&hex_cipher, key);
        assert!(out.ok);
        assert_eq!(out.plaintext, plain);
    }

    #[test]
    fn aes_cbc_v2_round_trips() {
        let key = b"0123456789ABCDEF";
        let plain = b"a slightly longer plaintext body";
        let cipher = aes_cbc_v2_encrypt(plain, key).unwrap();
        let out = aes_cbc_v2_decrypt(&cipher, key);
        assert!(out.ok);
        assert_eq!(out.plaintext, plain);
    }

    #[test]
    fn aes_cbc_reports_failure_without_aborting() {
        let out = aes_cbc_decrypt(b"not hex at all!!", b"0123456789ABCDEF");
        assert!(!out.ok);
        assert_eq!(out.plaintext, b"not hex at all!!");
    }
}
