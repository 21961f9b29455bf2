/// The five supported string/constant-decryption algorithms, plus `Auto`
/// which tries all of them and keeps the best-scoring plaintext.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum Method {
    XorV1,
    XorV2,
    AesCbc,
    AesCbcV2,
    LuraphCustom,
    Auto,
}

impl Default for Method {
    fn default() -> Self {
        Method::Auto
    }
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::XorV1 => "xor_v1",
            Method::XorV2 => "xor_v2",
            Method::AesCbc => "aes_cbc",
            Method::AesCbcV2 => "aes_cbc_v2",
            Method::LuraphCustom => "luraph_custom",
            Method::Auto => "auto",
        }
    }

    /// Fixed tie-break order used when `auto` scoring ends in a draw.
    pub const CANDIDATES: [Method; 5] = [
        Method::XorV1,
        Method::XorV2,
        Method::AesCbc,
        Method::AesCbcV2,
        Method::LuraphCustom,
    ];

    pub fn parse(name: &str) -> Option<Method> {
        match name {
            "xor_v1" => Some(Method::XorV1),
            "xor_v2" => Some(Method::XorV2),
            "aes_cbc" => Some(Method::AesCbc),
            "aes_cbc_v2" => Some(Method::AesCbcV2),
            "luraph_custom" => Some(Method::LuraphCustom),
            "auto" => Some(Method::Auto),
            _ => None,
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Obfuscator release the input was produced by; determines the expected
/// key length for that version's default algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LuraphVersion {
    V11_5,
    V11_6,
    V11_7,
    V11_8,
    V11_8_1,
}

impl LuraphVersion {
    pub fn key_len(self) -> usize {
        match self {
            LuraphVersion::V11_5 => 16,
            LuraphVersion::V11_6 => 24,
            LuraphVersion::V11_7 | LuraphVersion::V11_8 | LuraphVersion::V11_8_1 => 32,
        }
    }

    pub fn default_method(self) -> Method {
        match self {
            LuraphVersion::V11_5 => Method::XorV1,
            LuraphVersion::V11_6 => Method::XorV2,
            LuraphVersion::V11_7 => Method::AesCbc,
            LuraphVersion::V11_8 | LuraphVersion::V11_8_1 => Method::AesCbcV2,
        }
    }
}

/// The session's resolved decryption parameters, shared by every constant
/// the VM analyzer decrypts in one `deobfuscate` call.
#[derive(Debug, Clone)]
pub struct EncryptionInfo {
    pub method: Method,
    pub key: Vec<u8>,
    pub iv: Option<Vec<u8>>,
    pub version: Option<LuraphVersion>,
}

impl EncryptionInfo {
    pub fn auto_with_key(key: Vec<u8>) -> Self {
        EncryptionInfo {
            method: Method::Auto,
            key,
            iv: None,
            version: None,
        }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }
}
