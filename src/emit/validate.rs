use crate::emit::header;
use crate::{Error, Result};

/// Reads back `magic + version + format + sizes` and confirms they match
/// the expected header; failure is a hard `EmitFailed`, never a silent pass.
pub fn validate(bytes: &[u8]) -> Result<()> {
    if bytes.len() < 17 {
        return Err(Error::EmitFailed {
            msg: "output shorter than the fixed header".into(),
        });
    }
    let magic = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
    if magic != header::MAGIC {
        return Err(Error::EmitFailed {
            msg: format!("magic mismatch: {magic:#x}"),
        });
    }
    if bytes[4] != header::VERSION {
        return Err(Error::EmitFailed {
            msg: format!("version mismatch: {:#x}", bytes[4]),
        });
    }
    if bytes[5] != header::FORMAT {
        return Err(Error::EmitFailed {
            msg: format!("format mismatch: {}", bytes[5]),
        });
    }
    if bytes[6..12] != header::DATA_MARKER {
        return Err(Error::EmitFailed {
            msg: "data marker mismatch".into(),
        });
    }
    if bytes[12..17] != header::SIZES {
        return Err(Error::EmitFailed {
            msg: "size table mismatch".into(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emit::writer::emit;
    use crate::reconstruct::VMProto;

    #[test]
    fn accepts_a_well_formed_image() {
        let bytes = emit(&VMProto::new("chunk"));
        assert!(validate(&bytes).is_ok());
    }

    #[test]
    fn rejects_truncated_input() {
        assert!(validate(&[0x61, 0x75]).is_err());
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = emit(&VMProto::new("chunk"));
        bytes[0] = 0;
        assert!(validate(&bytes).is_err());
    }
}
