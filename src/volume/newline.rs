//! Line-ending normalization for text stored in volumes.
//!
//! In memory every text file is `\n`-terminated. On write the content is
//! expanded to the store's line ending; on read `\r\n` is folded back.
//! Binary content (compiled artifacts, anything with a NUL byte, anything
//! that is not UTF-8) passes through untouched in both directions.

/// Magic prefix of compiled artifacts.
pub const ARTIFACT_MAGIC: &[u8] = &[0x6B, 0x03, 0x58, 0x45];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineEnding {
    Lf,
    CrLf,
}

impl LineEnding {
    /// Canonical line ending of the host platform.
    pub fn native() -> Self {
        if cfg!(windows) {
            LineEnding::CrLf
        } else {
            LineEnding::Lf
        }
    }
}

/// Content sniffing: artifacts, NUL bytes and invalid UTF-8 are binary.
pub fn is_binary(bytes: &[u8]) -> bool {
    bytes.starts_with(ARTIFACT_MAGIC) || bytes.contains(&0) || std::str::from_utf8(bytes).is_err()
}

/// Prepare bytes for disk.
pub fn to_stored(bytes: &[u8], ending: LineEnding) -> Vec<u8> {
    if ending == LineEnding::Lf || is_binary(bytes) {
        return bytes.to_vec();
    }
    let text = String::from_utf8_lossy(bytes);
    text.replace("\r\n", "\n").replace('\n', "\r\n").into_bytes()
}

/// Bring bytes read from disk back to `\n` line endings.
pub fn from_stored(bytes: &[u8]) -> Vec<u8> {
    if is_binary(bytes) {
        return bytes.to_vec();
    }
    let text = String::from_utf8_lossy(bytes);
    text.replace("\r\n", "\n").into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_crlf_expands_on_write() {
        let stored = to_stored(b"print 1.\nprint 2.\n", LineEnding::CrLf);
        assert_eq!(stored, b"print 1.\r\nprint 2.\r\n");
        assert_eq!(from_stored(&stored), b"print 1.\nprint 2.\n");
    }

    #[test]
    fn test_lf_write_is_identity() {
        assert_eq!(to_stored(b"a\r\nb\n", LineEnding::Lf), b"a\r\nb\n");
    }

    #[test]
    fn test_binary_passes_through() {
        let mut artifact = ARTIFACT_MAGIC.to_vec();
        artifact.extend_from_slice(b"\n\r\n");
        assert!(is_binary(&artifact));
        assert_eq!(to_stored(&artifact, LineEnding::CrLf), artifact);
        assert_eq!(from_stored(&artifact), artifact);

        let with_nul = b"a\nb\0".to_vec();
        assert_eq!(to_stored(&with_nul, LineEnding::CrLf), with_nul);
        assert!(is_binary(&[0xff, 0xfe]));
        assert!(!is_binary(b"plain text\n"));
    }

    fn text() -> impl Strategy<Value = String> {
        prop::collection::vec(
            prop_oneof![
                "[a-zA-Z0-9 .\"(){}]{0,12}",
                Just("\n".to_string()),
                Just("\r\n".to_string()),
            ],
            0..24,
        )
        .prop_map(|parts| parts.concat())
    }

    proptest! {
        #[test]
        fn prop_round_trip_folds_crlf(s in text(), crlf in any::<bool>()) {
            let ending = if crlf { LineEnding::CrLf } else { LineEnding::Lf };
            let back = from_stored(&to_stored(s.as_bytes(), ending));
            prop_assert_eq!(String::from_utf8(back).unwrap(), s.replace("\r\n", "\n"));
        }
    }
}
