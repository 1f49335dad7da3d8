//! Filename convention for bags arriving at the origin.
//!
//! A candidate is `<token><ext>` where `<token>` is exactly
//! [`TOKEN_LENGTH`] characters of `[A-Za-z0-9_-]` and `<ext>` is one of
//! `.tar`, `.tar.gz` or `.tgz`. A bare `.gz` is not a container and is ignored.

pub const TOKEN_LENGTH: usize = 32;

/// Container encodings the unpacker understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Tar,
    TarGz,
}

/// Recognized extensions, longest first so `.tar.gz` wins over `.tar`.
pub const ACCEPTED_EXTENSIONS: [(&str, ArchiveFormat); 3] = [
    (".tar.gz", ArchiveFormat::TarGz),
    (".tgz", ArchiveFormat::TarGz),
    (".tar", ArchiveFormat::Tar),
];

/// A filename that satisfies the naming convention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedName<'a> {
    pub token: &'a str,
    pub format: ArchiveFormat,
}

/// Match `filename` (no directory components) against the convention.
pub fn match_expected_name(filename: &str) -> Option<ExpectedName<'_>> {
    if filename.contains('/') {
        return None;
    }
    let (token, format) = ACCEPTED_EXTENSIONS
        .iter()
        .find_map(|(ext, format)| filename.strip_suffix(ext).map(|stem| (stem, *format)))?;
    let valid_token = token.len() == TOKEN_LENGTH
        && token
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
    valid_token.then_some(ExpectedName { token, format })
}

pub fn is_expected_name(filename: &str) -> bool {
    match_expected_name(filename).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: &str = "a1b2c3d4e5f6a7b8c9d0e1f2a3b4c5d6";

    #[test]
    fn accepts_each_extension() {
        for (ext, format) in ACCEPTED_EXTENSIONS {
            let name = format!("{TOKEN}{ext}");
            let m = match_expected_name(&name).unwrap();
            assert_eq!(m.token, TOKEN);
            assert_eq!(m.format, format);
        }
    }

    #[test]
    fn rejects_wrong_token_length() {
        assert!(!is_expected_name(&format!("{}.tar", &TOKEN[..31])));
        assert!(!is_expected_name(&format!("{TOKEN}0.tar")));
    }

    #[test]
    fn rejects_unknown_extensions() {
        assert!(!is_expected_name(&format!("{TOKEN}.gz")));
        assert!(!is_expected_name(&format!("{TOKEN}.zip")));
        assert!(!is_expected_name(TOKEN));
    }

    #[test]
    fn rejects_dots_and_paths_in_token() {
        let dotted = format!("{}.{}.tar", &TOKEN[..16], &TOKEN[..15]);
        assert!(!is_expected_name(&dotted));
        assert!(!is_expected_name(&format!("dir/{TOKEN}.tar")));
    }
}
