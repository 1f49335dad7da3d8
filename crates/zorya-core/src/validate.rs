//! BagIt structure and metadata validation.
//!
//! Structure checks follow the BagIt layout: a `bagit.txt` declaration, a
//! `data/` payload directory, at least one `manifest-<alg>.txt` whose entries
//! exist with matching digests and which lists every payload file, and any
//! `tagmanifest-<alg>.txt` entries. Only `sha256` and `sha512` are supported.
//!
//! Metadata checks parse `bag-info.txt`, resolve its
//! `BagIt-Profile-Identifier` through a [`ProfileSource`] and enforce the
//! profile before extracting the typed [`BagMetadata`].

use sha2::{Digest, Sha256, Sha512};
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use zorya_remote::{ProfileSource, RemoteError};
use zorya_schema::metadata::FIELD_PROFILE;
use zorya_schema::{BagMetadata, MetadataError, TagFile};

const BAGIT_TXT: &str = "bagit.txt";
const BAG_INFO_TXT: &str = "bag-info.txt";
const PAYLOAD_DIR: &str = "data";

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("required file '{0}' is missing")]
    MissingFile(String),
    #[error("'{file}' does not declare '{field}'")]
    MissingDeclaration { file: String, field: String },
    #[error("payload directory 'data/' is missing")]
    NoPayloadDir,
    #[error("no payload manifest (manifest-<alg>.txt) found")]
    NoManifest,
    #[error("unsupported checksum algorithm '{0}'")]
    UnsupportedAlgorithm(String),
    #[error("{manifest} line {line}: {reason}")]
    MalformedManifest {
        manifest: String,
        line: usize,
        reason: String,
    },
    #[error("{manifest} lists '{path}' which does not exist")]
    ListedButMissing { manifest: String, path: String },
    #[error("payload file '{path}' is not listed in {manifest}")]
    NotInManifest { manifest: String, path: String },
    #[error("checksum mismatch for '{path}' ({algorithm}): expected {expected}, got {actual}")]
    ChecksumMismatch {
        path: String,
        algorithm: String,
        expected: String,
        actual: String,
    },
    #[error("archive must contain exactly one top-level bag directory, found: {0}")]
    BagRoot(String),
    #[error("{0}")]
    Metadata(#[from] MetadataError),
    #[error("profile '{identifier}' could not be resolved: {source}")]
    ProfileUnavailable {
        identifier: String,
        #[source]
        source: RemoteError,
    },
    #[error("I/O error during validation: {0}")]
    Io(#[from] io::Error),
}

/// Checks an extracted bag directory.
pub trait BagValidator: Send + Sync {
    fn validate_structure(&self, bag_dir: &Path) -> Result<(), ValidationError>;

    /// Validate `bag-info.txt` against its profile and extract the typed fields.
    fn validate_metadata(&self, bag_dir: &Path) -> Result<BagMetadata, ValidationError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Algorithm {
    Sha256,
    Sha512,
}

impl Algorithm {
    fn parse(name: &str) -> Result<Self, ValidationError> {
        match name.to_ascii_lowercase().as_str() {
            "sha256" => Ok(Self::Sha256),
            "sha512" => Ok(Self::Sha512),
            _ => Err(ValidationError::UnsupportedAlgorithm(name.to_owned())),
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
        }
    }

    fn digest_file(self, path: &Path) -> Result<String, io::Error> {
        match self {
            Self::Sha256 => hash_file::<Sha256>(path),
            Self::Sha512 => hash_file::<Sha512>(path),
        }
    }
}

fn hash_file<D: Digest>(path: &Path) -> Result<String, io::Error> {
    let mut file = File::open(path)?;
    let mut hasher = D::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// `(algorithm name, file name)` for each `<prefix>-<alg>.txt` in the bag root.
fn manifests_with_prefix(bag_dir: &Path, prefix: &str) -> Result<Vec<(String, String)>, io::Error> {
    let mut found = Vec::new();
    for entry in fs::read_dir(bag_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if let Some(alg) = name
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_prefix('-'))
            .and_then(|rest| rest.strip_suffix(".txt"))
        {
            found.push((alg.to_owned(), name.clone()));
        }
    }
    found.sort();
    Ok(found)
}

/// Parse manifest lines into `(digest, relative path)` pairs.
fn read_manifest(bag_dir: &Path, manifest: &str) -> Result<Vec<(String, String)>, ValidationError> {
    let content = fs::read_to_string(bag_dir.join(manifest))?;
    let mut entries = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        let malformed = |reason: &str| ValidationError::MalformedManifest {
            manifest: manifest.to_owned(),
            line: idx + 1,
            reason: reason.to_owned(),
        };
        let (digest, path) = line
            .split_once(char::is_whitespace)
            .ok_or_else(|| malformed("expected '<checksum> <path>'"))?;
        let path = path.trim_start().trim_start_matches('*');
        if path.is_empty() {
            return Err(malformed("missing path"));
        }
        let safe = Path::new(path)
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !safe {
            return Err(malformed("path escapes the bag"));
        }
        entries.push((digest.to_ascii_lowercase(), path.to_owned()));
    }
    Ok(entries)
}

fn verify_entries(
    bag_dir: &Path,
    manifest: &str,
    algorithm: Algorithm,
    entries: &[(String, String)],
) -> Result<(), ValidationError> {
    for (expected, rel) in entries {
        let full = bag_dir.join(rel);
        if !full.is_file() {
            return Err(ValidationError::ListedButMissing {
                manifest: manifest.to_owned(),
                path: rel.clone(),
            });
        }
        let actual = algorithm.digest_file(&full)?;
        if actual != *expected {
            return Err(ValidationError::ChecksumMismatch {
                path: rel.clone(),
                algorithm: algorithm.as_str().to_owned(),
                expected: expected.clone(),
                actual,
            });
        }
    }
    Ok(())
}

/// Every regular file under `dir`, as `/`-joined paths relative to `base`.
fn payload_files(base: &Path, dir: &Path, out: &mut BTreeSet<String>) -> Result<(), io::Error> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let ft = entry.file_type()?;
        if ft.is_dir() {
            payload_files(base, &path, out)?;
        } else if ft.is_file() {
            let rel = path.strip_prefix(base).unwrap_or(&path);
            let joined: Vec<String> = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            out.insert(joined.join("/"));
        }
    }
    Ok(())
}

fn normalize(rel: &str) -> String {
    rel.split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// Locate the single top-level directory of an extracted archive.
pub fn bag_root(unpacked: &Path) -> Result<PathBuf, ValidationError> {
    let mut entries: Vec<PathBuf> = fs::read_dir(unpacked)?
        .map(|e| e.map(|e| e.path()))
        .collect::<Result<_, _>>()?;
    entries.sort();
    match entries.as_slice() {
        [only] if only.is_dir() => Ok(only.clone()),
        _ => Err(ValidationError::BagRoot(
            entries
                .iter()
                .filter_map(|p| p.file_name())
                .map(|n| n.to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join(", "),
        )),
    }
}

/// Validator for BagIt bags described by a profile.
pub struct BagItValidator {
    profiles: Box<dyn ProfileSource>,
}

impl BagItValidator {
    pub fn new(profiles: impl ProfileSource + 'static) -> Self {
        Self {
            profiles: Box::new(profiles),
        }
    }

    fn declaration(bag_dir: &Path) -> Result<TagFile, ValidationError> {
        let path = bag_dir.join(BAGIT_TXT);
        if !path.is_file() {
            return Err(ValidationError::MissingFile(BAGIT_TXT.to_owned()));
        }
        Ok(TagFile::read(&path)?)
    }
}

impl BagValidator for BagItValidator {
    fn validate_structure(&self, bag_dir: &Path) -> Result<(), ValidationError> {
        let declaration = Self::declaration(bag_dir)?;
        for field in ["BagIt-Version", "Tag-File-Character-Encoding"] {
            if declaration.get(field).is_none() {
                return Err(ValidationError::MissingDeclaration {
                    file: BAGIT_TXT.to_owned(),
                    field: field.to_owned(),
                });
            }
        }

        let data_dir = bag_dir.join(PAYLOAD_DIR);
        if !data_dir.is_dir() {
            return Err(ValidationError::NoPayloadDir);
        }

        let manifests = manifests_with_prefix(bag_dir, "manifest")?;
        if manifests.is_empty() {
            return Err(ValidationError::NoManifest);
        }

        let mut payload = BTreeSet::new();
        payload_files(bag_dir, &data_dir, &mut payload)?;

        for (alg, manifest) in &manifests {
            let algorithm = Algorithm::parse(alg)?;
            let entries = read_manifest(bag_dir, manifest)?;
            let listed: BTreeSet<String> = entries.iter().map(|(_, p)| normalize(p)).collect();
            if let Some(unlisted) = payload.iter().find(|p| !listed.contains(*p)) {
                return Err(ValidationError::NotInManifest {
                    manifest: manifest.clone(),
                    path: unlisted.clone(),
                });
            }
            verify_entries(bag_dir, manifest, algorithm, &entries)?;
            debug!("{manifest}: {} entries verified", entries.len());
        }

        for (alg, manifest) in manifests_with_prefix(bag_dir, "tagmanifest")? {
            let algorithm = Algorithm::parse(&alg)?;
            let entries = read_manifest(bag_dir, &manifest)?;
            verify_entries(bag_dir, &manifest, algorithm, &entries)?;
        }
        Ok(())
    }

    fn validate_metadata(&self, bag_dir: &Path) -> Result<BagMetadata, ValidationError> {
        let info_path = bag_dir.join(BAG_INFO_TXT);
        if !info_path.is_file() {
            return Err(ValidationError::MissingFile(BAG_INFO_TXT.to_owned()));
        }
        let tags = TagFile::read(&info_path)?;
        let identifier = tags
            .get(FIELD_PROFILE)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or(MetadataError::MissingField(FIELD_PROFILE))?;

        let profile =
            self.profiles
                .profile(identifier)
                .map_err(|source| ValidationError::ProfileUnavailable {
                    identifier: identifier.to_owned(),
                    source,
                })?;
        debug!("validating {} against profile {}", bag_dir.display(), profile.identifier());

        profile.check_bag_info(&tags)?;
        if let Some(version) = Self::declaration(bag_dir)?.get("BagIt-Version") {
            profile.check_bagit_version(version.trim())?;
        }
        let algorithms: Vec<String> = manifests_with_prefix(bag_dir, "manifest")?
            .into_iter()
            .map(|(alg, _)| alg)
            .collect();
        profile.check_manifests(&algorithms)?;
        profile.check_tag_files(|name| bag_dir.join(name).is_file())?;

        Ok(BagMetadata::from_tags(&tags)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use zorya_schema::{Origin, Profile};

    struct StaticProfiles(HashMap<String, Profile>);

    impl ProfileSource for StaticProfiles {
        fn profile(&self, identifier: &str) -> Result<Profile, RemoteError> {
            self.0
                .get(identifier)
                .cloned()
                .ok_or_else(|| RemoteError::NotFound(identifier.to_owned()))
        }
    }

    const PROFILE_ID: &str = "https://profiles.example.org/zorya.json";

    fn validator() -> BagItValidator {
        let profile = Profile::from_json(
            format!(
                r#"{{
                    "BagIt-Profile-Info": {{"BagIt-Profile-Identifier": "{PROFILE_ID}"}},
                    "Bag-Info": {{
                        "Origin": {{"required": true, "values": ["digitization", "legacy_digital"]}},
                        "Rights-ID": {{"required": true}}
                    }},
                    "Manifests-Required": ["sha256"],
                    "Accept-BagIt-Version": ["1.0"]
                }}"#
            )
            .as_bytes(),
        )
        .unwrap();
        BagItValidator::new(StaticProfiles(
            [(PROFILE_ID.to_owned(), profile)].into_iter().collect(),
        ))
    }

    fn sha256_hex(data: &[u8]) -> String {
        hex::encode(Sha256::digest(data))
    }

    fn write_bag(root: &Path, bag_info: &str) {
        fs::create_dir_all(root.join("data/sub")).unwrap();
        fs::write(
            root.join("bagit.txt"),
            "BagIt-Version: 1.0\nTag-File-Character-Encoding: UTF-8\n",
        )
        .unwrap();
        fs::write(root.join("data/a.txt"), "alpha").unwrap();
        fs::write(root.join("data/sub/b.txt"), "beta").unwrap();
        fs::write(
            root.join("manifest-sha256.txt"),
            format!(
                "{}  data/a.txt\n{}  data/sub/b.txt\n",
                sha256_hex(b"alpha"),
                sha256_hex(b"beta")
            ),
        )
        .unwrap();
        fs::write(root.join("bag-info.txt"), bag_info).unwrap();
    }

    fn good_info() -> String {
        format!(
            "BagIt-Profile-Identifier: {PROFILE_ID}\nOrigin: digitization\n\
             Rights-ID: 7 9\nStart-Date: 2000-01-01\nEnd-Date: 2010-12-31\n"
        )
    }

    #[test]
    fn file_digests_are_lowercase_hex() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abc.txt");
        fs::write(&path, "abc").unwrap();
        assert_eq!(
            Algorithm::Sha256.digest_file(&path).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(
            Algorithm::Sha512.digest_file(&path).unwrap(),
            "ddaf35a193617abacc417349ae20413112e6fa4e89a97ea20a9eeee64b55d39a\
             2192992a274fc1a836ba3c23a3feebbd454d4423643ce80e2a9ac94fa54ca49f"
        );
    }

    #[test]
    fn valid_bag_passes_and_yields_metadata() {
        let dir = tempfile::tempdir().unwrap();
        write_bag(dir.path(), &good_info());
        let v = validator();
        v.validate_structure(dir.path()).unwrap();
        let meta = v.validate_metadata(dir.path()).unwrap();
        assert_eq!(meta.origin, Origin::Digitization);
        assert_eq!(meta.rights_ids, vec!["7", "9"]);
        assert_eq!(meta.profile_identifier, PROFILE_ID);
    }

    #[test]
    fn tagmanifest_is_verified() {
        let dir = tempfile::tempdir().unwrap();
        write_bag(dir.path(), &good_info());
        fs::write(
            dir.path().join("tagmanifest-sha256.txt"),
            format!("{}  bagit.txt\n", sha256_hex(b"not the declaration")),
        )
        .unwrap();
        let err = validator().validate_structure(dir.path()).unwrap_err();
        assert!(matches!(err, ValidationError::ChecksumMismatch { .. }), "{err}");
    }

    #[test]
    fn tampered_payload_fails() {
        let dir = tempfile::tempdir().unwrap();
        write_bag(dir.path(), &good_info());
        fs::write(dir.path().join("data/a.txt"), "ALPHA").unwrap();
        let err = validator().validate_structure(dir.path()).unwrap_err();
        assert!(err.to_string().contains("data/a.txt"), "{err}");
    }

    #[test]
    fn unlisted_payload_fails() {
        let dir = tempfile::tempdir().unwrap();
        write_bag(dir.path(), &good_info());
        fs::write(dir.path().join("data/extra.bin"), "x").unwrap();
        assert!(matches!(
            validator().validate_structure(dir.path()),
            Err(ValidationError::NotInManifest { .. })
        ));
    }

    #[test]
    fn missing_listed_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        write_bag(dir.path(), &good_info());
        fs::remove_file(dir.path().join("data/sub/b.txt")).unwrap();
        assert!(matches!(
            validator().validate_structure(dir.path()),
            Err(ValidationError::ListedButMissing { .. })
        ));
    }

    #[test]
    fn structure_prerequisites() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            validator().validate_structure(dir.path()),
            Err(ValidationError::MissingFile(_))
        ));

        write_bag(dir.path(), &good_info());
        fs::write(dir.path().join("bagit.txt"), "BagIt-Version: 1.0\n").unwrap();
        assert!(matches!(
            validator().validate_structure(dir.path()),
            Err(ValidationError::MissingDeclaration { .. })
        ));
    }

    #[test]
    fn unsupported_algorithm_is_named() {
        let dir = tempfile::tempdir().unwrap();
        write_bag(dir.path(), &good_info());
        fs::write(dir.path().join("manifest-md5.txt"), "").unwrap();
        let err = validator().validate_structure(dir.path()).unwrap_err();
        assert!(err.to_string().contains("md5"), "{err}");
    }

    #[test]
    fn manifest_path_escape_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_bag(dir.path(), &good_info());
        fs::write(
            dir.path().join("manifest-sha256.txt"),
            format!("{}  ../outside\n", sha256_hex(b"")),
        )
        .unwrap();
        assert!(matches!(
            validator().validate_structure(dir.path()),
            Err(ValidationError::MalformedManifest { .. })
        ));
    }

    #[test]
    fn unknown_profile_fails_metadata() {
        let dir = tempfile::tempdir().unwrap();
        write_bag(
            dir.path(),
            &good_info().replace(PROFILE_ID, "https://elsewhere.org/p.json"),
        );
        assert!(matches!(
            validator().validate_metadata(dir.path()),
            Err(ValidationError::ProfileUnavailable { .. })
        ));
    }

    #[test]
    fn profile_value_rule_is_enforced() {
        let dir = tempfile::tempdir().unwrap();
        write_bag(dir.path(), &good_info().replace("digitization", "born_digital"));
        let err = validator().validate_metadata(dir.path()).unwrap_err();
        assert!(err.to_string().contains("born_digital"), "{err}");
    }

    #[test]
    fn missing_profile_identifier_fails() {
        let dir = tempfile::tempdir().unwrap();
        write_bag(dir.path(), "Origin: digitization\n");
        let err = validator().validate_metadata(dir.path()).unwrap_err();
        assert!(err.to_string().contains(FIELD_PROFILE), "{err}");
    }

    #[test]
    fn bag_root_requires_single_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("my-bag")).unwrap();
        assert_eq!(bag_root(dir.path()).unwrap(), dir.path().join("my-bag"));

        fs::write(dir.path().join("stray.txt"), "x").unwrap();
        let err = bag_root(dir.path()).unwrap_err();
        assert!(err.to_string().contains("stray.txt"), "{err}");
    }
}
