#![allow(dead_code)]

use flate2::write::GzEncoder;
use flate2::Compression;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use tiny_http::{Response, Server, StatusCode};
use zorya_core::{Pipeline, PipelineConfig};
use zorya_schema::{BagStatus, OriginalName};
use zorya_store::BagRecord;

pub const PROFILE_ID: &str = "https://profiles.example.org/zorya.json";

pub const PROFILE_JSON: &str = r#"{
    "BagIt-Profile-Info": {"BagIt-Profile-Identifier": "https://profiles.example.org/zorya.json"},
    "Bag-Info": {
        "Origin": {"required": true, "values": ["digitization", "legacy_digital"]},
        "Rights-ID": {"required": true},
        "End-Date": {"required": true}
    },
    "Manifests-Required": ["sha256"],
    "Accept-BagIt-Version": ["1.0"]
}"#;

pub fn good_info() -> String {
    format!(
        "BagIt-Profile-Identifier: {PROFILE_ID}\nOrigin: digitization\n\
         Rights-ID: 7 9\nStart-Date: 2000-01-01\nEnd-Date: 2010-12-31\n"
    )
}

/// A 32-character token followed by `ext`.
pub fn archive_name(n: usize, ext: &str) -> String {
    format!("{n:032}{ext}")
}

#[derive(Debug, Clone)]
pub struct Captured {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

type Handler = Box<dyn Fn(&Captured) -> (u16, String) + Send>;

/// A collaborator that answers with `handler` and records every request.
pub struct MockService {
    pub url: String,
    requests: Arc<Mutex<Vec<Captured>>>,
    server: Arc<Server>,
    handle: Option<JoinHandle<()>>,
}

impl MockService {
    pub fn start(handler: impl Fn(&Captured) -> (u16, String) + Send + 'static) -> Self {
        let handler: Handler = Box::new(handler);
        let server = Arc::new(Server::http("127.0.0.1:0").unwrap());
        let port = server.server_addr().to_ip().unwrap().port();
        let requests = Arc::new(Mutex::new(Vec::new()));

        let srv = Arc::clone(&server);
        let reqs = Arc::clone(&requests);
        let handle = std::thread::spawn(move || {
            for mut req in srv.incoming_requests() {
                let mut body = String::new();
                let _ = req.as_reader().read_to_string(&mut body);
                let captured = Captured {
                    method: req.method().to_string(),
                    path: req.url().to_owned(),
                    headers: req
                        .headers()
                        .iter()
                        .map(|h| (h.field.to_string().to_ascii_lowercase(), h.value.to_string()))
                        .collect(),
                    body,
                };
                let (code, payload) = handler(&captured);
                reqs.lock().unwrap().push(captured);
                let _ = req.respond(Response::from_string(payload).with_status_code(StatusCode(code)));
            }
        });

        Self {
            url: format!("http://127.0.0.1:{port}"),
            requests,
            server,
            handle: Some(handle),
        }
    }

    pub fn ok() -> Self {
        Self::start(|req| match req.method.as_str() {
            "POST" => (200, r#"{"rights_statements": [{"basis": "copyright"}]}"#.to_owned()),
            _ => (405, String::new()),
        })
    }

    pub fn requests(&self) -> Vec<Captured> {
        self.requests.lock().unwrap().clone()
    }
}

impl Drop for MockService {
    fn drop(&mut self) {
        self.server.unblock();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Lay out a BagIt bag with two payload files under `root`.
pub fn write_bag(root: &Path, bag_info: &str) {
    fs::create_dir_all(root.join("data/scans")).unwrap();
    fs::write(
        root.join("bagit.txt"),
        "BagIt-Version: 1.0\nTag-File-Character-Encoding: UTF-8\n",
    )
    .unwrap();
    fs::write(root.join("data/letter.txt"), "dear archivist").unwrap();
    fs::write(root.join("data/scans/p1.txt"), "page one").unwrap();
    fs::write(
        root.join("manifest-sha256.txt"),
        format!(
            "{}  data/letter.txt\n{}  data/scans/p1.txt\n",
            sha256_hex(b"dear archivist"),
            sha256_hex(b"page one")
        ),
    )
    .unwrap();
    fs::write(root.join("bag-info.txt"), bag_info).unwrap();
}

/// Tar `bag_dir` under a top-level `bag/` directory into `dest`,
/// gzip-compressed unless `dest` ends in `.tar`.
pub fn write_archive(bag_dir: &Path, dest: &Path) {
    let file = fs::File::create(dest).unwrap();
    if dest.to_string_lossy().ends_with(".tar") {
        let mut builder = tar::Builder::new(file);
        builder.append_dir_all("bag", bag_dir).unwrap();
        builder.into_inner().unwrap();
    } else {
        let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
        builder.append_dir_all("bag", bag_dir).unwrap();
        builder.into_inner().unwrap().finish().unwrap();
    }
}

/// A complete pipeline on temporary directories with a directory origin,
/// a local profile and mock rights and delivery services.
pub struct Harness {
    pub root: tempfile::TempDir,
    pub config: PipelineConfig,
    pub rights: MockService,
    pub delivery: MockService,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_services(MockService::ok(), MockService::start(|_| (201, String::new())))
    }

    pub fn with_services(rights: MockService, delivery: MockService) -> Self {
        let root = tempfile::tempdir().unwrap();
        let base = root.path();
        let profiles = base.join("profiles");
        fs::create_dir_all(&profiles).unwrap();
        fs::write(profiles.join("zorya.json"), PROFILE_JSON).unwrap();
        fs::create_dir_all(base.join("origin")).unwrap();

        let toml = format!(
            r#"
store_dir = "{b}/store"
inbox_dir = "{b}/inbox"
working_dir = "{b}/working"
destination_dir = "{b}/dest"
http_timeout_secs = 5

[origin]
kind = "directory"
path = "{b}/origin"

[rights]
url = "{rights}/api/rights/"
api_key = "rights-key"

[delivery]
url = "{delivery}/api/packages/"
api_key = "delivery-key"

[profiles]
dir = "{b}/profiles"
"#,
            b = base.display(),
            rights = rights.url,
            delivery = delivery.url,
        );
        let config = PipelineConfig::parse(&toml).unwrap();
        config.validate().unwrap();
        Self {
            root,
            config,
            rights,
            delivery,
        }
    }

    pub fn pipeline(&self) -> Pipeline {
        Pipeline::open(&self.config).unwrap()
    }

    pub fn origin_dir(&self) -> PathBuf {
        self.root.path().join("origin")
    }

    /// Build a bag with `bag_info` and drop it at the origin as `name`.
    pub fn offer(&self, name: &str, bag_info: &str) {
        let scratch = tempfile::tempdir().unwrap();
        write_bag(scratch.path(), bag_info);
        write_archive(scratch.path(), &self.origin_dir().join(name));
    }

    /// Insert a record in `status` with the bag already extracted to its
    /// working location, as discovery would have left it.
    pub fn seed_discovered(&self, pipeline: &Pipeline, name: &str, status: BagStatus) -> BagRecord {
        let mut record = BagRecord::new(
            zorya_schema::BagId::generate(),
            OriginalName::new(name),
            status,
        );
        let bag_dir = pipeline.areas().bag_path(&record.identifier);
        write_bag(&bag_dir, &good_info());
        record.origin = Some(zorya_schema::Origin::Digitization);
        record.rights_reference = vec!["7".to_owned(), "9".to_owned()];
        record.date_range = zorya_schema::DateRange::new(
            chrono::NaiveDate::from_ymd_opt(2000, 1, 1),
            chrono::NaiveDate::from_ymd_opt(2010, 12, 31).unwrap(),
        );
        record.profile_identifier = Some(PROFILE_ID.to_owned());
        record.local_path = Some(bag_dir);
        if status != BagStatus::Discovered {
            record.rights_payload = Some(serde_json::json!({"rights_statements": [{"basis": "copyright"}]}));
        }
        pipeline.records().insert(&record).unwrap()
    }
}
