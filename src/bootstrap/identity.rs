//! Local identity: loading and validating the node's signing material.
//!
//! Layout under `peer.mspConfigPath`:
//! ```text
//! msp/
//! ├── cacerts/*.pub        (32-byte ed25519 CA verifying keys)
//! ├── signcerts/*.toml     (signing certificate issued by one of the CAs)
//! └── keystore/*_sk        (32-byte signing key seed, mode 0600)
//! ```
//!
//! A certificate binds `(msp_id, subject, public_key)` and is signed by a CA
//! key. The context is only handed out once every piece checks out against
//! the configured organisation.

use std::{
    fmt, fs,
    path::{Path, PathBuf},
};

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::IdentityError;

const CACERTS_DIR: &str = "cacerts";
const SIGNCERTS_DIR: &str = "signcerts";
const KEYSTORE_DIR: &str = "keystore";

/// Domain separator for certificate signatures.
const CERT_CONTEXT: &[u8] = b"peer-node/cert/v1";

/// Signing certificate as stored in `signcerts/`. Binary fields are hex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    pub msp_id: String,
    pub subject: String,
    pub public_key: String,
    /// Verifying key of the issuing CA.
    pub issuer: String,
    pub signature: String,
}

/// Identity record attached to signed payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedIdentity {
    pub msp_id: String,
    pub subject: String,
    /// Hex verifying key.
    pub public_key: String,
}

/// Validated identity of this node. Immutable once built.
#[derive(Clone)]
pub struct IdentityContext {
    msp_id: String,
    subject: String,
    node_id: String,
    material_dir: PathBuf,
    certificate: Certificate,
    signing_key: SigningKey,
}

impl fmt::Debug for IdentityContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityContext")
            .field("msp_id", &self.msp_id)
            .field("subject", &self.subject)
            .field("node_id", &self.node_id)
            .field("material_dir", &self.material_dir)
            .finish_non_exhaustive()
    }
}

impl IdentityContext {
    pub fn msp_id(&self) -> &str {
        &self.msp_id
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// First 8 hex chars of `SHA256(verifying_key)`.
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn material_dir(&self) -> &Path {
        &self.material_dir
    }

    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        self.signing_key.sign(message)
    }

    pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
        self.verifying_key().verify(message, signature).is_ok()
    }

    pub fn serialize(&self) -> SerializedIdentity {
        SerializedIdentity {
            msp_id: self.msp_id.clone(),
            subject: self.subject.clone(),
            public_key: self.certificate.public_key.clone(),
        }
    }
}

/// Load and validate the identity material in `material_dir` for `msp_id`.
pub fn init(material_dir: &Path, msp_id: &str) -> Result<IdentityContext, IdentityError> {
    if !material_dir.is_dir() {
        return Err(IdentityError::MissingMaterial(format!(
            "cannot init crypto, missing {} folder",
            material_dir.display()
        )));
    }

    let cas = load_ca_keys(&material_dir.join(CACERTS_DIR))?;
    let certificate = load_certificate(&material_dir.join(SIGNCERTS_DIR))?;

    if certificate.msp_id != msp_id {
        return Err(IdentityError::OrganizationMismatch {
            expected: msp_id.to_string(),
            found: certificate.msp_id.clone(),
        });
    }

    let public_key = decode_key(&certificate.public_key, "certificate public_key")?;
    let issuer = decode_key(&certificate.issuer, "certificate issuer")?;
    let signature = decode_signature(&certificate.signature)?;

    let ca = cas
        .iter()
        .find(|ca| ca.to_bytes() == issuer)
        .ok_or_else(|| {
            IdentityError::MalformedMaterial("certificate is not issued by a trusted CA".into())
        })?;
    let tbs = certificate_payload(&certificate.msp_id, &certificate.subject, &public_key);
    ca.verify(&tbs, &signature).map_err(|_| {
        IdentityError::MalformedMaterial("certificate signature does not verify".into())
    })?;

    let signing_key = find_signing_key(&material_dir.join(KEYSTORE_DIR), &public_key)?;

    Ok(IdentityContext {
        msp_id: certificate.msp_id.clone(),
        subject: certificate.subject.clone(),
        node_id: compute_node_id(&public_key),
        material_dir: material_dir.to_path_buf(),
        certificate,
        signing_key,
    })
}

/// Provision a fresh CA and node key set under `dir` for development use.
///
/// Existing material in `dir` is left alone; new files are added next to it.
pub fn enroll(dir: &Path, msp_id: &str, subject: &str) -> Result<(), IdentityError> {
    let ca = SigningKey::generate(&mut OsRng);
    let node = SigningKey::generate(&mut OsRng);
    let node_pub = node.verifying_key().to_bytes();
    let node_id = compute_node_id(&node_pub);

    let certificate = Certificate {
        msp_id: msp_id.to_string(),
        subject: subject.to_string(),
        public_key: hex::encode(node_pub),
        issuer: hex::encode(ca.verifying_key().to_bytes()),
        signature: hex::encode(
            ca.sign(&certificate_payload(msp_id, subject, &node_pub))
                .to_bytes(),
        ),
    };
    let cert_text = toml::to_string(&certificate)
        .map_err(|e| IdentityError::MalformedMaterial(format!("cannot encode certificate: {e}")))?;

    for sub in [CACERTS_DIR, SIGNCERTS_DIR, KEYSTORE_DIR] {
        fs::create_dir_all(dir.join(sub)).map_err(|e| write_error(&dir.join(sub), e))?;
    }

    let ca_path = dir.join(CACERTS_DIR).join(format!("ca-{node_id}.pub"));
    fs::write(&ca_path, ca.verifying_key().to_bytes()).map_err(|e| write_error(&ca_path, e))?;

    let cert_path = dir.join(SIGNCERTS_DIR).join(format!("{node_id}-cert.toml"));
    fs::write(&cert_path, cert_text).map_err(|e| write_error(&cert_path, e))?;

    let key_path = dir.join(KEYSTORE_DIR).join(format!("{node_id}_sk"));
    fs::write(&key_path, node.to_bytes()).map_err(|e| write_error(&key_path, e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&key_path, fs::Permissions::from_mode(0o600))
            .map_err(|e| write_error(&key_path, e))?;
    }

    Ok(())
}

/// Derive `node_id`: first 8 hex chars of `SHA256(verifying_key_bytes)`.
pub fn compute_node_id(verifying_key_bytes: &[u8; 32]) -> String {
    let digest = Sha256::digest(verifying_key_bytes);
    hex::encode(digest)[..8].to_string()
}

// ── internals ────────────────────────────────────────────────────────────────

fn certificate_payload(msp_id: &str, subject: &str, public_key: &[u8; 32]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(CERT_CONTEXT.len() + msp_id.len() + subject.len() + 34);
    payload.extend_from_slice(CERT_CONTEXT);
    payload.push(0);
    payload.extend_from_slice(msp_id.as_bytes());
    payload.push(0);
    payload.extend_from_slice(subject.as_bytes());
    payload.push(0);
    payload.extend_from_slice(public_key);
    payload
}

/// Files in `dir` accepted by `keep`, sorted by name.
fn list_files(dir: &Path, keep: impl Fn(&str) -> bool) -> Result<Vec<PathBuf>, IdentityError> {
    let entries = fs::read_dir(dir).map_err(|_| {
        IdentityError::MissingMaterial(format!("missing {} folder", dir.display()))
    })?;
    let mut files: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.file_name()
                .map(|n| keep(&n.to_string_lossy()))
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    Ok(files)
}

fn read_key_file(path: &Path) -> Result<[u8; 32], IdentityError> {
    let bytes = fs::read(path).map_err(|e| {
        IdentityError::MalformedMaterial(format!("cannot read {}: {e}", path.display()))
    })?;
    bytes.try_into().map_err(|_| {
        IdentityError::MalformedMaterial(format!("{} is not 32 bytes", path.display()))
    })
}

fn load_ca_keys(dir: &Path) -> Result<Vec<VerifyingKey>, IdentityError> {
    let files = list_files(dir, |name| name.ends_with(".pub"))?;
    if files.is_empty() {
        return Err(IdentityError::MissingMaterial(format!(
            "no CA keys in {}",
            dir.display()
        )));
    }
    files
        .iter()
        .map(|path| {
            let bytes = read_key_file(path)?;
            VerifyingKey::from_bytes(&bytes).map_err(|_| {
                IdentityError::MalformedMaterial(format!(
                    "{} is not a valid ed25519 key",
                    path.display()
                ))
            })
        })
        .collect()
}

fn load_certificate(dir: &Path) -> Result<Certificate, IdentityError> {
    let files = list_files(dir, |name| name.ends_with(".toml"))?;
    let path = files.first().ok_or_else(|| {
        IdentityError::MissingMaterial(format!("no signing certificate in {}", dir.display()))
    })?;
    let raw = fs::read_to_string(path).map_err(|e| {
        IdentityError::MalformedMaterial(format!("cannot read {}: {e}", path.display()))
    })?;
    toml::from_str(&raw).map_err(|e| {
        IdentityError::MalformedMaterial(format!("cannot parse {}: {e}", path.display()))
    })
}

/// Keystore entry whose public half is `public_key`.
fn find_signing_key(dir: &Path, public_key: &[u8; 32]) -> Result<SigningKey, IdentityError> {
    for path in list_files(dir, |name| name.ends_with("_sk"))? {
        let seed = read_key_file(&path)?;
        let key = SigningKey::from_bytes(&seed);
        if key.verifying_key().to_bytes() == *public_key {
            return Ok(key);
        }
    }
    Err(IdentityError::MissingMaterial(format!(
        "no private key in {} matches the signing certificate",
        dir.display()
    )))
}

fn decode_key(hex_text: &str, what: &str) -> Result<[u8; 32], IdentityError> {
    hex::decode(hex_text.trim())
        .ok()
        .and_then(|bytes| <[u8; 32]>::try_from(bytes).ok())
        .ok_or_else(|| IdentityError::MalformedMaterial(format!("{what} is not a 32-byte hex key")))
}

fn decode_signature(hex_text: &str) -> Result<Signature, IdentityError> {
    hex::decode(hex_text.trim())
        .ok()
        .and_then(|bytes| Signature::from_slice(&bytes).ok())
        .ok_or_else(|| {
            IdentityError::MalformedMaterial("certificate signature is not valid hex".into())
        })
}

fn write_error(path: &Path, e: std::io::Error) -> IdentityError {
    IdentityError::MalformedMaterial(format!("cannot write {}: {e}", path.display()))
}

// ── tests ─────────────────────────────────────────────────────────────────────
