//! Decrypt service.
//!
//! Wraps the standard (password) and public-key (certificate) security
//! handlers behind one small state machine: a document is either
//! unencrypted, waiting for credentials, or unlocked with a file key in
//! hand. Every string and stream read after the arena is populated passes
//! through [`DocumentCrypto::decrypt`] before anything else touches it.

pub mod asn1;
pub mod pubsec;
pub mod standard;

use crate::limits::Limits;
use crate::object::{Dictionary, Object, ObjectId};
use pubsec::Pkcs7EnvelopedData;
use standard::{CryptMethod, StandardHandlerParams};

/// Where a document's encryption currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptionStatus {
    /// No `/Encrypt` dictionary; nothing to unlock.
    None,
    /// Standard (password) handler, waiting on `try_password`.
    PendingPassword,
    /// Public-key handler, waiting on `supply_seed`.
    PendingSeed,
    /// Unlocked; strings and streams can be read.
    Unlocked,
}

enum Handler {
    None,
    Standard(StandardHandlerParams),
    PublicKey { recipients: Vec<Pkcs7EnvelopedData>, permissions: i32, id0: Vec<u8>, encrypt_metadata: bool, key_len: usize },
}

pub struct DocumentCrypto {
    handler: Handler,
    method: CryptMethod,
    file_key: Option<Vec<u8>>,
}

impl DocumentCrypto {
    pub fn unencrypted() -> Self {
        DocumentCrypto { handler: Handler::None, method: CryptMethod::Rc4, file_key: None }
    }

    /// Builds a crypto state from a document's `/Encrypt` dictionary and
    /// the trailer's `/ID` array. Returns `unencrypted()` if `encrypt` is
    /// `None` or its filter isn't recognized.
    pub fn from_encrypt_dict(encrypt: Option<&Dictionary>, id0: Vec<u8>, limits: &Limits) -> Self {
        let Some(encrypt) = encrypt else {
            return Self::unencrypted();
        };
        let filter = encrypt.get("Filter").and_then(|o| o.as_name()).map(|n| n.as_str_lossy().into_owned());
        let v = encrypt.get("V").and_then(|o| o.as_int()).unwrap_or(0);
        let r = encrypt.get("R").and_then(|o| o.as_int()).unwrap_or(2);
        let length_bits = encrypt.get("Length").and_then(|o| o.as_int()).unwrap_or(40);
        let p = encrypt.get("P").and_then(|o| o.as_int()).unwrap_or(-1) as i32;
        let encrypt_metadata = encrypt.get("EncryptMetadata").map(|o| matches!(o, Object::Boolean(true))).unwrap_or(true);

        let method = crypt_method_for(encrypt, v);

        if matches!(filter.as_deref(), Some("Adobe.PubSec")) {
            let recipients = encrypt
                .get("Recipients")
                .and_then(|o| o.as_array())
                .map(|arr| {
                    arr.iter()
                        .filter_map(|o| o.as_string_bytes())
                        .filter_map(|der| pubsec::parse_enveloped_data(der, limits).ok())
                        .collect()
                })
                .unwrap_or_default();
            let key_len = (length_bits / 8).clamp(5, 32) as usize;
            return DocumentCrypto {
                handler: Handler::PublicKey { recipients, permissions: p, id0, encrypt_metadata, key_len },
                method,
                file_key: None,
            };
        }

        let params = StandardHandlerParams {
            v,
            r,
            o: string_entry(encrypt, "O"),
            u: string_entry(encrypt, "U"),
            oe: opt_string_entry(encrypt, "OE"),
            ue: opt_string_entry(encrypt, "UE"),
            p,
            length_bits,
            encrypt_metadata,
            id0,
            method,
        };
        DocumentCrypto { handler: Handler::Standard(params), method, file_key: None }
    }

    pub fn status(&self) -> EncryptionStatus {
        match (&self.handler, &self.file_key) {
            (Handler::None, _) => EncryptionStatus::None,
            (_, Some(_)) => EncryptionStatus::Unlocked,
            (Handler::Standard(_), None) => EncryptionStatus::PendingPassword,
            (Handler::PublicKey { .. }, None) => EncryptionStatus::PendingSeed,
        }
    }

    /// Tries a password against the standard security handler. Returns
    /// `true` and unlocks on success; a no-op (returns `false`) for a
    /// public-key-protected or already-unlocked document.
    pub fn try_password(&mut self, password: &[u8]) -> bool {
        let Handler::Standard(params) = &self.handler else {
            return false;
        };
        match standard::authenticate(password, params) {
            Some(key) => {
                self.file_key = Some(key);
                true
            }
            None => false,
        }
    }

    /// Supplies a recipient's already-RSA-unwrapped content-encryption
    /// seed for the public-key handler (see [`pubsec`] module docs for why
    /// the RSA step itself is a host responsibility).
    pub fn supply_seed(&mut self, seed: &[u8]) -> bool {
        let Handler::PublicKey { permissions, id0, encrypt_metadata, key_len, .. } = &self.handler else {
            return false;
        };
        self.file_key = Some(pubsec::derive_file_key(seed, *permissions, id0, *encrypt_metadata, *key_len));
        true
    }

    /// Lists the certificate recipients a public-key-encrypted document
    /// names, as opaque issuer/serial identity blobs a host matches
    /// against its own certificate store.
    pub fn cert_recipients(&self) -> Vec<Vec<u8>> {
        match &self.handler {
            Handler::PublicKey { recipients, .. } => recipients
                .iter()
                .flat_map(|env| env.recipients.iter().map(|r| r.issuer_and_serial_der.clone()))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Decrypts a string or stream payload belonging to `id`. No-op if
    /// the document isn't encrypted or isn't unlocked yet (callers check
    /// [`Self::status`] first).
    pub fn decrypt(&self, id: ObjectId, data: &[u8]) -> Option<Vec<u8>> {
        let key = self.file_key.as_ref()?;
        Some(standard::decrypt(key, id, self.method, data))
    }

    pub fn is_encrypted(&self) -> bool {
        !matches!(self.handler, Handler::None)
    }
}

fn crypt_method_for(encrypt: &Dictionary, v: i64) -> CryptMethod {
    if v < 4 {
        return CryptMethod::Rc4;
    }
    // V4/V5: look up StmF in /CF for the actual cipher (AESV2/AESV3);
    // default to RC4 if the crypt-filter dictionary is absent/unrecognized.
    let stm_f = encrypt.get("StmF").and_then(|o| o.as_name()).map(|n| n.as_str_lossy().into_owned());
    let cf = encrypt.get("CF").and_then(|o| o.as_dict());
    let cfm = stm_f
        .as_deref()
        .and_then(|name| cf.and_then(|cf| cf.get(name)))
        .and_then(|o| o.as_dict())
        .and_then(|d| d.get("CFM"))
        .and_then(|o| o.as_name())
        .map(|n| n.as_str_lossy().into_owned());
    match cfm.as_deref() {
        Some("AESV2") => CryptMethod::AesV2,
        Some("AESV3") => CryptMethod::AesV3,
        Some("V2") => CryptMethod::Rc4,
        _ if v == 5 => CryptMethod::AesV3,
        _ => CryptMethod::Rc4,
    }
}

fn string_entry(dict: &Dictionary, key: &str) -> Vec<u8> {
    dict.get(key).and_then(|o| o.as_string_bytes()).map(|b| b.to_vec()).unwrap_or_default()
}

fn opt_string_entry(dict: &Dictionary, key: &str) -> Option<Vec<u8>> {
    dict.get(key).and_then(|o| o.as_string_bytes()).map(|b| b.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unencrypted_document_reports_none() {
        let crypto = DocumentCrypto::from_encrypt_dict(None, vec![], &Limits::default());
        assert_eq!(crypto.status(), EncryptionStatus::None);
        assert!(!crypto.is_encrypted());
    }

    #[test]
    fn standard_handler_starts_pending() {
        let mut encrypt = Dictionary::new();
        encrypt.set("Filter", Object::Name("Standard".into()));
        encrypt.set("V", Object::Number(1.0));
        encrypt.set("R", Object::Number(2.0));
        encrypt.set("O", Object::String(vec![0u8; 32]));
        encrypt.set("U", Object::String(vec![0u8; 32]));
        encrypt.set("P", Object::Number(-3904.0));
        let crypto = DocumentCrypto::from_encrypt_dict(Some(&encrypt), vec![1, 2, 3, 4], &Limits::default());
        assert_eq!(crypto.status(), EncryptionStatus::PendingPassword);
    }
}
