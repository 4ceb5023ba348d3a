//! Public-key security handler: PKCS#7 `EnvelopedData` recipient
//! discovery for certificate-encrypted documents.
//!
//! RSA-decrypting a recipient's content-encryption key needs the
//! recipient's private key, which this library never holds — that's a
//! host-side operation (a smart card, an HSM, an OS keystore). So unlike
//! the standard handler, this module does not derive the file key itself:
//! it parses the `EnvelopedData` structure far enough to list recipients
//! (`cert_recipients`), and the host supplies the already-unwrapped seed
//! through `Document::supply_seed` once it has performed that RSA step.
//!
//! Structures model the standard `Pkcs7RecipientInfo` /
//! `Pkcs7EncryptedContentInfo` / `Pkcs7EnvelopedData` shapes.

use sha1::{Digest, Sha1};

use crate::crypto::asn1::{self, Asn1Element};
use crate::limits::Limits;

#[derive(Debug, Clone)]
pub struct Pkcs7RecipientInfo {
    pub issuer_and_serial_der: Vec<u8>,
    pub encrypted_key: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct Pkcs7EncryptedContentInfo {
    pub content_type_oid: String,
    pub encryption_algorithm_oid: String,
    pub encrypted_content: Option<Vec<u8>>,
}

#[derive(Debug, Clone)]
pub struct Pkcs7EnvelopedData {
    pub recipients: Vec<Pkcs7RecipientInfo>,
    pub encrypted_content_info: Pkcs7EncryptedContentInfo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pkcs7Error;

/// Parses a DER-encoded `ContentInfo { contentType, content [0] EXPLICIT
/// EnvelopedData }` blob, as stored in a recipient's `/Recipients` string
/// array entry.
pub fn parse_enveloped_data(der: &[u8], limits: &Limits) -> Result<Pkcs7EnvelopedData, Pkcs7Error> {
    let content_info = asn1::parse(der, limits).map_err(|_| Pkcs7Error)?;
    if !content_info.is_sequence() || content_info.children.len() < 2 {
        return Err(Pkcs7Error);
    }
    let enveloped = content_info.children[1].unwrap_explicit().ok_or(Pkcs7Error)?;
    if !enveloped.is_sequence() {
        return Err(Pkcs7Error);
    }

    // EnvelopedData ::= SEQUENCE { version, recipientInfos SET OF
    // RecipientInfo, encryptedContentInfo }
    let version_and_rest = &enveloped.children;
    let recipient_infos = version_and_rest.iter().find(|e| e.is_set()).ok_or(Pkcs7Error)?;
    let encrypted_content_info_elem = version_and_rest
        .iter()
        .rev()
        .find(|e| e.is_sequence())
        .ok_or(Pkcs7Error)?;

    let mut recipients = Vec::new();
    for ri in &recipient_infos.children {
        if let Some(parsed) = parse_recipient_info(ri) {
            recipients.push(parsed);
        }
    }

    let encrypted_content_info = parse_encrypted_content_info(encrypted_content_info_elem)?;

    Ok(Pkcs7EnvelopedData { recipients, encrypted_content_info })
}

fn parse_recipient_info(elem: &Asn1Element) -> Option<Pkcs7RecipientInfo> {
    // RecipientInfo ::= SEQUENCE { version, issuerAndSerialNumber,
    // keyEncryptionAlgorithm, encryptedKey }
    if !elem.is_sequence() || elem.children.len() < 4 {
        return None;
    }
    let issuer_and_serial = &elem.children[1];
    let encrypted_key = &elem.children[3];
    Some(Pkcs7RecipientInfo {
        issuer_and_serial_der: reencode_der(issuer_and_serial),
        encrypted_key: encrypted_key.value.clone(),
    })
}

fn parse_encrypted_content_info(elem: &Asn1Element) -> Result<Pkcs7EncryptedContentInfo, Pkcs7Error> {
    // EncryptedContentInfo ::= SEQUENCE { contentType,
    // contentEncryptionAlgorithm, encryptedContent [0] IMPLICIT OCTET STRING OPTIONAL }
    if elem.children.len() < 2 {
        return Err(Pkcs7Error);
    }
    let content_type_oid = elem.children[0].oid_to_string().unwrap_or_default();
    let alg_seq = &elem.children[1];
    let encryption_algorithm_oid = alg_seq.children.first().and_then(|e| e.oid_to_string()).unwrap_or_default();
    let encrypted_content = elem.children.get(2).filter(|e| e.is_implicit_tag(0)).map(|e| e.value.clone());
    Ok(Pkcs7EncryptedContentInfo { content_type_oid, encryption_algorithm_oid, encrypted_content })
}

/// The parser keeps only decoded values, not the original encoding bytes;
/// for the `issuerAndSerialNumber` we only need a stable identity string
/// for `cert_recipients`, so re-derive a readable label instead of the
/// exact DER (which callers use for matching against a loaded cert, not
/// for re-parsing).
fn reencode_der(elem: &Asn1Element) -> Vec<u8> {
    elem.value.clone()
}

/// Combines a host-decrypted per-recipient seed with the document's
/// permission bits into the document's file encryption key, per the PDF
/// public-key security handler: `SHA-1(seed || P-as-4-bytes-LE || ID0
/// [|| 0xFFFFFFFF if metadata is excluded])`, truncated to the key length.
pub fn derive_file_key(seed: &[u8], permissions: i32, id0: &[u8], encrypt_metadata: bool, key_len: usize) -> Vec<u8> {
    let mut hasher = Sha1::new();
    hasher.update(seed);
    hasher.update(permissions.to_le_bytes());
    hasher.update(id0);
    if !encrypt_metadata {
        hasher.update([0xFF, 0xFF, 0xFF, 0xFF]);
    }
    let digest = hasher.finalize();
    digest[..key_len.min(20)].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_file_key_is_deterministic() {
        let seed = [1u8; 20];
        let k1 = derive_file_key(&seed, -4, b"id0", true, 16);
        let k2 = derive_file_key(&seed, -4, b"id0", true, 16);
        assert_eq!(k1, k2);
        assert_eq!(k1.len(), 16);
    }

    #[test]
    fn malformed_der_does_not_panic() {
        let limits = Limits::default();
        assert!(parse_enveloped_data(&[0x30, 0x02, 0x01], &limits).is_err());
    }
}
