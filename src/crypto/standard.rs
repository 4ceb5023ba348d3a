//! Standard security handler: password authentication and per-object
//! key derivation for RC4 and AES-CBC encrypted documents,
//! revisions 2 through 6.
//!
//! Implements the Standard Security Handler algorithms of the PDF
//! standard (`tryPassword`/`supplySeed`-style password gating). RC4
//! and AES-CBC
//! themselves are delegated to the `rc4`/`aes`/`cbc` crates; MD5/SHA-1/
//! SHA-256 are delegated to `md-5`/`sha1`/`sha2`. Only the key-schedule
//! bookkeeping (padding, salting, the 50-round R3+ hash, the R6 hardened
//! hash) is hand-written, since there is no crate for "the PDF standard
//! security handler" itself.

use aes::cipher::{BlockDecryptMut, KeyIvInit};
use cbc::cipher::block_padding::Pkcs7;
use md5::{Digest as Md5Digest, Md5};
use rc4::{KeyInit, Rc4, StreamCipher};
use sha2::{Digest as Sha2Digest, Sha256};

use crate::object::ObjectId;

const PAD: [u8; 32] = [
    0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01, 0x08, 0x2E, 0x2E, 0x00,
    0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53, 0x69, 0x7A,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptMethod {
    Rc4,
    AesV2,
    AesV3,
}

/// Everything out of the `/Encrypt` dictionary needed to authenticate a
/// password and derive object keys.
#[derive(Debug, Clone)]
pub struct StandardHandlerParams {
    pub v: i64,
    pub r: i64,
    pub o: Vec<u8>,
    pub u: Vec<u8>,
    pub oe: Option<Vec<u8>>,
    pub ue: Option<Vec<u8>>,
    pub p: i32,
    pub length_bits: i64,
    pub encrypt_metadata: bool,
    pub id0: Vec<u8>,
    pub method: CryptMethod,
}

fn pad_password(password: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    let n = password.len().min(32);
    out[..n].copy_from_slice(&password[..n]);
    out[n..].copy_from_slice(&PAD[..32 - n]);
    out
}

/// Algorithm 2: compute the RC4/AES-128 file key for revisions 2-4.
fn compute_key_r2_r4(password: &[u8], params: &StandardHandlerParams) -> Vec<u8> {
    let padded = pad_password(password);
    let mut hasher = Md5::new();
    hasher.update(padded);
    hasher.update(&params.o[..params.o.len().min(32)]);
    hasher.update(params.p.to_le_bytes());
    hasher.update(&params.id0);
    if params.r >= 4 && !params.encrypt_metadata {
        hasher.update([0xFF, 0xFF, 0xFF, 0xFF]);
    }
    let mut digest = hasher.finalize().to_vec();

    let key_len = if params.r == 2 { 5 } else { (params.length_bits / 8).clamp(5, 16) as usize };

    if params.r >= 3 {
        for _ in 0..50 {
            let mut h = Md5::new();
            h.update(&digest[..key_len]);
            digest = h.finalize().to_vec();
        }
    }
    digest.truncate(key_len);
    digest
}

/// Algorithm 2.A (ISO 32000-2 / PDF 2.0, also used by Acrobat's R6
/// extension to R5): compute the AES-256 file key from a password and a
/// validation/key salt pulled out of `U`/`UE`.
fn hardened_hash(password: &[u8], salt: &[u8], extra: &[u8], revision: i64) -> [u8; 32] {
    let mut k = {
        let mut h = Sha256::new();
        h.update(password);
        h.update(salt);
        h.update(extra);
        h.finalize().to_vec()
    };

    if revision < 6 {
        let mut out = [0u8; 32];
        out.copy_from_slice(&k[..32]);
        return out;
    }

    // R6 hardening: iterate AES-128-CBC-encrypting K1 = (password||K||extra)
    // repeated 64 times with K as key/IV, taking the SHA-256/384/512 of the
    // result selected by (E mod 3), until round >= 64 and last byte <= round-32.
    let mut round = 0u32;
    loop {
        let mut k1 = Vec::with_capacity(64 * (password.len() + k.len() + extra.len()));
        for _ in 0..64 {
            k1.extend_from_slice(password);
            k1.extend_from_slice(&k);
            k1.extend_from_slice(extra);
        }
        let e = aes_cbc_encrypt_nopad(&k[..16], &k[16..32], &k1);
        let modulus = e[..16].iter().map(|&b| b as u32).sum::<u32>() % 3;
        k = match modulus {
            0 => Sha256::digest(&e).to_vec(),
            1 => sha2::Sha384::digest(&e).to_vec(),
            _ => sha2::Sha512::digest(&e).to_vec(),
        };
        round += 1;
        if round >= 64 && (*e.last().unwrap_or(&0) as u32) <= round - 32 {
            break;
        }
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&k[..32]);
    out
}

fn aes_cbc_encrypt_nopad(key: &[u8], iv: &[u8], data: &[u8]) -> Vec<u8> {
    use aes::cipher::BlockEncryptMut;
    type Enc = cbc::Encryptor<aes::Aes128>;
    let mut buf = data.to_vec();
    // Caller always supplies data that's a multiple of the block size (64
    // repetitions of a fixed-length record), so no padding is needed here.
    let enc = Enc::new(key.into(), iv.into());
    let blocks = buf.len() / 16;
    let (chunks, _) = buf.as_mut_slice().split_at_mut(blocks * 16);
    for block in chunks.chunks_mut(16) {
        let generic = aes::cipher::generic_array::GenericArray::from_mut_slice(block);
        enc.clone().encrypt_block_mut(generic);
    }
    buf
}

/// Tries a password against the document. On success, returns the derived
/// file encryption key. Revision 2-4: RC4/AES-128, validated against `U`.
/// Revision 5/6: AES-256, validated against the first 32 bytes of `U`
/// (the hash) against its own trailing 8-byte validation salt.
pub fn authenticate(password: &[u8], params: &StandardHandlerParams) -> Option<Vec<u8>> {
    if params.r >= 5 {
        return authenticate_r5_r6(password, params);
    }

    let key = compute_key_r2_r4(password, params);
    let expected = compute_u_r2_r4(&key, params);
    let matches = if params.r == 2 {
        expected == params.u
    } else {
        expected[..16.min(expected.len())] == params.u[..16.min(params.u.len())]
    };
    if matches {
        Some(key)
    } else {
        None
    }
}

fn compute_u_r2_r4(key: &[u8], params: &StandardHandlerParams) -> Vec<u8> {
    if params.r == 2 {
        let mut cipher = Rc4::new(key.into());
        let mut buf = PAD;
        cipher.apply_keystream(&mut buf);
        buf.to_vec()
    } else {
        let mut hasher = Md5::new();
        hasher.update(PAD);
        hasher.update(&params.id0);
        let mut digest = hasher.finalize().to_vec();
        for i in 0..20u8 {
            let round_key: Vec<u8> = key.iter().map(|b| b ^ i).collect();
            let mut cipher = Rc4::new(round_key.as_slice().into());
            cipher.apply_keystream(&mut digest);
        }
        digest
    }
}

fn authenticate_r5_r6(password: &[u8], params: &StandardHandlerParams) -> Option<Vec<u8>> {
    if params.u.len() < 48 {
        return None;
    }
    let validation_salt = &params.u[32..40];
    let key_salt = &params.u[40..48];
    let hash = hardened_hash(password, validation_salt, &[], params.r);
    if hash[..] != params.u[..32] {
        return None;
    }
    let ue = params.ue.as_ref()?;
    let intermediate = hardened_hash(password, key_salt, &[], params.r);
    // File key = AES-256-CBC-NoPadding decrypt of UE with the intermediate
    // key and a zero IV.
    type Dec = cbc::Decryptor<aes::Aes256>;
    let iv = [0u8; 16];
    let mut buf = ue.clone();
    let dec = Dec::new((&intermediate[..]).into(), (&iv[..]).into());
    let blocks = buf.len() / 16;
    for block in buf[..blocks * 16].chunks_mut(16) {
        let generic = aes::cipher::generic_array::GenericArray::from_mut_slice(block);
        dec.clone().decrypt_block_mut(generic);
    }
    Some(buf)
}

/// Algorithm 1: derive the per-object RC4/AES-128 key from the file key
/// and the object's id. AES-256 (R5/R6) uses the file key directly.
fn object_key(file_key: &[u8], id: ObjectId, method: CryptMethod) -> Vec<u8> {
    if method == CryptMethod::AesV3 {
        return file_key.to_vec();
    }
    let mut hasher = Md5::new();
    hasher.update(file_key);
    hasher.update([(id.0 & 0xFF) as u8, ((id.0 >> 8) & 0xFF) as u8, ((id.0 >> 16) & 0xFF) as u8]);
    hasher.update([(id.1 & 0xFF) as u8, ((id.1 >> 8) & 0xFF) as u8]);
    if method == CryptMethod::AesV2 {
        hasher.update(b"sAlT");
    }
    let digest = hasher.finalize();
    let key_len = (file_key.len() + 5).min(16);
    digest[..key_len].to_vec()
}

/// Decrypts one string or stream payload belonging to `id`.
pub fn decrypt(file_key: &[u8], id: ObjectId, method: CryptMethod, data: &[u8]) -> Vec<u8> {
    let key = object_key(file_key, id, method);
    match method {
        CryptMethod::Rc4 => {
            let mut cipher = Rc4::new(key.as_slice().into());
            let mut buf = data.to_vec();
            cipher.apply_keystream(&mut buf);
            buf
        }
        CryptMethod::AesV2 | CryptMethod::AesV3 => {
            if data.len() < 16 {
                return Vec::new();
            }
            let (iv, ciphertext) = data.split_at(16);
            if ciphertext.is_empty() || ciphertext.len() % 16 != 0 {
                return Vec::new();
            }
            let result = if method == CryptMethod::AesV2 {
                cbc::Decryptor::<aes::Aes128>::new(key.as_slice().into(), iv.into())
                    .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            } else {
                cbc::Decryptor::<aes::Aes256>::new(key.as_slice().into(), iv.into())
                    .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            };
            result.unwrap_or_default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_params(r: i64, v: i64) -> StandardHandlerParams {
        // Empty user password, minimal /O placeholder — enough to drive
        // the key-schedule math without asserting against a real file.
        StandardHandlerParams {
            v,
            r,
            o: vec![0u8; 32],
            u: vec![0u8; 32],
            oe: None,
            ue: None,
            p: -4,
            length_bits: 128,
            encrypt_metadata: true,
            id0: vec![1, 2, 3, 4],
            method: CryptMethod::Rc4,
        }
    }

    #[test]
    fn r2_key_is_five_bytes() {
        let params = sample_params(2, 1);
        let key = compute_key_r2_r4(b"", &params);
        assert_eq!(key.len(), 5);
    }

    #[test]
    fn r4_key_respects_length_bits() {
        let params = sample_params(4, 4);
        let key = compute_key_r2_r4(b"", &params);
        assert_eq!(key.len(), 16);
    }

    #[test]
    fn rc4_object_key_differs_per_object() {
        let file_key = vec![1u8; 5];
        let k1 = object_key(&file_key, (1, 0), CryptMethod::Rc4);
        let k2 = object_key(&file_key, (2, 0), CryptMethod::Rc4);
        assert_ne!(k1, k2);
    }

    #[test]
    fn rc4_round_trip() {
        let file_key = vec![9u8; 5];
        let plaintext = b"Hello, encrypted PDF world!".to_vec();
        let id = (3, 0);
        let ciphertext = decrypt(&file_key, id, CryptMethod::Rc4, &plaintext);
        // RC4 is symmetric: decrypting the ciphertext again yields plaintext.
        let round_tripped = decrypt(&file_key, id, CryptMethod::Rc4, &ciphertext);
        assert_eq!(round_tripped, plaintext);
    }

    /// Builds the `/U` entry the way Algorithm 5 derives it from a file key
    /// (`compute_u_r2_r4`), the same one `compute_key_r2_r4` would derive
    /// for a given password — then checks `authenticate` accepts that
    /// password and rejects a different one, the R3/R4 round-trip law.
    #[test]
    fn r4_authenticate_round_trips_against_its_own_u_value() {
        let mut params = sample_params(4, 4);
        let key = compute_key_r2_r4(b"open sesame", &params);
        params.u = compute_u_r2_r4(&key, &params);

        assert_eq!(authenticate(b"open sesame", &params), Some(key));
        assert_eq!(authenticate(b"wrong password", &params), None);
    }
}
