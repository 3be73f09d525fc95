// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF password protection — RC4 128-bit standard security handler via lopdf.

use lopdf::{Document, EncryptionState, EncryptionVersion, Object, Permissions, StringFormat};
use blattwerk_core::error::{BlattwerkError, Result};
use sha2::{Digest, Sha256};
use tracing::{info, instrument};

use super::reader::{load, load_raw, save};

/// Key length of the standard security handler, in bits.
const KEY_LENGTH: usize = 128;

/// Encrypt `data` so that `password` is required to open it.
///
/// The same password is used as user and owner password, and every
/// permission is granted once the document is opened.
#[instrument(skip_all, fields(bytes_len = data.len()))]
pub fn protect(data: &[u8], password: &str) -> Result<Vec<u8>> {
    if password.is_empty() {
        return Err(BlattwerkError::unsupported_argument("password must not be empty"));
    }
    let mut doc = load(data)?;
    ensure_document_id(&mut doc, data);

    let state = EncryptionState::try_from(EncryptionVersion::V2 {
        document: &doc,
        owner_password: password,
        user_password: password,
        key_length: KEY_LENGTH,
        permissions: Permissions::all(),
    })
    .map_err(|err| BlattwerkError::unsupported(format!("cannot prepare encryption: {err}")))?;
    doc.encrypt(&state)
        .map_err(|err| BlattwerkError::unsupported(format!("encryption failed: {err}")))?;

    let output = save(&mut doc)?;
    info!(output_bytes = output.len(), "PDF protected");
    Ok(output)
}

/// Remove password protection from `data`.
///
/// Fails with `AuthFailed` when `password` does not open the document and
/// with `Unsupported` when the document carries no encryption at all.
#[instrument(skip_all, fields(bytes_len = data.len()))]
pub fn unlock(data: &[u8], password: &str) -> Result<Vec<u8>> {
    let mut doc = load_raw(data)?;
    if !doc.is_encrypted() {
        return Err(BlattwerkError::unsupported("document is not password protected"));
    }
    doc.decrypt(password)
        .map_err(|_| BlattwerkError::auth_failed("incorrect password"))?;
    doc.trailer.remove(b"Encrypt");

    let output = save(&mut doc)?;
    info!(output_bytes = output.len(), "PDF unlocked");
    Ok(output)
}

/// The standard security handler keys off the first /ID entry, which many
/// producers omit. Derive one from the content when it is missing.
fn ensure_document_id(doc: &mut Document, data: &[u8]) {
    if doc.trailer.has(b"ID") {
        return;
    }
    let digest = Sha256::digest(data);
    let id = Object::String(digest[..16].to_vec(), StringFormat::Hexadecimal);
    doc.trailer.set("ID", vec![id.clone(), id]);
}
