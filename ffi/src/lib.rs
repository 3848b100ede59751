/*
 * lib.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Tagliacarte, a cross-platform email client.
 *
 * Tagliacarte is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Tagliacarte is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Tagliacarte.  If not, see <http://www.gnu.org/licenses/>.
 */

//! C FFI for tagliacarte PGP/MIME decryption. Key rings are opaque handles; results of
//! a decrypt call are delivered through a struct of C callbacks on the calling thread.
//! All string parameters are UTF-8 NUL-terminated.

use libc::{c_char, c_int, c_void, size_t};
use std::ffi::{CStr, CString};
use std::ptr;
use std::sync::Arc;
use tagliacarte_pgp::{
    attachment_filename, CallbackResult, ClockSkew, Error, HeaderBlock, Key, KeyRing, MimeCallbacks, MimeDecryptor,
    VerificationOutcome, VerifyTime,
};

/// Process-wide clock skew record shared by every decrypt call.
static CLOCK: once_cell::sync::OnceCell<Arc<ClockSkew>> = once_cell::sync::OnceCell::new();

fn clock() -> &'static Arc<ClockSkew> {
    CLOCK.get_or_init(|| Arc::new(ClockSkew::new()))
}

/// Body text and lowercase content type.
type OnBody = extern "C" fn(*const c_char, *const c_char, *mut c_void);
/// Attachment headers (`Name: value\r\n` lines), data pointer and length.
type OnAttachment = extern "C" fn(*const c_char, *const u8, size_t, *mut c_void);
/// Header fields found inside the encryption envelope.
type OnEncryptedHeaders = extern "C" fn(*const c_char, *mut c_void);
/// Verification status code and signer key ID (16 hex digits, NULL if unknown).
type OnVerified = extern "C" fn(c_int, *const c_char, *mut c_void);
/// Error code and message.
type OnError = extern "C" fn(c_int, *const c_char, *mut c_void);

/// Callbacks for tagliacarte_pgp_decrypt_mime_message. Any callback may be NULL.
/// Pointers passed to callbacks are valid only for the duration of the call.
#[repr(C)]
pub struct TagliacartePgpCallbacks {
    pub on_body: Option<OnBody>,
    pub on_attachment: Option<OnAttachment>,
    pub on_encrypted_headers: Option<OnEncryptedHeaders>,
    pub on_verified: Option<OnVerified>,
    pub on_error: Option<OnError>,
    pub user_data: *mut c_void,
}

/// Opaque key ring handle.
pub struct TagliacartePgpKeyRing {
    ring: KeyRing,
}

fn ptr_to_str<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    unsafe { CStr::from_ptr(ptr).to_str().ok() }
}

/// C string from arbitrary text; interior NULs are dropped.
fn to_cstring(s: &str) -> CString {
    CString::new(s.replace('\0', "")).unwrap_or_default()
}

thread_local! {
    static LAST_ERROR: std::cell::RefCell<Option<CString>> = std::cell::RefCell::new(None);
}

fn set_last_error(message: &str) {
    LAST_ERROR.with(|e| *e.borrow_mut() = Some(to_cstring(message)));
}

fn clear_last_error() {
    LAST_ERROR.with(|e| *e.borrow_mut() = None);
}

fn fail(err: &Error) -> c_int {
    set_last_error(&err.to_string());
    err.code()
}

/// Version string (static, do not free).
#[no_mangle]
pub extern "C" fn tagliacarte_pgp_version() -> *const c_char {
    b"0.1.0\0".as_ptr() as *const c_char
}

/// Last error message from a failed call on this thread. Valid until the next FFI
/// call. Do not free.
#[no_mangle]
pub extern "C" fn tagliacarte_pgp_last_error() -> *const c_char {
    LAST_ERROR.with(|e| e.borrow().as_ref().map(|s| s.as_ptr()).unwrap_or(ptr::null()))
}

/// Free a string returned by this library. No-op if ptr is NULL.
#[no_mangle]
pub unsafe extern "C" fn tagliacarte_pgp_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        let _ = CString::from_raw(ptr);
    }
}

/// New empty key ring. Free with tagliacarte_pgp_keyring_free.
#[no_mangle]
pub extern "C" fn tagliacarte_pgp_keyring_new() -> *mut TagliacartePgpKeyRing {
    Box::into_raw(Box::new(TagliacartePgpKeyRing {
        ring: KeyRing::default(),
    }))
}

/// Add an ASCII-armored public or secret key. passphrase may be NULL; when given it
/// must unlock the key. Returns 0 on success, else an error code (see
/// tagliacarte_pgp_last_error).
#[no_mangle]
pub unsafe extern "C" fn tagliacarte_pgp_keyring_add_armored(
    ring: *mut TagliacartePgpKeyRing,
    armored: *const c_char,
    passphrase: *const c_char,
) -> c_int {
    clear_last_error();
    let (Some(holder), Some(armored)) = (ring.as_mut(), ptr_to_str(armored)) else {
        return fail(&Error::InvalidInput("NULL ring or key".into()));
    };
    match Key::from_armored(armored, ptr_to_str(passphrase)) {
        Ok(key) => {
            holder.ring = std::mem::take(&mut holder.ring).with_key(key);
            0
        }
        Err(e) => fail(&e),
    }
}

/// New ring in which every locked key that passphrase opens is unlocked. The given ring
/// is unchanged. Returns NULL if no key was unlocked.
#[no_mangle]
pub unsafe extern "C" fn tagliacarte_pgp_keyring_unlock(
    ring: *const TagliacartePgpKeyRing,
    passphrase: *const c_char,
) -> *mut TagliacartePgpKeyRing {
    clear_last_error();
    let (Some(holder), Some(passphrase)) = (ring.as_ref(), ptr_to_str(passphrase)) else {
        fail(&Error::InvalidInput("NULL ring or passphrase".into()));
        return ptr::null_mut();
    };
    match holder.ring.unlock(passphrase) {
        Ok(unlocked) => Box::into_raw(Box::new(TagliacartePgpKeyRing { ring: unlocked })),
        Err(e) => {
            fail(&e);
            ptr::null_mut()
        }
    }
}

/// Number of keys in the ring (0 for NULL).
#[no_mangle]
pub unsafe extern "C" fn tagliacarte_pgp_keyring_len(ring: *const TagliacartePgpKeyRing) -> size_t {
    ring.as_ref().map_or(0, |h| h.ring.len())
}

/// Primary key IDs of the ring as comma-separated hex, in ring order. Caller frees with
/// tagliacarte_pgp_free_string. NULL if ring is NULL.
#[no_mangle]
pub unsafe extern "C" fn tagliacarte_pgp_keyring_key_ids(ring: *const TagliacartePgpKeyRing) -> *mut c_char {
    let Some(handle) = ring.as_ref() else {
        return ptr::null_mut();
    };
    let ids: Vec<String> = handle.ring.key_ids().iter().map(|id| id.to_string()).collect();
    to_cstring(&ids.join(",")).into_raw()
}

/// Filename of an attachment from the headers passed to on_attachment (Content-Disposition
/// filename, else Content-Type name). Caller frees with tagliacarte_pgp_free_string.
/// NULL if there is none.
#[no_mangle]
pub unsafe extern "C" fn tagliacarte_pgp_attachment_filename(headers: *const c_char) -> *mut c_char {
    ptr_to_str(headers)
        .and_then(attachment_filename)
        .map_or(ptr::null_mut(), |name| to_cstring(&name).into_raw())
}

/// Free a key ring. No-op if ring is NULL.
#[no_mangle]
pub unsafe extern "C" fn tagliacarte_pgp_keyring_free(ring: *mut TagliacartePgpKeyRing) {
    if !ring.is_null() {
        drop(Box::from_raw(ring));
    }
}

/// Record the current time as reported by a server (epoch seconds).
#[no_mangle]
pub extern "C" fn tagliacarte_pgp_record_server_time(epoch_seconds: i64) {
    clock().record_server_time(epoch_seconds);
}

/// Local time corrected by the last recorded server time (epoch seconds).
#[no_mangle]
pub extern "C" fn tagliacarte_pgp_corrected_now() -> i64 {
    clock().corrected_now()
}

/// Adapter from the C callback struct.
struct CCallbacks<'a> {
    callbacks: &'a TagliacartePgpCallbacks,
    error: c_int,
}

impl MimeCallbacks for CCallbacks<'_> {
    fn on_body(&mut self, content: String, content_type: String) -> CallbackResult {
        if let Some(cb) = self.callbacks.on_body {
            let content = to_cstring(&content);
            let content_type = to_cstring(&content_type);
            cb(content.as_ptr(), content_type.as_ptr(), self.callbacks.user_data);
        }
        Ok(())
    }

    fn on_attachment(&mut self, headers: String, data: Vec<u8>) -> CallbackResult {
        if let Some(cb) = self.callbacks.on_attachment {
            let headers = to_cstring(&headers);
            cb(headers.as_ptr(), data.as_ptr(), data.len(), self.callbacks.user_data);
        }
        Ok(())
    }

    fn on_encrypted_headers(&mut self, headers: String) -> CallbackResult {
        if let Some(cb) = self.callbacks.on_encrypted_headers {
            let headers = to_cstring(&headers);
            cb(headers.as_ptr(), self.callbacks.user_data);
        }
        Ok(())
    }

    fn on_verified(&mut self, outcome: VerificationOutcome) -> CallbackResult {
        if let Some(cb) = self.callbacks.on_verified {
            let signer = outcome.signer.map(|id| to_cstring(&id.to_string()));
            let signer_ptr = signer.as_ref().map_or(ptr::null(), |s| s.as_ptr());
            cb(outcome.status.code(), signer_ptr, self.callbacks.user_data);
        }
        Ok(())
    }

    fn on_error(&mut self, error: Error) {
        self.error = fail(&error);
        if let Some(cb) = self.callbacks.on_error {
            let message = to_cstring(&error.to_string());
            cb(self.error, message.as_ptr(), self.callbacks.user_data);
        }
    }
}

/// Decrypt an armored PGP/MIME message and report its parts through callbacks, on
/// this thread, before returning.
///
/// verification may be NULL (outcome is then "not signed"). outer_headers may be
/// NULL. verify_time is epoch seconds; 0 disables signature time checks.
/// Returns 0 on success, else the error code also passed to on_error.
#[no_mangle]
pub unsafe extern "C" fn tagliacarte_pgp_decrypt_mime_message(
    message: *const u8,
    message_len: size_t,
    decryption: *const TagliacartePgpKeyRing,
    verification: *const TagliacartePgpKeyRing,
    outer_headers: *const c_char,
    callbacks: *const TagliacartePgpCallbacks,
    verify_time: i64,
) -> c_int {
    clear_last_error();
    let Some(callbacks) = callbacks.as_ref() else {
        return fail(&Error::InvalidInput("NULL callbacks".into()));
    };
    let message: &[u8] = if message.is_null() {
        &[]
    } else {
        std::slice::from_raw_parts(message, message_len)
    };
    let empty = KeyRing::default();
    let decryption = decryption.as_ref().map_or(&empty, |h| &h.ring);
    let verification = verification.as_ref().map(|h| &h.ring);

    let mut decryptor = MimeDecryptor::new(Arc::clone(clock()));
    if let Some(headers) = ptr_to_str(outer_headers) {
        decryptor = decryptor.with_outer_headers(HeaderBlock::parse(headers));
    }
    let mut adapter = CCallbacks {
        callbacks,
        error: 0,
    };
    decryptor.decrypt_mime_message(
        message,
        decryption,
        verification,
        &mut adapter,
        VerifyTime::from_epoch(verify_time),
    );
    adapter.error
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALICE_PRIVATE: &str = include_str!("../../core/tests/data/alice_private.asc");
    const ALICE_PUBLIC: &str = include_str!("../../core/tests/data/alice_public.asc");
    const MIME_SIGNED: &str = include_str!("../../core/tests/data/mime_signed.asc");
    const TO_BOB: &str = include_str!("../../core/tests/data/to_bob.asc");

    #[derive(Default)]
    struct Seen {
        bodies: Vec<String>,
        attachments: Vec<usize>,
        verified: Vec<(c_int, Option<String>)>,
        errors: Vec<c_int>,
    }

    fn seen<'a>(user_data: *mut c_void) -> &'a mut Seen {
        unsafe { &mut *(user_data as *mut Seen) }
    }

    fn text(ptr: *const c_char) -> Option<String> {
        ptr_to_str(ptr).map(str::to_string)
    }

    extern "C" fn on_body(content: *const c_char, _content_type: *const c_char, user_data: *mut c_void) {
        seen(user_data).bodies.extend(text(content));
    }

    extern "C" fn on_attachment(_headers: *const c_char, _data: *const u8, len: size_t, user_data: *mut c_void) {
        seen(user_data).attachments.push(len);
    }

    extern "C" fn on_verified(status: c_int, signer: *const c_char, user_data: *mut c_void) {
        seen(user_data).verified.push((status, text(signer)));
    }

    extern "C" fn on_error(code: c_int, _message: *const c_char, user_data: *mut c_void) {
        seen(user_data).errors.push(code);
    }

    fn callbacks(seen: &mut Seen) -> TagliacartePgpCallbacks {
        TagliacartePgpCallbacks {
            on_body: Some(on_body),
            on_attachment: Some(on_attachment),
            on_encrypted_headers: None,
            on_verified: Some(on_verified),
            on_error: Some(on_error),
            user_data: seen as *mut Seen as *mut c_void,
        }
    }

    fn ring_with(armored: &str, passphrase: Option<&str>) -> *mut TagliacartePgpKeyRing {
        let ring = tagliacarte_pgp_keyring_new();
        let armored = CString::new(armored).unwrap();
        let passphrase = passphrase.map(|p| CString::new(p).unwrap());
        let rc = unsafe {
            tagliacarte_pgp_keyring_add_armored(
                ring,
                armored.as_ptr(),
                passphrase.as_ref().map_or(ptr::null(), |p| p.as_ptr()),
            )
        };
        assert_eq!(rc, 0);
        ring
    }

    #[test]
    fn decrypt_and_verify_through_c_callbacks() {
        let secret = ring_with(ALICE_PRIVATE, None);
        let pass = CString::new("test").unwrap();
        let unlocked = unsafe { tagliacarte_pgp_keyring_unlock(secret, pass.as_ptr()) };
        assert!(!unlocked.is_null());
        let public = ring_with(ALICE_PUBLIC, None);

        let mut seen = Seen::default();
        let cbs = callbacks(&mut seen);
        let rc = unsafe {
            tagliacarte_pgp_decrypt_mime_message(
                MIME_SIGNED.as_ptr(),
                MIME_SIGNED.len(),
                unlocked,
                public,
                ptr::null(),
                &cbs,
                0,
            )
        };
        assert_eq!(rc, 0);
        assert_eq!(seen.attachments, vec![33, 0]);
        assert_eq!(seen.bodies.len(), 1);
        assert_eq!(seen.verified, vec![(0, Some("7FEE3DC2E3F9AE4C".to_string()))]);
        assert!(seen.errors.is_empty());

        unsafe {
            tagliacarte_pgp_keyring_free(secret);
            tagliacarte_pgp_keyring_free(unlocked);
            tagliacarte_pgp_keyring_free(public);
        }
    }

    #[test]
    fn owned_strings_are_freed_by_the_caller() {
        let ring = ring_with(ALICE_PUBLIC, None);
        let ids = unsafe { tagliacarte_pgp_keyring_key_ids(ring) };
        assert_eq!(text(ids).as_deref(), Some("7FEE3DC2E3F9AE4C"));
        unsafe {
            tagliacarte_pgp_free_string(ids);
            tagliacarte_pgp_keyring_free(ring);
        }
        assert!(unsafe { tagliacarte_pgp_keyring_key_ids(ptr::null()) }.is_null());

        let headers = CString::new("Content-Type: application/pdf; name=\"b.pdf\"\r\n").unwrap();
        let name = unsafe { tagliacarte_pgp_attachment_filename(headers.as_ptr()) };
        assert_eq!(text(name).as_deref(), Some("b.pdf"));
        unsafe { tagliacarte_pgp_free_string(name) };

        let headers = CString::new("Content-Type: text/plain\r\n").unwrap();
        assert!(unsafe { tagliacarte_pgp_attachment_filename(headers.as_ptr()) }.is_null());
        unsafe { tagliacarte_pgp_free_string(ptr::null_mut()) };
    }

    #[test]
    fn wrong_passphrase_returns_null_and_sets_error() {
        let secret = ring_with(ALICE_PRIVATE, None);
        let pass = CString::new("wrong").unwrap();
        let unlocked = unsafe { tagliacarte_pgp_keyring_unlock(secret, pass.as_ptr()) };
        assert!(unlocked.is_null());
        assert!(text(tagliacarte_pgp_last_error()).is_some());
        assert_eq!(unsafe { tagliacarte_pgp_keyring_len(secret) }, 1);
        unsafe { tagliacarte_pgp_keyring_free(secret) };
    }

    #[test]
    fn failure_reports_error_code_once() {
        let secret = ring_with(ALICE_PRIVATE, Some("test"));
        let mut seen = Seen::default();
        let cbs = callbacks(&mut seen);
        let rc = unsafe {
            tagliacarte_pgp_decrypt_mime_message(
                TO_BOB.as_ptr(),
                TO_BOB.len(),
                secret,
                ptr::null(),
                ptr::null(),
                &cbs,
                0,
            )
        };
        assert_eq!(rc, 3);
        assert_eq!(seen.errors, vec![3]);
        assert!(seen.verified.is_empty());
        unsafe { tagliacarte_pgp_keyring_free(secret) };
    }

    #[test]
    fn server_time_corrects_now() {
        tagliacarte_pgp_record_server_time(1_000_000);
        let now = tagliacarte_pgp_corrected_now();
        assert!((1_000_000..1_000_060).contains(&now));
    }
}
