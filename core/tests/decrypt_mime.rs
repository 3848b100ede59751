/*
 * decrypt_mime.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * Integration tests for PGP/MIME decryption and verification. The messages in
 * data/ were produced by GnuPG with the keys alongside them; signatures were made
 * at 2020-06-01T12:00:00Z.
 *
 * Run with:
 *   cargo test -p tagliacarte_pgp --test decrypt_mime
 */

use std::sync::mpsc;
use std::sync::Arc;

use tagliacarte_pgp::{
    attachment_filename, decrypt_message, CallbackResult, ClockSkew, Config, Error, HeaderBlock,
    KeyIdentifier, KeyRing, MimeCallbacks, MimeDecryptor, MimeEvent, VerificationOutcome,
    VerificationStatus, VerifyTime,
};

const ALICE_PRIVATE: &str = include_str!("data/alice_private.asc");
const ALICE_PUBLIC: &str = include_str!("data/alice_public.asc");
const BOB_PUBLIC: &str = include_str!("data/bob_public.asc");

const MIME_UNSIGNED: &str = include_str!("data/mime_unsigned.asc");
const PLAIN_UNSIGNED: &str = include_str!("data/plain_unsigned.asc");
const MIME_SIGNED: &str = include_str!("data/mime_signed.asc");
const SIGNED_BY_BOB: &str = include_str!("data/signed_by_bob.asc");
const SIGNED_EXPIRING: &str = include_str!("data/signed_expiring.asc");
const SIGNED_PART: &str = include_str!("data/signed_part.asc");
const SIGNED_PART_LF: &str = include_str!("data/signed_part_lf.asc");
const PROTECTED_HEADERS: &str = include_str!("data/protected_headers.asc");
const TRUNCATED: &str = include_str!("data/truncated.asc");
const TO_BOB: &str = include_str!("data/to_bob.asc");

const SIGNED_AT: i64 = 1_591_012_800;
const ALICE: &str = "7FEE3DC2E3F9AE4C";
const BOB: &str = "FBDE9560A5DA8A9C";

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn alice_secret() -> KeyRing {
    KeyRing::from_armored_keys([(ALICE_PRIVATE, Some("test"))]).unwrap()
}

fn public_ring(armored: &str) -> KeyRing {
    KeyRing::from_armored_keys([(armored, None)]).unwrap()
}

fn decryptor() -> MimeDecryptor {
    MimeDecryptor::new(Arc::new(ClockSkew::new()))
}

fn run(message: &str, verification: Option<&KeyRing>, time: VerifyTime) -> Vec<MimeEvent> {
    init_tracing();
    let mut events = Vec::new();
    decryptor().decrypt_mime_message(message.as_bytes(), &alice_secret(), verification, &mut events, time);
    events
}

fn id(hex: &str) -> KeyIdentifier {
    hex.parse().unwrap()
}

fn outcome(events: &[MimeEvent]) -> VerificationOutcome {
    match events.last() {
        Some(MimeEvent::Verified(outcome)) => *outcome,
        other => panic!("expected a verification outcome last, got {:?}", other),
    }
}

fn body(events: &[MimeEvent]) -> (&str, &str) {
    events
        .iter()
        .find_map(|e| match e {
            MimeEvent::Body {
                content,
                content_type,
            } => Some((content.as_str(), content_type.as_str())),
            _ => None,
        })
        .expect("body event")
}

#[test]
fn attachments_then_body_then_outcome() {
    let events = run(MIME_UNSIGNED, None, VerifyTime::Now);
    assert_eq!(events.len(), 4);
    match &events[0] {
        MimeEvent::Attachment { headers, data } => {
            assert_eq!(attachment_filename(headers).as_deref(), Some("a.png"));
            assert!(headers.starts_with("Content-Type: image/png; name=\"a.png\"\r\n"));
            assert_eq!(data.len(), 33);
            assert!(data.starts_with(b"\x89PNG"));
        }
        other => panic!("unexpected {:?}", other),
    }
    match &events[1] {
        MimeEvent::Attachment { headers, data } => {
            assert_eq!(attachment_filename(headers).as_deref(), Some("b.pdf"));
            assert!(data.is_empty());
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(
        body(&events),
        ("Hello Alice,\r\n\r\nTwo attachments are enclosed. Café at noon?", "text/plain")
    );
    assert_eq!(outcome(&events), VerificationOutcome::not_signed());
}

#[test]
fn single_part_plaintext_is_the_body() {
    let events = run(PLAIN_UNSIGNED, None, VerifyTime::Now);
    assert_eq!(events.len(), 2);
    assert_eq!(
        body(&events),
        ("Just a plain encrypted note.\r\nSecond line.", "text/plain")
    );
}

#[test]
fn inline_signature_is_valid() {
    let alice = public_ring(ALICE_PUBLIC);
    let events = run(MIME_SIGNED, Some(&alice), VerifyTime::At(SIGNED_AT + 60));
    let outcome = outcome(&events);
    assert_eq!(outcome.status, VerificationStatus::Valid);
    assert_eq!(outcome.signer, Some(id(ALICE)));
    assert_eq!(events.iter().filter(|e| matches!(e, MimeEvent::Attachment { .. })).count(), 2);
}

#[test]
fn unchecked_time_skips_window() {
    let alice = public_ring(ALICE_PUBLIC);
    let events = run(MIME_SIGNED, Some(&alice), VerifyTime::from_epoch(0));
    assert_eq!(outcome(&events).status, VerificationStatus::Valid);
}

#[test]
fn no_verification_ring_means_not_signed() {
    let events = run(MIME_SIGNED, None, VerifyTime::At(SIGNED_AT + 60));
    assert_eq!(outcome(&events), VerificationOutcome::not_signed());
}

#[test]
fn unknown_signer_is_key_not_found() {
    let alice = public_ring(ALICE_PUBLIC);
    let events = run(SIGNED_BY_BOB, Some(&alice), VerifyTime::At(SIGNED_AT + 60));
    let outcome = outcome(&events);
    assert_eq!(outcome.status, VerificationStatus::KeyNotFound);
    assert_eq!(outcome.signer, Some(id(BOB)));

    let bob = public_ring(BOB_PUBLIC);
    let events = run(SIGNED_BY_BOB, Some(&bob), VerifyTime::At(SIGNED_AT + 60));
    assert_eq!(outcome_status(&events), VerificationStatus::Valid);
}

fn outcome_status(events: &[MimeEvent]) -> VerificationStatus {
    outcome(events).status
}

#[test]
fn signature_from_the_future_is_invalid() {
    let alice = public_ring(ALICE_PUBLIC);
    let events = run(MIME_SIGNED, Some(&alice), VerifyTime::At(SIGNED_AT - 3600));
    let outcome = outcome(&events);
    assert_eq!(outcome.status, VerificationStatus::Invalid);
    assert_eq!(outcome.signer, Some(id(ALICE)));

    let tolerant = decryptor().with_config(Config {
        clock_tolerance_secs: 7200,
        ..Config::default()
    });
    let mut events = Vec::new();
    tolerant.decrypt_mime_message(
        MIME_SIGNED.as_bytes(),
        &alice_secret(),
        Some(&alice),
        &mut events,
        VerifyTime::At(SIGNED_AT - 3600),
    );
    assert_eq!(outcome_status(&events), VerificationStatus::Valid);
}

#[test]
fn expired_signature_is_invalid() {
    let alice = public_ring(ALICE_PUBLIC);
    let events = run(SIGNED_EXPIRING, Some(&alice), VerifyTime::At(SIGNED_AT + 3600));
    assert_eq!(outcome_status(&events), VerificationStatus::Valid);
    let events = run(SIGNED_EXPIRING, Some(&alice), VerifyTime::At(SIGNED_AT + 2 * 86_400));
    assert_eq!(outcome_status(&events), VerificationStatus::Invalid);
}

#[test]
fn corrected_now_follows_server_time() {
    init_tracing();
    let clock = Arc::new(ClockSkew::new());
    let decryptor = MimeDecryptor::new(Arc::clone(&clock));
    let alice = public_ring(ALICE_PUBLIC);

    clock.record_server_time(SIGNED_AT + 60);
    let mut events = Vec::new();
    decryptor.decrypt_mime_message(MIME_SIGNED.as_bytes(), &alice_secret(), Some(&alice), &mut events, VerifyTime::Now);
    assert_eq!(outcome_status(&events), VerificationStatus::Valid);

    clock.record_server_time(SIGNED_AT - 86_400);
    let mut events = Vec::new();
    decryptor.decrypt_mime_message(MIME_SIGNED.as_bytes(), &alice_secret(), Some(&alice), &mut events, VerifyTime::Now);
    assert_eq!(outcome_status(&events), VerificationStatus::Invalid);
}

#[test]
fn detached_mime_signature_is_verified() {
    let alice = public_ring(ALICE_PUBLIC);
    let events = run(SIGNED_PART, Some(&alice), VerifyTime::At(SIGNED_AT + 60));
    assert_eq!(events.len(), 2);
    assert_eq!(body(&events), ("Signed inside the envelope.", "text/plain"));
    let outcome = outcome(&events);
    assert_eq!(outcome.status, VerificationStatus::Valid);
    assert_eq!(outcome.signer, Some(id(ALICE)));

    let skip = decryptor().with_config(Config {
        verify_mime_signatures: false,
        ..Config::default()
    });
    let mut events = Vec::new();
    skip.decrypt_mime_message(SIGNED_PART.as_bytes(), &alice_secret(), Some(&alice), &mut events, VerifyTime::Now);
    assert_eq!(outcome_status(&events), VerificationStatus::NotSigned);
}

#[test]
fn detached_signature_over_lf_plaintext_is_valid() {
    let alice = public_ring(ALICE_PUBLIC);
    let events = run(SIGNED_PART_LF, Some(&alice), VerifyTime::At(SIGNED_AT + 60));
    assert_eq!(events.len(), 2);
    assert_eq!(body(&events), ("Signed inside the envelope.", "text/plain"));
    let outcome = outcome(&events);
    assert_eq!(outcome.status, VerificationStatus::Valid);
    assert_eq!(outcome.signer, Some(id(ALICE)));
}

#[test]
fn protected_headers_are_reported() {
    let events = run(PROTECTED_HEADERS, None, VerifyTime::Now);
    assert_eq!(events.len(), 3);
    match &events[0] {
        MimeEvent::EncryptedHeaders(headers) => assert_eq!(
            headers,
            "Subject: Quarterly numbers\r\nFrom: Bob Example <bob@example.org>\r\nTo: Alice Example <alice@example.org>\r\n"
        ),
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(body(&events), ("See the figures below.", "text/plain"));

    let outer = HeaderBlock::parse("From: Bob Example <bob@example.org>\r\nTo: Alice Example <alice@example.org>\r\nSubject: ...\r\n");
    let mut events = Vec::new();
    decryptor().with_outer_headers(outer).decrypt_mime_message(
        PROTECTED_HEADERS.as_bytes(),
        &alice_secret(),
        None,
        &mut events,
        VerifyTime::Now,
    );
    assert!(matches!(&events[0], MimeEvent::EncryptedHeaders(h) if h == "Subject: Quarterly numbers\r\n"));
}

#[test]
fn truncated_plaintext_reports_partial_parts_then_error() {
    let alice = public_ring(ALICE_PUBLIC);
    let events = run(TRUNCATED, Some(&alice), VerifyTime::Now);
    assert_eq!(events.len(), 2);
    match &events[0] {
        MimeEvent::Attachment { headers, data } => {
            assert_eq!(attachment_filename(headers).as_deref(), Some("first.bin"));
            assert_eq!(data, b"first");
        }
        other => panic!("unexpected {:?}", other),
    }
    match &events[1] {
        MimeEvent::Error(Error::MimeParse(e)) => assert!(e.locator.is_some()),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn message_for_someone_else_fails_to_decrypt() {
    let events = run(TO_BOB, None, VerifyTime::Now);
    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0], MimeEvent::Error(e @ Error::Decryption(_)) if e.code() == 3));
}

#[test]
fn locked_ring_cannot_decrypt_until_unlocked() {
    init_tracing();
    let locked = KeyRing::from_armored_keys([(ALICE_PRIVATE, None)]).unwrap();
    let mut events = Vec::new();
    decryptor().decrypt_mime_message(PLAIN_UNSIGNED.as_bytes(), &locked, None, &mut events, VerifyTime::Now);
    assert!(matches!(&events[..], [MimeEvent::Error(Error::Decryption(_))]));

    let unlocked = locked.unlock("test").unwrap();
    let mut events = Vec::new();
    decryptor().decrypt_mime_message(PLAIN_UNSIGNED.as_bytes(), &unlocked, None, &mut events, VerifyTime::Now);
    assert_eq!(body(&events).0, "Just a plain encrypted note.\r\nSecond line.");
}

#[test]
fn garbage_is_an_armor_error() {
    let events = run("hello, this is not armor", None, VerifyTime::Now);
    assert!(matches!(&events[..], [MimeEvent::Error(Error::ArmorFormat(_))]));
    let events = run("", None, VerifyTime::Now);
    assert!(matches!(&events[..], [MimeEvent::Error(Error::InvalidInput(_))]));
}

/// Fails every attachment callback and counts every call.
#[derive(Default)]
struct FailingAttachments {
    attachments: usize,
    bodies: usize,
    outcomes: usize,
    errors: usize,
}

impl MimeCallbacks for FailingAttachments {
    fn on_body(&mut self, _content: String, _content_type: String) -> CallbackResult {
        self.bodies += 1;
        Ok(())
    }
    fn on_attachment(&mut self, _headers: String, _data: Vec<u8>) -> CallbackResult {
        self.attachments += 1;
        Err("disk full".into())
    }
    fn on_encrypted_headers(&mut self, _headers: String) -> CallbackResult {
        Ok(())
    }
    fn on_verified(&mut self, _outcome: VerificationOutcome) -> CallbackResult {
        self.outcomes += 1;
        Ok(())
    }
    fn on_error(&mut self, _error: Error) {
        self.errors += 1;
    }
}

#[test]
fn failing_callback_does_not_stop_delivery() {
    init_tracing();
    let mut callbacks = FailingAttachments::default();
    decryptor().decrypt_mime_message(MIME_UNSIGNED.as_bytes(), &alice_secret(), None, &mut callbacks, VerifyTime::Now);
    assert_eq!(callbacks.attachments, 2);
    assert_eq!(callbacks.bodies, 1);
    assert_eq!(callbacks.outcomes, 1);
    assert_eq!(callbacks.errors, 0);
}

#[test]
fn events_can_be_sent_to_another_thread() {
    init_tracing();
    let (mut tx, rx) = mpsc::channel();
    let receiver = std::thread::spawn(move || rx.iter().collect::<Vec<MimeEvent>>());
    decryptor().decrypt_mime_message(PLAIN_UNSIGNED.as_bytes(), &alice_secret(), None, &mut tx, VerifyTime::Now);
    drop(tx);
    let events = receiver.join().unwrap();
    assert_eq!(events.len(), 2);
    assert!(matches!(events[1], MimeEvent::Verified(_)));
}

#[test]
fn same_input_same_output() {
    let first = run(MIME_UNSIGNED, None, VerifyTime::Now);
    let second = run(MIME_UNSIGNED, None, VerifyTime::Now);
    assert_eq!(format!("{:?}", first), format!("{:?}", second));
}

#[test]
fn plain_decryption_returns_raw_plaintext() {
    let decrypted = decrypt_message(PLAIN_UNSIGNED.as_bytes(), &alice_secret()).unwrap();
    assert_eq!(decrypted.plaintext, include_bytes!("data/mime_plain.eml"));
    assert!(decrypted.signature.is_none());

    let decrypted = decrypt_message(MIME_SIGNED.as_bytes(), &alice_secret()).unwrap();
    let signature = decrypted.signature.expect("inline signature");
    assert_eq!(signature.issuers(), vec![id(ALICE)]);
    assert_eq!(signature.created(), Some(SIGNED_AT));
}

#[test]
fn fixtures_decrypt_to_their_sources() {
    let ring = alice_secret();
    let cases: [(&str, &[u8]); 5] = [
        (MIME_UNSIGNED, include_bytes!("data/mime_two_attachments.eml")),
        (PROTECTED_HEADERS, include_bytes!("data/mime_protected_headers.eml")),
        (SIGNED_PART, include_bytes!("data/mime_signed_part.eml")),
        (SIGNED_PART_LF, include_bytes!("data/mime_signed_part_lf.eml")),
        (TRUNCATED, include_bytes!("data/mime_truncated.eml")),
    ];
    for (armored, source) in cases {
        let decrypted = decrypt_message(armored.as_bytes(), &ring).unwrap();
        assert_eq!(decrypted.plaintext, source);
    }
}
