// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use horace::{
    crypto::{Ed25519Keypair, RecordHash},
    session::signer::signature_message,
};

#[test]
fn test_keyfile_round_trip() {
    let kp = Ed25519Keypair::generate();
    let keyfile = kp.to_keyfile();
    assert!(keyfile.starts_with("ed25519:"));
    assert_eq!(keyfile.split(':').count(), 3);

    let parsed = Ed25519Keypair::from_keyfile(&keyfile).expect("parse failed");
    assert_eq!(parsed.public_key(), kp.public_key());
}

#[test]
fn test_keyfile_rejects_malformed_input() {
    assert!(Ed25519Keypair::from_keyfile("").is_err());
    assert!(Ed25519Keypair::from_keyfile("ed25519:abcd").is_err());
    assert!(Ed25519Keypair::from_keyfile("rsa:00:00").is_err());
    assert!(Ed25519Keypair::from_keyfile("ed25519:zz:zz").is_err());

    // Swapping the key fields must be detected.
    let kp = Ed25519Keypair::generate();
    let keyfile = kp.to_keyfile();
    let mut fields = keyfile.split(':');
    let _ = fields.next();
    let pk = fields.next().expect("missing field");
    let sk = fields.next().expect("missing field");
    assert!(Ed25519Keypair::from_keyfile(&format!("ed25519:{sk}:{pk}")).is_err());
}

#[test]
fn test_sign_and_verify() {
    let kp = Ed25519Keypair::generate();
    let mut hashfn = RecordHash::make("sha256").expect("bad algorithm");
    let hash = hashfn.digest(b"event record bytes");

    let message = signature_message(7, &hash);
    let sig = kp.sign(&message);
    Ed25519Keypair::verify(&kp.public_key(), &message, &sig)
        .expect("signature should verify");

    // A different seqnum must not verify.
    let wrong = signature_message(8, &hash);
    assert!(Ed25519Keypair::verify(&kp.public_key(), &wrong, &sig).is_err());
}

#[test]
fn test_hash_algorithms() {
    let mut sha256 = RecordHash::make("sha256").expect("bad algorithm");
    assert_eq!(sha256.algorithm(), "sha256");
    assert_eq!(sha256.output_length(), 32);
    let d1 = sha256.digest(b"abc");
    assert_eq!(d1.len(), 32);
    assert_eq!(
        hex::encode(&d1),
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );

    // finalize_reset leaves the state ready for the next record.
    let d2 = sha256.digest(b"abc");
    assert_eq!(d1, d2);

    let mut sha512 = RecordHash::make("sha512").expect("bad algorithm");
    assert_eq!(sha512.output_length(), 64);
    assert_eq!(sha512.digest(b"abc").len(), 64);

    assert!(RecordHash::make("md5").is_err());
}
