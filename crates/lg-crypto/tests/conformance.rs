// Key agreement and packet cipher conformance, end to end through the
// public API.

use lg_crypto::agreement::{derive_peer_secret, negotiate_with, SALT_LENGTH};
use lg_crypto::cipher::{construct_iv, packet_checksum, CHECKSUM_LENGTH};
use lg_crypto::{CryptoContext, EcdhP384KeyPair};

fn counting<const N: usize>() -> [u8; N] {
    let mut out = [0u8; N];
    for (i, b) in out.iter_mut().enumerate() {
        *b = i as u8;
    }
    out
}

#[test]
fn test_fixed_inputs_give_fixed_secret() {
    let server = EcdhP384KeyPair::from_private(&[0x11; 48]).unwrap();
    let client = EcdhP384KeyPair::from_private(&[0x22; 48]).unwrap();
    let salt: [u8; SALT_LENGTH] = counting();

    let client_public = client.public_key().clone();
    let server_side = negotiate_with(server, &client_public, salt);
    let client_side = derive_peer_secret(&client, server_side.keypair().public_key(), &salt);

    let expected = hex::decode("45371751d9aa821756422bcad6487f0f08fc0c504c22b5ee71785d24ffb323d8")
        .unwrap();
    assert_eq!(server_side.secret().as_slice(), expected.as_slice());
    assert_eq!(&*client_side, server_side.secret());

    // IV is the first 12 secret bytes followed by 00 00 00 02.
    let iv = construct_iv(server_side.secret());
    assert_eq!(&iv[..12], &expected[..12]);
    assert_eq!(&iv[12..], &[0, 0, 0, 2]);
}

#[test]
fn test_sealed_packet_layout() {
    let key: [u8; 32] = counting();
    let mut ctx = CryptoContext::new(&key);

    let sealed = ctx.encryptor().seal(b"login gate");
    assert_eq!(sealed.len(), 10 + CHECKSUM_LENGTH);
    // CTR: the body prefix matches the bare keystream vector.
    assert_eq!(hex::encode(&sealed[..10]), "2b6db172abc5a57af924");

    let mut peer = CryptoContext::new(&key);
    let mut plain = sealed.clone();
    peer.decryptor().apply(&mut plain);
    assert_eq!(&plain[..10], b"login gate");
    assert_eq!(
        hex::encode(&plain[10..]),
        hex::encode(packet_checksum(0, b"login gate", &key))
    );
}

#[test]
fn test_directions_interoperate() {
    let server = EcdhP384KeyPair::from_private(&[0x11; 48]).unwrap();
    let client = EcdhP384KeyPair::from_private(&[0x22; 48]).unwrap();
    let salt: [u8; SALT_LENGTH] = counting();

    let client_public = client.public_key().clone();
    let negotiated = negotiate_with(server, &client_public, salt);
    let (mut server_enc, mut server_dec) = negotiated.crypto_context().split();
    let secret = derive_peer_secret(&client, negotiated.keypair().public_key(), &salt);
    let mut client_ctx = CryptoContext::new(&secret);

    for i in 0..16u8 {
        let packet = vec![i; usize::from(i) * 7 + 1];
        let sealed = server_enc.seal(&packet);
        assert_eq!(client_ctx.decryptor().open(&sealed).unwrap(), packet);

        let reply = client_ctx.encryptor().seal(&packet);
        assert_eq!(server_dec.open(&reply).unwrap(), packet);
    }
    assert_eq!(server_enc.packets_sealed(), 16);
    assert_eq!(server_dec.packets_opened(), 16);
}

#[test]
fn test_replayed_packet_fails_checksum() {
    let key: [u8; 32] = counting();
    let mut sender = CryptoContext::new(&key);
    let mut receiver = CryptoContext::new(&key);

    let first = sender.encryptor().seal(b"first");
    receiver.decryptor().open(&first).unwrap();
    assert!(receiver.decryptor().open(&first).is_err());
}
