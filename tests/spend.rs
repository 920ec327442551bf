//! End-to-end spends through an in-memory output set

use num_bigint::BigInt;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tx_script_core::hash::hash160;
use tx_script_core::op::{OP_0, OP_CHECKMULTISIG};
use tx_script_core::{
    Error, Instruction, MemoryResolver, Network, PrivateKey, SIGHASH_ALL, Script, Tx, TxIn, TxOut,
    h160_to_p2sh_address, p2pkh_script, p2sh_script,
};

const OP_2: u8 = 0x52;
const OP_3: u8 = 0x53;

/// A transaction paying `outputs`; its own input is never resolved
fn funding_tx(outputs: Vec<TxOut>) -> Tx {
    Tx::new(1, vec![TxIn::new([0x11; 32], 0)], outputs, 0, Network::Test)
}

fn key(secret: u64) -> PrivateKey {
    PrivateKey::new(BigInt::from(secret))
}

fn sign_der(key: &PrivateKey, z: &BigInt, rng: &mut StdRng) -> Vec<u8> {
    let mut sig = key.sign_with_rng(z, rng).der();
    sig.push(SIGHASH_ALL as u8);
    sig
}

#[test]
fn test_p2pkh_spend_two_inputs() {
    let mut rng = StdRng::seed_from_u64(7);
    let alice = key(0xa11ce);
    let bob = key(0xb0b);

    let funding = funding_tx(vec![
        TxOut::new(60_000, p2pkh_script(&alice.point().hash160(true))),
        TxOut::new(40_000, p2pkh_script(&alice.point().hash160(true))),
    ]);
    let mut resolver = MemoryResolver::new();
    resolver.add_tx(&funding).unwrap();
    let funding_id = funding.hash().unwrap();

    let mut tx = Tx::new(
        1,
        vec![TxIn::new(funding_id, 0), TxIn::new(funding_id, 1)],
        vec![TxOut::new(
            99_000,
            p2pkh_script(&bob.point().hash160(true)),
        )],
        0,
        Network::Test,
    );
    assert_eq!(tx.fee(&resolver).unwrap(), 1_000);
    assert!(!tx.verify(&resolver).unwrap());

    assert!(
        tx.sign_input_with_rng(0, &alice, SIGHASH_ALL, &resolver, &mut rng)
            .unwrap()
    );
    // the second input is still unsigned
    assert!(!tx.verify(&resolver).unwrap());

    assert!(
        tx.sign_input_with_rng(1, &alice, SIGHASH_ALL, &resolver, &mut rng)
            .unwrap()
    );
    assert!(tx.verify(&resolver).unwrap());

    // survives the wire
    let raw = tx.serialize().unwrap();
    let parsed = Tx::parse_bytes(&raw, Network::Test).unwrap();
    assert_eq!(parsed, tx);
    assert!(parsed.verify(&resolver).unwrap());

    // bob cannot spend alice's coins
    let mut stolen = tx.clone();
    assert!(
        !stolen
            .sign_input_with_rng(0, &bob, SIGHASH_ALL, &resolver, &mut rng)
            .unwrap()
    );

    // changing an output after signing breaks every signature
    let mut redirected = tx.clone();
    redirected.tx_outs[0].script_pubkey = p2pkh_script(&[0x42; 20]);
    assert!(!redirected.verify_input(0, &resolver).unwrap());
    assert!(!redirected.verify_input(1, &resolver).unwrap());
}

#[test]
fn test_p2sh_multisig_spend() {
    let mut rng = StdRng::seed_from_u64(11);
    let keys = [key(1001), key(2002), key(3003)];

    let redeem = Script::new(vec![
        Instruction::Opcode(OP_2),
        Instruction::Data(keys[0].point().sec(true)),
        Instruction::Data(keys[1].point().sec(true)),
        Instruction::Data(keys[2].point().sec(true)),
        Instruction::Opcode(OP_3),
        Instruction::Opcode(OP_CHECKMULTISIG),
    ]);
    let redeem_raw = redeem.raw_serialize().unwrap();
    let script_hash = hash160(&redeem_raw);
    let address = h160_to_p2sh_address(&script_hash, Network::Test);
    assert!(address.starts_with('2'));

    let funding = funding_tx(vec![TxOut::new(500_000, p2sh_script(&script_hash))]);
    assert_eq!(
        funding.tx_outs[0].script_pubkey.address(Network::Test).unwrap(),
        address
    );
    let mut resolver = MemoryResolver::new();
    resolver.add_tx(&funding).unwrap();

    let mut tx = Tx::new(
        1,
        vec![TxIn::new(funding.hash().unwrap(), 0)],
        vec![TxOut::new(
            490_000,
            p2pkh_script(&keys[1].point().hash160(true)),
        )],
        0,
        Network::Test,
    );

    let z = tx.sig_hash(0, SIGHASH_ALL, Some(&redeem), &resolver).unwrap();
    let sig_a = sign_der(&keys[0], &z, &mut rng);
    let sig_c = sign_der(&keys[2], &z, &mut rng);

    let spend = |sigs: Vec<Vec<u8>>| {
        let mut instructions = vec![Instruction::Opcode(OP_0)];
        instructions.extend(sigs.into_iter().map(Instruction::Data));
        instructions.push(Instruction::Data(redeem_raw.clone()));
        Script::new(instructions)
    };

    tx.tx_ins[0].script_sig = spend(vec![sig_a.clone(), sig_c.clone()]);
    assert!(tx.verify_input(0, &resolver).unwrap());
    assert!(tx.verify(&resolver).unwrap());

    // one signature short of the threshold
    tx.tx_ins[0].script_sig = spend(vec![sig_a.clone()]);
    assert!(!tx.verify_input(0, &resolver).unwrap());

    // the same key twice does not count as two
    tx.tx_ins[0].script_sig = spend(vec![sig_a.clone(), sig_a]);
    assert!(!tx.verify_input(0, &resolver).unwrap());

    // a redeem script that is not pushed as the last element
    let mut missing = spend(vec![sig_c]);
    missing.instructions.pop();
    missing.instructions.push(Instruction::Opcode(OP_0));
    tx.tx_ins[0].script_sig = missing;
    assert!(!tx.verify_input(0, &resolver).unwrap());
}

#[test]
fn test_malformed_redeem_script_is_an_error() {
    // PUSHDATA1 with no length byte
    let bad_redeem = vec![0x4c];
    let funding = funding_tx(vec![TxOut::new(1_000, p2sh_script(&hash160(&bad_redeem)))]);
    let mut resolver = MemoryResolver::new();
    resolver.add_tx(&funding).unwrap();

    let mut tx = Tx::new(
        1,
        vec![TxIn::new(funding.hash().unwrap(), 0)],
        vec![],
        0,
        Network::Test,
    );
    tx.tx_ins[0].script_sig = Script::new(vec![Instruction::Data(bad_redeem)]);

    assert!(matches!(
        tx.verify_input(0, &resolver),
        Err(Error::ScriptParse(_))
    ));
}

#[test]
fn test_missing_output() {
    let tx = Tx::new(
        1,
        vec![TxIn::new([0x22; 32], 5)],
        vec![],
        0,
        Network::Main,
    );
    let resolver = MemoryResolver::new();
    assert!(matches!(
        tx.verify(&resolver),
        Err(Error::UnresolvedInput { index: 5, .. })
    ));
}
