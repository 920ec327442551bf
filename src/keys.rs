//! Utilities to generate secret keys, encode them as WIF, and turn
//! HASH160 digests into Base58Check addresses

use num_bigint::{BigInt, Sign};
use num_integer::Integer;
use num_traits::{One, Zero};
use rand::RngCore;

use crate::bitcoin::{BITCOIN, S256Point, bigint_to_32_bytes};
use crate::ecdsa::{self, Signature};
use crate::error::{Error, Result};
use crate::hash::hash256;

/// Bitcoin network type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Network {
    Main,
    Test,
}

impl Network {
    /// Version byte for pay-to-pubkey-hash addresses
    #[inline]
    pub const fn p2pkh_version(self) -> u8 {
        match self {
            Network::Main => 0x00,
            Network::Test => 0x6f,
        }
    }

    /// Version byte for pay-to-script-hash addresses
    #[inline]
    pub const fn p2sh_version(self) -> u8 {
        match self {
            Network::Main => 0x05,
            Network::Test => 0xc4,
        }
    }

    /// Version byte for WIF private keys
    #[inline]
    pub const fn wif_version(self) -> u8 {
        match self {
            Network::Main => 0x80,
            Network::Test => 0xef,
        }
    }

    /// Get network name
    #[inline]
    pub const fn name(self) -> &'static str {
        match self {
            Network::Main => "main",
            Network::Test => "test",
        }
    }
}

impl TryFrom<&str> for Network {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self> {
        match s {
            "main" | "mainnet" => Ok(Network::Main),
            "test" | "testnet" => Ok(Network::Test),
            _ => Err(Error::InvalidFormat(format!("Unknown network: {s}"))),
        }
    }
}

/// Generate a secret key with uniform random distribution in [1, n)
pub fn gen_secret_key(n: &BigInt) -> BigInt {
    gen_secret_key_with(n, &mut rand::rng())
}

/// Same as [`gen_secret_key`], drawing bytes from the given RNG
pub fn gen_secret_key_with<R: RngCore + ?Sized>(n: &BigInt, rng: &mut R) -> BigInt {
    let len = n.to_bytes_be().1.len().max(1);
    let mut bytes = vec![0u8; len];
    loop {
        rng.fill_bytes(&mut bytes);
        let key = BigInt::from_bytes_be(Sign::Plus, &bytes);
        if key >= BigInt::one() && key < *n {
            return key;
        }
    }
}

/// A secret scalar together with its public point `secret * G`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivateKey {
    secret: BigInt,
    point: S256Point,
}

impl PrivateKey {
    pub fn new(secret: BigInt) -> Self {
        let point = S256Point::generator().mul(&secret);
        PrivateKey { secret, point }
    }

    /// A fresh random key
    pub fn generate() -> Self {
        Self::new(gen_secret_key(&BITCOIN.generator.n))
    }

    #[inline]
    pub fn secret(&self) -> &BigInt {
        &self.secret
    }

    #[inline]
    pub fn point(&self) -> &S256Point {
        &self.point
    }

    /// Secret as 64 lowercase hex digits
    pub fn hex(&self) -> String {
        format!("{:064x}", self.secret)
    }

    #[must_use]
    pub fn sign(&self, z: &BigInt) -> Signature {
        ecdsa::sign(&self.secret, z)
    }

    pub fn sign_with_rng<R: RngCore + ?Sized>(&self, z: &BigInt, rng: &mut R) -> Signature {
        ecdsa::sign_with_rng(&self.secret, z, rng)
    }

    /// Wallet Import Format: version || secret (32 bytes) || [0x01] || checksum
    pub fn wif(&self, compressed: bool, network: Network) -> String {
        let mut payload = vec![network.wif_version()];
        payload.extend_from_slice(&bigint_to_32_bytes(&self.secret));
        if compressed {
            payload.push(0x01);
        }
        encode_base58_checksum(&payload)
    }

    /// Decodes a WIF string, returning the key, whether its public key is
    /// meant to be compressed, and the network it belongs to.
    pub fn from_wif(wif: &str) -> Result<(Self, bool, Network)> {
        let payload = decode_base58_checksum(wif)?;
        let network = match payload.first() {
            Some(0x80) => Network::Main,
            Some(0xef) => Network::Test,
            Some(v) => return Err(Error::Base58(format!("unknown WIF version 0x{v:02x}"))),
            None => return Err(Error::Base58("empty WIF payload".into())),
        };
        let compressed = match payload.len() {
            33 => false,
            34 if payload[33] == 0x01 => true,
            n => return Err(Error::Base58(format!("bad WIF payload length {n}"))),
        };
        let secret = BigInt::from_bytes_be(Sign::Plus, &payload[1..33]);
        if secret.is_zero() || secret >= BITCOIN.generator.n {
            return Err(Error::InvalidFormat("WIF secret outside [1, N)".into()));
        }
        Ok((PrivateKey::new(secret), compressed, network))
    }
}

// -----------------------------------------------------------------------------
// Base58 encoding/decoding

const ALPHABET: &[u8] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

fn alphabet_inv(c: u8) -> Option<u8> {
    ALPHABET.iter().position(|&x| x == c).map(|i| i as u8)
}

/// Base58 encode bytes. Each leading zero byte becomes a leading '1'.
pub fn b58encode(bytes: &[u8]) -> String {
    let mut n = BigInt::from_bytes_be(Sign::Plus, bytes);
    let mut chars = Vec::new();
    let fifty_eight = BigInt::from(58);

    while !n.is_zero() {
        let (quotient, remainder) = n.div_rem(&fifty_eight);
        let idx = remainder.to_bytes_be().1[0] as usize;
        chars.push(ALPHABET[idx]);
        n = quotient;
    }

    let num_leading_zeros = bytes.iter().take_while(|&&b| b == 0).count();
    chars.extend(std::iter::repeat_n(ALPHABET[0], num_leading_zeros));

    chars.reverse();
    chars.into_iter().map(char::from).collect()
}

/// Base58 decode to bytes. Each leading '1' becomes a leading zero byte.
pub fn b58decode(s: &str) -> Result<Vec<u8>> {
    let mut n = BigInt::zero();
    let fifty_eight = BigInt::from(58);

    for c in s.bytes() {
        let val = alphabet_inv(c)
            .ok_or_else(|| Error::Base58(format!("invalid character {:?}", c as char)))?;
        n = n * &fifty_eight + BigInt::from(val);
    }

    let num_leading_ones = s.bytes().take_while(|&c| c == b'1').count();
    let mut result = vec![0u8; num_leading_ones];
    if !n.is_zero() {
        result.extend(n.to_bytes_be().1);
    }
    Ok(result)
}

/// Appends the first 4 bytes of hash256(payload) and Base58-encodes
pub fn encode_base58_checksum(payload: &[u8]) -> String {
    let mut bytes = payload.to_vec();
    bytes.extend_from_slice(&hash256(payload)[..4]);
    b58encode(&bytes)
}

/// Decodes Base58Check, verifying and stripping the 4-byte checksum
pub fn decode_base58_checksum(s: &str) -> Result<Vec<u8>> {
    let mut bytes = b58decode(s)?;
    if bytes.len() < 4 {
        return Err(Error::Base58(format!("{s} is too short for a checksum")));
    }
    let checksum = bytes.split_off(bytes.len() - 4);
    if hash256(&bytes)[..4] != checksum[..] {
        return Err(Error::BadChecksum);
    }
    Ok(bytes)
}

fn h160_to_address(h160: &[u8; 20], version: u8) -> String {
    let mut payload = Vec::with_capacity(21);
    payload.push(version);
    payload.extend_from_slice(h160);
    encode_base58_checksum(&payload)
}

/// Address for a pay-to-pubkey-hash output
pub fn h160_to_p2pkh_address(h160: &[u8; 20], network: Network) -> String {
    h160_to_address(h160, network.p2pkh_version())
}

/// Address for a pay-to-script-hash output
pub fn h160_to_p2sh_address(h160: &[u8; 20], network: Network) -> String {
    h160_to_address(h160, network.p2sh_version())
}

/// Extract the 20-byte hash from a Base58Check address of either kind
pub fn address_to_h160(address: &str) -> Result<[u8; 20]> {
    let payload = decode_base58_checksum(address)?;
    if payload.len() != 21 {
        return Err(Error::Base58(format!(
            "address payload must be 21 bytes, got {}",
            payload.len()
        )));
    }
    let mut h160 = [0u8; 20];
    h160.copy_from_slice(&payload[1..]);
    Ok(h160)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn big(hex_str: &str) -> BigInt {
        BigInt::parse_bytes(hex_str.as_bytes(), 16).unwrap()
    }

    #[test]
    fn test_public_key_gen() {
        // Example from Mastering Bitcoin Chapter 4
        let key = PrivateKey::new(big(
            "1E99423A4ED27608A15A2616A2B0E9E52CED330AC530EDCC32C8FFC6A526AEDD",
        ));
        assert_eq!(
            format!("{:064x}", key.point().x().unwrap()).to_uppercase(),
            "F028892BAD7ED57D2FB57BF33081D5CFCF6F9ED3D3D7F159C2E2FFF579DC341A"
        );
        assert_eq!(
            format!("{:064x}", key.point().y().unwrap()).to_uppercase(),
            "07CF33DA18BD734C600B96A72BBC4749D5141C90EC8AC328AE52DDFE2E505BDB"
        );
    }

    #[test]
    fn test_btc_addresses() {
        // (net, compressed, secret_key_hex, expected_address)
        let tests = [
            // Mastering Bitcoin Chapter 4
            (
                "main",
                true,
                "3aba4162c7251c891207b747840551a71939b0de081f85c4e44cf7c13e41daa6",
                "14cxpo3MBCYYWCgF74SWTdcmxipnGUsPw3",
            ),
            // Bitcoin wiki reference
            (
                "mainnet",
                true,
                "18e14a7b6a307f426a94f8114701e7c8e774e7f9a47e2c2035db29a206321725",
                "1PMycacnJaSqwwJqjawXBErnLsZ7RkXUAs",
            ),
        ];

        for (net, compressed, sk_hex, expected_addr) in tests {
            let key = PrivateKey::new(big(sk_hex));
            let network = Network::try_from(net).unwrap();
            assert_eq!(key.point().address(compressed, network), expected_addr);
            assert_eq!(
                address_to_h160(expected_addr).unwrap(),
                key.point().hash160(compressed)
            );
        }
    }

    #[test]
    fn test_network_parse() {
        assert_eq!(Network::try_from("testnet").unwrap(), Network::Test);
        assert_eq!(Network::Test.name(), "test");
        assert!(matches!(
            Network::try_from("regtest"),
            Err(Error::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_wif() {
        let tests = [
            (
                (BigInt::one() << 256) - (BigInt::one() << 199),
                true,
                Network::Main,
                "L5oLkpV3aqBJ4BgssVAsax1iRa77G5CVYnv9adQ6Z87te7TyUdSC",
            ),
            (
                (BigInt::one() << 256) - (BigInt::one() << 201),
                false,
                Network::Test,
                "93XfLeifX7Jx7n7ELGMAf1SUR6f9kgQs8Xke8WStMwUtrDucMzn",
            ),
            (
                big("0dba685b4511dbd3d368e5c4358a1277de9486447af7b3604a69b8d9d8b7889d"),
                false,
                Network::Main,
                "5HvLFPDVgFZRK9cd4C5jcWki5Skz6fmKqi1GQJf5ZoMofid2Dty",
            ),
            (
                big("1cca23de92fd1862fb5b76e5f4f50eb082165e5191e116c18ed1a6b24be6a53f"),
                true,
                Network::Test,
                "cNYfWuhDpbNM1JWc3c6JTrtrFVxU4AGhUKgw5f93NP2QaBqmxKkg",
            ),
        ];
        for (secret, compressed, network, expected) in tests {
            let key = PrivateKey::new(secret);
            assert_eq!(key.wif(compressed, network), expected);

            let (decoded, was_compressed, net) = PrivateKey::from_wif(expected).unwrap();
            assert_eq!(decoded, key);
            assert_eq!(was_compressed, compressed);
            assert_eq!(net, network);
        }
    }

    #[test]
    fn test_wif_secret_range() {
        let wif_of = |secret: &BigInt| {
            let mut payload = vec![Network::Test.wif_version()];
            payload.extend_from_slice(&bigint_to_32_bytes(secret));
            payload.push(0x01);
            encode_base58_checksum(&payload)
        };
        let n = &BITCOIN.generator.n;

        for secret in [BigInt::zero(), n.clone(), n + 1u32] {
            assert!(matches!(
                PrivateKey::from_wif(&wif_of(&secret)),
                Err(Error::InvalidFormat(_))
            ));
        }

        let (key, _, _) = PrivateKey::from_wif(&wif_of(&(n - 1u32))).unwrap();
        assert!(!key.point().is_infinity());
    }

    #[test]
    fn test_h160_addresses() {
        let h160: [u8; 20] = hex::decode("74d691da1574e6b3c192ecfb52cc8984ee7b6c56")
            .unwrap()
            .try_into()
            .unwrap();
        assert_eq!(
            h160_to_p2pkh_address(&h160, Network::Main),
            "1BenRpVUFK65JFWcQSuHnJKzc4M8ZP8Eqa"
        );
        assert_eq!(
            h160_to_p2pkh_address(&h160, Network::Test),
            "mrAjisaT4LXL5MzE81sfcDYKU3wqWSvf9q"
        );
        assert_eq!(
            h160_to_p2sh_address(&h160, Network::Main),
            "3CLoMMyuoDQTPRD3XYZtCvgvkadrAdvdXh"
        );
        assert_eq!(
            h160_to_p2sh_address(&h160, Network::Test),
            "2N3u1R6uwQfuobCqbCgBkpsgBxvr1tZpe7B"
        );
    }

    #[test]
    fn test_address_to_h160() {
        assert_eq!(
            hex::encode(address_to_h160("mnrVtF8DWjMu839VW3rBfgYaAfKk8983Xf").unwrap()),
            "507b27411ccf7f16f10297de6cef3f291623eddf"
        );
        // last character altered
        assert!(matches!(
            address_to_h160("mnrVtF8DWjMu839VW3rBfgYaAfKk8983Xg"),
            Err(Error::BadChecksum)
        ));
        assert!(matches!(
            address_to_h160("mnrVtF8DWjMu839VW3rBfgYaAfKk8983X0"),
            Err(Error::Base58(_))
        ));
    }

    #[test]
    fn test_b58_leading_zeros() {
        let mut original = vec![0x00, 0x00];
        original.extend([0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08]);
        let encoded = b58encode(&original);
        assert!(encoded.starts_with("11"));
        assert_eq!(b58decode(&encoded).unwrap(), original);

        assert_eq!(b58encode(&[0, 0, 0]), "111");
        assert_eq!(b58decode("111").unwrap(), vec![0, 0, 0]);
        assert_eq!(b58encode(&[]), "");
    }

    #[test]
    fn test_key_generation() {
        let mut rng = StdRng::seed_from_u64(7);
        let n = &BITCOIN.generator.n;
        for _ in 0..16 {
            let sk = gen_secret_key_with(n, &mut rng);
            assert!(sk >= BigInt::one());
            assert!(&sk < n);
        }
        let key = PrivateKey::generate();
        assert!(!key.point().is_infinity());
        assert_eq!(key.hex().len(), 64);
    }

    #[test]
    fn test_small_range() {
        let mut rng = StdRng::seed_from_u64(1);
        let n = BigInt::from(5);
        for _ in 0..32 {
            let k = gen_secret_key_with(&n, &mut rng);
            assert!(k >= BigInt::one() && k < n);
        }
    }
}
