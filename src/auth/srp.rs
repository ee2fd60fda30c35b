//! SRP-6a client math for the service's authentication protocol.
//!
//! The service uses a fixed 2048-bit group with generator 2 and SHA-512 as
//! the protocol hash. Two hashing conventions coexist and must not be
//! mixed up: the multiplier `k` and the scrambler `u` hash their inputs
//! zero-padded to the group byte length, while the identity hash `x` and
//! the evidence `M1` hash minimal big-endian encodings.
//!
//! All values are unsigned, arbitrary-precision integers. The session key
//! is computed as `S = (B + N - k·g^x mod N)^(u·x + a) mod N` so that no
//! intermediate ever goes negative.

use std::sync::LazyLock;

use num_bigint::BigUint;
use num_traits::Zero;
use sha2::{Digest, Sha512};

use super::{AuthError, Result};

/// Length of a registration salt, in bytes.
pub const SALT_BYTES: usize = 128;

/// Length of the ephemeral private value `a`, in bytes.
pub const PRIVATE_VALUE_BYTES: usize = 256;

/// Byte length of the group prime; also the zero-padding width for the
/// padded hashes.
pub const GROUP_BYTES: usize = 256;

/// Decimal encoding of the group prime `N` (2048 bits).
const GROUP_PRIME_DECIMAL: &[u8] = b"21766174458617435773191008891802753781907668374255538511144643224689886235383840957210909013086056401571399717235807266581649606472148410291413364152197364477180887395655483738115072677402235101762521901569820740293149529620419333266262073471054548368736039519702486226506248861060256971802984953561121442680157668000761429988222457090413873973970171927093992114751765168063614761119615476233422096442783117971236371647333871414335895773474667308967050807005509320424799678417036867928316761272274230314067548291133582479583061439577559347101961771406173684378522703483495337037655006751328447510550299250924469288819";

static GROUP_PRIME: LazyLock<BigUint> = LazyLock::new(|| {
    BigUint::parse_bytes(GROUP_PRIME_DECIMAL, 10).expect("group prime constant parses")
});

static GENERATOR: LazyLock<BigUint> = LazyLock::new(|| BigUint::from(2u8));

/// The group prime `N`.
pub fn group_prime() -> &'static BigUint {
    &GROUP_PRIME
}

/// The group generator `g = 2`.
pub fn generator() -> &'static BigUint {
    &GENERATOR
}

/// A processed login challenge.
///
/// Ephemeral and login-scoped: use [`SrpSession::a_pub`] and
/// [`SrpSession::evidence`] to answer the challenge, then drop the session.
/// Never persist or log any of these values; `a` in particular must not be
/// reused across sessions.
#[derive(Debug)]
pub struct SrpSession {
    /// Private key derivative `x = H(salt ‖ H(password))`.
    pub x: BigUint,
    /// Ephemeral private value.
    pub a: BigUint,
    /// Client public value `A = g^a mod N`.
    pub a_pub: BigUint,
    /// Multiplier parameter `k`.
    pub k: BigUint,
    /// Scrambler `u = H(pad(A) ‖ pad(B))`.
    pub u: BigUint,
    /// Shared session secret `S`.
    pub secret: BigUint,
    /// Client evidence `M1 = H(A ‖ B ‖ S)`.
    pub evidence: BigUint,
}

/// SHA-512 over the concatenation of `parts`.
fn digest(parts: &[&[u8]]) -> Vec<u8> {
    let mut hasher = Sha512::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().to_vec()
}

/// Left-pad `bytes` with zeros to the group byte length.
fn pad(bytes: &[u8]) -> Vec<u8> {
    let mut out = vec![0u8; GROUP_BYTES.saturating_sub(bytes.len())];
    out.extend_from_slice(bytes);
    out
}

/// SHA-512 over the concatenation of `parts`, each zero-padded to the
/// group byte length first.
fn digest_padded(parts: &[&[u8]]) -> Vec<u8> {
    let padded: Vec<Vec<u8>> = parts.iter().map(|part| pad(part)).collect();
    let refs: Vec<&[u8]> = padded.iter().map(Vec::as_slice).collect();
    digest(&refs)
}

/// Minimal big-endian encoding of `value` (empty for zero).
fn int_bytes(value: &BigUint) -> Vec<u8> {
    if value.is_zero() {
        Vec::new()
    } else {
        value.to_bytes_be()
    }
}

fn bytes_int(bytes: &[u8]) -> BigUint {
    BigUint::from_bytes_be(bytes)
}

/// Draw `len` random bytes and interpret them as a big-endian integer.
fn random_value(len: usize) -> Result<BigUint> {
    let mut buf = vec![0u8; len];
    getrandom::getrandom(&mut buf).map_err(|e| AuthError::Random(e.to_string()))?;
    Ok(BigUint::from_bytes_be(&buf))
}

/// Compute `x = H(salt ‖ H(password))`.
///
/// Deterministic: the same `(salt, password)` pair always regenerates the
/// same `x`, which is what makes the registration verifier reusable.
pub fn compute_x(salt: &BigUint, password: &str) -> BigUint {
    let identity = digest(&[password.as_bytes()]);
    bytes_int(&digest(&[&int_bytes(salt), &identity]))
}

/// Compute the password verifier `v = g^x mod N` for a known salt.
pub fn create_verifier(salt: &BigUint, password: &str) -> BigUint {
    generator().modpow(&compute_x(salt, password), group_prime())
}

/// Generate a random salt and the matching verifier for registration.
///
/// The salt is [`SALT_BYTES`] of fresh randomness; the verifier is
/// `g^x mod N`. Only the pair `(salt, verifier)` is ever uploaded.
pub fn create_verifier_and_salt(password: &str) -> Result<(BigUint, BigUint)> {
    let salt = random_value(SALT_BYTES)?;
    let verifier = create_verifier(&salt, password);
    Ok((salt, verifier))
}

/// Draw a nonzero ephemeral private value below `N`.
fn generate_private_value() -> Result<BigUint> {
    loop {
        let value = random_value(PRIVATE_VALUE_BYTES)? % group_prime();
        if !value.is_zero() {
            return Ok(value);
        }
    }
}

/// The multiplier parameter `k = H(pad(N) ‖ pad(g))`.
///
/// Public so that server-side implementations and protocol tests can
/// derive the same value.
pub fn compute_k() -> BigUint {
    bytes_int(&digest_padded(&[
        &int_bytes(group_prime()),
        &int_bytes(generator()),
    ]))
}

/// The scrambler `u = H(pad(A) ‖ pad(B))`.
pub fn compute_u(a_pub: &BigUint, b_pub: &BigUint) -> BigUint {
    bytes_int(&digest_padded(&[&int_bytes(a_pub), &int_bytes(b_pub)]))
}

/// The evidence `M1 = H(A ‖ B ‖ S)`, over unpadded encodings.
pub fn compute_evidence(a_pub: &BigUint, b_pub: &BigUint, secret: &BigUint) -> BigUint {
    bytes_int(&digest(&[
        &int_bytes(a_pub),
        &int_bytes(b_pub),
        &int_bytes(secret),
    ]))
}

/// Process a login challenge `(salt, B)` into a full session.
///
/// Rejects `B ≡ 0 (mod N)` before doing any other work; such a value can
/// only come from a malicious or broken server and would make the session
/// key trivial.
pub fn process_challenge(password: &str, salt: &BigUint, b_pub: &BigUint) -> Result<SrpSession> {
    let n = group_prime();

    if (b_pub % n).is_zero() {
        return Err(AuthError::InvalidServerPublic);
    }

    let x = compute_x(salt, password);
    let a = generate_private_value()?;
    let a_pub = generator().modpow(&a, n);
    let k = compute_k();
    let u = compute_u(&a_pub, b_pub);

    // S = (B - k*g^x)^(u*x + a) mod N, with the subtraction normalized
    // into [0, N) by adding N before reducing.
    let k_gx = (generator().modpow(&x, n) * &k) % n;
    let base = (b_pub + n - &k_gx) % n;
    let exponent = &u * &x + &a;
    let secret = base.modpow(&exponent, n);

    let evidence = compute_evidence(&a_pub, b_pub, &secret);

    Ok(SrpSession {
        x,
        a,
        a_pub,
        k,
        u,
        secret,
        evidence,
    })
}
