//! Golden test vectors for cross-implementation verification.
//!
//! Every implementation of the Payout Kernel must produce identical:
//! - request_bytes (canonical CBOR)
//! - checkpoint chain over the vectors appended in order

use payout_kernel::core::{
    canonical_request_bytes, chain_step, decode_request, verify_chain, ActionLog, CoreError,
    LOG_DOMAIN,
};
use payout_kernel::{Amount, Checkpoint, PartyId, PayoutRequest};
use serde::{Deserialize, Serialize};

/// A single golden test vector.
#[derive(Debug, Serialize, Deserialize)]
pub struct GoldenVector {
    pub name: String,
    pub description: String,

    // Inputs
    pub recipient: String, // 32 bytes hex
    pub amount: u64,       // base units
    pub is_pending: bool,

    // Derived outputs (hex)
    pub request_bytes: String,
    pub position: u64,
    pub checkpoint: String, // after appending this vector
}

struct Input {
    name: &'static str,
    description: &'static str,
    recipient: [u8; 32],
    amount: u64,
    is_pending: bool,
    expected_bytes: String,
    /// Checkpoint after appending this vector to the ones before it.
    expected_checkpoint: &'static str,
}

/// `Checkpoint::genesis()`, hex.
const GENESIS_HEX: &str = "0f582307138a772c52705b18bf3a67061e9c6f7c6ec2d7cc87b8dad09f1e7a82";

fn map_hex(recipient: [u8; 32], amount_hex: &str, pending: bool) -> String {
    format!(
        "a3005820{}01{}02{}",
        hex::encode(recipient),
        amount_hex,
        if pending { "f5" } else { "f4" }
    )
}

fn inputs() -> Vec<Input> {
    vec![
        // Vector 1: one whole unit
        Input {
            name: "one_unit",
            description: "Pending request for 1.0 (uint32 amount)",
            recipient: [0xb0; 32],
            amount: Amount::units(1).get(),
            is_pending: true,
            expected_bytes: map_hex([0xb0; 32], "1a3b9aca00", true),
            expected_checkpoint: "d227ba21c742b6260a40128e519e95af07ae8292e3ae4d817d2467f5d5193fed",
        },
        // Vector 2: fractional amount
        Input {
            name: "one_and_a_half",
            description: "Pending request for 1.5",
            recipient: [0xd0; 32],
            amount: Amount::milli_units(1_500).get(),
            is_pending: true,
            expected_bytes: map_hex([0xd0; 32], "1a59682f00", true),
            expected_checkpoint: "08b21e04305fb7edb709caa2f786cced0c74ae30a41c7c2605695a8cc97bb9e7",
        },
        // Vector 3: filler
        Input {
            name: "filler",
            description: "Non-pending padding entry",
            recipient: [0x00; 32],
            amount: 0,
            is_pending: false,
            expected_bytes: map_hex([0x00; 32], "00", false),
            expected_checkpoint: "85ffd76ed603e0fb88cbf400d86d83816ffff1fa4f804530a167c7b4f0e829c1",
        },
        // Vector 4: largest immediate integer
        Input {
            name: "amount_23",
            description: "Amount encoded in the initial byte",
            recipient: [0x01; 32],
            amount: 23,
            is_pending: true,
            expected_bytes: map_hex([0x01; 32], "17", true),
            expected_checkpoint: "658b00ef941d69e22b1c2afe9db9f2dcc0b8de67ee6f2d1558baf8e66954fc3e",
        },
        // Vector 5: smallest one-byte integer
        Input {
            name: "amount_24",
            description: "Amount needing one extra byte",
            recipient: [0x02; 32],
            amount: 24,
            is_pending: true,
            expected_bytes: map_hex([0x02; 32], "1818", true),
            expected_checkpoint: "0aac0f884a23276d906076bc4ea91b15f64f65e02b88649efd9ece02b242f37e",
        },
        // Vector 6: two-byte integer
        Input {
            name: "amount_256",
            description: "Amount needing two extra bytes",
            recipient: [0x03; 32],
            amount: 256,
            is_pending: true,
            expected_bytes: map_hex([0x03; 32], "190100", true),
            expected_checkpoint: "27d81cece1e5a3b75dd2f3261897e6cb7701e8824716052e6947417aa9941508",
        },
        // Vector 7: maximum amount
        Input {
            name: "amount_max",
            description: "u64::MAX base units (uint64)",
            recipient: [0xff; 32],
            amount: u64::MAX,
            is_pending: true,
            expected_bytes: map_hex([0xff; 32], "1bffffffffffffffff", true),
            expected_checkpoint: "1f4f823717a0aa87267b2047f52ade3ab5db5efe68952abf81e24f8da985d8e7",
        },
        // Vector 8: duplicate of vector 1
        Input {
            name: "one_unit_again",
            description: "Same request as one_unit; same bytes, new checkpoint",
            recipient: [0xb0; 32],
            amount: Amount::units(1).get(),
            is_pending: true,
            expected_bytes: map_hex([0xb0; 32], "1a3b9aca00", true),
            expected_checkpoint: "23efc84c2b94ef72f6d1512bc871db4687d6974a71143707e645a585d62022b6",
        },
    ]
}

fn request_of(input: &Input) -> PayoutRequest {
    PayoutRequest {
        recipient: PartyId::from_bytes(input.recipient),
        amount: Amount(input.amount),
        is_pending: input.is_pending,
    }
}

/// Generate all golden vectors, appending them to one log in order.
pub fn generate_all_vectors() -> Vec<GoldenVector> {
    let mut log = ActionLog::new();
    inputs()
        .iter()
        .map(|input| {
            let request = request_of(input);
            let request_bytes = hex::encode(canonical_request_bytes(&request));
            let entry = log.append(request);
            GoldenVector {
                name: input.name.to_string(),
                description: input.description.to_string(),
                recipient: hex::encode(input.recipient),
                amount: input.amount,
                is_pending: input.is_pending,
                request_bytes,
                position: entry.position,
                checkpoint: entry.checkpoint.to_hex(),
            }
        })
        .collect()
}

#[test]
fn test_request_bytes_match_expected() {
    for (input, vector) in inputs().iter().zip(generate_all_vectors()) {
        assert_eq!(
            vector.request_bytes, input.expected_bytes,
            "request_bytes mismatch for {}",
            vector.name
        );
    }
}

#[test]
fn test_vectors_deterministic() {
    // Generate twice, must be identical
    let v1 = generate_all_vectors();
    let v2 = generate_all_vectors();

    for (a, b) in v1.iter().zip(v2.iter()) {
        assert_eq!(a.request_bytes, b.request_bytes, "request_bytes mismatch for {}", a.name);
        assert_eq!(a.checkpoint, b.checkpoint, "checkpoint mismatch for {}", a.name);
    }
}

#[test]
fn test_vectors_verify() {
    let vectors = generate_all_vectors();
    assert_eq!(Checkpoint::genesis().to_hex(), GENESIS_HEX);
    let mut prev = Checkpoint::genesis();

    for v in &vectors {
        let bytes = hex::decode(&v.request_bytes).unwrap();
        let request = decode_request(&bytes).unwrap();

        let expected = Checkpoint::from_hex(&v.checkpoint).unwrap();
        assert_eq!(
            chain_step(&prev, v.position, &request),
            expected,
            "checkpoint mismatch for {}",
            v.name
        );
        prev = expected;
    }

    for (input, v) in inputs().iter().zip(&vectors) {
        assert_eq!(
            v.checkpoint, input.expected_checkpoint,
            "pinned checkpoint mismatch for {}",
            v.name
        );
    }

    // Identical requests at different positions get different checkpoints
    assert_eq!(vectors[0].request_bytes, vectors[7].request_bytes);
    assert_ne!(vectors[0].checkpoint, vectors[7].checkpoint);
}

#[test]
fn test_domain_separation() {
    assert_eq!(LOG_DOMAIN, b"payout-log-v0:");

    // The genesis checkpoint is the domain tag followed by "genesis"
    let mut genesis_input = LOG_DOMAIN.to_vec();
    genesis_input.extend_from_slice(b"genesis");
    assert_eq!(
        Checkpoint::from_bytes(*blake3::hash(&genesis_input).as_bytes()),
        Checkpoint::genesis()
    );
}

#[test]
fn print_golden_vectors_json() {
    let vectors = generate_all_vectors();

    #[derive(Serialize)]
    struct VectorFile {
        version: String,
        description: String,
        domain: String,
        genesis: String,
        vectors: Vec<GoldenVector>,
    }

    let file = VectorFile {
        version: "0.1.0".to_string(),
        description: "Golden test vectors for the Payout Kernel. Every implementation must produce identical outputs.".to_string(),
        domain: String::from_utf8_lossy(LOG_DOMAIN).to_string(),
        genesis: Checkpoint::genesis().to_hex(),
        vectors,
    };

    let json = serde_json::to_string_pretty(&file).unwrap();
    println!("{}", json);
}

// =============================================================================
// REJECTION TEST VECTORS
// These test that invalid inputs are properly rejected.
// =============================================================================

fn one_unit_bytes() -> Vec<u8> {
    hex::decode(map_hex([0xb0; 32], "1a3b9aca00", true)).unwrap()
}

#[test]
fn test_reject_keys_out_of_order() {
    // {1: amount, 0: recipient, 2: true}
    let bytes = hex::decode(format!(
        "a3011a3b9aca00005820{}02f5",
        hex::encode([0xb0; 32])
    ))
    .unwrap();
    assert!(
        matches!(decode_request(&bytes), Err(CoreError::MalformedRequest(_))),
        "must reject unsorted map keys"
    );
}

#[test]
fn test_reject_non_minimal_amount() {
    let bytes = hex::decode(map_hex([0xb0; 32], "1b000000003b9aca00", true)).unwrap();
    assert!(
        matches!(decode_request(&bytes), Err(CoreError::MalformedRequest(_))),
        "must reject uint64 encoding of a uint32 amount"
    );
}

#[test]
fn test_reject_indefinite_length_map() {
    let mut bytes = one_unit_bytes();
    bytes[0] = 0xbf;
    bytes.push(0xff);
    assert!(
        matches!(decode_request(&bytes), Err(CoreError::MalformedRequest(_))),
        "must reject indefinite-length map"
    );
}

#[test]
fn test_reject_short_recipient() {
    let bytes = hex::decode(format!(
        "a300581f{}011a3b9aca0002f5",
        hex::encode([0xb0; 31])
    ))
    .unwrap();
    assert!(
        matches!(decode_request(&bytes), Err(CoreError::MalformedRequest(_))),
        "must reject 31-byte recipient"
    );
}

#[test]
fn test_reject_extra_field() {
    let mut bytes = one_unit_bytes();
    bytes[0] = 0xa4;
    bytes.extend_from_slice(&[0x03, 0x00]);
    assert!(
        matches!(decode_request(&bytes), Err(CoreError::MalformedRequest(_))),
        "must reject unknown map key"
    );
}

#[test]
fn test_reject_missing_pending_flag() {
    let mut bytes = one_unit_bytes();
    bytes[0] = 0xa2;
    bytes.truncate(bytes.len() - 2);
    assert!(
        matches!(decode_request(&bytes), Err(CoreError::MalformedRequest(_))),
        "must reject map without is_pending"
    );
}

#[test]
fn test_reject_tampered_chain() {
    let mut log = ActionLog::new();
    for input in inputs() {
        log.append(request_of(&input));
    }
    let mut entries = log.entries().to_vec();
    entries[3].request.amount = Amount(22);

    assert!(
        matches!(
            verify_chain(Checkpoint::genesis(), 0, &entries),
            Err(CoreError::IntegrityViolation { position: 4, .. })
        ),
        "must reject a rewritten request"
    );
}

#[test]
fn test_reject_reordered_chain() {
    let mut log = ActionLog::new();
    for input in inputs() {
        log.append(request_of(&input));
    }
    let mut entries = log.entries().to_vec();
    entries.swap(1, 2);

    assert!(
        verify_chain(Checkpoint::genesis(), 0, &entries).is_err(),
        "must reject reordered entries"
    );
}
