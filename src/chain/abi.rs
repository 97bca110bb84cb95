//! Minimal ABI word codec for the governor surface
//!
//! Herald talks to exactly one contract shape, so instead of a general
//! ABI library this module carries the handful of encoders and decoders
//! the stages need: the `propose`/`castVote`/`proposalDeadline` calls and
//! the `ProposalCreated` event payload. Selectors and the event topic are
//! fixed constants, documented with their Solidity signatures.
//!
//! Layout follows the standard head/tail rules: static values occupy one
//! 32-byte word in place, dynamic values leave an offset word behind and
//! append their content to the tail of the enclosing section.

use std::fmt;

use crate::chain::ProposalCreatedEvent;
use crate::types::{HeraldError, Result, ValidatedCall};

/// Width of one ABI word in bytes.
pub const WORD: usize = 32;

/// Selector of `propose(address[],uint256[],string[],bytes[],string)`.
pub const PROPOSE_SELECTOR: [u8; 4] = [0xda, 0x95, 0x69, 0x1a];

/// Selector of `castVote(uint256,uint8)`.
pub const CAST_VOTE_SELECTOR: [u8; 4] = [0x56, 0x78, 0x13, 0x88];

/// Selector of `proposalDeadline(uint256)`.
pub const PROPOSAL_DEADLINE_SELECTOR: [u8; 4] = [0xc0, 0x1f, 0x9e, 0x37];

/// Log topic of
/// `ProposalCreated(uint256,address,address[],uint256[],string[],bytes[],uint256,uint256,string)`.
pub const PROPOSAL_CREATED_TOPIC: &str =
    "0x7d84a6263ae0d98d3329bd7b46bb4e8d6f98cd35a7adb45c274c8b7fd5ebd5e0";

/// A 20-byte account address, parsed from and displayed as 0x-hex.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address([u8; 20]);

impl Address {
    pub fn parse(text: &str) -> Result<Self> {
        let digits = text.strip_prefix("0x").ok_or_else(|| {
            HeraldError::Validation(format!("address must be 0x-prefixed: {}", text))
        })?;
        if digits.len() != 40 {
            return Err(HeraldError::Validation(format!(
                "address must be 20 bytes of hex: {}",
                text
            )));
        }
        let bytes = hex::decode(digits)
            .map_err(|e| HeraldError::Validation(format!("address is not valid hex: {}", e)))?;
        let mut out = [0u8; 20];
        out.copy_from_slice(&bytes);
        Ok(Self(out))
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

/// A 256-bit unsigned integer stored as a big-endian word.
///
/// Decimal parsing covers values up to u128; anything larger has to be
/// written as 0x-hex. Proposal ids and call values fit comfortably.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Uint256([u8; 32]);

impl Uint256 {
    pub const ZERO: Self = Self([0u8; 32]);

    pub fn from_u64(value: u64) -> Self {
        Self::from_u128(value as u128)
    }

    pub fn from_u128(value: u128) -> Self {
        let mut out = [0u8; 32];
        out[16..].copy_from_slice(&value.to_be_bytes());
        Self(out)
    }

    pub fn from_be_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Parse a decimal literal or a 0x-hex literal of up to 32 bytes.
    pub fn parse(text: &str) -> Result<Self> {
        if let Some(digits) = text.strip_prefix("0x") {
            if digits.is_empty() || digits.len() > 64 {
                return Err(HeraldError::Validation(format!(
                    "hex integer out of range: {}",
                    text
                )));
            }
            let padded = format!("{:0>64}", digits);
            let bytes = hex::decode(&padded).map_err(|e| {
                HeraldError::Validation(format!("integer is not valid hex: {}", e))
            })?;
            let mut out = [0u8; 32];
            out.copy_from_slice(&bytes);
            return Ok(Self(out));
        }
        let value: u128 = text.parse().map_err(|_| {
            HeraldError::Validation(format!(
                "integer is not decimal (use 0x-hex for values beyond u128): {}",
                text
            ))
        })?;
        Ok(Self::from_u128(value))
    }

    /// The value as u128, or None if the high half is set.
    pub fn to_u128(&self) -> Option<u128> {
        if self.0[..16].iter().any(|&b| b != 0) {
            return None;
        }
        let mut low = [0u8; 16];
        low.copy_from_slice(&self.0[16..]);
        Some(u128::from_be_bytes(low))
    }

    pub fn to_be_bytes(&self) -> [u8; 32] {
        self.0
    }
}

impl fmt::Display for Uint256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_u128() {
            Some(value) => write!(f, "{}", value),
            None => write!(f, "0x{}", hex::encode(self.0)),
        }
    }
}

impl fmt::Debug for Uint256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Uint256({})", self)
    }
}

/// One ABI value. Covers the governor surface only.
#[derive(Debug, Clone)]
pub enum Token {
    Uint(Uint256),
    Address(Address),
    Bytes(Vec<u8>),
    Str(String),
    Array(Vec<Token>),
}

impl Token {
    fn is_dynamic(&self) -> bool {
        matches!(self, Token::Bytes(_) | Token::Str(_) | Token::Array(_))
    }
}

/// Encode a call: selector followed by the head/tail argument layout.
pub fn encode_call(selector: [u8; 4], tokens: &[Token]) -> Vec<u8> {
    let mut out = selector.to_vec();
    out.extend(encode_tokens(tokens));
    out
}

/// Encode `propose(address[],uint256[],string[],bytes[],string)`.
pub fn encode_propose(call: &ValidatedCall) -> Vec<u8> {
    let tokens = [
        Token::Array(call.targets.iter().map(|a| Token::Address(*a)).collect()),
        Token::Array(call.values.iter().map(|v| Token::Uint(*v)).collect()),
        Token::Array(call.signatures.iter().map(|s| Token::Str(s.clone())).collect()),
        Token::Array(call.calldatas.iter().map(|c| Token::Bytes(c.clone())).collect()),
        Token::Str(call.description.clone()),
    ];
    encode_call(PROPOSE_SELECTOR, &tokens)
}

/// Encode `castVote(uint256,uint8)`.
pub fn encode_cast_vote(proposal_id: &Uint256, support: u8) -> Vec<u8> {
    encode_call(
        CAST_VOTE_SELECTOR,
        &[
            Token::Uint(*proposal_id),
            Token::Uint(Uint256::from_u64(support as u64)),
        ],
    )
}

/// Encode `proposalDeadline(uint256)`.
pub fn encode_proposal_deadline(proposal_id: &Uint256) -> Vec<u8> {
    encode_call(PROPOSAL_DEADLINE_SELECTOR, &[Token::Uint(*proposal_id)])
}

fn encode_tokens(tokens: &[Token]) -> Vec<u8> {
    let head_len = tokens.len() * WORD;
    let mut head = Vec::with_capacity(head_len);
    let mut tail: Vec<u8> = Vec::new();
    for token in tokens {
        if token.is_dynamic() {
            head.extend(uint_word((head_len + tail.len()) as u64));
            tail.extend(encode_value(token));
        } else {
            head.extend(encode_value(token));
        }
    }
    head.extend(tail);
    head
}

fn encode_value(token: &Token) -> Vec<u8> {
    match token {
        Token::Uint(value) => value.0.to_vec(),
        Token::Address(address) => {
            let mut word = vec![0u8; 12];
            word.extend_from_slice(address.as_bytes());
            word
        }
        Token::Bytes(bytes) => encode_padded_bytes(bytes),
        Token::Str(text) => encode_padded_bytes(text.as_bytes()),
        Token::Array(items) => {
            let mut out = uint_word(items.len() as u64).to_vec();
            out.extend(encode_tokens(items));
            out
        }
    }
}

fn encode_padded_bytes(bytes: &[u8]) -> Vec<u8> {
    let mut out = uint_word(bytes.len() as u64).to_vec();
    out.extend_from_slice(bytes);
    let rem = bytes.len() % WORD;
    if rem != 0 {
        out.extend(std::iter::repeat(0u8).take(WORD - rem));
    }
    out
}

fn uint_word(value: u64) -> [u8; 32] {
    Uint256::from_u64(value).0
}

/// Decode the non-indexed payload of a `ProposalCreated` log.
///
/// Word layout: id, proposer, targets*, values*, signatures*, calldatas*,
/// startBlock, endBlock, description* (starred words are offsets into the
/// dynamic section). Only the fields the mirror stage consumes are read.
pub fn decode_proposal_created(data: &[u8]) -> Result<ProposalCreatedEvent> {
    let id = read_word(data, 0)?;
    let start_block = read_u64_word(data, 6)?;
    let end_block = read_u64_word(data, 7)?;
    let description_offset = read_u64_word(data, 8)? as usize;
    let description = read_string_at(data, description_offset)?;
    Ok(ProposalCreatedEvent {
        id,
        start_block,
        end_block,
        description,
    })
}

fn read_word(data: &[u8], index: usize) -> Result<Uint256> {
    let start = index * WORD;
    let end = start + WORD;
    if data.len() < end {
        return Err(HeraldError::Validation(format!(
            "event payload too short: wanted word {}, have {} bytes",
            index,
            data.len()
        )));
    }
    let mut word = [0u8; 32];
    word.copy_from_slice(&data[start..end]);
    Ok(Uint256(word))
}

fn read_u64_word(data: &[u8], index: usize) -> Result<u64> {
    let word = read_word(data, index)?;
    let value = word
        .to_u128()
        .filter(|v| *v <= u64::MAX as u128)
        .ok_or_else(|| {
            HeraldError::Validation(format!("event word {} does not fit in u64", index))
        })?;
    Ok(value as u64)
}

fn read_string_at(data: &[u8], offset: usize) -> Result<String> {
    if offset % WORD != 0 || data.len() < offset + WORD {
        return Err(HeraldError::Validation(format!(
            "bad string offset {} in event payload",
            offset
        )));
    }
    let len = read_u64_word(data, offset / WORD)? as usize;
    let start = offset + WORD;
    if data.len() < start + len {
        return Err(HeraldError::Validation(format!(
            "string of {} bytes overruns event payload",
            len
        )));
    }
    String::from_utf8(data[start..start + len].to_vec())
        .map_err(|e| HeraldError::Validation(format!("string is not UTF-8: {}", e)))
}

/// Decode a single-word uint return value from an `eth_call` output.
pub fn decode_uint_output(data: &[u8]) -> Result<Uint256> {
    if data.len() < WORD {
        return Err(HeraldError::Validation(format!(
            "call output too short for a word: {} bytes",
            data.len()
        )));
    }
    read_word(data, 0)
}

/// Decode a 0x-prefixed hex string. An empty "0x" yields an empty vec.
pub fn decode_hex(text: &str) -> Result<Vec<u8>> {
    let digits = text
        .strip_prefix("0x")
        .ok_or_else(|| HeraldError::Validation(format!("expected 0x-hex, got: {}", text)))?;
    hex::decode(digits).map_err(|e| HeraldError::Validation(format!("invalid hex: {}", e)))
}

/// Encode bytes as a 0x-prefixed hex string.
pub fn encode_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}
