//! Proposal, tally and call-parameter data model
//!
//! `HubProposal` is the shape the voting hub returns from its proposal
//! query. `VoteTally` carries the decision math shared by the submit and
//! relay gates. `CallBundle` is the untrusted call payload embedded in a
//! proposal body; `validate()` turns it into the typed `ValidatedCall`
//! that is allowed anywhere near the chain.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::chain::abi::{Address, Uint256};
use crate::types::{HeraldError, Result};

/// Relative tolerance when cross-checking a reported tally total against
/// the recomputed sum of its scores.
const TALLY_SUM_TOLERANCE: f64 = 1e-6;

/// Lifecycle state filter understood by the hub's proposal query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProposalState {
    Pending,
    Active,
    Closed,
}

impl ProposalState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Closed => "closed",
        }
    }
}

/// A proposal as returned by the hub.
///
/// Scores are absent until voting has started, so both tally fields
/// default to empty/zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HubProposal {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub choices: Vec<String>,
    pub start: u64,
    pub end: u64,
    pub snapshot: u64,
    #[serde(default)]
    pub scores: Vec<f64>,
    #[serde(default)]
    pub scores_total: f64,
}

impl HubProposal {
    pub fn tally(&self) -> VoteTally {
        VoteTally::new(self.scores.clone(), self.scores_total)
    }
}

/// Per-choice vote scores plus the hub-reported total.
#[derive(Debug, Clone, PartialEq)]
pub struct VoteTally {
    pub scores: Vec<f64>,
    pub total: f64,
}

impl VoteTally {
    pub fn new(scores: Vec<f64>, total: f64) -> Self {
        Self { scores, total }
    }

    /// A tally with no votes cast. Decisions on an empty tally are
    /// undefined, so callers reject instead.
    pub fn is_empty(&self) -> bool {
        self.total == 0.0 || self.scores.is_empty()
    }

    /// Index of the winning choice. Ties resolve to the lowest index.
    pub fn winning_choice(&self) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (idx, &score) in self.scores.iter().enumerate() {
            match best {
                Some((_, top)) if score <= top => {}
                _ => best = Some((idx, score)),
            }
        }
        best.map(|(idx, _)| idx)
    }

    /// Share of the total held by the first choice; 0 on an empty tally.
    pub fn approval_ratio(&self) -> f64 {
        if self.total == 0.0 {
            return 0.0;
        }
        self.scores.first().copied().unwrap_or(0.0) / self.total
    }

    /// Cross-check the reported total against the recomputed score sum.
    /// The hub is not trusted to report a consistent total.
    pub fn check_consistency(&self) -> std::result::Result<(), String> {
        let sum: f64 = self.scores.iter().sum();
        let tolerance = TALLY_SUM_TOLERANCE * self.total.abs().max(1.0);
        if (sum - self.total).abs() > tolerance {
            return Err(format!(
                "reported total {} disagrees with recomputed sum {}",
                self.total, sum
            ));
        }
        Ok(())
    }
}

/// Call parameters as embedded in a proposal body. Untrusted input:
/// everything here still has to pass `validate()`.
///
/// Values may arrive as JSON numbers or as decimal/hex strings; amounts
/// beyond u64 must use the string form.
#[derive(Debug, Clone, Deserialize)]
pub struct CallBundle {
    pub targets: Vec<String>,
    pub values: Vec<JsonValue>,
    pub signatures: Vec<String>,
    pub calldatas: Vec<String>,
    pub description: String,
}

/// The checked form of a `CallBundle`, safe to encode and submit.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedCall {
    pub targets: Vec<Address>,
    pub values: Vec<Uint256>,
    pub signatures: Vec<String>,
    pub calldatas: Vec<Vec<u8>>,
    pub description: String,
}

impl CallBundle {
    /// Check every field and produce the typed call. The first violation
    /// rejects the whole bundle; there is no partial submission.
    pub fn validate(&self) -> Result<ValidatedCall> {
        let n = self.targets.len();
        if self.values.len() != n || self.signatures.len() != n || self.calldatas.len() != n {
            return Err(HeraldError::Validation(format!(
                "call arrays disagree on length: {} targets, {} values, {} signatures, {} calldatas",
                n,
                self.values.len(),
                self.signatures.len(),
                self.calldatas.len()
            )));
        }

        let targets = self
            .targets
            .iter()
            .map(|t| Address::parse(t))
            .collect::<Result<Vec<_>>>()?;
        let values = self
            .values
            .iter()
            .map(parse_value)
            .collect::<Result<Vec<_>>>()?;
        let calldatas = self
            .calldatas
            .iter()
            .map(|c| parse_calldata(c))
            .collect::<Result<Vec<_>>>()?;

        Ok(ValidatedCall {
            targets,
            values,
            signatures: self.signatures.clone(),
            calldatas,
            description: self.description.clone(),
        })
    }
}

fn parse_value(value: &JsonValue) -> Result<Uint256> {
    match value {
        JsonValue::Number(n) => n.as_u64().map(Uint256::from_u64).ok_or_else(|| {
            HeraldError::Validation(format!("value is not an unsigned integer: {}", n))
        }),
        JsonValue::String(s) => Uint256::parse(s),
        other => Err(HeraldError::Validation(format!(
            "value is neither a number nor a numeric string: {}",
            other
        ))),
    }
}

fn parse_calldata(calldata: &str) -> Result<Vec<u8>> {
    let digits = calldata.strip_prefix("0x").ok_or_else(|| {
        HeraldError::Validation(format!("calldata must be 0x-prefixed hex: {}", calldata))
    })?;
    if digits.len() % 2 != 0 {
        return Err(HeraldError::Validation(format!(
            "calldata has an odd number of hex digits: {}",
            calldata
        )));
    }
    hex::decode(digits)
        .map_err(|e| HeraldError::Validation(format!("calldata is not valid hex: {}", e)))
}
