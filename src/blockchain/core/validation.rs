use crate::blockchain::core::chain::Block;
use serde::Serialize;
use std::fmt;

/// Outcome of [`verify_chain`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyReport {
    pub valid: bool,
    pub first_invalid_index: Option<u64>,
}

impl VerifyReport {
    pub fn valid() -> Self {
        VerifyReport {
            valid: true,
            first_invalid_index: None,
        }
    }

    pub fn invalid_at(index: u64) -> Self {
        VerifyReport {
            valid: false,
            first_invalid_index: Some(index),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    /// `prev_hash` does not equal the predecessor's `hash`.
    Linkage,
    /// Stored `hash` does not match recomputation.
    HashMismatch,
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FaultKind::Linkage => write!(f, "prev_hash does not match predecessor hash"),
            FaultKind::HashMismatch => write!(f, "stored hash does not match recomputation"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainFault {
    /// Position of the offending block in the sequence.
    pub index: u64,
    pub kind: FaultKind,
}

/// Recompute a single block's hash.
pub fn check_block_hash(block: &Block) -> Option<ChainFault> {
    (block.calculate_hash() != block.hash).then(|| ChainFault {
        index: block.index,
        kind: FaultKind::HashMismatch,
    })
}

fn check_linkage(position: usize, block: &Block, prev: &Block) -> Option<ChainFault> {
    (block.prev_hash != prev.hash).then(|| ChainFault {
        index: position as u64,
        kind: FaultKind::Linkage,
    })
}

/// Faults for the block at `position`, linkage first.
fn block_faults(blocks: &[Block], position: usize) -> impl Iterator<Item = ChainFault> {
    let block = &blocks[position];
    let linkage = position
        .checked_sub(1)
        .and_then(|p| check_linkage(position, block, &blocks[p]));
    let hash = check_block_hash(block).map(|fault| ChainFault {
        index: position as u64,
        ..fault
    });
    linkage.into_iter().chain(hash)
}

/// Walk the chain and stop at the first block failing linkage or hash
/// recomputation. The genesis block is only hash-checked. Timestamps are not
/// checked. An empty slice is valid.
pub fn verify_chain(blocks: &[Block]) -> VerifyReport {
    (0..blocks.len())
        .find_map(|position| block_faults(blocks, position).next())
        .map_or_else(VerifyReport::valid, |fault| VerifyReport::invalid_at(fault.index))
}

/// Like [`verify_chain`] but keeps scanning and reports every fault.
pub fn audit_chain(blocks: &[Block]) -> Vec<ChainFault> {
    (0..blocks.len())
        .flat_map(|position| block_faults(blocks, position))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_chain(payloads: &[&str]) -> Vec<Block> {
        let mut chain = vec![Block::genesis(1_700_000_000)];
        for (i, payload) in payloads.iter().enumerate() {
            let prev = chain.last().unwrap();
            let block = Block::new(
                prev.index + 1,
                1_700_000_000 + i as i64 + 1,
                prev.hash.clone(),
                payload.to_string(),
            );
            chain.push(block);
        }
        chain
    }

    #[test]
    fn test_empty_and_genesis_only_are_valid() {
        assert_eq!(verify_chain(&[]), VerifyReport::valid());
        assert_eq!(verify_chain(&build_chain(&[])), VerifyReport::valid());
    }

    #[test]
    fn test_intact_chain_is_valid() {
        let chain = build_chain(&["A", "B", "C"]);
        assert!(verify_chain(&chain).valid);
        assert!(audit_chain(&chain).is_empty());
    }

    #[test]
    fn test_payload_tamper_reported_at_block() {
        let mut chain = build_chain(&["A", "B"]);
        chain[1].payload = "X".to_string();
        assert_eq!(verify_chain(&chain), VerifyReport::invalid_at(1));
    }

    #[test]
    fn test_prev_hash_tamper_reported_as_linkage() {
        let mut chain = build_chain(&["A", "B"]);
        chain[2].prev_hash = "f".repeat(64);
        assert_eq!(verify_chain(&chain), VerifyReport::invalid_at(2));

        let faults = audit_chain(&chain);
        assert_eq!(faults[0], ChainFault { index: 2, kind: FaultKind::Linkage });
        assert_eq!(faults[1], ChainFault { index: 2, kind: FaultKind::HashMismatch });
    }

    #[test]
    fn test_timestamps_are_not_checked() {
        let mut chain = vec![Block::genesis(1_700_000_000)];
        let prev = chain[0].clone();
        chain.push(Block::new(1, 1_600_000_000, prev.hash, "earlier".to_string()));
        assert!(verify_chain(&chain).valid);
    }

    #[test]
    fn test_genesis_hash_is_checked() {
        let mut chain = build_chain(&["A"]);
        chain[0].hash = "0".to_string();
        assert_eq!(verify_chain(&chain), VerifyReport::invalid_at(0));
    }

    #[test]
    fn test_audit_reports_every_fault() {
        let mut chain = build_chain(&["A", "B", "C"]);
        chain[1].payload = "X".to_string();
        chain[3].timestamp += 1;

        let faults = audit_chain(&chain);
        assert_eq!(
            faults,
            vec![
                ChainFault { index: 1, kind: FaultKind::HashMismatch },
                ChainFault { index: 3, kind: FaultKind::HashMismatch },
            ]
        );
        // verify stops at the first one
        assert_eq!(verify_chain(&chain), VerifyReport::invalid_at(1));
    }

    #[test]
    fn test_report_serializes_camel_case() {
        let json = serde_json::to_value(VerifyReport::invalid_at(1)).unwrap();
        assert_eq!(json["valid"], false);
        assert_eq!(json["firstInvalidIndex"], 1);
    }
}
