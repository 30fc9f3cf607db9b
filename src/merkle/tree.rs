// Partial merkle tree reconstruction (BIP37)

use crate::core::{Hash256, bit_field_to_bytes, merkle_parent};
use crate::error::{Result, WireError};
use std::fmt;

/// Most transactions a block can hold: maximum block weight divided by the
/// weight of the smallest possible transaction
pub const MAX_TRANSACTIONS: u32 = 4_000_000 / 240;

/// Depth of the leaf level for a tree of `total` leaves (root is depth 0)
fn leaf_depth(total: u32) -> u32 {
    total.next_power_of_two().trailing_zeros()
}

/// Number of slots at `depth` in a tree of `total` leaves
fn level_width(total: u32, max_depth: u32, depth: u32) -> usize {
    let span = 1u64 << (max_depth - depth);
    (total as u64).div_ceil(span) as usize
}

/// A merkle tree being rebuilt from a peer's proof.
///
/// Every slot starts unknown (`None`). Reconstruction fills the slots it can
/// derive from the supplied hashes and flag bits; the root slot is always
/// filled when reconstruction succeeds.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    total: u32,
    max_depth: u32,
    nodes: Vec<Vec<Option<Hash256>>>,
}

/// Read position inside the flag bits and hash list
struct ProofCursor<'a> {
    flags: &'a [bool],
    hashes: &'a [Hash256],
    flags_used: usize,
    hashes_used: usize,
    matches: Vec<Hash256>,
}

impl ProofCursor<'_> {
    fn next_flag(&mut self) -> Result<bool> {
        let flag = *self
            .flags
            .get(self.flags_used)
            .ok_or_else(|| WireError::malformed(format!("ran out of flag bits after {}", self.flags_used)))?;
        self.flags_used += 1;
        Ok(flag)
    }

    fn next_hash(&mut self) -> Result<Hash256> {
        let hash = *self
            .hashes
            .get(self.hashes_used)
            .ok_or_else(|| WireError::malformed(format!("ran out of hashes after {}", self.hashes_used)))?;
        self.hashes_used += 1;
        Ok(hash)
    }
}

impl MerkleTree {
    /// Empty tree shaped for `total` leaves
    pub fn new(total: u32) -> Result<Self> {
        if total == 0 {
            return Err(WireError::malformed("tree has no transactions"));
        }
        if total > MAX_TRANSACTIONS {
            return Err(WireError::malformed(format!(
                "{} transactions exceeds the block limit of {}",
                total, MAX_TRANSACTIONS
            )));
        }

        let max_depth = leaf_depth(total);
        let nodes = (0..=max_depth)
            .map(|depth| vec![None; level_width(total, max_depth, depth)])
            .collect();

        Ok(Self {
            total,
            max_depth,
            nodes,
        })
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    /// Depth of the leaf level
    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    /// Slots per level, root level first
    pub fn levels(&self) -> &[Vec<Option<Hash256>>] {
        &self.nodes
    }

    pub fn root(&self) -> Option<Hash256> {
        self.nodes[0][0]
    }

    /// Rebuild the tree from depth-first flag bits and hashes.
    ///
    /// Returns the leaves whose flag bit was set (the matched transactions).
    /// Every hash must be used, and unused flag bits are only accepted as
    /// zero padding inside the final byte.
    pub fn populate(&mut self, flags: &[bool], hashes: &[Hash256]) -> Result<Vec<Hash256>> {
        if hashes.len() > self.total as usize {
            return Err(WireError::malformed(format!(
                "{} hashes for {} transactions",
                hashes.len(),
                self.total
            )));
        }
        if flags.len() < hashes.len() {
            return Err(WireError::malformed(format!(
                "{} flag bits cannot cover {} hashes",
                flags.len(),
                hashes.len()
            )));
        }

        let mut cursor = ProofCursor {
            flags,
            hashes,
            flags_used: 0,
            hashes_used: 0,
            matches: Vec::new(),
        };
        self.visit(0, 0, &mut cursor)?;

        if cursor.hashes_used != hashes.len() {
            return Err(WireError::malformed(format!(
                "{} of {} hashes not consumed",
                hashes.len() - cursor.hashes_used,
                hashes.len()
            )));
        }

        let leftover = &flags[cursor.flags_used..];
        if leftover.len() >= 8 {
            return Err(WireError::malformed(format!(
                "{} flag bits not consumed",
                leftover.len()
            )));
        }
        if leftover.iter().any(|&bit| bit) {
            return Err(WireError::malformed("non-zero flag bits left over"));
        }

        Ok(cursor.matches)
    }

    /// Depth-first visit of the slot at (`depth`, `index`)
    fn visit(&mut self, depth: u32, index: usize, cursor: &mut ProofCursor) -> Result<Hash256> {
        let flag = cursor.next_flag()?;

        let hash = if depth == self.max_depth {
            let leaf = cursor.next_hash()?;
            if flag {
                cursor.matches.push(leaf);
            }
            leaf
        } else if !flag {
            cursor.next_hash()?
        } else {
            let left = self.visit(depth + 1, index * 2, cursor)?;
            let right_index = index * 2 + 1;
            if right_index < self.nodes[depth as usize + 1].len() {
                let right = self.visit(depth + 1, right_index, cursor)?;
                // Identical siblings would let a block with duplicated
                // transactions share the same root
                if right == left {
                    return Err(WireError::malformed(format!(
                        "duplicate sibling hashes at depth {}",
                        depth + 1
                    )));
                }
                merkle_parent(&left, &right)
            } else {
                merkle_parent(&left, &left)
            }
        };

        self.nodes[depth as usize][index] = Some(hash);
        Ok(hash)
    }
}

impl fmt::Display for MerkleTree {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (depth, level) in self.nodes.iter().enumerate() {
            if depth > 0 {
                writeln!(f)?;
            }
            let items: Vec<String> = level
                .iter()
                .map(|slot| match slot {
                    Some(hash) => format!("{}...", &hash.to_hex()[..8]),
                    None => "None".to_string(),
                })
                .collect();
            write!(f, "{}", items.join(", "))?;
        }
        Ok(())
    }
}

/// Build the hash list and flag bytes a full node sends for `txids`,
/// revealing the transactions marked in `matches`.
pub fn build_proof(txids: &[Hash256], matches: &[bool]) -> Result<(Vec<Hash256>, Vec<u8>)> {
    if txids.len() != matches.len() {
        return Err(WireError::invalid(
            "proof matches",
            format!("{} flags for {} transactions", matches.len(), txids.len()),
        ));
    }
    let total = u32::try_from(txids.len()).unwrap_or(u32::MAX);
    let tree = MerkleTree::new(total)?;

    // Full tree, leaf level last
    let mut levels = vec![txids.to_vec()];
    while levels[0].len() > 1 {
        let parents = levels[0]
            .chunks(2)
            .map(|pair| merkle_parent(&pair[0], pair.get(1).unwrap_or(&pair[0])))
            .collect();
        levels.insert(0, parents);
    }

    let mut hashes = Vec::new();
    let mut bits = Vec::new();
    build_node(&tree, &levels, matches, 0, 0, &mut hashes, &mut bits);

    bits.resize(bits.len().next_multiple_of(8), false);
    let flags = bit_field_to_bytes(&bits)?;
    Ok((hashes, flags))
}

fn build_node(
    tree: &MerkleTree,
    levels: &[Vec<Hash256>],
    matches: &[bool],
    depth: u32,
    index: usize,
    hashes: &mut Vec<Hash256>,
    bits: &mut Vec<bool>,
) {
    let span = 1usize << (tree.max_depth - depth);
    let start = index * span;
    let end = (start + span).min(matches.len());
    let has_match = matches[start..end].iter().any(|&m| m);
    bits.push(has_match);

    if depth == tree.max_depth || !has_match {
        hashes.push(levels[depth as usize][index]);
        return;
    }

    build_node(tree, levels, matches, depth + 1, index * 2, hashes, bits);
    if index * 2 + 1 < tree.levels()[depth as usize + 1].len() {
        build_node(tree, levels, matches, depth + 1, index * 2 + 1, hashes, bits);
    }
}
