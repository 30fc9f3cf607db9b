// Partial merkle trees and filtered blocks

mod tree;
mod block;

pub use tree::{MAX_TRANSACTIONS, MerkleTree, build_proof};
pub use block::MerkleBlock;
