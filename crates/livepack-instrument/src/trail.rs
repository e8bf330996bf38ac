//! Trails: paths of AST keys/indices addressing a node without retaining a
//! pointer to it.
//!
//! A trail recorded in function metadata is relative to that function's own
//! serialized AST, so the serializer can find the exact site (a const
//! violation, a `super` use, an occurrence to rename) in the snapshot without
//! re-traversing the whole module. Trails are recorded while the addressed
//! region still matches the snapshot; all structural rewrites happen on exit
//! of the rewritten region, after its trails were taken.

use serde::{Serialize, Serializer};
use smallvec::SmallVec;

/// One step of a trail: a named child or a position in a child list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrailSeg {
    Key(&'static str),
    Index(u32),
}

impl Serialize for TrailSeg {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Key(key) => serializer.serialize_str(key),
            Self::Index(index) => serializer.serialize_u32(*index),
        }
    }
}

/// A path from a root node down to a target node.
pub type Trail = SmallVec<[TrailSeg; 8]>;

/// Returns `trail` rebased onto the node `prefix_len` segments deep, i.e. the
/// path from that node to the target. The caller guarantees the trail passes
/// through that node.
pub fn rebase(trail: &[TrailSeg], prefix_len: usize) -> Trail {
    debug_assert!(trail.len() >= prefix_len, "trail does not pass through the prefix node");
    trail[prefix_len..].iter().copied().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_flat_keys_and_indices() {
        let trail: Trail = [TrailSeg::Key("body"), TrailSeg::Index(2), TrailSeg::Key("argument")]
            .into_iter()
            .collect();
        let json = serde_json::to_value(&trail).unwrap();
        assert_eq!(json, serde_json::json!(["body", 2, "argument"]));
    }

    #[test]
    fn rebase_drops_the_prefix() {
        let trail = [TrailSeg::Key("body"), TrailSeg::Index(0), TrailSeg::Key("init")];
        let rebased = rebase(&trail, 2);
        assert_eq!(rebased.as_slice(), &[TrailSeg::Key("init")]);
    }
}
