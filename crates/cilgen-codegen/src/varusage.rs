//! Definite-assignment tracking. Each live control-flow path owns a [`VarUsageTable`]
//! recording, per variable slot, whether the variable was declared, used or modified on
//! that path. Entering a branch clones the table; when paths join, their tables are
//! merged with a bitwise AND, so a bit survives the join only if it holds on every path.
//!
//! Tables are chains of fixed-size blocks. Blocks are reference counted and copied on
//! write, which makes cloning a table at every fork cheap: only the blocks one of the
//! paths actually touches end up being duplicated.
use std::rc::Rc;

/// The status bits of a slot. They are combined with a bitwise OR.
pub type Status = u8;

/// Nothing is known about the slot.
pub const UNDEFINED: Status = 0;

/// The variable has been declared.
pub const DECLARED: Status = 1;

/// The value of the variable has been read.
pub const USED: Status = 2;

/// The variable has been assigned.
pub const MODIFIED: Status = 4;

/// The number of slots of a block.
pub const BLOCK_SIZE: usize = 32;

type Block = [Status; BLOCK_SIZE];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarUsageTable {
    blocks: Vec<Rc<Block>>,
}

impl VarUsageTable {
    /// Create a table for a new control-flow path. The table starts as a copy of
    /// `previous` when given, and as a single block of undefined slots otherwise.
    #[must_use]
    pub fn create(previous: Option<&VarUsageTable>) -> Self {
        match previous {
            Some(table) => table.clone(),
            None => Self {
                blocks: vec![Rc::new([UNDEFINED; BLOCK_SIZE])],
            },
        }
    }

    /// Add status bits to a slot, growing the chain with undefined blocks when the slot
    /// lies past its end.
    pub fn set_status(&mut self, slot: usize, status: Status) {
        let (block, offset) = (slot / BLOCK_SIZE, slot % BLOCK_SIZE);
        while self.blocks.len() <= block {
            self.blocks.push(Rc::new([UNDEFINED; BLOCK_SIZE]));
        }
        if self.blocks[block][offset] | status != self.blocks[block][offset] {
            Rc::make_mut(&mut self.blocks[block])[offset] |= status;
        }
    }

    /// Get the status bits of a slot. Slots past the end of the chain are undefined.
    #[must_use]
    pub fn get_status(&self, slot: usize) -> Status {
        self.blocks
            .get(slot / BLOCK_SIZE)
            .map_or(UNDEFINED, |block| block[slot % BLOCK_SIZE])
    }

    /// Reset a slot to undefined, typically when its variable goes out of scope. The
    /// chain never shrinks.
    pub fn clear_status(&mut self, slot: usize) {
        if let Some(block) = self.blocks.get_mut(slot / BLOCK_SIZE) {
            if block[slot % BLOCK_SIZE] != UNDEFINED {
                Rc::make_mut(block)[slot % BLOCK_SIZE] = UNDEFINED;
            }
        }
    }

    /// Join the tables of two control-flow paths. A missing side behaves as the identity,
    /// so merging with `None` simply copies the other table.
    ///
    /// When both are present, the result has as many blocks as the shorter chain: past
    /// the end of a chain every slot is undefined, and the AND with undefined is
    /// undefined. Chains of different lengths are therefore a legal input.
    #[must_use]
    pub fn merge(a: Option<&VarUsageTable>, b: Option<&VarUsageTable>) -> Self {
        let (a, b) = match (a, b) {
            (Some(a), Some(b)) => (a, b),
            (Some(table), None) | (None, Some(table)) => return table.clone(),
            (None, None) => return Self::create(None),
        };

        let blocks = a
            .blocks
            .iter()
            .zip(&b.blocks)
            .map(|(left, right)| {
                if Rc::ptr_eq(left, right) {
                    Rc::clone(left)
                } else {
                    Rc::new(std::array::from_fn(|idx| left[idx] & right[idx]))
                }
            })
            .collect();
        Self { blocks }
    }

    /// Get the number of slots the chain currently covers.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.blocks.len() * BLOCK_SIZE
    }
}

impl Default for VarUsageTable {
    fn default() -> Self {
        Self::create(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn branches_keep_only_common_bits() {
        let base = VarUsageTable::create(None);
        let mut then_branch = VarUsageTable::create(Some(&base));
        let mut else_branch = VarUsageTable::create(Some(&base));

        then_branch.set_status(0, DECLARED | USED);
        else_branch.set_status(0, DECLARED | MODIFIED);

        let joined = VarUsageTable::merge(Some(&then_branch), Some(&else_branch));
        assert_eq!(joined.get_status(0), DECLARED);
        assert_eq!(joined.get_status(1), UNDEFINED);
        assert_eq!(then_branch.get_status(1), UNDEFINED);
        assert_eq!(else_branch.get_status(1), UNDEFINED);

        // The forks did not leak into the table they were cloned from.
        assert_eq!(base.get_status(0), UNDEFINED);
    }

    #[test]
    fn chain_grows_on_write_only() {
        let mut table = VarUsageTable::create(None);
        assert_eq!(table.capacity(), BLOCK_SIZE);
        assert_eq!(table.get_status(1000), UNDEFINED);
        assert_eq!(table.capacity(), BLOCK_SIZE);

        table.set_status(70, MODIFIED);
        assert_eq!(table.capacity(), 3 * BLOCK_SIZE);
        assert_eq!(table.get_status(70), MODIFIED);

        table.clear_status(70);
        table.clear_status(5000);
        assert_eq!(table.get_status(70), UNDEFINED);
        assert_eq!(table.capacity(), 3 * BLOCK_SIZE);
    }

    #[test]
    fn merge_of_nothing_is_empty() {
        assert_eq!(VarUsageTable::merge(None, None), VarUsageTable::create(None));
    }

    /// A random sequence of writes to a table.
    fn writes() -> impl Strategy<Value = Vec<(usize, Status)>> {
        prop::collection::vec((0usize..200, 0u8..8), 0..64)
    }

    fn table_from(writes: &[(usize, Status)]) -> VarUsageTable {
        let mut table = VarUsageTable::create(None);
        for (slot, status) in writes {
            table.set_status(*slot, *status);
        }
        table
    }

    proptest! {
        #[test]
        fn clone_preserves_every_slot(writes in writes()) {
            let table = table_from(&writes);
            let copy = VarUsageTable::create(Some(&table));
            for slot in 0..256 {
                prop_assert_eq!(copy.get_status(slot), table.get_status(slot));
            }
        }

        #[test]
        fn writes_to_a_clone_stay_private(writes in writes(), slot in 0usize..200) {
            let table = table_from(&writes);
            let before = table.get_status(slot);
            let mut copy = VarUsageTable::create(Some(&table));
            copy.set_status(slot, DECLARED | USED | MODIFIED);
            copy.clear_status((slot + 1) % 200);
            prop_assert_eq!(table.get_status(slot), before);
        }

        #[test]
        fn merge_is_a_bitwise_and_on_the_common_prefix(left in writes(), right in writes()) {
            let a = table_from(&left);
            let b = table_from(&right);
            let merged = VarUsageTable::merge(Some(&a), Some(&b));
            let common = a.capacity().min(b.capacity());

            prop_assert_eq!(merged.capacity(), common);
            for slot in 0..256 {
                let expected = if slot < common {
                    a.get_status(slot) & b.get_status(slot)
                } else {
                    UNDEFINED
                };
                prop_assert_eq!(merged.get_status(slot), expected);
            }
        }

        #[test]
        fn merge_with_a_missing_side_is_a_clone(writes in writes()) {
            let table = table_from(&writes);
            prop_assert_eq!(VarUsageTable::merge(Some(&table), None), table.clone());
            prop_assert_eq!(VarUsageTable::merge(None, Some(&table)), table);
        }
    }
}
