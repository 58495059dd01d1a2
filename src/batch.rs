use crate::locator::TextUnit;

pub const DEFAULT_BATCH_SIZE: usize = 20;

/// Units translated together in one service call.
#[derive(Debug, Clone)]
pub struct Batch {
    pub index: usize,
    pub units: Vec<TextUnit>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

/// Splits units into consecutive batches of at most `size` units, keeping
/// discovery order. A size of zero is treated as one.
pub fn group_units(units: Vec<TextUnit>, size: usize) -> Vec<Batch> {
    let size = size.max(1);
    let mut batches = Vec::with_capacity(units.len().div_ceil(size));
    let mut units = units.into_iter().peekable();
    while units.peek().is_some() {
        let chunk: Vec<TextUnit> = units.by_ref().take(size).collect();
        batches.push(Batch {
            index: batches.len(),
            units: chunk,
        });
    }
    batches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::UnitId;
    use kuchiki::NodeRef;

    fn units(count: usize) -> Vec<TextUnit> {
        (0..count)
            .map(|i| TextUnit::new(UnitId(i), NodeRef::new_text(format!("text {}", i))))
            .collect()
    }

    #[test]
    fn forty_five_units_make_three_batches() {
        let batches = group_units(units(45), DEFAULT_BATCH_SIZE);
        let sizes: Vec<usize> = batches.iter().map(Batch::len).collect();
        assert_eq!(sizes, vec![20, 20, 5]);
        let indexes: Vec<usize> = batches.iter().map(|batch| batch.index).collect();
        assert_eq!(indexes, vec![0, 1, 2]);
    }

    #[test]
    fn batches_partition_units_in_order() {
        let batches = group_units(units(41), 7);
        let ids: Vec<usize> = batches
            .iter()
            .flat_map(|batch| batch.units.iter().map(|unit| unit.id().0))
            .collect();
        assert_eq!(ids, (0..41).collect::<Vec<_>>());
        assert!(batches[..batches.len() - 1].iter().all(|batch| batch.len() == 7));
        assert_eq!(batches.last().map(Batch::len), Some(6));
    }

    #[test]
    fn empty_input_and_zero_size() {
        assert!(group_units(Vec::new(), 20).is_empty());
        assert_eq!(group_units(units(3), 0).len(), 3);
    }
}
