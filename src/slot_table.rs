/// Tag identifying an in-flight request.
pub type Tag = u32;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("slot table exhausted: all {capacity} slots are in use")]
    Exhausted { capacity: usize },

    #[error("tag {tag} is not allocated")]
    UnknownTag { tag: Tag },
}

/// Fixed capacity table of in-flight requests.
///
/// Hands out the lowest free index as tag. A tag stays valid until it is
/// released and is never handed out twice while allocated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotTable<T> {
    entries: Box<[Option<T>]>,
    size: usize,
}

impl<T> SlotTable<T> {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: std::iter::repeat_with(|| None).take(capacity).collect(),
            size: 0,
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.size
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.size == self.entries.len()
    }

    #[must_use]
    pub fn contains(&self, tag: Tag) -> bool {
        matches!(self.entries.get(tag as usize), Some(Some(_)))
    }

    pub fn allocate(&mut self, value: T) -> Result<Tag, Error> {
        let Some((index, slot)) = self
            .entries
            .iter_mut()
            .enumerate()
            .find(|(_, slot)| slot.is_none())
        else {
            return Err(Error::Exhausted {
                capacity: self.entries.len(),
            });
        };
        *slot = Some(value);
        self.size += 1;
        Ok(index as Tag)
    }

    pub fn get(&self, tag: Tag) -> Result<&T, Error> {
        self.entries
            .get(tag as usize)
            .and_then(Option::as_ref)
            .ok_or(Error::UnknownTag { tag })
    }

    pub fn get_mut(&mut self, tag: Tag) -> Result<&mut T, Error> {
        self.entries
            .get_mut(tag as usize)
            .and_then(Option::as_mut)
            .ok_or(Error::UnknownTag { tag })
    }

    pub fn release(&mut self, tag: Tag) -> Result<T, Error> {
        let value = self
            .entries
            .get_mut(tag as usize)
            .and_then(Option::take)
            .ok_or(Error::UnknownTag { tag })?;
        self.size -= 1;
        Ok(value)
    }

    pub fn clear(&mut self) {
        for slot in self.entries.iter_mut() {
            *slot = None;
        }
        self.size = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::{Error, SlotTable};
    use pretty_assertions_sorted::assert_eq;

    #[test]
    fn test_allocate_lowest_free() -> Result<(), Error> {
        let mut table = SlotTable::new(4);
        assert_eq!(table.allocate("a")?, 0);
        assert_eq!(table.allocate("b")?, 1);
        assert_eq!(table.allocate("c")?, 2);
        assert_eq!(table.release(1)?, "b");
        assert_eq!(table.allocate("d")?, 1);
        assert_eq!(table.len(), 3);
        Ok(())
    }

    #[test]
    fn test_exhausted() -> Result<(), Error> {
        let mut table = SlotTable::new(2);
        table.allocate(())?;
        table.allocate(())?;
        assert!(table.is_full());
        assert_eq!(table.allocate(()), Err(Error::Exhausted { capacity: 2 }));
        Ok(())
    }

    #[test]
    fn test_unknown_tag() -> Result<(), Error> {
        let mut table = SlotTable::new(2);
        assert_eq!(table.get_mut(0), Err(Error::UnknownTag { tag: 0 }));
        assert_eq!(table.release(7), Err(Error::UnknownTag { tag: 7 }));

        let tag = table.allocate(10)?;
        table.release(tag)?;
        // double release
        assert_eq!(table.release(tag), Err(Error::UnknownTag { tag }));
        assert!(table.is_empty());
        Ok(())
    }

    #[test]
    fn test_released_tag_is_independent() -> Result<(), Error> {
        let mut table = SlotTable::new(1);
        let tag = table.allocate((String::from("first"), 1))?;
        table.get_mut(tag)?.1 -= 1;
        assert_eq!(table.release(tag)?, (String::from("first"), 0));

        let reused = table.allocate((String::from("second"), 1))?;
        assert_eq!(reused, tag);
        assert_eq!(table.get(reused)?, &(String::from("second"), 1));
        Ok(())
    }
}
