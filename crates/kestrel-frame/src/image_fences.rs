//! Per-image ownership tracking.
//!
//! The number of swapchain images and the number of frame slots need not
//! match, so acquisition order and slot order drift apart. Each entry records
//! the slot whose fence guards the last write into that image; a slot about
//! to render an image must wait on that fence first, even if it belongs to a
//! different slot.

/// Maps swapchain image index to the frame slot that last rendered into it.
#[derive(Debug, Clone, Default)]
pub struct ImageFenceMap {
    owners: Vec<Option<usize>>,
}

impl ImageFenceMap {
    /// Create a map with every image unused.
    pub fn new(image_count: usize) -> Self {
        Self {
            owners: vec![None; image_count],
        }
    }

    /// Number of tracked images.
    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    /// Slot whose fence currently guards `image_index`, if any.
    pub fn owner(&self, image_index: u32) -> Option<usize> {
        self.owners[self.checked_index(image_index)]
    }

    /// Record `slot_index` as the in-flight writer of `image_index` and
    /// return the previous owner.
    pub fn claim(&mut self, image_index: u32, slot_index: usize) -> Option<usize> {
        let index = self.checked_index(image_index);
        self.owners[index].replace(slot_index)
    }

    /// Mark every image unused, sized for a freshly built swapchain.
    pub fn reset(&mut self, image_count: usize) {
        self.owners.clear();
        self.owners.resize(image_count, None);
    }

    /// Iterate over `(image_index, owner)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (u32, Option<usize>)> + '_ {
        self.owners
            .iter()
            .enumerate()
            .map(|(image, owner)| (image as u32, *owner))
    }

    fn checked_index(&self, image_index: u32) -> usize {
        let index = image_index as usize;
        assert!(
            index < self.owners.len(),
            "image index {index} out of range for {} swapchain images",
            self.owners.len()
        );
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_unused() {
        let map = ImageFenceMap::new(3);
        assert_eq!(map.len(), 3);
        assert!(map.iter().all(|(_, owner)| owner.is_none()));
    }

    #[test]
    fn claim_returns_previous_owner() {
        let mut map = ImageFenceMap::new(2);
        assert_eq!(map.claim(1, 0), None);
        assert_eq!(map.owner(1), Some(0));
        assert_eq!(map.claim(1, 2), Some(0));
        assert_eq!(map.owner(1), Some(2));
        assert_eq!(map.owner(0), None);
    }

    #[test]
    fn reset_clears_and_resizes() {
        let mut map = ImageFenceMap::new(2);
        map.claim(0, 1);
        map.reset(4);
        assert_eq!(map.len(), 4);
        assert!(map.iter().all(|(_, owner)| owner.is_none()));
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn out_of_range_index_panics() {
        let map = ImageFenceMap::new(2);
        let _ = map.owner(2);
    }
}
