use color_eyre::eyre::eyre;
use color_eyre::Result;

/// Fixed-size table of descriptors. Slot `i` is built from resource `i` and
/// never reassigned.
#[derive(Debug)]
pub struct DescriptorHeap<D> {
    slots: Vec<D>,
}

impl<D> DescriptorHeap<D> {
    /// Creates one descriptor per resource, in order.
    pub fn for_each_resource<R, F>(resources: &[R], mut create: F) -> Result<Self>
    where
        F: FnMut(usize, &R) -> Result<D>,
    {
        let slots = resources
            .iter()
            .enumerate()
            .map(|(i, resource)| create(i, resource))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { slots })
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, slot: u32) -> Result<&D> {
        self.slots
            .get(slot as usize)
            .ok_or_else(|| eyre!("Descriptor slot {} out of range ({} slots)", slot, self.slots.len()))
    }

    /// Hands the descriptors back, e.g. to destroy them
    pub fn drain(&mut self) -> std::vec::Drain<'_, D> {
        self.slots.drain(..)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_descriptor_per_resource_in_order() {
        let back_buffers = ["buffer0", "buffer1"];
        let heap = DescriptorHeap::for_each_resource(&back_buffers, |i, buffer| {
            Ok(format!("rtv{} -> {}", i, buffer))
        })
        .unwrap();

        assert_eq!(heap.len(), back_buffers.len());
        assert!(!heap.is_empty());
        assert_eq!(heap.get(0).unwrap(), "rtv0 -> buffer0");
        assert_eq!(heap.get(1).unwrap(), "rtv1 -> buffer1");
        assert!(heap.get(2).is_err());
    }

    #[test]
    fn failed_descriptor_fails_the_heap() {
        let result: Result<DescriptorHeap<u32>> =
            DescriptorHeap::for_each_resource(&[1, 2, 3], |i, _| {
                if i == 1 { Err(eyre!("out of memory")) } else { Ok(i as u32) }
            });

        assert!(result.is_err());
    }

    #[test]
    fn no_resources_means_an_empty_heap() {
        let heap: DescriptorHeap<u32> =
            DescriptorHeap::for_each_resource(&[] as &[u32], |i, _| Ok(i as u32)).unwrap();
        assert!(heap.is_empty());
    }
}
