//! Growable array of owned profiler records.

use std::ops::{Deref, DerefMut};

/// Capacity of a freshly allocated array.
pub const INITIAL_POINTER_ARRAY_CAPACITY: usize = 16;

/// An ordered sequence whose capacity doubles from a floor of
/// [`INITIAL_POINTER_ARRAY_CAPACITY`].
///
/// Elements are owned; clearing or dropping the array drops them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointerArray<T>
{
    elements: Vec<T>,
}

impl<T> PointerArray<T>
{
    #[must_use]
    pub fn new() -> Self
    {
        Self::with_capacity(0)
    }

    /// Create an array able to hold `capacity` elements, never less than the floor.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self
    {
        Self {
            elements: Vec::with_capacity(capacity.max(INITIAL_POINTER_ARRAY_CAPACITY)),
        }
    }

    /// Append an element, doubling the capacity when the array is full.
    pub fn push(&mut self, element: T)
    {
        if self.elements.len() == self.elements.capacity() {
            let grow_by = self.elements.capacity().max(INITIAL_POINTER_ARRAY_CAPACITY);
            self.elements.reserve_exact(grow_by);
        }
        self.elements.push(element);
    }

    #[must_use]
    pub fn capacity(&self) -> usize
    {
        self.elements.capacity()
    }

    /// Drop every element. The allocation is kept.
    pub fn clear(&mut self)
    {
        self.elements.clear();
    }
}

impl<T> Default for PointerArray<T>
{
    fn default() -> Self
    {
        Self::new()
    }
}

impl<T> Deref for PointerArray<T>
{
    type Target = [T];

    fn deref(&self) -> &[T]
    {
        &self.elements
    }
}

impl<T> DerefMut for PointerArray<T>
{
    fn deref_mut(&mut self) -> &mut [T]
    {
        &mut self.elements
    }
}

impl<T> FromIterator<T> for PointerArray<T>
{
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self
    {
        let mut array = Self::new();
        for element in iter {
            array.push(element);
        }
        array
    }
}

#[cfg(test)]
mod tests
{
    use std::rc::Rc;

    use super::*;

    #[test]
    fn test_capacity_doubles_from_floor()
    {
        let mut array = PointerArray::new();
        assert!(array.capacity() >= INITIAL_POINTER_ARRAY_CAPACITY);
        for value in 0..INITIAL_POINTER_ARRAY_CAPACITY + 1 {
            array.push(value);
        }
        assert!(array.capacity() >= 2 * INITIAL_POINTER_ARRAY_CAPACITY);
        assert_eq!(array.len(), INITIAL_POINTER_ARRAY_CAPACITY + 1);
        assert_eq!(array[16], 16);
    }

    #[test]
    fn test_clear_drops_elements()
    {
        let shared = Rc::new(());
        let mut array = PointerArray::new();
        array.push(Rc::clone(&shared));
        array.push(Rc::clone(&shared));
        assert_eq!(Rc::strong_count(&shared), 3);
        array.clear();
        assert_eq!(Rc::strong_count(&shared), 1);
        assert!(array.is_empty());
    }
}
