//! Write plan: the serialized document cut into fixed-size fragments.
//!
//! Fragment size counts characters, not bytes, so every fragment is valid
//! text for the remote literal even when the document holds non-ASCII
//! network names.

/// Ordered fragments of a serialized document.
#[derive(Debug, Clone)]
pub struct WritePlan<'a> {
    text: &'a str,
    fragment_size: usize,
    total: usize,
}

impl<'a> WritePlan<'a> {
    /// A `fragment_size` of zero is treated as one.
    pub fn new(text: &'a str, fragment_size: usize) -> Self {
        let fragment_size = fragment_size.max(1);
        let total = text.chars().count().div_ceil(fragment_size);
        Self {
            text,
            fragment_size,
            total,
        }
    }

    /// Number of fragments.
    pub fn len(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub fn fragment_size(&self) -> usize {
        self.fragment_size
    }

    pub fn iter(&self) -> FragmentIter<'a> {
        FragmentIter {
            rest: self.text,
            fragment_size: self.fragment_size,
        }
    }
}

impl<'a> IntoIterator for &WritePlan<'a> {
    type Item = &'a str;
    type IntoIter = FragmentIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the fragments of a `WritePlan`.
#[derive(Debug, Clone)]
pub struct FragmentIter<'a> {
    rest: &'a str,
    fragment_size: usize,
}

impl<'a> Iterator for FragmentIter<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        if self.rest.is_empty() {
            return None;
        }
        let split = self
            .rest
            .char_indices()
            .nth(self.fragment_size)
            .map_or(self.rest.len(), |(offset, _)| offset);
        let (fragment, rest) = self.rest.split_at(split);
        self.rest = rest;
        Some(fragment)
    }
}
