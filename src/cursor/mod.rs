//! Cursor: caller-visible merge of per-shard results
//!
//! A cursor holds one [`SubCursor`] per responding shard and behaves as one
//! logical sequence indexed `0..size()`. Random access resolves an index
//! through a prefix sum over sub-cursor sizes; nothing is copied into a
//! contiguous buffer.
//!
//! `sort` and `sort_by_id` are global across all sub-cursors: the
//! documents are gathered, stable-sorted, and dealt back into the
//! sub-cursors in sequence, so each sub-cursor keeps its size but not its
//! original documents.

use std::cmp::Ordering;

use crate::context::Address;
use crate::document::{Comparator, DocumentRef};

/// One shard's partial result
#[derive(Debug, Clone, PartialEq)]
pub struct SubCursor {
    address: Address,
    documents: Vec<DocumentRef>,
}

impl SubCursor {
    pub fn new(address: Address, documents: Vec<DocumentRef>) -> Self {
        Self { address, documents }
    }

    /// Address of the actor that produced this result
    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn documents(&self) -> &[DocumentRef] {
        &self.documents
    }

    pub fn size(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cursor {
    subs: Vec<SubCursor>,
    /// `ends[k]` is the total size of sub-cursors `0..=k`
    ends: Vec<usize>,
}

impl Cursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sub: SubCursor) {
        let end = self.size() + sub.size();
        self.subs.push(sub);
        self.ends.push(end);
    }

    pub fn size(&self) -> usize {
        self.ends.last().copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn sub_cursors(&self) -> &[SubCursor] {
        &self.subs
    }

    /// Document at logical position `index`
    pub fn get(&self, index: usize) -> Option<&DocumentRef> {
        if index >= self.size() {
            return None;
        }
        let sub = self.ends.partition_point(|&end| end <= index);
        let start = if sub == 0 { 0 } else { self.ends[sub - 1] };
        self.subs[sub].documents.get(index - start)
    }

    /// Iterates the logical sequence in order
    pub fn iter(&self) -> impl Iterator<Item = &DocumentRef> {
        self.subs.iter().flat_map(|sub| sub.documents.iter())
    }

    /// Reorders the whole logical sequence under `comparator`.
    pub fn sort(&mut self, comparator: &Comparator) {
        self.reorder(|a, b| comparator.compare(a, b));
    }

    /// Reorders the logical sequence by document identifier, the order a
    /// single store scans in.
    pub fn sort_by_id(&mut self) {
        self.reorder(|a, b| a.id().cmp(&b.id()));
    }

    fn reorder(&mut self, compare: impl FnMut(&DocumentRef, &DocumentRef) -> Ordering) {
        let mut all: Vec<DocumentRef> = self
            .subs
            .iter_mut()
            .flat_map(|sub| std::mem::take(&mut sub.documents))
            .collect();
        all.sort_by(compare);

        let mut sorted = all.into_iter();
        let mut start = 0;
        for (sub, &end) in self.subs.iter_mut().zip(&self.ends) {
            sub.documents = sorted.by_ref().take(end - start).collect();
            start = end;
        }
    }

    /// Keeps the first `len` documents of the logical sequence.
    pub fn truncate(&mut self, len: usize) {
        let mut start = 0;
        for (sub, end) in self.subs.iter_mut().zip(self.ends.iter_mut()) {
            let keep = len.saturating_sub(start).min(sub.documents.len());
            start = *end;
            sub.documents.truncate(keep);
        }
        let mut total = 0;
        for (sub, end) in self.subs.iter().zip(self.ends.iter_mut()) {
            total += sub.documents.len();
            *end = total;
        }
    }

    /// Documents at logical positions `offset..offset + limit`
    pub fn page(&self, offset: usize, limit: usize) -> Vec<DocumentRef> {
        self.iter().skip(offset).take(limit).cloned().collect()
    }

    /// Flattens into one owned sequence
    pub fn into_documents(self) -> Vec<DocumentRef> {
        self.subs
            .into_iter()
            .flat_map(|sub| sub.documents)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Document, DocumentId, SortKey};
    use serde_json::json;

    fn doc(n: u32) -> DocumentRef {
        Document::with_id(DocumentId::from_parts(1, n), json!({ "n": n }))
            .unwrap()
            .into_ref()
    }

    fn n(d: Option<&DocumentRef>) -> Option<u64> {
        d.and_then(|d| d.get("n")).and_then(|v| v.as_u64())
    }

    #[test]
    fn test_get_walks_boundaries() {
        let mut cursor = Cursor::new();
        cursor.push(SubCursor::new(Address::new("a"), vec![doc(0), doc(1)]));
        cursor.push(SubCursor::new(Address::new("b"), vec![]));
        cursor.push(SubCursor::new(Address::new("c"), vec![doc(2)]));

        assert_eq!(cursor.size(), 3);
        assert_eq!(n(cursor.get(0)), Some(0));
        assert_eq!(n(cursor.get(1)), Some(1));
        assert_eq!(n(cursor.get(2)), Some(2));
        assert!(cursor.get(3).is_none());
    }

    #[test]
    fn test_empty_cursor() {
        let cursor = Cursor::new();
        assert!(cursor.is_empty());
        assert!(cursor.get(0).is_none());
        assert!(cursor.page(0, 10).is_empty());
    }

    #[test]
    fn test_sort_preserves_sub_cursor_sizes() {
        let mut cursor = Cursor::new();
        cursor.push(SubCursor::new(Address::new("a"), vec![doc(5), doc(1), doc(3)]));
        cursor.push(SubCursor::new(Address::new("b"), vec![doc(4)]));
        cursor.push(SubCursor::new(Address::new("c"), vec![doc(0), doc(2)]));

        cursor.sort(&Comparator::new(vec![SortKey::asc("n")]));
        let order: Vec<_> = (0..cursor.size()).map(|i| n(cursor.get(i))).collect();
        assert_eq!(order, (0..6).map(Some).collect::<Vec<_>>());

        let sizes: Vec<_> = cursor.sub_cursors().iter().map(SubCursor::size).collect();
        assert_eq!(sizes, vec![3, 1, 2]);
        assert_eq!(cursor.sub_cursors()[1].address(), &Address::new("b"));
    }

    #[test]
    fn test_sort_by_id_restores_store_order() {
        let mut cursor = Cursor::new();
        cursor.push(SubCursor::new(Address::new("a"), vec![doc(1), doc(4), doc(5)]));
        cursor.push(SubCursor::new(Address::new("b"), vec![doc(0), doc(2), doc(3)]));

        cursor.sort_by_id();
        cursor.truncate(3);
        let order: Vec<_> = cursor.iter().map(|d| n(Some(d))).collect();
        assert_eq!(order, vec![Some(0), Some(1), Some(2)]);
    }

    #[test]
    fn test_truncate_spans_sub_cursors() {
        let mut cursor = Cursor::new();
        cursor.push(SubCursor::new(Address::new("a"), (0..3).map(doc).collect()));
        cursor.push(SubCursor::new(Address::new("b"), (3..6).map(doc).collect()));
        cursor.push(SubCursor::new(Address::new("c"), (6..9).map(doc).collect()));

        cursor.truncate(4);
        assert_eq!(cursor.size(), 4);
        assert_eq!(n(cursor.get(3)), Some(3));
        assert!(cursor.get(4).is_none());
        let sizes: Vec<_> = cursor.sub_cursors().iter().map(SubCursor::size).collect();
        assert_eq!(sizes, vec![3, 1, 0]);
    }

    #[test]
    fn test_page() {
        let mut cursor = Cursor::new();
        cursor.push(SubCursor::new(Address::new("a"), (0..4).map(doc).collect()));
        cursor.push(SubCursor::new(Address::new("b"), (4..8).map(doc).collect()));
        let page: Vec<_> = cursor.page(3, 3).iter().map(|d| n(Some(d))).collect();
        assert_eq!(page, vec![Some(3), Some(4), Some(5)]);
    }
}
