use std::collections::BTreeMap;

use crate::alignment::{self, Named};
use crate::dataset::Dataset;
use crate::error::AlignmentError;
use crate::snapshot::Snapshot;
use crate::zpool::Zpool;

/// One aligned position: present on side `a`, side `b`, or both. Never neither.
#[derive(Debug)]
pub enum ComparisonItem<'a, T> {
    A(&'a T),
    B(&'a T),
    Both(&'a T, &'a T),
}
impl<T> Clone for ComparisonItem<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for ComparisonItem<'_, T> {}

impl<'a, T> ComparisonItem<'a, T> {
    pub fn from_pair(a: Option<&'a T>, b: Option<&'a T>) -> Option<Self> {
        match (a, b) {
            (Some(a), Some(b)) => Some(Self::Both(a, b)),
            (Some(a), None) => Some(Self::A(a)),
            (None, Some(b)) => Some(Self::B(b)),
            (None, None) => None,
        }
    }

    pub fn a(&self) -> Option<&'a T> {
        match *self {
            Self::A(a) | Self::Both(a, _) => Some(a),
            Self::B(_) => None,
        }
    }

    pub fn b(&self) -> Option<&'a T> {
        match *self {
            Self::B(b) | Self::Both(_, b) => Some(b),
            Self::A(_) => None,
        }
    }

    pub fn complete(&self) -> bool {
        matches!(self, Self::Both(..))
    }

    /// Whichever side is present, preferring `a`.
    pub fn item(&self) -> &'a T {
        match *self {
            Self::A(item) | Self::Both(item, _) | Self::B(item) => item,
        }
    }
}

/// Datasets of two pools, matched by their name relative to each pool's root.
#[derive(Debug)]
pub struct ComparisonZpool<'a> {
    a: Option<&'a Zpool>,
    b: Option<&'a Zpool>,
    merged: Vec<ComparisonItem<'a, Dataset>>,
}
impl<'a> ComparisonZpool<'a> {
    /// With one pool missing every entry is one-sided; with both missing nothing is compared.
    pub fn from_zpools(a: Option<&'a Zpool>, b: Option<&'a Zpool>) -> Self {
        let mut by_subname: BTreeMap<&'a str, (Option<&'a Dataset>, Option<&'a Dataset>)> =
            BTreeMap::new();
        for dataset in a.into_iter().flat_map(|zpool| zpool.datasets()) {
            by_subname.entry(dataset.subname()).or_default().0 = Some(dataset);
        }
        for dataset in b.into_iter().flat_map(|zpool| zpool.datasets()) {
            by_subname.entry(dataset.subname()).or_default().1 = Some(dataset);
        }

        // BTreeMap iteration keeps the merged list sorted by relative name.
        let merged = by_subname
            .into_values()
            .filter_map(|(a, b)| ComparisonItem::from_pair(a, b))
            .collect();

        Self { a, b, merged }
    }

    pub fn a(&self) -> Option<&'a Zpool> {
        self.a
    }
    pub fn b(&self) -> Option<&'a Zpool> {
        self.b
    }
    pub fn len(&self) -> usize {
        self.merged.len()
    }
    pub fn is_empty(&self) -> bool {
        self.merged.is_empty()
    }
    pub fn merged(&self) -> impl Iterator<Item = ComparisonItem<'a, Dataset>> + '_ {
        self.merged.iter().copied()
    }
    pub fn into_merged(self) -> Vec<ComparisonItem<'a, Dataset>> {
        self.merged
    }
}

/// Snapshots of one dataset on both sides, aligned by name.
#[derive(Debug)]
pub struct ComparisonDataset<'a> {
    a: Option<&'a Dataset>,
    b: Option<&'a Dataset>,
    merged: Vec<ComparisonItem<'a, Snapshot>>,
    intermediates_a: BTreeMap<String, Vec<&'a Snapshot>>,
    intermediates_b: BTreeMap<String, Vec<&'a Snapshot>>,
}
impl<'a> ComparisonDataset<'a> {
    /// Align the snapshots of a matched dataset pair. With `tagging`, snapshots lacking
    /// the marker property are folded into the next marked one first and take no part
    /// in the alignment.
    pub fn from_item(
        item: ComparisonItem<'a, Dataset>,
        tagging: bool,
    ) -> Result<Self, AlignmentError> {
        let (a, b) = (item.a(), item.b());

        let (snapshots_a, intermediates_a) = Self::prepare(a, tagging);
        let (snapshots_b, intermediates_b) = Self::prepare(b, tagging);

        Ok(Self {
            a,
            b,
            merged: alignment::align(&snapshots_a, &snapshots_b)?,
            intermediates_a,
            intermediates_b,
        })
    }

    pub fn from_datasets(
        a: &'a Dataset,
        b: &'a Dataset,
        tagging: bool,
    ) -> Result<Self, AlignmentError> {
        Self::from_item(ComparisonItem::Both(a, b), tagging)
    }

    #[allow(clippy::type_complexity)]
    fn prepare(
        dataset: Option<&'a Dataset>,
        tagging: bool,
    ) -> (Vec<&'a Snapshot>, BTreeMap<String, Vec<&'a Snapshot>>) {
        let snapshots: Vec<&'a Snapshot> = dataset
            .map(|dataset| dataset.snapshots().iter().collect())
            .unwrap_or_default();
        if !tagging {
            return (snapshots, BTreeMap::new());
        }
        let squashed = alignment::squash(&snapshots, Snapshot::is_marked);
        (squashed.kept, squashed.intermediates)
    }

    pub fn a(&self) -> Option<&'a Dataset> {
        self.a
    }
    pub fn b(&self) -> Option<&'a Dataset> {
        self.b
    }
    pub fn len(&self) -> usize {
        self.merged.len()
    }
    pub fn is_empty(&self) -> bool {
        self.merged.is_empty()
    }
    pub fn merged(&self) -> impl Iterator<Item = ComparisonItem<'a, Snapshot>> + '_ {
        self.merged.iter().copied()
    }

    /// Whether at least one snapshot is present on both sides.
    pub fn overlaps(&self) -> bool {
        self.merged.iter().any(ComparisonItem::complete)
    }

    fn projection_a(&self) -> Vec<Option<&'a Snapshot>> {
        self.merged.iter().map(ComparisonItem::a).collect()
    }
    fn projection_b(&self) -> Vec<Option<&'a Snapshot>> {
        self.merged.iter().map(ComparisonItem::b).collect()
    }

    /// Snapshots only on side `a`, newer than anything on side `b`.
    pub fn a_disjoint_head(&self) -> Result<Vec<&'a Snapshot>, AlignmentError> {
        alignment::disjoint_head(&self.projection_a(), &self.projection_b())
    }
    pub fn b_disjoint_head(&self) -> Result<Vec<&'a Snapshot>, AlignmentError> {
        alignment::disjoint_head(&self.projection_b(), &self.projection_a())
    }

    /// Snapshots only on side `a`, older than anything on side `b`.
    pub fn a_disjoint_tail(&self) -> Result<Vec<&'a Snapshot>, AlignmentError> {
        alignment::disjoint_tail(&self.projection_a(), &self.projection_b())
    }
    pub fn b_disjoint_tail(&self) -> Result<Vec<&'a Snapshot>, AlignmentError> {
        alignment::disjoint_tail(&self.projection_b(), &self.projection_a())
    }

    /// The oldest snapshots of side `a` that side `b` also has.
    pub fn a_overlap_tail(&self) -> Result<Vec<&'a Snapshot>, AlignmentError> {
        alignment::overlap_tail(&self.projection_a(), &self.projection_b())
    }
    pub fn b_overlap_tail(&self) -> Result<Vec<&'a Snapshot>, AlignmentError> {
        alignment::overlap_tail(&self.projection_b(), &self.projection_a())
    }

    /// Foreign snapshots folded into `name` on side `a` (tagging compatibility only).
    pub fn a_intermediates(&self, name: &str) -> &[&'a Snapshot] {
        self.intermediates_a.get(name).map_or(&[], Vec::as_slice)
    }
    pub fn b_intermediates(&self, name: &str) -> &[&'a Snapshot] {
        self.intermediates_b.get(name).map_or(&[], Vec::as_slice)
    }
}

impl Named for Dataset {
    fn name(&self) -> &str {
        Dataset::name(self)
    }
}
impl Named for Snapshot {
    fn name(&self) -> &str {
        Snapshot::name(self)
    }
}
