//! Cells with spans and anchors
//!
//! Each child sits in a cell addressed by column and row, optionally
//! spanning further columns and rows. Column widths and row heights are
//! solved independently from the children's hints. A child smaller than
//! its cell is shrunk toward the edges its [`Anchor`] names.

use std::ops::BitOr;

use indexmap::IndexMap;
use mortar_core::{BlockHandle, BlockId, Point, Rect, Size, SizeHint};
use rustc_hash::FxHashMap;

use crate::flex::{Elem, Flex};
use crate::layouter::{Layout, LayoutContext, LayoutEngine};

/// Which cell edges a child sticks to
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Anchor(u8);

impl Anchor {
    /// Centered
    pub const NONE: Anchor = Anchor(0);
    /// Left or top
    pub const MIN: Anchor = Anchor(1);
    /// Right or bottom
    pub const MAX: Anchor = Anchor(2);
    /// Centered
    pub const BOTH: Anchor = Anchor(3);

    pub const fn contains(self, other: Anchor) -> bool {
        self.0 & other.0 == other.0
    }

    /// Shrink `lo..hi` to `want`, keeping the anchored edge
    fn fit(self, lo: f32, hi: f32, want: f32) -> (f32, f32) {
        let slack = hi - lo - want;
        if slack <= 0.0 {
            return (lo, hi);
        }
        match (self.contains(Anchor::MIN), self.contains(Anchor::MAX)) {
            (true, false) => (lo, hi - slack),
            (false, true) => (lo + slack, hi),
            _ => (lo + slack / 2.0, hi - slack / 2.0),
        }
    }
}

impl BitOr for Anchor {
    type Output = Anchor;

    fn bitor(self, rhs: Anchor) -> Anchor {
        Anchor(self.0 | rhs.0)
    }
}

/// Where a child goes in the grid.
///
/// Zero-valued size overrides defer to the child's own hint.
#[derive(Clone, Debug)]
pub struct BlockData {
    pub block: BlockHandle,
    pub grid_x: usize,
    pub grid_y: usize,
    pub extra_x: usize,
    pub extra_y: usize,
    pub anchor_x: Anchor,
    pub anchor_y: Anchor,
    pub min_size: Size,
    pub preferred_size: Size,
    pub max_size: Size,
}

impl BlockData {
    pub fn new(block: BlockHandle, grid_x: usize, grid_y: usize) -> Self {
        Self {
            block,
            grid_x,
            grid_y,
            extra_x: 0,
            extra_y: 0,
            anchor_x: Anchor::NONE,
            anchor_y: Anchor::NONE,
            min_size: Size::ZERO,
            preferred_size: Size::ZERO,
            max_size: Size::ZERO,
        }
    }

    /// Cover `extra_x` more columns and `extra_y` more rows
    pub fn span(mut self, extra_x: usize, extra_y: usize) -> Self {
        self.extra_x = extra_x;
        self.extra_y = extra_y;
        self
    }

    pub fn anchor(mut self, anchor_x: Anchor, anchor_y: Anchor) -> Self {
        self.anchor_x = anchor_x;
        self.anchor_y = anchor_y;
        self
    }

    pub fn min_size(mut self, size: Size) -> Self {
        self.min_size = size;
        self
    }

    pub fn preferred_size(mut self, size: Size) -> Self {
        self.preferred_size = size;
        self
    }

    pub fn max_size(mut self, size: Size) -> Self {
        self.max_size = size;
        self
    }

    /// Flex demand along one axis given the child's own hint
    fn elem(&self, index: usize, extra: usize, hint: (f32, f32), overrides: (f32, f32, f32)) -> Elem {
        let (hint_min, hint_pref) = hint;
        let (min_o, pref_o, max_o) = overrides;
        let min = if min_o != 0.0 { min_o.max(hint_min) } else { hint_min };
        let max = if max_o != 0.0 { max_o } else { f32::INFINITY };
        let pref = if pref_o != 0.0 { pref_o } else { hint_pref };
        Elem {
            index,
            extra,
            min,
            pref: pref.max(min).min(max),
            max,
        }
    }
}

#[derive(Debug)]
pub enum GridCommand {
    Add(BlockData),
    Remove(BlockHandle),
}

#[derive(Debug, Default)]
pub struct GridLayout {
    cells: IndexMap<BlockId, BlockData>,
    hints: FxHashMap<BlockId, SizeHint>,
}

impl GridLayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cells(cells: impl IntoIterator<Item = BlockData>) -> Self {
        Self {
            cells: cells.into_iter().map(|bd| (bd.block.id(), bd)).collect(),
            hints: FxHashMap::default(),
        }
    }

    pub fn cell(&self, block: BlockId) -> Option<&BlockData> {
        self.cells.get(&block)
    }

    fn flexes(&self) -> (Flex, Flex) {
        let mut h = Flex::default();
        let mut v = Flex::default();
        for (id, bd) in &self.cells {
            let hint = self.hints.get(id).copied().unwrap_or_default();
            h.add(bd.elem(
                bd.grid_x,
                bd.extra_x,
                (hint.min.width, hint.preferred.width),
                (bd.min_size.width, bd.preferred_size.width, bd.max_size.width),
            ));
            v.add(bd.elem(
                bd.grid_y,
                bd.extra_y,
                (hint.min.height, hint.preferred.height),
                (bd.min_size.height, bd.preferred_size.height, bd.max_size.height),
            ));
        }
        (h, v)
    }
}

impl LayoutEngine for GridLayout {
    type Command = GridCommand;

    fn children(&self) -> Vec<BlockHandle> {
        self.cells.values().map(|bd| bd.block.clone()).collect()
    }

    fn set_hint(&mut self, block: BlockId, hint: SizeHint) {
        if self.cells.contains_key(&block) {
            self.hints.insert(block, hint);
        }
    }

    fn hint(&self) -> SizeHint {
        let (h, v) = self.flexes();
        let (hmin, hpref, hmax) = h.sizes();
        let (vmin, vpref, vmax) = v.sizes();
        SizeHint::new(
            Size::new(hmin, vmin),
            Size::new(hpref, vpref),
            Size::new(hmax, vmax),
        )
    }

    fn layout(&self, size: Size) -> Layout {
        let (h, v) = self.flexes();
        let columns = h.constrain(size.width);
        let rows = v.constrain(size.height);

        let mut layout = Vec::with_capacity(self.cells.len());
        for (id, bd) in &self.cells {
            let Some(hint) = self.hints.get(id) else {
                continue;
            };
            let (Some(first_col), Some(last_col)) =
                (columns.get(bd.grid_x), columns.get(bd.grid_x + bd.extra_x))
            else {
                continue;
            };
            let (Some(first_row), Some(last_row)) =
                (rows.get(bd.grid_y), rows.get(bd.grid_y + bd.extra_y))
            else {
                continue;
            };

            let want_x = hint.max.width.min(hint.preferred.width);
            let want_y = hint.max.height.min(hint.preferred.height);
            let (x0, x1) = bd.anchor_x.fit(first_col.0, last_col.1, want_x);
            let (y0, y1) = bd.anchor_y.fit(first_row.0, last_row.1, want_y);
            layout.push((
                bd.block.clone(),
                Rect::from_min_max(Point::new(x0, y0), Point::new(x1, y1)),
            ));
        }
        layout
    }

    fn apply(&mut self, command: GridCommand, cx: &mut LayoutContext<'_>) {
        match command {
            GridCommand::Add(bd) => {
                cx.add_block(&bd.block);
                self.cells.insert(bd.block.id(), bd);
            }
            GridCommand::Remove(block) => {
                self.cells.shift_remove(&block.id());
                self.hints.remove(&block.id());
                cx.remove_block(&block);
                cx.invalidate();
            }
        }
    }
}

/// A single column, children left-aligned in their rows
pub fn vbox(blocks: &[BlockHandle]) -> GridLayout {
    GridLayout::with_cells(
        blocks
            .iter()
            .enumerate()
            .map(|(i, b)| BlockData::new(b.clone(), 0, i).anchor(Anchor::MIN, Anchor::NONE)),
    )
}

/// A single row, children top-aligned in their columns
pub fn hbox(blocks: &[BlockHandle]) -> GridLayout {
    GridLayout::with_cells(
        blocks
            .iter()
            .enumerate()
            .map(|(i, b)| BlockData::new(b.clone(), i, 0).anchor(Anchor::NONE, Anchor::MIN)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use mortar_core::Block;

    fn pref(w: f32, h: f32) -> SizeHint {
        SizeHint::new(
            Size::ZERO,
            Size::new(w, h),
            Size::new(f32::INFINITY, f32::INFINITY),
        )
    }

    fn rect(x0: f32, y0: f32, x1: f32, y1: f32) -> Rect {
        Rect::from_min_max(Point::new(x0, y0), Point::new(x1, y1))
    }

    #[test]
    fn test_anchor_fit() {
        assert_eq!(Anchor::MIN.fit(0.0, 10.0, 4.0), (0.0, 4.0));
        assert_eq!(Anchor::MAX.fit(0.0, 10.0, 4.0), (6.0, 10.0));
        assert_eq!(Anchor::BOTH.fit(0.0, 10.0, 4.0), (3.0, 7.0));
        assert_eq!(Anchor::NONE.fit(0.0, 10.0, 4.0), (3.0, 7.0));
        assert_eq!(Anchor::MIN.fit(0.0, 3.0, 4.0), (0.0, 3.0));
        assert!((Anchor::MIN | Anchor::MAX).contains(Anchor::MAX));
    }

    #[tokio::test]
    async fn test_vbox_stacks_and_left_aligns() {
        let a = Block::new();
        let b = Block::new();
        let mut grid = vbox(&[a.handle().clone(), b.handle().clone()]);
        grid.set_hint(a.id(), pref(50.0, 20.0));
        grid.set_hint(b.id(), pref(30.0, 10.0));

        let hint = grid.hint();
        assert_eq!(hint.preferred, Size::new(50.0, 30.0));

        let layout = grid.layout(Size::new(50.0, 30.0));
        assert_eq!(layout[0].1, rect(0.0, 0.0, 50.0, 20.0));
        assert_eq!(layout[1].1, rect(0.0, 20.0, 30.0, 30.0));
    }

    #[tokio::test]
    async fn test_spare_height_goes_to_first_row_and_centers() {
        let a = Block::new();
        let b = Block::new();
        let mut grid = vbox(&[a.handle().clone(), b.handle().clone()]);
        grid.set_hint(a.id(), pref(50.0, 20.0));
        grid.set_hint(b.id(), pref(30.0, 10.0));

        let layout = grid.layout(Size::new(50.0, 40.0));
        assert_eq!(layout[0].1, rect(0.0, 5.0, 50.0, 25.0));
        assert_eq!(layout[1].1, rect(0.0, 30.0, 30.0, 40.0));
    }

    #[tokio::test]
    async fn test_hbox_places_side_by_side() {
        let a = Block::new();
        let b = Block::new();
        let mut grid = hbox(&[a.handle().clone(), b.handle().clone()]);
        grid.set_hint(a.id(), pref(10.0, 20.0));
        grid.set_hint(b.id(), pref(15.0, 5.0));

        let layout = grid.layout(Size::new(25.0, 20.0));
        assert_eq!(layout[0].1, rect(0.0, 0.0, 10.0, 20.0));
        assert_eq!(layout[1].1, rect(10.0, 0.0, 25.0, 5.0));
    }

    #[tokio::test]
    async fn test_spanning_cell_covers_columns() {
        let a = Block::new();
        let b = Block::new();
        let wide = Block::new();
        let mut grid = GridLayout::with_cells([
            BlockData::new(a.handle().clone(), 0, 0),
            BlockData::new(b.handle().clone(), 1, 0),
            BlockData::new(wide.handle().clone(), 0, 1).span(1, 0),
        ]);
        grid.set_hint(a.id(), pref(10.0, 10.0));
        grid.set_hint(b.id(), pref(10.0, 10.0));
        grid.set_hint(wide.id(), pref(20.0, 10.0));

        let layout = grid.layout(Size::new(20.0, 20.0));
        let wide_bounds = layout.iter().find(|(h, _)| h.id() == wide.id()).map(|(_, r)| *r);
        assert_eq!(wide_bounds, Some(rect(0.0, 10.0, 20.0, 20.0)));
    }

    #[tokio::test]
    async fn test_preferred_override_beats_child_hint() {
        let a = Block::new();
        let mut grid = GridLayout::with_cells([
            BlockData::new(a.handle().clone(), 0, 0).preferred_size(Size::new(40.0, 0.0))
        ]);
        grid.set_hint(a.id(), pref(10.0, 10.0));
        assert_eq!(grid.hint().preferred, Size::new(40.0, 10.0));
    }

    #[tokio::test]
    async fn test_unhinted_children_are_not_placed() {
        let a = Block::new();
        let b = Block::new();
        let mut grid = vbox(&[a.handle().clone(), b.handle().clone()]);
        grid.set_hint(a.id(), pref(10.0, 10.0));
        let layout = grid.layout(Size::new(10.0, 10.0));
        assert_eq!(layout.len(), 1);
        assert_eq!(layout[0].0.id(), a.id());
    }
}
