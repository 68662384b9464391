//! Children in a row, left to right
//!
//! The row asks for the sum of its children's widths and the tallest of
//! their heights. When it gets less width than it prefers, every child is
//! squeezed by the same ratio.

use mortar_core::{BlockHandle, BlockId, Rect, Size, SizeHint};
use rustc_hash::FxHashMap;

use crate::layouter::{Layout, LayoutContext, LayoutEngine};

#[derive(Debug)]
pub enum FlowCommand {
    Add(BlockHandle),
    Remove(BlockHandle),
}

#[derive(Debug, Default)]
pub struct FlowLayout {
    order: Vec<BlockHandle>,
    hints: FxHashMap<BlockId, SizeHint>,
}

impl FlowLayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_blocks(blocks: impl IntoIterator<Item = BlockHandle>) -> Self {
        Self {
            order: blocks.into_iter().collect(),
            hints: FxHashMap::default(),
        }
    }

    /// Hinted children in row order
    fn hinted(&self) -> impl Iterator<Item = (&BlockHandle, &SizeHint)> + '_ {
        self.order
            .iter()
            .filter_map(|b| self.hints.get(&b.id()).map(|h| (b, h)))
    }
}

impl LayoutEngine for FlowLayout {
    type Command = FlowCommand;

    fn children(&self) -> Vec<BlockHandle> {
        self.order.clone()
    }

    fn set_hint(&mut self, block: BlockId, hint: SizeHint) {
        if self.order.iter().any(|b| b.id() == block) {
            self.hints.insert(block, hint);
        }
    }

    fn hint(&self) -> SizeHint {
        let fold = |total: Size, s: Size| Size::new(total.width + s.width, total.height.max(s.height));
        let mut hint = SizeHint::default();
        for (_, h) in self.hinted() {
            hint.min = fold(hint.min, h.min);
            hint.preferred = fold(hint.preferred, h.preferred);
            hint.max = fold(hint.max, h.max);
        }
        hint
    }

    fn layout(&self, size: Size) -> Layout {
        let hint = self.hint();
        let render = Size::new(
            size.width.max(hint.min.width),
            size.height.max(hint.min.height),
        );
        let ratio = if render.width < hint.preferred.width {
            render.width / hint.preferred.width
        } else {
            1.0
        };

        let mut left = 0.0;
        let mut layout = Vec::with_capacity(self.order.len());
        for (block, h) in self.hinted() {
            let height = if h.preferred.height <= render.height {
                h.preferred.height
            } else if h.min.height <= render.height {
                render.height
            } else {
                h.min.height
            };
            let width = h.preferred.width * ratio;
            layout.push((block.clone(), Rect::new(left, 0.0, width, height)));
            left += width;
        }
        layout
    }

    fn apply(&mut self, command: FlowCommand, cx: &mut LayoutContext<'_>) {
        match command {
            FlowCommand::Add(block) => {
                if self.order.contains(&block) {
                    return;
                }
                cx.add_block(&block);
                self.order.push(block);
            }
            FlowCommand::Remove(block) => {
                self.order.retain(|b| b != &block);
                self.hints.remove(&block.id());
                cx.remove_block(&block);
                cx.invalidate();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mortar_core::Block;

    fn hint(min: (f32, f32), pref: (f32, f32)) -> SizeHint {
        SizeHint::new(
            Size::new(min.0, min.1),
            Size::new(pref.0, pref.1),
            Size::new(f32::INFINITY, f32::INFINITY),
        )
    }

    #[tokio::test]
    async fn test_hint_sums_widths_and_takes_tallest() {
        let a = Block::new();
        let b = Block::new();
        let mut flow = FlowLayout::with_blocks([a.handle().clone(), b.handle().clone()]);
        flow.set_hint(a.id(), hint((5.0, 5.0), (10.0, 20.0)));
        flow.set_hint(b.id(), hint((5.0, 8.0), (30.0, 10.0)));

        let h = flow.hint();
        assert_eq!(h.min, Size::new(10.0, 8.0));
        assert_eq!(h.preferred, Size::new(40.0, 20.0));
    }

    #[tokio::test]
    async fn test_children_laid_left_to_right_at_preferred_size() {
        let a = Block::new();
        let b = Block::new();
        let mut flow = FlowLayout::with_blocks([a.handle().clone(), b.handle().clone()]);
        flow.set_hint(a.id(), hint((5.0, 5.0), (10.0, 20.0)));
        flow.set_hint(b.id(), hint((5.0, 5.0), (30.0, 10.0)));

        let layout = flow.layout(Size::new(100.0, 50.0));
        assert_eq!(layout[0].1, Rect::new(0.0, 0.0, 10.0, 20.0));
        assert_eq!(layout[1].1, Rect::new(10.0, 0.0, 30.0, 10.0));
    }

    #[tokio::test]
    async fn test_narrow_row_squeezes_proportionally() {
        let a = Block::new();
        let b = Block::new();
        let mut flow = FlowLayout::with_blocks([a.handle().clone(), b.handle().clone()]);
        flow.set_hint(a.id(), hint((5.0, 5.0), (10.0, 20.0)));
        flow.set_hint(b.id(), hint((5.0, 5.0), (30.0, 20.0)));

        let layout = flow.layout(Size::new(20.0, 10.0));
        assert_eq!(layout[0].1, Rect::new(0.0, 0.0, 5.0, 10.0));
        assert_eq!(layout[1].1, Rect::new(5.0, 0.0, 15.0, 10.0));
    }

    #[tokio::test]
    async fn test_unhinted_children_are_skipped() {
        let a = Block::new();
        let b = Block::new();
        let mut flow = FlowLayout::with_blocks([a.handle().clone(), b.handle().clone()]);
        flow.set_hint(b.id(), hint((1.0, 1.0), (4.0, 4.0)));

        let layout = flow.layout(Size::new(10.0, 10.0));
        assert_eq!(layout.len(), 1);
        assert_eq!(layout[0].0.id(), b.id());
        assert_eq!(layout[0].1.min().x, 0.0);
    }
}
