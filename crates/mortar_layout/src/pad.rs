//! A single child inset by fixed padding

use mortar_core::{BlockHandle, BlockId, Point, Rect, Size, SizeHint};

use crate::layouter::{Layout, LayoutContext, LayoutEngine};

/// Padding on each edge
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PadConfig {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl PadConfig {
    pub const fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub const fn uniform(pad: f32) -> Self {
        Self::new(pad, pad, pad, pad)
    }

    fn grow(&self, size: Size) -> Size {
        Size::new(
            size.width + self.left + self.right,
            size.height + self.top + self.bottom,
        )
    }
}

#[derive(Debug)]
pub enum PadCommand {
    SetConfig(PadConfig),
    /// Replace the padded child
    SetBlock(BlockHandle),
}

#[derive(Debug)]
pub struct PadLayout {
    config: PadConfig,
    block: BlockHandle,
    child_hint: Option<SizeHint>,
}

impl PadLayout {
    pub fn new(config: PadConfig, block: BlockHandle) -> Self {
        Self {
            config,
            block,
            child_hint: None,
        }
    }

    pub fn config(&self) -> PadConfig {
        self.config
    }
}

impl LayoutEngine for PadLayout {
    type Command = PadCommand;

    fn children(&self) -> Vec<BlockHandle> {
        vec![self.block.clone()]
    }

    fn set_hint(&mut self, block: BlockId, hint: SizeHint) {
        if block == self.block.id() {
            self.child_hint = Some(hint);
        }
    }

    fn hint(&self) -> SizeHint {
        let child = self.child_hint.unwrap_or_default();
        SizeHint::new(
            self.config.grow(child.min),
            self.config.grow(child.preferred),
            self.config.grow(child.max),
        )
    }

    fn layout(&self, size: Size) -> Layout {
        let c = &self.config;
        let min = Point::new(c.left, c.top);
        let max = Point::new(
            (size.width - c.right).max(c.left),
            (size.height - c.bottom).max(c.top),
        );
        vec![(self.block.clone(), Rect::from_min_max(min, max))]
    }

    fn apply(&mut self, command: PadCommand, cx: &mut LayoutContext<'_>) {
        match command {
            PadCommand::SetConfig(config) => {
                self.config = config;
                cx.invalidate();
            }
            PadCommand::SetBlock(block) => {
                if block == self.block {
                    return;
                }
                cx.remove_block(&self.block);
                cx.add_block(&block);
                self.block = block;
                self.child_hint = None;
            }
        }
    }
}
