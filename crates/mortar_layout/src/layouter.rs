//! The layout loop shared by every engine

use mortar_core::{
    BlockHandle, BlockId, BlockSizeHint, Foundation, FoundationHandle, FoundationMessage, Rect,
    RuntimeConfig, Size, SizeHint,
};
use tokio::sync::mpsc;

/// Child bounds produced by one layout pass
pub type Layout = Vec<(BlockHandle, Rect)>;

/// Layout arithmetic for a [`Layouter`].
///
/// Engines are plain state machines: they never touch channels. The
/// layouter feeds them child hints and sizes, and applies their output.
pub trait LayoutEngine: Send + 'static {
    /// Reconfiguration messages accepted through [`LayouterHandle::send`]
    type Command: Send + 'static;

    /// Blocks the layouter adopts when it starts
    fn children(&self) -> Vec<BlockHandle>;

    /// A child published a new hint
    fn set_hint(&mut self, block: BlockId, hint: SizeHint);

    /// The hint this container publishes to its own parent
    fn hint(&self) -> SizeHint;

    /// Child bounds for a container of `size`
    fn layout(&self, size: Size) -> Layout;

    fn apply(&mut self, command: Self::Command, cx: &mut LayoutContext<'_>);
}

/// What an engine may do to its container while applying a command
pub struct LayoutContext<'a> {
    foundation: &'a mut Foundation,
}

impl LayoutContext<'_> {
    pub fn add_block(&mut self, block: &BlockHandle) {
        self.foundation.add_block(block);
    }

    pub fn remove_block(&mut self, block: &BlockHandle) {
        self.foundation.remove_block(block);
    }

    pub fn size(&self) -> Size {
        self.foundation.block().size()
    }

    /// Mark the whole container as needing a redraw
    pub fn invalidate(&self) {
        self.foundation.block().invalidate(&[]);
    }
}

/// Foundation that positions its children with a [`LayoutEngine`]
pub struct Layouter<E: LayoutEngine> {
    foundation: Foundation,
    engine: E,
    commands: mpsc::UnboundedReceiver<E::Command>,
}

/// Cloneable handle to a running [`Layouter`]
pub struct LayouterHandle<C> {
    foundation: FoundationHandle,
    commands: mpsc::UnboundedSender<C>,
}

impl<C> Clone for LayouterHandle<C> {
    fn clone(&self) -> Self {
        Self {
            foundation: self.foundation.clone(),
            commands: self.commands.clone(),
        }
    }
}

impl<C> std::fmt::Debug for LayouterHandle<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayouterHandle")
            .field("id", &self.foundation.id())
            .finish()
    }
}

impl<C: Send + 'static> LayouterHandle<C> {
    /// Queue `command` for the layouter's task. Returns `false` once the
    /// layouter has stopped.
    pub fn send(&self, command: C) -> bool {
        self.commands.send(command).is_ok()
    }

    pub fn block(&self) -> &BlockHandle {
        self.foundation.block()
    }

    pub fn foundation(&self) -> &FoundationHandle {
        &self.foundation
    }
}

impl<E: LayoutEngine> Layouter<E> {
    pub fn new(engine: E) -> (Self, LayouterHandle<E::Command>) {
        Self::with_config(engine, &RuntimeConfig::default())
    }

    pub fn with_config(engine: E, config: &RuntimeConfig) -> (Self, LayouterHandle<E::Command>) {
        let mut foundation = Foundation::with_config(config);
        // Layouters are transparent; only their children paint.
        foundation.block().handle().remove_paint();
        for child in engine.children() {
            foundation.add_block(&child);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let handle = LayouterHandle {
            foundation: foundation.handle(),
            commands: tx,
        };
        let layouter = Self {
            foundation,
            engine,
            commands: rx,
        };
        (layouter, handle)
    }

    /// Start the layouter on its own task
    pub fn spawn(engine: E) -> LayouterHandle<E::Command> {
        let (layouter, handle) = Self::new(engine);
        tokio::spawn(layouter.run());
        handle
    }

    pub fn foundation(&self) -> &Foundation {
        &self.foundation
    }

    pub fn foundation_mut(&mut self) -> &mut Foundation {
        &mut self.foundation
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub async fn run(mut self) {
        while self.turn().await {}
    }

    /// Handle one message or command. Returns `false` after a close event,
    /// or once the event pump has stopped.
    pub async fn turn(&mut self) -> bool {
        tokio::select! {
            message = self.foundation.next_message() => match message {
                Some(message) => {
                    let close = message.is_close();
                    self.handle_message(message);
                    !close
                }
                None => false,
            },
            Some(command) = self.commands.recv() => {
                self.apply(command);
                true
            }
        }
    }

    pub fn handle_message(&mut self, message: FoundationMessage) {
        match message {
            FoundationMessage::BlockSizeHint(BlockSizeHint { block, hint }) => {
                if !self.foundation.is_child(block) {
                    tracing::trace!(layouter = %self.foundation.id(), %block, "hint from a stranger");
                    return;
                }
                self.foundation
                    .dispatch(FoundationMessage::BlockSizeHint(BlockSizeHint { block, hint }));
                self.engine.set_hint(block, hint);
                self.place_blocks();
                self.publish_hint();
            }
            other => {
                let before = self.foundation.block().size();
                self.foundation.dispatch(other);
                if self.foundation.block().size() != before {
                    self.place_blocks();
                }
            }
        }
    }

    pub fn apply(&mut self, command: E::Command) {
        let mut cx = LayoutContext {
            foundation: &mut self.foundation,
        };
        self.engine.apply(command, &mut cx);
        self.place_blocks();
        self.publish_hint();
    }

    fn place_blocks(&mut self) {
        let size = self.foundation.block().size();
        let mut moved = false;
        for (child, bounds) in self.engine.layout(size) {
            // Children adopted elsewhere stay gone until re-added.
            if !self.foundation.is_child(child.id()) {
                continue;
            }
            if self.foundation.child_bounds(child.id()) != Some(bounds) {
                self.foundation.place_block(&child, bounds);
                moved = true;
            }
        }
        if moved {
            self.foundation.block().invalidate(&[]);
        }
    }

    fn publish_hint(&self) {
        self.foundation.block().set_size_hint(self.engine.hint());
    }
}
