//! Two-state toggle
//!
//! A press arms the box; releasing toggles it only if the pointer is still
//! over the box. Leaving and re-entering while held disarms and re-arms it.

use mortar_core::{Block, BlockHandle, BlockMessage, Color, Event, PaintFn, Rect, Size, SizeHint};
use tokio::sync::watch;

const BORDER: f32 = 1.0;
const ARMED: Color = Color::rgb(150.0 / 255.0, 150.0 / 255.0, 150.0 / 255.0);

pub struct Checkbox {
    block: Block,
    state: watch::Sender<bool>,
    pressed: bool,
    press_hover: bool,
}

#[derive(Clone, Debug)]
pub struct CheckboxHandle {
    block: BlockHandle,
    state: watch::Receiver<bool>,
}

impl CheckboxHandle {
    pub fn block(&self) -> &BlockHandle {
        &self.block
    }

    pub fn is_checked(&self) -> bool {
        *self.state.borrow()
    }

    /// Receiver that wakes on every toggle
    pub fn watch(&self) -> watch::Receiver<bool> {
        self.state.clone()
    }
}

impl Checkbox {
    pub fn new(size: Size) -> Self {
        let block = Block::new();
        block.set_size_hint(SizeHint::fixed(size));
        let (state, _) = watch::channel(false);
        let checkbox = Self {
            block,
            state,
            pressed: false,
            press_hover: false,
        };
        checkbox.block.set_paint(checkbox.look());
        checkbox
    }

    pub fn handle(&self) -> CheckboxHandle {
        CheckboxHandle {
            block: self.block.handle().clone(),
            state: self.state.subscribe(),
        }
    }

    pub fn block(&self) -> &Block {
        &self.block
    }

    pub fn is_checked(&self) -> bool {
        *self.state.borrow()
    }

    pub fn handle_event(&mut self, event: &Event) {
        match event {
            Event::MouseEntered(_) if self.pressed => {
                self.press_hover = true;
                self.refresh();
            }
            Event::MouseExited(_) if self.pressed => {
                self.press_hover = false;
                self.refresh();
            }
            Event::MouseDown(_) => {
                self.pressed = true;
                self.press_hover = true;
                self.refresh();
            }
            Event::MouseUp(_) => {
                if self.press_hover {
                    self.state.send_modify(|checked| *checked = !*checked);
                }
                self.pressed = false;
                self.press_hover = false;
                self.refresh();
            }
            other => self.block.handle_event(other),
        }
    }

    pub async fn run(mut self) {
        while let Some(message) = self.block.next_message().await {
            match message {
                message if message.is_close() => break,
                BlockMessage::Event(event) => self.handle_event(&event),
                other => self.block.dispatch(other),
            }
        }
    }

    pub fn spawn(self) -> CheckboxHandle {
        let handle = self.handle();
        tokio::spawn(self.run());
        handle
    }

    fn refresh(&self) {
        self.block.set_paint(self.look());
        self.block.invalidate(&[]);
    }

    fn look(&self) -> PaintFn {
        let checked = self.is_checked();
        let armed = self.press_hover;
        Box::new(move |canvas| {
            let size = canvas.size();
            let bounds = Rect::new(0.0, 0.0, size.width, size.height);
            canvas.clear(Color::WHITE);
            if armed {
                canvas.set_fill_color(ARMED);
                canvas.fill_rect(bounds);
            }
            if checked {
                let inset = (size.width.min(size.height) / 4.0).max(BORDER);
                canvas.set_fill_color(Color::BLACK);
                canvas.fill_rect(Rect::new(
                    inset,
                    inset,
                    size.width - 2.0 * inset,
                    size.height - 2.0 * inset,
                ));
            }
            canvas.set_stroke_color(Color::BLACK);
            canvas.stroke_rect(bounds, BORDER);
        })
    }
}
