//! Focus-taking key recorder
//!
//! Clicking the block asks for keyboard focus. While focused it remembers
//! the last glyph typed and shades itself so the focus is visible.

use mortar_core::{Block, BlockHandle, BlockMessage, Color, Event, PaintFn, Rect, Size, SizeHint};
use tokio::sync::watch;

const FOCUSED: Color = Color::rgb(150.0 / 255.0, 150.0 / 255.0, 150.0 / 255.0);

pub struct KeyGrab {
    block: Block,
    glyph: watch::Sender<String>,
}

#[derive(Clone, Debug)]
pub struct KeyGrabHandle {
    block: BlockHandle,
    glyph: watch::Receiver<String>,
}

impl KeyGrabHandle {
    pub fn block(&self) -> &BlockHandle {
        &self.block
    }

    pub fn glyph(&self) -> String {
        self.glyph.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<String> {
        self.glyph.clone()
    }
}

impl KeyGrab {
    pub fn new(size: Size) -> Self {
        let block = Block::new();
        block.set_size_hint(SizeHint::fixed(size));
        let (glyph, _) = watch::channel(String::from("x"));
        let grab = Self { block, glyph };
        grab.block.set_paint(grab.look());
        grab
    }

    pub fn handle(&self) -> KeyGrabHandle {
        KeyGrabHandle {
            block: self.block.handle().clone(),
            glyph: self.glyph.subscribe(),
        }
    }

    pub fn block(&self) -> &Block {
        &self.block
    }

    pub fn glyph(&self) -> String {
        self.glyph.borrow().clone()
    }

    pub fn grab_focus(&self) {
        if self.block.has_key_focus() {
            return;
        }
        self.block.request_key_focus();
    }

    pub fn handle_event(&mut self, event: &Event) {
        match event {
            Event::MouseDown(_) => self.grab_focus(),
            Event::KeyTyped(e) if !e.glyph.is_empty() => {
                self.glyph.send_replace(e.glyph.clone());
                self.block.invalidate(&[]);
            }
            Event::KeyFocus(_) => {
                self.block.handle_event(event);
                self.block.set_paint(self.look());
                self.block.invalidate(&[]);
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

    pub fn spawn(self) -> KeyGrabHandle {
        let handle = self.handle();
        tokio::spawn(self.run());
        handle
    }

    fn look(&self) -> PaintFn {
        let focused = self.block.has_key_focus();
        Box::new(move |canvas| {
            let size = canvas.size();
            let bounds = Rect::new(0.0, 0.0, size.width, size.height);
            canvas.clear(Color::TRANSPARENT);
            if focused {
                canvas.set_fill_color(FOCUSED);
                canvas.fill_rect(bounds);
                canvas.set_stroke_color(Color::BLACK);
                canvas.stroke_rect(bounds, 1.0);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mortar_core::{
        Foundation, FoundationMessage, Key, KeyFocusEvent, KeyTypedEvent, Modifiers, MouseButton,
        MouseButtonEvent, Point, RectSet,
    };
    use std::time::Duration;
    use tokio::time::timeout;

    fn typed(key: Key, glyph: &str) -> Event {
        Event::KeyTyped(KeyTypedEvent {
            when: Duration::ZERO,
            key,
            glyph: glyph.to_string(),
            modifiers: Modifiers::default(),
        })
    }

    #[tokio::test]
    async fn test_typed_glyph_is_published() {
        let mut grab = KeyGrab::new(Size::new(20.0, 20.0));
        let handle = grab.handle();
        assert_eq!(handle.glyph(), "x");

        grab.handle_event(&typed(Key::Char('q'), "q"));
        assert_eq!(handle.glyph(), "q");

        grab.handle_event(&typed(Key::Backspace, ""));
        assert_eq!(grab.glyph(), "q");
    }

    #[tokio::test]
    async fn test_mouse_down_requests_focus_from_parent() {
        let mut parent = Foundation::new();
        let mut grab = KeyGrab::new(Size::new(20.0, 20.0));
        parent.place_block(grab.block().handle(), Rect::new(0.0, 0.0, 20.0, 20.0));

        grab.handle_event(&Event::MouseDown(MouseButtonEvent {
            when: Duration::ZERO,
            loc: Point::new(5.0, 5.0),
            button: MouseButton::Left,
        }));

        loop {
            match timeout(Duration::from_millis(50), parent.next_message()).await {
                Ok(Some(FoundationMessage::Event(Event::KeyFocusRequest(req)))) => {
                    assert_eq!(req.block.id(), grab.block().id());
                    break;
                }
                Ok(Some(_)) => continue,
                other => panic!("expected a focus request, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_focus_change_repaints() {
        let mut grab = KeyGrab::new(Size::new(4.0, 4.0));
        let mut buffer = image::RgbaImage::new(4, 4);

        grab.handle_event(&Event::KeyFocus(KeyFocusEvent { focus: true }));
        assert!(grab.block().has_key_focus());
        grab.block().handle().draw(&mut buffer, &RectSet::new());
        assert_eq!(buffer.get_pixel(2, 2), &FOCUSED.to_rgba8());

        grab.handle_event(&Event::KeyFocus(KeyFocusEvent { focus: false }));
        grab.block().handle().draw(&mut buffer, &RectSet::new());
        assert_eq!(buffer.get_pixel(2, 2)[3], 0);
    }
}
