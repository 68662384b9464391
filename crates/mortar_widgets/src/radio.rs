//! Exclusive choice among a column of buttons
//!
//! A [`Radio`] is a foundation holding a single grid, and the grid stacks
//! one padded [`Button`] per option. Clicking a button selects its option;
//! the selected button is drawn darker and every other one is reset.

use mortar_core::{
    clear_paint, since_start, BlockHandle, CloseEvent, Color, Event, Foundation,
    FoundationMessage,
};
use mortar_layout::{
    Anchor, BlockData, GridCommand, GridLayout, Layouter, LayouterHandle, PadCommand, PadConfig,
    PadLayout,
};
use tokio::sync::{mpsc, watch};
use tokio::task::AbortHandle;

use crate::button::{Button, ButtonConfig, ButtonHandle};

const PAD: f32 = 2.0;
const SELECTED: Color = Color::rgb(110.0 / 255.0, 110.0 / 255.0, 110.0 / 255.0);

#[derive(Debug)]
pub enum RadioCommand {
    /// Rebuild with this many options
    SetOptions(usize),
    SetSelection(usize),
}

/// One option's button, its padding, and the task turning its clicks into
/// selections
struct Choice {
    button: ButtonHandle,
    pad: LayouterHandle<PadCommand>,
    clicks: AbortHandle,
}

pub struct Radio {
    foundation: Foundation,
    grid: LayouterHandle<GridCommand>,
    choices: Vec<Choice>,
    selection: watch::Sender<Option<usize>>,
    picks: mpsc::Receiver<usize>,
    picks_tx: mpsc::Sender<usize>,
    commands: mpsc::UnboundedReceiver<RadioCommand>,
    commands_tx: mpsc::UnboundedSender<RadioCommand>,
}

#[derive(Clone, Debug)]
pub struct RadioHandle {
    block: BlockHandle,
    selection: watch::Receiver<Option<usize>>,
    commands: mpsc::UnboundedSender<RadioCommand>,
}

impl RadioHandle {
    pub fn block(&self) -> &BlockHandle {
        &self.block
    }

    pub fn selection(&self) -> Option<usize> {
        *self.selection.borrow()
    }

    /// Receiver that wakes on every selection
    pub fn watch(&self) -> watch::Receiver<Option<usize>> {
        self.selection.clone()
    }

    pub fn set_options(&self, options: usize) {
        self.send(RadioCommand::SetOptions(options));
    }

    pub fn set_selection(&self, index: usize) {
        self.send(RadioCommand::SetSelection(index));
    }

    fn send(&self, command: RadioCommand) {
        if self.commands.send(command).is_err() {
            tracing::trace!(block = %self.block.id(), "radio has stopped");
        }
    }
}

impl Radio {
    /// Must be called inside a tokio runtime.
    pub fn new(options: usize) -> Self {
        let mut foundation = Foundation::new();
        foundation.block().set_paint(clear_paint(Color::BLACK));
        let grid = Layouter::spawn(GridLayout::new());
        let bounds = foundation.block().bounds();
        foundation.place_block(grid.block(), bounds);

        let (selection, _) = watch::channel(None);
        let (picks_tx, picks) = mpsc::channel(1);
        let (commands_tx, commands) = mpsc::unbounded_channel();
        let mut radio = Self {
            foundation,
            grid,
            choices: Vec::new(),
            selection,
            picks,
            picks_tx,
            commands,
            commands_tx,
        };
        radio.set_options(options);
        radio
    }

    pub fn handle(&self) -> RadioHandle {
        RadioHandle {
            block: self.foundation.block().handle().clone(),
            selection: self.selection.subscribe(),
            commands: self.commands_tx.clone(),
        }
    }

    pub fn foundation(&self) -> &Foundation {
        &self.foundation
    }

    pub fn options(&self) -> usize {
        self.choices.len()
    }

    /// The button standing for option `index`
    pub fn button(&self, index: usize) -> Option<&ButtonHandle> {
        self.choices.get(index).map(|choice| &choice.button)
    }

    pub fn selection(&self) -> Option<usize> {
        *self.selection.borrow()
    }

    /// Replace the buttons with `options` fresh ones. A selection that is
    /// still in range survives.
    pub fn set_options(&mut self, options: usize) {
        if options == self.choices.len() {
            return;
        }
        for choice in std::mem::take(&mut self.choices) {
            self.retire(choice);
        }
        for index in 0..options {
            let choice = self.choice(index);
            self.choices.push(choice);
        }
        self.selection.send_if_modified(|selection| {
            let stale = selection.is_some_and(|index| index >= options);
            if stale {
                *selection = None;
            }
            stale
        });
        self.update_buttons();
        tracing::debug!(radio = %self.foundation.id(), options, "radio rebuilt");
    }

    /// Select option `index`. Out-of-range indices are ignored.
    pub fn set_selection(&mut self, index: usize) {
        if index >= self.choices.len() {
            tracing::trace!(radio = %self.foundation.id(), index, "selection out of range");
            return;
        }
        self.selection.send_replace(Some(index));
        self.update_buttons();
    }

    pub fn apply(&mut self, command: RadioCommand) {
        match command {
            RadioCommand::SetOptions(options) => self.set_options(options),
            RadioCommand::SetSelection(index) => self.set_selection(index),
        }
    }

    /// Route a foundation message, keeping the grid filling the radio and
    /// passing the grid's hint on as the radio's own
    pub fn handle_message(&mut self, message: FoundationMessage) {
        match message {
            FoundationMessage::BlockSizeHint(h) => {
                self.foundation.dispatch(FoundationMessage::BlockSizeHint(h));
                if h.block == self.grid.block().id() {
                    self.foundation.block().set_size_hint(h.hint);
                }
            }
            other => {
                let before = self.foundation.block().size();
                self.foundation.dispatch(other);
                if self.foundation.block().size() != before {
                    let bounds = self.foundation.block().bounds();
                    self.foundation.place_block(self.grid.block(), bounds);
                }
            }
        }
    }

    pub async fn run(mut self) {
        loop {
            tokio::select! {
                biased;
                Some(command) = self.commands.recv() => self.apply(command),
                Some(index) = self.picks.recv() => self.set_selection(index),
                message = self.foundation.next_message() => match message {
                    Some(message) => {
                        let close = message.is_close();
                        self.handle_message(message);
                        if close {
                            break;
                        }
                    }
                    None => break,
                },
            }
        }
    }

    pub fn spawn(self) -> RadioHandle {
        let handle = self.handle();
        tokio::spawn(self.run());
        handle
    }

    fn choice(&self, index: usize) -> Choice {
        let button = Button::new().spawn();
        let pad = Layouter::spawn(PadLayout::new(
            PadConfig::uniform(PAD),
            button.block().clone(),
        ));
        self.grid.send(GridCommand::Add(
            BlockData::new(pad.block().clone(), 0, index).anchor(Anchor::BOTH, Anchor::BOTH),
        ));

        let (clicker, mut clicked) = mpsc::channel(1);
        button.add_clicker(clicker);
        let picks = self.picks_tx.clone();
        let clicks = tokio::spawn(async move {
            while clicked.recv().await.is_some() {
                if picks.try_send(index).is_err() {
                    tracing::trace!(index, "radio is busy, dropping click");
                }
            }
        })
        .abort_handle();

        Choice {
            button,
            pad,
            clicks,
        }
    }

    fn retire(&self, choice: Choice) {
        choice.clicks.abort();
        self.grid.send(GridCommand::Remove(choice.pad.block().clone()));
        choice.pad.block().send_event(close_event());
    }

    fn update_buttons(&self) {
        let selection = self.selection();
        for (index, choice) in self.choices.iter().enumerate() {
            let color = (selection == Some(index)).then_some(SELECTED);
            choice.button.set_config(ButtonConfig { color });
        }
    }
}

impl Drop for Radio {
    /// Take the grid, its pads and their buttons down with the radio
    fn drop(&mut self) {
        for choice in &self.choices {
            choice.clicks.abort();
        }
        self.grid.block().send_event(close_event());
    }
}

fn close_event() -> Event {
    Event::Close(CloseEvent { when: since_start() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;
    use mortar_core::{MouseButton, MouseButtonEvent, Point, RectSet, Size};
    use std::time::Duration;
    use tokio::time::timeout;

    const QUIET: Duration = Duration::from_millis(100);

    async fn until<F: Fn() -> bool>(done: F) {
        timeout(QUIET, async {
            while !done() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
    }

    fn face(button: &ButtonHandle) -> image::Rgba<u8> {
        let mut buffer = RgbaImage::new(2, 2);
        button.block().draw(&mut buffer, &RectSet::new());
        *buffer.get_pixel(1, 1)
    }

    #[tokio::test]
    async fn test_selection_is_exclusive() {
        let mut radio = Radio::new(3);
        let handle = radio.handle();
        assert_eq!(radio.selection(), None);

        radio.set_selection(1);
        assert_eq!(handle.selection(), Some(1));
        radio.set_selection(2);
        assert_eq!(handle.selection(), Some(2));

        let selected = SELECTED.to_rgba8();
        let second = radio.button(1).unwrap().clone();
        let third = radio.button(2).unwrap().clone();
        until(|| face(&third) == selected && face(&second) != selected).await;
    }

    #[tokio::test]
    async fn test_out_of_range_selection_is_ignored() {
        let mut radio = Radio::new(2);
        radio.set_selection(2);
        assert_eq!(radio.selection(), None);
    }

    #[tokio::test]
    async fn test_rebuild_drops_selection_out_of_range() {
        let mut radio = Radio::new(3);
        radio.set_selection(2);
        let old = radio.button(0).unwrap().clone();

        radio.set_options(3);
        assert_eq!(radio.button(0).unwrap().block(), old.block());

        radio.set_options(2);
        assert_eq!(radio.options(), 2);
        assert_eq!(radio.selection(), None);
        // Retired buttons stop with their pads.
        until(|| old.block().sender().is_closed()).await;
    }

    #[tokio::test]
    async fn test_click_selects_option() {
        let radio = Radio::new(3);
        let button = radio.button(1).unwrap().clone();
        let handle = radio.spawn();
        let mut selection = handle.watch();

        button.block().send_event(Event::MouseUp(MouseButtonEvent {
            when: Duration::ZERO,
            loc: Point::new(1.0, 1.0),
            button: MouseButton::Left,
        }));
        timeout(QUIET, selection.wait_for(|s| *s == Some(1)))
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_hint_stacks_padded_buttons() {
        let radio = Radio::new(3);
        let mut parent = Foundation::new();
        parent.add_block(radio.foundation().block().handle());
        let _radio = radio.spawn();

        let expected = Size::new(74.0, 102.0);
        let hint = timeout(QUIET, async {
            loop {
                match parent.next_message().await {
                    Some(FoundationMessage::BlockSizeHint(h)) if h.hint.preferred == expected => {
                        break h.hint
                    }
                    Some(_) => continue,
                    None => panic!("foundation stopped"),
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(hint.min, expected);
    }

    #[tokio::test]
    async fn test_close_stops_the_buttons() {
        let radio = Radio::new(2);
        let button = radio.button(0).unwrap().clone();
        let handle = radio.spawn();

        handle.block().send_event(close_event());
        until(|| button.block().sender().is_closed()).await;
    }
}
