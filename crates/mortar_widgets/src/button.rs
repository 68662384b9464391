//! Push button

use mortar_core::{
    Block, BlockHandle, BlockMessage, Color, Event, MouseButton, PaintFn, Rect, Size, SizeHint,
};
use tokio::sync::mpsc;

/// Receives the released button on every click
pub type Clicker = mpsc::Sender<MouseButton>;

const DEFAULT_SIZE: Size = Size::new(70.0, 30.0);
const PRESSED: Color = Color::rgb(150.0 / 255.0, 150.0 / 255.0, 150.0 / 255.0);
const RELEASED: Color = Color::rgb(200.0 / 255.0, 200.0 / 255.0, 200.0 / 255.0);

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ButtonConfig {
    /// Face color when released. `None` uses light gray.
    pub color: Option<Color>,
}

#[derive(Debug)]
pub enum ButtonCommand {
    AddClicker(Clicker),
    RemoveClicker(Clicker),
    SetConfig(ButtonConfig),
}

pub struct Button {
    block: Block,
    pressed: bool,
    config: ButtonConfig,
    clickers: Vec<Clicker>,
    commands: mpsc::UnboundedReceiver<ButtonCommand>,
    commands_tx: mpsc::UnboundedSender<ButtonCommand>,
}

#[derive(Clone, Debug)]
pub struct ButtonHandle {
    block: BlockHandle,
    commands: mpsc::UnboundedSender<ButtonCommand>,
}

impl ButtonHandle {
    pub fn block(&self) -> &BlockHandle {
        &self.block
    }

    pub fn add_clicker(&self, clicker: Clicker) {
        self.send(ButtonCommand::AddClicker(clicker));
    }

    pub fn remove_clicker(&self, clicker: Clicker) {
        self.send(ButtonCommand::RemoveClicker(clicker));
    }

    pub fn set_config(&self, config: ButtonConfig) {
        self.send(ButtonCommand::SetConfig(config));
    }

    fn send(&self, command: ButtonCommand) {
        if self.commands.send(command).is_err() {
            tracing::trace!(block = %self.block.id(), "button has stopped");
        }
    }
}

impl Default for Button {
    fn default() -> Self {
        Self::new()
    }
}

impl Button {
    pub fn new() -> Self {
        let block = Block::new();
        block.set_size_hint(SizeHint::new(
            DEFAULT_SIZE,
            DEFAULT_SIZE,
            Size::new(f32::INFINITY, f32::INFINITY),
        ));
        let (commands_tx, commands) = mpsc::unbounded_channel();
        let button = Self {
            block,
            pressed: false,
            config: ButtonConfig::default(),
            clickers: Vec::new(),
            commands,
            commands_tx,
        };
        button.block.set_paint(button.look());
        button
    }

    pub fn handle(&self) -> ButtonHandle {
        ButtonHandle {
            block: self.block.handle().clone(),
            commands: self.commands_tx.clone(),
        }
    }

    pub fn block(&self) -> &Block {
        &self.block
    }

    pub fn is_pressed(&self) -> bool {
        self.pressed
    }

    pub fn add_clicker(&mut self, clicker: Clicker) {
        self.clickers.push(clicker);
    }

    pub fn remove_clicker(&mut self, clicker: &Clicker) {
        self.clickers.retain(|c| !c.same_channel(clicker));
    }

    pub fn set_config(&mut self, config: ButtonConfig) {
        self.config = config;
        self.refresh();
    }

    pub fn apply(&mut self, command: ButtonCommand) {
        match command {
            ButtonCommand::AddClicker(c) => self.add_clicker(c),
            ButtonCommand::RemoveClicker(c) => self.remove_clicker(&c),
            ButtonCommand::SetConfig(config) => self.set_config(config),
        }
    }

    pub fn handle_event(&mut self, event: &Event) {
        match event {
            Event::MouseDown(_) => {
                self.pressed = true;
                self.refresh();
            }
            Event::MouseUp(e) => {
                self.pressed = false;
                self.clickers.retain(|c| !c.is_closed());
                for clicker in &self.clickers {
                    if clicker.try_send(e.button).is_err() {
                        tracing::trace!(block = %self.block.id(), "clicker is full, dropping click");
                    }
                }
                self.refresh();
            }
            other => self.block.handle_event(other),
        }
    }

    pub async fn run(mut self) {
        loop {
            tokio::select! {
                biased;
                Some(command) = self.commands.recv() => self.apply(command),
                message = self.block.next_message() => match message {
                    Some(message) if message.is_close() => break,
                    Some(BlockMessage::Event(event)) => self.handle_event(&event),
                    Some(other) => self.block.dispatch(other),
                    None => break,
                },
            }
        }
    }

    pub fn spawn(self) -> ButtonHandle {
        let handle = self.handle();
        tokio::spawn(self.run());
        handle
    }

    fn refresh(&self) {
        self.block.set_paint(self.look());
        self.block.invalidate(&[]);
    }

    fn look(&self) -> PaintFn {
        let face = if self.pressed {
            PRESSED
        } else {
            self.config.color.unwrap_or(RELEASED)
        };
        Box::new(move |canvas| {
            let size = canvas.size();
            canvas.clear(Color::TRANSPARENT);
            canvas.set_fill_color(face);
            canvas.fill_rect(Rect::new(0.0, 0.0, size.width, size.height));
        })
    }
}
