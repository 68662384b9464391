//! Mortar Layout
//!
//! Layout is a negotiation between a container and its children. Children
//! publish [`SizeHint`](mortar_core::SizeHint)s, the container folds them
//! into a hint of its own for its parent, and whenever a hint or its own
//! size changes it recomputes child bounds.
//!
//! [`Layouter`] runs that loop on top of a [`Foundation`](mortar_core::Foundation)
//! and delegates the arithmetic to a [`LayoutEngine`]:
//!
//! - [`PadLayout`]: one child inset by fixed padding
//! - [`FlowLayout`]: children left to right, squeezed proportionally
//! - [`GridLayout`]: cells with spans and anchors, plus [`vbox`] and [`hbox`]

mod flex;
pub mod flow;
pub mod grid;
pub mod layouter;
pub mod pad;

pub use flow::{FlowCommand, FlowLayout};
pub use grid::{hbox, vbox, Anchor, BlockData, GridCommand, GridLayout};
pub use layouter::{Layout, LayoutContext, LayoutEngine, Layouter, LayouterHandle};
pub use pad::{PadCommand, PadConfig, PadLayout};
