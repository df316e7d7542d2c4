mod action;
mod backend;
mod event;
mod page;
mod patient;
mod sink;
mod slash_commands;
mod turn;

pub use action::*;
pub use backend::*;
pub use event::*;
pub use page::*;
pub use patient::*;
pub use sink::*;
pub use slash_commands::*;
pub use turn::*;
