pub mod actions;
pub mod audio;
mod bubbles;
mod patient_name;
mod reports;
mod session;

pub use audio::AudioDevice;
pub use bubbles::*;
pub use patient_name::*;
pub use reports::*;
pub use session::*;
