//! Shell-facing side of the lottery client: the bridge that wires the
//! session workspace together and the participation form state.

pub mod bridge;
pub mod participation_form;

pub use bridge::{ClientBridge, LottoGateway};
pub use participation_form::ParticipationForm;
