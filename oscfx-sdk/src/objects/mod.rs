pub mod effects;
pub mod event;
pub mod module;
pub mod ws;

pub use effects::{EffectCount, FiringRecord};
pub use event::{EventRecord, OscArg};
pub use module::{CreateModule, ModuleResponse, SetNotes, SetReference};
