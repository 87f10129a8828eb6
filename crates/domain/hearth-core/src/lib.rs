pub mod command;
pub mod event;
pub mod identity;
pub mod records;
pub mod validation;

pub use command::{registry, Command, CommandDefinition};
pub use event::{Channel, Event};
pub use identity::{ActorId, ConnectionId, IdentityError};
pub use records::*;
pub use validation::ValidationErrors;
