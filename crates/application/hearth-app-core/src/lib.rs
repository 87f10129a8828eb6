pub mod bus;
pub mod forms;
pub mod household;
pub mod live_view;
pub mod ports;
pub mod queue;
pub mod submission;
pub mod validation_store;

pub use bus::{EventBus, Subscription};
pub use forms::{FieldReader, FormInput, FormSchema};
pub use household::HouseholdCommands;
pub use live_view::{LiveView, LiveViewError, LiveViewSpec, LiveViewStream, Push, View, ViewContext};
pub use ports::{CommandHandler, NotificationSink};
pub use queue::{CommandFailure, CommandQueue, QueueConfig, QueuedCommand};
pub use submission::{SubmissionResource, SubmitOutcome};
pub use validation_store::ValidationErrorStore;
