pub mod classifier;
pub mod codec;
pub mod dispatcher;
pub mod params;
pub mod poller;

pub use classifier::{classify, Exchange};
pub use codec::{decode, CodecError, CommandRequest, CommandResult, CommandState, ErrorPayload};
pub use dispatcher::{CommandDispatcher, Submitted};
pub use params::{CommandName, CommandParameters, Nullable};
pub use poller::{Backoff, CommandPoller, PollHandle, PollPolicy, PollState, PollStatus};
