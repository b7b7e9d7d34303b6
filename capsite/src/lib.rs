mod capability;
mod cyclic;
mod dispatch;
mod error;
mod factory;
mod guard;
mod node;
mod receiver;
mod registry;
mod root;
mod settings;
mod threads;
mod uncached;
mod visitor;

#[cfg(test)]
mod fixtures;

pub use capability::*;
pub use cyclic::CyclicGuard;
pub use dispatch::{CacheMode, Dispatch, DispatchNode};
pub use error::*;
pub use factory::Factory;
pub use guard::Guard;
pub use node::*;
pub use receiver::{Receiver, ReceiverType};
pub use registry::{CapabilityInfo, Registry, resolve};
pub use root::{LanguageInfo, RootCreateInfo, RootNode};
pub use settings::{DispatchSettings, settings};
pub use threads::NativeThread;
pub use uncached::Uncached;
pub use visitor::{NodeVisitor, walk};

#[doc(hidden)]
pub use inventory;
