mod core;
mod handler;
mod monitor;

pub(crate) use self::core::DispatcherActor;
