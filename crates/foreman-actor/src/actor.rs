use std::future::Future;
use std::time::Duration;

use log::{error, warn};
use tokio::sync::{mpsc, watch};

const ACTOR_CHANNEL_SIZE: usize = 8;

pub trait Actor: Sized + Send + 'static {
    type Message: Send + 'static;
    type Options: Send;

    fn new(options: Self::Options) -> Self;
    fn start(&mut self, ctx: &mut ActorContext<Self>);
    fn receive(&mut self, ctx: &mut ActorContext<Self>, message: Self::Message) -> ActorAction;
    fn stop(self, ctx: &mut ActorContext<Self>);
}

pub enum ActorAction {
    Continue,
    /// Log a warning and continue processing messages.
    Warn(String),
    /// Log an error and stop the actor.
    Fail(String),
    Stop,
}

impl ActorAction {
    pub fn warn(message: impl ToString) -> Self {
        Self::Warn(message.to_string())
    }

    pub fn fail(message: impl ToString) -> Self {
        Self::Fail(message.to_string())
    }
}

pub struct ActorHandle<T>
where
    T: Actor,
{
    sender: mpsc::Sender<T::Message>,
    stopped: watch::Receiver<bool>,
}

impl<T> Clone for ActorHandle<T>
where
    T: Actor,
{
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            stopped: self.stopped.clone(),
        }
    }
}

impl<T: Actor> ActorHandle<T> {
    fn new(options: T::Options) -> Self {
        let (tx, mut rx) = mpsc::channel(ACTOR_CHANNEL_SIZE);
        let (stopped_tx, stopped_rx) = watch::channel::<bool>(false);
        let mut actor = T::new(options);
        let out = Self {
            sender: tx,
            stopped: stopped_rx,
        };
        let mut ctx = ActorContext {
            handle: out.clone(),
        };
        tokio::spawn(async move {
            actor.start(&mut ctx);
            while let Some(message) = rx.recv().await {
                match actor.receive(&mut ctx, message) {
                    ActorAction::Continue => {}
                    ActorAction::Warn(message) => {
                        warn!("{message}");
                    }
                    ActorAction::Fail(message) => {
                        error!("{message}");
                        break;
                    }
                    ActorAction::Stop => {
                        break;
                    }
                }
            }
            // Close the mailbox so that further sends fail fast
            // while the actor is running its shutdown logic.
            rx.close();
            actor.stop(&mut ctx);
            let _ = stopped_tx.send(true);
        });
        out
    }

    pub async fn send(&self, message: T::Message) -> Result<(), mpsc::error::SendError<T::Message>> {
        self.sender.send(message).await
    }

    pub async fn wait_for_stop(mut self) {
        // We ignore the receiver error since the sender must have been dropped in this case,
        // which means the actor has stopped.
        let _ = self.stopped.wait_for(|x| *x).await;
    }
}

pub struct ActorContext<T>
where
    T: Actor,
{
    handle: ActorHandle<T>,
}

impl<T: Actor> ActorContext<T> {
    pub fn handle(&self) -> &ActorHandle<T> {
        &self.handle
    }

    /// Enqueues a message to the actor itself.
    /// The message is delivered out of band when the mailbox is full,
    /// so no ordering is guaranteed with respect to earlier sends.
    pub fn send(&mut self, message: T::Message) {
        match self.handle.sender.try_send(message) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(message)) => {
                let handle = self.handle.clone();
                tokio::spawn(async move {
                    let _ = handle.send(message).await;
                });
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("failed to send message to a stopped actor");
            }
        }
    }

    pub fn send_with_delay(&mut self, message: T::Message, delay: Duration) {
        let handle = self.handle.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = handle.send(message).await;
        });
    }

    pub fn spawn<F>(&mut self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(future);
    }
}

/// A collection of spawned actors that can be awaited together.
/// The system does not own the actors; dropping it does not stop them.
pub struct ActorSystem {
    stopped: Vec<watch::Receiver<bool>>,
}

impl Default for ActorSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl ActorSystem {
    pub fn new() -> Self {
        Self { stopped: vec![] }
    }

    pub fn spawn<T: Actor>(&mut self, options: T::Options) -> ActorHandle<T> {
        let handle = ActorHandle::<T>::new(options);
        self.stopped.push(handle.stopped.clone());
        handle
    }

    /// Waits for every spawned actor to stop.
    pub async fn join(self) {
        for mut stopped in self.stopped {
            let _ = stopped.wait_for(|x| *x).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::oneshot;

    use super::*;

    struct TestActor;

    enum TestMessage {
        Echo {
            value: String,
            reply: oneshot::Sender<String>,
        },
        Stop,
    }

    impl Actor for TestActor {
        type Message = TestMessage;
        type Options = ();

        fn new(_options: Self::Options) -> Self {
            Self
        }

        fn start(&mut self, _: &mut ActorContext<Self>) {}

        fn receive(&mut self, _: &mut ActorContext<Self>, message: Self::Message) -> ActorAction {
            match message {
                TestMessage::Echo { value, reply } => {
                    let _ = reply.send(value.to_uppercase());
                    ActorAction::Continue
                }
                TestMessage::Stop => ActorAction::Stop,
            }
        }

        fn stop(self, _: &mut ActorContext<Self>) {}
    }

    #[tokio::test]
    async fn test_actor_handle_send() {
        let mut system = ActorSystem::new();
        let handle = system.spawn::<TestActor>(());
        let (tx, rx) = oneshot::channel();
        let result = handle
            .send(TestMessage::Echo {
                value: "hello".to_string(),
                reply: tx,
            })
            .await;
        assert!(matches!(result, Ok(())));
        assert_eq!(rx.await, Ok("HELLO".to_string()));
    }

    #[tokio::test]
    async fn test_actor_handle_wait_for_stop() {
        let mut system = ActorSystem::new();
        let handle = system.spawn::<TestActor>(());
        let result = handle.send(TestMessage::Stop).await;
        assert!(matches!(result, Ok(())));

        handle.clone().wait_for_stop().await;
        // Multiple handles should be able to wait for the actor to stop.
        handle.wait_for_stop().await;
        system.join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_actor_context_send_with_delay() {
        struct DelayActor;

        enum DelayMessage {
            Start {
                reply: oneshot::Sender<String>,
            },
            Fire {
                reply: oneshot::Sender<String>,
            },
        }

        impl Actor for DelayActor {
            type Message = DelayMessage;
            type Options = ();

            fn new(_options: Self::Options) -> Self {
                Self
            }

            fn start(&mut self, _: &mut ActorContext<Self>) {}

            fn receive(
                &mut self,
                ctx: &mut ActorContext<Self>,
                message: Self::Message,
            ) -> ActorAction {
                match message {
                    DelayMessage::Start { reply } => {
                        ctx.send_with_delay(
                            DelayMessage::Fire { reply },
                            Duration::from_secs(5),
                        );
                        ActorAction::Continue
                    }
                    DelayMessage::Fire { reply } => {
                        let _ = reply.send("fired".to_string());
                        ActorAction::Stop
                    }
                }
            }

            fn stop(self, _: &mut ActorContext<Self>) {}
        }

        let mut system = ActorSystem::new();
        let handle = system.spawn::<DelayActor>(());
        let (tx, rx) = oneshot::channel();
        handle.send(DelayMessage::Start { reply: tx }).await.unwrap();
        assert_eq!(rx.await, Ok("fired".to_string()));
        system.join().await;
    }
}
