//! Host-directed commands.
//!
//! A peer asks the host to do something to an entity: command id, target
//! network id and an opaque payload. The host offers the command to its
//! handlers in registration order until one claims it.

use log::{error, warn};
use session::{NetworkMessage, PlayerId, SendOptions, Session};
use thiserror::Error;
use wire::ids::gameplay_ids;
use wire::{decode_command, encode_command, EncodeError, Limits, NetworkId};

use crate::identity::NetworkIdentity;
use crate::registry::NetworkRegistry;
use crate::world::EntityWorld;

/// A command as seen by a handler on the host.
#[derive(Debug, Clone, Copy)]
pub struct CommandContext<'a> {
    pub command_id: u16,
    pub target_id: NetworkId,
    /// The target entity, if the id resolved on the host.
    pub target: Option<NetworkIdentity>,
    pub sender: &'a PlayerId,
    pub payload: &'a [u8],
}

/// Handles commands on the host.
pub trait CommandHandler {
    /// Returns `Ok(true)` to claim the command and stop dispatch.
    fn handle_command(
        &mut self,
        context: &CommandContext<'_>,
        world: &mut dyn EntityWorld,
    ) -> anyhow::Result<bool>;
}

impl<F> CommandHandler for F
where
    F: FnMut(&CommandContext<'_>, &mut dyn EntityWorld) -> anyhow::Result<bool>,
{
    fn handle_command(
        &mut self,
        context: &CommandContext<'_>,
        world: &mut dyn EntityWorld,
    ) -> anyhow::Result<bool> {
        self(context, world)
    }
}

/// Handle returned by [`CommandRouter::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(u64);

impl HandlerId {
    pub(crate) const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

/// An outbound command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandRequest<'a> {
    pub command_id: u16,
    pub target: NetworkId,
    pub payload: &'a [u8],
    pub reliable: bool,
}

impl<'a> CommandRequest<'a> {
    #[must_use]
    pub const fn new(command_id: u16, target: NetworkId, payload: &'a [u8]) -> Self {
        Self {
            command_id,
            target,
            payload,
            reliable: true,
        }
    }

    #[must_use]
    pub const fn unreliable(mut self) -> Self {
        self.reliable = false;
        self
    }
}

/// How [`CommandRouter::send_to_host`] delivered a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandDelivery {
    /// Sent to the remote host.
    Sent,
    /// Dispatched locally and claimed by a handler.
    Handled,
    /// Dispatched locally; no handler claimed it.
    Unhandled,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("not in a room")]
    NotInRoom,
    #[error("local player id is missing")]
    MissingLocalPlayer,
    #[error(transparent)]
    Encode(#[from] EncodeError),
}

/// Routes commands to the host and dispatches them there.
pub struct CommandRouter {
    handlers: Vec<(HandlerId, Box<dyn CommandHandler>)>,
    next_id: u64,
    limits: Limits,
}

impl std::fmt::Debug for CommandRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRouter")
            .field("handlers", &self.handlers.len())
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

impl Default for CommandRouter {
    fn default() -> Self {
        Self::with_limits(Limits::default())
    }
}

impl CommandRouter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_limits(limits: Limits) -> Self {
        Self {
            handlers: Vec::new(),
            next_id: 1,
            limits,
        }
    }

    pub fn register(&mut self, handler: impl CommandHandler + 'static) -> HandlerId {
        let id = HandlerId(self.next_id);
        self.next_id += 1;
        self.handlers.push((id, Box::new(handler)));
        id
    }

    pub fn unregister(&mut self, id: HandlerId) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(existing, _)| *existing != id);
        self.handlers.len() != before
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Sends a command to the host, or dispatches it in-process when the
    /// local peer is the host.
    pub fn send_to_host(
        &mut self,
        session: &mut Session,
        registry: &NetworkRegistry,
        world: &mut dyn EntityWorld,
        request: CommandRequest<'_>,
    ) -> Result<CommandDelivery, CommandError> {
        if !session.is_in_room() {
            error!("command {} rejected: not in room", request.command_id);
            return Err(CommandError::NotInRoom);
        }
        let Some(local) = session.local_player_id().cloned() else {
            error!("command {} rejected: local player id is missing", request.command_id);
            return Err(CommandError::MissingLocalPlayer);
        };

        if session.is_host() {
            let handled = self.dispatch(
                registry,
                world,
                request.command_id,
                request.target,
                &local,
                request.payload,
            );
            return Ok(if handled {
                CommandDelivery::Handled
            } else {
                CommandDelivery::Unhandled
            });
        }

        let payload = encode_command(request.command_id, request.target, request.payload, &self.limits)?;
        session.send(
            NetworkMessage::from_sender(gameplay_ids::COMMAND, local, payload),
            &SendOptions::host(request.reliable),
        );
        Ok(CommandDelivery::Sent)
    }

    /// Handles an inbound command message. Returns `false` for other ids.
    pub fn handle_message(
        &mut self,
        session: &Session,
        registry: &NetworkRegistry,
        world: &mut dyn EntityWorld,
        message: &NetworkMessage,
    ) -> bool {
        if message.id != gameplay_ids::COMMAND {
            return false;
        }
        let frame = match decode_command(&message.payload, &self.limits) {
            Ok(frame) => frame,
            Err(err) => {
                warn!("invalid command payload from {}: {err}", message.sender);
                return true;
            }
        };
        if !session.is_host() {
            return true;
        }
        if message.sender.is_empty() {
            warn!("command {} missing sender", frame.command_id);
            return true;
        }
        if !self.dispatch(
            registry,
            world,
            frame.command_id,
            frame.target,
            &message.sender,
            frame.payload,
        ) {
            warn!(
                "unhandled command {} (target={}, sender={})",
                frame.command_id, frame.target, message.sender
            );
        }
        true
    }

    fn dispatch(
        &mut self,
        registry: &NetworkRegistry,
        world: &mut dyn EntityWorld,
        command_id: u16,
        target_id: NetworkId,
        sender: &PlayerId,
        payload: &[u8],
    ) -> bool {
        let target = if target_id.is_valid() {
            registry.lookup(target_id)
        } else {
            None
        };
        let context = CommandContext {
            command_id,
            target_id,
            target,
            sender,
            payload,
        };
        for (id, handler) in &mut self.handlers {
            match handler.handle_command(&context, world) {
                Ok(true) => return true,
                Ok(false) => {}
                Err(err) => error!("command handler {id:?} failed on command {command_id}: {err:#}"),
            }
        }
        false
    }
}
