//! Seams the embedding game plugs into the application.

use gameplay::{EntityWorld, Gameplay};
use session::{NetworkMessage, PlayerInfo, Session};

/// Mutable view of the application handed to modules and interceptors.
pub struct AppContext<'a> {
    pub session: &'a mut Session,
    pub gameplay: &'a mut Gameplay,
    pub world: &'a mut dyn EntityWorld,
}

/// Game-specific logic driven by [`crate::MultiplayerApp`].
///
/// All hooks default to doing nothing. Errors are logged and do not stop
/// the tick.
pub trait GameModule {
    fn on_player_joined(&mut self, _cx: &mut AppContext<'_>, _player: &PlayerInfo) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_player_left(&mut self, _cx: &mut AppContext<'_>, _player: &PlayerInfo) -> anyhow::Result<()> {
        Ok(())
    }

    /// Application-range messages no interceptor consumed.
    fn on_message(&mut self, _cx: &mut AppContext<'_>, _message: &NetworkMessage) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_update(&mut self, _cx: &mut AppContext<'_>, _dt: f32) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_fixed_update(&mut self, _cx: &mut AppContext<'_>, _dt: f32) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Sees application-range messages before the game module.
pub trait MessageInterceptor {
    /// Returns `Ok(true)` to consume the message.
    fn intercept(&mut self, cx: &mut AppContext<'_>, message: &NetworkMessage) -> anyhow::Result<bool>;
}

impl<F> MessageInterceptor for F
where
    F: FnMut(&mut AppContext<'_>, &NetworkMessage) -> anyhow::Result<bool>,
{
    fn intercept(&mut self, cx: &mut AppContext<'_>, message: &NetworkMessage) -> anyhow::Result<bool> {
        self(cx, message)
    }
}

/// Handle returned by [`crate::MultiplayerApp::add_interceptor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InterceptorId(pub(crate) u64);
