//! Inbound packet dispatch: minimum-length gate, authentication gate,
//! then the handler. Handler errors become user-visible messages and
//! never tear down the session.

use std::sync::Arc;

use game_core::protocol::{min_packet_length, ClientPacketId, PacketReader};

use crate::driver;
use crate::error::GameError;
use crate::messaging::MessageSender;
use crate::services::Services;
use crate::session::Session;

pub struct PacketRouter;

impl PacketRouter {
    /// Routes one frame. The caller keeps reading regardless of the
    /// outcome here.
    pub async fn route(
        services: &Arc<Services>,
        session: &Arc<Session>,
        sender: &MessageSender,
        frame: &[u8],
    ) {
        let Some(&packet_id) = frame.first() else {
            log::warn!("[{}] empty frame", session.peer);
            return;
        };

        if frame.len() < min_packet_length(packet_id) {
            log::warn!(
                "[{}] truncated packet {packet_id}: got {}, need {}",
                session.peer,
                frame.len(),
                min_packet_length(packet_id)
            );
            sender.error_msg("Paquete inválido.");
            return;
        }

        let Some(packet) = ClientPacketId::from_u8(packet_id) else {
            log::warn!("[{}] unknown packet id {packet_id}", session.peer);
            return;
        };

        if !packet.allowed_unauthenticated() && !session.is_authenticated() {
            log::warn!(
                "[{}] packet {packet:?} before login",
                session.peer
            );
            sender.error_msg("Debes iniciar sesión primero.");
            return;
        }

        let mut reader = PacketReader::new(&frame[1..]);
        let result = match packet {
            ClientPacketId::ThrowDices => driver::session::handle_throw_dices(sender),
            ClientPacketId::Login => {
                driver::session::handle_login(services, session, sender, &mut reader).await
            }
            ClientPacketId::CreateAccount => {
                // Account creation is the provisioning tool's job.
                sender.error_msg("La creación de cuentas no está disponible aquí.");
                Ok(())
            }
            ClientPacketId::Talk => {
                driver::interaction::handle_talk(services, session, &mut reader).await
            }
            ClientPacketId::Walk => {
                driver::movement::handle_walk(services, session, sender, &mut reader).await
            }
            ClientPacketId::Drop => {
                driver::inventory::handle_drop(services, session, sender, &mut reader).await
            }
            ClientPacketId::CommerceEnd => driver::interaction::handle_commerce_end(sender),
            ClientPacketId::EquipItem => {
                driver::inventory::handle_equip_item(services, session, sender, &mut reader).await
            }
            ClientPacketId::BankEnd => driver::interaction::handle_bank_end(sender),
            ClientPacketId::Ping => driver::session::handle_ping(sender),
            ClientPacketId::Ayuda => driver::session::handle_ayuda(sender),
            ClientPacketId::LeftClick => {
                driver::interaction::handle_left_click(services, session, sender, &mut reader)
                    .await
            }
            ClientPacketId::Uptime => driver::session::handle_uptime(services, sender),
            ClientPacketId::Online => driver::session::handle_online(services, sender),
            ClientPacketId::Quit => {
                driver::session::handle_quit(services, session, sender).await
            }
            ClientPacketId::Meditate => {
                driver::interaction::handle_meditate(services, session, sender).await
            }
            ClientPacketId::PickUp => {
                driver::inventory::handle_pickup(services, session, sender).await
            }
            ClientPacketId::Attack => {
                driver::combat::handle_attack(services, session, sender).await
            }
            ClientPacketId::ChangeHeading => {
                driver::movement::handle_change_heading(services, session, sender, &mut reader)
                    .await
            }
            ClientPacketId::CastSpell => {
                driver::combat::handle_cast_spell(services, session, sender, &mut reader).await
            }
            ClientPacketId::DoubleClick => {
                driver::interaction::handle_double_click(services, session, sender, &mut reader)
                    .await
            }
        };

        if let Err(err) = result {
            Self::report(sender, session, packet, err);
        }
    }

    /// Error-to-message policy: the session stays open, the user gets a
    /// console or error line, storage problems only log.
    fn report(sender: &MessageSender, session: &Session, packet: ClientPacketId, err: GameError) {
        match &err {
            GameError::Truncated(_) => {
                log::warn!("[{}] short body for {packet:?}: {err}", session.peer);
                sender.error_msg("Paquete inválido.");
            }
            GameError::InvalidInput(msg) => sender.console_msg(msg),
            GameError::NotFound(msg) => sender.console_msg(msg),
            GameError::InsufficientResource(msg) => sender.console_msg(msg),
            GameError::OutOfRange => sender.console_msg("Estás demasiado lejos."),
            GameError::Unauthenticated => sender.error_msg("Debes iniciar sesión primero."),
            GameError::Storage(msg) => {
                log::error!("[{}] storage failure in {packet:?}: {msg}", session.peer);
                sender.console_msg("El servidor no pudo completar la acción.");
            }
            GameError::UnknownPacket(_) | GameError::ShuttingDown => {
                log::warn!("[{}] {packet:?} failed: {err}", session.peer);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::TestWorld;

    #[tokio::test]
    async fn short_walk_packet_is_discarded_without_mutation() {
        let world = TestWorld::with_player(7, "Alice", 1, 50, 50).await;
        let session = world.login_session(7, "Alice");

        // WALK needs two bytes; send only the id.
        PacketRouter::route(&world.services, &session.session, &session.sender, &[6]).await;

        let position = world.position(7).await;
        assert_eq!((position.x, position.y), (50, 50));
        // The reply is an ERROR_MSG, nothing else.
        let frames = session.outbox.frames_snapshot();
        assert_eq!(frames.len(), 1);
        assert_eq!(
            frames[0].bytes[0],
            game_core::protocol::ServerPacketId::ErrorMsg as u8
        );
    }

    #[tokio::test]
    async fn unknown_packet_is_silently_dropped() {
        let world = TestWorld::with_player(7, "Alice", 1, 50, 50).await;
        let session = world.login_session(7, "Alice");

        PacketRouter::route(&world.services, &session.session, &session.sender, &[250, 1, 2])
            .await;
        assert!(session.outbox.is_empty());
    }

    #[tokio::test]
    async fn authenticated_packets_are_rejected_before_login() {
        let world = TestWorld::with_player(7, "Alice", 1, 50, 50).await;
        let session = world.anonymous_session();

        PacketRouter::route(&world.services, &session.session, &session.sender, &[34]).await;
        let frames = session.outbox.frames_snapshot();
        assert_eq!(frames.len(), 1);
        assert_eq!(
            frames[0].bytes[0],
            game_core::protocol::ServerPacketId::ErrorMsg as u8
        );
    }

    #[tokio::test]
    async fn ping_works_before_login() {
        let world = TestWorld::with_player(7, "Alice", 1, 50, 50).await;
        let session = world.anonymous_session();

        PacketRouter::route(&world.services, &session.session, &session.sender, &[22]).await;
        let frames = session.outbox.frames_snapshot();
        assert_eq!(frames.len(), 1);
        assert_eq!(
            frames[0].bytes[0],
            game_core::protocol::ServerPacketId::Pong as u8
        );
    }
}
