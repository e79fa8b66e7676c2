//! Opening the channel sockets between two parties.
//!
//! Right after connecting, every channel socket sends an 8 byte handshake: the party id
//! and the channel index, both as little-endian `u32`. The listening side uses it to
//! place the socket, independent of the order in which connections are accepted.
use std::{collections::BTreeMap, fmt, net::ToSocketAddrs};

use bytes::{Buf, BufMut};
use tracing::{Level, debug, instrument};

use super::{MAX_NUM_COMM_CHANNELS, Socket, SocketListener, TransportConfig, TransportError};

/// Size of the handshake sent on every channel socket.
pub const HANDSHAKE_SIZE: usize = 8;

/// Open `num_channels` sockets to the listener at `addr` and identify them as channels
/// `0..num_channels` of party `party_id`.
///
/// If any connection fails, the sockets opened so far are closed again.
#[instrument(level = Level::DEBUG, skip_all, err)]
pub fn connect<A: ToSocketAddrs + fmt::Debug>(
    addr: A,
    party_id: u32,
    num_channels: usize,
    config: &TransportConfig,
) -> Result<Vec<Socket>, TransportError> {
    check_num_channels(num_channels)?;
    let mut sockets = Vec::with_capacity(num_channels);
    for index in 0..num_channels {
        let mut socket = Socket::connect(&addr, config.connect_timeout)?;
        socket.set_nodelay(config.nodelay)?;
        socket.set_write_timeout(Some(config.handshake_timeout))?;
        let mut hello = Vec::with_capacity(HANDSHAKE_SIZE);
        hello.put_u32_le(party_id);
        // index < MAX_NUM_COMM_CHANNELS
        hello.put_u32_le(index as u32);
        socket
            .send(&hello)
            .map_err(|err| TransportError::Handshake(format!("unable to send handshake: {err}")))?;
        socket.set_write_timeout(None)?;
        debug!(?addr, party_id, index, "connected channel");
        sockets.push(socket);
    }
    Ok(sockets)
}

/// Accept `num_channels` channel sockets from each party in `peers`.
///
/// Returns the sockets of each party ordered by channel index. Handshakes from unknown
/// parties, with out of range channel indices or for already connected channels fail
/// the whole setup.
#[instrument(level = Level::DEBUG, skip_all, err)]
pub fn listen(
    listener: &SocketListener,
    peers: &[u32],
    num_channels: usize,
    config: &TransportConfig,
) -> Result<BTreeMap<u32, Vec<Socket>>, TransportError> {
    check_num_channels(num_channels)?;
    let mut slots: BTreeMap<u32, Vec<Option<Socket>>> = peers
        .iter()
        .map(|party| (*party, (0..num_channels).map(|_| None).collect()))
        .collect();
    for _ in 0..slots.len() * num_channels {
        let mut socket = listener.accept()?;
        socket.set_nodelay(config.nodelay)?;
        socket.set_read_timeout(Some(config.handshake_timeout))?;
        let mut hello = [0; HANDSHAKE_SIZE];
        socket
            .receive(&mut hello)
            .map_err(|err| TransportError::Handshake(format!("unable to read handshake: {err}")))?;
        socket.set_read_timeout(None)?;
        let mut hello = &hello[..];
        let party_id = hello.get_u32_le();
        let index = hello.get_u32_le() as usize;

        let channels = slots
            .get_mut(&party_id)
            .ok_or_else(|| TransportError::Handshake(format!("unknown party {party_id}")))?;
        let slot = channels.get_mut(index).ok_or_else(|| {
            TransportError::Handshake(format!(
                "party {party_id} sent channel index {index}, expected less than {num_channels}"
            ))
        })?;
        if slot.is_some() {
            return Err(TransportError::Handshake(format!(
                "party {party_id} connected channel {index} twice"
            )));
        }
        debug!(party_id, index, "accepted channel");
        *slot = Some(socket);
    }
    // every slot was filled exactly once above
    Ok(slots
        .into_iter()
        .map(|(party_id, channels)| (party_id, channels.into_iter().flatten().collect()))
        .collect())
}

fn check_num_channels(num_channels: usize) -> Result<(), TransportError> {
    // the last id is reserved for the admin channel
    let max = MAX_NUM_COMM_CHANNELS - 1;
    match num_channels {
        0 => Err(TransportError::NoChannels),
        n if n > max => Err(TransportError::TooManyChannels { requested: n, max }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_num_channels() {
        assert!(matches!(
            check_num_channels(0),
            Err(TransportError::NoChannels)
        ));
        assert!(check_num_channels(1).is_ok());
        assert!(check_num_channels(255).is_ok());
        assert!(matches!(
            check_num_channels(256),
            Err(TransportError::TooManyChannels {
                requested: 256,
                max: 255
            })
        ));
    }
}
