//! Local player pose tracking.

use mcproxy_proto::packets::Packet;
use mcproxy_proto::types::Vec3;

/// The proxied player's last known pose, fed from movement packets in both
/// directions. The capture layer uses it for spawn points and merge centers.
#[derive(Debug, Clone, Copy, Default)]
pub struct Player {
    pub position: Vec3,
    pub pitch: f32,
    pub yaw: f32,
    pub head_yaw: f32,
    pub runtime_id: u64,
}

impl Player {
    /// Update from a packet. Returns whether the pose changed.
    pub fn handle_packet(&mut self, pk: &Packet) -> bool {
        match pk {
            Packet::MovePlayer(mp) => {
                self.position = mp.position;
                self.pitch = mp.pitch;
                self.yaw = mp.yaw;
                self.head_yaw = mp.head_yaw;
                true
            }
            Packet::PlayerAuthInput(input) => {
                self.position = input.position;
                self.pitch = input.pitch;
                self.yaw = input.yaw;
                self.head_yaw = input.head_yaw;
                true
            }
            _ => false,
        }
    }
}
