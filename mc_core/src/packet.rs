//! Photon packet (`spec.md` §3 "Packet"): the single mutable record the
//! transport engine advances to a terminal state.
//!
//! Grounded in shape on `kernels/src/lib.rs`'s `Photon`/ray-payload record
//! (teacher, on the GPU side): position, direction, and a throughput/weight
//! carried frame-to-frame. Extended here with the medium stack, Raman state,
//! and terminal-state bookkeeping the spec's packet model adds, since the
//! teacher's path tracer has no notion of a packet "living inside" a medium
//! across bounces.

use crate::material::OpticalProperties;
use crate::vecmath::Vec3;

/// `-1` (aether) is represented as `None` on the stack top; any `Some(index)`
/// is an entity index into `Scene::entities`.
pub type MediumId = Option<usize>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketState {
    Alive,
    Escaped,
    AbsorbedCcd,
    AbsorbedSpectrometer,
    Rouletted,
    ZeroWeight,
    LoopLimit,
    BadStart,
}

impl PacketState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, PacketState::Alive)
    }
}

/// One path-record sample, kept only when the scene enables path archiving.
#[derive(Debug, Clone, Copy)]
pub struct PathSample {
    pub position: Vec3,
    pub weight: f64,
}

#[derive(Debug, Clone)]
pub struct Packet {
    pub position: Vec3,
    pub direction: Vec3,
    pub wavelength: f64,
    pub weight: f64,
    pub medium_stack: Vec<MediumId>,
    pub optical: OpticalProperties,
    pub time_of_flight: f64,
    pub loop_count: u64,
    pub state: PacketState,
    pub raman_shifted: bool,
    pub raman_depth: Option<u64>,
    pub path: Option<Vec<PathSample>>,
}

impl Packet {
    pub fn new(
        position: Vec3,
        direction: Vec3,
        wavelength: f64,
        aether_optical: OpticalProperties,
        record_path: bool,
    ) -> Self {
        Self {
            position,
            direction,
            wavelength,
            weight: 1.0,
            medium_stack: vec![None],
            optical: aether_optical,
            time_of_flight: 0.0,
            loop_count: 0,
            state: PacketState::Alive,
            raman_shifted: false,
            raman_depth: None,
            path: if record_path { Some(Vec::new()) } else { None },
        }
    }

    pub fn current_medium(&self) -> MediumId {
        *self.medium_stack.last().unwrap_or(&None)
    }

    pub fn push_medium(&mut self, id: usize) {
        self.medium_stack.push(Some(id));
    }

    pub fn pop_medium(&mut self) -> Option<MediumId> {
        self.medium_stack.pop()
    }

    pub fn is_alive(&self) -> bool {
        self.state == PacketState::Alive
    }

    pub fn kill(&mut self, state: PacketState) {
        debug_assert!(state.is_terminal());
        self.state = state;
    }

    pub fn record_path_point(&mut self) {
        if let Some(path) = &mut self.path {
            path.push(PathSample {
                position: self.position,
                weight: self.weight,
            });
        }
    }
}
