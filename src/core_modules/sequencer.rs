// THEORY:
// The sequencer is the thin seam between the mode dispatcher and the phase
// engine. It holds at most one current phase and guarantees the calling order
// phases rely on: the outgoing phase is finished exactly once before the
// incoming one is initialized, and ticks only reach an initialized phase.
//
// Phase identifiers arriving as raw integers are validated eagerly; an unknown
// id is a programming error and is returned as `PhaseError::UnknownPhase`
// rather than ignored.

use crate::config::TargetingConfig;
use crate::core_modules::actuators::{Actuators, Status};
use crate::core_modules::phase::{FailurePolicy, Phase};
use crate::core_modules::tasks::TaskSpec;
use crate::error::PhaseError;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhaseKind {
    Autonomous,
    Teleop,
    Climb,
}

impl PhaseKind {
    pub fn id(self) -> i32 {
        match self {
            PhaseKind::Autonomous => 0,
            PhaseKind::Teleop => 1,
            PhaseKind::Climb => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PhaseKind::Autonomous => "autonomous",
            PhaseKind::Teleop => "teleop",
            PhaseKind::Climb => "climb",
        }
    }
}

impl TryFrom<i32> for PhaseKind {
    type Error = PhaseError;

    fn try_from(id: i32) -> Result<Self, Self::Error> {
        match id {
            0 => Ok(PhaseKind::Autonomous),
            1 => Ok(PhaseKind::Teleop),
            2 => Ok(PhaseKind::Climb),
            other => Err(PhaseError::UnknownPhase(other)),
        }
    }
}

/// Default task plans for each phase.
#[derive(Debug, Clone)]
pub struct PhasePlans {
    pub autonomous: Vec<TaskSpec>,
    pub teleop: Vec<TaskSpec>,
    pub climb: Vec<TaskSpec>,
}

impl PhasePlans {
    /// Autonomous: spin the shooter up and raise it for a mid-field shot, then
    /// wait for the wheel before handing over. Each step gives up after the
    /// configured setpoint timeout.
    pub fn standard(targeting: &TargetingConfig) -> Self {
        let mid_field = 200.0;
        let timeout = targeting.setpoint_timeout();
        let angle = targeting.angle_table.lookup(mid_field).unwrap_or_default();
        let rpm = targeting.speed_table.lookup(mid_field).unwrap_or_default();
        Self {
            autonomous: vec![
                TaskSpec::SetShooterSpeed {
                    rpm,
                    tolerance: targeting.speed_tolerance_rpm,
                    timeout,
                },
                TaskSpec::SetShooterAngle {
                    degrees: angle,
                    tolerance: targeting.angle_tolerance_degrees,
                    timeout,
                },
                TaskSpec::AwaitStatus {
                    status: Status::ShooterAtSpeed,
                    timeout,
                },
            ],
            teleop: Vec::new(),
            climb: vec![TaskSpec::AwaitStatus {
                status: Status::WinchInPosition,
                timeout: Duration::ZERO,
            }],
        }
    }

    pub fn plan(&self, kind: PhaseKind) -> Vec<TaskSpec> {
        match kind {
            PhaseKind::Autonomous => self.autonomous.clone(),
            PhaseKind::Teleop => self.teleop.clone(),
            PhaseKind::Climb => self.climb.clone(),
        }
    }
}

#[derive(Debug)]
pub struct Sequencer {
    actuators: Arc<dyn Actuators>,
    plans: PhasePlans,
    current: Option<(PhaseKind, Phase)>,
}

impl Sequencer {
    pub fn new(actuators: Arc<dyn Actuators>, plans: PhasePlans) -> Self {
        Self {
            actuators,
            plans,
            current: None,
        }
    }

    /// Builds the phase for `kind` from the configured plans.
    pub fn build_phase(&self, kind: PhaseKind) -> Phase {
        let policy = match kind {
            // autonomous stops at the first missed setpoint
            PhaseKind::Autonomous => FailurePolicy::Abort,
            PhaseKind::Teleop | PhaseKind::Climb => FailurePolicy::Continue,
        };
        Phase::new(kind.name(), self.plans.plan(kind), Arc::clone(&self.actuators))
            .with_failure_policy(policy)
    }

    /// Finishes the current phase (if any) and initializes `kind`.
    pub fn segue_to(&mut self, kind: PhaseKind) {
        let phase = self.build_phase(kind);
        self.segue_to_phase(kind, phase);
    }

    /// Same as `segue_to` for a raw phase id.
    pub fn segue_to_id(&mut self, id: i32) -> Result<(), PhaseError> {
        let kind = PhaseKind::try_from(id)?;
        self.segue_to(kind);
        Ok(())
    }

    /// Installs a caller-built phase.
    pub fn segue_to_phase(&mut self, kind: PhaseKind, mut phase: Phase) {
        if let Some((previous, mut outgoing)) = self.current.take() {
            info!(from = previous.name(), to = kind.name(), "segue");
            outgoing.finish_phase();
        }
        phase.init_phase();
        self.current = Some((kind, phase));
    }

    /// Finishes the current phase without starting another.
    pub fn end_phase(&mut self) -> Result<(), PhaseError> {
        let (_, mut phase) = self.current.take().ok_or(PhaseError::NoActivePhase)?;
        phase.finish_phase();
        Ok(())
    }

    /// Forwards one control tick to the current phase.
    pub fn tick(&mut self) {
        if let Some((_, phase)) = self.current.as_mut() {
            phase.update_phase();
        }
    }

    pub fn current_kind(&self) -> Option<PhaseKind> {
        self.current.as_ref().map(|(kind, _)| *kind)
    }

    pub fn current_phase(&self) -> Option<&Phase> {
        self.current.as_ref().map(|(_, phase)| phase)
    }
}
