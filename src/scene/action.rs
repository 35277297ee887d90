use glam::{vec3a, Vec3A};

/// Timed node animation. Offsets are in the parent's coordinate space.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Wait(f32),
    MoveBy { delta: Vec3A, duration: f32 },
    Sequence(Vec<Action>),
    RepeatForever(Box<Action>),
}

impl Action {
    pub fn wait(duration: f32) -> Self {
        Self::Wait(duration.max(0.))
    }

    pub fn move_by(x: f32, y: f32, z: f32, duration: f32) -> Self {
        Self::MoveBy {
            delta: vec3a(x, y, z),
            duration: duration.max(0.),
        }
    }

    pub fn sequence(actions: impl IntoIterator<Item = Action>) -> Self {
        Self::Sequence(actions.into_iter().collect())
    }

    pub fn repeat_forever(self) -> Self {
        Self::RepeatForever(Box::new(self))
    }

    /// Total running time, `None` if the action never ends on its own.
    pub fn duration(&self) -> Option<f32> {
        match self {
            Self::Wait(d) | Self::MoveBy { duration: d, .. } => Some(*d),
            Self::Sequence(actions) => actions.iter().map(Action::duration).sum(),
            Self::RepeatForever(_) => None,
        }
    }

    /// Translation once the action has completed. Unbounded actions report zero.
    pub fn total_offset(&self) -> Vec3A {
        match self {
            Self::Wait(_) | Self::RepeatForever(_) => Vec3A::ZERO,
            Self::MoveBy { delta, .. } => *delta,
            Self::Sequence(actions) => actions.iter().map(Action::total_offset).sum(),
        }
    }

    /// Period and per-cycle translation of a looping action with a finite body.
    fn loop_period(&self) -> Option<(f32, Vec3A)> {
        match self {
            Self::RepeatForever(inner) => inner
                .duration()
                .filter(|p| *p > 0.)
                .map(|p| (p, inner.total_offset())),
            _ => None,
        }
    }

    /// Accumulated translation `t` seconds after the action started.
    pub fn offset_at(&self, t: f32) -> Vec3A {
        match self {
            Self::Wait(_) => Vec3A::ZERO,
            Self::MoveBy { delta, duration } => {
                if *duration <= 0. {
                    return if t >= 0. { *delta } else { Vec3A::ZERO };
                }
                *delta * (t / duration).clamp(0., 1.)
            }
            Self::Sequence(actions) => {
                let mut offset = Vec3A::ZERO;
                let mut remaining = t;
                for action in actions {
                    match action.duration() {
                        Some(d) if remaining >= d => {
                            offset += action.total_offset();
                            remaining -= d;
                        }
                        _ => {
                            offset += action.offset_at(remaining);
                            break;
                        }
                    }
                }
                offset
            }
            Self::RepeatForever(inner) => {
                let Some(period) = inner.duration() else {
                    return inner.offset_at(t);
                };
                // an instantaneous body would loop without advancing time
                if period <= 0. || t < 0. {
                    return Vec3A::ZERO;
                }
                let cycles = (t / period).floor();
                let rem = t - cycles * period;
                inner.total_offset() * cycles + inner.offset_at(rem)
            }
        }
    }
}

/// An action attached to a node, tracking how much of its offset has been applied.
#[derive(Debug, Clone)]
pub struct RunningAction {
    action: Action,
    elapsed: f32,
    applied: Vec3A,
}

impl RunningAction {
    pub fn new(action: Action) -> Self {
        Self {
            action,
            elapsed: 0.,
            applied: Vec3A::ZERO,
        }
    }

    pub fn action(&self) -> &Action {
        &self.action
    }

    /// Advances by `dt` seconds and returns the translation to add to the node.
    pub fn advance(&mut self, dt: f32) -> Vec3A {
        self.elapsed += dt.max(0.);
        // looping time stays within one period
        if let Some((period, cycle_offset)) = self.action.loop_period() {
            if self.elapsed >= period {
                let wrapped = self.elapsed.rem_euclid(period);
                let cycles = ((self.elapsed - wrapped) / period).round();
                self.elapsed = wrapped;
                self.applied -= cycle_offset * cycles;
            }
        }
        let target = self.action.offset_at(self.elapsed);
        let delta = target - self.applied;
        self.applied = target;
        delta
    }

    pub fn is_finished(&self) -> bool {
        self.action
            .duration()
            .is_some_and(|d| self.elapsed >= d)
    }
}
