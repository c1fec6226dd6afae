// Per-agent behaviour state machine and the shared attack-slot coordinator.
//
// The brain only decides; it never moves anything. Systems read its state
// to pick a path goal, a speed and whether steering runs at all.

use std::collections::HashSet;

use bevy_ecs::prelude::*;
use glam::Vec3;
use rand::Rng;

use super::config::{AgentConfig, TacticsConfig};

// ============================================================================
// ATTACK COORDINATOR
// ============================================================================

/// Caps how many agents attack at once.
#[derive(Resource, Debug, Clone)]
pub struct AttackCoordinator {
    holders: HashSet<Entity>,
    max_concurrent: usize,
}

impl AttackCoordinator {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            holders: HashSet::new(),
            max_concurrent,
        }
    }

    /// Take a slot if one is free. Holding a slot already counts as success.
    pub fn try_acquire(&mut self, agent: Entity) -> bool {
        if self.holders.contains(&agent) {
            return true;
        }
        if self.holders.len() >= self.max_concurrent {
            return false;
        }
        self.holders.insert(agent)
    }

    /// Take a slot even past the cap.
    pub fn force_acquire(&mut self, agent: Entity) {
        self.holders.insert(agent);
    }

    /// Give the slot back. No-op for agents that hold none.
    pub fn release(&mut self, agent: Entity) {
        self.holders.remove(&agent);
    }

    pub fn holds(&self, agent: Entity) -> bool {
        self.holders.contains(&agent)
    }

    pub fn active(&self) -> usize {
        self.holders.len()
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }
}

impl Default for AttackCoordinator {
    fn default() -> Self {
        Self::new(AgentConfig::default().max_concurrent_attackers)
    }
}

// ============================================================================
// STATE MACHINE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AgentState {
    Idle,
    Patrol,
    Approach,
    /// Side-stepping around the target; `side` is +1 or -1.
    Strafe { remaining: f32, side: f32 },
    /// Backing away from the target.
    Retreat { remaining: f32 },
    /// Running in for an attack with a slot already held.
    Charge,
    /// Swinging at the target; `facing` is locked at attack start.
    Attack { remaining: f32, facing: Vec3 },
    Stunned { remaining: f32 },
}

impl AgentState {
    pub fn name(&self) -> &'static str {
        match self {
            AgentState::Idle => "idle",
            AgentState::Patrol => "patrol",
            AgentState::Approach => "approach",
            AgentState::Strafe { .. } => "strafe",
            AgentState::Retreat { .. } => "retreat",
            AgentState::Charge => "charge",
            AgentState::Attack { .. } => "attack",
            AgentState::Stunned { .. } => "stunned",
        }
    }

    /// States in which the agent moves at all.
    pub fn is_mobile(&self) -> bool {
        matches!(
            self,
            AgentState::Patrol
                | AgentState::Approach
                | AgentState::Strafe { .. }
                | AgentState::Retreat { .. }
                | AgentState::Charge
        )
    }
}

/// How an agent fights once it has noticed the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Style {
    /// Follow the path straight in and attack when allowed.
    #[default]
    Direct,
    /// Close in for a while, then strafe or back off before trying again.
    Skirmish,
    /// Stalk at a distance, circling, and charge in when a slot frees up.
    Pack,
}

/// What the agent knows about its target this tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sighting {
    pub distance: f32,
    /// Horizontal unit direction toward the target.
    pub direction: Vec3,
}

impl Sighting {
    pub fn between(from: Vec3, to: Vec3) -> Self {
        let delta = to - from;
        Self {
            distance: delta.length(),
            direction: Vec3::new(delta.x, 0.0, delta.z).normalize_or_zero(),
        }
    }
}

/// How the movement systems should move an agent this tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Motion {
    Still,
    /// Follow the current path, velocity scaled by `speed_scale`.
    FollowPath { speed_scale: f32 },
    /// Move with this velocity, ignoring the path.
    Direct(Vec3),
}

#[derive(Debug, Clone)]
pub struct Brain {
    state: AgentState,
    style: Style,
    /// Seconds until a normal attack is allowed again.
    cooldown: f32,
    decision_timer: f32,
    /// Skirmishers break off when this runs out.
    tactic_timer: f32,
    /// +1 or -1 once engaged; 0 before the first engagement.
    circle_dir: f32,
    patrols: bool,
    /// Set while an external action (hit reaction, knockback) is playing;
    /// a stun cannot end while it is set.
    pub action_locked: bool,
}

impl Brain {
    pub fn new(patrols: bool) -> Self {
        Self {
            state: Self::rest(patrols),
            style: Style::Direct,
            cooldown: 0.0,
            decision_timer: 0.0,
            tactic_timer: 0.0,
            circle_dir: 0.0,
            patrols,
            action_locked: false,
        }
    }

    pub fn with_style(mut self, style: Style) -> Self {
        self.style = style;
        self
    }

    fn rest(patrols: bool) -> AgentState {
        if patrols {
            AgentState::Patrol
        } else {
            AgentState::Idle
        }
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    pub fn style(&self) -> Style {
        self.style
    }

    pub fn set_style(&mut self, style: Style) {
        self.style = style;
    }

    pub fn cooldown(&self) -> f32 {
        self.cooldown
    }

    pub fn circle_dir(&self) -> f32 {
        self.circle_dir
    }

    /// True while the agent paths toward the target rather than moving
    /// relative to it.
    pub fn chases_target(&self) -> bool {
        match self.state {
            AgentState::Charge => true,
            AgentState::Approach => self.style != Style::Pack,
            _ => false,
        }
    }

    /// Drop whatever the agent was doing and stand still.
    pub fn halt(&mut self, agent: Entity, coordinator: Option<&mut AttackCoordinator>) {
        if let Some(coordinator) = coordinator {
            coordinator.release(agent);
        }
        if !matches!(self.state, AgentState::Stunned { .. }) {
            self.state = AgentState::Idle;
        }
    }

    /// Suspend the agent for `duration`. Any held attack slot is released.
    pub fn stun(&mut self, agent: Entity, duration: f32, coordinator: &mut AttackCoordinator) {
        coordinator.release(agent);
        let remaining = match self.state {
            AgentState::Stunned { remaining } => remaining.max(duration),
            _ => duration,
        };
        self.state = AgentState::Stunned { remaining };
    }

    /// Advance one tick. Returns the previous state when it changed.
    pub fn tick(
        &mut self,
        agent: Entity,
        sighting: Option<Sighting>,
        dt: f32,
        config: &AgentConfig,
        coordinator: &mut AttackCoordinator,
        rng: &mut impl Rng,
    ) -> Option<AgentState> {
        let before = self.state;
        self.cooldown = (self.cooldown - dt).max(0.0);
        self.state = self.next_state(agent, sighting, dt, config, coordinator, rng);
        (std::mem::discriminant(&before) != std::mem::discriminant(&self.state)).then_some(before)
    }

    /// Movement for the current state.
    pub fn motion(&self, sighting: Option<Sighting>, config: &AgentConfig) -> Motion {
        let tactics = &config.tactics;
        match (self.state, sighting) {
            (AgentState::Patrol, _) => Motion::FollowPath {
                speed_scale: config.patrol_speed_factor,
            },
            (AgentState::Charge, _) => Motion::FollowPath {
                speed_scale: if tactics.walk_speed > 0.0 {
                    tactics.run_speed / tactics.walk_speed
                } else {
                    1.0
                },
            },
            (AgentState::Approach, Some(sight)) if self.style == Style::Pack => {
                Motion::Direct(self.stalk(sight, tactics))
            }
            (AgentState::Approach, _) => Motion::FollowPath { speed_scale: 1.0 },
            (AgentState::Strafe { side, .. }, Some(sight)) => {
                Motion::Direct(sight.direction.cross(Vec3::Y) * side * tactics.strafe_speed)
            }
            (AgentState::Retreat { .. }, Some(sight)) => {
                Motion::Direct(-sight.direction * tactics.retreat_speed)
            }
            _ => Motion::Still,
        }
    }

    /// Hold `desired_range` from the target while circling it.
    fn stalk(&self, sight: Sighting, tactics: &TacticsConfig) -> Vec3 {
        let error = sight.distance - tactics.desired_range;
        let approach = sight.direction * error * tactics.approach_weight;
        let circle = Vec3::Y.cross(sight.direction) * self.circle_dir * tactics.circle_weight;
        ((approach + circle) * tactics.walk_speed).clamp_length_max(tactics.run_speed)
    }

    fn next_state(
        &mut self,
        agent: Entity,
        sighting: Option<Sighting>,
        dt: f32,
        config: &AgentConfig,
        coordinator: &mut AttackCoordinator,
        rng: &mut impl Rng,
    ) -> AgentState {
        let sight = match (self.state, sighting) {
            (AgentState::Stunned { remaining }, _) => {
                let remaining = remaining - dt;
                return if remaining <= 0.0 && !self.action_locked {
                    Self::rest(self.patrols)
                } else {
                    AgentState::Stunned { remaining }
                };
            }
            (_, None) => {
                coordinator.release(agent);
                return AgentState::Idle;
            }
            (_, Some(sight)) => sight,
        };
        let tactics = &config.tactics;
        let leashed = sight.distance > config.aggro_range * config.leash;

        match self.state {
            AgentState::Idle | AgentState::Patrol => {
                if sight.distance <= config.aggro_range {
                    self.engage(config, rng);
                    AgentState::Approach
                } else {
                    Self::rest(self.patrols)
                }
            }
            AgentState::Approach => {
                if leashed {
                    return Self::rest(self.patrols);
                }
                if sight.distance <= config.force_attack_radius {
                    coordinator.force_acquire(agent);
                    return self.begin_attack(sight, config);
                }
                self.decision_timer -= dt;
                let decide = self.decision_timer <= 0.0 && self.cooldown <= 0.0;

                if self.style == Style::Pack {
                    if decide {
                        self.decision_timer = config.attack_decision_interval;
                        if rng.gen_bool(config.attack_chance.clamp(0.0, 1.0))
                            && coordinator.try_acquire(agent)
                        {
                            return AgentState::Charge;
                        }
                    }
                    return AgentState::Approach;
                }

                if decide && sight.distance <= config.attack_distance {
                    self.decision_timer = config.attack_decision_interval;
                    if rng.gen_bool(config.attack_chance.clamp(0.0, 1.0))
                        && coordinator.try_acquire(agent)
                    {
                        return self.begin_attack(sight, config);
                    }
                }
                if self.style == Style::Skirmish {
                    self.tactic_timer -= dt;
                    if self.tactic_timer <= 0.0 {
                        return self.break_off(tactics, rng);
                    }
                }
                AgentState::Approach
            }
            AgentState::Strafe { remaining, side } => {
                let remaining = remaining - dt;
                if leashed {
                    Self::rest(self.patrols)
                } else if remaining <= 0.0 {
                    self.tactic_timer = tactics.approach_duration;
                    AgentState::Approach
                } else {
                    AgentState::Strafe { remaining, side }
                }
            }
            AgentState::Retreat { remaining } => {
                let remaining = remaining - dt;
                if leashed {
                    Self::rest(self.patrols)
                } else if remaining <= 0.0 {
                    self.tactic_timer = tactics.approach_duration;
                    AgentState::Approach
                } else {
                    AgentState::Retreat { remaining }
                }
            }
            AgentState::Charge => {
                if sight.distance <= config.attack_distance {
                    self.begin_attack(sight, config)
                } else if sight.distance > config.aggro_range {
                    coordinator.release(agent);
                    AgentState::Approach
                } else {
                    AgentState::Charge
                }
            }
            AgentState::Attack { remaining, facing } => {
                let remaining = remaining - dt;
                if remaining > 0.0 {
                    AgentState::Attack { remaining, facing }
                } else {
                    self.cooldown = config.attack_cooldown;
                    self.tactic_timer = tactics.approach_duration;
                    coordinator.release(agent);
                    AgentState::Approach
                }
            }
            // Returned early above.
            stunned @ AgentState::Stunned { .. } => stunned,
        }
    }

    /// Reset timers on first noticing the target.
    fn engage(&mut self, config: &AgentConfig, rng: &mut impl Rng) {
        self.decision_timer = config.attack_decision_interval;
        self.tactic_timer = config.tactics.approach_duration;
        if self.circle_dir == 0.0 {
            self.circle_dir = random_sign(rng);
        }
    }

    fn break_off(&self, tactics: &TacticsConfig, rng: &mut impl Rng) -> AgentState {
        if rng.gen_bool(0.5) {
            AgentState::Strafe {
                remaining: tactics.strafe_time,
                side: random_sign(rng),
            }
        } else {
            AgentState::Retreat {
                remaining: tactics.retreat_time,
            }
        }
    }

    fn begin_attack(&self, sight: Sighting, config: &AgentConfig) -> AgentState {
        AgentState::Attack {
            remaining: config.attack_duration,
            facing: sight.direction,
        }
    }
}

fn random_sign(rng: &mut impl Rng) -> f32 {
    if rng.gen_bool(0.5) { 1.0 } else { -1.0 }
}

impl Default for Brain {
    fn default() -> Self {
        Self::new(false)
    }
}
