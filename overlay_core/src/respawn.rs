//! Respawn wave state shared between the announcement and the spawn routine.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use crate::config::{OverlayConfig, TeamSpec};
use crate::ids::{PlayerId, RoleId, Team};

/// Host-side knowledge about one spawnable team.
pub trait TeamHandler: fmt::Debug + Send + Sync {
    fn max_wave_size(&self) -> usize;

    /// Refill `queue` with the roles for a wave of `player_count` players.
    fn generate_queue(&self, queue: &mut VecDeque<RoleId>, player_count: usize);
}

/// Leader first, then the squad roles repeated in order.
#[derive(Debug, Clone, PartialEq)]
pub struct CyclicTeamHandler {
    max_wave_size: usize,
    leader_role: Option<RoleId>,
    roles: Vec<RoleId>,
}

impl CyclicTeamHandler {
    pub fn new(max_wave_size: usize, leader_role: Option<RoleId>, roles: Vec<RoleId>) -> Self {
        Self {
            max_wave_size,
            leader_role,
            roles,
        }
    }

    pub fn from_spec(spec: &TeamSpec) -> Self {
        Self::new(
            spec.max_wave_size,
            spec.leader_role.clone(),
            spec.roles.clone(),
        )
    }
}

impl TeamHandler for CyclicTeamHandler {
    fn max_wave_size(&self) -> usize {
        self.max_wave_size
    }

    /// Produces exactly `player_count` roles unless there are no squad roles,
    /// in which case only the leader (if any) is queued.
    fn generate_queue(&self, queue: &mut VecDeque<RoleId>, player_count: usize) {
        queue.clear();
        if player_count == 0 {
            return;
        }
        if let Some(leader) = &self.leader_role {
            queue.push_back(leader.clone());
        }
        let mut squad = self.roles.iter().cycle();
        while queue.len() < player_count {
            match squad.next() {
                Some(role) => queue.push_back(role.clone()),
                None => break,
            }
        }
    }
}

/// Team lookup used by respawn waves.
#[derive(Debug, Clone, Default)]
pub struct TeamHandlerRegistry {
    handlers: HashMap<Team, Arc<dyn TeamHandler>>,
}

impl TeamHandlerRegistry {
    pub fn from_config(config: &OverlayConfig) -> Self {
        let mut registry = Self::default();
        for (team, spec) in &config.teams {
            registry.insert(team.clone(), CyclicTeamHandler::from_spec(spec));
        }
        registry
    }

    pub fn insert(&mut self, team: Team, handler: impl TeamHandler + 'static) {
        self.handlers.insert(team, Arc::new(handler));
    }

    pub fn get(&self, team: &Team) -> Option<Arc<dyn TeamHandler>> {
        self.handlers.get(team).cloned()
    }

    pub fn contains(&self, team: &Team) -> bool {
        self.handlers.contains_key(team)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// One batch of players about to respawn as `next_known_team`.
///
/// `players.len() <= maximum_respawn_amount` holds after every method. The
/// wave is consumed once by [`RespawnWave::into_assignments`].
#[derive(Debug, Clone)]
pub struct RespawnWave {
    players: Vec<PlayerId>,
    next_known_team: Team,
    maximum_respawn_amount: usize,
    spawn_queue: VecDeque<RoleId>,
    handlers: Arc<TeamHandlerRegistry>,
}

impl RespawnWave {
    /// Build a wave sized and queued by the team's handler.
    pub fn new(players: Vec<PlayerId>, team: Team, handlers: Arc<TeamHandlerRegistry>) -> Self {
        let maximum_respawn_amount = players.len();
        let mut wave = Self {
            players,
            next_known_team: team.clone(),
            maximum_respawn_amount,
            spawn_queue: VecDeque::new(),
            handlers,
        };
        wave.set_next_known_team(team);
        wave
    }

    /// Build a wave from state the host already computed. Players beyond
    /// `maximum_respawn_amount` are dropped.
    pub fn from_parts(
        mut players: Vec<PlayerId>,
        team: Team,
        maximum_respawn_amount: usize,
        spawn_queue: VecDeque<RoleId>,
        handlers: Arc<TeamHandlerRegistry>,
    ) -> Self {
        players.truncate(maximum_respawn_amount);
        Self {
            players,
            next_known_team: team,
            maximum_respawn_amount,
            spawn_queue,
            handlers,
        }
    }

    pub fn players(&self) -> &[PlayerId] {
        &self.players
    }

    pub fn next_known_team(&self) -> &Team {
        &self.next_known_team
    }

    pub fn maximum_respawn_amount(&self) -> usize {
        self.maximum_respawn_amount
    }

    pub fn spawn_queue(&self) -> &VecDeque<RoleId> {
        &self.spawn_queue
    }

    /// Shrinking below the current player count drops players from the tail.
    /// Growing never brings players back.
    pub fn set_maximum_respawn_amount(&mut self, value: usize) {
        if value < self.maximum_respawn_amount && self.players.len() > value {
            let dropped = self.players.len() - value;
            self.players.truncate(value);
            tracing::debug!(
                target: "overlay::respawn",
                team = %self.next_known_team,
                maximum = value,
                dropped,
                "respawn.players_truncated"
            );
        }
        self.maximum_respawn_amount = value;
    }

    /// Switch the wave to `team`, resizing it and regenerating the role queue.
    ///
    /// An unrecognised team cannot respawn anyone: the maximum becomes `0`
    /// and the queue is left as it was.
    pub fn set_next_known_team(&mut self, team: Team) {
        self.next_known_team = team;
        let Some(handler) = self.current_team_handler() else {
            tracing::debug!(
                target: "overlay::respawn",
                team = %self.next_known_team,
                "respawn.unknown_team"
            );
            self.set_maximum_respawn_amount(0);
            return;
        };
        self.set_maximum_respawn_amount(handler.max_wave_size());
        handler.generate_queue(&mut self.spawn_queue, self.players.len());
    }

    pub fn current_team_handler(&self) -> Option<Arc<dyn TeamHandler>> {
        self.handlers.get(&self.next_known_team)
    }

    /// Add a player if the wave has room. The queue is regenerated when the
    /// player count outgrows it.
    pub fn add_player(&mut self, player: PlayerId) -> bool {
        if self.players.len() >= self.maximum_respawn_amount || self.players.contains(&player) {
            return false;
        }
        self.players.push(player);
        if self.players.len() > self.spawn_queue.len() {
            if let Some(handler) = self.current_team_handler() {
                handler.generate_queue(&mut self.spawn_queue, self.players.len());
            }
        }
        true
    }

    pub fn remove_player(&mut self, player: PlayerId) -> bool {
        match self.players.iter().position(|entry| *entry == player) {
            Some(index) => {
                self.players.remove(index);
                true
            }
            None => false,
        }
    }

    /// Replace the role queue by hand.
    pub fn set_spawn_queue(&mut self, roles: impl IntoIterator<Item = RoleId>) {
        self.spawn_queue = roles.into_iter().collect();
    }

    pub fn next_role(&mut self) -> Option<RoleId> {
        self.spawn_queue.pop_front()
    }

    /// Pair players with roles in queue order. Players left without a role
    /// are not spawned.
    pub fn into_assignments(self) -> Vec<(PlayerId, RoleId)> {
        self.players.into_iter().zip(self.spawn_queue).collect()
    }
}
