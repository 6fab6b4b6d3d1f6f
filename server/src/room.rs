use chrono::{DateTime, Utc};
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, RwLock};

use crate::messages::{ParticipantInfo, ServerMessage};
use crate::metrics;
use crate::texts;

const MAX_PARTICIPANTS: usize = 2;
const MAX_CODE_ATTEMPTS: usize = 32;

/// Empty rooms older than this are evicted by the idle sweep.
const IDLE_GRACE_SECONDS: i64 = 60;

// ============================================================================
// Errors
// ============================================================================

/// Recoverable command failures. The session gateway turns these into
/// an error event for the originating connection; room state is never
/// mutated on the failure path.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RoomError {
    #[error("Room not found")]
    NotFound,
    #[error("Room is full")]
    Full,
    #[error("Command not valid in the current race phase")]
    IllegalPhase,
    #[error("Not authorized for this room")]
    Unauthorized,
    #[error("Already in a room")]
    AlreadyInRoom,
    #[error("Could not allocate a free room code")]
    CodeSpaceExhausted,
}

// ============================================================================
// State Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Waiting,
    Racing,
    Finished,
}

#[derive(Debug)]
pub struct Participant {
    pub id: String,
    pub name: String,
    pub tx: mpsc::UnboundedSender<ServerMessage>,
    pub typed_text: String,
    pub progress: f64,
    pub wpm: u32,
    pub accuracy: u32,
    pub finished: bool,
}

impl Participant {
    pub fn new(id: String, name: String, tx: mpsc::UnboundedSender<ServerMessage>) -> Self {
        Participant {
            id,
            name,
            tx,
            typed_text: String::new(),
            progress: 0.0,
            wpm: 0,
            accuracy: 100,
            finished: false,
        }
    }

    fn reset(&mut self) {
        self.typed_text.clear();
        self.progress = 0.0;
        self.wpm = 0;
        self.accuracy = 100;
        self.finished = false;
    }

    pub fn info(&self) -> ParticipantInfo {
        ParticipantInfo {
            id: self.id.clone(),
            name: self.name.clone(),
            progress: self.progress,
            wpm: self.wpm,
            accuracy: self.accuracy,
            finished: self.finished,
        }
    }
}

/// What a typed-text snapshot did to the room, so the registry knows
/// which events to fan out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotOutcome {
    /// Snapshot arrived outside `Racing` or from an unknown
    /// participant. Dropped without touching state.
    Ignored,
    Progress,
    Finished { race_over: bool },
}

#[derive(Debug)]
pub struct Room {
    pub code: String,
    /// Join order; the first participant holds creator authority.
    pub participants: Vec<Participant>,
    /// Empty until a race starts, immutable while `Racing`.
    pub reference_text: String,
    pub race_start_time: Option<DateTime<Utc>>,
    pub winner_id: Option<String>,
    pub phase: Phase,
    pub last_activity: DateTime<Utc>,
}

impl Room {
    fn new(code: String) -> Self {
        Room {
            code,
            participants: Vec::new(),
            reference_text: String::new(),
            race_start_time: None,
            winner_id: None,
            phase: Phase::Waiting,
            last_activity: Utc::now(),
        }
    }

    pub fn creator_id(&self) -> Option<&str> {
        self.participants.first().map(|p| p.id.as_str())
    }

    /// Appends a participant and returns their seat number (1-based).
    fn add_participant(&mut self, participant: Participant) -> Result<usize, RoomError> {
        if self.participants.len() >= MAX_PARTICIPANTS {
            return Err(RoomError::Full);
        }
        self.participants.push(participant);
        self.last_activity = Utc::now();
        Ok(self.participants.len())
    }

    fn remove_participant(&mut self, participant_id: &str) -> Option<Participant> {
        let index = self
            .participants
            .iter()
            .position(|p| p.id == participant_id)?;
        let removed = self.participants.remove(index);
        // A race cannot continue (or stand concluded, since winner_id
        // must reference a seated participant) with one player; put the
        // room back in the lobby so the remaining player can rematch.
        if self.phase != Phase::Waiting {
            self.clear_race_state();
            self.phase = Phase::Waiting;
        }
        self.last_activity = Utc::now();
        Some(removed)
    }

    /// Creator-only. Picks a reference text, zeroes everyone and flips
    /// the room to `Racing`.
    fn start_race(&mut self, requester_id: &str) -> Result<(), RoomError> {
        if self.phase != Phase::Waiting || self.participants.len() != MAX_PARTICIPANTS {
            return Err(RoomError::IllegalPhase);
        }
        if self.creator_id() != Some(requester_id) {
            return Err(RoomError::Unauthorized);
        }
        self.reference_text = texts::pick().to_string();
        self.race_start_time = Some(Utc::now());
        self.winner_id = None;
        for participant in &mut self.participants {
            participant.reset();
        }
        self.phase = Phase::Racing;
        self.last_activity = Utc::now();
        Ok(())
    }

    /// Stores the raw snapshot and recomputes all derived metrics from
    /// it. First participant to reproduce the reference text exactly
    /// becomes the winner; the room finishes once everyone has.
    fn apply_snapshot(&mut self, participant_id: &str, typed_text: String) -> SnapshotOutcome {
        if self.phase != Phase::Racing {
            return SnapshotOutcome::Ignored;
        }
        let Some(start_time) = self.race_start_time else {
            return SnapshotOutcome::Ignored;
        };
        let Some(index) = self
            .participants
            .iter()
            .position(|p| p.id == participant_id)
        else {
            return SnapshotOutcome::Ignored;
        };

        let elapsed_seconds = (Utc::now() - start_time).num_milliseconds() as f64 / 1000.0;
        let typed_len = typed_text.chars().count();
        let reference_len = self.reference_text.chars().count();
        let progress = metrics::progress_percent(typed_len, reference_len);
        let wpm = metrics::words_per_minute(&typed_text, elapsed_seconds);
        let accuracy = metrics::accuracy_percent(&typed_text, &self.reference_text);
        let completed = typed_text == self.reference_text;

        let was_finished = self.participants[index].finished;
        {
            let participant = &mut self.participants[index];
            participant.typed_text = typed_text;
            participant.progress = progress;
            participant.wpm = wpm;
            participant.accuracy = accuracy;
            if completed {
                participant.finished = true;
            }
        }
        self.last_activity = Utc::now();

        if completed && !was_finished {
            if self.winner_id.is_none() {
                self.winner_id = Some(participant_id.to_string());
            }
            let race_over = self.participants.iter().all(|p| p.finished);
            if race_over {
                self.phase = Phase::Finished;
            }
            return SnapshotOutcome::Finished { race_over };
        }
        SnapshotOutcome::Progress
    }

    /// Valid from any phase.
    fn reset_race(&mut self) {
        self.clear_race_state();
        self.phase = Phase::Waiting;
        self.last_activity = Utc::now();
    }

    fn clear_race_state(&mut self) {
        self.reference_text.clear();
        self.race_start_time = None;
        self.winner_id = None;
        for participant in &mut self.participants {
            participant.reset();
        }
    }

    fn broadcast(&self, message: ServerMessage) {
        for participant in &self.participants {
            let _ = participant.tx.send(message.clone());
        }
    }

    pub fn roster(&self) -> Vec<ParticipantInfo> {
        self.participants.iter().map(|p| p.info()).collect()
    }

    fn participant_info(&self, participant_id: &str) -> Option<ParticipantInfo> {
        self.participants
            .iter()
            .find(|p| p.id == participant_id)
            .map(|p| p.info())
    }

    fn is_member(&self, participant_id: &str) -> bool {
        self.participants.iter().any(|p| p.id == participant_id)
    }

    fn is_expired(&self) -> bool {
        let idle = Utc::now() - self.last_activity;
        self.participants.is_empty() && idle.num_seconds() >= IDLE_GRACE_SECONDS
    }
}

// ============================================================================
// Room Registry
// ============================================================================

pub type Rooms = Arc<RwLock<HashMap<String, Room>>>;
pub type MembershipMap = Arc<RwLock<HashMap<String, String>>>;

/// Owns every room in the process. One registry is constructed at
/// startup and handed to the session gateway; tests build their own.
#[derive(Clone)]
pub struct RoomRegistry {
    rooms: Rooms,
    /// participant id -> room code, for disconnect cleanup.
    memberships: MembershipMap,
}

impl RoomRegistry {
    pub fn new() -> Self {
        RoomRegistry {
            rooms: Arc::new(RwLock::new(HashMap::new())),
            memberships: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Periodically evicts rooms that have sat empty past the grace
    /// period. Emptied rooms are normally deleted on disconnect; this
    /// catches the ones whose cleanup never ran.
    pub fn spawn_idle_sweep(&self) {
        let rooms = self.rooms.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(std::time::Duration::from_secs(10)).await;
                let mut rooms = rooms.write().await;
                rooms.retain(|code, room| {
                    let keep = !room.is_expired();
                    if !keep {
                        log::info!("Room {} expired, evicting", code);
                    }
                    keep
                });
            }
        });
    }

    pub async fn create_room(
        &self,
        participant_id: String,
        player_name: String,
        tx: mpsc::UnboundedSender<ServerMessage>,
    ) -> Result<(String, Vec<ParticipantInfo>), RoomError> {
        self.ensure_unseated(&participant_id).await?;

        let mut rooms = self.rooms.write().await;
        let room_code = allocate_room_code(&rooms)?;

        let mut room = Room::new(room_code.clone());
        room.add_participant(Participant::new(participant_id.clone(), player_name.clone(), tx))?;
        let roster = room.roster();
        rooms.insert(room_code.clone(), room);
        drop(rooms);

        let mut memberships = self.memberships.write().await;
        memberships.insert(participant_id, room_code.clone());

        log::info!("Room {} created by {}", room_code, player_name);
        Ok((room_code, roster))
    }

    pub async fn join_room(
        &self,
        room_code: &str,
        participant_id: String,
        player_name: String,
        tx: mpsc::UnboundedSender<ServerMessage>,
    ) -> Result<(), RoomError> {
        self.ensure_unseated(&participant_id).await?;

        let mut rooms = self.rooms.write().await;
        let room = rooms.get_mut(room_code).ok_or(RoomError::NotFound)?;

        let seat = room.add_participant(Participant::new(
            participant_id.clone(),
            player_name.clone(),
            tx,
        ))?;
        let creator = room.creator_id().unwrap_or_default().to_string();
        room.broadcast(ServerMessage::PlayerJoined {
            players: room.roster(),
            player_number: seat,
            creator,
        });
        drop(rooms);

        let mut memberships = self.memberships.write().await;
        memberships.insert(participant_id, room_code.to_string());

        log::info!("{} joined room {}", player_name, room_code);
        Ok(())
    }

    pub async fn start_race(
        &self,
        room_code: &str,
        participant_id: &str,
    ) -> Result<(), RoomError> {
        let mut rooms = self.rooms.write().await;
        let room = rooms.get_mut(room_code).ok_or(RoomError::NotFound)?;

        room.start_race(participant_id)?;
        room.broadcast(ServerMessage::RaceStarted {
            text_to_type: room.reference_text.clone(),
            players: room.roster(),
        });

        log::info!("Race started in room {}", room_code);
        Ok(())
    }

    pub async fn apply_typed_snapshot(
        &self,
        room_code: &str,
        participant_id: &str,
        typed_text: String,
    ) -> Result<(), RoomError> {
        let mut rooms = self.rooms.write().await;
        let room = rooms.get_mut(room_code).ok_or(RoomError::NotFound)?;

        match room.apply_snapshot(participant_id, typed_text) {
            SnapshotOutcome::Ignored => {}
            SnapshotOutcome::Progress => {
                room.broadcast(ServerMessage::ProgressUpdate {
                    players: room.roster(),
                });
            }
            SnapshotOutcome::Finished { race_over } => {
                if let Some(stats) = room.participant_info(participant_id) {
                    room.broadcast(ServerMessage::PlayerFinished {
                        player_id: participant_id.to_string(),
                        stats,
                    });
                }
                if race_over {
                    if let Some(winner) = room.winner_id.clone() {
                        room.broadcast(ServerMessage::RaceFinished {
                            winner,
                            players: room.roster(),
                        });
                        log::info!("Race finished in room {}", room_code);
                    }
                }
            }
        }
        Ok(())
    }

    pub async fn reset_race(
        &self,
        room_code: &str,
        participant_id: &str,
    ) -> Result<(), RoomError> {
        let mut rooms = self.rooms.write().await;
        let room = rooms.get_mut(room_code).ok_or(RoomError::NotFound)?;
        if !room.is_member(participant_id) {
            return Err(RoomError::Unauthorized);
        }

        room.reset_race();
        room.broadcast(ServerMessage::RaceReset {
            players: room.roster(),
        });

        log::info!("Race reset in room {}", room_code);
        Ok(())
    }

    /// A connection holds at most one seat. Seating it again without
    /// leaving first would orphan the old participant record: the
    /// membership entry is the only route disconnect cleanup follows.
    async fn ensure_unseated(&self, participant_id: &str) -> Result<(), RoomError> {
        let memberships = self.memberships.read().await;
        if memberships.contains_key(participant_id) {
            return Err(RoomError::AlreadyInRoom);
        }
        Ok(())
    }

    /// Disconnect cleanup. Not an error path: departure is a normal
    /// state transition, broadcast to whoever remains.
    pub async fn remove_participant(&self, participant_id: &str) {
        let mut memberships = self.memberships.write().await;
        let Some(room_code) = memberships.remove(participant_id) else {
            return;
        };
        drop(memberships);

        let mut rooms = self.rooms.write().await;
        if let Some(room) = rooms.get_mut(&room_code) {
            room.remove_participant(participant_id);
            if room.participants.is_empty() {
                rooms.remove(&room_code);
                log::info!("Room {} deleted", room_code);
            } else {
                room.broadcast(ServerMessage::PlayerLeft {
                    players: room.roster(),
                });
            }
        }
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Identifiers
// ============================================================================

const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const ROOM_CODE_LEN: usize = 6;

/// Connection identity, unique for the connection's lifetime.
pub fn generate_participant_id() -> String {
    let bytes: [u8; 8] = rand::rng().random();
    bytes.iter().map(|b| format!("{:02X}", b)).collect()
}

fn generate_room_code() -> String {
    let mut rng = rand::rng();
    (0..ROOM_CODE_LEN)
        .map(|_| ROOM_CODE_ALPHABET[rng.random_range(0..ROOM_CODE_ALPHABET.len())] as char)
        .collect()
}

fn allocate_room_code(rooms: &HashMap<String, Room>) -> Result<String, RoomError> {
    for _ in 0..MAX_CODE_ATTEMPTS {
        let code = generate_room_code();
        if !rooms.contains_key(&code) {
            return Ok(code);
        }
    }
    Err(RoomError::CodeSpaceExhausted)
}
