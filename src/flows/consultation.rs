use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;
use uuid::Uuid;

pub const CONNECT_DELAY: Duration = Duration::from_secs(3);
pub const REPLY_DELAY: Duration = Duration::from_secs(2);
pub const DOCTOR_NAME: &str = "Dr. Priya Sharma";
pub const SCRIPTED_REPLY: &str = "Thank you for sharing that information. I understand your concern.";
/// Rooms untouched for this long are dropped by the maintenance sweep.
pub const ROOM_IDLE_TIMEOUT: Duration = Duration::from_secs(2 * 60 * 60);

#[derive(Error, Debug, PartialEq)]
pub enum ConsultationError {
    #[error("Consultation not found")]
    NotFound,
    #[error("Consultation has ended")]
    Ended,
    #[error("Message cannot be empty")]
    EmptyMessage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    Patient,
    Doctor,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChatMessage {
    pub id: u32,
    pub sender: Sender,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RoomSnapshot {
    pub id: String,
    pub doctor: &'static str,
    pub status: ConnectionStatus,
    pub audio_enabled: bool,
    pub video_enabled: bool,
    /// Set when camera or microphone access was denied; the room carries on
    /// with video off.
    pub media_notice: Option<String>,
    pub duration: String,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug)]
struct RoomState {
    status: ConnectionStatus,
    connected_at: Option<Instant>,
    final_secs: Option<u64>,
    audio_enabled: bool,
    video_enabled: bool,
    media_notice: Option<String>,
    messages: Vec<ChatMessage>,
    last_activity: Instant,
}

impl RoomState {
    fn elapsed_secs(&self) -> u64 {
        if let Some(secs) = self.final_secs {
            return secs;
        }
        self.connected_at.map(|at| at.elapsed().as_secs()).unwrap_or(0)
    }

    fn push(&mut self, sender: Sender, text: String) -> ChatMessage {
        let message = ChatMessage {
            id: self.messages.len() as u32 + 1,
            sender,
            text,
            timestamp: Utc::now(),
        };
        self.messages.push(message.clone());
        message
    }
}

pub fn format_duration(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// A simulated call with one doctor. Connection and chat replies are timed
/// stand-ins; nothing leaves the process and nothing is persisted.
#[derive(Clone)]
pub struct ConsultationRoom {
    id: String,
    state: Arc<Mutex<RoomState>>,
}

impl ConsultationRoom {
    /// Starts in `Connecting` and flips to `Connected` after the connect delay.
    pub fn open() -> Self {
        let room = Self {
            id: Uuid::new_v4().to_string(),
            state: Arc::new(Mutex::new(RoomState {
                status: ConnectionStatus::Connecting,
                connected_at: None,
                final_secs: None,
                audio_enabled: true,
                video_enabled: true,
                media_notice: None,
                messages: Vec::new(),
                last_activity: Instant::now(),
            })),
        };

        let state = room.state.clone();
        let room_id = room.id.clone();
        tokio::spawn(async move {
            tokio::time::sleep(CONNECT_DELAY).await;
            let mut state = state.lock().await;
            if state.status == ConnectionStatus::Connecting {
                state.status = ConnectionStatus::Connected;
                state.connected_at = Some(Instant::now());
                tracing::debug!(room_id = %room_id, "Consultation connected");
            }
        });

        room
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn snapshot(&self) -> RoomSnapshot {
        let state = self.state.lock().await;
        RoomSnapshot {
            id: self.id.clone(),
            doctor: DOCTOR_NAME,
            status: state.status,
            audio_enabled: state.audio_enabled,
            video_enabled: state.video_enabled,
            media_notice: state.media_notice.clone(),
            duration: format_duration(state.elapsed_secs()),
            messages: state.messages.clone(),
        }
    }

    pub async fn toggle_audio(&self) -> Result<bool, ConsultationError> {
        let mut state = self.state.lock().await;
        if state.status == ConnectionStatus::Ended {
            return Err(ConsultationError::Ended);
        }
        state.last_activity = Instant::now();
        state.audio_enabled = !state.audio_enabled;
        Ok(state.audio_enabled)
    }

    pub async fn toggle_video(&self) -> Result<bool, ConsultationError> {
        let mut state = self.state.lock().await;
        if state.status == ConnectionStatus::Ended {
            return Err(ConsultationError::Ended);
        }
        state.last_activity = Instant::now();
        if state.media_notice.is_some() {
            // no camera to turn back on
            return Ok(false);
        }
        state.video_enabled = !state.video_enabled;
        Ok(state.video_enabled)
    }

    /// Result of the client's camera/microphone permission prompt.
    pub async fn report_media_access(&self, granted: bool) -> Result<(), ConsultationError> {
        let mut state = self.state.lock().await;
        if state.status == ConnectionStatus::Ended {
            return Err(ConsultationError::Ended);
        }
        state.last_activity = Instant::now();
        if granted {
            state.media_notice = None;
        } else {
            tracing::warn!(room_id = %self.id, "Media access denied, continuing with video off");
            state.video_enabled = false;
            state.media_notice =
                Some("Unable to access camera or microphone. Please check permissions.".to_string());
        }
        Ok(())
    }

    /// Appends the patient's message now and the scripted reply after the
    /// reply delay.
    pub async fn send_message(&self, text: &str) -> Result<ChatMessage, ConsultationError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ConsultationError::EmptyMessage);
        }

        let message = {
            let mut state = self.state.lock().await;
            if state.status == ConnectionStatus::Ended {
                return Err(ConsultationError::Ended);
            }
            state.last_activity = Instant::now();
            state.push(Sender::Patient, text.to_string())
        };

        let state = self.state.clone();
        tokio::spawn(async move {
            tokio::time::sleep(REPLY_DELAY).await;
            let mut state = state.lock().await;
            if state.status != ConnectionStatus::Ended {
                state.push(Sender::Doctor, SCRIPTED_REPLY.to_string());
            }
        });

        Ok(message)
    }

    /// Stops the room and returns the final duration as `mm:ss`.
    pub async fn end(&self) -> Result<String, ConsultationError> {
        let mut state = self.state.lock().await;
        if state.status == ConnectionStatus::Ended {
            return Err(ConsultationError::Ended);
        }
        let secs = state.elapsed_secs();
        state.final_secs = Some(secs);
        state.status = ConnectionStatus::Ended;
        tracing::info!(room_id = %self.id, duration_secs = secs, "Consultation ended");
        Ok(format_duration(secs))
    }

    /// Ended rooms count as idle regardless of when they were last used.
    pub async fn is_idle(&self, max_idle: Duration) -> bool {
        let state = self.state.lock().await;
        state.status == ConnectionStatus::Ended || state.last_activity.elapsed() >= max_idle
    }
}

#[derive(Default)]
pub struct ConsultationRegistry {
    rooms: DashMap<String, ConsultationRoom>,
}

impl ConsultationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self) -> ConsultationRoom {
        let room = ConsultationRoom::open();
        self.rooms.insert(room.id().to_string(), room.clone());
        room
    }

    pub fn get(&self, id: &str) -> Result<ConsultationRoom, ConsultationError> {
        self.rooms
            .get(id)
            .map(|r| r.value().clone())
            .ok_or(ConsultationError::NotFound)
    }

    /// Ends the room and drops it from the registry.
    pub async fn end(&self, id: &str) -> Result<String, ConsultationError> {
        let room = self.get(id)?;
        let duration = room.end().await?;
        self.rooms.remove(id);
        Ok(duration)
    }

    /// Drops ended rooms and rooms idle for `max_idle`. Returns how many went.
    pub async fn purge_idle(&self, max_idle: Duration) -> usize {
        let rooms: Vec<ConsultationRoom> = self.rooms.iter().map(|r| r.value().clone()).collect();
        let mut removed = 0;
        for room in rooms {
            if room.is_idle(max_idle).await && self.rooms.remove(room.id()).is_some() {
                tracing::debug!(room_id = %room.id(), "Dropped idle consultation");
                removed += 1;
            }
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}
