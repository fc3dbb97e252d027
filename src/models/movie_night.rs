use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use super::{MovieId, MovieSummary};
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum GuestStatus {
    #[default]
    Pending,
    Confirmed,
    Declined,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Guest {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub status: GuestStatus,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MovieNightTheme {
    #[serde(rename = "Classic Movie Night")]
    ClassicMovieNight,
    #[serde(rename = "Horror Marathon")]
    HorrorMarathon,
    #[serde(rename = "Comedy Fest")]
    ComedyFest,
    #[serde(rename = "Action Adventure")]
    ActionAdventure,
    #[serde(rename = "Romantic Evening")]
    RomanticEvening,
    #[serde(rename = "Sci-Fi Journey")]
    SciFiJourney,
    #[serde(rename = "Documentary Night")]
    DocumentaryNight,
    #[serde(rename = "Family Fun")]
    FamilyFun,
}

impl MovieNightTheme {
    const ALL: [MovieNightTheme; 8] = [
        MovieNightTheme::ClassicMovieNight,
        MovieNightTheme::HorrorMarathon,
        MovieNightTheme::ComedyFest,
        MovieNightTheme::ActionAdventure,
        MovieNightTheme::RomanticEvening,
        MovieNightTheme::SciFiJourney,
        MovieNightTheme::DocumentaryNight,
        MovieNightTheme::FamilyFun,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MovieNightTheme::ClassicMovieNight => "Classic Movie Night",
            MovieNightTheme::HorrorMarathon => "Horror Marathon",
            MovieNightTheme::ComedyFest => "Comedy Fest",
            MovieNightTheme::ActionAdventure => "Action Adventure",
            MovieNightTheme::RomanticEvening => "Romantic Evening",
            MovieNightTheme::SciFiJourney => "Sci-Fi Journey",
            MovieNightTheme::DocumentaryNight => "Documentary Night",
            MovieNightTheme::FamilyFun => "Family Fun",
        }
    }
}

impl FromStr for MovieNightTheme {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MovieNightTheme::ALL
            .into_iter()
            .find(|theme| theme.as_str() == s.trim())
            .ok_or_else(|| AppError::InvalidInput(format!("Invalid theme: {}", s)))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MovieNightStatus {
    #[default]
    Planned,
    Ongoing,
    Completed,
    Cancelled,
}

impl MovieNightStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovieNightStatus::Planned => "planned",
            MovieNightStatus::Ongoing => "ongoing",
            MovieNightStatus::Completed => "completed",
            MovieNightStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for MovieNightStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "planned" => Ok(MovieNightStatus::Planned),
            "ongoing" => Ok(MovieNightStatus::Ongoing),
            "completed" => Ok(MovieNightStatus::Completed),
            "cancelled" => Ok(MovieNightStatus::Cancelled),
            other => Err(AppError::InvalidInput(format!("Invalid status: {}", other))),
        }
    }
}

/// Which of a host's events to list
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MovieNightWindow {
    Upcoming,
    Past,
    #[default]
    All,
}

impl MovieNightWindow {
    pub fn contains(&self, date: NaiveDate, today: NaiveDate) -> bool {
        match self {
            MovieNightWindow::Upcoming => date >= today,
            MovieNightWindow::Past => date < today,
            MovieNightWindow::All => true,
        }
    }
}

/// A planned viewing event owned by its host
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MovieNight {
    pub id: Uuid,
    pub host_id: Uuid,
    pub title: String,
    pub date: NaiveDate,
    /// 24h "HH:MM"
    pub time: String,
    pub guests: Vec<Guest>,
    pub movies: Vec<MovieSummary>,
    pub theme: Option<MovieNightTheme>,
    pub notes: Option<String>,
    pub status: MovieNightStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Creation payload
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieNightDraft {
    pub title: String,
    pub date: NaiveDate,
    pub time: String,
    #[serde(default)]
    pub guests: Vec<Guest>,
    #[serde(default)]
    pub theme: Option<MovieNightTheme>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Partial update payload; absent fields are left alone
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieNightPatch {
    pub title: Option<String>,
    pub date: Option<NaiveDate>,
    pub time: Option<String>,
    pub guests: Option<Vec<Guest>>,
    pub theme: Option<MovieNightTheme>,
    pub notes: Option<String>,
    pub status: Option<MovieNightStatus>,
}

fn validate_title(title: &str) -> AppResult<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(AppError::InvalidInput("Title is required".to_string()));
    }
    Ok(title.to_string())
}

/// Accepts "H:MM" or "HH:MM" in 24h form and normalizes to "HH:MM"
fn validate_time(time: &str) -> AppResult<String> {
    let invalid = || AppError::InvalidInput(format!("Invalid time (expected HH:MM): {}", time));

    let (hours, minutes) = time.trim().split_once(':').ok_or_else(invalid)?;
    if hours.is_empty() || hours.len() > 2 || minutes.len() != 2 {
        return Err(invalid());
    }
    let hours: u32 = hours.parse().map_err(|_| invalid())?;
    let minutes: u32 = minutes.parse().map_err(|_| invalid())?;
    let parsed = NaiveTime::from_hms_opt(hours, minutes, 0).ok_or_else(invalid)?;

    Ok(parsed.format("%H:%M").to_string())
}

fn validate_guests(guests: Vec<Guest>) -> AppResult<Vec<Guest>> {
    guests
        .into_iter()
        .map(|guest| {
            let name = guest.name.trim().to_string();
            if name.is_empty() {
                return Err(AppError::InvalidInput("Guest name is required".to_string()));
            }
            Ok(Guest {
                name,
                email: guest
                    .email
                    .map(|e| e.trim().to_lowercase())
                    .filter(|e| !e.is_empty()),
                status: guest.status,
            })
        })
        .collect()
}

fn clean_notes(notes: Option<String>) -> Option<String> {
    notes
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
}

impl MovieNightDraft {
    /// Validates the draft into a new `planned` event hosted by `host_id`
    pub fn into_movie_night(self, host_id: Uuid, now: DateTime<Utc>) -> AppResult<MovieNight> {
        Ok(MovieNight {
            id: Uuid::new_v4(),
            host_id,
            title: validate_title(&self.title)?,
            date: self.date,
            time: validate_time(&self.time)?,
            guests: validate_guests(self.guests)?,
            movies: Vec::new(),
            theme: self.theme,
            notes: clean_notes(self.notes),
            status: MovieNightStatus::Planned,
            created_at: now,
            updated_at: now,
        })
    }
}

impl MovieNight {
    /// Applies a partial update. Consumes the event, so a rejected patch leaves nothing half-applied.
    pub fn apply(mut self, patch: MovieNightPatch, now: DateTime<Utc>) -> AppResult<Self> {
        if let Some(title) = patch.title {
            self.title = validate_title(&title)?;
        }
        if let Some(date) = patch.date {
            self.date = date;
        }
        if let Some(time) = patch.time {
            self.time = validate_time(&time)?;
        }
        if let Some(guests) = patch.guests {
            self.guests = validate_guests(guests)?;
        }
        if let Some(theme) = patch.theme {
            self.theme = Some(theme);
        }
        if patch.notes.is_some() {
            self.notes = clean_notes(patch.notes);
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        self.updated_at = now;
        Ok(self)
    }

    pub fn has_movie(&self, movie_id: MovieId) -> bool {
        self.movies.iter().any(|m| m.id == movie_id)
    }
}
