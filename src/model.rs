use chrono::NaiveDateTime;
#[cfg(feature = "ssr")]
use diesel::prelude::*;
#[cfg(feature = "ssr")]
use diesel::sqlite::Sqlite;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::sprite::SpriteSheet;

/// Lifecycle of a game. Stored as lower-case text in `games.status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameStatus {
    Waiting,
    Active,
    Ended,
}

impl GameStatus {
    pub const ALL: [GameStatus; 3] = [GameStatus::Waiting, GameStatus::Active, GameStatus::Ended];

    pub fn as_str(&self) -> &'static str {
        match self {
            GameStatus::Waiting => "waiting",
            GameStatus::Active => "active",
            GameStatus::Ended => "ended",
        }
    }
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GameStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(GameStatus::Waiting),
            "active" => Ok(GameStatus::Active),
            "ended" => Ok(GameStatus::Ended),
            other => Err(format!("Unknown game status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ssr", derive(Queryable, Selectable))]
#[cfg_attr(feature = "ssr", diesel(table_name = crate::schema::games))]
#[cfg_attr(feature = "ssr", diesel(check_for_backend(Sqlite)))]
pub struct Game {
    pub id: i32,
    pub invite_code: String,
    pub title: String,
    pub status: String,
    pub total_slots: i32,
    pub theme_color: String,
    pub background_url: Option<String>,
    pub sprite_url: Option<String>,
    pub sprite_columns: i32,
    pub sprite_cell_width: i32,
    pub sprite_cell_height: i32,
    pub sprite_origin_x: i32,
    pub sprite_origin_y: i32,
    pub show_prize_names: bool,
    pub show_draw_feed: bool,
    pub music_url: Option<String>,
    pub music_playing: bool,
    pub template_id: Option<i32>,
    pub created_at: NaiveDateTime,
}

impl Game {
    /// Parsed status. Rows that fail the CHECK constraint cannot exist, so unknown text reads as
    /// `Waiting`.
    pub fn status(&self) -> GameStatus {
        self.status.parse().unwrap_or(GameStatus::Waiting)
    }

    pub fn is_active(&self) -> bool {
        self.status() == GameStatus::Active
    }

    pub fn sprite_sheet(&self) -> SpriteSheet {
        SpriteSheet {
            columns: self.sprite_columns,
            cell_width: self.sprite_cell_width,
            cell_height: self.sprite_cell_height,
            origin_x: self.sprite_origin_x,
            origin_y: self.sprite_origin_y,
        }
    }
}

#[cfg(feature = "ssr")]
#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::games)]
pub struct NewGame<'a> {
    pub invite_code: &'a str,
    pub title: &'a str,
    pub total_slots: i32,
    // Everything else uses column defaults.
}

/// Admin-editable game settings. Applied as a whole; `None` clears nullable columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSettings {
    pub title: String,
    pub theme_color: String,
    pub background_url: Option<String>,
    pub sprite_url: Option<String>,
    pub sprite_columns: i32,
    pub sprite_cell_width: i32,
    pub sprite_cell_height: i32,
    pub sprite_origin_x: i32,
    pub sprite_origin_y: i32,
    pub show_prize_names: bool,
    pub show_draw_feed: bool,
}

impl From<&Game> for GameSettings {
    fn from(game: &Game) -> Self {
        GameSettings {
            title: game.title.clone(),
            theme_color: game.theme_color.clone(),
            background_url: game.background_url.clone(),
            sprite_url: game.sprite_url.clone(),
            sprite_columns: game.sprite_columns,
            sprite_cell_width: game.sprite_cell_width,
            sprite_cell_height: game.sprite_cell_height,
            sprite_origin_x: game.sprite_origin_x,
            sprite_origin_y: game.sprite_origin_y,
            show_prize_names: game.show_prize_names,
            show_draw_feed: game.show_draw_feed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ssr", derive(Queryable, Selectable))]
#[cfg_attr(feature = "ssr", diesel(table_name = crate::schema::prizes))]
#[cfg_attr(feature = "ssr", diesel(check_for_backend(Sqlite)))]
pub struct Prize {
    pub id: i32,
    pub game_id: i32,
    pub slot_number: i32,
    pub prize_name: String,
    pub prize_grade: String,
    pub is_winner: bool,
    pub is_drawn: bool,
    pub position_x: f64,
    pub position_y: f64,
    pub sprite_offset_x: i32,
    pub sprite_offset_y: i32,
}

#[cfg(feature = "ssr")]
#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::prizes)]
pub struct NewPrize {
    pub game_id: i32,
    pub slot_number: i32,
    pub position_x: f64,
    pub position_y: f64,
}

/// A single prize edit from the admin dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrizeUpdate {
    pub prize_name: String,
    pub prize_grade: String,
    pub is_winner: bool,
}

#[cfg(feature = "ssr")]
#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::draws)]
pub struct NewDraw<'a> {
    pub game_id: i32,
    pub prize_id: i32,
    pub session_id: &'a str,
    pub player_name: &'a str,
}

/// A draw joined with the prize it claimed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ssr", derive(Queryable))]
pub struct DrawRecord {
    pub id: i32,
    pub slot_number: i32,
    pub prize_name: String,
    pub prize_grade: String,
    pub is_winner: bool,
    pub player_name: String,
    pub created_at: NaiveDateTime,
}

/// Structured result of a draw attempt. Rule rejections come back with `success == false` and a
/// stable `error` code rather than as a transport error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DrawOutcome {
    pub success: bool,
    pub error: Option<String>,
    pub message: Option<String>,
    pub draw_id: Option<i32>,
    pub prize_name: Option<String>,
    pub prize_grade: Option<String>,
    pub slot_number: Option<i32>,
    pub is_winner: Option<bool>,
}

impl DrawOutcome {
    pub fn won(record: &DrawRecord) -> Self {
        DrawOutcome {
            success: true,
            error: None,
            message: None,
            draw_id: Some(record.id),
            prize_name: Some(record.prize_name.clone()),
            prize_grade: Some(record.prize_grade.clone()),
            slot_number: Some(record.slot_number),
            is_winner: Some(record.is_winner),
        }
    }

    pub fn rejected(code: &str, message: String) -> Self {
        DrawOutcome {
            success: false,
            error: Some(code.to_string()),
            message: Some(message),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameStats {
    pub total: i64,
    pub drawn: i64,
    pub remaining: i64,
    pub winners_drawn: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ssr", derive(Queryable, Selectable))]
#[cfg_attr(feature = "ssr", diesel(table_name = crate::schema::templates))]
#[cfg_attr(feature = "ssr", diesel(check_for_backend(Sqlite)))]
pub struct Template {
    pub id: i32,
    pub name: String,
    pub background_url: Option<String>,
    pub sprite_url: Option<String>,
    pub sprite_columns: i32,
    pub sprite_cell_width: i32,
    pub sprite_cell_height: i32,
    pub sprite_origin_x: i32,
    pub sprite_origin_y: i32,
    pub created_at: NaiveDateTime,
}

impl Template {
    pub fn sprite_sheet(&self) -> SpriteSheet {
        SpriteSheet {
            columns: self.sprite_columns,
            cell_width: self.sprite_cell_width,
            cell_height: self.sprite_cell_height,
            origin_x: self.sprite_origin_x,
            origin_y: self.sprite_origin_y,
        }
    }
}

/// Template fields as submitted from the admin template editor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ssr", derive(Insertable, AsChangeset))]
#[cfg_attr(feature = "ssr", diesel(table_name = crate::schema::templates))]
#[cfg_attr(feature = "ssr", diesel(treat_none_as_null = true))]
pub struct TemplateInput {
    pub name: String,
    pub background_url: Option<String>,
    pub sprite_url: Option<String>,
    pub sprite_columns: i32,
    pub sprite_cell_width: i32,
    pub sprite_cell_height: i32,
    pub sprite_origin_x: i32,
    pub sprite_origin_y: i32,
}

impl From<&Template> for TemplateInput {
    fn from(t: &Template) -> Self {
        TemplateInput {
            name: t.name.clone(),
            background_url: t.background_url.clone(),
            sprite_url: t.sprite_url.clone(),
            sprite_columns: t.sprite_columns,
            sprite_cell_width: t.sprite_cell_width,
            sprite_cell_height: t.sprite_cell_height,
            sprite_origin_x: t.sprite_origin_x,
            sprite_origin_y: t.sprite_origin_y,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ssr", derive(Queryable, Selectable))]
#[cfg_attr(feature = "ssr", diesel(table_name = crate::schema::template_slots))]
#[cfg_attr(feature = "ssr", diesel(check_for_backend(Sqlite)))]
pub struct TemplateSlot {
    pub id: i32,
    pub template_id: i32,
    pub slot_number: i32,
    pub offset_x: i32,
    pub offset_y: i32,
    pub position_x: Option<f64>,
    pub position_y: Option<f64>,
}

#[cfg(feature = "ssr")]
#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::template_slots)]
pub struct NewTemplateSlot {
    pub template_id: i32,
    pub slot_number: i32,
    pub offset_x: i32,
    pub offset_y: i32,
    pub position_x: Option<f64>,
    pub position_y: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateWithSlots {
    pub template: Template,
    pub slots: Vec<TemplateSlot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ssr", derive(Queryable, Selectable))]
#[cfg_attr(feature = "ssr", diesel(table_name = crate::schema::reservations))]
#[cfg_attr(feature = "ssr", diesel(check_for_backend(Sqlite)))]
pub struct Reservation {
    pub id: i32,
    pub name: String,
    pub contact: String,
    pub event_date: Option<String>,
    pub party_size: i32,
    pub message: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ssr", derive(Insertable))]
#[cfg_attr(feature = "ssr", diesel(table_name = crate::schema::reservations))]
pub struct NewReservation {
    pub name: String,
    pub contact: String,
    pub event_date: Option<String>,
    pub party_size: i32,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ssr", derive(Queryable, Selectable))]
#[cfg_attr(feature = "ssr", diesel(table_name = crate::schema::side_applications))]
#[cfg_attr(feature = "ssr", diesel(check_for_backend(Sqlite)))]
pub struct SideApplication {
    pub id: i32,
    pub name: String,
    pub contact: String,
    pub category: String,
    pub description: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ssr", derive(Insertable))]
#[cfg_attr(feature = "ssr", diesel(table_name = crate::schema::side_applications))]
pub struct NewSideApplication {
    pub name: String,
    pub contact: String,
    pub category: String,
    pub description: Option<String>,
}

#[cfg(feature = "ssr")]
#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::admin_sessions)]
pub struct NewAdminSession {
    pub token: String,
    pub expires_at: NaiveDateTime,
}

/// Messages pushed to every browser watching a game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameEvent {
    GameUpdated,
    PrizeUpdated {
        slot_number: i32,
    },
    SlotDrawn {
        slot_number: i32,
        player_name: String,
        prize_name: String,
        prize_grade: String,
        is_winner: bool,
    },
    GameReset,
    MusicChanged {
        music_url: Option<String>,
        playing: bool,
    },
    SlotHover {
        slot_number: i32,
        player_name: String,
    },
}

impl GameEvent {
    /// True for events that change persisted state and require a refetch.
    pub fn changes_state(&self) -> bool {
        !matches!(self, GameEvent::SlotHover { .. })
    }
}
