pub mod admin;
pub mod api;
pub mod app;
pub mod browser;
#[cfg(feature = "ssr")]
pub mod config;
pub mod error;
pub mod model;
pub mod realtime;
#[cfg(feature = "ssr")]
pub mod schema;
pub mod sprite;

#[cfg(feature = "ssr")]
use chrono::{Duration, Utc};
#[cfg(feature = "ssr")]
use diesel::connection::SimpleConnection;
#[cfg(feature = "ssr")]
use diesel::prelude::*;
#[cfg(feature = "ssr")]
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool};
#[cfg(feature = "ssr")]
use diesel::result::DatabaseErrorKind;
#[cfg(feature = "ssr")]
use diesel::SqliteConnection;
#[cfg(feature = "ssr")]
use dotenvy::dotenv;
use qrcode::render::svg;
use qrcode::QrCode;
use rand::Rng;
#[cfg(feature = "ssr")]
use std::env;
#[cfg(feature = "ssr")]
use uuid::Uuid;

#[cfg(feature = "ssr")]
use crate::error::DrawError;
use crate::error::ValidationError;
#[cfg(feature = "ssr")]
use crate::model::{
    DrawOutcome, DrawRecord, Game, GameSettings, GameStats, GameStatus, NewAdminSession, NewDraw,
    NewGame, NewPrize, NewTemplateSlot, Prize, PrizeUpdate, Reservation, SideApplication,
    Template, TemplateInput, TemplateSlot, TemplateWithSlots,
};
use crate::model::{NewReservation, NewSideApplication};
#[cfg(not(feature = "ssr"))]
use crate::model::{Prize, PrizeUpdate};
#[cfg(feature = "ssr")]
use crate::schema::{
    admin_sessions, draws, games, prizes, reservations, side_applications, template_slots,
    templates,
};

#[cfg(feature = "hydrate")]
#[wasm_bindgen::prelude::wasm_bindgen]
pub fn hydrate() {
    use crate::app::*;
    console_error_panic_hook::set_once();
    leptos::mount::hydrate_body(App);
}

pub const MAX_SLOTS: i32 = 200;
pub const MAX_PLAYER_NAME: usize = 40;
pub const MAX_PRIZE_NAME: usize = 80;
pub const MAX_PARTY_SIZE: i32 = 50;
pub const INVITE_CODE_LEN: usize = 6;

// No 0/O or 1/I, so codes survive being read aloud.
const INVITE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

#[cfg(feature = "ssr")]
pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;

/// Applies the PRAGMAs every connection needs.
#[cfg(feature = "ssr")]
pub fn configure_connection(conn: &mut SqliteConnection) -> QueryResult<()> {
    // Enable WAL mode to allow concurrent reads during writes, and a timeout to retry locked
    // operations.
    conn.batch_execute(
        "PRAGMA foreign_keys = ON; \
        PRAGMA journal_mode = WAL; \
        PRAGMA synchronous = NORMAL; \
        PRAGMA busy_timeout = 10000;",
    )
}

#[cfg(feature = "ssr")]
#[derive(Debug, Clone, Copy)]
pub struct SqlitePragmas;

#[cfg(feature = "ssr")]
impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for SqlitePragmas {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), diesel::r2d2::Error> {
        configure_connection(conn).map_err(diesel::r2d2::Error::QueryError)
    }
}

#[cfg(feature = "ssr")]
pub fn build_pool(database_url: &str) -> Result<DbPool, diesel::r2d2::PoolError> {
    let manager = ConnectionManager::<SqliteConnection>::new(database_url);
    Pool::builder()
        .connection_customizer(Box::new(SqlitePragmas))
        .build(manager)
}

#[cfg(feature = "ssr")]
pub fn establish_connection() -> SqliteConnection {
    dotenv().ok();
    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set in .env");
    let mut conn = SqliteConnection::establish(&database_url)
        .unwrap_or_else(|e| panic!("Error connecting to {}: {}", database_url, e));
    configure_connection(&mut conn).expect("Failed to set SQLite PRAGMAs");
    conn
}

/// Random invite code drawn from an alphabet without look-alike characters.
pub fn generate_invite_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..INVITE_CODE_LEN)
        .map(|_| INVITE_ALPHABET[rng.random_range(0..INVITE_ALPHABET.len())] as char)
        .collect()
}

pub fn normalize_invite_code(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Default ornament positions (percentages of the tree area) for `total` slots: rows of 1, 2,
/// 3, ... ornaments, widening towards the bottom like a tree.
pub fn tree_layout(total: i32) -> Vec<(f64, f64)> {
    let total = total.max(0) as usize;
    let mut rows = 0usize;
    while rows * (rows + 1) / 2 < total {
        rows += 1;
    }

    let mut positions = Vec::with_capacity(total);
    for row in 0..rows {
        let placed = row * (row + 1) / 2;
        let count = (row + 1).min(total - placed);
        let y = if rows == 1 {
            50.0
        } else {
            15.0 + 70.0 * row as f64 / (rows - 1) as f64
        };
        let half_width = 40.0 * (row + 1) as f64 / rows as f64;
        for i in 0..count {
            let x = 50.0 - half_width + 2.0 * half_width * (i as f64 + 0.5) / count as f64;
            positions.push((round2(x), round2(y)));
        }
    }
    positions
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn required(value: &str, field: &'static str, max: usize) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Required(field));
    }
    if trimmed.chars().count() > max {
        return Err(ValidationError::TooLong { field, max });
    }
    Ok(trimmed.to_string())
}

fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn validate_player_name(name: &str) -> Result<String, ValidationError> {
    required(name, "Name", MAX_PLAYER_NAME)
}

pub fn validate_new_game(title: &str, total_slots: i32) -> Result<String, ValidationError> {
    if !(1..=MAX_SLOTS).contains(&total_slots) {
        return Err(ValidationError::OutOfRange {
            field: "Number of slots",
            min: 1,
            max: MAX_SLOTS as i64,
        });
    }
    required(title, "Title", 100)
}

pub fn validate_reservation(input: NewReservation) -> Result<NewReservation, ValidationError> {
    if !(1..=MAX_PARTY_SIZE).contains(&input.party_size) {
        return Err(ValidationError::OutOfRange {
            field: "Party size",
            min: 1,
            max: MAX_PARTY_SIZE as i64,
        });
    }
    Ok(NewReservation {
        name: required(&input.name, "Name", 60)?,
        contact: required(&input.contact, "Contact", 100)?,
        event_date: optional(input.event_date),
        party_size: input.party_size,
        message: optional(input.message),
    })
}

pub fn validate_side_application(
    input: NewSideApplication,
) -> Result<NewSideApplication, ValidationError> {
    Ok(NewSideApplication {
        name: required(&input.name, "Name", 60)?,
        contact: required(&input.contact, "Contact", 100)?,
        category: required(&input.category, "Category", 40)?,
        description: optional(input.description),
    })
}

/// Parses bulk prize assignments, one slot per non-empty line, in slot order:
/// `name|grade|winner`. Grade and winner are optional; winner accepts yes/y/true/1/win.
pub fn parse_prize_lines(text: &str) -> Result<Vec<PrizeUpdate>, ValidationError> {
    let mut updates = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let mut parts = line.split('|').map(str::trim);
        let name = parts.next().unwrap_or_default();
        if name.is_empty() {
            return Err(ValidationError::BadLine {
                line: idx + 1,
                reason: "prize name is empty".to_string(),
            });
        }
        if name.chars().count() > MAX_PRIZE_NAME {
            return Err(ValidationError::BadLine {
                line: idx + 1,
                reason: format!("prize name is longer than {} characters", MAX_PRIZE_NAME),
            });
        }
        let grade = parts.next().unwrap_or_default();
        let is_winner = match parts.next().map(str::to_lowercase).as_deref() {
            None | Some("") | Some("no") | Some("n") | Some("false") | Some("0") => false,
            Some("yes") | Some("y") | Some("true") | Some("1") | Some("win") => true,
            Some(other) => {
                return Err(ValidationError::BadLine {
                    line: idx + 1,
                    reason: format!("unrecognised winner flag '{}'", other),
                })
            }
        };
        updates.push(PrizeUpdate {
            prize_name: name.to_string(),
            prize_grade: grade.to_string(),
            is_winner,
        });
    }
    Ok(updates)
}

/// Hides what undrawn slots hold. Drawn slots always show their prize.
pub fn redact_prizes(prizes: Vec<Prize>, show_names: bool) -> Vec<Prize> {
    prizes
        .into_iter()
        .map(|mut prize| {
            if !prize.is_drawn {
                prize.is_winner = false;
                if !show_names {
                    prize.prize_name.clear();
                    prize.prize_grade.clear();
                }
            }
            prize
        })
        .collect()
}

pub fn invite_url(scheme: &str, host: &str, invite_code: &str) -> String {
    format!("{}://{}/{}", scheme, host.trim_end_matches('/'), invite_code)
}

/// SVG QR code for an invite link.
pub fn invite_qr_svg(url: &str) -> Option<String> {
    let code = QrCode::new(url.as_bytes()).ok()?;
    Some(
        code.render::<svg::Color>()
            .min_dimensions(180, 180)
            .build(),
    )
}

/// Creates a game with a fresh invite code and one undrawn prize per slot, laid out as a tree.
#[cfg(feature = "ssr")]
pub fn create_game(
    conn: &mut SqliteConnection,
    title: &str,
    total_slots: i32,
) -> Result<Game, diesel::result::Error> {
    conn.transaction(|conn| {
        // Collisions are rare with 32^6 codes; retry a few times before giving up.
        let mut rng = rand::rng();
        let mut invite_code = None;
        for _ in 0..8 {
            let candidate = generate_invite_code(&mut rng);
            let taken: i64 = games::table
                .filter(games::invite_code.eq(&candidate))
                .count()
                .get_result(conn)?;
            if taken == 0 {
                invite_code = Some(candidate);
                break;
            }
        }
        let invite_code = invite_code.ok_or_else(|| {
            diesel::result::Error::QueryBuilderError("Could not allocate an invite code".into())
        })?;

        let game: Game = diesel::insert_into(games::table)
            .values(&NewGame {
                invite_code: &invite_code,
                title,
                total_slots,
            })
            .returning(Game::as_returning())
            .get_result(conn)?;

        let new_prizes: Vec<NewPrize> = tree_layout(total_slots)
            .into_iter()
            .enumerate()
            .map(|(i, (x, y))| NewPrize {
                game_id: game.id,
                slot_number: i as i32 + 1,
                position_x: x,
                position_y: y,
            })
            .collect();
        diesel::insert_into(prizes::table)
            .values(&new_prizes)
            .execute(conn)?;

        Ok(game)
    })
}

#[cfg(feature = "ssr")]
pub fn get_game(conn: &mut SqliteConnection, game_id: i32) -> Result<Game, diesel::result::Error> {
    games::table
        .find(game_id)
        .select(Game::as_select())
        .first(conn)
}

#[cfg(feature = "ssr")]
pub fn get_game_by_invite_code(
    conn: &mut SqliteConnection,
    invite_code: &str,
) -> Result<Game, diesel::result::Error> {
    games::table
        .filter(games::invite_code.eq(normalize_invite_code(invite_code)))
        .select(Game::as_select())
        .first(conn)
}

/// All games, newest first.
#[cfg(feature = "ssr")]
pub fn list_games(conn: &mut SqliteConnection) -> Result<Vec<Game>, diesel::result::Error> {
    games::table
        .order((games::created_at.desc(), games::id.desc()))
        .select(Game::as_select())
        .load(conn)
}

#[cfg(feature = "ssr")]
pub fn update_game_settings(
    conn: &mut SqliteConnection,
    game_id: i32,
    settings: &GameSettings,
) -> Result<Game, diesel::result::Error> {
    diesel::update(games::table.find(game_id))
        .set((
            games::title.eq(&settings.title),
            games::theme_color.eq(&settings.theme_color),
            games::background_url.eq(&settings.background_url),
            games::sprite_url.eq(&settings.sprite_url),
            games::sprite_columns.eq(settings.sprite_columns.max(1)),
            games::sprite_cell_width.eq(settings.sprite_cell_width),
            games::sprite_cell_height.eq(settings.sprite_cell_height),
            games::sprite_origin_x.eq(settings.sprite_origin_x),
            games::sprite_origin_y.eq(settings.sprite_origin_y),
            games::show_prize_names.eq(settings.show_prize_names),
            games::show_draw_feed.eq(settings.show_draw_feed),
        ))
        .returning(Game::as_returning())
        .get_result(conn)
}

#[cfg(feature = "ssr")]
pub fn set_game_status(
    conn: &mut SqliteConnection,
    game_id: i32,
    status: GameStatus,
) -> Result<Game, diesel::result::Error> {
    diesel::update(games::table.find(game_id))
        .set(games::status.eq(status.as_str()))
        .returning(Game::as_returning())
        .get_result(conn)
}

#[cfg(feature = "ssr")]
pub fn set_music_state(
    conn: &mut SqliteConnection,
    game_id: i32,
    music_url: Option<&str>,
    playing: bool,
) -> Result<Game, diesel::result::Error> {
    let music_url = music_url.map(str::trim).filter(|url| !url.is_empty());
    diesel::update(games::table.find(game_id))
        .set((
            games::music_url.eq(music_url),
            // Nothing to play without a track.
            games::music_playing.eq(playing && music_url.is_some()),
        ))
        .returning(Game::as_returning())
        .get_result(conn)
}

/// Deletes a game together with its draws and prizes. Returns the number of games deleted.
#[cfg(feature = "ssr")]
pub fn delete_game(conn: &mut SqliteConnection, game_id: i32) -> Result<usize, diesel::result::Error> {
    conn.transaction(|conn| {
        diesel::delete(draws::table.filter(draws::game_id.eq(game_id))).execute(conn)?;
        diesel::delete(prizes::table.filter(prizes::game_id.eq(game_id))).execute(conn)?;
        diesel::delete(games::table.find(game_id)).execute(conn)
    })
}

/// Prizes of a game in slot order.
#[cfg(feature = "ssr")]
pub fn list_prizes(
    conn: &mut SqliteConnection,
    game_id: i32,
) -> Result<Vec<Prize>, diesel::result::Error> {
    prizes::table
        .filter(prizes::game_id.eq(game_id))
        .order(prizes::slot_number.asc())
        .select(Prize::as_select())
        .load(conn)
}

/// Edits an undrawn prize. Returns `Ok(None)` when the prize has already been drawn, since a
/// player's result is fixed once the slot is claimed.
#[cfg(feature = "ssr")]
pub fn update_prize(
    conn: &mut SqliteConnection,
    prize_id: i32,
    update: &PrizeUpdate,
) -> Result<Option<Prize>, diesel::result::Error> {
    conn.transaction(|conn| {
        let updated = diesel::update(
            prizes::table
                .find(prize_id)
                .filter(prizes::is_drawn.eq(false)),
        )
        .set((
            prizes::prize_name.eq(update.prize_name.trim()),
            prizes::prize_grade.eq(update.prize_grade.trim()),
            prizes::is_winner.eq(update.is_winner),
        ))
        .returning(Prize::as_returning())
        .get_result(conn)
        .optional()?;
        if updated.is_none() {
            // NotFound for a missing prize.
            prizes::table.find(prize_id).select(prizes::id).first::<i32>(conn)?;
        }
        Ok(updated)
    })
}

/// Moves an ornament (percent coordinates, clamped to the tree area) and sets its sprite
/// override.
#[cfg(feature = "ssr")]
pub fn update_prize_layout(
    conn: &mut SqliteConnection,
    prize_id: i32,
    position: (f64, f64),
    sprite_offset: (i32, i32),
) -> Result<Prize, diesel::result::Error> {
    diesel::update(prizes::table.find(prize_id))
        .set((
            prizes::position_x.eq(position.0.clamp(0.0, 100.0)),
            prizes::position_y.eq(position.1.clamp(0.0, 100.0)),
            prizes::sprite_offset_x.eq(sprite_offset.0),
            prizes::sprite_offset_y.eq(sprite_offset.1),
        ))
        .returning(Prize::as_returning())
        .get_result(conn)
}

/// Assigns `updates[i]` to slot `i + 1`. Entries past the last slot and slots already drawn are
/// skipped. Returns the number of prizes updated.
#[cfg(feature = "ssr")]
pub fn assign_prizes(
    conn: &mut SqliteConnection,
    game_id: i32,
    updates: &[PrizeUpdate],
) -> Result<usize, diesel::result::Error> {
    conn.transaction(|conn| {
        let game = get_game(conn, game_id)?;
        let mut updated = 0;
        for (i, update) in updates.iter().take(game.total_slots as usize).enumerate() {
            updated += diesel::update(
                prizes::table
                    .filter(prizes::game_id.eq(game_id))
                    .filter(prizes::slot_number.eq(i as i32 + 1))
                    .filter(prizes::is_drawn.eq(false)),
            )
            .set((
                prizes::prize_name.eq(update.prize_name.trim()),
                prizes::prize_grade.eq(update.prize_grade.trim()),
                prizes::is_winner.eq(update.is_winner),
            ))
            .execute(conn)?;
        }
        Ok(updated)
    })
}

#[cfg(feature = "ssr")]
pub fn get_game_stats(
    conn: &mut SqliteConnection,
    game_id: i32,
) -> Result<GameStats, diesel::result::Error> {
    let total: i64 = prizes::table
        .filter(prizes::game_id.eq(game_id))
        .count()
        .get_result(conn)?;
    let drawn: i64 = prizes::table
        .filter(prizes::game_id.eq(game_id))
        .filter(prizes::is_drawn.eq(true))
        .count()
        .get_result(conn)?;
    let winners_drawn: i64 = prizes::table
        .filter(prizes::game_id.eq(game_id))
        .filter(prizes::is_drawn.eq(true))
        .filter(prizes::is_winner.eq(true))
        .count()
        .get_result(conn)?;
    Ok(GameStats {
        total,
        drawn,
        remaining: total - drawn,
        winners_drawn,
    })
}

/// Claims `slot_number` of a game for the session. Every rule rejection comes back as a failed
/// `DrawOutcome` with an error code; only database failures are returned as `Err`.
///
/// Runs in an IMMEDIATE transaction, so concurrent draws on the same database serialize on the
/// write lock; the unique indexes on `draws` back the checks.
#[cfg(feature = "ssr")]
pub fn draw_prize(
    conn: &mut SqliteConnection,
    game_id: i32,
    slot_number: i32,
    player_name: &str,
    session_id: &str,
) -> Result<DrawOutcome, diesel::result::Error> {
    let result = conn.immediate_transaction(|conn| {
        claim_slot(conn, game_id, slot_number, player_name, session_id)
    });
    match result {
        Ok(record) => Ok(DrawOutcome::won(&record)),
        Err(e) => e.into_outcome(),
    }
}

#[cfg(feature = "ssr")]
fn claim_slot(
    conn: &mut SqliteConnection,
    game_id: i32,
    slot_number: i32,
    player_name: &str,
    session_id: &str,
) -> Result<DrawRecord, DrawError> {
    let player_name = validate_player_name(player_name).map_err(|_| DrawError::InvalidName {
        max: MAX_PLAYER_NAME,
    })?;
    let session_id = session_id.trim();
    if session_id.is_empty() {
        return Err(DrawError::InvalidSession);
    }

    let game: Game = games::table
        .find(game_id)
        .select(Game::as_select())
        .first(conn)
        .optional()?
        .ok_or(DrawError::GameNotFound)?;
    if !game.is_active() {
        return Err(DrawError::GameNotActive);
    }

    if let Some(existing) = find_session_draw(conn, game_id, session_id)? {
        return Err(DrawError::AlreadyDrawn(existing));
    }

    let prize: Prize = prizes::table
        .filter(prizes::game_id.eq(game_id))
        .filter(prizes::slot_number.eq(slot_number))
        .select(Prize::as_select())
        .first(conn)
        .optional()?
        .ok_or(DrawError::InvalidSlot(slot_number))?;
    if prize.is_drawn {
        return Err(DrawError::SlotTaken(slot_number));
    }

    let marked = diesel::update(
        prizes::table
            .find(prize.id)
            .filter(prizes::is_drawn.eq(false)),
    )
    .set(prizes::is_drawn.eq(true))
    .execute(conn)?;
    if marked == 0 {
        return Err(DrawError::SlotTaken(slot_number));
    }

    let inserted = diesel::insert_into(draws::table)
        .values(&NewDraw {
            game_id,
            prize_id: prize.id,
            session_id,
            player_name: &player_name,
        })
        .returning((draws::id, draws::created_at))
        .get_result::<(i32, chrono::NaiveDateTime)>(conn);

    let (draw_id, created_at) = match inserted {
        Ok(row) => row,
        Err(diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
            return Err(match find_session_draw(conn, game_id, session_id)? {
                Some(existing) => DrawError::AlreadyDrawn(existing),
                None => DrawError::SlotTaken(slot_number),
            });
        }
        Err(e) => return Err(e.into()),
    };

    Ok(DrawRecord {
        id: draw_id,
        slot_number: prize.slot_number,
        prize_name: prize.prize_name,
        prize_grade: prize.prize_grade,
        is_winner: prize.is_winner,
        player_name,
        created_at,
    })
}

/// The draw a session already made in a game, if any.
#[cfg(feature = "ssr")]
pub fn find_session_draw(
    conn: &mut SqliteConnection,
    game_id: i32,
    session_id: &str,
) -> Result<Option<DrawRecord>, diesel::result::Error> {
    draws::table
        .inner_join(prizes::table)
        .filter(draws::game_id.eq(game_id))
        .filter(draws::session_id.eq(session_id))
        .select((
            draws::id,
            prizes::slot_number,
            prizes::prize_name,
            prizes::prize_grade,
            prizes::is_winner,
            draws::player_name,
            draws::created_at,
        ))
        .first::<DrawRecord>(conn)
        .optional()
}

/// Draws of a game, newest first.
#[cfg(feature = "ssr")]
pub fn list_draws(
    conn: &mut SqliteConnection,
    game_id: i32,
) -> Result<Vec<DrawRecord>, diesel::result::Error> {
    draws::table
        .inner_join(prizes::table)
        .filter(draws::game_id.eq(game_id))
        .select((
            draws::id,
            prizes::slot_number,
            prizes::prize_name,
            prizes::prize_grade,
            prizes::is_winner,
            draws::player_name,
            draws::created_at,
        ))
        .order((draws::created_at.desc(), draws::id.desc()))
        .load(conn)
}

/// Removes every draw of a game and puts all its slots back in the pool. The game status is left
/// alone. Returns the number of draws removed.
#[cfg(feature = "ssr")]
pub fn reset_game(conn: &mut SqliteConnection, game_id: i32) -> Result<usize, diesel::result::Error> {
    conn.transaction(|conn| {
        get_game(conn, game_id)?;
        let removed =
            diesel::delete(draws::table.filter(draws::game_id.eq(game_id))).execute(conn)?;
        diesel::update(prizes::table.filter(prizes::game_id.eq(game_id)))
            .set(prizes::is_drawn.eq(false))
            .execute(conn)?;
        Ok(removed)
    })
}

#[cfg(feature = "ssr")]
pub fn create_template(
    conn: &mut SqliteConnection,
    input: &TemplateInput,
) -> Result<Template, diesel::result::Error> {
    diesel::insert_into(templates::table)
        .values(input)
        .returning(Template::as_returning())
        .get_result(conn)
}

#[cfg(feature = "ssr")]
pub fn list_templates(conn: &mut SqliteConnection) -> Result<Vec<Template>, diesel::result::Error> {
    templates::table
        .order(templates::name.asc())
        .select(Template::as_select())
        .load(conn)
}

#[cfg(feature = "ssr")]
pub fn get_template_with_slots(
    conn: &mut SqliteConnection,
    template_id: i32,
) -> Result<TemplateWithSlots, diesel::result::Error> {
    let template: Template = templates::table
        .find(template_id)
        .select(Template::as_select())
        .first(conn)?;
    let slots: Vec<TemplateSlot> = template_slots::table
        .filter(template_slots::template_id.eq(template_id))
        .order(template_slots::slot_number.asc())
        .select(TemplateSlot::as_select())
        .load(conn)?;
    Ok(TemplateWithSlots { template, slots })
}

#[cfg(feature = "ssr")]
pub fn update_template(
    conn: &mut SqliteConnection,
    template_id: i32,
    input: &TemplateInput,
) -> Result<Template, diesel::result::Error> {
    diesel::update(templates::table.find(template_id))
        .set(input)
        .returning(Template::as_returning())
        .get_result(conn)
}

/// Creates or replaces the per-slot override of a template.
#[cfg(feature = "ssr")]
pub fn set_template_slot(
    conn: &mut SqliteConnection,
    template_id: i32,
    slot_number: i32,
    offset: (i32, i32),
    position: Option<(f64, f64)>,
) -> Result<TemplateSlot, diesel::result::Error> {
    conn.transaction(|conn| {
        let exists: i64 = templates::table
            .find(template_id)
            .count()
            .get_result(conn)?;
        if exists == 0 {
            return Err(diesel::result::Error::NotFound);
        }

        let position = position.map(|(x, y)| (x.clamp(0.0, 100.0), y.clamp(0.0, 100.0)));
        let slot = NewTemplateSlot {
            template_id,
            slot_number,
            offset_x: offset.0,
            offset_y: offset.1,
            position_x: position.map(|p| p.0),
            position_y: position.map(|p| p.1),
        };
        diesel::insert_into(template_slots::table)
            .values(&slot)
            .on_conflict((template_slots::template_id, template_slots::slot_number))
            .do_update()
            .set((
                template_slots::offset_x.eq(slot.offset_x),
                template_slots::offset_y.eq(slot.offset_y),
                template_slots::position_x.eq(slot.position_x),
                template_slots::position_y.eq(slot.position_y),
            ))
            .returning(TemplateSlot::as_returning())
            .get_result(conn)
    })
}

/// Deletes a template and its slots, detaching it from every game that used it.
#[cfg(feature = "ssr")]
pub fn delete_template(
    conn: &mut SqliteConnection,
    template_id: i32,
) -> Result<usize, diesel::result::Error> {
    conn.transaction(|conn| {
        diesel::update(games::table.filter(games::template_id.eq(template_id)))
            .set(games::template_id.eq(None::<i32>))
            .execute(conn)?;
        diesel::delete(template_slots::table.filter(template_slots::template_id.eq(template_id)))
            .execute(conn)?;
        diesel::delete(templates::table.find(template_id)).execute(conn)
    })
}

/// Skins a game with a template: copies the background and sprite grid onto the game, and each
/// template slot's offset (and position, when set) onto the prize in the same slot.
#[cfg(feature = "ssr")]
pub fn apply_template(
    conn: &mut SqliteConnection,
    game_id: i32,
    template_id: i32,
) -> Result<Game, diesel::result::Error> {
    conn.transaction(|conn| {
        let TemplateWithSlots { template, slots } = get_template_with_slots(conn, template_id)?;

        let game: Game = diesel::update(games::table.find(game_id))
            .set((
                games::template_id.eq(Some(template.id)),
                games::background_url.eq(&template.background_url),
                games::sprite_url.eq(&template.sprite_url),
                games::sprite_columns.eq(template.sprite_columns),
                games::sprite_cell_width.eq(template.sprite_cell_width),
                games::sprite_cell_height.eq(template.sprite_cell_height),
                games::sprite_origin_x.eq(template.sprite_origin_x),
                games::sprite_origin_y.eq(template.sprite_origin_y),
            ))
            .returning(Game::as_returning())
            .get_result(conn)?;

        for slot in &slots {
            let target = || {
                prizes::table
                    .filter(prizes::game_id.eq(game_id))
                    .filter(prizes::slot_number.eq(slot.slot_number))
            };
            diesel::update(target())
                .set((
                    prizes::sprite_offset_x.eq(slot.offset_x),
                    prizes::sprite_offset_y.eq(slot.offset_y),
                ))
                .execute(conn)?;
            if let (Some(x), Some(y)) = (slot.position_x, slot.position_y) {
                diesel::update(target())
                    .set((prizes::position_x.eq(x), prizes::position_y.eq(y)))
                    .execute(conn)?;
            }
        }

        Ok(game)
    })
}

#[cfg(feature = "ssr")]
pub fn create_reservation(
    conn: &mut SqliteConnection,
    reservation: &NewReservation,
) -> Result<Reservation, diesel::result::Error> {
    diesel::insert_into(reservations::table)
        .values(reservation)
        .returning(Reservation::as_returning())
        .get_result(conn)
}

/// All reservations, newest first.
#[cfg(feature = "ssr")]
pub fn list_reservations(
    conn: &mut SqliteConnection,
) -> Result<Vec<Reservation>, diesel::result::Error> {
    reservations::table
        .order((reservations::created_at.desc(), reservations::id.desc()))
        .select(Reservation::as_select())
        .load(conn)
}

#[cfg(feature = "ssr")]
pub fn delete_reservation(
    conn: &mut SqliteConnection,
    reservation_id: i32,
) -> Result<usize, diesel::result::Error> {
    diesel::delete(reservations::table.find(reservation_id)).execute(conn)
}

#[cfg(feature = "ssr")]
pub fn create_side_application(
    conn: &mut SqliteConnection,
    application: &NewSideApplication,
) -> Result<SideApplication, diesel::result::Error> {
    diesel::insert_into(side_applications::table)
        .values(application)
        .returning(SideApplication::as_returning())
        .get_result(conn)
}

/// All side applications, newest first.
#[cfg(feature = "ssr")]
pub fn list_side_applications(
    conn: &mut SqliteConnection,
) -> Result<Vec<SideApplication>, diesel::result::Error> {
    side_applications::table
        .order((side_applications::created_at.desc(), side_applications::id.desc()))
        .select(SideApplication::as_select())
        .load(conn)
}

#[cfg(feature = "ssr")]
pub fn delete_side_application(
    conn: &mut SqliteConnection,
    application_id: i32,
) -> Result<usize, diesel::result::Error> {
    diesel::delete(side_applications::table.find(application_id)).execute(conn)
}

/// Creates an admin session valid for `ttl_hours` and returns the token.
#[cfg(feature = "ssr")]
pub fn create_admin_session(
    conn: &mut SqliteConnection,
    ttl_hours: i64,
) -> Result<String, diesel::result::Error> {
    let token_str = Uuid::new_v4().to_string();
    let new_session = NewAdminSession {
        token: token_str.clone(),
        expires_at: Utc::now().naive_utc() + Duration::hours(ttl_hours),
    };
    diesel::insert_into(admin_sessions::table)
        .values(&new_session)
        .execute(conn)?;
    Ok(token_str)
}

/// Returns true if the token belongs to an unexpired admin session.
#[cfg(feature = "ssr")]
pub fn validate_admin_token(
    conn: &mut SqliteConnection,
    token: &str,
) -> Result<bool, diesel::result::Error> {
    if Uuid::parse_str(token).is_err() {
        return Ok(false);
    }
    let count: i64 = admin_sessions::table
        .filter(admin_sessions::token.eq(token))
        .filter(admin_sessions::expires_at.gt(Utc::now().naive_utc()))
        .count()
        .get_result(conn)?;
    Ok(count > 0)
}

#[cfg(feature = "ssr")]
pub fn delete_admin_session(
    conn: &mut SqliteConnection,
    token: &str,
) -> Result<usize, diesel::result::Error> {
    diesel::delete(admin_sessions::table.filter(admin_sessions::token.eq(token))).execute(conn)
}

#[cfg(feature = "ssr")]
pub fn purge_expired_admin_sessions(
    conn: &mut SqliteConnection,
) -> Result<usize, diesel::result::Error> {
    diesel::delete(
        admin_sessions::table.filter(admin_sessions::expires_at.le(Utc::now().naive_utc())),
    )
    .execute(conn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_generate_invite_code() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..50 {
            let code = generate_invite_code(&mut rng);
            assert_eq!(code.len(), INVITE_CODE_LEN);
            assert!(code.bytes().all(|b| INVITE_ALPHABET.contains(&b)));
            assert!(!code.contains('O') && !code.contains('0') && !code.contains('I'));
        }
        assert_eq!(normalize_invite_code("  abc234 "), "ABC234");
    }

    #[test]
    fn test_tree_layout() {
        assert!(tree_layout(0).is_empty());
        assert_eq!(tree_layout(1), vec![(50.0, 50.0)]);

        for total in [2, 3, 7, 10, 55, 200] {
            let positions = tree_layout(total);
            assert_eq!(positions.len(), total as usize);
            assert!(positions
                .iter()
                .all(|&(x, y)| (0.0..=100.0).contains(&x) && (0.0..=100.0).contains(&y)));
        }

        // Rows of 1, 2, 3: the apex is centred at the top and rows widen downwards.
        let six = tree_layout(6);
        assert_eq!(six[0], (50.0, 15.0));
        assert_eq!(six[1].1, 50.0);
        assert_eq!(six[5].1, 85.0);
        assert!(six[3].0 < six[1].0 && six[5].0 > six[2].0);
    }

    #[test]
    fn test_validate_new_game() {
        assert_eq!(validate_new_game("  Xmas  ", 30), Ok("Xmas".to_string()));
        assert_eq!(
            validate_new_game("", 30),
            Err(ValidationError::Required("Title"))
        );
        assert!(matches!(
            validate_new_game("Xmas", 0),
            Err(ValidationError::OutOfRange { .. })
        ));
        assert!(matches!(
            validate_new_game("Xmas", MAX_SLOTS + 1),
            Err(ValidationError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_validate_reservation() {
        let ok = validate_reservation(NewReservation {
            name: " Kim ".to_string(),
            contact: "010-1234".to_string(),
            event_date: Some("  ".to_string()),
            party_size: 4,
            message: Some(" window seat ".to_string()),
        })
        .expect("valid reservation");
        assert_eq!(ok.name, "Kim");
        assert_eq!(ok.event_date, None);
        assert_eq!(ok.message.as_deref(), Some("window seat"));

        let err = validate_reservation(NewReservation {
            name: "Kim".to_string(),
            contact: "".to_string(),
            party_size: 2,
            ..Default::default()
        })
        .expect_err("contact is required");
        assert_eq!(err, ValidationError::Required("Contact"));

        let err = validate_reservation(NewReservation {
            name: "Kim".to_string(),
            contact: "kim@example.com".to_string(),
            party_size: 0,
            ..Default::default()
        })
        .expect_err("party size is bounded");
        assert!(matches!(err, ValidationError::OutOfRange { .. }));
    }

    #[test]
    fn test_validate_side_application() {
        let err = validate_side_application(NewSideApplication {
            name: "Lee".to_string(),
            contact: "lee@example.com".to_string(),
            category: " ".to_string(),
            description: None,
        })
        .expect_err("category is required");
        assert_eq!(err, ValidationError::Required("Category"));
    }

    #[test]
    fn test_validate_player_name() {
        assert_eq!(validate_player_name(" Ana "), Ok("Ana".to_string()));
        assert!(validate_player_name("   ").is_err());
        assert!(validate_player_name(&"x".repeat(MAX_PLAYER_NAME + 1)).is_err());
        // Length is counted in characters, not bytes.
        assert!(validate_player_name(&"별".repeat(MAX_PLAYER_NAME)).is_ok());
    }

    #[test]
    fn test_parse_prize_lines() {
        let updates = parse_prize_lines("Gift card | A | yes\n\nCandy\n  Mug|B|no  \n")
            .expect("should parse");
        assert_eq!(
            updates,
            vec![
                PrizeUpdate {
                    prize_name: "Gift card".to_string(),
                    prize_grade: "A".to_string(),
                    is_winner: true
                },
                PrizeUpdate {
                    prize_name: "Candy".to_string(),
                    prize_grade: String::new(),
                    is_winner: false
                },
                PrizeUpdate {
                    prize_name: "Mug".to_string(),
                    prize_grade: "B".to_string(),
                    is_winner: false
                },
            ]
        );

        let err = parse_prize_lines("Candy\n|A|yes").expect_err("empty name");
        assert!(matches!(err, ValidationError::BadLine { line: 2, .. }));

        let err = parse_prize_lines("Candy|A|maybe").expect_err("bad flag");
        assert!(matches!(err, ValidationError::BadLine { line: 1, .. }));
    }

    fn prize(slot_number: i32, is_drawn: bool) -> Prize {
        Prize {
            id: slot_number,
            game_id: 1,
            slot_number,
            prize_name: format!("Prize {}", slot_number),
            prize_grade: "A".to_string(),
            is_winner: true,
            is_drawn,
            position_x: 50.0,
            position_y: 50.0,
            sprite_offset_x: 0,
            sprite_offset_y: 0,
        }
    }

    #[test]
    fn test_redact_prizes() {
        let hidden = redact_prizes(vec![prize(1, false), prize(2, true)], false);
        assert_eq!(hidden[0].prize_name, "");
        assert_eq!(hidden[0].prize_grade, "");
        assert!(!hidden[0].is_winner);
        assert_eq!(hidden[1], prize(2, true));

        // Names may be shown up front, but the winning flag stays hidden until drawn.
        let shown = redact_prizes(vec![prize(1, false)], true);
        assert_eq!(shown[0].prize_name, "Prize 1");
        assert!(!shown[0].is_winner);
    }

    #[test]
    fn test_invite_url() {
        assert_eq!(
            invite_url("https", "party.example.com/", "ABC234"),
            "https://party.example.com/ABC234"
        );
    }

    #[test]
    fn test_invite_qr_svg() {
        let svg = invite_qr_svg("https://example.com/ABC234").expect("should render");
        assert!(svg.contains("<svg"));
    }
}

#[cfg(all(test, feature = "ssr"))]
mod db_tests {
    use super::*;
    use crate::model::GameStatus;

    const SCHEMA: &str = include_str!("../migrations/2025-12-01-000000_create_lucky_tree/up.sql");

    // Each test gets its own in-memory database with the schema applied.
    fn test_connection() -> SqliteConnection {
        let mut conn =
            SqliteConnection::establish(":memory:").expect("Failed to open in-memory database");
        conn.batch_execute("PRAGMA foreign_keys = ON;")
            .expect("Failed to enable foreign keys");
        conn.batch_execute(SCHEMA).expect("Failed to apply schema");
        conn
    }

    fn run_test<F>(test_fn: F)
    where
        F: FnOnce(&mut SqliteConnection) -> Result<(), diesel::result::Error>,
    {
        let mut conn = test_connection();
        test_fn(&mut conn).expect("test body returned a database error");
    }

    fn active_game(conn: &mut SqliteConnection, slots: i32) -> Result<Game, diesel::result::Error> {
        let game = create_game(conn, "Winter Party", slots)?;
        set_game_status(conn, game.id, GameStatus::Active)
    }

    #[test]
    fn test_create_game() {
        run_test(|conn| {
            let game = create_game(conn, "Winter Party", 10)?;
            assert_eq!(game.title, "Winter Party");
            assert_eq!(game.status(), GameStatus::Waiting);
            assert_eq!(game.total_slots, 10);
            assert_eq!(game.invite_code.len(), INVITE_CODE_LEN);

            let prizes = list_prizes(conn, game.id)?;
            assert_eq!(prizes.len(), 10);
            assert_eq!(
                prizes.iter().map(|p| p.slot_number).collect::<Vec<_>>(),
                (1..=10).collect::<Vec<_>>()
            );
            assert!(prizes.iter().all(|p| !p.is_drawn));

            // Lookup by invite code ignores case and whitespace.
            let lower = format!(" {} ", game.invite_code.to_lowercase());
            assert_eq!(get_game_by_invite_code(conn, &lower)?.id, game.id);
            assert!(matches!(
                get_game_by_invite_code(conn, "NOPE99"),
                Err(diesel::result::Error::NotFound)
            ));

            let other = create_game(conn, "Second", 3)?;
            assert_ne!(other.invite_code, game.invite_code);
            let listed = list_games(conn)?;
            assert_eq!(listed.len(), 2);
            assert_eq!(listed[0].id, other.id);

            Ok(())
        });
    }

    #[test]
    fn test_draw_prize_success() {
        run_test(|conn| {
            let game = active_game(conn, 5)?;
            let prizes = list_prizes(conn, game.id)?;
            update_prize(
                conn,
                prizes[2].id,
                &PrizeUpdate {
                    prize_name: "Sled".to_string(),
                    prize_grade: "Grand".to_string(),
                    is_winner: true,
                },
            )?;

            let outcome = draw_prize(conn, game.id, 3, " Mia ", "session-a")?;
            assert!(outcome.success, "{:?}", outcome);
            assert_eq!(outcome.error, None);
            assert_eq!(outcome.slot_number, Some(3));
            assert_eq!(outcome.prize_name.as_deref(), Some("Sled"));
            assert_eq!(outcome.prize_grade.as_deref(), Some("Grand"));
            assert_eq!(outcome.is_winner, Some(true));
            assert!(outcome.draw_id.is_some());

            let prizes = list_prizes(conn, game.id)?;
            assert!(prizes[2].is_drawn);
            assert_eq!(prizes.iter().filter(|p| p.is_drawn).count(), 1);

            let draws = list_draws(conn, game.id)?;
            assert_eq!(draws.len(), 1);
            assert_eq!(draws[0].player_name, "Mia");
            assert_eq!(draws[0].slot_number, 3);

            let mine = find_session_draw(conn, game.id, "session-a")?.expect("draw exists");
            assert_eq!(Some(mine.id), outcome.draw_id);

            let stats = get_game_stats(conn, game.id)?;
            assert_eq!(
                stats,
                GameStats {
                    total: 5,
                    drawn: 1,
                    remaining: 4,
                    winners_drawn: 1
                }
            );

            Ok(())
        });
    }

    #[test]
    fn test_draw_prize_rejections() {
        run_test(|conn| {
            let game = create_game(conn, "Not yet", 3)?;

            let outcome = draw_prize(conn, game.id, 1, "Mia", "s1")?;
            assert!(!outcome.success);
            assert_eq!(outcome.error.as_deref(), Some("game_not_active"));

            set_game_status(conn, game.id, GameStatus::Active)?;

            let outcome = draw_prize(conn, game.id, 1, "   ", "s1")?;
            assert_eq!(outcome.error.as_deref(), Some("invalid_name"));

            let outcome = draw_prize(conn, game.id, 1, "Mia", " ")?;
            assert_eq!(outcome.error.as_deref(), Some("invalid_session"));

            let outcome = draw_prize(conn, 999, 1, "Mia", "s1")?;
            assert_eq!(outcome.error.as_deref(), Some("game_not_found"));

            let outcome = draw_prize(conn, game.id, 4, "Mia", "s1")?;
            assert_eq!(outcome.error.as_deref(), Some("invalid_slot"));

            let outcome = draw_prize(conn, game.id, 1, "Mia", "s1")?;
            assert!(outcome.success);

            // Another player cannot take the same slot.
            let outcome = draw_prize(conn, game.id, 1, "Leo", "s2")?;
            assert!(!outcome.success);
            assert_eq!(outcome.error.as_deref(), Some("slot_taken"));

            // The same session cannot draw twice, and is told what it already has.
            let outcome = draw_prize(conn, game.id, 2, "Mia", "s1")?;
            assert!(!outcome.success);
            assert_eq!(outcome.error.as_deref(), Some("already_drawn"));
            assert_eq!(outcome.slot_number, Some(1));

            assert_eq!(list_draws(conn, game.id)?.len(), 1);
            assert!(!list_prizes(conn, game.id)?[1].is_drawn);

            set_game_status(conn, game.id, GameStatus::Ended)?;
            let outcome = draw_prize(conn, game.id, 2, "Leo", "s2")?;
            assert_eq!(outcome.error.as_deref(), Some("game_not_active"));

            Ok(())
        });
    }

    #[test]
    fn test_sessions_are_per_game() {
        run_test(|conn| {
            let first = active_game(conn, 2)?;
            let second = active_game(conn, 2)?;
            assert!(draw_prize(conn, first.id, 1, "Mia", "s1")?.success);
            assert!(draw_prize(conn, second.id, 1, "Mia", "s1")?.success);
            Ok(())
        });
    }

    #[test]
    fn test_reset_game() {
        run_test(|conn| {
            let game = active_game(conn, 3)?;
            let other = active_game(conn, 3)?;
            draw_prize(conn, game.id, 1, "Mia", "s1")?;
            draw_prize(conn, game.id, 2, "Leo", "s2")?;
            draw_prize(conn, other.id, 1, "Ada", "s3")?;

            assert_eq!(reset_game(conn, game.id)?, 2);
            assert!(list_draws(conn, game.id)?.is_empty());
            assert!(list_prizes(conn, game.id)?.iter().all(|p| !p.is_drawn));
            assert_eq!(get_game(conn, game.id)?.status(), GameStatus::Active);

            // Other games are untouched.
            assert_eq!(list_draws(conn, other.id)?.len(), 1);

            // The slot and the session are both free again.
            assert!(draw_prize(conn, game.id, 1, "Mia", "s1")?.success);

            assert!(matches!(
                reset_game(conn, 999),
                Err(diesel::result::Error::NotFound)
            ));

            Ok(())
        });
    }

    #[test]
    fn test_delete_game_cascades() {
        run_test(|conn| {
            let game = active_game(conn, 3)?;
            draw_prize(conn, game.id, 1, "Mia", "s1")?;

            assert_eq!(delete_game(conn, game.id)?, 1);
            assert!(list_prizes(conn, game.id)?.is_empty());
            assert!(list_draws(conn, game.id)?.is_empty());
            assert!(matches!(
                get_game(conn, game.id),
                Err(diesel::result::Error::NotFound)
            ));
            assert_eq!(delete_game(conn, game.id)?, 0);

            Ok(())
        });
    }

    #[test]
    fn test_update_game_settings_and_music() {
        run_test(|conn| {
            let game = create_game(conn, "Party", 4)?;
            let mut settings = GameSettings::from(&game);
            settings.title = "Office Party".to_string();
            settings.background_url = Some("/bg.png".to_string());
            settings.sprite_columns = 0;
            settings.show_prize_names = true;

            let updated = update_game_settings(conn, game.id, &settings)?;
            assert_eq!(updated.title, "Office Party");
            assert_eq!(updated.background_url.as_deref(), Some("/bg.png"));
            assert_eq!(updated.sprite_columns, 1);
            assert!(updated.show_prize_names);

            let playing = set_music_state(conn, game.id, Some(" /jingle.mp3 "), true)?;
            assert_eq!(playing.music_url.as_deref(), Some("/jingle.mp3"));
            assert!(playing.music_playing);

            let silent = set_music_state(conn, game.id, None, true)?;
            assert_eq!(silent.music_url, None);
            assert!(!silent.music_playing);

            assert!(matches!(
                update_game_settings(conn, 999, &settings),
                Err(diesel::result::Error::NotFound)
            ));

            Ok(())
        });
    }

    #[test]
    fn test_assign_prizes_and_layout() {
        run_test(|conn| {
            let game = create_game(conn, "Party", 2)?;
            let updates = parse_prize_lines("Mug|B\nSled|A|yes\nExtra|C").expect("valid lines");
            assert_eq!(assign_prizes(conn, game.id, &updates)?, 2);

            let prizes = list_prizes(conn, game.id)?;
            assert_eq!(prizes[0].prize_name, "Mug");
            assert!(!prizes[0].is_winner);
            assert_eq!(prizes[1].prize_name, "Sled");
            assert!(prizes[1].is_winner);

            let moved = update_prize_layout(conn, prizes[0].id, (120.0, -5.0), (4, -2))?;
            assert_eq!((moved.position_x, moved.position_y), (100.0, 0.0));
            assert_eq!((moved.sprite_offset_x, moved.sprite_offset_y), (4, -2));

            assert!(matches!(
                assign_prizes(conn, 999, &updates),
                Err(diesel::result::Error::NotFound)
            ));

            Ok(())
        });
    }

    #[test]
    fn test_drawn_prize_is_locked() {
        run_test(|conn| {
            let game = active_game(conn, 2)?;
            let updates = parse_prize_lines("Sled|A|yes\nMug|B").expect("valid lines");
            assign_prizes(conn, game.id, &updates)?;

            let outcome = draw_prize(conn, game.id, 1, "Mia", "session-a")?;
            assert_eq!(outcome.prize_name.as_deref(), Some("Sled"));
            assert_eq!(outcome.is_winner, Some(true));

            let prizes = list_prizes(conn, game.id)?;
            let edit = PrizeUpdate {
                prize_name: "Nothing".to_string(),
                prize_grade: "Z".to_string(),
                is_winner: false,
            };
            assert_eq!(update_prize(conn, prizes[0].id, &edit)?, None);
            assert!(matches!(
                update_prize(conn, 999, &edit),
                Err(diesel::result::Error::NotFound)
            ));

            // Only the undrawn slot 2 takes the bulk edit.
            let bulk = parse_prize_lines("Nothing|Z|no\nCandle|C").expect("valid lines");
            assert_eq!(assign_prizes(conn, game.id, &bulk)?, 1);

            let mine = find_session_draw(conn, game.id, "session-a")?.expect("draw exists");
            assert_eq!(mine.prize_name, "Sled");
            assert_eq!(mine.prize_grade, "A");
            assert!(mine.is_winner);
            assert_eq!(list_draws(conn, game.id)?[0].prize_name, "Sled");
            assert_eq!(list_prizes(conn, game.id)?[1].prize_name, "Candle");

            // After a reset the slot is editable again.
            reset_game(conn, game.id)?;
            let edited = update_prize(conn, prizes[0].id, &edit)?.expect("undrawn prize");
            assert_eq!(edited.prize_name, "Nothing");

            Ok(())
        });
    }

    #[test]
    fn test_draw_conflicting_row_reports_slot_taken() {
        run_test(|conn| {
            let game = active_game(conn, 3)?;
            let prizes = list_prizes(conn, game.id)?;
            // A draw row for slot 2 that never flagged the prize as drawn.
            diesel::insert_into(draws::table)
                .values(&NewDraw {
                    game_id: game.id,
                    prize_id: prizes[1].id,
                    session_id: "session-x",
                    player_name: "Ghost",
                })
                .execute(conn)?;

            let outcome = draw_prize(conn, game.id, 2, "Mia", "session-a")?;
            assert!(!outcome.success);
            assert_eq!(outcome.error.as_deref(), Some("slot_taken"));

            // The failed claim rolled back, so the prize row is untouched.
            assert!(!list_prizes(conn, game.id)?[1].is_drawn);
            assert_eq!(find_session_draw(conn, game.id, "session-a")?, None);

            let outcome = draw_prize(conn, game.id, 3, "Mia", "session-a")?;
            assert!(outcome.success, "{:?}", outcome);

            Ok(())
        });
    }

    fn sample_template() -> TemplateInput {
        TemplateInput {
            name: "Classic".to_string(),
            background_url: Some("/tree.png".to_string()),
            sprite_url: Some("/ornaments.png".to_string()),
            sprite_columns: 5,
            sprite_cell_width: 48,
            sprite_cell_height: 48,
            sprite_origin_x: 2,
            sprite_origin_y: 2,
        }
    }

    #[test]
    fn test_templates() {
        run_test(|conn| {
            let template = create_template(conn, &sample_template())?;
            assert_eq!(template.name, "Classic");
            assert_eq!(list_templates(conn)?.len(), 1);

            let mut input = sample_template();
            input.name = "Classic Gold".to_string();
            input.background_url = None;
            let updated = update_template(conn, template.id, &input)?;
            assert_eq!(updated.name, "Classic Gold");
            assert_eq!(updated.background_url, None);

            set_template_slot(conn, template.id, 2, (3, 4), Some((10.0, 20.0)))?;
            // Upsert replaces the existing slot rather than adding another.
            let slot = set_template_slot(conn, template.id, 2, (5, 6), None)?;
            assert_eq!((slot.offset_x, slot.offset_y), (5, 6));
            assert_eq!(slot.position_x, None);

            let with_slots = get_template_with_slots(conn, template.id)?;
            assert_eq!(with_slots.slots.len(), 1);

            assert!(matches!(
                set_template_slot(conn, 999, 1, (0, 0), None),
                Err(diesel::result::Error::NotFound)
            ));

            Ok(())
        });
    }

    #[test]
    fn test_apply_and_delete_template() {
        run_test(|conn| {
            let game = create_game(conn, "Party", 3)?;
            let template = create_template(conn, &sample_template())?;
            set_template_slot(conn, template.id, 1, (7, 8), Some((33.0, 44.0)))?;
            set_template_slot(conn, template.id, 3, (-1, -1), None)?;

            let skinned = apply_template(conn, game.id, template.id)?;
            assert_eq!(skinned.template_id, Some(template.id));
            assert_eq!(skinned.sprite_url.as_deref(), Some("/ornaments.png"));
            assert_eq!(skinned.sprite_columns, 5);

            let before = list_prizes(conn, game.id)?;
            assert_eq!((before[0].sprite_offset_x, before[0].sprite_offset_y), (7, 8));
            assert_eq!((before[0].position_x, before[0].position_y), (33.0, 44.0));
            assert_eq!((before[2].sprite_offset_x, before[2].sprite_offset_y), (-1, -1));
            // Slot 3 has no position override, so it keeps the default tree layout.
            assert_eq!(before[2].position_y, tree_layout(3)[2].1);

            assert_eq!(delete_template(conn, template.id)?, 1);
            assert_eq!(get_game(conn, game.id)?.template_id, None);
            assert!(matches!(
                get_template_with_slots(conn, template.id),
                Err(diesel::result::Error::NotFound)
            ));

            Ok(())
        });
    }

    #[test]
    fn test_reservations_and_side_applications() {
        run_test(|conn| {
            let first = create_reservation(
                conn,
                &NewReservation {
                    name: "Kim".to_string(),
                    contact: "010-1111".to_string(),
                    event_date: Some("2026-12-24".to_string()),
                    party_size: 3,
                    message: None,
                },
            )?;
            let second = create_reservation(
                conn,
                &NewReservation {
                    name: "Park".to_string(),
                    contact: "010-2222".to_string(),
                    party_size: 2,
                    ..Default::default()
                },
            )?;
            let listed = list_reservations(conn)?;
            assert_eq!(
                listed.iter().map(|r| r.id).collect::<Vec<_>>(),
                vec![second.id, first.id]
            );
            assert_eq!(delete_reservation(conn, first.id)?, 1);
            assert_eq!(list_reservations(conn)?.len(), 1);

            let application = create_side_application(
                conn,
                &NewSideApplication {
                    name: "Lee".to_string(),
                    contact: "lee@example.com".to_string(),
                    category: "Food truck".to_string(),
                    description: Some("Hot chocolate".to_string()),
                },
            )?;
            assert_eq!(list_side_applications(conn)?, vec![application.clone()]);
            assert_eq!(delete_side_application(conn, application.id)?, 1);
            assert!(list_side_applications(conn)?.is_empty());

            Ok(())
        });
    }

    #[test]
    fn test_admin_sessions() {
        run_test(|conn| {
            let token = create_admin_session(conn, 24)?;
            assert!(Uuid::parse_str(&token).is_ok());
            assert!(validate_admin_token(conn, &token)?);
            assert!(!validate_admin_token(conn, "not-a-uuid")?);
            assert!(!validate_admin_token(conn, &Uuid::new_v4().to_string())?);

            // A session that has already expired is rejected and purged.
            let stale = create_admin_session(conn, -1)?;
            assert!(!validate_admin_token(conn, &stale)?);
            assert_eq!(purge_expired_admin_sessions(conn)?, 1);

            assert_eq!(delete_admin_session(conn, &token)?, 1);
            assert!(!validate_admin_token(conn, &token)?);

            Ok(())
        });
    }

    #[test]
    fn test_concurrent_draws_claim_each_slot_once() {
        use std::sync::{Arc, Barrier};
        use std::thread;

        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let url = dir.path().join("lucky.db").to_string_lossy().into_owned();
        let game_id = {
            let mut conn = SqliteConnection::establish(&url).expect("open database");
            configure_connection(&mut conn).expect("pragmas");
            conn.batch_execute(SCHEMA).expect("schema");
            active_game(&mut conn, 1).expect("game").id
        };

        let players = 8;
        let barrier = Arc::new(Barrier::new(players));
        let handles: Vec<_> = (0..players)
            .map(|i| {
                let url = url.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    let mut conn = SqliteConnection::establish(&url).expect("open database");
                    configure_connection(&mut conn).expect("pragmas");
                    barrier.wait();
                    draw_prize(&mut conn, game_id, 1, "Player", &format!("session-{}", i))
                        .expect("draw should not hit a database error")
                })
            })
            .collect();

        let outcomes: Vec<DrawOutcome> = handles
            .into_iter()
            .map(|h| h.join().expect("thread panicked"))
            .collect();
        assert_eq!(outcomes.iter().filter(|o| o.success).count(), 1);
        assert!(outcomes
            .iter()
            .filter(|o| !o.success)
            .all(|o| o.error.as_deref() == Some("slot_taken")));

        let mut conn = SqliteConnection::establish(&url).expect("open database");
        assert_eq!(list_draws(&mut conn, game_id).expect("list").len(), 1);
    }
}
