use leptos::prelude::*;
use leptos::server_fn::error::NoCustomError;

use crate::model::{
    DrawOutcome, DrawRecord, Game, GameSettings, GameStats, Prize, PrizeUpdate, Reservation,
    SideApplication, Template, TemplateInput, TemplateSlot, TemplateWithSlots,
};

#[cfg(feature = "ssr")]
use std::sync::Arc;

#[cfg(feature = "ssr")]
use diesel::SqliteConnection;

#[cfg(feature = "ssr")]
use crate::config::ServerConfig;
#[cfg(feature = "ssr")]
use crate::model::{GameEvent, GameStatus, NewReservation, NewSideApplication};
#[cfg(feature = "ssr")]
use crate::realtime::RealtimeHub;
#[cfg(feature = "ssr")]
use crate::DbPool;

pub const ADMIN_COOKIE: &str = "admin_token";
pub const DRAW_FEED_LIMIT: usize = 20;

#[cfg(feature = "ssr")]
fn server_err(message: impl ToString) -> ServerFnError<NoCustomError> {
    ServerFnError::<NoCustomError>::ServerError(message.to_string())
}

#[cfg(feature = "ssr")]
fn db_err(e: diesel::result::Error) -> ServerFnError<NoCustomError> {
    match e {
        diesel::result::Error::NotFound => server_err("Not found"),
        other => {
            tracing::error!(error = %other, "database error");
            server_err(other)
        }
    }
}

/// Runs `f` on a pooled connection off the async runtime.
#[cfg(feature = "ssr")]
async fn with_conn<T, F>(f: F) -> Result<T, ServerFnError<NoCustomError>>
where
    T: Send + 'static,
    F: FnOnce(&mut SqliteConnection) -> Result<T, diesel::result::Error> + Send + 'static,
{
    let pool: DbPool = expect_context();
    let result = tokio::task::spawn_blocking(move || {
        let mut conn = pool.get().map_err(server_err)?;
        f(&mut conn).map_err(db_err)
    })
    .await;
    match result {
        Ok(value) => value,
        Err(e) => Err(server_err(e)),
    }
}

#[cfg(feature = "ssr")]
fn publish(game_id: i32, event: GameEvent) {
    let hub: Arc<RealtimeHub> = expect_context();
    let delivered = hub.publish(game_id, event);
    tracing::debug!(game_id, delivered, "published game event");
}

/// Value of the admin cookie in a `Cookie` header, if present.
#[cfg(feature = "ssr")]
pub fn admin_token_from_cookies(cookie_header: &str) -> Option<String> {
    let prefix = format!("{}=", ADMIN_COOKIE);
    cookie_header
        .split(';')
        .map(str::trim)
        .find_map(|cookie| cookie.strip_prefix(prefix.as_str()))
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

#[cfg(feature = "ssr")]
async fn extract_admin_token() -> Result<Option<String>, ServerFnError<NoCustomError>> {
    use axum::http::HeaderMap;
    use leptos_axum::extract;

    let headers: HeaderMap = extract().await.map_err(server_err)?;
    Ok(headers
        .get(axum::http::header::COOKIE)
        .and_then(|value| value.to_str().ok())
        .and_then(admin_token_from_cookies))
}

#[cfg(feature = "ssr")]
async fn extract_and_validate_admin_token() -> Result<Option<bool>, ServerFnError<NoCustomError>>
{
    match extract_admin_token().await? {
        Some(token) => {
            let valid =
                with_conn(move |conn| crate::validate_admin_token(conn, &token)).await?;
            Ok(Some(valid))
        }
        None => Ok(None),
    }
}

// Returns an empty result if the current request is from an admin, or an error otherwise.
#[cfg(feature = "ssr")]
async fn check_admin() -> Result<(), ServerFnError<NoCustomError>> {
    match extract_and_validate_admin_token().await? {
        Some(true) => Ok(()),
        _ => Err(server_err("Unauthorized")),
    }
}

#[cfg(feature = "ssr")]
fn set_admin_cookie(value: &str, max_age_secs: i64) -> Result<(), ServerFnError<NoCustomError>> {
    use leptos_axum::ResponseOptions;

    let resp: ResponseOptions = expect_context();
    let cookie = format!(
        "{}={}; Max-Age={}; Path=/; HttpOnly; SameSite=Strict",
        ADMIN_COOKIE, value, max_age_secs
    );
    resp.insert_header(
        axum::http::header::SET_COOKIE,
        axum::http::HeaderValue::from_str(&cookie).map_err(server_err)?,
    );
    Ok(())
}

// Player-facing functions.

#[server(GetGameByCode)]
pub async fn get_game_by_code(invite_code: String) -> Result<Game, ServerFnError<NoCustomError>> {
    with_conn(move |conn| crate::get_game_by_invite_code(conn, &invite_code)).await
}

/// Prizes as players see them: undrawn prizes are redacted unless the game shows prize names.
#[server(GetBoard)]
pub async fn get_board(game_id: i32) -> Result<Vec<Prize>, ServerFnError<NoCustomError>> {
    with_conn(move |conn| {
        let game = crate::get_game(conn, game_id)?;
        let prizes = crate::list_prizes(conn, game_id)?;
        Ok(crate::redact_prizes(prizes, game.show_prize_names))
    })
    .await
}

/// Most recent draws, or nothing when the game hides its draw feed.
#[server(GetDrawFeed)]
pub async fn get_draw_feed(game_id: i32) -> Result<Vec<DrawRecord>, ServerFnError<NoCustomError>> {
    with_conn(move |conn| {
        let game = crate::get_game(conn, game_id)?;
        if !game.show_draw_feed {
            return Ok(Vec::new());
        }
        let mut draws = crate::list_draws(conn, game_id)?;
        draws.truncate(DRAW_FEED_LIMIT);
        Ok(draws)
    })
    .await
}

#[server(GetMyDraw)]
pub async fn get_my_draw(
    game_id: i32,
    session_id: String,
) -> Result<Option<DrawRecord>, ServerFnError<NoCustomError>> {
    with_conn(move |conn| crate::find_session_draw(conn, game_id, session_id.trim())).await
}

#[server(DrawPrize)]
pub async fn draw_prize_handler(
    game_id: i32,
    slot_number: i32,
    player_name: String,
    session_id: String,
) -> Result<DrawOutcome, ServerFnError<NoCustomError>> {
    let name = player_name.clone();
    let outcome = with_conn(move |conn| {
        crate::draw_prize(conn, game_id, slot_number, &player_name, &session_id)
    })
    .await?;

    if outcome.success {
        tracing::info!(game_id, slot_number, "slot drawn");
        publish(
            game_id,
            GameEvent::SlotDrawn {
                slot_number,
                player_name: name.trim().to_string(),
                prize_name: outcome.prize_name.clone().unwrap_or_default(),
                prize_grade: outcome.prize_grade.clone().unwrap_or_default(),
                is_winner: outcome.is_winner.unwrap_or(false),
            },
        );
    } else {
        tracing::info!(
            game_id,
            slot_number,
            error = outcome.error.as_deref().unwrap_or_default(),
            "draw rejected"
        );
    }
    Ok(outcome)
}

/// Tells everyone else watching the game which ornament a player is looking at. Not persisted.
#[server(HoverSlot)]
pub async fn hover_slot(
    game_id: i32,
    slot_number: i32,
    player_name: String,
) -> Result<(), ServerFnError<NoCustomError>> {
    let player_name = crate::validate_player_name(&player_name).map_err(server_err)?;
    publish(
        game_id,
        GameEvent::SlotHover {
            slot_number,
            player_name,
        },
    );
    Ok(())
}

#[server(SubmitReservation)]
pub async fn submit_reservation(
    name: String,
    contact: String,
    event_date: Option<String>,
    party_size: i32,
    message: Option<String>,
) -> Result<(), ServerFnError<NoCustomError>> {
    let reservation = crate::validate_reservation(NewReservation {
        name,
        contact,
        event_date,
        party_size,
        message,
    })
    .map_err(server_err)?;
    let created = with_conn(move |conn| crate::create_reservation(conn, &reservation)).await?;
    tracing::info!(reservation_id = created.id, "reservation received");
    Ok(())
}

#[server(SubmitSideApplication)]
pub async fn submit_side_application(
    name: String,
    contact: String,
    category: String,
    description: Option<String>,
) -> Result<(), ServerFnError<NoCustomError>> {
    let application = crate::validate_side_application(NewSideApplication {
        name,
        contact,
        category,
        description,
    })
    .map_err(server_err)?;
    let created =
        with_conn(move |conn| crate::create_side_application(conn, &application)).await?;
    tracing::info!(application_id = created.id, "side application received");
    Ok(())
}

// Admin session.

// Checks if the current request is from an admin. Returns true if it is, false otherwise.
#[server(IsAdmin)]
pub async fn is_admin() -> Result<bool, ServerFnError<NoCustomError>> {
    let validity = extract_and_validate_admin_token().await?;
    Ok(validity.unwrap_or(false))
}

#[server(AdminLogin)]
pub async fn admin_login(password: String) -> Result<(), ServerFnError<NoCustomError>> {
    let config: ServerConfig = expect_context();
    if password != config.admin_password {
        tracing::warn!("admin login rejected");
        return Err(server_err("Invalid password"));
    }

    let ttl_hours = config.admin_session_hours;
    let token = with_conn(move |conn| {
        crate::purge_expired_admin_sessions(conn)?;
        crate::create_admin_session(conn, ttl_hours)
    })
    .await?;

    set_admin_cookie(&token, ttl_hours * 3600)?;
    tracing::info!("admin logged in");
    Ok(())
}

#[server(AdminLogout)]
pub async fn admin_logout() -> Result<(), ServerFnError<NoCustomError>> {
    if let Some(token) = extract_admin_token().await? {
        with_conn(move |conn| crate::delete_admin_session(conn, &token)).await?;
    }
    set_admin_cookie("", 0)
}

// Games.

#[server(ListGames)]
pub async fn list_games_handler() -> Result<Vec<Game>, ServerFnError<NoCustomError>> {
    check_admin().await?;
    with_conn(crate::list_games).await
}

#[server(CreateGame)]
pub async fn create_game_handler(
    title: String,
    total_slots: i32,
) -> Result<Game, ServerFnError<NoCustomError>> {
    check_admin().await?;
    let title = crate::validate_new_game(&title, total_slots).map_err(server_err)?;
    let game = with_conn(move |conn| crate::create_game(conn, &title, total_slots)).await?;
    tracing::info!(game_id = game.id, invite_code = %game.invite_code, "game created");
    Ok(game)
}

#[server(GetAdminGame)]
pub async fn get_admin_game(game_id: i32) -> Result<Game, ServerFnError<NoCustomError>> {
    check_admin().await?;
    with_conn(move |conn| crate::get_game(conn, game_id)).await
}

#[server(UpdateGameSettings)]
pub async fn update_game_settings_handler(
    game_id: i32,
    settings: GameSettings,
) -> Result<Game, ServerFnError<NoCustomError>> {
    check_admin().await?;
    if settings.title.trim().is_empty() {
        return Err(server_err("Title is required"));
    }
    let game =
        with_conn(move |conn| crate::update_game_settings(conn, game_id, &settings)).await?;
    publish(game_id, GameEvent::GameUpdated);
    Ok(game)
}

#[server(SetGameStatus)]
pub async fn set_game_status_handler(
    game_id: i32,
    status: String,
) -> Result<Game, ServerFnError<NoCustomError>> {
    check_admin().await?;
    let status: GameStatus = status.parse().map_err(server_err)?;
    let game = with_conn(move |conn| crate::set_game_status(conn, game_id, status)).await?;
    tracing::info!(game_id, status = %status, "game status changed");
    publish(game_id, GameEvent::GameUpdated);
    Ok(game)
}

#[server(SetMusic)]
pub async fn set_music_handler(
    game_id: i32,
    music_url: Option<String>,
    playing: bool,
) -> Result<Game, ServerFnError<NoCustomError>> {
    check_admin().await?;
    let game = with_conn(move |conn| {
        crate::set_music_state(conn, game_id, music_url.as_deref(), playing)
    })
    .await?;
    publish(
        game_id,
        GameEvent::MusicChanged {
            music_url: game.music_url.clone(),
            playing: game.music_playing,
        },
    );
    Ok(game)
}

#[server(ApplyTemplate)]
pub async fn apply_template_handler(
    game_id: i32,
    template_id: i32,
) -> Result<Game, ServerFnError<NoCustomError>> {
    check_admin().await?;
    let game = with_conn(move |conn| crate::apply_template(conn, game_id, template_id)).await?;
    publish(game_id, GameEvent::GameUpdated);
    Ok(game)
}

#[server(DeleteGame)]
pub async fn delete_game_handler(game_id: i32) -> Result<(), ServerFnError<NoCustomError>> {
    check_admin().await?;
    let deleted = with_conn(move |conn| crate::delete_game(conn, game_id)).await?;
    if deleted == 0 {
        return Err(server_err("Not found"));
    }
    tracing::info!(game_id, "game deleted");
    publish(game_id, GameEvent::GameUpdated);
    let hub: Arc<RealtimeHub> = expect_context();
    hub.close(game_id);
    Ok(())
}

#[server(ResetGame)]
pub async fn reset_game_handler(game_id: i32) -> Result<usize, ServerFnError<NoCustomError>> {
    check_admin().await?;
    let removed = with_conn(move |conn| crate::reset_game(conn, game_id)).await?;
    tracing::info!(game_id, removed, "game reset");
    publish(game_id, GameEvent::GameReset);
    Ok(removed)
}

#[server(GetGameStats)]
pub async fn get_game_stats_handler(
    game_id: i32,
) -> Result<GameStats, ServerFnError<NoCustomError>> {
    check_admin().await?;
    with_conn(move |conn| crate::get_game_stats(conn, game_id)).await
}

#[server(ListDraws)]
pub async fn list_draws_handler(
    game_id: i32,
) -> Result<Vec<DrawRecord>, ServerFnError<NoCustomError>> {
    check_admin().await?;
    with_conn(move |conn| crate::list_draws(conn, game_id)).await
}

/// The public link for a game and its QR code, built from the request's host.
#[server(GetInviteLink)]
pub async fn get_invite_link(
    invite_code: String,
) -> Result<(String, String), ServerFnError<NoCustomError>> {
    use axum::http::HeaderMap;
    use leptos_axum::extract;

    check_admin().await?;
    let headers: HeaderMap = extract().await.map_err(server_err)?;
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    };
    let host = header("x-forwarded-host")
        .or_else(|| header("host"))
        .unwrap_or_else(|| "localhost".to_string());
    let scheme = header("x-forwarded-proto").unwrap_or_else(|| "http".to_string());

    let url = crate::invite_url(&scheme, &host, &invite_code);
    let svg = crate::invite_qr_svg(&url).ok_or_else(|| server_err("Could not render QR code"))?;
    Ok((url, svg))
}

// Prizes.

#[server(ListPrizes)]
pub async fn list_prizes_handler(game_id: i32) -> Result<Vec<Prize>, ServerFnError<NoCustomError>> {
    check_admin().await?;
    with_conn(move |conn| crate::list_prizes(conn, game_id)).await
}

#[server(UpdatePrize)]
pub async fn update_prize_handler(
    prize_id: i32,
    update: PrizeUpdate,
) -> Result<Prize, ServerFnError<NoCustomError>> {
    check_admin().await?;
    if update.prize_name.trim().chars().count() > crate::MAX_PRIZE_NAME {
        return Err(server_err(format!(
            "Prize name must be at most {} characters",
            crate::MAX_PRIZE_NAME
        )));
    }
    let prize = with_conn(move |conn| crate::update_prize(conn, prize_id, &update))
        .await?
        .ok_or_else(|| server_err("This prize has already been drawn and can no longer change"))?;
    publish(
        prize.game_id,
        GameEvent::PrizeUpdated {
            slot_number: prize.slot_number,
        },
    );
    Ok(prize)
}

#[server(UpdatePrizeLayout)]
pub async fn update_prize_layout_handler(
    prize_id: i32,
    position_x: f64,
    position_y: f64,
    sprite_offset_x: i32,
    sprite_offset_y: i32,
) -> Result<Prize, ServerFnError<NoCustomError>> {
    check_admin().await?;
    let prize = with_conn(move |conn| {
        crate::update_prize_layout(
            conn,
            prize_id,
            (position_x, position_y),
            (sprite_offset_x, sprite_offset_y),
        )
    })
    .await?;
    publish(
        prize.game_id,
        GameEvent::PrizeUpdated {
            slot_number: prize.slot_number,
        },
    );
    Ok(prize)
}

/// Bulk assignment from text, one `name|grade|winner` line per slot.
#[server(AssignPrizes)]
pub async fn assign_prizes_handler(
    game_id: i32,
    lines: String,
) -> Result<usize, ServerFnError<NoCustomError>> {
    check_admin().await?;
    let updates = crate::parse_prize_lines(&lines).map_err(server_err)?;
    let updated = with_conn(move |conn| crate::assign_prizes(conn, game_id, &updates)).await?;
    tracing::info!(game_id, updated, "prizes assigned");
    publish(game_id, GameEvent::GameUpdated);
    Ok(updated)
}

// Templates.

#[server(ListTemplates)]
pub async fn list_templates_handler() -> Result<Vec<Template>, ServerFnError<NoCustomError>> {
    check_admin().await?;
    with_conn(crate::list_templates).await
}

#[server(CreateTemplate)]
pub async fn create_template_handler(
    input: TemplateInput,
) -> Result<Template, ServerFnError<NoCustomError>> {
    check_admin().await?;
    if input.name.trim().is_empty() {
        return Err(server_err("Name is required"));
    }
    with_conn(move |conn| crate::create_template(conn, &input)).await
}

#[server(GetTemplate)]
pub async fn get_template_handler(
    template_id: i32,
) -> Result<TemplateWithSlots, ServerFnError<NoCustomError>> {
    check_admin().await?;
    with_conn(move |conn| crate::get_template_with_slots(conn, template_id)).await
}

#[server(UpdateTemplate)]
pub async fn update_template_handler(
    template_id: i32,
    input: TemplateInput,
) -> Result<Template, ServerFnError<NoCustomError>> {
    check_admin().await?;
    if input.name.trim().is_empty() {
        return Err(server_err("Name is required"));
    }
    with_conn(move |conn| crate::update_template(conn, template_id, &input)).await
}

#[server(SetTemplateSlot)]
pub async fn set_template_slot_handler(
    template_id: i32,
    slot_number: i32,
    offset_x: i32,
    offset_y: i32,
    position_x: Option<f64>,
    position_y: Option<f64>,
) -> Result<TemplateSlot, ServerFnError<NoCustomError>> {
    check_admin().await?;
    if !(1..=crate::MAX_SLOTS).contains(&slot_number) {
        return Err(server_err(format!(
            "Slot must be between 1 and {}",
            crate::MAX_SLOTS
        )));
    }
    let position = position_x.zip(position_y);
    with_conn(move |conn| {
        crate::set_template_slot(conn, template_id, slot_number, (offset_x, offset_y), position)
    })
    .await
}

#[server(DeleteTemplate)]
pub async fn delete_template_handler(
    template_id: i32,
) -> Result<(), ServerFnError<NoCustomError>> {
    check_admin().await?;
    with_conn(move |conn| crate::delete_template(conn, template_id)).await?;
    Ok(())
}

// Reservations and side applications.

#[server(ListReservations)]
pub async fn list_reservations_handler(
) -> Result<Vec<Reservation>, ServerFnError<NoCustomError>> {
    check_admin().await?;
    with_conn(crate::list_reservations).await
}

#[server(DeleteReservation)]
pub async fn delete_reservation_handler(
    reservation_id: i32,
) -> Result<(), ServerFnError<NoCustomError>> {
    check_admin().await?;
    with_conn(move |conn| crate::delete_reservation(conn, reservation_id)).await?;
    Ok(())
}

#[server(ListSideApplications)]
pub async fn list_side_applications_handler(
) -> Result<Vec<SideApplication>, ServerFnError<NoCustomError>> {
    check_admin().await?;
    with_conn(crate::list_side_applications).await
}

#[server(DeleteSideApplication)]
pub async fn delete_side_application_handler(
    application_id: i32,
) -> Result<(), ServerFnError<NoCustomError>> {
    check_admin().await?;
    with_conn(move |conn| crate::delete_side_application(conn, application_id)).await?;
    Ok(())
}

#[cfg(all(test, feature = "ssr"))]
mod tests {
    use super::*;

    #[test]
    fn test_admin_token_from_cookies() {
        assert_eq!(
            admin_token_from_cookies("theme=dark; admin_token=abc-123; other=1"),
            Some("abc-123".to_string())
        );
        assert_eq!(admin_token_from_cookies("admin_token="), None);
        assert_eq!(admin_token_from_cookies("not_admin_token=x"), None);
        assert_eq!(admin_token_from_cookies(""), None);
    }
}
