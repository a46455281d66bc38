use leptos::ev::SubmitEvent;
use leptos::logging::log;
use leptos::prelude::*;
use leptos::task::spawn_local;
use leptos_meta::{provide_meta_context, MetaTags, Stylesheet, Title};
use leptos_router::{
    components::{Route, Router, Routes},
    hooks::{use_navigate, use_params_map},
    path, NavigateOptions,
};

use crate::admin::{
    AdminDashboard, AdminGame, AdminLogin, AdminReservations, AdminSideApplications,
    AdminTemplate,
};
use crate::api::{
    draw_prize_handler, get_board, get_draw_feed, get_game_by_code, get_my_draw, hover_slot,
    submit_reservation, submit_side_application,
};
use crate::browser;
#[cfg(feature = "hydrate")]
use crate::model::GameEvent;
use crate::model::{DrawOutcome, Game, GameStatus, Prize};
use crate::normalize_invite_code;

/// Pause between the server answering a draw and the prize being revealed.
const REVEAL_DELAY_MS: u32 = 1200;

pub fn shell(options: LeptosOptions) -> impl IntoView {
    view! {
        <!DOCTYPE html>
        <html lang="en">
            <head>
                <meta charset="utf-8" />
                <meta name="viewport" content="width=device-width, initial-scale=1" />
                <AutoReload options=options.clone() />
                <HydrationScripts options />
                <MetaTags />
            </head>
            <body>
                <App />
            </body>
        </html>
    }
}

#[component]
pub fn App() -> impl IntoView {
    // Provides context that manages stylesheets, titles, meta tags, etc.
    provide_meta_context();

    view! {
        <Stylesheet id="leptos" href="/pkg/lucky-tree.css" />

        <Title text="Lucky Tree" />

        <Router>
            <main>
                <Routes fallback=|| "Page not found.".into_view()>
                    <Route path=path!("/") view=Home />
                    <Route path=path!("/reserve") view=Reserve />
                    <Route path=path!("/side") view=SideApply />
                    <Route path=path!("/admin") view=AdminDashboard />
                    <Route path=path!("/admin/login") view=AdminLogin />
                    <Route path=path!("/admin/reservations") view=AdminReservations />
                    <Route path=path!("/admin/side-applications") view=AdminSideApplications />
                    <Route path=path!("/admin/template/:template_id") view=AdminTemplate />
                    <Route path=path!("/admin/:game_id") view=AdminGame />
                    <Route path=path!("/game/:invite_code") view=GamePage />
                    <Route path=path!("/:invite_code") view=GamePage />
                </Routes>
            </main>
        </Router>
    }
}

#[component]
fn Home() -> impl IntoView {
    let code = RwSignal::new(String::new());
    let error = RwSignal::new(String::new());
    let navigate = use_navigate();

    let submit = move |ev: SubmitEvent| {
        ev.prevent_default();
        let c = normalize_invite_code(&code.get());
        if c.is_empty() {
            error.set("Please enter your invite code.".to_string());
            return;
        }
        let navigate = navigate.clone();
        spawn_local(async move {
            match get_game_by_code(c).await {
                Ok(game) => {
                    error.set(String::new());
                    navigate(&format!("/{}", game.invite_code), NavigateOptions::default());
                }
                Err(_) => error.set("No game found for that code.".to_string()),
            }
        });
    };

    view! {
        <div class="home">
            <h1>"Lucky Tree"</h1>
            <p>"Enter the invite code from your host to join the draw."</p>
            <form class="invite-form" on:submit=submit>
                <input
                    type="text"
                    class="invite-input"
                    maxlength="6"
                    placeholder="ABC234"
                    prop:value=move || code.get()
                    on:input=move |ev| code.set(event_target_value(&ev))
                />
                <button type="submit">"Join"</button>
            </form>
            {move || (!error.get().is_empty()).then(|| view! { <p class="error">{error.get()}</p> })}
            <nav class="home-links">
                <a href="/reserve">"Book a table"</a>
                <a href="/side">"Apply for a side booth"</a>
            </nav>
        </div>
    }
}

#[component]
fn GamePage() -> impl IntoView {
    let params = use_params_map();
    let invite_code = move || {
        params
            .read()
            .get("invite_code")
            .map(|c| normalize_invite_code(&c))
            .unwrap_or_default()
    };
    let game = Resource::new(invite_code, get_game_by_code);

    view! {
        <Suspense fallback=|| view! { <p class="loading">"Loading..."</p> }>
            {move || {
                game.with(|res| match res {
                    Some(Ok(game)) => view! { <GameBoard initial=game.clone() /> }.into_any(),
                    Some(Err(_)) => {
                        view! {
                            <div class="not-found">
                                <h1>"Game not found"</h1>
                                <p>"Check your invite code and try again."</p>
                                <a href="/">"Back"</a>
                            </div>
                        }
                            .into_any()
                    }
                    None => view! {}.into_any(),
                })
            }}
        </Suspense>
    }
}

fn ornament_style(game: &Game, prize: &Prize) -> String {
    let mut style = format!("left: {}%; top: {}%;", prize.position_x, prize.position_y);
    if let Some(url) = &game.sprite_url {
        let crop = game
            .sprite_sheet()
            .crop_for_slot(prize.slot_number, (prize.sprite_offset_x, prize.sprite_offset_y));
        style.push(' ');
        style.push_str(&crop.css(url));
    }
    style
}

fn board_style(game: &Game) -> String {
    let mut style = format!("--theme: {};", game.theme_color);
    if let Some(url) = &game.background_url {
        style.push_str(&format!(" background-image: url('{}');", url));
    }
    style
}

#[component]
fn GameBoard(initial: Game) -> impl IntoView {
    let game_id = initial.id;
    let invite_code = initial.invite_code.clone();

    // Bumped on every change event; every resource below refetches from it.
    let version = RwSignal::new(0u32);
    let refresh = move || version.update(|v| *v += 1);

    let game = RwSignal::new(initial);
    let board = Resource::new(move || version.get(), move |_| get_board(game_id));
    let feed = Resource::new(move || version.get(), move |_| get_draw_feed(game_id));

    let player_name = RwSignal::new(String::new());
    let session_id = RwSignal::new(None::<String>);
    let mine = RwSignal::new(None::<DrawOutcome>);
    let selected = RwSignal::new(None::<i32>);
    let hovered = RwSignal::new(None::<(i32, String)>);
    let pending = RwSignal::new(false);
    let revealing = RwSignal::new(false);
    let result = RwSignal::new(None::<DrawOutcome>);
    let error = RwSignal::new(String::new());
    let show_welcome = RwSignal::new(false);

    let code = invite_code.clone();
    Effect::new(move |prev: Option<u32>| {
        let current = version.get();
        if prev.is_some() {
            let code = code.clone();
            spawn_local(async move {
                if let Ok(fresh) = get_game_by_code(code).await {
                    game.set(fresh);
                }
            });
        }
        current
    });

    // Restore the player's identity and any earlier draw.
    let popup_code = invite_code.clone();
    Effect::new(move || {
        if let Some(name) = browser::player_name() {
            player_name.set(name);
        }
        show_welcome.set(browser::take_popup_flag(&popup_code));
        let sid = browser::session_id();
        session_id.set(sid.clone());
        if let Some(sid) = sid {
            spawn_local(async move {
                match get_my_draw(game_id, sid).await {
                    Ok(Some(record)) => mine.set(Some(DrawOutcome::won(&record))),
                    Ok(None) => {}
                    Err(e) => log!("Failed to load earlier draw: {}", e),
                }
            });
        }
    });

    Effect::new(move || {
        #[cfg(feature = "hydrate")]
        {
            let connected = crate::realtime::watch_game_feed(game_id, move |event| match event {
                GameEvent::SlotHover {
                    slot_number,
                    player_name,
                } => hovered.set(Some((slot_number, player_name))),
                event if event.changes_state() => refresh(),
                _ => {}
            });
            if !connected {
                log!("Live updates unavailable for game {}", game_id);
            }
        }
    });

    let choose = move |slot_number: i32| {
        if mine.with(|m| m.is_some()) || pending.get() {
            return;
        }
        selected.set(Some(slot_number));
        error.set(String::new());
        let name = player_name.get_untracked();
        if !name.trim().is_empty() {
            spawn_local(async move {
                let _ = hover_slot(game_id, slot_number, name).await;
            });
        }
    };

    let draw = move |_: leptos::ev::MouseEvent| {
        let Some(slot_number) = selected.get() else {
            return;
        };
        let name = player_name.get().trim().to_string();
        if name.is_empty() {
            error.set("Please enter your name first.".to_string());
            return;
        }
        if name.chars().count() > crate::MAX_PLAYER_NAME {
            error.set(format!(
                "Names can be at most {} characters.",
                crate::MAX_PLAYER_NAME
            ));
            return;
        }
        let Some(sid) = session_id.get() else {
            error.set("Your browser is blocking storage, so the draw cannot be saved.".to_string());
            return;
        };
        browser::set_player_name(&name);
        pending.set(true);
        error.set(String::new());

        spawn_local(async move {
            match draw_prize_handler(game_id, slot_number, name, sid).await {
                Ok(outcome) if outcome.success => {
                    revealing.set(true);
                    gloo_timers::future::TimeoutFuture::new(REVEAL_DELAY_MS).await;
                    revealing.set(false);
                    selected.set(None);
                    mine.set(Some(outcome.clone()));
                    result.set(Some(outcome));
                    refresh();
                }
                Ok(outcome) if outcome.error.as_deref() == Some("already_drawn") => {
                    selected.set(None);
                    mine.set(Some(outcome.clone()));
                    result.set(Some(outcome));
                }
                Ok(outcome) => {
                    error.set(
                        outcome
                            .message
                            .unwrap_or_else(|| "The draw did not go through.".to_string()),
                    );
                    refresh();
                }
                Err(e) => error.set(e.to_string()),
            }
            pending.set(false);
        });
    };

    let status_banner = move || match game.with(|g| g.status()) {
        GameStatus::Waiting => Some("The draw has not started yet. Hang tight!"),
        GameStatus::Ended => Some("The draw is over. Thanks for playing!"),
        GameStatus::Active => None,
    };

    view! {
        <div class="game" style=move || game.with(board_style)>
            <header class="game-header">
                <h1>{move || game.with(|g| g.title.clone())}</h1>
                {move || status_banner().map(|text| view! { <p class="status-banner">{text}</p> })}
            </header>

            {move || {
                game.with(|g| match (&g.music_url, g.music_playing) {
                    (Some(url), true) => {
                        view! { <audio class="music" src=url.clone() autoplay=true controls=true /> }
                            .into_any()
                    }
                    _ => view! {}.into_any(),
                })
            }}

            <section class="player">
                <label>
                    "Your name: "
                    <input
                        type="text"
                        maxlength="40"
                        prop:value=move || player_name.get()
                        prop:disabled=move || mine.with(|m| m.is_some())
                        on:input=move |ev| player_name.set(event_target_value(&ev))
                    />
                </label>
                {move || {
                    mine.get()
                        .map(|m| {
                            view! {
                                <p class="my-draw">
                                    "You opened ornament " {m.slot_number.unwrap_or_default()} ": "
                                    <strong>{m.prize_name.unwrap_or_default()}</strong>
                                </p>
                            }
                        })
                }}
            </section>

            <div class="tree">
                <Suspense fallback=|| view! { <p class="loading">"Decorating the tree..."</p> }>
                    {move || {
                        board
                            .with(|res| match res {
                                Some(Ok(prizes)) => {
                                    prizes
                                        .iter()
                                        .map(|prize| {
                                            let slot = prize.slot_number;
                                            let drawn = prize.is_drawn;
                                            let style = game.with(|g| ornament_style(g, prize));
                                            let label = if drawn && !prize.prize_name.is_empty() {
                                                prize.prize_name.clone()
                                            } else {
                                                slot.to_string()
                                            };
                                            let class = move || {
                                                let mut class = String::from("ornament");
                                                if drawn {
                                                    class.push_str(" drawn");
                                                }
                                                if selected.get() == Some(slot) {
                                                    class.push_str(" selected");
                                                }
                                                if hovered.with(|h| matches!(h, Some((s, _)) if *s == slot)) {
                                                    class.push_str(" hovered");
                                                }
                                                class
                                            };
                                            view! {
                                                <button
                                                    class=class
                                                    style=style
                                                    disabled=drawn
                                                    on:click=move |_| choose(slot)
                                                >
                                                    <span class="ornament-label">{label}</span>
                                                </button>
                                            }
                                        })
                                        .collect_view()
                                        .into_any()
                                }
                                Some(Err(e)) => {
                                    view! { <p class="error">"Error loading the tree: " {e.to_string()}</p> }
                                        .into_any()
                                }
                                None => view! {}.into_any(),
                            })
                    }}
                </Suspense>
            </div>

            {move || {
                hovered
                    .get()
                    .map(|(slot, name)| {
                        view! { <p class="hover-note">{name} " is eyeing ornament " {slot}</p> }
                    })
            }}

            {move || {
                selected
                    .get()
                    .map(|slot| {
                        view! {
                            <div class="draw-bar">
                                <span>"Ornament " {slot} " selected"</span>
                                <button
                                    class="btn-draw"
                                    prop:disabled=move || pending.get() || !game.with(Game::is_active)
                                    on:click=draw
                                >
                                    {move || if revealing.get() { "Opening..." } else { "Open it!" }}
                                </button>
                                <button class="btn-cancel" on:click=move |_| selected.set(None)>
                                    "Cancel"
                                </button>
                            </div>
                        }
                    })
            }}

            {move || (!error.get().is_empty()).then(|| view! { <p class="error">{error.get()}</p> })}

            <Show when=move || game.with(|g| g.show_draw_feed)>
                <section class="draw-feed">
                    <h2>"Latest draws"</h2>
                    <Suspense fallback=|| view! { "Loading..." }>
                        {move || {
                            feed.with(|res| match res {
                                Some(Ok(draws)) if draws.is_empty() => {
                                    view! { <p>"No ornaments opened yet."</p> }.into_any()
                                }
                                Some(Ok(draws)) => {
                                    view! {
                                        <ul>
                                            {draws
                                                .iter()
                                                .map(|d| {
                                                    let class = if d.is_winner { "winner" } else { "" };
                                                    view! {
                                                        <li class=class>
                                                            {d.player_name.clone()} " opened #" {d.slot_number}
                                                            ": " {d.prize_name.clone()}
                                                        </li>
                                                    }
                                                })
                                                .collect_view()}
                                        </ul>
                                    }
                                        .into_any()
                                }
                                _ => view! {}.into_any(),
                            })
                        }}
                    </Suspense>
                </section>
            </Show>

            {move || {
                result
                    .get()
                    .map(|outcome| {
                        let heading = if outcome.success {
                            if outcome.is_winner.unwrap_or(false) {
                                "You won!"
                            } else {
                                "Here is your prize"
                            }
                        } else {
                            "You have already drawn"
                        };
                        view! {
                            <div class="dialog-backdrop">
                                <div class="dialog result-dialog">
                                    <h2>{heading}</h2>
                                    <p class="prize-name">{outcome.prize_name.clone().unwrap_or_default()}</p>
                                    {outcome
                                        .prize_grade
                                        .clone()
                                        .filter(|g| !g.is_empty())
                                        .map(|g| view! { <p class="prize-grade">{g}</p> })}
                                    {outcome.message.clone().map(|m| view! { <p>{m}</p> })}
                                    <button on:click=move |_| result.set(None)>"Close"</button>
                                </div>
                            </div>
                        }
                    })
            }}

            <Show when=move || show_welcome.get()>
                <div class="dialog-backdrop">
                    <div class="dialog welcome-dialog">
                        <h2>"Welcome to " {move || game.with(|g| g.title.clone())}</h2>
                        <p>"Enter your name, pick one ornament, and open it to see your prize."</p>
                        <p>"Each guest gets one draw."</p>
                        <button on:click=move |_| show_welcome.set(false)>"Let's go"</button>
                    </div>
                </div>
            </Show>
        </div>
    }
}

#[component]
fn Reserve() -> impl IntoView {
    let name = RwSignal::new(String::new());
    let contact = RwSignal::new(String::new());
    let event_date = RwSignal::new(String::new());
    let party_size = RwSignal::new(2i32);
    let message = RwSignal::new(String::new());
    let error = RwSignal::new(String::new());
    let done = RwSignal::new(false);

    let submit = move |ev: SubmitEvent| {
        ev.prevent_default();
        if name.get().trim().is_empty() || contact.get().trim().is_empty() {
            error.set("Name and contact are required.".to_string());
            return;
        }
        let (n, c, d, p, m) = (
            name.get(),
            contact.get(),
            Some(event_date.get()),
            party_size.get(),
            Some(message.get()),
        );
        spawn_local(async move {
            match submit_reservation(n, c, d, p, m).await {
                Ok(()) => {
                    error.set(String::new());
                    done.set(true);
                }
                Err(e) => error.set(e.to_string()),
            }
        });
    };

    view! {
        <div class="public-form">
            <h1>"Book a table"</h1>
            <Show
                when=move || done.get()
                fallback=move || {
                    view! {
                        <form on:submit=submit>
                            <label>
                                "Name: "
                                <input type="text" on:input=move |ev| name.set(event_target_value(&ev)) />
                            </label>
                            <label>
                                "Phone or email: "
                                <input
                                    type="text"
                                    on:input=move |ev| contact.set(event_target_value(&ev))
                                />
                            </label>
                            <label>
                                "Date: "
                                <input
                                    type="date"
                                    on:input=move |ev| event_date.set(event_target_value(&ev))
                                />
                            </label>
                            <label>
                                "Party size: "
                                <input
                                    type="number"
                                    min="1"
                                    max=crate::MAX_PARTY_SIZE.to_string()
                                    prop:value=move || party_size.get().to_string()
                                    on:input=move |ev| {
                                        party_size.set(event_target_value(&ev).parse().unwrap_or(0))
                                    }
                                />
                            </label>
                            <label>
                                "Message: "
                                <textarea on:input=move |ev| message.set(event_target_value(&ev))></textarea>
                            </label>
                            <button type="submit">"Send"</button>
                        </form>
                    }
                }
            >
                <p class="success">"Thanks! We will be in touch to confirm your booking."</p>
            </Show>
            {move || (!error.get().is_empty()).then(|| view! { <p class="error">{error.get()}</p> })}
            <a href="/">"Back"</a>
        </div>
    }
}

#[component]
fn SideApply() -> impl IntoView {
    let name = RwSignal::new(String::new());
    let contact = RwSignal::new(String::new());
    let category = RwSignal::new(String::new());
    let description = RwSignal::new(String::new());
    let error = RwSignal::new(String::new());
    let done = RwSignal::new(false);

    let submit = move |ev: SubmitEvent| {
        ev.prevent_default();
        if name.get().trim().is_empty()
            || contact.get().trim().is_empty()
            || category.get().trim().is_empty()
        {
            error.set("Name, contact, and category are required.".to_string());
            return;
        }
        let (n, c, cat, d) = (
            name.get(),
            contact.get(),
            category.get(),
            Some(description.get()),
        );
        spawn_local(async move {
            match submit_side_application(n, c, cat, d).await {
                Ok(()) => {
                    error.set(String::new());
                    done.set(true);
                }
                Err(e) => error.set(e.to_string()),
            }
        });
    };

    view! {
        <div class="public-form">
            <h1>"Apply for a side booth"</h1>
            <Show
                when=move || done.get()
                fallback=move || {
                    view! {
                        <form on:submit=submit>
                            <label>
                                "Name: "
                                <input type="text" on:input=move |ev| name.set(event_target_value(&ev)) />
                            </label>
                            <label>
                                "Phone or email: "
                                <input
                                    type="text"
                                    on:input=move |ev| contact.set(event_target_value(&ev))
                                />
                            </label>
                            <label>
                                "Category: "
                                <input
                                    type="text"
                                    placeholder="Food, crafts, games..."
                                    on:input=move |ev| category.set(event_target_value(&ev))
                                />
                            </label>
                            <label>
                                "Tell us about it: "
                                <textarea on:input=move |ev| {
                                    description.set(event_target_value(&ev))
                                }></textarea>
                            </label>
                            <button type="submit">"Apply"</button>
                        </form>
                    }
                }
            >
                <p class="success">"Thanks for applying! We will get back to you soon."</p>
            </Show>
            {move || (!error.get().is_empty()).then(|| view! { <p class="error">{error.get()}</p> })}
            <a href="/">"Back"</a>
        </div>
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game() -> Game {
        Game {
            id: 1,
            invite_code: "ABC234".to_string(),
            title: "Party".to_string(),
            status: "active".to_string(),
            total_slots: 3,
            theme_color: "#1f6f43".to_string(),
            background_url: None,
            sprite_url: None,
            sprite_columns: 2,
            sprite_cell_width: 40,
            sprite_cell_height: 40,
            sprite_origin_x: 0,
            sprite_origin_y: 0,
            show_prize_names: false,
            show_draw_feed: true,
            music_url: None,
            music_playing: false,
            template_id: None,
            created_at: chrono::NaiveDateTime::default(),
        }
    }

    fn prize(slot_number: i32) -> Prize {
        Prize {
            id: slot_number,
            game_id: 1,
            slot_number,
            prize_name: String::new(),
            prize_grade: String::new(),
            is_winner: false,
            is_drawn: false,
            position_x: 25.0,
            position_y: 75.5,
            sprite_offset_x: 1,
            sprite_offset_y: 2,
        }
    }

    #[test]
    fn test_ornament_style_without_sprite() {
        assert_eq!(ornament_style(&game(), &prize(1)), "left: 25%; top: 75.5%;");
    }

    #[test]
    fn test_ornament_style_with_sprite() {
        let mut g = game();
        g.sprite_url = Some("/sheet.png".to_string());
        // Slot 3 is the first cell of the second row, nudged by the prize's offset.
        let style = ornament_style(&g, &prize(3));
        assert!(style.starts_with("left: 25%; top: 75.5%; "));
        assert!(style.contains("background-image: url('/sheet.png');"));
        assert!(style.contains("background-position: -1px -42px;"));
    }

    #[test]
    fn test_board_style() {
        let mut g = game();
        assert_eq!(board_style(&g), "--theme: #1f6f43;");
        g.background_url = Some("/tree.jpg".to_string());
        assert_eq!(
            board_style(&g),
            "--theme: #1f6f43; background-image: url('/tree.jpg');"
        );
    }
}
