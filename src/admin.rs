//! Organizer dashboard: games, prizes, templates, and the lead-capture inboxes.

use leptos::ev::SubmitEvent;
use leptos::logging::log;
use leptos::prelude::*;
use leptos::server_fn::error::NoCustomError;
use leptos::task::spawn_local;
use leptos_router::{
    hooks::{use_navigate, use_params_map},
    NavigateOptions,
};

use crate::api::{
    admin_login, admin_logout, apply_template_handler, assign_prizes_handler,
    create_game_handler, create_template_handler, delete_game_handler,
    delete_reservation_handler, delete_side_application_handler, delete_template_handler,
    get_admin_game, get_game_stats_handler, get_invite_link, get_template_handler, is_admin,
    list_draws_handler, list_games_handler, list_prizes_handler, list_reservations_handler,
    list_side_applications_handler, list_templates_handler, reset_game_handler,
    set_game_status_handler, set_music_handler, set_template_slot_handler,
    update_game_settings_handler, update_prize_handler, update_prize_layout_handler,
    update_template_handler,
};
use crate::model::{GameSettings, GameStatus, Prize, PrizeUpdate, TemplateInput};
use crate::sprite::SpriteSheet;

fn confirm(message: &str) -> bool {
    leptos::leptos_dom::helpers::window()
        .confirm_with_message(message)
        .unwrap_or(false)
}

/// Admin check for a page. Redirects to the login page once the server says no.
fn use_admin_guard() -> Resource<Result<bool, ServerFnError<NoCustomError>>> {
    let is_admin_fetcher = Resource::new(|| (), |_| is_admin());
    let navigate = use_navigate();
    Effect::new(move || {
        is_admin_fetcher.with(|maybe_result| {
            if let Some(Ok(false)) = maybe_result {
                navigate("/admin/login", NavigateOptions::default());
            }
        });
    });
    is_admin_fetcher
}

fn param_id(name: &'static str) -> impl Fn() -> i32 + Copy + Send + Sync + 'static {
    let params = use_params_map();
    move || {
        params
            .read()
            .get(name)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }
}

#[component]
pub fn AdminLogin() -> impl IntoView {
    let password = RwSignal::new(String::new());
    let error = RwSignal::new(String::new());
    let navigate = use_navigate();

    let submit = move |ev: SubmitEvent| {
        ev.prevent_default();
        let p = password.get();
        if p.is_empty() {
            error.set("Please enter password.".to_string());
            return;
        }
        let navigate = navigate.clone();
        spawn_local(async move {
            match admin_login(p).await {
                Ok(_) => {
                    error.set(String::new());
                    navigate("/admin", NavigateOptions::default());
                }
                Err(e) => error.set(e.to_string()),
            }
        });
    };

    view! {
        <div class="admin-login">
            <h1>"Admin Login"</h1>
            <form on:submit=submit>
                <label>
                    "Password: "
                    <input
                        type="password"
                        on:input=move |ev| password.set(event_target_value(&ev))
                    />
                </label>
                <button type="submit">"Login"</button>
            </form>
            {move || {
                if !error.get().is_empty() {
                    view! { <p class="error">{error.get()}</p> }.into_any()
                } else {
                    view! {}.into_any()
                }
            }}
        </div>
    }
}

#[component]
fn AdminNav() -> impl IntoView {
    let navigate = use_navigate();
    let logout = move |_| {
        let navigate = navigate.clone();
        spawn_local(async move {
            if let Err(e) = admin_logout().await {
                log!("Logout failed: {}", e);
            }
            navigate("/", NavigateOptions::default());
        });
    };

    view! {
        <header class="admin-header">
            <nav>
                <a href="/admin">"Games"</a>
                <a href="/admin/reservations">"Reservations"</a>
                <a href="/admin/side-applications">"Side applications"</a>
            </nav>
            <button class="btn-logout" on:click=logout>
                "Logout"
            </button>
        </header>
    }
}

#[component]
pub fn AdminDashboard() -> impl IntoView {
    let is_admin_fetcher = use_admin_guard();
    let games_fetcher = Resource::new(|| (), |_| list_games_handler());
    let templates_fetcher = Resource::new(|| (), |_| list_templates_handler());

    // Signals related to creating a game.
    let new_title = RwSignal::new(String::new());
    let new_slots = RwSignal::new(30i32);
    let create_error = RwSignal::new(String::new());

    let create_submit = move |ev: SubmitEvent| {
        ev.prevent_default();
        let title = new_title.get();
        let slots = new_slots.get();
        if title.trim().is_empty() {
            create_error.set("Title is required.".to_string());
            return;
        }
        spawn_local(async move {
            match create_game_handler(title, slots).await {
                Ok(_) => {
                    create_error.set(String::new());
                    new_title.set(String::new());
                    games_fetcher.refetch();
                }
                Err(e) => create_error.set(e.to_string()),
            }
        });
    };

    // Signals related to creating a template.
    let template_name = RwSignal::new(String::new());
    let template_error = RwSignal::new(String::new());

    let template_submit = move |ev: SubmitEvent| {
        ev.prevent_default();
        let name = template_name.get();
        if name.trim().is_empty() {
            template_error.set("Name is required.".to_string());
            return;
        }
        let input = TemplateInput {
            name,
            background_url: None,
            sprite_url: None,
            sprite_columns: 1,
            sprite_cell_width: 64,
            sprite_cell_height: 64,
            sprite_origin_x: 0,
            sprite_origin_y: 0,
        };
        spawn_local(async move {
            match create_template_handler(input).await {
                Ok(_) => {
                    template_error.set(String::new());
                    template_name.set(String::new());
                    templates_fetcher.refetch();
                }
                Err(e) => template_error.set(e.to_string()),
            }
        });
    };

    view! {
        <Suspense fallback=|| "Loading...">
            {move || {
                if let Some(Ok(true)) = is_admin_fetcher.get() {
                    view! {
                        <div class="admin-container">
                            <AdminNav />
                            <h1>"Games"</h1>

                            <section class="admin-section">
                                <h2>"New game"</h2>
                                <form class="admin-form" on:submit=create_submit>
                                    <label>
                                        "Title: "
                                        <input
                                            type="text"
                                            prop:value=move || new_title.get()
                                            on:input=move |ev| new_title.set(event_target_value(&ev))
                                        />
                                    </label>
                                    <label>
                                        "Slots: "
                                        <input
                                            type="number"
                                            min="1"
                                            max=crate::MAX_SLOTS.to_string()
                                            prop:value=move || new_slots.get().to_string()
                                            on:input=move |ev| {
                                                new_slots.set(event_target_value(&ev).parse().unwrap_or(0))
                                            }
                                        />
                                    </label>
                                    <button type="submit">"Create"</button>
                                </form>
                                {move || {
                                    (!create_error.get().is_empty())
                                        .then(|| view! { <p class="error">{create_error.get()}</p> })
                                }}
                            </section>

                            <section class="admin-section">
                                <h2>"All games"</h2>
                                <Suspense fallback=|| "Loading games...">
                                    {move || {
                                        games_fetcher
                                            .with(|res| match res {
                                                Some(Ok(games)) => {
                                                    view! {
                                                        <table class="admin-table">
                                                            <thead>
                                                                <tr>
                                                                    <th>"Title"</th>
                                                                    <th>"Code"</th>
                                                                    <th>"Status"</th>
                                                                    <th>"Slots"</th>
                                                                    <th>"Created"</th>
                                                                </tr>
                                                            </thead>
                                                            <tbody>
                                                                {games
                                                                    .iter()
                                                                    .map(|game| {
                                                                        view! {
                                                                            <tr>
                                                                                <td>
                                                                                    <a href=format!(
                                                                                        "/admin/{}",
                                                                                        game.id,
                                                                                    )>{game.title.clone()}</a>
                                                                                </td>
                                                                                <td>{game.invite_code.clone()}</td>
                                                                                <td>{game.status.clone()}</td>
                                                                                <td>{game.total_slots}</td>
                                                                                <td>
                                                                                    {game.created_at.format("%Y-%m-%d %H:%M").to_string()}
                                                                                </td>
                                                                            </tr>
                                                                        }
                                                                    })
                                                                    .collect_view()}
                                                            </tbody>
                                                        </table>
                                                    }
                                                        .into_any()
                                                }
                                                Some(Err(e)) => {
                                                    view! { <p class="error">{e.to_string()}</p> }.into_any()
                                                }
                                                None => view! {}.into_any(),
                                            })
                                    }}
                                </Suspense>
                            </section>

                            <section class="admin-section">
                                <h2>"Templates"</h2>
                                <form class="admin-form" on:submit=template_submit>
                                    <label>
                                        "Name: "
                                        <input
                                            type="text"
                                            prop:value=move || template_name.get()
                                            on:input=move |ev| template_name.set(event_target_value(&ev))
                                        />
                                    </label>
                                    <button type="submit">"Add template"</button>
                                </form>
                                {move || {
                                    (!template_error.get().is_empty())
                                        .then(|| view! { <p class="error">{template_error.get()}</p> })
                                }}
                                <Suspense fallback=|| "Loading templates...">
                                    {move || {
                                        templates_fetcher
                                            .with(|res| match res {
                                                Some(Ok(templates)) => {
                                                    view! {
                                                        <ul>
                                                            {templates
                                                                .iter()
                                                                .map(|t| {
                                                                    view! {
                                                                        <li>
                                                                            <a href=format!(
                                                                                "/admin/template/{}",
                                                                                t.id,
                                                                            )>{t.name.clone()}</a>
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
                        </div>
                    }
                        .into_any()
                } else {
                    view! {}.into_any()
                }
            }}
        </Suspense>
    }
}

#[component]
pub fn AdminGame() -> impl IntoView {
    let is_admin_fetcher = use_admin_guard();
    let game_id = param_id("game_id");

    let game_fetcher = Resource::new(game_id, get_admin_game);
    let prizes_fetcher = Resource::new(game_id, list_prizes_handler);
    let draws_fetcher = Resource::new(game_id, list_draws_handler);
    let stats_fetcher = Resource::new(game_id, get_game_stats_handler);
    let templates_fetcher = Resource::new(|| (), |_| list_templates_handler());
    let link_fetcher = Resource::new(
        move || game_fetcher.with(|g| g.as_ref().and_then(|r| r.as_ref().ok()).map(|g| g.invite_code.clone())),
        |code| async move {
            match code {
                Some(code) => get_invite_link(code).await.map(Some),
                None => Ok(None),
            }
        },
    );

    let refetch_all = move || {
        game_fetcher.refetch();
        prizes_fetcher.refetch();
        draws_fetcher.refetch();
        stats_fetcher.refetch();
    };

    // Draws made by players show up without reloading the page. Switching games reruns the
    // effect, which closes the previous game's feed.
    Effect::new(move || {
        let id = game_id();
        #[cfg(feature = "hydrate")]
        if id != 0 && !crate::realtime::watch_game_feed(id, move |event| {
            if event.changes_state() {
                refetch_all();
            }
        }) {
            log!("Live updates unavailable for game {}", id);
        }
        #[cfg(not(feature = "hydrate"))]
        let _ = id;
    });

    let action_error = RwSignal::new(String::new());
    let report = move |res: Result<(), ServerFnError<NoCustomError>>| match res {
        Ok(()) => {
            action_error.set(String::new());
            refetch_all();
        }
        Err(e) => action_error.set(e.to_string()),
    };

    let set_status = move |status: GameStatus| {
        let id = game_id();
        spawn_local(async move {
            report(
                set_game_status_handler(id, status.to_string())
                    .await
                    .map(|_| ()),
            );
        });
    };

    let reset = move |_| {
        let id = game_id();
        if !confirm("Remove every draw and put all ornaments back on the tree?") {
            return;
        }
        spawn_local(async move {
            report(reset_game_handler(id).await.map(|_| ()));
        });
    };

    let navigate = use_navigate();
    let delete = move |_| {
        let id = game_id();
        if !confirm("Delete this game, its prizes and its draws?") {
            return;
        }
        let navigate = navigate.clone();
        spawn_local(async move {
            match delete_game_handler(id).await {
                Ok(()) => navigate("/admin", NavigateOptions::default()),
                Err(e) => action_error.set(e.to_string()),
            }
        });
    };

    // Music.
    let music_url = RwSignal::new(String::new());
    Effect::new(move || {
        game_fetcher.with(|res| {
            if let Some(Ok(game)) = res {
                if music_url.get_untracked().is_empty() {
                    music_url.set(game.music_url.clone().unwrap_or_default());
                }
            }
        });
    });
    let set_music = move |playing: bool| {
        let id = game_id();
        let url = Some(music_url.get());
        spawn_local(async move {
            report(set_music_handler(id, url, playing).await.map(|_| ()));
        });
    };

    // Template.
    let chosen_template = RwSignal::new(0i32);
    let apply_template = move |_| {
        let id = game_id();
        let template_id = chosen_template.get();
        if template_id == 0 {
            action_error.set("Choose a template first.".to_string());
            return;
        }
        spawn_local(async move {
            report(apply_template_handler(id, template_id).await.map(|_| ()));
        });
    };

    // Bulk prizes.
    let bulk_lines = RwSignal::new(String::new());
    let bulk_result = RwSignal::new(String::new());
    let bulk_submit = move |ev: SubmitEvent| {
        ev.prevent_default();
        let id = game_id();
        let lines = bulk_lines.get();
        spawn_local(async move {
            match assign_prizes_handler(id, lines).await {
                Ok(updated) => {
                    action_error.set(String::new());
                    bulk_result.set(format!("Updated {} prizes.", updated));
                    refetch_all();
                }
                Err(e) => action_error.set(e.to_string()),
            }
        });
    };

    let on_saved = Callback::new(move |_: ()| refetch_all());

    view! {
        <Suspense fallback=|| "Loading...">
            {move || {
                if let Some(Ok(true)) = is_admin_fetcher.get() {
                    view! {
                        <div class="admin-container">
                            <AdminNav />
                            {move || {
                                game_fetcher
                                    .with(|res| match res {
                                        Some(Ok(game)) => {
                                            view! {
                                                <h1>{game.title.clone()}</h1>
                                                <p>
                                                    "Invite code: " <strong>{game.invite_code.clone()}</strong>
                                                    " | Status: " <strong>{game.status.clone()}</strong>
                                                </p>
                                                <SettingsForm
                                                    game_id=game.id
                                                    initial=GameSettings::from(game)
                                                    on_saved=on_saved
                                                />
                                            }
                                                .into_any()
                                        }
                                        Some(Err(e)) => {
                                            view! { <p class="error">{e.to_string()}</p> }.into_any()
                                        }
                                        None => view! {}.into_any(),
                                    })
                            }}

                            <section class="admin-section">
                                <h2>"Invite"</h2>
                                {move || {
                                    link_fetcher
                                        .with(|res| match res {
                                            Some(Ok(Some((url, svg)))) => {
                                                view! {
                                                    <p>
                                                        <a href=url.clone() target="_blank">{url.clone()}</a>
                                                    </p>
                                                    <div class="qr" inner_html=svg.clone()></div>
                                                }
                                                    .into_any()
                                            }
                                            _ => view! {}.into_any(),
                                        })
                                }}
                            </section>

                            <section class="admin-section">
                                <h2>"Status"</h2>
                                {move || {
                                    stats_fetcher
                                        .with(|res| match res {
                                            Some(Ok(stats)) => {
                                                view! {
                                                    <p class="stats">
                                                        {format!(
                                                            "{} of {} ornaments opened, {} left, {} winners drawn",
                                                            stats.drawn,
                                                            stats.total,
                                                            stats.remaining,
                                                            stats.winners_drawn,
                                                        )}
                                                    </p>
                                                }
                                                    .into_any()
                                            }
                                            _ => view! {}.into_any(),
                                        })
                                }}
                                <div class="button-row">
                                    {GameStatus::ALL
                                        .into_iter()
                                        .map(|status| {
                                            view! {
                                                <button on:click=move |_| set_status(status)>
                                                    {format!("Set {}", status)}
                                                </button>
                                            }
                                        })
                                        .collect_view()}
                                    <button class="btn-danger" on:click=reset>
                                        "Reset draws"
                                    </button>
                                    <button class="btn-danger" on:click=delete.clone()>
                                        "Delete game"
                                    </button>
                                </div>
                                {move || {
                                    (!action_error.get().is_empty())
                                        .then(|| view! { <p class="error">{action_error.get()}</p> })
                                }}
                            </section>

                            <section class="admin-section">
                                <h2>"Music"</h2>
                                <label>
                                    "Track URL: "
                                    <input
                                        type="text"
                                        prop:value=move || music_url.get()
                                        on:input=move |ev| music_url.set(event_target_value(&ev))
                                    />
                                </label>
                                <button on:click=move |_| set_music(true)>"Play"</button>
                                <button on:click=move |_| set_music(false)>"Stop"</button>
                            </section>

                            <section class="admin-section">
                                <h2>"Template"</h2>
                                <select on:change=move |ev| {
                                    chosen_template.set(event_target_value(&ev).parse().unwrap_or(0))
                                }>
                                    <option value="0">"Choose a template"</option>
                                    {move || {
                                        templates_fetcher
                                            .with(|res| match res {
                                                Some(Ok(templates)) => {
                                                    templates
                                                        .iter()
                                                        .map(|t| {
                                                            view! {
                                                                <option value=t.id.to_string()>{t.name.clone()}</option>
                                                            }
                                                        })
                                                        .collect_view()
                                                        .into_any()
                                                }
                                                _ => view! {}.into_any(),
                                            })
                                    }}
                                </select>
                                <button on:click=apply_template>"Apply"</button>
                            </section>

                            <section class="admin-section">
                                <h2>"Prizes"</h2>
                                <form class="admin-form" on:submit=bulk_submit>
                                    <label>
                                        "One line per slot, in order: name|grade|winner"
                                        <textarea
                                            rows="6"
                                            placeholder="Gift card|A|yes\nCandy cane|C|no"
                                            on:input=move |ev| bulk_lines.set(event_target_value(&ev))
                                        ></textarea>
                                    </label>
                                    <button type="submit">"Assign"</button>
                                    <span>{move || bulk_result.get()}</span>
                                </form>
                                <Suspense fallback=|| "Loading prizes...">
                                    {move || {
                                        prizes_fetcher
                                            .with(|res| match res {
                                                Some(Ok(prizes)) => {
                                                    view! {
                                                        <table class="admin-table">
                                                            <thead>
                                                                <tr>
                                                                    <th>"Slot"</th>
                                                                    <th>"Prize"</th>
                                                                    <th>"Grade"</th>
                                                                    <th>"Winner"</th>
                                                                    <th>"X %"</th>
                                                                    <th>"Y %"</th>
                                                                    <th>"Sprite dx"</th>
                                                                    <th>"Sprite dy"</th>
                                                                    <th>"Drawn"</th>
                                                                    <th></th>
                                                                </tr>
                                                            </thead>
                                                            <tbody>
                                                                {prizes
                                                                    .iter()
                                                                    .map(|prize| {
                                                                        view! {
                                                                            <PrizeRow
                                                                                prize=prize.clone()
                                                                                on_saved=on_saved
                                                                            />
                                                                        }
                                                                    })
                                                                    .collect_view()}
                                                            </tbody>
                                                        </table>
                                                    }
                                                        .into_any()
                                                }
                                                Some(Err(e)) => {
                                                    view! { <p class="error">{e.to_string()}</p> }.into_any()
                                                }
                                                None => view! {}.into_any(),
                                            })
                                    }}
                                </Suspense>
                            </section>

                            <section class="admin-section">
                                <h2>"Draws"</h2>
                                <Suspense fallback=|| "Loading draws...">
                                    {move || {
                                        draws_fetcher
                                            .with(|res| match res {
                                                Some(Ok(draws)) => {
                                                    view! {
                                                        <table class="admin-table">
                                                            <thead>
                                                                <tr>
                                                                    <th>"When"</th>
                                                                    <th>"Player"</th>
                                                                    <th>"Slot"</th>
                                                                    <th>"Prize"</th>
                                                                    <th>"Winner"</th>
                                                                </tr>
                                                            </thead>
                                                            <tbody>
                                                                {draws
                                                                    .iter()
                                                                    .map(|d| {
                                                                        view! {
                                                                            <tr>
                                                                                <td>{d.created_at.format("%H:%M:%S").to_string()}</td>
                                                                                <td>{d.player_name.clone()}</td>
                                                                                <td>{d.slot_number}</td>
                                                                                <td>
                                                                                    {format!("{} {}", d.prize_name, d.prize_grade)}
                                                                                </td>
                                                                                <td>{if d.is_winner { "yes" } else { "" }}</td>
                                                                            </tr>
                                                                        }
                                                                    })
                                                                    .collect_view()}
                                                            </tbody>
                                                        </table>
                                                    }
                                                        .into_any()
                                                }
                                                Some(Err(e)) => {
                                                    view! { <p class="error">{e.to_string()}</p> }.into_any()
                                                }
                                                None => view! {}.into_any(),
                                            })
                                    }}
                                </Suspense>
                            </section>
                        </div>
                    }
                        .into_any()
                } else {
                    view! {}.into_any()
                }
            }}
        </Suspense>
    }
}

#[component]
fn SettingsForm(game_id: i32, initial: GameSettings, on_saved: Callback<()>) -> impl IntoView {
    let settings = RwSignal::new(initial);
    let error = RwSignal::new(String::new());

    let submit = move |ev: SubmitEvent| {
        ev.prevent_default();
        let current = settings.get();
        spawn_local(async move {
            match update_game_settings_handler(game_id, current).await {
                Ok(_) => {
                    error.set(String::new());
                    on_saved.run(());
                }
                Err(e) => error.set(e.to_string()),
            }
        });
    };

    let text = move |get: fn(&GameSettings) -> String, set: fn(&mut GameSettings, String)| {
        view! {
            <input
                type="text"
                prop:value=move || settings.with(get)
                on:input=move |ev| settings.update(|s| set(s, event_target_value(&ev)))
            />
        }
    };
    let number = move |get: fn(&GameSettings) -> i32, set: fn(&mut GameSettings, i32)| {
        view! {
            <input
                type="number"
                prop:value=move || settings.with(get).to_string()
                on:input=move |ev| {
                    settings.update(|s| set(s, event_target_value(&ev).parse().unwrap_or(0)))
                }
            />
        }
    };

    view! {
        <section class="admin-section">
            <h2>"Settings"</h2>
            <form class="admin-form settings-form" on:submit=submit>
                <label>"Title: " {text(|s| s.title.clone(), |s, v| s.title = v)}</label>
                <label>
                    "Theme color: "
                    <input
                        type="color"
                        prop:value=move || settings.with(|s| s.theme_color.clone())
                        on:input=move |ev| settings.update(|s| s.theme_color = event_target_value(&ev))
                    />
                </label>
                <label>
                    "Background URL: "
                    {text(
                        |s| s.background_url.clone().unwrap_or_default(),
                        |s, v| s.background_url = Some(v).filter(|v| !v.trim().is_empty()),
                    )}
                </label>
                <label>
                    "Sprite sheet URL: "
                    {text(
                        |s| s.sprite_url.clone().unwrap_or_default(),
                        |s, v| s.sprite_url = Some(v).filter(|v| !v.trim().is_empty()),
                    )}
                </label>
                <fieldset>
                    <legend>"Sprite grid"</legend>
                    <label>"Columns: " {number(|s| s.sprite_columns, |s, v| s.sprite_columns = v)}</label>
                    <label>
                        "Cell width: " {number(|s| s.sprite_cell_width, |s, v| s.sprite_cell_width = v)}
                    </label>
                    <label>
                        "Cell height: "
                        {number(|s| s.sprite_cell_height, |s, v| s.sprite_cell_height = v)}
                    </label>
                    <label>"Origin x: " {number(|s| s.sprite_origin_x, |s, v| s.sprite_origin_x = v)}</label>
                    <label>"Origin y: " {number(|s| s.sprite_origin_y, |s, v| s.sprite_origin_y = v)}</label>
                </fieldset>
                <label>
                    <input
                        type="checkbox"
                        prop:checked=move || settings.with(|s| s.show_prize_names)
                        on:change=move |ev| settings.update(|s| s.show_prize_names = event_target_checked(&ev))
                    />
                    " Show prize names before they are drawn"
                </label>
                <label>
                    <input
                        type="checkbox"
                        prop:checked=move || settings.with(|s| s.show_draw_feed)
                        on:change=move |ev| settings.update(|s| s.show_draw_feed = event_target_checked(&ev))
                    />
                    " Show the latest draws to players"
                </label>
                <button type="submit">"Save settings"</button>
            </form>
            {move || (!error.get().is_empty()).then(|| view! { <p class="error">{error.get()}</p> })}
        </section>
    }
}

#[component]
fn PrizeRow(prize: Prize, on_saved: Callback<()>) -> impl IntoView {
    let prize_id = prize.id;
    // Drawn prizes keep their contents; only the layout can move.
    let locked = prize.is_drawn;
    let name = RwSignal::new(prize.prize_name.clone());
    let grade = RwSignal::new(prize.prize_grade.clone());
    let winner = RwSignal::new(prize.is_winner);
    let pos_x = RwSignal::new(prize.position_x);
    let pos_y = RwSignal::new(prize.position_y);
    let offset_x = RwSignal::new(prize.sprite_offset_x);
    let offset_y = RwSignal::new(prize.sprite_offset_y);
    let error = RwSignal::new(String::new());

    let save = move |_| {
        let update = PrizeUpdate {
            prize_name: name.get(),
            prize_grade: grade.get(),
            is_winner: winner.get(),
        };
        let (x, y, dx, dy) = (pos_x.get(), pos_y.get(), offset_x.get(), offset_y.get());
        spawn_local(async move {
            let contents = if locked {
                Ok(())
            } else {
                update_prize_handler(prize_id, update).await.map(|_| ())
            };
            let result = match contents {
                Ok(()) => update_prize_layout_handler(prize_id, x, y, dx, dy).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(_) => {
                    error.set(String::new());
                    on_saved.run(());
                }
                Err(e) => error.set(e.to_string()),
            }
        });
    };

    view! {
        <tr class=if prize.is_drawn { "drawn" } else { "" }>
            <td>{prize.slot_number}</td>
            <td>
                <input
                    type="text"
                    disabled=locked
                    prop:value=move || name.get()
                    on:input=move |ev| name.set(event_target_value(&ev))
                />
            </td>
            <td>
                <input
                    type="text"
                    size="4"
                    disabled=locked
                    prop:value=move || grade.get()
                    on:input=move |ev| grade.set(event_target_value(&ev))
                />
            </td>
            <td>
                <input
                    type="checkbox"
                    disabled=locked
                    prop:checked=move || winner.get()
                    on:change=move |ev| winner.set(event_target_checked(&ev))
                />
            </td>
            <td>
                <input
                    type="number"
                    step="0.1"
                    prop:value=move || pos_x.get().to_string()
                    on:input=move |ev| pos_x.set(event_target_value(&ev).parse().unwrap_or(0.0))
                />
            </td>
            <td>
                <input
                    type="number"
                    step="0.1"
                    prop:value=move || pos_y.get().to_string()
                    on:input=move |ev| pos_y.set(event_target_value(&ev).parse().unwrap_or(0.0))
                />
            </td>
            <td>
                <input
                    type="number"
                    prop:value=move || offset_x.get().to_string()
                    on:input=move |ev| offset_x.set(event_target_value(&ev).parse().unwrap_or(0))
                />
            </td>
            <td>
                <input
                    type="number"
                    prop:value=move || offset_y.get().to_string()
                    on:input=move |ev| offset_y.set(event_target_value(&ev).parse().unwrap_or(0))
                />
            </td>
            <td>{if prize.is_drawn { "yes" } else { "" }}</td>
            <td>
                <button on:click=save>"Save"</button>
                {move || (!error.get().is_empty()).then(|| view! { <span class="error">{error.get()}</span> })}
            </td>
        </tr>
    }
}

/// How many grid cells the template preview shows.
const PREVIEW_CELLS: i32 = 12;

#[component]
pub fn AdminTemplate() -> impl IntoView {
    let is_admin_fetcher = use_admin_guard();
    let template_id = param_id("template_id");
    let template_fetcher = Resource::new(template_id, get_template_handler);

    let form = RwSignal::new(None::<TemplateInput>);
    let error = RwSignal::new(String::new());

    Effect::new(move || {
        template_fetcher.with(|res| {
            if let Some(Ok(with_slots)) = res {
                form.set(Some(TemplateInput::from(&with_slots.template)));
            }
        });
    });

    let save = move |ev: SubmitEvent| {
        ev.prevent_default();
        let Some(input) = form.get() else {
            return;
        };
        let id = template_id();
        spawn_local(async move {
            match update_template_handler(id, input).await {
                Ok(_) => {
                    error.set(String::new());
                    template_fetcher.refetch();
                }
                Err(e) => error.set(e.to_string()),
            }
        });
    };

    // Per-slot override.
    let slot_number = RwSignal::new(1i32);
    let slot_dx = RwSignal::new(0i32);
    let slot_dy = RwSignal::new(0i32);
    let slot_x = RwSignal::new(String::new());
    let slot_y = RwSignal::new(String::new());
    let slot_submit = move |ev: SubmitEvent| {
        ev.prevent_default();
        let id = template_id();
        let (n, dx, dy) = (slot_number.get(), slot_dx.get(), slot_dy.get());
        let x = slot_x.get().trim().parse::<f64>().ok();
        let y = slot_y.get().trim().parse::<f64>().ok();
        spawn_local(async move {
            match set_template_slot_handler(id, n, dx, dy, x, y).await {
                Ok(_) => {
                    error.set(String::new());
                    template_fetcher.refetch();
                }
                Err(e) => error.set(e.to_string()),
            }
        });
    };

    let navigate = use_navigate();
    let delete = move |_| {
        if !confirm("Delete this template? Games using it keep their current look.") {
            return;
        }
        let id = template_id();
        let navigate = navigate.clone();
        spawn_local(async move {
            match delete_template_handler(id).await {
                Ok(()) => navigate("/admin", NavigateOptions::default()),
                Err(e) => error.set(e.to_string()),
            }
        });
    };

    let field = move |get: fn(&TemplateInput) -> String, set: fn(&mut TemplateInput, String)| {
        view! {
            <input
                type="text"
                prop:value=move || form.with(|f| f.as_ref().map(get).unwrap_or_default())
                on:input=move |ev| {
                    let v = event_target_value(&ev);
                    form.update(|f| {
                        if let Some(f) = f {
                            set(f, v)
                        }
                    })
                }
            />
        }
    };
    let number = move |get: fn(&TemplateInput) -> i32, set: fn(&mut TemplateInput, i32)| {
        view! {
            <input
                type="number"
                prop:value=move || form.with(|f| f.as_ref().map(get).unwrap_or_default().to_string())
                on:input=move |ev| {
                    let v = event_target_value(&ev).parse().unwrap_or(0);
                    form.update(|f| {
                        if let Some(f) = f {
                            set(f, v)
                        }
                    })
                }
            />
        }
    };

    let preview = move || {
        let input = form.get()?;
        let url = input.sprite_url.clone()?;
        let sheet = SpriteSheet {
            columns: input.sprite_columns,
            cell_width: input.sprite_cell_width,
            cell_height: input.sprite_cell_height,
            origin_x: input.sprite_origin_x,
            origin_y: input.sprite_origin_y,
        };
        let offsets = template_fetcher.with(|res| match res {
            Some(Ok(t)) => t
                .slots
                .iter()
                .map(|s| (s.slot_number, (s.offset_x, s.offset_y)))
                .collect::<Vec<_>>(),
            _ => Vec::new(),
        });
        Some(view! {
            <div class="sprite-preview">
                {(1..=PREVIEW_CELLS)
                    .map(|slot| {
                        let offset = offsets
                            .iter()
                            .find(|(n, _)| *n == slot)
                            .map(|(_, o)| *o)
                            .unwrap_or((0, 0));
                        let style = sheet.crop_for_slot(slot, offset).css(&url);
                        view! {
                            <div class="sprite-cell">
                                <div class="sprite" style=style></div>
                                <span>{slot}</span>
                            </div>
                        }
                    })
                    .collect_view()}
            </div>
        })
    };

    view! {
        <Suspense fallback=|| "Loading...">
            {move || {
                if let Some(Ok(true)) = is_admin_fetcher.get() {
                    view! {
                        <div class="admin-container">
                            <AdminNav />
                            <h1>"Template"</h1>
                            <form class="admin-form" on:submit=save>
                                <label>"Name: " {field(|f| f.name.clone(), |f, v| f.name = v)}</label>
                                <label>
                                    "Background URL: "
                                    {field(
                                        |f| f.background_url.clone().unwrap_or_default(),
                                        |f, v| f.background_url = Some(v).filter(|v| !v.trim().is_empty()),
                                    )}
                                </label>
                                <label>
                                    "Sprite sheet URL: "
                                    {field(
                                        |f| f.sprite_url.clone().unwrap_or_default(),
                                        |f, v| f.sprite_url = Some(v).filter(|v| !v.trim().is_empty()),
                                    )}
                                </label>
                                <label>"Columns: " {number(|f| f.sprite_columns, |f, v| f.sprite_columns = v)}</label>
                                <label>
                                    "Cell width: " {number(|f| f.sprite_cell_width, |f, v| f.sprite_cell_width = v)}
                                </label>
                                <label>
                                    "Cell height: "
                                    {number(|f| f.sprite_cell_height, |f, v| f.sprite_cell_height = v)}
                                </label>
                                <label>"Origin x: " {number(|f| f.sprite_origin_x, |f, v| f.sprite_origin_x = v)}</label>
                                <label>"Origin y: " {number(|f| f.sprite_origin_y, |f, v| f.sprite_origin_y = v)}</label>
                                <button type="submit">"Save template"</button>
                            </form>

                            {preview}

                            <section class="admin-section">
                                <h2>"Slot overrides"</h2>
                                <form class="admin-form" on:submit=slot_submit>
                                    <label>
                                        "Slot: "
                                        <input
                                            type="number"
                                            min="1"
                                            prop:value=move || slot_number.get().to_string()
                                            on:input=move |ev| {
                                                slot_number.set(event_target_value(&ev).parse().unwrap_or(1))
                                            }
                                        />
                                    </label>
                                    <label>
                                        "Sprite dx: "
                                        <input
                                            type="number"
                                            prop:value=move || slot_dx.get().to_string()
                                            on:input=move |ev| slot_dx.set(event_target_value(&ev).parse().unwrap_or(0))
                                        />
                                    </label>
                                    <label>
                                        "Sprite dy: "
                                        <input
                                            type="number"
                                            prop:value=move || slot_dy.get().to_string()
                                            on:input=move |ev| slot_dy.set(event_target_value(&ev).parse().unwrap_or(0))
                                        />
                                    </label>
                                    <label>
                                        "X % (optional): "
                                        <input
                                            type="text"
                                            prop:value=move || slot_x.get()
                                            on:input=move |ev| slot_x.set(event_target_value(&ev))
                                        />
                                    </label>
                                    <label>
                                        "Y % (optional): "
                                        <input
                                            type="text"
                                            prop:value=move || slot_y.get()
                                            on:input=move |ev| slot_y.set(event_target_value(&ev))
                                        />
                                    </label>
                                    <button type="submit">"Save slot"</button>
                                </form>
                                {move || {
                                    template_fetcher
                                        .with(|res| match res {
                                            Some(Ok(t)) => {
                                                view! {
                                                    <table class="admin-table">
                                                        <thead>
                                                            <tr>
                                                                <th>"Slot"</th>
                                                                <th>"dx"</th>
                                                                <th>"dy"</th>
                                                                <th>"Position"</th>
                                                            </tr>
                                                        </thead>
                                                        <tbody>
                                                            {t
                                                                .slots
                                                                .iter()
                                                                .map(|s| {
                                                                    let position = match (s.position_x, s.position_y) {
                                                                        (Some(x), Some(y)) => format!("{}%, {}%", x, y),
                                                                        _ => "default".to_string(),
                                                                    };
                                                                    view! {
                                                                        <tr>
                                                                            <td>{s.slot_number}</td>
                                                                            <td>{s.offset_x}</td>
                                                                            <td>{s.offset_y}</td>
                                                                            <td>{position}</td>
                                                                        </tr>
                                                                    }
                                                                })
                                                                .collect_view()}
                                                        </tbody>
                                                    </table>
                                                }
                                                    .into_any()
                                            }
                                            Some(Err(e)) => {
                                                view! { <p class="error">{e.to_string()}</p> }.into_any()
                                            }
                                            None => view! {}.into_any(),
                                        })
                                }}
                            </section>

                            {move || (!error.get().is_empty()).then(|| view! { <p class="error">{error.get()}</p> })}
                            <button class="btn-danger" on:click=delete.clone()>
                                "Delete template"
                            </button>
                        </div>
                    }
                        .into_any()
                } else {
                    view! {}.into_any()
                }
            }}
        </Suspense>
    }
}

#[component]
pub fn AdminReservations() -> impl IntoView {
    let is_admin_fetcher = use_admin_guard();
    let reservations_fetcher = Resource::new(|| (), |_| list_reservations_handler());

    let remove = move |id: i32| {
        if !confirm("Delete this reservation?") {
            return;
        }
        spawn_local(async move {
            match delete_reservation_handler(id).await {
                Ok(()) => reservations_fetcher.refetch(),
                Err(e) => log!("Error: {}", e),
            }
        });
    };

    view! {
        <Suspense fallback=|| "Loading...">
            {move || {
                if let Some(Ok(true)) = is_admin_fetcher.get() {
                    view! {
                        <div class="admin-container">
                            <AdminNav />
                            <h1>"Reservations"</h1>
                            {move || {
                                reservations_fetcher
                                    .with(|res| match res {
                                        Some(Ok(list)) if list.is_empty() => {
                                            view! { <p>"No reservations yet."</p> }.into_any()
                                        }
                                        Some(Ok(list)) => {
                                            view! {
                                                <table class="admin-table">
                                                    <thead>
                                                        <tr>
                                                            <th>"Received"</th>
                                                            <th>"Name"</th>
                                                            <th>"Contact"</th>
                                                            <th>"Date"</th>
                                                            <th>"Party"</th>
                                                            <th>"Message"</th>
                                                            <th></th>
                                                        </tr>
                                                    </thead>
                                                    <tbody>
                                                        {list
                                                            .iter()
                                                            .map(|r| {
                                                                let id = r.id;
                                                                view! {
                                                                    <tr>
                                                                        <td>{r.created_at.format("%Y-%m-%d %H:%M").to_string()}</td>
                                                                        <td>{r.name.clone()}</td>
                                                                        <td>{r.contact.clone()}</td>
                                                                        <td>{r.event_date.clone().unwrap_or_default()}</td>
                                                                        <td>{r.party_size}</td>
                                                                        <td>{r.message.clone().unwrap_or_default()}</td>
                                                                        <td>
                                                                            <button class="btn-danger" on:click=move |_| remove(id)>
                                                                                "Delete"
                                                                            </button>
                                                                        </td>
                                                                    </tr>
                                                                }
                                                            })
                                                            .collect_view()}
                                                    </tbody>
                                                </table>
                                            }
                                                .into_any()
                                        }
                                        Some(Err(e)) => {
                                            view! { <p class="error">{e.to_string()}</p> }.into_any()
                                        }
                                        None => view! {}.into_any(),
                                    })
                            }}
                        </div>
                    }
                        .into_any()
                } else {
                    view! {}.into_any()
                }
            }}
        </Suspense>
    }
}

#[component]
pub fn AdminSideApplications() -> impl IntoView {
    let is_admin_fetcher = use_admin_guard();
    let applications_fetcher = Resource::new(|| (), |_| list_side_applications_handler());

    let remove = move |id: i32| {
        if !confirm("Delete this application?") {
            return;
        }
        spawn_local(async move {
            match delete_side_application_handler(id).await {
                Ok(()) => applications_fetcher.refetch(),
                Err(e) => log!("Error: {}", e),
            }
        });
    };

    view! {
        <Suspense fallback=|| "Loading...">
            {move || {
                if let Some(Ok(true)) = is_admin_fetcher.get() {
                    view! {
                        <div class="admin-container">
                            <AdminNav />
                            <h1>"Side applications"</h1>
                            {move || {
                                applications_fetcher
                                    .with(|res| match res {
                                        Some(Ok(list)) if list.is_empty() => {
                                            view! { <p>"No applications yet."</p> }.into_any()
                                        }
                                        Some(Ok(list)) => {
                                            view! {
                                                <table class="admin-table">
                                                    <thead>
                                                        <tr>
                                                            <th>"Received"</th>
                                                            <th>"Name"</th>
                                                            <th>"Contact"</th>
                                                            <th>"Category"</th>
                                                            <th>"Description"</th>
                                                            <th></th>
                                                        </tr>
                                                    </thead>
                                                    <tbody>
                                                        {list
                                                            .iter()
                                                            .map(|a| {
                                                                let id = a.id;
                                                                view! {
                                                                    <tr>
                                                                        <td>{a.created_at.format("%Y-%m-%d %H:%M").to_string()}</td>
                                                                        <td>{a.name.clone()}</td>
                                                                        <td>{a.contact.clone()}</td>
                                                                        <td>{a.category.clone()}</td>
                                                                        <td>{a.description.clone().unwrap_or_default()}</td>
                                                                        <td>
                                                                            <button class="btn-danger" on:click=move |_| remove(id)>
                                                                                "Delete"
                                                                            </button>
                                                                        </td>
                                                                    </tr>
                                                                }
                                                            })
                                                            .collect_view()}
                                                    </tbody>
                                                </table>
                                            }
                                                .into_any()
                                        }
                                        Some(Err(e)) => {
                                            view! { <p class="error">{e.to_string()}</p> }.into_any()
                                        }
                                        None => view! {}.into_any(),
                                    })
                            }}
                        </div>
                    }
                        .into_any()
                } else {
                    view! {}.into_any()
                }
            }}
        </Suspense>
    }
}
