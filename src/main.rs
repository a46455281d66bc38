#[cfg(feature = "ssr")]
#[tokio::main]
async fn main() {
    use std::sync::Arc;

    use axum::{routing::get, Extension, Router};
    use leptos::prelude::*;
    use leptos_axum::{generate_route_list, LeptosRoutes};
    use lucky_tree::app::*;
    use lucky_tree::config::ServerConfig;
    use lucky_tree::realtime::{game_feed_handler, RealtimeHub};
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::from_env().expect("Invalid server configuration.");
    let pool = lucky_tree::build_pool(&config.database_url).expect("Failed to create pool.");
    let hub = Arc::new(RealtimeHub::default());

    let conf = get_configuration(None).unwrap();
    let addr = conf.leptos_options.site_addr;
    let leptos_options = conf.leptos_options;
    // Generate the list of routes in your Leptos App
    let routes = generate_route_list(App);

    let leptos_options_clone = leptos_options.clone();
    let context_hub = hub.clone();
    let feed_pool = pool.clone();
    let app = Router::new()
        .leptos_routes_with_context(
            &leptos_options,
            routes,
            // Provide pool, change feed and config for server functions.
            move || {
                provide_context(pool.clone());
                provide_context(context_hub.clone());
                provide_context(config.clone());
            },
            // Use App for main routes.
            move || shell(leptos_options_clone.clone()),
        )
        .route("/ws/games/{game_id}", get(game_feed_handler))
        .layer(Extension(hub))
        .layer(Extension(feed_pool))
        // Use shell for fallback.
        .fallback(leptos_axum::file_and_error_handler(shell))
        .with_state(leptos_options.clone());

    tracing::info!("listening on http://{}", &addr);
    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    axum::serve(listener, app.into_make_service())
        .await
        .unwrap();
}

#[cfg(not(feature = "ssr"))]
pub fn main() {
    // no client-side main function
    // see lib.rs for hydration function instead
}
